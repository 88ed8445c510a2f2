pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod export;
pub mod fetcher;
pub mod flatfile;
pub mod graph;
pub mod kegg;
pub mod listing;
pub mod manager;
pub mod output;
pub mod parser;
pub mod store;
pub mod xref;
