use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KeggError {
    #[error("invalid KEGG entity identifier: {0}")]
    InvalidEntityId(String),

    #[error("invalid KEGG pathway identifier: {0}")]
    InvalidPathwayId(String),

    #[error("invalid KEGG organism code: {0}")]
    InvalidOrganism(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("KEGG request failed: {0}")]
    KeggHttp(String),

    #[error("KEGG returned status {status}: {message}")]
    KeggStatus { status: u16, message: String },

    #[error("failed to fetch {id}: {message}")]
    EntityFetch { id: String, message: String },

    #[error("vocabulary request failed: {0}")]
    VocabularyHttp(String),

    #[error("vocabulary service returned status {status}: {message}")]
    VocabularyStatus { status: u16, message: String },

    #[error("malformed vocabulary table: {0}")]
    VocabularyParse(String),

    #[error("malformed listing {source_name} at line {line}: {content}")]
    ListingParse {
        source_name: String,
        line: usize,
        content: String,
    },

    #[error("protein metadata cache {path} is stale: {reason}")]
    #[diagnostic(help(
        "delete the metadata file and run populate again without --metadata-exists"
    ))]
    StaleCache { path: PathBuf, reason: String },

    #[error("pathway not found: {0}")]
    PathwayNotFound(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("failed to serialize metadata: {0}")]
    Serialization(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
