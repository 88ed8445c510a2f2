//! Tab-separated KEGG listings: `list/pathway`, `link/pathway` and
//! `list/organism`.

use camino::Utf8PathBuf;
use tracing::info;

use crate::domain::{KeggEntityId, OrganismCode, PathwayId};
use crate::error::KeggError;
use crate::kegg::KeggClient;
use crate::store::Store;

/// Where a listing comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Source {
    /// Downloaded once into the data directory, then re-used.
    #[default]
    Remote,
    File(Utf8PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathwayRecord {
    pub id: PathwayId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub protein: KeggEntityId,
    pub pathway: PathwayId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganismRecord {
    pub kegg_id: String,
    pub code: OrganismCode,
    pub name: String,
    pub common_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingKind {
    Pathways,
    Memberships,
    Organisms,
}

impl ListingKind {
    pub fn file_name(self) -> &'static str {
        match self {
            ListingKind::Pathways => crate::store::PATHWAYS_FILE,
            ListingKind::Memberships => crate::store::PROTEIN_PATHWAY_FILE,
            ListingKind::Organisms => crate::store::ORGANISMS_FILE,
        }
    }
}

/// Reads a listing, downloading remote sources into the data directory on first use.
pub fn ensure_listing<C: KeggClient>(
    source: &Source,
    kind: ListingKind,
    organism: &OrganismCode,
    client: &C,
    store: &Store,
) -> Result<String, KeggError> {
    match source {
        Source::File(path) => Store::read_text(path),
        Source::Remote => {
            let path = store.listing_path(kind.file_name());
            if store.exists(&path) {
                return Store::read_text(&path);
            }
            info!(listing = kind.file_name(), "downloading KEGG listing");
            let text = match kind {
                ListingKind::Pathways => client.list_pathways(organism)?,
                ListingKind::Memberships => client.link_pathways(organism)?,
                ListingKind::Organisms => client.list_organisms()?,
            };
            Store::write_bytes_atomic(&path, text.as_bytes())?;
            Ok(text)
        }
    }
}

pub fn parse_pathways(text: &str) -> Result<Vec<PathwayRecord>, KeggError> {
    rows(text, "pathways", 2)
        .map(|row| -> Result<PathwayRecord, KeggError> {
            let (line, columns) = row?;
            let id = columns[0]
                .parse()
                .map_err(|_| listing_error("pathways", line, &columns))?;
            Ok(PathwayRecord {
                id,
                name: columns[1].trim().to_string(),
            })
        })
        .collect()
}

pub fn parse_memberships(text: &str) -> Result<Vec<Membership>, KeggError> {
    rows(text, "protein_pathway", 2)
        .map(|row| -> Result<Membership, KeggError> {
            let (line, columns) = row?;
            let protein = columns[0]
                .parse()
                .map_err(|_| listing_error("protein_pathway", line, &columns))?;
            let pathway = columns[1]
                .parse()
                .map_err(|_| listing_error("protein_pathway", line, &columns))?;
            Ok(Membership { protein, pathway })
        })
        .collect()
}

pub fn parse_organisms(text: &str) -> Result<Vec<OrganismRecord>, KeggError> {
    rows(text, "organisms", 3)
        .map(|row| -> Result<OrganismRecord, KeggError> {
            let (line, columns) = row?;
            let code = columns[1]
                .parse()
                .map_err(|_| listing_error("organisms", line, &columns))?;
            let (name, common_name) = split_common_name(columns[2]);
            Ok(OrganismRecord {
                kegg_id: columns[0].trim().to_string(),
                code,
                name,
                common_name,
            })
        })
        .collect()
}

/// `Homo sapiens (human)` -> (`Homo sapiens`, `human`)
pub fn split_common_name(value: &str) -> (String, Option<String>) {
    let value = value.trim();
    match value.split_once(" (") {
        Some((name, rest)) => {
            let common = rest.trim_end_matches(')').trim();
            (
                name.trim().to_string(),
                (!common.is_empty()).then(|| common.to_string()),
            )
        }
        None => (value.to_string(), None),
    }
}

fn rows<'a>(
    text: &'a str,
    source_name: &'a str,
    min_columns: usize,
) -> impl Iterator<Item = Result<(usize, Vec<&'a str>), KeggError>> + 'a {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(move |(index, line)| {
            let columns: Vec<&str> = line.split('\t').collect();
            if columns.len() < min_columns {
                return Err(KeggError::ListingParse {
                    source_name: source_name.to_string(),
                    line: index + 1,
                    content: line.to_string(),
                });
            }
            Ok((index + 1, columns))
        })
}

fn listing_error(source_name: &str, line: usize, columns: &[&str]) -> KeggError {
    KeggError::ListingParse {
        source_name: source_name.to_string(),
        line,
        content: columns.join("\t"),
    }
}
