use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::KeggEntityId;
use crate::error::KeggError;

pub const DATABASE_FILE: &str = "kegg.db";
pub const METADATA_FILE: &str = "protein_metadata.json";
pub const PATHWAYS_FILE: &str = "pathways.tsv";
pub const PROTEIN_PATHWAY_FILE: &str = "protein_pathway.tsv";
pub const ORGANISMS_FILE: &str = "organisms.tsv";
pub const HGNC_FILE: &str = "hgnc_complete_set.txt";

/// On-disk layout of the data directory.
///
/// ```text
/// <root>/kegg.db
/// <root>/protein_metadata.json
/// <root>/pathways.tsv, protein_pathway.tsv, organisms.tsv, hgnc_complete_set.txt
/// <root>/entities/<prefix>/<identifier>.txt
/// ```
#[derive(Debug, Clone)]
pub struct Store {
    root: Utf8PathBuf,
}

impl Store {
    pub fn new() -> Result<Self, KeggError> {
        let root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(
                    dirs.home_dir().join(".cache").join("kegg-pathway-manager"),
                )
                .ok()
            })
            .ok_or_else(|| KeggError::Filesystem("unable to resolve data directory".to_string()))?;
        Ok(Self { root })
    }

    pub fn new_with_root(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn database_path(&self) -> Utf8PathBuf {
        self.root.join(DATABASE_FILE)
    }

    pub fn metadata_path(&self) -> Utf8PathBuf {
        self.root.join(METADATA_FILE)
    }

    pub fn listing_path(&self, file_name: &str) -> Utf8PathBuf {
        self.root.join(file_name)
    }

    pub fn entity_dir(&self, prefix: &str) -> Utf8PathBuf {
        self.root.join("entities").join(prefix)
    }

    pub fn entity_path(&self, id: &KeggEntityId) -> Utf8PathBuf {
        self.entity_dir(id.prefix())
            .join(format!("{}.txt", id.identifier()))
    }

    pub fn ensure_root(&self) -> Result<(), KeggError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| KeggError::Filesystem(err.to_string()))
    }

    pub fn exists(&self, path: &Utf8Path) -> bool {
        path.as_std_path().exists()
    }

    pub fn clear(&self) -> Result<(), KeggError> {
        if self.root.as_std_path().exists() {
            fs::remove_dir_all(self.root.as_std_path())
                .map_err(|err| KeggError::Filesystem(err.to_string()))?;
        }
        Ok(())
    }

    pub fn read_text(path: &Utf8Path) -> Result<String, KeggError> {
        fs::read_to_string(path.as_std_path())
            .map_err(|err| KeggError::Filesystem(format!("read {path}: {err}")))
    }

    /// Writes through a sibling temp file so readers never observe a partial file.
    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), KeggError> {
        let parent = path
            .parent()
            .ok_or_else(|| KeggError::Filesystem(format!("invalid destination path {path}")))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| KeggError::Filesystem(err.to_string()))?;
        let temp = tempfile::Builder::new()
            .prefix(".kegg-pm")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| KeggError::Filesystem(err.to_string()))?;
        fs::write(temp.path(), content).map_err(|err| KeggError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| KeggError::Filesystem(err.to_string()))?;
        Ok(())
    }

    pub fn write_json<T: Serialize>(path: &Utf8Path, value: &T) -> Result<(), KeggError> {
        let content = serde_json::to_vec_pretty(value)
            .map_err(|err| KeggError::Serialization(err.to_string()))?;
        Self::write_bytes_atomic(path, &content)
    }

    pub fn read_json<T: DeserializeOwned>(path: &Utf8Path) -> Result<T, KeggError> {
        let content = Self::read_text(path)?;
        serde_json::from_str(&content).map_err(|err| KeggError::Serialization(err.to_string()))
    }
}
