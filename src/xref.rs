//! Read-only mappings between KEGG human gene identifiers, HGNC identifiers
//! and HGNC symbols.
//!
//! The table is built once from the HGNC complete set (about 45k rows, a few
//! MB of memory) and passed explicitly to the code that needs it. KEGG human
//! gene identifiers (`hsa:5214`) are NCBI Gene identifiers, which the HGNC
//! table carries in its `entrez_id` column.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{KeggEntityId, normalize_hgnc_id};
use crate::error::KeggError;
use crate::listing::Source;
use crate::store::{HGNC_FILE, Store};

pub const HGNC_COMPLETE_SET_URL: &str =
    "https://storage.googleapis.com/public-download-files/hgnc/tsv/tsv/hgnc_complete_set.txt";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HgncRecord {
    /// Numeric part of the HGNC accession, `8878` for `HGNC:8878`.
    pub hgnc_id: String,
    pub symbol: String,
    pub entrez_id: Option<String>,
    pub uniprot_ids: Vec<String>,
}

pub trait VocabularyClient: Send + Sync {
    fn download_complete_set(&self) -> Result<String, KeggError>;
}

#[derive(Clone)]
pub struct HgncHttpClient {
    client: Client,
}

impl HgncHttpClient {
    pub fn new() -> Result<Self, KeggError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kegg-pm/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KeggError::VocabularyHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| KeggError::VocabularyHttp(err.to_string()))?;
        Ok(Self { client })
    }
}

impl VocabularyClient for HgncHttpClient {
    fn download_complete_set(&self) -> Result<String, KeggError> {
        let response = self
            .client
            .get(HGNC_COMPLETE_SET_URL)
            .send()
            .map_err(|err| KeggError::VocabularyHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "vocabulary request failed".to_string());
            return Err(KeggError::VocabularyStatus { status, message });
        }
        response
            .text()
            .map_err(|err| KeggError::VocabularyHttp(err.to_string()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct CrossReferenceTable {
    entrez_to_hgnc: HashMap<String, String>,
    hgnc_to_entrez: HashMap<String, String>,
    hgnc_to_symbol: HashMap<String, String>,
    symbol_to_hgnc: HashMap<String, String>,
    hgnc_to_uniprot: HashMap<String, Vec<String>>,
}

impl CrossReferenceTable {
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = HgncRecord>,
    {
        let mut table = Self::default();
        for record in records {
            if let Some(entrez) = &record.entrez_id {
                table
                    .entrez_to_hgnc
                    .insert(entrez.clone(), record.hgnc_id.clone());
                table
                    .hgnc_to_entrez
                    .insert(record.hgnc_id.clone(), entrez.clone());
            }
            table
                .symbol_to_hgnc
                .insert(record.symbol.clone(), record.hgnc_id.clone());
            table
                .hgnc_to_symbol
                .insert(record.hgnc_id.clone(), record.symbol.clone());
            if !record.uniprot_ids.is_empty() {
                table
                    .hgnc_to_uniprot
                    .insert(record.hgnc_id, record.uniprot_ids);
            }
        }
        table
    }

    /// Parses the HGNC complete set. Columns are located by header name and
    /// withdrawn entries are skipped.
    pub fn from_tsv(text: &str) -> Result<Self, KeggError> {
        let mut lines = text.lines();
        let header: Vec<&str> = lines
            .next()
            .ok_or_else(|| KeggError::VocabularyParse("empty table".to_string()))?
            .split('\t')
            .collect();
        let column = |name: &str| {
            header
                .iter()
                .position(|value| value.trim() == name)
                .ok_or_else(|| KeggError::VocabularyParse(format!("missing column {name}")))
        };
        let hgnc_column = column("hgnc_id")?;
        let symbol_column = column("symbol")?;
        let entrez_column = column("entrez_id")?;
        let uniprot_column = column("uniprot_ids").ok();
        let status_column = column("status").ok();

        let records = lines.filter(|line| !line.trim().is_empty()).filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            let get = |index: usize| fields.get(index).map(|value| value.trim()).unwrap_or("");
            if let Some(status) = status_column {
                if get(status).contains("Withdrawn") {
                    return None;
                }
            }
            let hgnc_id = normalize_hgnc_id(get(hgnc_column));
            let symbol = get(symbol_column);
            if hgnc_id.is_empty() || symbol.is_empty() {
                return None;
            }
            let entrez = get(entrez_column);
            let uniprot_ids = uniprot_column
                .map(|index| {
                    get(index)
                        .trim_matches('"')
                        .split('|')
                        .map(str::trim)
                        .filter(|value| !value.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            Some(HgncRecord {
                hgnc_id,
                symbol: symbol.to_string(),
                entrez_id: (!entrez.is_empty()).then(|| entrez.to_string()),
                uniprot_ids,
            })
        });
        let table = Self::from_records(records);
        info!(symbols = table.len(), "built HGNC cross-reference table");
        Ok(table)
    }

    /// Loads the table from a file, or downloads the complete set into the
    /// data directory on first use.
    pub fn ensure<V: VocabularyClient>(
        source: &Source,
        client: &V,
        store: &Store,
    ) -> Result<Self, KeggError> {
        let text = match source {
            Source::File(path) => Store::read_text(path)?,
            Source::Remote => {
                let path = store.listing_path(HGNC_FILE);
                if store.exists(&path) {
                    Store::read_text(&path)?
                } else {
                    info!("downloading HGNC complete set");
                    let text = client.download_complete_set()?;
                    Store::write_bytes_atomic(&path, text.as_bytes())?;
                    text
                }
            }
        };
        Self::from_tsv(&text)
    }

    pub fn len(&self) -> usize {
        self.hgnc_to_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hgnc_to_symbol.is_empty()
    }

    pub fn hgnc_id_for_entrez(&self, entrez_id: &str) -> Option<&str> {
        self.entrez_to_hgnc.get(entrez_id).map(String::as_str)
    }

    pub fn hgnc_id_for_kegg(&self, kegg_id: &KeggEntityId) -> Option<&str> {
        self.hgnc_id_for_entrez(kegg_id.identifier())
    }

    pub fn entrez_for_hgnc_id(&self, hgnc_id: &str) -> Option<&str> {
        self.hgnc_to_entrez
            .get(&normalize_hgnc_id(hgnc_id))
            .map(String::as_str)
    }

    pub fn symbol_for_hgnc_id(&self, hgnc_id: &str) -> Option<&str> {
        self.hgnc_to_symbol
            .get(&normalize_hgnc_id(hgnc_id))
            .map(String::as_str)
    }

    pub fn hgnc_id_for_symbol(&self, symbol: &str) -> Option<&str> {
        self.symbol_to_hgnc.get(symbol).map(String::as_str)
    }

    pub fn uniprot_ids_for_hgnc_id(&self, hgnc_id: &str) -> &[String] {
        self.hgnc_to_uniprot
            .get(&normalize_hgnc_id(hgnc_id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
