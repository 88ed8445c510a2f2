use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::KeggError;

pub const PATHWAY_PREFIX: &str = "path:";

/// How protein attributes are resolved during population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// Cross-reference table only, no per-entity network traffic.
    #[default]
    Vocabulary,
    /// Fetch and parse every KEGG gene entry.
    Entities,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Vocabulary => write!(f, "vocabulary"),
            Resolution::Entities => write!(f, "entities"),
        }
    }
}

/// A `prefix:identifier` KEGG entity, e.g. `hsa:5214`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeggEntityId {
    prefix: String,
    identifier: String,
}

impl KeggEntityId {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl fmt::Display for KeggEntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.prefix, self.identifier)
    }
}

impl FromStr for KeggEntityId {
    type Err = KeggError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let (prefix, identifier) = trimmed
            .split_once(':')
            .ok_or_else(|| KeggError::InvalidEntityId(value.to_string()))?;
        let is_valid = !prefix.is_empty()
            && !identifier.is_empty()
            && !trimmed.chars().any(char::is_whitespace)
            && !identifier.contains(':')
            && !identifier.contains('/');
        if !is_valid {
            return Err(KeggError::InvalidEntityId(value.to_string()));
        }
        Ok(Self {
            prefix: prefix.to_string(),
            identifier: identifier.to_string(),
        })
    }
}

impl TryFrom<String> for KeggEntityId {
    type Error = KeggError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KeggEntityId> for String {
    fn from(value: KeggEntityId) -> Self {
        value.to_string()
    }
}

/// Pathway identifier in canonical form, without the `path:` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathwayId(String);

impl PathwayId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Alphabetic organism prefix, `hsa` for `hsa00010`; `None` for reference maps.
    pub fn organism(&self) -> Option<OrganismCode> {
        let code: String = self
            .0
            .chars()
            .take_while(|ch| ch.is_ascii_alphabetic())
            .collect();
        match code.as_str() {
            "" | "map" | "ko" | "ec" | "rn" => None,
            _ => Some(OrganismCode(code)),
        }
    }

    /// Form accepted by `rest.kegg.jp/get`.
    pub fn entity_id(&self) -> String {
        format!("{PATHWAY_PREFIX}{}", self.0)
    }
}

impl fmt::Display for PathwayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PathwayId {
    type Err = KeggError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let stripped = trimmed.strip_prefix(PATHWAY_PREFIX).unwrap_or(trimmed);
        let is_valid = !stripped.is_empty()
            && stripped.chars().all(|ch| ch.is_ascii_alphanumeric())
            && stripped.chars().any(|ch| ch.is_ascii_digit());
        if !is_valid {
            return Err(KeggError::InvalidPathwayId(value.to_string()));
        }
        Ok(Self(stripped.to_string()))
    }
}

/// KEGG organism code such as `hsa` or `mmu`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrganismCode(String);

impl OrganismCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OrganismCode {
    fn default() -> Self {
        Self("hsa".to_string())
    }
}

impl fmt::Display for OrganismCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OrganismCode {
    type Err = KeggError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        let is_valid = (2..=4).contains(&normalized.len())
            && normalized.chars().all(|ch| ch.is_ascii_alphabetic());
        if !is_valid {
            return Err(KeggError::InvalidOrganism(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

/// Strips a `HGNC:` prefix so that identifiers from DBLINKS and from the
/// HGNC table compare equal.
pub fn normalize_hgnc_id(value: &str) -> String {
    let trimmed = value.trim();
    trimmed
        .strip_prefix("HGNC:")
        .or_else(|| trimmed.strip_prefix("hgnc:"))
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}
