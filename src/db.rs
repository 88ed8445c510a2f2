//! SQLite persistence for pathways, proteins, species and their memberships.

use camino::Utf8Path;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{OrganismCode, PathwayId};
use crate::error::KeggError;

pub const SPECIES_TABLE: &str = "kegg_species";
pub const PATHWAY_TABLE: &str = "kegg_pathway";
pub const PROTEIN_TABLE: &str = "kegg_protein";
pub const PROTEIN_PATHWAY_TABLE: &str = "kegg_protein_pathway";

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS kegg_species (
    id INTEGER PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    kegg_id TEXT,
    name TEXT NOT NULL,
    common_name TEXT
);

CREATE TABLE IF NOT EXISTS kegg_pathway (
    id INTEGER PRIMARY KEY,
    identifier TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    definition TEXT,
    species_id INTEGER REFERENCES kegg_species(id)
);
CREATE INDEX IF NOT EXISTS idx_kegg_pathway_name ON kegg_pathway(name);

CREATE TABLE IF NOT EXISTS kegg_protein (
    id INTEGER PRIMARY KEY,
    kegg_id TEXT NOT NULL UNIQUE,
    uniprot_id TEXT,
    hgnc_id TEXT,
    hgnc_symbol TEXT
);
CREATE INDEX IF NOT EXISTS idx_kegg_protein_hgnc_id ON kegg_protein(hgnc_id);
CREATE INDEX IF NOT EXISTS idx_kegg_protein_hgnc_symbol ON kegg_protein(hgnc_symbol);

CREATE TABLE IF NOT EXISTS kegg_protein_pathway (
    protein_id INTEGER NOT NULL REFERENCES kegg_protein(id),
    pathway_id INTEGER NOT NULL REFERENCES kegg_pathway(id),
    PRIMARY KEY (protein_id, pathway_id)
);
CREATE INDEX IF NOT EXISTS idx_kegg_protein_pathway_pathway ON kegg_protein_pathway(pathway_id);
"#;

const DROP_SQL: &str = r#"
DROP TABLE IF EXISTS kegg_protein_pathway;
DROP TABLE IF EXISTS kegg_protein;
DROP TABLE IF EXISTS kegg_pathway;
DROP TABLE IF EXISTS kegg_species;
"#;

/// Attributes resolved for a protein once per population pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProteinAttributes {
    pub uniprot_ids: Vec<String>,
    pub hgnc_id: Option<String>,
    pub hgnc_symbol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Species {
    pub id: i64,
    pub code: String,
    pub kegg_id: Option<String>,
    pub name: String,
    pub common_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pathway {
    pub id: i64,
    pub identifier: String,
    pub name: String,
    pub definition: Option<String>,
    pub species_id: Option<i64>,
}

impl Pathway {
    pub fn url(&self) -> String {
        format!("https://www.kegg.jp/pathway/{}", self.identifier)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Protein {
    pub id: i64,
    pub kegg_id: String,
    pub uniprot_id: Option<String>,
    pub hgnc_id: Option<String>,
    pub hgnc_symbol: Option<String>,
}

impl Protein {
    /// UniProt accessions are stored space-separated.
    pub fn uniprot_ids(&self) -> Vec<&str> {
        self.uniprot_id
            .as_deref()
            .map(|value| value.split_whitespace().collect())
            .unwrap_or_default()
    }
}

/// A row that is looked up by a unique natural key before being inserted.
pub trait Record {
    const TABLE: &'static str;
    const KEY_COLUMN: &'static str;

    fn natural_key(&self) -> &str;
    fn insert(&self, conn: &Connection) -> rusqlite::Result<usize>;
}

#[derive(Debug, Clone)]
pub struct NewSpecies {
    pub code: OrganismCode,
    pub kegg_id: Option<String>,
    pub name: String,
    pub common_name: Option<String>,
}

impl Record for NewSpecies {
    const TABLE: &'static str = SPECIES_TABLE;
    const KEY_COLUMN: &'static str = "code";

    fn natural_key(&self) -> &str {
        self.code.as_str()
    }

    fn insert(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.prepare_cached(
            "INSERT INTO kegg_species (code, kegg_id, name, common_name) VALUES (?1, ?2, ?3, ?4)",
        )?
        .execute(params![
            self.code.as_str(),
            self.kegg_id,
            self.name,
            self.common_name
        ])
    }
}

#[derive(Debug, Clone)]
pub struct NewPathway {
    pub identifier: PathwayId,
    pub name: String,
    pub definition: Option<String>,
    pub species_id: Option<i64>,
}

impl Record for NewPathway {
    const TABLE: &'static str = PATHWAY_TABLE;
    const KEY_COLUMN: &'static str = "identifier";

    fn natural_key(&self) -> &str {
        self.identifier.as_str()
    }

    fn insert(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.prepare_cached(
            "INSERT INTO kegg_pathway (identifier, name, definition, species_id) VALUES (?1, ?2, ?3, ?4)",
        )?
        .execute(params![
            self.identifier.as_str(),
            self.name,
            self.definition,
            self.species_id
        ])
    }
}

#[derive(Debug, Clone)]
pub struct NewProtein {
    pub kegg_id: String,
    pub attributes: ProteinAttributes,
}

impl Record for NewProtein {
    const TABLE: &'static str = PROTEIN_TABLE;
    const KEY_COLUMN: &'static str = "kegg_id";

    fn natural_key(&self) -> &str {
        &self.kegg_id
    }

    fn insert(&self, conn: &Connection) -> rusqlite::Result<usize> {
        let uniprot = (!self.attributes.uniprot_ids.is_empty())
            .then(|| self.attributes.uniprot_ids.join(" "));
        conn.prepare_cached(
            "INSERT INTO kegg_protein (kegg_id, uniprot_id, hgnc_id, hgnc_symbol) VALUES (?1, ?2, ?3, ?4)",
        )?
        .execute(params![
            self.kegg_id,
            uniprot,
            self.attributes.hgnc_id,
            self.attributes.hgnc_symbol
        ])
    }
}

/// Returns the row id for the record's natural key, inserting it when absent.
/// The boolean is `true` when a new row was created. Existing rows are never
/// overwritten.
pub fn get_or_create<R: Record>(conn: &Connection, record: &R) -> Result<(i64, bool), KeggError> {
    let select = format!(
        "SELECT id FROM {} WHERE {} = ?1",
        R::TABLE,
        R::KEY_COLUMN
    );
    let existing: Option<i64> = conn
        .prepare_cached(&select)?
        .query_row(params![record.natural_key()], |row| row.get(0))
        .optional()?;
    if let Some(id) = existing {
        return Ok((id, false));
    }
    record.insert(conn)?;
    Ok((conn.last_insert_rowid(), true))
}

pub fn pathway_row_id(conn: &Connection, id: &PathwayId) -> Result<Option<i64>, KeggError> {
    Ok(conn
        .prepare_cached("SELECT id FROM kegg_pathway WHERE identifier = ?1")?
        .query_row(params![id.as_str()], |row| row.get(0))
        .optional()?)
}

/// Adds a membership edge; re-adding an existing pair is a no-op.
pub fn add_membership(conn: &Connection, protein_id: i64, pathway_id: i64) -> Result<bool, KeggError> {
    let inserted = conn
        .prepare_cached(
            "INSERT OR IGNORE INTO kegg_protein_pathway (protein_id, pathway_id) VALUES (?1, ?2)",
        )?
        .execute(params![protein_id, pathway_id])?;
    Ok(inserted > 0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub species: usize,
    pub pathways: usize,
    pub proteins: usize,
    pub memberships: usize,
}

/// Single-owner handle on the SQLite database.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Utf8Path) -> Result<Self, KeggError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent.as_std_path())
                .map_err(|err| KeggError::Filesystem(err.to_string()))?;
        }
        let conn = Connection::open(path.as_std_path())?;
        Self::initialize(conn)
    }

    pub fn in_memory() -> Result<Self, KeggError> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> Result<Self, KeggError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Self { conn };
        db.create_all()?;
        Ok(db)
    }

    pub fn create_all(&self) -> Result<(), KeggError> {
        self.conn.execute_batch(SCHEMA_SQL)?;
        debug!("schema created");
        Ok(())
    }

    pub fn drop_all(&self) -> Result<(), KeggError> {
        info!("dropping KEGG tables");
        self.conn.execute_batch(DROP_SQL)?;
        Ok(())
    }

    pub fn transaction(&mut self) -> Result<Transaction<'_>, KeggError> {
        Ok(self.conn.transaction()?)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn counts(&self) -> Result<Counts, KeggError> {
        let count = |table: &str| -> Result<usize, KeggError> {
            let value: i64 =
                self.conn
                    .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(value as usize)
        };
        Ok(Counts {
            species: count(SPECIES_TABLE)?,
            pathways: count(PATHWAY_TABLE)?,
            proteins: count(PROTEIN_TABLE)?,
            memberships: count(PROTEIN_PATHWAY_TABLE)?,
        })
    }

    pub fn pathway_by_identifier(&self, id: &PathwayId) -> Result<Option<Pathway>, KeggError> {
        self.pathway_where("identifier", id.as_str())
    }

    pub fn pathway_by_name(&self, name: &str) -> Result<Option<Pathway>, KeggError> {
        self.pathway_where("name", name)
    }

    pub fn pathways(&self) -> Result<Vec<Pathway>, KeggError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, identifier, name, definition, species_id FROM kegg_pathway ORDER BY identifier",
        )?;
        let rows = stmt.query_map([], pathway_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn protein_by_kegg_id(&self, kegg_id: &str) -> Result<Option<Protein>, KeggError> {
        self.protein_where("kegg_id", kegg_id)
    }

    pub fn protein_by_hgnc_id(&self, hgnc_id: &str) -> Result<Option<Protein>, KeggError> {
        self.protein_where("hgnc_id", hgnc_id)
    }

    pub fn protein_by_symbol(&self, symbol: &str) -> Result<Option<Protein>, KeggError> {
        self.protein_where("hgnc_symbol", symbol)
    }

    pub fn proteins_of_pathway(&self, pathway_id: i64) -> Result<Vec<Protein>, KeggError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT p.id, p.kegg_id, p.uniprot_id, p.hgnc_id, p.hgnc_symbol
             FROM kegg_protein p
             JOIN kegg_protein_pathway pp ON pp.protein_id = p.id
             WHERE pp.pathway_id = ?1
             ORDER BY p.kegg_id",
        )?;
        let rows = stmt.query_map(params![pathway_id], protein_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn pathways_of_protein(&self, protein_id: i64) -> Result<Vec<Pathway>, KeggError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT w.id, w.identifier, w.name, w.definition, w.species_id
             FROM kegg_pathway w
             JOIN kegg_protein_pathway pp ON pp.pathway_id = w.id
             WHERE pp.protein_id = ?1
             ORDER BY w.identifier",
        )?;
        let rows = stmt.query_map(params![protein_id], pathway_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn species_by_code(&self, code: &OrganismCode) -> Result<Option<Species>, KeggError> {
        Ok(self
            .conn
            .prepare_cached(
                "SELECT id, code, kegg_id, name, common_name FROM kegg_species WHERE code = ?1",
            )?
            .query_row(params![code.as_str()], |row| {
                Ok(Species {
                    id: row.get(0)?,
                    code: row.get(1)?,
                    kegg_id: row.get(2)?,
                    name: row.get(3)?,
                    common_name: row.get(4)?,
                })
            })
            .optional()?)
    }

    fn pathway_where(&self, column: &str, value: &str) -> Result<Option<Pathway>, KeggError> {
        let sql = format!(
            "SELECT id, identifier, name, definition, species_id FROM kegg_pathway WHERE {column} = ?1 LIMIT 1"
        );
        Ok(self
            .conn
            .prepare_cached(&sql)?
            .query_row(params![value], pathway_from_row)
            .optional()?)
    }

    fn protein_where(&self, column: &str, value: &str) -> Result<Option<Protein>, KeggError> {
        let sql = format!(
            "SELECT id, kegg_id, uniprot_id, hgnc_id, hgnc_symbol FROM kegg_protein WHERE {column} = ?1 ORDER BY id LIMIT 1"
        );
        Ok(self
            .conn
            .prepare_cached(&sql)?
            .query_row(params![value], protein_from_row)
            .optional()?)
    }
}

fn pathway_from_row(row: &Row<'_>) -> rusqlite::Result<Pathway> {
    Ok(Pathway {
        id: row.get(0)?,
        identifier: row.get(1)?,
        name: row.get(2)?,
        definition: row.get(3)?,
        species_id: row.get(4)?,
    })
}

fn protein_from_row(row: &Row<'_>) -> rusqlite::Result<Protein> {
    Ok(Protein {
        id: row.get(0)?,
        kegg_id: row.get(1)?,
        uniprot_id: row.get(2)?,
        hgnc_id: row.get(3)?,
        hgnc_symbol: row.get(4)?,
    })
}
