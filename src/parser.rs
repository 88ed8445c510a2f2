//! Field-group interpretation of tokenized KEGG entries.
//!
//! Two schemas exist: gene/protein entries (`rest.kegg.jp/get/hsa:5214`) and
//! pathway entries (`rest.kegg.jp/get/path:hsa00010`). Unknown tags are
//! skipped, and a line that does not match its field grammar is logged and
//! dropped without affecting the rest of the entry.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::flatfile::{FieldGroup, group_fields, tokenize};

pub const ORTHOLOGY_PREFIX: &str = "kegg.orthology";
pub const PATHWAY_PREFIX: &str = "kegg.pathway";
pub const DISEASE_PREFIX: &str = "kegg.disease";
pub const COMPOUND_PREFIX: &str = "kegg.compound";
pub const GENE_PREFIX: &str = "ncbigene";
pub const ENZYME_PREFIX: &str = "ec-code";

static NAME_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("valid separator regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Xref {
    pub prefix: String,
    pub identifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedXref {
    pub prefix: String,
    pub identifier: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesName {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drug {
    pub identifier: String,
    pub name: String,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gene {
    pub prefix: String,
    pub identifier: String,
    pub symbol: String,
    pub definition: String,
    pub orthologies: Vec<Xref>,
    pub enzyme_classes: Vec<Xref>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub pubmed_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProteinEntry {
    pub identifier: Option<String>,
    pub definition: Option<String>,
    pub orthology: Vec<NamedXref>,
    pub species: Option<SpeciesName>,
    pub pathways: Vec<NamedXref>,
    pub motifs: Vec<Xref>,
    pub xrefs: Vec<Xref>,
}

impl ProteinEntry {
    pub fn xrefs_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.xrefs
            .iter()
            .filter(move |xref| xref.prefix == prefix)
            .map(|xref| xref.identifier.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathwayEntry {
    pub identifier: Option<String>,
    pub name: Option<String>,
    pub definition: Option<String>,
    pub species: Option<SpeciesName>,
    pub drugs: Vec<Drug>,
    pub diseases: Vec<NamedXref>,
    pub xrefs: Vec<Xref>,
    pub genes: Vec<Gene>,
    pub compounds: Vec<NamedXref>,
    pub references: Vec<Reference>,
    pub related: Vec<NamedXref>,
}

/// Maps DBLINKS database labels to their registry prefix.
pub fn normalize_xref_prefix(prefix: &str) -> &str {
    match prefix {
        "NCBI-GeneID" => "ncbigene",
        "NCBI-ProteinID" => "ncbiprotein",
        "OMIM" => "mim",
        "HGNC" => "hgnc",
        "Ensembl" => "ensembl",
        "Vega" => "vega",
        "Pharos" => "pharos",
        "UniProt" => "uniprot",
        "Pfam" => "pfam",
        other => other,
    }
}

pub fn parse_protein_lines<I, S>(lines: I) -> ProteinEntry
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut entry = ProteinEntry::default();
    for group in group_fields(tokenize(lines)) {
        if group.field.subkey.is_some() {
            continue;
        }
        match group.field.key.as_str() {
            "ENTRY" => entry.identifier = first_word(group.first()),
            "DEFINITION" => entry.definition = Some(group.first().to_string()),
            "ORTHOLOGY" => entry.orthology = parse_named_xrefs(&group, ORTHOLOGY_PREFIX),
            "ORGANISM" => entry.species = parse_gene_species(group.first()),
            "PATHWAY" => entry.pathways = parse_named_xrefs(&group, PATHWAY_PREFIX),
            "MOTIF" => entry.motifs = parse_xrefs(&group),
            "DBLINKS" => entry.xrefs = parse_xrefs(&group),
            _ => {}
        }
    }
    entry
}

pub fn parse_pathway_lines<I, S>(lines: I) -> PathwayEntry
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut entry = PathwayEntry::default();
    for group in group_fields(tokenize(lines)) {
        if group.field.subkey.is_some() {
            continue;
        }
        match group.field.key.as_str() {
            "ENTRY" => entry.identifier = first_word(group.first()),
            "NAME" => entry.name = Some(group.first().to_string()),
            "DESCRIPTION" => entry.definition = Some(group.first().to_string()),
            "DRUG" => entry.drugs = group.values.iter().filter_map(|l| parse_drug(l)).collect(),
            "DISEASE" => entry.diseases = parse_named_xrefs(&group, DISEASE_PREFIX),
            "DBLINKS" => entry.xrefs = parse_xrefs(&group),
            "ORGANISM" => entry.species = parse_species(group.first()),
            "GENE" => entry.genes = group.values.iter().filter_map(|l| parse_gene(l)).collect(),
            "COMPOUND" => entry.compounds = parse_named_xrefs(&group, COMPOUND_PREFIX),
            "REFERENCE" => {
                if let Some(reference) = parse_reference(group.first()) {
                    entry.references.push(reference);
                }
            }
            "REL_PATHWAY" => entry.related = parse_named_xrefs(&group, PATHWAY_PREFIX),
            _ => {}
        }
    }
    entry
}

/// `identifier<2+ spaces>name`
pub fn parse_named_xref(line: &str, prefix: &str) -> Option<NamedXref> {
    let mut parts = NAME_SEPARATOR.splitn(line.trim(), 2);
    let identifier = parts.next().map(str::trim).unwrap_or("");
    let Some(name) = parts.next().map(str::trim) else {
        warn!(line, "could not split name line");
        return None;
    };
    if identifier.is_empty() || name.is_empty() {
        warn!(line, "could not split name line");
        return None;
    }
    Some(NamedXref {
        prefix: prefix.to_string(),
        identifier: identifier.to_string(),
        name: name.to_string(),
    })
}

/// `PREFIX: id1 id2 ...`
pub fn parse_xref_line(line: &str) -> Vec<Xref> {
    let Some((prefix, identifiers)) = line.trim().split_once(':') else {
        warn!(line, "cross-reference line has no prefix");
        return Vec::new();
    };
    let prefix = normalize_xref_prefix(prefix.trim());
    identifiers
        .split_whitespace()
        .map(|identifier| Xref {
            prefix: prefix.to_string(),
            identifier: identifier.to_string(),
        })
        .collect()
}

/// `D00001  Name (DG00001/DG00002)`
pub fn parse_drug(line: &str) -> Option<Drug> {
    let named = parse_named_xref(line, "kegg.drug")?;
    let Some(open) = named.name.rfind('(') else {
        warn!(line, "could not parse drug line");
        return None;
    };
    let name = named.name[..open].trim_end().to_string();
    let notes = named.name[open + 1..]
        .trim_end()
        .trim_end_matches(')')
        .split('/')
        .map(|note| note.trim().to_string())
        .filter(|note| !note.is_empty())
        .collect();
    Some(Drug {
        identifier: named.identifier,
        name,
        notes,
    })
}

/// `5213  PFKM; phosphofructokinase, muscle [KO:K00850] [EC:2.7.1.11]`
pub fn parse_gene(line: &str) -> Option<Gene> {
    let parsed = (|| {
        let (identifier, info) = line.trim().split_once("  ")?;
        let (symbol, info) = info.split_once(';')?;
        let (definition, info) = info.trim_start().split_once(" [")?;
        let (orthology, enzymes) = info.split_once(']')?;
        Some((identifier, symbol, definition, orthology, enzymes))
    })();
    let Some((identifier, symbol, definition, orthology, enzymes)) = parsed else {
        warn!(line, "could not parse gene line");
        return None;
    };

    let orthologies = orthology
        .trim()
        .trim_start_matches("KO:")
        .split_whitespace()
        .map(|code| Xref {
            prefix: ORTHOLOGY_PREFIX.to_string(),
            identifier: code.to_string(),
        })
        .collect();

    let enzyme_block = enzymes.trim().trim_start_matches('[').trim_end_matches(']').trim();
    let enzyme_classes = enzyme_block
        .trim_start_matches("EC:")
        .split_whitespace()
        .map(|code| Xref {
            prefix: ENZYME_PREFIX.to_string(),
            identifier: code.to_string(),
        })
        .collect();

    Some(Gene {
        prefix: GENE_PREFIX.to_string(),
        identifier: identifier.trim().to_string(),
        symbol: symbol.trim().to_string(),
        definition: definition.trim().to_string(),
        orthologies,
        enzyme_classes,
    })
}

fn parse_reference(line: &str) -> Option<Reference> {
    let pubmed_id = line.trim().strip_prefix("PMID:")?;
    Some(Reference {
        pubmed_id: pubmed_id.trim().to_string(),
    })
}

fn parse_species(line: &str) -> Option<SpeciesName> {
    let Some(index) = line.find('(') else {
        warn!(line, "organism line has no parenthesized note");
        return None;
    };
    Some(SpeciesName {
        name: line[..index].trim().to_string(),
    })
}

/// Gene entries lead with the organism code: `hsa  Homo sapiens (human)`.
fn parse_gene_species(line: &str) -> Option<SpeciesName> {
    let name = match line.split_once("  ") {
        Some((code, rest)) if !code.contains(' ') => rest,
        _ => line,
    };
    parse_species(name)
}

fn parse_named_xrefs(group: &FieldGroup, prefix: &str) -> Vec<NamedXref> {
    group
        .values
        .iter()
        .filter_map(|line| parse_named_xref(line, prefix))
        .collect()
}

fn parse_xrefs(group: &FieldGroup) -> Vec<Xref> {
    group.values.iter().flat_map(|line| parse_xref_line(line)).collect()
}

fn first_word(line: &str) -> Option<String> {
    line.split_whitespace().next().map(str::to_string)
}
