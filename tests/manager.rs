use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use kegg_pathway_manager::db::{Database, ProteinAttributes};
use kegg_pathway_manager::domain::{KeggEntityId, OrganismCode, Resolution};
use kegg_pathway_manager::error::KeggError;
use kegg_pathway_manager::kegg::KeggClient;
use kegg_pathway_manager::listing::Source;
use kegg_pathway_manager::manager::{Manager, PopulateOptions, PopulateSummary};
use kegg_pathway_manager::output::JsonOutput;
use kegg_pathway_manager::store::Store;
use kegg_pathway_manager::xref::CrossReferenceTable;

const PENTOSE_PHOSPHATE: &str = "Pentose phosphate pathway - Homo sapiens (human)";
const GLYCOLYSIS: &str = "Glycolysis / Gluconeogenesis - Homo sapiens (human)";

#[derive(Default)]
struct MockKegg {
    failing: Option<&'static str>,
    calls: Mutex<HashMap<String, usize>>,
}

impl MockKegg {
    fn failing(id: &'static str) -> Self {
        Self {
            failing: Some(id),
            ..Self::default()
        }
    }
}

impl KeggClient for MockKegg {
    fn list_pathways(&self, _organism: &OrganismCode) -> Result<String, KeggError> {
        Err(KeggError::KeggHttp("listings come from files".to_string()))
    }

    fn link_pathways(&self, _organism: &OrganismCode) -> Result<String, KeggError> {
        Err(KeggError::KeggHttp("listings come from files".to_string()))
    }

    fn list_organisms(&self) -> Result<String, KeggError> {
        Err(KeggError::KeggHttp("listings come from files".to_string()))
    }

    fn get_entity(&self, id: &KeggEntityId) -> Result<String, KeggError> {
        *self.calls.lock().unwrap().entry(id.to_string()).or_default() += 1;
        if self.failing == Some(id.to_string().as_str()) {
            return Err(KeggError::KeggStatus {
                status: 500,
                message: "internal error".to_string(),
            });
        }
        if id.identifier() == "5214" {
            return Ok(fs::read_to_string(fixture("hsa_5214.txt")).unwrap());
        }
        if id.to_string() == "path:hsa00030" {
            return Ok(fs::read_to_string(fixture("hsa00030.txt")).unwrap());
        }
        Ok(format!(
            "ENTRY       {}              CDS       T01001\nDEFINITION  mock\n///\n",
            id.identifier()
        ))
    }
}

fn fixture(name: &str) -> Utf8PathBuf {
    Utf8PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn xrefs() -> CrossReferenceTable {
    let text = fs::read_to_string(fixture("hgnc_complete_set.txt")).unwrap();
    CrossReferenceTable::from_tsv(&text).unwrap()
}

fn temp_store() -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    (dir, Store::new_with_root(root))
}

fn options(resolution: Resolution) -> PopulateOptions {
    PopulateOptions {
        pathways: Source::File(fixture("pathways.tsv")),
        memberships: Source::File(fixture("protein_pathway.tsv")),
        organisms: Some(Source::File(fixture("organisms.tsv"))),
        resolution,
        ..PopulateOptions::default()
    }
}

fn populated() -> (tempfile::TempDir, Manager<MockKegg>, PopulateSummary) {
    let (dir, store) = temp_store();
    let mut manager = Manager::new(
        Database::in_memory().unwrap(),
        store,
        MockKegg::default(),
        xrefs(),
    );
    let summary = manager
        .populate(&options(Resolution::Vocabulary), &JsonOutput)
        .unwrap();
    (dir, manager, summary)
}

fn symbols(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn pentose_phosphate_gene_set() -> BTreeSet<String> {
    symbols(&[
        "ALDOA", "ALDOB", "ALDOC", "DERA", "G6PD", "GPI", "IDNK", "PFKL", "PFKM", "PFKP", "PGD",
        "PGLS", "PGM1", "RPIA",
    ])
}

#[test]
fn population_counts() {
    let (_dir, manager, summary) = populated();

    assert_eq!(summary.species_created, 3);
    assert_eq!(summary.pathways_created, 9);
    assert_eq!(summary.proteins_created, 29);
    assert_eq!(summary.proteins_resolved, 24);
    assert_eq!(summary.memberships_created, 30);
    // hsa04066 is not in the pathway listing
    assert_eq!(summary.memberships_skipped, 1);
    assert!(summary.failed.is_empty());

    let counts = manager.summarize().unwrap();
    assert_eq!(counts.species, 3);
    assert_eq!(counts.pathways, 9);
    assert_eq!(counts.proteins, 29);
    assert_eq!(counts.memberships, 30);
}

#[test]
fn pathway_membership_sizes() {
    let (_dir, manager, _) = populated();

    let pentose = manager.get_pathway_by_id("hsa00030").unwrap().unwrap();
    assert_eq!(pentose.name, PENTOSE_PHOSPHATE);
    assert_eq!(manager.get_proteins(&pentose).unwrap().len(), 14);

    let glycolysis = manager.get_pathway_by_id("hsa00010").unwrap().unwrap();
    assert_eq!(manager.get_proteins(&glycolysis).unwrap().len(), 16);

    let citrate = manager.get_pathway_by_id("hsa00020").unwrap().unwrap();
    assert!(manager.get_proteins(&citrate).unwrap().is_empty());
}

#[test]
fn path_prefix_is_normalized_on_lookup() {
    let (_dir, manager, _) = populated();
    let bare = manager.get_pathway_by_id("hsa00030").unwrap().unwrap();
    let prefixed = manager.get_pathway_by_id("path:hsa00030").unwrap().unwrap();
    assert_eq!(bare, prefixed);
    assert_eq!(bare.identifier, "hsa00030");
    assert!(manager.get_pathway_by_id("hsa99999").unwrap().is_none());
    assert_matches!(
        manager.get_pathway_by_id("not a pathway"),
        Err(KeggError::InvalidPathwayId(_))
    );
}

#[test]
fn pathways_are_attached_to_species() {
    let (_dir, manager, _) = populated();
    let human = manager
        .database()
        .species_by_code(&"hsa".parse().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(human.name, "Homo sapiens");
    assert_eq!(human.common_name.as_deref(), Some("human"));
    assert_eq!(human.kegg_id.as_deref(), Some("T01001"));

    let pentose = manager.get_pathway_by_name(PENTOSE_PHOSPHATE).unwrap().unwrap();
    assert_eq!(pentose.species_id, Some(human.id));
}

#[test]
fn protein_pathways() {
    let (_dir, manager, _) = populated();
    let pfkp = manager.get_protein_by_kegg_id("hsa:5214").unwrap().unwrap();
    assert_eq!(pfkp.hgnc_symbol.as_deref(), Some("PFKP"));
    assert_eq!(pfkp.hgnc_id.as_deref(), Some("8878"));
    assert_eq!(pfkp.uniprot_ids(), ["Q01813", "A0A024R0Y4"]);

    let pathways = manager.get_pathways(&pfkp).unwrap();
    let identifiers: BTreeSet<&str> = pathways
        .iter()
        .map(|pathway| pathway.identifier.as_str())
        .collect();
    assert_eq!(identifiers, BTreeSet::from(["hsa00010", "hsa00030"]));
    let names: BTreeSet<&str> = pathways.iter().map(|pathway| pathway.name.as_str()).collect();
    assert_eq!(names, BTreeSet::from([GLYCOLYSIS, PENTOSE_PHOSPHATE]));
}

#[test]
fn protein_lookups() {
    let (_dir, manager, _) = populated();
    let by_hgnc = manager.get_protein_by_hgnc_id("HGNC:8878").unwrap().unwrap();
    let by_bare_hgnc = manager.get_protein_by_hgnc_id("8878").unwrap().unwrap();
    let by_symbol = manager.get_protein_by_hgnc_symbol("PFKP").unwrap().unwrap();
    assert_eq!(by_hgnc, by_bare_hgnc);
    assert_eq!(by_hgnc, by_symbol);
    assert_eq!(by_hgnc.kegg_id, "hsa:5214");

    // present in KEGG, absent from the HGNC table
    let hk3 = manager.get_protein_by_kegg_id("hsa:3101").unwrap().unwrap();
    assert!(hk3.hgnc_symbol.is_none());
    assert!(hk3.hgnc_id.is_none());
    assert!(manager.get_protein_by_hgnc_symbol("HK3").unwrap().is_none());
}

#[test]
fn query_single_symbol() {
    let (_dir, manager, _) = populated();
    let enriched = manager.query_gene_set(["PFKP"]).unwrap();

    assert_eq!(
        enriched.keys().map(String::as_str).collect::<Vec<_>>(),
        ["hsa00010", "hsa00030"]
    );
    let pentose = &enriched["hsa00030"];
    assert_eq!(pentose.pathway_id, "hsa00030");
    assert_eq!(pentose.pathway_name, PENTOSE_PHOSPHATE);
    assert_eq!(pentose.mapped_proteins, 1);
    assert_eq!(pentose.pathway_size, 14);
    assert_eq!(pentose.pathway_gene_set, pentose_phosphate_gene_set());

    // five glycolysis genes have no HGNC symbol in the table
    let glycolysis = &enriched["hsa00010"];
    assert_eq!(glycolysis.mapped_proteins, 1);
    assert_eq!(glycolysis.pathway_size, 11);
}

#[test]
fn query_multiple_symbols() {
    let (_dir, manager, _) = populated();

    let enriched = manager.query_gene_set(["PFKP", "GPI"]).unwrap();
    assert_eq!(enriched["hsa00010"].mapped_proteins, 1);
    assert_eq!(enriched["hsa00030"].mapped_proteins, 2);
    assert_eq!(enriched["hsa00030"].pathway_size, 14);
    assert_eq!(
        enriched["hsa00030"].pathway_gene_set,
        pentose_phosphate_gene_set()
    );

    let enriched = manager.query_gene_set(["PFKP", "PGD"]).unwrap();
    assert_eq!(enriched["hsa00010"].mapped_proteins, 1);
    assert_eq!(enriched["hsa00030"].mapped_proteins, 2);
}

#[test]
fn query_ignores_unknown_and_repeated_symbols() {
    let (_dir, manager, _) = populated();
    assert!(manager.query_gene_set(["NOTAGENE"]).unwrap().is_empty());
    assert!(manager.query_gene_set(Vec::<String>::new()).unwrap().is_empty());

    let enriched = manager
        .query_gene_set(["PFKP", "NOTAGENE", "PFKP"])
        .unwrap();
    assert_eq!(enriched.len(), 2);
    assert_eq!(enriched["hsa00030"].mapped_proteins, 1);
}

#[test]
fn repopulating_is_idempotent() {
    let (_dir, mut manager, _) = populated();
    let before = manager.summarize().unwrap();

    let summary = manager
        .populate(&options(Resolution::Vocabulary), &JsonOutput)
        .unwrap();
    assert_eq!(summary.species_created, 0);
    assert_eq!(summary.pathways_created, 0);
    assert_eq!(summary.pathways_existing, 9);
    assert_eq!(summary.proteins_created, 0);
    assert_eq!(summary.memberships_created, 0);
    assert_eq!(manager.summarize().unwrap(), before);
}

#[test]
fn gene_set_export() {
    let (_dir, manager, _) = populated();
    let gene_sets = manager.export_gene_sets().unwrap();
    assert_eq!(gene_sets.len(), 9);
    assert_eq!(gene_sets[PENTOSE_PHOSPHATE], pentose_phosphate_gene_set());
    assert!(gene_sets["Citrate cycle (TCA cycle) - Homo sapiens (human)"].is_empty());

    let records = manager.gene_sets().unwrap();
    assert_eq!(records.len(), 9);
    assert_eq!(records[0].identifier, "hsa00010");
    assert_eq!(records[0].url, "https://www.kegg.jp/pathway/hsa00010");
    assert_eq!(records[0].symbols.len(), 11);
}

#[test]
fn drop_and_recreate() {
    let (_dir, manager, _) = populated();
    manager.drop_all().unwrap();
    manager.create_all().unwrap();
    let counts = manager.summarize().unwrap();
    assert_eq!(counts.pathways, 0);
    assert_eq!(counts.proteins, 0);
    assert_eq!(counts.memberships, 0);
}

#[test]
fn entity_resolution_fetches_each_protein_once() {
    let (_dir, store) = temp_store();
    let mut manager = Manager::new(
        Database::in_memory().unwrap(),
        store.clone(),
        MockKegg::failing("hsa:2821"),
        xrefs(),
    );
    let summary = manager
        .populate(&options(Resolution::Entities), &JsonOutput)
        .unwrap();

    let calls = manager_calls(&manager);
    assert_eq!(calls.len(), 29);
    assert!(calls.values().all(|count| *count == 1));

    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].id, "hsa:2821");
    assert_eq!(summary.proteins_created, 29);

    let gpi = manager.get_protein_by_kegg_id("hsa:2821").unwrap().unwrap();
    assert!(gpi.hgnc_symbol.is_none());

    // HGNC id and UniProt accessions come from the entry's DBLINKS
    let pfkp = manager.get_protein_by_hgnc_symbol("PFKP").unwrap().unwrap();
    assert_eq!(pfkp.hgnc_id.as_deref(), Some("8878"));
    assert_eq!(pfkp.uniprot_ids(), ["Q01813", "A0A024R0Y4"]);

    // entries without DBLINKS fall back to the cross-reference table
    let pgd = manager.get_protein_by_kegg_id("hsa:5226").unwrap().unwrap();
    assert_eq!(pgd.hgnc_symbol.as_deref(), Some("PGD"));

    let metadata: BTreeMap<String, ProteinAttributes> =
        Store::read_json(&store.metadata_path()).unwrap();
    assert_eq!(metadata.len(), 28);
    assert!(!metadata.contains_key("hsa:2821"));
}

#[test]
fn metadata_cache_replaces_fetching() {
    let (_dir, store) = temp_store();
    let mut first = Manager::new(
        Database::in_memory().unwrap(),
        store.clone(),
        MockKegg::default(),
        xrefs(),
    );
    first
        .populate(&options(Resolution::Entities), &JsonOutput)
        .unwrap();

    let mut second = Manager::new(
        Database::in_memory().unwrap(),
        store,
        MockKegg::default(),
        xrefs(),
    );
    let cached = PopulateOptions {
        metadata_exists: true,
        ..options(Resolution::Entities)
    };
    let summary = second.populate(&cached, &JsonOutput).unwrap();
    assert!(manager_calls(&second).is_empty());
    assert_eq!(summary.proteins_created, 29);
    assert_eq!(
        second.get_protein_by_hgnc_symbol("PFKP").unwrap(),
        first.get_protein_by_hgnc_symbol("PFKP").unwrap()
    );
}

#[test]
fn missing_metadata_file_is_fatal() {
    let (_dir, store) = temp_store();
    let mut manager = Manager::new(
        Database::in_memory().unwrap(),
        store,
        MockKegg::default(),
        xrefs(),
    );
    let cached = PopulateOptions {
        metadata_exists: true,
        ..options(Resolution::Entities)
    };
    let err = manager.populate(&cached, &JsonOutput).unwrap_err();
    assert_matches!(err, KeggError::StaleCache { .. });
    assert_eq!(manager.summarize().unwrap().proteins, 0);
}

#[test]
fn incomplete_metadata_file_is_fatal() {
    let (_dir, store) = temp_store();
    let mut first = Manager::new(
        Database::in_memory().unwrap(),
        store.clone(),
        MockKegg::failing("hsa:2821"),
        xrefs(),
    );
    first
        .populate(&options(Resolution::Entities), &JsonOutput)
        .unwrap();

    let mut second = Manager::new(
        Database::in_memory().unwrap(),
        store,
        MockKegg::default(),
        xrefs(),
    );
    let cached = PopulateOptions {
        metadata_exists: true,
        ..options(Resolution::Entities)
    };
    let err = second.populate(&cached, &JsonOutput).unwrap_err();
    assert_matches!(err, KeggError::StaleCache { ref reason, .. } if reason.contains("hsa:2821"));
}

#[test]
fn vocabulary_resolution_honours_metadata_cache() {
    let (_dir, store) = temp_store();
    let cached = PopulateOptions {
        metadata_exists: true,
        ..options(Resolution::Vocabulary)
    };
    let mut empty = Manager::new(
        Database::in_memory().unwrap(),
        store.clone(),
        MockKegg::default(),
        xrefs(),
    );
    assert_matches!(
        empty.populate(&cached, &JsonOutput),
        Err(KeggError::StaleCache { .. })
    );

    let mut first = Manager::new(
        Database::in_memory().unwrap(),
        store.clone(),
        MockKegg::default(),
        xrefs(),
    );
    first
        .populate(&options(Resolution::Vocabulary), &JsonOutput)
        .unwrap();

    let mut second = Manager::new(
        Database::in_memory().unwrap(),
        store,
        MockKegg::default(),
        CrossReferenceTable::default(),
    );
    let summary = second.populate(&cached, &JsonOutput).unwrap();
    assert_eq!(summary.proteins_resolved, 24);
    assert_eq!(
        second.get_protein_by_hgnc_symbol("PFKP").unwrap(),
        first.get_protein_by_hgnc_symbol("PFKP").unwrap()
    );
}

#[test]
fn unreadable_metadata_is_kept() {
    let (_dir, store) = temp_store();
    fs::write(store.metadata_path(), "not json").unwrap();
    let mut manager = Manager::new(
        Database::in_memory().unwrap(),
        store.clone(),
        MockKegg::default(),
        xrefs(),
    );

    let err = manager
        .populate(&options(Resolution::Entities), &JsonOutput)
        .unwrap_err();

    assert_matches!(err, KeggError::StaleCache { ref reason, .. } if reason.contains("unreadable"));
    assert_eq!(fs::read_to_string(store.metadata_path()).unwrap(), "not json");
    assert_eq!(manager.summarize().unwrap().proteins, 0);
}

#[test]
fn pathway_definitions_come_from_entries() {
    let (_dir, store) = temp_store();
    let mut manager = Manager::new(
        Database::in_memory().unwrap(),
        store,
        MockKegg::failing("path:hsa00010"),
        xrefs(),
    );
    let with_definitions = PopulateOptions {
        pathway_definitions: true,
        ..options(Resolution::Vocabulary)
    };
    let summary = manager.populate(&with_definitions, &JsonOutput).unwrap();

    let pentose = manager.get_pathway_by_id("hsa00030").unwrap().unwrap();
    assert!(
        pentose
            .definition
            .as_deref()
            .unwrap()
            .starts_with("The pentose phosphate pathway")
    );
    let glycolysis = manager.get_pathway_by_id("hsa00010").unwrap().unwrap();
    assert!(glycolysis.definition.is_none());

    assert_eq!(summary.pathways_created, 9);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].id, "path:hsa00010");
    let calls = manager_calls(&manager);
    assert_eq!(calls.keys().filter(|id| id.starts_with("path:")).count(), 9);
}

#[test]
fn pathway_definitions_are_opt_in() {
    let (_dir, manager, _) = populated();
    assert!(manager_calls(&manager).is_empty());
    let pentose = manager.get_pathway_by_id("hsa00030").unwrap().unwrap();
    assert!(pentose.definition.is_none());
}

fn manager_calls(manager: &Manager<MockKegg>) -> HashMap<String, usize> {
    manager.client().calls.lock().unwrap().clone()
}
