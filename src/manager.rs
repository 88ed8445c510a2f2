use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::{Duration, Instant};

use camino::Utf8Path;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::db::{
    self, Counts, Database, NewPathway, NewProtein, NewSpecies, Pathway, Protein,
    ProteinAttributes,
};
use crate::domain::{KeggEntityId, OrganismCode, PathwayId, Resolution, normalize_hgnc_id};
use crate::error::KeggError;
use crate::export::GeneSet;
use crate::fetcher::{DEFAULT_POOL_SIZE, EntityFetcher};
use crate::graph::{
    BelGraph, BelNode, Function, HGNC_NAMESPACE, KEGG_GENES_NAMESPACE, KEGG_NAMESPACE,
};
use crate::kegg::KeggClient;
use crate::listing::{self, ListingKind, Membership, PathwayRecord, Source};
use crate::parser::{parse_pathway_lines, parse_protein_lines};
use crate::store::Store;
use crate::xref::CrossReferenceTable;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Forwards progress to the tracing subscriber.
pub struct LogSink;

impl ProgressSink for LogSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
            None => info!("{}", event.message),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PopulateOptions {
    pub pathways: Source,
    pub memberships: Source,
    pub organisms: Option<Source>,
    pub organism: OrganismCode,
    pub resolution: Resolution,
    /// The caller asserts that the protein metadata file is complete.
    pub metadata_exists: bool,
    /// Fetch each pathway entry to fill in its definition.
    pub pathway_definitions: bool,
    pub thread_pool_size: usize,
}

impl Default for PopulateOptions {
    fn default() -> Self {
        Self {
            pathways: Source::Remote,
            memberships: Source::Remote,
            organisms: None,
            organism: OrganismCode::default(),
            resolution: Resolution::default(),
            metadata_exists: false,
            pathway_definitions: false,
            thread_pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedFetch {
    pub id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PopulateSummary {
    pub species_created: usize,
    pub pathways_created: usize,
    pub pathways_existing: usize,
    pub proteins_created: usize,
    pub proteins_resolved: usize,
    pub memberships_created: usize,
    pub memberships_skipped: usize,
    pub failed: Vec<FailedFetch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathwayEnrichment {
    pub pathway_id: String,
    pub pathway_name: String,
    pub mapped_proteins: usize,
    pub pathway_size: usize,
    pub pathway_gene_set: BTreeSet<String>,
}

/// Owns the database and answers population, lookup and enrichment requests.
/// Not meant to be shared between concurrent population calls.
pub struct Manager<C: KeggClient> {
    db: Database,
    store: Store,
    fetcher: EntityFetcher<C>,
    xrefs: CrossReferenceTable,
}

impl<C: KeggClient> Manager<C> {
    pub fn new(db: Database, store: Store, client: C, xrefs: CrossReferenceTable) -> Self {
        let fetcher = EntityFetcher::new(client, store.clone());
        Self {
            db,
            store,
            fetcher,
            xrefs,
        }
    }

    pub fn client(&self) -> &C {
        self.fetcher.client()
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn xrefs(&self) -> &CrossReferenceTable {
        &self.xrefs
    }

    pub fn create_all(&self) -> Result<(), KeggError> {
        self.db.create_all()
    }

    pub fn drop_all(&self) -> Result<(), KeggError> {
        self.db.drop_all()
    }

    pub fn summarize(&self) -> Result<Counts, KeggError> {
        self.db.counts()
    }

    pub fn populate(
        &mut self,
        options: &PopulateOptions,
        sink: &dyn ProgressSink,
    ) -> Result<PopulateSummary, KeggError> {
        let start = Instant::now();
        let mut summary = PopulateSummary::default();
        self.populate_pathways(options, &mut summary, sink)?;
        self.populate_proteins(options, &mut summary, sink)?;
        sink.event(ProgressEvent {
            message: format!(
                "phase=Done; {} pathways, {} proteins, {} memberships",
                summary.pathways_created, summary.proteins_created, summary.memberships_created
            ),
            elapsed: Some(start.elapsed()),
        });
        Ok(summary)
    }

    /// Species (when an organism listing is given) and pathways, committed once.
    pub fn populate_pathways(
        &mut self,
        options: &PopulateOptions,
        summary: &mut PopulateSummary,
        sink: &dyn ProgressSink,
    ) -> Result<(), KeggError> {
        let client = self.fetcher.client();
        let organisms = match &options.organisms {
            Some(source) => listing::parse_organisms(&listing::ensure_listing(
                source,
                ListingKind::Organisms,
                &options.organism,
                client,
                &self.store,
            )?)?,
            None => Vec::new(),
        };
        let pathways = listing::parse_pathways(&listing::ensure_listing(
            &options.pathways,
            ListingKind::Pathways,
            &options.organism,
            client,
            &self.store,
        )?)?;
        sink.event(ProgressEvent {
            message: format!("phase=Pathways; {} pathways listed", pathways.len()),
            elapsed: None,
        });
        let definitions = if options.pathway_definitions {
            self.fetch_definitions(&pathways, options.thread_pool_size, summary, sink)?
        } else {
            HashMap::new()
        };

        let tx = self.db.transaction()?;
        let mut species_ids: HashMap<OrganismCode, i64> = HashMap::new();
        for organism in organisms {
            let (id, created) = db::get_or_create(
                &tx,
                &NewSpecies {
                    code: organism.code.clone(),
                    kegg_id: Some(organism.kegg_id),
                    name: organism.name,
                    common_name: organism.common_name,
                },
            )?;
            summary.species_created += usize::from(created);
            species_ids.insert(organism.code, id);
        }

        for record in pathways {
            let species_id = record
                .id
                .organism()
                .and_then(|code| species_ids.get(&code).copied());
            let definition = definitions.get(record.id.as_str()).cloned();
            let (_, created) = db::get_or_create(
                &tx,
                &NewPathway {
                    identifier: record.id,
                    name: record.name,
                    definition,
                    species_id,
                },
            )?;
            if created {
                summary.pathways_created += 1;
            } else {
                summary.pathways_existing += 1;
            }
        }
        tx.commit()?;
        info!(
            created = summary.pathways_created,
            existing = summary.pathways_existing,
            "pathways committed"
        );
        Ok(())
    }

    /// DESCRIPTION of every listed pathway, keyed by canonical identifier.
    fn fetch_definitions(
        &self,
        pathways: &[PathwayRecord],
        pool_size: usize,
        summary: &mut PopulateSummary,
        sink: &dyn ProgressSink,
    ) -> Result<HashMap<String, String>, KeggError> {
        let ids = pathways
            .iter()
            .map(|record| record.id.entity_id().parse())
            .collect::<Result<Vec<KeggEntityId>, _>>()?;
        let mut definitions = HashMap::with_capacity(ids.len());
        for outcome in self.fetcher.fetch_all(&ids, pool_size, sink) {
            match outcome.result {
                Ok(lines) => {
                    if let Some(definition) = parse_pathway_lines(&lines).definition {
                        definitions.insert(outcome.id.identifier().to_string(), definition);
                    }
                }
                Err(err) => summary.failed.push(FailedFetch {
                    id: outcome.id.to_string(),
                    message: err.to_string(),
                }),
            }
        }
        Ok(definitions)
    }

    /// Proteins and memberships. Attributes are resolved once per distinct
    /// protein before anything is written; everything is committed once.
    pub fn populate_proteins(
        &mut self,
        options: &PopulateOptions,
        summary: &mut PopulateSummary,
        sink: &dyn ProgressSink,
    ) -> Result<(), KeggError> {
        let memberships = listing::parse_memberships(&listing::ensure_listing(
            &options.memberships,
            ListingKind::Memberships,
            &options.organism,
            self.fetcher.client(),
            &self.store,
        )?)?;
        let proteins: IndexSet<KeggEntityId> = memberships
            .iter()
            .map(|membership| membership.protein.clone())
            .collect();
        sink.event(ProgressEvent {
            message: format!(
                "phase=Proteins; {} memberships, {} distinct proteins",
                memberships.len(),
                proteins.len()
            ),
            elapsed: None,
        });

        let attributes = self.resolve_attributes(&proteins, options, summary, sink)?;
        summary.proteins_resolved = attributes
            .values()
            .filter(|attributes| attributes.hgnc_id.is_some())
            .count();

        let tx = self.db.transaction()?;
        let mut protein_ids: HashMap<&KeggEntityId, i64> = HashMap::with_capacity(proteins.len());
        for protein in &proteins {
            let (id, created) = db::get_or_create(
                &tx,
                &NewProtein {
                    kegg_id: protein.to_string(),
                    attributes: attributes.get(protein).cloned().unwrap_or_default(),
                },
            )?;
            summary.proteins_created += usize::from(created);
            protein_ids.insert(protein, id);
        }

        let mut pathway_ids: HashMap<&PathwayId, Option<i64>> = HashMap::new();
        for Membership { protein, pathway } in &memberships {
            let pathway_id = match pathway_ids.get(pathway).copied() {
                Some(id) => id,
                None => {
                    let id = db::pathway_row_id(&tx, pathway)?;
                    pathway_ids.insert(pathway, id);
                    id
                }
            };
            let Some(pathway_id) = pathway_id else {
                warn!(%protein, %pathway, "membership references an unknown pathway; skipping");
                summary.memberships_skipped += 1;
                continue;
            };
            let Some(protein_id) = protein_ids.get(protein) else {
                warn!(%protein, %pathway, "membership references an unknown protein; skipping");
                summary.memberships_skipped += 1;
                continue;
            };
            if db::add_membership(&tx, *protein_id, pathway_id)? {
                summary.memberships_created += 1;
            }
        }
        tx.commit()?;
        info!(
            proteins = summary.proteins_created,
            memberships = summary.memberships_created,
            skipped = summary.memberships_skipped,
            "proteins committed"
        );
        Ok(())
    }

    fn resolve_attributes(
        &self,
        proteins: &IndexSet<KeggEntityId>,
        options: &PopulateOptions,
        summary: &mut PopulateSummary,
        sink: &dyn ProgressSink,
    ) -> Result<HashMap<KeggEntityId, ProteinAttributes>, KeggError> {
        if options.metadata_exists {
            return self.load_metadata(proteins);
        }
        let resolved = match options.resolution {
            Resolution::Vocabulary => proteins
                .iter()
                .map(|protein| (protein.clone(), self.attributes_from_vocabulary(protein)))
                .collect(),
            Resolution::Entities => {
                let ids: Vec<KeggEntityId> = proteins.iter().cloned().collect();
                let outcomes = self.fetcher.fetch_all(&ids, options.thread_pool_size, sink);
                let mut resolved = HashMap::with_capacity(outcomes.len());
                for outcome in outcomes {
                    match outcome.result {
                        Ok(lines) => {
                            let entry = parse_protein_lines(&lines);
                            let attributes = self.attributes_from_entry(&outcome.id, &entry);
                            resolved.insert(outcome.id, attributes);
                        }
                        Err(err) => summary.failed.push(FailedFetch {
                            id: outcome.id.to_string(),
                            message: err.to_string(),
                        }),
                    }
                }
                resolved
            }
        };
        self.save_metadata(&resolved)?;
        Ok(resolved)
    }

    fn attributes_from_vocabulary(&self, protein: &KeggEntityId) -> ProteinAttributes {
        let Some(hgnc_id) = self.xrefs.hgnc_id_for_kegg(protein) else {
            debug!(%protein, "no HGNC mapping");
            return ProteinAttributes::default();
        };
        ProteinAttributes {
            uniprot_ids: self.xrefs.uniprot_ids_for_hgnc_id(hgnc_id).to_vec(),
            hgnc_id: Some(hgnc_id.to_string()),
            hgnc_symbol: self.xrefs.symbol_for_hgnc_id(hgnc_id).map(str::to_string),
        }
    }

    fn attributes_from_entry(
        &self,
        protein: &KeggEntityId,
        entry: &crate::parser::ProteinEntry,
    ) -> ProteinAttributes {
        let hgnc_id = entry
            .xrefs_with_prefix("hgnc")
            .next()
            .map(normalize_hgnc_id)
            .or_else(|| self.xrefs.hgnc_id_for_kegg(protein).map(str::to_string));
        let hgnc_symbol = hgnc_id
            .as_deref()
            .and_then(|id| self.xrefs.symbol_for_hgnc_id(id))
            .map(str::to_string);
        if hgnc_symbol.is_none() {
            debug!(%protein, "no HGNC symbol");
        }
        ProteinAttributes {
            uniprot_ids: entry
                .xrefs_with_prefix("uniprot")
                .map(str::to_string)
                .collect(),
            hgnc_id,
            hgnc_symbol,
        }
    }

    fn load_metadata(
        &self,
        proteins: &IndexSet<KeggEntityId>,
    ) -> Result<HashMap<KeggEntityId, ProteinAttributes>, KeggError> {
        let path = self.store.metadata_path();
        if !self.store.exists(&path) {
            return Err(KeggError::StaleCache {
                path: path.into_std_path_buf(),
                reason: "metadata file does not exist".to_string(),
            });
        }
        let mut cached = read_metadata(&path)?;
        proteins
            .iter()
            .map(|protein| match cached.remove(&protein.to_string()) {
                Some(attributes) => Ok((protein.clone(), attributes)),
                None => Err(KeggError::StaleCache {
                    path: path.clone().into_std_path_buf(),
                    reason: format!("no entry for {protein}"),
                }),
            })
            .collect()
    }

    fn save_metadata(
        &self,
        resolved: &HashMap<KeggEntityId, ProteinAttributes>,
    ) -> Result<(), KeggError> {
        let path = self.store.metadata_path();
        let mut cached = if self.store.exists(&path) {
            read_metadata(&path)?
        } else {
            BTreeMap::new()
        };
        cached.extend(
            resolved
                .iter()
                .map(|(id, attributes)| (id.to_string(), attributes.clone())),
        );
        Store::write_json(&path, &cached)?;
        info!(%path, entries = cached.len(), "protein metadata written");
        Ok(())
    }

    pub fn get_pathway_by_id(&self, identifier: &str) -> Result<Option<Pathway>, KeggError> {
        let id: PathwayId = identifier.parse()?;
        self.db.pathway_by_identifier(&id)
    }

    pub fn get_pathway_by_name(&self, name: &str) -> Result<Option<Pathway>, KeggError> {
        self.db.pathway_by_name(name)
    }

    pub fn get_protein_by_kegg_id(&self, kegg_id: &str) -> Result<Option<Protein>, KeggError> {
        let id: KeggEntityId = kegg_id.parse()?;
        self.db.protein_by_kegg_id(&id.to_string())
    }

    pub fn get_protein_by_hgnc_id(&self, hgnc_id: &str) -> Result<Option<Protein>, KeggError> {
        self.db.protein_by_hgnc_id(&normalize_hgnc_id(hgnc_id))
    }

    pub fn get_protein_by_hgnc_symbol(&self, symbol: &str) -> Result<Option<Protein>, KeggError> {
        self.db.protein_by_symbol(symbol.trim())
    }

    pub fn get_proteins(&self, pathway: &Pathway) -> Result<Vec<Protein>, KeggError> {
        self.db.proteins_of_pathway(pathway.id)
    }

    pub fn get_pathways(&self, protein: &Protein) -> Result<Vec<Pathway>, KeggError> {
        self.db.pathways_of_protein(protein.id)
    }

    /// Symbols of the pathway's proteins; proteins without a symbol are left out.
    pub fn get_gene_set(&self, pathway: &Pathway) -> Result<BTreeSet<String>, KeggError> {
        Ok(self
            .get_proteins(pathway)?
            .into_iter()
            .filter_map(|protein| protein.hgnc_symbol)
            .collect())
    }

    /// Pathways touched by the given HGNC symbols, keyed by pathway identifier
    /// in the order the matched proteins reach them.
    pub fn query_gene_set<I, S>(
        &self,
        symbols: I,
    ) -> Result<IndexMap<String, PathwayEnrichment>, KeggError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut proteins: IndexMap<i64, Protein> = IndexMap::new();
        for symbol in symbols {
            match self.get_protein_by_hgnc_symbol(symbol.as_ref())? {
                Some(protein) => {
                    proteins.entry(protein.id).or_insert(protein);
                }
                None => debug!(symbol = symbol.as_ref(), "symbol not in store"),
            }
        }

        let mut results: IndexMap<String, PathwayEnrichment> = IndexMap::new();
        for protein in proteins.values() {
            for pathway in self.get_pathways(protein)? {
                if let Some(entry) = results.get_mut(&pathway.identifier) {
                    entry.mapped_proteins += 1;
                    continue;
                }
                let members = self.get_proteins(&pathway)?;
                let pathway_size = members
                    .iter()
                    .filter(|member| member.hgnc_symbol.is_some())
                    .count();
                let pathway_gene_set = members
                    .into_iter()
                    .filter_map(|member| member.hgnc_symbol)
                    .collect();
                results.insert(
                    pathway.identifier.clone(),
                    PathwayEnrichment {
                        pathway_id: pathway.identifier,
                        pathway_name: pathway.name,
                        mapped_proteins: 1,
                        pathway_size,
                        pathway_gene_set,
                    },
                );
            }
        }
        Ok(results)
    }

    /// Pathway name to the symbols of its proteins, for every pathway.
    pub fn export_gene_sets(&self) -> Result<BTreeMap<String, BTreeSet<String>>, KeggError> {
        let mut gene_sets = BTreeMap::new();
        for pathway in self.db.pathways()? {
            let symbols = self.get_gene_set(&pathway)?;
            gene_sets.insert(pathway.name, symbols);
        }
        Ok(gene_sets)
    }

    /// Every pathway with its identity and gene set, ordered by identifier.
    pub fn gene_sets(&self) -> Result<Vec<GeneSet>, KeggError> {
        self.db
            .pathways()?
            .into_iter()
            .map(|pathway| {
                Ok(GeneSet {
                    symbols: self.get_gene_set(&pathway)?,
                    url: pathway.url(),
                    name: pathway.name,
                    identifier: pathway.identifier,
                })
            })
            .collect()
    }

    /// Pathway node plus one `partOf` edge per member protein.
    pub fn get_pathway_graph(&self, identifier: &str) -> Result<BelGraph, KeggError> {
        let pathway = self
            .get_pathway_by_id(identifier)?
            .ok_or_else(|| KeggError::PathwayNotFound(identifier.to_string()))?;
        let mut graph = BelGraph::new(&pathway.name);
        let pathway_node = pathway_node(&pathway);
        graph.add_node(pathway_node.clone());
        for protein in self.get_proteins(&pathway)? {
            graph.add_part_of(protein_node(&protein), pathway_node.clone());
        }
        Ok(graph)
    }

    /// Adds member proteins to every KEGG biological process in the graph.
    /// Returns the number of new edges.
    pub fn enrich_pathways(&self, graph: &mut BelGraph) -> Result<usize, KeggError> {
        let targets: Vec<BelNode> = graph
            .nodes()
            .filter(|node| {
                node.function == Function::BiologicalProcess && node.namespace == KEGG_NAMESPACE
            })
            .cloned()
            .collect();
        let mut added = 0;
        for node in targets {
            let Some(pathway) = self.resolve_pathway_node(&node)? else {
                debug!(%node, "no KEGG pathway matches node");
                continue;
            };
            for protein in self.get_proteins(&pathway)? {
                added += usize::from(graph.add_part_of(protein_node(&protein), node.clone()));
            }
        }
        Ok(added)
    }

    /// Adds pathway memberships to every HGNC protein in the graph.
    /// Returns the number of new edges.
    pub fn enrich_proteins(&self, graph: &mut BelGraph) -> Result<usize, KeggError> {
        let targets: Vec<BelNode> = graph
            .nodes()
            .filter(|node| node.function == Function::Protein && node.namespace == HGNC_NAMESPACE)
            .cloned()
            .collect();
        let mut added = 0;
        for node in targets {
            let protein = match self.get_protein_by_hgnc_symbol(&node.name)? {
                Some(protein) => Some(protein),
                None => match &node.identifier {
                    Some(identifier) => self.get_protein_by_hgnc_id(identifier)?,
                    None => None,
                },
            };
            let Some(protein) = protein else {
                debug!(%node, "no KEGG protein matches node");
                continue;
            };
            for pathway in self.get_pathways(&protein)? {
                added += usize::from(graph.add_part_of(node.clone(), pathway_node(&pathway)));
            }
        }
        Ok(added)
    }

    fn resolve_pathway_node(&self, node: &BelNode) -> Result<Option<Pathway>, KeggError> {
        if let Some(identifier) = &node.identifier {
            if let Ok(id) = identifier.parse::<PathwayId>() {
                if let Some(pathway) = self.db.pathway_by_identifier(&id)? {
                    return Ok(Some(pathway));
                }
            }
        }
        self.db.pathway_by_name(&node.name)
    }
}

/// An unreadable cache is stale; it is never silently replaced.
fn read_metadata(path: &Utf8Path) -> Result<BTreeMap<String, ProteinAttributes>, KeggError> {
    Store::read_json(path).map_err(|err| KeggError::StaleCache {
        path: path.to_path_buf().into_std_path_buf(),
        reason: format!("metadata file is unreadable: {err}"),
    })
}

pub fn pathway_node(pathway: &Pathway) -> BelNode {
    BelNode::bioprocess(KEGG_NAMESPACE, &pathway.name).with_identifier(&pathway.identifier)
}

/// HGNC protein when a symbol is known, otherwise the KEGG gene itself.
pub fn protein_node(protein: &Protein) -> BelNode {
    match (&protein.hgnc_symbol, &protein.hgnc_id) {
        (Some(symbol), Some(hgnc_id)) => {
            BelNode::protein(HGNC_NAMESPACE, symbol).with_identifier(hgnc_id)
        }
        (Some(symbol), None) => BelNode::protein(HGNC_NAMESPACE, symbol),
        (None, _) => BelNode::protein(KEGG_GENES_NAMESPACE, &protein.kegg_id),
    }
}
