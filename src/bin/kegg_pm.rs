use std::io::{self, Write};
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kegg_pathway_manager::config::{ConfigLoader, ResolvedConfig};
use kegg_pathway_manager::db::Database;
use kegg_pathway_manager::domain::{KeggEntityId, OrganismCode, Resolution};
use kegg_pathway_manager::error::KeggError;
use kegg_pathway_manager::export::{write_bel_namespace, write_gene_sets_gmt};
use kegg_pathway_manager::kegg::{KeggClient, KeggHttpClient};
use kegg_pathway_manager::listing::Source;
use kegg_pathway_manager::manager::{
    LogSink, Manager, PopulateOptions, PopulateSummary, ProgressSink,
};
use kegg_pathway_manager::output::JsonOutput;
use kegg_pathway_manager::store::Store;
use kegg_pathway_manager::xref::{CrossReferenceTable, HgncHttpClient};

#[derive(Parser)]
#[command(name = "kegg-pm")]
#[command(about = "KEGG pathway manager: populate, query and export KEGG pathways")]
#[command(version, author)]
struct Cli {
    /// Print machine-readable JSON instead of human summaries.
    #[arg(long, global = true)]
    non_interactive: bool,

    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download listings and load pathways and proteins into the database")]
    Populate(PopulateArgs),
    #[command(about = "Drop all KEGG tables")]
    Drop,
    #[command(about = "Print row counts")]
    Summarize,
    #[command(about = "Pathways touched by the given HGNC symbols")]
    Query(QueryArgs),
    #[command(about = "Export pathway gene sets or a BEL namespace")]
    Export(ExportArgs),
}

#[derive(Args)]
struct PopulateArgs {
    #[arg(long)]
    pathways: Option<Utf8PathBuf>,

    #[arg(long)]
    links: Option<Utf8PathBuf>,

    #[arg(long)]
    organisms: Option<Utf8PathBuf>,

    /// Also load species from the remote organism listing.
    #[arg(long)]
    with_species: bool,

    #[arg(long)]
    hgnc: Option<Utf8PathBuf>,

    #[arg(long)]
    resolution: Option<Resolution>,

    #[arg(long)]
    metadata_exists: bool,

    /// Fetch every pathway entry for its description.
    #[arg(long)]
    pathway_definitions: bool,

    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Args)]
struct QueryArgs {
    #[arg(required = true)]
    symbols: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Gmt,
    Belns,
    Json,
}

#[derive(Args)]
struct ExportArgs {
    #[arg(long, value_enum, default_value = "gmt")]
    format: ExportFormat,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kegg) = report.downcast_ref::<KeggError>() {
            return ExitCode::from(map_exit_code(kegg));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KeggError) -> u8 {
    match error {
        KeggError::StaleCache { .. } | KeggError::PathwayNotFound(_) => 2,
        KeggError::KeggHttp(_)
        | KeggError::KeggStatus { .. }
        | KeggError::EntityFetch { .. }
        | KeggError::VocabularyHttp(_)
        | KeggError::VocabularyStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let store = match &config.data_dir {
        Some(root) => Store::new_with_root(root.clone()),
        None => Store::new()?,
    };
    store.ensure_root()?;
    let database = Database::open(
        &config
            .database
            .clone()
            .unwrap_or_else(|| store.database_path()),
    )?;

    match cli.command {
        Commands::Populate(args) => {
            let client = KeggHttpClient::new()?;
            let hgnc = match &args.hgnc {
                Some(path) => Source::File(path.clone()),
                None => Source::Remote,
            };
            let xrefs = CrossReferenceTable::ensure(&hgnc, &HgncHttpClient::new()?, &store)?;
            let mut manager = Manager::new(database, store, client, xrefs);
            let options = populate_options(args, &config);
            let summary = manager.populate(&options, sink(cli.non_interactive).as_ref())?;
            print_populate(&summary, cli.non_interactive)
        }
        Commands::Drop => {
            offline(database, store).drop_all()?;
            Ok(())
        }
        Commands::Summarize => {
            let counts = offline(database, store).summarize()?;
            if cli.non_interactive {
                JsonOutput::print_summary(&counts).into_diagnostic()
            } else {
                println!("species:     {}", counts.species);
                println!("pathways:    {}", counts.pathways);
                println!("proteins:    {}", counts.proteins);
                println!("memberships: {}", counts.memberships);
                Ok(())
            }
        }
        Commands::Query(args) => {
            let result = offline(database, store).query_gene_set(&args.symbols)?;
            JsonOutput::print_query(&result).into_diagnostic()
        }
        Commands::Export(args) => {
            let manager = offline(database, store);
            let mut stdout = io::stdout().lock();
            match args.format {
                ExportFormat::Gmt => {
                    write_gene_sets_gmt(&mut stdout, &manager.gene_sets()?).into_diagnostic()?
                }
                ExportFormat::Belns => {
                    let gene_sets = manager.gene_sets()?;
                    write_bel_namespace(
                        &mut stdout,
                        gene_sets.iter().map(|gene_set| gene_set.name.as_str()),
                        chrono::Utc::now(),
                    )
                    .into_diagnostic()?
                }
                ExportFormat::Json => {
                    JsonOutput::print_json(&manager.export_gene_sets()?).into_diagnostic()?
                }
            }
            stdout.flush().into_diagnostic()
        }
    }
}

fn populate_options(args: PopulateArgs, config: &ResolvedConfig) -> PopulateOptions {
    let source = |path: Option<Utf8PathBuf>| path.map(Source::File).unwrap_or_default();
    let organisms = match args.organisms {
        Some(path) => Some(Source::File(path)),
        None if args.with_species => Some(Source::Remote),
        None => None,
    };
    PopulateOptions {
        pathways: source(args.pathways),
        memberships: source(args.links),
        organisms,
        organism: config.organism.clone(),
        resolution: args.resolution.unwrap_or(config.resolution),
        metadata_exists: args.metadata_exists,
        pathway_definitions: args.pathway_definitions,
        thread_pool_size: args.threads.unwrap_or(config.thread_pool_size).max(1),
    }
}

fn print_populate(summary: &PopulateSummary, non_interactive: bool) -> miette::Result<()> {
    if non_interactive {
        return JsonOutput::print_populate(summary).into_diagnostic();
    }
    println!(
        "pathways: {} new, {} existing",
        summary.pathways_created, summary.pathways_existing
    );
    println!(
        "proteins: {} new, {} with HGNC mapping",
        summary.proteins_created, summary.proteins_resolved
    );
    println!(
        "memberships: {} new, {} skipped",
        summary.memberships_created, summary.memberships_skipped
    );
    if !summary.failed.is_empty() {
        println!("failed fetches: {}", summary.failed.len());
        for failure in &summary.failed {
            println!("  {}: {}", failure.id, failure.message);
        }
    }
    Ok(())
}

fn offline(database: Database, store: Store) -> Manager<NopKegg> {
    Manager::new(database, store, NopKegg, CrossReferenceTable::default())
}

struct NopKegg;

impl KeggClient for NopKegg {
    fn list_pathways(&self, _organism: &OrganismCode) -> Result<String, KeggError> {
        Err(KeggError::KeggHttp("KEGG client not configured".to_string()))
    }

    fn link_pathways(&self, _organism: &OrganismCode) -> Result<String, KeggError> {
        Err(KeggError::KeggHttp("KEGG client not configured".to_string()))
    }

    fn list_organisms(&self) -> Result<String, KeggError> {
        Err(KeggError::KeggHttp("KEGG client not configured".to_string()))
    }

    fn get_entity(&self, _id: &KeggEntityId) -> Result<String, KeggError> {
        Err(KeggError::KeggHttp("KEGG client not configured".to_string()))
    }
}

fn sink(non_interactive: bool) -> Box<dyn ProgressSink> {
    if non_interactive {
        Box::new(JsonOutput)
    } else {
        Box::new(LogSink)
    }
}
