//! kg-curator CLI: knowledge graph curation from source records.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use kg_curator::config::CuratorConfig;
use kg_curator::graph::classes::{self, ProgressSink};
use kg_curator::import::{self, GraphImport};
use kg_curator::mapping::GraphSource;
use kg_curator::mapping::interchange::MappingDocumentSet;
use kg_curator::store::{GraphStore, NodeFilter, TripleFilter};
use kg_curator::sync::{GraphUpdater, StaticMetadata};
use kg_curator::thesaurus::{self, Thesaurus};

#[derive(Parser)]
#[command(name = "kg-curator", version, about = "Knowledge graph curation engine")]
struct Cli {
    /// Configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory; overrides the configured one.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a data directory.
    Init,

    /// Show store statistics.
    Info,

    /// Import, export or delete mappings.
    Mappings {
        #[command(subcommand)]
        action: MappingAction,
    },

    /// Import bootstrap data.
    Import {
        #[command(subcommand)]
        action: ImportAction,
    },

    /// Synchronize a source record (JSON) into the graph.
    Update {
        /// Path to the record JSON.
        file: PathBuf,

        /// Extra metadata as key=value (repeatable).
        #[arg(long = "meta", value_parser = parse_key_value)]
        metadata: Vec<(String, String)>,

        /// Print the mapped fragment without storing it.
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete everything stored for a source record.
    Delete {
        /// Item or part GUID.
        source_id: String,
    },

    /// List nodes.
    Nodes {
        /// Substring of the UID.
        #[arg(long)]
        uid: Option<String>,
        /// Substring of the label.
        #[arg(long)]
        label: Option<String>,
        /// Only classes.
        #[arg(long = "classes")]
        only_classes: bool,
        /// SID prefix.
        #[arg(long)]
        sid: Option<String>,
        #[arg(long, default_value = "1")]
        page: usize,
    },

    /// List triples.
    Triples {
        /// Subject UID.
        #[arg(long)]
        subject: Option<String>,
        /// Predicate UID.
        #[arg(long)]
        predicate: Option<String>,
        /// SID prefix.
        #[arg(long)]
        sid: Option<String>,
        #[arg(long, default_value = "1")]
        page: usize,
    },

    /// Class closure maintenance.
    Classes {
        #[command(subcommand)]
        action: ClassAction,
    },

    /// Resolve URIs and their ids.
    Uri {
        #[command(subcommand)]
        action: UriAction,
    },
}

#[derive(Subcommand)]
enum MappingAction {
    /// Import a mapping document set.
    Import { file: PathBuf },
    /// Export every mapping as JSON.
    Export {
        /// Output file; stdout when omitted.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Delete a mapping and its orphaned descendants.
    Delete { id: u64 },
}

#[derive(Subcommand)]
enum ImportAction {
    /// Nodes, properties and triples by UID.
    Graph { file: PathBuf },
    /// A thesaurus as a class tree.
    Thesaurus {
        file: PathBuf,
        /// UID prefix of the class nodes.
        #[arg(long, default_value = "")]
        prefix: String,
    },
}

#[derive(Subcommand)]
enum ClassAction {
    /// Recompute the closure of every node.
    Rebuild,
    /// Show the classes of a node.
    Show { uid: String },
}

#[derive(Subcommand)]
enum UriAction {
    /// Look up a URI by id, or an id by URI.
    Lookup { value: String },
}

fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{s}`"))
}

fn open_store(config: &CuratorConfig) -> Result<Arc<GraphStore>> {
    let store = GraphStore::open(&config.data_dir)?.with_vocabulary(config.vocabulary());
    Ok(Arc::new(store))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{json}");
    Ok(())
}

fn resolve_uid(store: &GraphStore, uid: &str) -> Result<u64> {
    match store.lookup_id(uid)? {
        Some(id) => Ok(id),
        None => miette::bail!("unknown URI: {uid}"),
    }
}

fn label_of(store: &GraphStore, id: u64) -> String {
    store
        .lookup_uri(id)
        .ok()
        .flatten()
        .unwrap_or_else(|| format!("#{id}"))
}

struct PrintProgress;

impl ProgressSink for PrintProgress {
    fn report(&self, processed: usize, total: usize) {
        eprintln!("  {processed}/{total}");
    }
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = CuratorConfig::load_or_default(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    match cli.command {
        Commands::Init => {
            let store = open_store(&config)?;
            println!("Initialized kg-curator at {}", config.data_dir.display());
            print!("{}", store.stats()?);
        }

        Commands::Info => {
            let store = open_store(&config)?;
            print!("{}", store.stats()?);
        }

        Commands::Mappings { action } => {
            let store = open_store(&config)?;
            match action {
                MappingAction::Import { file } => {
                    let set: MappingDocumentSet = import::read_json(&file)?;
                    let updater = GraphUpdater::new(store);
                    let report = updater.import_mappings(&set)?;
                    println!(
                        "Imported {} mappings: {} created, {} updated, {} shared links",
                        set.document_count(),
                        report.created,
                        report.updated,
                        report.linked
                    );
                }
                MappingAction::Export { out } => {
                    let set = MappingDocumentSet::export(&store)?;
                    let json = serde_json::to_string_pretty(&set).into_diagnostic()?;
                    match out {
                        Some(path) => {
                            std::fs::write(&path, json).into_diagnostic()?;
                            println!("Exported {} mappings to {}", set.document_count(), path.display());
                        }
                        None => println!("{json}"),
                    }
                }
                MappingAction::Delete { id } => {
                    let updater = GraphUpdater::new(store);
                    if updater.delete_mapping(id)? {
                        println!("Deleted mapping {id}");
                    } else {
                        println!("No mapping {id}");
                    }
                }
            }
        }

        Commands::Import { action } => {
            let store = open_store(&config)?;
            match action {
                ImportAction::Graph { file } => {
                    let data: GraphImport = import::read_json(&file)?;
                    let counts = store.write(|txn| import::import_graph(txn, &data))?;
                    println!(
                        "Imported {} nodes, {} properties, {} triples from {}",
                        counts.nodes,
                        counts.properties,
                        counts.triples,
                        file.display()
                    );
                }
                ImportAction::Thesaurus { file, prefix } => {
                    let data: Thesaurus = import::read_json(&file)?;
                    let report = store.write(|txn| thesaurus::import_thesaurus(txn, &data, &prefix))?;
                    println!(
                        "Imported thesaurus {}: {} classes, {} links, {} orphans",
                        data.id, report.classes, report.links, report.orphans
                    );
                }
            }
        }

        Commands::Update {
            file,
            metadata,
            dry_run,
        } => {
            let store = open_store(&config)?;
            let source: GraphSource = import::read_json(&file)?;
            let supplied = metadata
                .into_iter()
                .fold(StaticMetadata::new(), |m, (k, v)| m.with(k, v));
            let updater = GraphUpdater::new(store)
                .with_options(config.mapper_options())
                .with_supplier(supplied);
            if dry_run {
                print_json(&updater.preview(&source)?)?;
            } else {
                let report = updater.update(&source)?;
                println!("{report}");
            }
        }

        Commands::Delete { source_id } => {
            let store = open_store(&config)?;
            let deletion = store.delete_graph_set(&source_id)?;
            println!(
                "Deleted {} triples and {} nodes of {source_id} ({} nodes kept)",
                deletion.deleted_triples.len(),
                deletion.deleted_nodes.len(),
                deletion.kept_nodes.len()
            );
        }

        Commands::Nodes {
            uid,
            label,
            only_classes,
            sid,
            page,
        } => {
            let store = open_store(&config)?;
            let filter = NodeFilter {
                paging: config.paging(page),
                uid,
                label,
                is_class: only_classes.then_some(true),
                sid_prefix: sid.is_some(),
                sid,
                ..Default::default()
            };
            let nodes = store.get_nodes(&filter)?;
            println!("Nodes (page {}/{}, {} total):", nodes.page_number, nodes.page_count(), nodes.total);
            for node in &nodes.items {
                let sid = node.sid.as_deref().unwrap_or("-");
                println!("  {} \"{}\" [{}] sid={sid}", node.uid, node.label, node.source_type);
            }
        }

        Commands::Triples {
            subject,
            predicate,
            sid,
            page,
        } => {
            let store = open_store(&config)?;
            let subject_id = subject.map(|s| resolve_uid(&store, &s)).transpose()?;
            let predicate_ids = match predicate {
                Some(p) => vec![resolve_uid(&store, &p)?],
                None => Vec::new(),
            };
            let filter = TripleFilter {
                paging: config.paging(page),
                subject_id,
                predicate_ids,
                sid_prefix: sid.is_some(),
                sid,
                ..Default::default()
            };
            let triples = store.get_triples(&filter)?;
            println!(
                "Triples (page {}/{}, {} total):",
                triples.page_number,
                triples.page_count(),
                triples.total
            );
            for t in &triples.items {
                let object = match (t.object_id, &t.object_literal) {
                    (Some(o), _) => label_of(&store, o),
                    (None, Some(literal)) => format!("\"{literal}\""),
                    (None, None) => "?".into(),
                };
                println!(
                    "  {} {} {object}",
                    label_of(&store, t.subject_id),
                    label_of(&store, t.predicate_id)
                );
            }
        }

        Commands::Classes { action } => {
            let store = open_store(&config)?;
            match action {
                ClassAction::Rebuild => {
                    let cancel = AtomicBool::new(false);
                    let report = classes::rebuild_all(&store, config.rebuild_options(), &cancel, &PrintProgress)?;
                    println!("Rebuilt closures of {}/{} nodes", report.processed, report.total);
                }
                ClassAction::Show { uid } => {
                    let id = resolve_uid(&store, &uid)?;
                    let entries = store.get_node_classes(id)?;
                    if entries.is_empty() {
                        println!("{uid} belongs to no class.");
                    }
                    for entry in &entries {
                        println!("  {} (level {})", label_of(&store, entry.class_id), entry.level);
                    }
                }
            }
        }

        Commands::Uri { action } => {
            let store = open_store(&config)?;
            match action {
                UriAction::Lookup { value } => match value.parse::<u64>() {
                    Ok(id) => match store.lookup_uri(id)? {
                        Some(uri) => println!("{id} = {uri}"),
                        None => println!("No URI with id {id}"),
                    },
                    Err(_) => match store.lookup_id(&value)? {
                        Some(id) => println!("{value} = {id}"),
                        None => println!("URI not interned: {value}"),
                    },
                },
            }
        }
    }

    Ok(())
}
