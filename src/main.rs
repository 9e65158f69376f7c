use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use joinpath::custom_refs::{CustomReferenceSet, apply_overlay};
use joinpath::exits::{exit_payload, exit_payloads};
use joinpath::persist::PersistedGraph;
use joinpath::report::TextReport;
use joinpath::sql::{Dialect, parse_sql};
use joinpath::{JoinResolver, PathsIndex, ResolverConfig, SchemaDescription, SchemaGraph};

/// Schema relationship graph and automatic join-path resolver
#[derive(Parser, Debug)]
#[command(name = "joinpath")]
#[command(version, about)]
struct Args {
    /// Resolver configuration (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Custom references to overlay (JSON array)
    #[arg(long, global = true)]
    refs: Option<PathBuf>,

    /// Longest path followed, in hops
    #[arg(long, global = true)]
    max_depth: Option<usize>,

    /// Paths kept per table pair
    #[arg(long, global = true)]
    k_shortest: Option<usize>,

    /// Output format
    #[arg(long, global = true, default_value = "text", value_enum)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a DDL dump to schema description JSON
    Import {
        dump: PathBuf,
        /// auto, generic, postgres or mysql
        #[arg(long, default_value = "auto")]
        dialect: String,
    },
    /// Build the relationship graph
    Graph { schema: PathBuf },
    /// List the best paths between tables
    Paths {
        schema: PathBuf,
        /// Comma separated subset to index
        #[arg(long, value_delimiter = ',')]
        tables: Vec<String>,
    },
    /// Group a table's paths by first hop
    Exits {
        schema: PathBuf,
        #[arg(long)]
        start: Option<String>,
    },
    /// Resolve joins for a set of tables
    Resolve {
        schema: PathBuf,
        #[arg(required = true)]
        tables: Vec<String>,
        /// Emit structured joins instead of SQL
        #[arg(long)]
        joins: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let report = TextReport::default();
    let json = args.format == OutputFormat::Json;

    match &args.command {
        Command::Import { dump, dialect } => {
            let dialect = Dialect::from_name(dialect)
                .with_context(|| format!("unknown dialect {dialect}"))?;
            let source = read(dump)?;
            let schema = parse_sql(&source, dialect)
                .with_context(|| format!("failed to parse {}", dump.display()))?;
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
        Command::Graph { schema } => {
            let graph = load_graph(schema, &args, &config)?;
            if json {
                println!("{}", graph.to_persisted().to_json()?);
            } else {
                print!("{}", report.graph(&graph));
            }
        }
        Command::Paths { schema, tables } => {
            let graph = load_graph(schema, &args, &config)?;
            let index = if tables.is_empty() {
                PathsIndex::compute(&graph, &config)
            } else {
                let ids = tables
                    .iter()
                    .map(|t| graph.table_id(t).with_context(|| format!("unknown table {t}")))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                PathsIndex::for_tables(&graph, &ids, &config)
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&index.view(&graph))?);
            } else {
                print!("{}", report.paths(&graph, &index));
            }
        }
        Command::Exits { schema, start } => {
            let graph = load_graph(schema, &args, &config)?;
            let index = PathsIndex::compute(&graph, &config);
            let payloads = match start {
                Some(name) => {
                    let id = graph
                        .table_id(name)
                        .with_context(|| format!("unknown table {name}"))?;
                    vec![exit_payload(&graph, &index, id)]
                }
                None => exit_payloads(&graph, &index),
            };
            if json {
                let views: Vec<_> = payloads.iter().map(|p| p.view(&graph)).collect();
                println!("{}", serde_json::to_string_pretty(&views)?);
            } else {
                print!("{}", report.exits(&graph, &payloads));
            }
        }
        Command::Resolve {
            schema,
            tables,
            joins,
        } => {
            let graph = load_graph(schema, &args, &config)?;
            let resolver = JoinResolver::new(&graph, &config);
            match (*joins, json) {
                (true, true) => {
                    println!("{}", serde_json::to_string_pretty(&resolver.resolve_refs(tables.as_slice()))?)
                }
                (true, false) => print!("{}", report.join_refs(&resolver.resolve_refs(tables.as_slice()))),
                (false, true) => {
                    println!("{}", serde_json::to_string_pretty(&resolver.resolve(tables.as_slice()))?)
                }
                (false, false) => print!("{}", report.resolution(&resolver.resolve(tables.as_slice()))),
            }
        }
    }

    Ok(())
}

fn read(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Config file first, then command line overrides.
fn load_config(args: &Args) -> anyhow::Result<ResolverConfig> {
    let mut config = match &args.config {
        Some(path) => ResolverConfig::from_json(&read(path)?)
            .with_context(|| format!("invalid config {}", path.display()))?,
        None => ResolverConfig::default(),
    };
    if let Some(depth) = args.max_depth {
        config.max_depth = depth;
    }
    if let Some(k) = args.k_shortest {
        config.k_shortest = k;
    }
    config.validate()?;
    Ok(config)
}

/// Accepts a DDL dump, a schema description or a persisted graph.
fn load_schema(path: &Path) -> anyhow::Result<SchemaDescription> {
    let source = read(path)?;
    if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("sql")) {
        debug!(path = %path.display(), "reading DDL dump");
        return parse_sql(&source, Dialect::Auto)
            .with_context(|| format!("failed to parse {}", path.display()));
    }

    let value: serde_json::Value =
        serde_json::from_str(&source).with_context(|| format!("invalid JSON in {}", path.display()))?;
    if value.get("nodes").is_some() {
        debug!(path = %path.display(), "reading persisted graph");
        let persisted = PersistedGraph::from_json(&source)?;
        // Validates endpoints before the metadata is trusted.
        SchemaGraph::from_persisted(&persisted)?;
        return Ok(persisted.schema());
    }
    if value.get("tables").is_none() {
        bail!("{} is neither a schema description nor a persisted graph", path.display());
    }
    Ok(SchemaDescription::from_json(&source)?)
}

fn load_graph(path: &Path, args: &Args, config: &ResolverConfig) -> anyhow::Result<SchemaGraph> {
    let mut schema = load_schema(path)?;
    if let Some(refs_path) = &args.refs {
        let refs = CustomReferenceSet::from_json(&read(refs_path)?)
            .with_context(|| format!("invalid custom references {}", refs_path.display()))?;
        schema = apply_overlay(&schema, &refs);
    }
    Ok(SchemaGraph::build(&schema, config)?)
}
