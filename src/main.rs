//! owlmap CLI: map domain object graphs to OWL ontologies and back.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use oxigraph::model::NamedNode;

use owlmap::catalog;
use owlmap::codec::{Decoder, Encoder};
use owlmap::config::MapperConfig;
use owlmap::export::{self, ResyncExport};
use owlmap::gateway::{InMemoryGateway, PersistenceGateway, export_all};
use owlmap::io::{self, WireFormat};
use owlmap::registry::TypeRegistry;
use owlmap::schema::{OntologyModel, SchemaBuilder};
use owlmap::sync::{SchemeFetcher, Synchronizer, Verdict};

#[derive(Parser)]
#[command(name = "owlmap", version, about = "Object graph to RDF/OWL mapper")]
struct Cli {
    /// Mapper configuration (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured model namespace.
    #[arg(long, global = true)]
    namespace: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Emit the ontology schema of every registered type.
    Schema {
        /// Output format (turtle, ntriples, rdfxml, ...).
        #[arg(long, default_value = "turtle")]
        format: String,

        /// Write to a file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Encode a generated sample fleet into an ontology with individuals.
    Export {
        /// Number of vessels (one trip each).
        #[arg(long, default_value = "3")]
        vessels: usize,

        /// Store the fleet in an in-memory gateway first and export every
        /// stored entity type (stored records keep scalar state only).
        #[arg(long)]
        stored: bool,

        /// Output format (turtle, ntriples, rdfxml, ...).
        #[arg(long, default_value = "turtle")]
        format: String,

        /// Write to a file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Fetch a remote ontology, decode it, re-encode it and compare.
    Resync {
        /// Ontology location: http(s) URL, file:// URL or path.
        #[arg(long)]
        url: String,

        /// IRI of the re-encoded target model.
        #[arg(long)]
        target: String,

        /// Save decoded objects through the gateway.
        #[arg(long)]
        persist: bool,

        /// Print the outcome as JSON.
        #[arg(long)]
        json: bool,

        /// Also write the re-encoded model to this file.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Print the effective configuration as TOML.
    Config,
}

fn load_config(cli: &Cli) -> Result<MapperConfig> {
    let mut config = match &cli.config {
        Some(path) => MapperConfig::load(path)?,
        None => MapperConfig::default(),
    };
    if let Some(namespace) = &cli.namespace {
        config.namespace = namespace.clone();
    }
    Ok(config)
}

fn write_graph(format: WireFormat, graph: &oxigraph::model::Graph, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let file = std::fs::File::create(path).into_diagnostic()?;
            io::serialize(format, graph, std::io::BufWriter::new(file))?;
            eprintln!("Wrote {} triples to {}", graph.len(), path.display());
        }
        None => {
            let stdout = std::io::stdout();
            io::serialize(format, graph, stdout.lock())?;
        }
    }
    Ok(())
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
    .ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let registry: Arc<TypeRegistry> = Arc::new(catalog::registry(&config.namespace)?);
    let ontology = NamedNode::new(config.ontology_iri.as_str()).into_diagnostic()?;

    match cli.command {
        Commands::Schema { format, output } => {
            let format: WireFormat = format.parse()?;
            let schema = SchemaBuilder::from_config(Arc::clone(&registry), &config);
            let mut model = OntologyModel::new(ontology);
            let classes = schema.build_all(&mut model);
            tracing::info!(
                classes,
                cached = schema.cached(),
                triples = model.len(),
                "schema built"
            );
            write_graph(format, model.graph(), output.as_deref())?;
        }

        Commands::Export {
            vessels,
            stored,
            format,
            output,
        } => {
            let format: WireFormat = format.parse()?;
            let schema = Arc::new(SchemaBuilder::from_config(Arc::clone(&registry), &config));
            let encoder = Encoder::new(schema);
            let (objects, _) = catalog::sample_fleet(vessels);

            let mut model = OntologyModel::new(ontology);
            let report = if stored {
                let gateway = InMemoryGateway::new();
                for id in objects.ids() {
                    // Nested values have no identity of their own to store.
                    if objects
                        .get(id)
                        .is_some_and(|e| e.descriptor().identifier_field().is_some())
                    {
                        gateway.save(&objects, id)?;
                    }
                }
                export_all(&registry, &gateway, &encoder, &mut model, config.max_depth)?.report
            } else {
                let mut pass = encoder.pass(&mut model, &objects, config.max_depth);
                for id in objects.ids() {
                    pass.encode(id);
                }
                let report = pass.finish();
                encoder.schema().close(&mut model);
                report
            };

            if !report.is_clean() {
                eprintln!("{} mapping issue(s):", report.len());
                for issue in export::issues(&report) {
                    eprintln!("  {} {}: {}", issue.direction, issue.subject, issue.message);
                }
            }
            write_graph(format, model.graph(), output.as_deref())?;
        }

        Commands::Resync {
            url,
            target,
            persist,
            json,
            output,
        } => {
            let gateway = Arc::new(InMemoryGateway::new().with_proxies());
            let gateway_dyn: Arc<dyn PersistenceGateway> = gateway.clone();
            let decoder = Decoder::from_config(Arc::clone(&registry), gateway_dyn, &config);
            let schema = Arc::new(SchemaBuilder::from_config(Arc::clone(&registry), &config));
            let synchronizer = Synchronizer::new(
                Box::new(SchemeFetcher::from_config(&config)),
                decoder,
                Encoder::new(schema),
            )
            .with_max_depth(config.max_depth)
            .with_persist(persist);

            let outcome = synchronizer.resync(&url, &target)?;
            let summary = ResyncExport::from(&outcome);

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&summary).into_diagnostic()?
                );
            } else {
                println!("Resync of {url} into {target}");
                println!("  source triples:  {}", summary.source_triples);
                println!("  target triples:  {}", summary.target_triples);
                println!("  decoded:         {}", summary.decoded);
                println!("  verdict:         {}", summary.verdict);
                if persist {
                    println!("  persisted:       {} (gateway holds {})", summary.persisted, gateway.len());
                }
                for issue in &summary.issues {
                    let field = issue.field.as_deref().unwrap_or("-");
                    println!("  [{}] {} {}: {}", issue.direction, issue.subject, field, issue.message);
                }
            }

            if let Some(path) = output {
                let format = WireFormat::guess(None, &path.display().to_string()).unwrap_or(WireFormat::Turtle);
                write_graph(format, outcome.model.graph(), Some(&path))?;
            }

            if summary.verdict != Verdict::Match {
                miette::bail!("re-encoded model differs from the source ({})", summary.verdict);
            }
        }

        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config).into_diagnostic()?);
        }
    }

    Ok(())
}
