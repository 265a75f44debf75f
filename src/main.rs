//! geodex CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use geodex::{
    commands::{cmd_ingest, cmd_init, cmd_serve, cmd_status, print_ingest_stats, print_status,
        IngestOptions},
    config::Config,
    error::Result,
    store::CatalogStore,
};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "geodex")]
#[command(version, about = "Geospatial asset indexer and catalog API", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize geodex configuration
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Crawl a directory and catalog its geospatial assets
    Ingest {
        /// Root directory to crawl
        path: PathBuf,

        /// Collection id (defaults to the directory name)
        #[arg(short = 'n', long)]
        collection: Option<String>,

        /// Paths per existence-check round trip
        #[arg(long)]
        batch_size: Option<usize>,

        /// Items per insert transaction
        #[arg(long)]
        insert_batch_size: Option<usize>,

        /// Report what would be ingested without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Start the catalog HTTP API
    Serve {
        /// Listen address (overrides config)
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Show catalog status
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Init writes the config and needs nothing else
    if let Commands::Init { force } = cli.command {
        let path = cmd_init(
            cli.config.and_then(|p| p.parent().map(PathBuf::from)),
            force,
        )
        .await?;
        println!("✓ geodex initialized");
        println!("  Config: {}", path.display());
        println!("\nNext steps:");
        println!("  1. Point [database].url at a PostGIS instance");
        println!("  2. Ingest assets: geodex ingest /path/to/data");
        println!("  3. Serve the catalog: geodex serve");
        return Ok(());
    }

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "geodex", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = load_config(cli.config.as_deref())?;
    if let Commands::Serve {
        listen: Some(ref listen),
    } = cli.command
    {
        config.api.listen = listen.clone();
    }
    let store = CatalogStore::connect(&config).await?;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Ingest {
            path,
            collection,
            batch_size,
            insert_batch_size,
            dry_run,
        } => {
            let options = IngestOptions {
                collection,
                check_batch_size: batch_size,
                insert_batch_size,
                dry_run,
            };
            let stats = cmd_ingest(&config, &store, &path, options).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_ingest_stats(&stats, dry_run);
            }
        }

        Commands::Serve { .. } => {
            cmd_serve(&config, store).await?;
        }

        Commands::Status => {
            let status = cmd_status(&store).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_config_path);

    if !config_path.exists() {
        // No config file is fine; defaults plus env vars still work
        return Ok(Config::default());
    }
    Config::load(&config_path)
}
