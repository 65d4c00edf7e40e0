//! Bulkload CLI - Register CSV entities against a remote registry
//!
//! ```bash
//! bulkload serve                    # Start HTTP server (port 1234)
//! bulkload validate input.csv      # Check a CSV without submitting it
//! bulkload parse input.csv         # Print parsed records as JSON
//! bulkload submit input.csv        # Run one batch and print the summary
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bulkload::{
    parse_entities_file, BatchProcessor, BatchStore, Config, RegistryClient,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bulkload")]
#[command(about = "Bulk-register CSV entities against a remote registry", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server
    Serve {
        /// Port to listen on (default: $PORT or 1234)
        #[arg(short, long)]
        port: Option<u16>,

        /// Registry base URL (default: $REGISTRY_API_URL)
        #[arg(long)]
        registry_url: Option<String>,
    },

    /// Validate a CSV file without submitting it
    Validate {
        /// Input CSV file
        input: PathBuf,
    },

    /// Parse a CSV file and output JSON records
    Parse {
        /// Input CSV file
        input: PathBuf,
    },

    /// Submit a CSV file as one batch
    Submit {
        /// Input CSV file
        input: PathBuf,

        /// Registry base URL (default: $REGISTRY_API_URL)
        #[arg(long)]
        registry_url: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let mut config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { port, registry_url } => {
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(url) = registry_url {
                config.registry_url = url;
            }
            bulkload::server::start_server(config).await
        }

        Commands::Validate { input } => cmd_validate(&input, &config),

        Commands::Parse { input } => cmd_parse(&input),

        Commands::Submit { input, registry_url } => {
            if let Some(url) = registry_url {
                config.registry_url = url;
            }
            cmd_submit(&input, config).await
        }
    };

    if let Err(e) = result {
        tracing::error!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_validate(input: &Path, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("✔️  Validating: {}", input.display());

    let bytes = std::fs::read(input)?;
    let processor = BatchProcessor::new(
        Arc::new(BatchStore::new()),
        Arc::new(RegistryClient::from_config(config)),
    )
    .with_max_rows(config.max_rows);

    let report = processor.validate_only(&bytes);
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.valid {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_parse(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("📄 Parsing CSV: {}", input.display());

    let records = parse_entities_file(input)?;
    tracing::info!("✅ Parsed {} records", records.len());

    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

async fn cmd_submit(input: &Path, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("📤 Submitting: {} → {}", input.display(), config.registry_url);

    let bytes = std::fs::read(input)?;
    let processor = BatchProcessor::new(
        Arc::new(BatchStore::new()),
        Arc::new(RegistryClient::from_config(&config)),
    )
    .with_max_rows(config.max_rows);

    let summary = processor.submit(&bytes).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
