use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use sigil_scanner::cli;
use sigil_scanner::config::ScannerConfig;
use sigil_scanner::logging::{init_logging, LoggingConfig};
use sigil_scanner::model::ExtractionMethod;
use sigil_scanner::scanner::ScanRequest;

#[derive(Parser)]
#[command(name = "sigil")]
#[command(about = "Extract entries and sigils from a symbol dictionary PDF and search them by sketch")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a page range into the dataset file
    Scan {
        /// PDF to scan
        pdf: PathBuf,

        /// First page (1-based)
        #[arg(long)]
        start: Option<String>,

        /// Last page, clamped to the document
        #[arg(long)]
        end: Option<String>,

        /// Use tesseract on rendered pages instead of the text layer
        #[arg(long)]
        ocr: bool,

        /// Dataset JSON output path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Directory for cropped sigil images
        #[arg(long)]
        images: Option<PathBuf>,
    },

    /// Search entries by text
    Query {
        /// Case-insensitive search term; omit to list everything
        term: Option<String>,

        #[arg(long)]
        dataset: Option<PathBuf>,
    },

    /// Find the stored sigils closest to a sketch image
    Search {
        /// Sketch image (PNG, JPEG, ...)
        sketch: PathBuf,

        #[arg(long)]
        dataset: Option<PathBuf>,
    },

    /// Write a default configuration file
    InitConfig {
        #[arg(default_value = "sigil.toml")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            let mut config = ScannerConfig::load_from_file(path)?;
            config.apply_env();
            config
        }
        None => ScannerConfig::load_from_env(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }

    let _guard = init_logging(&LoggingConfig::from(&config.logging))?;
    debug!("Configuration: {:?}", config);

    match cli.command {
        Commands::Scan { pdf, start, end, ocr, output, images } => {
            if ocr {
                config.scan.strategy = ExtractionMethod::Ocr;
            }
            if let Some(output) = output {
                config.output.dataset_path = output;
            }
            if let Some(images) = images {
                config.output.image_dir = images;
            }

            let mut request = ScanRequest::from_config(pdf, &config);
            if let Some(start) = start {
                request.start = start;
            }
            if let Some(end) = end {
                request.end = end;
            }
            cli::scan_command(config, request).await
        }
        Commands::Query { term, dataset } => {
            let dataset = dataset.unwrap_or_else(|| config.output.dataset_path.clone());
            cli::query_command(dataset, term).await
        }
        Commands::Search { sketch, dataset } => {
            let dataset = dataset.unwrap_or_else(|| config.output.dataset_path.clone());
            cli::search_command(&config, &sketch, dataset).await
        }
        Commands::InitConfig { path } => cli::init_config_command(path).await,
    }
}
