use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use paperdrop_core::{Config, MetadataExtractor, config_file};
use tokio_util::sync::CancellationToken;

mod logging;
mod output;

use output::ColorMode;

/// Paperdrop - import PDFs dropped in a folder into I, Librarian
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Option<Command>,
}

/// Settings that win over environment variables and config files.
#[derive(Args, Debug, Default)]
struct Overrides {
    /// TOML config file to use instead of the discovered ones
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Folder scanned for new PDFs
    #[arg(long, global = true)]
    watch_folder: Option<PathBuf>,

    /// Folder imported PDFs are moved into
    #[arg(long, global = true)]
    processed_folder: Option<PathBuf>,

    /// GROBID processHeaderDocument endpoint
    #[arg(long, global = true)]
    grobid_url: Option<String>,

    /// I, Librarian upload endpoint
    #[arg(long, global = true)]
    upload_url: Option<String>,

    /// Minutes to wait between scans
    #[arg(long, global = true)]
    interval_minutes: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the watch folder until interrupted (default)
    Watch,

    /// Scan and import once, then exit
    Once {
        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Ask GROBID for a file's title without uploading or moving it
    Extract {
        /// Path to the PDF
        file_path: PathBuf,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init();

    let config = resolve_config(cli.overrides)?;
    tracing::info!(?config, "resolved configuration");

    match cli.command.unwrap_or(Command::Watch) {
        Command::Watch => watch(config).await,
        Command::Once { no_color } => once(config, no_color).await,
        Command::Extract {
            file_path,
            no_color,
        } => extract(config, file_path, no_color).await,
    }
}

/// Resolve configuration: CLI flags > env vars > config file > defaults
fn resolve_config(overrides: Overrides) -> anyhow::Result<Config> {
    let file = match overrides.config {
        Some(ref path) => config_file::load_explicit(path)?,
        None => config_file::load_config(),
    };
    let mut config = Config::from_env(&file)?;

    if let Some(watch_folder) = overrides.watch_folder {
        config.watch_folder = watch_folder;
    }
    if let Some(processed_folder) = overrides.processed_folder {
        config.processed_folder = processed_folder;
    }
    if let Some(grobid_url) = overrides.grobid_url {
        config.grobid_url = grobid_url;
    }
    if let Some(upload_url) = overrides.upload_url {
        config.upload_url = upload_url;
    }
    if let Some(interval_minutes) = overrides.interval_minutes {
        config.interval_minutes = interval_minutes;
    }
    config.validate()?;
    Ok(config)
}

async fn watch(config: Config) -> anyhow::Result<ExitCode> {
    let mut poller = paperdrop_core::build_poller(&config)?;

    let cancel = CancellationToken::new();

    // Set up Ctrl+C handler
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, finishing current file");
            cancel_clone.cancel();
        }
    });

    poller.run(&cancel).await;
    Ok(ExitCode::SUCCESS)
}

async fn once(config: Config, no_color: bool) -> anyhow::Result<ExitCode> {
    let poller = paperdrop_core::build_poller(&config)?;
    let cancel = CancellationToken::new();

    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_clone.cancel();
        }
    });

    let report = poller.run_cycle(&cancel).await?;

    let mut stdout = std::io::stdout();
    output::print_cycle_summary(&mut stdout, &report, ColorMode(!no_color))?;

    if report.failed() > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

async fn extract(config: Config, file_path: PathBuf, no_color: bool) -> anyhow::Result<ExitCode> {
    if !file_path.exists() {
        anyhow::bail!("File not found: {}", file_path.display());
    }

    let client = paperdrop_core::build_http_client()?;
    let extractor = paperdrop_core::build_extractor(&config, client);
    let metadata = extractor.extract(&file_path).await?;

    let file_name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| file_path.display().to_string());

    let mut stdout = std::io::stdout();
    output::print_metadata(&mut stdout, &file_name, &metadata, ColorMode(!no_color))?;
    Ok(ExitCode::SUCCESS)
}
