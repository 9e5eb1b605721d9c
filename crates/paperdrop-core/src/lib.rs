//! Watch a folder for PDFs, title them with GROBID, and upload them to
//! I, Librarian.
//!
//! [`queue`] lists and completes work. [`grobid`] and [`ilibrarian`] talk
//! to the two services, [`pipeline`] sequences them for one file, and
//! [`poller`] repeats that on an interval. [`build_poller`] wires the
//! production implementations from a [`Config`].

use thiserror::Error;

pub mod config;
pub mod config_file;
pub mod grobid;
pub mod ilibrarian;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod pipeline;
pub mod poller;
pub mod queue;

// Re-export for convenience
pub use config::{Config, ConfigError};
pub use grobid::{ExtractError, GrobidClient, Metadata, MetadataExtractor, TitleSource};
pub use ilibrarian::{Credentials, ILibrarianClient, UploadError, Uploader};
pub use pipeline::{FileOutcome, UploadStepError, process_file};
pub use poller::{CycleReport, Poller, Sleeper, TokioSleeper};
pub use queue::{FolderQueue, QueueError, WorkQueue};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// The poller as deployed: real services, real folders, real sleep.
pub type DefaultPoller = Poller<GrobidClient, ILibrarianClient, FolderQueue, TokioSleeper>;

/// Shared HTTP client for both services. Per-request timeouts come from
/// the config, so none is set here.
pub fn build_http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(concat!("paperdrop/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// GROBID client for `config`.
pub fn build_extractor(config: &Config, client: reqwest::Client) -> GrobidClient {
    GrobidClient::new(client, config.grobid_url.clone(), config.request_timeout())
}

/// Build the production poller. Folders are created if missing.
pub fn build_poller(config: &Config) -> Result<DefaultPoller, CoreError> {
    config.ensure_dirs()?;
    if config.upload_url.trim().is_empty() {
        tracing::warn!("ILIBRARIAN_UPLOAD_URL is not set; every upload will fail until it is");
    }

    let client = build_http_client()?;
    let extractor = build_extractor(config, client.clone());
    let uploader = ILibrarianClient::new(
        client,
        config.upload_url.clone(),
        Credentials {
            user: config.upload_user.clone(),
            password: config.upload_password.clone(),
        },
        config.request_timeout(),
    );
    let queue = FolderQueue::new(&config.watch_folder, &config.processed_folder);

    Ok(Poller::new(
        extractor,
        uploader,
        queue,
        TokioSleeper,
        config.interval(),
    ))
}
