//! One file through extract → upload → mark done.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::grobid::{ExtractError, MetadataExtractor, TitleSource, file_name};
use crate::ilibrarian::{UploadError, Uploader};
use crate::queue::{QueueError, WorkQueue};

/// Why the upload step did not complete.
#[derive(Error, Debug)]
pub enum UploadStepError {
    #[error(transparent)]
    Upload(#[from] UploadError),
    /// The upload went through but the file could not be moved, so it
    /// will be uploaded again next cycle.
    #[error(transparent)]
    Move(#[from] QueueError),
}

/// Result of one import attempt. Failures leave the file pending.
#[derive(Debug)]
pub enum FileOutcome {
    Imported {
        title: String,
        source: TitleSource,
        destination: PathBuf,
    },
    ExtractFailed(ExtractError),
    UploadFailed(UploadStepError),
}

impl FileOutcome {
    pub fn is_imported(&self) -> bool {
        matches!(self, FileOutcome::Imported { .. })
    }
}

/// Import a single pending file.
///
/// The file is handed to `queue.mark_done` only after the upload returned
/// success. Errors are logged here and reported in the outcome; nothing
/// is retried within the call.
pub async fn process_file(
    path: &Path,
    extractor: &dyn MetadataExtractor,
    uploader: &dyn Uploader,
    queue: &dyn WorkQueue,
) -> FileOutcome {
    let name = file_name(path);
    tracing::info!(file = %name, "processing");

    let metadata = match extractor.extract(path).await {
        Ok(m) => m,
        Err(e) => {
            tracing::error!(file = %name, error = %e, "GROBID request failed");
            return FileOutcome::ExtractFailed(e);
        }
    };
    if metadata.source == TitleSource::FileStem {
        tracing::info!(file = %name, title = %metadata.title, "no title from GROBID, using file name");
    }

    if let Err(e) = uploader.upload(path, &metadata.title).await {
        tracing::error!(file = %name, error = %e, "upload failed");
        return FileOutcome::UploadFailed(e.into());
    }
    tracing::info!(file = %name, title = %metadata.title, "uploaded successfully");

    match queue.mark_done(path) {
        Ok(destination) => FileOutcome::Imported {
            title: metadata.title,
            source: metadata.source,
            destination,
        },
        Err(e) => {
            tracing::error!(file = %name, error = %e, "upload failed: could not move file");
            FileOutcome::UploadFailed(e.into())
        }
    }
}
