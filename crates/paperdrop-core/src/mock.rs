//! Hand-rolled test doubles for the extractor, uploader and sleeper.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

use crate::grobid::{ExtractError, Metadata, MetadataExtractor, TitleSource, file_stem};
use crate::ilibrarian::{UploadError, Uploader};
use crate::poller::Sleeper;

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// A configurable response for [`MockExtractor`].
#[derive(Clone, Debug)]
pub enum ExtractResponse {
    /// GROBID found this title.
    Title(String),
    /// GROBID answered without a usable title.
    FileStem,
    /// GROBID answered with an error status.
    Status(u16),
}

/// Mock [`MetadataExtractor`] returning a fixed response or a sequence.
pub struct MockExtractor {
    /// Popped from the back on each call; `fallback` once empty.
    responses: Mutex<Vec<ExtractResponse>>,
    fallback: ExtractResponse,
    calls: Mutex<Vec<PathBuf>>,
}

impl MockExtractor {
    pub fn new(response: ExtractResponse) -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            fallback: response,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Return responses in order, repeating the last one.
    pub fn with_sequence(mut responses: Vec<ExtractResponse>) -> Self {
        responses.reverse();
        let fallback = responses
            .first()
            .cloned()
            .unwrap_or(ExtractResponse::FileStem);
        Self {
            responses: Mutex::new(responses),
            fallback,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Paths passed to `extract()`, in call order.
    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }

    fn next_response(&self) -> ExtractResponse {
        self.responses
            .lock()
            .ok()
            .and_then(|mut seq| seq.pop())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl MetadataExtractor for MockExtractor {
    fn extract<'a>(
        &'a self,
        path: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<Metadata, ExtractError>> + Send + 'a>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(path.to_path_buf());
        }
        let response = self.next_response();

        Box::pin(async move {
            match response {
                ExtractResponse::Title(title) => Ok(Metadata {
                    title,
                    source: TitleSource::Grobid,
                }),
                ExtractResponse::FileStem => Ok(Metadata {
                    title: file_stem(path),
                    source: TitleSource::FileStem,
                }),
                ExtractResponse::Status(code) => Err(ExtractError::Status(status(code))),
            }
        })
    }
}

/// A configurable response for [`MockUploader`].
#[derive(Clone, Debug)]
pub enum UploadResponse {
    Ok,
    Status(u16),
    MissingUrl,
}

/// Mock [`Uploader`] that records every `(path, title)` it receives.
pub struct MockUploader {
    responses: Mutex<Vec<UploadResponse>>,
    fallback: UploadResponse,
    uploads: Mutex<Vec<(PathBuf, String)>>,
}

impl MockUploader {
    pub fn new(response: UploadResponse) -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            fallback: response,
            uploads: Mutex::new(Vec::new()),
        }
    }

    /// Return responses in order, repeating the last one.
    pub fn with_sequence(mut responses: Vec<UploadResponse>) -> Self {
        responses.reverse();
        let fallback = responses.first().cloned().unwrap_or(UploadResponse::Ok);
        Self {
            responses: Mutex::new(responses),
            fallback,
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn uploads(&self) -> Vec<(PathBuf, String)> {
        self.uploads.lock().map(|u| u.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.uploads().len()
    }

    fn next_response(&self) -> UploadResponse {
        self.responses
            .lock()
            .ok()
            .and_then(|mut seq| seq.pop())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl Uploader for MockUploader {
    fn upload<'a>(
        &'a self,
        path: &'a Path,
        title: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), UploadError>> + Send + 'a>> {
        if let Ok(mut uploads) = self.uploads.lock() {
            uploads.push((path.to_path_buf(), title.to_string()));
        }
        let response = self.next_response();

        Box::pin(async move {
            match response {
                UploadResponse::Ok => Ok(()),
                UploadResponse::Status(code) => Err(UploadError::Status(status(code))),
                UploadResponse::MissingUrl => Err(UploadError::MissingUrl),
            }
        })
    }
}

/// [`Sleeper`] that returns immediately and remembers what it was asked.
///
/// With [`cancel_after`](RecordingSleeper::cancel_after) it cancels a token
/// once it has been called `n` times, which ends a poll loop.
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
    count: AtomicUsize,
    stop: Option<(usize, CancellationToken)>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel_after(n: usize, token: CancellationToken) -> Self {
        Self {
            stop: Some((n, token)),
            ..Self::default()
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
        let n = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((limit, token)) = &self.stop
            && n >= *limit
        {
            token.cancel();
        }
        Box::pin(async {})
    }
}
