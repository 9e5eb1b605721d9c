//! The poll loop: scan, import each file in turn, sleep, repeat.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::grobid::MetadataExtractor;
use crate::ilibrarian::Uploader;
use crate::pipeline::{FileOutcome, process_file};
use crate::queue::{QueueError, WorkQueue};

/// Waits between poll cycles.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Real wall-clock sleep.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Counters for one poll cycle, or summed over many.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub found: usize,
    pub imported: usize,
    pub extract_failed: usize,
    pub upload_failed: usize,
}

impl CycleReport {
    pub fn failed(&self) -> usize {
        self.extract_failed + self.upload_failed
    }

    fn record(&mut self, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Imported { .. } => self.imported += 1,
            FileOutcome::ExtractFailed(_) => self.extract_failed += 1,
            FileOutcome::UploadFailed(_) => self.upload_failed += 1,
        }
    }

    fn absorb(&mut self, other: &CycleReport) {
        self.found += other.found;
        self.imported += other.imported;
        self.extract_failed += other.extract_failed;
        self.upload_failed += other.upload_failed;
    }
}

/// Drives the import pipeline over a [`WorkQueue`] on a fixed interval.
pub struct Poller<E, U, Q, S = TokioSleeper> {
    extractor: E,
    uploader: U,
    queue: Q,
    sleeper: S,
    interval: Duration,
    totals: CycleReport,
    cycles: u64,
}

impl<E, U, Q, S> Poller<E, U, Q, S>
where
    E: MetadataExtractor,
    U: Uploader,
    Q: WorkQueue,
    S: Sleeper,
{
    pub fn new(extractor: E, uploader: U, queue: Q, sleeper: S, interval: Duration) -> Self {
        Self {
            extractor,
            uploader,
            queue,
            sleeper,
            interval,
            totals: CycleReport::default(),
            cycles: 0,
        }
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    pub fn uploader(&self) -> &U {
        &self.uploader
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// Sum of all completed cycles so far.
    pub fn totals(&self) -> CycleReport {
        self.totals
    }

    /// Number of cycles started by [`run`](Poller::run).
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Scan once and import every pending file, without sleeping.
    ///
    /// Files are taken in listing order, one at a time. Stops early (leaving
    /// the rest pending) if `cancel` fires between files.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleReport, QueueError> {
        let pending = self.queue.pending()?;
        let mut report = CycleReport {
            found: pending.len(),
            ..CycleReport::default()
        };

        for path in &pending {
            if cancel.is_cancelled() {
                tracing::info!(
                    remaining = pending.len() - report.imported - report.failed(),
                    "shutdown requested, leaving remaining files for the next run"
                );
                break;
            }
            let outcome = process_file(path, &self.extractor, &self.uploader, &self.queue).await;
            report.record(&outcome);
        }

        Ok(report)
    }

    /// Poll until `cancel` fires. Returns the accumulated totals.
    ///
    /// Every cycle ends with the same sleep, whether the folder was empty,
    /// every file failed, or the scan itself errored.
    pub async fn run(&mut self, cancel: &CancellationToken) -> CycleReport {
        tracing::info!(
            folder = %self.queue.describe(),
            interval_secs = self.interval.as_secs(),
            "starting auto-importer"
        );

        while !cancel.is_cancelled() {
            self.cycles += 1;
            match self.run_cycle(cancel).await {
                Ok(report) if report.found == 0 => {
                    tracing::info!(
                        folder = %self.queue.describe(),
                        sleep_secs = self.interval.as_secs(),
                        "no new PDFs, sleeping"
                    );
                }
                Ok(report) => {
                    self.totals.absorb(&report);
                    tracing::info!(
                        found = report.found,
                        imported = report.imported,
                        failed = report.failed(),
                        sleep_secs = self.interval.as_secs(),
                        "cycle complete, sleeping"
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, detail = ?e, "unexpected error in poll cycle");
                }
            }

            if cancel.is_cancelled() {
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.sleeper.sleep(self.interval) => {}
            }
        }

        tracing::info!(
            cycles = self.cycles,
            imported = self.totals.imported,
            failed = self.totals.failed(),
            "auto-importer stopped"
        );
        self.totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{
        ExtractResponse, MockExtractor, MockUploader, RecordingSleeper, UploadResponse,
    };
    use crate::queue::MemoryQueue;
    use std::path::PathBuf;

    const INTERVAL: Duration = Duration::from_secs(7 * 60);

    fn poller(
        queue: MemoryQueue,
        extractor: MockExtractor,
        uploader: MockUploader,
        sleeper: RecordingSleeper,
    ) -> Poller<MockExtractor, MockUploader, MemoryQueue, RecordingSleeper> {
        Poller::new(extractor, uploader, queue, sleeper, INTERVAL)
    }

    #[tokio::test]
    async fn empty_queue_sleeps_full_interval_without_requests() {
        let cancel = CancellationToken::new();
        let mut p = poller(
            MemoryQueue::default(),
            MockExtractor::new(ExtractResponse::FileStem),
            MockUploader::new(UploadResponse::Ok),
            RecordingSleeper::cancel_after(3, cancel.clone()),
        );

        let totals = p.run(&cancel).await;

        assert_eq!(p.sleeper().sleeps(), vec![INTERVAL; 3]);
        assert_eq!(p.cycles(), 3);
        assert_eq!(p.extractor().call_count(), 0);
        assert_eq!(p.uploader().call_count(), 0);
        assert_eq!(totals, CycleReport::default());
    }

    #[tokio::test]
    async fn files_processed_in_listing_order() {
        let cancel = CancellationToken::new();
        let p = poller(
            MemoryQueue::new(["/w/c.pdf", "/w/a.pdf", "/w/b.pdf"]),
            MockExtractor::new(ExtractResponse::FileStem),
            MockUploader::new(UploadResponse::Ok),
            RecordingSleeper::new(),
        );

        let report = p.run_cycle(&cancel).await.unwrap();

        assert_eq!(
            report,
            CycleReport {
                found: 3,
                imported: 3,
                ..CycleReport::default()
            }
        );
        let titles: Vec<String> = p.uploader().uploads().into_iter().map(|u| u.1).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
        assert!(p.sleeper().sleeps().is_empty());
    }

    #[tokio::test]
    async fn failed_upload_is_retried_next_cycle() {
        let cancel = CancellationToken::new();
        let mut p = poller(
            MemoryQueue::new(["/w/paper.pdf"]),
            MockExtractor::new(ExtractResponse::Title("Retry Me".into())),
            MockUploader::with_sequence(vec![UploadResponse::Status(500), UploadResponse::Ok]),
            RecordingSleeper::cancel_after(2, cancel.clone()),
        );

        let totals = p.run(&cancel).await;

        assert_eq!(p.uploader().call_count(), 2);
        assert_eq!(p.queue().done(), vec![PathBuf::from("/w/paper.pdf")]);
        assert_eq!(totals.found, 2);
        assert_eq!(totals.upload_failed, 1);
        assert_eq!(totals.imported, 1);
        // Failure did not shorten the wait.
        assert_eq!(p.sleeper().sleeps(), vec![INTERVAL, INTERVAL]);
    }

    #[tokio::test]
    async fn extraction_failure_never_reaches_uploader() {
        let cancel = CancellationToken::new();
        let mut p = poller(
            MemoryQueue::new(["/w/notes.pdf"]),
            MockExtractor::new(ExtractResponse::Status(502)),
            MockUploader::new(UploadResponse::Ok),
            RecordingSleeper::cancel_after(3, cancel.clone()),
        );

        let totals = p.run(&cancel).await;

        assert_eq!(p.extractor().call_count(), 3);
        assert_eq!(p.uploader().call_count(), 0);
        assert_eq!(totals.extract_failed, 3);
        assert_eq!(p.queue().pending().unwrap(), vec![PathBuf::from("/w/notes.pdf")]);
    }

    #[tokio::test]
    async fn newly_deposited_file_picked_up_later() {
        let cancel = CancellationToken::new();
        let p = poller(
            MemoryQueue::default(),
            MockExtractor::new(ExtractResponse::FileStem),
            MockUploader::new(UploadResponse::Ok),
            RecordingSleeper::new(),
        );

        assert_eq!(p.run_cycle(&cancel).await.unwrap().found, 0);
        p.queue().push("/w/late.pdf");
        let report = p.run_cycle(&cancel).await.unwrap();
        assert_eq!(report.imported, 1);
        assert_eq!(p.queue().done(), vec![PathBuf::from("/w/late.pdf")]);
    }

    #[tokio::test]
    async fn cancelled_before_start_does_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut p = poller(
            MemoryQueue::new(["/w/a.pdf"]),
            MockExtractor::new(ExtractResponse::FileStem),
            MockUploader::new(UploadResponse::Ok),
            RecordingSleeper::new(),
        );

        p.run(&cancel).await;

        assert_eq!(p.cycles(), 0);
        assert_eq!(p.extractor().call_count(), 0);
        assert!(p.sleeper().sleeps().is_empty());
    }

    #[tokio::test]
    async fn cancellation_between_files_leaves_rest_pending() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let p = poller(
            MemoryQueue::new(["/w/a.pdf", "/w/b.pdf"]),
            MockExtractor::new(ExtractResponse::FileStem),
            MockUploader::new(UploadResponse::Ok),
            RecordingSleeper::new(),
        );

        let report = p.run_cycle(&cancel).await.unwrap();

        assert_eq!(report.found, 2);
        assert_eq!(report.imported, 0);
        assert_eq!(p.queue().pending().unwrap().len(), 2);
    }

    #[test]
    fn totals_absorb_cycles() {
        let mut totals = CycleReport::default();
        totals.absorb(&CycleReport {
            found: 2,
            imported: 1,
            extract_failed: 1,
            upload_failed: 0,
        });
        totals.absorb(&CycleReport {
            found: 1,
            imported: 0,
            extract_failed: 0,
            upload_failed: 1,
        });
        assert_eq!(totals.found, 3);
        assert_eq!(totals.failed(), 2);
    }
}
