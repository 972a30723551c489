//! The harvester: batch orchestration over one browser session
//!
//! A [`Harvester`] owns the collaborators and the event channel. Each batch runs
//! sequentially on the calling task (or one background task via [`Harvester::spawn_batch`]):
//! collections one after another, items one after another.

mod batch;
mod item;
mod maintenance;
mod request;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use request::BatchRequest;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::session::{CollectionBrowser, HttpImageFetcher, ImageFetcher};
use crate::types::{BatchSummary, Event};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Batch orchestrator (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Harvester {
    /// Configuration shared with every run
    pub(crate) config: Arc<Config>,
    /// Browser session all collection and item pages go through
    pub(crate) browser: Arc<dyn CollectionBrowser>,
    /// Image downloader
    pub(crate) fetcher: Arc<dyn ImageFetcher>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Held for the duration of a batch so runs never overlap on the shared session
    run_lock: Arc<tokio::sync::Mutex<()>>,
}

impl Harvester {
    /// Create a harvester over an existing browser session
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid.
    pub fn new(
        config: Config,
        browser: Arc<dyn CollectionBrowser>,
        fetcher: Arc<dyn ImageFetcher>,
    ) -> Result<Self> {
        config.validate()?;
        let (event_tx, _rx) = broadcast::channel(config.event_buffer);

        Ok(Self {
            config: Arc::new(config),
            browser,
            fetcher,
            event_tx,
            run_lock: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    /// Create a harvester that downloads images with [`HttpImageFetcher`]
    pub fn with_http_fetcher(config: Config, browser: Arc<dyn CollectionBrowser>) -> Result<Self> {
        let fetcher = Arc::new(HttpImageFetcher::new(&config.fetch)?);
        Self::new(config, browser, fetcher)
    }

    /// Subscribe to harvester events
    ///
    /// Every subscriber receives every event emitted after it subscribed. Slow subscribers
    /// that fall more than `event_buffer` events behind miss the oldest ones.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run `request` on a background task
    ///
    /// The returned handle cancels and awaits the run.
    pub fn spawn_batch(&self, request: BatchRequest) -> BatchHandle {
        let cancel = CancellationToken::new();
        let harvester = self.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move { harvester.run_batch(&request, token).await });
        BatchHandle { cancel, task }
    }

    pub(crate) fn emit_event(&self, event: Event) {
        // send() returns Err if there are no receivers, which is fine - we just drop the event
        self.event_tx.send(event).ok();
    }
}

/// A batch running on a background task
#[derive(Debug)]
pub struct BatchHandle {
    cancel: CancellationToken,
    task: JoinHandle<Result<BatchSummary>>,
}

impl BatchHandle {
    /// Ask the batch to stop after the in-flight item
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that stops this batch when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the batch to finish
    pub async fn join(self) -> Result<BatchSummary> {
        self.task
            .await
            .map_err(|e| Error::Io(std::io::Error::other(format!("batch task failed: {e}"))))?
    }
}
