//! Collaborators the harvester drives: the browser session and the image fetcher
//!
//! The harvester never touches a DOM or a socket directly. It talks to three seams:
//! - [`CollectionBrowser`] navigates the shared browser page and extracts ids and item data
//! - [`ImageFetcher`] downloads image bytes
//! - [`SessionLauncher`] starts a debuggable browser and reports when it is reachable
//!
//! [`HttpImageFetcher`] and [`ChromeLauncher`] are the production implementations of the
//! last two. DOM extraction belongs to the host, which knows the marketplace markup.

mod chrome;
mod http;

pub use chrome::{ChromeLauncher, await_debug_endpoint, find_browser};
pub use http::HttpImageFetcher;

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::locator::CollectionLocator;
use crate::types::{CollectionInfo, ItemId, ItemRecord};
use async_trait::async_trait;
use url::Url;

/// The single, stateful browser page the harvester works through
///
/// Implementations are driven from one task at a time. Never share one session between two
/// concurrently running batches.
#[async_trait]
pub trait CollectionBrowser: Send + Sync {
    /// Load `url` in the shared page
    ///
    /// # Errors
    ///
    /// Returns [`Error::Navigation`] if the page cannot be loaded.
    async fn navigate(&self, url: &Url) -> Result<()>;

    /// Label and advertised item count of a collection
    ///
    /// Both fields may be unknown; an error is treated the same as "nothing known".
    async fn collection_info(&self, collection: &CollectionLocator) -> Result<CollectionInfo>;

    /// Item ids shown on one collection page, in page order
    async fn page_item_ids(&self, page_url: &Url) -> Result<Vec<ItemId>>;

    /// Extract one item page
    ///
    /// `Ok(None)` means the page loaded but yielded no usable record.
    async fn extract_item(&self, item_url: &Url) -> Result<Option<ItemRecord>>;
}

/// Downloads image bytes
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch the body of `url`
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageFetch`] on transport errors, timeouts and non-success statuses.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

/// Starts a browser that exposes a remote debugging endpoint
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    /// Launch the browser on `port`, opening `initial_url`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Launch`] if no browser could be started.
    async fn launch(&self, initial_url: &str, port: u16) -> Result<SessionHandle>;

    /// Wait until the debugging endpoint on `port` answers, giving up after `timeout`
    async fn await_ready(&self, port: u16, timeout: std::time::Duration) -> bool;

    /// Human-readable name for logging
    fn name(&self) -> &str;
}

/// A launched (or attached) browser session
#[derive(Debug)]
pub struct SessionHandle {
    port: u16,
    child: Option<tokio::process::Child>,
}

impl SessionHandle {
    /// Handle for a browser process spawned by this crate
    pub fn spawned(port: u16, child: tokio::process::Child) -> Self {
        Self {
            port,
            child: Some(child),
        }
    }

    /// Handle for a browser the host started itself
    pub fn attached(port: u16) -> Self {
        Self { port, child: None }
    }

    /// Remote debugging port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// OS process id, if this crate spawned the browser and it is still running
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|c| c.id())
    }

    /// Kill the browser process if this crate spawned it
    pub async fn terminate(&mut self) -> Result<()> {
        if let Some(mut child) = self.child.take() {
            tracing::info!(port = self.port, "Terminating browser session");
            match child.kill().await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// Launch a browser and wait for its debugging endpoint
///
/// After this returns, the host lets the user sign in or solve any challenge and confirms
/// readiness before calling [`Harvester::run_batch`](crate::Harvester::run_batch). That
/// confirmation has no deadline.
///
/// # Errors
///
/// Returns [`Error::Launch`] if the browser cannot be started, or [`Error::ReadinessTimeout`]
/// if it does not become reachable within `config.ready_timeout` (the process is killed).
pub async fn start_session(
    launcher: &dyn SessionLauncher,
    config: &SessionConfig,
    initial_url: &str,
) -> Result<SessionHandle> {
    tracing::info!(
        launcher = launcher.name(),
        port = config.port,
        url = %initial_url,
        "Starting browser session"
    );

    let mut handle = launcher.launch(initial_url, config.port).await?;

    if !launcher.await_ready(config.port, config.ready_timeout).await {
        tracing::error!(
            port = config.port,
            timeout_secs = config.ready_timeout.as_secs(),
            "Browser debugging endpoint never became ready"
        );
        if let Err(e) = handle.terminate().await {
            tracing::warn!(error = %e, "Failed to terminate unready browser");
        }
        return Err(Error::ReadinessTimeout {
            port: config.port,
            timeout: config.ready_timeout,
        });
    }

    tracing::info!(port = config.port, "Browser session ready");
    Ok(handle)
}
