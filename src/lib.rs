//! # section-dl
//!
//! Resumable batch image harvester for storefront collections ("shop sections").
//!
//! ## Design Philosophy
//!
//! section-dl is designed to be:
//! - **Resumable** - Per-collection progress records survive crashes and interruptions
//! - **Polite** - Every page load and download is paced with jittered delays
//! - **Library-first** - The browser session is a trait; plug in any driver
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use section_dl::{BatchRequest, CollectionBrowser, Config, Harvester};
//! use std::sync::Arc;
//!
//! # async fn example(browser: Arc<dyn CollectionBrowser>) -> Result<(), Box<dyn std::error::Error>> {
//! let harvester = Harvester::with_http_fetcher(Config::default(), browser)?;
//!
//! // Subscribe to events
//! let mut events = harvester.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         println!("Event: {:?}", event);
//!     }
//! });
//!
//! let request = BatchRequest::new(
//!     vec!["https://www.etsy.com/shop/Shop?section_id=123".to_string()],
//!     "downloads",
//! );
//! let handle = harvester.spawn_batch(request);
//! section_dl::cancel_on_shutdown_signal(handle.cancellation_token());
//!
//! let summary = handle.join().await?;
//! println!("{} items saved", summary.succeeded());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Multi-page collection discovery
pub mod discovery;
/// Error types
pub mod error;
/// Batch orchestration
pub mod harvester;
/// Collection and item URLs
pub mod locator;
/// Output file naming
pub mod naming;
/// Jittered, cancellable delays
pub mod pacing;
/// Per-collection resume records
pub mod progress;
/// Image selection and title filtering
pub mod selection;
/// Browser session and image download seams
pub mod session;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, DelayConfig, FetchConfig, PacingConfig, SessionConfig};
pub use error::{Error, Result};
pub use harvester::{BatchHandle, BatchRequest, Harvester};
pub use selection::ImageSelection;
pub use session::{
    ChromeLauncher, CollectionBrowser, HttpImageFetcher, ImageFetcher, SessionHandle,
    SessionLauncher, start_session,
};
pub use types::{
    BatchSummary, CollectionInfo, CollectionJob, CollectionOutcome, CollectionStatus, Event,
    ItemId, ItemRecord, Phase, RunOutcome,
};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Cancel `token` when the process receives a termination signal
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// The watcher exits early once `token` is cancelled by someone else.
pub fn cancel_on_shutdown_signal(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = wait_for_signal() => {
                tracing::info!("Stopping after the current item");
                token.cancel();
            }
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn signal_watcher_exits_when_token_is_cancelled_elsewhere() {
        let token = CancellationToken::new();
        let watcher = cancel_on_shutdown_signal(token.clone());

        token.cancel();

        tokio::time::timeout(Duration::from_secs(1), watcher)
            .await
            .expect("watcher should exit")
            .unwrap();
    }
}
