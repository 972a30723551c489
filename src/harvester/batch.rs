//! Batch and collection orchestration

use super::item::ItemProcessor;
use super::{BatchRequest, Harvester};
use crate::config::DelayConfig;
use crate::discovery::PageDiscoverer;
use crate::error::{Error, Result};
use crate::locator::parse_collection_url;
use crate::naming::{NameDeduplicator, sanitize_folder_name};
use crate::pacing::{jittered, pause};
use crate::progress::{PROGRESS_FILE, ProgressStore, read_record};
use crate::types::{
    BatchSummary, CollectionInfo, CollectionJob, CollectionOutcome, CollectionStatus, Event,
    ItemId, Phase, RunOutcome,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

impl Harvester {
    /// Harvest every collection of `request`, one after another
    ///
    /// Item and collection failures are recorded in the summary and never abort the batch.
    /// Cancelling `cancel` stops the run after the in-flight item; everything flushed so far
    /// stays valid and the summary reports [`RunOutcome::Cancelled`].
    ///
    /// Runs on the same harvester never overlap: a second call waits for the first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the output root cannot be created. A run-fatal error
    /// ([`Error::is_run_fatal`], a lost browser session) ends the run immediately and is
    /// returned as is; progress flushed before it stays on disk for the next resumed run.
    pub async fn run_batch(
        &self,
        request: &BatchRequest,
        cancel: CancellationToken,
    ) -> Result<BatchSummary> {
        let _run = self.run_lock.lock().await;

        tokio::fs::create_dir_all(&request.output_root)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create output directory '{}': {}",
                        request.output_root.display(),
                        e
                    ),
                ))
            })?;

        let total = request.urls.len();
        tracing::info!(
            collections = total,
            output_root = %request.output_root.display(),
            resume = request.resume,
            "Starting batch"
        );

        let mut collections = Vec::with_capacity(total);
        let mut outcome = RunOutcome::Completed;

        for (position, url) in request.urls.iter().enumerate() {
            if cancel.is_cancelled() {
                outcome = RunOutcome::Cancelled;
                break;
            }
            if position > 0
                && !self
                    .wait(&self.config.pacing.collection_delay, &cancel)
                    .await
            {
                outcome = RunOutcome::Cancelled;
                break;
            }

            self.emit_event(Event::CollectionStarted {
                index: position + 1,
                total,
                url: url.clone(),
            });

            let result = match self.run_collection(position, url, request, &cancel).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(
                        url = %url,
                        completed_collections = collections.len(),
                        error = %e,
                        "Browser session lost, aborting batch"
                    );
                    self.emit_event(Event::CollectionSkipped {
                        url: url.clone(),
                        error: e.to_string(),
                    });
                    return Err(e);
                }
            };
            let cancelled = result.status == CollectionStatus::Cancelled;

            self.emit_event(Event::CollectionFinished {
                outcome: result.clone(),
            });
            collections.push(result);

            if cancelled {
                outcome = RunOutcome::Cancelled;
                break;
            }
        }

        let summary = BatchSummary {
            collections,
            outcome,
        };

        tracing::info!(
            outcome = ?summary.outcome,
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            skipped = summary.skipped(),
            collections_completed = summary.collections_completed(),
            "Batch finished"
        );
        self.emit_event(Event::BatchFinished {
            summary: summary.clone(),
        });

        Ok(summary)
    }

    /// Run one collection, turning collection-fatal errors into a failed outcome
    ///
    /// Only run-fatal errors come back as `Err`.
    async fn run_collection(
        &self,
        position: usize,
        url: &str,
        request: &BatchRequest,
        cancel: &CancellationToken,
    ) -> Result<CollectionOutcome> {
        let mut outcome = CollectionOutcome::pending(url);

        match self
            .harvest_collection(position, url, request, cancel, &mut outcome)
            .await
        {
            Ok(status) => outcome.status = status,
            Err(e) if e.is_run_fatal() => return Err(e),
            Err(e) => {
                tracing::error!(url = %url, error = %e, "Collection abandoned");
                self.emit_event(Event::CollectionSkipped {
                    url: url.to_string(),
                    error: e.to_string(),
                });
                outcome.status = CollectionStatus::Failed {
                    error: e.to_string(),
                };
                outcome.fully_completed = false;
            }
        }

        Ok(outcome)
    }

    async fn harvest_collection(
        &self,
        position: usize,
        url: &str,
        request: &BatchRequest,
        cancel: &CancellationToken,
        outcome: &mut CollectionOutcome,
    ) -> Result<CollectionStatus> {
        let locator = parse_collection_url(url)?;

        // The first collection is already open in the session the host started
        if position > 0 {
            self.browser
                .navigate(&locator.url)
                .await
                .map_err(|e| as_navigation(e, url))?;
        }

        let info = match self.browser.collection_info(&locator).await {
            Ok(info) => info,
            Err(e) if e.is_run_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Collection metadata unavailable");
                CollectionInfo::default()
            }
        };

        let label = collection_label(&info, &locator.shop_name, &locator.collection_id);
        let output_directory =
            resolve_output_directory(&request.output_root, &label, &locator.collection_id).await;
        outcome.collection_label = Some(label.clone());
        outcome.output_directory = Some(output_directory.clone());

        let job = CollectionJob {
            collection_url: url.to_string(),
            collection_label: label,
            shop_name: locator.shop_name.clone(),
            collection_id: locator.collection_id.clone(),
            output_directory,
        };

        tracing::info!(
            collection_id = %job.collection_id,
            label = %job.collection_label,
            dir = %job.output_directory.display(),
            "Processing collection"
        );

        let mut store = ProgressStore::new(&job);
        let completed = if request.resume {
            store.load().await?
        } else {
            HashSet::new()
        };

        let mut phase = Phase::Discovering;
        let discoverer = PageDiscoverer::new(
            self.browser.clone(),
            self.config.pacing.page_delay,
            self.event_tx.clone(),
        );
        let discovery = discoverer
            .discover(&locator, info.total_items, cancel)
            .await?;
        if cancel.is_cancelled() {
            return Ok(CollectionStatus::Cancelled);
        }
        let discovered = discovery.ids;
        if !discovery.complete {
            tracing::warn!(
                collection_id = %job.collection_id,
                found = discovered.len(),
                "Discovery ended early, collection cannot be reported complete"
            );
        }

        outcome.discovered = discovered.len();
        store.set_total_found(discovered.len());
        tracing::info!(collection_id = %job.collection_id, found = discovered.len(), "Discovery complete");
        self.emit_event(Event::DiscoveryComplete {
            found: discovered.len(),
        });

        if discovered.is_empty() {
            tracing::info!(collection_id = %job.collection_id, "Collection has no items");
            advance(&mut phase, Phase::Done);
            outcome.fully_completed = discovery.complete;
            return Ok(CollectionStatus::Finished);
        }

        advance(&mut phase, Phase::FilteringPending);
        let pending: Vec<ItemId> = discovered
            .iter()
            .filter(|id| !completed.contains(*id))
            .cloned()
            .collect();
        outcome.skipped = discovered.len() - pending.len();

        if outcome.skipped > 0 {
            tracing::info!(
                collection_id = %job.collection_id,
                skipped = outcome.skipped,
                pending = pending.len(),
                "Skipping items completed by a previous run"
            );
            self.emit_event(Event::ResumeSkipped {
                skipped: outcome.skipped,
            });
        }

        if pending.is_empty() {
            advance(&mut phase, Phase::Done);
            outcome.fully_completed = discovery.complete;
            return Ok(CollectionStatus::Finished);
        }

        advance(&mut phase, Phase::Processing);
        let status = self
            .process_pending(&job, &pending, request, cancel, &mut store, outcome)
            .await?;
        advance(&mut phase, Phase::Done);

        outcome.fully_completed =
            discovery.complete && discovered.iter().all(|id| store.is_completed(id));
        tracing::info!(
            collection_id = %job.collection_id,
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            skipped = outcome.skipped,
            completed = store.completed_count(),
            total = store.total_found(),
            "Collection finished"
        );

        Ok(status)
    }

    async fn process_pending(
        &self,
        job: &CollectionJob,
        pending: &[ItemId],
        request: &BatchRequest,
        cancel: &CancellationToken,
        store: &mut ProgressStore,
        outcome: &mut CollectionOutcome,
    ) -> Result<CollectionStatus> {
        let processor = ItemProcessor {
            browser: self.browser.as_ref(),
            fetcher: self.fetcher.as_ref(),
            config: &self.config,
            event_tx: &self.event_tx,
            output_dir: &job.output_directory,
            selection: request.selection.as_ref().filter(|s| !s.is_empty()),
            title_filter: &request.title_filter,
        };
        let mut names = NameDeduplicator::new();

        for (position, item_id) in pending.iter().enumerate() {
            if cancel.is_cancelled() {
                return Ok(CollectionStatus::Cancelled);
            }
            if position > 0 && !self.wait(&self.config.pacing.item_delay, cancel).await {
                return Ok(CollectionStatus::Cancelled);
            }

            self.emit_event(Event::ItemStarted {
                index: position + 1,
                total: pending.len(),
                item_id: item_id.clone(),
            });

            match processor.process(item_id, &mut names).await {
                Ok(success) => {
                    if let Err(e) = store.save(item_id.clone()).await {
                        tracing::error!(
                            path = %store.path().display(),
                            error = %e,
                            "Failed to record progress"
                        );
                        return Err(e);
                    }
                    outcome.succeeded += 1;
                    tracing::info!(
                        item_id = %item_id,
                        images = success.images_written,
                        index = position + 1,
                        total = pending.len(),
                        "Item completed"
                    );
                    self.emit_event(Event::ItemCompleted {
                        item_id: item_id.clone(),
                        images_written: success.images_written,
                        record: Box::new(success.record),
                    });
                }
                Err(e) if e.is_run_fatal() => {
                    tracing::error!(item_id = %item_id, error = %e, "Browser session lost");
                    return Err(e);
                }
                Err(e) => {
                    outcome.failed += 1;
                    tracing::warn!(item_id = %item_id, error = %e, "Item failed");
                    self.emit_event(Event::ItemFailed {
                        item_id: item_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if cancel.is_cancelled() {
            return Ok(CollectionStatus::Cancelled);
        }
        Ok(CollectionStatus::Finished)
    }

    /// Jittered, cancellable pause; `false` if cancelled
    async fn wait(&self, delay: &DelayConfig, cancel: &CancellationToken) -> bool {
        let delay = jittered(delay);
        if !delay.is_zero() {
            self.emit_event(Event::Waiting {
                delay_ms: delay.as_millis() as u64,
            });
        }
        pause(delay, cancel).await
    }
}

fn advance(phase: &mut Phase, next: Phase) {
    debug_assert!(next > *phase, "phase moved backwards: {phase:?} -> {next:?}");
    tracing::debug!(from = ?phase, to = ?next, "Collection phase");
    *phase = next;
}

fn as_navigation(e: Error, url: &str) -> Error {
    match e {
        Error::Navigation { .. } => e,
        e if e.is_run_fatal() => e,
        other => Error::Navigation {
            url: url.to_string(),
            reason: other.to_string(),
        },
    }
}

/// Display label of a collection, `{shop}_{collection_id}` when the page gives none
pub(crate) fn collection_label(info: &CollectionInfo, shop: &str, collection_id: &str) -> String {
    info.label
        .as_deref()
        .map(sanitize_folder_name)
        .filter(|label| !label.is_empty() && !label.eq_ignore_ascii_case("section"))
        .unwrap_or_else(|| sanitize_folder_name(&format!("{shop}_{collection_id}")))
}

/// `{root}/{label}`, or `{root}/{label}_{collection_id}` when that directory already
/// belongs to another collection
pub(crate) async fn resolve_output_directory(
    root: &Path,
    label: &str,
    collection_id: &str,
) -> PathBuf {
    let primary = root.join(label);
    match read_record(&primary.join(PROGRESS_FILE)).await {
        Ok(Some(record)) if record.collection_id != collection_id => {
            let alternate = root.join(format!("{label}_{collection_id}"));
            tracing::info!(
                taken_by = %record.collection_id,
                dir = %alternate.display(),
                "Directory belongs to another collection, using suffixed directory"
            );
            alternate
        }
        _ => primary,
    }
}
