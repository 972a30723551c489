//! Collection pagination
//!
//! Page 1 teaches the page size. With an advertised item count that fixes the number of
//! pages; without one, pages are probed until one contributes no new id. An empty page
//! always wins over the advertised count, so collections that change mid-scan still stop.

use crate::error::{Error, Result};
use crate::locator::CollectionLocator;
use crate::pacing::pause;
use crate::session::CollectionBrowser;
use crate::types::{Event, ItemId};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Result of scanning a collection
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Discovery {
    /// Distinct item ids in first-seen order
    pub ids: Vec<ItemId>,
    /// `false` when a page failed or cancellation hit before the last page was scanned
    pub complete: bool,
}

/// Enumerates the distinct item ids of a collection, in first-seen order
pub struct PageDiscoverer {
    browser: Arc<dyn CollectionBrowser>,
    page_delay: Duration,
    event_tx: broadcast::Sender<Event>,
}

impl PageDiscoverer {
    /// Create a discoverer that waits `page_delay` between pages
    pub fn new(
        browser: Arc<dyn CollectionBrowser>,
        page_delay: Duration,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            browser,
            page_delay,
            event_tx,
        }
    }

    /// Scan the collection and return every distinct item id
    ///
    /// `known_total` is the advertised item count, if any. A failure on a later page ends
    /// pagination and keeps what was collected, marking the scan incomplete. Cancellation also
    /// ends pagination early; callers check the token afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Navigation`] if page 1 cannot be read. Run-fatal session errors
    /// ([`Error::is_run_fatal`]) are returned unchanged, from any page.
    pub async fn discover(
        &self,
        collection: &CollectionLocator,
        known_total: Option<u32>,
        cancel: &CancellationToken,
    ) -> Result<Discovery> {
        let mut seen = HashSet::new();
        let mut ids = Vec::new();

        let first_url = collection.page_url(1);
        let first = self
            .browser
            .page_item_ids(&first_url)
            .await
            .map_err(|e| match e {
                Error::Navigation { .. } => e,
                e if e.is_run_fatal() => e,
                other => Error::Navigation {
                    url: first_url.to_string(),
                    reason: other.to_string(),
                },
            })?;

        let items_per_page = collect_new(&mut seen, &mut ids, first);
        let total_pages = known_total
            .filter(|&total| total > 0 && items_per_page > 0)
            .map(|total| (total as usize).div_ceil(items_per_page) as u32);

        tracing::debug!(
            collection_id = %collection.collection_id,
            items_per_page,
            ?known_total,
            ?total_pages,
            "Scanned first page"
        );
        self.emit(1, total_pages, items_per_page);

        if items_per_page == 0 || total_pages.is_some_and(|pages| pages <= 1) {
            return Ok(Discovery {
                ids,
                complete: true,
            });
        }

        let mut page: u32 = 2;
        let complete = loop {
            if !pause(self.page_delay, cancel).await {
                tracing::info!(page, "Discovery interrupted by cancellation");
                break false;
            }

            let url = collection.page_url(page);
            let page_ids = match self.browser.page_item_ids(&url).await {
                Ok(page_ids) => page_ids,
                Err(e) if e.is_run_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(page, url = %url, error = %e, "Page failed, ending discovery");
                    break false;
                }
            };

            let added = collect_new(&mut seen, &mut ids, page_ids);
            tracing::debug!(page, added, total = ids.len(), "Scanned page");
            self.emit(page, total_pages, added);

            if added == 0 || total_pages.is_some_and(|pages| page >= pages) {
                break true;
            }
            page += 1;
        };

        Ok(Discovery { ids, complete })
    }

    fn emit(&self, page: u32, total_pages: Option<u32>, new_ids: usize) {
        self.event_tx
            .send(Event::PageScanned {
                page,
                total_pages,
                new_ids,
            })
            .ok();
    }
}

fn collect_new(seen: &mut HashSet<ItemId>, ids: &mut Vec<ItemId>, page: Vec<ItemId>) -> usize {
    let before = ids.len();
    for id in page {
        if seen.insert(id.clone()) {
            ids.push(id);
        }
    }
    ids.len() - before
}
