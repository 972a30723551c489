//! Core types for section-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Opaque identifier of one listing within a collection
///
/// Stable across runs; used as the resume key in the progress record.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    /// Create a new ItemId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One unit of batch work: a single collection and where its output goes
///
/// Created once per collection before processing begins; immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionJob {
    /// Collection URL as supplied by the caller
    pub collection_url: String,
    /// Human-readable label (collection name, or `{shop}_{id}` when unknown)
    pub collection_label: String,
    /// Shop (storefront) the collection belongs to
    pub shop_name: String,
    /// Collection id within the shop
    pub collection_id: String,
    /// Directory that receives images and the progress record
    pub output_directory: PathBuf,
}

/// Metadata advertised by the collection page
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    /// Display name of the collection, if the page shows one
    pub label: Option<String>,
    /// Advertised number of items, if the page shows one
    pub total_items: Option<u32>,
}

/// Data extracted from one item page
///
/// Transient: the harvester does not persist it; hosts receive it through events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Item the record belongs to
    pub item_id: ItemId,
    /// Listing title (required for success)
    pub title: Option<String>,
    /// Shop name as shown on the item page
    pub shop_name: Option<String>,
    /// Price text as shown on the item page
    pub price: Option<String>,
    /// Ordered image URLs (required for success)
    pub image_urls: Vec<String>,
    /// Page the record was extracted from
    pub source_url: String,
    /// Extraction time
    pub scraped_at: DateTime<Utc>,
}

/// Phase of a collection within a batch
///
/// Transitions only move forward: `Discovering -> FilteringPending -> Processing -> Done`,
/// with early exits to `Done` when nothing was found or everything is already complete.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Paginating the collection to enumerate item ids
    Discovering,
    /// Removing items that a previous run already completed
    FilteringPending,
    /// Processing pending items one at a time
    Processing,
    /// Finished (successfully, early, or after a collection-fatal error)
    Done,
}

/// How a collection ended
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CollectionStatus {
    /// The collection ran to the end of its pending list
    Finished,
    /// A stop request was observed before the pending list was exhausted
    Cancelled,
    /// A collection-fatal error prevented processing
    Failed {
        /// Error message
        error: String,
    },
}

/// Result of one collection
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionOutcome {
    /// Collection URL as supplied
    pub collection_url: String,
    /// Resolved label (None if the URL could not be parsed)
    pub collection_label: Option<String>,
    /// Output directory (None if the collection failed before one was chosen)
    pub output_directory: Option<PathBuf>,
    /// How the collection ended
    pub status: CollectionStatus,
    /// Number of distinct items discovered
    pub discovered: usize,
    /// Items processed successfully in this run
    pub succeeded: usize,
    /// Items that failed in this run
    pub failed: usize,
    /// Items skipped because a previous run completed them
    pub skipped: usize,
    /// Whether every item is now recorded as completed (false when discovery ended early)
    pub fully_completed: bool,
}

impl CollectionOutcome {
    /// Empty outcome for a collection that has not run yet
    pub(crate) fn pending(collection_url: &str) -> Self {
        Self {
            collection_url: collection_url.to_string(),
            collection_label: None,
            output_directory: None,
            status: CollectionStatus::Finished,
            discovered: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            fully_completed: false,
        }
    }
}

/// Whether a batch ran to completion or was stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    /// Every collection was attempted
    Completed,
    /// A stop request ended the batch early
    Cancelled,
}

/// End-of-run summary across all collections
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Per-collection results in batch order
    pub collections: Vec<CollectionOutcome>,
    /// Completed or cancelled
    pub outcome: RunOutcome,
}

impl BatchSummary {
    /// Total items processed successfully
    pub fn succeeded(&self) -> usize {
        self.collections.iter().map(|c| c.succeeded).sum()
    }

    /// Total items that failed
    pub fn failed(&self) -> usize {
        self.collections.iter().map(|c| c.failed).sum()
    }

    /// Total items skipped as already completed
    pub fn skipped(&self) -> usize {
        self.collections.iter().map(|c| c.skipped).sum()
    }

    /// Number of collections whose every discovered item is complete
    pub fn collections_completed(&self) -> usize {
        self.collections.iter().filter(|c| c.fully_completed).count()
    }
}

/// Event emitted during a batch run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A collection is about to be processed
    CollectionStarted {
        /// 1-based position in the batch
        index: usize,
        /// Number of collections in the batch
        total: usize,
        /// Collection URL
        url: String,
    },

    /// A collection was abandoned because of a collection-fatal error
    CollectionSkipped {
        /// Collection URL
        url: String,
        /// Error message
        error: String,
    },

    /// One page of the collection was scanned during discovery
    PageScanned {
        /// 1-based page number
        page: u32,
        /// Expected number of pages, if known
        #[serde(skip_serializing_if = "Option::is_none")]
        total_pages: Option<u32>,
        /// Distinct ids this page contributed
        new_ids: usize,
    },

    /// Discovery finished
    DiscoveryComplete {
        /// Distinct ids found
        found: usize,
    },

    /// Items already completed by a previous run were skipped
    ResumeSkipped {
        /// Number of skipped items
        skipped: usize,
    },

    /// An item is about to be processed
    ItemStarted {
        /// 1-based position among pending items
        index: usize,
        /// Number of pending items
        total: usize,
        /// Item id
        item_id: ItemId,
    },

    /// One image was written to disk
    ImageSaved {
        /// Item id
        item_id: ItemId,
        /// Written file
        path: PathBuf,
    },

    /// One image could not be fetched or written
    ImageFailed {
        /// Item id
        item_id: ItemId,
        /// 1-based image index
        index: usize,
        /// Error message
        error: String,
    },

    /// Requested image indices exceed the number of images the item has
    SelectionOutOfRange {
        /// Item id
        item_id: ItemId,
        /// The skipped 1-based indices
        indices: Vec<usize>,
    },

    /// An item succeeded and its completion was flushed to the progress record
    ItemCompleted {
        /// Item id
        item_id: ItemId,
        /// Number of images written
        images_written: usize,
        /// Extracted data, for hosts that persist raw records
        record: Box<ItemRecord>,
    },

    /// An item failed
    ItemFailed {
        /// Item id
        item_id: ItemId,
        /// Error message
        error: String,
    },

    /// The harvester is pausing before the next unit of work
    Waiting {
        /// Delay in milliseconds
        delay_ms: u64,
    },

    /// A collection finished
    CollectionFinished {
        /// Collection result
        outcome: CollectionOutcome,
    },

    /// The batch finished
    BatchFinished {
        /// Run summary
        summary: BatchSummary,
    },
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(succeeded: usize, failed: usize, skipped: usize, full: bool) -> CollectionOutcome {
        CollectionOutcome {
            collection_url: "https://www.etsy.com/shop/A?section_id=1".to_string(),
            collection_label: Some("A".to_string()),
            output_directory: None,
            status: CollectionStatus::Finished,
            discovered: succeeded + failed + skipped,
            succeeded,
            failed,
            skipped,
            fully_completed: full,
        }
    }

    #[test]
    fn item_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&ItemId::new("1234567890")).unwrap();
        assert_eq!(json, "\"1234567890\"");
    }

    #[test]
    fn phases_are_ordered_forward() {
        assert!(Phase::Discovering < Phase::FilteringPending);
        assert!(Phase::FilteringPending < Phase::Processing);
        assert!(Phase::Processing < Phase::Done);
    }

    #[test]
    fn summary_aggregates_across_collections() {
        let summary = BatchSummary {
            collections: vec![outcome(10, 2, 5, false), outcome(3, 0, 0, true)],
            outcome: RunOutcome::Completed,
        };

        assert_eq!(summary.succeeded(), 13);
        assert_eq!(summary.failed(), 2);
        assert_eq!(summary.skipped(), 5);
        assert_eq!(summary.collections_completed(), 1);
    }

    #[test]
    fn event_is_tagged_with_snake_case_type() {
        let event = Event::ResumeSkipped { skipped: 15 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "resume_skipped");
        assert_eq!(json["skipped"], 15);
    }

    #[test]
    fn page_scanned_omits_unknown_total() {
        let event = Event::PageScanned {
            page: 2,
            total_pages: None,
            new_ids: 20,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("total_pages").is_none());
    }

    #[test]
    fn failed_collection_status_carries_error() {
        let mut failed = CollectionOutcome::pending("bad");
        failed.status = CollectionStatus::Failed {
            error: "invalid".to_string(),
        };
        let json = serde_json::to_value(&failed.status).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "invalid");
        assert!(!failed.fully_completed);
    }
}
