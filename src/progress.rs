//! Durable per-collection progress
//!
//! Each collection directory holds one hidden JSON record listing the items that completed.
//! Every successful item rewrites the whole record (temp file, fsync, rename) before the
//! harvester moves on, so a crash loses at most the item that was in flight.
//!
//! One writer per directory is assumed. Nothing here locks the record.

use crate::error::{Error, Result};
use crate::types::{CollectionJob, ItemId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// File name of the progress record inside a collection directory
pub const PROGRESS_FILE: &str = ".progress.json";

/// Persisted state of one collection
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// Collection URL the record belongs to
    #[serde(alias = "section_url")]
    pub collection_url: String,

    /// Collection label at the time of the run
    #[serde(default)]
    pub collection_label: String,

    /// Shop the collection belongs to
    #[serde(default)]
    pub shop_name: String,

    /// Collection id (used to detect directories owned by another collection)
    #[serde(alias = "section_id")]
    pub collection_id: String,

    /// First successful save; never overwritten
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,

    /// Most recent save
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    /// Items that completed successfully
    #[serde(default)]
    pub completed_ids: BTreeSet<ItemId>,

    /// Number of items found by the last discovery
    #[serde(default)]
    pub total_found: usize,
}

impl ProgressRecord {
    fn for_job(job: &CollectionJob) -> Self {
        Self {
            collection_url: job.collection_url.clone(),
            collection_label: job.collection_label.clone(),
            shop_name: job.shop_name.clone(),
            collection_id: job.collection_id.clone(),
            started_at: None,
            updated_at: None,
            completed_ids: BTreeSet::new(),
            total_found: 0,
        }
    }
}

/// Progress record of one collection, bound to its output directory
#[derive(Debug)]
pub struct ProgressStore {
    path: PathBuf,
    record: ProgressRecord,
}

impl ProgressStore {
    /// Create an empty store for `job` (nothing is read or written yet)
    pub fn new(job: &CollectionJob) -> Self {
        Self {
            path: job.output_directory.join(PROGRESS_FILE),
            record: ProgressRecord::for_job(job),
        }
    }

    /// Location of the durable record
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// In-memory view of the record
    pub fn record(&self) -> &ProgressRecord {
        &self.record
    }

    /// Load the durable record, returning the completed ids
    ///
    /// A missing record yields an empty set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptProgress`] if the record exists but cannot be parsed.
    /// The file is left in place.
    pub async fn load(&mut self) -> Result<HashSet<ItemId>> {
        let Some(stored) = read_record(&self.path).await? else {
            tracing::debug!(path = %self.path.display(), "No progress record, starting fresh");
            return Ok(HashSet::new());
        };

        self.record.started_at = stored.started_at;
        self.record.updated_at = stored.updated_at;
        self.record.completed_ids = stored.completed_ids;
        self.record.total_found = stored.total_found;

        tracing::info!(
            path = %self.path.display(),
            completed = self.record.completed_ids.len(),
            "Loaded progress record"
        );

        Ok(self.record.completed_ids.iter().cloned().collect())
    }

    /// Mark `item_id` completed and flush the full record to disk
    ///
    /// Saving an id that is already present only refreshes `updated_at`.
    pub async fn save(&mut self, item_id: ItemId) -> Result<()> {
        let now = Utc::now();
        let started_at = *self.record.started_at.get_or_insert(now);
        self.record.updated_at = Some(now.max(started_at));
        self.record.completed_ids.insert(item_id);

        write_record(&self.path, &self.record).await
    }

    /// Record how many items discovery found (written with the next save)
    pub fn set_total_found(&mut self, total: usize) {
        self.record.total_found = total;
    }

    /// Delete the durable record and forget all progress
    pub async fn clear(&mut self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.record.started_at = None;
        self.record.updated_at = None;
        self.record.completed_ids.clear();
        self.record.total_found = 0;
        Ok(())
    }

    /// Number of completed items
    pub fn completed_count(&self) -> usize {
        self.record.completed_ids.len()
    }

    /// Number of items found by discovery
    pub fn total_found(&self) -> usize {
        self.record.total_found
    }

    /// Whether `item_id` is recorded as completed
    pub fn is_completed(&self, item_id: &ItemId) -> bool {
        self.record.completed_ids.contains(item_id)
    }
}

/// Read a progress record, `None` if the file does not exist
///
/// # Errors
///
/// Returns [`Error::CorruptProgress`] when the file exists but is not a valid record.
pub async fn read_record(path: &Path) -> Result<Option<ProgressRecord>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| Error::CorruptProgress {
            path: path.to_path_buf(),
            source,
        })
}

async fn write_record(path: &Path, record: &ProgressRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let json = serde_json::to_vec_pretty(record)?;
    let temp_path = path.with_extension("json.tmp");

    let mut file = tokio::fs::File::create(&temp_path).await?;
    file.write_all(&json).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&temp_path, path).await?;
    Ok(())
}

/// Progress records directly under `output_root` that belong to `collection_id`
///
/// Only immediate subdirectories are inspected. Unreadable or corrupt records are skipped.
pub async fn find_records(output_root: &Path, collection_id: &str) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();

    let mut entries = match tokio::fs::read_dir(output_root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(found),
        Err(e) => return Err(e.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let path = entry.path().join(PROGRESS_FILE);
        match read_record(&path).await {
            Ok(Some(record)) if record.collection_id == collection_id => found.push(path),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable progress record");
            }
        }
    }

    found.sort();
    Ok(found)
}
