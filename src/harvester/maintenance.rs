//! Progress maintenance outside of a crawl

use super::Harvester;
use crate::error::Result;
use crate::locator::parse_collection_url;
use crate::progress::find_records;
use std::path::{Path, PathBuf};

impl Harvester {
    /// Delete the progress records of one collection so its next run starts over
    ///
    /// Scans the immediate subdirectories of `output_root` for records whose collection id
    /// matches `collection_url`. Images are left in place. Records that cannot be read are
    /// never deleted.
    ///
    /// Returns the removed record paths (empty if there were none).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLocator`](crate::Error::InvalidLocator) for a malformed URL,
    /// or an I/O error if the output root cannot be listed or a record cannot be removed.
    pub async fn clear_progress(output_root: &Path, collection_url: &str) -> Result<Vec<PathBuf>> {
        let locator = parse_collection_url(collection_url)?;
        let records = find_records(output_root, &locator.collection_id).await?;

        for path in &records {
            tokio::fs::remove_file(path).await?;
            tracing::info!(
                collection_id = %locator.collection_id,
                path = %path.display(),
                "Cleared progress record"
            );
        }

        if records.is_empty() {
            tracing::info!(
                collection_id = %locator.collection_id,
                output_root = %output_root.display(),
                "No progress record to clear"
            );
        }

        Ok(records)
    }
}
