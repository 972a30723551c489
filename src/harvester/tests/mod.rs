use super::test_helpers::*;
use super::*;
use crate::progress::{PROGRESS_FILE, read_record};
use crate::selection::ImageSelection;
use crate::types::{CollectionStatus, ItemId, RunOutcome};
use std::sync::Arc;
use tempfile::TempDir;


/// Drain every event currently buffered on `rx`
fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn request(urls: &[String], root: &TempDir) -> BatchRequest {
    BatchRequest::new(urls.to_vec(), root.path())
}
