//! Processing of a single item: extract, pick images, name, download

use crate::config::Config;
use crate::error::{Error, Result};
use crate::locator::item_url;
use crate::naming::{
    NameDeduplicator, dedupe_images, image_extension, image_file_name, sanitize_filename,
};
use crate::pacing::jittered;
use crate::selection::{ImageSelection, filter_title, select_all};
use crate::session::{CollectionBrowser, ImageFetcher};
use crate::types::{Event, ItemId, ItemRecord};
use std::path::Path;
use tokio::sync::broadcast;

/// A processed item with at least one image on disk
#[derive(Debug)]
pub(crate) struct ItemSuccess {
    pub(crate) images_written: usize,
    pub(crate) record: ItemRecord,
}

/// Everything one item needs, borrowed from the running collection
pub(crate) struct ItemProcessor<'a> {
    pub(crate) browser: &'a dyn CollectionBrowser,
    pub(crate) fetcher: &'a dyn ImageFetcher,
    pub(crate) config: &'a Config,
    pub(crate) event_tx: &'a broadcast::Sender<Event>,
    pub(crate) output_dir: &'a Path,
    pub(crate) selection: Option<&'a ImageSelection>,
    pub(crate) title_filter: &'a [String],
}

impl ItemProcessor<'_> {
    /// Process one item, honouring the optional per-item deadline
    pub(crate) async fn process(
        &self,
        item_id: &ItemId,
        names: &mut NameDeduplicator,
    ) -> Result<ItemSuccess> {
        match self.config.item_timeout {
            Some(limit) => tokio::time::timeout(limit, self.harvest(item_id, names))
                .await
                .unwrap_or_else(|_| {
                    Err(Error::ItemTimeout {
                        item_id: item_id.to_string(),
                        timeout: limit,
                    })
                }),
            None => self.harvest(item_id, names).await,
        }
    }

    async fn harvest(&self, item_id: &ItemId, names: &mut NameDeduplicator) -> Result<ItemSuccess> {
        let extraction_failed = |reason: &str| Error::Extraction {
            item_id: item_id.to_string(),
            reason: reason.to_string(),
        };

        let url = item_url(&self.config.item_url_base, item_id)?;
        let mut record = self
            .browser
            .extract_item(&url)
            .await?
            .ok_or_else(|| extraction_failed("page yielded no record"))?;

        let title = record
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| extraction_failed("no title"))?
            .to_string();

        record.image_urls = dedupe_images(&record.image_urls, self.config.fetch.max_images_per_item);
        if record.image_urls.is_empty() {
            return Err(extraction_failed("no images"));
        }

        let plan = match self.selection {
            Some(selection) => selection.plan(&record.image_urls),
            None => select_all(&record.image_urls),
        };

        if !plan.out_of_range.is_empty() {
            tracing::warn!(
                item_id = %item_id,
                available = record.image_urls.len(),
                skipped = ?plan.out_of_range,
                "Selected image indices exceed available images"
            );
            self.event_tx
                .send(Event::SelectionOutOfRange {
                    item_id: item_id.clone(),
                    indices: plan.out_of_range.clone(),
                })
                .ok();
        }
        if plan.selected.is_empty() {
            return Err(extraction_failed("none of the selected images exist"));
        }

        let name = sanitize_filename(&filter_title(&title, self.title_filter));
        let suffix = names.suffix_for(&name);

        tokio::fs::create_dir_all(self.output_dir).await?;

        let mut written = 0;
        for (position, (index, image_url)) in plan.selected.iter().enumerate() {
            if position > 0 {
                tokio::time::sleep(jittered(&self.config.pacing.image_delay)).await;
            }

            let file_name = image_file_name(&name, *index, &suffix, image_extension(image_url));
            let path = self.output_dir.join(file_name);

            match self.download(image_url, &path).await {
                Ok(()) => {
                    written += 1;
                    tracing::debug!(item_id = %item_id, path = %path.display(), "Saved image");
                    self.event_tx
                        .send(Event::ImageSaved {
                            item_id: item_id.clone(),
                            path,
                        })
                        .ok();
                }
                Err(e) => {
                    tracing::warn!(item_id = %item_id, index, error = %e, "Image download failed");
                    self.event_tx
                        .send(Event::ImageFailed {
                            item_id: item_id.clone(),
                            index: *index,
                            error: e.to_string(),
                        })
                        .ok();
                }
            }
        }

        if written == 0 {
            return Err(Error::ImageFetch {
                url: url.to_string(),
                reason: format!("none of {} selected images could be saved", plan.selected.len()),
            });
        }

        Ok(ItemSuccess {
            images_written: written,
            record,
        })
    }

    async fn download(&self, image_url: &str, path: &Path) -> Result<()> {
        let bytes = self.fetcher.fetch_bytes(image_url).await?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }
}
