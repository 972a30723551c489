//! In-memory storefront served through the public session traits

use async_trait::async_trait;
use chrono::Utc;
use section_dl::locator::CollectionLocator;
use section_dl::{CollectionBrowser, CollectionInfo, Error, ImageFetcher, ItemId, ItemRecord, Result};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use url::Url;

/// One shop section: label plus ids in page order
pub struct Section {
    pub label: String,
    pub pages: Vec<Vec<ItemId>>,
}

impl Section {
    /// `count` items numbered from 1, `page_size` per page
    pub fn numbered(label: &str, count: usize, page_size: usize) -> Self {
        let ids: Vec<ItemId> = (1..=count).map(|n| ItemId::new(format!("{n:04}"))).collect();
        Self {
            label: label.to_string(),
            pages: ids.chunks(page_size).map(<[ItemId]>::to_vec).collect(),
        }
    }

    fn total(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }
}

/// Storefront browser stub
///
/// Item pages yield two images each. A stop trigger cancels a token on the Nth extraction
/// of the current run, imitating a user pressing Ctrl+C while that item is open.
#[derive(Default)]
pub struct Storefront {
    sections: HashMap<String, Section>,
    stop_trigger: Mutex<Option<(usize, CancellationToken)>>,
    extracted: Mutex<Vec<ItemId>>,
}

impl Storefront {
    pub fn new(sections: Vec<(&str, Section)>) -> Self {
        Self {
            sections: sections
                .into_iter()
                .map(|(id, s)| (id.to_string(), s))
                .collect(),
            ..Self::default()
        }
    }

    /// Cancel `token` on the `nth` extraction from now on
    pub fn stop_after(&self, nth: usize, token: CancellationToken) {
        self.extracted.lock().unwrap().clear();
        *self.stop_trigger.lock().unwrap() = Some((nth, token));
    }

    /// Forget extraction history and any stop trigger
    pub fn reset(&self) {
        self.extracted.lock().unwrap().clear();
        *self.stop_trigger.lock().unwrap() = None;
    }

    pub fn extracted(&self) -> Vec<ItemId> {
        self.extracted.lock().unwrap().clone()
    }

    fn section_of(url: &Url) -> String {
        url.query_pairs()
            .find(|(k, _)| k == "section_id")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CollectionBrowser for Storefront {
    async fn navigate(&self, _url: &Url) -> Result<()> {
        Ok(())
    }

    async fn collection_info(&self, collection: &CollectionLocator) -> Result<CollectionInfo> {
        let section = self.sections.get(&collection.collection_id);
        Ok(CollectionInfo {
            label: section.map(|s| s.label.clone()),
            total_items: section.map(|s| s.total() as u32),
        })
    }

    async fn page_item_ids(&self, page_url: &Url) -> Result<Vec<ItemId>> {
        let page: usize = page_url
            .query_pairs()
            .find(|(k, _)| k == "page")
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(1);
        Ok(self
            .sections
            .get(&Self::section_of(page_url))
            .and_then(|s| s.pages.get(page - 1).cloned())
            .unwrap_or_default())
    }

    async fn extract_item(&self, item_url: &Url) -> Result<Option<ItemRecord>> {
        let item_id = ItemId::new(
            item_url
                .path_segments()
                .and_then(|mut s| s.next_back())
                .unwrap_or_default(),
        );
        let count = {
            let mut extracted = self.extracted.lock().unwrap();
            extracted.push(item_id.clone());
            extracted.len()
        };
        if let Some((nth, token)) = self.stop_trigger.lock().unwrap().as_ref()
            && *nth == count
        {
            token.cancel();
            return Ok(None);
        }

        Ok(Some(ItemRecord {
            title: Some(format!("Poster {item_id}")),
            shop_name: Some("Studio".to_string()),
            price: None,
            image_urls: (1..=2)
                .map(|k| format!("https://cdn.test/il_570xN.{item_id}{k}_x.jpg"))
                .collect(),
            source_url: item_url.to_string(),
            scraped_at: Utc::now(),
            item_id,
        }))
    }
}

/// Image fetcher that serves the URL itself as the body
#[derive(Default)]
pub struct EchoFetcher;

#[async_trait]
impl ImageFetcher for EchoFetcher {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        if url.is_empty() {
            return Err(Error::ImageFetch {
                url: String::new(),
                reason: "empty url".to_string(),
            });
        }
        Ok(url.as_bytes().to_vec())
    }
}

pub fn section_url(section_id: &str) -> String {
    format!("https://www.etsy.com/shop/Studio?section_id={section_id}")
}
