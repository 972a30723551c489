//! Shared fakes for harvester tests.

use super::Harvester;
use crate::config::{Config, PacingConfig};
use crate::error::{Error, Result};
use crate::locator::CollectionLocator;
use crate::session::{CollectionBrowser, ImageFetcher};
use crate::types::{CollectionInfo, ItemId, ItemRecord};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// One collection served by [`FakeBrowser`]
#[derive(Clone, Debug, Default)]
pub(crate) struct FakeCollection {
    pub(crate) label: Option<String>,
    pub(crate) total: Option<u32>,
    pub(crate) pages: Vec<Vec<ItemId>>,
    /// 1-based page whose read fails with a navigation error
    pub(crate) failing_page: Option<usize>,
}

impl FakeCollection {
    /// `count` items with ids `{collection_id * 1000 + n}`, split into pages of `page_size`,
    /// advertising the true total
    pub(crate) fn with_items(label: &str, collection_id: u32, count: usize, page_size: usize) -> Self {
        let ids: Vec<ItemId> = (1..=count)
            .map(|n| ItemId::new((collection_id as usize * 1000 + n).to_string()))
            .collect();
        Self {
            label: Some(label.to_string()),
            total: Some(count as u32),
            pages: ids.chunks(page_size).map(<[ItemId]>::to_vec).collect(),
            failing_page: None,
        }
    }
}

/// Scriptable [`CollectionBrowser`]
///
/// Every item has a title derived from its id and three images unless overridden.
#[derive(Default)]
pub(crate) struct FakeBrowser {
    pub(crate) collections: HashMap<String, FakeCollection>,
    /// Replacement extraction results (None = page yields no record)
    pub(crate) records: HashMap<ItemId, Option<ItemRecord>>,
    /// Replacement titles
    pub(crate) titles: HashMap<ItemId, String>,
    /// Number of images per item
    pub(crate) images_per_item: Option<usize>,
    /// Collection ids whose navigation fails
    pub(crate) failing_navigation: HashSet<String>,
    /// Every page read reports a dead browser session
    pub(crate) session_lost: bool,
    /// The Nth extraction (1-based) reports a dead browser session
    pub(crate) session_lost_at_extract: Option<usize>,
    /// Cancel the token on the Nth extraction (1-based) and yield no record for it
    pub(crate) cancel_on_extract: Option<(usize, CancellationToken)>,
    /// Simulated extraction latency
    pub(crate) extract_delay: Duration,
    pub(crate) navigations: Mutex<Vec<String>>,
    pub(crate) extracted: Mutex<Vec<ItemId>>,
}

impl FakeBrowser {
    pub(crate) fn new(collections: Vec<(&str, FakeCollection)>) -> Self {
        Self {
            collections: collections
                .into_iter()
                .map(|(id, c)| (id.to_string(), c))
                .collect(),
            ..Self::default()
        }
    }

    pub(crate) fn extracted(&self) -> Vec<ItemId> {
        self.extracted.lock().unwrap().clone()
    }

    pub(crate) fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }

    pub(crate) fn default_record(&self, item_id: &ItemId, source_url: &Url) -> ItemRecord {
        let images = self.images_per_item.unwrap_or(3);
        ItemRecord {
            item_id: item_id.clone(),
            title: Some(
                self.titles
                    .get(item_id)
                    .cloned()
                    .unwrap_or_else(|| format!("Print {item_id}")),
            ),
            shop_name: Some("TestShop".to_string()),
            price: Some("12.00".to_string()),
            image_urls: (1..=images)
                .map(|k| format!("https://img.test/r/il_794xN.{item_id}0{k}_ab.jpg"))
                .collect(),
            source_url: source_url.to_string(),
            scraped_at: Utc::now(),
        }
    }
}

fn section_id(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == "section_id")
        .map(|(_, v)| v.into_owned())
}

#[async_trait]
impl CollectionBrowser for FakeBrowser {
    async fn navigate(&self, url: &Url) -> Result<()> {
        let id = section_id(url).unwrap_or_default();
        self.navigations.lock().unwrap().push(id.clone());
        if self.failing_navigation.contains(&id) {
            return Err(Error::Navigation {
                url: url.to_string(),
                reason: "net::ERR_CONNECTION_RESET".to_string(),
            });
        }
        Ok(())
    }

    async fn collection_info(&self, collection: &CollectionLocator) -> Result<CollectionInfo> {
        self.collections
            .get(&collection.collection_id)
            .map(|c| CollectionInfo {
                label: c.label.clone(),
                total_items: c.total,
            })
            .ok_or_else(|| Error::Navigation {
                url: collection.url.to_string(),
                reason: "unknown collection".to_string(),
            })
    }

    async fn page_item_ids(&self, page_url: &Url) -> Result<Vec<ItemId>> {
        if self.session_lost {
            return Err(lost_session());
        }
        let id = section_id(page_url).unwrap_or_default();
        let page: usize = page_url
            .query_pairs()
            .find(|(k, _)| k == "page")
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(1);

        let collection = self.collections.get(&id).ok_or_else(|| Error::Navigation {
            url: page_url.to_string(),
            reason: "404".to_string(),
        })?;
        if collection.failing_page == Some(page) {
            return Err(Error::Navigation {
                url: page_url.to_string(),
                reason: "timed out waiting for listings".to_string(),
            });
        }
        Ok(collection.pages.get(page - 1).cloned().unwrap_or_default())
    }

    async fn extract_item(&self, item_url: &Url) -> Result<Option<ItemRecord>> {
        if !self.extract_delay.is_zero() {
            tokio::time::sleep(self.extract_delay).await;
        }

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

        if self.session_lost_at_extract == Some(count) {
            return Err(lost_session());
        }

        if let Some((n, token)) = &self.cancel_on_extract
            && *n == count
        {
            token.cancel();
            return Ok(None);
        }

        if let Some(record) = self.records.get(&item_id) {
            return Ok(record.clone());
        }
        Ok(Some(self.default_record(&item_id, item_url)))
    }
}

fn lost_session() -> Error {
    Error::Launch("browser disconnected".to_string())
}

/// [`ImageFetcher`] that returns the URL as the body, failing for chosen URLs
#[derive(Default)]
pub(crate) struct FakeFetcher {
    pub(crate) failing: HashSet<String>,
    pub(crate) fetched: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub(crate) fn failing(urls: impl IntoIterator<Item = String>) -> Self {
        Self {
            failing: urls.into_iter().collect(),
            ..Self::default()
        }
    }

    pub(crate) fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageFetcher for FakeFetcher {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        self.fetched.lock().unwrap().push(url.to_string());
        if self.failing.contains(url) {
            return Err(Error::ImageFetch {
                url: url.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            });
        }
        Ok(url.as_bytes().to_vec())
    }
}

/// Config with every delay disabled
pub(crate) fn fast_config() -> Config {
    Config {
        pacing: PacingConfig::none(),
        ..Config::default()
    }
}

pub(crate) fn create_test_harvester(
    browser: Arc<FakeBrowser>,
    fetcher: Arc<FakeFetcher>,
) -> Harvester {
    Harvester::new(fast_config(), browser, fetcher).unwrap()
}

pub(crate) fn collection_url(collection_id: &str) -> String {
    format!("https://www.etsy.com/shop/TestShop?section_id={collection_id}")
}

/// Sorted file names in `dir`, skipping hidden files
pub(crate) fn image_files(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| !n.starts_with('.'))
        .collect();
    names.sort();
    names
}
