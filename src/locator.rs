//! Collection and item URL handling
//!
//! Supported collection URL form:
//! `https://www.etsy.com/shop/{shop}?section_id={id}` (extra query parameters are kept).

use crate::error::{Error, Result};
use crate::types::ItemId;
use url::Url;

/// A parsed collection URL
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionLocator {
    /// The parsed URL
    pub url: Url,
    /// Shop name from the `/shop/{shop}` path segment
    pub shop_name: String,
    /// Collection id from the `section_id` query parameter
    pub collection_id: String,
}

impl CollectionLocator {
    /// URL of page `page` (1-based) of this collection
    pub fn page_url(&self, page: u32) -> Url {
        page_url(&self.url, page)
    }
}

/// Parse a collection URL into shop name and collection id
///
/// # Errors
///
/// Returns [`Error::InvalidLocator`] if the URL does not parse, has no `/shop/{shop}` path
/// segment, or carries no non-empty `section_id` query parameter.
pub fn parse_collection_url(raw: &str) -> Result<CollectionLocator> {
    let invalid = |reason: &str| Error::InvalidLocator {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;

    let shop_name = url
        .path_segments()
        .and_then(|mut segments| {
            segments.find(|s| *s == "shop")?;
            segments.next()
        })
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| invalid("no shop name in path"))?;

    let collection_id = url
        .query_pairs()
        .find(|(k, _)| k == "section_id")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| invalid("no section_id query parameter"))?;

    Ok(CollectionLocator {
        url,
        shop_name,
        collection_id,
    })
}

/// Build the URL of one collection page
///
/// Sets (or replaces) the `page` query parameter, keeps every other parameter once,
/// and drops the fragment.
pub fn page_url(collection_url: &Url, page: u32) -> Url {
    let mut seen = Vec::new();
    let mut pairs: Vec<(String, String)> = Vec::new();
    for (k, v) in collection_url.query_pairs() {
        if k == "page" || seen.contains(&k) {
            continue;
        }
        seen.push(k.clone());
        pairs.push((k.into_owned(), v.into_owned()));
    }
    pairs.push(("page".to_string(), page.to_string()));

    let mut url = collection_url.clone();
    url.set_fragment(None);
    url.query_pairs_mut().clear().extend_pairs(pairs);
    url
}

/// Build the URL of an item page from its id
///
/// # Errors
///
/// Returns [`Error::InvalidLocator`] if the base is not an absolute URL.
pub fn item_url(base: &str, item_id: &ItemId) -> Result<Url> {
    let base = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    };
    Url::parse(&base)
        .and_then(|b| b.join(item_id.as_str()))
        .map_err(|e| Error::InvalidLocator {
            url: format!("{base}{item_id}"),
            reason: e.to_string(),
        })
}
