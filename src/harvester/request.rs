//! Batch request: what to harvest and where

use crate::error::{Error, Result};
use crate::selection::{ImageSelection, parse_filter_words};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One batch of collections to harvest
///
/// Pacing between items and collections comes from [`Config::pacing`](crate::Config).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Collection URLs, processed in order
    pub urls: Vec<String>,
    /// Directory that receives one subdirectory per collection
    pub output_root: PathBuf,
    /// 1-based image indices to download per item (None or empty = all images)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<ImageSelection>,
    /// Words removed from titles before they become file names
    #[serde(default)]
    pub title_filter: Vec<String>,
    /// Skip items a previous run already completed (default: true)
    #[serde(default = "default_resume")]
    pub resume: bool,
}

fn default_resume() -> bool {
    true
}

impl BatchRequest {
    /// Request for `urls` into `output_root`, all images, no title filter, resume enabled
    pub fn new(urls: Vec<String>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            urls,
            output_root: output_root.into(),
            selection: None,
            title_filter: Vec::new(),
            resume: true,
        }
    }

    /// Build a request from its textual form
    ///
    /// Blank URLs are dropped. An empty or blank selection expression means "all images".
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSelection`] for a malformed selection and [`Error::Config`]
    /// when no URL remains.
    pub fn parse(
        urls: &[&str],
        output_root: impl Into<PathBuf>,
        selection_expr: Option<&str>,
        filter_expr: Option<&str>,
        resume: bool,
    ) -> Result<Self> {
        let urls: Vec<String> = urls
            .iter()
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect();
        if urls.is_empty() {
            return Err(Error::Config {
                message: "at least one collection URL is required".to_string(),
                key: Some("urls".to_string()),
            });
        }

        let selection = match selection_expr {
            Some(expr) => Some(ImageSelection::parse(expr)?).filter(|s| !s.is_empty()),
            None => None,
        };

        Ok(Self {
            urls,
            output_root: output_root.into(),
            selection,
            title_filter: filter_expr.map(parse_filter_words).unwrap_or_default(),
            resume,
        })
    }

    /// Restrict downloads to the given image selection
    pub fn with_selection(mut self, selection: ImageSelection) -> Self {
        self.selection = Some(selection).filter(|s| !s.is_empty());
        self
    }

    /// Remove these words from titles
    pub fn with_title_filter(mut self, words: Vec<String>) -> Self {
        self.title_filter = words;
        self
    }

    /// Enable or disable resume
    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }
}
