//! Image selection expressions and title filtering
//!
//! Selection expressions pick 1-based image indices: `"1"`, `"1,3,5"`, `"2-4"`, `"1,3-5,8"`.
//! Filter word lists are comma-separated words removed from titles before naming files.

use crate::error::{Error, Result};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Largest image index a selection may name
///
/// Listings carry a handful of images; the bound keeps ranges such as `1-50000000`
/// from materializing millions of indices.
pub const MAX_IMAGE_INDEX: usize = 1000;

/// A set of 1-based image indices
///
/// Serializes as the ascending index list, e.g. `[1, 3, 4]`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct ImageSelection {
    indices: BTreeSet<usize>,
}

/// Selected images that exist, plus requested indices that do not
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionPlan<'a> {
    /// `(1-based index, url)` pairs to download, in index order
    pub selected: Vec<(usize, &'a str)>,
    /// Requested indices beyond the number of available images
    pub out_of_range: Vec<usize>,
}

impl ImageSelection {
    /// Parse a selection expression
    ///
    /// An empty or blank expression yields an empty selection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSelection`] for non-numeric parts, index 0, indices above
    /// [`MAX_IMAGE_INDEX`] and reversed ranges.
    pub fn parse(expr: &str) -> Result<Self> {
        let mut indices = BTreeSet::new();

        for part in expr.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let invalid = |reason: &str| Error::InvalidSelection {
                expr: part.to_string(),
                reason: reason.to_string(),
            };

            if let Some((start, end)) = part.split_once('-') {
                let start: usize = parse_index(start.trim())
                    .ok_or_else(|| invalid("expected a range such as '2-4'"))?;
                let end: usize = parse_index(end.trim())
                    .ok_or_else(|| invalid("expected a range such as '2-4'"))?;
                if start == 0 {
                    return Err(invalid("image indices start at 1"));
                }
                if start > end {
                    return Err(invalid("range start is greater than range end"));
                }
                if end > MAX_IMAGE_INDEX {
                    return Err(invalid(&format!("image indices cannot exceed {MAX_IMAGE_INDEX}")));
                }
                indices.extend(start..=end);
            } else {
                let index = parse_index(part)
                    .ok_or_else(|| invalid("expected an index such as '1' or '1,3,5'"))?;
                if index == 0 {
                    return Err(invalid("image indices start at 1"));
                }
                if index > MAX_IMAGE_INDEX {
                    return Err(invalid(&format!("image indices cannot exceed {MAX_IMAGE_INDEX}")));
                }
                indices.insert(index);
            }
        }

        Ok(Self { indices })
    }

    /// Build a selection from explicit indices (zeros and indices above [`MAX_IMAGE_INDEX`]
    /// are ignored)
    pub fn from_indices(indices: impl IntoIterator<Item = usize>) -> Self {
        Self {
            indices: indices
                .into_iter()
                .filter(|&i| (1..=MAX_IMAGE_INDEX).contains(&i))
                .collect(),
        }
    }

    /// Whether no index is selected
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Selected indices in ascending order
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().copied()
    }

    /// Split the selection against the images an item actually has
    pub fn plan<'a>(&self, images: &'a [String]) -> SelectionPlan<'a> {
        let (valid, out_of_range): (Vec<usize>, Vec<usize>) =
            self.indices().partition(|&i| i <= images.len());
        SelectionPlan {
            selected: valid.into_iter().map(|i| (i, images[i - 1].as_str())).collect(),
            out_of_range,
        }
    }
}

impl TryFrom<Vec<usize>> for ImageSelection {
    type Error = Error;

    fn try_from(indices: Vec<usize>) -> Result<Self> {
        if let Some(&bad) = indices
            .iter()
            .find(|&&i| !(1..=MAX_IMAGE_INDEX).contains(&i))
        {
            return Err(Error::InvalidSelection {
                expr: bad.to_string(),
                reason: format!("image indices run from 1 to {MAX_IMAGE_INDEX}"),
            });
        }
        Ok(Self {
            indices: indices.into_iter().collect(),
        })
    }
}

impl From<ImageSelection> for Vec<usize> {
    fn from(selection: ImageSelection) -> Self {
        selection.indices.into_iter().collect()
    }
}

/// Plan that selects every image
pub fn select_all(images: &[String]) -> SelectionPlan<'_> {
    SelectionPlan {
        selected: images
            .iter()
            .enumerate()
            .map(|(i, url)| (i + 1, url.as_str()))
            .collect(),
        out_of_range: Vec::new(),
    }
}

fn parse_index(s: &str) -> Option<usize> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Parse a comma-separated filter word list, dropping blanks
pub fn parse_filter_words(expr: &str) -> Vec<String> {
    expr.split(',')
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Remove every filter word from a title (case-insensitive) and collapse whitespace
///
/// Returns `"untitled"` when nothing is left.
pub fn filter_title(title: &str, words: &[String]) -> String {
    let mut result = title.to_string();

    for word in words.iter().filter(|w| !w.is_empty()) {
        match RegexBuilder::new(&regex::escape(word))
            .case_insensitive(true)
            .build()
        {
            Ok(re) => result = re.replace_all(&result, "").into_owned(),
            Err(e) => tracing::warn!(word = %word, error = %e, "Skipping unusable filter word"),
        }
    }

    let collapsed = result.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        "untitled".to_string()
    } else {
        collapsed
    }
}
