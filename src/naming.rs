//! Output naming: collision suffixes, sanitizing, image extensions and identities

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

/// Longest file name stem kept by [`sanitize_filename`], in characters
const MAX_FILENAME_CHARS: usize = 100;

/// Extensions accepted from image URLs; anything else is written as `jpg`
const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

#[expect(clippy::expect_used)]
static IMAGE_IDENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/il_[^.]+\.(\d+)_").expect("hardcoded regex pattern is valid")
});

/// Assigns collision suffixes to items that share a display name
///
/// The first request for a name yields `""`, the next `"(1)"`, then `"(2)"` and so on.
/// Counting is per instance and in call order, so callers must ask once per item and
/// reuse the suffix for every image of that item.
#[derive(Debug, Default)]
pub struct NameDeduplicator {
    counts: HashMap<String, u32>,
}

impl NameDeduplicator {
    /// Create an empty deduplicator
    pub fn new() -> Self {
        Self::default()
    }

    /// Suffix for the next item named `name`
    pub fn suffix_for(&mut self, name: &str) -> String {
        let seen = self.counts.entry(name.to_string()).or_insert(0);
        let suffix = if *seen == 0 {
            String::new()
        } else {
            format!("({seen})")
        };
        *seen += 1;
        suffix
    }
}

/// File name of one image: `{name}-{index}{suffix}.{extension}`
pub fn image_file_name(name: &str, index: usize, suffix: &str, extension: &str) -> String {
    format!("{name}-{index}{suffix}.{extension}")
}

/// Make a title safe to use as a file name stem
///
/// Replaces path and shell-hostile characters with `_`, keeps at most 100 characters,
/// trims trailing spaces, dots and underscores, and falls back to `"unnamed"`.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' | '\n' | '\r' | '\t' => '_',
            c => c,
        })
        .take(MAX_FILENAME_CHARS)
        .collect();

    let trimmed = replaced.trim_end_matches([' ', '.', '_']);
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Make a collection label safe to use as a directory name
///
/// May return an empty string; callers fall back to `{shop}_{collection_id}`.
pub fn sanitize_folder_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect();

    let mut collapsed = String::with_capacity(replaced.len());
    for c in replaced.trim().chars() {
        if c == '_' && collapsed.ends_with('_') {
            continue;
        }
        collapsed.push(c);
    }

    collapsed.trim_matches(|c: char| c == '_' || c.is_whitespace()).to_string()
}

/// File extension for an image URL (`jpg` unless the path names a known image type)
pub fn image_extension(image_url: &str) -> &'static str {
    let path = url::Url::parse(image_url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| {
            image_url
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_string()
        });

    let extension = std::path::Path::new(&path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    extension
        .and_then(|ext| IMAGE_EXTENSIONS.iter().find(|known| **known == ext).copied())
        .unwrap_or("jpg")
}

/// Identity of an image across size variants (`/il_794xN.1234567_abcd.jpg` -> `1234567`)
///
/// URLs without an embedded identity are their own identity.
pub fn image_identity(image_url: &str) -> &str {
    IMAGE_IDENTITY
        .captures(image_url)
        .and_then(|caps| caps.get(1))
        .map_or(image_url, |m| m.as_str())
}

/// Drop size variants of the same image, keeping first-seen order, at most `cap` URLs
pub fn dedupe_images(urls: &[String], cap: usize) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut kept = Vec::new();
    for url in urls {
        if kept.len() == cap {
            break;
        }
        if seen.insert(image_identity(url.as_str())) {
            kept.push(url.clone());
        }
    }
    kept
}
