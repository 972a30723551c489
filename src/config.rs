//! Configuration types for section-dl
//!
//! Configuration is an explicit value handed to [`Harvester`](crate::Harvester) at construction.
//! Nothing in the crate reads ambient or global settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// A randomized delay: `base` shifted by a uniform offset in `[-jitter_below, +jitter_above]`,
/// never shorter than `floor`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DelayConfig {
    /// Centre of the delay distribution
    #[serde(with = "duration_serde")]
    pub base: Duration,

    /// Largest amount the delay may fall below `base`
    #[serde(default, with = "duration_serde")]
    pub jitter_below: Duration,

    /// Largest amount the delay may exceed `base`
    #[serde(default, with = "duration_serde")]
    pub jitter_above: Duration,

    /// Minimum delay after jitter is applied
    #[serde(default, with = "duration_serde")]
    pub floor: Duration,
}

impl DelayConfig {
    /// A delay that is always exactly zero (useful for tests and dry runs)
    pub const ZERO: DelayConfig = DelayConfig {
        base: Duration::ZERO,
        jitter_below: Duration::ZERO,
        jitter_above: Duration::ZERO,
        floor: Duration::ZERO,
    };

    /// Delay centred on `base` with the default jitter window (-0.5s / +1.0s, floor 1s)
    pub fn around(base: Duration) -> Self {
        Self {
            base,
            jitter_below: Duration::from_millis(500),
            jitter_above: Duration::from_millis(1000),
            floor: Duration::from_secs(1),
        }
    }
}

/// Request pacing between units of work
///
/// Grouped as a nested sub-config within [`Config`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Delay between items of one collection (default: 2s, -0.5s/+1.0s, floor 1s)
    #[serde(default = "default_item_delay")]
    pub item_delay: DelayConfig,

    /// Delay between collections of one batch (default: 3s, -0.5s/+1.0s, floor 1s)
    #[serde(default = "default_collection_delay")]
    pub collection_delay: DelayConfig,

    /// Delay between images of one item (default: 0.2s to 0.5s)
    #[serde(default = "default_image_delay")]
    pub image_delay: DelayConfig,

    /// Fixed delay between collection pages during discovery (default: 2s)
    #[serde(default = "default_page_delay", with = "duration_serde")]
    pub page_delay: Duration,
}

impl PacingConfig {
    /// Pacing with every delay disabled
    pub fn none() -> Self {
        Self {
            item_delay: DelayConfig::ZERO,
            collection_delay: DelayConfig::ZERO,
            image_delay: DelayConfig::ZERO,
            page_delay: Duration::ZERO,
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            item_delay: default_item_delay(),
            collection_delay: default_collection_delay(),
            image_delay: default_image_delay(),
            page_delay: default_page_delay(),
        }
    }
}

/// Image download settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-request timeout for image downloads (default: 30s)
    #[serde(default = "default_fetch_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// User-Agent header sent with image requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Referer header sent with image requests
    #[serde(default = "default_referer")]
    pub referer: Option<String>,

    /// Maximum number of distinct images kept per item (default: 15)
    #[serde(default = "default_max_images")]
    pub max_images_per_item: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: default_fetch_timeout(),
            user_agent: default_user_agent(),
            referer: default_referer(),
            max_images_per_item: default_max_images(),
        }
    }
}

/// Browser session launch settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Remote debugging port of the browser (default: 9222)
    #[serde(default = "default_port")]
    pub port: u16,

    /// How long to wait for the debugging endpoint after launch (default: 30s)
    #[serde(default = "default_ready_timeout", with = "duration_serde")]
    pub ready_timeout: Duration,

    /// Path to the browser executable (auto-detected if None)
    #[serde(default)]
    pub browser_path: Option<PathBuf>,

    /// Whether to search PATH for a browser if `browser_path` is not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Dedicated user-data directory so the session never collides with a running browser
    #[serde(default = "default_profile_dir")]
    pub profile_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            ready_timeout: default_ready_timeout(),
            browser_path: None,
            search_path: true,
            profile_dir: default_profile_dir(),
        }
    }
}

/// Main configuration for [`Harvester`](crate::Harvester)
///
/// Fields are organized into logical sub-configs:
/// - [`pacing`](PacingConfig): delays between items, collections, images and pages
/// - [`fetch`](FetchConfig): image download behaviour
/// - [`session`](SessionConfig): browser launch and readiness
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Request pacing
    #[serde(default)]
    pub pacing: PacingConfig,

    /// Image download settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Browser session settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Base URL that item ids are appended to (default: "https://www.etsy.com/listing/")
    #[serde(default = "default_item_url_base")]
    pub item_url_base: String,

    /// Optional hard deadline for processing one item (None = no deadline)
    ///
    /// An item exceeding the deadline is recorded as a failure and the run moves on.
    #[serde(default, with = "optional_duration_serde")]
    pub item_timeout: Option<Duration>,

    /// Capacity of the event broadcast channel (default: 1000)
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pacing: PacingConfig::default(),
            fetch: FetchConfig::default(),
            session: SessionConfig::default(),
            item_url_base: default_item_url_base(),
            item_timeout: None,
            event_buffer: default_event_buffer(),
        }
    }
}

impl Config {
    /// Check settings that would otherwise fail deep inside a run
    pub fn validate(&self) -> crate::Result<()> {
        if self.event_buffer == 0 {
            return Err(crate::Error::Config {
                message: "event buffer must hold at least one event".to_string(),
                key: Some("event_buffer".to_string()),
            });
        }
        if self.fetch.max_images_per_item == 0 {
            return Err(crate::Error::Config {
                message: "at least one image per item must be allowed".to_string(),
                key: Some("fetch.max_images_per_item".to_string()),
            });
        }
        if url::Url::parse(&self.item_url_base).is_err() {
            return Err(crate::Error::Config {
                message: format!("'{}' is not an absolute URL", self.item_url_base),
                key: Some("item_url_base".to_string()),
            });
        }
        Ok(())
    }
}

fn default_item_delay() -> DelayConfig {
    DelayConfig::around(Duration::from_secs(2))
}

fn default_collection_delay() -> DelayConfig {
    DelayConfig::around(Duration::from_secs(3))
}

fn default_image_delay() -> DelayConfig {
    DelayConfig {
        base: Duration::from_millis(200),
        jitter_below: Duration::ZERO,
        jitter_above: Duration::from_millis(300),
        floor: Duration::ZERO,
    }
}

fn default_page_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36".to_string()
}

fn default_referer() -> Option<String> {
    Some("https://www.etsy.com/".to_string())
}

fn default_max_images() -> usize {
    15
}

fn default_port() -> u16 {
    9222
}

fn default_ready_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_true() -> bool {
    true
}

fn default_profile_dir() -> PathBuf {
    PathBuf::from(".section-dl-profile")
}

fn default_item_url_base() -> String {
    "https://www.etsy.com/listing/".to_string()
}

fn default_event_buffer() -> usize {
    1000
}

// Duration serialization helper (fractional seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<f64>::deserialize(deserializer)?;
        secs.map(Duration::try_from_secs_f64)
            .transpose()
            .map_err(serde::de::Error::custom)
    }
}
