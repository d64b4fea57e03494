//! Reference prefetch policy of the image viewer
//!
//! Opening a series anticipates the first slices the viewer will display;
//! serving a coarse frame anticipates its sharper renditions.

use log::debug;
use serde::Deserialize;
use serde_json::Value;

use super::image_key::ImageKey;
use crate::cache::config::ViewerCacheConfig;
use crate::cache::index::{CacheIndex, Category};
use crate::cache::traits::PrefetchPolicy;

pub const DEFAULT_PREFETCH_FORWARD: usize = 10;
pub const DEFAULT_COMPRESSION_TAG: &str = "jpeg95";

#[derive(Deserialize)]
struct SeriesInformation {
    #[serde(rename = "Slices")]
    slices: Vec<Value>,
}

/// Viewer policy over the series-information and decoded-image categories
#[derive(Debug, Clone)]
pub struct ViewerPrefetchPolicy {
    forward: usize,
    compression_tag: String,
}

impl Default for ViewerPrefetchPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewerPrefetchPolicy {
    pub fn new() -> Self {
        Self {
            forward: DEFAULT_PREFETCH_FORWARD,
            compression_tag: DEFAULT_COMPRESSION_TAG.to_string(),
        }
    }

    pub fn from_config(config: &ViewerCacheConfig) -> Self {
        Self::new()
            .with_forward_count(config.prefetch_forward)
            .with_compression_tag(config.compression_tag.clone())
    }

    /// Number of leading slices anticipated when a series is opened
    pub fn with_forward_count(mut self, forward: usize) -> Self {
        self.forward = forward;
        self
    }

    pub fn with_compression_tag(mut self, tag: impl Into<String>) -> Self {
        self.compression_tag = tag.into();
        self
    }

    pub fn forward_count(&self) -> usize {
        self.forward
    }

    fn apply_series(&self, series: &str, content: &[u8]) -> Vec<CacheIndex> {
        let info: SeriesInformation = match serde_json::from_slice(content) {
            Ok(info) => info,
            Err(e) => {
                debug!("no slices to prefetch for series {}: {}", series, e);
                return Vec::new();
            }
        };

        info.slices
            .iter()
            .take(self.forward)
            .filter_map(|slice| match slice {
                Value::String(id) => Some(id.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .map(|id| {
                CacheIndex::new(
                    Category::DECODED_IMAGE,
                    format!("{}-{}", self.compression_tag, id),
                )
            })
            .collect()
    }

    fn apply_image(&self, key: &str) -> Vec<CacheIndex> {
        let Ok(image) = key.parse::<ImageKey>() else {
            return Vec::new();
        };

        image
            .quality
            .refinements()
            .iter()
            .map(|tier| {
                CacheIndex::new(
                    Category::DECODED_IMAGE,
                    image.with_quality(*tier).to_string(),
                )
            })
            .collect()
    }
}

impl PrefetchPolicy for ViewerPrefetchPolicy {
    fn apply(&self, accessed: &CacheIndex, content: &[u8]) -> Vec<CacheIndex> {
        match accessed.category() {
            Category::SERIES_INFORMATION => self.apply_series(accessed.key(), content),
            Category::DECODED_IMAGE => self.apply_image(accessed.key()),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(candidates: &[CacheIndex]) -> Vec<&str> {
        candidates.iter().map(|c| c.key()).collect()
    }

    #[test]
    fn test_series_prefetches_leading_slices_in_order() {
        let slices: Vec<String> = (1..=12).map(|i| format!("s{}", i)).collect();
        let content = serde_json::json!({ "ID": "series", "Slices": slices }).to_string();
        let policy = ViewerPrefetchPolicy::new();

        let candidates = policy.apply(
            &CacheIndex::new(Category::SERIES_INFORMATION, "series"),
            content.as_bytes(),
        );

        assert_eq!(candidates.len(), 10);
        assert!(candidates.iter().all(|c| c.category() == Category::DECODED_IMAGE));
        let expected: Vec<String> = (1..=10).map(|i| format!("jpeg95-s{}", i)).collect();
        assert_eq!(keys(&candidates), expected);
    }

    #[test]
    fn test_short_or_malformed_series() {
        let policy = ViewerPrefetchPolicy::new().with_compression_tag("png");
        let series = CacheIndex::new(Category::SERIES_INFORMATION, "series");

        let short = policy.apply(&series, br#"{"Slices": ["a", "b"]}"#);
        assert_eq!(keys(&short), vec!["png-a", "png-b"]);

        assert!(policy.apply(&series, b"not json").is_empty());
        assert!(policy.apply(&series, br#"{"Instances": []}"#).is_empty());
        assert!(policy.apply(&series, br#"{"Slices": "a"}"#).is_empty());
    }

    #[test]
    fn test_unusable_slices_still_count_towards_forward_window() {
        let policy = ViewerPrefetchPolicy::new().with_forward_count(3);
        let candidates = policy.apply(
            &CacheIndex::new(Category::SERIES_INFORMATION, "series"),
            br#"{"Slices": ["a", null, 7, "d", "e"]}"#,
        );
        assert_eq!(keys(&candidates), vec!["jpeg95-a", "jpeg95-7"]);
    }

    #[test]
    fn test_low_quality_refines_to_medium_then_high() {
        let policy = ViewerPrefetchPolicy::new();
        let candidates = policy.apply(
            &CacheIndex::new(Category::DECODED_IMAGE, "inst/0/low-quality"),
            b"",
        );
        assert_eq!(
            keys(&candidates),
            vec!["inst/0/medium-quality", "inst/0/high-quality"]
        );

        let medium = policy.apply(
            &CacheIndex::new(Category::DECODED_IMAGE, "inst/0/medium-quality"),
            b"",
        );
        assert_eq!(keys(&medium), vec!["inst/0/high-quality"]);
    }

    #[test]
    fn test_high_or_unknown_tier_yields_nothing() {
        let policy = ViewerPrefetchPolicy::new();
        for key in ["inst/0/high-quality", "jpeg95-inst", "inst/0/lossless"] {
            assert!(
                policy
                    .apply(&CacheIndex::new(Category::DECODED_IMAGE, key), b"")
                    .is_empty()
            );
        }
        assert!(
            policy
                .apply(&CacheIndex::new(Category(42), "inst/0/low-quality"), b"")
                .is_empty()
        );
    }

    #[test]
    fn test_from_config() {
        let config = ViewerCacheConfig {
            prefetch_forward: 3,
            compression_tag: "jpeg80".to_string(),
            ..ViewerCacheConfig::default()
        };
        let policy = ViewerPrefetchPolicy::from_config(&config);
        assert_eq!(policy.forward_count(), 3);
        let candidates = policy.apply(
            &CacheIndex::new(Category::SERIES_INFORMATION, "s"),
            br#"{"Slices": ["a", "b", "c", "d"]}"#,
        );
        assert_eq!(keys(&candidates), vec!["jpeg80-a", "jpeg80-b", "jpeg80-c"]);
    }
}
