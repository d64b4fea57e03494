//! Prefetch policies shipped with the crate

pub mod image_key;
pub mod viewer;

pub use image_key::{ImageKey, KeyParseError, QualityTier};
pub use viewer::ViewerPrefetchPolicy;
