//! Key grammar of the decoded-image category
//!
//! Keys have the shape `instanceId/frameIndex/qualityTier`. Instance ids may
//! themselves contain slashes, so parsing splits from the right.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Rendering quality a decoded image was produced at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QualityTier {
    #[serde(rename = "low-quality")]
    Low,
    #[serde(rename = "medium-quality")]
    Medium,
    #[serde(rename = "high-quality")]
    High,
}

impl QualityTier {
    pub const fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Low => "low-quality",
            QualityTier::Medium => "medium-quality",
            QualityTier::High => "high-quality",
        }
    }

    /// Sharper tiers worth computing once this one was served, nearest first
    pub fn refinements(&self) -> &'static [QualityTier] {
        match self {
            QualityTier::Low => &[QualityTier::Medium, QualityTier::High],
            QualityTier::Medium => &[QualityTier::High],
            QualityTier::High => &[],
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityTier {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low-quality" => Ok(QualityTier::Low),
            "medium-quality" => Ok(QualityTier::Medium),
            "high-quality" => Ok(QualityTier::High),
            other => Err(KeyParseError::new(format!("unknown quality tier {:?}", other))),
        }
    }
}

/// Malformed decoded-image key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyParseError {
    message: String,
}

impl KeyParseError {
    #[inline]
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for KeyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Malformed image key: {}", self.message)
    }
}

impl std::error::Error for KeyParseError {}

/// Parsed `instanceId/frameIndex/qualityTier` key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageKey {
    pub instance_id: String,
    pub frame_index: u32,
    pub quality: QualityTier,
}

impl ImageKey {
    pub fn new(instance_id: impl Into<String>, frame_index: u32, quality: QualityTier) -> Self {
        Self {
            instance_id: instance_id.into(),
            frame_index,
            quality,
        }
    }

    /// Same frame at another tier
    pub fn with_quality(&self, quality: QualityTier) -> Self {
        Self {
            quality,
            ..self.clone()
        }
    }
}

impl fmt::Display for ImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.instance_id, self.frame_index, self.quality)
    }
}

impl FromStr for ImageKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.rsplitn(3, '/');
        let (Some(quality), Some(frame), Some(instance_id)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(KeyParseError::new(format!("{:?} has fewer than 3 segments", s)));
        };
        if instance_id.is_empty() {
            return Err(KeyParseError::new(format!("{:?} has an empty instance id", s)));
        }

        let frame_index = frame
            .parse::<u32>()
            .map_err(|e| KeyParseError::new(format!("frame index {:?}: {}", frame, e)))?;

        Ok(Self {
            instance_id: instance_id.to_string(),
            frame_index,
            quality: quality.parse()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let key: ImageKey = "abc-123/4/low-quality".parse().unwrap();
        assert_eq!(key, ImageKey::new("abc-123", 4, QualityTier::Low));
        assert_eq!(key.to_string(), "abc-123/4/low-quality");
        assert_eq!(
            key.with_quality(QualityTier::High).to_string(),
            "abc-123/4/high-quality"
        );
    }

    #[test]
    fn test_instance_id_may_contain_slashes() {
        let key: ImageKey = "studies/xyz/0/medium-quality".parse().unwrap();
        assert_eq!(key.instance_id, "studies/xyz");
        assert_eq!(key.frame_index, 0);
    }

    #[test]
    fn test_rejects_malformed_keys() {
        assert!("abc/low-quality".parse::<ImageKey>().is_err());
        assert!("abc/x/low-quality".parse::<ImageKey>().is_err());
        assert!("abc/1/jpeg95".parse::<ImageKey>().is_err());
        assert!("/1/low-quality".parse::<ImageKey>().is_err());
    }

    #[test]
    fn test_refinements_are_nearest_first() {
        assert_eq!(
            QualityTier::Low.refinements(),
            &[QualityTier::Medium, QualityTier::High]
        );
        assert_eq!(QualityTier::Medium.refinements(), &[QualityTier::High]);
        assert!(QualityTier::High.refinements().is_empty());
    }
}
