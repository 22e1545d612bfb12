// FormatSelector - picks one encoding for a quality specifier
//
// Rules:
// - highest / lowest: extremal upstream rank, first in upstream order on ties
// - explicit label: first exact label match in upstream order
// - no match: None. Falling back is the controller's decision, not ours.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::models::{RequestError, StreamDescriptor};

/// Requested encoding selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualitySpec {
    Highest,
    Lowest,
    /// Explicit label such as "720p"
    Exact(String),
}

impl QualitySpec {
    /// Whether this is `highest`/`lowest` (no further fallback possible)
    pub fn is_symbolic(&self) -> bool {
        matches!(self, Self::Highest | Self::Lowest)
    }
}

impl FromStr for QualitySpec {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        match value.to_lowercase().as_str() {
            "" => Err(RequestError::EmptyQuality),
            "highest" | "best" => Ok(Self::Highest),
            "lowest" | "worst" => Ok(Self::Lowest),
            _ => Ok(Self::Exact(value.to_string())),
        }
    }
}

impl fmt::Display for QualitySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Highest => write!(f, "highest"),
            Self::Lowest => write!(f, "lowest"),
            Self::Exact(label) => write!(f, "{}", label),
        }
    }
}

/// Resolution choices offered by front ends
pub const STANDARD_RESOLUTIONS: [&str; 6] = ["highest", "lowest", "1080p", "720p", "480p", "360p"];

/// Stream selector (pure)
pub struct FormatSelector;

impl FormatSelector {
    pub fn select<'a>(
        streams: &'a [StreamDescriptor],
        spec: &QualitySpec,
    ) -> Option<&'a StreamDescriptor> {
        match spec {
            // max_by_key keeps the last maximum; scan in reverse to keep the first
            QualitySpec::Highest => streams.iter().rev().max_by_key(|s| s.rank),
            QualitySpec::Lowest => streams.iter().min_by_key(|s| s.rank),
            QualitySpec::Exact(label) => streams.iter().find(|s| s.quality == *label),
        }
    }

    /// Labels available for display, deduplicated, in upstream order
    pub fn available_labels(streams: &[StreamDescriptor]) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::new();
        for stream in streams {
            if !labels.contains(&stream.quality.as_str()) {
                labels.push(&stream.quality);
            }
        }
        labels
    }
}
