pub mod ai;
pub mod captions;
pub mod config;
pub mod error;
pub mod extract;
pub mod scraper;
pub mod utils;

use serde::{Deserialize, Serialize};

pub use captions::{parse_variations, parse_variations_with};
pub use config::{AiConfig, ExtractorConfig, FetchConfig, ParserConfig, POST_TYPES};
pub use error::{CaptionError, ConfigError, ScrapeError};
pub use extract::ListingExtractor;

/// Flat record of everything recovered from one listing page.
///
/// Every field is always populated: either with an extracted value or with
/// the configured default. Only the numeric specs may be `None`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ListingRecord {
    pub url: String,
    pub title: String,
    pub price: String,
    pub address: String,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<f64>,
    pub square_feet: Option<u64>,
    pub description: String,
    pub images: Vec<String>,
    pub property_type: String,
    pub features: Vec<String>,
}

impl ListingRecord {
    /// Human readable summary of the room counts and floor area, e.g. `3 bedrooms, 2.5 bathrooms, 2,100 sq ft`.
    pub fn specs_summary(&self) -> String {
        let mut details = Vec::new();
        if let Some(beds) = self.bedrooms.filter(|b| *b > 0) {
            details.push(format!("{} bedroom{}", beds, if beds != 1 { "s" } else { "" }));
        }
        if let Some(baths) = self.bathrooms.filter(|b| *b > 0.0) {
            // `{:?}` keeps the decimal: `2.0 bathrooms`
            details.push(format!("{:?} bathroom{}", baths, if baths != 1.0 { "s" } else { "" }));
        }
        if let Some(sqft) = self.square_feet.filter(|s| *s > 0) {
            details.push(format!("{} sq ft", utils::group_thousands(sqft)));
        }
        details.join(", ")
    }
}

/// One caption + hashtag unit recovered from a completion.
///
/// `full_text` and `character_count` are derived from the caption and
/// hashtags at construction and cannot be set independently.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct CaptionVariation {
    variation: usize,
    caption: String,
    hashtags: String,
    full_text: String,
    character_count: usize,
}

impl CaptionVariation {
    pub fn new(variation: usize, caption: impl Into<String>, hashtags: impl Into<String>) -> Self {
        let caption = caption.into();
        let hashtags = hashtags.into();
        let full_text = format!("{}\n\n{}", caption, hashtags);
        let character_count = caption.chars().count() + hashtags.chars().count() + 2;
        Self {
            variation,
            caption,
            hashtags,
            full_text,
            character_count,
        }
    }

    /// The single record emitted when nothing could be parsed.
    pub fn fallback(config: &ParserConfig) -> Self {
        Self::new(1, config.fallback_caption.clone(), config.fallback_hashtags.clone())
    }

    pub fn variation(&self) -> usize {
        self.variation
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn hashtags(&self) -> &str {
        &self.hashtags
    }

    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    pub fn character_count(&self) -> usize {
        self.character_count
    }
}
