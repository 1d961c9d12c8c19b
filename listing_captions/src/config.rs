use std::env;
use std::time::Duration;

use crate::error::ConfigError;

pub const POST_TYPES: [&str; 5] = [
    "New Listing",
    "Open House",
    "Just Sold",
    "Price Reduction",
    "Featured Property",
];

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const DEFAULT_MODEL: &str = "gpt-4";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// How an attribute value is compared against a hint keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrMatch {
    /// Case-insensitive substring.
    Contains(String),
    /// Exact value.
    Equals(String),
}

/// Points the extractor at elements by attribute, e.g. `class` containing `price`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHint {
    pub attribute: String,
    pub matcher: AttrMatch,
}

impl ElementHint {
    pub fn contains(attribute: &str, keyword: &str) -> Self {
        Self {
            attribute: attribute.to_string(),
            matcher: AttrMatch::Contains(keyword.to_lowercase()),
        }
    }

    pub fn equals(attribute: &str, value: &str) -> Self {
        Self {
            attribute: attribute.to_string(),
            matcher: AttrMatch::Equals(value.to_string()),
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        match &self.matcher {
            AttrMatch::Contains(keyword) => value.to_lowercase().contains(keyword.as_str()),
            AttrMatch::Equals(expected) => value == expected,
        }
    }
}

/// Vocabularies, patterns, and defaults driving the field extractor.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub default_title: String,
    pub default_price: String,
    pub default_address: String,
    pub default_description: String,
    pub default_property_type: String,

    pub price_hints: Vec<ElementHint>,
    pub address_hints: Vec<ElementHint>,
    pub bedroom_hints: Vec<ElementHint>,
    pub bathroom_hints: Vec<ElementHint>,
    pub description_hints: Vec<ElementHint>,

    /// Applied to the text of a price-hinted element.
    pub price_element_pattern: String,
    /// Applied to the whole document text, in order.
    pub price_patterns: Vec<String>,
    pub bedroom_element_pattern: String,
    pub bedroom_patterns: Vec<String>,
    pub bathroom_element_pattern: String,
    pub bathroom_patterns: Vec<String>,
    pub square_feet_patterns: Vec<String>,

    pub image_attributes: Vec<String>,
    pub image_denylist: Vec<String>,
    pub max_images: usize,
    pub max_description_chars: usize,

    pub property_types: Vec<String>,
    pub features: Vec<String>,
    pub max_features: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            default_title: "Property Listing".into(),
            default_price: "Price not listed".into(),
            default_address: "Address not found".into(),
            default_description: "No description available".into(),
            default_property_type: "Property".into(),

            price_hints: vec![
                ElementHint::contains("class", "price"),
                ElementHint::contains("id", "price"),
                ElementHint::equals("data-testid", "price"),
            ],
            address_hints: vec![
                ElementHint::contains("class", "address"),
                ElementHint::contains("id", "address"),
                ElementHint::equals("itemprop", "address"),
            ],
            bedroom_hints: vec![
                ElementHint::contains("class", "bed"),
                ElementHint::contains("data-testid", "bed"),
            ],
            bathroom_hints: vec![
                ElementHint::contains("class", "bath"),
                ElementHint::contains("data-testid", "bath"),
            ],
            description_hints: vec![
                ElementHint::contains("class", "description"),
                ElementHint::contains("id", "description"),
                ElementHint::equals("itemprop", "description"),
            ],

            price_element_pattern: r"\$[\d,]+".into(),
            price_patterns: vec![r"\$[\d,]+".into(), r"Price[:\s]*\$?[\d,]+".into()],
            bedroom_element_pattern: r"\d+".into(),
            bedroom_patterns: vec![
                r"(?i)(\d+)\s*(?:bed|bd|bedroom)".into(),
                r"(?i)(?:bed|bd|bedroom)[:\s]*(\d+)".into(),
            ],
            bathroom_element_pattern: r"\d+\.?\d*".into(),
            bathroom_patterns: vec![
                r"(?i)(\d+\.?\d*)\s*(?:bath|ba|bathroom)".into(),
                r"(?i)(?:bath|ba|bathroom)[:\s]*(\d+\.?\d*)".into(),
            ],
            square_feet_patterns: vec![
                r"(?i)([\d,]+)\s*(?:sq\.?\s*ft|sqft|square feet)".into(),
                r"(?i)(?:sq\.?\s*ft|sqft|square feet)[:\s]*([\d,]+)".into(),
            ],

            image_attributes: vec!["src".into(), "data-src".into(), "data-lazy-src".into()],
            image_denylist: vec!["logo".into(), "icon".into(), "avatar".into(), "banner".into()],
            max_images: 10,
            max_description_chars: 500,

            property_types: ["house", "condo", "townhouse", "apartment", "land", "commercial"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            features: [
                "pool",
                "garage",
                "fireplace",
                "hardwood",
                "granite",
                "stainless steel",
                "updated",
                "renovated",
                "new roof",
                "central air",
                "walk-in closet",
                "basement",
                "deck",
                "patio",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            max_features: 5,
        }
    }
}

/// Markers and fallback content for the completion parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    pub separator: String,
    pub variation_marker: String,
    /// Matched case-insensitively at the start of a line.
    pub hashtag_label: String,
    pub fallback_caption: String,
    pub fallback_hashtags: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            separator: "---".into(),
            variation_marker: "VARIATION".into(),
            hashtag_label: "hashtags:".into(),
            fallback_caption: "Beautiful property now available! Contact us for details.".into(),
            fallback_hashtags: "#RealEstate #HomesForSale #Property #DreamHome".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout: Duration,
    /// Total time spent retrying transient failures before giving up.
    pub max_retry_elapsed: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.into(),
            timeout: Duration::from_secs(10),
            max_retry_elapsed: Duration::from_secs(20),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl AiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            temperature: 0.8,
            max_tokens: 1000,
        }
    }

    /// Reads `OPENAI_API_KEY` (required), `OPENAI_MODEL` and `OPENAI_BASE_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = var("OPENAI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingEnv("OPENAI_API_KEY"))?;

        let mut config = Self::new(api_key);
        if let Some(model) = var("OPENAI_MODEL") {
            config.model = model;
        }
        if let Some(base_url) = var("OPENAI_BASE_URL") {
            config.base_url = base_url;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_hint_ignores_case() {
        let hint = ElementHint::contains("class", "Price");
        assert!(hint.matches("listing-PRICE large"));
        assert!(!hint.matches("cost"));
    }

    #[test]
    fn equals_hint_is_exact() {
        let hint = ElementHint::equals("itemprop", "address");
        assert!(hint.matches("address"));
        assert!(!hint.matches("streetAddress"));
    }

    fn vars(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn ai_config_requires_a_non_blank_key() {
        assert!(matches!(
            AiConfig::from_vars(vars(&[])),
            Err(ConfigError::MissingEnv("OPENAI_API_KEY"))
        ));
        assert!(matches!(
            AiConfig::from_vars(vars(&[("OPENAI_API_KEY", "   ")])),
            Err(ConfigError::MissingEnv("OPENAI_API_KEY"))
        ));
    }

    #[test]
    fn ai_config_overrides_model_and_endpoint() {
        let config = AiConfig::from_vars(vars(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_BASE_URL", "http://localhost:9000/v1"),
        ]))
        .unwrap();
        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.model, "gpt-4");
        assert_eq!(config.base_url, "http://localhost:9000/v1");
    }

    #[test]
    fn default_vocabularies() {
        let config = ExtractorConfig::default();
        assert_eq!(config.features.len(), 14);
        assert_eq!(config.property_types[0], "house");
        assert_eq!(config.max_images, 10);
    }
}
