use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use crate::captions::parse_variations_with;
use crate::config::{AiConfig, ParserConfig};
use crate::error::CaptionError;
use crate::{CaptionVariation, ListingRecord};

pub const SYSTEM_PROMPT: &str = "You are an expert real estate social media marketer. \
You write engaging, professional Instagram and Facebook captions that drive engagement and inquiries.";

const TONES: [&str; 3] = [
    "Professional and descriptive (emphasize value/features)",
    "Warm and inviting (appeal to emotion/lifestyle)",
    "Urgent and action-oriented (create FOMO/call-to-action)",
];

const PROMPT_DESCRIPTION_CHARS: usize = 200;

/// Anything that turns a system + user prompt into completion text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, CaptionError>;
}

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct OpenAiClient {
    client: reqwest::Client,
    config: AiConfig,
}

impl OpenAiClient {
    pub fn new(config: AiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, CaptionError> {
        let payload = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt }
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens
        });

        let endpoint = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        info!(model = %self.config.model, "requesting completion");

        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CaptionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let result = response.json::<serde_json::Value>().await?;
        let content = result["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                CaptionError::MalformedResponse("missing choices[0].message.content".into())
            })?;

        debug!(chars = content.chars().count(), "completion received");
        Ok(content.to_string())
    }
}

/// Builds the user prompt asking for `num_variations` captions in the
/// `VARIATION n:` / `Hashtags:` / `---` layout the parser reads.
pub fn build_prompt(listing: &ListingRecord, post_type: &str, num_variations: usize) -> String {
    let num_variations = num_variations.max(1);
    let specs = listing.specs_summary();

    let mut details = vec![
        format!("- Type: {}", listing.property_type),
        format!("- Address: {}", listing.address),
        format!("- Price: {}", listing.price),
        format!("- Specs: {}", specs),
    ];
    if !listing.features.is_empty() {
        details.push(format!("- Key Features: {}", listing.features.join(", ")));
    }
    if !listing.description.is_empty() {
        let description: String = listing
            .description
            .chars()
            .take(PROMPT_DESCRIPTION_CHARS)
            .collect();
        details.push(format!("- Description: {}", description));
    }

    let tones = (0..num_variations)
        .map(|i| format!("   - Variation {}: {}", i + 1, TONES[i % TONES.len()]))
        .collect::<Vec<_>>()
        .join("\n");

    let layout = (1..=num_variations)
        .map(|i| {
            format!(
                "VARIATION {}:\n[caption text here]\n\nHashtags: #tag1 #tag2 #tag3 [etc]",
                i
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    format!(
        "Generate {n} different Instagram/Facebook caption variations for a real estate {post_type}.

Property Details:
{details}

Requirements:
1. Create {n} DISTINCT variations with different tones:
{tones}

2. Each caption should:
   - Be 100-150 words
   - Include relevant emojis (but don't overdo it)
   - Have a clear call-to-action (DM, call, visit)
   - Sound natural, not salesy
   - Highlight what makes this property special

3. Include 15-20 relevant hashtags for each caption:
   - Mix of broad (#RealEstate, #HomesForSale) and local tags
   - Property-specific tags (#LuxuryHome, #FirstTimeHomeBuyer, etc.)
   - Location-based tags (use generic if location unknown)

Format each variation exactly like this:

{layout}

Generate now:",
        n = num_variations,
        post_type = post_type.to_lowercase(),
        details = details.join("\n"),
        tones = tones,
        layout = layout,
    )
}

/// Prompt → completion → parsed variations.
#[derive(Clone)]
pub struct CaptionGenerator {
    client: Arc<dyn CompletionClient>,
    parser: ParserConfig,
}

impl CaptionGenerator {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            client,
            parser: ParserConfig::default(),
        }
    }

    pub fn from_config(config: AiConfig) -> Self {
        Self::new(Arc::new(OpenAiClient::new(config)))
    }

    pub fn with_parser_config(mut self, parser: ParserConfig) -> Self {
        self.parser = parser;
        self
    }

    /// A failed completion is returned as an error; an unparseable one
    /// still yields the fallback variation.
    pub async fn generate_captions(
        &self,
        listing: &ListingRecord,
        post_type: &str,
        num_variations: usize,
    ) -> Result<Vec<CaptionVariation>, CaptionError> {
        let prompt = build_prompt(listing, post_type, num_variations);
        let content = self.client.complete(SYSTEM_PROMPT, &prompt).await?;
        let captions = parse_variations_with(&content, num_variations, &self.parser);
        info!(url = %listing.url, count = captions.len(), "captions generated");
        Ok(captions)
    }

    pub async fn generate_single_caption(
        &self,
        listing: &ListingRecord,
    ) -> Result<CaptionVariation, CaptionError> {
        let captions = self.generate_captions(listing, "New Listing", 1).await?;
        Ok(captions
            .into_iter()
            .next()
            .unwrap_or_else(|| CaptionVariation::fallback(&self.parser)))
    }
}
