use tracing::{debug, warn};

use crate::config::ParserConfig;
use crate::CaptionVariation;

/// Where the line classifier is within one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineState {
    /// Before the first variation marker; plain lines are ignored.
    Seeking,
    /// After a variation marker; plain lines belong to the caption.
    InBody,
    /// The hashtag line was seen; the rest of the segment is ignored.
    Done,
}

/// Caption body and hashtags pulled out of one segment.
#[derive(Debug, Default, PartialEq, Eq)]
struct Segment {
    body: Vec<String>,
    hashtags: String,
}

fn starts_with_ignore_case(line: &str, prefix: &str) -> bool {
    line.get(..prefix.len())
        .map(|head| head.eq_ignore_ascii_case(prefix))
        .unwrap_or(false)
}

fn classify_segment(segment: &str, config: &ParserConfig) -> Segment {
    let mut state = LineState::Seeking;
    let mut out = Segment::default();

    for line in segment.lines().map(str::trim) {
        if state == LineState::Done {
            break;
        }
        if line.starts_with(&config.variation_marker) {
            state = LineState::InBody;
            continue;
        }
        if starts_with_ignore_case(line, &config.hashtag_label) {
            out.hashtags = line
                .split_once(':')
                .map(|(_, tags)| tags.trim().to_string())
                .unwrap_or_default();
            state = LineState::Done;
            continue;
        }
        if state == LineState::InBody && !line.is_empty() && !line.starts_with('#') {
            out.body.push(line.to_string());
        }
    }
    out
}

/// Parses a completion into at most `expected_count` variations using the
/// default markers. Never returns an empty vector.
pub fn parse_variations(text: &str, expected_count: usize) -> Vec<CaptionVariation> {
    parse_variations_with(text, expected_count, &ParserConfig::default())
}

/// Splits `text` on the separator, keeps the first `expected_count`
/// non-blank segments, and emits one variation per segment whose caption
/// body is non-empty. Variations are numbered by emitted position. When no
/// segment survives, the configured fallback is returned instead.
pub fn parse_variations_with(
    text: &str,
    expected_count: usize,
    config: &ParserConfig,
) -> Vec<CaptionVariation> {
    let expected_count = expected_count.max(1);

    let mut variations = Vec::new();
    for segment in text
        .split(config.separator.as_str())
        .filter(|s| !s.trim().is_empty())
        .take(expected_count)
    {
        let parsed = classify_segment(segment, config);
        let caption = parsed.body.join("\n");
        let caption = caption.trim();
        if caption.is_empty() {
            debug!("dropping segment without caption body");
            continue;
        }
        variations.push(CaptionVariation::new(
            variations.len() + 1,
            caption,
            parsed.hashtags,
        ));
    }

    if variations.is_empty() {
        warn!("no variations recovered from completion, using fallback caption");
        variations.push(CaptionVariation::fallback(config));
    }
    variations
}
