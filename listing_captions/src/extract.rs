use regex::Regex;
use scraper::{ElementRef, Html};
use tracing::debug;
use url::Url;

use crate::config::{ElementHint, ExtractorConfig};
use crate::error::ConfigError;
use crate::utils::{capitalize, element_text, joined_text, title_case, truncate_chars, visible_text};
use crate::ListingRecord;

const OG_TITLE: &str = "og:title";
const OG_PRICE: &str = "og:price:amount";
const OG_ADDRESS: &str = "og:street-address";
const OG_IMAGE: &str = "og:image";

/// One tier of a field cascade.
type Strategy<T> = for<'a, 'b, 'p> fn(&'a ListingExtractor, &'b Page<'p>) -> Option<T>;

/// A parsed document plus the text views every pattern tier searches.
struct Page<'p> {
    document: &'p Html,
    text: String,
    lowercase_text: String,
    base_url: Option<Url>,
}

impl<'p> Page<'p> {
    fn new(document: &'p Html, source_url: &str) -> Self {
        let text = visible_text(document);
        let lowercase_text = text.to_lowercase();
        Self {
            document,
            text,
            lowercase_text,
            base_url: Url::parse(source_url).ok(),
        }
    }

    fn elements(&self) -> impl Iterator<Item = ElementRef<'p>> {
        self.document.tree.root().descendants().filter_map(ElementRef::wrap)
    }

    /// `content` of the first `<meta {attr}="{key}">`, if non-blank.
    fn meta_content(&self, attr: &str, key: &str) -> Option<String> {
        self.elements()
            .find(|el| el.value().name() == "meta" && el.value().attr(attr) == Some(key))
            .and_then(|el| el.value().attr("content"))
            .map(str::trim)
            .filter(|content| !content.is_empty())
            .map(str::to_string)
    }

    fn first_tag(&self, name: &str) -> Option<ElementRef<'p>> {
        self.elements().find(|el| el.value().name() == name)
    }

    fn first_hinted(&self, hint: &ElementHint) -> Option<ElementRef<'p>> {
        self.elements().find(|el| {
            el.value()
                .attr(&hint.attribute)
                .map(|value| hint.matches(value))
                .unwrap_or(false)
        })
    }
}

/// Maps listing pages to [`ListingRecord`]s.
///
/// Every field runs its own cascade: structured metadata, then hinted
/// elements, then patterns over the page text, then the configured default.
/// Extraction never fails.
pub struct ListingExtractor {
    config: ExtractorConfig,
    price_element: Regex,
    price_patterns: Vec<Regex>,
    bedroom_element: Regex,
    bedroom_patterns: Vec<Regex>,
    bathroom_element: Regex,
    bathroom_patterns: Vec<Regex>,
    square_feet_patterns: Vec<Regex>,
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns.iter().map(|p| compile(p)).collect()
}

impl ListingExtractor {
    const TITLE: &'static [(&'static str, Strategy<String>)] = &[
        ("og:title", Self::og_title),
        ("h1", Self::first_heading),
        ("title", Self::page_title),
    ];
    const PRICE: &'static [(&'static str, Strategy<String>)] = &[
        ("og:price", Self::og_price),
        ("hinted element", Self::hinted_price),
        ("page text", Self::text_price),
    ];
    const ADDRESS: &'static [(&'static str, Strategy<String>)] = &[
        ("og:street-address", Self::og_address),
        ("hinted element", Self::hinted_address),
    ];
    const BEDROOMS: &'static [(&'static str, Strategy<u32>)] = &[
        ("hinted element", Self::hinted_bedrooms),
        ("page text", Self::text_bedrooms),
    ];
    const BATHROOMS: &'static [(&'static str, Strategy<f64>)] = &[
        ("hinted element", Self::hinted_bathrooms),
        ("page text", Self::text_bathrooms),
    ];
    const SQUARE_FEET: &'static [(&'static str, Strategy<u64>)] =
        &[("page text", Self::text_square_feet)];
    const DESCRIPTION: &'static [(&'static str, Strategy<String>)] = &[
        ("meta description", Self::meta_description),
        ("hinted element", Self::hinted_description),
    ];
    const PROPERTY_TYPE: &'static [(&'static str, Strategy<String>)] =
        &[("vocabulary", Self::vocabulary_property_type)];

    pub fn new(config: ExtractorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            price_element: compile(&config.price_element_pattern)?,
            price_patterns: compile_all(&config.price_patterns)?,
            bedroom_element: compile(&config.bedroom_element_pattern)?,
            bedroom_patterns: compile_all(&config.bedroom_patterns)?,
            bathroom_element: compile(&config.bathroom_element_pattern)?,
            bathroom_patterns: compile_all(&config.bathroom_patterns)?,
            square_feet_patterns: compile_all(&config.square_feet_patterns)?,
            config,
        })
    }

    pub fn extract(&self, html: &str, source_url: &str) -> ListingRecord {
        let document = Html::parse_document(html);
        self.extract_document(&document, source_url)
    }

    pub fn extract_document(&self, document: &Html, source_url: &str) -> ListingRecord {
        let page = Page::new(document, source_url);
        let config = &self.config;

        ListingRecord {
            url: source_url.to_string(),
            title: self
                .resolve("title", &page, Self::TITLE)
                .unwrap_or_else(|| config.default_title.clone()),
            price: self
                .resolve("price", &page, Self::PRICE)
                .unwrap_or_else(|| config.default_price.clone()),
            address: self
                .resolve("address", &page, Self::ADDRESS)
                .unwrap_or_else(|| config.default_address.clone()),
            bedrooms: self.resolve("bedrooms", &page, Self::BEDROOMS),
            bathrooms: self.resolve("bathrooms", &page, Self::BATHROOMS),
            square_feet: self.resolve("square_feet", &page, Self::SQUARE_FEET),
            description: self
                .resolve("description", &page, Self::DESCRIPTION)
                .unwrap_or_else(|| config.default_description.clone()),
            images: self.images(&page),
            property_type: self
                .resolve("property_type", &page, Self::PROPERTY_TYPE)
                .unwrap_or_else(|| config.default_property_type.clone()),
            features: self.features(&page),
        }
    }

    /// Runs `strategies` in order and keeps the first value produced.
    fn resolve<T: std::fmt::Debug>(
        &self,
        field: &str,
        page: &Page<'_>,
        strategies: &[(&str, Strategy<T>)],
    ) -> Option<T> {
        let hit = strategies.iter().find_map(|(tier, strategy)| {
            let value = strategy(self, page)?;
            debug!(field, tier = *tier, ?value, "field resolved");
            Some(value)
        });
        if hit.is_none() {
            debug!(field, "no tier matched, using default");
        }
        hit
    }

    // title

    fn og_title(&self, page: &Page<'_>) -> Option<String> {
        page.meta_content("property", OG_TITLE)
    }

    fn first_heading(&self, page: &Page<'_>) -> Option<String> {
        page.first_tag("h1")
            .map(|h1| element_text(&h1))
            .filter(|text| !text.is_empty())
    }

    fn page_title(&self, page: &Page<'_>) -> Option<String> {
        page.first_tag("title")
            .map(|title| element_text(&title))
            .filter(|text| !text.is_empty())
    }

    // price

    fn og_price(&self, page: &Page<'_>) -> Option<String> {
        page.meta_content("property", OG_PRICE)
            .map(|amount| format!("${}", amount))
    }

    fn hinted_price(&self, page: &Page<'_>) -> Option<String> {
        self.hinted_text(page, &self.config.price_hints, joined_text, |text| {
            self.price_element.find(text).map(|m| m.as_str().to_string())
        })
    }

    fn text_price(&self, page: &Page<'_>) -> Option<String> {
        self.price_patterns
            .iter()
            .find_map(|re| re.find(&page.text))
            .map(|m| m.as_str().to_string())
    }

    // address

    fn og_address(&self, page: &Page<'_>) -> Option<String> {
        page.meta_content("property", OG_ADDRESS)
    }

    fn hinted_address(&self, page: &Page<'_>) -> Option<String> {
        self.hinted_text(page, &self.config.address_hints, element_text, |text| {
            Some(text.to_string()).filter(|t| !t.is_empty())
        })
    }

    // bedrooms / bathrooms / square feet

    fn hinted_bedrooms(&self, page: &Page<'_>) -> Option<u32> {
        self.hinted_text(page, &self.config.bedroom_hints, joined_text, |text| {
            self.bedroom_element.find(text)?.as_str().parse().ok()
        })
    }

    fn text_bedrooms(&self, page: &Page<'_>) -> Option<u32> {
        first_capture(&self.bedroom_patterns, &page.text, |n| n.parse().ok())
    }

    fn hinted_bathrooms(&self, page: &Page<'_>) -> Option<f64> {
        self.hinted_text(page, &self.config.bathroom_hints, joined_text, |text| {
            self.bathroom_element.find(text)?.as_str().parse().ok()
        })
    }

    fn text_bathrooms(&self, page: &Page<'_>) -> Option<f64> {
        first_capture(&self.bathroom_patterns, &page.text, |n| n.parse().ok())
    }

    fn text_square_feet(&self, page: &Page<'_>) -> Option<u64> {
        first_capture(&self.square_feet_patterns, &page.text, |n| {
            n.replace(',', "").parse().ok()
        })
    }

    // description

    fn meta_description(&self, page: &Page<'_>) -> Option<String> {
        page.meta_content("name", "description")
    }

    fn hinted_description(&self, page: &Page<'_>) -> Option<String> {
        self.hinted_text(page, &self.config.description_hints, element_text, |text| {
            Some(truncate_chars(text, self.config.max_description_chars)).filter(|t| !t.is_empty())
        })
    }

    // vocabularies

    /// First vocabulary entry found anywhere in the text, in vocabulary order.
    fn vocabulary_property_type(&self, page: &Page<'_>) -> Option<String> {
        self.config
            .property_types
            .iter()
            .find(|kind| page.lowercase_text.contains(&kind.to_lowercase()))
            .map(|kind| capitalize(kind))
    }

    fn features(&self, page: &Page<'_>) -> Vec<String> {
        self.config
            .features
            .iter()
            .filter(|feature| page.lowercase_text.contains(&feature.to_lowercase()))
            .map(|feature| title_case(feature))
            .take(self.config.max_features)
            .collect()
    }

    fn images(&self, page: &Page<'_>) -> Vec<String> {
        let og_image = page.meta_content("property", OG_IMAGE);
        let sources = page
            .elements()
            .filter(|el| el.value().name() == "img")
            .filter_map(|img| {
                self.config.image_attributes.iter().find_map(|attr| {
                    img.value()
                        .attr(attr)
                        .map(str::trim)
                        .filter(|src| !src.is_empty())
                        .map(str::to_string)
                })
            });

        let mut images: Vec<String> = Vec::new();
        for src in og_image.into_iter().chain(sources) {
            if images.len() >= self.config.max_images {
                break;
            }
            if self.is_denylisted(&src) {
                continue;
            }
            match absolute_image_url(&src, page.base_url.as_ref()) {
                Some(url) if !images.contains(&url) => images.push(url),
                Some(_) => {}
                None => debug!(src = %src, "dropping malformed image URL"),
            }
        }
        images
    }

    fn is_denylisted(&self, src: &str) -> bool {
        let lower = src.to_lowercase();
        self.config
            .image_denylist
            .iter()
            .any(|word| lower.contains(&word.to_lowercase()))
    }

    /// For each hint in order, feeds the `view` of the first matching element
    /// to `narrow`; a hint whose element does not narrow falls through to the next.
    fn hinted_text<T>(
        &self,
        page: &Page<'_>,
        hints: &[ElementHint],
        view: fn(&ElementRef<'_>) -> String,
        narrow: impl Fn(&str) -> Option<T>,
    ) -> Option<T> {
        hints.iter().find_map(|hint| {
            let element = page.first_hinted(hint)?;
            narrow(&view(&element))
        })
    }
}

fn first_capture<T>(patterns: &[Regex], text: &str, convert: impl Fn(&str) -> Option<T>) -> Option<T> {
    patterns.iter().find_map(|re| {
        let caps = re.captures(text)?;
        convert(caps.get(1)?.as_str())
    })
}

/// Resolves protocol- and root-relative sources, then keeps only
/// well-formed http(s) URLs with a host. Protocol-relative sources always
/// get `https:`, whatever the page scheme.
fn absolute_image_url(src: &str, base: Option<&Url>) -> Option<String> {
    let resolved = if src.starts_with("//") {
        format!("https:{}", src)
    } else if src.starts_with('/') {
        base?.join(src).ok()?.to_string()
    } else {
        src.to_string()
    };

    let parsed = Url::parse(&resolved).ok()?;
    let well_formed = matches!(parsed.scheme(), "http" | "https")
        && parsed.host_str().map(|h| !h.is_empty()).unwrap_or(false);
    well_formed.then_some(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://site.com/listing/42";

    fn extractor() -> ListingExtractor {
        ListingExtractor::new(ExtractorConfig::default()).unwrap()
    }

    fn extract(html: &str) -> ListingRecord {
        extractor().extract(html, BASE)
    }

    #[test]
    fn empty_document_yields_defaults() {
        let record = extract("");
        assert_eq!(record.url, BASE);
        assert_eq!(record.title, "Property Listing");
        assert_eq!(record.price, "Price not listed");
        assert_eq!(record.address, "Address not found");
        assert_eq!(record.bedrooms, None);
        assert_eq!(record.bathrooms, None);
        assert_eq!(record.square_feet, None);
        assert_eq!(record.description, "No description available");
        assert!(record.images.is_empty());
        assert_eq!(record.property_type, "Property");
        assert!(record.features.is_empty());
    }

    #[test]
    fn title_prefers_open_graph_then_h1_then_title() {
        let html = r#"<html><head><title>Page</title>
            <meta property="og:title" content="  OG Title "></head>
            <body><h1>Heading</h1></body></html>"#;
        assert_eq!(extract(html).title, "OG Title");

        let html = "<html><head><title>Page</title></head><body><h1> Big  Heading </h1></body></html>";
        assert_eq!(extract(html).title, "Big Heading");

        let html = "<html><head><title>Page Title</title></head><body><h1></h1></body></html>";
        assert_eq!(extract(html).title, "Page Title");
    }

    #[test]
    fn price_from_open_graph_amount() {
        let html = r#"<html><head><meta property="og:price:amount" content="450000"></head>
            <body><span class="price">$1,000</span></body></html>"#;
        assert_eq!(extract(html).price, "$450000");
    }

    #[test]
    fn price_from_hinted_element() {
        let html = r#"<body><p>Save $5 today</p><div class="ListingPrice">Asking $725,000</div></body>"#;
        assert_eq!(extract(html).price, "$725,000");
    }

    #[test]
    fn price_hint_without_amount_falls_through() {
        let html = r#"<body><div class="price">Call us</div><p>Offers over $310,500</p></body>"#;
        assert_eq!(extract(html).price, "$310,500");
    }

    #[test]
    fn price_split_across_spans() {
        let html = r#"<body><div class="price"><span>$</span><span>450,000</span></div></body>"#;
        assert_eq!(extract(html).price, "$450,000");

        let html = "<body><p>Asking <span>$</span><span>389,900</span></p></body>";
        assert_eq!(extract(html).price, "$389,900");
    }

    #[test]
    fn price_test_id_hint_is_exact() {
        let html = r#"<body>
            <span data-testid="price-history">$1</span>
            <span data-testid="price">$612,000</span></body>"#;
        assert_eq!(extract(html).price, "$612,000");
    }

    #[test]
    fn price_label_without_dollar_sign() {
        let html = "<body><p>Price: 199,000</p></body>";
        assert_eq!(extract(html).price, "Price: 199,000");
    }

    #[test]
    fn address_from_itemprop() {
        let html = r#"<body><span itemprop="address">12 Oak Lane, Austin TX</span></body>"#;
        assert_eq!(extract(html).address, "12 Oak Lane, Austin TX");

        let html = r#"<head><meta property="og:street-address" content="1 Elm St"></head>"#;
        assert_eq!(extract(html).address, "1 Elm St");
    }

    #[test]
    fn beds_and_baths_from_hinted_elements() {
        let html = r#"<body>
            <li data-testid="bed-count">4 <span>bd</span></li>
            <li class="baths">2.5 ba</li></body>"#;
        let record = extract(html);
        assert_eq!(record.bedrooms, Some(4));
        assert_eq!(record.bathrooms, Some(2.5));
    }

    #[test]
    fn beds_and_baths_from_text_in_either_order() {
        let record = extract("<body><p>Spacious 3 Bedrooms and 2 Bathrooms</p></body>");
        assert_eq!(record.bedrooms, Some(3));
        assert_eq!(record.bathrooms, Some(2.0));

        assert_eq!(extract("<p>Bedroom: 5</p>").bedrooms, Some(5));
        assert_eq!(extract("<p>Bath: 3.5</p>").bathrooms, Some(3.5));
    }

    #[test]
    fn beds_and_baths_fall_through_hints_without_digits() {
        let html = r#"<body><div class="bed-info">Beds on request</div><p>4 bedrooms</p></body>"#;
        assert_eq!(extract(html).bedrooms, Some(4));

        let html = r#"<body><div class="bath-info">Ask the agent</div><p>Bath: 1.5</p></body>"#;
        assert_eq!(extract(html).bathrooms, Some(1.5));
    }

    #[test]
    fn square_feet_strips_commas() {
        assert_eq!(extract("<p>2,100 sq ft of living</p>").square_feet, Some(2100));
        assert_eq!(extract("<p>Square Feet: 1,850</p>").square_feet, Some(1850));
        assert_eq!(extract("<p>1500sqft</p>").square_feet, Some(1500));
        assert_eq!(extract("<p>no size given</p>").square_feet, None);
    }

    #[test]
    fn square_feet_split_by_inline_markup() {
        assert_eq!(extract("<p>1,<b>850</b> sq ft</p>").square_feet, Some(1850));
    }

    #[test]
    fn description_meta_then_truncated_element() {
        let html = r#"<head><meta name="description" content="Lovely home"></head>"#;
        assert_eq!(extract(html).description, "Lovely home");

        let long = "a".repeat(600);
        let html = format!(r#"<body><div id="property-description">{}</div></body>"#, long);
        let description = extract(&html).description;
        assert_eq!(description.chars().count(), 503);
        assert!(description.ends_with("..."));
    }

    #[test]
    fn description_from_itemprop() {
        let html = r#"<body><p>Intro</p><div itemprop="description">Sunny  two storey home</div></body>"#;
        assert_eq!(extract(html).description, "Sunny two storey home");
    }

    #[test]
    fn protocol_relative_images_use_https_on_http_pages() {
        let record = extractor().extract(
            r#"<body><img src="//cdn.example.com/a.jpg"><img src="/b.jpg"></body>"#,
            "http://site.com/l/1",
        );
        assert_eq!(
            record.images,
            vec!["https://cdn.example.com/a.jpg", "http://site.com/b.jpg"]
        );
    }

    #[test]
    fn images_resolve_filter_and_dedupe() {
        let html = r#"<html><head><meta property="og:image" content="https://cdn.site.com/hero.jpg"></head><body>
            <img src="//cdn.example.com/logo.png">
            <img src="/photos/1.jpg">
            <img src="/photos/1.jpg">
            <img data-src="//cdn.example.com/2.jpg">
            <img src="https://cdn.site.com/hero.jpg">
            <img src="/img/User-Avatar.jpg">
            <img src="not a url">
        </body></html>"#;
        let images = extract(html).images;
        assert_eq!(
            images,
            vec![
                "https://cdn.site.com/hero.jpg",
                "https://site.com/photos/1.jpg",
                "https://cdn.example.com/2.jpg",
            ]
        );
    }

    #[test]
    fn denylisted_open_graph_image_is_dropped() {
        let html = r#"<head><meta property="og:image" content="https://site.com/banner.png"></head>"#;
        assert!(extract(html).images.is_empty());
    }

    #[test]
    fn images_capped_at_ten() {
        let body: String = (0..15)
            .map(|i| format!(r#"<img src="/photos/{}.jpg">"#, i))
            .collect();
        let images = extract(&format!("<body>{}</body>", body)).images;
        assert_eq!(images.len(), 10);
        assert_eq!(images[9], "https://site.com/photos/9.jpg");
    }

    #[test]
    fn property_type_uses_vocabulary_order() {
        let record = extract("<p>This condo is nicer than any house nearby</p>");
        assert_eq!(record.property_type, "House");
        assert_eq!(extract("<p>Corner Townhouse</p>").property_type, "House");
        assert_eq!(extract("<p>Downtown apartment</p>").property_type, "Apartment");
    }

    #[test]
    fn features_in_vocabulary_order_capped_at_five() {
        let html = "<p>Patio, deck, walk-in closet, central air, new roof, pool and a garage</p>";
        let features = extract(html).features;
        assert_eq!(
            features,
            vec!["Pool", "Garage", "New Roof", "Central Air", "Walk-In Closet"]
        );
    }

    #[test]
    fn script_text_is_not_searched() {
        let html = "<head><script>var price = '$9'; var pool = 1;</script></head><body></body>";
        let record = extract(html);
        assert_eq!(record.price, "Price not listed");
        assert!(record.features.is_empty());
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        let config = ExtractorConfig {
            price_patterns: vec!["(unclosed".into()],
            ..ExtractorConfig::default()
        };
        assert!(matches!(
            ListingExtractor::new(config),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn custom_vocabulary_is_honoured() {
        let config = ExtractorConfig {
            features: vec!["sea view".into()],
            property_types: vec!["villa".into()],
            ..ExtractorConfig::default()
        };
        let record = ListingExtractor::new(config)
            .unwrap()
            .extract("<p>Villa with a Sea View</p>", BASE);
        assert_eq!(record.property_type, "Villa");
        assert_eq!(record.features, vec!["Sea View"]);
    }

    #[test]
    fn relative_sources_without_base_are_dropped() {
        assert_eq!(absolute_image_url("/a.jpg", None), None);
        assert_eq!(
            absolute_image_url("//cdn.x.com/a.jpg", None).as_deref(),
            Some("https://cdn.x.com/a.jpg")
        );
        assert_eq!(absolute_image_url("data:image/png;base64,AAAA", None), None);
    }
}
