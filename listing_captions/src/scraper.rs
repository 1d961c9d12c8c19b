use backoff::{future::retry, ExponentialBackoff};
use reqwest::Client;
use tracing::{info, warn};
use url::Url;

use crate::config::{ExtractorConfig, FetchConfig};
use crate::error::ScrapeError;
use crate::extract::ListingExtractor;
use crate::ListingRecord;

/// Fetches listing pages and runs them through a [`ListingExtractor`].
pub struct Scraper {
    client: Client,
    config: FetchConfig,
    extractor: ListingExtractor,
}

impl Scraper {
    pub fn new(config: FetchConfig, extractor: ListingExtractor) -> Result<Self, ScrapeError> {
        Ok(Self {
            client: Client::builder()
                .user_agent(config.user_agent.as_str())
                .timeout(config.timeout)
                .build()?,
            config,
            extractor,
        })
    }

    /// Scraper with the stock fetch settings and extraction vocabularies.
    pub fn with_defaults() -> Result<Self, ScrapeError> {
        Self::new(
            FetchConfig::default(),
            ListingExtractor::new(ExtractorConfig::default())?,
        )
    }

    /// Validates, fetches and extracts one listing. A failed fetch yields no record.
    pub async fn scrape(&self, url: &str) -> Result<ListingRecord, ScrapeError> {
        validate_url(url)?;
        let html = self.fetch(url).await?;
        let record = self.extractor.extract(&html, url);
        info!(url, title = %record.title, images = record.images.len(), "listing extracted");
        Ok(record)
    }

    /// GETs `url`, retrying network errors, 429 and 5xx with exponential backoff.
    pub async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.config.max_retry_elapsed),
            ..ExponentialBackoff::default()
        };

        retry(backoff, || async {
            match self.visit(url).await {
                Ok(body) => Ok(body),
                Err(e) if is_transient(&e) => {
                    warn!(url, error = %e, "fetch failed, retrying");
                    Err(backoff::Error::transient(e))
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        })
        .await
    }

    async fn visit(&self, url: &str) -> Result<String, ScrapeError> {
        info!(url, "fetching listing");
        let res = self.client.get(url).send().await?;

        let status = res.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(res.text().await?)
    }
}

fn is_transient(err: &ScrapeError) -> bool {
    match err {
        ScrapeError::Http(_) => true,
        ScrapeError::Status { status, .. } => *status == 429 || *status >= 500,
        _ => false,
    }
}

/// Accepts only absolute http(s) URLs with a host.
pub fn validate_url(url: &str) -> Result<Url, ScrapeError> {
    let parsed = Url::parse(url).map_err(|_| ScrapeError::InvalidUrl(url.to_string()))?;
    let has_host = parsed.host_str().map(|h| !h.is_empty()).unwrap_or(false);
    if matches!(parsed.scheme(), "http" | "https") && has_host {
        Ok(parsed)
    } else {
        Err(ScrapeError::InvalidUrl(url.to_string()))
    }
}

/// Scrapes one listing with default settings.
pub async fn scrape_listing(url: &str) -> Result<ListingRecord, ScrapeError> {
    Scraper::with_defaults()?.scrape(url).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_validation() {
        assert!(validate_url("https://site.com/listing/42").is_ok());
        assert!(validate_url("http://localhost:8080/x").is_ok());
        assert!(matches!(validate_url("ftp://site.com"), Err(ScrapeError::InvalidUrl(_))));
        assert!(matches!(validate_url("site.com/listing"), Err(ScrapeError::InvalidUrl(_))));
        assert!(matches!(validate_url(""), Err(ScrapeError::InvalidUrl(_))));
    }

    #[test]
    fn transient_classification() {
        let status = |status| ScrapeError::Status {
            url: "https://site.com".into(),
            status,
        };
        assert!(is_transient(&status(503)));
        assert!(is_transient(&status(429)));
        assert!(!is_transient(&status(404)));
        assert!(!is_transient(&ScrapeError::InvalidUrl("x".into())));
    }
}
