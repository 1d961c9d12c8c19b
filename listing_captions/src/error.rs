use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    MissingEnv(&'static str),
    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Failures reaching the listing page. Extraction itself never fails.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid URL provided: {0}")]
    InvalidUrl(String),
    #[error("failed to fetch page: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to fetch page: HTTP {status} from {url}")]
    Status { url: String, status: u16 },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Failures of the completion call. Parsing itself never fails.
#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("failed to generate captions: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to generate captions: completion endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to generate captions: {0}")]
    MalformedResponse(String),
}
