use thiserror::Error;

/// Result alias used across the crate
pub type ScrapeResult<T> = Result<T, ScrapeError>;

/// Fatal errors. A missing transcript is not one of these, see
/// [`crate::types::TranscriptOutcome`].
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Network error: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("HTTP {status} while fetching {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Could not find {what} in page {url}")]
    PageStructure { what: String, url: String },

    #[error("Malformed video record: {message}")]
    MalformedRecord { message: String },

    #[error("Invalid URL: {source}")]
    InvalidUrl {
        #[from]
        source: url::ParseError,
    },

    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("Failed to launch caption downloader `{program}`: {source}")]
    DownloaderLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File system error: {source}")]
    FileSystem {
        #[from]
        source: std::io::Error,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl ScrapeError {
    pub(crate) fn page_structure(what: &str, url: &str) -> Self {
        ScrapeError::PageStructure {
            what: what.to_string(),
            url: url.to_string(),
        }
    }

    /// Whether the error came from the network layer rather than from parsing
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            ScrapeError::Network { .. } | ScrapeError::HttpStatus { .. }
        )
    }
}
