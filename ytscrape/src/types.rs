use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Prefix of every watch URL handed out in a [`VideoRecord`]
pub const WATCH_URL_PREFIX: &str = "https://youtube.com/watch?v=";

/// One listed video. The URL is always derived from the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoRecord {
    id: String,
    title: String,
    url: String,
}

impl VideoRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let id = id.into();
        let url = format!("{}{}", WATCH_URL_PREFIX, id);
        Self {
            id,
            title: title.into(),
            url,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for VideoRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.title)
    }
}

/// What to enumerate videos from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingSelector {
    Channel(String),
    Playlist(String),
    Search(String),
}

impl ListingSelector {
    pub fn kind(&self) -> &'static str {
        match self {
            ListingSelector::Channel(_) => "channel",
            ListingSelector::Playlist(_) => "playlist",
            ListingSelector::Search(_) => "search",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            ListingSelector::Channel(v) | ListingSelector::Playlist(v) | ListingSelector::Search(v) => v,
        }
    }
}

/// Why no transcript could be produced. Reported to the user, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unavailable {
    /// The downloader exited unsuccessfully
    DownloaderFailed { status: Option<i32>, stderr: String },
    /// The downloader succeeded but wrote no caption file
    NoCaptions,
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unavailable::DownloaderFailed { stderr, .. } => write!(f, "Error: {}", stderr.trim_end()),
            Unavailable::NoCaptions => write!(f, "No transcript available for this video"),
        }
    }
}

/// Result of a transcript request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptOutcome {
    /// Normalized transcript; may be empty when every cue was filtered out
    Transcript(String),
    Unavailable(Unavailable),
}

impl TranscriptOutcome {
    pub fn transcript(&self) -> Option<&str> {
        match self {
            TranscriptOutcome::Transcript(text) => Some(text),
            TranscriptOutcome::Unavailable(_) => None,
        }
    }
}

/// Configuration shared by the listing client and the caption fetcher
#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    pub base_url: String,
    pub user_agent: Option<String>,
    pub proxy: Option<String>,
    /// HTTP timeout; `None` waits indefinitely
    pub timeout_seconds: Option<u64>,
    /// Pause between continuation requests
    pub page_delay: Duration,
    pub yt_dlp_path: String,
    pub subtitle_language: Option<String>,
    /// Directory the temporary caption directory is created in
    pub work_dir: PathBuf,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            base_url: "https://www.youtube.com".to_string(),
            user_agent: None,
            proxy: None,
            timeout_seconds: None,
            page_delay: Duration::from_secs(1),
            yt_dlp_path: "yt-dlp".to_string(),
            subtitle_language: None,
            work_dir: PathBuf::from("."),
        }
    }
}

impl ScrapeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = Some(user_agent.to_string());
        self
    }

    pub fn proxy(mut self, proxy: &str) -> Self {
        self.proxy = Some(proxy.to_string());
        self
    }

    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    pub fn page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    pub fn yt_dlp_path(mut self, path: &str) -> Self {
        self.yt_dlp_path = path.to_string();
        self
    }

    pub fn subtitle_language(mut self, language: &str) -> Self {
        self.subtitle_language = Some(language.to_string());
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }
}
