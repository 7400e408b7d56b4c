pub mod captions;
pub mod error;
pub mod listing;
pub mod processor;
pub mod types;
pub mod youtube_client;

pub use captions::{CaptionFetch, CaptionFetcher, CaptionFile, YtDlpCaptionFetcher};
pub use error::{ScrapeError, ScrapeResult};
pub use listing::{InnerTubeLister, VideoListingProvider};
pub use processor::TranscriptNormalizer;
pub use types::{ListingSelector, ScrapeOptions, TranscriptOutcome, Unavailable, VideoRecord};

use tracing::{debug, info};

/// Lists videos and extracts transcripts
pub struct Scraper<L = InnerTubeLister, C = YtDlpCaptionFetcher> {
    lister: L,
    fetcher: C,
    normalizer: TranscriptNormalizer,
}

impl Scraper {
    /// Scraper backed by the web listing pages and `yt-dlp`
    pub fn new(options: ScrapeOptions) -> Self {
        info!("Initializing scraper against {}", options.base_url);

        let lister = InnerTubeLister::new(&options);
        let fetcher = YtDlpCaptionFetcher::new(&options);

        Self::with_components(lister, fetcher)
    }
}

impl<L, C> Scraper<L, C>
where
    L: VideoListingProvider,
    C: CaptionFetcher,
{
    pub fn with_components(lister: L, fetcher: C) -> Self {
        Self {
            lister,
            fetcher,
            normalizer: TranscriptNormalizer::new(),
        }
    }

    /// Videos for any selector; `limit` is passed to the provider as given
    pub async fn list(
        &self,
        selector: &ListingSelector,
        limit: Option<usize>,
    ) -> ScrapeResult<Vec<VideoRecord>> {
        self.lister.list(selector, limit).await
    }

    pub async fn channel_videos(
        &self,
        channel_id: &str,
        limit: Option<usize>,
    ) -> ScrapeResult<Vec<VideoRecord>> {
        self.lister.by_channel(channel_id, limit).await
    }

    pub async fn playlist_videos(
        &self,
        playlist_id: &str,
        limit: Option<usize>,
    ) -> ScrapeResult<Vec<VideoRecord>> {
        self.lister.by_playlist(playlist_id, limit).await
    }

    pub async fn search_videos(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> ScrapeResult<Vec<VideoRecord>> {
        self.lister.by_search(query, limit).await
    }

    /// Download and normalize the auto-generated captions of a video.
    ///
    /// A downloader failure or a video without captions is reported as
    /// [`TranscriptOutcome::Unavailable`], not as an error. The caption file is
    /// deleted before this returns on every path.
    pub async fn transcript(&self, video_url: &str) -> ScrapeResult<TranscriptOutcome> {
        let file = match self.fetcher.fetch(video_url).await? {
            CaptionFetch::Captions(file) => file,
            CaptionFetch::Unavailable(reason) => {
                info!("No transcript for {}: {:?}", video_url, reason);
                return Ok(TranscriptOutcome::Unavailable(reason));
            }
        };

        let raw = file.read().await?;
        drop(file);

        let text = self.normalizer.normalize_bytes(&raw);
        debug!("Transcript has {} characters", text.len());

        Ok(TranscriptOutcome::Transcript(text))
    }
}

// Convenience functions for one-off operations

/// List videos with default options
pub async fn list_videos(
    selector: &ListingSelector,
    limit: Option<usize>,
) -> ScrapeResult<Vec<VideoRecord>> {
    Scraper::new(ScrapeOptions::default())
        .list(selector, limit)
        .await
}

/// Fetch a transcript with default options
pub async fn get_transcript(video_url: &str) -> ScrapeResult<TranscriptOutcome> {
    Scraper::new(ScrapeOptions::default())
        .transcript(video_url)
        .await
}
