use crate::error::ScrapeResult;
use crate::types::{ListingSelector, ScrapeOptions, VideoRecord};
use crate::youtube_client::{
    ApiEndpoint, InnerTubeClient, RendererKind, continuation_token, search_json, video_record,
};
use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Source of video listings.
///
/// `limit` is forwarded untouched by every caller; what a limit of zero means
/// is up to the implementation.
#[async_trait]
pub trait VideoListingProvider: Send + Sync {
    async fn by_channel(
        &self,
        channel_id: &str,
        limit: Option<usize>,
    ) -> ScrapeResult<Vec<VideoRecord>>;

    async fn by_playlist(
        &self,
        playlist_id: &str,
        limit: Option<usize>,
    ) -> ScrapeResult<Vec<VideoRecord>>;

    async fn by_search(&self, query: &str, limit: Option<usize>) -> ScrapeResult<Vec<VideoRecord>>;

    async fn list(
        &self,
        selector: &ListingSelector,
        limit: Option<usize>,
    ) -> ScrapeResult<Vec<VideoRecord>> {
        match selector {
            ListingSelector::Channel(id) => self.by_channel(id, limit).await,
            ListingSelector::Playlist(id) => self.by_playlist(id, limit).await,
            ListingSelector::Search(query) => self.by_search(query, limit).await,
        }
    }
}

/// Lists videos by scraping the web pages and following continuation tokens.
///
/// The HTTP client is built on the first listing, so invalid proxy or user
/// agent settings surface there and not at construction.
pub struct InnerTubeLister {
    options: ScrapeOptions,
    client: OnceCell<InnerTubeClient>,
}

impl InnerTubeLister {
    pub fn new(options: &ScrapeOptions) -> Self {
        Self {
            options: options.clone(),
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> ScrapeResult<&InnerTubeClient> {
        self.client
            .get_or_try_init(|| async { InnerTubeClient::new(&self.options) })
            .await
    }

    async fn collect(
        &self,
        selector: &ListingSelector,
        limit: Option<usize>,
    ) -> ScrapeResult<Vec<VideoRecord>> {
        info!(
            "Listing {} videos for {:?} (limit: {:?})",
            selector.kind(),
            selector.value(),
            limit
        );

        let renderer = RendererKind::for_selector(selector);
        let endpoint = ApiEndpoint::for_selector(selector);
        let client = self.client().await?;
        let page_url = client.page_url(selector)?;

        let page = client.fetch_initial_page(&page_url).await?;
        let mut data = page.data;
        let mut seen_tokens = HashSet::new();
        let mut records = Vec::new();

        loop {
            for item in search_json(&data, renderer.key()) {
                records.push(video_record(item)?);
                if limit_reached(records.len(), limit) {
                    info!("Reached limit of {} videos", records.len());
                    return Ok(records);
                }
            }

            let token = match continuation_token(&data) {
                Some(token) => token,
                None => break,
            };
            if !seen_tokens.insert(token.clone()) {
                debug!("Continuation token already followed, stopping");
                break;
            }

            if !self.options.page_delay.is_zero() {
                tokio::time::sleep(self.options.page_delay).await;
            }

            debug!("Following continuation after {} videos", records.len());
            data = client
                .fetch_continuation(endpoint, &page.config, &token)
                .await?;
        }

        info!("Listed {} videos", records.len());
        Ok(records)
    }
}

// The count is checked right after it grows, so it is never zero here and a
// limit of zero never stops the listing.
fn limit_reached(count: usize, limit: Option<usize>) -> bool {
    limit == Some(count)
}

#[async_trait]
impl VideoListingProvider for InnerTubeLister {
    async fn by_channel(
        &self,
        channel_id: &str,
        limit: Option<usize>,
    ) -> ScrapeResult<Vec<VideoRecord>> {
        self.collect(&ListingSelector::Channel(channel_id.to_string()), limit)
            .await
    }

    async fn by_playlist(
        &self,
        playlist_id: &str,
        limit: Option<usize>,
    ) -> ScrapeResult<Vec<VideoRecord>> {
        self.collect(&ListingSelector::Playlist(playlist_id.to_string()), limit)
            .await
    }

    async fn by_search(&self, query: &str, limit: Option<usize>) -> ScrapeResult<Vec<VideoRecord>> {
        self.collect(&ListingSelector::Search(query.to_string()), limit)
            .await
    }
}
