// Page scraping against the InnerTube web endpoints, the same ones the
// channel, playlist and search pages use for infinite scrolling.
use crate::error::{ScrapeError, ScrapeResult};
use crate::types::{ListingSelector, ScrapeOptions, VideoRecord};
use regex::Regex;
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue},
};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::debug;
use url::Url;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Search filter: sort by relevance, videos only
const SEARCH_FILTER: &str = "CAASAhAB";

const INITIAL_DATA_MARKERS: [&str; 3] = [
    "var ytInitialData = ",
    "window[\"ytInitialData\"] = ",
    "ytInitialData = ",
];

/// JSON key of the objects that describe one video on a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererKind {
    Video,
    PlaylistVideo,
}

impl RendererKind {
    pub fn for_selector(selector: &ListingSelector) -> Self {
        match selector {
            ListingSelector::Playlist(_) => RendererKind::PlaylistVideo,
            ListingSelector::Channel(_) | ListingSelector::Search(_) => RendererKind::Video,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            RendererKind::Video => "videoRenderer",
            RendererKind::PlaylistVideo => "playlistVideoRenderer",
        }
    }
}

/// InnerTube endpoint serving continuation pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiEndpoint {
    Browse,
    Search,
}

impl ApiEndpoint {
    pub fn for_selector(selector: &ListingSelector) -> Self {
        match selector {
            ListingSelector::Search(_) => ApiEndpoint::Search,
            ListingSelector::Channel(_) | ListingSelector::Playlist(_) => ApiEndpoint::Browse,
        }
    }

    fn path(&self) -> &'static str {
        match self {
            ApiEndpoint::Browse => "/youtubei/v1/browse",
            ApiEndpoint::Search => "/youtubei/v1/search",
        }
    }
}

/// Client settings embedded in the initial HTML page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageConfig {
    pub api_key: String,
    pub client_version: String,
}

/// The first page of a listing
#[derive(Debug)]
pub struct InitialPage {
    pub config: PageConfig,
    pub data: Value,
}

/// HTTP client for listing pages and their continuations
pub struct InnerTubeClient {
    client: Client,
    base_url: String,
    api_key_regex: Regex,
    client_version_regex: Regex,
}

impl InnerTubeClient {
    pub fn new(options: &ScrapeOptions) -> ScrapeResult<Self> {
        let mut headers = HeaderMap::new();

        let user_agent = options.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
        headers.insert(
            reqwest::header::USER_AGENT,
            HeaderValue::from_str(user_agent).map_err(|_| ScrapeError::Configuration {
                message: "Invalid user agent".to_string(),
            })?,
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en"),
        );
        // Skips the cookie consent interstitial served in some regions
        headers.insert(reqwest::header::COOKIE, HeaderValue::from_static("SOCS=CAI"));

        let mut client_builder = Client::builder()
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(10));

        if let Some(seconds) = options.timeout_seconds {
            client_builder = client_builder.timeout(Duration::from_secs(seconds));
        }

        if let Some(proxy_url) = &options.proxy {
            let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| ScrapeError::Configuration {
                message: format!("Invalid proxy URL: {}", e),
            })?;
            client_builder = client_builder.proxy(proxy);
        }

        let client = client_builder
            .build()
            .map_err(|e| ScrapeError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let api_key_regex = Regex::new(r#""(?:INNERTUBE_API_KEY|innertubeApiKey)"\s*:\s*"([^"]+)""#)
            .expect("Valid API key regex");
        let client_version_regex = Regex::new(
            r#""(?:INNERTUBE_CONTEXT_CLIENT_VERSION|clientVersion)"\s*:\s*"([^"]+)""#,
        )
        .expect("Valid client version regex");

        Ok(Self {
            client,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            api_key_regex,
            client_version_regex,
        })
    }

    /// URL of the HTML page that starts a listing
    pub fn page_url(&self, selector: &ListingSelector) -> ScrapeResult<Url> {
        let url = match selector {
            ListingSelector::Channel(id) => {
                let path = if id.starts_with('@') {
                    format!("{}/{}/videos", self.base_url, id)
                } else {
                    format!("{}/channel/{}/videos", self.base_url, id)
                };
                let mut url = Url::parse(&path)?;
                url.query_pairs_mut()
                    .append_pair("view", "0")
                    .append_pair("flow", "grid");
                url
            }
            ListingSelector::Playlist(id) => {
                let mut url = Url::parse(&format!("{}/playlist", self.base_url))?;
                url.query_pairs_mut().append_pair("list", id);
                url
            }
            ListingSelector::Search(query) => {
                let mut url = Url::parse(&format!("{}/results", self.base_url))?;
                url.query_pairs_mut()
                    .append_pair("search_query", query)
                    .append_pair("sp", SEARCH_FILTER);
                url
            }
        };
        Ok(url)
    }

    /// Fetch the HTML page and pull out its client settings and `ytInitialData`
    pub async fn fetch_initial_page(&self, url: &Url) -> ScrapeResult<InitialPage> {
        debug!("Requesting listing page {}", url);

        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(ScrapeError::HttpStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let html = response.text().await?;
        debug!("Listing page is {} bytes", html.len());

        let config = self.extract_page_config(&html, url.as_str())?;
        let data = extract_initial_data(&html, url.as_str())?;

        Ok(InitialPage { config, data })
    }

    /// Request the page that follows `token`
    pub async fn fetch_continuation(
        &self,
        endpoint: ApiEndpoint,
        config: &PageConfig,
        token: &str,
    ) -> ScrapeResult<Value> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, endpoint.path()))?;
        url.query_pairs_mut()
            .append_pair("key", &config.api_key)
            .append_pair("prettyPrint", "false");

        let body = json!({
            "context": {
                "client": {
                    "clientName": "WEB",
                    "clientVersion": config.client_version,
                    "hl": "en",
                },
            },
            "continuation": token,
        });

        debug!("Requesting continuation page from {}", endpoint.path());

        let response = self
            .client
            .post(url.clone())
            .header("X-YouTube-Client-Name", "1")
            .header("X-YouTube-Client-Version", config.client_version.as_str())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ScrapeError::HttpStatus {
                status: response.status().as_u16(),
                url: format!("{}{}", self.base_url, endpoint.path()),
            });
        }

        Ok(response.json().await?)
    }

    fn extract_page_config(&self, html: &str, url: &str) -> ScrapeResult<PageConfig> {
        let api_key = first_capture(&self.api_key_regex, html)
            .ok_or_else(|| ScrapeError::page_structure("InnerTube API key", url))?;
        let client_version = first_capture(&self.client_version_regex, html)
            .ok_or_else(|| ScrapeError::page_structure("InnerTube client version", url))?;

        Ok(PageConfig {
            api_key,
            client_version,
        })
    }
}

fn first_capture(regex: &Regex, text: &str) -> Option<String> {
    regex
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}

/// Parse the `ytInitialData` object embedded in a page
pub fn extract_initial_data(html: &str, url: &str) -> ScrapeResult<Value> {
    for marker in INITIAL_DATA_MARKERS {
        let Some(start) = html.find(marker) else {
            continue;
        };

        // The object is followed by more script, so read exactly one value
        let json_start = start + marker.len();
        let mut values = serde_json::Deserializer::from_str(&html[json_start..]).into_iter::<Value>();
        match values.next() {
            Some(Ok(data)) => return Ok(data),
            Some(Err(e)) => debug!("Failed to parse ytInitialData after {:?}: {}", marker, e),
            None => {}
        }
    }

    Err(ScrapeError::page_structure("ytInitialData", url))
}

/// Breadth-first search for every value stored under `key`, in document order.
/// Matched values are not searched further.
pub fn search_json<'a>(root: &'a Value, key: &str) -> Vec<&'a Value> {
    let mut found = Vec::new();
    let mut queue = VecDeque::from([root]);

    while let Some(current) = queue.pop_front() {
        match current {
            Value::Object(map) => {
                for (name, value) in map {
                    if name == key {
                        found.push(value);
                    } else {
                        queue.push_back(value);
                    }
                }
            }
            Value::Array(items) => queue.extend(items.iter()),
            _ => {}
        }
    }

    found
}

/// Token of the next page, if the page has one
pub fn continuation_token(data: &Value) -> Option<String> {
    search_json(data, "continuationItemRenderer")
        .into_iter()
        .next()
        .and_then(|renderer| renderer.pointer("/continuationEndpoint/continuationCommand/token"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Build a record from a `videoRenderer` or `playlistVideoRenderer` object
pub fn video_record(renderer: &Value) -> ScrapeResult<VideoRecord> {
    let id = renderer
        .get("videoId")
        .and_then(Value::as_str)
        .ok_or_else(|| ScrapeError::MalformedRecord {
            message: "renderer has no videoId".to_string(),
        })?;

    let title = renderer
        .pointer("/title/runs/0/text")
        .or_else(|| renderer.pointer("/title/simpleText"))
        .and_then(Value::as_str)
        .ok_or_else(|| ScrapeError::MalformedRecord {
            message: format!("video {} has no title text", id),
        })?;

    Ok(VideoRecord::new(id, title))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> InnerTubeClient {
        InnerTubeClient::new(&ScrapeOptions::default()).unwrap()
    }

    const PAGE: &str = r#"<html><script>ytcfg.set({"INNERTUBE_API_KEY":"AIzaTestKey","INNERTUBE_CONTEXT_CLIENT_VERSION":"2.20240815.00.00"});</script>
<script>var ytInitialData = {"contents":{"items":[{"videoRenderer":{"videoId":"abc","title":{"runs":[{"text":"First"}]}}}]}};</script></html>"#;

    #[test]
    fn test_extract_page_config() {
        let config = client().extract_page_config(PAGE, "test").unwrap();
        assert_eq!(config.api_key, "AIzaTestKey");
        assert_eq!(config.client_version, "2.20240815.00.00");
    }

    #[test]
    fn test_extract_page_config_lowercase_keys() {
        let html = r#"{"innertubeApiKey": "AIzaOther", "clientVersion": "2.1"}"#;
        let config = client().extract_page_config(html, "test").unwrap();
        assert_eq!(config.api_key, "AIzaOther");
        assert_eq!(config.client_version, "2.1");
    }

    #[test]
    fn test_extract_page_config_missing() {
        let result = client().extract_page_config("<html></html>", "https://example.com");
        assert!(matches!(result, Err(ScrapeError::PageStructure { .. })));
    }

    #[test]
    fn test_extract_initial_data_ignores_trailing_script() {
        let data = extract_initial_data(PAGE, "test").unwrap();
        assert_eq!(
            data.pointer("/contents/items/0/videoRenderer/videoId"),
            Some(&json!("abc"))
        );
    }

    #[test]
    fn test_extract_initial_data_window_assignment() {
        let html = r#"<script>window["ytInitialData"] = {"a":1};</script>"#;
        let data = extract_initial_data(html, "test").unwrap();
        assert_eq!(data, json!({"a": 1}));
    }

    #[test]
    fn test_extract_initial_data_missing() {
        let result = extract_initial_data("<html></html>", "test");
        assert!(matches!(result, Err(ScrapeError::PageStructure { .. })));
    }

    #[test]
    fn test_search_json_document_order() {
        let data = json!({
            "tabs": [
                {"videoRenderer": {"videoId": "one"}},
                {"section": {"items": [{"videoRenderer": {"videoId": "three"}}]}},
                {"videoRenderer": {"videoId": "two"}},
            ]
        });

        let ids: Vec<&str> = search_json(&data, "videoRenderer")
            .into_iter()
            .filter_map(|v| v.get("videoId").and_then(Value::as_str))
            .collect();
        assert_eq!(ids, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_search_json_keeps_object_key_order() {
        let data: Value = serde_json::from_str(
            r#"{"secondary":{"videoRenderer":{"videoId":"first"}},"primary":{"videoRenderer":{"videoId":"second"}}}"#,
        )
        .unwrap();

        let ids: Vec<&str> = search_json(&data, "videoRenderer")
            .into_iter()
            .filter_map(|v| v.get("videoId").and_then(Value::as_str))
            .collect();
        assert_eq!(ids, vec!["first", "second"]);
    }

    #[test]
    fn test_continuation_token_first_in_page() {
        let data: Value = serde_json::from_str(
            r#"{
                "zcontents": {"continuationItemRenderer": {"continuationEndpoint": {"continuationCommand": {"token": "PAGE_FIRST"}}}},
                "alt": {"continuationItemRenderer": {"continuationEndpoint": {"continuationCommand": {"token": "PAGE_SECOND"}}}}
            }"#,
        )
        .unwrap();

        assert_eq!(continuation_token(&data).as_deref(), Some("PAGE_FIRST"));
    }

    #[test]
    fn test_search_json_does_not_descend_into_matches() {
        let data = json!({"videoRenderer": {"videoRenderer": {"videoId": "inner"}}});
        assert_eq!(search_json(&data, "videoRenderer").len(), 1);
    }

    #[test]
    fn test_continuation_token() {
        let data = json!({
            "items": [
                {"videoRenderer": {"videoId": "a"}},
                {"continuationItemRenderer": {
                    "continuationEndpoint": {
                        "clickTrackingParams": "xyz",
                        "continuationCommand": {"token": "NEXT"}
                    }
                }}
            ]
        });
        assert_eq!(continuation_token(&data).as_deref(), Some("NEXT"));
        assert_eq!(continuation_token(&json!({"items": []})), None);
    }

    #[test]
    fn test_video_record_from_runs_and_simple_text() {
        let runs = json!({"videoId": "abc", "title": {"runs": [{"text": "Runs title"}, {"text": "ignored"}]}});
        let record = video_record(&runs).unwrap();
        assert_eq!(record.id(), "abc");
        assert_eq!(record.title(), "Runs title");
        assert_eq!(record.url(), "https://youtube.com/watch?v=abc");

        let simple = json!({"videoId": "def", "title": {"simpleText": "Simple title"}});
        assert_eq!(video_record(&simple).unwrap().title(), "Simple title");
    }

    #[test]
    fn test_video_record_malformed() {
        assert!(matches!(
            video_record(&json!({"title": {"simpleText": "x"}})),
            Err(ScrapeError::MalformedRecord { .. })
        ));
        assert!(matches!(
            video_record(&json!({"videoId": "abc"})),
            Err(ScrapeError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_page_urls() {
        let client = client();

        let url = client
            .page_url(&ListingSelector::Channel("UC123".to_string()))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.youtube.com/channel/UC123/videos?view=0&flow=grid"
        );

        let url = client
            .page_url(&ListingSelector::Channel("@rustlang".to_string()))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.youtube.com/@rustlang/videos?view=0&flow=grid"
        );

        let url = client
            .page_url(&ListingSelector::Playlist("PL42".to_string()))
            .unwrap();
        assert_eq!(url.as_str(), "https://www.youtube.com/playlist?list=PL42");

        let url = client
            .page_url(&ListingSelector::Search("rust & tokio".to_string()))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.youtube.com/results?search_query=rust+%26+tokio&sp=CAASAhAB"
        );
    }

    #[test]
    fn test_renderer_and_endpoint_selection() {
        let playlist = ListingSelector::Playlist("PL".to_string());
        let search = ListingSelector::Search("q".to_string());
        let channel = ListingSelector::Channel("UC".to_string());

        assert_eq!(RendererKind::for_selector(&playlist).key(), "playlistVideoRenderer");
        assert_eq!(RendererKind::for_selector(&search).key(), "videoRenderer");
        assert_eq!(ApiEndpoint::for_selector(&search), ApiEndpoint::Search);
        assert_eq!(ApiEndpoint::for_selector(&channel), ApiEndpoint::Browse);
        assert_eq!(ApiEndpoint::for_selector(&playlist), ApiEndpoint::Browse);
    }

    #[test]
    fn test_invalid_user_agent_rejected() {
        let options = ScrapeOptions::new().user_agent("bad\nagent");
        assert!(matches!(
            InnerTubeClient::new(&options),
            Err(ScrapeError::Configuration { .. })
        ));
    }
}
