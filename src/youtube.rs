use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::env;
use tracing::warn;

use crate::error::{Error, Result};
use crate::models::Video;

const YOUTUBE_BASE: &str = "https://www.googleapis.com/youtube/v3";
const REGION_CODE: &str = "US";
const SINGLE_RESULT: u32 = 1;
const DISCOVERY_RESULTS: u32 = 12;

#[derive(Debug, Clone)]
pub struct YoutubeClient {
    client: Client,
    api_key: Option<String>,
}

#[async_trait]
pub trait YoutubeApi: Send + Sync {
    async fn search_trailer(&self, title: &str) -> Result<Option<Video>>;
    async fn search_trailers(&self, query: &str) -> Result<Vec<Video>>;
}

impl YoutubeClient {
    /// A missing key is expected, not an error: lookups come back empty and
    /// the rest of the app keeps working.
    pub fn from_env() -> Self {
        let api_key = env::var("YOUTUBE_API_KEY").ok().filter(|k| !k.is_empty());
        if api_key.is_none() {
            warn!("YOUTUBE_API_KEY not set; trailer lookups will come back empty");
        }
        Self {
            client: Client::new(),
            api_key,
        }
    }

    async fn search_videos(&self, search_query: &str, max_results: u32) -> Result<Vec<Video>> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(Vec::new());
        };
        let url = format!(
            "{YOUTUBE_BASE}/search?part=snippet&q={}&type=video&maxResults={max_results}&order=relevance&regionCode={REGION_CODE}&key={api_key}",
            urlencoding::encode(search_query)
        );
        let res = self.client.get(&url).send().await?;
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(Error::Provider(format!("{status}: {text}")));
        }
        let listing: SearchListing = serde_json::from_str(&text)
            .map_err(|e| Error::Provider(format!("bad response body: {e}")))?;
        Ok(listing.items.into_iter().filter_map(item_to_video).collect())
    }
}

#[async_trait]
impl YoutubeApi for YoutubeClient {
    async fn search_trailer(&self, title: &str) -> Result<Option<Video>> {
        let videos = self
            .search_videos(&format!("{title} trailer official"), SINGLE_RESULT)
            .await?;
        Ok(videos.into_iter().next())
    }

    async fn search_trailers(&self, query: &str) -> Result<Vec<Video>> {
        self.search_videos(&format!("{query} trailer"), DISCOVERY_RESULTS)
            .await
    }
}

pub fn embed_url(video_id: &str) -> String {
    format!("https://www.youtube.com/embed/{video_id}?autoplay=1&controls=1&modestbranding=1")
}

#[derive(Debug, Deserialize)]
struct SearchListing {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: VideoRef,
    snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
struct VideoRef {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    title: String,
    #[serde(default)]
    description: String,
    thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Deserialize)]
struct Thumbnails {
    high: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

fn item_to_video(item: SearchItem) -> Option<Video> {
    let video_id = item.id.video_id?;
    let snippet = item.snippet?;
    let thumbnail = snippet
        .thumbnails
        .and_then(|t| t.high)
        .map(|t| t.url)
        .unwrap_or_default();
    Some(Video {
        url: format!("https://www.youtube.com/watch?v={video_id}"),
        id: video_id,
        title: snippet.title,
        description: snippet.description,
        thumbnail,
    })
}
