//! YouTube Data API v3 client.
//!
//! Every call takes the API key explicitly so that
//! [`QuotaAwareInvoker`](crate::quota::QuotaAwareInvoker) can retry with a
//! different credential.

use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Largest page the list endpoints return
pub const MAX_RESULTS: u32 = 50;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub channel_title: String,
    pub published_at: String,
    /// ISO 8601 duration, e.g. `PT5M30S`
    pub duration: String,
    pub view_count: u64,
    pub like_count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSummary {
    pub channel_id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelInfo {
    pub channel_id: String,
    pub title: String,
    pub description: String,
    pub uploads_playlist_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoSummary {
    pub video_id: String,
    pub title: String,
    pub published_at: String,
}

/// Quota-limited video and channel metadata.
#[async_trait]
pub trait MetadataApi: Send + Sync {
    async fn video_metadata(&self, key: &str, video_id: &str) -> Result<VideoMetadata, ApiError>;

    /// Free-text search restricted to channel results, best match first.
    async fn search_channels(&self, key: &str, query: &str) -> Result<Vec<ChannelSummary>, ApiError>;

    async fn channel_details(&self, key: &str, channel_id: &str) -> Result<ChannelInfo, ApiError>;

    /// Most recent uploads of a channel, newest first.
    async fn latest_uploads(&self, key: &str, channel: &ChannelInfo, max: u32) -> Result<Vec<VideoSummary>, ApiError>;

    /// Videos matching a keyword, newest first.
    async fn search_videos(&self, key: &str, query: &str, max: u32) -> Result<Vec<VideoSummary>, ApiError>;
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Snippet {
    title: String,
    description: String,
    channel_title: String,
    published_at: String,
    channel_id: Option<String>,
    resource_id: Option<ResourceId>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ResourceId {
    kind: String,
    video_id: Option<String>,
    channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    #[serde(default)]
    snippet: Snippet,
    content_details: Option<VideoContentDetails>,
    statistics: Option<VideoStatistics>,
}

#[derive(Debug, Deserialize)]
struct VideoContentDetails {
    #[serde(default)]
    duration: String,
}

/// Counts arrive as decimal strings and may be hidden
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct VideoStatistics {
    view_count: Option<String>,
    like_count: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: ResourceId,
    #[serde(default)]
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelItem {
    id: String,
    #[serde(default)]
    snippet: Snippet,
    content_details: Option<ChannelContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelContentDetails {
    related_playlists: Option<RelatedPlaylists>,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    #[serde(default)]
    snippet: Snippet,
}

impl From<VideoItem> for VideoMetadata {
    fn from(item: VideoItem) -> Self {
        let stats = item.statistics.unwrap_or_default();
        let count = |v: Option<String>| v.and_then(|s| s.parse::<u64>().ok()).unwrap_or(0);
        VideoMetadata {
            title: item.snippet.title,
            description: item.snippet.description,
            channel_title: item.snippet.channel_title,
            published_at: item.snippet.published_at,
            duration: item.content_details.map(|c| c.duration).unwrap_or_default(),
            view_count: count(stats.view_count),
            like_count: count(stats.like_count),
        }
    }
}

impl From<ChannelItem> for ChannelInfo {
    fn from(item: ChannelItem) -> Self {
        ChannelInfo {
            channel_id: item.id,
            title: item.snippet.title,
            description: item.snippet.description,
            uploads_playlist_id: item
                .content_details
                .and_then(|c| c.related_playlists)
                .and_then(|p| p.uploads),
        }
    }
}

/// HTTP implementation of [`MetadataApi`]
#[derive(Debug, Clone)]
pub struct DataApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl DataApiClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get<T: DeserializeOwned>(&self, resource: &str, key: &str, query: &[(&str, &str)]) -> Result<T, ApiError> {
        let url = format!("{}/{resource}", self.base_url);
        debug!("GET {url} {query:?}");

        let resp = self
            .client
            .get(&url)
            .query(query)
            .query(&[("key", key)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status.as_u16(), &body));
        }

        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| ApiError::Parse(format!("{resource}: {e}")))
    }
}

#[async_trait]
impl MetadataApi for DataApiClient {
    async fn video_metadata(&self, key: &str, video_id: &str) -> Result<VideoMetadata, ApiError> {
        let resp: ListResponse<VideoItem> = self
            .get("videos", key, &[("part", "snippet,contentDetails,statistics"), ("id", video_id)])
            .await?;
        resp.items
            .into_iter()
            .next()
            .map(VideoMetadata::from)
            .ok_or_else(|| ApiError::NotFound(format!("video {video_id}")))
    }

    async fn search_channels(&self, key: &str, query: &str) -> Result<Vec<ChannelSummary>, ApiError> {
        let resp: ListResponse<SearchItem> = self
            .get(
                "search",
                key,
                &[("part", "snippet"), ("q", query), ("type", "video,channel"), ("maxResults", "10")],
            )
            .await?;
        Ok(channels_from_search(resp.items))
    }

    async fn channel_details(&self, key: &str, channel_id: &str) -> Result<ChannelInfo, ApiError> {
        let resp: ListResponse<ChannelItem> = self
            .get("channels", key, &[("part", "snippet,contentDetails"), ("id", channel_id)])
            .await?;
        resp.items
            .into_iter()
            .next()
            .map(ChannelInfo::from)
            .ok_or_else(|| ApiError::NotFound(format!("channel {channel_id}")))
    }

    async fn latest_uploads(&self, key: &str, channel: &ChannelInfo, max: u32) -> Result<Vec<VideoSummary>, ApiError> {
        let Some(playlist_id) = channel.uploads_playlist_id.as_deref() else {
            return Ok(Vec::new());
        };
        let max = max.clamp(1, MAX_RESULTS).to_string();
        let resp: ListResponse<PlaylistItem> = self
            .get(
                "playlistItems",
                key,
                &[("part", "snippet"), ("playlistId", playlist_id), ("maxResults", max.as_str())],
            )
            .await?;
        Ok(resp
            .items
            .into_iter()
            .filter_map(|item| {
                let video_id = item.snippet.resource_id?.video_id?;
                Some(VideoSummary {
                    video_id,
                    title: item.snippet.title,
                    published_at: item.snippet.published_at,
                })
            })
            .collect())
    }

    async fn search_videos(&self, key: &str, query: &str, max: u32) -> Result<Vec<VideoSummary>, ApiError> {
        let max = max.clamp(1, MAX_RESULTS).to_string();
        let resp: ListResponse<SearchItem> = self
            .get(
                "search",
                key,
                &[
                    ("part", "snippet"),
                    ("q", query),
                    ("type", "video"),
                    ("order", "date"),
                    ("maxResults", max.as_str()),
                ],
            )
            .await?;
        Ok(videos_from_search(resp.items))
    }
}

fn videos_from_search(items: Vec<SearchItem>) -> Vec<VideoSummary> {
    items
        .into_iter()
        .filter_map(|item| {
            Some(VideoSummary {
                video_id: item.id.video_id?,
                title: item.snippet.title,
                published_at: item.snippet.published_at,
            })
        })
        .collect()
}

/// Keep channel hits from a mixed video+channel search, in result order.
fn channels_from_search(items: Vec<SearchItem>) -> Vec<ChannelSummary> {
    items
        .into_iter()
        .filter(|item| item.id.kind == "youtube#channel")
        .filter_map(|item| {
            let channel_id = item.id.channel_id.or(item.snippet.channel_id)?;
            Some(ChannelSummary {
                channel_id,
                title: item.snippet.title,
            })
        })
        .collect()
}
