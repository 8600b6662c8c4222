//! Maps user-supplied video and channel identifiers onto canonical IDs.

use std::sync::{Arc, LazyLock};

use log::{debug, info};
use regex::Regex;

use crate::data_api::{ChannelInfo, MetadataApi, VideoSummary};
use crate::error::TranscriptError;
use crate::extract_video_id;
use crate::quota::QuotaAwareInvoker;

static CHANNEL_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/channel/([A-Za-z0-9_-]+)").expect("valid regex"));
static HANDLE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"youtube\.com/@([^/?#\s]+)").expect("valid regex"));
static CUSTOM_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"youtube\.com/(?:c|user)/([^/?#\s]+)").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceIdentifier {
    /// Input that could not be classified at all (empty, or a bare `@`)
    Raw(String),
    CanonicalChannelId(String),
    /// Handle without the leading `@`
    Handle(String),
    /// Legacy `/c/` or `/user/` name
    CustomPath(String),
    VideoId(String),
}

/// Classify an identifier without touching the network.
///
/// Unrecognized shapes pass through as canonical channel IDs; a bad ID shows up
/// later as a not-found from the API.
pub fn classify(raw: &str) -> ResourceIdentifier {
    let input = raw.trim();
    if input.is_empty() {
        return ResourceIdentifier::Raw(String::new());
    }

    if let Some(video_id) = extract_video_id(input) {
        return ResourceIdentifier::VideoId(video_id);
    }

    if let Some(caps) = CHANNEL_URL.captures(input) {
        return ResourceIdentifier::CanonicalChannelId(caps[1].to_string());
    }

    let handle = HANDLE_URL
        .captures(input)
        .map(|caps| caps[1].to_string())
        .or_else(|| input.strip_prefix('@').map(str::to_string));
    if let Some(handle) = handle {
        return named(input, handle, ResourceIdentifier::Handle);
    }

    let custom = CUSTOM_URL
        .captures(input)
        .map(|caps| caps[1].to_string())
        .or_else(|| {
            input
                .strip_prefix("c/")
                .or_else(|| input.strip_prefix("user/"))
                .map(str::to_string)
        });
    if let Some(name) = custom {
        return named(input, name, ResourceIdentifier::CustomPath);
    }

    ResourceIdentifier::CanonicalChannelId(input.to_string())
}

fn named(input: &str, name: String, make: fn(String) -> ResourceIdentifier) -> ResourceIdentifier {
    let name = name.trim_end_matches('/');
    if name.is_empty() {
        ResourceIdentifier::Raw(input.to_string())
    } else {
        make(name.to_string())
    }
}

#[derive(Clone)]
pub struct SourceResolver {
    api: Arc<dyn MetadataApi>,
    invoker: QuotaAwareInvoker,
}

impl SourceResolver {
    pub fn new(api: Arc<dyn MetadataApi>, invoker: QuotaAwareInvoker) -> Self {
        Self { api, invoker }
    }

    /// Resolve to a `CanonicalChannelId` or `VideoId`.
    ///
    /// Handles and custom paths cost one search call plus one channel lookup.
    pub async fn resolve(&self, raw: &str) -> Result<ResourceIdentifier, TranscriptError> {
        match classify(raw) {
            ResourceIdentifier::Raw(_) => Err(TranscriptError::resolution(raw, "unrecognized identifier")),
            ResourceIdentifier::Handle(name) | ResourceIdentifier::CustomPath(name) => {
                let channel = self.search_channel(raw, &name).await?;
                Ok(ResourceIdentifier::CanonicalChannelId(channel.channel_id))
            }
            resolved => Ok(resolved),
        }
    }

    /// Resolve to a single video; channels resolve to their newest upload.
    pub async fn resolve_video(&self, raw: &str) -> Result<String, TranscriptError> {
        self.resolve_videos(raw, 1)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| TranscriptError::resolution(raw, "channel has no uploads"))
    }

    /// Resolve to up to `max` videos, newest first. A video identifier yields
    /// just that video. Never returns an empty list.
    pub async fn resolve_videos(&self, raw: &str, max: u32) -> Result<Vec<String>, TranscriptError> {
        let channel_id = match self.resolve(raw).await? {
            ResourceIdentifier::VideoId(id) => return Ok(vec![id]),
            ResourceIdentifier::CanonicalChannelId(id) => id,
            other => return Err(TranscriptError::resolution(raw, format!("unresolved identifier {other:?}"))),
        };

        let channel = self.channel_details(raw, &channel_id).await?;
        let uploads = self
            .invoker
            .invoke(|key| {
                let api = Arc::clone(&self.api);
                let channel = channel.clone();
                async move { api.latest_uploads(&key, &channel, max).await }
            })
            .await
            .map_err(|e| TranscriptError::from_api(raw, e))?;

        if uploads.is_empty() {
            return Err(TranscriptError::resolution(raw, "channel has no uploads"));
        }
        info!(
            "Using {} latest upload(s) of {}, newest: {} ({})",
            uploads.len(),
            channel.title,
            uploads[0].title,
            uploads[0].video_id
        );
        Ok(uploads.into_iter().map(|v| v.video_id).collect())
    }

    /// Keyword search over videos, newest first.
    pub async fn search_videos(&self, query: &str, max: u32) -> Result<Vec<VideoSummary>, TranscriptError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(TranscriptError::resolution(query, "empty search query"));
        }
        debug!("Searching videos for '{query}'");
        let videos = self
            .invoker
            .invoke(|key| {
                let api = Arc::clone(&self.api);
                let query = query.to_string();
                async move { api.search_videos(&key, &query, max).await }
            })
            .await
            .map_err(|e| TranscriptError::from_api(query, e))?;

        if videos.is_empty() {
            return Err(TranscriptError::resolution(query, "no videos match"));
        }
        Ok(videos)
    }

    async fn search_channel(&self, raw: &str, query: &str) -> Result<ChannelInfo, TranscriptError> {
        debug!("Searching for channel '{query}'");
        let hits = self
            .invoker
            .invoke(|key| {
                let api = Arc::clone(&self.api);
                let query = query.to_string();
                async move { api.search_channels(&key, &query).await }
            })
            .await
            .map_err(|e| TranscriptError::from_api(raw, e))?;

        let first = hits
            .into_iter()
            .next()
            .ok_or_else(|| TranscriptError::resolution(raw, "channel not found"))?;
        debug!("Search for '{query}' matched {} ({})", first.title, first.channel_id);

        self.channel_details(raw, &first.channel_id).await
    }

    async fn channel_details(&self, raw: &str, channel_id: &str) -> Result<ChannelInfo, TranscriptError> {
        self.invoker
            .invoke(|key| {
                let api = Arc::clone(&self.api);
                let channel_id = channel_id.to_string();
                async move { api.channel_details(&key, &channel_id).await }
            })
            .await
            .map_err(|e| TranscriptError::from_api(raw, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_api::ChannelSummary;
    use crate::fetcher::tests::{MockMetadata, invoker};

    fn resolver(metadata: Arc<MockMetadata>, keys: &[&str]) -> SourceResolver {
        SourceResolver::new(metadata, invoker(keys))
    }

    fn upload(id: &str) -> VideoSummary {
        VideoSummary {
            video_id: id.to_string(),
            title: format!("title {id}"),
            published_at: String::new(),
        }
    }

    fn with_channel(id: &str, title: &str) -> MockMetadata {
        let mut m = MockMetadata::with_video("", "");
        m.channels = vec![ChannelSummary {
            channel_id: id.to_string(),
            title: title.to_string(),
        }];
        m
    }

    #[test]
    fn test_classify_channel_url() {
        assert_eq!(
            classify("https://www.youtube.com/channel/UCuAXFkgsw1L7xaCfnd5JJOw/videos"),
            ResourceIdentifier::CanonicalChannelId("UCuAXFkgsw1L7xaCfnd5JJOw".to_string())
        );
    }

    #[test]
    fn test_classify_handles() {
        assert_eq!(
            classify("https://www.youtube.com/@somehandle/featured"),
            ResourceIdentifier::Handle("somehandle".to_string())
        );
        assert_eq!(classify("@somehandle"), ResourceIdentifier::Handle("somehandle".to_string()));
    }

    #[test]
    fn test_classify_custom_paths() {
        for input in [
            "https://www.youtube.com/c/SomeName",
            "https://youtube.com/user/SomeName?sub=1",
            "c/SomeName",
            "user/SomeName/",
        ] {
            assert_eq!(
                classify(input),
                ResourceIdentifier::CustomPath("SomeName".to_string()),
                "{input}"
            );
        }
    }

    #[test]
    fn test_classify_trims_trailing_slash() {
        assert_eq!(classify("@somehandle/"), ResourceIdentifier::Handle("somehandle".to_string()));
        assert_eq!(classify("c/SomeName/"), ResourceIdentifier::CustomPath("SomeName".to_string()));
    }

    #[test]
    fn test_classify_empty_names_are_raw() {
        for input in ["@", "@/", "c/", "user/"] {
            assert_eq!(classify(input), ResourceIdentifier::Raw(input.to_string()), "{input}");
        }
    }

    #[tokio::test]
    async fn test_bare_at_sign_makes_no_search() {
        let metadata = Arc::new(with_channel("UCabc", "T"));
        let r = resolver(metadata.clone(), &["k1"]);
        assert!(matches!(
            r.resolve("@").await,
            Err(TranscriptError::ResolutionFailure { .. })
        ));
        assert_eq!(*metadata.calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_classify_video() {
        assert_eq!(
            classify("https://youtu.be/dQw4w9WgXcQ"),
            ResourceIdentifier::VideoId("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(classify("dQw4w9WgXcQ"), ResourceIdentifier::VideoId("dQw4w9WgXcQ".to_string()));
    }

    #[test]
    fn test_classify_passthrough_and_empty() {
        assert_eq!(
            classify("  UCuAXFkgsw1L7xaCfnd5JJOw "),
            ResourceIdentifier::CanonicalChannelId("UCuAXFkgsw1L7xaCfnd5JJOw".to_string())
        );
        assert_eq!(
            classify("something odd"),
            ResourceIdentifier::CanonicalChannelId("something odd".to_string())
        );
        assert_eq!(classify("   "), ResourceIdentifier::Raw(String::new()));
    }

    #[tokio::test]
    async fn test_channel_url_needs_no_network() {
        let metadata = Arc::new(MockMetadata::with_video("", ""));
        let r = resolver(metadata.clone(), &["k1"]);
        let resolved = r
            .resolve("https://youtube.com/channel/UCxxxxxxxxxxxxxxxxxxxxxx")
            .await
            .unwrap();
        assert_eq!(
            resolved,
            ResourceIdentifier::CanonicalChannelId("UCxxxxxxxxxxxxxxxxxxxxxx".to_string())
        );
        assert_eq!(*metadata.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_handle_triggers_one_search() {
        let metadata = Arc::new(with_channel("UCabc", "T"));
        let r = resolver(metadata.clone(), &["k1"]);
        let resolved = r.resolve("@somehandle").await.unwrap();
        assert_eq!(resolved, ResourceIdentifier::CanonicalChannelId("UCabc".to_string()));
        assert_eq!(*metadata.searches.lock().unwrap(), vec!["somehandle"]);
    }

    #[tokio::test]
    async fn test_custom_path_searches_by_name() {
        let metadata = Arc::new(with_channel("UCabc", "T"));
        let r = resolver(metadata.clone(), &["k1"]);
        r.resolve("https://www.youtube.com/c/SomeName").await.unwrap();
        assert_eq!(*metadata.searches.lock().unwrap(), vec!["SomeName"]);
    }

    #[tokio::test]
    async fn test_search_without_results() {
        let metadata = Arc::new(MockMetadata::with_video("", ""));
        let r = resolver(metadata, &["k1"]);
        let err = r.resolve("@nobody").await.unwrap_err();
        match err {
            TranscriptError::ResolutionFailure { identifier, reason } => {
                assert_eq!(identifier, "@nobody");
                assert_eq!(reason, "channel not found");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_search_quota_exhausted() {
        let mut metadata = with_channel("UCabc", "T");
        metadata.quota_keys = vec!["k1".to_string(), "k2".to_string()];
        let r = resolver(Arc::new(metadata), &["k1", "k2"]);
        assert!(matches!(
            r.resolve("@somehandle").await,
            Err(TranscriptError::QuotaExhausted)
        ));
    }

    #[tokio::test]
    async fn test_search_rotates_past_exhausted_key() {
        let mut metadata = with_channel("UCabc", "T");
        metadata.quota_keys = vec!["k1".to_string()];
        let r = resolver(Arc::new(metadata), &["k1", "k2"]);
        assert_eq!(
            r.resolve("@somehandle").await.unwrap(),
            ResourceIdentifier::CanonicalChannelId("UCabc".to_string())
        );
    }

    #[tokio::test]
    async fn test_empty_identifier_fails() {
        let r = resolver(Arc::new(MockMetadata::with_video("", "")), &["k1"]);
        assert!(matches!(
            r.resolve("  ").await,
            Err(TranscriptError::ResolutionFailure { .. })
        ));
    }

    #[tokio::test]
    async fn test_resolve_video_from_channel() {
        let mut metadata = with_channel("UCabc", "T");
        metadata.uploads = vec![VideoSummary {
            video_id: "newestvid01".to_string(),
            title: "Newest".to_string(),
            published_at: String::new(),
        }];
        let r = resolver(Arc::new(metadata), &["k1"]);
        assert_eq!(r.resolve_video("@somehandle").await.unwrap(), "newestvid01");
    }

    #[tokio::test]
    async fn test_resolve_videos_lists_latest_uploads() {
        let mut metadata = with_channel("UCabc", "T");
        metadata.uploads = ["vid00000001", "vid00000002", "vid00000003"]
            .iter()
            .map(|id| upload(id))
            .collect();
        let r = resolver(Arc::new(metadata), &["k1"]);
        assert_eq!(
            r.resolve_videos("@somehandle", 2).await.unwrap(),
            vec!["vid00000001", "vid00000002"]
        );
        assert_eq!(
            r.resolve_videos("dQw4w9WgXcQ", 5).await.unwrap(),
            vec!["dQw4w9WgXcQ"]
        );
    }

    #[tokio::test]
    async fn test_search_videos() {
        let mut metadata = MockMetadata::with_video("", "");
        metadata.videos = vec![upload("vid00000001"), upload("vid00000002")];
        let metadata = Arc::new(metadata);
        let r = resolver(metadata.clone(), &["k1"]);

        let found = r.search_videos(" rust async ", 1).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].video_id, "vid00000001");
        assert_eq!(*metadata.searches.lock().unwrap(), vec!["rust async"]);
    }

    #[tokio::test]
    async fn test_search_videos_rotates_and_exhausts() {
        let mut metadata = MockMetadata::with_video("", "");
        metadata.videos = vec![upload("vid00000001")];
        metadata.quota_keys = vec!["k1".to_string()];
        let r = resolver(Arc::new(metadata), &["k1", "k2"]);
        assert_eq!(r.search_videos("rust", 5).await.unwrap().len(), 1);

        let mut metadata = MockMetadata::with_video("", "");
        metadata.quota_keys = vec!["k1".to_string(), "k2".to_string()];
        let r = resolver(Arc::new(metadata), &["k1", "k2"]);
        assert!(matches!(
            r.search_videos("rust", 5).await,
            Err(TranscriptError::QuotaExhausted)
        ));
    }

    #[tokio::test]
    async fn test_search_videos_empty_query_or_no_hits() {
        let metadata = Arc::new(MockMetadata::with_video("", ""));
        let r = resolver(metadata.clone(), &["k1"]);
        assert!(r.search_videos("  ", 5).await.is_err());
        assert_eq!(*metadata.calls.lock().unwrap(), 0);

        let err = r.search_videos("nothing", 5).await.unwrap_err();
        assert!(err.to_string().contains("no videos match"));
    }

    #[tokio::test]
    async fn test_resolve_video_passthrough() {
        let metadata = Arc::new(MockMetadata::with_video("", ""));
        let r = resolver(metadata.clone(), &["k1"]);
        assert_eq!(
            r.resolve_video("https://www.youtube.com/watch?v=dQw4w9WgXcQ").await.unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(*metadata.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_resolve_video_unknown_channel() {
        let r = resolver(Arc::new(MockMetadata::with_video("", "")), &["k1"]);
        assert!(matches!(
            r.resolve_video("UCdoesnotexist000000000").await,
            Err(TranscriptError::ResolutionFailure { .. })
        ));
    }

    #[tokio::test]
    async fn test_resolve_video_channel_without_uploads() {
        let r = resolver(Arc::new(with_channel("UCabc", "T")), &["k1"]);
        let err = r.resolve_video("UCabc").await.unwrap_err();
        assert!(err.to_string().contains("no uploads"));
    }
}
