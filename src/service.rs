use std::sync::Arc;

use log::debug;

use crate::Transcript;
use crate::captions::{CaptionSource, DirectSource};
use crate::credentials::CredentialPool;
use crate::data_api::{DataApiClient, MetadataApi, VideoSummary};
use crate::error::TranscriptError;
use crate::fetcher::TranscriptFetcher;
use crate::normalize;
use crate::quota::QuotaAwareInvoker;
use crate::resolver::SourceResolver;
use crate::youtube::{InnerTubeSource, WatchPageSource};
use crate::ytdlp::YtDlpSource;

/// Identifier in, transcript out.
pub struct TranscriptService {
    resolver: SourceResolver,
    fetcher: TranscriptFetcher,
}

impl TranscriptService {
    pub fn new(resolver: SourceResolver, fetcher: TranscriptFetcher) -> Self {
        Self { resolver, fetcher }
    }

    /// Wire the production collaborators around one shared HTTP client.
    pub fn from_client(client: reqwest::Client, pool: Arc<CredentialPool>) -> Self {
        let invoker = QuotaAwareInvoker::new(pool);
        let api: Arc<dyn MetadataApi> = Arc::new(DataApiClient::new(client.clone()));
        let direct: Arc<dyn DirectSource> = Arc::new(InnerTubeSource::new(client.clone()));
        let official: Arc<dyn CaptionSource> = Arc::new(WatchPageSource::new(client.clone()));
        let alternate: Arc<dyn CaptionSource> = Arc::new(YtDlpSource::new(client));

        Self::new(
            SourceResolver::new(Arc::clone(&api), invoker.clone()),
            TranscriptFetcher::new(direct, official, alternate, api, invoker),
        )
    }

    /// Resolve an identifier to the video whose transcript would be fetched.
    pub async fn resolve_video(&self, identifier: &str) -> Result<String, TranscriptError> {
        self.resolver.resolve_video(identifier).await
    }

    /// Up to `max` videos for an identifier; channels yield their latest uploads.
    pub async fn resolve_videos(&self, identifier: &str, max: u32) -> Result<Vec<String>, TranscriptError> {
        self.resolver.resolve_videos(identifier, max).await
    }

    /// Newest videos matching a keyword.
    pub async fn search_videos(&self, query: &str, max: u32) -> Result<Vec<VideoSummary>, TranscriptError> {
        self.resolver.search_videos(query, max).await
    }

    /// Run the fetch ladder for an already-resolved video ID.
    pub async fn transcript_for_video(&self, video_id: &str, lang: &str) -> Transcript {
        self.fetcher.fetch_transcript(video_id, lang).await
    }

    /// Resolve `identifier` (video URL/ID, channel URL, handle or custom path)
    /// and fetch the best available transcript.
    ///
    /// # Errors
    /// - `TranscriptError::ResolutionFailure` - the identifier maps to nothing
    /// - `TranscriptError::QuotaExhausted` - every API key is rate limited
    pub async fn fetch_transcript(&self, identifier: &str, lang: &str) -> Result<Transcript, TranscriptError> {
        let video_id = self.resolve_video(identifier).await?;
        debug!("Resolved '{identifier}' to video {video_id}");
        Ok(self.transcript_for_video(&video_id, lang).await)
    }

    /// Plain-text transcript, segments joined by single spaces.
    pub async fn fetch_transcript_text(&self, identifier: &str, lang: &str) -> Result<String, TranscriptError> {
        let transcript = self.fetch_transcript(identifier, lang).await?;
        Ok(normalize::concatenate(&transcript.segments))
    }
}
