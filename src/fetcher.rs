//! The transcript fetch ladder.
//!
//! Each rung is tried in order and the first one that yields segments wins.
//! When every rung misses, a transcript is synthesized from the video's title
//! and description, so [`TranscriptFetcher::fetch`] never comes back empty.

use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::captions::{CaptionSource, CaptionTrack, DirectSource, pick_track, select_track};
use crate::data_api::{MetadataApi, VideoMetadata};
use crate::error::CaptionError;
use crate::normalize::{self, RawTranscript};
use crate::quota::QuotaAwareInvoker;
use crate::{Segment, Transcript, TranscriptSource};

/// Result of a single rung
#[derive(Debug, Clone, PartialEq)]
pub enum FetchAttemptOutcome {
    Success(Vec<Segment>),
    NotFound,
    Disabled,
    QuotaExceeded,
    TransientError(String),
}

impl From<Result<RawTranscript, CaptionError>> for FetchAttemptOutcome {
    fn from(result: Result<RawTranscript, CaptionError>) -> Self {
        match result {
            Ok(raw) => match normalize::normalize(raw) {
                segments if segments.is_empty() => FetchAttemptOutcome::NotFound,
                segments => FetchAttemptOutcome::Success(segments),
            },
            Err(CaptionError::NotFound) => FetchAttemptOutcome::NotFound,
            Err(CaptionError::Disabled) => FetchAttemptOutcome::Disabled,
            Err(CaptionError::QuotaExceeded) => FetchAttemptOutcome::QuotaExceeded,
            Err(CaptionError::Transient(reason)) => FetchAttemptOutcome::TransientError(reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rung {
    PrimaryDirectFetch,
    OfficialExactLanguage,
    OfficialAutoGeneratedLanguage,
    EnglishFallback,
    AnyAvailableLanguage,
    AlternateBackendFetch,
}

/// Caption rungs in the order they are tried. Metadata synthesis follows.
pub const LADDER: [Rung; 6] = [
    Rung::PrimaryDirectFetch,
    Rung::OfficialExactLanguage,
    Rung::OfficialAutoGeneratedLanguage,
    Rung::EnglishFallback,
    Rung::AnyAvailableLanguage,
    Rung::AlternateBackendFetch,
];

impl Rung {
    pub fn source(self) -> TranscriptSource {
        match self {
            Rung::PrimaryDirectFetch => TranscriptSource::Direct,
            Rung::AlternateBackendFetch => TranscriptSource::Alternate,
            _ => TranscriptSource::Official,
        }
    }

    /// Language codes tried against the rung's source, in order.
    fn codes(self, lang: &str) -> Vec<String> {
        match self {
            Rung::OfficialExactLanguage => vec![lang.to_string()],
            Rung::OfficialAutoGeneratedLanguage => vec![format!("{lang}-generated"), format!("asr-{lang}")],
            Rung::EnglishFallback => vec!["en".to_string(), "en-generated".to_string(), "asr-en".to_string()],
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Rung {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rung::PrimaryDirectFetch => "primary-direct",
            Rung::OfficialExactLanguage => "official-exact",
            Rung::OfficialAutoGeneratedLanguage => "official-auto-generated",
            Rung::EnglishFallback => "english-fallback",
            Rung::AnyAvailableLanguage => "any-available",
            Rung::AlternateBackendFetch => "alternate-backend",
        };
        write!(f, "{name}")
    }
}

pub struct TranscriptFetcher {
    direct: Arc<dyn DirectSource>,
    official: Arc<dyn CaptionSource>,
    alternate: Arc<dyn CaptionSource>,
    metadata: Arc<dyn MetadataApi>,
    invoker: QuotaAwareInvoker,
}

impl TranscriptFetcher {
    pub fn new(
        direct: Arc<dyn DirectSource>,
        official: Arc<dyn CaptionSource>,
        alternate: Arc<dyn CaptionSource>,
        metadata: Arc<dyn MetadataApi>,
        invoker: QuotaAwareInvoker,
    ) -> Self {
        Self {
            direct,
            official,
            alternate,
            metadata,
            invoker,
        }
    }

    /// Best available segments for a video. Never empty.
    pub async fn fetch(&self, video_id: &str, lang: &str) -> Vec<Segment> {
        self.fetch_transcript(video_id, lang).await.segments
    }

    /// Like [`fetch`](Self::fetch), also reporting which rung answered.
    pub async fn fetch_transcript(&self, video_id: &str, lang: &str) -> Transcript {
        let mut listing = None;
        for rung in LADDER {
            let (language, outcome) = self.run_rung(rung, video_id, lang, &mut listing).await;
            match outcome {
                FetchAttemptOutcome::Success(segments) => {
                    info!("Transcript for {video_id} from {rung} ({language}, {} segments)", segments.len());
                    return Transcript {
                        video_id: video_id.to_string(),
                        language,
                        source: rung.source(),
                        segments,
                    };
                }
                FetchAttemptOutcome::NotFound => debug!("{rung}: no captions for {video_id}"),
                FetchAttemptOutcome::Disabled => debug!("{rung}: captions disabled for {video_id}"),
                FetchAttemptOutcome::QuotaExceeded => warn!("{rung}: rate limited fetching {video_id}"),
                FetchAttemptOutcome::TransientError(reason) if rung == Rung::PrimaryDirectFetch => {
                    debug!("{rung}: {reason}")
                }
                FetchAttemptOutcome::TransientError(reason) => warn!("{rung}: {reason}"),
            }
        }

        info!("No captions found for {video_id}, synthesizing from metadata");
        Transcript {
            video_id: video_id.to_string(),
            language: lang.to_string(),
            source: TranscriptSource::Metadata,
            segments: self.synthesize(video_id).await,
        }
    }

    /// Run a single rung in isolation.
    pub async fn attempt(&self, rung: Rung, video_id: &str, lang: &str) -> FetchAttemptOutcome {
        self.run_rung(rung, video_id, lang, &mut None).await.1
    }

    /// `listing` holds the official source's track list once it has been
    /// requested, so the official rungs share a single listing (or its error).
    async fn run_rung(
        &self,
        rung: Rung,
        video_id: &str,
        lang: &str,
        listing: &mut Option<TrackListing>,
    ) -> (String, FetchAttemptOutcome) {
        match rung {
            Rung::PrimaryDirectFetch => (lang.to_string(), self.direct.fetch_direct(video_id, lang).await.into()),
            Rung::OfficialExactLanguage
            | Rung::OfficialAutoGeneratedLanguage
            | Rung::EnglishFallback
            | Rung::AnyAvailableLanguage => {
                let tracks = match self.official_tracks(video_id, listing).await {
                    Ok(tracks) => tracks,
                    Err(e) => return (String::new(), Err::<RawTranscript, _>(e.clone()).into()),
                };
                if rung == Rung::AnyAvailableLanguage {
                    fetch_picked(self.official.as_ref(), video_id, tracks, None).await
                } else {
                    self.try_codes(video_id, tracks, &rung.codes(lang)).await
                }
            }
            Rung::AlternateBackendFetch => match self.alternate.list_tracks(video_id).await {
                Ok(tracks) => fetch_picked(self.alternate.as_ref(), video_id, &tracks, Some(lang)).await,
                Err(e) => (String::new(), Err::<RawTranscript, _>(e).into()),
            },
        }
    }

    async fn official_tracks<'a>(&self, video_id: &str, listing: &'a mut Option<TrackListing>) -> &'a TrackListing {
        let result = match listing.take() {
            Some(result) => result,
            None => {
                let result = self.official.list_tracks(video_id).await;
                if let Err(e) = &result {
                    debug!("{} could not list tracks for {video_id}: {e}", self.official.name());
                }
                result
            }
        };
        listing.insert(result)
    }

    async fn try_codes(&self, video_id: &str, tracks: &[CaptionTrack], codes: &[String]) -> (String, FetchAttemptOutcome) {
        let mut last = (String::new(), FetchAttemptOutcome::NotFound);
        for code in codes {
            let Some(track) = select_track(tracks, code) else {
                debug!("{} has no '{code}' track for {video_id}", self.official.name());
                continue;
            };
            let outcome: FetchAttemptOutcome = self.official.fetch_track(video_id, track).await.into();
            if matches!(outcome, FetchAttemptOutcome::Success(_)) {
                return (code.clone(), outcome);
            }
            debug!("{} returned no usable '{code}' track for {video_id}", self.official.name());
            last = (code.clone(), outcome);
        }
        last
    }

    async fn synthesize(&self, video_id: &str) -> Vec<Segment> {
        let metadata = self
            .invoker
            .invoke_or_else(
                |key| {
                    let api = Arc::clone(&self.metadata);
                    let video_id = video_id.to_string();
                    async move { api.video_metadata(&key, &video_id).await }
                },
                VideoMetadata::default,
            )
            .await
            .unwrap_or_else(|e| {
                warn!("Could not load metadata for {video_id}: {e}");
                VideoMetadata::default()
            });

        normalize::synthesize(&metadata.title, &metadata.description)
    }
}

type TrackListing = Result<Vec<CaptionTrack>, CaptionError>;

/// Fetch the preferred language from an already-listed set of tracks, or the
/// best remaining track when there is no preference or no match.
async fn fetch_picked(
    source: &dyn CaptionSource,
    video_id: &str,
    tracks: &[CaptionTrack],
    preferred: Option<&str>,
) -> (String, FetchAttemptOutcome) {
    let Some(track) = pick_track(tracks, preferred) else {
        return (String::new(), FetchAttemptOutcome::NotFound);
    };
    debug!(
        "{} picked track {} ({:?}) for {video_id}",
        source.name(),
        track.language_code,
        track.kind
    );
    (
        track.language_code.clone(),
        source.fetch_track(video_id, track).await.into(),
    )
}
