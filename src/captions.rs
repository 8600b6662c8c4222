//! Caption track types and the collaborator traits the fetch ladder talks to.

use async_trait::async_trait;

use crate::error::CaptionError;
use crate::normalize::RawTranscript;

/// Whether a track was written by a person or produced by speech recognition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Manual,
    Asr,
    /// Machine translation of another track
    Translated,
}

impl TrackKind {
    /// Lower is better when several tracks share a language.
    pub(crate) fn rank(self) -> u8 {
        match self {
            TrackKind::Manual => 0,
            TrackKind::Asr => 1,
            TrackKind::Translated => 2,
        }
    }
}

/// Payload format served at a track's URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackFormat {
    /// YouTube timedtext XML (`<text start dur>`)
    Xml,
    /// YouTube JSON timed text (`events[].segs[]`)
    Json3,
    Vtt,
    Srt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptionTrack {
    pub language_code: String,
    pub name: String,
    pub kind: TrackKind,
    pub url: String,
    pub format: TrackFormat,
}

/// A backend that can enumerate and download caption tracks.
#[async_trait]
pub trait CaptionSource: Send + Sync {
    /// Name of the source (for logging)
    fn name(&self) -> &'static str;

    /// All tracks the video exposes, manual tracks first.
    ///
    /// # Errors
    /// - `CaptionError::Disabled` - the video has captions turned off
    /// - `CaptionError::NotFound` - the video does not exist
    async fn list_tracks(&self, video_id: &str) -> Result<Vec<CaptionTrack>, CaptionError>;

    /// Download one track.
    async fn fetch_track(&self, video_id: &str, track: &CaptionTrack) -> Result<RawTranscript, CaptionError>;
}

/// A best-effort single-shot caption fetch that bypasses track listing.
#[async_trait]
pub trait DirectSource: Send + Sync {
    async fn fetch_direct(&self, video_id: &str, lang: &str) -> Result<RawTranscript, CaptionError>;
}

/// Pick the track for a language code.
///
/// `xx` prefers a manual track, then an auto-generated one, then a machine
/// translation. The auto-generated variant is requested either as
/// `xx-generated` or `asr-xx`; YouTube has used both tags over time.
pub fn select_track<'a>(tracks: &'a [CaptionTrack], code: &str) -> Option<&'a CaptionTrack> {
    let asr_lang = code
        .strip_suffix("-generated")
        .or_else(|| code.strip_prefix("asr-"));

    if let Some(lang) = asr_lang {
        return tracks
            .iter()
            .find(|t| t.kind == TrackKind::Asr && same_language(&t.language_code, lang));
    }

    tracks
        .iter()
        .filter(|t| same_language(&t.language_code, code))
        .min_by_key(|t| t.kind.rank())
}

/// The track for `preferred` if there is one, otherwise the best-ranked track.
pub fn pick_track<'a>(tracks: &'a [CaptionTrack], preferred: Option<&str>) -> Option<&'a CaptionTrack> {
    preferred
        .and_then(|lang| select_track(tracks, lang))
        .or_else(|| tracks.iter().min_by_key(|t| t.kind.rank()))
}

fn same_language(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}
