pub mod cache;
pub mod captions;
pub mod config;
pub mod credentials;
pub mod data_api;
pub mod error;
pub mod fetcher;
pub mod normalize;
pub mod output;
pub mod quota;
pub mod resolver;
pub mod service;
pub mod summarize;
pub mod youtube;
pub mod ytdlp;

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub use error::{ApiError, CaptionError, TranscriptError};
pub use service::TranscriptService;

/// A single captioned segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    pub start: f64,
    pub duration: f64,
}

impl Segment {
    pub fn new(text: impl Into<String>, start: f64, duration: f64) -> Self {
        Self {
            text: text.into(),
            start,
            duration,
        }
    }
}

/// Which step of the fetch ladder produced a transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptSource {
    /// InnerTube player captions
    Direct,
    /// Caption tracks listed on the watch page
    Official,
    /// Tracks discovered by yt-dlp
    Alternate,
    /// Synthesized from title and description
    Metadata,
}

/// Complete transcript for a video
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub video_id: String,
    pub language: String,
    pub source: TranscriptSource,
    pub segments: Vec<Segment>,
}

impl std::fmt::Display for TranscriptSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptSource::Direct => write!(f, "direct"),
            TranscriptSource::Official => write!(f, "official"),
            TranscriptSource::Alternate => write!(f, "alternate"),
            TranscriptSource::Metadata => write!(f, "metadata"),
        }
    }
}

static BARE_VIDEO_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]{11}$").expect("valid regex"));

static VIDEO_URL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"youtube\.com/watch\?(?:.*&)?v=([a-zA-Z0-9_-]{11})",
        r"youtu\.be/([a-zA-Z0-9_-]{11})",
        r"youtube\.com/embed/([a-zA-Z0-9_-]{11})",
        r"youtube\.com/shorts/([a-zA-Z0-9_-]{11})",
        r"youtube\.com/live/([a-zA-Z0-9_-]{11})",
        r"youtube\.com/v/([a-zA-Z0-9_-]{11})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Extract video ID from various YouTube URL formats
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();

    if BARE_VIDEO_ID.is_match(input) {
        return Some(input.to_string());
    }

    VIDEO_URL_PATTERNS
        .iter()
        .find_map(|re| re.captures(input))
        .map(|caps| caps[1].to_string())
}
