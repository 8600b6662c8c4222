use std::collections::BTreeMap;
use std::process::Stdio;

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use tokio::process::Command;

use crate::Segment;
use crate::captions::{CaptionSource, CaptionTrack, TrackFormat, TrackKind};
use crate::error::CaptionError;
use crate::normalize::RawTranscript;
use crate::youtube::{USER_AGENT, parse_caption_xml};

/// Subset of `yt-dlp --dump-single-json` output
#[derive(Debug, Default, Deserialize)]
struct YtDlpInfo {
    #[serde(default)]
    subtitles: BTreeMap<String, Vec<SubtitleFormat>>,
    #[serde(default)]
    automatic_captions: BTreeMap<String, Vec<SubtitleFormat>>,
}

#[derive(Debug, Deserialize)]
struct SubtitleFormat {
    ext: String,
    url: String,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Json3Doc {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
struct Json3Event {
    #[serde(rename = "tStartMs", default)]
    start_ms: u64,
    #[serde(rename = "dDurationMs", default)]
    duration_ms: u64,
    segs: Option<Vec<Json3Seg>>,
}

#[derive(Debug, Deserialize)]
struct Json3Seg {
    #[serde(default)]
    utf8: String,
}

/// Caption discovery through the `yt-dlp` extractor.
#[derive(Debug, Clone)]
pub struct YtDlpSource {
    client: reqwest::Client,
    binary: String,
}

impl YtDlpSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            binary: "yt-dlp".to_string(),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    async fn dump_info(&self, video_id: &str) -> Result<YtDlpInfo, CaptionError> {
        let url = format!("https://www.youtube.com/watch?v={video_id}");
        debug!("Discovering caption tracks via {}: {url}", self.binary);

        let output = Command::new(&self.binary)
            .args(["--dump-single-json", "--skip-download", "--no-playlist", "--no-warnings", url.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => CaptionError::Transient(format!(
                    "{} not found. Install it to enable the alternate caption backend:\n  \
                     pip install yt-dlp\n  \
                     or: brew install yt-dlp",
                    self.binary
                )),
                _ => CaptionError::Transient(format!("failed to run {}: {e}", self.binary)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("Video unavailable") || stderr.contains("Private video") {
                return Err(CaptionError::NotFound);
            }
            if stderr.contains("HTTP Error 429") {
                return Err(CaptionError::QuotaExceeded);
            }
            return Err(CaptionError::Transient(format!(
                "{} exited with status {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            )));
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

#[async_trait]
impl CaptionSource for YtDlpSource {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn list_tracks(&self, video_id: &str) -> Result<Vec<CaptionTrack>, CaptionError> {
        let info = self.dump_info(video_id).await?;
        let tracks = tracks_from_info(info);
        debug!("yt-dlp discovered {} caption tracks for {video_id}", tracks.len());
        Ok(tracks)
    }

    async fn fetch_track(&self, _video_id: &str, track: &CaptionTrack) -> Result<RawTranscript, CaptionError> {
        let body = self
            .client
            .get(&track.url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        match track.format {
            TrackFormat::Json3 => Ok(RawTranscript::Timed(parse_json3(&body)?)),
            TrackFormat::Xml => Ok(RawTranscript::Timed(parse_caption_xml(&body)?)),
            TrackFormat::Vtt | TrackFormat::Srt => Ok(RawTranscript::Subtitles(body)),
        }
    }
}

/// Manual tracks, then the original auto-captions, then machine translations.
///
/// yt-dlp lists a translated variant of the auto-captions for every language
/// it can translate into; those URLs carry a `tlang` parameter. The original
/// track may also appear under an `-orig` key.
fn tracks_from_info(info: YtDlpInfo) -> Vec<CaptionTrack> {
    let manual = info
        .subtitles
        .into_iter()
        .filter(|(lang, _)| lang != "live_chat")
        .filter_map(|(lang, formats)| best_format(lang, formats, TrackKind::Manual));
    let automatic = info.automatic_captions.into_iter().filter_map(|(key, formats)| {
        let original = key.strip_suffix("-orig").map(str::to_string);
        let (lang, kind) = match original {
            Some(lang) => (lang, TrackKind::Asr),
            None if formats.iter().any(|f| f.url.contains("tlang=")) => (key, TrackKind::Translated),
            None => (key, TrackKind::Asr),
        };
        best_format(lang, formats, kind)
    });

    let mut tracks: Vec<CaptionTrack> = manual.chain(automatic).collect();
    tracks.sort_by_key(|t| t.kind.rank());
    tracks
}

/// Choose the most structured format yt-dlp offers for a language.
fn best_format(lang: String, formats: Vec<SubtitleFormat>, kind: TrackKind) -> Option<CaptionTrack> {
    const PREFERENCE: [(&str, TrackFormat); 5] = [
        ("json3", TrackFormat::Json3),
        ("srv3", TrackFormat::Xml),
        ("srv1", TrackFormat::Xml),
        ("vtt", TrackFormat::Vtt),
        ("srt", TrackFormat::Srt),
    ];

    PREFERENCE.iter().find_map(|(ext, format)| {
        formats.iter().find(|f| f.ext == *ext).map(|f| CaptionTrack {
            language_code: lang.clone(),
            name: f.name.clone().unwrap_or_else(|| lang.clone()),
            kind,
            url: f.url.clone(),
            format: *format,
        })
    })
}

fn parse_json3(body: &str) -> Result<Vec<Segment>, CaptionError> {
    let doc: Json3Doc = serde_json::from_str(body)?;
    Ok(doc
        .events
        .into_iter()
        .filter_map(|ev| {
            let text: String = ev.segs?.into_iter().map(|s| s.utf8).collect();
            Some(Segment {
                text,
                start: ev.start_ms as f64 / 1000.0,
                duration: ev.duration_ms as f64 / 1000.0,
            })
        })
        .collect())
}
