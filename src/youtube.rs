use std::sync::LazyLock;

use async_trait::async_trait;
use log::debug;
use regex::Regex;
use serde::Deserialize;

use crate::Segment;
use crate::captions::{CaptionSource, CaptionTrack, DirectSource, TrackFormat, TrackKind};
use crate::error::CaptionError;
use crate::normalize::RawTranscript;

pub(crate) const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

const INNERTUBE_CLIENT_VERSION: &str = "2.20241126.01.00";

static API_KEY_PATTERNS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r#""INNERTUBE_API_KEY"\s*:\s*"([^"]+)""#).expect("valid regex"),
        Regex::new(r#"innertubeApiKey\s*[=:]\s*"([^"]+)""#).expect("valid regex"),
    ]
});

#[derive(Debug, Deserialize)]
struct InnerTubePlayerResponse {
    captions: Option<CaptionsData>,
    #[serde(rename = "playabilityStatus")]
    playability_status: Option<PlayabilityStatus>,
}

#[derive(Debug, Deserialize)]
struct PlayabilityStatus {
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CaptionsData {
    #[serde(rename = "playerCaptionsTracklistRenderer")]
    player_captions_tracklist_renderer: Option<CaptionTracklistRenderer>,
}

#[derive(Debug, Deserialize)]
struct CaptionTracklistRenderer {
    #[serde(rename = "captionTracks")]
    caption_tracks: Option<Vec<RawCaptionTrack>>,
}

#[derive(Debug, Deserialize)]
struct RawCaptionTrack {
    #[serde(rename = "baseUrl")]
    base_url: String,
    #[serde(rename = "languageCode")]
    language_code: String,
    kind: Option<String>,
    name: Option<TrackName>,
}

#[derive(Debug, Deserialize)]
struct TrackName {
    #[serde(rename = "simpleText")]
    simple_text: Option<String>,
    runs: Option<Vec<TextRun>>,
}

#[derive(Debug, Deserialize)]
struct TextRun {
    text: String,
}

impl CaptionsData {
    fn into_tracks(self) -> Vec<CaptionTrack> {
        let mut tracks: Vec<CaptionTrack> = self
            .player_captions_tracklist_renderer
            .and_then(|r| r.caption_tracks)
            .unwrap_or_default()
            .into_iter()
            .map(RawCaptionTrack::into_track)
            .collect();
        // stable: manual tracks first, original order otherwise
        tracks.sort_by_key(|t| t.kind.rank());
        tracks
    }
}

impl RawCaptionTrack {
    fn into_track(self) -> CaptionTrack {
        let name = self
            .name
            .and_then(|n| {
                n.simple_text
                    .or_else(|| n.runs.map(|r| r.into_iter().map(|t| t.text).collect::<String>()))
            })
            .unwrap_or_else(|| self.language_code.clone());
        CaptionTrack {
            kind: if self.kind.as_deref() == Some("asr") {
                TrackKind::Asr
            } else {
                TrackKind::Manual
            },
            language_code: self.language_code,
            name,
            url: self.base_url.replace("\\u0026", "&"),
            format: TrackFormat::Xml,
        }
    }
}

/// Rung-one fetcher built on the InnerTube player endpoint.
///
/// This is the same private API the YouTube web client uses; it changes
/// without notice, so every failure is treated as a soft miss.
#[derive(Debug, Clone)]
pub struct InnerTubeSource {
    client: reqwest::Client,
}

impl InnerTubeSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DirectSource for InnerTubeSource {
    async fn fetch_direct(&self, video_id: &str, lang: &str) -> Result<RawTranscript, CaptionError> {
        // Step 1: Fetch the watch page to get the InnerTube API key
        let page_html = fetch_watch_page(&self.client, video_id).await?;
        let api_key = extract_api_key(&page_html)?;
        debug!("Extracted InnerTube API key for {video_id}");

        // Step 2: Call InnerTube player endpoint
        let player_url = format!("https://www.youtube.com/youtubei/v1/player?key={api_key}&prettyPrint=false");

        let body = serde_json::json!({
            "context": {
                "client": {
                    "hl": lang,
                    "gl": "US",
                    "clientName": "WEB",
                    "clientVersion": INNERTUBE_CLIENT_VERSION
                }
            },
            "videoId": video_id
        });

        let resp: InnerTubePlayerResponse = self
            .client
            .post(&player_url)
            .header("User-Agent", USER_AGENT)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if resp.playability_status.and_then(|p| p.status).as_deref() == Some("ERROR") {
            return Err(CaptionError::NotFound);
        }

        let tracks = resp.captions.map(CaptionsData::into_tracks).unwrap_or_default();
        if tracks.is_empty() {
            return Err(CaptionError::Disabled);
        }

        // Find the requested language track, or fall back to the first available
        let track = tracks
            .iter()
            .find(|t| t.language_code.eq_ignore_ascii_case(lang))
            .unwrap_or(&tracks[0]);
        debug!("InnerTube using caption track: lang={}", track.language_code);

        fetch_timedtext(&self.client, &track.url).await
    }
}

/// Caption tracks listed in the public watch page.
#[derive(Debug, Clone)]
pub struct WatchPageSource {
    client: reqwest::Client,
}

impl WatchPageSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CaptionSource for WatchPageSource {
    fn name(&self) -> &'static str {
        "watch-page"
    }

    async fn list_tracks(&self, video_id: &str) -> Result<Vec<CaptionTrack>, CaptionError> {
        let html = fetch_watch_page(&self.client, video_id).await?;
        let tracks = extract_captions(&html)?.into_tracks();
        debug!("Watch page lists {} caption tracks for {video_id}", tracks.len());
        Ok(tracks)
    }

    async fn fetch_track(&self, _video_id: &str, track: &CaptionTrack) -> Result<RawTranscript, CaptionError> {
        fetch_timedtext(&self.client, &track.url).await
    }
}

async fn fetch_watch_page(client: &reqwest::Client, video_id: &str) -> Result<String, CaptionError> {
    let watch_url = format!("https://www.youtube.com/watch?v={video_id}&hl=en");
    debug!("Fetching watch page: {watch_url}");

    Ok(client
        .get(&watch_url)
        .header("User-Agent", USER_AGENT)
        .header("Accept-Language", "en-US")
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?)
}

async fn fetch_timedtext(client: &reqwest::Client, url: &str) -> Result<RawTranscript, CaptionError> {
    let caption_xml = client
        .get(url)
        .header("User-Agent", USER_AGENT)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    if caption_xml.trim().is_empty() {
        return Err(CaptionError::Transient("empty caption document".to_string()));
    }
    Ok(RawTranscript::Timed(parse_caption_xml(&caption_xml)?))
}

fn extract_api_key(html: &str) -> Result<String, CaptionError> {
    API_KEY_PATTERNS
        .iter()
        .find_map(|re| re.captures(html))
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| CaptionError::Transient("could not extract InnerTube API key from watch page".to_string()))
}

/// Pull the `"captions"` object out of the watch page's inline player JSON.
fn extract_captions(html: &str) -> Result<CaptionsData, CaptionError> {
    let Some((_, rest)) = html.split_once("\"captions\":") else {
        if html.contains("class=\"g-recaptcha\"") {
            return Err(CaptionError::QuotaExceeded);
        }
        if !html.contains("\"playabilityStatus\":") {
            return Err(CaptionError::NotFound);
        }
        return Err(CaptionError::Disabled);
    };

    let json = rest
        .split_once(",\"videoDetails")
        .map(|(json, _)| json)
        .ok_or_else(|| CaptionError::Transient("unterminated captions object".to_string()))?;

    Ok(serde_json::from_str(json)?)
}

/// Parse timedtext XML in either the `<text start dur>` (seconds) or the
/// `<p t d>` (milliseconds) flavour.
pub(crate) fn parse_caption_xml(xml: &str) -> Result<Vec<Segment>, CaptionError> {
    use quick_xml::Reader;
    use quick_xml::events::{BytesStart, Event};

    fn timing(e: &BytesStart, start_key: &[u8], dur_key: &[u8], scale: f64) -> Option<(f64, f64)> {
        let mut start = None;
        let mut dur = None;
        for attr in e.attributes().flatten() {
            let value = String::from_utf8_lossy(&attr.value).parse::<f64>().ok();
            match attr.key.as_ref() {
                k if k == start_key => start = value,
                k if k == dur_key => dur = value,
                _ => {}
            }
        }
        Some((start? / scale, dur.unwrap_or(0.0) / scale))
    }

    let mut reader = Reader::from_str(xml);
    let mut segments = Vec::new();
    let mut current: Option<(f64, f64)> = None;
    let mut buf = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"text" => {
                current = timing(e, b"start", b"dur", 1.0);
                buf.clear();
            }
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"p" => {
                current = timing(e, b"t", b"d", 1000.0);
                buf.clear();
            }
            Ok(Event::Text(ref e)) if current.is_some() => {
                let raw_text = e.unescape().unwrap_or_default();
                buf.push_str(&raw_text);
            }
            Ok(Event::End(ref e)) if matches!(e.name().as_ref(), b"text" | b"p") => {
                if let Some((start, duration)) = current.take() {
                    let text = html_escape::decode_html_entities(&buf).trim().to_string();
                    if !text.is_empty() {
                        segments.push(Segment { text, start, duration });
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(CaptionError::Transient(format!("error parsing caption XML: {e}"))),
            _ => {}
        }
    }

    Ok(segments)
}
