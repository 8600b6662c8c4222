//! Conversion of raw caption payloads into ordered [`Segment`] lists.

use std::sync::LazyLock;

use log::debug;
use regex::Regex;

use crate::Segment;

/// Spacing and duration given to segments that carry no timing of their own
pub const SYNTHETIC_SPACING_SECS: f64 = 5.0;

/// Emitted when neither captions nor metadata produced any text
pub const NO_TRANSCRIPT_TEXT: &str = "No transcript could be obtained for this video.";

static BLANK_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n[ \t]*\n").expect("valid regex"));
static MARKUP_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

/// The shapes a caption source can hand back
#[derive(Debug, Clone, PartialEq)]
pub enum RawTranscript {
    /// Entries that already carry start and duration in seconds
    Timed(Vec<Segment>),
    /// SubRip or WebVTT document
    Subtitles(String),
    /// Untimed text, paragraphs separated by blank lines
    Paragraphs(String),
}

pub fn normalize(raw: RawTranscript) -> Vec<Segment> {
    match raw {
        RawTranscript::Timed(entries) => entries
            .into_iter()
            .filter_map(|seg| {
                let text = clean_text(&seg.text);
                (!text.is_empty()).then(|| Segment {
                    text,
                    start: seg.start.max(0.0),
                    duration: seg.duration.max(0.0),
                })
            })
            .collect(),
        RawTranscript::Subtitles(doc) => parse_subtitles(&doc),
        RawTranscript::Paragraphs(text) => spaced(paragraphs(&text)),
    }
}

/// Join segment texts with single spaces.
pub fn concatenate(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build a transcript from a video's title and description.
///
/// The title sits at t=0 and each description paragraph follows at
/// [`SYNTHETIC_SPACING_SECS`] intervals. Never returns an empty list.
pub fn synthesize(title: &str, description: &str) -> Vec<Segment> {
    let mut texts = Vec::new();
    let title = clean_text(title);
    if !title.is_empty() {
        texts.push(title);
    }
    texts.extend(paragraphs(description));

    if texts.is_empty() {
        return vec![Segment::new(NO_TRANSCRIPT_TEXT, 0.0, SYNTHETIC_SPACING_SECS)];
    }
    spaced(texts)
}

fn spaced(texts: Vec<String>) -> Vec<Segment> {
    texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| Segment {
            text,
            start: i as f64 * SYNTHETIC_SPACING_SECS,
            duration: SYNTHETIC_SPACING_SECS,
        })
        .collect()
}

fn paragraphs(text: &str) -> Vec<String> {
    let text = text.replace("\r\n", "\n");
    BLANK_LINE
        .split(&text)
        .map(clean_text)
        .filter(|p| !p.is_empty())
        .collect()
}

fn clean_text(raw: &str) -> String {
    let decoded = html_escape::decode_html_entities(raw);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a SubRip or WebVTT document.
///
/// Blocks that fail to parse are logged and skipped.
pub fn parse_subtitles(doc: &str) -> Vec<Segment> {
    let doc = doc.replace("\r\n", "\n");
    let mut segments = Vec::new();

    for (idx, block) in BLANK_LINE.split(&doc).enumerate() {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }
        match parse_block(block) {
            Ok(Some(seg)) => segments.push(seg),
            Ok(None) => {}
            Err(reason) => debug!("Skipping subtitle block {idx}: {reason}"),
        }
    }

    segments
}

fn parse_block(block: &str) -> Result<Option<Segment>, String> {
    let mut lines = block.lines();
    let timing = lines
        .by_ref()
        .find(|l| l.contains("-->"))
        .ok_or_else(|| "no timing line".to_string())?;

    let (from, to) = timing
        .split_once("-->")
        .ok_or_else(|| format!("malformed timing line '{timing}'"))?;
    let start = parse_timestamp(from.trim())?;
    // WebVTT cue settings may follow the end timestamp
    let end_token = to.split_whitespace().next().unwrap_or_default();
    let end = parse_timestamp(end_token)?;
    if end < start {
        return Err(format!("end {end} precedes start {start}"));
    }

    let body = lines.collect::<Vec<_>>().join(" ");
    let text = clean_text(&MARKUP_TAG.replace_all(&body, ""));
    if text.is_empty() {
        return Ok(None);
    }

    Ok(Some(Segment {
        text,
        start,
        duration: end - start,
    }))
}

/// Parse `HH:MM:SS,mmm`, `HH:MM:SS.mmm` or `MM:SS.mmm` into seconds.
fn parse_timestamp(ts: &str) -> Result<f64, String> {
    let normalized = ts.replace(',', ".");
    let parts: Vec<&str> = normalized.split(':').collect();
    let (h, m, s) = match parts.as_slice() {
        [h, m, s] => (*h, *m, *s),
        [m, s] => ("0", *m, *s),
        _ => return Err(format!("bad timestamp '{ts}'")),
    };
    let hours: u32 = h.parse().map_err(|_| format!("bad hours in '{ts}'"))?;
    let minutes: u32 = m.parse().map_err(|_| format!("bad minutes in '{ts}'"))?;
    let seconds: f64 = s.parse().map_err(|_| format!("bad seconds in '{ts}'"))?;
    if minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return Err(format!("out of range timestamp '{ts}'"));
    }
    Ok(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds)
}
