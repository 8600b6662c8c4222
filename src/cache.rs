use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};
use log::debug;

use crate::{Transcript, TranscriptSource};

pub fn cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("ytsum")
        .join("transcripts")
}

fn cache_path(dir: &Path, video_id: &str, lang: &str) -> PathBuf {
    dir.join(format!("{video_id}-{lang}.json"))
}

/// Load a cached transcript, if available.
pub fn load(video_id: &str, lang: &str) -> Option<Transcript> {
    load_from(&cache_dir(), video_id, lang)
}

/// Save a transcript to the cache. Metadata-synthesized transcripts are skipped.
pub fn save(transcript: &Transcript, lang: &str) -> Result<()> {
    save_to(&cache_dir(), transcript, lang)
}

fn load_from(dir: &Path, video_id: &str, lang: &str) -> Option<Transcript> {
    let path = cache_path(dir, video_id, lang);
    let data = std::fs::read_to_string(&path).ok()?;
    let transcript: Transcript = serde_json::from_str(&data).ok()?;
    debug!("Cache hit: {}", path.display());
    Some(transcript)
}

fn save_to(dir: &Path, transcript: &Transcript, lang: &str) -> Result<()> {
    if transcript.source == TranscriptSource::Metadata {
        debug!("Not caching metadata transcript for {}", transcript.video_id);
        return Ok(());
    }
    std::fs::create_dir_all(dir).wrap_err_with(|| format!("creating {}", dir.display()))?;
    let path = cache_path(dir, &transcript.video_id, lang);
    let data = serde_json::to_string_pretty(transcript)?;
    std::fs::write(&path, data)?;
    debug!("Cached transcript: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Segment;

    fn transcript(source: TranscriptSource) -> Transcript {
        Transcript {
            video_id: "dQw4w9WgXcQ".to_string(),
            language: "en".to_string(),
            source,
            segments: vec![Segment::new("Hello world", 1.0, 2.5)],
        }
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let t = transcript(TranscriptSource::Official);
        save_to(dir.path(), &t, "en").unwrap();

        let loaded = load_from(dir.path(), "dQw4w9WgXcQ", "en").unwrap();
        assert_eq!(loaded.source, TranscriptSource::Official);
        assert_eq!(loaded.segments, t.segments);
        assert!(dir.path().join("dQw4w9WgXcQ-en.json").exists());
    }

    #[test]
    fn test_keyed_by_requested_language() {
        let dir = tempfile::tempdir().unwrap();
        save_to(dir.path(), &transcript(TranscriptSource::Direct), "ko").unwrap();
        assert!(load_from(dir.path(), "dQw4w9WgXcQ", "ko").is_some());
        assert!(load_from(dir.path(), "dQw4w9WgXcQ", "en").is_none());
    }

    #[test]
    fn test_metadata_transcripts_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        save_to(dir.path(), &transcript(TranscriptSource::Metadata), "en").unwrap();
        assert!(load_from(dir.path(), "dQw4w9WgXcQ", "en").is_none());
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("dQw4w9WgXcQ-en.json"), "{not json").unwrap();
        assert!(load_from(dir.path(), "dQw4w9WgXcQ", "en").is_none());
    }
}
