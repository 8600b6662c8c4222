use crate::Transcript;

/// Render transcript as plain text (one segment per line, no timestamps)
pub fn render_text(transcript: &Transcript) -> String {
    transcript
        .segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the full transcript, including source and language, as pretty JSON
pub fn render_json(transcript: &Transcript) -> String {
    serde_json::to_string_pretty(transcript).unwrap_or_else(|_| "{}".to_string())
}

/// Render transcript as SRT subtitles
pub fn render_srt(transcript: &Transcript) -> String {
    transcript
        .segments
        .iter()
        .enumerate()
        .map(|(i, s)| {
            format!(
                "{}\n{} --> {}\n{}\n",
                i + 1,
                srt_timestamp(s.start),
                srt_timestamp(s.start + s.duration),
                s.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn srt_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let s = (total_ms / 1000) % 60;
    let m = (total_ms / 60_000) % 60;
    let h = total_ms / 3_600_000;
    format!("{h:02}:{m:02}:{s:02},{ms:03}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::parse_subtitles;
    use crate::{Segment, TranscriptSource};

    fn sample_transcript() -> Transcript {
        Transcript {
            video_id: "test1234567".to_string(),
            language: "en".to_string(),
            source: TranscriptSource::Official,
            segments: vec![Segment::new("Hello world", 0.0, 1.5), Segment::new("This is a test", 1.5, 2.0)],
        }
    }

    #[test]
    fn test_render_text() {
        let t = sample_transcript();
        assert_eq!(render_text(&t), "Hello world\nThis is a test");
    }

    #[test]
    fn test_render_text_empty() {
        let t = Transcript {
            segments: vec![],
            ..sample_transcript()
        };
        assert_eq!(render_text(&t), "");
    }

    #[test]
    fn test_render_json() {
        let json: serde_json::Value = serde_json::from_str(&render_json(&sample_transcript())).unwrap();
        assert_eq!(json["video_id"], "test1234567");
        assert_eq!(json["source"], "official");
        assert_eq!(json["segments"][1]["text"], "This is a test");
        assert_eq!(json["segments"][1]["start"], 1.5);
    }

    #[test]
    fn test_render_srt() {
        let srt = render_srt(&sample_transcript());
        assert_eq!(
            srt,
            "1\n00:00:00,000 --> 00:00:01,500\nHello world\n\n2\n00:00:01,500 --> 00:00:03,500\nThis is a test\n"
        );
    }

    #[test]
    fn test_srt_timestamp_hours() {
        assert_eq!(srt_timestamp(3723.25), "01:02:03,250");
        assert_eq!(srt_timestamp(-1.0), "00:00:00,000");
    }

    #[test]
    fn test_render_srt_reparses() {
        let t = sample_transcript();
        assert_eq!(parse_subtitles(&render_srt(&t)), t.segments);
    }
}
