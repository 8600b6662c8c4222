use eyre::{Result, bail};
use log::debug;

use crate::Transcript;
use crate::normalize::{self, NO_TRANSCRIPT_TEXT};

const STYLE_PROMPTS: &[(&str, &str)] = &[
    ("simple", "Provide a concise summary focusing on the main points."),
    (
        "detailed",
        "Provide a comprehensive summary including key details and supporting information.",
    ),
    ("expert", "Provide a technical summary suitable for experts in the field."),
    ("beginner", "Provide a simple explanation suitable for beginners."),
    ("academic", "Provide a formal academic summary with citations."),
    (
        "creative",
        "Provide a creative and engaging summary that captures the essence.",
    ),
];

const LANGUAGE_PROMPTS: &[(&str, &str)] = &[
    ("en", "Summarize in English."),
    ("ko", "Summarize in Korean."),
    ("ja", "Summarize in Japanese."),
    ("zh", "Summarize in Chinese."),
];

const FORMAT_PROMPTS: &[(&str, &str)] = &[
    ("text", "Return the summary as plain text."),
    ("bullet", "Return the summary as bullet points."),
    (
        "structured",
        "Return the summary with sections: Main Points, Details, Conclusion.",
    ),
    ("qa", "Return the summary as Q&A format."),
];

pub const DEFAULT_MAX_LENGTH: u32 = 200;

/// How the summary should read. Unknown keys fall back to the first table entry.
#[derive(Debug, Clone)]
pub struct SummaryParams {
    pub style: String,
    pub language: String,
    pub format: String,
    pub max_length: u32,
}

impl Default for SummaryParams {
    fn default() -> Self {
        Self {
            style: "simple".to_string(),
            language: "en".to_string(),
            format: "text".to_string(),
            max_length: DEFAULT_MAX_LENGTH,
        }
    }
}

fn lookup(table: &[(&str, &'static str)], key: &str) -> &'static str {
    table
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .or_else(|| table.first())
        .map(|(_, prompt)| *prompt)
        .unwrap_or_default()
}

impl SummaryParams {
    pub fn system_prompt(&self) -> String {
        format!(
            "You are a helpful assistant that summarizes video transcripts. {} {} {}",
            lookup(STYLE_PROMPTS, &self.style),
            lookup(LANGUAGE_PROMPTS, &self.language),
            lookup(FORMAT_PROMPTS, &self.format),
        )
    }

    fn user_message(&self, transcript_text: &str) -> String {
        format!(
            "Summarize the following video transcript, keeping it under {} characters:\n\n{transcript_text}",
            self.max_length
        )
    }
}

/// Transcript text worth sending to a summarizer, or `None` when only the
/// no-transcript placeholder is left.
pub fn summary_input(transcript: &Transcript) -> Option<String> {
    let text = normalize::concatenate(&transcript.segments);
    (!text.is_empty() && text != NO_TRANSCRIPT_TEXT).then_some(text)
}

/// Summarize transcript text using an LLM
pub async fn summarize(
    client: &reqwest::Client,
    transcript_text: &str,
    params: &SummaryParams,
    model: &str,
) -> Result<String> {
    if transcript_text.trim().is_empty() {
        bail!("nothing to summarize: transcript is empty");
    }

    if is_anthropic_model(model) {
        summarize_anthropic(client, transcript_text, params, model).await
    } else {
        summarize_openai(client, transcript_text, params, model).await
    }
}

fn is_anthropic_model(model: &str) -> bool {
    model.starts_with("claude")
}

async fn summarize_anthropic(
    client: &reqwest::Client,
    transcript_text: &str,
    params: &SummaryParams,
    model: &str,
) -> Result<String> {
    let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
        eyre::eyre!("ANTHROPIC_API_KEY environment variable not set (required for Claude summarization)")
    })?;

    debug!("Summarizing via Anthropic API with model {model} ({params:?})");

    let body = serde_json::json!({
        "model": model,
        "max_tokens": 4096,
        "system": params.system_prompt(),
        "messages": [
            {
                "role": "user",
                "content": params.user_message(transcript_text)
            }
        ]
    });

    let resp = client
        .post("https://api.anthropic.com/v1/messages")
        .header("x-api-key", &api_key)
        .header("anthropic-version", "2023-06-01")
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        bail!("Anthropic API returned {status}: {body}");
    }

    let json: serde_json::Value = resp.json().await?;
    extract_anthropic_text(&json)
}

fn extract_anthropic_text(json: &serde_json::Value) -> Result<String> {
    if let Some(content) = json.get("content").and_then(|c| c.as_array()) {
        let text: String = content
            .iter()
            .filter_map(|block| {
                if block.get("type")?.as_str()? == "text" {
                    block.get("text")?.as_str().map(|s| s.to_string())
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join("");
        if !text.is_empty() {
            return Ok(text);
        }
    }
    bail!("unexpected Anthropic API response format");
}

async fn summarize_openai(
    client: &reqwest::Client,
    transcript_text: &str,
    params: &SummaryParams,
    model: &str,
) -> Result<String> {
    let api_key = std::env::var("OPENAI_API_KEY")
        .map_err(|_| eyre::eyre!("OPENAI_API_KEY environment variable not set (required for OpenAI summarization)"))?;

    debug!("Summarizing via OpenAI API with model {model} ({params:?})");

    let body = serde_json::json!({
        "model": model,
        "messages": [
            {
                "role": "system",
                "content": params.system_prompt()
            },
            {
                "role": "user",
                "content": params.user_message(transcript_text)
            }
        ]
    });

    let resp = client
        .post("https://api.openai.com/v1/chat/completions")
        .bearer_auth(&api_key)
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        bail!("OpenAI API returned {status}: {body}");
    }

    let json: serde_json::Value = resp.json().await?;
    extract_openai_text(&json)
}

fn extract_openai_text(json: &serde_json::Value) -> Result<String> {
    if let Some(text) = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
    {
        return Ok(text.trim().to_string());
    }
    bail!("unexpected OpenAI API response format");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Segment, TranscriptSource};

    #[test]
    fn test_is_anthropic_model() {
        assert!(is_anthropic_model("claude-sonnet-4-6"));
        assert!(is_anthropic_model("claude-3-opus-20240229"));
        assert!(!is_anthropic_model("gpt-4o"));
        assert!(!is_anthropic_model("gpt-4o-mini"));
    }

    fn transcript(segments: Vec<Segment>) -> Transcript {
        Transcript {
            video_id: "dQw4w9WgXcQ".to_string(),
            language: "en".to_string(),
            source: TranscriptSource::Metadata,
            segments,
        }
    }

    #[test]
    fn test_summary_input_skips_placeholder() {
        let placeholder = transcript(normalize::synthesize("", ""));
        assert_eq!(summary_input(&placeholder), None);
        assert_eq!(summary_input(&transcript(Vec::new())), None);
    }

    #[test]
    fn test_summary_input_joins_segments() {
        let t = transcript(normalize::synthesize("My Video", "Para one\n\nPara two"));
        assert_eq!(summary_input(&t).as_deref(), Some("My Video Para one Para two"));
    }

    #[test]
    fn test_system_prompt_combines_tables() {
        let params = SummaryParams {
            style: "expert".to_string(),
            language: "ko".to_string(),
            format: "bullet".to_string(),
            max_length: 300,
        };
        let prompt = params.system_prompt();
        assert!(prompt.contains("suitable for experts"));
        assert!(prompt.contains("Summarize in Korean."));
        assert!(prompt.contains("as bullet points"));
    }

    #[test]
    fn test_system_prompt_unknown_keys_fall_back() {
        let params = SummaryParams {
            style: "poetic".to_string(),
            language: "fr".to_string(),
            format: "table".to_string(),
            ..SummaryParams::default()
        };
        let prompt = params.system_prompt();
        assert!(prompt.contains("concise summary"));
        assert!(prompt.contains("Summarize in English."));
        assert!(prompt.contains("as plain text"));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(lookup(LANGUAGE_PROMPTS, "JA"), "Summarize in Japanese.");
    }

    #[test]
    fn test_user_message_carries_max_length() {
        let params = SummaryParams {
            max_length: 150,
            ..SummaryParams::default()
        };
        let msg = params.user_message("hello there");
        assert!(msg.contains("under 150 characters"));
        assert!(msg.ends_with("hello there"));
    }

    #[tokio::test]
    async fn test_empty_transcript_rejected() {
        let client = reqwest::Client::new();
        let result = summarize(&client, "   ", &SummaryParams::default(), "gpt-4o").await;
        assert!(result.is_err());
    }

    #[test]
    fn test_extract_anthropic_text() {
        let json = serde_json::json!({
            "content": [
                {
                    "type": "text",
                    "text": "Here is the summary."
                }
            ]
        });
        assert_eq!(extract_anthropic_text(&json).unwrap(), "Here is the summary.");
    }

    #[test]
    fn test_extract_anthropic_text_empty() {
        let json = serde_json::json!({"content": []});
        assert!(extract_anthropic_text(&json).is_err());
    }

    #[test]
    fn test_extract_openai_text() {
        let json = serde_json::json!({
            "choices": [
                {
                    "message": {
                        "role": "assistant",
                        "content": " Summary of the video.\n"
                    }
                }
            ]
        });
        assert_eq!(extract_openai_text(&json).unwrap(), "Summary of the video.");
    }

    #[test]
    fn test_extract_openai_text_empty() {
        let json = serde_json::json!({"choices": []});
        assert!(extract_openai_text(&json).is_err());
    }
}
