use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use eyre::{Result, WrapErr, bail};
use log::{debug, info, warn};

use ytsum::config::Config;
use ytsum::credentials::{CredentialPool, mask};
use ytsum::summarize::{DEFAULT_MAX_LENGTH, SummaryParams};
use ytsum::{Transcript, TranscriptService, TranscriptSource};

mod cli;

use cli::{Cli, OutputFormat};

const DEFAULT_LANG: &str = "en";
const DEFAULT_MODEL: &str = "claude-sonnet-4-6";

fn setup_logging() -> Result<()> {
    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_file = log_dir.join("ytsum.log");

    let target = Box::new(std::fs::OpenOptions::new().create(true).append(true).open(&log_file)?);

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized: {}", log_file.display());
    Ok(())
}

fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ytsum")
        .join("logs")
}

fn tool_version(name: &str) -> Option<String> {
    Command::new(name)
        .arg("--version")
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| {
            String::from_utf8_lossy(&o.stdout)
                .trim()
                .lines()
                .next()
                .unwrap_or("")
                .to_string()
        })
}

fn build_after_help() -> String {
    let yt_dlp_line = match tool_version("yt-dlp") {
        Some(v) => format!("  \x1b[32m✅\x1b[0m yt-dlp     {v}"),
        None => "  \x1b[31m❌\x1b[0m yt-dlp     (not found, alternate caption discovery disabled)".to_string(),
    };

    let log_path = log_dir().join("ytsum.log");

    format!(
        "\nOPTIONAL TOOLS:\n{yt_dlp_line}\n\nAPI KEYS:\n  YOUTUBE_API_KEYS (comma separated), YOUTUBE_API_KEY, or youtube_api_keys in {}\n\nLogs are written to: {}",
        ytsum::config::config_path().display(),
        log_path.display()
    )
}

/// Retry an async operation with exponential backoff
async fn retry<F, Fut, T>(max_attempts: u32, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(e) if attempt + 1 < max_attempts => {
                let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                debug!("Attempt {} failed: {e}, retrying in {delay:?}", attempt + 1);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Video IDs for one line of input: a keyword search, or an identifier
/// expanded to up to `count` videos.
async fn videos_for(service: &TranscriptService, input: &str, search: bool, count: u32) -> Result<Vec<String>> {
    if search {
        let videos = service
            .search_videos(input, count)
            .await
            .wrap_err_with(|| format!("video search for '{input}' failed"))?;
        return Ok(videos.into_iter().map(|v| v.video_id).collect());
    }
    service
        .resolve_videos(input, count)
        .await
        .wrap_err_with(|| format!("could not resolve '{input}'"))
}

async fn transcript_for(service: &TranscriptService, video_id: &str, lang: &str, use_cache: bool) -> Transcript {
    if use_cache && let Some(cached) = ytsum::cache::load(video_id, lang) {
        return cached;
    }

    let transcript = service.transcript_for_video(video_id, lang).await;
    if use_cache && let Err(e) = ytsum::cache::save(&transcript, lang) {
        warn!("Failed to cache transcript for {video_id}: {e}");
    }
    transcript
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;

    let after_help = build_after_help();
    let cmd = <Cli as clap::CommandFactory>::command().after_help(after_help);
    let matches = cmd.get_matches();
    let cli = <Cli as clap::FromArgMatches>::from_arg_matches(&matches)?;

    // Load config file (non-fatal if missing/invalid)
    let config = Config::load().unwrap_or_else(|e| {
        warn!("Ignoring config file: {e}");
        Config::default()
    });

    // CLI flags take priority over config defaults
    let lang = cli
        .lang
        .clone()
        .or_else(|| config.default_lang.clone())
        .unwrap_or_else(|| DEFAULT_LANG.to_string());
    let model = cli
        .model
        .clone()
        .or_else(|| config.default_model.clone())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let format = cli
        .format
        .or_else(|| config.default_format.as_deref().and_then(OutputFormat::from_config))
        .unwrap_or(OutputFormat::Text);

    let keys = config.api_keys();
    if cli.verbose {
        let config_path = ytsum::config::config_path();
        if config_path.exists() {
            eprintln!("Config: {}", config_path.display());
        }
        eprintln!(
            "API keys: {}",
            keys.iter().map(|k| mask(k)).collect::<Vec<_>>().join(", ")
        );
    }
    if keys.is_empty() {
        warn!("No YouTube Data API keys configured; channel resolution and metadata fallback are unavailable");
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs()))
        .build()?;
    let service = TranscriptService::from_client(client.clone(), Arc::new(CredentialPool::new(keys)));

    // Collect identifiers: from arg or stdin
    let identifiers = if let Some(ref identifier) = cli.identifier {
        vec![identifier.clone()]
    } else {
        let stdin = io::stdin();
        stdin.lock().lines().collect::<Result<Vec<_>, _>>()?
    };

    if identifiers.is_empty() {
        bail!(
            "no video or channel identifier provided\n\nUsage: ytsum <URL|ID|@handle> [-n COUNT]\n       ytsum --search <KEYWORD> [-n COUNT]\n       echo <URL> | ytsum"
        );
    }

    let params = SummaryParams {
        style: cli
            .style
            .clone()
            .or_else(|| config.summary_style.clone())
            .unwrap_or_else(|| "simple".to_string()),
        language: lang.clone(),
        format: config.summary_format.clone().unwrap_or_else(|| "text".to_string()),
        max_length: config.summary_max_length.unwrap_or(DEFAULT_MAX_LENGTH),
    };

    let mut written = Vec::new();
    for input in &identifiers {
        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        for video_id in videos_for(&service, input, cli.search, cli.count).await? {
            let transcript = transcript_for(&service, &video_id, &lang, !cli.no_cache).await;

            if cli.verbose {
                eprintln!(
                    "Video: {}\nSource: {}\nLanguage: {}\nSegments: {}",
                    transcript.video_id,
                    transcript.source,
                    transcript.language,
                    transcript.segments.len(),
                );
            }
            if transcript.source == TranscriptSource::Metadata {
                warn!("No captions for {video_id}, using title and description");
            }

            let rendered = match format {
                OutputFormat::Text => ytsum::output::render_text(&transcript),
                OutputFormat::Json => ytsum::output::render_json(&transcript),
                OutputFormat::Srt => ytsum::output::render_srt(&transcript),
            };
            if cli.output.is_some() {
                written.push(rendered);
            } else {
                println!("{rendered}");
            }

            if cli.summarize {
                let Some(text) = ytsum::summarize::summary_input(&transcript) else {
                    warn!("No transcript text for {video_id}, skipping summary");
                    eprintln!("No transcript text for {video_id}, skipping summary");
                    continue;
                };
                let summary = retry(3, || {
                    let client = &client;
                    let text = &text;
                    let params = &params;
                    let model = &model;
                    async move { ytsum::summarize::summarize(client, text, params, model).await }
                })
                .await?;
                println!("\n--- Summary ---\n{summary}");
            }
        }
    }

    // Several videos share one output file
    if let Some(ref path) = cli.output {
        std::fs::write(path, written.join("\n"))?;
        if cli.verbose {
            eprintln!("Output written to: {}", path.display());
        }
    }

    Ok(())
}
