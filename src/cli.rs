use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Srt,
}

impl OutputFormat {
    pub fn from_config(name: &str) -> Option<Self> {
        <Self as clap::ValueEnum>::from_str(name, true).ok()
    }
}

#[derive(Parser)]
#[command(
    name = "ytsum",
    about = "YouTube transcript fetcher with caption fallbacks and API key rotation",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// Video URL or ID, channel URL, @handle or custom channel path (reads from stdin if omitted)
    pub identifier: Option<String>,

    /// Treat the input as a keyword and fetch the newest matching videos
    #[arg(long)]
    pub search: bool,

    /// Number of videos to fetch for channel or keyword input (max 50)
    #[arg(short = 'n', long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=50))]
    pub count: u32,

    /// Summarize the transcript via LLM
    #[arg(short, long)]
    pub summarize: bool,

    /// Output format: text (default), json, srt
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Preferred caption language [default: en]
    #[arg(short, long)]
    pub lang: Option<String>,

    /// Write output to file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Summary style: simple, detailed, expert, beginner, academic, creative
    #[arg(long)]
    pub style: Option<String>,

    /// LLM model for summarization [default: claude-sonnet-4-6]
    #[arg(long)]
    pub model: Option<String>,

    /// Skip the transcript cache
    #[arg(long)]
    pub no_cache: bool,

    /// Show resolution and fetch details
    #[arg(short, long)]
    pub verbose: bool,
}
