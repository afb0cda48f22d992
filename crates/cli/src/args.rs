use std::path::PathBuf;

use clap::Parser;

/// Edits the chapter list of one media item from a line-oriented script.
///
/// Script lines are read from stdin; the final chapter list is printed to
/// stdout as JSON.
#[derive(Debug, Clone, Parser)]
#[command(name = "chapters", version, about)]
pub struct CliArgs {
    /// Media duration in seconds.
    #[arg(long, value_parser = parse_positive_seconds)]
    pub duration: f64,

    /// Existing chapter list to start from (`{"chapters": [...]}`).
    #[arg(long)]
    pub chapters: Option<PathBuf>,

    /// Engine tunables as JSON.
    #[arg(long, env = "CHAPTERS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Chapter store base url. Without it saves are written to `--output`.
    #[arg(long = "base-url", env = "CHAPTERS_BASE_URL")]
    pub base_url: Option<String>,

    /// Media id used in the save url.
    #[arg(long = "media-id", env = "CHAPTERS_MEDIA_ID", default_value = "local")]
    pub media_id: String,

    /// File that receives every save when no store is configured.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Save request timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 10_000)]
    pub timeout_ms: u64,

    #[arg(long, short)]
    pub verbose: bool,
}

fn parse_positive_seconds(value: &str) -> Result<f64, String> {
    let seconds: f64 = value
        .parse()
        .map_err(|err| format!("invalid duration {value}: {err}"))?;
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(format!("duration must be positive, got {value}"));
    }
    Ok(seconds)
}
