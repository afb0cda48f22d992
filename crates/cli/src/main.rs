mod args;
mod logger;
mod script;
mod session;

use std::time::Duration;

use anyhow::{Context, Result};
use chapter_engine::time::seconds_to_tl;
use chapter_engine::{Engine, EngineConfig};
use clap::Parser;
use tracing::info;

use args::CliArgs;
use session::{Session, read_chapters, save_sink};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    logger::init_logging(args.verbose);

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let chapters = match &args.chapters {
        Some(path) => read_chapters(path)?,
        None => Vec::new(),
    };
    let sink = save_sink(
        args.base_url.as_deref(),
        &args.media_id,
        args.output.clone(),
        Duration::from_millis(args.timeout_ms),
    )?;
    info!(media_id = %args.media_id, duration_s = args.duration, "starting chapter session");

    let mut session = Session::new(Engine::new(config), sink);
    session.load(seconds_to_tl(args.duration), chapters)?;
    let payload = session.run(tokio::io::stdin()).await?;

    let json = serde_json::to_string_pretty(&payload).context("failed to encode chapters")?;
    println!("{json}");
    Ok(())
}
