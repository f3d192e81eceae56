//! Transcript Extractor - Main entry point
//!
//! This binary runs one extraction pass over a captured chat page and prints
//! the resulting transcript as JSON. Usage:
//!
//! ```text
//! transcript-extractor <page.html> [url]
//! ```
//!
//! The optional URL selects the host profile; without it the generic profile
//! is used.

use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use transcript_extractor::{Config, ExtractionError, TranscriptEngine, TranscriptUpdate};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: transcript-extractor <page.html> [url]");
        std::process::exit(2);
    };
    let url = args.next();

    // Load configuration, then initialize logging at the configured level
    // (RUST_LOG still wins when set)
    let config = Config::load();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.general.log_level.clone()));
    let _subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if !config.general.enabled {
        info!("Extractor is disabled in configuration, exiting");
        return Ok(());
    }

    let html = std::fs::read_to_string(&path)?;
    info!("Read {} bytes from {}", html.len(), path);

    // Create update channel and engine
    let (update_tx, mut update_rx) = mpsc::channel::<TranscriptUpdate>(16);
    let mut engine = TranscriptEngine::new(config, update_tx);

    if let Some(url) = url {
        engine.set_location(&url);
    }
    engine.push_snapshot(html);

    // A static capture never gets a fresh snapshot, so ride out the root
    // retry budget until the resolver settles (worst case: document body)
    loop {
        match engine.scan_now().await {
            Ok(()) => break,
            Err(ExtractionError::RootNotFound { .. }) => continue,
            Err(e) => return Err(e.into()),
        }
    }

    let status = engine.status();
    info!(
        "Extracted {} messages using the {} profile",
        status.messages, status.profile
    );

    match update_rx.try_recv() {
        Ok(update) => println!("{}", serde_json::to_string_pretty(&update)?),
        Err(_) => info!("No conversation found on the page"),
    }

    Ok(())
}
