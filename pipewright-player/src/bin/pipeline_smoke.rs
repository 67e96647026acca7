//! Pipeline smoke harness
//!
//! Wires the controller to the scripted engine and drives one full playback
//! lifecycle (set source → prepare → start → seek → pause → resume →
//! end-of-stream → stop → teardown), logging every outbound event. Useful for
//! eyeballing the controller's ordering and teardown behavior without a real
//! engine installation.

use anyhow::{Context, Result};
use clap::Parser;
use pipewright_player::config::PlayerConfig;
use pipewright_player::engine::scripted::{ScriptedEngine, TransitionMode};
use pipewright_player::engine::{Engine, EngineInit};
use pipewright_player::{EventSink, PipelineController, PlayerEvent};
use std::os::fd::OwnedFd;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for the smoke harness
#[derive(Parser, Debug)]
#[command(name = "pipeline-smoke")]
#[command(about = "Exercise the pipeline controller against the scripted engine")]
#[command(version)]
struct Args {
    /// Media file to play (absolute path)
    #[arg(long, default_value = "/tmp/pipewright-smoke.media")]
    source: PathBuf,

    /// Feed the file through the mapped pull-mode source instead of by url
    #[arg(long)]
    mapped: bool,

    /// Engine configuration file
    #[arg(long, env = "PIPEWRIGHT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable looping before end-of-stream is injected
    #[arg(long)]
    loop_playback: bool,

    /// Seek target in milliseconds
    #[arg(long, default_value = "1500")]
    seek_ms: i64,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pipewright_player=debug,pipeline_smoke=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => PlayerConfig::load(path).context("failed to load config file")?,
        None => PlayerConfig::load_default(),
    };
    let init = EngineInit::with_config(&config);

    let engine = ScriptedEngine::new(TransitionMode::Announced);
    engine.set_duration_ms(30_000);
    engine.set_position_ms(0);

    let sink: Arc<dyn EventSink> = Arc::new(|event: PlayerEvent| info!("event: {event:?}"));
    let mut controller =
        PipelineController::new(&init, Arc::clone(&engine) as Arc<dyn Engine>, sink);

    if args.mapped {
        if !args.source.exists() {
            std::fs::write(&args.source, b"pipewright smoke payload")
                .with_context(|| format!("cannot create {}", args.source.display()))?;
        }
        let file = std::fs::File::open(&args.source)
            .with_context(|| format!("cannot open {}", args.source.display()))?;
        controller.set_data_source_fd(OwnedFd::from(file), 0, 0)?;
    } else {
        let path = args
            .source
            .to_str()
            .context("source path is not valid UTF-8")?;
        controller.set_data_source(path)?;
    }

    controller.prepare()?;
    controller.start()?;
    info!("playing: {}", controller.is_playing());

    controller.seek_to(args.seek_ms)?;
    controller.pause()?;
    controller.start()?;

    if args.loop_playback {
        controller.set_looping(true)?;
    }
    engine.post_eos();

    // Give the bus loop a beat to drain the injected messages.
    std::thread::sleep(Duration::from_millis(50));

    info!("position: {:?} ms", controller.position_ms().ok());
    info!("duration: {:?} ms", controller.duration_ms().ok());

    controller.stop()?;
    controller.teardown();
    info!("smoke run complete");
    Ok(())
}
