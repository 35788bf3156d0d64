mod audio;
mod window;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use stimkit_core::{Backend, HeadlessBackend, PlaybackState};
use stimkit_paradigm::{Paradigm, Script};
use stimkit_render::FileMediaLoader;
use stimkit_timing::Timer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::window::WindowBackend;

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { script, frame_rate } => run(&script, frame_rate),
        Commands::Check {
            script,
            keys,
            frame_rate,
            limit,
        } => check(&script, &keys, frame_rate, limit),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Present scripted stimulus sequences", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a paradigm script in a window.
    Run {
        /// JSON script describing the window and the stimuli.
        script: PathBuf,
        /// Playback rate for movies given as directories of frames.
        #[arg(long, default_value_t = 25.0)]
        frame_rate: f64,
    },
    /// Play a script against a virtual clock without opening a window.
    Check {
        script: PathBuf,
        /// Scripted key presses as `key@seconds`, comma separated.
        #[arg(short, long, value_delimiter = ',')]
        keys: Vec<ScriptedKey>,
        #[arg(long, default_value_t = 25.0)]
        frame_rate: f64,
        /// Give up once the virtual clock passes this many seconds.
        #[arg(long, default_value_t = 600.0)]
        limit: f64,
    },
}

/// A key press for the headless clock, written `key@seconds`.
#[derive(Debug, Clone, PartialEq)]
struct ScriptedKey {
    key: String,
    at: f64,
}

impl FromStr for ScriptedKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (key, at) = s
            .rsplit_once('@')
            .ok_or_else(|| format!("expected key@seconds, got '{s}'"))?;
        let at: f64 = at
            .trim()
            .parse()
            .map_err(|_| format!("'{at}' is not a number of seconds"))?;
        if key.is_empty() || !(at.is_finite() && at >= 0.0) {
            return Err(format!("expected key@seconds, got '{s}'"));
        }
        Ok(Self {
            key: key.to_owned(),
            at,
        })
    }
}

fn load(path: &Path) -> Result<Script> {
    Script::from_path(path).with_context(|| format!("loading script {}", path.display()))
}

fn run(path: &Path, frame_rate: f64) -> Result<()> {
    let script = load(path)?;
    println!("=== STIMKIT ===");
    println!("Platform: {}", std::env::consts::OS);
    println!("Architecture: {}", std::env::consts::ARCH);
    println!("Script: {} ({} stimuli)", path.display(), script.stimuli.len());
    if let Some(quit) = &script.config.escape_key {
        println!("Press {quit} at any time to stop.\n");
    }

    let backend = WindowBackend::new(FileMediaLoader::new(frame_rate))?;
    let mut paradigm = script.into_paradigm(backend)?;
    let state = play(&mut paradigm)?;
    println!("\nPlayback {state} after {} stimuli.", paradigm.cursor());
    Ok(())
}

fn check(path: &Path, keys: &[ScriptedKey], frame_rate: f64, limit: f64) -> Result<()> {
    let mut script = load(path)?;
    if script.config.data.take().is_some() {
        info!("dry run, response data will not be written");
    }

    let mut backend = HeadlessBackend::new()
        .with_media(FileMediaLoader::new(frame_rate))
        .with_limit(stimkit_core::surface::seconds(limit)?);
    for k in keys {
        backend = backend.press(k.key.as_str(), k.at);
    }
    let clock = backend.clock();

    let mut paradigm = script.into_paradigm(backend)?;
    let state = play(&mut paradigm)?;
    println!(
        "{state}: {} of {} stimuli in {:.3}s of virtual time, {} responses",
        paradigm.cursor(),
        paradigm.len(),
        clock.since_start().as_secs_f64(),
        paradigm.dataset().len(),
    );
    Ok(())
}

fn play<B: Backend>(paradigm: &mut Paradigm<B>) -> Result<PlaybackState> {
    let started = std::time::Instant::now();
    let result = paradigm.play_all();
    if let Err(e) = &result {
        error!(error = %e, at = paradigm.cursor(), "playback failed");
        paradigm.close();
    }
    let state = result?;
    info!(
        %state,
        secs = started.elapsed().as_secs_f64(),
        shown = paradigm.cursor(),
        "playback done"
    );
    Ok(state)
}
