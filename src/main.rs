//! Ocarina auto-player CLI.
//!
//! Loads a mapping and a score, compiles the score to timed key events, then
//! plays them into whatever window has focus after the countdown.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;

use ocarina::player::{self, EnigoSink};
use ocarina::{KeyMap, OcarinaError};

/// Core Keeper ocarina auto-player
#[derive(Parser)]
#[command(name = "ocarina")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Score file to play
    #[arg(long, default_value = "song.txt")]
    song: PathBuf,

    /// Note-to-key mapping file (JSON)
    #[arg(long = "map", default_value = "mapping.json")]
    map: PathBuf,

    /// Seconds to wait before playback, to focus the game window
    #[arg(long, default_value_t = 4)]
    countdown: u32,

    /// Global transpose in semitones (negative = down)
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    transpose: i32,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), OcarinaError> {
    let mapping = KeyMap::load(&cli.map)
        .map_err(|e| with_path(e, &cli.map))?;
    let source = std::fs::read_to_string(&cli.song)
        .map_err(|e| with_path(e.into(), &cli.song))?;

    // Compile everything up front; a bad score must fail here, not mid-song.
    let events = ocarina::compile(&source, &mapping, cli.transpose)?;

    println!(
        "Loaded '{}': {} events, {} mapped keys.",
        cli.song.display(),
        events.len(),
        mapping.len()
    );
    if cli.transpose != 0 {
        println!("Transpose: {:+} semitones", cli.transpose);
    }
    println!(
        "You have {} seconds to focus the game window.",
        cli.countdown
    );

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
        .map_err(|e| OcarinaError::Input(format!("Cannot install Ctrl+C handler: {}", e)))?;

    if !player::countdown(cli.countdown, &interrupted) {
        println!("Aborted.");
        return Ok(());
    }

    println!("Playing! (Ctrl+C to abort)");
    let mut sink = EnigoSink::new()?;
    player::play(&events, &mut sink, &interrupted)?;

    if interrupted.load(Ordering::Relaxed) {
        println!("Aborted.");
    } else {
        println!("Done.");
    }
    Ok(())
}

fn with_path(e: OcarinaError, path: &std::path::Path) -> OcarinaError {
    match e {
        OcarinaError::Io(io) => OcarinaError::Io(std::io::Error::new(
            io.kind(),
            format!("{}: {}", path.display(), io),
        )),
        other => other,
    }
}
