//! MusicXML-to-score converter CLI.
//!
//! Reads a MusicXML file and writes the plain-text score format the player
//! consumes. With a mapping file, the melody is auto-transposed into the
//! mapping's range unless `--no-transpose` is given.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use ocarina::{convert_str, KeyMap, OcarinaError};

/// Convert MusicXML into an ocarina score file
#[derive(Parser)]
#[command(name = "ocarina-convert")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// MusicXML file to convert
    input: PathBuf,

    /// Destination score file
    output: PathBuf,

    /// Mapping file (JSON); enables mapping-based auto-transpose
    #[arg(long = "map")]
    map: Option<PathBuf>,

    /// Keep written pitches as-is (no automatic transposition)
    #[arg(long)]
    no_transpose: bool,
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
    let xml = std::fs::read_to_string(&cli.input).map_err(|e| {
        OcarinaError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", cli.input.display(), e),
        ))
    })?;

    let mapping = match &cli.map {
        Some(path) => Some(KeyMap::load(path).map_err(|e| match e {
            OcarinaError::Io(io) => OcarinaError::Io(std::io::Error::new(
                io.kind(),
                format!("{}: {}", path.display(), io),
            )),
            other => other,
        })?),
        None => None,
    };

    let text = convert_str(&xml, mapping.as_ref(), !cli.no_transpose)?;
    std::fs::write(&cli.output, &text)?;

    eprintln!(
        "Wrote {} lines to {}",
        text.lines().count(),
        cli.output.display()
    );
    Ok(())
}
