//! tempokey
//!
//! Prints the musical key and tempo of seconds 10-30 of an audio file as a
//! single JSON object, e.g. `{"key":"A","bpm":124}`.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tempokey_library::{to_json_line, DetailedReport, Extractor, TempoKey};

/// Exit status for usage errors and failed extractions
const FAILURE: u8 = 1;

#[derive(Parser, Debug)]
#[command(version, about = "Estimate the key and BPM of an audio file", long_about = None)]
struct Cli {
    /// Audio file to analyze
    file: PathBuf,
    /// Also print scale, key strength, Camelot key, exact BPM and beat positions
    #[arg(long)]
    detailed: bool,
}

fn main() -> ExitCode {
    // Logs go to stderr so stdout only ever carries the JSON result
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            // clap uses status 2 for usage errors
            let _ = e.print();
            return ExitCode::from(FAILURE);
        }
    };

    match run(&cli) {
        Ok(line) => {
            println!("{line}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(FAILURE)
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<String> {
    let extraction = Extractor::default()
        .extract_file(&cli.file)
        .with_context(|| format!("Failed to analyze {}", cli.file.display()))?;

    tracing::info!(
        key = %extraction.key.key,
        bpm = extraction.tempo.bpm,
        "extraction complete"
    );

    let line = if cli.detailed {
        to_json_line(&DetailedReport::from(&extraction))
    } else {
        to_json_line(&TempoKey::from(&extraction))
    }
    .context("Failed to serialize result")?;

    Ok(line)
}
