//! Section Tracker CLI Application
//!
//! This is the command-line harness for the section-tracker library.
//! It plays the part of the host page and adds:
//! - A simulated page with smooth scrolling and resizes
//! - Scripted sessions loaded from TOML
//! - Nav highlighting, URL fragment and screen-reader announcements
//! - Report generation (TXT/JSON)

use anyhow::{bail, Result};
use clap::Parser;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

mod callbacks;
mod config;
mod events;
mod report;
mod state;

use config::OutputFormat;
use events::SessionOutcome;

/// Section Tracker - Replay scroll sessions against the active section tracker
#[derive(Parser, Debug)]
#[command(name = "section-tracker-cli")]
#[command(about = "Replay page sessions and report which section was active", long_about = None)]
#[command(version)]
struct Args {
    /// Session file(s) to replay (TOML)
    #[arg(value_name = "FILE")]
    sessions: Vec<PathBuf>,

    /// Report format (overrides [output] in the session file)
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Directory to write reports into (default: stdout)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("Section Tracker CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using tracker library v{}", section_tracker::VERSION);

    if args.sessions.is_empty() {
        println!("Section Tracker - No session specified");
        println!("\nQuick Start:");
        println!("  section-tracker-cli portfolio.toml");
        println!("  section-tracker-cli --format json sessions/*.toml");
        println!("\nUse --help for more options");
        return Ok(());
    }

    // Sessions are independent; replay them in parallel, report in input order
    let results: Vec<(PathBuf, Result<(SessionOutcome, config::OutputConfig)>)> = args
        .sessions
        .par_iter()
        .map(|path| (path.clone(), run_session(path)))
        .collect();

    let mut failures = 0;
    let mut outcomes = Vec::new();
    for (path, result) in results {
        match result {
            Ok(done) => outcomes.push(done),
            Err(e) => {
                failures += 1;
                log::error!("Session {:?} failed: {:#}", path, e);
            }
        }
    }

    emit_reports(&args, &outcomes)?;

    if failures > 0 {
        bail!("{} of {} session(s) failed", failures, args.sessions.len());
    }
    Ok(())
}

/// Load and replay one session file
fn run_session(path: &Path) -> Result<(SessionOutcome, config::OutputConfig)> {
    log::info!("Loading session from: {:?}", path);
    let session = config::load_session(path)?;
    log::debug!("Session loaded successfully");

    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "session".to_string());
    let outcome = events::replay(&name, &session)?;
    Ok((outcome, session.output))
}

/// Print or write every report, honoring command line overrides
fn emit_reports(args: &Args, outcomes: &[(SessionOutcome, config::OutputConfig)]) -> Result<()> {
    let mut stdout_json = Vec::new();

    for (outcome, output) in outcomes {
        let format = args.format.unwrap_or(output.format);
        let dir = args.output.as_ref().or(output.output_dir.as_ref());

        match (dir, format) {
            (Some(dir), format) => {
                let path = report::write_report(dir, outcome, format)?;
                if !args.quiet {
                    println!("✓ {} -> {:?}", outcome.name, path);
                }
            }
            (None, OutputFormat::Txt) => {
                if !args.quiet {
                    println!("{}", report::render_txt(outcome));
                }
            }
            (None, OutputFormat::Json) => stdout_json.push(outcome.clone()),
        }
    }

    // JSON to stdout is a single array so it stays machine-readable
    if !stdout_json.is_empty() && !args.quiet {
        println!("{}", report::render_json(&stdout_json)?);
    }
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
