//! `noteport` command-line entry point.
//!
//! # Responsibility
//! - Map arguments onto `ExportOptions` and logging setup.
//! - Print one console line per record outcome plus a summary.
//! - Turn any run-level failure into a single error line and exit code 1.

use clap::Parser;
use log::info;
use noteport_core::{core_version, export_backup, init_logging, ExportOptions};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "noteport",
    about = "Export note records from a malformed XML backup into text files",
    version
)]
struct Cli {
    /// XML backup file to read
    #[arg(default_value = "OnePlusNote.xml")]
    input: PathBuf,

    /// Directory receiving one .txt file per note (created if absent)
    #[arg(default_value = "parsed_notes")]
    output_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Absolute directory for rolling log files; logs go to stderr when unset
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(&cli.log_level, cli.log_dir.as_deref()) {
        eprintln!("error: {err}");
        return ExitCode::FAILURE;
    }
    info!(
        "event=cli_start module=cli status=ok core_version={}",
        core_version()
    );

    let options = ExportOptions::new(cli.input, cli.output_dir);
    match export_backup(&options, |outcome| println!("{outcome}")) {
        Ok(report) => {
            println!(
                "Done: {} created, {} skipped without _id, {} skipped as existing.",
                report.created.len(),
                report.skipped_missing_id,
                report.skipped_existing
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
