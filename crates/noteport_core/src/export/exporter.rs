//! Record export use-case.
//!
//! # Responsibility
//! - Walk a parsed backup and write one text file per valid note record.
//! - Run the whole pipeline for one backup file: output dir setup, read,
//!   repair, parse, export.
//!
//! # Invariants
//! - A record without `_id` produces no file and never fails the batch.
//! - An existing file is never overwritten; the record is skipped instead
//!   (first writer wins, including files left by earlier runs).
//! - Any other I/O failure aborts the run; nothing is retried.
//! - Records are processed one at a time in document order.

use crate::export::filename::DEFAULT_MAX_FILENAME_CHARS;
use crate::model::note::{NoteRecord, RecordError, RECORD_ELEMENT};
use crate::xml::parser::{parse_lenient, ParseError, XmlDocument};
use crate::xml::repair::{repair_document, RepairStats};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Inputs of one export run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// Backup XML file, read fully into memory.
    pub input: PathBuf,
    /// Directory receiving the `.txt` files; created with parents if absent.
    pub output_dir: PathBuf,
    /// Upper bound for sanitized filename stems, in chars.
    pub max_filename_chars: usize,
}

impl ExportOptions {
    /// Creates options with the default filename length bound.
    pub fn new(input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_dir: output_dir.into(),
            max_filename_chars: DEFAULT_MAX_FILENAME_CHARS,
        }
    }
}

/// What happened to one `noteRecord` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// File written.
    Created { path: PathBuf },
    /// Record had no `_id`.
    SkippedMissingId,
    /// Target file already existed.
    SkippedExisting { file_name: String, path: PathBuf },
}

impl Display for RecordOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created { path } => write!(f, "Created: {}", path.display()),
            Self::SkippedMissingId => write!(f, "Skipping a noteRecord without _id."),
            Self::SkippedExisting { file_name, .. } => write!(
                f,
                "Warning: File {file_name} already exists. Skipping to avoid overwriting."
            ),
        }
    }
}

/// Aggregate result of one export run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    /// Written files in creation order.
    pub created: Vec<PathBuf>,
    /// Records dropped for lacking `_id`.
    pub skipped_missing_id: usize,
    /// Records dropped because their file already existed.
    pub skipped_existing: usize,
    /// What the repair pass changed before parsing.
    pub repair: RepairStats,
    /// Reader errors the parser recovered from.
    pub recovered_parse_errors: usize,
}

impl ExportReport {
    /// Number of `noteRecord` elements visited.
    pub fn records_seen(&self) -> usize {
        self.created.len() + self.skipped_missing_id + self.skipped_existing
    }

    fn record(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Created { path } => self.created.push(path.clone()),
            RecordOutcome::SkippedMissingId => self.skipped_missing_id += 1,
            RecordOutcome::SkippedExisting { .. } => self.skipped_existing += 1,
        }
    }
}

/// Run-level failure. Record-level skips never surface here.
#[derive(Debug)]
pub enum ExportError {
    /// Output directory could not be created.
    CreateOutputDir { path: PathBuf, source: io::Error },
    /// Input could not be read as UTF-8 text.
    ReadInput { path: PathBuf, source: io::Error },
    /// Input held no recoverable XML.
    Parse(ParseError),
    /// A record file could not be written.
    Write { path: PathBuf, source: io::Error },
}

impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreateOutputDir { path, source } => write!(
                f,
                "failed to create output directory `{}`: {source}",
                path.display()
            ),
            Self::ReadInput { path, source } => {
                write!(f, "failed to read input `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "failed to parse XML: {err}"),
            Self::Write { path, source } => {
                write!(f, "failed to write `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for ExportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateOutputDir { source, .. }
            | Self::ReadInput { source, .. }
            | Self::Write { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
        }
    }
}

impl From<ParseError> for ExportError {
    fn from(value: ParseError) -> Self {
        Self::Parse(value)
    }
}

/// Exports every note record of the backup named by `options`.
///
/// `on_outcome` is called once per `noteRecord`, as soon as it is handled.
///
/// # Errors
/// - [`ExportError::CreateOutputDir`] / [`ExportError::ReadInput`] before any
///   record is touched.
/// - [`ExportError::Parse`] when no root element can be recovered; no file is
///   written in that case.
/// - [`ExportError::Write`] on the first record whose file cannot be written.
///
/// # Side effects
/// - Creates `options.output_dir` and writes files into it.
/// - Emits `export_run` logging events.
pub fn export_backup<F>(
    options: &ExportOptions,
    on_outcome: F,
) -> Result<ExportReport, ExportError>
where
    F: FnMut(&RecordOutcome),
{
    let started_at = Instant::now();
    info!(
        "event=export_run module=export status=start input={} output_dir={}",
        options.input.display(),
        options.output_dir.display()
    );

    let result = run_pipeline(options, on_outcome);
    match &result {
        Ok(report) => info!(
            "event=export_run module=export status=ok duration_ms={} created={} skipped_missing_id={} skipped_existing={}",
            started_at.elapsed().as_millis(),
            report.created.len(),
            report.skipped_missing_id,
            report.skipped_existing
        ),
        Err(err) => error!(
            "event=export_run module=export status=error duration_ms={} error={}",
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

fn run_pipeline<F>(options: &ExportOptions, on_outcome: F) -> Result<ExportReport, ExportError>
where
    F: FnMut(&RecordOutcome),
{
    fs::create_dir_all(&options.output_dir).map_err(|source| ExportError::CreateOutputDir {
        path: options.output_dir.clone(),
        source,
    })?;

    let raw = fs::read_to_string(&options.input).map_err(|source| ExportError::ReadInput {
        path: options.input.clone(),
        source,
    })?;

    let (repaired, repair) = repair_document(&raw);
    let document = parse_lenient(repaired.as_bytes())?;

    let mut report = export_document(&document, options, on_outcome)?;
    report.repair = repair;
    Ok(report)
}

/// Writes one file per `noteRecord` found anywhere below the root.
///
/// Only `options.output_dir` and `options.max_filename_chars` are used; the
/// directory must already exist.
///
/// # Errors
/// - [`ExportError::Write`] when a record file cannot be created or written.
pub fn export_document<F>(
    document: &XmlDocument,
    options: &ExportOptions,
    mut on_outcome: F,
) -> Result<ExportReport, ExportError>
where
    F: FnMut(&RecordOutcome),
{
    let mut report = ExportReport {
        recovered_parse_errors: document.recovered_errors,
        ..ExportReport::default()
    };

    for element in document.root.descendants_named(RECORD_ELEMENT) {
        let outcome = match NoteRecord::from_element(element) {
            Ok(record) => export_record(&record, options)?,
            Err(RecordError::MissingId) => {
                warn!("event=note_export module=export status=skip reason=missing_id");
                RecordOutcome::SkippedMissingId
            }
        };
        report.record(&outcome);
        on_outcome(&outcome);
    }

    Ok(report)
}

fn export_record(
    record: &NoteRecord,
    options: &ExportOptions,
) -> Result<RecordOutcome, ExportError> {
    let output = record.output_file(&options.output_dir, options.max_filename_chars);

    match write_new_file(&output.path, &output.body) {
        Ok(()) => {
            info!(
                "event=note_export module=export status=ok record_id={} path={} bytes={}",
                record.id,
                output.path.display(),
                output.body.len()
            );
            Ok(RecordOutcome::Created { path: output.path })
        }
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            warn!(
                "event=note_export module=export status=skip reason=file_exists record_id={} path={}",
                record.id,
                output.path.display()
            );
            Ok(RecordOutcome::SkippedExisting {
                file_name: output.file_name(),
                path: output.path,
            })
        }
        Err(source) => {
            error!(
                "event=note_export module=export status=error record_id={} path={} error={}",
                record.id,
                output.path.display(),
                source
            );
            Err(ExportError::Write {
                path: output.path,
                source,
            })
        }
    }
}

// `create_new` makes the existence check and the create a single step.
fn write_new_file(path: &Path, body: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(body.as_bytes())?;
    file.flush()
}
