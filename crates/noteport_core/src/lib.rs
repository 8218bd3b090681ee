//! Core logic for salvaging note records from malformed XML backups.
//! This crate owns the repair, parsing and export rules; the CLI only wires
//! arguments and console output.

pub mod export;
pub mod logging;
pub mod model;
pub mod xml;

pub use export::exporter::{
    export_backup, export_document, ExportError, ExportOptions, ExportReport, RecordOutcome,
};
pub use export::filename::{sanitize_filename, DEFAULT_MAX_FILENAME_CHARS};
pub use logging::{init_logging, logging_status, LoggingError};
pub use model::note::{NoteRecord, OutputFile, RecordError};
pub use xml::parser::{parse_lenient, ParseError, XmlDocument, XmlElement};
pub use xml::repair::{is_valid_xml_char, repair_document, RepairStats};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
