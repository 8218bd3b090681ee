//! Export of note records to standalone text files.
//!
//! # Responsibility
//! - Derive safe filenames from note titles.
//! - Write one file per record with first-writer-wins conflict handling.

pub mod exporter;
pub mod filename;
