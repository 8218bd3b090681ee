//! Note backup domain model.
//!
//! # Responsibility
//! - Define the record read from a backup and the file derived from it.
//!
//! # Invariants
//! - A `NoteRecord` always carries a non-empty id.
//! - An `OutputFile` is written at most once and never overwritten.

pub mod note;
