//! Lenient handling of malformed backup XML.
//!
//! # Responsibility
//! - Repair known malformations at the text level before parsing.
//! - Parse in recovery mode into an owned element tree.
//! - Decode XML and HTML escapes in attribute values.
//!
//! # Invariants
//! - Repair runs before parsing and never needs a parsed tree.
//! - Nothing in this module touches the filesystem.

pub mod entities;
pub mod parser;
pub mod repair;
