//! Note record and output file model.
//!
//! # Responsibility
//! - Read one `noteRecord` element into a validated [`NoteRecord`].
//! - Derive the [`OutputFile`] (path + body) a record is exported to.
//!
//! # Invariants
//! - `id` is non-empty; records without one never become a `NoteRecord`.
//! - `title` falls back to [`DEFAULT_TITLE`] only when the attribute is absent.
//!   An empty title stays empty.
//! - Output body is title immediately followed by decoded content, with no
//!   separator.

use crate::export::filename::sanitize_filename;
use crate::xml::entities::decode_html_entities;
use crate::xml::parser::XmlElement;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Tag name of exportable records.
pub const RECORD_ELEMENT: &str = "noteRecord";
/// Identifier attribute. The leading underscore is part of the backup format.
pub const ID_ATTR: &str = "_id";
/// Title attribute.
pub const TITLE_ATTR: &str = "title";
/// Content attribute, HTML-escaped markup.
pub const CONTENT_ATTR: &str = "content";
/// Title used when a record has no `title` attribute.
pub const DEFAULT_TITLE: &str = "Untitled";
/// Extension of every exported file.
pub const OUTPUT_EXTENSION: &str = "txt";

/// Reasons a `noteRecord` element cannot become a [`NoteRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    /// `_id` is absent or empty.
    MissingId,
}

impl Display for RecordError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingId => write!(f, "note record has no `{ID_ATTR}` attribute"),
        }
    }
}

impl Error for RecordError {}

/// One note read from the backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteRecord {
    /// Backup identifier. Validated only; never used for naming.
    pub id: String,
    /// Note title as stored.
    pub title: String,
    /// Content after XML decoding, still HTML-escaped.
    pub content: String,
}

impl NoteRecord {
    /// Reads a record from a parsed `noteRecord` element.
    ///
    /// # Errors
    /// - Returns [`RecordError::MissingId`] when `_id` is absent or empty.
    pub fn from_element(element: &XmlElement) -> Result<Self, RecordError> {
        let id = element
            .attribute(ID_ATTR)
            .filter(|id| !id.is_empty())
            .ok_or(RecordError::MissingId)?;

        Ok(Self {
            id: id.to_string(),
            title: element
                .attribute(TITLE_ATTR)
                .unwrap_or(DEFAULT_TITLE)
                .to_string(),
            content: element.attribute(CONTENT_ATTR).unwrap_or("").to_string(),
        })
    }

    /// Returns content with HTML entities and character references decoded.
    pub fn decoded_content(&self) -> String {
        decode_html_entities(&self.content)
    }

    /// Returns the text written to disk: title glued to decoded content.
    pub fn body(&self) -> String {
        let mut body = self.title.clone();
        body.push_str(&self.decoded_content());
        body
    }

    /// Returns the sanitized file name, extension included.
    pub fn file_name(&self, max_filename_chars: usize) -> String {
        format!(
            "{}.{OUTPUT_EXTENSION}",
            sanitize_filename(&self.title, max_filename_chars)
        )
    }

    /// Derives the output file inside `output_dir`.
    pub fn output_file(&self, output_dir: &Path, max_filename_chars: usize) -> OutputFile {
        OutputFile {
            path: output_dir.join(self.file_name(max_filename_chars)),
            body: self.body(),
        }
    }
}

/// File derived from one exported record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    /// Destination path inside the output directory.
    pub path: PathBuf,
    /// UTF-8 text to write.
    pub body: String,
}

impl OutputFile {
    /// File name component of `path`, for diagnostics.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
