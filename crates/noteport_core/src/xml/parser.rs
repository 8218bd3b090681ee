//! Recovery-mode XML parsing into an owned element tree.
//!
//! # Responsibility
//! - Turn repaired backup bytes into a tree of elements and attributes.
//! - Keep going past residual malformation instead of aborting on the first
//!   syntax violation.
//!
//! # Invariants
//! - `parse_lenient` returns `Err` only when no root element could be
//!   recovered. A valid document without any note record is still `Ok`.
//! - Attribute values in the tree are already XML-decoded.
//! - For duplicate attributes the first occurrence wins.
//!
//! # Recovery rules
//! - A mismatched end tag closes the nearest open element with that name and
//!   everything opened after it; an end tag with no open match is ignored.
//! - Elements still open at end of input are closed implicitly.
//! - On a reader error the offending markup is skipped and reading restarts
//!   at the next `<`, with the open-element stack kept.
//! - A tag whose name is not an XML name (a stray `<` in text, for example)
//!   is treated as text: reading restarts at the next `<` after it, even one
//!   inside the bogus tag.
//! - Only the first top-level element is kept as root.

use super::entities::unescape_attribute;
use log::{debug, error, info, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// One element with its decoded attributes and element children.
///
/// Text, comments, CDATA and processing instructions are not kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    /// Qualified tag name as written (prefix included).
    pub name: String,
    /// Attributes in document order, values XML-decoded.
    pub attributes: Vec<(String, String)>,
    /// Child elements in document order.
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Creates an element without attributes or children.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Returns the value of attribute `name`, if present.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Iterates every element below this one in document order.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.children.iter().rev().collect(),
        }
    }

    /// Iterates descendants whose tag name equals `name`.
    pub fn descendants_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.descendants().filter(move |element| element.name == name)
    }
}

/// Pre-order iterator over the descendants of an [`XmlElement`].
pub struct Descendants<'a> {
    stack: Vec<&'a XmlElement>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a XmlElement;

    fn next(&mut self) -> Option<Self::Item> {
        let element = self.stack.pop()?;
        self.stack.extend(element.children.iter().rev());
        Some(element)
    }
}

/// Parsed document plus recovery bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    /// The recovered root element.
    pub root: XmlElement,
    /// Number of reader errors skipped while parsing.
    pub recovered_errors: usize,
    /// Number of extra top-level elements dropped after the root.
    pub dropped_top_level: usize,
}

/// Parse failure that left nothing usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// No element could be recovered from the input.
    NoRootElement {
        /// First reader error seen, when there was one.
        first_error: Option<String>,
    },
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoRootElement {
                first_error: Some(details),
            } => write!(f, "no root element could be recovered: {details}"),
            Self::NoRootElement { first_error: None } => {
                write!(f, "no root element could be recovered")
            }
        }
    }
}

impl Error for ParseError {}

/// Parses UTF-8 XML bytes in recovery mode.
///
/// # Errors
/// - Returns [`ParseError::NoRootElement`] when the input holds no element.
///
/// # Side effects
/// - Emits `xml_parse` logging events, plus one `warn` per skipped reader
///   error.
pub fn parse_lenient(bytes: &[u8]) -> Result<XmlDocument, ParseError> {
    let started_at = Instant::now();
    let mut tree = TreeBuilder::default();
    let mut buf = Vec::new();
    let mut first_error: Option<String> = None;
    let mut offset = 0usize;

    // Each pass reads from `offset` until end of input or until some markup
    // has to be skipped; the next pass restarts at the following `<`.
    while offset < bytes.len() {
        let mut reader = lenient_reader(&bytes[offset..]);
        let resume_at = loop {
            let before = offset + reader_position(&reader);
            let step = match reader.read_event_into(&mut buf) {
                Ok(Event::Start(start)) if is_xml_name(start.name().as_ref()) => {
                    tree.open(element_from_start(&start));
                    Step::Next
                }
                Ok(Event::Empty(start)) if is_xml_name(start.name().as_ref()) => {
                    tree.attach(element_from_start(&start));
                    Step::Next
                }
                Ok(Event::Start(_)) | Ok(Event::Empty(_)) => {
                    debug!(
                        "event=xml_parse module=xml status=recover position={} invalid_tag_name=true",
                        before
                    );
                    Step::Resume(next_markup_after(bytes, before))
                }
                Ok(Event::End(end)) => {
                    tree.close(&String::from_utf8_lossy(end.name().as_ref()));
                    Step::Next
                }
                Ok(Event::Eof) => Step::Resume(None),
                Ok(_) => Step::Next,
                Err(err) => {
                    tree.recovered_errors += 1;
                    warn!(
                        "event=xml_parse module=xml status=recover position={} error={}",
                        before, err
                    );
                    first_error.get_or_insert_with(|| err.to_string());
                    Step::Resume(next_markup_after(bytes, before))
                }
            };
            buf.clear();
            if let Step::Resume(resume_at) = step {
                break resume_at;
            }
        };

        match resume_at {
            Some(next) if next > offset => offset = next,
            _ => break,
        }
    }

    tree.finish();
    match tree.root {
        Some(root) => {
            info!(
                "event=xml_parse module=xml status=ok duration_ms={} elements={} recovered_errors={} dropped_top_level={}",
                started_at.elapsed().as_millis(),
                tree.element_count,
                tree.recovered_errors,
                tree.dropped_top_level
            );
            Ok(XmlDocument {
                root,
                recovered_errors: tree.recovered_errors,
                dropped_top_level: tree.dropped_top_level,
            })
        }
        None => {
            error!(
                "event=xml_parse module=xml status=error duration_ms={} error_code=no_root_element recovered_errors={}",
                started_at.elapsed().as_millis(),
                tree.recovered_errors
            );
            Err(ParseError::NoRootElement { first_error })
        }
    }
}

enum Step {
    Next,
    Resume(Option<usize>),
}

fn lenient_reader(bytes: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(bytes);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    reader
}

fn reader_position(reader: &Reader<&[u8]>) -> usize {
    usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX)
}

/// Returns the index of the first `<` after the markup that starts at or just
/// before `position`.
fn next_markup_after(bytes: &[u8], position: usize) -> Option<usize> {
    let markup_start = if bytes.get(position) == Some(&b'<') {
        position
    } else if position > 0 && bytes.get(position - 1) == Some(&b'<') {
        position - 1
    } else {
        position
    };
    let search_from = markup_start.checked_add(1)?;
    bytes
        .get(search_from..)?
        .iter()
        .position(|&byte| byte == b'<')
        .map(|index| search_from + index)
}

fn is_xml_name(name: &[u8]) -> bool {
    let Ok(name) = std::str::from_utf8(name) else {
        return false;
    };
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' || first == ':' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_alphanumeric() || matches!(ch, '_' | ':' | '.' | '-') || !ch.is_ascii())
}

fn element_from_start(start: &BytesStart<'_>) -> XmlElement {
    let mut element = XmlElement::new(String::from_utf8_lossy(start.name().as_ref()));

    for attribute in start.attributes().with_checks(false) {
        match attribute {
            Ok(attribute) => {
                let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
                if element.attribute(&key).is_some() {
                    debug!(
                        "event=xml_parse module=xml status=recover element={} duplicate_attribute={}",
                        element.name, key
                    );
                    continue;
                }
                let value = unescape_attribute(&String::from_utf8_lossy(&attribute.value));
                element.attributes.push((key, value));
            }
            Err(err) => {
                debug!(
                    "event=xml_parse module=xml status=recover element={} attribute_error={}",
                    element.name, err
                );
            }
        }
    }

    element
}

#[derive(Default)]
struct TreeBuilder {
    open: Vec<XmlElement>,
    root: Option<XmlElement>,
    element_count: usize,
    recovered_errors: usize,
    dropped_top_level: usize,
}

impl TreeBuilder {
    fn open(&mut self, element: XmlElement) {
        self.open.push(element);
    }

    fn attach(&mut self, element: XmlElement) {
        self.element_count += 1;
        if let Some(parent) = self.open.last_mut() {
            parent.children.push(element);
        } else if self.root.is_none() {
            self.root = Some(element);
        } else {
            self.dropped_top_level += 1;
            warn!(
                "event=xml_parse module=xml status=recover dropped_top_level_element={}",
                element.name
            );
        }
    }

    fn close(&mut self, name: &str) {
        let Some(index) = self.open.iter().rposition(|element| element.name == name) else {
            debug!(
                "event=xml_parse module=xml status=recover unmatched_end={}",
                name
            );
            return;
        };
        while self.open.len() > index {
            if let Some(element) = self.open.pop() {
                self.attach(element);
            }
        }
    }

    fn finish(&mut self) {
        while let Some(element) = self.open.pop() {
            self.attach(element);
        }
    }
}
