//! Text-level repair of malformed backup XML before parsing.
//!
//! # Responsibility
//! - Delete decimal character references that name codepoints XML 1.0
//!   forbids (`&#1;` and friends), which would otherwise abort the parser.
//! - Escape raw `"` characters embedded inside double-quoted attribute values.
//!
//! # Invariants
//! - Legal character references are passed through byte-for-byte.
//! - Hex references (`&#x..;`) are out of scope and never touched.
//! - Both passes are single, linear scans and the combined repair is
//!   idempotent on its own output.
//!
//! # Known limitations
//! - Quote escaping is a heuristic over `name="value"` shapes, not a grammar.
//!   A value holding text like `" other="` closes early, and element text that
//!   happens to look like `name="..."` is scanned as well.

use log::info;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static DECIMAL_CHAR_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#([0-9]+);").expect("valid decimal char ref regex"));
static ATTR_OPEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\w+=""#).expect("valid attribute open regex"));
// What may legally follow the closing quote of an attribute value.
static ATTR_BOUNDARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*(?:/?>|\?>|[\w:.-]+\s*=\s*["']|\z)"#).expect("valid attribute boundary regex")
});

/// Counters describing what a repair pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairStats {
    /// Number of `&#N;` references deleted.
    pub removed_char_refs: usize,
    /// Number of raw `"` characters rewritten to `&quot;`.
    pub escaped_quotes: usize,
}

impl RepairStats {
    /// Returns whether the pass left the input untouched.
    pub fn is_clean(&self) -> bool {
        self.removed_char_refs == 0 && self.escaped_quotes == 0
    }
}

/// Returns whether `codepoint` is a legal XML 1.0 `Char`.
pub fn is_valid_xml_char(codepoint: u32) -> bool {
    matches!(
        codepoint,
        0x9 | 0xA | 0xD | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x10000..=0x10FFFF
    )
}

/// Runs both repair passes in order: char-ref stripping, then quote escaping.
///
/// # Side effects
/// - Emits one `xml_repair` logging event with the change counters.
pub fn repair_document(raw: &str) -> (String, RepairStats) {
    let (without_refs, removed_char_refs) = strip_invalid_char_refs(raw);
    let (repaired, escaped_quotes) = escape_attribute_quotes(&without_refs);
    let stats = RepairStats {
        removed_char_refs,
        escaped_quotes,
    };

    info!(
        "event=xml_repair module=xml status=ok input_bytes={} removed_char_refs={} escaped_quotes={}",
        raw.len(),
        stats.removed_char_refs,
        stats.escaped_quotes
    );
    (repaired, stats)
}

/// Deletes every decimal reference `&#N;` whose codepoint is not legal XML.
///
/// Returns the cleaned text and the number of deleted references. Numbers
/// too large for `u32` can never be legal and are deleted as well.
pub fn strip_invalid_char_refs(text: &str) -> (String, usize) {
    let mut removed = 0usize;
    let cleaned = DECIMAL_CHAR_REF_RE.replace_all(text, |caps: &Captures<'_>| {
        let legal = caps[1]
            .parse::<u32>()
            .map(is_valid_xml_char)
            .unwrap_or(false);
        if legal {
            caps[0].to_string()
        } else {
            removed += 1;
            String::new()
        }
    });
    (cleaned.into_owned(), removed)
}

/// Rewrites raw `"` characters inside `name="value"` attribute values to
/// `&quot;`.
///
/// A value ends at the first later `"` that looks like an attribute boundary
/// (followed by `>`, `/>`, `?>`, another `name=` or end of input), searching
/// no further than the next `<`. Without such a quote the first `"` closes
/// the value and nothing is rewritten.
pub fn escape_attribute_quotes(text: &str) -> (String, usize) {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0usize;
    let mut escaped = 0usize;

    while let Some(open) = ATTR_OPEN_RE.find_at(text, cursor) {
        let value_start = open.end();
        let Some(value_end) = find_value_end(text, value_start) else {
            break;
        };

        out.push_str(&text[cursor..value_start]);
        let value = &text[value_start..value_end];
        let inner_quotes = value.matches('"').count();
        if inner_quotes == 0 {
            out.push_str(value);
        } else {
            out.push_str(&value.replace('"', "&quot;"));
            escaped += inner_quotes;
        }
        out.push('"');
        cursor = value_end + 1;
    }

    out.push_str(&text[cursor..]);
    (out, escaped)
}

fn find_value_end(text: &str, value_start: usize) -> Option<usize> {
    let rest = &text[value_start..];
    let search_limit = rest.find('<').unwrap_or(rest.len());

    let boundary_quote = rest[..search_limit]
        .match_indices('"')
        .map(|(offset, _)| value_start + offset)
        .find(|&quote| ATTR_BOUNDARY_RE.is_match(&text[quote + 1..]));

    boundary_quote.or_else(|| rest.find('"').map(|offset| value_start + offset))
}
