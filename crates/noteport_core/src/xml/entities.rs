//! Entity and character-reference decoding.
//!
//! # Responsibility
//! - Decode raw attribute values the way an XML parser would
//!   ([`unescape_attribute`]).
//! - Decode HTML escapes left in note content after XML decoding
//!   ([`decode_html_entities`]).
//!
//! # Invariants
//! - Decoding never fails: unknown or malformed references stay verbatim.
//! - XML decoding only recognizes `;`-terminated references. HTML decoding
//!   also accepts numeric references without `;` and the legacy named
//!   entities (`&amp`, `&copy`, ...) that browsers accept without `;`.

use super::repair::is_valid_xml_char;
use once_cell::sync::Lazy;
use quick_xml::escape::resolve_html5_entity;
use regex::{Captures, Regex};
use std::borrow::Cow;

static REFERENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(?:#([0-9]+)|#[xX]([0-9A-Fa-f]+)|([A-Za-z][A-Za-z0-9]*));")
        .expect("valid entity reference regex")
});

static HTML_REFERENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[0-9]+;?|#[xX][0-9A-Fa-f]+;?|[^\t\n\x0C <&#;]{1,32};?)")
        .expect("valid html reference regex")
});

/// HTML5 named entities that are still recognized without a trailing `;`.
const LEGACY_ENTITIES: &[&str] = &[
    "AElig", "AMP", "Aacute", "Acirc", "Agrave", "Aring", "Atilde", "Auml", "COPY", "Ccedil",
    "ETH", "Eacute", "Ecirc", "Egrave", "Euml", "GT", "Iacute", "Icirc", "Igrave", "Iuml", "LT",
    "Ntilde", "Oacute", "Ocirc", "Ograve", "Oslash", "Otilde", "Ouml", "QUOT", "REG", "THORN",
    "Uacute", "Ucirc", "Ugrave", "Uuml", "Yacute", "aacute", "acirc", "acute", "aelig", "agrave",
    "amp", "aring", "atilde", "auml", "brvbar", "ccedil", "cedil", "cent", "copy", "curren", "deg",
    "divide", "eacute", "ecirc", "egrave", "eth", "euml", "frac12", "frac14", "frac34", "gt",
    "iacute", "icirc", "iexcl", "igrave", "iquest", "iuml", "laquo", "lt", "macr", "micro",
    "middot", "nbsp", "not", "ntilde", "oacute", "ocirc", "ograve", "ordf", "ordm", "oslash",
    "otilde", "ouml", "para", "plusmn", "pound", "quot", "raquo", "reg", "sect", "shy", "sup1",
    "sup2", "sup3", "szlig", "thorn", "times", "uacute", "ucirc", "ugrave", "uml", "uuml",
    "yacute", "yen", "yuml",
];

/// One parsed `&...;` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reference<'a> {
    /// `&#N;` or `&#xN;`. `None` when the number overflows `u32`.
    Numeric(Option<u32>),
    /// `&name;`.
    Named(&'a str),
}

/// Decodes a raw (still escaped) XML attribute value.
///
/// - Literal tab, newline and carriage return become a single space each,
///   with `\r\n` counted once (attribute-value normalization).
/// - The five predefined entities and character references naming legal
///   XML characters are decoded.
/// - Anything else is kept as written.
pub fn unescape_attribute(raw: &str) -> String {
    let normalized = if raw.contains(['\t', '\n', '\r']) {
        Cow::Owned(raw.replace("\r\n", " ").replace(['\t', '\n', '\r'], " "))
    } else {
        Cow::Borrowed(raw)
    };

    replace_references(&normalized, |reference| match reference {
        Reference::Numeric(Some(codepoint)) if is_valid_xml_char(codepoint) => {
            char::from_u32(codepoint).map(|ch| Cow::Owned(ch.to_string()))
        }
        Reference::Numeric(_) => None,
        Reference::Named(name) => predefined_entity(name).map(Cow::Borrowed),
    })
}

/// Decodes HTML named entities and numeric character references.
///
/// Numeric references follow HTML5 rules:
/// - 0, surrogates and values past U+10FFFF decode to U+FFFD;
/// - 0x80-0x9F are read as Windows-1252;
/// - other non-characters and control codes (except tab, LF, FF, CR)
///   decode to nothing.
///
/// The trailing `;` is optional for numeric references and for the legacy
/// entities in [`LEGACY_ENTITIES`]. When a name is unknown, its longest
/// legacy-entity prefix is decoded and the rest is kept (`&copyright`
/// becomes `©right`).
pub fn decode_html_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    HTML_REFERENCE_RE
        .replace_all(text, |caps: &Captures<'_>| decode_html_reference(&caps[1]))
        .into_owned()
}

/// Decodes one reference body (the text after `&`, `;` included if present).
fn decode_html_reference(token: &str) -> String {
    if let Some(number) = token.strip_prefix('#') {
        let number = number.trim_end_matches(';');
        let codepoint = match number.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => number.parse::<u32>().ok(),
        };
        return html_char_ref(codepoint).into_owned();
    }

    let resolved = match token.strip_suffix(';') {
        Some(name) => resolve_html5_entity(name),
        None => resolve_legacy_entity(token),
    };
    if let Some(value) = resolved {
        return value.to_string();
    }

    for (end, _) in token.char_indices().rev() {
        if end == 0 {
            break;
        }
        if let Some(value) = resolve_legacy_entity(&token[..end]) {
            return format!("{value}{}", &token[end..]);
        }
    }
    format!("&{token}")
}

fn resolve_legacy_entity(name: &str) -> Option<&'static str> {
    if LEGACY_ENTITIES.contains(&name) {
        resolve_html5_entity(name)
    } else {
        None
    }
}

fn replace_references<F>(text: &str, mut resolve: F) -> String
where
    F: FnMut(Reference<'_>) -> Option<Cow<'static, str>>,
{
    if !text.contains('&') {
        return text.to_string();
    }

    REFERENCE_RE
        .replace_all(text, |caps: &Captures<'_>| {
            let reference = if let Some(decimal) = caps.get(1) {
                Reference::Numeric(decimal.as_str().parse::<u32>().ok())
            } else if let Some(hex) = caps.get(2) {
                Reference::Numeric(u32::from_str_radix(hex.as_str(), 16).ok())
            } else {
                Reference::Named(caps.get(3).map_or("", |name| name.as_str()))
            };
            match resolve(reference) {
                Some(decoded) => decoded.into_owned(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn predefined_entity(name: &str) -> Option<&'static str> {
    match name {
        "lt" => Some("<"),
        "gt" => Some(">"),
        "amp" => Some("&"),
        "apos" => Some("'"),
        "quot" => Some("\""),
        _ => None,
    }
}

fn html_char_ref(codepoint: Option<u32>) -> Cow<'static, str> {
    const REPLACEMENT: &str = "\u{FFFD}";

    let Some(codepoint) = codepoint else {
        return Cow::Borrowed(REPLACEMENT);
    };
    if codepoint == 0 {
        return Cow::Borrowed(REPLACEMENT);
    }
    if codepoint == 0x0D {
        return Cow::Borrowed("\r");
    }
    if let Some(mapped) = windows_1252_char(codepoint) {
        return Cow::Owned(mapped.to_string());
    }
    if (0xD800..=0xDFFF).contains(&codepoint) || codepoint > 0x10FFFF {
        return Cow::Borrowed(REPLACEMENT);
    }
    if is_html_noncharacter(codepoint) {
        return Cow::Borrowed("");
    }
    char::from_u32(codepoint)
        .map(|ch| Cow::Owned(ch.to_string()))
        .unwrap_or(Cow::Borrowed(REPLACEMENT))
}

fn is_html_noncharacter(codepoint: u32) -> bool {
    matches!(codepoint, 0x1..=0x8 | 0xB | 0xE..=0x1F | 0x7F..=0x9F | 0xFDD0..=0xFDEF)
        || (codepoint & 0xFFFE) == 0xFFFE
}

fn windows_1252_char(codepoint: u32) -> Option<char> {
    let mapped = match codepoint {
        0x80 => '\u{20AC}',
        0x82 => '\u{201A}',
        0x83 => '\u{0192}',
        0x84 => '\u{201E}',
        0x85 => '\u{2026}',
        0x86 => '\u{2020}',
        0x87 => '\u{2021}',
        0x88 => '\u{02C6}',
        0x89 => '\u{2030}',
        0x8A => '\u{0160}',
        0x8B => '\u{2039}',
        0x8C => '\u{0152}',
        0x8E => '\u{017D}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x98 => '\u{02DC}',
        0x99 => '\u{2122}',
        0x9A => '\u{0161}',
        0x9B => '\u{203A}',
        0x9C => '\u{0153}',
        0x9E => '\u{017E}',
        0x9F => '\u{0178}',
        // Unassigned in Windows-1252; kept as the C1 code itself.
        0x81 | 0x8D | 0x8F | 0x90 | 0x9D => char::from_u32(codepoint)?,
        _ => return None,
    };
    Some(mapped)
}
