//! Filename derivation for exported notes.
//!
//! # Responsibility
//! - Map a free-form note title to a filename fragment that is safe on
//!   common filesystems.
//!
//! # Invariants
//! - Output never contains `< > : " / \ | ? *` or control chars 0x00-0x1F.
//! - Output never contains spaces; they become underscores.
//! - Length is measured in chars, never bytes, so truncation cannot split a
//!   UTF-8 sequence.
//! - Output never ends with `.` or ` `.
//!
//! Uniqueness is not provided here. Collisions are resolved by the exporter.

use once_cell::sync::Lazy;
use regex::Regex;

/// Default upper bound for a sanitized filename stem, in chars.
pub const DEFAULT_MAX_FILENAME_CHARS: usize = 100;

static FORBIDDEN_CHARS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[<>:"/\\|?*\x00-\x1F]"#).expect("valid forbidden filename chars regex")
});

/// Sanitizes `title` into a filename stem of at most `max_chars` chars.
///
/// The result may be empty (for example when the title only holds forbidden
/// characters); callers append an extension, so an empty stem still yields a
/// usable name.
pub fn sanitize_filename(title: &str, max_chars: usize) -> String {
    let stripped = FORBIDDEN_CHARS_RE.replace_all(title, "");
    let mut sanitized = stripped.replace(' ', "_");

    if sanitized.chars().count() > max_chars {
        sanitized = sanitized.chars().take(max_chars).collect();
        // Stripping `.` can expose an `_` cut by truncation, so trim both
        // together until nothing reserved is left at the end.
        let trimmed_len = sanitized.trim_end_matches(['_', '.', ' ']).len();
        sanitized.truncate(trimmed_len);
    }

    let trimmed_len = sanitized.trim_end_matches(['.', ' ']).len();
    sanitized.truncate(trimmed_len);
    sanitized
}
