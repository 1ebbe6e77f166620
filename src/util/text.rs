use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Folds text into the form used for keyword comparison.
///
/// Lowercases, decomposes to NFD and drops combining marks, so `"Fútbol"`
/// and `"futbol"` compare equal. Taxonomy names, aliases and keywords go
/// through the same function as the text they are matched against.
///
/// # Examples
///
/// ```
/// use feedmix::util::normalize_text;
///
/// assert_eq!(normalize_text("Política Económica"), "politica economica");
/// ```
pub fn normalize_text(s: &str) -> String {
    s.to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Replaces every markup tag with `replacement`.
///
/// Best effort only: this is a tag stripper, not an HTML sanitizer.
pub fn strip_tags<'a>(html: &'a str, replacement: &str) -> Cow<'a, str> {
    TAG_RE.replace_all(html, replacement)
}

/// Collapses whitespace runs into single spaces and trims both ends.
pub fn collapse_whitespace(s: &str) -> String {
    WHITESPACE_RE.replace_all(s, " ").trim().to_string()
}

/// Returns the prefix of `s` holding at most `max_chars` characters.
///
/// Never splits a UTF-8 sequence.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// SEC-001: Strip terminal control characters and ANSI escape sequences.
///
/// Feed titles and summaries are attacker-controlled; they are passed through
/// here before being written to a terminal. Tab, newline and carriage return
/// survive. CSI sequences (`ESC [` ... final byte) and OSC sequences
/// (`ESC ]` ... BEL or `ESC \`) are dropped whole.
///
/// Returns `Cow::Borrowed` when nothing needs stripping.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    fn is_unsafe(c: char) -> bool {
        c == '\x1b' || c == '\x7f' || (c < ' ' && !matches!(c, '\t' | '\n' | '\r'))
    }

    if !s.chars().any(is_unsafe) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\x1b' {
            if !is_unsafe(c) {
                out.push(c);
            }
            continue;
        }

        match chars.peek() {
            Some('[') => {
                chars.next();
                for c in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&c) {
                        break;
                    }
                }
            }
            Some(']') => {
                chars.next();
                while let Some(c) = chars.next() {
                    if c == '\x07' {
                        break;
                    }
                    if c == '\x1b' && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            _ => {}
        }
    }

    Cow::Owned(out)
}
