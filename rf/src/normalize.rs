//! Configuration key normalization
//!
//! Authors spell keys as `class-name`, `ClassName` or `field.name`. Before a
//! key is matched against a typed field it is rewritten into one canonical
//! spelling:
//!
//! - `-` is dropped and the character after it is upper-cased (`class-name` -> `className`)
//! - `.` is kept as-is (path-like keys)
//! - every other character is lower-cased
//!
//! A key that contains both a pending `-` and an earlier `.` is returned
//! untouched (see [`normalize_key`]).

use tracing::debug;

/// Separator that upper-cases the character following it
pub const SPECIAL_CHAR: char = '-';

/// Path separator that is copied through unchanged
pub const IGNORE_CHAR: char = '.';

/// Normalize a raw configuration key into its canonical spelling.
///
/// The scan keeps two counters: `pending_upper` (a `-` was just seen) and
/// `ignore_seen` (a `.` appeared earlier). As soon as both are non-zero at the
/// top of an iteration the original input is returned unmodified, so
/// `a-b.c-d` stays `a-b.c-d` while `a.b-` becomes `a.b` (the trailing `-`
/// never reaches another iteration).
pub fn normalize_key(raw: &str) -> String {
    debug!(%raw, "normalize_key: called");
    if raw.is_empty() {
        return String::new();
    }

    let mut result = String::with_capacity(raw.len());
    let mut pending_upper = 0usize;
    let mut ignore_seen = 0usize;

    for ch in raw.chars() {
        if pending_upper > 0 && ignore_seen > 0 {
            debug!(%raw, "normalize_key: dash after dot, returning input unchanged");
            return raw.to_string();
        }
        if pending_upper > 0 {
            result.push(upper(ch));
            pending_upper = 0;
            continue;
        }
        if ch == SPECIAL_CHAR {
            pending_upper += 1;
        } else if ch == IGNORE_CHAR {
            result.push(ch);
            ignore_seen += 1;
        } else {
            result.push(lower(ch));
        }
    }

    result
}

// Single-char case mapping: characters whose mapping expands (e.g. 'ß') are kept.
fn upper(ch: char) -> char {
    let mut it = ch.to_uppercase();
    match (it.next(), it.next()) {
        (Some(c), None) => c,
        _ => ch,
    }
}

fn lower(ch: char) -> char {
    let mut it = ch.to_lowercase();
    match (it.next(), it.next()) {
        (Some(c), None) => c,
        _ => ch,
    }
}
