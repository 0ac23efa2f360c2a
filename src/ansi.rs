//! Removal of ANSI CSI escape sequences from captured text.

use regex::Regex;
use std::sync::OnceLock;

/// Delete every CSI escape sequence from `text`.
///
/// A CSI sequence is `ESC [` followed by zero or more parameter bytes
/// (`0x30`–`0x3F`), zero or more intermediate bytes (`0x20`–`0x2F`), and one
/// final byte (`0x40`–`0x7E`). Covers color and cursor-movement noise; other
/// escape forms (OSC, bare `ESC c`, ...) pass through untouched.
pub fn strip_csi(text: &str) -> String {
    static CSI: OnceLock<Regex> = OnceLock::new();
    let re = CSI.get_or_init(|| {
        Regex::new(r"\x1b\[[\x30-\x3f]*[\x20-\x2f]*[\x40-\x7e]").expect("CSI pattern is valid")
    });
    re.replace_all(text, "").into_owned()
}
