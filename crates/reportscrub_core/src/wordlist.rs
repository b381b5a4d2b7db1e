// wordlist.rs: loading of keyword, hostname and user name lists
use std::fs;
use std::path::Path;

use crate::error::{Result, ScrubError};

/// Parses a list file: one entry per line, surrounding whitespace ignored,
/// blank lines and `#` comments skipped.
pub fn parse_word_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Reads a list file. A missing, unreadable or empty list is an error because
/// the category that asked for it would otherwise scrub nothing.
pub fn load_word_list(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .map_err(|e| ScrubError::WordList { path: path.to_path_buf(), reason: e.to_string() })?;
    let words = parse_word_list(&text);
    if words.is_empty() {
        return Err(ScrubError::WordList { path: path.to_path_buf(), reason: "no entries".to_string() });
    }
    Ok(words)
}
