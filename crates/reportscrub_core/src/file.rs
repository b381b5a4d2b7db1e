// file.rs: scrub one report file in place
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;

use crate::error::{Result, ScrubError};
use crate::scrubber::{Deltas, ScrubEngine};

pub const BANNER_WARNING: &str = "# WARNING: Sensitive information in this file has been obfuscated by reportscrub.";

/// Three lines prepended to every file that had something scrubbed.
pub static BANNER: Lazy<String> = Lazy::new(|| {
    let rule = format!("#{}", "-".repeat(93));
    format!("{rule}\n{BANNER_WARNING}\n{rule}\n")
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileOutcome {
    /// At least one line changed, so the file was rewritten with the banner.
    pub modified: bool,
    pub deltas: Deltas,
}

fn split_terminator(line: &str) -> (&str, &str) {
    let body = line.strip_suffix('\n').map_or(line, |b| b.strip_suffix('\r').unwrap_or(b));
    (body, &line[body.len()..])
}

/// Scrubs `text` line by line, keeping every line terminator as it was.
/// Returns the new text and whether any line changed.
pub fn scrub_text(engine: &mut ScrubEngine, text: &str) -> Result<(String, bool, Deltas)> {
    let mut out = String::with_capacity(text.len());
    let mut modified = false;
    let mut deltas = Deltas::default();
    for line in text.split_inclusive('\n') {
        let (body, terminator) = split_terminator(line);
        let scrubbed = engine.scrub_line(body)?;
        if scrubbed.line != body {
            modified = true;
        }
        deltas.merge(scrubbed.deltas)?;
        out.push_str(&scrubbed.line);
        out.push_str(terminator);
    }
    Ok((out, modified, deltas))
}

/// Scrubs a file in place. A file with nothing to scrub is not written.
pub fn process_file(engine: &mut ScrubEngine, path: &Path) -> Result<FileOutcome> {
    let bytes = fs::read(path).map_err(|e| ScrubError::io(path, e))?;
    let text = String::from_utf8(bytes).map_err(|_| ScrubError::NotText { path: path.to_path_buf() })?;
    let (scrubbed, modified, deltas) = scrub_text(engine, &text)?;
    if modified {
        let mut content = String::with_capacity(BANNER.len() + scrubbed.len());
        content.push_str(&BANNER);
        content.push_str(&scrubbed);
        fs::write(path, content).map_err(|e| ScrubError::io(path, e))?;
    }
    Ok(FileOutcome { modified, deltas })
}
