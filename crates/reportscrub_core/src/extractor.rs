// extractor.rs: per-category token matchers and extraction helpers
use std::ops::Range;

use memchr::memchr;
use memchr::memmem;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Result;

/// Four dot-separated groups of one to three digits. Octet ranges are not
/// validated, so `999.999.999.999` is still a candidate.
pub const IP_PATTERN: &str = r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b";

/// One or more DNS labels followed by an alphabetic top-level label.
pub const DOMAIN_PATTERN: &str =
    r"\b(?:[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)+[A-Za-z]{2,63}\b";

static IP_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(IP_PATTERN).expect("IP pattern compiles"));
static DOMAIN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(DOMAIN_PATTERN).expect("domain pattern compiles"));

/// Finds the byte spans of a category's tokens in one line.
///
/// Spans are returned in line order and never overlap; repeated tokens yield
/// one span per occurrence.
pub trait TokenMatcher: Send + Sync {
    fn find(&self, line: &str) -> Vec<Range<usize>>;
}

/// Ordered token strings of `line`, duplicates included.
pub fn extract<'a>(matcher: &dyn TokenMatcher, line: &'a str) -> Vec<&'a str> {
    matcher.find(line).into_iter().map(|span| &line[span]).collect()
}

/// Regex-backed matcher used for the IP and domain categories.
pub struct PatternMatcher {
    regex: Regex,
    // every match contains this byte; lines without it are skipped
    required_byte: Option<u8>,
}

impl PatternMatcher {
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self { regex: Regex::new(pattern)?, required_byte: None })
    }

    pub fn ip() -> Self {
        Self { regex: IP_REGEX.clone(), required_byte: Some(b'.') }
    }

    pub fn domain() -> Self {
        Self { regex: DOMAIN_REGEX.clone(), required_byte: Some(b'.') }
    }
}

impl TokenMatcher for PatternMatcher {
    fn find(&self, line: &str) -> Vec<Range<usize>> {
        if let Some(b) = self.required_byte {
            if memchr(b, line.as_bytes()).is_none() {
                return Vec::new();
            }
        }
        self.regex.find_iter(line).map(|m| m.range()).collect()
    }
}

/// Matches a fixed list of literal words (keywords, hostnames, user names).
///
/// A literal only matches as a whole token: the characters on either side of
/// it must not be word characters. Where two literals overlap, the one that
/// starts first wins, then the longer one.
pub struct LiteralMatcher {
    finders: Vec<memmem::Finder<'static>>,
}

impl LiteralMatcher {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut words: Vec<String> = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();
        words.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        words.dedup();
        let finders = words.iter().map(|w| memmem::Finder::new(w.as_bytes()).into_owned()).collect();
        Self { finders }
    }

    pub fn len(&self) -> usize {
        self.finders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.finders.is_empty()
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_whole_token(line: &str, span: &Range<usize>) -> bool {
    let before_ok = line[..span.start].chars().next_back().map_or(true, |c| !is_word_char(c));
    let after_ok = line[span.end..].chars().next().map_or(true, |c| !is_word_char(c));
    before_ok && after_ok
}

impl TokenMatcher for LiteralMatcher {
    fn find(&self, line: &str) -> Vec<Range<usize>> {
        let bytes = line.as_bytes();
        let mut candidates: Vec<Range<usize>> = Vec::new();
        for finder in &self.finders {
            let n = finder.needle().len();
            for start in finder.find_iter(bytes) {
                let span = start..start + n;
                if is_whole_token(line, &span) {
                    candidates.push(span);
                }
            }
        }
        candidates.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| b.end.cmp(&a.end)));
        let mut out: Vec<Range<usize>> = Vec::with_capacity(candidates.len());
        for span in candidates {
            if out.last().map_or(true, |prev| span.start >= prev.end) {
                out.push(span);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::{extract, LiteralMatcher, PatternMatcher, TokenMatcher};

    #[test]
    fn test_ip_extraction_keeps_order_and_duplicates() {
        let m = PatternMatcher::ip();
        let line = "from 8.8.8.8 via 10.0.0.1 to 8.8.8.8";
        assert_eq!(extract(&m, line), vec!["8.8.8.8", "10.0.0.1", "8.8.8.8"]);
    }

    #[test]
    fn test_ip_extraction_is_permissive_on_ranges() {
        let m = PatternMatcher::ip();
        assert_eq!(extract(&m, "bogus 999.999.999.999 here"), vec!["999.999.999.999"]);
    }

    #[test]
    fn test_ip_extraction_ignores_longer_digit_runs() {
        let m = PatternMatcher::ip();
        assert!(extract(&m, "version 1111.2.3.4").is_empty());
        assert!(extract(&m, "no dots in this line").is_empty());
        assert!(extract(&m, "1.2.3 is too short").is_empty());
    }

    #[test]
    fn test_domain_extraction() {
        let m = PatternMatcher::domain();
        let line = "search corp.example.com lab.internal; ns 8.8.8.8";
        assert_eq!(extract(&m, line), vec!["corp.example.com", "lab.internal"]);
    }

    #[test]
    fn test_custom_pattern_matcher() {
        let m = PatternMatcher::new(r"[0-9a-f]{2}(?::[0-9a-f]{2}){5}").unwrap();
        assert_eq!(extract(&m, "link/ether 52:54:00:12:34:56 brd"), vec!["52:54:00:12:34:56"]);
        assert!(PatternMatcher::new("(unclosed").is_err());
    }

    #[test]
    fn test_literal_matcher_whole_tokens_only() {
        let m = LiteralMatcher::new(["acme", "secret"]);
        let line = "acme uses acmetool; secret=acme_x (acme)";
        assert_eq!(extract(&m, line), vec!["acme", "secret", "acme"]);
    }

    #[test]
    fn test_literal_matcher_prefers_longer_overlap() {
        let m = LiteralMatcher::new(["web", "web-01", "  ", ""]);
        assert_eq!(m.len(), 2);
        assert_eq!(extract(&m, "host web-01 and web"), vec!["web-01", "web"]);
    }

    #[test]
    fn test_literal_matcher_spans_are_sorted() {
        let m = LiteralMatcher::new(["bob", "alice"]);
        let spans = m.find("bob, alice, bob");
        assert_eq!(spans, vec![0..3, 5..10, 12..15]);
    }

    #[test]
    fn test_literal_matcher_multibyte_neighbours() {
        let m = LiteralMatcher::new(["bob"]);
        assert!(extract(&m, "ébob").is_empty());
        assert_eq!(extract(&m, "→bob←"), vec!["bob"]);
    }
}
