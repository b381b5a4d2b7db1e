// scrubber.rs: the scrubbing engine and the per-line transform
use std::collections::BTreeMap;
use std::ops::Range;
use std::path::Path;

use log::{debug, info};

use crate::category::Category;
use crate::config::ScrubConfig;
use crate::error::{Result, ScrubError};
use crate::extractor::{LiteralMatcher, PatternMatcher, TokenMatcher};
use crate::mapper::{Exemption, FakeFormat, IdentifierMapper, Mapping};

/// Original -> fake pairs observed while scrubbing, grouped by category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deltas {
    pairs: BTreeMap<Category, BTreeMap<String, String>>,
}

impl Deltas {
    pub fn record(&mut self, category: Category, original: &str, fake: &str) {
        self.pairs.entry(category).or_default().insert(original.to_string(), fake.to_string());
    }

    /// Folds `other` into `self`. An original already present with a different
    /// fake value means the mappers were not shared, which is a bug.
    pub fn merge(&mut self, other: Deltas) -> Result<()> {
        for (category, pairs) in other.pairs {
            let into = self.pairs.entry(category).or_default();
            for (original, fake) in pairs {
                match into.get(&original) {
                    Some(existing) if *existing != fake => {
                        return Err(ScrubError::Inconsistent { category, original });
                    }
                    Some(_) => {}
                    None => {
                        into.insert(original, fake);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, category: Category) -> Option<&BTreeMap<String, String>> {
        self.pairs.get(&category)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &BTreeMap<String, String>)> {
        self.pairs.iter().map(|(c, p)| (*c, p))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.values().all(BTreeMap::is_empty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineOutcome {
    pub line: String,
    pub deltas: Deltas,
}

struct Slot {
    matcher: Box<dyn TokenMatcher>,
    mapper: IdentifierMapper,
}

/// Holds the matcher and the long-lived identifier mapper of every enabled
/// category. One engine serves a whole run so a token scrubs identically in
/// every file.
pub struct ScrubEngine {
    slots: BTreeMap<Category, Slot>,
}

impl ScrubEngine {
    /// An engine with no categories; add them with [`ScrubEngine::with_category`].
    pub fn new() -> Self {
        Self { slots: BTreeMap::new() }
    }

    pub fn with_category(mut self, matcher: Box<dyn TokenMatcher>, mapper: IdentifierMapper) -> Self {
        self.slots.insert(mapper.category(), Slot { matcher, mapper });
        self
    }

    pub fn from_config(cfg: &ScrubConfig) -> Result<Self> {
        let mut engine = ScrubEngine::new();
        let enabled = cfg.enabled_categories();
        for category in Category::ORDER.into_iter().filter(|c| !enabled.contains(c)) {
            info!("{} scrubbing not enabled.", category);
        }
        for category in enabled {
            let matcher: Box<dyn TokenMatcher>;
            let (exemption, format) = match category {
                Category::Ip => {
                    matcher = Box::new(PatternMatcher::ip());
                    (Exemption::IpBlocks(cfg.private_blocks()?), FakeFormat::IpBlock(cfg.fake_block()?))
                }
                Category::Domain => {
                    matcher = Box::new(PatternMatcher::domain());
                    (Exemption::domain_suffixes(&cfg.exempt_domains), FakeFormat::for_category(category))
                }
                Category::Keyword | Category::Hostname | Category::User => {
                    if category == Category::Keyword && cfg.key_words_file.is_none() {
                        return Err(ScrubError::Config(
                            "use_key_words_file is set but key_words_file is missing".to_string(),
                        ));
                    }
                    let words = LiteralMatcher::new(cfg.words(category)?);
                    if words.is_empty() {
                        return Err(ScrubError::Config(format!("{} scrubbing is enabled but no entries are configured", category)));
                    }
                    info!("Loaded {} {} entries", words.len(), category);
                    matcher = Box::new(words);
                    (Exemption::Nothing, FakeFormat::for_category(category))
                }
            };
            engine = engine.with_category(matcher, IdentifierMapper::new(category, exemption, format));
        }
        Ok(engine)
    }

    pub fn categories(&self) -> Vec<Category> {
        self.slots.keys().copied().collect()
    }

    pub fn mapping(&self, category: Category) -> Option<&Mapping> {
        self.slots.get(&category).map(|s| s.mapper.mapping())
    }

    /// Fake value for one token; tokens of a disabled category pass through.
    pub fn resolve(&mut self, category: Category, original: &str) -> Result<String> {
        match self.slots.get_mut(&category) {
            Some(slot) => slot.mapper.resolve(original),
            None => Ok(original.to_string()),
        }
    }

    /// Reuses the pairs of an earlier run for `category`.
    pub fn seed(&mut self, category: Category, previous: &Mapping) -> Result<usize> {
        match self.slots.get_mut(&category) {
            Some(slot) => slot.mapper.seed(previous),
            None => Ok(0),
        }
    }

    /// Seeds every enabled category from translation files found in `dir`.
    /// Missing files are not an error.
    pub fn seed_from_dir(&mut self, dir: &Path, cfg: &ScrubConfig) -> Result<usize> {
        let mut total = 0;
        for category in self.categories() {
            let path = dir.join(cfg.translation_file(category));
            if !path.is_file() {
                continue;
            }
            let previous = Mapping::load(category, &path)?;
            let added = self.seed(category, &previous)?;
            debug!("Seeded {} {} pairs from {}", added, category, path.display());
            total += added;
        }
        Ok(total)
    }

    /// Scrubs one line (without its terminator). Categories run in
    /// [`Category::ORDER`]; each one sees the output of the previous ones and
    /// replaces exactly the spans its matcher found. Matches touching a fake
    /// written by an earlier category are left alone.
    pub fn scrub_line(&mut self, line: &str) -> Result<LineOutcome> {
        let mut current = line.to_string();
        let mut deltas = Deltas::default();
        // sorted, disjoint spans of `current` that hold fakes
        let mut written: Vec<Range<usize>> = Vec::new();
        for category in Category::ORDER {
            let Some(slot) = self.slots.get_mut(&category) else { continue };
            let spans: Vec<Range<usize>> = slot
                .matcher
                .find(&current)
                .into_iter()
                .filter(|s| !written.iter().any(|w| s.start < w.end && w.start < s.end))
                .collect();
            if spans.is_empty() {
                continue;
            }
            let mut out = String::with_capacity(current.len());
            let mut moved: Vec<Range<usize>> = Vec::with_capacity(written.len() + spans.len());
            let mut pending = written.iter().peekable();
            let mut last = 0usize;
            for span in spans {
                let base = out.len();
                out.push_str(&current[last..span.start]);
                while let Some(w) = pending.next_if(|w| w.end <= span.start) {
                    moved.push(base + (w.start - last)..base + (w.end - last));
                }
                let token = &current[span.clone()];
                if slot.mapper.is_exempt(token) {
                    out.push_str(token);
                } else {
                    let fake = slot.mapper.resolve(token)?;
                    deltas.record(category, token, &fake);
                    let start = out.len();
                    out.push_str(&fake);
                    moved.push(start..out.len());
                }
                last = span.end;
            }
            let base = out.len();
            out.push_str(&current[last..]);
            for w in pending {
                moved.push(base + (w.start - last)..base + (w.end - last));
            }
            written = moved;
            current = out;
        }
        Ok(LineOutcome { line: current, deltas })
    }
}

impl Default for ScrubEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{Deltas, ScrubEngine};
    use crate::category::Category;
    use crate::config::ScrubConfig;
    use crate::error::ScrubError;
    use crate::extractor::{LiteralMatcher, PatternMatcher};
    use crate::mapper::{Exemption, FakeFormat, IdentifierMapper};
    use std::fs;

    fn engine(cfg_json: &str) -> ScrubEngine {
        ScrubEngine::from_config(&ScrubConfig::from_json(cfg_json).unwrap()).unwrap()
    }

    #[test]
    fn test_private_ip_kept_public_ip_replaced() {
        let mut e = engine("{}");
        let out = e.scrub_line("Connect to 10.0.0.1 and 8.8.8.8").unwrap();
        assert_eq!(out.line, "Connect to 10.0.0.1 and 42.42.0.1");
        let ips = out.deltas.get(Category::Ip).unwrap();
        assert_eq!(ips.len(), 1);
        assert_eq!(ips.get("8.8.8.8").map(String::as_str), Some("42.42.0.1"));
    }

    #[test]
    fn test_repeated_token_replaced_everywhere() {
        let mut e = engine("{}");
        let out = e.scrub_line("8.8.8.8 -> 1.1.1.1 -> 8.8.8.8").unwrap();
        assert_eq!(out.line, "42.42.0.1 -> 42.42.0.2 -> 42.42.0.1");
    }

    #[test]
    fn test_exempt_only_line_unchanged_with_no_deltas() {
        let mut e = engine("{}");
        let out = e.scrub_line("gateway 172.16.0.5").unwrap();
        assert_eq!(out.line, "gateway 172.16.0.5");
        assert!(out.deltas.is_empty());
        assert!(e.mapping(Category::Ip).unwrap().is_empty());
    }

    #[test]
    fn test_substring_of_other_address_untouched() {
        // plain string replacement of 1.2.3.4 would corrupt 11.2.3.45
        let mut e = engine("{}");
        let out = e.scrub_line("11.2.3.45 1.2.3.4").unwrap();
        assert_eq!(out.line, "42.42.0.1 42.42.0.2");
        let ips = out.deltas.get(Category::Ip).unwrap();
        assert_eq!(ips.get("11.2.3.45").map(String::as_str), Some("42.42.0.1"));
        assert_eq!(ips.get("1.2.3.4").map(String::as_str), Some("42.42.0.2"));
    }

    #[test]
    fn test_categories_compose_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let kw = dir.path().join("keywords.txt");
        fs::write(&kw, "acme\n").unwrap();
        let cfg = format!(
            r#"{{
              "obfuscate_domain": true,
              "obfuscate_hostname": true,
              "obfuscate_username": true,
              "use_key_words_file": true,
              "key_words_file": {:?},
              "hostnames": ["web01"],
              "usernames": ["alice"]
            }}"#,
            kw
        );
        let mut e = engine(&cfg);
        let out = e
            .scrub_line("alice@web01 (acme) resolved web01.corp.example.com to 8.8.8.8 via localhost")
            .unwrap();
        assert_eq!(
            out.line,
            "user-1@hostname-1 (keyword-1) resolved domain-1.scrubbed to 42.42.0.1 via localhost"
        );
        assert_eq!(out.deltas.iter().count(), 5);
    }

    #[test]
    fn test_fakes_of_earlier_categories_are_not_rescrubbed() {
        let mut e = engine(r#"{"obfuscate_hostname": true, "hostnames": ["web01", "db01"], "usernames": ["hostname", "scrubbed"], "obfuscate_username": true, "obfuscate_domain": true}"#);
        let out = e.scrub_line("web01 talks to db01 at corp.example.com, hostname is web01").unwrap();
        assert_eq!(out.line, "hostname-1 talks to hostname-2 at domain-1.scrubbed, user-1 is hostname-1");
        assert_eq!(out.deltas.get(Category::User).unwrap().len(), 1);
        assert_eq!(out.deltas.get(Category::User).unwrap().get("hostname").map(String::as_str), Some("user-1"));
    }

    #[test]
    fn test_keyword_not_replaced_inside_words() {
        let matcher = LiteralMatcher::new(["acme"]);
        let mapper = IdentifierMapper::new(Category::Keyword, Exemption::Nothing, FakeFormat::for_category(Category::Keyword));
        let mut e = ScrubEngine::new().with_category(Box::new(matcher), mapper);
        let out = e.scrub_line("acmetool by acme").unwrap();
        assert_eq!(out.line, "acmetool by keyword-1");
    }

    #[test]
    fn test_disabled_category_is_not_scrubbed() {
        let mut e = engine(r#"{"obfuscate_public_ip": false}"#);
        assert!(e.categories().is_empty());
        let out = e.scrub_line("8.8.8.8").unwrap();
        assert_eq!(out.line, "8.8.8.8");
        assert_eq!(e.resolve(Category::Ip, "8.8.8.8").unwrap(), "8.8.8.8");
    }

    #[test]
    fn test_missing_keyword_source_is_fatal() {
        let cfg = ScrubConfig::from_json(r#"{"use_key_words_file": true}"#).unwrap();
        assert!(matches!(ScrubEngine::from_config(&cfg), Err(ScrubError::Config(_))));

        let cfg = ScrubConfig::from_json(r#"{"use_key_words_file": true, "key_words_file": "/nonexistent/kw.txt"}"#).unwrap();
        let err = ScrubEngine::from_config(&cfg).err().unwrap();
        assert!(matches!(err, ScrubError::WordList { .. }));
        assert!(err.is_fatal());

        let cfg = ScrubConfig::from_json(r#"{"obfuscate_username": true}"#).unwrap();
        assert!(ScrubEngine::from_config(&cfg).is_err());
    }

    #[test]
    fn test_custom_pattern_category() {
        let matcher = PatternMatcher::new(r"\bsrv-[0-9]+\b").unwrap();
        let mapper = IdentifierMapper::new(Category::Hostname, Exemption::Nothing, FakeFormat::sequence("host-", ""));
        let mut e = ScrubEngine::new().with_category(Box::new(matcher), mapper);
        assert_eq!(e.scrub_line("srv-12 and srv-7").unwrap().line, "host-1 and host-2");
    }

    #[test]
    fn test_deltas_merge() {
        let mut a = Deltas::default();
        a.record(Category::Ip, "8.8.8.8", "42.42.0.1");
        let mut b = Deltas::default();
        b.record(Category::Ip, "8.8.8.8", "42.42.0.1");
        b.record(Category::User, "alice", "user-1");
        a.merge(b).unwrap();
        assert_eq!(a.get(Category::User).unwrap().len(), 1);

        let mut c = Deltas::default();
        c.record(Category::Ip, "8.8.8.8", "42.42.0.9");
        assert!(matches!(a.merge(c), Err(ScrubError::Inconsistent { .. })));
    }
}
