// mapper/table.rs: bijective translation tables and the per-category mapper
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use super::exempt::{Exemption, Ipv4Block};
use crate::category::Category;
use crate::error::{Result, ScrubError};

/// Original -> fake translation table of one category. No two originals share
/// a fake value, and a stored pair never changes.
#[derive(Debug, Clone)]
pub struct Mapping {
    category: Category,
    forward: BTreeMap<String, String>,
    issued: HashSet<String>,
}

impl Mapping {
    pub fn new(category: Category) -> Self {
        Self { category, forward: BTreeMap::new(), issued: HashSet::new() }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn get(&self, original: &str) -> Option<&str> {
        self.forward.get(original).map(String::as_str)
    }

    pub fn is_issued(&self, fake: &str) -> bool {
        self.issued.contains(fake)
    }

    /// Stores a pair. Returns `false` when the exact pair was already present.
    pub fn insert(&mut self, original: &str, fake: &str) -> Result<bool> {
        if let Some(existing) = self.forward.get(original) {
            if existing == fake {
                return Ok(false);
            }
            return Err(ScrubError::Inconsistent { category: self.category, original: original.to_string() });
        }
        if self.issued.contains(fake) {
            return Err(ScrubError::Collision { category: self.category, fake: fake.to_string() });
        }
        self.issued.insert(fake.to_string());
        self.forward.insert(original.to_string(), fake.to_string());
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.forward.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.forward
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.forward)?)
    }

    /// Parses a persisted table, rejecting documents where two originals share
    /// a fake value.
    pub fn from_json(category: Category, json: &str) -> Result<Self> {
        let pairs: BTreeMap<String, String> = serde_json::from_str(json)?;
        let mut mapping = Mapping::new(category);
        for (original, fake) in &pairs {
            mapping.insert(original, fake)?;
        }
        Ok(mapping)
    }

    pub fn load(category: Category, path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|e| ScrubError::io(path, e))?;
        Self::from_json(category, &data)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut data = self.to_json()?;
        data.push('\n');
        fs::write(path, data).map_err(|e| ScrubError::io(path, e))
    }
}

/// How fresh fake values of a category are spelled.
#[derive(Debug, Clone)]
pub enum FakeFormat {
    /// Walks the addresses of a block, skipping its network address.
    IpBlock(Ipv4Block),
    /// `<prefix><n><suffix>` with `n` counting from 1.
    Sequence { prefix: String, suffix: String },
}

impl FakeFormat {
    pub fn sequence(prefix: &str, suffix: &str) -> Self {
        FakeFormat::Sequence { prefix: prefix.to_string(), suffix: suffix.to_string() }
    }

    /// Default format for a category.
    pub fn for_category(category: Category) -> Self {
        match category {
            Category::Ip => FakeFormat::IpBlock(Ipv4Block::new([42, 42, 0, 0].into(), 16).expect("/16 is a valid prefix")),
            Category::Domain => FakeFormat::sequence("domain-", ".scrubbed"),
            Category::Hostname => FakeFormat::sequence("hostname-", ""),
            Category::User => FakeFormat::sequence("user-", ""),
            Category::Keyword => FakeFormat::sequence("keyword-", ""),
        }
    }

    /// Candidate for the `index`-th allocation, or `None` once the format has
    /// no values left.
    pub fn candidate(&self, index: u64) -> Option<String> {
        let n = index.checked_add(1)?;
        match self {
            FakeFormat::IpBlock(block) => block.nth(n).map(|a| a.to_string()),
            FakeFormat::Sequence { prefix, suffix } => Some(format!("{}{}{}", prefix, n, suffix)),
        }
    }
}

/// Owns one category's translation table and allocates fake values for it.
#[derive(Debug, Clone)]
pub struct IdentifierMapper {
    mapping: Mapping,
    exemption: Exemption,
    format: FakeFormat,
    next_index: u64,
}

impl IdentifierMapper {
    pub fn new(category: Category, exemption: Exemption, format: FakeFormat) -> Self {
        Self { mapping: Mapping::new(category), exemption, format, next_index: 0 }
    }

    pub fn category(&self) -> Category {
        self.mapping.category()
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn is_exempt(&self, token: &str) -> bool {
        self.exemption.is_exempt(token)
    }

    /// Fake value for `original`; exempt tokens come back unchanged and are not
    /// recorded.
    pub fn resolve(&mut self, original: &str) -> Result<String> {
        if self.is_exempt(original) {
            return Ok(original.to_string());
        }
        if let Some(fake) = self.mapping.get(original) {
            return Ok(fake.to_string());
        }
        let fake = self.next_fake(original)?;
        self.mapping.insert(original, &fake)?;
        Ok(fake)
    }

    // a real value that falls inside the fake space never maps to itself
    fn next_fake(&mut self, original: &str) -> Result<String> {
        loop {
            let candidate = self
                .format
                .candidate(self.next_index)
                .ok_or(ScrubError::Exhausted { category: self.mapping.category() })?;
            self.next_index += 1;
            if candidate == original || self.mapping.is_issued(&candidate) || self.exemption.is_exempt(&candidate) {
                continue;
            }
            return Ok(candidate);
        }
    }

    /// Preloads pairs from an earlier run so their fakes are reused and never
    /// issued again.
    pub fn seed(&mut self, previous: &Mapping) -> Result<usize> {
        let mut added = 0;
        for (original, fake) in previous.iter() {
            if self.mapping.insert(original, fake)? {
                added += 1;
            }
        }
        Ok(added)
    }
}
