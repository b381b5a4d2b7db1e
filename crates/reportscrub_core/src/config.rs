// config.rs: scrubbing options
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::category::Category;
use crate::error::{Result, ScrubError};
use crate::mapper::Ipv4Block;
use crate::wordlist::load_word_list;

fn yes() -> bool { true }

fn default_private_ip_ranges() -> Vec<String> {
    ["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16", "127.0.0.0/8"].iter().map(|s| s.to_string()).collect()
}

fn default_fake_ip_block() -> String { "42.42.0.0/16".to_string() }

fn default_exempt_domains() -> Vec<String> { vec!["localhost".to_string(), "localdomain".to_string()] }

fn default_exclude_files() -> Vec<String> { vec!["memory.txt".to_string(), "env.txt".to_string()] }

#[derive(Deserialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct ScrubConfig {
    pub version: Option<u32>,
    #[serde(default = "yes")]
    pub obfuscate_public_ip: bool,
    #[serde(default)]
    pub obfuscate_domain: bool,
    #[serde(default)]
    pub obfuscate_hostname: bool,
    #[serde(default)]
    pub obfuscate_username: bool,
    #[serde(default)]
    pub use_key_words_file: bool,
    pub key_words_file: Option<PathBuf>,
    #[serde(default)]
    pub hostnames: Vec<String>,
    pub hostnames_file: Option<PathBuf>,
    #[serde(default)]
    pub usernames: Vec<String>,
    pub usernames_file: Option<PathBuf>,
    #[serde(default = "default_private_ip_ranges")]
    pub private_ip_ranges: Vec<String>,
    #[serde(default = "default_fake_ip_block")]
    pub fake_ip_block: String,
    #[serde(default = "default_exempt_domains")]
    pub exempt_domains: Vec<String>,
    #[serde(default = "default_exclude_files")]
    pub exclude_files: Vec<String>,
    /// Overrides of the persisted mapping file names, keyed by category.
    #[serde(default)]
    pub translation_files: BTreeMap<Category, String>,
}

impl Default for ScrubConfig {
    fn default() -> Self {
        Self {
            version: Some(1),
            obfuscate_public_ip: true,
            obfuscate_domain: false,
            obfuscate_hostname: false,
            obfuscate_username: false,
            use_key_words_file: false,
            key_words_file: None,
            hostnames: Vec::new(),
            hostnames_file: None,
            usernames: Vec::new(),
            usernames_file: None,
            private_ip_ranges: default_private_ip_ranges(),
            fake_ip_block: default_fake_ip_block(),
            exempt_domains: default_exempt_domains(),
            exclude_files: default_exclude_files(),
            translation_files: BTreeMap::new(),
        }
    }
}

impl ScrubConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: ScrubConfig = serde_json::from_str(json)?;
        if let Some(v) = cfg.version {
            if v != 1 {
                return Err(ScrubError::Config(format!("Unsupported config version: {}", v)));
            }
        }
        // surface bad blocks now rather than at engine construction
        cfg.private_blocks()?;
        cfg.fake_block()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|e| ScrubError::io(path, e))?;
        Self::from_json(&data)
    }

    pub fn is_enabled(&self, category: Category) -> bool {
        match category {
            Category::Ip => self.obfuscate_public_ip,
            Category::Keyword => self.use_key_words_file,
            Category::Domain => self.obfuscate_domain,
            Category::Hostname => self.obfuscate_hostname,
            Category::User => self.obfuscate_username,
        }
    }

    pub fn enabled_categories(&self) -> Vec<Category> {
        Category::ORDER.into_iter().filter(|c| self.is_enabled(*c)).collect()
    }

    pub fn private_blocks(&self) -> Result<Vec<Ipv4Block>> {
        self.private_ip_ranges.iter().map(|s| s.parse()).collect()
    }

    pub fn fake_block(&self) -> Result<Ipv4Block> {
        self.fake_ip_block.parse()
    }

    /// Literal words of a list-driven category: inline entries followed by the
    /// entries of its list file. Pattern-driven categories have none.
    pub fn words(&self, category: Category) -> Result<Vec<String>> {
        let (mut words, file) = match category {
            Category::Keyword => (Vec::new(), self.key_words_file.as_deref()),
            Category::Hostname => (self.hostnames.clone(), self.hostnames_file.as_deref()),
            Category::User => (self.usernames.clone(), self.usernames_file.as_deref()),
            Category::Ip | Category::Domain => return Ok(Vec::new()),
        };
        if let Some(path) = file {
            words.extend(load_word_list(path)?);
        }
        Ok(words)
    }

    pub fn translation_file(&self, category: Category) -> String {
        self.translation_files.get(&category).cloned().unwrap_or_else(|| category.translation_file())
    }
}
