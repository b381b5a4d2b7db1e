// category.rs: the closed set of sensitive token categories
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Ip,
    Keyword,
    Domain,
    Hostname,
    User,
}

impl Category {
    /// Processing order of the line scrubber. Later categories see the output
    /// of earlier ones.
    pub const ORDER: [Category; 5] = [
        Category::Ip,
        Category::Keyword,
        Category::Domain,
        Category::Hostname,
        Category::User,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Ip => "ip",
            Category::Keyword => "keyword",
            Category::Domain => "domain",
            Category::Hostname => "hostname",
            Category::User => "user",
        }
    }

    /// Default file name of the persisted mapping for this category.
    pub fn translation_file(&self) -> String {
        format!("{}_translation.json", self.as_str())
    }

    pub fn parse(name: &str) -> Option<Category> {
        let name = name.trim().to_ascii_lowercase();
        Category::ORDER.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
