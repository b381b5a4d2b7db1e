// reportscrub_core: pure Rust library that replaces public IPs, domains, hostnames,
// user names and keywords in extracted report files with stable fake values.
pub mod category;
pub mod config;
pub mod error;
pub mod extractor;
pub mod file;
pub mod mapper;
pub mod run;
pub mod scrubber;
pub mod wordlist;

pub use category::Category;
pub use config::ScrubConfig;
pub use error::{Result, ScrubError};
pub use extractor::{extract, LiteralMatcher, PatternMatcher, TokenMatcher, DOMAIN_PATTERN, IP_PATTERN};
pub use file::{process_file, scrub_text, FileOutcome, BANNER};
pub use mapper::{Exemption, FakeFormat, IdentifierMapper, Ipv4Block, Mapping};
pub use run::{collect_files, run, RunReport, RunTotals};
pub use scrubber::{Deltas, LineOutcome, ScrubEngine};
pub use wordlist::{load_word_list, parse_word_list};

/// Builds a matcher for pure extraction of one category's tokens, as configured
/// in `cfg`. List files named by the config are read from disk.
pub fn matcher_for(category: Category, cfg: &ScrubConfig) -> Result<Box<dyn TokenMatcher>> {
    let matcher: Box<dyn TokenMatcher> = match category {
        Category::Ip => Box::new(PatternMatcher::ip()),
        Category::Domain => Box::new(PatternMatcher::domain()),
        Category::Keyword | Category::Hostname | Category::User => Box::new(LiteralMatcher::new(cfg.words(category)?)),
    };
    Ok(matcher)
}
