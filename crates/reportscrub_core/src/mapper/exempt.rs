// mapper/exempt.rs: exemption rules and IPv4 block arithmetic
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::ScrubError;

/// An IPv4 CIDR block such as `172.16.0.0/12`. A bare address is a `/32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Block {
    base: u32,
    prefix: u8,
}

impl Ipv4Block {
    pub fn new(addr: Ipv4Addr, prefix: u8) -> Result<Self, ScrubError> {
        if prefix > 32 {
            return Err(ScrubError::Config(format!("CIDR prefix /{} is longer than 32 bits", prefix)));
        }
        Ok(Self { base: u32::from(addr) & Self::netmask(prefix), prefix })
    }

    fn netmask(prefix: u8) -> u32 {
        if prefix == 0 { 0 } else { u32::MAX << (32 - prefix as u32) }
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & Self::netmask(self.prefix) == self.base
    }

    /// Number of addresses in the block.
    pub fn size(&self) -> u64 {
        1u64 << (32 - self.prefix as u32)
    }

    /// The `offset`-th address of the block, counting the network address as 0.
    pub fn nth(&self, offset: u64) -> Option<Ipv4Addr> {
        if offset >= self.size() {
            return None;
        }
        Some(Ipv4Addr::from(self.base + offset as u32))
    }
}

impl FromStr for Ipv4Block {
    type Err = ScrubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (addr, prefix) = match s.split_once('/') {
            Some((a, p)) => {
                let prefix = p
                    .parse::<u8>()
                    .map_err(|_| ScrubError::Config(format!("Invalid CIDR prefix in {:?}", s)))?;
                (a, prefix)
            }
            None => (s, 32),
        };
        let addr = addr
            .parse::<Ipv4Addr>()
            .map_err(|_| ScrubError::Config(format!("Invalid IPv4 address in {:?}", s)))?;
        Ipv4Block::new(addr, prefix)
    }
}

impl fmt::Display for Ipv4Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", Ipv4Addr::from(self.base), self.prefix)
    }
}

/// Tokens an identifier mapper passes through unchanged. The decision only
/// depends on the token text.
#[derive(Debug, Clone, Default)]
pub enum Exemption {
    #[default]
    Nothing,
    /// Addresses inside any of these blocks are kept as they are.
    IpBlocks(Vec<Ipv4Block>),
    /// Domains equal to, or below, any of these suffixes are kept.
    DomainSuffixes(Vec<String>),
}

impl Exemption {
    pub fn domain_suffixes<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let list = suffixes
            .into_iter()
            .map(|s| s.as_ref().trim().trim_matches('.').to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        Exemption::DomainSuffixes(list)
    }

    pub fn is_exempt(&self, token: &str) -> bool {
        match self {
            Exemption::Nothing => false,
            Exemption::IpBlocks(blocks) => match token.parse::<Ipv4Addr>() {
                Ok(addr) => blocks.iter().any(|b| b.contains(addr)),
                Err(_) => false,
            },
            Exemption::DomainSuffixes(suffixes) => {
                let token = token.to_ascii_lowercase();
                suffixes.iter().any(|suffix| {
                    token == *suffix
                        || (token.ends_with(suffix.as_str())
                            && token[..token.len() - suffix.len()].ends_with('.'))
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Exemption, Ipv4Block};
    use std::net::Ipv4Addr;

    fn private() -> Exemption {
        let blocks = ["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16"]
            .iter()
            .map(|s| s.parse::<Ipv4Block>().unwrap())
            .collect();
        Exemption::IpBlocks(blocks)
    }

    #[test]
    fn test_block_parse_and_contains() {
        let b: Ipv4Block = "172.16.0.0/12".parse().unwrap();
        assert!(b.contains(Ipv4Addr::new(172, 16, 0, 5)));
        assert!(b.contains(Ipv4Addr::new(172, 31, 255, 255)));
        assert!(!b.contains(Ipv4Addr::new(172, 32, 0, 1)));
        assert_eq!(b.to_string(), "172.16.0.0/12");

        // host bits are masked off
        let b: Ipv4Block = "42.42.7.9/16".parse().unwrap();
        assert_eq!(b.to_string(), "42.42.0.0/16");
        assert_eq!(b.size(), 65536);

        let single: Ipv4Block = "8.8.8.8".parse().unwrap();
        assert_eq!(single.size(), 1);
        assert!("10.0.0.0/33".parse::<Ipv4Block>().is_err());
        assert!("10.0.0/8".parse::<Ipv4Block>().is_err());
    }

    #[test]
    fn test_block_nth() {
        let b: Ipv4Block = "42.42.0.0/16".parse().unwrap();
        assert_eq!(b.nth(1), Some(Ipv4Addr::new(42, 42, 0, 1)));
        assert_eq!(b.nth(256), Some(Ipv4Addr::new(42, 42, 1, 0)));
        assert_eq!(b.nth(65535), Some(Ipv4Addr::new(42, 42, 255, 255)));
        assert_eq!(b.nth(65536), None);
        let all: Ipv4Block = "0.0.0.0/0".parse().unwrap();
        assert_eq!(all.size(), 1 << 32);
    }

    #[test]
    fn test_ip_exemption() {
        let ex = private();
        assert!(ex.is_exempt("172.16.0.5"));
        assert!(ex.is_exempt("10.0.0.1"));
        assert!(ex.is_exempt("192.168.1.100"));
        assert!(!ex.is_exempt("8.8.8.8"));
        // not a real address, never exempt
        assert!(!ex.is_exempt("999.999.999.999"));
    }

    #[test]
    fn test_domain_exemption() {
        let ex = Exemption::domain_suffixes(["localdomain", ".Localhost."]);
        assert!(ex.is_exempt("localhost"));
        assert!(ex.is_exempt("db.LOCALDOMAIN"));
        assert!(!ex.is_exempt("notlocaldomain"));
        assert!(!ex.is_exempt("example.com"));
        assert!(!Exemption::Nothing.is_exempt("anything"));
    }
}
