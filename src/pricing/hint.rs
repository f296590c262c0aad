//! Resolution hints: which venue last priced a token.
//!
//! Hints are persisted on the token as opaque strings:
//! - `stable`
//! - `base:<pair>`
//! - `v2:<pair>:<base>`
//! - `v3:<pool>:<base>`
//! - `lp:<seg0>|<seg1>|...` for composite tokens, one segment per constituent

use crate::domain::Address;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Hint {
    #[default]
    Empty,
    Stable,
    Base {
        pair: Address,
    },
    V2 {
        pair: Address,
        base: Address,
    },
    V3 {
        pool: Address,
        base: Address,
    },
    Composite(Vec<Hint>),
}

impl Hint {
    pub fn is_empty(&self) -> bool {
        matches!(self, Hint::Empty)
    }

    /// Hint for the i-th constituent of a composite token.
    pub fn segment(&self, index: usize) -> Option<&Hint> {
        match self {
            Hint::Composite(segments) => segments.get(index).filter(|h| !h.is_empty()),
            _ => None,
        }
    }

    /// Lenient parse: anything unrecognized is treated as no hint.
    pub fn parse(s: &str) -> Hint {
        s.parse().unwrap_or_default()
    }
}

impl fmt::Display for Hint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hint::Empty => Ok(()),
            Hint::Stable => f.write_str("stable"),
            Hint::Base { pair } => write!(f, "base:{}", pair),
            Hint::V2 { pair, base } => write!(f, "v2:{}:{}", pair, base),
            Hint::V3 { pool, base } => write!(f, "v3:{}:{}", pool, base),
            Hint::Composite(segments) => {
                f.write_str("lp:")?;
                for (i, segment) in segments.iter().enumerate() {
                    if i > 0 {
                        f.write_str("|")?;
                    }
                    write!(f, "{}", segment)?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid hint: {0}")]
pub struct HintParseError(pub String);

impl FromStr for Hint {
    type Err = HintParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Hint::Empty);
        }
        if s == "stable" {
            return Ok(Hint::Stable);
        }
        if let Some(rest) = s.strip_prefix("lp:") {
            let segments = rest
                .split('|')
                .map(|seg| {
                    if seg.starts_with("lp:") {
                        Err(HintParseError(s.to_string()))
                    } else {
                        seg.parse()
                    }
                })
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Hint::Composite(segments));
        }

        let parts: Vec<&str> = s.split(':').collect();
        match parts.as_slice() {
            ["base", pair] if !pair.is_empty() => Ok(Hint::Base {
                pair: Address::new(*pair),
            }),
            ["v2", pair, base] if !pair.is_empty() && !base.is_empty() => Ok(Hint::V2 {
                pair: Address::new(*pair),
                base: Address::new(*base),
            }),
            ["v3", pool, base] if !pool.is_empty() && !base.is_empty() => Ok(Hint::V3 {
                pool: Address::new(*pool),
                base: Address::new(*base),
            }),
            _ => Err(HintParseError(s.to_string())),
        }
    }
}
