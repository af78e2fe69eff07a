//! Shared types used across synthpro.
//! Includes `Calendar`, the `Tile` and `PeriodKey` identifiers, and the
//! composite `Band` order.
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Calendar in which synthesis periods are counted.
#[derive(
    Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize,
)]
pub enum Calendar {
    /// Solar Hijri months (Farvardin..Esfand)
    #[default]
    Persian,
    Gregorian,
}

impl std::fmt::Display for Calendar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Calendar::Persian => write!(f, "Persian"),
            Calendar::Gregorian => write!(f, "Gregorian"),
        }
    }
}

/// Archive tile: the name of a first-level directory under the L2/L3 roots.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Tile(String);

impl Tile {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Tile(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<std::path::Path> for Tile {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(&self.0)
    }
}

impl std::fmt::Display for Tile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Year and month of a synthesis period in the target calendar. Rendered `YYYYMM`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct PeriodKey {
    pub year: i32,
    pub month: u32,
}

impl PeriodKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) && (0..=9999).contains(&year) {
            Some(PeriodKey { year, month })
        } else {
            None
        }
    }
}

impl std::fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

impl FromStr for PeriodKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::malformed(s, "expected YYYYMM"));
        }
        let year: i32 = s[..4].parse().map_err(|e| Error::malformed(s, e))?;
        let month: u32 = s[4..].parse().map_err(|e| Error::malformed(s, e))?;
        PeriodKey::new(year, month).ok_or_else(|| Error::malformed(s, "month out of range"))
    }
}

/// Composite bands, in the order they are stacked.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub enum Band {
    Blue,
    Green,
    Red,
    Nir,
}

impl Band {
    pub const STACK_ORDER: [Band; 4] = [Band::Blue, Band::Green, Band::Red, Band::Nir];

    /// Trailing filename token of the band raster in an L3 product.
    pub fn token(&self) -> &'static str {
        match self {
            Band::Blue => "B2",
            Band::Green => "B3",
            Band::Red => "B4",
            Band::Nir => "B8",
        }
    }
}

impl std::fmt::Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_key_renders_and_parses_yyyymm() {
        let key: PeriodKey = "140301".parse().unwrap();
        assert_eq!(key, PeriodKey { year: 1403, month: 1 });
        assert_eq!(key.to_string(), "140301");
    }

    #[test]
    fn period_key_rejects_bad_month() {
        assert!("202413".parse::<PeriodKey>().is_err());
        assert!("2024-1".parse::<PeriodKey>().is_err());
    }

    #[test]
    fn period_keys_order_chronologically() {
        let a: PeriodKey = "140212".parse().unwrap();
        let b: PeriodKey = "140301".parse().unwrap();
        assert!(a < b);
    }
}
