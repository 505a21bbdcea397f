use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FinancialYearError {
    #[error("financial year must look like 2023-2024, got {0:?}")]
    Malformed(String),

    #[error("financial year must span consecutive years, got {start}-{end}")]
    NotConsecutive { start: u16, end: u16 },
}

/// An Indian financial year (April to March), written `2023-2024`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FinancialYear {
    start: u16,
}

impl FinancialYear {
    #[must_use]
    pub fn starting(start: u16) -> Self {
        Self { start }
    }

    #[must_use]
    pub fn start_year(self) -> u16 {
        self.start
    }

    #[must_use]
    pub fn end_year(self) -> u16 {
        self.start.saturating_add(1)
    }
}

impl fmt::Display for FinancialYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end_year())
    }
}

impl FromStr for FinancialYear {
    type Err = FinancialYearError;

    /// Accepts `2023-2024` and the short form `2023-24`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || FinancialYearError::Malformed(s.to_owned());
        let (start_raw, end_raw) = s.trim().split_once('-').ok_or_else(malformed)?;
        if start_raw.len() != 4 || !matches!(end_raw.len(), 2 | 4) {
            return Err(malformed());
        }
        let start: u16 = start_raw.parse().map_err(|_| malformed())?;
        let end: u16 = end_raw.parse().map_err(|_| malformed())?;
        let end = if end_raw.len() == 2 {
            start / 100 * 100 + end
        } else {
            end
        };

        if end != start.saturating_add(1) {
            return Err(FinancialYearError::NotConsecutive { start, end });
        }
        Ok(Self { start })
    }
}

impl Serialize for FinancialYear {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FinancialYear {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
