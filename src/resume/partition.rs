//! Date partitions
//!
//! A date partition is the part of a path below a product directory that
//! encodes a publication date. Two layouts occur on the remote tree:
//!
//! ```text
//! /free/prod195/2023/01/03/file.zip     nested  YYYY/MM/DD
//! /free/prodABC/2024-01-10/a.csv        single  YYYY-MM-DD
//! ```
//!
//! Directories above the day level (`/free/prod195/2023`) carry a partial
//! partition. Partitions are parsed into numbers, so ordering never depends
//! on string formatting; `Display` renders the fixed-width form.

use chrono::{Datelike, NaiveDate};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// How much of a date a partition carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Precision {
    Year,
    Month,
    Day,
}

/// A full or partial date partition
///
/// Ordering is chronological, with a coarser prefix sorting before any
/// finer partition it contains (`2023` < `2023-01` < `2023-01-01`), the same
/// order as the fixed-width strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DatePrefix {
    year: i32,
    month: Option<u32>,
    day: Option<u32>,
}

impl DatePrefix {
    pub fn year(year: i32) -> Self {
        Self {
            year,
            month: None,
            day: None,
        }
    }

    /// Year and month; `None` if the month is out of range
    pub fn month(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self {
            year,
            month: Some(month),
            day: None,
        })
    }

    pub fn day(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: Some(date.month()),
            day: Some(date.day()),
        }
    }

    pub fn precision(&self) -> Precision {
        match (self.month, self.day) {
            (_, Some(_)) => Precision::Day,
            (Some(_), None) => Precision::Month,
            (None, None) => Precision::Year,
        }
    }

    /// Drop components finer than `precision`
    pub fn truncate(&self, precision: Precision) -> Self {
        match precision {
            Precision::Year => Self::year(self.year),
            Precision::Month => Self {
                day: None,
                ..*self
            },
            Precision::Day => *self,
        }
    }

    /// Compare on the components both partitions carry
    pub fn cmp_shared(&self, other: &Self) -> Ordering {
        let shared = self.precision().min(other.precision());
        self.truncate(shared).cmp(&other.truncate(shared))
    }

    /// Whether this partition lies strictly before `boundary`
    ///
    /// `2024-02` is before `2024-03-01`; `2024-03` is not, since it contains
    /// the boundary day.
    pub fn is_before(&self, boundary: &Self) -> bool {
        self.cmp_shared(boundary) == Ordering::Less
    }

    /// Parse the partition at the start of `segments`
    ///
    /// Accepts a single `YYYY-MM-DD` (or `YYYY-MM`) segment, or consecutive
    /// `YYYY`, `MM`, `DD` segments. Returns `None` if the first segment is
    /// not a date.
    pub fn from_segments(segments: &[&str]) -> Option<Self> {
        let first = *segments.first()?;

        if first.len() > 4 {
            return first.parse().ok();
        }

        let year = parse_digits(first, 4)? as i32;
        let mut prefix = Self::year(year);

        let Some(month) = segments.get(1).and_then(|s| parse_digits(s, 2)) else {
            return Some(prefix);
        };
        let Some(with_month) = Self::month(year, month) else {
            return Some(prefix);
        };
        prefix = with_month;

        if let Some(date) = segments
            .get(2)
            .and_then(|s| parse_digits(s, 2))
            .and_then(|day| NaiveDate::from_ymd_opt(year, month, day))
        {
            prefix = Self::day(date);
        }

        Some(prefix)
    }
}

fn parse_digits(segment: &str, width: usize) -> Option<u32> {
    if segment.len() == width && segment.bytes().all(|b| b.is_ascii_digit()) {
        segment.parse().ok()
    } else {
        None
    }
}

impl fmt::Display for DatePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.year)?;
        if let Some(month) = self.month {
            write!(f, "-{:02}", month)?;
        }
        if let Some(day) = self.day {
            write!(f, "-{:02}", day)?;
        }
        Ok(())
    }
}

/// Error for strings that are not `YYYY`, `YYYY-MM` or `YYYY-MM-DD`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidPartition(pub String);

impl fmt::Display for InvalidPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not a date partition: '{}'", self.0)
    }
}

impl std::error::Error for InvalidPartition {}

impl FromStr for DatePrefix {
    type Err = InvalidPartition;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidPartition(s.to_string());
        let parts: Vec<&str> = s.split('-').collect();

        let year = parse_digits(parts[0], 4).ok_or_else(invalid)? as i32;
        match parts.len() {
            1 => Ok(Self::year(year)),
            2 => {
                let month = parse_digits(parts[1], 2).ok_or_else(invalid)?;
                Self::month(year, month).ok_or_else(invalid)
            }
            3 => {
                let month = parse_digits(parts[1], 2).ok_or_else(invalid)?;
                let day = parse_digits(parts[2], 2).ok_or_else(invalid)?;
                NaiveDate::from_ymd_opt(year, month, day)
                    .map(Self::day)
                    .ok_or_else(invalid)
            }
            _ => Err(invalid()),
        }
    }
}
