//! Date bucket granularity for timed log file names

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use sitekit_core::{Error, Result};

/// Accepted bucket format shapes: `Y`, `Y<sep>m`, `Y<sep>m<sep>d`, where each
/// separator is independently one of `- / _ .` or omitted
static BUCKET_FORMAT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Y(([/_.-]?m)([/_.-]?d)?)?$").expect("Invalid bucket format regex"));

/// Time resolution at which log files are split
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBucket {
    /// One file per year (`YYYY`)
    Yearly,
    /// One file per month (`YYYY<sep>MM`)
    Monthly { sep: Option<char> },
    /// One file per day (`YYYY<sep>MM<sep>DD`)
    Daily {
        sep_month: Option<char>,
        sep_day: Option<char>,
    },
}

impl Default for DateBucket {
    fn default() -> Self {
        DateBucket::Daily {
            sep_month: Some('-'),
            sep_day: Some('-'),
        }
    }
}

impl FromStr for DateBucket {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if !BUCKET_FORMAT_REGEX.is_match(s) {
            return Err(Error::InvalidDateFormat(format!(
                "\"{s}\" - format must be one of \"Y-m-d\" (per day), \"Y-m\" (per month) \
                 or \"Y\" (per year), with slashes, underscores or dots allowed in place of dashes"
            )));
        }

        // Shape is guaranteed by the regex: Y, Y[sep]m or Y[sep]m[sep]d
        let mut chars = s.chars();
        chars.next();

        let sep_month = match chars.next() {
            None => return Ok(DateBucket::Yearly),
            Some('m') => None,
            Some(c) => {
                chars.next();
                Some(c)
            }
        };
        let sep_day = match chars.next() {
            None => return Ok(DateBucket::Monthly { sep: sep_month }),
            Some('d') => None,
            Some(c) => {
                chars.next();
                Some(c)
            }
        };
        Ok(DateBucket::Daily { sep_month, sep_day })
    }
}

impl fmt::Display for DateBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Y")?;
        match self {
            DateBucket::Yearly => Ok(()),
            DateBucket::Monthly { sep } => {
                if let Some(c) = sep {
                    write!(f, "{c}")?;
                }
                write!(f, "m")
            }
            DateBucket::Daily { sep_month, sep_day } => {
                if let Some(c) = sep_month {
                    write!(f, "{c}")?;
                }
                write!(f, "m")?;
                if let Some(c) = sep_day {
                    write!(f, "{c}")?;
                }
                write!(f, "d")
            }
        }
    }
}

impl DateBucket {
    /// Format a date at this bucket's granularity
    pub fn format(&self, date: NaiveDate) -> String {
        let mut out = format!("{:04}", date.year());
        match self {
            DateBucket::Yearly => {}
            DateBucket::Monthly { sep } => {
                if let Some(c) = sep {
                    out.push(*c);
                }
                out.push_str(&format!("{:02}", date.month()));
            }
            DateBucket::Daily { sep_month, sep_day } => {
                if let Some(c) = sep_month {
                    out.push(*c);
                }
                out.push_str(&format!("{:02}", date.month()));
                if let Some(c) = sep_day {
                    out.push(*c);
                }
                out.push_str(&format!("{:02}", date.day()));
            }
        }
        out
    }

    /// Strict inverse of [`format`](Self::format). Month and day default to 1
    /// at coarser granularities. Returns `None` for anything that does not
    /// match this bucket's shape exactly.
    pub fn parse(&self, s: &str) -> Option<NaiveDate> {
        let bytes = s.as_bytes();
        let mut pos = 0;
        let year = take_digits(bytes, &mut pos, 4)? as i32;

        let (month, day) = match self {
            DateBucket::Yearly => (1, 1),
            DateBucket::Monthly { sep } => {
                eat_sep(bytes, &mut pos, *sep)?;
                (take_digits(bytes, &mut pos, 2)?, 1)
            }
            DateBucket::Daily { sep_month, sep_day } => {
                eat_sep(bytes, &mut pos, *sep_month)?;
                let month = take_digits(bytes, &mut pos, 2)?;
                eat_sep(bytes, &mut pos, *sep_day)?;
                (month, take_digits(bytes, &mut pos, 2)?)
            }
        };

        if pos != bytes.len() {
            return None;
        }
        NaiveDate::from_ymd_opt(year, month, day)
    }

    /// Truncate a date to this bucket's granularity
    pub fn truncate(&self, date: NaiveDate) -> NaiveDate {
        match self {
            DateBucket::Yearly => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
            DateBucket::Monthly { .. } => {
                NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
            }
            DateBucket::Daily { .. } => date,
        }
    }
}

fn take_digits(bytes: &[u8], pos: &mut usize, count: usize) -> Option<u32> {
    let end = pos.checked_add(count)?;
    if end > bytes.len() {
        return None;
    }
    let slice = &bytes[*pos..end];
    if !slice.iter().all(u8::is_ascii_digit) {
        return None;
    }
    *pos = end;
    std::str::from_utf8(slice).ok()?.parse().ok()
}

fn eat_sep(bytes: &[u8], pos: &mut usize, sep: Option<char>) -> Option<()> {
    match sep {
        Some(c) if bytes.get(*pos) == Some(&(c as u8)) => {
            *pos += 1;
            Some(())
        }
        Some(_) => None,
        None => Some(()),
    }
}
