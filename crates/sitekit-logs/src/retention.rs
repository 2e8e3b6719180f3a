//! Retention horizon parsed from a relative time expression

use std::str::FromStr;

use chrono::{Days, Months, NaiveDateTime};

use sitekit_core::{Error, Result, DEFAULT_RETENTION};

/// How far back log files are kept, e.g. `"-1 day -1 week"` or `"15 months"`.
///
/// The expression is a sequence of `<count> <unit>` pairs with units `day`,
/// `week`, `month` or `year` (singular or plural). Signs are ignored - the
/// expression always describes an offset into the past.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retention {
    months: u32,
    days: u64,
}

impl Default for Retention {
    fn default() -> Self {
        DEFAULT_RETENTION
            .parse()
            .expect("Invalid default retention expression")
    }
}

impl FromStr for Retention {
    type Err = Error;

    fn from_str(expr: &str) -> Result<Self> {
        let mut months: u32 = 0;
        let mut days: u64 = 0;
        let mut tokens = expr.split_whitespace().peekable();

        if tokens.peek().is_none() {
            return Err(Error::InvalidRetention("empty expression".to_string()));
        }

        while let Some(count) = tokens.next() {
            let unit = tokens.next().ok_or_else(|| {
                Error::InvalidRetention(format!("missing unit after \"{count}\" in \"{expr}\""))
            })?;
            let count: u64 = count.trim_start_matches(['-', '+']).parse().map_err(|_| {
                Error::InvalidRetention(format!("\"{count}\" is not a number in \"{expr}\""))
            })?;
            match unit.to_ascii_lowercase().trim_end_matches('s') {
                "day" => days += count,
                "week" => days += count * 7,
                "month" => months += count as u32,
                "year" => months += count as u32 * 12,
                _ => {
                    return Err(Error::InvalidRetention(format!(
                        "unknown unit \"{unit}\" in \"{expr}\""
                    )))
                }
            }
        }

        Ok(Self { months, days })
    }
}

impl Retention {
    /// Point in time before which files are considered stale, relative to
    /// `instant`. Month arithmetic is calendar-aware.
    pub fn cutoff_from(&self, instant: NaiveDateTime) -> NaiveDateTime {
        instant
            .checked_sub_months(Months::new(self.months))
            .and_then(|t| t.checked_sub_days(Days::new(self.days)))
            .unwrap_or(NaiveDateTime::MIN)
    }
}
