//! Date and timestamp rules
//!
//! - [`HttpDate`]: the `Date` request header, `ddd, D MMM YYYY H:mm:ss GMT`
//! - [`IsoTimestamp`]: transfer expiration, ISO 8601 with milliseconds

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use regex::Regex;

use super::{static_regex, RuleFailure, StringRule};
use crate::error::ViolationCode;

const HTTP_DATE_PATTERN: &str = r"^(Mon|Tue|Wed|Thu|Fri|Sat|Sun), ([0-9]{1,2}) (Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec) ([0-9]{4}) ([0-9]{1,2}):([0-9]{2}):([0-9]{2}) GMT$";

/// Calendar-aware (leap years included), milliseconds mandatory,
/// `Z` or `±hh:mm` offset.
const ISO_TIMESTAMP_PATTERN: &str = r"^(?:[1-9][0-9]{3}-(?:(?:0[1-9]|1[0-2])-(?:0[1-9]|1[0-9]|2[0-8])|(?:0[13-9]|1[0-2])-(?:29|30)|(?:0[13578]|1[02])-31)|(?:[1-9][0-9](?:0[48]|[2468][048]|[13579][26])|(?:[2468][048]|[13579][26])00)-02-29)T(?:[01][0-9]|2[0-3]):[0-5][0-9]:[0-5][0-9](?:\.[0-9]{3})(?:Z|[+-][01][0-9]:[0-5][0-9])$";

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// RFC 1123-like HTTP date with a weekday that matches the calendar date
#[derive(Debug, Clone)]
pub struct HttpDate {
    regex: Regex,
}

impl HttpDate {
    pub fn new() -> Self {
        Self {
            regex: static_regex(HTTP_DATE_PATTERN),
        }
    }

    fn invalid() -> RuleFailure {
        (
            ViolationCode::Format,
            "must be a date in the format ddd, D MMM YYYY H:mm:ss GMT".to_string(),
        )
    }
}

impl Default for HttpDate {
    fn default() -> Self {
        Self::new()
    }
}

impl StringRule for HttpDate {
    fn id(&self) -> &'static str {
        "http_date"
    }

    fn check(&self, value: &str) -> Result<(), RuleFailure> {
        let caps = self.regex.captures(value).ok_or_else(Self::invalid)?;

        let number = |i: usize| -> Result<u32, RuleFailure> {
            caps.get(i)
                .and_then(|m| m.as_str().parse().ok())
                .ok_or_else(Self::invalid)
        };

        let day = number(2)?;
        let month = MONTHS
            .iter()
            .position(|m| Some(*m) == caps.get(3).map(|c| c.as_str()))
            .ok_or_else(Self::invalid)? as u32
            + 1;
        let year = number(4)? as i32;

        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(Self::invalid)?;
        NaiveTime::from_hms_opt(number(5)?, number(6)?, number(7)?).ok_or_else(Self::invalid)?;

        let weekday: Weekday = caps
            .get(1)
            .and_then(|m| m.as_str().parse().ok())
            .ok_or_else(Self::invalid)?;
        if date.weekday() != weekday {
            return Err((
                ViolationCode::Format,
                format!("weekday does not match date (expected {})", date.weekday()),
            ));
        }

        Ok(())
    }
}

/// Strict ISO 8601 timestamp with millisecond precision
#[derive(Debug, Clone)]
pub struct IsoTimestamp {
    regex: Regex,
}

impl IsoTimestamp {
    pub fn new() -> Self {
        Self {
            regex: static_regex(ISO_TIMESTAMP_PATTERN),
        }
    }
}

impl Default for IsoTimestamp {
    fn default() -> Self {
        Self::new()
    }
}

impl StringRule for IsoTimestamp {
    fn id(&self) -> &'static str {
        "iso_timestamp"
    }

    fn check(&self, value: &str) -> Result<(), RuleFailure> {
        if self.regex.is_match(value) {
            Ok(())
        } else {
            Err((
                ViolationCode::Format,
                "must be an ISO 8601 timestamp with millisecond precision, e.g. 2024-01-01T00:05:00.000Z"
                    .to_string(),
            ))
        }
    }
}
