//! Composable field rules for the interoperability schema
//!
//! Each rule checks one property of a string value and reports a
//! `(ViolationCode, reason)` pair on failure. The schema validator decides
//! which rules apply to which field and turns failures into path-qualified
//! [`Violation`](crate::error::Violation)s.

pub mod currency;
pub mod temporal;

use regex::Regex;

use crate::error::ViolationCode;

pub use currency::CurrencyCode;
pub use temporal::{HttpDate, IsoTimestamp};

/// Reason a rule rejected a value
pub type RuleFailure = (ViolationCode, String);

/// A single check on a string field
pub trait StringRule: Send + Sync {
    /// Short identifier for logs and tests
    fn id(&self) -> &'static str;

    fn check(&self, value: &str) -> Result<(), RuleFailure>;
}

/// Compile a pattern that is a literal in this crate
pub(crate) fn static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in schema pattern must compile")
}

/// Length bounds (inclusive), counted in UTF-16 code units so that
/// characters outside the basic plane count twice
#[derive(Debug, Clone, Copy)]
pub struct Length {
    pub min: usize,
    pub max: usize,
}

impl Length {
    pub const fn between(min: usize, max: usize) -> Self {
        Self { min, max }
    }
}

impl StringRule for Length {
    fn id(&self) -> &'static str {
        "length"
    }

    fn check(&self, value: &str) -> Result<(), RuleFailure> {
        let len = value.encode_utf16().count();
        if len < self.min {
            return Err((
                ViolationCode::Length,
                format!("length must be at least {} characters", self.min),
            ));
        }
        if len > self.max {
            return Err((
                ViolationCode::Length,
                format!("length must be at most {} characters", self.max),
            ));
        }
        Ok(())
    }
}

/// Regex match. Anchoring is the pattern's own business.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
    expected: &'static str,
}

impl Pattern {
    pub fn new(pattern: &str, expected: &'static str) -> Self {
        Self {
            regex: static_regex(pattern),
            expected,
        }
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl StringRule for Pattern {
    fn id(&self) -> &'static str {
        "pattern"
    }

    fn check(&self, value: &str) -> Result<(), RuleFailure> {
        if self.regex.is_match(value) {
            Ok(())
        } else {
            Err((ViolationCode::Pattern, format!("must be {}", self.expected)))
        }
    }
}

/// GUID text: 32 hex digits, either bare or grouped 8-4-4-4-12 by `-` or
/// `:`, optionally wrapped in `{}` or `[]`. Case-insensitive. URN and other
/// prefixed forms are rejected.
const GUID_PATTERN: &str = r"^(?:[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}|[0-9A-Fa-f]{8}:[0-9A-Fa-f]{4}:[0-9A-Fa-f]{4}:[0-9A-Fa-f]{4}:[0-9A-Fa-f]{12}|[0-9A-Fa-f]{32})$";

#[derive(Debug, Clone)]
pub struct UuidFormat {
    regex: Regex,
}

impl UuidFormat {
    pub fn new() -> Self {
        Self {
            regex: static_regex(GUID_PATTERN),
        }
    }
}

impl Default for UuidFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl StringRule for UuidFormat {
    fn id(&self) -> &'static str {
        "uuid"
    }

    fn check(&self, value: &str) -> Result<(), RuleFailure> {
        let inner = value
            .strip_prefix('{')
            .and_then(|v| v.strip_suffix('}'))
            .or_else(|| value.strip_prefix('[').and_then(|v| v.strip_suffix(']')))
            .unwrap_or(value);

        if self.regex.is_match(inner) {
            Ok(())
        } else {
            Err((ViolationCode::Format, "must be a valid GUID".to_string()))
        }
    }
}

/// Non-negative integer with an upper bound
#[derive(Debug, Clone, Copy)]
pub struct IntegerMax(pub u64);

impl StringRule for IntegerMax {
    fn id(&self) -> &'static str {
        "integer_max"
    }

    fn check(&self, value: &str) -> Result<(), RuleFailure> {
        let parsed: u64 = value
            .trim()
            .parse()
            .map_err(|_| (ViolationCode::Type, "must be a number".to_string()))?;
        if parsed > self.0 {
            return Err((
                ViolationCode::Range,
                format!("must be less than or equal to {}", self.0),
            ));
        }
        Ok(())
    }
}

/// Run rules in order, stopping at the first failure
pub fn check_all(value: &str, rules: &[&dyn StringRule]) -> Result<(), RuleFailure> {
    rules.iter().try_for_each(|rule| rule.check(value))
}
