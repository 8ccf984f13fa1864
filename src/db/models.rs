//! Database model types.

use serde::Serialize;

/// A single authentication attempt as written to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginAttempt {
    /// Seconds since the Unix epoch
    pub timestamp: u64,
    pub source: String,
    /// Username as supplied, valid or not
    pub username: String,
    pub success: bool,
}

/// Outcome of admitting an attempt through the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Credentials were valid and the caller is not locked out.
    Granted,
    /// Credentials were invalid.
    Denied,
    /// Too many recent failures for this source and username.
    LockedOut,
}

/// Lookback windows accepted by the metric routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricWindow {
    OneHour,
    TwoHours,
    SixHours,
    #[default]
    Day,
    Week,
}

impl MetricWindow {
    /// Parse a window name, falling back to 24h for anything unrecognized.
    pub fn parse_or_default(s: &str) -> Self {
        match s {
            "1h" => Self::OneHour,
            "2h" => Self::TwoHours,
            "6h" => Self::SixHours,
            "24h" => Self::Day,
            "7d" => Self::Week,
            _ => Self::default(),
        }
    }

    /// SQLite `datetime()` modifier selecting the start of the window.
    pub fn sqlite_modifier(self) -> &'static str {
        match self {
            Self::OneHour => "-1 hours",
            Self::TwoHours => "-2 hours",
            Self::SixHours => "-6 hours",
            Self::Day => "-24 hours",
            Self::Week => "-7 days",
        }
    }
}

/// Timestamp label of a sample, kept in whatever form the collector wrote.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SeriesLabel {
    Text(String),
    Integer(i64),
}

/// Parallel label/value arrays for charting.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
    pub labels: Vec<SeriesLabel>,
    pub values: Vec<f64>,
}
