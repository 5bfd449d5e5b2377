// src/models.rs
use serde::{Deserialize, Serialize, Serializer};
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;

/// A monetary amount in whole cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: u64) -> Self {
        Money(cents)
    }

    /// Converts a dollar amount, rejecting anything that is not a finite
    /// amount of at least one cent.
    pub fn from_dollars(amount: f64) -> Option<Self> {
        if !amount.is_finite() || amount <= 0.0 {
            return None;
        }
        let cents = (amount * 100.0).round();
        if cents < 1.0 || cents > u64::MAX as f64 {
            return None;
        }
        Some(Money(cents as u64))
    }

    pub const fn cents(self) -> u64 {
        self.0
    }

    pub fn as_dollars(self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn saturating_sub(self, other: Money) -> Money {
        Money(self.0.saturating_sub(other.0))
    }

    pub fn times(self, count: u32) -> Money {
        Money(self.0.saturating_mul(u64::from(count)))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "${}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// Amounts go over the wire as plain decimal numbers (69.99)
impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_dollars())
    }
}

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub price: f64,
    pub term: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleQuery {
    pub price: f64,
    pub term: Option<u32>,
    pub start: NaiveDate,
    #[serde(default)]
    pub paid: u32,
}

#[derive(Debug, Deserialize)]
pub struct ClickRequest {
    pub url: Option<String>,
    #[serde(default)]
    pub open_clients: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CacheSummary {
    pub name: String,
    pub entries: usize,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct EdgeStatus {
    pub state: String,
    pub precache: String,
    pub runtime: String,
    pub caches: Vec<CacheSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_dollars_to_cents() {
        assert_eq!(Money::from_dollars(599.99), Some(Money::from_cents(59999)));
        assert_eq!(Money::from_dollars(0.01), Some(Money::from_cents(1)));
        assert_eq!(Money::from_dollars(0.0), None);
        assert_eq!(Money::from_dollars(-5.0), None);
        assert_eq!(Money::from_dollars(f64::NAN), None);
        assert_eq!(Money::from_dollars(f64::INFINITY), None);
        assert_eq!(Money::from_dollars(0.004), None);
    }

    #[test]
    fn displays_and_serializes_as_dollars() {
        let amount = Money::from_cents(83988);
        assert_eq!(amount.to_string(), "$839.88");
        assert_eq!(Money::from_cents(5).to_string(), "$0.05");
        assert_eq!(serde_json::to_string(&amount).unwrap(), "839.88");
    }
}
