// src/services/rent_to_own.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use log::debug;
use thiserror::Error;

use crate::models::Money;

// Absorbs float noise so that an exact cent amount is not truncated down.
const CENT_EPSILON: f64 = 1e-6;
const RATE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuoteError {
    #[error("purchase price must be a finite amount of at least one cent, got {0}")]
    InvalidPrice(f64),
    #[error("term of {term} months is outside the allowed range {min}-{max}")]
    TermOutOfRange { term: u32, min: u32, max: u32 },
    #[error("invalid pricing configuration: {0}")]
    InvalidPricing(String),
    #[error("{paid} payments recorded against a {term}-month term")]
    PaymentsExceedTerm { paid: u32, term: u32 },
    #[error("installments starting on {0} run past the last representable date")]
    StartDateOutOfRange(NaiveDate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rounding {
    /// Truncate to the cent. Matches the published product-page prices.
    #[default]
    Floor,
    HalfUp,
}

/// Business parameters for rent-to-own pricing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub min_term: u32,
    pub max_term: u32,
    pub default_term: u32,
    pub preset_terms: Vec<u32>,
    /// Term in months -> premium over the purchase price (0.40 = 40%).
    pub premium_rates: BTreeMap<u32, f64>,
    pub buyout_checkpoints: Vec<u32>,
    pub rounding: Rounding,
}

impl Default for PricingConfig {
    fn default() -> Self {
        PricingConfig {
            min_term: 1,
            max_term: 24,
            default_term: 12,
            preset_terms: vec![3, 6, 12],
            premium_rates: BTreeMap::from([(3, 0.10), (6, 0.20), (12, 0.40)]),
            buyout_checkpoints: vec![3, 6, 9],
            rounding: Rounding::Floor,
        }
    }
}

impl PricingConfig {
    pub fn validate(&self) -> Result<(), QuoteError> {
        let invalid = |msg: String| -> Result<(), QuoteError> { Err(QuoteError::InvalidPricing(msg)) };

        if self.min_term == 0 {
            return invalid("minimum term must be at least one month".into());
        }
        if self.min_term > self.max_term {
            return invalid(format!(
                "minimum term {} exceeds maximum term {}",
                self.min_term, self.max_term
            ));
        }
        let in_range = |term: u32| (self.min_term..=self.max_term).contains(&term);
        if !in_range(self.default_term) {
            return invalid(format!("default term {} is out of range", self.default_term));
        }
        if let Some(term) = self.preset_terms.iter().find(|t| !in_range(**t)) {
            return invalid(format!("preset term {} is out of range", term));
        }
        if self.premium_rates.is_empty() {
            return invalid("premium table is empty".into());
        }

        let mut previous_annualized: Option<(u32, f64)> = None;
        for (&term, &rate) in &self.premium_rates {
            if term == 0 {
                return invalid("premium table contains a zero-month term".into());
            }
            if !rate.is_finite() || rate < 0.0 {
                return invalid(format!("premium rate {} for {} months must be >= 0", rate, term));
            }
            // Shorter terms may not be cheaper per year than longer ones.
            let annualized = rate * 12.0 / f64::from(term);
            if let Some((prev_term, prev)) = previous_annualized {
                if annualized > prev + RATE_EPSILON {
                    return invalid(format!(
                        "annualized premium rises from {:.4} at {} months to {:.4} at {} months",
                        prev, prev_term, annualized, term
                    ));
                }
            }
            previous_annualized = Some((term, annualized));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuyoutPoint {
    pub elapsed_months: u32,
    pub remaining: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RentalQuote {
    pub purchase_price: Money,
    pub term_months: u32,
    pub premium_rate: f64,
    pub monthly_payment: Money,
    pub total_cost: Money,
    pub rental_premium_percent: f64,
    pub buyout_schedule: Vec<BuyoutPoint>,
}

impl RentalQuote {
    /// Remaining balance after `elapsed_months` payments; zero once the term is done.
    pub fn buyout_at(&self, elapsed_months: u32) -> Money {
        if elapsed_months >= self.term_months {
            return Money::ZERO;
        }
        self.total_cost
            .saturating_sub(self.monthly_payment.times(elapsed_months))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TermOptions {
    pub presets: Vec<u32>,
    pub min_term: u32,
    pub max_term: u32,
    pub default_term: u32,
}

#[derive(Debug, Clone)]
pub struct RentToOwnCalculator {
    config: PricingConfig,
}

impl RentToOwnCalculator {
    pub fn new(config: PricingConfig) -> Result<Self, QuoteError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    pub fn terms(&self) -> TermOptions {
        TermOptions {
            presets: self.config.preset_terms.clone(),
            min_term: self.config.min_term,
            max_term: self.config.max_term,
            default_term: self.config.default_term,
        }
    }

    pub fn check_term(&self, term: u32) -> Result<u32, QuoteError> {
        if term < self.config.min_term || term > self.config.max_term {
            return Err(QuoteError::TermOutOfRange {
                term,
                min: self.config.min_term,
                max: self.config.max_term,
            });
        }
        Ok(term)
    }

    /// Premium for a term. Terms between table points are interpolated
    /// linearly; terms beyond either end keep that end's annualized rate.
    pub fn premium_rate(&self, term: u32) -> f64 {
        let table = &self.config.premium_rates;
        if let Some(rate) = table.get(&term) {
            return *rate;
        }

        let below = table.range(..term).next_back();
        let above = table.range(term..).next();
        match (below, above) {
            (Some((&lo_term, &lo_rate)), Some((&hi_term, &hi_rate))) => {
                let span = f64::from(hi_term - lo_term);
                lo_rate + (hi_rate - lo_rate) * f64::from(term - lo_term) / span
            }
            (Some((&edge_term, &edge_rate)), None) | (None, Some((&edge_term, &edge_rate))) => {
                edge_rate * f64::from(term) / f64::from(edge_term)
            }
            (None, None) => 0.0,
        }
    }

    pub fn quote(&self, purchase_price: f64, term_months: u32) -> Result<RentalQuote, QuoteError> {
        let price = Money::from_dollars(purchase_price)
            .ok_or(QuoteError::InvalidPrice(purchase_price))?;
        let term = self.check_term(term_months)?;

        let rate = self.premium_rate(term);
        let monthly_payment = monthly_payment(price, rate, term, self.config.rounding);
        let total_cost = monthly_payment.times(term);
        let rental_premium_percent = premium_percent(price, total_cost);

        let mut quote = RentalQuote {
            purchase_price: price,
            term_months: term,
            premium_rate: rate,
            monthly_payment,
            total_cost,
            rental_premium_percent,
            buyout_schedule: Vec::new(),
        };

        let mut checkpoints: Vec<u32> = self.config.buyout_checkpoints
            .iter()
            .copied()
            .filter(|elapsed| *elapsed < term)
            .collect();
        checkpoints.sort_unstable();
        checkpoints.dedup();
        quote.buyout_schedule = checkpoints
            .into_iter()
            .map(|elapsed_months| BuyoutPoint {
                elapsed_months,
                remaining: quote.buyout_at(elapsed_months),
            })
            .collect();

        debug!(
            "Quoted {} over {} months: {}/month, {} total",
            price, term, quote.monthly_payment, quote.total_cost
        );
        Ok(quote)
    }

    pub fn quote_default(&self, purchase_price: f64) -> Result<RentalQuote, QuoteError> {
        self.quote(purchase_price, self.config.default_term)
    }
}

fn monthly_payment(price: Money, rate: f64, term: u32, rounding: Rounding) -> Money {
    let gross = price.cents() as f64 * (1.0 + rate) / f64::from(term);
    let rounded = match rounding {
        Rounding::Floor => (gross + CENT_EPSILON).floor(),
        Rounding::HalfUp => gross.round(),
    } as u64;

    // Truncation must never leave the total under the purchase price.
    let minimum = price.cents().div_ceil(u64::from(term)).max(1);
    Money::from_cents(rounded.max(minimum))
}

fn premium_percent(price: Money, total_cost: Money) -> f64 {
    let extra = total_cost.cents().saturating_sub(price.cents()) as f64;
    let percent = extra / price.cents() as f64 * 100.0;
    (percent * 10.0).round() / 10.0
}
