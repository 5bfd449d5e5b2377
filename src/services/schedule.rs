// src/services/schedule.rs
use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::models::Money;
use super::rent_to_own::{QuoteError, RentalQuote};

/// Days between installments, as billed by the storefront.
pub const BILLING_CYCLE_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallmentStatus {
    Paid,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Installment {
    pub month: u32,
    pub due: NaiveDate,
    pub amount: Money,
    pub status: InstallmentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentSchedule {
    pub installments: Vec<Installment>,
    pub payments_made: u32,
    pub progress_percent: f64,
    pub remaining_balance: Money,
    pub next_due: Option<NaiveDate>,
}

pub fn payment_schedule(
    quote: &RentalQuote,
    start: NaiveDate,
    payments_made: u32,
) -> Result<PaymentSchedule, QuoteError> {
    if payments_made > quote.term_months {
        return Err(QuoteError::PaymentsExceedTerm {
            paid: payments_made,
            term: quote.term_months,
        });
    }

    let installments = (0..quote.term_months)
        .map(|i| {
            let due = start
                .checked_add_signed(Duration::days(BILLING_CYCLE_DAYS * i64::from(i)))
                .ok_or(QuoteError::StartDateOutOfRange(start))?;
            Ok(Installment {
                month: i + 1,
                due,
                amount: quote.monthly_payment,
                status: if i < payments_made {
                    InstallmentStatus::Paid
                } else {
                    InstallmentStatus::Pending
                },
            })
        })
        .collect::<Result<Vec<_>, QuoteError>>()?;

    let next_due = installments
        .iter()
        .find(|installment| installment.status == InstallmentStatus::Pending)
        .map(|installment| installment.due);

    let progress_percent = f64::from(payments_made) / f64::from(quote.term_months) * 100.0;

    Ok(PaymentSchedule {
        installments,
        payments_made,
        progress_percent,
        remaining_balance: quote.buyout_at(payments_made),
        next_due,
    })
}
