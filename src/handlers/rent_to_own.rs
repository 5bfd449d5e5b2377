// src/handlers/rent_to_own.rs
use log::{info, warn};
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;

use super::error::ApiError;
use crate::models::{QuoteQuery, ScheduleQuery};
use crate::services::rent_to_own::RentToOwnCalculator;
use crate::services::schedule::payment_schedule;

pub async fn get_quote(query: QuoteQuery, calculator: Arc<RentToOwnCalculator>) -> Result<Json, Rejection> {
    let term = query.term.unwrap_or(calculator.config().default_term);
    info!("Handling rent-to-own quote: price={} term={}", query.price, term);

    let quote = calculator.quote(query.price, term).map_err(|e| {
        warn!("Rejected quote request: {}", e);
        warp::reject::custom(ApiError::from(e))
    })?;

    Ok(warp::reply::json(&quote))
}

pub async fn get_terms(calculator: Arc<RentToOwnCalculator>) -> Result<Json, Rejection> {
    Ok(warp::reply::json(&calculator.terms()))
}

pub async fn get_schedule(query: ScheduleQuery, calculator: Arc<RentToOwnCalculator>) -> Result<Json, Rejection> {
    let term = query.term.unwrap_or(calculator.config().default_term);
    info!(
        "Handling payment schedule: price={} term={} start={} paid={}",
        query.price, term, query.start, query.paid
    );

    let schedule = calculator
        .quote(query.price, term)
        .and_then(|quote| payment_schedule(&quote, query.start, query.paid))
        .map_err(|e| {
            warn!("Rejected schedule request: {}", e);
            warp::reject::custom(ApiError::from(e))
        })?;

    Ok(warp::reply::json(&schedule))
}
