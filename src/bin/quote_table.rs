// src/bin/quote_table.rs
use anyhow::{Context, Result};
use dotenv::dotenv;
use std::env;

use giggatek_edge::config::EdgeConfig;
use giggatek_edge::services::rent_to_own::RentToOwnCalculator;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();

    let price: f64 = env::args()
        .nth(1)
        .unwrap_or_else(|| "599.99".to_string())
        .parse()
        .context("price must be a number")?;

    let config = EdgeConfig::from_env()?;
    let calculator = RentToOwnCalculator::new(config.pricing)?;

    println!("Rent-to-own quotes for ${:.2}", price);
    for term in calculator.terms().presets {
        let quote = calculator.quote(price, term)?;
        println!(
            "{:>3} months: {}/month, {} total, {:.1}% premium",
            term, quote.monthly_payment, quote.total_cost, quote.rental_premium_percent
        );
        for point in &quote.buyout_schedule {
            println!("      buyout after {:>2} months: {}", point.elapsed_months, point.remaining);
        }
    }
    Ok(())
}
