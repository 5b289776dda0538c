// src/broker.rs
use crate::db::Database;
use crate::error::{Apology, DatabaseError};
use crate::lookup::QuoteLookup;
use crate::models::{trade_total, PortfolioSummary, Position, Quote, TradeReceipt};
use chrono::Utc;
use log::{error, info, warn};
use rust_decimal::Decimal;
use warp::http::StatusCode;

/// Parses a share count; only plain positive integers are accepted.
pub fn parse_shares(raw: Option<&str>) -> Result<i64, Apology> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Apology::new("Amount of shares not provided"))?;
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Apology::new("Amount of shares must be a positive integer"));
    }
    match raw.parse::<i64>() {
        Ok(shares) if shares > 0 => Ok(shares),
        _ => Err(Apology::new("Amount of shares must be a positive integer")),
    }
}

fn require_symbol(symbol: Option<&str>) -> Result<&str, Apology> {
    symbol
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Apology::new("Missing symbol"))
}

async fn resolve(quotes: &dyn QuoteLookup, symbol: &str) -> Result<Quote, Apology> {
    match quotes.lookup(symbol).await {
        Ok(Some(quote)) => Ok(quote),
        Ok(None) => Err(Apology::new("Symbol not found")),
        Err(e) => {
            error!("Quote lookup for {} failed: {}", symbol, e);
            Err(Apology::with_status(
                "Quote service unavailable, please try again later",
                StatusCode::BAD_GATEWAY,
            ))
        }
    }
}

fn check_total(quote: &Quote, shares: i64) -> Result<Decimal, Apology> {
    trade_total(quote.price, shares).ok_or_else(|| Apology::new("Amount of shares is too large"))
}

pub async fn quote(quotes: &dyn QuoteLookup, symbol: Option<&str>) -> Result<Quote, Apology> {
    resolve(quotes, require_symbol(symbol)?).await
}

pub async fn buy(
    db: &Database,
    quotes: &dyn QuoteLookup,
    user_id: i64,
    symbol: Option<&str>,
    shares: Option<&str>,
) -> Result<TradeReceipt, Apology> {
    let quote = resolve(quotes, require_symbol(symbol)?).await?;
    let shares = parse_shares(shares)?;
    check_total(&quote, shares)?;

    match db.execute_buy(user_id, &quote, shares, Utc::now()).await {
        Ok(receipt) => {
            info!(
                "User {} bought {} {} at {} (total {})",
                user_id, shares, quote.symbol, quote.price, receipt.transaction.total_paid
            );
            Ok(receipt)
        }
        Err(DatabaseError::InsufficientCash { needed, available }) => {
            warn!(
                "User {} cannot afford {} {}: needs {}, has {}",
                user_id, shares, quote.symbol, needed, available
            );
            Err(Apology::new("Not enough cash to buy the shares"))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn sell(
    db: &Database,
    quotes: &dyn QuoteLookup,
    user_id: i64,
    symbol: Option<&str>,
    shares: Option<&str>,
) -> Result<TradeReceipt, Apology> {
    let symbol = symbol
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Apology::new("You must select a symbol"))?;
    let quote = resolve(quotes, symbol).await?;
    let shares = parse_shares(shares)?;
    check_total(&quote, shares)?;

    match db.execute_sell(user_id, &quote, shares, Utc::now()).await {
        Ok(receipt) => {
            info!(
                "User {} sold {} {} at {} (total {})",
                user_id, shares, quote.symbol, quote.price, receipt.transaction.total_paid
            );
            Ok(receipt)
        }
        Err(DatabaseError::InsufficientShares { held: 0, .. }) => Err(Apology::new(format!(
            "You don't own any shares of {}",
            quote.symbol
        ))),
        Err(DatabaseError::InsufficientShares { requested, held }) => {
            warn!(
                "User {} tried to sell {} {} holding {}",
                user_id, requested, quote.symbol, held
            );
            Err(Apology::new("You don't have that amount of shares to sell"))
        }
        Err(e) => Err(e.into()),
    }
}

/// Values every holding at its live price. Holdings whose quote cannot be
/// fetched are listed unpriced and left out of the totals.
pub async fn portfolio(
    db: &Database,
    quotes: &dyn QuoteLookup,
    user_id: i64,
) -> Result<PortfolioSummary, Apology> {
    let cash = db.get_user(user_id).await?.cash;
    let holdings = db.holdings(user_id).await?;

    let mut positions = Vec::with_capacity(holdings.len());
    let mut holdings_value = Decimal::ZERO;
    for holding in holdings {
        let price = match quotes.lookup(&holding.symbol).await {
            Ok(Some(quote)) => Some(quote.price),
            Ok(None) => {
                warn!("No quote for held symbol {}", holding.symbol);
                None
            }
            Err(e) => {
                warn!("Quote lookup for {} failed: {}", holding.symbol, e);
                None
            }
        };
        let value = price.and_then(|p| trade_total(p, holding.share_quantity));
        if let Some(value) = value {
            holdings_value += value;
        }
        positions.push(Position {
            symbol: holding.symbol,
            shares: holding.share_quantity,
            price,
            value,
        });
    }

    Ok(PortfolioSummary {
        cash,
        positions,
        holdings_value,
        net_worth: cash + holdings_value,
    })
}
