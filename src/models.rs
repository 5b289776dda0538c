// src/models.rs
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub hash: String,
    pub cash: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Buy,
    Sell,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Buy => "buy",
            TransactionType::Sell => "sell",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(TransactionType::Buy),
            "sell" => Ok(TransactionType::Sell),
            other => Err(format!("unknown transaction type: {}", other)),
        }
    }
}

/// One ledger row. `share_quantity` is negative for sales; `total_paid` is
/// always the positive amount that moved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub symbol: String,
    pub share_price: Decimal,
    pub share_quantity: i64,
    pub total_paid: Decimal,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub user_id: i64,
    pub symbol: String,
    pub share_quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: Decimal,
}

/// Monetary amount of trading `shares` at `price`, rounded to cents.
/// `None` on overflow.
pub fn trade_total(price: Decimal, shares: i64) -> Option<Decimal> {
    price
        .checked_mul(Decimal::from(shares))
        .map(|total| total.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

/// Result of a committed buy or sell.
#[derive(Debug, Clone, Serialize)]
pub struct TradeReceipt {
    pub transaction: Transaction,
    pub cash_after: Decimal,
    pub shares_held: i64,
}

/// A holding valued at the current market price. `price` is `None` when the
/// quote could not be fetched.
#[derive(Debug, Clone, Serialize)]
pub struct Position {
    pub symbol: String,
    pub shares: i64,
    pub price: Option<Decimal>,
    pub value: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioSummary {
    pub cash: Decimal,
    pub positions: Vec<Position>,
    pub holdings_value: Decimal,
    pub net_worth: Decimal,
}

impl PortfolioSummary {
    pub fn is_partial(&self) -> bool {
        self.positions.iter().any(|p| p.price.is_none())
    }
}
