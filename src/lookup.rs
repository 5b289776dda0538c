// src/lookup.rs
use crate::error::QuoteError;
use crate::models::Quote;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

const ALPHAVANTAGE_URL: &str = "https://www.alphavantage.co/query";

/// Resolves a ticker to its current price. `Ok(None)` means the symbol is unknown.
#[async_trait]
pub trait QuoteLookup: Send + Sync {
    async fn lookup(&self, symbol: &str) -> Result<Option<Quote>, QuoteError>;
}

/// Trims and upper-cases a ticker; `None` if it cannot be a real symbol.
pub fn normalize_symbol(symbol: &str) -> Option<String> {
    let symbol = symbol.trim().to_ascii_uppercase();
    let valid = !symbol.is_empty()
        && symbol.len() <= 12
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^'));
    valid.then_some(symbol)
}

#[derive(Deserialize)]
struct GlobalQuote {
    #[serde(rename = "01. symbol")]
    symbol: String,
    #[serde(rename = "05. price")]
    price: String,
}

#[derive(Deserialize)]
struct AlphaVantageResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<HashMap<String, String>>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

fn parse_response(symbol: &str, body: AlphaVantageResponse) -> Result<Option<Quote>, QuoteError> {
    if let Some(notice) = body.note.or(body.information) {
        return Err(QuoteError::RateLimited(notice));
    }
    let fields = match body.global_quote {
        Some(fields) if !fields.is_empty() => fields,
        _ => return Ok(None),
    };
    let quote: GlobalQuote = match serde_json::to_value(fields).and_then(serde_json::from_value) {
        Ok(quote) => quote,
        Err(e) => {
            debug!("Incomplete quote for {}: {}", symbol, e);
            return Ok(None);
        }
    };
    let price = Decimal::from_str(quote.price.trim()).map_err(|_| QuoteError::InvalidPrice {
        symbol: quote.symbol.clone(),
        raw: quote.price.clone(),
    })?;
    if price <= Decimal::ZERO {
        return Err(QuoteError::InvalidPrice {
            symbol: quote.symbol,
            raw: quote.price,
        });
    }
    Ok(Some(Quote {
        symbol: quote.symbol.to_ascii_uppercase(),
        price,
    }))
}

/// Quote provider backed by the Alpha Vantage `GLOBAL_QUOTE` endpoint.
pub struct AlphaVantage {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AlphaVantage {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, QuoteError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(AlphaVantage {
            client,
            api_key,
            base_url: ALPHAVANTAGE_URL.to_string(),
        })
    }
}

#[async_trait]
impl QuoteLookup for AlphaVantage {
    async fn lookup(&self, symbol: &str) -> Result<Option<Quote>, QuoteError> {
        let Some(symbol) = normalize_symbol(symbol) else {
            return Ok(None);
        };

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", symbol.as_str()),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body = response.json::<AlphaVantageResponse>().await?;
        let quote = parse_response(&symbol, body);
        match &quote {
            Ok(Some(q)) => debug!("Quoted {} at {}", q.symbol, q.price),
            Ok(None) => debug!("No quote for {}", symbol),
            Err(e) => warn!("Quote lookup for {} failed: {}", symbol, e),
        }
        quote
    }
}

/// Fixed price table used by tests.
#[cfg(test)]
pub struct StaticQuotes {
    prices: HashMap<String, Decimal>,
    unavailable: bool,
}

#[cfg(test)]
impl StaticQuotes {
    pub fn new(prices: &[(&str, &str)]) -> Self {
        StaticQuotes {
            prices: prices
                .iter()
                .map(|(s, p)| (s.to_string(), Decimal::from_str(p).unwrap()))
                .collect(),
            unavailable: false,
        }
    }

    pub fn unavailable() -> Self {
        StaticQuotes {
            prices: HashMap::new(),
            unavailable: true,
        }
    }
}

#[cfg(test)]
#[async_trait]
impl QuoteLookup for StaticQuotes {
    async fn lookup(&self, symbol: &str) -> Result<Option<Quote>, QuoteError> {
        if self.unavailable {
            return Err(QuoteError::RateLimited("offline".to_string()));
        }
        let Some(symbol) = normalize_symbol(symbol) else {
            return Ok(None);
        };
        Ok(self.prices.get(&symbol).map(|price| Quote {
            symbol: symbol.clone(),
            price: *price,
        }))
    }
}
