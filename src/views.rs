// src/views.rs
use crate::models::{Holding, PortfolioSummary, Quote, Transaction, User};
use rust_decimal::{Decimal, RoundingStrategy};
use warp::http::StatusCode;

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Formats an amount as dollars with thousands separators, e.g. `$1,234.50`.
pub fn usd(amount: Decimal) -> String {
    let rounded = format!(
        "{:.2}",
        amount
            .abs()
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    );
    let (whole, cents) = rounded.split_once('.').unwrap_or((rounded.as_str(), "00"));
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if amount.is_sign_negative() && !amount.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{}${}.{}", sign, grouped, cents)
}

fn nav(user: Option<&str>) -> String {
    match user {
        Some(username) => format!(
            r#"<nav>
  <a href="/">Portfolio</a> <a href="/quote">Quote</a> <a href="/buy">Buy</a>
  <a href="/sell">Sell</a> <a href="/history">History</a>
  <span class="right"><a href="/profile">{}</a> <a href="/logout">Log Out</a></span>
</nav>"#,
            escape(username)
        ),
        None => r#"<nav>
  <span class="right"><a href="/register">Register</a> <a href="/login">Log In</a></span>
</nav>"#
            .to_string(),
    }
}

pub fn layout(title: &str, user: Option<&str>, flash: Option<&str>, body: &str) -> String {
    let flash = flash
        .map(|m| format!(r#"<div class="flash">{}</div>"#, escape(m)))
        .unwrap_or_default();
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="initial-scale=1, width=device-width">
<title>Finance: {}</title>
</head>
<body>
{}
{}
<main>
{}
</main>
</body>
</html>
"#,
        escape(title),
        nav(user),
        flash,
        body
    )
}

pub fn apology_page(message: &str, status: StatusCode) -> String {
    let body = format!(
        r#"<h1>{}</h1>
<p class="apology">{}</p>
<p><a href="/">Back</a></p>"#,
        status.as_u16(),
        escape(message)
    );
    layout("Apology", None, None, &body)
}

pub fn index_page(username: &str, flash: Option<&str>, summary: &PortfolioSummary) -> String {
    let mut rows = String::new();
    for position in &summary.positions {
        let (price, value) = match (position.price, position.value) {
            (Some(price), Some(value)) => (usd(price), usd(value)),
            _ => ("unavailable".to_string(), "unavailable".to_string()),
        };
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape(&position.symbol),
            position.shares,
            price,
            value
        ));
    }
    let partial = if summary.is_partial() {
        "<p class=\"note\">Some prices are unavailable; totals exclude those holdings.</p>"
    } else {
        ""
    };
    let body = format!(
        r#"<table>
<thead><tr><th>Symbol</th><th>Shares</th><th>Price</th><th>Total</th></tr></thead>
<tbody>
{}</tbody>
<tfoot>
<tr><td colspan="3">Cash</td><td>{}</td></tr>
<tr><td colspan="3">Holdings</td><td>{}</td></tr>
<tr><td colspan="3">TOTAL</td><td>{}</td></tr>
</tfoot>
</table>
{}"#,
        rows,
        usd(summary.cash),
        usd(summary.holdings_value),
        usd(summary.net_worth),
        partial
    );
    layout("Portfolio", Some(username), flash, &body)
}

pub fn buy_page(username: &str) -> String {
    let body = r#"<form action="/buy" method="post">
<input autocomplete="off" autofocus name="symbol" placeholder="Symbol" type="text">
<input min="1" name="shares" placeholder="Shares" type="number">
<button type="submit">Buy</button>
</form>"#;
    layout("Buy", Some(username), None, body)
}

pub fn sell_page(username: &str, holdings: &[Holding]) -> String {
    let options: String = holdings
        .iter()
        .map(|h| {
            format!(
                "<option value=\"{0}\">{0} ({1})</option>\n",
                escape(&h.symbol),
                h.share_quantity
            )
        })
        .collect();
    let body = format!(
        r#"<form action="/sell" method="post">
<select name="symbol">
<option disabled selected value="">Symbol</option>
{}</select>
<input min="1" name="shares" placeholder="Shares" type="number">
<button type="submit">Sell</button>
</form>"#,
        options
    );
    layout("Sell", Some(username), None, &body)
}

pub fn quote_page(username: &str) -> String {
    let body = r#"<form action="/quote" method="post">
<input autocomplete="off" autofocus name="symbol" placeholder="Symbol" type="text">
<button type="submit">Quote</button>
</form>"#;
    layout("Quote", Some(username), None, body)
}

pub fn quoted_page(username: &str, quote: &Quote) -> String {
    let body = format!(
        "<p>A share of {} costs {}.</p>",
        escape(&quote.symbol),
        usd(quote.price)
    );
    layout("Quoted", Some(username), None, &body)
}

pub fn history_page(username: &str, transactions: &[Transaction]) -> String {
    let rows: String = transactions
        .iter()
        .map(|t| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                t.timestamp.format("%Y-%m-%d %H:%M:%S"),
                t.kind,
                escape(&t.symbol),
                t.share_quantity,
                usd(t.share_price),
                usd(t.total_paid)
            )
        })
        .collect();
    let body = format!(
        r#"<table>
<thead><tr><th>Transacted</th><th>Type</th><th>Symbol</th><th>Shares</th><th>Price</th><th>Total</th></tr></thead>
<tbody>
{}</tbody>
</table>"#,
        rows
    );
    layout("History", Some(username), None, &body)
}

pub fn login_page() -> String {
    let body = r#"<form action="/login" method="post">
<input autocomplete="off" autofocus name="username" placeholder="Username" type="text">
<input name="password" placeholder="Password" type="password">
<button type="submit">Log In</button>
</form>"#;
    layout("Log In", None, None, body)
}

pub fn register_page() -> String {
    let body = r#"<form action="/register" method="post">
<input autocomplete="off" autofocus name="username" placeholder="Username" type="text">
<input name="password" placeholder="Password" type="password">
<input name="confirmation" placeholder="Confirm password" type="password">
<button type="submit">Register</button>
</form>"#;
    layout("Register", None, None, body)
}

pub fn profile_page(user: &User) -> String {
    let body = format!(
        r#"<p>Username: {}</p>
<p>Cash: {}</p>
<form action="/profile" method="post">
<button type="submit">Change password</button>
</form>"#,
        escape(&user.username),
        usd(user.cash)
    );
    layout("Profile", Some(&user.username), None, &body)
}

pub fn password_change_page(username: &str) -> String {
    let body = r#"<form action="/password_change" method="post">
<input autofocus name="current_password" placeholder="Current password" type="password">
<input name="new_password" placeholder="New password" type="password">
<input name="confirmation" placeholder="Confirm new password" type="password">
<button type="submit">Change password</button>
</form>"#;
    layout("Change Password", Some(username), None, body)
}
