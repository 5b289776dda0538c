// src/db.rs
use crate::error::{DatabaseError, Result};
use crate::models::{trade_total, Holding, Quote, TradeReceipt, Transaction, TransactionType, User};
use chrono::{DateTime, Utc};
use log::{error, info};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension, Row, TransactionBehavior};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    username  TEXT NOT NULL UNIQUE,
    hash      TEXT NOT NULL,
    cash      TEXT NOT NULL          -- decimal string
);

-- Append-only ledger; share_quantity < 0 for sales
CREATE TABLE IF NOT EXISTS transactions (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id        INTEGER NOT NULL REFERENCES users(id),
    symbol         TEXT NOT NULL,
    share_price    TEXT NOT NULL,
    share_quantity INTEGER NOT NULL,
    total_paid     TEXT NOT NULL,
    type           TEXT NOT NULL CHECK (type IN ('buy', 'sell')),
    timestamp      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transactions_user_symbol ON transactions(user_id, symbol);

-- Materialized SUM(share_quantity) per (user, symbol); zero rows are deleted
CREATE TABLE IF NOT EXISTS portfolio (
    user_id        INTEGER NOT NULL REFERENCES users(id),
    symbol         TEXT NOT NULL,
    share_quantity INTEGER NOT NULL CHECK (share_quantity > 0),
    PRIMARY KEY (user_id, symbol)
);
"#;

pub async fn init(path: &Path) -> Result<Database> {
    let db = Database::open_at_path(path.to_path_buf()).await?;
    db.health_check().await?;
    info!("Connected to database at {:?}", db.path());
    Ok(db)
}

fn apply_schema(conn: &Connection) -> Result<()> {
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.execute_batch(SCHEMA)?;
    info!("Database schema ready (journal_mode={})", mode);
    Ok(())
}

fn decimal_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        hash: row.get(2)?,
        cash: decimal_at(row, 3)?,
    })
}

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let kind: String = row.get(6)?;
    let kind = kind
        .parse::<TransactionType>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, e.into()))?;
    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        symbol: row.get(2)?,
        share_price: decimal_at(row, 3)?,
        share_quantity: row.get(4)?,
        total_paid: decimal_at(row, 5)?,
        kind,
        timestamp: row.get(7)?,
    })
}

fn read_cash(conn: &Connection, user_id: i64) -> Result<Decimal> {
    conn.query_row("SELECT cash FROM users WHERE id = ?1", [user_id], |row| {
        decimal_at(row, 0)
    })
    .optional()?
    .ok_or(DatabaseError::UserNotFound(user_id))
}

fn write_cash(conn: &Connection, user_id: i64, cash: Decimal) -> Result<()> {
    conn.execute(
        "UPDATE users SET cash = ?1 WHERE id = ?2",
        params![cash.to_string(), user_id],
    )?;
    Ok(())
}

fn ledger_quantity_in(conn: &Connection, user_id: i64, symbol: &str) -> Result<i64> {
    let total = conn.query_row(
        "SELECT COALESCE(SUM(share_quantity), 0) FROM transactions WHERE user_id = ?1 AND symbol = ?2",
        params![user_id, symbol],
        |row| row.get(0),
    )?;
    Ok(total)
}

fn held_quantity_in(conn: &Connection, user_id: i64, symbol: &str) -> Result<i64> {
    let held = conn
        .query_row(
            "SELECT share_quantity FROM portfolio WHERE user_id = ?1 AND symbol = ?2",
            params![user_id, symbol],
            |row| row.get(0),
        )
        .optional()?;
    Ok(held.unwrap_or(0))
}

struct LedgerEntry<'a> {
    user_id: i64,
    quote: &'a Quote,
    share_quantity: i64,
    total_paid: Decimal,
    kind: TransactionType,
    timestamp: DateTime<Utc>,
}

fn append_ledger(conn: &Connection, entry: LedgerEntry<'_>) -> Result<Transaction> {
    conn.execute(
        "INSERT INTO transactions (user_id, symbol, share_price, share_quantity, total_paid, type, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            entry.user_id,
            entry.quote.symbol,
            entry.quote.price.to_string(),
            entry.share_quantity,
            entry.total_paid.to_string(),
            entry.kind.as_str(),
            entry.timestamp,
        ],
    )?;
    Ok(Transaction {
        id: conn.last_insert_rowid(),
        user_id: entry.user_id,
        symbol: entry.quote.symbol.clone(),
        share_price: entry.quote.price,
        share_quantity: entry.share_quantity,
        total_paid: entry.total_paid,
        kind: entry.kind,
        timestamp: entry.timestamp,
    })
}

/// Rewrites the portfolio row for (user, symbol) from the ledger aggregate.
fn sync_holding(conn: &Connection, user_id: i64, symbol: &str) -> Result<i64> {
    let total = ledger_quantity_in(conn, user_id, symbol)?;
    if total > 0 {
        conn.execute(
            "INSERT INTO portfolio (user_id, symbol, share_quantity) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id, symbol) DO UPDATE SET share_quantity = excluded.share_quantity",
            params![user_id, symbol, total],
        )?;
    } else if total == 0 {
        conn.execute(
            "DELETE FROM portfolio WHERE user_id = ?1 AND symbol = ?2",
            params![user_id, symbol],
        )?;
    } else {
        return Err(DatabaseError::InvalidData(format!(
            "negative position {} for user {} in {}",
            total, user_id, symbol
        )));
    }
    Ok(total)
}

/// SQLite-backed store for users, the trade ledger and holdings.
pub struct Database {
    connection: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl Database {
    pub async fn open_at_path(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        info!("Opening database at: {:?}", path);
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;

        if let Err(e) = apply_schema(&conn) {
            error!("Failed to apply schema: {}", e);
            return Err(e);
        }

        Ok(Database {
            connection: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    #[cfg(test)]
    pub async fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Database {
            connection: Arc::new(Mutex::new(conn)),
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub async fn health_check(&self) -> Result<()> {
        self.with_connection(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))?;
            Ok(())
        })
        .await
    }

    async fn with_connection<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R> + Send,
        R: Send,
    {
        let conn = self.connection.lock().await;
        f(&conn)
    }

    /// Runs `f` inside `BEGIN IMMEDIATE`; any error rolls the whole unit back.
    async fn transaction<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R> + Send,
        R: Send,
    {
        let mut conn = self.connection.lock().await;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    // ========== Users ==========

    pub async fn create_user(&self, username: &str, hash: &str, cash: Decimal) -> Result<User> {
        self.with_connection(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (username, hash, cash) VALUES (?1, ?2, ?3)",
                params![username, hash, cash.to_string()],
            );
            match inserted {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    return Err(DatabaseError::UsernameTaken(username.to_string()));
                }
                Err(e) => return Err(e.into()),
            }

            let id = conn.last_insert_rowid();
            info!("Registered user {} ({})", username, id);
            Ok(User {
                id,
                username: username.to_string(),
                hash: hash.to_string(),
                cash,
            })
        })
        .await
    }

    pub async fn get_user(&self, user_id: i64) -> Result<User> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT id, username, hash, cash FROM users WHERE id = ?1",
                [user_id],
                user_from_row,
            )
            .optional()?
            .ok_or(DatabaseError::UserNotFound(user_id))
        })
        .await
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.with_connection(|conn| {
            let user = conn
                .query_row(
                    "SELECT id, username, hash, cash FROM users WHERE username = ?1",
                    [username],
                    user_from_row,
                )
                .optional()?;
            Ok(user)
        })
        .await
    }

    pub async fn update_password_hash(&self, user_id: i64, hash: &str) -> Result<()> {
        self.with_connection(|conn| {
            let updated = conn.execute(
                "UPDATE users SET hash = ?1 WHERE id = ?2",
                params![hash, user_id],
            )?;
            if updated == 0 {
                return Err(DatabaseError::UserNotFound(user_id));
            }
            info!("Password updated for user {}", user_id);
            Ok(())
        })
        .await
    }

    // ========== Holdings & ledger ==========

    pub async fn holdings(&self, user_id: i64) -> Result<Vec<Holding>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, symbol, share_quantity FROM portfolio
                 WHERE user_id = ?1 ORDER BY symbol",
            )?;
            let holdings = stmt
                .query_map([user_id], |row| {
                    Ok(Holding {
                        user_id: row.get(0)?,
                        symbol: row.get(1)?,
                        share_quantity: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(holdings)
        })
        .await
    }

    pub async fn transactions(&self, user_id: i64) -> Result<Vec<Transaction>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, symbol, share_price, share_quantity, total_paid, type, timestamp
                 FROM transactions WHERE user_id = ?1 ORDER BY id",
            )?;
            let rows = stmt
                .query_map([user_id], transaction_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    #[cfg(test)]
    pub async fn ledger_quantity(&self, user_id: i64, symbol: &str) -> Result<i64> {
        self.with_connection(|conn| ledger_quantity_in(conn, user_id, symbol))
            .await
    }

    // ========== Trades ==========

    pub async fn execute_buy(
        &self,
        user_id: i64,
        quote: &Quote,
        shares: i64,
        timestamp: DateTime<Utc>,
    ) -> Result<TradeReceipt> {
        self.transaction(|conn| {
            let cash = read_cash(conn, user_id)?;
            let total = trade_total(quote.price, shares).ok_or_else(|| {
                DatabaseError::InvalidData(format!("{} x {} overflows", quote.price, shares))
            })?;
            if total > cash {
                return Err(DatabaseError::InsufficientCash {
                    needed: total,
                    available: cash,
                });
            }

            let transaction = append_ledger(
                conn,
                LedgerEntry {
                    user_id,
                    quote,
                    share_quantity: shares,
                    total_paid: total,
                    kind: TransactionType::Buy,
                    timestamp,
                },
            )?;
            let cash_after = cash - total;
            write_cash(conn, user_id, cash_after)?;
            let shares_held = sync_holding(conn, user_id, &quote.symbol)?;

            Ok(TradeReceipt {
                transaction,
                cash_after,
                shares_held,
            })
        })
        .await
    }

    pub async fn execute_sell(
        &self,
        user_id: i64,
        quote: &Quote,
        shares: i64,
        timestamp: DateTime<Utc>,
    ) -> Result<TradeReceipt> {
        self.transaction(|conn| {
            let held = held_quantity_in(conn, user_id, &quote.symbol)?;
            if shares > held {
                return Err(DatabaseError::InsufficientShares {
                    requested: shares,
                    held,
                });
            }

            let cash = read_cash(conn, user_id)?;
            let proceeds = trade_total(quote.price, shares).ok_or_else(|| {
                DatabaseError::InvalidData(format!("{} x {} overflows", quote.price, shares))
            })?;
            let cash_after = cash + proceeds;
            write_cash(conn, user_id, cash_after)?;

            let transaction = append_ledger(
                conn,
                LedgerEntry {
                    user_id,
                    quote,
                    share_quantity: -shares,
                    total_paid: proceeds,
                    kind: TransactionType::Sell,
                    timestamp,
                },
            )?;
            let shares_held = sync_holding(conn, user_id, &quote.symbol)?;

            Ok(TradeReceipt {
                transaction,
                cash_after,
                shares_held,
            })
        })
        .await
    }
}
