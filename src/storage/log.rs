//! Transaction log: append-only history with a one-shot status column.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection};

use crate::domain::{
    Currency, NewTransaction, Transaction, TransactionId, TransactionKind, TransactionStatus,
    UserId,
};

const TRANSACTION_COLUMNS: &str =
    "id, user_id, kind, amount, currency, reason, timestamp, status, settled";

/// Filter matching unresolved reason-keyed deposit requests.
const OPEN_REQUEST_FILTER: &str =
    "user_id = ? AND reason = ? AND kind = 'deposit' AND status IS NULL AND settled = 0";

/// Append a row and return its id.
pub async fn append(conn: &mut SqliteConnection, tx: &NewTransaction) -> Result<TransactionId> {
    let result = sqlx::query(
        r#"
        INSERT INTO transactions
            (user_id, kind, amount, currency, reason, timestamp, status, settled)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(tx.user_id)
    .bind(tx.kind.as_str())
    .bind(tx.amount)
    .bind(tx.currency.as_str())
    .bind(&tx.reason)
    .bind(tx.timestamp.to_rfc3339())
    .bind(tx.status.map(|s| s.as_str()))
    .bind(tx.settled)
    .execute(&mut *conn)
    .await
    .context("Failed to append transaction")?;

    Ok(result.last_insert_rowid())
}

/// Most recent rows for a user, newest first.
pub async fn list_recent(
    conn: &mut SqliteConnection,
    user_id: UserId,
    limit: usize,
) -> Result<Vec<Transaction>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM transactions WHERE user_id = ? ORDER BY id DESC LIMIT ?",
        TRANSACTION_COLUMNS
    ))
    .bind(user_id)
    .bind(limit as i64)
    .fetch_all(&mut *conn)
    .await
    .context("Failed to list recent transactions")?;

    rows.iter().map(row_to_transaction).collect()
}

/// Every row awaiting approval by id, oldest first.
pub async fn list_pending(conn: &mut SqliteConnection) -> Result<Vec<Transaction>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM transactions WHERE status = ? ORDER BY id",
        TRANSACTION_COLUMNS
    ))
    .bind(TransactionStatus::Pending.as_str())
    .fetch_all(&mut *conn)
    .await
    .context("Failed to list pending transactions")?;

    rows.iter().map(row_to_transaction).collect()
}

/// Unresolved deposit requests filed by `user_id` under `reason`.
pub async fn find_pending(
    conn: &mut SqliteConnection,
    user_id: UserId,
    reason: &str,
) -> Result<Vec<Transaction>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM transactions WHERE {} ORDER BY id",
        TRANSACTION_COLUMNS, OPEN_REQUEST_FILTER
    ))
    .bind(user_id)
    .bind(reason)
    .fetch_all(&mut *conn)
    .await
    .context("Failed to find deposit requests")?;

    rows.iter().map(row_to_transaction).collect()
}

/// A single row, only if it is still PENDING.
pub async fn get_pending(
    conn: &mut SqliteConnection,
    id: TransactionId,
) -> Result<Option<Transaction>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM transactions WHERE id = ? AND status = ?",
        TRANSACTION_COLUMNS
    ))
    .bind(id)
    .bind(TransactionStatus::Pending.as_str())
    .fetch_optional(&mut *conn)
    .await
    .context("Failed to fetch pending transaction")?;

    row.as_ref().map(row_to_transaction).transpose()
}

/// Move a PENDING row to a terminal status. Returns false when the row was
/// not pending, so a status can never be written twice.
pub async fn set_status(
    conn: &mut SqliteConnection,
    id: TransactionId,
    status: TransactionStatus,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE transactions
        SET status = ?, settled = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(status.as_str())
    .bind(status == TransactionStatus::Approved)
    .bind(id)
    .bind(TransactionStatus::Pending.as_str())
    .execute(&mut *conn)
    .await
    .context("Failed to update transaction status")?;

    Ok(result.rows_affected() == 1)
}

/// Resolve every open request of `user_id` filed under `reason` at once.
/// Returns the number of rows transitioned.
pub async fn set_status_for_requests(
    conn: &mut SqliteConnection,
    user_id: UserId,
    reason: &str,
    status: TransactionStatus,
) -> Result<u64> {
    let result = sqlx::query(&format!(
        "UPDATE transactions SET status = ?, settled = ? WHERE {}",
        OPEN_REQUEST_FILTER
    ))
    .bind(status.as_str())
    .bind(status == TransactionStatus::Approved)
    .bind(user_id)
    .bind(reason)
    .execute(&mut *conn)
    .await
    .context("Failed to resolve deposit requests")?;

    Ok(result.rows_affected())
}

/// The whole log in insertion order.
pub async fn list_all(conn: &mut SqliteConnection) -> Result<Vec<Transaction>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM transactions ORDER BY id",
        TRANSACTION_COLUMNS
    ))
    .fetch_all(&mut *conn)
    .await
    .context("Failed to list transactions")?;

    rows.iter().map(row_to_transaction).collect()
}

fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> Result<Transaction> {
    let kind_str: String = row.get("kind");
    let currency_str: String = row.get("currency");
    let timestamp_str: String = row.get("timestamp");
    let status_str: Option<String> = row.get("status");

    Ok(Transaction {
        id: row.get("id"),
        user_id: row.get("user_id"),
        kind: TransactionKind::from_str(&kind_str)
            .ok_or_else(|| anyhow::anyhow!("Invalid transaction kind: {}", kind_str))?,
        amount: row.get("amount"),
        currency: Currency::from_str(&currency_str)
            .ok_or_else(|| anyhow::anyhow!("Invalid currency: {}", currency_str))?,
        reason: row.get("reason"),
        timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
            .context("Invalid timestamp")?
            .with_timezone(&Utc),
        status: status_str
            .map(|s| {
                TransactionStatus::from_str(&s)
                    .ok_or_else(|| anyhow::anyhow!("Invalid transaction status: {}", s))
            })
            .transpose()?,
        settled: row.get::<i32, _>("settled") != 0,
    })
}
