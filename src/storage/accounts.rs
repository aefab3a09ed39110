//! Ledger store: the current-balance projection, one row per user.
//!
//! Every function takes a borrowed connection so the caller decides the
//! transaction scope. Balances are addressed through [`Currency`], which maps
//! to a fixed column name; no caller text is ever spliced into SQL.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection};

use crate::domain::{Account, Amount, Currency, UserId};

const ACCOUNT_COLUMNS: &str = "user_id, ap, sp, yen, reputation, created_at";

/// Fetch an account, creating it with zero balances if it does not exist yet.
pub async fn ensure_account(conn: &mut SqliteConnection, user_id: UserId) -> Result<Account> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO accounts (user_id, ap, sp, yen, reputation, created_at)
        VALUES (?, 0, 0, 0, 0, ?)
        "#,
    )
    .bind(user_id)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *conn)
    .await
    .context("Failed to materialize account")?;

    get_account(conn, user_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Account {} vanished after insert", user_id))
}

/// Get an account without creating it.
pub async fn get_account(conn: &mut SqliteConnection, user_id: UserId) -> Result<Option<Account>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM accounts WHERE user_id = ?",
        ACCOUNT_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await
    .context("Failed to fetch account")?;

    row.as_ref().map(row_to_account).transpose()
}

/// Current balance of one currency, materializing the account if needed.
pub async fn get_balance(
    conn: &mut SqliteConnection,
    user_id: UserId,
    currency: Currency,
) -> Result<Amount> {
    let account = ensure_account(conn, user_id).await?;
    Ok(account.balance(currency))
}

/// Overwrite one balance. The caller computes `amount` from a prior read in
/// the same transaction; negative values are rejected by the schema.
pub async fn set_balance(
    conn: &mut SqliteConnection,
    user_id: UserId,
    currency: Currency,
    amount: Amount,
) -> Result<()> {
    let result = sqlx::query(&format!(
        "UPDATE accounts SET {} = ? WHERE user_id = ?",
        currency.column()
    ))
    .bind(amount)
    .bind(user_id)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("Failed to set {} balance for user {}", currency, user_id))?;

    if result.rows_affected() == 0 {
        anyhow::bail!("No account for user {}", user_id);
    }
    Ok(())
}

/// All materialized accounts, ordered by user id.
pub async fn list_accounts(conn: &mut SqliteConnection) -> Result<Vec<Account>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM accounts ORDER BY user_id",
        ACCOUNT_COLUMNS
    ))
    .fetch_all(&mut *conn)
    .await
    .context("Failed to list accounts")?;

    rows.iter().map(row_to_account).collect()
}

fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Result<Account> {
    let created_at_str: String = row.get("created_at");

    Ok(Account {
        user_id: row.get("user_id"),
        ap: row.get("ap"),
        sp: row.get("sp"),
        yen: row.get("yen"),
        reputation: row.get("reputation"),
        created_at: DateTime::parse_from_rfc3339(&created_at_str)
            .context("Invalid created_at timestamp")?
            .with_timezone(&Utc),
    })
}
