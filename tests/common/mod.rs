// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use guildbank::application::LedgerService;
use guildbank::domain::{Caller, UserId};
use tempfile::TempDir;

pub const ADMIN: UserId = 1;
pub const ALICE: UserId = 100;
pub const BOB: UserId = 200;
pub const CAROL: UserId = 300;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LedgerService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

pub fn admin() -> Caller {
    Caller::admin(ADMIN)
}

pub fn user(user_id: UserId) -> Caller {
    Caller::user(user_id)
}

/// Read a balance as the user themselves.
pub async fn balance_of(service: &LedgerService, user_id: UserId, currency: &str) -> Result<i64> {
    Ok(service.balance(&user(user_id), user_id, currency).await?)
}

/// Number of log rows for a user.
pub async fn log_len(service: &LedgerService, user_id: UserId) -> Result<usize> {
    Ok(service.history(&admin(), user_id, 1_000).await?.len())
}

/// Fund a user directly through their own deposit.
pub async fn fund(
    service: &LedgerService,
    user_id: UserId,
    currency: &str,
    amount: i64,
) -> Result<()> {
    service
        .deposit(&user(user_id), currency, amount, Some("seed"))
        .await?;
    Ok(())
}
