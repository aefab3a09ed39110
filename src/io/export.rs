use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::LedgerService;
use crate::domain::{Account, Caller, Transaction};

/// Database snapshot for full export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub accounts: Vec<Account>,
    pub transactions: Vec<Transaction>,
}

/// Exporter for writing ledger data out for audit. Every export is admin-only.
pub struct Exporter<'a> {
    service: &'a LedgerService,
    caller: Caller,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService, caller: Caller) -> Self {
        Self { service, caller }
    }

    /// Export the transaction log to CSV format
    pub async fn export_transactions_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let transactions = self.service.all_transactions(&self.caller).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "user_id",
            "kind",
            "amount",
            "currency",
            "reason",
            "timestamp",
            "status",
        ])?;

        for tx in &transactions {
            csv_writer.write_record([
                tx.id.to_string(),
                tx.user_id.to_string(),
                tx.kind.as_str().to_string(),
                tx.amount.to_string(),
                tx.currency.as_str().to_string(),
                tx.reason.clone(),
                tx.timestamp.to_rfc3339(),
                tx.status.map(|s| s.as_str().to_string()).unwrap_or_default(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(transactions.len())
    }

    /// Export the transaction log as a JSON array
    pub async fn export_transactions_json<W: Write>(&self, mut writer: W) -> Result<usize> {
        let transactions = self.service.all_transactions(&self.caller).await?;
        serde_json::to_writer_pretty(&mut writer, &transactions)?;
        writer.flush()?;
        Ok(transactions.len())
    }

    /// Export balances to CSV format
    pub async fn export_balances_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let accounts = self.service.all_balances(&self.caller).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["user_id", "ap", "sp", "yen", "reputation"])?;

        for account in &accounts {
            csv_writer.write_record([
                account.user_id.to_string(),
                account.ap.to_string(),
                account.sp.to_string(),
                account.yen.to_string(),
                account.reputation.to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(accounts.len())
    }

    /// Export balances and the full log as one JSON snapshot
    pub async fn export_full_json<W: Write>(&self, mut writer: W) -> Result<LedgerSnapshot> {
        let snapshot = LedgerSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            accounts: self.service.all_balances(&self.caller).await?,
            transactions: self.service.all_transactions(&self.caller).await?,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
