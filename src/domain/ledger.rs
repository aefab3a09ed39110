use std::collections::HashMap;

use super::{Account, Amount, Currency, Transaction, UserId};

/// Replay settled log rows into per-user, per-currency balances.
/// Rows still awaiting approval contribute nothing.
pub fn replay_balances(transactions: &[Transaction]) -> HashMap<(UserId, Currency), Amount> {
    let mut balances: HashMap<(UserId, Currency), Amount> = HashMap::new();

    for tx in transactions.iter().filter(|tx| tx.settled) {
        *balances.entry((tx.user_id, tx.currency)).or_insert(0) += tx.settled_effect();
    }

    balances
}

/// Sum of amounts per currency. Used when one approval credits several rows.
pub fn sum_by_currency<'a>(
    transactions: impl IntoIterator<Item = &'a Transaction>,
) -> Vec<(Currency, Amount)> {
    let mut sums: HashMap<Currency, Amount> = HashMap::new();
    for tx in transactions {
        *sums.entry(tx.currency).or_insert(0) += tx.amount;
    }
    let mut sums: Vec<_> = sums.into_iter().collect();
    sums.sort_by_key(|(currency, _)| *currency);
    sums
}

/// A stored balance that does not match what the log says it should be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceDrift {
    pub user_id: UserId,
    pub currency: Currency,
    pub stored: Amount,
    pub replayed: Amount,
}

#[derive(Debug, Clone)]
pub struct IntegrityReport {
    pub account_count: usize,
    pub transaction_count: usize,
    pub pending_count: usize,
    pub open_request_count: usize,
    pub drifts: Vec<BalanceDrift>,
    pub issues: Vec<String>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

pub fn build_integrity_report(
    accounts: &[Account],
    transactions: &[Transaction],
) -> IntegrityReport {
    let replayed = replay_balances(transactions);
    let mut drifts = Vec::new();
    let mut issues = Vec::new();

    for account in accounts {
        for (currency, stored) in account.balances() {
            if stored < 0 {
                issues.push(format!(
                    "User {} has a negative {} balance: {}",
                    account.user_id, currency, stored
                ));
            }
            let expected = replayed
                .get(&(account.user_id, currency))
                .copied()
                .unwrap_or(0);
            if expected != stored {
                drifts.push(BalanceDrift {
                    user_id: account.user_id,
                    currency,
                    stored,
                    replayed: expected,
                });
            }
        }
    }

    for drift in &drifts {
        issues.push(format!(
            "User {} {} balance is {} but the log sums to {}",
            drift.user_id, drift.currency, drift.stored, drift.replayed
        ));
    }

    let known: std::collections::HashSet<UserId> = accounts.iter().map(|a| a.user_id).collect();
    let orphaned = transactions
        .iter()
        .filter(|tx| !known.contains(&tx.user_id))
        .count();
    if orphaned > 0 {
        issues.push(format!(
            "{} transaction(s) reference users without an account",
            orphaned
        ));
    }

    IntegrityReport {
        account_count: accounts.len(),
        transaction_count: transactions.len(),
        pending_count: transactions.iter().filter(|tx| tx.is_pending()).count(),
        open_request_count: transactions.iter().filter(|tx| tx.is_open_request()).count(),
        drifts,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::{TransactionKind, TransactionStatus};

    fn row(id: i64, user_id: UserId, kind: TransactionKind, amount: Amount) -> Transaction {
        Transaction {
            id,
            user_id,
            kind,
            amount,
            currency: Currency::Yen,
            reason: String::new(),
            timestamp: Utc::now(),
            status: None,
            settled: true,
        }
    }

    #[test]
    fn test_replay_empty() {
        assert!(replay_balances(&[]).is_empty());
    }

    #[test]
    fn test_replay_mixed_kinds() {
        let rows = vec![
            row(1, 1, TransactionKind::Deposit, 100),
            row(2, 1, TransactionKind::Spend, 30),
            row(3, 1, TransactionKind::TransferOut, 20),
            row(4, 2, TransactionKind::TransferIn, 20),
            row(5, 1, TransactionKind::AdminRemove, -10),
        ];
        let balances = replay_balances(&rows);
        assert_eq!(balances.get(&(1, Currency::Yen)), Some(&40));
        assert_eq!(balances.get(&(2, Currency::Yen)), Some(&20));
    }

    #[test]
    fn test_replay_ignores_unsettled_rows() {
        let mut pending = row(1, 1, TransactionKind::Deposit, 500);
        pending.settled = false;
        pending.status = Some(TransactionStatus::Pending);
        let balances = replay_balances(&[pending]);
        assert_eq!(balances.get(&(1, Currency::Yen)), None);
    }

    #[test]
    fn test_sum_by_currency() {
        let mut sp = row(2, 1, TransactionKind::Deposit, 30);
        sp.currency = Currency::Sp;
        let rows = vec![
            row(1, 1, TransactionKind::Deposit, 50),
            sp,
            row(3, 1, TransactionKind::Deposit, 5),
        ];
        assert_eq!(
            sum_by_currency(&rows),
            vec![(Currency::Sp, 30), (Currency::Yen, 55)]
        );
    }

    #[test]
    fn test_report_detects_drift() {
        let account = Account {
            yen: 90,
            ..Account::new(1)
        };
        let rows = vec![row(1, 1, TransactionKind::Deposit, 100)];
        let report = build_integrity_report(&[account], &rows);

        assert!(!report.is_healthy());
        assert_eq!(
            report.drifts,
            vec![BalanceDrift {
                user_id: 1,
                currency: Currency::Yen,
                stored: 90,
                replayed: 100,
            }]
        );
    }

    #[test]
    fn test_report_healthy_ledger() {
        let account = Account {
            yen: 100,
            ..Account::new(1)
        };
        let rows = vec![row(1, 1, TransactionKind::Deposit, 100)];
        let report = build_integrity_report(&[account], &rows);
        assert!(report.is_healthy());
        assert_eq!(report.account_count, 1);
        assert_eq!(report.transaction_count, 1);
    }
}
