use chrono::Utc;
use sqlx::SqliteConnection;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{
    build_integrity_report, format_amount, parse_amount, sum_by_currency, Account, Amount,
    Caller, Currency, IntegrityReport, NewTransaction, Transaction, TransactionId,
    TransactionKind, TransactionStatus, UserId,
};
use crate::storage::{accounts, log, Repository};

use super::AppError;

/// Reason recorded when the caller gives none.
pub const DEFAULT_REASON: &str = "No reason provided";

/// Number of rows `history` returns when no limit is given.
pub const DEFAULT_HISTORY_LIMIT: usize = 5;

/// Application service providing the balance operations and approval workflow.
/// This is the primary interface for any command surface (chat bot, CLI, ...).
pub struct LedgerService {
    repo: Repository,
    /// Serializes every read-modify-write sequence against the store.
    write_lock: Mutex<()>,
}

/// A committed change to one balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceChange {
    pub user_id: UserId,
    pub currency: Currency,
    /// Signed delta actually applied
    pub delta: Amount,
    pub new_balance: Amount,
    pub transaction_id: TransactionId,
}

/// Result of a peer-to-peer transfer
#[derive(Debug, Clone)]
pub struct TransferResult {
    pub sender: BalanceChange,
    pub receiver: BalanceChange,
}

/// A batch item that failed validation.
#[derive(Debug)]
pub struct ItemFailure {
    pub item: String,
    pub error: AppError,
}

/// A batch item that was deliberately left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub user_id: UserId,
    pub reason: String,
}

/// Item-by-item result of a batch operation.
#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub succeeded: Vec<T>,
    pub skipped: Vec<SkippedItem>,
    pub failed: Vec<ItemFailure>,
}

impl<T> BatchOutcome<T> {
    fn new() -> Self {
        Self {
            succeeded: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.failed.is_empty()
    }
}

/// A pending deposit after an admin acted on it
#[derive(Debug, Clone)]
pub struct ResolvedDeposit {
    pub transaction: Transaction,
    /// Balance after crediting; `None` when the deposit was denied
    pub new_balance: Option<Amount>,
}

/// Message the command surface should deliver to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub user_id: UserId,
    pub message: String,
}

/// Result of approving or rejecting requests by (user, reason).
#[derive(Debug, Clone)]
pub struct RequestResolution {
    pub user_id: UserId,
    pub reason: String,
    pub resolved: Vec<Transaction>,
    /// Total credited per currency; empty on rejection
    pub credited: Vec<(Currency, Amount)>,
    pub notice: Option<Notice>,
}

impl RequestResolution {
    /// True when no open request matched.
    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}

/// Validate a currency code, ignoring case.
pub fn parse_currency(code: &str) -> Result<Currency, AppError> {
    Currency::from_str(code).ok_or_else(|| AppError::InvalidCurrency(code.trim().to_string()))
}

/// Parse a user-supplied amount.
pub fn parse_amount_arg(input: &str) -> Result<Amount, AppError> {
    parse_amount(input).map_err(|e| AppError::InvalidAmount(e.to_string()))
}

fn require_positive(amount: Amount) -> Result<(), AppError> {
    if amount <= 0 {
        return Err(AppError::InvalidAmount(format!(
            "Amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}

fn require_admin(caller: &Caller) -> Result<(), AppError> {
    if !caller.is_admin {
        return Err(AppError::PermissionDenied(caller.user_id));
    }
    Ok(())
}

fn require_access(caller: &Caller, user_id: UserId) -> Result<(), AppError> {
    if !caller.can_access(user_id) {
        return Err(AppError::PermissionDenied(caller.user_id));
    }
    Ok(())
}

fn reason_or_default(reason: Option<&str>) -> String {
    match reason.map(str::trim) {
        Some(r) if !r.is_empty() => r.to_string(),
        _ => DEFAULT_REASON.to_string(),
    }
}

fn checked_credit(balance: Amount, amount: Amount) -> Result<Amount, AppError> {
    balance
        .checked_add(amount)
        .ok_or_else(|| AppError::InvalidAmount(format!("Crediting {} would overflow", amount)))
}

/// Keep the first occurrence of each user id.
fn dedup_targets(targets: &[UserId]) -> Vec<UserId> {
    let mut seen = std::collections::HashSet::new();
    targets.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Credit one balance and log the row, inside the caller's transaction.
async fn credit(
    conn: &mut SqliteConnection,
    tx: NewTransaction,
) -> Result<BalanceChange, AppError> {
    let balance = accounts::get_balance(conn, tx.user_id, tx.currency).await?;
    let new_balance = checked_credit(balance, tx.amount)?;
    accounts::set_balance(conn, tx.user_id, tx.currency, new_balance).await?;
    let transaction_id = log::append(conn, &tx).await?;

    Ok(BalanceChange {
        user_id: tx.user_id,
        currency: tx.currency,
        delta: tx.amount,
        new_balance,
        transaction_id,
    })
}

/// Credit each target in turn. Storage failures abort; anything else is
/// recorded against the target and the loop moves on.
async fn grant_each(
    conn: &mut SqliteConnection,
    targets: &[UserId],
    kind: TransactionKind,
    amount: Amount,
    currency: Currency,
    reason: &str,
) -> Result<BatchOutcome<BalanceChange>, AppError> {
    let now = Utc::now();
    let mut outcome = BatchOutcome::new();

    for &target in targets {
        let result = credit(
            conn,
            NewTransaction::new(target, kind, amount, currency)
                .with_reason(reason)
                .with_timestamp(now),
        )
        .await;
        match result {
            Ok(change) => outcome.succeeded.push(change),
            Err(AppError::Database(err)) => return Err(AppError::Database(err)),
            Err(error) => {
                warn!(user_id = target, %kind, error = %error, "grant item failed");
                outcome.failed.push(ItemFailure {
                    item: target.to_string(),
                    error,
                });
            }
        }
    }

    Ok(outcome)
}

impl LedgerService {
    /// Create a new ledger service over an injected repository.
    pub fn new(repo: Repository) -> Self {
        Self {
            repo,
            write_lock: Mutex::new(()),
        }
    }

    /// Create (if needed) and migrate the database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    pub async fn close(&self) {
        self.repo.close().await;
    }

    // ========================
    // Balance queries
    // ========================

    /// All balances of a user, materializing the account on first access.
    pub async fn get_account(&self, caller: &Caller, user_id: UserId) -> Result<Account, AppError> {
        require_access(caller, user_id)?;
        let _guard = self.write_lock.lock().await;
        let mut tx = self.repo.begin().await?;
        let account = accounts::ensure_account(&mut tx, user_id).await?;
        tx.commit().await?;
        debug!(user_id, "loaded account");
        Ok(account)
    }

    /// One balance of a user.
    pub async fn balance(
        &self,
        caller: &Caller,
        user_id: UserId,
        currency: &str,
    ) -> Result<Amount, AppError> {
        let currency = parse_currency(currency)?;
        Ok(self.get_account(caller, user_id).await?.balance(currency))
    }

    /// Every materialized account (admin only).
    pub async fn all_balances(&self, caller: &Caller) -> Result<Vec<Account>, AppError> {
        require_admin(caller)?;
        let mut conn = self.repo.acquire().await?;
        Ok(accounts::list_accounts(&mut conn).await?)
    }

    /// Most recent transactions of a user, newest first.
    pub async fn history(
        &self,
        caller: &Caller,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<Transaction>, AppError> {
        require_access(caller, user_id)?;
        let mut conn = self.repo.acquire().await?;
        Ok(log::list_recent(&mut conn, user_id, limit).await?)
    }

    // ========================
    // Balance operations
    // ========================

    /// Credit the caller immediately, without approval.
    pub async fn deposit(
        &self,
        caller: &Caller,
        currency: &str,
        amount: Amount,
        reason: Option<&str>,
    ) -> Result<BalanceChange, AppError> {
        let currency = parse_currency(currency)?;
        require_positive(amount)?;

        let _guard = self.write_lock.lock().await;
        let mut tx = self.repo.begin().await?;
        let change = credit(
            &mut tx,
            NewTransaction::new(caller.user_id, TransactionKind::Deposit, amount, currency)
                .with_reason(reason_or_default(reason)),
        )
        .await?;
        tx.commit().await?;

        info!(
            user_id = caller.user_id,
            %currency,
            amount,
            transaction_id = change.transaction_id,
            "deposit"
        );
        Ok(change)
    }

    /// Record a batch of deposits awaiting approval by id. `currencies` and
    /// `amounts` are comma separated and paired by position. The batch is
    /// validated as a whole and written in one transaction, so either every
    /// row is created or none is. Balances are untouched.
    pub async fn request_deposits(
        &self,
        caller: &Caller,
        currencies: &str,
        amounts: &str,
        reason: Option<&str>,
    ) -> Result<Vec<Transaction>, AppError> {
        let codes: Vec<&str> = currencies.split(',').map(str::trim).collect();
        let raw_amounts: Vec<&str> = amounts.split(',').map(str::trim).collect();
        if codes.len() != raw_amounts.len() {
            return Err(AppError::MismatchedBatchLengths {
                currencies: codes.len(),
                amounts: raw_amounts.len(),
            });
        }

        let mut items = Vec::with_capacity(codes.len());
        for (code, raw) in codes.iter().zip(&raw_amounts) {
            let currency = parse_currency(code)?;
            let amount = parse_amount_arg(raw)
                .map_err(|_| AppError::InvalidAmount(format!("'{}' for {}", raw, currency)))?;
            require_positive(amount)?;
            items.push((currency, amount));
        }

        let reason = reason_or_default(reason);
        let now = Utc::now();

        let _guard = self.write_lock.lock().await;
        let mut tx = self.repo.begin().await?;
        accounts::ensure_account(&mut tx, caller.user_id).await?;

        let mut created = Vec::with_capacity(items.len());
        for (currency, amount) in items {
            let new_tx = NewTransaction::pending_deposit(caller.user_id, amount, currency)
                .with_reason(reason.clone())
                .with_timestamp(now);
            let id = log::append(&mut tx, &new_tx).await?;
            created.push(new_tx.recorded(id));
        }
        tx.commit().await?;

        info!(
            user_id = caller.user_id,
            count = created.len(),
            reason = %reason,
            "pending deposits recorded"
        );
        Ok(created)
    }

    /// Record a deposit request to be resolved later by (user, reason).
    pub async fn request_deposit(
        &self,
        caller: &Caller,
        currency: &str,
        amount: Amount,
        reason: Option<&str>,
    ) -> Result<Transaction, AppError> {
        let currency = parse_currency(currency)?;
        require_positive(amount)?;
        let new_tx = NewTransaction::deposit_request(caller.user_id, amount, currency)
            .with_reason(reason_or_default(reason));

        let _guard = self.write_lock.lock().await;
        let mut tx = self.repo.begin().await?;
        accounts::ensure_account(&mut tx, caller.user_id).await?;
        let id = log::append(&mut tx, &new_tx).await?;
        tx.commit().await?;

        info!(
            user_id = caller.user_id,
            %currency,
            amount,
            transaction_id = id,
            "deposit requested"
        );
        Ok(new_tx.recorded(id))
    }

    /// Debit the caller. Fails without side effects when the balance is too low.
    pub async fn spend(
        &self,
        caller: &Caller,
        currency: &str,
        amount: Amount,
        reason: Option<&str>,
    ) -> Result<BalanceChange, AppError> {
        let currency = parse_currency(currency)?;
        require_positive(amount)?;

        let _guard = self.write_lock.lock().await;
        let mut tx = self.repo.begin().await?;
        let balance = accounts::get_balance(&mut tx, caller.user_id, currency).await?;
        if amount > balance {
            return Err(AppError::InsufficientFunds {
                user_id: caller.user_id,
                currency,
                balance,
                required: amount,
            });
        }

        let new_balance = balance - amount;
        accounts::set_balance(&mut tx, caller.user_id, currency, new_balance).await?;
        let transaction_id = log::append(
            &mut tx,
            &NewTransaction::new(caller.user_id, TransactionKind::Spend, amount, currency)
                .with_reason(reason_or_default(reason)),
        )
        .await?;
        tx.commit().await?;

        info!(user_id = caller.user_id, %currency, amount, transaction_id, "spend");
        Ok(BalanceChange {
            user_id: caller.user_id,
            currency,
            delta: -amount,
            new_balance,
            transaction_id,
        })
    }

    /// Move yen from the caller to another user. Both legs and both log rows
    /// commit together.
    pub async fn transfer(
        &self,
        caller: &Caller,
        receiver: UserId,
        amount: Amount,
    ) -> Result<TransferResult, AppError> {
        let sender = caller.user_id;
        if sender == receiver {
            return Err(AppError::SelfTransfer);
        }
        require_positive(amount)?;
        let currency = Currency::Yen;

        let _guard = self.write_lock.lock().await;
        let mut tx = self.repo.begin().await?;
        let sender_balance = accounts::get_balance(&mut tx, sender, currency).await?;
        if amount > sender_balance {
            return Err(AppError::InsufficientFunds {
                user_id: sender,
                currency,
                balance: sender_balance,
                required: amount,
            });
        }

        let new_sender_balance = sender_balance - amount;
        accounts::set_balance(&mut tx, sender, currency, new_sender_balance).await?;
        let out_id = log::append(
            &mut tx,
            &NewTransaction::new(sender, TransactionKind::TransferOut, amount, currency)
                .with_reason(format!("Sent to user {}", receiver)),
        )
        .await?;

        let receiver_change = credit(
            &mut tx,
            NewTransaction::new(receiver, TransactionKind::TransferIn, amount, currency)
                .with_reason(format!("Received from user {}", sender)),
        )
        .await?;
        tx.commit().await?;

        info!(sender, receiver, amount, "yen transfer");
        Ok(TransferResult {
            sender: BalanceChange {
                user_id: sender,
                currency,
                delta: -amount,
                new_balance: new_sender_balance,
                transaction_id: out_id,
            },
            receiver: receiver_change,
        })
    }

    // ========================
    // Admin adjustments
    // ========================

    /// Credit a single user.
    pub async fn give(
        &self,
        caller: &Caller,
        target: UserId,
        currency: &str,
        amount: Amount,
    ) -> Result<BalanceChange, AppError> {
        require_admin(caller)?;
        let currency = parse_currency(currency)?;
        require_positive(amount)?;

        let _guard = self.write_lock.lock().await;
        let mut tx = self.repo.begin().await?;
        let change = credit(
            &mut tx,
            NewTransaction::new(target, TransactionKind::AdminGive, amount, currency)
                .with_reason(format!("Given by user {}", caller.user_id)),
        )
        .await?;
        tx.commit().await?;

        info!(admin = caller.user_id, target, %currency, amount, "admin give");
        Ok(change)
    }

    /// Credit every materialized account. An account that cannot take the
    /// credit is reported per item; the others are still credited.
    pub async fn give_all(
        &self,
        caller: &Caller,
        currency: &str,
        amount: Amount,
    ) -> Result<BatchOutcome<BalanceChange>, AppError> {
        require_admin(caller)?;
        let currency = parse_currency(currency)?;
        require_positive(amount)?;
        let reason = format!("Given to all users by user {}", caller.user_id);

        let _guard = self.write_lock.lock().await;
        let mut tx = self.repo.begin().await?;
        let targets: Vec<UserId> = accounts::list_accounts(&mut tx)
            .await?
            .into_iter()
            .map(|account| account.user_id)
            .collect();
        let outcome = grant_each(
            &mut tx,
            &targets,
            TransactionKind::AdminGiveall,
            amount,
            currency,
            &reason,
        )
        .await?;
        tx.commit().await?;

        info!(
            admin = caller.user_id,
            %currency,
            amount,
            users = outcome.succeeded.len(),
            "admin give all"
        );
        Ok(outcome)
    }

    /// Credit several users at once.
    pub async fn multi_give(
        &self,
        caller: &Caller,
        currency: &str,
        amount: Amount,
        targets: &[UserId],
    ) -> Result<BatchOutcome<BalanceChange>, AppError> {
        require_admin(caller)?;
        let currency = parse_currency(currency)?;
        require_positive(amount)?;
        let reason = format!("Given by user {}", caller.user_id);

        let _guard = self.write_lock.lock().await;
        let mut tx = self.repo.begin().await?;
        let outcome = grant_each(
            &mut tx,
            &dedup_targets(targets),
            TransactionKind::AdminMultiGive,
            amount,
            currency,
            &reason,
        )
        .await?;
        tx.commit().await?;

        info!(
            admin = caller.user_id,
            %currency,
            amount,
            users = outcome.succeeded.len(),
            "admin multi give"
        );
        Ok(outcome)
    }

    /// Debit one or more users, clamping at zero. Users already at zero are
    /// skipped and nothing is logged for them.
    pub async fn remove(
        &self,
        caller: &Caller,
        currency: &str,
        amount: Amount,
        targets: &[UserId],
    ) -> Result<BatchOutcome<BalanceChange>, AppError> {
        require_admin(caller)?;
        let currency = parse_currency(currency)?;
        require_positive(amount)?;
        let reason = format!("Removed by user {}", caller.user_id);
        let now = Utc::now();

        let _guard = self.write_lock.lock().await;
        let mut tx = self.repo.begin().await?;
        let mut outcome = BatchOutcome::new();

        for target in dedup_targets(targets) {
            let balance = accounts::get_balance(&mut tx, target, currency).await?;
            if balance == 0 {
                warn!(target, %currency, "remove skipped, balance already zero");
                outcome.skipped.push(SkippedItem {
                    user_id: target,
                    reason: format!("already has {}", format_amount(currency, 0)),
                });
                continue;
            }

            let new_balance = (balance - amount).max(0);
            let removed = balance - new_balance;
            accounts::set_balance(&mut tx, target, currency, new_balance).await?;
            let transaction_id = log::append(
                &mut tx,
                &NewTransaction::new(target, TransactionKind::AdminRemove, -removed, currency)
                    .with_reason(reason.clone())
                    .with_timestamp(now),
            )
            .await?;

            outcome.succeeded.push(BalanceChange {
                user_id: target,
                currency,
                delta: -removed,
                new_balance,
                transaction_id,
            });
        }
        tx.commit().await?;

        info!(
            admin = caller.user_id,
            %currency,
            amount,
            removed_from = outcome.succeeded.len(),
            skipped = outcome.skipped.len(),
            "admin remove"
        );
        Ok(outcome)
    }

    // ========================
    // Approval workflow
    // ========================

    /// Every deposit awaiting approval by id (admin only).
    pub async fn pending_deposits(&self, caller: &Caller) -> Result<Vec<Transaction>, AppError> {
        require_admin(caller)?;
        let mut conn = self.repo.acquire().await?;
        Ok(log::list_pending(&mut conn).await?)
    }

    /// Approve or deny pending deposits by id. Unknown, already resolved and
    /// malformed ids are reported per item; the rest still go through.
    pub async fn resolve_pending(
        &self,
        caller: &Caller,
        ids: &[String],
        approve: bool,
    ) -> Result<BatchOutcome<ResolvedDeposit>, AppError> {
        require_admin(caller)?;
        let status = if approve {
            TransactionStatus::Approved
        } else {
            TransactionStatus::Denied
        };

        let _guard = self.write_lock.lock().await;
        let mut tx = self.repo.begin().await?;
        let mut outcome = BatchOutcome::new();

        for raw in ids {
            let raw = raw.trim();
            let id: TransactionId = match raw.parse() {
                Ok(id) => id,
                Err(_) => {
                    warn!(id = raw, "malformed transaction id");
                    outcome.failed.push(ItemFailure {
                        item: raw.to_string(),
                        error: AppError::InvalidAmount(format!(
                            "'{}' is not a transaction id",
                            raw
                        )),
                    });
                    continue;
                }
            };

            let Some(mut pending) = log::get_pending(&mut tx, id).await? else {
                warn!(id, "no pending transaction");
                outcome.failed.push(ItemFailure {
                    item: raw.to_string(),
                    error: AppError::NoSuchPendingTransaction(raw.to_string()),
                });
                continue;
            };

            let mut new_balance = None;
            if approve {
                let balance =
                    accounts::get_balance(&mut tx, pending.user_id, pending.currency).await?;
                let credited = match checked_credit(balance, pending.amount) {
                    Ok(credited) => credited,
                    Err(error) => {
                        outcome.failed.push(ItemFailure {
                            item: raw.to_string(),
                            error,
                        });
                        continue;
                    }
                };
                accounts::set_balance(&mut tx, pending.user_id, pending.currency, credited)
                    .await?;
                new_balance = Some(credited);
            }

            if !log::set_status(&mut tx, id, status).await? {
                return Err(AppError::Database(anyhow::anyhow!(
                    "Transaction {} changed status mid-approval",
                    id
                )));
            }
            pending.status = Some(status);
            pending.settled = approve;

            info!(
                admin = caller.user_id,
                transaction_id = id,
                user_id = pending.user_id,
                status = %status,
                "pending deposit resolved"
            );
            outcome.succeeded.push(ResolvedDeposit {
                transaction: pending,
                new_balance,
            });
        }
        tx.commit().await?;

        Ok(outcome)
    }

    /// Approve every open request `user_id` filed under `reason`, crediting
    /// the summed amount per currency.
    pub async fn approve_requests(
        &self,
        caller: &Caller,
        user_id: UserId,
        reason: &str,
    ) -> Result<RequestResolution, AppError> {
        require_admin(caller)?;

        let _guard = self.write_lock.lock().await;
        let mut tx = self.repo.begin().await?;
        let mut matching = log::find_pending(&mut tx, user_id, reason).await?;
        if matching.is_empty() {
            debug!(user_id, reason, "no matching deposit requests");
            return Ok(RequestResolution {
                user_id,
                reason: reason.to_string(),
                resolved: Vec::new(),
                credited: Vec::new(),
                notice: None,
            });
        }

        let credited = sum_by_currency(&matching);
        for (currency, amount) in &credited {
            let balance = accounts::get_balance(&mut tx, user_id, *currency).await?;
            let new_balance = checked_credit(balance, *amount)?;
            accounts::set_balance(&mut tx, user_id, *currency, new_balance).await?;
        }
        log::set_status_for_requests(&mut tx, user_id, reason, TransactionStatus::Approved)
            .await?;
        tx.commit().await?;

        for row in &mut matching {
            row.status = Some(TransactionStatus::Approved);
            row.settled = true;
        }

        let summary = credited
            .iter()
            .map(|(currency, amount)| format!("+{}", format_amount(*currency, *amount)))
            .collect::<Vec<_>>()
            .join(", ");
        info!(
            admin = caller.user_id,
            user_id,
            reason,
            rows = matching.len(),
            "deposit requests approved"
        );

        Ok(RequestResolution {
            user_id,
            reason: reason.to_string(),
            notice: Some(Notice {
                user_id,
                message: format!("Your deposit request '{}' was approved: {}", reason, summary),
            }),
            resolved: matching,
            credited,
        })
    }

    /// Reject every open request `user_id` filed under `reason`. No balance changes.
    pub async fn reject_requests(
        &self,
        caller: &Caller,
        user_id: UserId,
        reason: &str,
        note: Option<&str>,
    ) -> Result<RequestResolution, AppError> {
        require_admin(caller)?;

        let _guard = self.write_lock.lock().await;
        let mut tx = self.repo.begin().await?;
        let mut matching = log::find_pending(&mut tx, user_id, reason).await?;
        if matching.is_empty() {
            debug!(user_id, reason, "no matching deposit requests");
            return Ok(RequestResolution {
                user_id,
                reason: reason.to_string(),
                resolved: Vec::new(),
                credited: Vec::new(),
                notice: None,
            });
        }

        log::set_status_for_requests(&mut tx, user_id, reason, TransactionStatus::Rejected)
            .await?;
        tx.commit().await?;

        for row in &mut matching {
            row.status = Some(TransactionStatus::Rejected);
        }
        info!(
            admin = caller.user_id,
            user_id,
            reason,
            rows = matching.len(),
            "deposit requests rejected"
        );

        Ok(RequestResolution {
            user_id,
            reason: reason.to_string(),
            notice: Some(Notice {
                user_id,
                message: format!(
                    "Your deposit request '{}' was rejected. Reason: {}",
                    reason,
                    reason_or_default(note)
                ),
            }),
            resolved: matching,
            credited: Vec::new(),
        })
    }

    // ========================
    // Audit
    // ========================

    /// The whole transaction log, oldest first (admin only).
    pub async fn all_transactions(&self, caller: &Caller) -> Result<Vec<Transaction>, AppError> {
        require_admin(caller)?;
        let mut conn = self.repo.acquire().await?;
        Ok(log::list_all(&mut conn).await?)
    }

    /// Replay the log and compare it with the stored balances.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut conn = self.repo.acquire().await?;
        let accounts = accounts::list_accounts(&mut conn).await?;
        let transactions = log::list_all(&mut conn).await?;
        Ok(build_integrity_report(&accounts, &transactions))
    }
}
