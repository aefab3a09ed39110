use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Amount, Currency, UserId};

pub type TransactionId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Spend,
    TransferIn,
    TransferOut,
    AdminGive,
    AdminGiveall,
    AdminMultiGive,
    AdminRemove,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Spend => "spend",
            TransactionKind::TransferIn => "transfer_in",
            TransactionKind::TransferOut => "transfer_out",
            TransactionKind::AdminGive => "admin_give",
            TransactionKind::AdminGiveall => "admin_giveall",
            TransactionKind::AdminMultiGive => "admin_multi_give",
            TransactionKind::AdminRemove => "admin_remove",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "deposit" => Some(TransactionKind::Deposit),
            "spend" => Some(TransactionKind::Spend),
            "transfer_in" => Some(TransactionKind::TransferIn),
            "transfer_out" => Some(TransactionKind::TransferOut),
            "admin_give" => Some(TransactionKind::AdminGive),
            "admin_giveall" => Some(TransactionKind::AdminGiveall),
            "admin_multi_give" => Some(TransactionKind::AdminMultiGive),
            "admin_remove" => Some(TransactionKind::AdminRemove),
            _ => None,
        }
    }

    /// How a logged amount of this kind moves the balance.
    /// Spends and outgoing transfers are logged positive but debit the account;
    /// removals are already logged negative.
    pub fn signed_effect(&self, amount: Amount) -> Amount {
        match self {
            TransactionKind::Spend | TransactionKind::TransferOut => -amount,
            _ => amount,
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Approval state of a deposit request. Rows outside any approval flow carry no status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Pending,
    Approved,
    Denied,
    Rejected,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Approved => "APPROVED",
            TransactionStatus::Denied => "DENIED",
            TransactionStatus::Rejected => "REJECTED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(TransactionStatus::Pending),
            "APPROVED" => Some(TransactionStatus::Approved),
            "DENIED" => Some(TransactionStatus::Denied),
            "REJECTED" => Some(TransactionStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of the append-only transaction log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Assigned by the log on insertion, strictly increasing
    pub id: TransactionId,
    pub user_id: UserId,
    pub kind: TransactionKind,
    /// Signed; negative only for removals
    pub amount: Amount,
    pub currency: Currency,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    pub status: Option<TransactionStatus>,
    /// Whether the account balance already reflects this row
    pub settled: bool,
}

impl Transaction {
    /// Balance delta this row contributed, or zero while it awaits approval.
    pub fn settled_effect(&self) -> Amount {
        if self.settled {
            self.kind.signed_effect(self.amount)
        } else {
            0
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == Some(TransactionStatus::Pending)
    }

    /// A reason-keyed deposit request nobody has acted on yet.
    pub fn is_open_request(&self) -> bool {
        self.kind == TransactionKind::Deposit && self.status.is_none() && !self.settled
    }
}

/// A log entry that has not been written yet.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: UserId,
    pub kind: TransactionKind,
    pub amount: Amount,
    pub currency: Currency,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    pub status: Option<TransactionStatus>,
    pub settled: bool,
}

impl NewTransaction {
    /// A row for a balance change that is applied immediately.
    pub fn new(user_id: UserId, kind: TransactionKind, amount: Amount, currency: Currency) -> Self {
        Self {
            user_id,
            kind,
            amount,
            currency,
            reason: String::new(),
            timestamp: Utc::now(),
            status: None,
            settled: true,
        }
    }

    /// A deposit awaiting approval by transaction id.
    pub fn pending_deposit(user_id: UserId, amount: Amount, currency: Currency) -> Self {
        Self {
            status: Some(TransactionStatus::Pending),
            settled: false,
            ..Self::new(user_id, TransactionKind::Deposit, amount, currency)
        }
    }

    /// A deposit awaiting approval by (user, reason).
    pub fn deposit_request(user_id: UserId, amount: Amount, currency: Currency) -> Self {
        Self {
            settled: false,
            ..Self::new(user_id, TransactionKind::Deposit, amount, currency)
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// The stored row, once the log has assigned an id.
    pub fn recorded(self, id: TransactionId) -> Transaction {
        Transaction {
            id,
            user_id: self.user_id,
            kind: self.kind,
            amount: self.amount,
            currency: self.currency,
            reason: self.reason,
            timestamp: self.timestamp,
            status: self.status,
            settled: self.settled,
        }
    }
}
