use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Amount, Currency};

/// Platform-assigned user identifier.
pub type UserId = i64;

/// Current balances of one user, one field per currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub user_id: UserId,
    pub ap: Amount,
    pub sp: Amount,
    pub yen: Amount,
    pub reputation: Amount,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// A fresh account with every balance at zero.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            ap: 0,
            sp: 0,
            yen: 0,
            reputation: 0,
            created_at: Utc::now(),
        }
    }

    pub fn balance(&self, currency: Currency) -> Amount {
        match currency {
            Currency::Ap => self.ap,
            Currency::Sp => self.sp,
            Currency::Yen => self.yen,
            Currency::Reputation => self.reputation,
        }
    }

    pub fn balances(&self) -> [(Currency, Amount); 4] {
        Currency::ALL.map(|c| (c, self.balance(c)))
    }
}

/// Who is invoking an operation, as asserted by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub is_admin: bool,
}

impl Caller {
    pub fn user(user_id: UserId) -> Self {
        Self {
            user_id,
            is_admin: false,
        }
    }

    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            is_admin: true,
        }
    }

    /// Admins may act on anyone, users only on themselves.
    pub fn can_access(&self, user_id: UserId) -> bool {
        self.is_admin || self.user_id == user_id
    }
}
