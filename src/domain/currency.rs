use serde::{Deserialize, Serialize};

/// The fixed set of currencies every account carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Activity points
    Ap,
    /// Skill points
    Sp,
    /// Spendable money, the only transferable currency
    Yen,
    Reputation,
}

impl Currency {
    pub const ALL: [Currency; 4] = [
        Currency::Ap,
        Currency::Sp,
        Currency::Yen,
        Currency::Reputation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Ap => "AP",
            Currency::Sp => "SP",
            Currency::Yen => "YEN",
            Currency::Reputation => "REPUTATION",
        }
    }

    /// Case-insensitive lookup; surrounding whitespace is ignored.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "AP" => Some(Currency::Ap),
            "SP" => Some(Currency::Sp),
            "YEN" => Some(Currency::Yen),
            "REPUTATION" => Some(Currency::Reputation),
            _ => None,
        }
    }

    /// Column of the `accounts` table holding this balance.
    pub(crate) fn column(&self) -> &'static str {
        match self {
            Currency::Ap => "ap",
            Currency::Sp => "sp",
            Currency::Yen => "yen",
            Currency::Reputation => "reputation",
        }
    }

    /// Comma separated list of valid codes, for error messages.
    pub fn valid_codes() -> String {
        Self::ALL
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
