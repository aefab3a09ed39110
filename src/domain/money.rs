use std::fmt;

use super::Currency;

/// Balances and transaction amounts are whole units of a currency.
pub type Amount = i64;

/// Group digits with commas.
/// Example: 1234567 -> "1,234,567", -1000 -> "-1,000"
pub fn format_thousands(amount: Amount) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if amount < 0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Render an amount the way users see it: "¥1,500" for yen, "1,500 AP" otherwise.
pub fn format_amount(currency: Currency, amount: Amount) -> String {
    match currency {
        Currency::Yen if amount < 0 => format!("-¥{}", format_thousands(-amount)),
        Currency::Yen => format!("¥{}", format_thousands(amount)),
        other => format!("{} {}", format_thousands(amount), other),
    }
}

/// Parse a whole-number amount. Thousands separators and a leading '+' are accepted.
/// Example: "1,500" -> 1500, "+20" -> 20
pub fn parse_amount(input: &str) -> Result<Amount, ParseAmountError> {
    let cleaned: String = input.trim().chars().filter(|c| *c != ',' && *c != '_').collect();
    if cleaned.is_empty() {
        return Err(ParseAmountError::Empty);
    }
    cleaned
        .parse::<Amount>()
        .map_err(|_| ParseAmountError::InvalidFormat(input.trim().to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAmountError {
    Empty,
    InvalidFormat(String),
}

impl fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseAmountError::Empty => write!(f, "amount is empty"),
            ParseAmountError::InvalidFormat(s) => write!(f, "'{}' is not a whole number", s),
        }
    }
}

impl std::error::Error for ParseAmountError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1000), "1,000");
        assert_eq!(format_thousands(1234567), "1,234,567");
        assert_eq!(format_thousands(-1000), "-1,000");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(Currency::Yen, 1500), "¥1,500");
        assert_eq!(format_amount(Currency::Yen, -20), "-¥20");
        assert_eq!(format_amount(Currency::Ap, 100), "100 AP");
        assert_eq!(format_amount(Currency::Reputation, 12000), "12,000 REPUTATION");
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("50"), Ok(50));
        assert_eq!(parse_amount(" 1,500 "), Ok(1500));
        assert_eq!(parse_amount("+20"), Ok(20));
        assert_eq!(parse_amount("-5"), Ok(-5));
    }

    #[test]
    fn test_parse_amount_invalid() {
        assert_eq!(parse_amount(""), Err(ParseAmountError::Empty));
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("12.5").is_err());
    }
}
