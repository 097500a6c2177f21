//! Errors raised when a spin request cannot be accepted.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SpinError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpinError {
    /// Wager is not a positive integer
    #[error("invalid wager: {0:?}")]
    InvalidWager(String),

    /// Wager exceeds the current balance
    #[error("wager {wager} exceeds balance {balance}")]
    InsufficientBalance { wager: u64, balance: u64 },

    /// Another spin has not resolved yet
    #[error("a spin is already in progress")]
    SpinInProgress,

    /// The spin task died before resolving; the wager is refunded.
    #[error("spin task stopped before resolving")]
    Interrupted,
}

impl SpinError {
    /// Text shown to the player.
    pub fn user_message(&self) -> String {
        match self {
            SpinError::InvalidWager(_) => "Please enter a valid bet amount.".to_string(),
            SpinError::InsufficientBalance { balance, .. } => {
                format!("Not enough balance! You have ${}.", balance)
            }
            SpinError::SpinInProgress => "Spinning...".to_string(),
            SpinError::Interrupted => "Something went wrong. Please spin again.".to_string(),
        }
    }
}

/// Parse a raw wager against the current balance.
///
/// Reads the leading base-10 integer and ignores whatever follows it, so
/// `"12abc"` is 12 and `"1.5"` is 1. Input with no leading digits is invalid.
pub fn parse_wager(raw: &str, balance: u64) -> Result<u64> {
    let invalid = || SpinError::InvalidWager(raw.to_string());
    let rest = raw.trim_start();
    let (negative, rest) = match rest.as_bytes().first() {
        Some(b'-') => (true, &rest[1..]),
        Some(b'+') => (false, &rest[1..]),
        _ => (false, rest),
    };
    let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits_len == 0 {
        return Err(invalid());
    }
    let digits = &rest[..digits_len];
    if negative || digits.bytes().all(|b| b == b'0') {
        return Err(invalid());
    }
    // only overflow can fail here; such a wager exceeds any balance
    let wager = digits.parse::<u64>().unwrap_or(u64::MAX);
    if wager > balance {
        return Err(SpinError::InsufficientBalance { wager, balance });
    }
    Ok(wager)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positive_integers() {
        assert_eq!(parse_wager("100", 500), Ok(100));
        assert_eq!(parse_wager(" 500\n", 500), Ok(500));
    }

    #[test]
    fn reads_the_leading_integer() {
        assert_eq!(parse_wager("12abc", 500), Ok(12));
        assert_eq!(parse_wager("1.5", 500), Ok(1));
        assert_eq!(parse_wager("10 coins", 500), Ok(10));
        assert_eq!(parse_wager("+7", 500), Ok(7));
        assert_eq!(parse_wager("007", 500), Ok(7));
    }

    #[test]
    fn rejects_non_positive_and_garbage() {
        for raw in ["abc", "", "   ", "0", "-5", "-", "+", ".5", "0.9", "$10"] {
            assert_eq!(
                parse_wager(raw, 500),
                Err(SpinError::InvalidWager(raw.to_string())),
                "{raw:?}"
            );
        }
    }

    #[test]
    fn rejects_wager_above_balance() {
        assert_eq!(
            parse_wager("1000", 500),
            Err(SpinError::InsufficientBalance { wager: 1000, balance: 500 })
        );
        let err = parse_wager("99999999999999999999999", 500).unwrap_err();
        assert!(matches!(err, SpinError::InsufficientBalance { wager: u64::MAX, .. }));
        assert_eq!(err.user_message(), "Not enough balance! You have $500.");
    }
}
