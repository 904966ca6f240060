use alloy_primitives::{Address, B256, U256};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid signed amount: {0}")]
pub struct ParseAmountError(String);

/// Sign-and-magnitude integer covering the full uint256 range in both
/// directions. Persisted as a decimal string with an optional `-` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedAmount {
    negative: bool,
    magnitude: U256,
}

impl SignedAmount {
    pub const ZERO: SignedAmount = SignedAmount {
        negative: false,
        magnitude: U256::ZERO,
    };

    pub fn credit(magnitude: U256) -> Self {
        SignedAmount {
            negative: false,
            magnitude,
        }
    }

    pub fn debit(magnitude: U256) -> Self {
        // -0 normalizes to +0 so equality stays structural
        SignedAmount {
            negative: magnitude > U256::ZERO,
            magnitude,
        }
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn magnitude(&self) -> U256 {
        self.magnitude
    }

    /// None on magnitude overflow.
    pub fn checked_add(self, other: Self) -> Option<Self> {
        if self.negative == other.negative {
            let magnitude = self.magnitude.checked_add(other.magnitude)?;
            Some(SignedAmount {
                negative: self.negative && magnitude > U256::ZERO,
                magnitude,
            })
        } else {
            match self.magnitude.cmp(&other.magnitude) {
                Ordering::Equal => Some(SignedAmount::ZERO),
                Ordering::Greater => Some(SignedAmount {
                    negative: self.negative,
                    magnitude: self.magnitude - other.magnitude,
                }),
                Ordering::Less => Some(SignedAmount {
                    negative: other.negative,
                    magnitude: other.magnitude - self.magnitude,
                }),
            }
        }
    }

    /// Zero-padded to 78 digits (U256 max has 78 decimal digits) so
    /// lexicographic order on the stored text matches numeric order for
    /// non-negative values.
    pub fn padded(&self) -> String {
        if self.negative {
            format!("-{:0>78}", self.magnitude)
        } else {
            format!("{:0>78}", self.magnitude)
        }
    }
}

impl fmt::Display for SignedAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "-{}", self.magnitude)
        } else {
            write!(f, "{}", self.magnitude)
        }
    }
}

impl FromStr for SignedAmount {
    type Err = ParseAmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let trimmed = digits.trim_start_matches('0');
        let magnitude = if trimmed.is_empty() {
            if digits.is_empty() {
                return Err(ParseAmountError(s.to_string()));
            }
            U256::ZERO
        } else {
            U256::from_str(trimmed).map_err(|_| ParseAmountError(s.to_string()))?
        };
        Ok(if negative {
            SignedAmount::debit(magnitude)
        } else {
            SignedAmount::credit(magnitude)
        })
    }
}

/// One signed balance movement attributable to a specific log position.
/// Immutable once written; (tx_hash, log_index, address) identifies at most
/// one row.
#[derive(Debug, Clone)]
pub struct Delta {
    pub block_number: u64,
    pub tx_hash: B256,
    pub log_index: u64,
    pub address: Address,
    pub amount: SignedAmount,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amt(s: &str) -> SignedAmount {
        s.parse().unwrap()
    }

    #[test]
    fn add_same_sign() {
        assert_eq!(amt("5").checked_add(amt("7")), Some(amt("12")));
        assert_eq!(amt("-5").checked_add(amt("-7")), Some(amt("-12")));
    }

    #[test]
    fn add_opposite_signs() {
        assert_eq!(amt("10").checked_add(amt("-4")), Some(amt("6")));
        assert_eq!(amt("4").checked_add(amt("-10")), Some(amt("-6")));
        assert_eq!(amt("10").checked_add(amt("-10")), Some(SignedAmount::ZERO));
    }

    #[test]
    fn add_overflow() {
        let max = SignedAmount::credit(U256::MAX);
        assert_eq!(max.checked_add(amt("1")), None);
    }

    #[test]
    fn negative_zero_normalizes() {
        assert_eq!(SignedAmount::debit(U256::ZERO), SignedAmount::ZERO);
        assert!(!SignedAmount::debit(U256::ZERO).is_negative());
    }

    #[test]
    fn display_round_trip() {
        for s in ["0", "1", "-1", "340282366920938463463374607431768211455"] {
            assert_eq!(amt(s).to_string(), s);
        }
    }

    #[test]
    fn padded_parses_back() {
        let a = amt("123456789");
        assert_eq!(a.padded().parse::<SignedAmount>().unwrap(), a);
        assert_eq!(a.padded().len(), 78);
    }

    #[test]
    fn padded_orders_numerically() {
        // lexicographic order on the padded text must match numeric order
        let small = amt("9").padded();
        let big = amt("10").padded();
        assert!(big > small);
    }

    #[test]
    fn rejects_garbage() {
        assert!("".parse::<SignedAmount>().is_err());
        assert!("abc".parse::<SignedAmount>().is_err());
        assert!("12x".parse::<SignedAmount>().is_err());
    }
}
