//! Platform fee computation
//!
//! Fees are a fixed rational share of the unit price, computed on 256-bit
//! integers with multiply-then-divide so that large prices lose no precision.

use primitive_types::U256;

use crate::types::LedgerError;

/// Rational fee rate `numerator / denominator`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeRate {
    numerator: u64,
    denominator: u64,
}

/// Fee and provider share of a gross amount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSplit {
    pub fee: U256,
    pub provider_net: U256,
}

impl Default for FeeRate {
    /// One percent
    fn default() -> Self {
        Self {
            numerator: 1,
            denominator: 100,
        }
    }
}

impl FeeRate {
    /// Create a fee rate, rejecting zero denominators and rates above 100%
    pub fn new(numerator: u64, denominator: u64) -> Result<Self, LedgerError> {
        if denominator == 0 || numerator > denominator {
            return Err(LedgerError::InvalidFeeRate {
                numerator,
                denominator,
            });
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }

    /// Split `gross` into `floor(gross * rate)` and the remainder
    ///
    /// # Errors
    ///
    /// `ArithmeticOverflow` if `gross * numerator` does not fit in 256 bits.
    pub fn split(&self, gross: U256) -> Result<FeeSplit, LedgerError> {
        let scaled = gross
            .checked_mul(U256::from(self.numerator))
            .ok_or_else(|| LedgerError::arithmetic_overflow("fee", "-"))?;
        let fee = scaled / U256::from(self.denominator);
        // fee <= gross because numerator <= denominator
        Ok(FeeSplit {
            fee,
            provider_net: gross - fee,
        })
    }
}
