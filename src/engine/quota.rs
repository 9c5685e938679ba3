use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::engine::error::EngineError;

/// Balance of one (employee, leave type, year) bucket as read from the
/// quota ledger. `remaining = -1` is the unlimited sentinel and bypasses
/// every comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct QuotaBalance {
    #[schema(example = 20, value_type = f64)]
    pub total: Decimal,
    #[schema(example = 3.5, value_type = f64)]
    pub used: Decimal,
    #[schema(example = 16.5, value_type = f64)]
    pub remaining: Decimal,
}

impl QuotaBalance {
    pub fn is_unlimited(&self) -> bool {
        self.remaining == Decimal::NEGATIVE_ONE
    }

    pub fn covers(&self, requested: Decimal) -> bool {
        self.is_unlimited() || self.remaining >= requested
    }
}

/// Submission-time gate. An employee with no quota row for the requested
/// type has nothing left to spend, so `None` counts as zero remaining.
pub fn check_available(
    balance: Option<&QuotaBalance>,
    requested: Decimal,
) -> Result<(), EngineError> {
    match balance {
        Some(b) if b.covers(requested) => Ok(()),
        Some(b) => Err(EngineError::InsufficientQuota {
            requested,
            remaining: b.remaining,
        }),
        None => Err(EngineError::InsufficientQuota {
            requested,
            remaining: Decimal::ZERO,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn balance(total: Decimal, used: Decimal, remaining: Decimal) -> QuotaBalance {
        QuotaBalance {
            total,
            used,
            remaining,
        }
    }

    #[test]
    fn covers_within_remaining() {
        let b = balance(dec!(20), dec!(3.5), dec!(16.5));
        assert!(b.covers(dec!(16.5)));
        assert!(b.covers(dec!(0.5)));
        assert!(!b.covers(dec!(17)));
    }

    #[test]
    fn unlimited_sentinel_bypasses_comparison() {
        let b = balance(dec!(-1), dec!(42), dec!(-1));
        assert!(b.is_unlimited());
        assert!(b.covers(dec!(10000)));
        assert!(check_available(Some(&b), dec!(365)).is_ok());
    }

    #[test]
    fn zero_remaining_rejects_one_day() {
        let b = balance(dec!(10), dec!(10), dec!(0));
        assert_eq!(
            check_available(Some(&b), dec!(1)),
            Err(EngineError::InsufficientQuota {
                requested: dec!(1),
                remaining: dec!(0),
            })
        );
    }

    #[test]
    fn missing_row_counts_as_zero() {
        assert_eq!(
            check_available(None, dec!(0.5)),
            Err(EngineError::InsufficientQuota {
                requested: dec!(0.5),
                remaining: dec!(0),
            })
        );
    }
}
