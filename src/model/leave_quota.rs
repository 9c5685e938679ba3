use rust_decimal::Decimal;
use sqlx::prelude::FromRow;

use crate::engine::quota::QuotaBalance;

/// A `leave_quotas` row for one (employee, leave type, year) bucket.
#[derive(Debug, Clone, FromRow)]
pub struct LeaveQuotaRow {
    pub total: Decimal,
    pub used: Decimal,
    pub remaining: Decimal,
}

impl LeaveQuotaRow {
    pub fn balance(&self) -> QuotaBalance {
        QuotaBalance {
            total: self.total,
            used: self.used,
            remaining: self.remaining,
        }
    }
}
