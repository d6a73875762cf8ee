pub mod trend;

use crate::amount::Amount;
use chrono::{DateTime, Utc};

/// Per-side position state. `is_open == false` implies price and size are
/// both zero.
#[derive(Debug, Clone)]
pub struct PositionSide {
    pub is_open: bool,
    pub entry_price: Amount,
    pub entry_size: Amount,
    pub entry_time: DateTime<Utc>,
}

impl PositionSide {
    pub fn closed(now: DateTime<Utc>) -> Self {
        Self {
            is_open: false,
            entry_price: Amount::ZERO,
            entry_size: Amount::ZERO,
            entry_time: now,
        }
    }

    pub fn opened(price: Amount, size: Amount, now: DateTime<Utc>) -> Self {
        Self {
            is_open: true,
            entry_price: price,
            entry_size: size,
            entry_time: now,
        }
    }

    pub fn clear(&mut self, now: DateTime<Utc>) {
        *self = Self::closed(now);
    }
}
