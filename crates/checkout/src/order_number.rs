//! Order number candidates.

use chrono::{DateTime, Utc};
use domain::OrderNumber;

/// Produces order number candidates. Uniqueness is checked by the caller.
pub trait OrderNumberSource: Send + Sync {
    fn next(&self, now: DateTime<Utc>) -> OrderNumber;
}

/// `ORD-YYYYMMDD-XXXXXXXX` with a random hex suffix.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomOrderNumbers;

impl OrderNumberSource for RandomOrderNumbers {
    fn next(&self, now: DateTime<Utc>) -> OrderNumber {
        OrderNumber::generate(now)
    }
}
