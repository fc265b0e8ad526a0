//! Current price port trait.

use crate::domain::error::JournalError;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

pub trait PricePort {
    /// Latest known price per symbol. The map may be partial.
    fn current_prices(&self) -> Result<BTreeMap<String, Decimal>, JournalError>;
}
