//! Account balance port trait.

use rust_decimal::Decimal;

pub trait BalancePort {
    /// Authoritative current account value, if one is known.
    fn current_balance(&self) -> Option<Decimal>;
}
