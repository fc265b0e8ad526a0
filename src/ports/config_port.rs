//! Configuration access port trait.

use rust_decimal::Decimal;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;

    /// `None` when the key is absent or not a decimal number.
    fn get_decimal(&self, section: &str, key: &str) -> Option<Decimal>;
}
