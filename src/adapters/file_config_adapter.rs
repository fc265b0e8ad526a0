//! INI file configuration adapter.
//!
//! Also serves as the balance source: `[account] current_balance`.

use crate::ports::balance_port::BalancePort;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Ini::new();
        config.load(path).map_err(std::io::Error::other)?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_decimal(&self, section: &str, key: &str) -> Option<Decimal> {
        self.config
            .get(section, key)
            .and_then(|v| Decimal::from_str(v.trim()).ok())
    }
}

impl BalancePort for FileConfigAdapter {
    fn current_balance(&self) -> Option<Decimal> {
        self.get_decimal("account", "current_balance")
    }
}
