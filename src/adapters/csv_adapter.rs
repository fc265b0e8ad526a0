//! CSV file adapters for broker trade exports and price snapshots.

use crate::domain::error::JournalError;
use crate::domain::trade::RawTrade;
use crate::ports::price_port::PricePort;
use crate::ports::trade_source_port::TradeSourcePort;
use csv::{ReaderBuilder, Trim};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

fn read_source(path: &Path) -> Result<String, JournalError> {
    fs::read_to_string(path).map_err(|e| JournalError::Source {
        source_name: path.display().to_string(),
        reason: format!("failed to read: {}", e),
    })
}

/// Trades CSV with header `id,broker,symbol,side,quantity,price,fee,datetime`.
///
/// Columns are addressed by name; a missing column leaves that field unset.
pub struct CsvTradeAdapter {
    path: PathBuf,
    default_broker: Option<String>,
}

impl CsvTradeAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            default_broker: None,
        }
    }

    /// Broker assigned to rows that carry none, e.g. a single-broker export.
    pub fn with_default_broker(mut self, broker: &str) -> Self {
        self.default_broker = Some(broker.to_string());
        self
    }
}

impl TradeSourcePort for CsvTradeAdapter {
    fn name(&self) -> &str {
        self.path.to_str().unwrap_or("<non-utf8 path>")
    }

    fn fetch_trades(&self) -> Result<Vec<RawTrade>, JournalError> {
        let content = read_source(&self.path)?;
        let mut rdr = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(content.as_bytes());

        let mut trades = Vec::new();
        for result in rdr.deserialize::<RawTrade>() {
            let mut raw = result.map_err(|e| JournalError::Source {
                source_name: self.name().to_string(),
                reason: format!("CSV parse error: {}", e),
            })?;
            let has_broker = raw.broker.as_deref().is_some_and(|b| !b.trim().is_empty());
            if !has_broker {
                raw.broker = self.default_broker.clone();
            }
            trades.push(raw);
        }

        debug!(source = self.name(), records = trades.len(), "read trades CSV");
        Ok(trades)
    }
}

/// Price snapshot CSV with header `symbol,price`.
pub struct CsvPriceAdapter {
    path: PathBuf,
}

impl CsvPriceAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl PricePort for CsvPriceAdapter {
    fn current_prices(&self) -> Result<BTreeMap<String, Decimal>, JournalError> {
        let content = read_source(&self.path)?;
        let mut rdr = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(content.as_bytes());

        let mut prices = BTreeMap::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| JournalError::Source {
                source_name: self.path.display().to_string(),
                reason: format!("CSV parse error: {}", e),
            })?;

            let symbol = record.get(0).unwrap_or("");
            let price = record.get(1).and_then(|p| Decimal::from_str(p).ok());
            match price {
                Some(price) if !symbol.is_empty() && price >= Decimal::ZERO => {
                    prices.insert(symbol.to_string(), price);
                }
                _ => {
                    warn!(
                        source = %self.path.display(),
                        row = line + 2,
                        "skipping unusable price row"
                    );
                }
            }
        }

        Ok(prices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn reads_trade_rows() {
        let file = create_temp_csv(
            "id,broker,symbol,side,quantity,price,fee,datetime\n\
             1,schwab,AAPL,BUY,5,142.50,0,2024-01-02 15:30:00\n\
             2,schwab,AAPL,SELL,5,145.80,1.00,2024-01-03T15:30:00Z\n",
        );
        let adapter = CsvTradeAdapter::new(file.path().to_path_buf());
        let trades = adapter.fetch_trades().unwrap();

        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].id.as_deref(), Some("1"));
        assert_eq!(trades[1].side.as_deref(), Some("SELL"));
        assert_eq!(trades[1].fee.as_deref(), Some("1.00"));
        assert_eq!(trades[1].to_trade().unwrap().price, dec!(145.80));
    }

    #[test]
    fn missing_columns_leave_fields_unset() {
        let file = create_temp_csv(
            "id,symbol,side,quantity,price,datetime\n\
             7,ETH-USD,buy,0.25,2200,2024-01-02\n",
        );
        let adapter = CsvTradeAdapter::new(file.path().to_path_buf());
        let trades = adapter.fetch_trades().unwrap();

        assert_eq!(trades[0].fee, None);
        assert_eq!(trades[0].broker, None);
    }

    #[test]
    fn default_broker_fills_blank_broker() {
        let file = create_temp_csv(
            "id,broker,symbol,side,quantity,price,datetime\n\
             1,,BTC-USD,BUY,0.1,40000,2024-01-02\n\
             2,kraken,BTC-USD,BUY,0.1,40000,2024-01-02\n",
        );
        let adapter =
            CsvTradeAdapter::new(file.path().to_path_buf()).with_default_broker("coinbase");
        let trades = adapter.fetch_trades().unwrap();

        assert_eq!(trades[0].broker.as_deref(), Some("coinbase"));
        assert_eq!(trades[1].broker.as_deref(), Some("kraken"));
    }

    #[test]
    fn missing_trade_file_is_source_error() {
        let adapter = CsvTradeAdapter::new(PathBuf::from("/nonexistent/trades.csv"));
        let err = adapter.fetch_trades().unwrap_err();
        assert!(matches!(err, JournalError::Source { .. }));
    }

    #[test]
    fn reads_prices_and_skips_bad_rows() {
        let file = create_temp_csv(
            "symbol,price\n\
             AAPL,190.25\n\
             MSFT,n/a\n\
             ,12\n\
             BTC-USD,43000\n",
        );
        let adapter = CsvPriceAdapter::new(file.path().to_path_buf());
        let prices = adapter.current_prices().unwrap();

        assert_eq!(prices.len(), 2);
        assert_eq!(prices["AAPL"], dec!(190.25));
        assert_eq!(prices["BTC-USD"], dec!(43000));
    }

    #[test]
    fn missing_price_file_is_source_error() {
        let adapter = CsvPriceAdapter::new(PathBuf::from("/nonexistent/prices.csv"));
        assert!(matches!(
            adapter.current_prices(),
            Err(JournalError::Source { .. })
        ));
    }
}
