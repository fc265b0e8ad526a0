#![allow(dead_code)]

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::Write;
use tradejournal::domain::error::JournalError;
use tradejournal::domain::journal::JournalReport;
use tradejournal::domain::trade::{parse_timestamp, RawTrade, Side, Trade};
use tradejournal::ports::price_port::PricePort;
use tradejournal::ports::report_port::ReportPort;
use tradejournal::ports::trade_source_port::TradeSourcePort;

pub struct MockTradeSource {
    pub name: String,
    pub trades: Vec<RawTrade>,
    pub error: Option<String>,
}

impl MockTradeSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            trades: Vec::new(),
            error: None,
        }
    }

    pub fn with_trades(mut self, trades: Vec<RawTrade>) -> Self {
        self.trades.extend(trades);
        self
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }
}

impl TradeSourcePort for MockTradeSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch_trades(&self) -> Result<Vec<RawTrade>, JournalError> {
        if let Some(reason) = &self.error {
            return Err(JournalError::Source {
                source_name: self.name.clone(),
                reason: reason.clone(),
            });
        }
        Ok(self.trades.clone())
    }
}

pub struct MockPriceSource {
    pub prices: BTreeMap<String, Decimal>,
}

impl MockPriceSource {
    pub fn new(pairs: &[(&str, Decimal)]) -> Self {
        Self {
            prices: pairs.iter().map(|(s, p)| (s.to_string(), *p)).collect(),
        }
    }
}

impl PricePort for MockPriceSource {
    fn current_prices(&self) -> Result<BTreeMap<String, Decimal>, JournalError> {
        Ok(self.prices.clone())
    }
}

/// Captures the report instead of writing it.
pub struct MockReportPort {
    pub written: RefCell<Option<(JournalReport, String)>>,
}

impl MockReportPort {
    pub fn new() -> Self {
        Self {
            written: RefCell::new(None),
        }
    }

    pub fn report(&self) -> JournalReport {
        self.written.borrow().as_ref().unwrap().0.clone()
    }
}

impl ReportPort for MockReportPort {
    fn write(&self, report: &JournalReport, output_path: &str) -> Result<(), JournalError> {
        *self.written.borrow_mut() = Some((report.clone(), output_path.to_string()));
        Ok(())
    }
}

pub fn ts(value: &str) -> DateTime<Utc> {
    parse_timestamp(value).unwrap()
}

pub fn make_trade(
    id: &str,
    symbol: &str,
    side: Side,
    at: &str,
    quantity: Decimal,
    price: Decimal,
    fee: Decimal,
) -> Trade {
    Trade {
        id: id.to_string(),
        broker: "schwab".to_string(),
        symbol: symbol.to_string(),
        side,
        quantity,
        price,
        fee,
        timestamp: ts(at),
    }
}

pub fn buy(id: &str, symbol: &str, at: &str, quantity: Decimal, price: Decimal) -> Trade {
    make_trade(id, symbol, Side::Buy, at, quantity, price, Decimal::ZERO)
}

pub fn sell(id: &str, symbol: &str, at: &str, quantity: Decimal, price: Decimal) -> Trade {
    make_trade(id, symbol, Side::Sell, at, quantity, price, Decimal::ZERO)
}

pub fn on_broker(mut trade: Trade, broker: &str) -> Trade {
    trade.broker = broker.to_string();
    trade
}

pub fn make_raw(id: &str, broker: &str, symbol: &str, side: &str, qty: &str, price: &str, at: &str) -> RawTrade {
    RawTrade {
        id: Some(id.to_string()),
        broker: Some(broker.to_string()),
        symbol: Some(symbol.to_string()),
        side: Some(side.to_string()),
        quantity: Some(qty.to_string()),
        price: Some(price.to_string()),
        fee: None,
        datetime: Some(at.to_string()),
    }
}

pub fn write_temp_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
