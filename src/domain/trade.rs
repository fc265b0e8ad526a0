//! Trade records and the ingestion boundary.
//!
//! Broker adapters hand over [`RawTrade`] records with every field as optional
//! text. [`normalize`] turns them into typed [`Trade`]s; anything that cannot be
//! trusted is set aside as a [`RejectedTrade`] and the rest of the batch
//! carries on.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Largest magnitude accepted for a quantity, price, fee or notional.
pub const MAX_AMOUNT: Decimal = dec!(1000000000000000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Case-insensitive, whitespace-tolerant parse of `BUY` / `SELL`.
    pub fn parse(value: &str) -> Option<Side> {
        match value.trim().to_uppercase().as_str() {
            "BUY" => Some(Side::Buy),
            "SELL" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// A normalized execution from one broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub broker: String,
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
    pub fee: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Trade {
    pub fn notional(&self) -> Decimal {
        self.price * self.quantity
    }

    /// Numeric sanity rules every trade must satisfy before matching.
    pub fn check(&self) -> Result<(), Rejection> {
        if self.quantity <= Decimal::ZERO {
            return Err(Rejection::NonPositiveQuantity {
                quantity: self.quantity,
            });
        }
        if self.price < Decimal::ZERO {
            return Err(Rejection::NegativePrice { price: self.price });
        }
        if self.fee < Decimal::ZERO {
            return Err(Rejection::NegativeFee { fee: self.fee });
        }
        for (field, value) in [
            ("quantity", self.quantity),
            ("price", self.price),
            ("fee", self.fee),
        ] {
            if value > MAX_AMOUNT {
                return Err(Rejection::OutOfRange { field });
            }
        }
        let gross = self
            .price
            .checked_mul(self.quantity)
            .and_then(|n| n.checked_add(self.fee));
        match gross {
            Some(value) if value <= MAX_AMOUNT => Ok(()),
            _ => Err(Rejection::OutOfRange { field: "notional" }),
        }
    }
}

/// An untyped record as produced by a broker adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RawTrade {
    pub id: Option<String>,
    pub broker: Option<String>,
    pub symbol: Option<String>,
    pub side: Option<String>,
    pub quantity: Option<String>,
    pub price: Option<String>,
    pub fee: Option<String>,
    pub datetime: Option<String>,
}

impl RawTrade {
    fn field(value: &Option<String>, name: &'static str) -> Result<String, Rejection> {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or(Rejection::MissingField { field: name })
    }

    fn number(value: &str, name: &'static str) -> Result<Decimal, Rejection> {
        Decimal::from_str(value)
            .or_else(|_| Decimal::from_scientific(value))
            .map_err(|_| Rejection::InvalidNumber {
                field: name,
                value: value.to_string(),
            })
    }

    /// Convert to a typed trade. Numeric range rules are left to [`Trade::check`].
    pub fn to_trade(&self) -> Result<Trade, Rejection> {
        let id = Self::field(&self.id, "id")?;
        let broker = Self::field(&self.broker, "broker")?.to_lowercase();
        let symbol = Self::field(&self.symbol, "symbol")?;

        let side_text = Self::field(&self.side, "side")?;
        let side = Side::parse(&side_text).ok_or(Rejection::InvalidSide { value: side_text })?;

        let quantity = Self::number(&Self::field(&self.quantity, "quantity")?, "quantity")?;
        let price = Self::number(&Self::field(&self.price, "price")?, "price")?;
        let fee = match Self::field(&self.fee, "fee") {
            Ok(text) => Self::number(&text, "fee")?,
            Err(_) => Decimal::ZERO,
        };

        let stamp = Self::field(&self.datetime, "datetime")?;
        let timestamp =
            parse_timestamp(&stamp).ok_or(Rejection::InvalidTimestamp { value: stamp })?;

        Ok(Trade {
            id,
            broker,
            symbol,
            side,
            quantity,
            price,
            fee,
            timestamp,
        })
    }
}

/// Why a record was kept out of matching.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rejection {
    #[error("missing field {field}")]
    MissingField { field: &'static str },

    #[error("invalid {field} value {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("invalid side {value:?}")]
    InvalidSide { value: String },

    #[error("unparseable timestamp {value:?}")]
    InvalidTimestamp { value: String },

    #[error("quantity must be positive, got {quantity}")]
    NonPositiveQuantity { quantity: Decimal },

    #[error("price must be non-negative, got {price}")]
    NegativePrice { price: Decimal },

    #[error("fee must be non-negative, got {fee}")]
    NegativeFee { fee: Decimal },

    #[error("{field} outside the supported range")]
    OutOfRange { field: &'static str },

    #[error("duplicate trade id {id} for broker {broker}")]
    DuplicateId { broker: String, id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedTrade {
    pub broker: Option<String>,
    pub id: Option<String>,
    pub symbol: Option<String>,
    pub reason: Rejection,
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]`, `YYYY-MM-DDTHH:MM:SS[.f]`
/// (read as UTC) and a bare `YYYY-MM-DD` (UTC midnight).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Accumulates accepted trades and rejections, enforcing the per-trade rules
/// and `(broker, id)` uniqueness.
#[derive(Debug, Default)]
struct Screen {
    seen: HashSet<(String, String)>,
    accepted: Vec<Trade>,
    rejected: Vec<RejectedTrade>,
}

impl Screen {
    fn admit(&mut self, mut trade: Trade) {
        trade.broker = trade.broker.trim().to_lowercase();
        if let Err(reason) = trade.check() {
            self.reject_trade(&trade, reason);
            return;
        }
        if !self.seen.insert((trade.broker.clone(), trade.id.clone())) {
            let reason = Rejection::DuplicateId {
                broker: trade.broker.clone(),
                id: trade.id.clone(),
            };
            self.reject_trade(&trade, reason);
            return;
        }
        self.accepted.push(trade);
    }

    fn reject_trade(&mut self, trade: &Trade, reason: Rejection) {
        self.reject(RejectedTrade {
            broker: Some(trade.broker.clone()),
            id: Some(trade.id.clone()),
            symbol: Some(trade.symbol.clone()),
            reason,
        });
    }

    fn reject(&mut self, rejected: RejectedTrade) {
        warn!(
            broker = ?rejected.broker,
            id = ?rejected.id,
            symbol = ?rejected.symbol,
            reason = %rejected.reason,
            "rejected trade record"
        );
        self.rejected.push(rejected);
    }

    fn finish(self) -> (Vec<Trade>, Vec<RejectedTrade>) {
        (self.accepted, self.rejected)
    }
}

/// Convert raw adapter records into typed trades.
pub fn normalize(raw: &[RawTrade]) -> (Vec<Trade>, Vec<RejectedTrade>) {
    let mut screen = Screen::default();
    for record in raw {
        match record.to_trade() {
            Ok(trade) => screen.admit(trade),
            Err(reason) => screen.reject(RejectedTrade {
                broker: record.broker.as_ref().map(|b| b.trim().to_lowercase()),
                id: record.id.clone(),
                symbol: record.symbol.clone(),
                reason,
            }),
        }
    }
    screen.finish()
}

/// Re-check already typed trades (callers may build them by hand).
pub fn screen(trades: &[Trade]) -> (Vec<Trade>, Vec<RejectedTrade>) {
    let mut screen = Screen::default();
    for trade in trades {
        screen.admit(trade.clone());
    }
    screen.finish()
}
