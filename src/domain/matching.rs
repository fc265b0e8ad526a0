//! FIFO matching of trades against per-symbol lot ledgers.
//!
//! BUY trades open lots. SELL trades consume the oldest lots first and yield
//! one [`ClosedOperation`] per SELL that matched anything. A SELL with nothing
//! to match against is flagged [`MatchOutcome::Unmatched`] and produces no
//! operation, since short positions are not tracked.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::lot::{LotLedger, QTY_EPSILON};
use super::trade::{Side, Trade};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    /// BUY that opened a lot.
    Opened,
    Matched,
    PartiallyMatched,
    Unmatched,
}

/// A realized round-trip, aggregated per SELL trade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosedOperation {
    pub symbol: String,
    pub broker: String,
    pub trade_id: String,
    pub matched_qty: Decimal,
    pub cost_basis: Decimal,
    pub proceeds: Decimal,
    pub realized_pl: Decimal,
    pub realized_pl_percent: Decimal,
    /// Open time of the oldest lot consumed.
    pub opened_at: DateTime<Utc>,
    pub close_timestamp: DateTime<Utc>,
    pub lots_consumed: usize,
}

impl ClosedOperation {
    pub fn is_win(&self) -> bool {
        self.realized_pl > Decimal::ZERO
    }

    pub fn close_date(&self) -> NaiveDate {
        self.close_timestamp.date_naive()
    }

    pub fn hold_days(&self) -> Decimal {
        let seconds = (self.close_timestamp - self.opened_at).num_seconds();
        Decimal::from(seconds) / dec!(86400)
    }
}

/// A trade together with what matching made of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedTrade {
    #[serde(flatten)]
    pub trade: Trade,
    pub outcome: MatchOutcome,
    pub is_closed: bool,
    pub pl_usd: Decimal,
    pub pl_percent: Decimal,
    pub matched_qty: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_basis: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unmatched_qty: Option<Decimal>,
}

impl AnnotatedTrade {
    fn new(trade: &Trade, outcome: MatchOutcome) -> Self {
        AnnotatedTrade {
            trade: trade.clone(),
            outcome,
            is_closed: false,
            pl_usd: Decimal::ZERO,
            pl_percent: Decimal::ZERO,
            matched_qty: Decimal::ZERO,
            cost_basis: None,
            unmatched_qty: None,
        }
    }
}

/// Result of matching one symbol's full trade history.
#[derive(Debug, Clone)]
pub struct SymbolMatch {
    pub symbol: String,
    pub ledger: LotLedger,
    pub closed: Vec<ClosedOperation>,
    pub trades: Vec<AnnotatedTrade>,
}

/// `value` as a percentage of `base`; zero when `base` is zero or the ratio
/// does not fit in a `Decimal`.
pub(crate) fn percent_of(value: Decimal, base: Decimal) -> Decimal {
    value
        .checked_div(base)
        .and_then(|ratio| ratio.checked_mul(dec!(100)))
        .unwrap_or(Decimal::ZERO)
}

/// Run one symbol's trades, already sorted ascending by timestamp, through a
/// fresh ledger.
pub fn match_symbol(symbol: &str, trades: &[Trade]) -> SymbolMatch {
    let mut ledger = LotLedger::new();
    let mut closed = Vec::new();
    let mut annotated = Vec::with_capacity(trades.len());

    for trade in trades {
        match trade.side {
            Side::Buy => {
                ledger.push(trade);
                let mut entry = AnnotatedTrade::new(trade, MatchOutcome::Opened);
                entry.cost_basis = Some(trade.notional() + trade.fee);
                annotated.push(entry);
            }
            Side::Sell => {
                let taken = ledger.consume(trade.quantity);
                if taken.is_empty() {
                    warn!(
                        symbol,
                        id = %trade.id,
                        broker = %trade.broker,
                        quantity = %trade.quantity,
                        "sell without open lots; excluded from statistics"
                    );
                    annotated.push(AnnotatedTrade::new(trade, MatchOutcome::Unmatched));
                    continue;
                }

                let fee_ratio = (taken.qty / trade.quantity).min(Decimal::ONE);
                let proceeds = trade.price * taken.qty - trade.fee * fee_ratio;
                let realized_pl = proceeds - taken.cost_basis;
                let realized_pl_percent = percent_of(realized_pl, taken.cost_basis);

                let unmatched = trade.quantity - taken.qty;
                let outcome = if unmatched > QTY_EPSILON {
                    warn!(
                        symbol,
                        id = %trade.id,
                        broker = %trade.broker,
                        unmatched = %unmatched,
                        "sell exceeds open quantity; excess ignored"
                    );
                    MatchOutcome::PartiallyMatched
                } else {
                    MatchOutcome::Matched
                };

                closed.push(ClosedOperation {
                    symbol: symbol.to_string(),
                    broker: trade.broker.clone(),
                    trade_id: trade.id.clone(),
                    matched_qty: taken.qty,
                    cost_basis: taken.cost_basis,
                    proceeds,
                    realized_pl,
                    realized_pl_percent,
                    opened_at: taken.first_opened_at.unwrap_or(trade.timestamp),
                    close_timestamp: trade.timestamp,
                    lots_consumed: taken.lots,
                });

                let mut entry = AnnotatedTrade::new(trade, outcome);
                entry.is_closed = true;
                entry.pl_usd = realized_pl;
                entry.pl_percent = realized_pl_percent;
                entry.matched_qty = taken.qty;
                if outcome == MatchOutcome::PartiallyMatched {
                    entry.unmatched_qty = Some(unmatched);
                }
                annotated.push(entry);
            }
        }
    }

    debug!(
        symbol,
        trades = trades.len(),
        closed = closed.len(),
        open_lots = ledger.lot_count(),
        state = ?ledger.state(),
        "matched symbol"
    );

    SymbolMatch {
        symbol: symbol.to_string(),
        ledger,
        closed,
        trades: annotated,
    }
}

/// Group trades by symbol, order each group by time and match it.
///
/// Trades sharing a timestamp keep their input order.
pub fn match_all(trades: &[Trade]) -> BTreeMap<String, SymbolMatch> {
    let mut by_symbol: BTreeMap<&str, Vec<Trade>> = BTreeMap::new();
    for trade in trades {
        by_symbol
            .entry(trade.symbol.as_str())
            .or_default()
            .push(trade.clone());
    }

    by_symbol
        .into_iter()
        .map(|(symbol, mut group)| {
            group.sort_by_key(|t| t.timestamp);
            (symbol.to_string(), match_symbol(symbol, &group))
        })
        .collect()
}
