//! Valuation of residual lots as open positions.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

use super::lot::{LotLedger, QTY_EPSILON};
use super::matching::percent_of;
use super::trade::MAX_AMOUNT;

/// Quoted valuations above this are treated as unusable quotes.
const MAX_POSITION_VALUE: Decimal = dec!(1000000000000000000000);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenPosition {
    pub symbol: String,
    pub qty: Decimal,
    pub avg_cost: Decimal,
    pub cost_basis: Decimal,
    pub current_price: Decimal,
    /// False when no quote was supplied and `avg_cost` stood in for the price.
    pub priced: bool,
    pub current_value: Decimal,
    pub unrealized_pl: Decimal,
    pub unrealized_pl_percent: Decimal,
    pub lot_count: usize,
}

/// Summarize a ledger's remaining lots. Returns `None` for a flat ledger.
///
/// Without a quote for the symbol the position is valued at its own average
/// cost, which reports zero unrealized P&L.
pub fn value_position(
    symbol: &str,
    ledger: &LotLedger,
    prices: Option<&BTreeMap<String, Decimal>>,
) -> Option<OpenPosition> {
    let qty = ledger.total_qty();
    if qty <= QTY_EPSILON {
        return None;
    }
    let cost_basis = ledger.total_cost();
    let avg_cost = cost_basis / qty;

    let quoted = prices.and_then(|p| p.get(symbol)).copied().and_then(|price| {
        let value = qty
            .checked_mul(price)
            .filter(|v| price >= Decimal::ZERO && price <= MAX_AMOUNT && *v <= MAX_POSITION_VALUE);
        if value.is_none() {
            warn!(symbol, price = %price, "quote outside the supported range; valuing at cost");
        }
        value.map(|v| (price, v))
    });
    let (current_price, current_value) = quoted.unwrap_or((avg_cost, cost_basis));
    let unrealized_pl = current_value - cost_basis;

    Some(OpenPosition {
        symbol: symbol.to_string(),
        qty,
        avg_cost,
        cost_basis,
        current_price,
        priced: quoted.is_some(),
        current_value,
        unrealized_pl,
        unrealized_pl_percent: percent_of(unrealized_pl, cost_basis),
        lot_count: ledger.lot_count(),
    })
}

/// Value every non-flat ledger, in symbol order.
pub fn value_positions<'a>(
    ledgers: impl IntoIterator<Item = (&'a str, &'a LotLedger)>,
    prices: Option<&BTreeMap<String, Decimal>>,
) -> Vec<OpenPosition> {
    let mut positions: Vec<OpenPosition> = ledgers
        .into_iter()
        .filter_map(|(symbol, ledger)| value_position(symbol, ledger, prices))
        .collect();
    positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    positions
}
