//! Per-symbol FIFO ledger of open purchase lots.
//!
//! Lots are only ever created by [`LotLedger::push`] and only ever shrink
//! through [`LotLedger::consume`]. The cost basis of a partly consumed lot is
//! reduced by exactly the amount handed out, so the cost consumed plus the
//! cost still open always equals the cost pushed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::VecDeque;

use super::trade::Trade;

/// Quantities closer than this are considered equal.
pub const QTY_EPSILON: Decimal = dec!(0.0001);

/// Decimal places kept on the cost portion handed out by a partial fill.
const COST_DP: u32 = 12;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lot {
    pub remaining_qty: Decimal,
    /// Total cost of the remaining units, acquisition fee included.
    pub cost_basis: Decimal,
    pub origin_trade_id: String,
    pub opened_at: DateTime<Utc>,
}

/// What a call to [`LotLedger::consume`] took off the front of the queue.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Consumption {
    pub qty: Decimal,
    pub cost_basis: Decimal,
    /// Number of lots touched, fully or partly.
    pub lots: usize,
    pub first_opened_at: Option<DateTime<Utc>>,
}

impl Consumption {
    pub fn is_empty(&self) -> bool {
        self.qty <= Decimal::ZERO
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerState {
    New,
    Accumulating,
    Flat,
}

#[derive(Debug, Clone, Default)]
pub struct LotLedger {
    lots: VecDeque<Lot>,
    touched: bool,
}

impl LotLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new lot from a BUY trade.
    pub fn push(&mut self, trade: &Trade) {
        self.touched = true;
        self.lots.push_back(Lot {
            remaining_qty: trade.quantity,
            cost_basis: trade.price * trade.quantity + trade.fee,
            origin_trade_id: trade.id.clone(),
            opened_at: trade.timestamp,
        });
    }

    pub fn peek_oldest(&self) -> Option<&Lot> {
        self.lots.front()
    }

    /// Remove up to `qty` units, oldest lot first.
    ///
    /// A lot whose remainder would fall within [`QTY_EPSILON`] is consumed
    /// whole, so dust never lingers in the queue.
    pub fn consume(&mut self, qty: Decimal) -> Consumption {
        let mut wanted = qty;
        let mut taken = Consumption::default();

        while wanted > QTY_EPSILON {
            let Some(front) = self.lots.front_mut() else {
                break;
            };
            taken.lots += 1;
            taken.first_opened_at.get_or_insert(front.opened_at);

            if front.remaining_qty <= wanted + QTY_EPSILON {
                wanted -= front.remaining_qty;
                taken.qty += front.remaining_qty;
                taken.cost_basis += front.cost_basis;
                self.lots.pop_front();
            } else {
                let portion = front
                    .cost_basis
                    .checked_mul(wanted)
                    .and_then(|c| c.checked_div(front.remaining_qty))
                    .unwrap_or_else(|| front.cost_basis * (wanted / front.remaining_qty))
                    .round_dp(COST_DP);
                front.cost_basis -= portion;
                front.remaining_qty -= wanted;
                taken.qty += wanted;
                taken.cost_basis += portion;
                wanted = Decimal::ZERO;
            }
        }

        taken
    }

    pub fn remaining(&self) -> impl Iterator<Item = &Lot> {
        self.lots.iter()
    }

    pub fn lot_count(&self) -> usize {
        self.lots.len()
    }

    pub fn total_qty(&self) -> Decimal {
        self.lots.iter().map(|l| l.remaining_qty).sum()
    }

    pub fn total_cost(&self) -> Decimal {
        self.lots.iter().map(|l| l.cost_basis).sum()
    }

    pub fn is_flat(&self) -> bool {
        self.lots.is_empty()
    }

    pub fn state(&self) -> LedgerState {
        if !self.lots.is_empty() {
            LedgerState::Accumulating
        } else if self.touched {
            LedgerState::Flat
        } else {
            LedgerState::New
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trade::Side;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn buy(id: &str, day: i64, qty: Decimal, price: Decimal, fee: Decimal) -> Trade {
        Trade {
            id: id.to_string(),
            broker: "schwab".to_string(),
            symbol: "AAPL".to_string(),
            side: Side::Buy,
            quantity: qty,
            price,
            fee,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 15, 0, 0).unwrap() + Duration::days(day),
        }
    }

    #[test]
    fn push_includes_fee_in_cost_basis() {
        let mut ledger = LotLedger::new();
        ledger.push(&buy("a", 0, dec!(10), dec!(10), dec!(1.5)));
        let lot = ledger.peek_oldest().unwrap();
        assert_eq!(lot.remaining_qty, dec!(10));
        assert_eq!(lot.cost_basis, dec!(101.5));
        assert_eq!(lot.origin_trade_id, "a");
    }

    #[test]
    fn consume_takes_oldest_lot_first() {
        let mut ledger = LotLedger::new();
        ledger.push(&buy("a", 0, dec!(5), dec!(100), dec!(0)));
        ledger.push(&buy("b", 1, dec!(5), dec!(200), dec!(0)));

        let taken = ledger.consume(dec!(5));

        assert_eq!(taken.qty, dec!(5));
        assert_eq!(taken.cost_basis, dec!(500));
        assert_eq!(taken.lots, 1);
        assert_eq!(ledger.lot_count(), 1);
        assert_eq!(ledger.peek_oldest().unwrap().origin_trade_id, "b");
    }

    #[test]
    fn partial_consumption_reduces_cost_proportionally() {
        let mut ledger = LotLedger::new();
        ledger.push(&buy("a", 0, dec!(10), dec!(10), dec!(0)));

        let taken = ledger.consume(dec!(4));

        assert_eq!(taken.qty, dec!(4));
        assert_eq!(taken.cost_basis, dec!(40));
        let lot = ledger.peek_oldest().unwrap();
        assert_eq!(lot.remaining_qty, dec!(6));
        assert_eq!(lot.cost_basis, dec!(60));
    }

    #[test]
    fn partial_consumption_of_very_large_lot() {
        let mut ledger = LotLedger::new();
        ledger.push(&buy("a", 0, dec!(1000000000000000), dec!(1), dec!(0)));

        let taken = ledger.consume(dec!(400000000000000));

        assert_eq!(taken.cost_basis, dec!(400000000000000));
        assert_eq!(ledger.total_qty(), dec!(600000000000000));
        assert_eq!(ledger.total_cost(), dec!(600000000000000));
    }

    #[test]
    fn consume_spans_several_lots() {
        let mut ledger = LotLedger::new();
        ledger.push(&buy("a", 0, dec!(2), dec!(10), dec!(1)));
        ledger.push(&buy("b", 1, dec!(4), dec!(20), dec!(0)));

        let taken = ledger.consume(dec!(3));

        assert_eq!(taken.qty, dec!(3));
        assert_eq!(taken.cost_basis, dec!(41));
        assert_eq!(taken.lots, 2);
        assert_eq!(taken.first_opened_at, Some(buy("a", 0, dec!(1), dec!(1), dec!(0)).timestamp));
        assert_eq!(ledger.total_qty(), dec!(3));
        assert_eq!(ledger.total_cost(), dec!(60));
    }

    #[test]
    fn consume_beyond_available_stops_at_empty() {
        let mut ledger = LotLedger::new();
        ledger.push(&buy("a", 0, dec!(2), dec!(10), dec!(0)));

        let taken = ledger.consume(dec!(5));

        assert_eq!(taken.qty, dec!(2));
        assert!(ledger.is_flat());
    }

    #[test]
    fn consume_from_empty_ledger_takes_nothing() {
        let mut ledger = LotLedger::new();
        let taken = ledger.consume(dec!(5));
        assert!(taken.is_empty());
        assert_eq!(taken.lots, 0);
        assert_eq!(taken.first_opened_at, None);
    }

    #[test]
    fn dust_below_epsilon_closes_the_lot() {
        let mut ledger = LotLedger::new();
        ledger.push(&buy("a", 0, dec!(0.5), dec!(40000), dec!(0)));

        let taken = ledger.consume(dec!(0.49995));

        assert_eq!(taken.qty, dec!(0.5));
        assert_eq!(taken.cost_basis, dec!(20000));
        assert!(ledger.is_flat());
    }

    #[test]
    fn state_transitions() {
        let mut ledger = LotLedger::new();
        assert_eq!(ledger.state(), LedgerState::New);

        ledger.push(&buy("a", 0, dec!(1), dec!(10), dec!(0)));
        assert_eq!(ledger.state(), LedgerState::Accumulating);

        ledger.consume(dec!(1));
        assert_eq!(ledger.state(), LedgerState::Flat);

        ledger.push(&buy("b", 1, dec!(1), dec!(10), dec!(0)));
        assert_eq!(ledger.state(), LedgerState::Accumulating);
    }

    proptest! {
        #[test]
        fn random_partial_fills_conserve_cost_and_quantity(
            qty in 1u32..10_000,
            price_cents in 1i64..10_000_000,
            fee_cents in 0i64..10_000,
            fills in prop::collection::vec(1i64..50_000, 1..40),
        ) {
            let mut ledger = LotLedger::new();
            let quantity = Decimal::from(qty);
            ledger.push(&buy("a", 0, quantity, Decimal::new(price_cents, 2), Decimal::new(fee_cents, 2)));
            let original_cost = ledger.total_cost();

            let mut cost_out = Decimal::ZERO;
            let mut qty_out = Decimal::ZERO;
            for fill in fills {
                let taken = ledger.consume(Decimal::new(fill, 2));
                cost_out += taken.cost_basis;
                qty_out += taken.qty;
            }

            prop_assert!((cost_out + ledger.total_cost() - original_cost).abs() <= dec!(0.000001));
            prop_assert_eq!(qty_out + ledger.total_qty(), quantity);
            for lot in ledger.remaining() {
                prop_assert!(lot.remaining_qty > QTY_EPSILON);
                prop_assert!(lot.cost_basis >= Decimal::ZERO);
            }
        }
    }
}
