//! Performance statistics over closed operations and open positions.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::BTreeMap;

use super::capital::DailyCapitalSnapshot;
use super::matching::{percent_of, AnnotatedTrade, ClosedOperation};
use super::position::OpenPosition;

/// Reported as the profit factor when there are wins but no losses yet.
pub const PROFIT_FACTOR_SENTINEL: Decimal = dec!(999.99);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub total_ops: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: Decimal,
    pub profit_factor: Decimal,
    pub pl_realized_usd: Decimal,
    pub pl_realized_percent: Decimal,
    pub pl_unrealized_usd: Decimal,
    pub avg_pl_per_trade: Decimal,
    pub total_wins_usd: Decimal,
    pub total_losses_usd: Decimal,
    pub largest_win: Decimal,
    pub largest_loss: Decimal,
    pub avg_hold_days: Decimal,
}

impl Stats {
    /// Only closed operations count toward win/loss figures; open positions
    /// contribute unrealized P&L alone.
    pub fn compute(closed: &[ClosedOperation], open: &[OpenPosition]) -> Self {
        let mut wins = 0usize;
        let mut losses = 0usize;
        let mut total_wins = Decimal::ZERO;
        let mut loss_sum = Decimal::ZERO;
        let mut largest_win = Decimal::ZERO;
        let mut largest_loss = Decimal::ZERO;
        let mut cost_closed = Decimal::ZERO;
        let mut hold_days = Decimal::ZERO;

        for op in closed {
            let pl = op.realized_pl;
            if op.is_win() {
                wins += 1;
                total_wins += pl;
                largest_win = largest_win.max(pl);
            } else {
                losses += 1;
                loss_sum += pl;
                largest_loss = largest_loss.max(pl.abs());
            }
            cost_closed += op.cost_basis;
            hold_days += op.hold_days();
        }

        let total_ops = closed.len();
        let total_losses = loss_sum.abs();
        let pl_realized = total_wins + loss_sum;

        let win_rate = if wins + losses > 0 {
            Decimal::from(wins) / Decimal::from(wins + losses) * dec!(100)
        } else {
            Decimal::ZERO
        };

        let profit_factor = if total_losses > Decimal::ZERO {
            total_wins
                .checked_div(total_losses)
                .unwrap_or(PROFIT_FACTOR_SENTINEL)
        } else if wins > 0 {
            PROFIT_FACTOR_SENTINEL
        } else {
            Decimal::ZERO
        };

        let (avg_pl_per_trade, avg_hold_days) = if total_ops > 0 {
            let n = Decimal::from(total_ops);
            (pl_realized / n, hold_days / n)
        } else {
            (Decimal::ZERO, Decimal::ZERO)
        };

        Stats {
            total_ops,
            wins,
            losses,
            win_rate,
            profit_factor,
            pl_realized_usd: pl_realized,
            pl_realized_percent: percent_of(pl_realized, cost_closed),
            pl_unrealized_usd: open.iter().map(|p| p.unrealized_pl).sum(),
            avg_pl_per_trade,
            total_wins_usd: total_wins,
            total_losses_usd: total_losses,
            largest_win,
            largest_loss,
            avg_hold_days,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolStats {
    pub symbol: String,
    pub trades: usize,
    pub closed_ops: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: Decimal,
    pub pl_usd: Decimal,
}

impl SymbolStats {
    fn empty(symbol: &str) -> Self {
        SymbolStats {
            symbol: symbol.to_string(),
            trades: 0,
            closed_ops: 0,
            wins: 0,
            losses: 0,
            win_rate: Decimal::ZERO,
            pl_usd: Decimal::ZERO,
        }
    }

    pub fn compute_per_symbol(
        trades: &[AnnotatedTrade],
        closed: &[ClosedOperation],
    ) -> BTreeMap<String, SymbolStats> {
        let mut out: BTreeMap<String, SymbolStats> = BTreeMap::new();

        for t in trades {
            out.entry(t.trade.symbol.clone())
                .or_insert_with(|| SymbolStats::empty(&t.trade.symbol))
                .trades += 1;
        }

        for op in closed {
            let entry = out
                .entry(op.symbol.clone())
                .or_insert_with(|| SymbolStats::empty(&op.symbol));
            entry.closed_ops += 1;
            entry.pl_usd += op.realized_pl;
            if op.is_win() {
                entry.wins += 1;
            } else {
                entry.losses += 1;
            }
        }

        for entry in out.values_mut() {
            if entry.closed_ops > 0 {
                entry.win_rate =
                    Decimal::from(entry.wins) / Decimal::from(entry.closed_ops) * dec!(100);
            }
        }

        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationRef {
    pub symbol: String,
    pub trade_id: String,
    pub amount: Decimal,
}

impl From<&ClosedOperation> for OperationRef {
    fn from(op: &ClosedOperation) -> Self {
        OperationRef {
            symbol: op.symbol.clone(),
            trade_id: op.trade_id.clone(),
            amount: op.realized_pl,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayRef {
    pub date: NaiveDate,
    pub pl: Decimal,
}

impl From<&DailyCapitalSnapshot> for DayRef {
    fn from(day: &DailyCapitalSnapshot) -> Self {
        DayRef {
            date: day.date,
            pl: day.pl_daily,
        }
    }
}

/// Trading activity figures for the reporting window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Activity {
    pub total_volume: Decimal,
    pub total_fees: Decimal,
    pub trades_by_broker: BTreeMap<String, usize>,
    pub max_gain: Option<OperationRef>,
    pub max_loss: Option<OperationRef>,
    pub best_day: Option<DayRef>,
    pub worst_day: Option<DayRef>,
}

impl Activity {
    pub fn compute(
        trades: &[AnnotatedTrade],
        closed: &[ClosedOperation],
        evolution: &[DailyCapitalSnapshot],
    ) -> Self {
        let mut trades_by_broker = BTreeMap::new();
        let mut total_volume = Decimal::ZERO;
        let mut total_fees = Decimal::ZERO;
        for t in trades {
            *trades_by_broker.entry(t.trade.broker.clone()).or_insert(0) += 1;
            total_volume += t.trade.notional();
            total_fees += t.trade.fee;
        }

        Activity {
            total_volume,
            total_fees,
            trades_by_broker,
            max_gain: closed
                .iter()
                .max_by(|a, b| a.realized_pl.cmp(&b.realized_pl))
                .map(OperationRef::from),
            max_loss: closed
                .iter()
                .min_by(|a, b| a.realized_pl.cmp(&b.realized_pl))
                .map(OperationRef::from),
            best_day: evolution
                .iter()
                .max_by(|a, b| a.pl_daily.cmp(&b.pl_daily))
                .map(DayRef::from),
            worst_day: evolution
                .iter()
                .min_by(|a, b| a.pl_daily.cmp(&b.pl_daily))
                .map(DayRef::from),
        }
    }
}
