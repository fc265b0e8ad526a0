//! Journal report: the single entry point over the matching pipeline.
//!
//! The whole supplied history is matched first, then closed operations and
//! trades are narrowed to the requested window. Matching before filtering
//! lets a sale inside the window draw on lots bought before it.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::capital::{reconstruct, resolve_balance, BalanceSource, DailyCapitalSnapshot, DEFAULT_FALLBACK_BALANCE};
use super::matching::{match_all, percent_of, AnnotatedTrade, ClosedOperation};
use super::metrics::{Activity, DayRef, OperationRef, Stats, SymbolStats};
use super::period::Period;
use super::position::{value_positions, OpenPosition};
use super::trade::{normalize, screen, RawTrade, RejectedTrade, Trade};

const MONEY_DP: u32 = 2;
const QTY_DP: u32 = 8;

/// Everything a report needs besides the trades themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRequest {
    pub days: Option<u32>,
    pub broker: Option<String>,
    pub as_of: DateTime<Utc>,
    pub current_prices: Option<BTreeMap<String, Decimal>>,
    pub current_balance: Option<Decimal>,
    pub fallback_balance: Decimal,
}

impl ReportRequest {
    pub fn new(as_of: DateTime<Utc>) -> Self {
        ReportRequest {
            days: None,
            broker: None,
            as_of,
            current_prices: None,
            current_balance: None,
            fallback_balance: DEFAULT_FALLBACK_BALANCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodSummary {
    pub days: Option<u32>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub trades_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapitalSummary {
    pub initial: Decimal,
    pub current: Decimal,
    pub pl_total_usd: Decimal,
    pub pl_total_percent: Decimal,
    pub balance_source: BalanceSource,
    pub evolution: Vec<DailyCapitalSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionsSummary {
    pub open_count: usize,
    pub closed_count: usize,
    pub open_detail: Vec<OpenPosition>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JournalReport {
    pub as_of: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broker: Option<String>,
    pub period: PeriodSummary,
    pub capital: CapitalSummary,
    pub positions: PositionsSummary,
    pub stats: Stats,
    pub activity: Activity,
    pub symbols: BTreeMap<String, SymbolStats>,
    pub trades: Vec<AnnotatedTrade>,
    pub rejected: Vec<RejectedTrade>,
}

/// Build a report from typed trades. Trades breaking the numeric rules or
/// repeating a (broker, id) pair are rejected rather than matched.
pub fn compute_report(trades: &[Trade], request: &ReportRequest) -> JournalReport {
    let (accepted, rejected) = screen(trades);
    assemble(accepted, rejected, request)
}

/// Build a report from untyped broker records.
pub fn compute_report_from_raw(raw: &[RawTrade], request: &ReportRequest) -> JournalReport {
    let (accepted, rejected) = normalize(raw);
    assemble(accepted, rejected, request)
}

/// Broker selection runs before matching, so a sale only draws on lots bought
/// through the same broker; the day window is applied to matched results.
fn assemble(trades: Vec<Trade>, rejected: Vec<RejectedTrade>, request: &ReportRequest) -> JournalReport {
    let broker = request
        .broker
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(str::to_lowercase);

    let selected: Vec<Trade> = match &broker {
        Some(b) => trades
            .into_iter()
            .filter(|t| t.broker.eq_ignore_ascii_case(b))
            .collect(),
        None => trades,
    };

    let books = match_all(&selected);
    let positions = value_positions(
        books.iter().map(|(symbol, book)| (symbol.as_str(), &book.ledger)),
        request.current_prices.as_ref(),
    );

    let period = Period::new(request.days, request.as_of);

    let mut closed: Vec<ClosedOperation> = books
        .values()
        .flat_map(|book| book.closed.iter())
        .filter(|op| period.contains(op.close_timestamp))
        .cloned()
        .collect();
    closed.sort_by(|a, b| {
        a.close_timestamp
            .cmp(&b.close_timestamp)
            .then_with(|| a.trade_id.cmp(&b.trade_id))
    });

    let mut annotated: Vec<AnnotatedTrade> = books
        .into_values()
        .flat_map(|book| book.trades)
        .filter(|t| period.contains(t.trade.timestamp))
        .collect();
    annotated.sort_by(|a, b| {
        a.trade
            .timestamp
            .cmp(&b.trade.timestamp)
            .then_with(|| a.trade.id.cmp(&b.trade.id))
    });

    let (balance, balance_source) = resolve_balance(request.current_balance, request.fallback_balance);
    let evolution = reconstruct(&closed, balance);
    let pl_total: Decimal = evolution.iter().map(|day| day.pl_daily).sum();
    let initial = evolution.first().map_or(balance, |day| day.capital_start);
    let pl_total_percent = if initial > Decimal::ZERO {
        percent_of(pl_total, initial)
    } else {
        Decimal::ZERO
    };

    let stats = Stats::compute(&closed, &positions);
    let activity = Activity::compute(&annotated, &closed, &evolution);
    let symbols = SymbolStats::compute_per_symbol(&annotated, &closed);

    debug!(
        selected = selected.len(),
        closed = closed.len(),
        open = positions.len(),
        "journal computed"
    );
    info!(
        trades = annotated.len(),
        rejected = rejected.len(),
        closed_ops = stats.total_ops,
        "report assembled"
    );

    let report = JournalReport {
        as_of: request.as_of,
        broker,
        period: PeriodSummary {
            days: period.days,
            from: annotated.first().map(|t| t.trade.timestamp.date_naive()),
            to: annotated.last().map(|t| t.trade.timestamp.date_naive()),
            trades_count: annotated.len(),
        },
        capital: CapitalSummary {
            initial,
            current: balance,
            pl_total_usd: pl_total,
            pl_total_percent,
            balance_source,
            evolution,
        },
        positions: PositionsSummary {
            open_count: positions.len(),
            closed_count: closed.len(),
            open_detail: positions,
        },
        stats,
        activity,
        symbols,
        trades: annotated,
        rejected,
    };

    report.rounded()
}

fn money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

fn qty(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(QTY_DP, RoundingStrategy::MidpointAwayFromZero)
}

impl JournalReport {
    /// Presentation rounding. Input prices and fees on trades are left as given.
    fn rounded(mut self) -> Self {
        let c = &mut self.capital;
        c.initial = money(c.initial);
        c.current = money(c.current);
        c.pl_total_usd = money(c.pl_total_usd);
        c.pl_total_percent = money(c.pl_total_percent);
        for day in &mut c.evolution {
            day.capital_start = money(day.capital_start);
            day.pl_daily = money(day.pl_daily);
            day.capital_end = money(day.capital_end);
        }

        for p in &mut self.positions.open_detail {
            p.qty = qty(p.qty);
            p.avg_cost = money(p.avg_cost);
            p.cost_basis = money(p.cost_basis);
            p.current_price = money(p.current_price);
            p.current_value = money(p.current_value);
            p.unrealized_pl = money(p.unrealized_pl);
            p.unrealized_pl_percent = money(p.unrealized_pl_percent);
        }

        let s = &mut self.stats;
        for v in [
            &mut s.win_rate,
            &mut s.profit_factor,
            &mut s.pl_realized_usd,
            &mut s.pl_realized_percent,
            &mut s.pl_unrealized_usd,
            &mut s.avg_pl_per_trade,
            &mut s.total_wins_usd,
            &mut s.total_losses_usd,
            &mut s.largest_win,
            &mut s.largest_loss,
            &mut s.avg_hold_days,
        ] {
            *v = money(*v);
        }

        let a = &mut self.activity;
        a.total_volume = money(a.total_volume);
        a.total_fees = money(a.total_fees);
        for op in [&mut a.max_gain, &mut a.max_loss].into_iter().flatten() {
            round_operation(op);
        }
        for day in [&mut a.best_day, &mut a.worst_day].into_iter().flatten() {
            round_day(day);
        }

        for sym in self.symbols.values_mut() {
            sym.win_rate = money(sym.win_rate);
            sym.pl_usd = money(sym.pl_usd);
        }

        for t in &mut self.trades {
            t.pl_usd = money(t.pl_usd);
            t.pl_percent = money(t.pl_percent);
            t.matched_qty = qty(t.matched_qty);
            t.cost_basis = t.cost_basis.map(money);
            t.unmatched_qty = t.unmatched_qty.map(qty);
        }

        self
    }
}

fn round_operation(op: &mut OperationRef) {
    op.amount = money(op.amount);
}

fn round_day(day: &mut DayRef) {
    day.pl = money(day.pl);
}
