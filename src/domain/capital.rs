//! Day-by-day capital timeline, reconstructed backward from the current
//! account balance.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

use super::matching::ClosedOperation;

/// Nominal balance used when no authoritative balance is available.
pub const DEFAULT_FALLBACK_BALANCE: Decimal = dec!(5000);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyCapitalSnapshot {
    pub date: NaiveDate,
    pub capital_start: Decimal,
    pub pl_daily: Decimal,
    pub capital_end: Decimal,
    pub trade_count: usize,
    pub trade_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceSource {
    Reported,
    Fallback,
}

/// Pick the authoritative balance when it is usable, otherwise the fallback.
pub fn resolve_balance(reported: Option<Decimal>, fallback: Decimal) -> (Decimal, BalanceSource) {
    match reported {
        Some(balance) if balance > Decimal::ZERO => (balance, BalanceSource::Reported),
        other => {
            warn!(
                reported = ?other,
                fallback = %fallback,
                "no usable account balance; using fallback"
            );
            (fallback, BalanceSource::Fallback)
        }
    }
}

#[derive(Default)]
struct DayTotals {
    pl: Decimal,
    trade_ids: Vec<String>,
}

/// Build the chronological timeline for the given closing operations.
///
/// The most recent day ends at `current_balance`; every earlier day ends
/// where the following one starts.
pub fn reconstruct(closed: &[ClosedOperation], current_balance: Decimal) -> Vec<DailyCapitalSnapshot> {
    let mut days: BTreeMap<NaiveDate, DayTotals> = BTreeMap::new();
    for op in closed {
        let day = days.entry(op.close_date()).or_default();
        day.pl += op.realized_pl;
        day.trade_ids.push(op.trade_id.clone());
    }

    let mut running = current_balance;
    let mut evolution: Vec<DailyCapitalSnapshot> = days
        .into_iter()
        .rev()
        .map(|(date, totals)| {
            let capital_end = running;
            let capital_start = capital_end.saturating_sub(totals.pl);
            running = capital_start;
            DailyCapitalSnapshot {
                date,
                capital_start,
                pl_daily: totals.pl,
                capital_end,
                trade_count: totals.trade_ids.len(),
                trade_ids: totals.trade_ids,
            }
        })
        .collect();

    evolution.reverse();
    evolution
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn closing(id: &str, y: i32, m: u32, d: u32, pl: Decimal) -> ClosedOperation {
        let at: DateTime<Utc> = Utc.with_ymd_and_hms(y, m, d, 16, 0, 0).unwrap();
        ClosedOperation {
            symbol: "AAPL".into(),
            broker: "schwab".into(),
            trade_id: id.into(),
            matched_qty: dec!(1),
            cost_basis: dec!(100),
            proceeds: dec!(100) + pl,
            realized_pl: pl,
            realized_pl_percent: pl,
            opened_at: at,
            close_timestamp: at,
            lots_consumed: 1,
        }
    }

    #[test]
    fn single_day_anchors_to_current_balance() {
        let evolution = reconstruct(&[closing("s1", 2024, 1, 2, dec!(50))], dec!(5000));

        assert_eq!(evolution.len(), 1);
        assert_eq!(evolution[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(evolution[0].capital_end, dec!(5000));
        assert_eq!(evolution[0].capital_start, dec!(4950));
        assert_eq!(evolution[0].trade_count, 1);
    }

    #[test]
    fn days_chain_end_to_start() {
        let closed = vec![
            closing("s3", 2024, 1, 5, dec!(-20)),
            closing("s1", 2024, 1, 2, dec!(50)),
            closing("s2", 2024, 1, 2, dec!(10)),
            closing("s4", 2024, 1, 9, dec!(30)),
        ];
        let evolution = reconstruct(&closed, dec!(1000));

        let dates: Vec<_> = evolution.iter().map(|s| s.date.to_string()).collect();
        assert_eq!(dates, vec!["2024-01-02", "2024-01-05", "2024-01-09"]);

        assert_eq!(evolution[0].pl_daily, dec!(60));
        assert_eq!(evolution[0].trade_ids, vec!["s1", "s2"]);
        for pair in evolution.windows(2) {
            assert_eq!(pair[0].capital_end, pair[1].capital_start);
        }
        assert_eq!(evolution[2].capital_end, dec!(1000));
        assert_eq!(evolution[0].capital_start, dec!(930));
    }

    #[test]
    fn extreme_balance_saturates_instead_of_overflowing() {
        let evolution = reconstruct(&[closing("s1", 2024, 1, 2, dec!(-1000))], Decimal::MAX);
        assert_eq!(evolution[0].capital_end, Decimal::MAX);
        assert_eq!(evolution[0].capital_start, Decimal::MAX);
    }

    #[test]
    fn no_closings_gives_empty_timeline() {
        assert!(reconstruct(&[], dec!(5000)).is_empty());
    }

    #[test]
    fn positive_reported_balance_is_used() {
        assert_eq!(
            resolve_balance(Some(dec!(7250.10)), DEFAULT_FALLBACK_BALANCE),
            (dec!(7250.10), BalanceSource::Reported)
        );
    }

    #[test]
    fn missing_or_non_positive_balance_falls_back() {
        assert_eq!(
            resolve_balance(None, dec!(5000)),
            (dec!(5000), BalanceSource::Fallback)
        );
        assert_eq!(
            resolve_balance(Some(Decimal::ZERO), dec!(5000)),
            (dec!(5000), BalanceSource::Fallback)
        );
    }
}
