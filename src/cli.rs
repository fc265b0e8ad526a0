//! CLI definition and dispatch.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

use crate::adapters::csv_adapter::{CsvPriceAdapter, CsvTradeAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::capital::DEFAULT_FALLBACK_BALANCE;
use crate::domain::config_validation::validate_journal_config;
use crate::domain::error::JournalError;
use crate::domain::journal::{compute_report_from_raw, JournalReport, ReportRequest};
use crate::domain::trade::{normalize, RawTrade};
use crate::ports::balance_port::BalancePort;
use crate::ports::config_port::ConfigPort;
use crate::ports::price_port::PricePort;
use crate::ports::report_port::ReportPort;
use crate::ports::trade_source_port::TradeSourcePort;

#[derive(Parser, Debug)]
#[command(name = "tradejournal", about = "FIFO trade journal and performance report")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a journal report
    Report {
        #[arg(short, long)]
        config: PathBuf,
        #[command(flatten)]
        overrides: ReportOverrides,
    },
    /// Ingest trade files and list rejected records
    Check {
        #[arg(short, long, required = true)]
        trades: Vec<PathBuf>,
        /// Broker for rows without one
        #[arg(long)]
        default_broker: Option<String>,
    },
    /// Validate a journal configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Command-line values that take precedence over the config file.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ReportOverrides {
    /// Trades CSV; repeat for several files
    #[arg(short, long)]
    pub trades: Vec<PathBuf>,
    /// Current prices CSV (symbol,price)
    #[arg(long)]
    pub prices: Option<PathBuf>,
    /// Window length in days; 0 for the whole history
    #[arg(long)]
    pub days: Option<u32>,
    #[arg(long)]
    pub broker: Option<String>,
    /// Current account balance
    #[arg(long)]
    pub balance: Option<Decimal>,
    /// Anchor instant for the window (RFC 3339); defaults to now
    #[arg(long)]
    pub as_of: Option<DateTime<Utc>>,
    /// Output path, `-` for stdout
    #[arg(short, long)]
    pub output: Option<String>,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Report { config, overrides } => run_report(&config, &overrides),
        Command::Check {
            trades,
            default_broker,
        } => run_check(&trades, default_broker.as_deref()),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = JournalError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Assemble the report request from config values and overrides.
pub fn build_request(
    config: &dyn ConfigPort,
    balance: &dyn BalancePort,
    overrides: &ReportOverrides,
) -> Result<ReportRequest, JournalError> {
    let days = match overrides.days {
        Some(d) => Some(d),
        None => match config.get_string("report", "days") {
            Some(raw) if !raw.trim().is_empty() => {
                let parsed = raw.trim().parse::<u32>().map_err(|_| JournalError::ConfigInvalid {
                    section: "report".into(),
                    key: "days".into(),
                    reason: "days must be a non-negative integer".into(),
                })?;
                Some(parsed)
            }
            _ => None,
        },
    };

    let broker = overrides
        .broker
        .clone()
        .or_else(|| config.get_string("report", "broker"))
        .filter(|b| !b.trim().is_empty());

    let fallback_balance = config
        .get_decimal("account", "fallback_balance")
        .unwrap_or(DEFAULT_FALLBACK_BALANCE);
    if fallback_balance <= Decimal::ZERO {
        return Err(JournalError::ConfigInvalid {
            section: "account".into(),
            key: "fallback_balance".into(),
            reason: "fallback_balance must be a positive number".into(),
        });
    }

    Ok(ReportRequest {
        days,
        broker,
        as_of: overrides.as_of.unwrap_or_else(Utc::now),
        current_prices: None,
        current_balance: overrides.balance.or_else(|| balance.current_balance()),
        fallback_balance,
    })
}

/// Trade files from the command line, or else `[sources] trades`.
pub fn resolve_trade_paths(overrides: &ReportOverrides, config: &dyn ConfigPort) -> Vec<PathBuf> {
    if !overrides.trades.is_empty() {
        return overrides.trades.clone();
    }

    config
        .get_string("sources", "trades")
        .map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect()
        })
        .unwrap_or_default()
}

pub fn resolve_output(overrides: &ReportOverrides, config: &dyn ConfigPort) -> String {
    overrides
        .output
        .clone()
        .or_else(|| config.get_string("report", "output"))
        .filter(|o| !o.trim().is_empty())
        .unwrap_or_else(|| "-".to_string())
}

/// Read every source in order. The first unreadable source aborts the run.
pub fn collect_trades(sources: &[&dyn TradeSourcePort]) -> Result<Vec<RawTrade>, JournalError> {
    let mut all = Vec::new();
    for source in sources {
        let trades = source.fetch_trades()?;
        info!(source = source.name(), records = trades.len(), "loaded trades");
        all.extend(trades);
    }
    Ok(all)
}

fn run_report(config_path: &PathBuf, overrides: &ReportOverrides) -> ExitCode {
    // Stage 1: Load and validate config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_journal_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    // Stage 2: Build request
    let request = match build_request(&adapter, &adapter, overrides) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 3: Resolve sources
    let paths = resolve_trade_paths(overrides, &adapter);
    if paths.is_empty() {
        let err = JournalError::ConfigMissing {
            section: "sources".into(),
            key: "trades".into(),
        };
        eprintln!("error: {err}");
        return (&err).into();
    }
    let default_broker = adapter.get_string("sources", "default_broker");
    let csv_sources: Vec<CsvTradeAdapter> = paths
        .into_iter()
        .map(|p| {
            let source = CsvTradeAdapter::new(p);
            match default_broker.as_deref() {
                Some(b) => source.with_default_broker(b),
                None => source,
            }
        })
        .collect();
    let sources: Vec<&dyn TradeSourcePort> =
        csv_sources.iter().map(|s| s as &dyn TradeSourcePort).collect();

    let price_path = overrides
        .prices
        .clone()
        .or_else(|| adapter.get_string("sources", "prices").map(PathBuf::from));
    let price_adapter = price_path.map(CsvPriceAdapter::new);

    // Stages 4-6: Fetch, compute, write
    let output = resolve_output(overrides, &adapter);
    run_report_pipeline(
        &sources,
        price_adapter.as_ref().map(|p| p as &dyn PricePort),
        request,
        &JsonReportAdapter::new(),
        &output,
    )
}

pub fn run_report_pipeline(
    sources: &[&dyn TradeSourcePort],
    prices: Option<&dyn PricePort>,
    mut request: ReportRequest,
    report_port: &dyn ReportPort,
    output: &str,
) -> ExitCode {
    // Stage 4: Fetch trades and prices
    let raw = match collect_trades(sources) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    if let Some(port) = prices {
        match port.current_prices() {
            Ok(p) => request.current_prices = Some(p),
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        }
    }

    // Stage 5: Compute report
    let report = compute_report_from_raw(&raw, &request);
    print_summary(&report);

    // Stage 6: Write report
    match report_port.write(&report, output) {
        Ok(()) => {
            if output != "-" {
                eprintln!("\nReport written to: {}", output);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn print_summary(report: &JournalReport) {
    let stats = &report.stats;
    let capital = &report.capital;

    eprintln!("\n=== Journal Summary ===");
    match report.period.days {
        Some(d) => eprintln!("Period:           last {} days", d),
        None => eprintln!("Period:           all history"),
    }
    eprintln!("Trades:           {}", report.period.trades_count);
    eprintln!("Closed Ops:       {}", stats.total_ops);
    eprintln!("Open Positions:   {}", report.positions.open_count);
    eprintln!("Win Rate:         {}%", stats.win_rate);
    eprintln!("Profit Factor:    {}", stats.profit_factor);
    eprintln!("Realized P&L:     ${}", stats.pl_realized_usd);
    eprintln!("Unrealized P&L:   ${}", stats.pl_unrealized_usd);
    eprintln!(
        "Capital:          ${} -> ${} ({:?})",
        capital.initial, capital.current, capital.balance_source
    );

    if !report.symbols.is_empty() {
        eprintln!("\n=== Per-Symbol Summary ===");
        for s in report.symbols.values() {
            let sign = if s.pl_usd >= Decimal::ZERO { "+" } else { "" };
            eprintln!(
                "  {}:  {} trades, {}% win rate, {}${}",
                s.symbol, s.closed_ops, s.win_rate, sign, s.pl_usd,
            );
        }
    }

    if !report.rejected.is_empty() {
        eprintln!("\n{} record(s) rejected", report.rejected.len());
    }
}

fn run_check(paths: &[PathBuf], default_broker: Option<&str>) -> ExitCode {
    let csv_sources: Vec<CsvTradeAdapter> = paths
        .iter()
        .map(|p| {
            let source = CsvTradeAdapter::new(p.clone());
            match default_broker {
                Some(b) => source.with_default_broker(b),
                None => source,
            }
        })
        .collect();
    let sources: Vec<&dyn TradeSourcePort> =
        csv_sources.iter().map(|s| s as &dyn TradeSourcePort).collect();

    let raw = match collect_trades(&sources) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let (accepted, rejected) = normalize(&raw);
    for r in &rejected {
        println!(
            "{}\t{}\t{}\t{}",
            r.broker.as_deref().unwrap_or("-"),
            r.id.as_deref().unwrap_or("-"),
            r.symbol.as_deref().unwrap_or("-"),
            r.reason
        );
    }
    eprintln!(
        "{} records read, {} accepted, {} rejected",
        raw.len(),
        accepted.len(),
        rejected.len()
    );
    ExitCode::SUCCESS
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_journal_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    let paths = resolve_trade_paths(&ReportOverrides::default(), &adapter);
    eprintln!("\nTrade sources:");
    if paths.is_empty() {
        eprintln!("  (none configured; pass --trades to report)");
    }
    for p in &paths {
        eprintln!("  {}", p.display());
    }
    match adapter.current_balance() {
        Some(b) => eprintln!("Current balance:  {}", b),
        None => eprintln!("Current balance:  not set (fallback applies)"),
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}
