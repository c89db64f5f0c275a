//! Reporting and export: JSON, CSV, and Markdown artifacts.
//!
//! - **JSON**: full backtest and Monte Carlo results
//! - **CSV**: trade ledger and equity curve for external tools
//! - **Markdown**: a human-readable single-run report

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::monte_carlo::MonteCarloResult;
use crate::result::{BacktestResult, TradeRecord};

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

pub fn import_json(json: &str) -> Result<BacktestResult> {
    serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Trade ledger as CSV, one row per trade.
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "entry_time",
        "exit_time",
        "direction",
        "entry_price",
        "exit_price",
        "quantity",
        "pnl",
        "return_pct",
        "regime",
        "confidence",
        "score",
        "exit_reason",
    ])?;
    for t in trades {
        wtr.write_record([
            t.entry_time.to_rfc3339(),
            t.exit_time.to_rfc3339(),
            t.direction.to_string(),
            format!("{:.6}", t.entry_price),
            format!("{:.6}", t.exit_price),
            format!("{:.6}", t.quantity),
            format!("{:.2}", t.pnl),
            format!("{:.4}", t.return_pct),
            t.regime.to_string(),
            t.confidence.to_string(),
            format!("{:.3}", t.score),
            format!("{:?}", t.exit_reason),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Equity curve as CSV with `trade_index` and `balance` columns.
pub fn export_equity_csv(equity_curve: &[f64]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["trade_index", "balance"])?;
    for (i, eq) in equity_curve.iter().enumerate() {
        wtr.write_record([i.to_string(), format!("{eq:.2}")])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the artifact set for one run under `output_dir/{label}_{run id}/`:
/// - `backtest.json`: the full `BacktestResult`
/// - `trades.csv` and `equity.csv`
/// - `monte_carlo.json`: when a simulation was run
/// - `report.md`
///
/// Returns the created directory.
pub fn save_artifacts(
    result: &BacktestResult,
    monte_carlo: Option<&MonteCarloResult>,
    label: &str,
    output_dir: &Path,
) -> Result<PathBuf> {
    let short_id: String = result.run_id.chars().take(12).collect();
    let run_dir = output_dir.join(format!("{label}_{short_id}"));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("backtest.json"), export_json(result)?)?;
    std::fs::write(run_dir.join("trades.csv"), export_trades_csv(&result.trades)?)?;
    std::fs::write(run_dir.join("equity.csv"), export_equity_csv(&result.equity_curve)?)?;
    if let Some(mc) = monte_carlo {
        let json = serde_json::to_string_pretty(mc).context("failed to serialize MonteCarloResult")?;
        std::fs::write(run_dir.join("monte_carlo.json"), json)?;
    }
    std::fs::write(run_dir.join("report.md"), generate_report(result, monte_carlo))?;
    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let path = dir.join("backtest.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

// ─── Markdown report ────────────────────────────────────────────────

pub fn generate_report(result: &BacktestResult, monte_carlo: Option<&MonteCarloResult>) -> String {
    let mut md = String::with_capacity(2048);
    let m = &result.metrics;

    md.push_str("# Backtest Report\n\n");
    md.push_str("| Field | Value |\n| --- | --- |\n");
    let period = match (result.start, result.end) {
        (Some(s), Some(e)) => format!("{} to {}", s.format("%Y-%m-%d %H:%M"), e.format("%Y-%m-%d %H:%M")),
        _ => "n/a".to_string(),
    };
    let _ = writeln!(md, "| Period | {period} |");
    let _ = writeln!(md, "| Run ID | {} |", result.run_id);
    let _ = writeln!(md, "| Initial Balance | {:.2} |", result.initial_balance);
    let _ = writeln!(md, "| Final Balance | {:.2} |", result.final_balance);
    md.push('\n');

    md.push_str("## Performance Summary\n\n| Metric | Value |\n| --- | --- |\n");
    let _ = writeln!(md, "| Total Return | {:.2}% |", result.total_return_pct);
    let _ = writeln!(md, "| Trades | {} ({} won, {} lost) |", m.total_trades, m.winning_trades, m.losing_trades);
    let _ = writeln!(md, "| Win Rate | {:.1}% |", m.win_percentage);
    let _ = writeln!(md, "| Profit Factor | {:.2} |", m.profit_factor);
    let _ = writeln!(md, "| Sharpe | {:.3} |", m.sharpe_ratio);
    let _ = writeln!(md, "| Max Drawdown | {:.2}% |", m.max_drawdown_pct);
    let _ = writeln!(md, "| Expectancy | {:.2} |", m.expectancy);
    let _ = writeln!(md, "| Avg Gain / Loss | {:.2} / {:.2} |", m.average_gain, m.average_loss);
    let _ = writeln!(md, "| Largest Win / Loss | {:.2} / {:.2} |", m.largest_win, m.largest_loss);
    let _ = writeln!(md, "| Max Consecutive Wins / Losses | {} / {} |", m.max_consecutive_wins, m.max_consecutive_losses);
    let _ = writeln!(md, "| Prediction Accuracy | {:.1}% |", result.prediction_accuracy);
    let _ = writeln!(md, "| Skipped Steps | {} |", result.skipped_steps);
    md.push('\n');

    if !result.regime_stats.is_empty() {
        md.push_str("## By Regime\n\n| Regime | Trades | Win Rate | Net P&L |\n| --- | --- | --- | --- |\n");
        for (regime, s) in &result.regime_stats {
            let _ = writeln!(md, "| {regime} | {} | {:.1}% | {:.2} |", s.trades, s.win_rate, s.net_pnl);
        }
        md.push('\n');
    }

    if !result.monthly_returns.is_empty() {
        md.push_str("## By Month\n\n| Month | Trades | P&L | Return |\n| --- | --- | --- | --- |\n");
        for (month, r) in &result.monthly_returns {
            let _ = writeln!(md, "| {month} | {} | {:.2} | {:.2}% |", r.trades, r.pnl, r.return_pct);
        }
        md.push('\n');
    }

    if let Some(mc) = monte_carlo {
        md.push_str("## Monte Carlo\n\n| Percentile | Return | Max Drawdown |\n| --- | --- | --- |\n");
        for (name, run) in [
            ("Worst", mc.worst),
            ("10th", mc.p10),
            ("25th", mc.p25),
            ("Median", mc.median),
            ("75th", mc.p75),
            ("90th", mc.p90),
            ("Best", mc.best),
        ] {
            let _ = writeln!(md, "| {name} | {:.2}% | {:.2}% |", run.total_return_pct, run.max_drawdown_pct);
        }
        let _ = writeln!(
            md,
            "\n{} runs, probability of profit {:.1}%, 95th percentile drawdown {:.2}%",
            mc.simulations,
            mc.probability_of_profit * 100.0,
            mc.p95_drawdown_pct
        );
    }

    md
}
