//! Candlecast CLI: predict, backtest, and Monte Carlo commands.
//!
//! Commands:
//! - `predict`: score the latest window of a candle series
//! - `backtest`: replay the pipeline over history and report performance
//! - `monte-carlo`: backtest, then resample trade order
//!
//! Candles come from a CSV file (`--data`), a directory of
//! `{SYMBOL}_{interval}.csv` files (`--dir`), or a deterministic synthetic
//! series (`--synthetic N`). Logs go to stderr (`RUST_LOG`, default `info`);
//! `--json` prints machine-readable results on stdout.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use candlecast_core::domain::{median_spacing_secs, resample, synthetic_candles, Candle, Interval};
use candlecast_core::risk::TradeAction;
use candlecast_core::source::CandleSource;
use candlecast_core::{AnalysisPipeline, Prediction};
use candlecast_runner::monte_carlo::simulate;
use candlecast_runner::{
    dataset_hash, load_csv, save_artifacts, Backtest, BacktestResult, CsvCandleSource,
    MonteCarloResult, RunConfig,
};

#[derive(Parser)]
#[command(
    name = "candlecast",
    version,
    about = "Candlecast: candle analysis, prediction, and backtesting"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict the next move from the most recent window.
    Predict {
        #[command(flatten)]
        data: DataArgs,

        /// Path to a TOML run config. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Candles in the analysis window.
        #[arg(long, default_value_t = 100)]
        window: usize,

        /// Print JSON instead of a text summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Replay the pipeline over history.
    Backtest {
        #[command(flatten)]
        data: DataArgs,

        #[arg(long)]
        config: Option<PathBuf>,

        /// Also run a Monte Carlo simulation on the trades.
        #[arg(long, default_value_t = false)]
        monte_carlo: bool,

        /// Write JSON/CSV/Markdown artifacts under this directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Backtest, then resample the trade order.
    MonteCarlo {
        #[command(flatten)]
        data: DataArgs,

        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of runs. Overrides the config.
        #[arg(long)]
        runs: Option<usize>,

        /// Master seed. Overrides the config.
        #[arg(long)]
        seed: Option<u64>,

        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

/// Where candles come from.
#[derive(Args, Debug)]
struct DataArgs {
    /// CSV file with a timestamp,open,high,low,close,volume header.
    #[arg(long, conflicts_with_all = ["dir", "synthetic"])]
    data: Option<PathBuf>,

    /// Directory of {SYMBOL}_{interval}.csv files.
    #[arg(long, conflicts_with = "synthetic")]
    dir: Option<PathBuf>,

    /// Symbol to read from --dir.
    #[arg(long, default_value = "BTCUSDT")]
    symbol: String,

    /// Candle interval (1m, 5m, 15m, 30m, 1h, 4h, 1d, 1w).
    #[arg(long, default_value = "1h")]
    interval: Interval,

    /// Only use the last N days of history from --dir.
    #[arg(long)]
    days: Option<u32>,

    /// Generate N deterministic synthetic candles instead of reading data.
    #[arg(long)]
    synthetic: Option<usize>,
}

impl DataArgs {
    fn label(&self) -> String {
        if self.synthetic.is_some() {
            return "SYNTHETIC".to_string();
        }
        match &self.data {
            Some(path) => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "data".to_string()),
            None => self.symbol.to_uppercase(),
        }
    }

    fn load(&self) -> Result<Vec<Candle>> {
        let candles = if let Some(count) = self.synthetic {
            synthetic_candles(&self.symbol, count, self.interval, 0.0)
        } else if let Some(path) = &self.data {
            load_csv(path).with_context(|| format!("failed to load {}", path.display()))?
        } else if let Some(dir) = &self.dir {
            let source = CsvCandleSource::new(dir);
            match self.days {
                Some(days) => source.historical_candles(&self.symbol, self.interval, days)?,
                None => source.candles(&self.symbol, self.interval, usize::MAX)?,
            }
        } else {
            bail!("no candle input: pass --data, --dir, or --synthetic");
        };
        if candles.is_empty() {
            bail!("candle input is empty");
        }
        info!(
            candles = candles.len(),
            hash = %dataset_hash(&candles),
            synthetic = self.synthetic.is_some(),
            "candles loaded"
        );
        Ok(candles)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Predict {
            data,
            config,
            window,
            json,
        } => run_predict(&data, config, window, json),
        Commands::Backtest {
            data,
            config,
            monte_carlo,
            output_dir,
            json,
        } => run_backtest_cmd(&data, config, monte_carlo, output_dir, json),
        Commands::MonteCarlo {
            data,
            config,
            runs,
            seed,
            json,
        } => run_monte_carlo_cmd(&data, config, runs, seed, json),
    }
}

fn load_config(path: Option<PathBuf>) -> Result<RunConfig> {
    match path {
        Some(path) => {
            RunConfig::load(&path).with_context(|| format!("failed to load config {}", path.display()))
        }
        None => Ok(RunConfig::default()),
    }
}

fn run_predict(data: &DataArgs, config_path: Option<PathBuf>, window: usize, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    if window == 0 {
        bail!("--window must be positive");
    }
    let candles = data.load()?;
    let start = candles.len().saturating_sub(window);

    // Higher timeframes from the configured resample factors
    let base_secs = base_interval_secs(&candles, data.interval);
    let mut mtf = BTreeMap::new();
    for &factor in &config.backtest.mtf_factors {
        if let Some(interval) = Interval::from_seconds(base_secs * factor as i64) {
            let history = &candles[candles.len().saturating_sub(window * factor)..];
            mtf.insert(interval, resample(history, factor));
        }
    }

    let prediction = AnalysisPipeline::default().predict(
        &candles[start..],
        &mtf,
        &config.indicators,
        &config.account,
    );
    if json {
        println!("{}", serde_json::to_string_pretty(&prediction)?);
    } else {
        print_prediction(&data.label(), &prediction);
    }
    Ok(())
}

/// Spacing of the loaded series; `--interval` only when it cannot be
/// inferred.
fn base_interval_secs(candles: &[Candle], fallback: Interval) -> i64 {
    median_spacing_secs(candles).unwrap_or_else(|| fallback.seconds())
}

fn run_backtest_cmd(
    data: &DataArgs,
    config_path: Option<PathBuf>,
    with_monte_carlo: bool,
    output_dir: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let candles = data.load()?;
    let result = Backtest::new(config.clone()).run(&candles, None)?;
    let mc = if with_monte_carlo {
        Some(simulate(&result, &config.monte_carlo, None)?)
    } else {
        None
    };

    if json {
        let doc = serde_json::json!({ "backtest": &result, "monte_carlo": &mc });
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        print_backtest(&data.label(), &result);
        if let Some(mc) = &mc {
            print_monte_carlo(mc);
        }
    }

    if let Some(dir) = output_dir {
        let run_dir = save_artifacts(&result, mc.as_ref(), &data.label(), &dir)?;
        eprintln!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn run_monte_carlo_cmd(
    data: &DataArgs,
    config_path: Option<PathBuf>,
    runs: Option<usize>,
    seed: Option<u64>,
    json: bool,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(runs) = runs {
        config.monte_carlo.runs = runs;
    }
    if let Some(seed) = seed {
        config.monte_carlo.seed = seed;
    }
    let candles = data.load()?;
    let result = Backtest::new(config.clone()).run(&candles, None)?;
    let mc = simulate(&result, &config.monte_carlo, None)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&mc)?);
    } else {
        println!(
            "Backtest: {} trades, {:.1}% win rate, {:.2}% return",
            result.total_trades(),
            result.metrics.win_percentage,
            result.total_return_pct
        );
        print_monte_carlo(&mc);
    }
    Ok(())
}

fn print_prediction(label: &str, p: &Prediction) {
    let r = &p.result;
    let s = &p.suggestion;
    println!();
    println!("=== Prediction: {label} ===");
    println!("Direction:      {}", r.direction);
    println!("Confidence:     {}", r.confidence);
    println!("Net Score:      {:.3}", r.net_score);
    println!("Valid Until:    {}", r.target_timestamp.format("%Y-%m-%d %H:%M UTC"));
    println!(
        "Regime:         {} ({}, strength {:.2}, volatility {})",
        p.regime.regime_type, p.regime.direction, p.regime.strength, p.regime.volatility_level
    );
    if p.anomaly.is_anomaly {
        println!("Anomaly:        {} (score {:.2})", p.anomaly.type_label(), p.anomaly.score);
    }
    println!();
    println!("--- Factors ---");
    for factor in &r.factors {
        println!("- {factor}");
    }
    println!();
    println!("--- Trade ---");
    println!("Action:         {}", s.action);
    if s.action != TradeAction::NoTrade {
        println!("Entry:          {:.4}", s.entry_price);
        println!("Stop Loss:      {:.4}", s.stop_loss);
        println!("Take Profit:    {:.4} ({:.1}R)", s.take_profit, s.risk_reward_ratio);
        let alts: Vec<String> = s.alternate_targets.iter().map(|t| format!("{t:.4}")).collect();
        println!("Targets:        {}", alts.join(" / "));
        println!("Position Size:  {:.4}", s.position_size);
        println!("Account Risk:   {:.2}% ({:.2})", s.account_risk_percent, s.risk_amount());
    }
}

fn print_backtest(label: &str, result: &BacktestResult) {
    let m = &result.metrics;
    println!();
    println!("=== Backtest Result: {label} ===");
    if let (Some(start), Some(end)) = (result.start, result.end) {
        println!("Period:         {} to {}", start.format("%Y-%m-%d %H:%M"), end.format("%Y-%m-%d %H:%M"));
    }
    println!("Predictions:    {} ({} skipped)", result.predictions_made, result.skipped_steps);
    println!("Trades:         {} ({} won, {} lost)", m.total_trades, m.winning_trades, m.losing_trades);
    println!();
    println!("--- Performance ---");
    println!("Final Balance:  {:.2}", result.final_balance);
    println!("Total Return:   {:.2}%", result.total_return_pct);
    println!("Win Rate:       {:.1}%", m.win_percentage);
    println!("Profit Factor:  {:.2}", m.profit_factor);
    println!("Sharpe:         {:.3}", m.sharpe_ratio);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown_pct);
    println!("Expectancy:     {:.2}", m.expectancy);
    println!("Avg Gain/Loss:  {:.2} / {:.2}", m.average_gain, m.average_loss);
    println!("Max Streaks:    {} wins / {} losses", m.max_consecutive_wins, m.max_consecutive_losses);
    println!("Accuracy:       {:.1}%", result.prediction_accuracy);
    if !result.regime_stats.is_empty() {
        println!();
        println!("--- By Regime ---");
        for (regime, s) in &result.regime_stats {
            println!("{:<15} {:>4} trades  {:>5.1}% win  {:>10.2}", regime.to_string(), s.trades, s.win_rate, s.net_pnl);
        }
    }
}

fn print_monte_carlo(mc: &MonteCarloResult) {
    println!();
    println!("=== Monte Carlo ({} runs) ===", mc.simulations);
    for (name, run) in [
        ("Worst", mc.worst),
        ("10th", mc.p10),
        ("25th", mc.p25),
        ("Median", mc.median),
        ("75th", mc.p75),
        ("90th", mc.p90),
        ("Best", mc.best),
    ] {
        println!(
            "{name:<8} return {:>8.2}%  drawdown {:>6.2}%",
            run.total_return_pct, run.max_drawdown_pct
        );
    }
    println!("Mean Return:    {:.2}%", mc.mean_return_pct);
    println!("P(profit):      {:.1}%", mc.probability_of_profit * 100.0);
    println!("P95 Drawdown:   {:.2}%", mc.p95_drawdown_pct);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_interval_follows_loaded_spacing() {
        let candles = synthetic_candles("BTCUSDT", 50, Interval::M15, 0.0);
        assert_eq!(base_interval_secs(&candles, Interval::H1), Interval::M15.seconds());
    }

    #[test]
    fn base_interval_falls_back_without_spacing() {
        assert_eq!(base_interval_secs(&[], Interval::H4), Interval::H4.seconds());
    }
}
