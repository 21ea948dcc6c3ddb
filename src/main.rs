use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use prop_eval::eval::{DailySeries, DistributionAggregator, EvalPathSimulator, TradeStream};
use prop_eval::io::{load_candles_csv, load_trades_csv, parse_number_list, write_json};
use prop_eval::synthetic::{business_days, StrategyConfig, SyntheticStrategy};
use prop_eval::{LockMode, RiskRules, Trade};

#[derive(Parser, Debug)]
#[command(name = "prop-eval")]
#[command(about = "Prop-firm evaluation pass/fail and days-to-pass simulator")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Print verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    rules: RuleArgs,
}

#[derive(clap::Args, Debug)]
struct RuleArgs {
    /// JSON rules file (missing fields fall back to the selected preset)
    #[arg(long, global = true, env = "PROP_EVAL_RULES")]
    rules: Option<PathBuf>,

    /// Use the days-to-pass preset ($750/$300 daily caps, 30 days) as the base
    #[arg(long, global = true)]
    days_to_pass: bool,

    /// Maximum attempt length in days
    #[arg(long, global = true)]
    max_days: Option<usize>,

    /// Stop trading for the day at this realized profit
    #[arg(long, global = true)]
    profit_cap: Option<f64>,

    /// Stop trading for the day at this realized loss
    #[arg(long, global = true)]
    loss_cap: Option<f64>,

    /// Trailing floor lock behaviour
    #[arg(long, global = true, value_enum)]
    lock_mode: Option<LockModeArg>,

    /// Only days with fills count as elapsed attempt days
    #[arg(long, global = true)]
    trade_days_only: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LockModeArg {
    AlwaysMin,
    LockOnCross,
}

impl From<LockModeArg> for LockMode {
    fn from(arg: LockModeArg) -> Self {
        match arg {
            LockModeArg::AlwaysMin => LockMode::AlwaysMin,
            LockModeArg::LockOnCross => LockMode::LockOnCross,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Simulate a single evaluation attempt
    Attempt {
        /// Realized profit per day (comma-separated)
        #[arg(long, conflicts_with = "trades")]
        profits: Option<String>,

        /// End-of-day balances matching --profits (comma-separated)
        #[arg(long, requires = "profits")]
        closes: Option<String>,

        /// Trades CSV (side,entry_ts,exit_ts,pnl), optionally .zst
        #[arg(long)]
        trades: Option<PathBuf>,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Days-to-pass distribution over every start day of a candle dataset,
    /// replaying recorded trades as the strategy
    Distribution {
        /// Candle CSV (time,open,high,low,close[,volume]), optionally .zst
        #[arg(long)]
        candles: PathBuf,

        /// Trades CSV (side,entry_ts,exit_ts,pnl), optionally .zst
        #[arg(long)]
        trades: PathBuf,

        /// Skip start days with fewer remaining days than this
        #[arg(long, default_value = "0")]
        min_remaining_days: usize,

        /// Pass-rate horizons in days (comma-separated)
        #[arg(long, default_value = "4,5,7,10")]
        horizons: String,

        /// Evaluate windows on one thread
        #[arg(long)]
        sequential: bool,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Days-to-pass distribution for a seeded synthetic strategy
    Synthetic {
        /// Strategy JSON (missing fields use defaults)
        #[arg(long)]
        strategy: Option<PathBuf>,

        /// First calendar day (YYYY-MM-DD)
        #[arg(long, default_value = "2025-01-06")]
        start: String,

        /// Number of business days to generate
        #[arg(long, default_value = "250")]
        days: usize,

        #[arg(long)]
        seed: Option<u64>,

        #[arg(long, default_value = "4,5,7,10")]
        horizons: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let rules = build_rules(&args.rules)?;
    info!(
        "Rules: target ${:.0}, MLL ${:.0}, consistency {:.0}%, max {} days, lock {}",
        rules.profit_target,
        rules.max_loss_limit,
        rules.consistency_cap * 100.0,
        rules.max_days,
        rules.lock_mode
    );

    match args.command {
        Commands::Attempt { profits, closes, trades, output } => {
            run_attempt(rules, profits, closes, trades, output)?;
        }
        Commands::Distribution {
            candles, trades, min_remaining_days,
            horizons, sequential, output,
        } => {
            run_distribution(
                rules, candles, trades, min_remaining_days,
                &horizons, sequential, output,
            )?;
        }
        Commands::Synthetic { strategy, start, days, seed, horizons, output } => {
            run_synthetic(rules, strategy, &start, days, seed, &horizons, output)?;
        }
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {:?}", path))
}

fn build_rules(args: &RuleArgs) -> Result<RiskRules> {
    let preset = if args.days_to_pass {
        RiskRules::lucid_25k_days_to_pass()
    } else {
        RiskRules::default()
    };
    let mut rules = match &args.rules {
        Some(path) => overlay_rules(preset, read_json(path)?)
            .with_context(|| format!("Invalid rules in {:?}", path))?,
        None => preset,
    };

    if let Some(max_days) = args.max_days {
        rules.max_days = max_days;
    }
    if args.profit_cap.is_some() {
        rules.daily_profit_cap = args.profit_cap;
    }
    if args.loss_cap.is_some() {
        rules.daily_loss_cap = args.loss_cap;
    }
    if let Some(mode) = args.lock_mode {
        rules.lock_mode = mode.into();
    }
    if args.trade_days_only {
        rules.count_empty_calendar_days = false;
    }

    rules.validate()?;
    Ok(rules)
}

/// Fields present in `overrides` replace the preset's, the rest are kept
fn overlay_rules(preset: RiskRules, overrides: serde_json::Value) -> Result<RiskRules> {
    let mut merged = serde_json::to_value(&preset)?;
    match (merged.as_object_mut(), overrides) {
        (Some(fields), serde_json::Value::Object(overrides)) => fields.extend(overrides),
        (_, other) => anyhow::bail!("Rules must be a JSON object, got {}", other),
    }
    Ok(serde_json::from_value(merged)?)
}

fn parse_horizons(s: &str) -> Result<Vec<usize>> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<usize>().with_context(|| format!("Invalid horizon: {:?}", part)))
        .collect()
}

fn run_attempt(
    rules: RiskRules,
    profits: Option<String>,
    closes: Option<String>,
    trades: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let simulator = EvalPathSimulator::new(rules)?;

    let result = match (profits, trades) {
        (Some(profits), _) => {
            let profits = parse_number_list(&profits)?;
            let source = match closes {
                Some(closes) => DailySeries::with_closes(profits, parse_number_list(&closes)?),
                None => DailySeries::new(profits),
            };
            simulator.run(&source)?
        }
        (None, Some(path)) => {
            let trades = load_trades_csv(&path)?;
            info!("Loaded {} trades from {:?}", trades.len(), path);
            simulator.run(&TradeStream::new(&trades))?
        }
        (None, None) => anyhow::bail!("Provide --profits or --trades"),
    };

    info!(
        "{} after {} days: total ${:.2}, largest day ${:.2}, balance ${:.2}, floor ${:.2}",
        result.outcome,
        result.days,
        result.total_profit,
        result.largest_day_profit,
        result.final_balance,
        result.floor
    );
    write_json(&result, output.as_deref())
}

fn run_distribution(
    rules: RiskRules,
    candles_path: PathBuf,
    trades_path: PathBuf,
    min_remaining_days: usize,
    horizons: &str,
    sequential: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    info!("=== DISTRIBUTION MODE ===");
    let candles = load_candles_csv(&candles_path)?;
    let trades = load_trades_csv(&trades_path)?;
    info!("Loaded {} candles and {} trades", candles.len(), trades.len());

    if candles.is_empty() {
        anyhow::bail!("No candles found in {:?}", candles_path);
    }

    let mut aggregator = DistributionAggregator::new(rules)?
        .with_horizons(parse_horizons(horizons)?)
        .with_min_remaining_days(min_remaining_days);
    if sequential {
        aggregator = aggregator.sequential();
    }

    // Recorded trades stand in for the strategy: a window sees the trades
    // entered at or after its first candle
    let replay = |window: &[prop_eval::Candle]| -> Vec<Trade> {
        let Some(first) = window.first() else {
            return Vec::new();
        };
        let from = trades.partition_point(|t| t.exit_ts < first.ts);
        trades[from..]
            .iter()
            .filter(|t| t.entry_ts >= first.ts)
            .cloned()
            .collect()
    };

    let start = std::time::Instant::now();
    let report = aggregator.run(&candles, replay)?;
    info!("Completed in {:.1}s", start.elapsed().as_secs_f64());

    write_json(&report, output.as_deref())
}

fn run_synthetic(
    rules: RiskRules,
    strategy_path: Option<PathBuf>,
    start: &str,
    days: usize,
    seed: Option<u64>,
    horizons: &str,
    output: Option<PathBuf>,
) -> Result<()> {
    info!("=== SYNTHETIC MODE ===");
    let mut config: StrategyConfig = match &strategy_path {
        Some(path) => read_json(path)?,
        None => StrategyConfig::default(),
    };
    if let Some(seed) = seed {
        config.seed = seed;
    }

    let start = NaiveDate::parse_from_str(start, "%Y-%m-%d")
        .with_context(|| format!("Invalid start date: {}", start))?;
    let calendar = business_days(start, days);

    info!(
        "Strategy {}: {:.1}% WR, ${:.0} avg win, ${:.0} avg loss, {} trades/day, seed {}",
        config.name,
        config.win_rate * 100.0,
        config.avg_win,
        config.avg_loss,
        config.trades_per_day,
        config.seed
    );
    let strategy = SyntheticStrategy::new(config)?;

    let aggregator = DistributionAggregator::new(rules)?.with_horizons(parse_horizons(horizons)?);
    let report = aggregator.run(&calendar, |window| strategy.generate(window))?;

    write_json(&report, output.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule_args(days_to_pass: bool) -> RuleArgs {
        RuleArgs {
            rules: None,
            days_to_pass,
            max_days: None,
            profit_cap: None,
            loss_cap: None,
            lock_mode: None,
            trade_days_only: false,
        }
    }

    #[test]
    fn test_rules_file_layers_over_days_to_pass_preset() {
        let rules = overlay_rules(RiskRules::lucid_25k_days_to_pass(), json!({ "max_days": 20 })).unwrap();
        assert_eq!(rules.max_days, 20);
        assert_eq!(rules.daily_profit_cap, Some(750.0));
        assert_eq!(rules.daily_loss_cap, Some(300.0));
    }

    #[test]
    fn test_rules_file_can_clear_preset_caps() {
        let rules = overlay_rules(RiskRules::lucid_25k_days_to_pass(), json!({ "daily_profit_cap": null })).unwrap();
        assert_eq!(rules.daily_profit_cap, None);
        assert_eq!(rules.daily_loss_cap, Some(300.0));
    }

    #[test]
    fn test_rules_file_must_be_an_object() {
        assert!(overlay_rules(RiskRules::default(), json!([1, 2])).is_err());
    }

    #[test]
    fn test_build_rules_from_file_keeps_days_to_pass_preset() {
        let path = std::env::temp_dir().join(format!("prop-eval-{}-rules.json", std::process::id()));
        std::fs::write(&path, r#"{ "profit_target": 1500.0 }"#).unwrap();

        let mut args = rule_args(true);
        args.rules = Some(path.clone());
        let rules = build_rules(&args);
        std::fs::remove_file(&path).ok();

        let rules = rules.unwrap();
        assert_eq!(rules.profit_target, 1500.0);
        assert_eq!(rules.max_days, 30);
        assert_eq!(rules.daily_profit_cap, Some(750.0));
    }

    #[test]
    fn test_build_rules_without_file() {
        assert_eq!(build_rules(&rule_args(false)).unwrap(), RiskRules::default());
        assert_eq!(build_rules(&rule_args(true)).unwrap(), RiskRules::lucid_25k_days_to_pass());
    }
}
