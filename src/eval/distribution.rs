//! Days-to-pass distribution over every start day of a dataset
//!
//! Each start day is one independent window: the dataset is sliced from that
//! day onward, the strategy regenerates its trades from the slice, and a fresh
//! attempt is simulated. Windows run in parallel with Rayon and are reduced in
//! start-day order, so reports are identical with or without parallelism.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

use super::bucketer::DayIndex;
use super::simulator::{AccountState, DayInput, EvalOutcome, EvalPathSimulator, PathResult, TradeStream};
use crate::error::{Result, ValidationError};
use crate::rules::RiskRules;
use crate::types::{DayKey, Timestamped, Trade};

/// Horizons reported as `pass_leq_rates` unless overridden
pub const DEFAULT_HORIZONS: [usize; 4] = [4, 5, 7, 10];

/// Day ranges used for pass buckets
pub const PASS_BUCKETS: [(usize, usize); 6] = [(1, 5), (6, 10), (11, 15), (16, 20), (21, 25), (26, 30)];

const PROGRESS_EVERY: usize = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub target_hit: usize,
    pub mll_breach: usize,
    pub consistency_breach: usize,
    pub timeout: usize,
}

impl OutcomeCounts {
    pub fn get(&self, outcome: EvalOutcome) -> usize {
        match outcome {
            EvalOutcome::TargetHit => self.target_hit,
            EvalOutcome::MllBreach => self.mll_breach,
            EvalOutcome::ConsistencyBreach => self.consistency_breach,
            EvalOutcome::Timeout => self.timeout,
        }
    }

    fn slot(&mut self, outcome: EvalOutcome) -> &mut usize {
        match outcome {
            EvalOutcome::TargetHit => &mut self.target_hit,
            EvalOutcome::MllBreach => &mut self.mll_breach,
            EvalOutcome::ConsistencyBreach => &mut self.consistency_breach,
            EvalOutcome::Timeout => &mut self.timeout,
        }
    }

    pub fn total(&self) -> usize {
        self.target_hit + self.mll_breach + self.consistency_breach + self.timeout
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PassBucket {
    pub from_day: usize,
    pub to_day: usize,
    pub count: usize,
    pub rate: f64,
}

/// Outcome statistics over all windows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionReport {
    pub windows: usize,
    pub max_days: usize,
    pub outcomes: OutcomeCounts,
    /// Mean elapsed days per outcome that occurred at least once
    pub mean_days: BTreeMap<EvalOutcome, f64>,
    /// Elapsed days -> windows that hit the target on that day
    pub pass_days_hist: BTreeMap<usize, usize>,
    pub pass_rate: f64,
    pub breach_rate: f64,
    pub timeout_rate: f64,
    /// Horizon `h` -> share of windows passing within `h` days
    pub pass_leq_rates: BTreeMap<usize, f64>,
    pub pass_buckets: Vec<PassBucket>,
    /// Early passes weighted higher: 1.0 (<=5d), 0.5 (<=10d), 0.25 (<=15d), 0.1 (<=20d)
    pub fastpass_score: f64,
}

fn rate(n: usize, windows: usize) -> f64 {
    if windows == 0 {
        0.0
    } else {
        n as f64 / windows as f64
    }
}

fn fastpass_weight(days: usize) -> f64 {
    match days {
        0..=5 => 1.0,
        6..=10 => 0.5,
        11..=15 => 0.25,
        16..=20 => 0.1,
        _ => 0.0,
    }
}

impl DistributionReport {
    /// Reduce per-window results, given in start-day order
    pub fn from_results(results: &[PathResult], max_days: usize, horizons: &[usize]) -> Self {
        let mut outcomes = OutcomeCounts::default();
        let mut day_sums: BTreeMap<EvalOutcome, usize> = BTreeMap::new();
        let mut pass_days_hist: BTreeMap<usize, usize> = BTreeMap::new();

        for result in results {
            *outcomes.slot(result.outcome) += 1;
            *day_sums.entry(result.outcome).or_default() += result.days;
            if result.passed() {
                *pass_days_hist.entry(result.days).or_default() += 1;
            }
        }

        let windows = results.len();
        let mean_days = day_sums
            .into_iter()
            .map(|(outcome, sum)| (outcome, sum as f64 / outcomes.get(outcome) as f64))
            .collect();

        let passes_within = |lo: usize, hi: usize| -> usize {
            pass_days_hist.range(lo..=hi).map(|(_, &n)| n).sum()
        };

        let pass_leq_rates = horizons
            .iter()
            .map(|&h| (h, rate(passes_within(0, h), windows)))
            .collect();

        let pass_buckets = PASS_BUCKETS
            .iter()
            .map(|&(from_day, to_day)| {
                let count = passes_within(from_day, to_day);
                PassBucket { from_day, to_day, count, rate: rate(count, windows) }
            })
            .collect();

        let weighted: f64 = pass_days_hist
            .iter()
            .map(|(&days, &n)| fastpass_weight(days) * n as f64)
            .sum();
        let fastpass_score = if windows == 0 { 0.0 } else { weighted / windows as f64 };

        Self {
            windows,
            max_days,
            outcomes,
            mean_days,
            pass_rate: rate(outcomes.target_hit, windows),
            breach_rate: rate(outcomes.mll_breach + outcomes.consistency_breach, windows),
            timeout_rate: rate(outcomes.timeout, windows),
            pass_days_hist,
            pass_leq_rates,
            pass_buckets,
            fastpass_score,
        }
    }

    /// Share of windows passing within `horizon` days (0.0 if not tracked)
    pub fn pass_leq_rate(&self, horizon: usize) -> f64 {
        self.pass_leq_rates.get(&horizon).copied().unwrap_or(0.0)
    }
}

/// Sliding-window driver around [`EvalPathSimulator`]
#[derive(Debug, Clone)]
pub struct DistributionAggregator {
    simulator: EvalPathSimulator,
    horizons: Vec<usize>,
    min_remaining_days: usize,
    parallel: bool,
}

impl DistributionAggregator {
    pub fn new(rules: RiskRules) -> Result<Self> {
        Ok(Self {
            simulator: EvalPathSimulator::new(rules)?,
            horizons: DEFAULT_HORIZONS.to_vec(),
            min_remaining_days: 0,
            parallel: true,
        })
    }

    pub fn with_horizons(mut self, horizons: Vec<usize>) -> Self {
        self.horizons = horizons;
        self
    }

    /// Skip start days with fewer than `days` days left in the dataset
    pub fn with_min_remaining_days(mut self, days: usize) -> Self {
        self.min_remaining_days = days;
        self
    }

    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    pub fn rules(&self) -> &RiskRules {
        self.simulator.rules()
    }

    fn start_days(&self, total_days: usize) -> Vec<usize> {
        (0..total_days)
            .filter(|&s| total_days - s >= self.min_remaining_days)
            .collect()
    }

    fn evaluate_windows<F>(&self, starts: &[usize], evaluate: F) -> Vec<Result<PathResult>>
    where
        F: Fn(usize) -> Result<PathResult> + Sync,
    {
        let total = starts.len();
        let completed = AtomicUsize::new(0);
        let tracked = |s: usize| {
            let result = evaluate(s);
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            if done % PROGRESS_EVERY == 0 || done == total {
                debug!("[{}/{}] windows evaluated", done, total);
            }
            result
        };

        if self.parallel {
            starts.par_iter().map(|&s| tracked(s)).collect()
        } else {
            starts.iter().map(|&s| tracked(s)).collect()
        }
    }

    fn reduce(&self, starts: &[usize], results: Vec<Result<PathResult>>, label: impl Fn(usize) -> DayKey) -> Result<DistributionReport> {
        let mut ok = Vec::with_capacity(results.len());
        for (&s, result) in starts.iter().zip(results) {
            let result = result?;
            debug!(
                "window {}: {} after {} days (total {:.2}, largest day {:.2})",
                label(s),
                result.outcome,
                result.days,
                result.total_profit,
                result.largest_day_profit
            );
            ok.push(result);
        }

        let report = DistributionReport::from_results(&ok, self.rules().max_days, &self.horizons);
        info!(
            "{} windows: {} passed ({:.1}%), {} MLL, {} consistency, {} timeout",
            report.windows,
            report.outcomes.target_hit,
            report.pass_rate * 100.0,
            report.outcomes.mll_breach,
            report.outcomes.consistency_breach,
            report.outcomes.timeout
        );
        Ok(report)
    }

    /// One window per start day of `dataset`.
    ///
    /// `generate` is the strategy: it sees the dataset from the start day
    /// onward and returns closed trades ordered by exit time. A validation
    /// failure in any window fails the whole run.
    pub fn run<T, F>(&self, dataset: &[T], generate: F) -> Result<DistributionReport>
    where
        T: Timestamped + Sync,
        F: Fn(&[T]) -> Vec<Trade> + Sync,
    {
        let index = DayIndex::build(dataset)?;
        if index.is_empty() {
            return Err(ValidationError::EmptyDaySequence);
        }

        let rules = self.rules();
        let starts = self.start_days(index.len());
        info!(
            "Evaluating {} windows over {} days (max_days={}, lock={}, count_empty_days={})",
            starts.len(),
            index.len(),
            rules.max_days,
            rules.lock_mode,
            rules.count_empty_calendar_days
        );

        let results = self.evaluate_windows(&starts, |s| {
            let trades = generate(&dataset[index.start_row(s)..]);
            // Walking fills only, max_days counts trade days rather than calendar days
            let calendar = if rules.count_empty_calendar_days {
                &index.days()[s..(s + rules.max_days).min(index.len())]
            } else {
                &index.days()[s..]
            };
            match self.simulator.run(&TradeStream::with_calendar(&trades, calendar)) {
                // Trade-day walking with no fills in the window: nothing elapsed
                Err(ValidationError::EmptyDaySequence) if !rules.count_empty_calendar_days => {
                    Ok(AccountState::new(rules).result(EvalOutcome::Timeout))
                }
                Err(source) => Err(ValidationError::InvalidWindow {
                    start_day: index.days()[s],
                    source: Box::new(source),
                }),
                ok => ok,
            }
        });

        self.reduce(&starts, results, |s| index.days()[s])
    }

    /// One window per position of a precomputed daily profit series
    /// (`days[i]` labels `profits[i]`)
    pub fn run_series(&self, days: &[DayKey], profits: &[f64]) -> Result<DistributionReport> {
        if profits.is_empty() {
            return Err(ValidationError::EmptyDaySequence);
        }
        if days.len() != profits.len() {
            return Err(ValidationError::ClosesLengthMismatch {
                profits: profits.len(),
                closes: days.len(),
            });
        }
        if let Some(index) = profits.iter().position(|p| !p.is_finite()) {
            return Err(ValidationError::NonFiniteProfit { index });
        }

        let inputs: Vec<DayInput> = profits.iter().map(|&p| DayInput::profit(p)).collect();
        let starts = self.start_days(inputs.len());
        info!("Evaluating {} windows over a {}-day series", starts.len(), inputs.len());

        let results = self.evaluate_windows(&starts, |s| Ok(self.simulator.run_days(&inputs[s..])));
        self.reduce(&starts, results, |s| days[s])
    }
}
