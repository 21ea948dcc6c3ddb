//! Day-by-day evaluation state machine
//!
//! One attempt starts from a fresh [`AccountState`] and advances one simulated
//! day at a time through [`step`]. Each day runs, in this order:
//!
//! 1. realize the day's profit (already gated by the source)
//! 2. update total, largest day and balance
//! 3. end-of-day drawdown check -> `MllBreach`
//! 4. day-cap consistency proxy -> `ConsistencyBreach`
//! 5. target reached -> final ratio check -> `TargetHit` or `ConsistencyBreach`
//!
//! Running out of days (max_days or the input) ends in `Timeout`.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::bucketer::DayBuckets;
use super::consistency::ConsistencyChecker;
use super::drawdown::TrailingDrawdownGovernor;
use super::gate::IntradayGate;
use crate::error::{Result, ValidationError};
use crate::rules::RiskRules;
use crate::types::{DayKey, Trade};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalOutcome {
    TargetHit,
    MllBreach,
    ConsistencyBreach,
    Timeout,
}

impl EvalOutcome {
    pub const ALL: [EvalOutcome; 4] = [
        EvalOutcome::TargetHit,
        EvalOutcome::MllBreach,
        EvalOutcome::ConsistencyBreach,
        EvalOutcome::Timeout,
    ];

    pub fn is_pass(&self) -> bool {
        matches!(self, Self::TargetHit)
    }

    pub fn is_breach(&self) -> bool {
        matches!(self, Self::MllBreach | Self::ConsistencyBreach)
    }
}

impl fmt::Display for EvalOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetHit => write!(f, "target_hit"),
            Self::MllBreach => write!(f, "mll_breach"),
            Self::ConsistencyBreach => write!(f, "consistency_breach"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

/// One simulated day as fed to the state machine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayInput {
    /// Realized (already gated) profit for the day
    pub profit: f64,
    /// Explicit end-of-day balance; `None` means prior balance + profit
    pub close: Option<f64>,
}

impl DayInput {
    pub fn profit(profit: f64) -> Self {
        Self { profit, close: None }
    }
}

/// Per-attempt account snapshot. Each call to [`step`] returns a new one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountState {
    pub balance: f64,
    pub governor: TrailingDrawdownGovernor,
    pub floor: f64,
    pub total_profit: f64,
    pub largest_day_profit: f64,
    /// Days simulated so far; the day just stepped has index `days` (1-based)
    pub days: usize,
}

impl AccountState {
    pub fn new(rules: &RiskRules) -> Self {
        Self {
            balance: rules.start_balance,
            governor: TrailingDrawdownGovernor::new(rules),
            floor: rules.initial_floor(),
            total_profit: 0.0,
            largest_day_profit: 0.0,
            days: 0,
        }
    }

    pub fn highest_close(&self) -> f64 {
        self.governor.highest_close()
    }

    pub fn result(&self, outcome: EvalOutcome) -> PathResult {
        PathResult {
            outcome,
            days: self.days,
            total_profit: self.total_profit,
            largest_day_profit: self.largest_day_profit,
            final_balance: self.balance,
            highest_close: self.highest_close(),
            floor: self.floor,
        }
    }
}

/// Terminal snapshot of one attempt
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathResult {
    pub outcome: EvalOutcome,
    pub days: usize,
    pub total_profit: f64,
    pub largest_day_profit: f64,
    pub final_balance: f64,
    pub highest_close: f64,
    pub floor: f64,
}

impl PathResult {
    pub fn passed(&self) -> bool {
        self.outcome.is_pass()
    }
}

/// Advance one day. Returns the new state and the terminal outcome, if any.
///
/// Timeout is decided by the caller, which knows how many days remain.
pub fn step(state: &AccountState, rules: &RiskRules, day: DayInput) -> (AccountState, Option<EvalOutcome>) {
    let mut next = *state;
    next.days += 1;
    next.total_profit += day.profit;
    next.largest_day_profit = next.largest_day_profit.max(day.profit);
    next.balance = day.close.unwrap_or(state.balance + day.profit);

    let (governor, check) = state.governor.step(rules, next.balance);
    next.governor = governor;
    next.floor = check.floor;
    if check.breached {
        return (next, Some(EvalOutcome::MllBreach));
    }

    let consistency = ConsistencyChecker::new(rules);
    if consistency.day_cap_breached(next.largest_day_profit) {
        return (next, Some(EvalOutcome::ConsistencyBreach));
    }

    if next.total_profit >= rules.profit_target {
        let outcome = if consistency.final_ratio_ok(next.total_profit, next.largest_day_profit) {
            EvalOutcome::TargetHit
        } else {
            EvalOutcome::ConsistencyBreach
        };
        return (next, Some(outcome));
    }

    (next, None)
}

/// Anything that can be turned into the ordered days of an attempt
pub trait TradeSource {
    /// At most `rules.max_days` days, gated with `gate` where trades are involved
    fn simulated_days(&self, rules: &RiskRules, gate: &IntradayGate) -> Result<Vec<DayInput>>;
}

/// Pre-aggregated realized profit per day, optionally with EOD balances
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailySeries {
    pub profits: Vec<f64>,
    pub closes: Option<Vec<f64>>,
}

impl DailySeries {
    pub fn new(profits: Vec<f64>) -> Self {
        Self { profits, closes: None }
    }

    pub fn with_closes(profits: Vec<f64>, closes: Vec<f64>) -> Self {
        Self {
            profits,
            closes: Some(closes),
        }
    }
}

impl TradeSource for DailySeries {
    fn simulated_days(&self, rules: &RiskRules, _gate: &IntradayGate) -> Result<Vec<DayInput>> {
        if let Some(closes) = &self.closes {
            if closes.len() != self.profits.len() {
                return Err(ValidationError::ClosesLengthMismatch {
                    profits: self.profits.len(),
                    closes: closes.len(),
                });
            }
            if let Some(index) = closes.iter().position(|c| !c.is_finite()) {
                return Err(ValidationError::NonFiniteProfit { index });
            }
        }
        if let Some(index) = self.profits.iter().position(|p| !p.is_finite()) {
            return Err(ValidationError::NonFiniteProfit { index });
        }

        Ok(self
            .profits
            .iter()
            .take(rules.max_days)
            .enumerate()
            .map(|(i, &profit)| DayInput {
                profit,
                close: self.closes.as_ref().map(|closes| closes[i]),
            })
            .collect())
    }
}

/// Closed trades ordered by exit, optionally walked against a day calendar
#[derive(Debug, Clone, Copy)]
pub struct TradeStream<'a> {
    trades: &'a [Trade],
    calendar: Option<&'a [DayKey]>,
}

impl<'a> TradeStream<'a> {
    pub fn new(trades: &'a [Trade]) -> Self {
        Self { trades, calendar: None }
    }

    /// Walk the given days (e.g. the dataset's days from the window start)
    pub fn with_calendar(trades: &'a [Trade], calendar: &'a [DayKey]) -> Self {
        Self {
            trades,
            calendar: Some(calendar),
        }
    }
}

impl TradeSource for TradeStream<'_> {
    fn simulated_days(&self, rules: &RiskRules, gate: &IntradayGate) -> Result<Vec<DayInput>> {
        let buckets = DayBuckets::partition(self.trades)?;
        let days = buckets.simulated_days(self.calendar, rules.count_empty_calendar_days);

        Ok(days
            .into_iter()
            .take(rules.max_days)
            .map(|day| DayInput::profit(gate.day_profit(buckets.trades_on(day))))
            .collect())
    }
}

/// Runs single attempts under one rule set
#[derive(Debug, Clone)]
pub struct EvalPathSimulator {
    rules: RiskRules,
    gate: IntradayGate,
}

impl EvalPathSimulator {
    pub fn new(rules: RiskRules) -> Result<Self> {
        rules.validate()?;
        let gate = IntradayGate::from_rules(&rules);
        Ok(Self { rules, gate })
    }

    pub fn rules(&self) -> &RiskRules {
        &self.rules
    }

    pub fn run<S: TradeSource + ?Sized>(&self, source: &S) -> Result<PathResult> {
        let days = source.simulated_days(&self.rules, &self.gate)?;
        if days.is_empty() {
            return Err(ValidationError::EmptyDaySequence);
        }
        Ok(self.run_days(&days))
    }

    /// Drive the state machine over days that are already validated
    pub fn run_days(&self, days: &[DayInput]) -> PathResult {
        let mut state = AccountState::new(&self.rules);
        for &day in days.iter().take(self.rules.max_days) {
            let (next, outcome) = step(&state, &self.rules, day);
            state = next;
            if let Some(outcome) = outcome {
                return state.result(outcome);
            }
        }
        state.result(EvalOutcome::Timeout)
    }
}
