//! Evaluation rule set for a prop-firm account

use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};

/// How the trailing loss floor stops rising once the account is up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    /// Floor is always `min(highest_close - max_loss_limit, locked_floor)`
    AlwaysMin,
    /// Floor trails `highest_close - max_loss_limit` until `highest_close`
    /// first reaches `trail_lock_threshold`, then sits at `locked_floor`
    LockOnCross,
}

impl Default for LockMode {
    fn default() -> Self {
        Self::LockOnCross
    }
}

impl std::fmt::Display for LockMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlwaysMin => write!(f, "always_min"),
            Self::LockOnCross => write!(f, "lock_on_cross"),
        }
    }
}

/// Risk rules for one evaluation attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskRules {
    /// Cumulative realized profit needed to pass
    pub profit_target: f64,

    /// Max share of total profit a single day may contribute (0, 1]
    pub consistency_cap: f64,

    /// Account balance at the start of the attempt
    pub start_balance: f64,

    /// Max loss limit (MLL) trailed below the highest end-of-day close
    pub max_loss_limit: f64,

    /// Highest close at which the trailing floor locks
    pub trail_lock_threshold: f64,

    /// Floor value once locked
    pub locked_floor: f64,

    pub lock_mode: LockMode,

    /// Stop trading for the day once realized profit reaches this
    pub daily_profit_cap: Option<f64>,

    /// Stop trading for the day once realized loss reaches this (sign ignored)
    pub daily_loss_cap: Option<f64>,

    /// Longest attempt in simulated days
    pub max_days: usize,

    /// Count calendar days without fills as elapsed attempt days
    pub count_empty_calendar_days: bool,
}

impl Default for RiskRules {
    fn default() -> Self {
        Self::lucid_25k()
    }
}

impl RiskRules {
    /// LucidBlack 25K eval: $1,250 target, 60% consistency, $1,000 EOD MLL
    /// trailing until a $26,100 close, then locked at $25,100
    pub fn lucid_25k() -> Self {
        Self {
            profit_target: 1250.0,
            consistency_cap: 0.60,
            start_balance: 25000.0,
            max_loss_limit: 1000.0,
            trail_lock_threshold: 26100.0,
            locked_floor: 25100.0,
            lock_mode: LockMode::LockOnCross,
            daily_profit_cap: None,
            daily_loss_cap: None,
            max_days: 5,
            count_empty_calendar_days: true,
        }
    }

    /// Lucid 25K with the intraday governor used for days-to-pass studies
    pub fn lucid_25k_days_to_pass() -> Self {
        Self {
            daily_profit_cap: Some(750.0),
            daily_loss_cap: Some(300.0),
            max_days: 30,
            ..Self::lucid_25k()
        }
    }

    /// Largest single-day profit tolerated before the target is reached
    pub fn day_cap(&self) -> f64 {
        self.consistency_cap * self.profit_target
    }

    /// Floor before any profit has been banked
    pub fn initial_floor(&self) -> f64 {
        match self.lock_mode {
            LockMode::AlwaysMin => {
                (self.start_balance - self.max_loss_limit).min(self.locked_floor)
            }
            LockMode::LockOnCross if self.start_balance >= self.trail_lock_threshold => {
                self.locked_floor
            }
            LockMode::LockOnCross => self.start_balance - self.max_loss_limit,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.profit_target.is_finite() && self.profit_target > 0.0) {
            return Err(ValidationError::NonPositiveProfitTarget(self.profit_target));
        }
        if self.max_days == 0 {
            return Err(ValidationError::NonPositiveMaxDays);
        }
        if !(self.consistency_cap > 0.0 && self.consistency_cap <= 1.0) {
            return Err(ValidationError::InvalidConsistencyCap(self.consistency_cap));
        }
        if !(self.max_loss_limit.is_finite() && self.max_loss_limit >= 0.0) {
            return Err(ValidationError::NegativeMaxLossLimit(self.max_loss_limit));
        }
        for (field, value) in [
            ("start_balance", self.start_balance),
            ("trail_lock_threshold", self.trail_lock_threshold),
            ("locked_floor", self.locked_floor),
        ] {
            if !value.is_finite() {
                return Err(ValidationError::NonFiniteRule { field, value });
            }
        }
        for (field, cap) in [
            ("daily_profit_cap", self.daily_profit_cap),
            ("daily_loss_cap", self.daily_loss_cap),
        ] {
            if let Some(value) = cap {
                if !(value.is_finite() && value.abs() > 0.0) || (field == "daily_profit_cap" && value < 0.0) {
                    return Err(ValidationError::InvalidDailyCap { field, value });
                }
            }
        }
        Ok(())
    }
}
