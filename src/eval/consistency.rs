//! Consistency ("no single day dominates") checks

use crate::rules::RiskRules;

/// `largest_day / total`, infinite when nothing has been earned yet
pub fn consistency_ratio(total_profit: f64, largest_day_profit: f64) -> f64 {
    if total_profit <= 0.0 {
        f64::INFINITY
    } else {
        largest_day_profit / total_profit
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsistencyChecker {
    cap: f64,
    day_cap: f64,
}

impl ConsistencyChecker {
    pub fn new(rules: &RiskRules) -> Self {
        Self {
            cap: rules.consistency_cap,
            day_cap: rules.day_cap(),
        }
    }

    /// Early proxy: the largest day may not exceed `cap * profit_target`.
    ///
    /// Applied regardless of the sign of the running total.
    pub fn day_cap_breached(&self, largest_day_profit: f64) -> bool {
        largest_day_profit > self.day_cap
    }

    /// Ratio check made once the target is reached
    pub fn final_ratio_ok(&self, total_profit: f64, largest_day_profit: f64) -> bool {
        consistency_ratio(total_profit, largest_day_profit) <= self.cap
    }
}
