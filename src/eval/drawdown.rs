//! End-of-day trailing drawdown (MLL) governor

use serde::{Deserialize, Serialize};

use crate::rules::{LockMode, RiskRules};

/// Loss floor implied by the highest close seen so far
pub fn loss_floor(rules: &RiskRules, highest_close: f64) -> f64 {
    let trailing = highest_close - rules.max_loss_limit;
    match rules.lock_mode {
        LockMode::AlwaysMin => trailing.min(rules.locked_floor),
        LockMode::LockOnCross => {
            // highest_close never decreases, so crossing once means locked for good
            if highest_close >= rules.trail_lock_threshold {
                rules.locked_floor
            } else {
                trailing
            }
        }
    }
}

/// Outcome of one end-of-day check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawdownCheck {
    pub highest_close: f64,
    pub floor: f64,
    pub breached: bool,
}

/// Tracks the high-water mark of end-of-day balances
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailingDrawdownGovernor {
    highest_close: f64,
}

impl TrailingDrawdownGovernor {
    pub fn new(rules: &RiskRules) -> Self {
        Self {
            highest_close: rules.start_balance,
        }
    }

    pub fn highest_close(&self) -> f64 {
        self.highest_close
    }

    pub fn floor(&self, rules: &RiskRules) -> f64 {
        loss_floor(rules, self.highest_close)
    }

    /// Apply today's closing balance. A close at or below the floor is a breach.
    pub fn step(&self, rules: &RiskRules, closing_balance: f64) -> (Self, DrawdownCheck) {
        let next = Self {
            highest_close: self.highest_close.max(closing_balance),
        };
        let floor = next.floor(rules);
        let check = DrawdownCheck {
            highest_close: next.highest_close,
            floor,
            breached: closing_balance <= floor,
        };
        (next, check)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(rules: &RiskRules, closes: &[f64]) -> Vec<DrawdownCheck> {
        let mut governor = TrailingDrawdownGovernor::new(rules);
        closes
            .iter()
            .map(|&close| {
                let (next, check) = governor.step(rules, close);
                governor = next;
                check
            })
            .collect()
    }

    #[test]
    fn test_flat_account_floor() {
        let rules = RiskRules::default();
        let checks = walk(&rules, &[24000.0]);
        assert_eq!(checks[0].floor, 24000.0);
        assert!(checks[0].breached);

        let checks = walk(&rules, &[24000.01]);
        assert!(!checks[0].breached);
    }

    #[test]
    fn test_floor_trails_then_locks() {
        let rules = RiskRules::default();
        let checks = walk(&rules, &[25500.0, 25300.0, 26100.0, 25200.0, 27000.0]);
        let floors: Vec<f64> = checks.iter().map(|c| c.floor).collect();
        assert_eq!(floors, vec![24500.0, 24500.0, 25100.0, 25100.0, 25100.0]);
        assert!(checks.iter().all(|c| !c.breached));
    }

    #[test]
    fn test_locked_floor_breach() {
        let rules = RiskRules::default();
        let checks = walk(&rules, &[26100.0, 25100.0]);
        assert!(!checks[0].breached);
        assert!(checks[1].breached);
        assert_eq!(checks[1].highest_close, 26100.0);
    }

    #[test]
    fn test_lock_modes_diverge_for_mismatched_thresholds() {
        // Threshold above locked_floor + MLL: the modes disagree in between
        let base = RiskRules { trail_lock_threshold: 26500.0, ..RiskRules::default() };
        let always_min = RiskRules { lock_mode: LockMode::AlwaysMin, ..base.clone() };
        let lock_on_cross = RiskRules { lock_mode: LockMode::LockOnCross, ..base };

        assert_eq!(loss_floor(&always_min, 26300.0), 25100.0);
        assert_eq!(loss_floor(&lock_on_cross, 26300.0), 25300.0);
        assert_eq!(loss_floor(&lock_on_cross, 26500.0), 25100.0);
    }

    #[test]
    fn test_highest_close_never_decreases() {
        let rules = RiskRules::default();
        let checks = walk(&rules, &[25200.0, 24900.0, 25600.0, 25400.0, 25000.0]);
        assert!(checks.windows(2).all(|w| w[1].highest_close >= w[0].highest_close));
        assert_eq!(checks.last().map(|c| c.highest_close), Some(25600.0));
    }

    #[test]
    fn test_floor_never_above_lock_once_crossed() {
        for mode in [LockMode::AlwaysMin, LockMode::LockOnCross] {
            let rules = RiskRules { lock_mode: mode, ..RiskRules::default() };
            let checks = walk(&rules, &[26200.0, 27000.0, 29000.0, 26000.0]);
            assert!(checks.iter().all(|c| c.floor <= rules.locked_floor));
        }
    }
}
