//! Intraday profit/loss gate
//!
//! Folds one day's ordered trades into a realized day profit, halting for the
//! day once a cap is touched. Profit overshoot is clamped to the cap (the
//! trader flattens at the cap); loss overshoot is kept as realized.

use crate::rules::RiskRules;
use crate::types::Trade;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateHalt {
    ProfitCap,
    LossCap,
}

/// Result of gating one day
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GatedDay {
    pub profit: f64,
    /// Trades that contributed to `profit`
    pub taken: usize,
    pub halt: Option<GateHalt>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IntradayGate {
    profit_cap: Option<f64>,
    loss_cap: Option<f64>,
}

impl IntradayGate {
    pub fn new(profit_cap: Option<f64>, loss_cap: Option<f64>) -> Self {
        Self {
            profit_cap,
            loss_cap: loss_cap.map(f64::abs),
        }
    }

    pub fn from_rules(rules: &RiskRules) -> Self {
        Self::new(rules.daily_profit_cap, rules.daily_loss_cap)
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    fn halted(&self, running: f64) -> Option<GateHalt> {
        if self.profit_cap.is_some_and(|cap| running >= cap) {
            return Some(GateHalt::ProfitCap);
        }
        if self.loss_cap.is_some_and(|cap| running <= -cap) {
            return Some(GateHalt::LossCap);
        }
        None
    }

    pub fn evaluate<'a, I>(&self, trades: I) -> GatedDay
    where
        I: IntoIterator<Item = &'a Trade>,
    {
        let mut day = GatedDay { profit: 0.0, taken: 0, halt: None };

        for trade in trades {
            if let Some(halt) = self.halted(day.profit) {
                day.halt = Some(halt);
                break;
            }

            day.profit += trade.pnl;
            day.taken += 1;

            if let Some(cap) = self.profit_cap {
                if day.profit > cap {
                    day.profit = cap;
                    day.halt = Some(GateHalt::ProfitCap);
                    break;
                }
            }
        }

        if day.halt.is_none() {
            day.halt = self.halted(day.profit);
        }
        day
    }

    /// Net realized profit for the day
    pub fn day_profit<'a, I>(&self, trades: I) -> f64
    where
        I: IntoIterator<Item = &'a Trade>,
    {
        self.evaluate(trades).profit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;
    use chrono::{Duration, TimeZone, Utc};

    fn day_of(pnls: &[f64]) -> Vec<Trade> {
        let open = Utc.with_ymd_and_hms(2025, 3, 3, 14, 30, 0).unwrap();
        pnls.iter()
            .enumerate()
            .map(|(i, &pnl)| Trade {
                side: Side::Short,
                entry_ts: open + Duration::minutes(10 * i as i64),
                exit_ts: open + Duration::minutes(10 * i as i64 + 5),
                pnl,
            })
            .collect()
    }

    #[test]
    fn test_unbounded_sums_everything() {
        let trades = day_of(&[100.0, -40.0, 900.0]);
        let day = IntradayGate::unbounded().evaluate(&trades);
        assert_eq!(day.profit, 960.0);
        assert_eq!(day.taken, 3);
        assert_eq!(day.halt, None);
    }

    #[test]
    fn test_profit_overshoot_clamps_to_cap() {
        let trades = day_of(&[500.0, 400.0, 100.0]);
        let day = IntradayGate::new(Some(750.0), None).evaluate(&trades);
        assert_eq!(day.profit, 750.0);
        assert_eq!(day.taken, 2);
        assert_eq!(day.halt, Some(GateHalt::ProfitCap));
    }

    #[test]
    fn test_exact_cap_stops_further_trades() {
        let trades = day_of(&[750.0, -500.0]);
        let day = IntradayGate::new(Some(750.0), None).evaluate(&trades);
        assert_eq!(day.profit, 750.0);
        assert_eq!(day.taken, 1);
        assert_eq!(day.halt, Some(GateHalt::ProfitCap));
    }

    #[test]
    fn test_loss_cap_keeps_overshoot() {
        let trades = day_of(&[-200.0, -150.0, 400.0]);
        let day = IntradayGate::new(None, Some(300.0)).evaluate(&trades);
        assert_eq!(day.profit, -350.0);
        assert_eq!(day.taken, 2);
        assert_eq!(day.halt, Some(GateHalt::LossCap));
    }

    #[test]
    fn test_negative_loss_cap_means_same_thing() {
        let trades = day_of(&[-300.0, 1000.0]);
        let gate = IntradayGate::new(Some(750.0), Some(-300.0));
        assert_eq!(gate.day_profit(&trades), -300.0);
    }

    #[test]
    fn test_empty_day_is_flat() {
        let gate = IntradayGate::new(Some(750.0), Some(300.0));
        assert_eq!(gate.evaluate(&[]).profit, 0.0);
        assert_eq!(gate.evaluate(&[]).halt, None);
    }

    #[test]
    fn test_from_rules() {
        let gate = IntradayGate::from_rules(&RiskRules::lucid_25k_days_to_pass());
        let trades = day_of(&[600.0, 600.0]);
        assert_eq!(gate.day_profit(&trades), 750.0);
    }
}
