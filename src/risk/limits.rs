// =============================================================================
// Hard Risk Limits — absolute caps no configuration or advisory may relax
// =============================================================================
//
// Configuration may tighten these values but never exceed them: `clamped()`
// is applied at load time and every clamp is logged. The advisory layer gets
// no say at all; it only ever multiplies risk downward.
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::warn;

// Absolute ceilings (and one floor). Runtime configuration is clamped here.
pub const ABSOLUTE_MAX_RISK_PER_TRADE_PERCENT: f64 = 1.0;
pub const ABSOLUTE_DAILY_LOSS_CAP_PERCENT: f64 = 3.0;
pub const ABSOLUTE_MAX_DRAWDOWN_PERCENT: f64 = 10.0;
pub const ABSOLUTE_MAX_CONSECUTIVE_LOSSES: u32 = 5;
pub const ABSOLUTE_MAX_OPEN_POSITIONS: usize = 2;
pub const ABSOLUTE_MAX_TRADES_PER_DAY: u32 = 6;
pub const ABSOLUTE_MIN_TIME_BETWEEN_TRADES_SECS: i64 = 300;
pub const ABSOLUTE_MAX_POSITION_HOLD_HOURS: i64 = 72;

/// The hard risk limit set, frozen after startup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HardRiskLimits {
    pub max_risk_per_trade_percent: f64,
    pub daily_loss_cap_percent: f64,
    pub max_drawdown_percent: f64,
    pub max_consecutive_losses: u32,
    pub max_open_positions: usize,
    pub max_trades_per_day: u32,
    pub min_time_between_trades_secs: i64,
    pub max_position_hold_hours: i64,
}

impl Default for HardRiskLimits {
    fn default() -> Self {
        Self {
            max_risk_per_trade_percent: ABSOLUTE_MAX_RISK_PER_TRADE_PERCENT,
            daily_loss_cap_percent: ABSOLUTE_DAILY_LOSS_CAP_PERCENT,
            max_drawdown_percent: ABSOLUTE_MAX_DRAWDOWN_PERCENT,
            max_consecutive_losses: ABSOLUTE_MAX_CONSECUTIVE_LOSSES,
            max_open_positions: ABSOLUTE_MAX_OPEN_POSITIONS,
            max_trades_per_day: ABSOLUTE_MAX_TRADES_PER_DAY,
            min_time_between_trades_secs: ABSOLUTE_MIN_TIME_BETWEEN_TRADES_SECS,
            max_position_hold_hours: ABSOLUTE_MAX_POSITION_HOLD_HOURS,
        }
    }
}

impl HardRiskLimits {
    /// Clamp every field to its absolute bound, logging each adjustment.
    /// Called once at configuration load; the result is what the rest of the
    /// engine sees.
    pub fn clamped(mut self) -> Self {
        if self.max_risk_per_trade_percent > ABSOLUTE_MAX_RISK_PER_TRADE_PERCENT {
            warn!(
                configured = self.max_risk_per_trade_percent,
                cap = ABSOLUTE_MAX_RISK_PER_TRADE_PERCENT,
                "max_risk_per_trade_percent clamped to absolute cap"
            );
            self.max_risk_per_trade_percent = ABSOLUTE_MAX_RISK_PER_TRADE_PERCENT;
        }
        if self.daily_loss_cap_percent > ABSOLUTE_DAILY_LOSS_CAP_PERCENT {
            warn!(
                configured = self.daily_loss_cap_percent,
                cap = ABSOLUTE_DAILY_LOSS_CAP_PERCENT,
                "daily_loss_cap_percent clamped to absolute cap"
            );
            self.daily_loss_cap_percent = ABSOLUTE_DAILY_LOSS_CAP_PERCENT;
        }
        if self.max_drawdown_percent > ABSOLUTE_MAX_DRAWDOWN_PERCENT {
            warn!(
                configured = self.max_drawdown_percent,
                cap = ABSOLUTE_MAX_DRAWDOWN_PERCENT,
                "max_drawdown_percent clamped to absolute cap"
            );
            self.max_drawdown_percent = ABSOLUTE_MAX_DRAWDOWN_PERCENT;
        }
        if self.max_consecutive_losses > ABSOLUTE_MAX_CONSECUTIVE_LOSSES {
            warn!(
                configured = self.max_consecutive_losses,
                cap = ABSOLUTE_MAX_CONSECUTIVE_LOSSES,
                "max_consecutive_losses clamped to absolute cap"
            );
            self.max_consecutive_losses = ABSOLUTE_MAX_CONSECUTIVE_LOSSES;
        }
        if self.max_open_positions > ABSOLUTE_MAX_OPEN_POSITIONS {
            warn!(
                configured = self.max_open_positions,
                cap = ABSOLUTE_MAX_OPEN_POSITIONS,
                "max_open_positions clamped to absolute cap"
            );
            self.max_open_positions = ABSOLUTE_MAX_OPEN_POSITIONS;
        }
        if self.max_trades_per_day > ABSOLUTE_MAX_TRADES_PER_DAY {
            warn!(
                configured = self.max_trades_per_day,
                cap = ABSOLUTE_MAX_TRADES_PER_DAY,
                "max_trades_per_day clamped to absolute cap"
            );
            self.max_trades_per_day = ABSOLUTE_MAX_TRADES_PER_DAY;
        }
        if self.min_time_between_trades_secs < ABSOLUTE_MIN_TIME_BETWEEN_TRADES_SECS {
            warn!(
                configured = self.min_time_between_trades_secs,
                floor = ABSOLUTE_MIN_TIME_BETWEEN_TRADES_SECS,
                "min_time_between_trades_secs raised to absolute floor"
            );
            self.min_time_between_trades_secs = ABSOLUTE_MIN_TIME_BETWEEN_TRADES_SECS;
        }
        if self.max_position_hold_hours > ABSOLUTE_MAX_POSITION_HOLD_HOURS {
            warn!(
                configured = self.max_position_hold_hours,
                cap = ABSOLUTE_MAX_POSITION_HOLD_HOURS,
                "max_position_hold_hours clamped to absolute cap"
            );
            self.max_position_hold_hours = ABSOLUTE_MAX_POSITION_HOLD_HOURS;
        }
        self
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_sit_exactly_on_the_caps() {
        let limits = HardRiskLimits::default();
        assert_eq!(limits, limits.clamped());
    }

    #[test]
    fn oversized_values_are_clamped() {
        let limits = HardRiskLimits {
            max_risk_per_trade_percent: 5.0,
            daily_loss_cap_percent: 20.0,
            max_drawdown_percent: 50.0,
            max_consecutive_losses: 99,
            max_open_positions: 10,
            max_trades_per_day: 100,
            min_time_between_trades_secs: 10,
            max_position_hold_hours: 1000,
        }
        .clamped();

        assert_eq!(limits, HardRiskLimits::default());
    }

    #[test]
    fn tighter_values_survive_clamping() {
        let tight = HardRiskLimits {
            max_risk_per_trade_percent: 0.5,
            daily_loss_cap_percent: 1.0,
            max_drawdown_percent: 5.0,
            max_consecutive_losses: 3,
            max_open_positions: 1,
            max_trades_per_day: 4,
            min_time_between_trades_secs: 600,
            max_position_hold_hours: 24,
        };
        assert_eq!(tight, tight.clamped());
    }
}
