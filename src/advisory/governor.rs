// =============================================================================
// Strategy Governor — throttles trading posture from regime and performance
// =============================================================================
//
// Decision tree, first match wins. Every branch can only hold the risk
// multiplier at or below 1.0; nothing here can amplify risk.
// =============================================================================

use crate::advisory::contracts::{
    GovernorInput, GovernorOutput, MarketRegime, TradeRecommendation,
};

/// Daily PnL beyond which the governor halts for the day.
const GOVERNOR_DAILY_LOSS_HALT_PERCENT: f64 = -2.0;

pub struct StrategyGovernor;

impl StrategyGovernor {
    pub fn run(&self, input: &GovernorInput) -> GovernorOutput {
        if input.regime == MarketRegime::Choppy {
            return GovernorOutput {
                recommendation: TradeRecommendation::Halt,
                risk_multiplier: 0.0,
                cooldown_minutes: 0,
                reasoning: "choppy regime: no trade".into(),
                alerts: vec!["CHOPPY_REGIME".into()],
            };
        }

        if input.daily_pnl_percent <= GOVERNOR_DAILY_LOSS_HALT_PERCENT {
            return GovernorOutput {
                recommendation: TradeRecommendation::Halt,
                risk_multiplier: 0.0,
                cooldown_minutes: 0,
                reasoning: format!(
                    "daily PnL {:.2}% beyond the governor halt threshold",
                    input.daily_pnl_percent
                ),
                alerts: vec!["DAILY_LOSS_THRESHOLD".into()],
            };
        }

        if input.trades_today >= input.max_trades_per_day {
            return GovernorOutput {
                recommendation: TradeRecommendation::Halt,
                risk_multiplier: 0.0,
                cooldown_minutes: 0,
                reasoning: "max trades per day reached".into(),
                alerts: vec!["MAX_TRADES_REACHED".into()],
            };
        }

        if input.consecutive_losses >= 3 {
            return GovernorOutput {
                recommendation: TradeRecommendation::Cooldown,
                risk_multiplier: 0.5,
                cooldown_minutes: 30,
                reasoning: format!("{} consecutive losses", input.consecutive_losses),
                alerts: vec!["CONSECUTIVE_LOSSES_3".into()],
            };
        }

        if input.consecutive_losses >= 2 {
            return GovernorOutput {
                recommendation: TradeRecommendation::Trade,
                risk_multiplier: 0.75,
                cooldown_minutes: 0,
                reasoning: "2 consecutive losses: reduce risk".into(),
                alerts: vec!["CONSECUTIVE_LOSSES_2".into()],
            };
        }

        if input.regime == MarketRegime::HighVolatility {
            return GovernorOutput {
                recommendation: TradeRecommendation::Trade,
                risk_multiplier: 0.5,
                cooldown_minutes: 0,
                reasoning: "high volatility: reduce risk".into(),
                alerts: vec!["HIGH_VOLATILITY".into()],
            };
        }

        GovernorOutput {
            recommendation: TradeRecommendation::Trade,
            risk_multiplier: 1.0,
            cooldown_minutes: 0,
            reasoning: "normal operation".into(),
            alerts: Vec::new(),
        }
    }
}
