// =============================================================================
// Advisory Committee — regime + governor + sentinel, combined into one verdict
// =============================================================================
//
// The three agents run independently over their own inputs; the committee
// combines them:
//   tradeable = regime.tradeable AND governor == TRADE
//   sentinel CRITICAL forces recommendation = HALT, multiplier = 0
//
// The committee can only tighten: the final risk multiplier is clamped into
// [0, 1] no matter what any agent produced.
// =============================================================================

pub mod contracts;
pub mod governor;
pub mod regime;
pub mod sentinel;

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::events::{EventBus, EventType};
use contracts::{
    GovernorInput, MarketRegime, RegimeInput, SentinelInput, SentinelStatus, TradeRecommendation,
};
use governor::StrategyGovernor;
use regime::RegimeClassifier;
use sentinel::RiskSentinel;

/// The unified committee output consumed by the orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct AdvisoryVerdict {
    pub regime: MarketRegime,
    pub confidence: f64,
    pub tradeable: bool,
    pub recommendation: TradeRecommendation,
    pub risk_multiplier: f64,
    pub cooldown_minutes: u32,
    pub sentinel_status: SentinelStatus,
    pub anomalies: Vec<String>,
    pub reasoning: String,
}

impl AdvisoryVerdict {
    /// The safest possible verdict; used when an agent fails.
    pub fn halted(reason: &str) -> Self {
        Self {
            regime: MarketRegime::Choppy,
            confidence: 0.0,
            tradeable: false,
            recommendation: TradeRecommendation::Halt,
            risk_multiplier: 0.0,
            cooldown_minutes: 0,
            sentinel_status: SentinelStatus::Critical,
            anomalies: Vec::new(),
            reasoning: reason.to_string(),
        }
    }

    /// Map the recommendation onto the entry gate.
    pub fn gate(&self) -> crate::types::AiGateStatus {
        match self.recommendation {
            TradeRecommendation::Trade => crate::types::AiGateStatus::Open,
            TradeRecommendation::Cooldown => crate::types::AiGateStatus::Cooldown,
            TradeRecommendation::Halt => crate::types::AiGateStatus::Halt,
        }
    }
}

pub struct AdvisoryCommittee {
    regime: RegimeClassifier,
    governor: StrategyGovernor,
    sentinel: RiskSentinel,
    events: Option<Arc<EventBus>>,
}

impl Default for AdvisoryCommittee {
    fn default() -> Self {
        Self::new()
    }
}

impl AdvisoryCommittee {
    pub fn new() -> Self {
        Self {
            regime: RegimeClassifier,
            governor: StrategyGovernor,
            sentinel: RiskSentinel,
            events: None,
        }
    }

    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Run all three agents and combine their outputs.
    ///
    /// The governor consumes the classifier's regime, so its input arrives
    /// without one and is completed here.
    pub fn analyze(
        &self,
        regime_input: &RegimeInput,
        daily_pnl_percent: f64,
        consecutive_losses: u32,
        trades_today: u32,
        max_trades_per_day: u32,
        sentinel_input: &SentinelInput,
    ) -> AdvisoryVerdict {
        let regime_out = self.regime.run(regime_input);
        let governor_out = self.governor.run(&GovernorInput {
            regime: regime_out.regime,
            regime_confidence: regime_out.confidence,
            daily_pnl_percent,
            consecutive_losses,
            trades_today,
            max_trades_per_day,
        });
        let sentinel_out = self.sentinel.run(sentinel_input);

        let mut recommendation = governor_out.recommendation;
        let mut risk_multiplier = governor_out.risk_multiplier;
        let mut cooldown_minutes = governor_out.cooldown_minutes;

        if sentinel_out.status == SentinelStatus::Critical {
            warn!(
                anomalies = ?sentinel_out.anomalies,
                "sentinel critical: overriding governor to HALT"
            );
            recommendation = TradeRecommendation::Halt;
            risk_multiplier = 0.0;
            cooldown_minutes = 0;
        }

        let verdict = AdvisoryVerdict {
            regime: regime_out.regime,
            confidence: regime_out.confidence,
            tradeable: regime_out.tradeable && recommendation == TradeRecommendation::Trade,
            recommendation,
            risk_multiplier: risk_multiplier.clamp(0.0, 1.0),
            cooldown_minutes,
            sentinel_status: sentinel_out.status,
            anomalies: sentinel_out.anomalies.clone(),
            reasoning: format!(
                "regime: {}; governor: {}; sentinel: {}",
                regime_out.reasoning, governor_out.reasoning, sentinel_out.explanation
            ),
        };

        info!(
            regime = %verdict.regime,
            recommendation = %verdict.recommendation,
            risk_multiplier = verdict.risk_multiplier,
            sentinel = %verdict.sentinel_status,
            "advisory verdict"
        );

        if let Some(events) = &self.events {
            events.publish(
                EventType::AiAdvisory,
                serde_json::json!({
                    "regime": verdict.regime.to_string(),
                    "recommendation": verdict.recommendation.to_string(),
                    "risk_multiplier": verdict.risk_multiplier,
                    "sentinel_status": verdict.sentinel_status.to_string(),
                    "anomalies": verdict.anomalies,
                }),
                "advisory_committee",
            );
        }

        verdict
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ExchangeStatus;

    fn regime_input(spread: f64) -> RegimeInput {
        RegimeInput {
            atr_percentile: 50.0,
            ema_spread_percent: spread,
            recent_range_percent: 2.0,
        }
    }

    fn clean_sentinel_input() -> SentinelInput {
        SentinelInput {
            average_slippage_bps: 5.0,
            api_error_count: 0,
            account_balance: 1000.0,
            expected_balance: 1000.0,
            exchange_status: ExchangeStatus::Normal,
        }
    }

    fn committee() -> AdvisoryCommittee {
        AdvisoryCommittee::new()
    }

    #[test]
    fn healthy_trending_market_is_tradeable() {
        let verdict = committee().analyze(
            &regime_input(2.0),
            0.0,
            0,
            0,
            6,
            &clean_sentinel_input(),
        );
        assert!(verdict.tradeable);
        assert_eq!(verdict.recommendation, TradeRecommendation::Trade);
        assert_eq!(verdict.risk_multiplier, 1.0);
        assert_eq!(verdict.gate(), crate::types::AiGateStatus::Open);
    }

    #[test]
    fn sentinel_critical_overrides_governor() {
        let mut sentinel = clean_sentinel_input();
        sentinel.account_balance = 950.0; // 5% balance drift

        let verdict = committee().analyze(&regime_input(2.0), 0.0, 0, 0, 6, &sentinel);
        assert!(!verdict.tradeable);
        assert_eq!(verdict.recommendation, TradeRecommendation::Halt);
        assert_eq!(verdict.risk_multiplier, 0.0);
        assert_eq!(verdict.sentinel_status, SentinelStatus::Critical);
        assert_eq!(verdict.gate(), crate::types::AiGateStatus::Halt);
    }

    #[test]
    fn cooldown_flows_through_to_the_gate() {
        let verdict = committee().analyze(
            &regime_input(2.0),
            0.0,
            3, // 3 consecutive losses => governor cooldown
            0,
            6,
            &clean_sentinel_input(),
        );
        assert!(!verdict.tradeable);
        assert_eq!(verdict.recommendation, TradeRecommendation::Cooldown);
        assert_eq!(verdict.cooldown_minutes, 30);
        assert_eq!(verdict.gate(), crate::types::AiGateStatus::Cooldown);
    }

    #[test]
    fn high_volatility_reduces_multiplier() {
        let mut input = regime_input(2.0);
        input.atr_percentile = 95.0;
        let verdict = committee().analyze(&input, 0.0, 0, 0, 6, &clean_sentinel_input());
        assert_eq!(verdict.regime, MarketRegime::HighVolatility);
        assert!(verdict.tradeable);
        assert_eq!(verdict.risk_multiplier, 0.5);
    }

    #[test]
    fn multiplier_is_always_in_unit_interval() {
        for losses in [0, 2, 3, 6] {
            for pnl in [-5.0, -2.0, 0.0, 4.0] {
                for atr_pct in [10.0, 95.0] {
                    let mut input = regime_input(1.5);
                    input.atr_percentile = atr_pct;
                    let verdict =
                        committee().analyze(&input, pnl, losses, 0, 6, &clean_sentinel_input());
                    assert!((0.0..=1.0).contains(&verdict.risk_multiplier));
                }
            }
        }
    }

    #[test]
    fn halted_fallback_is_maximally_safe() {
        let verdict = AdvisoryVerdict::halted("agent failure");
        assert!(!verdict.tradeable);
        assert_eq!(verdict.risk_multiplier, 0.0);
        assert_eq!(verdict.recommendation, TradeRecommendation::Halt);
    }
}
