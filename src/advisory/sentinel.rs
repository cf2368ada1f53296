// =============================================================================
// Risk Sentinel — anomaly watchdog over execution-side telemetry
// =============================================================================
//
// Escalation is one-way within a single run: a later check can raise the
// status from HEALTHY to WARNING to CRITICAL but never lower it.
// =============================================================================

use crate::advisory::contracts::{
    ExchangeStatus, SentinelAction, SentinelInput, SentinelOutput, SentinelStatus,
};

/// Average slippage above this raises a WARNING.
const SLIPPAGE_WARN_BPS: f64 = 50.0;
/// API errors above this are CRITICAL.
const API_ERROR_CRITICAL_COUNT: u32 = 5;
/// Balance drift above this is CRITICAL.
const BALANCE_MISMATCH_PERCENT: f64 = 1.0;

pub struct RiskSentinel;

impl RiskSentinel {
    pub fn run(&self, input: &SentinelInput) -> SentinelOutput {
        let mut anomalies: Vec<String> = Vec::new();
        let mut status = SentinelStatus::Healthy;
        let mut action = SentinelAction::None;

        if input.average_slippage_bps > SLIPPAGE_WARN_BPS {
            anomalies.push("HIGH_SLIPPAGE".into());
            status = SentinelStatus::Warning;
            action = SentinelAction::ReduceSize;
        }

        if input.api_error_count > API_ERROR_CRITICAL_COUNT {
            anomalies.push("API_ERRORS".into());
            status = SentinelStatus::Critical;
            action = SentinelAction::Pause;
        }

        let discrepancy_pct = if input.expected_balance > 0.0 {
            (input.account_balance - input.expected_balance).abs() / input.expected_balance * 100.0
        } else {
            0.0
        };
        if discrepancy_pct > BALANCE_MISMATCH_PERCENT {
            anomalies.push("BALANCE_MISMATCH".into());
            status = SentinelStatus::Critical;
            action = SentinelAction::EmergencyHalt;
        }

        if input.exchange_status != ExchangeStatus::Normal {
            anomalies.push("EXCHANGE_STATUS".into());
            status = SentinelStatus::Critical;
            if action != SentinelAction::EmergencyHalt {
                action = SentinelAction::Pause;
            }
        }

        let explanation = if anomalies.is_empty() {
            "no anomalies".into()
        } else {
            anomalies.join("; ")
        };

        SentinelOutput {
            status,
            anomalies,
            action,
            explanation,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> SentinelInput {
        SentinelInput {
            average_slippage_bps: 5.0,
            api_error_count: 0,
            account_balance: 1000.0,
            expected_balance: 1000.0,
            exchange_status: ExchangeStatus::Normal,
        }
    }

    #[test]
    fn clean_telemetry_is_healthy() {
        let out = RiskSentinel.run(&input());
        assert_eq!(out.status, SentinelStatus::Healthy);
        assert_eq!(out.action, SentinelAction::None);
        assert!(out.anomalies.is_empty());
    }

    #[test]
    fn slippage_warns_and_reduces_size() {
        let mut i = input();
        i.average_slippage_bps = 80.0;
        let out = RiskSentinel.run(&i);
        assert_eq!(out.status, SentinelStatus::Warning);
        assert_eq!(out.action, SentinelAction::ReduceSize);
        assert_eq!(out.anomalies, vec!["HIGH_SLIPPAGE".to_string()]);
    }

    #[test]
    fn api_errors_are_critical() {
        let mut i = input();
        i.api_error_count = 6;
        let out = RiskSentinel.run(&i);
        assert_eq!(out.status, SentinelStatus::Critical);
        assert_eq!(out.action, SentinelAction::Pause);
    }

    #[test]
    fn balance_drift_demands_emergency_halt() {
        let mut i = input();
        i.account_balance = 980.0; // 2% off expected
        let out = RiskSentinel.run(&i);
        assert_eq!(out.status, SentinelStatus::Critical);
        assert_eq!(out.action, SentinelAction::EmergencyHalt);
        assert!(out.anomalies.contains(&"BALANCE_MISMATCH".to_string()));
    }

    #[test]
    fn degraded_exchange_is_critical() {
        let mut i = input();
        i.exchange_status = ExchangeStatus::Maintenance;
        let out = RiskSentinel.run(&i);
        assert_eq!(out.status, SentinelStatus::Critical);
        assert_eq!(out.action, SentinelAction::Pause);
    }

    #[test]
    fn emergency_halt_is_not_downgraded_by_exchange_status() {
        let mut i = input();
        i.account_balance = 950.0;
        i.exchange_status = ExchangeStatus::Degraded;
        let out = RiskSentinel.run(&i);
        assert_eq!(out.action, SentinelAction::EmergencyHalt);
        assert_eq!(out.anomalies.len(), 2);
    }

    #[test]
    fn warning_does_not_mask_later_critical() {
        let mut i = input();
        i.average_slippage_bps = 80.0;
        i.api_error_count = 10;
        let out = RiskSentinel.run(&i);
        assert_eq!(out.status, SentinelStatus::Critical);
    }
}
