// =============================================================================
// Position Sizer — risk budget divided by stop distance
// =============================================================================
//
//   size = balance * effective_risk% / |entry - stop|
//
// where effective_risk% = min(requested, hard cap) * clamp(ai_multiplier, 0, 1).
// The clamp is what enforces "advisory can only reduce": a multiplier above
// 1.0 buys nothing.
// =============================================================================

use tracing::debug;

use crate::risk::limits::HardRiskLimits;

/// Compute a position size in base units. Returns 0.0 whenever the inputs
/// cannot support a positive, risk-bounded size.
pub fn calculate_position_size(
    account_balance: f64,
    risk_percent: f64,
    entry_price: f64,
    stop_loss_price: f64,
    ai_risk_multiplier: f64,
    limits: &HardRiskLimits,
) -> f64 {
    if account_balance <= 0.0 {
        return 0.0;
    }

    let capped_risk = risk_percent
        .min(limits.max_risk_per_trade_percent)
        .max(0.0);
    let effective_risk = capped_risk * ai_risk_multiplier.clamp(0.0, 1.0);
    if effective_risk <= 0.0 {
        return 0.0;
    }

    let stop_distance = (entry_price - stop_loss_price).abs();
    if stop_distance <= 0.0 {
        return 0.0;
    }

    let risk_amount = account_balance * (effective_risk / 100.0);
    let size = risk_amount / stop_distance;

    debug!(
        account_balance,
        effective_risk,
        stop_distance,
        size,
        "position size computed"
    );

    size.max(0.0)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> HardRiskLimits {
        HardRiskLimits::default()
    }

    #[test]
    fn basic_sizing() {
        // 1% of 1000 = 10 risk units over a 1.0 stop distance.
        let size = calculate_position_size(1000.0, 1.0, 100.0, 99.0, 1.0, &limits());
        assert!((size - 10.0).abs() < 1e-10);
    }

    #[test]
    fn amplifying_multiplier_is_clamped_to_one() {
        let size = calculate_position_size(1000.0, 1.0, 100.0, 99.0, 2.0, &limits());
        assert!((size - 10.0).abs() < 1e-10);
    }

    #[test]
    fn reducing_multiplier_scales_down() {
        let size = calculate_position_size(1000.0, 1.0, 100.0, 99.0, 0.5, &limits());
        assert!((size - 5.0).abs() < 1e-10);
    }

    #[test]
    fn requested_risk_capped_by_hard_limit() {
        // Requesting 4% risk against a 1% cap sizes as 1%.
        let size = calculate_position_size(1000.0, 4.0, 100.0, 99.0, 1.0, &limits());
        assert!((size - 10.0).abs() < 1e-10);
    }

    #[test]
    fn zero_inputs_give_zero_size() {
        assert_eq!(calculate_position_size(0.0, 1.0, 100.0, 99.0, 1.0, &limits()), 0.0);
        assert_eq!(calculate_position_size(1000.0, 1.0, 100.0, 100.0, 1.0, &limits()), 0.0);
        assert_eq!(calculate_position_size(1000.0, 1.0, 100.0, 99.0, 0.0, &limits()), 0.0);
        assert_eq!(calculate_position_size(1000.0, 0.0, 100.0, 99.0, 1.0, &limits()), 0.0);
        assert_eq!(calculate_position_size(-50.0, 1.0, 100.0, 99.0, 1.0, &limits()), 0.0);
    }

    #[test]
    fn risk_amount_never_exceeds_budget() {
        // size * stop_distance <= balance * max_risk% / 100, across a grid of
        // balances, stops, and multipliers.
        let lim = limits();
        for balance in [1.0, 100.0, 1000.0, 250_000.0] {
            for stop_distance in [0.01, 0.5, 1.0, 25.0] {
                for mult in [0.0, 0.3, 0.5, 1.0, 1.7] {
                    for requested in [0.1, 0.5, 1.0, 3.0] {
                        let size = calculate_position_size(
                            balance,
                            requested,
                            100.0 + stop_distance,
                            100.0,
                            mult,
                            &lim,
                        );
                        let risked = size * stop_distance;
                        let budget = balance * lim.max_risk_per_trade_percent / 100.0;
                        assert!(
                            risked <= budget + 1e-9,
                            "risked {risked} exceeds budget {budget}"
                        );
                    }
                }
            }
        }
    }
}
