// =============================================================================
// Hard Risk Validator — the seven-check pre-trade gate
// =============================================================================
//
// Pure function over (TradeRequest, AccountState, HardRiskLimits). Checks run
// in a fixed order and the first failure wins, so every rejection is
// branch-traceable. No mutation, no I/O, no clock: the same inputs always
// produce the same verdict.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::risk::limits::HardRiskLimits;
use crate::types::TradeSide;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// A sized trade awaiting approval.
#[derive(Debug, Clone, Serialize)]
pub struct TradeRequest {
    pub symbol: String,
    pub side: TradeSide,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub size: f64,
    pub timestamp: DateTime<Utc>,
}

/// Account snapshot taken at the start of the entry phase.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AccountState {
    pub balance: f64,
    pub daily_pnl_percent: f64,
    pub current_drawdown_percent: f64,
    pub consecutive_losses: u32,
    pub open_positions: usize,
    pub trades_today: u32,
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Reason codes, one per check plus the pass-through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValidationReason {
    DailyLossCapHit,
    MaxDrawdownHit,
    MaxConsecutiveLossesHit,
    MaxPositionsReached,
    MaxDailyTradesReached,
    RiskPerTradeExceeded,
    AllChecksPassed,
}

impl std::fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            Self::DailyLossCapHit => "DAILY_LOSS_CAP_HIT",
            Self::MaxDrawdownHit => "MAX_DRAWDOWN_HIT",
            Self::MaxConsecutiveLossesHit => "MAX_CONSECUTIVE_LOSSES_HIT",
            Self::MaxPositionsReached => "MAX_POSITIONS_REACHED",
            Self::MaxDailyTradesReached => "MAX_DAILY_TRADES_REACHED",
            Self::RiskPerTradeExceeded => "RISK_PER_TRADE_EXCEEDED",
            Self::AllChecksPassed => "ALL_CHECKS_PASSED",
        };
        write!(f, "{code}")
    }
}

/// Structured verdict; returned rather than thrown so callers can branch.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub approved: bool,
    pub reason: ValidationReason,
    pub details: String,
}

impl ValidationResult {
    fn rejected(reason: ValidationReason, details: String) -> Self {
        Self {
            approved: false,
            reason,
            details,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Percentage of the account at risk if the stop is hit:
/// `size * |entry - stop| / balance * 100`.
pub fn trade_risk_percent(size: f64, entry_price: f64, stop_loss: f64, balance: f64) -> f64 {
    if balance <= 0.0 {
        return 0.0;
    }
    let stop_distance = (entry_price - stop_loss).abs();
    if stop_distance <= 0.0 {
        return 0.0;
    }
    (size * stop_distance) / balance * 100.0
}

/// Run the seven checks in order; the first failure wins.
pub fn validate_trade_request(
    request: &TradeRequest,
    account: &AccountState,
    limits: &HardRiskLimits,
) -> ValidationResult {
    // 1. Daily loss cap
    if account.daily_pnl_percent <= -limits.daily_loss_cap_percent {
        return ValidationResult::rejected(
            ValidationReason::DailyLossCapHit,
            format!(
                "daily PnL {:.2}% breaches the -{:.2}% cap",
                account.daily_pnl_percent, limits.daily_loss_cap_percent
            ),
        );
    }

    // 2. Max drawdown
    if account.current_drawdown_percent >= limits.max_drawdown_percent {
        return ValidationResult::rejected(
            ValidationReason::MaxDrawdownHit,
            format!(
                "drawdown {:.2}% at or beyond the {:.2}% limit",
                account.current_drawdown_percent, limits.max_drawdown_percent
            ),
        );
    }

    // 3. Consecutive losses
    if account.consecutive_losses >= limits.max_consecutive_losses {
        return ValidationResult::rejected(
            ValidationReason::MaxConsecutiveLossesHit,
            format!("{} consecutive losses", account.consecutive_losses),
        );
    }

    // 4. Open positions
    if account.open_positions >= limits.max_open_positions {
        return ValidationResult::rejected(
            ValidationReason::MaxPositionsReached,
            format!("{} positions already open", account.open_positions),
        );
    }

    // 5. Trades per day
    if account.trades_today >= limits.max_trades_per_day {
        return ValidationResult::rejected(
            ValidationReason::MaxDailyTradesReached,
            format!("{} trades executed today", account.trades_today),
        );
    }

    // 6. Per-trade risk
    let risk_pct = trade_risk_percent(
        request.size,
        request.entry_price,
        request.stop_loss,
        account.balance,
    );
    if risk_pct > limits.max_risk_per_trade_percent {
        return ValidationResult::rejected(
            ValidationReason::RiskPerTradeExceeded,
            format!(
                "trade risk {:.3}% exceeds the {:.2}% cap",
                risk_pct, limits.max_risk_per_trade_percent
            ),
        );
    }

    // 7. All clear.
    ValidationResult {
        approved: true,
        reason: ValidationReason::AllChecksPassed,
        details: "OK".into(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn request(size: f64) -> TradeRequest {
        TradeRequest {
            symbol: "BTCUSDT".into(),
            side: TradeSide::Long,
            entry_price: 100.0,
            stop_loss: 99.0,
            size,
            timestamp: Utc::now(),
        }
    }

    fn healthy_account() -> AccountState {
        AccountState {
            balance: 1000.0,
            daily_pnl_percent: 0.0,
            current_drawdown_percent: 0.0,
            consecutive_losses: 0,
            open_positions: 0,
            trades_today: 0,
        }
    }

    fn limits() -> HardRiskLimits {
        HardRiskLimits::default()
    }

    #[test]
    fn clean_request_passes() {
        let result = validate_trade_request(&request(10.0), &healthy_account(), &limits());
        assert!(result.approved);
        assert_eq!(result.reason, ValidationReason::AllChecksPassed);
    }

    #[test]
    fn daily_loss_cap_rejection() {
        let mut account = healthy_account();
        account.daily_pnl_percent = -3.0;
        let result = validate_trade_request(&request(10.0), &account, &limits());
        assert!(!result.approved);
        assert_eq!(result.reason, ValidationReason::DailyLossCapHit);
    }

    #[test]
    fn drawdown_rejection() {
        let mut account = healthy_account();
        account.current_drawdown_percent = 10.0;
        let result = validate_trade_request(&request(10.0), &account, &limits());
        assert_eq!(result.reason, ValidationReason::MaxDrawdownHit);
    }

    #[test]
    fn consecutive_losses_rejection() {
        let mut account = healthy_account();
        account.consecutive_losses = 5;
        let result = validate_trade_request(&request(10.0), &account, &limits());
        assert_eq!(result.reason, ValidationReason::MaxConsecutiveLossesHit);
    }

    #[test]
    fn position_cap_rejection() {
        let mut account = healthy_account();
        account.open_positions = 2;
        let result = validate_trade_request(&request(10.0), &account, &limits());
        assert_eq!(result.reason, ValidationReason::MaxPositionsReached);
    }

    #[test]
    fn daily_trade_cap_rejection() {
        let mut account = healthy_account();
        account.trades_today = 6;
        let result = validate_trade_request(&request(10.0), &account, &limits());
        assert_eq!(result.reason, ValidationReason::MaxDailyTradesReached);
    }

    #[test]
    fn oversized_trade_rejection() {
        // 20 units * 1.0 stop distance on 1000 balance = 2% > 1% cap.
        let result = validate_trade_request(&request(20.0), &healthy_account(), &limits());
        assert_eq!(result.reason, ValidationReason::RiskPerTradeExceeded);
    }

    #[test]
    fn first_failure_wins_over_later_checks() {
        // Both the daily loss cap and the position cap are breached; the
        // fixed evaluation order must report the loss cap.
        let mut account = healthy_account();
        account.daily_pnl_percent = -5.0;
        account.open_positions = 2;
        let result = validate_trade_request(&request(10.0), &account, &limits());
        assert_eq!(result.reason, ValidationReason::DailyLossCapHit);
    }

    #[test]
    fn approval_implies_all_invariants() {
        // Sweep a coarse grid; whenever the validator approves, every
        // individual invariant must hold.
        let lim = limits();
        for pnl in [-4.0, -3.0, -1.0, 0.0, 2.0] {
            for dd in [0.0, 5.0, 10.0, 12.0] {
                for losses in [0u32, 4, 5, 7] {
                    for open in [0usize, 1, 2, 3] {
                        for trades in [0u32, 5, 6, 9] {
                            for size in [1.0, 10.0, 25.0] {
                                let account = AccountState {
                                    balance: 1000.0,
                                    daily_pnl_percent: pnl,
                                    current_drawdown_percent: dd,
                                    consecutive_losses: losses,
                                    open_positions: open,
                                    trades_today: trades,
                                };
                                let result =
                                    validate_trade_request(&request(size), &account, &lim);
                                if result.approved {
                                    assert!(pnl > -lim.daily_loss_cap_percent);
                                    assert!(dd < lim.max_drawdown_percent);
                                    assert!(losses < lim.max_consecutive_losses);
                                    assert!(open < lim.max_open_positions);
                                    assert!(trades < lim.max_trades_per_day);
                                    let risk =
                                        trade_risk_percent(size, 100.0, 99.0, 1000.0);
                                    assert!(risk <= lim.max_risk_per_trade_percent);
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn risk_percent_degenerate_inputs() {
        assert_eq!(trade_risk_percent(10.0, 100.0, 99.0, 0.0), 0.0);
        assert_eq!(trade_risk_percent(10.0, 100.0, 100.0, 1000.0), 0.0);
        assert!((trade_risk_percent(10.0, 100.0, 99.0, 1000.0) - 1.0).abs() < 1e-10);
    }
}
