// =============================================================================
// Exit Evaluator — per-position state machine over price ticks
// =============================================================================
//
// States: open pre-TP1 -> open post-TP1 (breakeven stop) -> closed.
//
// Trigger priority when several fire on the same tick:
//   STOP_LOSS > TAKE_PROFIT_1 > TRAILING_STOP > TIME_LIMIT
//
// The trailing stop only arms after TP1 and trails the high/low watermark by
// 1.0 x the entry ATR. The evaluator is read-only over the position; the
// Position Manager applies the resulting mutation.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::position::Position;
use crate::types::TradeSide;

/// ATR multiple between the watermark and the trailing stop.
const TRAIL_ATR_MULTIPLIER: f64 = 1.0;

/// Why a position (or part of it) is being closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit1,
    TrailingStop,
    TimeLimit,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StopLoss => write!(f, "STOP_LOSS"),
            Self::TakeProfit1 => write!(f, "TAKE_PROFIT_1"),
            Self::TrailingStop => write!(f, "TRAILING_STOP"),
            Self::TimeLimit => write!(f, "TIME_LIMIT"),
        }
    }
}

/// Exit instruction for one position.
#[derive(Debug, Clone, Serialize)]
pub struct ExitSignal {
    pub position_id: String,
    pub reason: ExitReason,
    pub exit_price: f64,
    /// 100.0 for full closes, 50.0 for the TP1 partial.
    pub size_percent: f64,
}

impl ExitSignal {
    fn full(position: &Position, reason: ExitReason, price: f64) -> Self {
        Self {
            position_id: position.id.clone(),
            reason,
            exit_price: price,
            size_percent: 100.0,
        }
    }
}

/// Evaluate one position against the current price.
///
/// The caller must have refreshed the position's highest/lowest watermarks
/// for this tick before invoking the evaluator.
pub fn evaluate_exit(
    position: &Position,
    current_price: f64,
    now: DateTime<Utc>,
    max_hold_hours: i64,
) -> Option<ExitSignal> {
    match position.side {
        TradeSide::Long => {
            if current_price <= position.stop_loss {
                return Some(ExitSignal::full(position, ExitReason::StopLoss, current_price));
            }
            if !position.tp1_hit && current_price >= position.take_profit_1 {
                return Some(ExitSignal {
                    position_id: position.id.clone(),
                    reason: ExitReason::TakeProfit1,
                    exit_price: current_price,
                    size_percent: 50.0,
                });
            }
            if position.tp1_hit {
                let trail = position.highest_price - TRAIL_ATR_MULTIPLIER * position.entry_atr;
                if current_price <= trail {
                    return Some(ExitSignal::full(
                        position,
                        ExitReason::TrailingStop,
                        current_price,
                    ));
                }
            }
        }
        TradeSide::Short => {
            if current_price >= position.stop_loss {
                return Some(ExitSignal::full(position, ExitReason::StopLoss, current_price));
            }
            if !position.tp1_hit && current_price <= position.take_profit_1 {
                return Some(ExitSignal {
                    position_id: position.id.clone(),
                    reason: ExitReason::TakeProfit1,
                    exit_price: current_price,
                    size_percent: 50.0,
                });
            }
            if position.tp1_hit {
                let trail = position.lowest_price + TRAIL_ATR_MULTIPLIER * position.entry_atr;
                if current_price >= trail {
                    return Some(ExitSignal::full(
                        position,
                        ExitReason::TrailingStop,
                        current_price,
                    ));
                }
            }
        }
    }

    // Time-based forced exit, lowest priority.
    if position.hold_hours(now) > max_hold_hours as f64 {
        return Some(ExitSignal::full(position, ExitReason::TimeLimit, current_price));
    }

    None
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::PositionStatus;
    use chrono::TimeZone;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn long_position(tp1_hit: bool) -> Position {
        Position {
            id: "p1".into(),
            symbol: "BTCUSDT".into(),
            side: TradeSide::Long,
            entry_price: 100.0,
            size: 1.0,
            stop_loss: if tp1_hit { 100.0 } else { 99.0 },
            take_profit_1: 101.0,
            take_profit_2: 103.0,
            entry_atr: 1.0,
            opened_at: base_time(),
            tp1_hit,
            highest_price: if tp1_hit { 102.5 } else { 100.0 },
            lowest_price: 100.0,
            status: PositionStatus::Open,
            realized_pnl: 0.0,
            exit_price: None,
            exit_time: None,
            exit_reason: None,
            pnl_percent: None,
        }
    }

    fn short_position(tp1_hit: bool) -> Position {
        Position {
            id: "p2".into(),
            symbol: "BTCUSDT".into(),
            side: TradeSide::Short,
            entry_price: 100.0,
            size: 1.0,
            stop_loss: if tp1_hit { 100.0 } else { 101.0 },
            take_profit_1: 99.0,
            take_profit_2: 97.0,
            entry_atr: 1.0,
            opened_at: base_time(),
            tp1_hit,
            highest_price: 100.0,
            lowest_price: if tp1_hit { 97.5 } else { 100.0 },
            status: PositionStatus::Open,
            realized_pnl: 0.0,
            exit_price: None,
            exit_time: None,
            exit_reason: None,
            pnl_percent: None,
        }
    }

    fn soon() -> DateTime<Utc> {
        base_time() + chrono::Duration::hours(1)
    }

    #[test]
    fn long_stop_loss_full_exit() {
        let pos = long_position(false);
        let sig = evaluate_exit(&pos, 98.9, soon(), 72).expect("stop must fire");
        assert_eq!(sig.reason, ExitReason::StopLoss);
        assert_eq!(sig.size_percent, 100.0);
        assert_eq!(sig.exit_price, 98.9);
    }

    #[test]
    fn long_tp1_partial_exit() {
        let pos = long_position(false);
        let sig = evaluate_exit(&pos, 101.2, soon(), 72).expect("tp1 must fire");
        assert_eq!(sig.reason, ExitReason::TakeProfit1);
        assert_eq!(sig.size_percent, 50.0);
    }

    #[test]
    fn long_trailing_stop_after_tp1() {
        // Watermark 102.5, ATR 1.0 => trail at 101.5.
        let pos = long_position(true);
        assert!(evaluate_exit(&pos, 101.6, soon(), 72).is_none());

        let sig = evaluate_exit(&pos, 101.4, soon(), 72).expect("trail must fire");
        assert_eq!(sig.reason, ExitReason::TrailingStop);
        assert_eq!(sig.size_percent, 100.0);
    }

    #[test]
    fn trailing_stop_does_not_arm_before_tp1() {
        // Even with a raised watermark, pre-TP1 a price above the stop and
        // below TP1 must not trigger the trail.
        let mut pos = long_position(false);
        pos.highest_price = 102.5;
        assert!(evaluate_exit(&pos, 100.5, soon(), 72).is_none());
    }

    #[test]
    fn short_stop_loss_full_exit() {
        let pos = short_position(false);
        let sig = evaluate_exit(&pos, 101.1, soon(), 72).expect("stop must fire");
        assert_eq!(sig.reason, ExitReason::StopLoss);
        assert_eq!(sig.size_percent, 100.0);
    }

    #[test]
    fn short_tp1_partial_exit() {
        let pos = short_position(false);
        let sig = evaluate_exit(&pos, 98.8, soon(), 72).expect("tp1 must fire");
        assert_eq!(sig.reason, ExitReason::TakeProfit1);
        assert_eq!(sig.size_percent, 50.0);
    }

    #[test]
    fn short_trailing_stop_after_tp1() {
        // Watermark 97.5, ATR 1.0 => trail at 98.5.
        let pos = short_position(true);
        assert!(evaluate_exit(&pos, 98.4, soon(), 72).is_none());

        let sig = evaluate_exit(&pos, 98.6, soon(), 72).expect("trail must fire");
        assert_eq!(sig.reason, ExitReason::TrailingStop);
    }

    #[test]
    fn time_limit_forces_exit() {
        let pos = long_position(false);
        let later = base_time() + chrono::Duration::hours(73);
        let sig = evaluate_exit(&pos, 100.5, later, 72).expect("time limit must fire");
        assert_eq!(sig.reason, ExitReason::TimeLimit);
        assert_eq!(sig.size_percent, 100.0);
    }

    #[test]
    fn stop_loss_outranks_time_limit() {
        let pos = long_position(false);
        let later = base_time() + chrono::Duration::hours(73);
        let sig = evaluate_exit(&pos, 98.0, later, 72).unwrap();
        assert_eq!(sig.reason, ExitReason::StopLoss);
    }

    #[test]
    fn hold_inside_window_no_exit() {
        let pos = long_position(false);
        assert!(evaluate_exit(&pos, 100.2, soon(), 72).is_none());
    }

    #[test]
    fn breakeven_stop_protects_after_tp1() {
        // Post-TP1 the stop sits at entry; a fade back to entry exits flat.
        let pos = long_position(true);
        let sig = evaluate_exit(&pos, 100.0, soon(), 72).unwrap();
        assert_eq!(sig.reason, ExitReason::StopLoss);
    }
}
