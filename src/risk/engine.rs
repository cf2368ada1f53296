// =============================================================================
// Risk Engine — stateful tracker behind the pure validator
// =============================================================================
//
// Keeps the long-lived risk bookkeeping the validator's AccountState snapshot
// is built from: signed daily PnL, peak balance, drawdown, the loss streak,
// and the daily trade count. Daily counters reset when the UTC calendar date
// rolls over; the date comes from an injected clock so the boundary is
// testable.
//
// The engine also latches its own emergency flag when an absolute limit is
// breached during a balance update. That flag feeds the process-wide
// emergency stop; it is not cleared here.
// =============================================================================

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::risk::limits::{
    HardRiskLimits, ABSOLUTE_DAILY_LOSS_CAP_PERCENT, ABSOLUTE_MAX_DRAWDOWN_PERCENT,
};
use crate::risk::validator::AccountState;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

struct Inner {
    /// Signed daily PnL as a percentage of the session's starting balance.
    daily_pnl_pct: f64,
    peak_balance: f64,
    /// Worst drawdown seen, percent from peak.
    max_drawdown_pct: f64,
    /// Drawdown as of the last balance update.
    current_drawdown_pct: f64,
    consecutive_losses: u32,
    trades_today: u32,
    last_trade_time: Option<DateTime<Utc>>,
    emergency_stop: bool,
    emergency_reason: Option<String>,
    current_date: NaiveDate,
}

/// Serialisable snapshot of the risk state for audit and diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct RiskStateSnapshot {
    pub daily_loss_pct: f64,
    pub daily_pnl_pct: f64,
    pub peak_balance: f64,
    pub max_drawdown_pct: f64,
    pub consecutive_losses: u32,
    pub trades_today: u32,
    pub last_trade_time: Option<DateTime<Utc>>,
    pub emergency_stop: bool,
    pub emergency_reason: Option<String>,
    pub current_date: NaiveDate,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct RiskEngine {
    state: RwLock<Inner>,
    limits: HardRiskLimits,
    clock: Arc<dyn Clock>,
}

impl RiskEngine {
    pub fn new(limits: HardRiskLimits, clock: Arc<dyn Clock>) -> Self {
        let today = clock.now_utc().date_naive();
        info!(?limits, "risk engine initialised");
        Self {
            state: RwLock::new(Inner {
                daily_pnl_pct: 0.0,
                peak_balance: 0.0,
                max_drawdown_pct: 0.0,
                current_drawdown_pct: 0.0,
                consecutive_losses: 0,
                trades_today: 0,
                last_trade_time: None,
                emergency_stop: false,
                emergency_reason: None,
                current_date: today,
            }),
            limits,
            clock,
        }
    }

    pub fn limits(&self) -> &HardRiskLimits {
        &self.limits
    }

    // -------------------------------------------------------------------------
    // Trade registration
    // -------------------------------------------------------------------------

    /// Register a newly opened trade: bump the daily count and stamp the
    /// trade time used for cadence checks and the daily boundary.
    pub fn register_trade_open(&self) {
        self.maybe_reset_daily();
        let mut s = self.state.write();
        s.trades_today += 1;
        s.last_trade_time = Some(self.clock.now_utc());
        info!(
            trades_today = s.trades_today,
            max = self.limits.max_trades_per_day,
            "trade open registered"
        );
    }

    /// Register a closed trade with its signed percentage PnL.
    ///
    /// A flat close (pnl == 0) leaves the loss streak untouched: it neither
    /// extends nor forgives it.
    pub fn register_trade_close(&self, pnl_percent: f64) {
        self.maybe_reset_daily();
        let mut s = self.state.write();

        s.daily_pnl_pct += pnl_percent;
        s.last_trade_time = Some(self.clock.now_utc());

        if pnl_percent < 0.0 {
            s.consecutive_losses += 1;
            warn!(
                pnl_percent,
                streak = s.consecutive_losses,
                "losing trade registered"
            );
        } else if pnl_percent > 0.0 {
            if s.consecutive_losses > 0 {
                info!(
                    pnl_percent,
                    broken_streak = s.consecutive_losses,
                    "winning trade breaks loss streak"
                );
            }
            s.consecutive_losses = 0;
        }

        debug!(
            daily_pnl_pct = s.daily_pnl_pct,
            consecutive_losses = s.consecutive_losses,
            "trade close registered"
        );
    }

    // -------------------------------------------------------------------------
    // Balance tracking
    // -------------------------------------------------------------------------

    /// Fold a fresh balance reading into peak/drawdown tracking. Breaching an
    /// absolute limit latches the engine's emergency flag.
    pub fn update_balance(&self, current_balance: f64) {
        let mut s = self.state.write();

        if current_balance > s.peak_balance {
            s.peak_balance = current_balance;
        }

        s.current_drawdown_pct = if s.peak_balance > 0.0 {
            (s.peak_balance - current_balance) / s.peak_balance * 100.0
        } else {
            0.0
        };
        if s.current_drawdown_pct > s.max_drawdown_pct {
            s.max_drawdown_pct = s.current_drawdown_pct;
        }

        if s.current_drawdown_pct >= ABSOLUTE_MAX_DRAWDOWN_PERCENT {
            Self::latch_emergency(&mut s, "MAX_DRAWDOWN_BREACH");
        }
        if -s.daily_pnl_pct >= ABSOLUTE_DAILY_LOSS_CAP_PERCENT {
            Self::latch_emergency(&mut s, "DAILY_LOSS_ABSOLUTE_LIMIT");
        }
    }

    fn latch_emergency(s: &mut Inner, reason: &str) {
        if !s.emergency_stop {
            s.emergency_stop = true;
            s.emergency_reason = Some(reason.to_string());
            warn!(reason, "risk engine emergency latched");
        }
    }

    // -------------------------------------------------------------------------
    // Snapshots
    // -------------------------------------------------------------------------

    /// Account snapshot for the validator, taken at the start of the entry
    /// phase.
    pub fn account_state(&self, balance: f64, open_positions: usize) -> AccountState {
        self.maybe_reset_daily();
        let s = self.state.read();
        AccountState {
            balance,
            daily_pnl_percent: s.daily_pnl_pct,
            current_drawdown_percent: s.current_drawdown_pct,
            consecutive_losses: s.consecutive_losses,
            open_positions,
            trades_today: s.trades_today,
        }
    }

    pub fn snapshot(&self) -> RiskStateSnapshot {
        self.maybe_reset_daily();
        let s = self.state.read();
        RiskStateSnapshot {
            daily_loss_pct: (-s.daily_pnl_pct).max(0.0),
            daily_pnl_pct: s.daily_pnl_pct,
            peak_balance: s.peak_balance,
            max_drawdown_pct: s.max_drawdown_pct,
            consecutive_losses: s.consecutive_losses,
            trades_today: s.trades_today,
            last_trade_time: s.last_trade_time,
            emergency_stop: s.emergency_stop,
            emergency_reason: s.emergency_reason.clone(),
            current_date: s.current_date,
        }
    }

    pub fn last_trade_time(&self) -> Option<DateTime<Utc>> {
        self.state.read().last_trade_time
    }

    pub fn emergency_active(&self) -> bool {
        self.state.read().emergency_stop
    }

    pub fn emergency_reason(&self) -> Option<String> {
        self.state.read().emergency_reason.clone()
    }

    // -------------------------------------------------------------------------
    // Daily reset
    // -------------------------------------------------------------------------

    /// Reset daily counters when the UTC date has rolled since the last
    /// activity. The drawdown/peak tracking and the loss streak survive the
    /// boundary; only daily counters clear.
    fn maybe_reset_daily(&self) {
        let today = self.clock.now_utc().date_naive();
        {
            let s = self.state.read();
            if s.current_date == today {
                return;
            }
        }
        let mut s = self.state.write();
        if s.current_date != today {
            info!(
                old_date = %s.current_date,
                new_date = %today,
                "date rolled; resetting daily risk counters"
            );
            s.daily_pnl_pct = 0.0;
            s.trades_today = 0;
            s.current_date = today;
        }
    }
}

impl std::fmt::Debug for RiskEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskEngine")
            .field("limits", &self.limits)
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::TimeZone;

    fn engine_with_clock() -> (RiskEngine, Arc<FixedClock>) {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap());
        let engine = RiskEngine::new(HardRiskLimits::default(), clock.clone());
        (engine, clock)
    }

    #[test]
    fn open_and_close_are_counted() {
        let (engine, _clock) = engine_with_clock();
        engine.register_trade_open();
        engine.register_trade_close(-1.0);
        let snap = engine.snapshot();
        assert_eq!(snap.trades_today, 1);
        assert_eq!(snap.consecutive_losses, 1);
        assert!((snap.daily_pnl_pct + 1.0).abs() < 1e-10);
        assert!((snap.daily_loss_pct - 1.0).abs() < 1e-10);
    }

    #[test]
    fn flat_close_leaves_loss_streak_unchanged() {
        let (engine, _clock) = engine_with_clock();
        engine.register_trade_close(-0.5);
        engine.register_trade_close(-0.5);
        assert_eq!(engine.snapshot().consecutive_losses, 2);

        engine.register_trade_open();
        engine.register_trade_close(0.0);
        assert_eq!(engine.snapshot().consecutive_losses, 2);
    }

    #[test]
    fn win_resets_loss_streak() {
        let (engine, _clock) = engine_with_clock();
        engine.register_trade_close(-0.5);
        engine.register_trade_close(-0.5);
        engine.register_trade_close(1.2);
        assert_eq!(engine.snapshot().consecutive_losses, 0);
    }

    #[test]
    fn daily_counters_reset_on_utc_midnight() {
        let (engine, clock) = engine_with_clock();
        engine.register_trade_open();
        engine.register_trade_close(-2.0);
        assert_eq!(engine.snapshot().trades_today, 1);

        clock.advance(chrono::Duration::hours(13)); // crosses midnight UTC
        let snap = engine.snapshot();
        assert_eq!(snap.trades_today, 0);
        assert_eq!(snap.daily_pnl_pct, 0.0);
        // The loss streak is not a daily counter and must survive.
        assert_eq!(snap.consecutive_losses, 1);
    }

    #[test]
    fn same_day_does_not_reset() {
        let (engine, clock) = engine_with_clock();
        engine.register_trade_open();
        clock.advance(chrono::Duration::hours(6));
        assert_eq!(engine.snapshot().trades_today, 1);
    }

    #[test]
    fn drawdown_tracks_peak() {
        let (engine, _clock) = engine_with_clock();
        engine.update_balance(1000.0);
        engine.update_balance(1100.0);
        engine.update_balance(1045.0);

        let snap = engine.snapshot();
        assert!((snap.peak_balance - 1100.0).abs() < 1e-10);
        assert!((snap.max_drawdown_pct - 5.0).abs() < 1e-10);
        assert!(!snap.emergency_stop);
    }

    #[test]
    fn absolute_drawdown_breach_latches_emergency() {
        let (engine, _clock) = engine_with_clock();
        engine.update_balance(1000.0);
        engine.update_balance(899.0); // 10.1% under peak

        assert!(engine.emergency_active());
        assert_eq!(engine.emergency_reason().as_deref(), Some("MAX_DRAWDOWN_BREACH"));
    }

    #[test]
    fn absolute_daily_loss_breach_latches_emergency() {
        let (engine, _clock) = engine_with_clock();
        engine.register_trade_close(-3.5);
        engine.update_balance(1000.0);
        assert!(engine.emergency_active());
        assert_eq!(
            engine.emergency_reason().as_deref(),
            Some("DAILY_LOSS_ABSOLUTE_LIMIT")
        );
    }

    #[test]
    fn account_state_reflects_bookkeeping() {
        let (engine, _clock) = engine_with_clock();
        engine.update_balance(1000.0);
        engine.register_trade_open();
        engine.register_trade_close(-1.5);

        let account = engine.account_state(985.0, 1);
        assert_eq!(account.open_positions, 1);
        assert_eq!(account.trades_today, 1);
        assert_eq!(account.consecutive_losses, 1);
        assert!((account.daily_pnl_percent + 1.5).abs() < 1e-10);
    }
}
