// =============================================================================
// Safety Constraints — secondary invariant sweep ahead of the hard validator
// =============================================================================
//
// Defense in depth: several checks intentionally overlap the Hard Risk
// Validator over the same account snapshot, and the rest cover ground the
// validator does not (trade cadence, forbidden symbols, correlation
// concentration, notional sanity). Every check reports a result; the caller
// blocks entry on the first failure and audits the lot.
// =============================================================================

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::clock::Clock;
use crate::position::Position;
use crate::risk::limits::HardRiskLimits;
use crate::risk::validator::{AccountState, TradeRequest};

/// Fraction of the balance a single position's notional may consume.
const MAX_POSITION_NOTIONAL_FRACTION: f64 = 0.25;
/// Free-balance buffer demanded on top of the notional.
const BALANCE_BUFFER_FACTOR: f64 = 1.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Outcome of one constraint check.
#[derive(Debug, Clone, Serialize)]
pub struct ConstraintResult {
    pub passed: bool,
    pub constraint_name: &'static str,
    pub message: String,
    pub severity: Severity,
}

impl ConstraintResult {
    fn pass(name: &'static str, message: String) -> Self {
        Self {
            passed: true,
            constraint_name: name,
            message,
            severity: Severity::Info,
        }
    }

    fn fail(name: &'static str, message: String, severity: Severity) -> Self {
        Self {
            passed: false,
            constraint_name: name,
            message,
            severity,
        }
    }
}

/// The first failing result, if any.
pub fn first_failure(results: &[ConstraintResult]) -> Option<&ConstraintResult> {
    results.iter().find(|r| !r.passed)
}

pub struct SafetyConstraints {
    limits: HardRiskLimits,
    forbidden_symbols: HashSet<String>,
    max_correlation_exposure: f64,
    clock: Arc<dyn Clock>,
}

impl SafetyConstraints {
    pub fn new(
        limits: HardRiskLimits,
        forbidden_symbols: HashSet<String>,
        max_correlation_exposure: f64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            limits,
            forbidden_symbols,
            max_correlation_exposure,
            clock,
        }
    }

    /// Run every constraint against the proposed trade.
    pub fn check_all(
        &self,
        request: &TradeRequest,
        open_positions: &[Position],
        account: &AccountState,
        last_trade_time: Option<DateTime<Utc>>,
    ) -> Vec<ConstraintResult> {
        let results = vec![
            self.check_daily_trade_limit(account),
            self.check_time_between_trades(last_trade_time),
            self.check_consecutive_losses(account),
            self.check_daily_loss_cap(account),
            self.check_drawdown(account),
            self.check_symbol_allowed(request),
            self.check_position_limit(open_positions),
            self.check_correlation_exposure(request, open_positions),
            self.check_account_balance(request, account),
            self.check_position_notional(request, account),
        ];

        for r in results.iter().filter(|r| !r.passed) {
            debug!(
                constraint = r.constraint_name,
                severity = ?r.severity,
                message = %r.message,
                "safety constraint failed"
            );
        }
        results
    }

    fn check_daily_trade_limit(&self, account: &AccountState) -> ConstraintResult {
        if account.trades_today >= self.limits.max_trades_per_day {
            return ConstraintResult::fail(
                "daily_trade_limit",
                format!(
                    "daily trade limit reached: {}/{}",
                    account.trades_today, self.limits.max_trades_per_day
                ),
                Severity::Critical,
            );
        }
        ConstraintResult::pass(
            "daily_trade_limit",
            format!(
                "trades today: {}/{}",
                account.trades_today, self.limits.max_trades_per_day
            ),
        )
    }

    fn check_time_between_trades(&self, last_trade_time: Option<DateTime<Utc>>) -> ConstraintResult {
        let Some(last) = last_trade_time else {
            return ConstraintResult::pass("time_between_trades", "first trade of session".into());
        };
        let elapsed = (self.clock.now_utc() - last).num_seconds();
        if elapsed < self.limits.min_time_between_trades_secs {
            return ConstraintResult::fail(
                "time_between_trades",
                format!(
                    "wait {}s before the next trade",
                    self.limits.min_time_between_trades_secs - elapsed
                ),
                Severity::Warning,
            );
        }
        ConstraintResult::pass(
            "time_between_trades",
            format!("time since last trade: {elapsed}s"),
        )
    }

    fn check_consecutive_losses(&self, account: &AccountState) -> ConstraintResult {
        if account.consecutive_losses >= self.limits.max_consecutive_losses {
            return ConstraintResult::fail(
                "consecutive_losses",
                format!(
                    "loss streak {}/{}; trading paused",
                    account.consecutive_losses, self.limits.max_consecutive_losses
                ),
                Severity::Critical,
            );
        }
        ConstraintResult::pass(
            "consecutive_losses",
            format!(
                "loss streak: {}/{}",
                account.consecutive_losses, self.limits.max_consecutive_losses
            ),
        )
    }

    fn check_daily_loss_cap(&self, account: &AccountState) -> ConstraintResult {
        if account.daily_pnl_percent <= -self.limits.daily_loss_cap_percent {
            return ConstraintResult::fail(
                "daily_loss_cap",
                format!(
                    "daily PnL {:.2}% at the -{:.2}% cap",
                    account.daily_pnl_percent, self.limits.daily_loss_cap_percent
                ),
                Severity::Critical,
            );
        }
        ConstraintResult::pass(
            "daily_loss_cap",
            format!("daily PnL: {:.2}%", account.daily_pnl_percent),
        )
    }

    fn check_drawdown(&self, account: &AccountState) -> ConstraintResult {
        if account.current_drawdown_percent >= self.limits.max_drawdown_percent {
            return ConstraintResult::fail(
                "max_drawdown",
                format!(
                    "drawdown {:.2}% at the {:.2}% limit",
                    account.current_drawdown_percent, self.limits.max_drawdown_percent
                ),
                Severity::Critical,
            );
        }
        ConstraintResult::pass(
            "max_drawdown",
            format!("drawdown: {:.2}%", account.current_drawdown_percent),
        )
    }

    fn check_symbol_allowed(&self, request: &TradeRequest) -> ConstraintResult {
        if self.forbidden_symbols.contains(&request.symbol) {
            return ConstraintResult::fail(
                "symbol_allowed",
                format!("symbol {} is forbidden", request.symbol),
                Severity::Critical,
            );
        }
        ConstraintResult::pass("symbol_allowed", format!("symbol {} allowed", request.symbol))
    }

    fn check_position_limit(&self, open_positions: &[Position]) -> ConstraintResult {
        if open_positions.len() >= self.limits.max_open_positions {
            return ConstraintResult::fail(
                "position_limit",
                format!(
                    "open positions at cap: {}/{}",
                    open_positions.len(),
                    self.limits.max_open_positions
                ),
                Severity::Warning,
            );
        }
        ConstraintResult::pass(
            "position_limit",
            format!(
                "open positions: {}/{}",
                open_positions.len(),
                self.limits.max_open_positions
            ),
        )
    }

    fn check_correlation_exposure(
        &self,
        request: &TradeRequest,
        open_positions: &[Position],
    ) -> ConstraintResult {
        let new_base = base_asset(&request.symbol);
        let correlated = open_positions
            .iter()
            .filter(|p| base_asset(&p.symbol) == new_base)
            .count();

        let exposure = correlated as f64 / open_positions.len().max(1) as f64;
        if !open_positions.is_empty() && exposure > self.max_correlation_exposure {
            return ConstraintResult::fail(
                "correlation_exposure",
                format!("{:.0}% of open positions share base {new_base}", exposure * 100.0),
                Severity::Warning,
            );
        }
        ConstraintResult::pass(
            "correlation_exposure",
            format!("correlated exposure: {:.0}%", exposure * 100.0),
        )
    }

    fn check_account_balance(&self, request: &TradeRequest, account: &AccountState) -> ConstraintResult {
        let required = request.size * request.entry_price * BALANCE_BUFFER_FACTOR;
        if account.balance < required {
            return ConstraintResult::fail(
                "account_balance",
                format!(
                    "insufficient balance: {:.2} < {:.2} (incl. buffer)",
                    account.balance, required
                ),
                Severity::Critical,
            );
        }
        ConstraintResult::pass(
            "account_balance",
            format!("balance sufficient: {:.2}", account.balance),
        )
    }

    fn check_position_notional(&self, request: &TradeRequest, account: &AccountState) -> ConstraintResult {
        let notional = request.size * request.entry_price;
        let max_notional = account.balance * MAX_POSITION_NOTIONAL_FRACTION;
        if notional > max_notional {
            return ConstraintResult::fail(
                "position_notional",
                format!(
                    "position {notional:.2} exceeds {max_notional:.2} (25% of balance)"
                ),
                Severity::Warning,
            );
        }
        ConstraintResult::pass(
            "position_notional",
            format!("position notional: {notional:.2} (max {max_notional:.2})"),
        )
    }
}

/// Base asset of a pair: "BTC/USDT" -> "BTC", "BTCUSDT" -> "BTC".
fn base_asset(symbol: &str) -> &str {
    if let Some((base, _quote)) = symbol.split_once('/') {
        return base;
    }
    for quote in ["USDT", "BUSD", "USDC", "USD", "EUR"] {
        if let Some(base) = symbol.strip_suffix(quote) {
            if !base.is_empty() {
                return base;
            }
        }
    }
    symbol
}
