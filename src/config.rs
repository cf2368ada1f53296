// =============================================================================
// Configuration — environment-sourced engine settings, clamped to hard caps
// =============================================================================
//
// Every tunable comes from the process environment (a `.env` file is loaded
// by main before this runs). Malformed values are fatal at startup; values
// beyond the absolute risk caps are clamped and the clamp logged. After
// `Config::from_env()` returns, nothing here changes.
// =============================================================================

use std::collections::HashSet;
use std::str::FromStr;

use crate::error::VigilError;
use crate::risk::circuit_breaker::CircuitBreakerConfig;
use crate::risk::limits::HardRiskLimits;

// ---------------------------------------------------------------------------
// Strategy parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct StrategyParams {
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub ema_pullback: usize,
    pub rsi_period: usize,
    pub atr_period: usize,
    pub atr_stop_multiplier: f64,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            ema_fast: 50,
            ema_slow: 200,
            ema_pullback: 20,
            rsi_period: 14,
            atr_period: 14,
            atr_stop_multiplier: 1.5,
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub symbol: String,
    pub trend_timeframe: String,
    pub entry_timeframe: String,
    pub trend_candle_limit: usize,
    pub entry_candle_limit: usize,

    pub risk: HardRiskLimits,
    pub strategy: StrategyParams,
    pub breaker: CircuitBreakerConfig,

    pub loop_interval_secs: u64,
    pub paper_trading: bool,
    pub emergency_stop_enabled: bool,
    pub fee_percent: f64,
    pub starting_balance: f64,

    pub forbidden_symbols: HashSet<String>,
    pub max_correlation_exposure: f64,

    pub alert_webhook_url: Option<String>,
    pub journal_path: String,
    pub audit_log_path: String,
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, VigilError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Lets tests supply values without
    /// touching the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, VigilError> {
        let risk = HardRiskLimits {
            max_risk_per_trade_percent: parse(&lookup, "MAX_RISK_PER_TRADE", 1.0)?,
            daily_loss_cap_percent: parse(&lookup, "MAX_DAILY_LOSS", 3.0)?,
            max_drawdown_percent: parse(&lookup, "MAX_DRAWDOWN", 10.0)?,
            max_consecutive_losses: parse(&lookup, "MAX_CONSECUTIVE_LOSSES", 5u32)?,
            max_open_positions: parse(&lookup, "MAX_OPEN_POSITIONS", 2usize)?,
            max_trades_per_day: parse(&lookup, "MAX_TRADES_PER_DAY", 6u32)?,
            min_time_between_trades_secs: parse(&lookup, "MIN_TIME_BETWEEN_TRADES", 300i64)?,
            max_position_hold_hours: parse(&lookup, "MAX_POSITION_HOLD_HOURS", 72i64)?,
        }
        .clamped();

        let strategy = StrategyParams {
            ema_fast: parse(&lookup, "EMA_FAST", 50usize)?,
            ema_slow: parse(&lookup, "EMA_SLOW", 200usize)?,
            ema_pullback: parse(&lookup, "EMA_PULLBACK", 20usize)?,
            rsi_period: parse(&lookup, "RSI_PERIOD", 14usize)?,
            atr_period: parse(&lookup, "ATR_PERIOD", 14usize)?,
            atr_stop_multiplier: parse(&lookup, "ATR_STOP_MULTIPLIER", 1.5)?,
        };

        let breaker = CircuitBreakerConfig {
            emergency_drawdown_percent: parse(&lookup, "EMERGENCY_DRAWDOWN", 10.0)?,
            max_api_failures: parse(&lookup, "MAX_API_FAILURES", 5u32)?,
            balance_tolerance_percent: parse(&lookup, "BALANCE_TOLERANCE", 1.0)?,
            admin_token_sha256: lookup("ADMIN_TOKEN_SHA256").filter(|s| !s.is_empty()),
        };

        let forbidden_symbols = lookup("FORBIDDEN_SYMBOLS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            symbol: lookup("SYMBOL").unwrap_or_else(|| "BTCUSDT".into()),
            trend_timeframe: "1h".into(),
            entry_timeframe: "5m".into(),
            trend_candle_limit: 200,
            entry_candle_limit: 100,
            risk,
            strategy,
            breaker,
            loop_interval_secs: parse(&lookup, "LOOP_INTERVAL_SECONDS", 60u64)?,
            paper_trading: parse(&lookup, "PAPER_TRADING", true)?,
            emergency_stop_enabled: parse(&lookup, "EMERGENCY_STOP_ENABLED", true)?,
            fee_percent: parse(&lookup, "FEE_PERCENT", 0.1)?,
            starting_balance: parse(&lookup, "STARTING_BALANCE", 10_000.0)?,
            forbidden_symbols,
            max_correlation_exposure: parse(&lookup, "MAX_CORRELATION_EXPOSURE", 0.5)?,
            alert_webhook_url: lookup("ALERT_WEBHOOK_URL").filter(|s| !s.is_empty()),
            journal_path: lookup("JOURNAL_PATH").unwrap_or_else(|| "data/trade_state.json".into()),
            audit_log_path: lookup("AUDIT_LOG_PATH").unwrap_or_else(|| "data/audit.jsonl".into()),
        })
    }
}

/// Parse one environment value with a default. Malformed input is a fatal
/// configuration error, never silently defaulted.
fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, VigilError> {
    match lookup(key) {
        Some(raw) => raw.trim().parse::<T>().map_err(|_| {
            VigilError::Configuration(format!("invalid value for {key}: {raw:?}"))
        }),
        None => Ok(default),
    }
}
