// =============================================================================
// Advisory contracts — input/output records for the three agents
// =============================================================================
//
// The agents share no inheritance: each is a function over its own record
// pair. An LLM-backed classifier would be a second implementation behind the
// same run(input) -> output shape, which is why these records carry
// everything an external model would need.
// =============================================================================

use serde::Serialize;

// ---------------------------------------------------------------------------
// Regime classifier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MarketRegime {
    TrendingUp,
    TrendingDown,
    Ranging,
    HighVolatility,
    Choppy,
}

impl std::fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::TrendingUp => "TRENDING_UP",
            Self::TrendingDown => "TRENDING_DOWN",
            Self::Ranging => "RANGING",
            Self::HighVolatility => "HIGH_VOLATILITY",
            Self::Choppy => "CHOPPY",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RegimeInput {
    /// Rank of the latest ATR within the trailing ATR series, 0..=100.
    pub atr_percentile: f64,
    /// (EMA50 - EMA200) / EMA200 * 100 on the 1h timeframe.
    pub ema_spread_percent: f64,
    /// (max - min) / min * 100 over the recent 5m window.
    pub recent_range_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegimeOutput {
    pub regime: MarketRegime,
    pub confidence: f64,
    pub tradeable: bool,
    pub reasoning: String,
}

// ---------------------------------------------------------------------------
// Strategy governor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct GovernorInput {
    pub regime: MarketRegime,
    pub regime_confidence: f64,
    pub daily_pnl_percent: f64,
    pub consecutive_losses: u32,
    pub trades_today: u32,
    pub max_trades_per_day: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TradeRecommendation {
    Trade,
    Cooldown,
    Halt,
}

impl std::fmt::Display for TradeRecommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Trade => "TRADE",
            Self::Cooldown => "COOLDOWN",
            Self::Halt => "HALT",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GovernorOutput {
    pub recommendation: TradeRecommendation,
    pub risk_multiplier: f64,
    pub cooldown_minutes: u32,
    pub reasoning: String,
    pub alerts: Vec<String>,
}

// ---------------------------------------------------------------------------
// Risk sentinel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SentinelStatus {
    Healthy,
    Warning,
    Critical,
}

impl std::fmt::Display for SentinelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Healthy => "HEALTHY",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SentinelAction {
    None,
    ReduceSize,
    Pause,
    EmergencyHalt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeStatus {
    Normal,
    Degraded,
    Maintenance,
}

#[derive(Debug, Clone, Copy)]
pub struct SentinelInput {
    pub average_slippage_bps: f64,
    pub api_error_count: u32,
    pub account_balance: f64,
    pub expected_balance: f64,
    pub exchange_status: ExchangeStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct SentinelOutput {
    pub status: SentinelStatus,
    pub anomalies: Vec<String>,
    pub action: SentinelAction,
    pub explanation: String,
}
