// =============================================================================
// Shared types used across the Vigil trading engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// Direction of a trade or position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Long,
    Short,
}

impl TradeSide {
    /// +1.0 for longs, -1.0 for shorts. Used in PnL arithmetic.
    pub fn direction(self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}

/// Higher-timeframe trend bias derived from the EMA-50 / EMA-200 relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendBias {
    Bullish,
    Bearish,
    Neutral,
}

impl std::fmt::Display for TrendBias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "BULLISH"),
            Self::Bearish => write!(f, "BEARISH"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Gate derived from the advisory committee's recommendation. Entries are only
/// evaluated while the gate is `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AiGateStatus {
    Open,
    Cooldown,
    Halt,
}

impl std::fmt::Display for AiGateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Cooldown => write!(f, "COOLDOWN"),
            Self::Halt => write!(f, "HALT"),
        }
    }
}
