// =============================================================================
// Regime Classifier — deterministic rules over volatility and EMA spread
// =============================================================================

use crate::advisory::contracts::{MarketRegime, RegimeInput, RegimeOutput};

/// Rule-based regime classification. First match wins:
///   ATR percentile >= 90  -> HIGH_VOLATILITY (still tradeable, size reduced)
///   |spread| < 1%         -> RANGING
///   spread >= 1%          -> TRENDING_UP
///   spread <= -1%         -> TRENDING_DOWN
pub struct RegimeClassifier;

impl RegimeClassifier {
    pub fn run(&self, input: &RegimeInput) -> RegimeOutput {
        if input.atr_percentile >= 90.0 {
            return RegimeOutput {
                regime: MarketRegime::HighVolatility,
                confidence: 0.7,
                tradeable: true,
                reasoning: format!(
                    "ATR percentile {:.0} >= 90: high volatility, reduce size",
                    input.atr_percentile
                ),
            };
        }

        let spread = input.ema_spread_percent;
        if spread.abs() < 1.0 {
            return RegimeOutput {
                regime: MarketRegime::Ranging,
                confidence: 0.6,
                tradeable: true,
                reasoning: format!("EMA spread {spread:.2}% inside the 1% band: ranging"),
            };
        }

        if spread >= 1.0 {
            return RegimeOutput {
                regime: MarketRegime::TrendingUp,
                confidence: 0.7,
                tradeable: true,
                reasoning: format!("EMA50 above EMA200 by {spread:.2}%"),
            };
        }

        RegimeOutput {
            regime: MarketRegime::TrendingDown,
            confidence: 0.7,
            tradeable: true,
            reasoning: format!("EMA50 below EMA200 by {spread:.2}%"),
        }
    }
}
