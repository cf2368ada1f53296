// =============================================================================
// Trend Detector — 1h EMA-50 / EMA-200 bias with hysteresis
// =============================================================================
//
// A plain golden-cross comparison flaps when the EMAs run close together, so
// the bias only flips once the fast EMA clears the slow EMA by a hysteresis
// band of 0.5% of the slow EMA:
//
//   EMA50 > EMA200 + thr  -> BULLISH
//   EMA50 < EMA200 - thr  -> BEARISH
//   otherwise             -> NEUTRAL      (thr = EMA200 * 0.005)
// =============================================================================

use tracing::debug;

use crate::error::VigilError;
use crate::indicators::calculate_ema;
use crate::types::TrendBias;

/// Fraction of the slow EMA used as the hysteresis band.
const HYSTERESIS_FRACTION: f64 = 0.005;

/// Trend snapshot for one evaluation. The spread percentage feeds the
/// advisory regime classifier.
#[derive(Debug, Clone, Copy)]
pub struct TrendAnalysis {
    pub bias: TrendBias,
    pub ema_fast: f64,
    pub ema_slow: f64,
    /// (EMA_fast - EMA_slow) / EMA_slow * 100.
    pub spread_percent: f64,
}

impl TrendAnalysis {
    fn neutral() -> Self {
        Self {
            bias: TrendBias::Neutral,
            ema_fast: 0.0,
            ema_slow: 0.0,
            spread_percent: 0.0,
        }
    }
}

/// Analyze the higher-timeframe trend from 1h closes.
///
/// Returns a NEUTRAL analysis when there are not enough closes to compute a
/// full slow EMA.
pub fn analyze_trend(
    closes_1h: &[f64],
    fast_period: usize,
    slow_period: usize,
) -> Result<TrendAnalysis, VigilError> {
    if closes_1h.len() < slow_period {
        debug!(
            have = closes_1h.len(),
            need = slow_period,
            "insufficient 1h closes for trend analysis"
        );
        return Ok(TrendAnalysis::neutral());
    }

    let fast_series = calculate_ema(closes_1h, fast_period)?;
    let slow_series = calculate_ema(closes_1h, slow_period)?;

    let (Some(&ema_fast), Some(&ema_slow)) = (fast_series.last(), slow_series.last()) else {
        return Ok(TrendAnalysis::neutral());
    };

    let threshold = ema_slow * HYSTERESIS_FRACTION;
    let bias = if ema_fast > ema_slow + threshold {
        TrendBias::Bullish
    } else if ema_fast < ema_slow - threshold {
        TrendBias::Bearish
    } else {
        TrendBias::Neutral
    };

    let spread_percent = if ema_slow != 0.0 {
        (ema_fast - ema_slow) / ema_slow * 100.0
    } else {
        0.0
    };

    debug!(
        bias = %bias,
        ema_fast,
        ema_slow,
        spread_percent,
        "trend analysis complete"
    );

    Ok(TrendAnalysis {
        bias,
        ema_fast,
        ema_slow,
        spread_percent,
    })
}
