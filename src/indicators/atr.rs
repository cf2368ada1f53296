// =============================================================================
// Average True Range (ATR) — Wilder's Smoothing Method
// =============================================================================
//
// ATR measures market volatility by decomposing the entire range of a bar.
//
// True Range (TR) for each bar:
//   TR = max(H - L, |H - prevClose|, |L - prevClose|)
//
// ATR is the smoothed average of TR using Wilder's method:
//   ATR_0   = SMA of first `period` TR values
//   ATR_t   = (ATR_{t-1} * (period - 1) + TR_t) / period
//
// Default period: 14
// =============================================================================

use crate::error::VigilError;

/// True Range of a single bar given the previous close.
pub fn true_range(high: f64, low: f64, prev_close: f64) -> f64 {
    let hl = high - low;
    let hc = (high - prev_close).abs();
    let lc = (low - prev_close).abs();
    hl.max(hc).max(lc)
}

/// Compute the ATR series from parallel high/low/close slices.
///
/// The output is aligned to the tail of the input: the first value
/// corresponds to bar index `period` (one bar is consumed to seed the first
/// True Range).
///
/// # Edge cases
/// - `period == 0` => `Err(Strategy)`
/// - mismatched slice lengths => `Err(Strategy)`
/// - fewer than `period + 1` bars => empty vec
pub fn calculate_atr(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    period: usize,
) -> Result<Vec<f64>, VigilError> {
    if period == 0 {
        return Err(VigilError::Strategy("ATR period must be positive".into()));
    }
    if highs.len() != lows.len() || highs.len() != closes.len() {
        return Err(VigilError::Strategy(format!(
            "ATR input slices differ in length: {} highs, {} lows, {} closes",
            highs.len(),
            lows.len(),
            closes.len()
        )));
    }
    if highs.len() < period + 1 {
        return Ok(Vec::new());
    }

    let tr_values: Vec<f64> = (1..highs.len())
        .map(|i| true_range(highs[i], lows[i], closes[i - 1]))
        .collect();

    // Seed ATR with the SMA of the first `period` TR values.
    let seed: f64 = tr_values[..period].iter().sum::<f64>() / period as f64;

    let mut result = Vec::with_capacity(tr_values.len() - period + 1);
    result.push(seed);

    let period_f = period as f64;
    let mut atr = seed;
    for &tr in &tr_values[period..] {
        atr = (atr * (period_f - 1.0) + tr) / period_f;
        result.push(atr);
    }

    Ok(result)
}

/// ATR of the latest bar expressed as a percentage of the latest close.
///
/// Useful for comparing volatility across assets with different price scales.
/// Returns `None` when there is not enough data or the latest close is zero.
pub fn volatility_percent(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Option<f64> {
    let series = calculate_atr(highs, lows, closes, period).ok()?;
    let atr = *series.last()?;
    let last_close = *closes.last()?;
    if last_close == 0.0 {
        return None;
    }
    Some((atr / last_close) * 100.0)
}
