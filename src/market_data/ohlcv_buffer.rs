// =============================================================================
// OHLCV Buffer — bounded FIFO of candles for one (symbol, timeframe) series
// =============================================================================
//
// The orchestrator owns one buffer per timeframe it watches (1h for trend,
// 5m for entries). Appends evict from the front once `maxlen` is reached, so
// memory stays capped regardless of ingestion rate.
// =============================================================================

use std::collections::VecDeque;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::VigilError;

// ---------------------------------------------------------------------------
// Candle
// ---------------------------------------------------------------------------

/// A single OHLCV candle. Immutable once appended to a buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Build a candle from the raw exchange tuple `(ts_ms, o, h, l, c, v)`.
    pub fn from_raw(ts_ms: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        let timestamp = Utc
            .timestamp_millis_opt(ts_ms)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Check the OHLC ordering invariant:
    /// `low <= min(open, close) <= max(open, close) <= high`, `volume >= 0`.
    pub fn validate(&self) -> Result<(), VigilError> {
        let body_low = self.open.min(self.close);
        let body_high = self.open.max(self.close);
        if self.low > body_low || body_high > self.high {
            return Err(VigilError::Data(format!(
                "malformed candle at {}: o={} h={} l={} c={}",
                self.timestamp, self.open, self.high, self.low, self.close
            )));
        }
        if self.volume < 0.0 {
            return Err(VigilError::Data(format!(
                "negative volume {} at {}",
                self.volume, self.timestamp
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// OhlcvBuffer
// ---------------------------------------------------------------------------

/// Bounded FIFO of candles. Oldest candles are evicted on overflow.
pub struct OhlcvBuffer {
    ring: VecDeque<Candle>,
    maxlen: usize,
}

impl OhlcvBuffer {
    /// Create a buffer retaining at most `maxlen` candles. `maxlen` must be
    /// positive.
    pub fn new(maxlen: usize) -> Self {
        assert!(maxlen > 0, "OhlcvBuffer maxlen must be positive");
        Self {
            ring: VecDeque::with_capacity(maxlen),
            maxlen,
        }
    }

    /// Append one candle, evicting the oldest when full. O(1).
    pub fn append(&mut self, candle: Candle) {
        if self.ring.len() == self.maxlen {
            self.ring.pop_front();
        }
        self.ring.push_back(candle);
    }

    /// Append a batch in order.
    pub fn extend(&mut self, candles: impl IntoIterator<Item = Candle>) {
        for candle in candles {
            self.append(candle);
        }
    }

    /// Append only candles strictly newer than the latest one held. Makes
    /// repeated ingestion of overlapping windows idempotent.
    pub fn merge_newer(&mut self, candles: impl IntoIterator<Item = Candle>) -> usize {
        let mut appended = 0;
        for candle in candles {
            let is_newer = self
                .latest()
                .map_or(true, |last| candle.timestamp > last.timestamp);
            if is_newer {
                self.append(candle);
                appended += 1;
            }
        }
        appended
    }

    /// Independent ordered copy of the current contents (oldest first).
    pub fn snapshot(&self) -> Vec<Candle> {
        self.ring.iter().cloned().collect()
    }

    /// The most recent candle, if any.
    pub fn latest(&self) -> Option<&Candle> {
        self.ring.back()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    // Column extractors for the indicator library.

    pub fn closes(&self) -> Vec<f64> {
        self.ring.iter().map(|c| c.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.ring.iter().map(|c| c.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.ring.iter().map(|c| c.low).collect()
    }
}

impl std::fmt::Debug for OhlcvBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OhlcvBuffer")
            .field("len", &self.ring.len())
            .field("maxlen", &self.maxlen)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
