// =============================================================================
// Position Manager — owns the lifecycle of every open and closed position
// =============================================================================
//
// Life-cycle:
//   Open (pre-TP1)  ->  Open (post-TP1, breakeven stop)  ->  Closed
//
// Mutations are restricted to three paths:
//   1. update_price     — highest/lowest watermark maintenance
//   2. apply_tp1        — partial close: half size off, stop to breakeven
//   3. close_position   — terminal OPEN -> CLOSED transition
//
// All other components receive cloned snapshots; only the orchestrator task
// drives mutations. The open-position cap comes from HardRiskLimits, never a
// local constant.
// =============================================================================

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::types::TradeSide;

// ---------------------------------------------------------------------------
// Position model
// ---------------------------------------------------------------------------

/// Current status of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Open,
    Closed,
}

/// A single tracked position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Unique identifier (UUID v4).
    pub id: String,
    pub symbol: String,
    pub side: TradeSide,
    pub entry_price: f64,
    /// Remaining open size in base units (reduced on partial close).
    pub size: f64,
    pub stop_loss: f64,
    pub take_profit_1: f64,
    pub take_profit_2: f64,
    /// ATR at entry time; the trailing stop trails by 1x this distance.
    pub entry_atr: f64,
    pub opened_at: DateTime<Utc>,
    pub tp1_hit: bool,
    /// Highest price seen since open (watermark for long trailing stops).
    pub highest_price: f64,
    /// Lowest price seen since open (watermark for short trailing stops).
    pub lowest_price: f64,
    pub status: PositionStatus,
    /// Realised PnL in quote units, accumulated across partial and final
    /// fills (gross of fees).
    #[serde(default)]
    pub realized_pnl: f64,
    pub exit_price: Option<f64>,
    pub exit_time: Option<DateTime<Utc>>,
    pub exit_reason: Option<String>,
    pub pnl_percent: Option<f64>,
}

impl Position {
    /// Signed percentage PnL of this position at `price`.
    pub fn pnl_percent_at(&self, price: f64) -> f64 {
        if self.entry_price <= 0.0 {
            return 0.0;
        }
        self.side.direction() * (price - self.entry_price) / self.entry_price * 100.0
    }

    /// Hours elapsed since the position was opened.
    pub fn hold_hours(&self, now: DateTime<Utc>) -> f64 {
        (now - self.opened_at).num_seconds() as f64 / 3600.0
    }
}

// ---------------------------------------------------------------------------
// Position Manager
// ---------------------------------------------------------------------------

/// Owns the open and closed position lists. The open-position cap is derived
/// from the hard risk limits at construction time.
pub struct PositionManager {
    open: RwLock<Vec<Position>>,
    closed: RwLock<Vec<Position>>,
    max_open: usize,
    clock: Arc<dyn Clock>,
}

impl PositionManager {
    pub fn new(max_open: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            open: RwLock::new(Vec::new()),
            closed: RwLock::new(Vec::new()),
            max_open,
            clock,
        }
    }

    // -------------------------------------------------------------------------
    // Open
    // -------------------------------------------------------------------------

    /// Open a new position after fill confirmation. Returns `None` when the
    /// open-position cap is already reached.
    #[allow(clippy::too_many_arguments)]
    pub fn open_position(
        &self,
        symbol: &str,
        side: TradeSide,
        entry_price: f64,
        size: f64,
        stop_loss: f64,
        take_profit_1: f64,
        take_profit_2: f64,
        entry_atr: f64,
    ) -> Option<Position> {
        let mut open = self.open.write();
        if open.len() >= self.max_open {
            warn!(
                open = open.len(),
                max = self.max_open,
                "position cap reached; refusing to open"
            );
            return None;
        }

        let pos = Position {
            id: Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            side,
            entry_price,
            size,
            stop_loss,
            take_profit_1,
            take_profit_2,
            entry_atr,
            opened_at: self.clock.now_utc(),
            tp1_hit: false,
            highest_price: entry_price,
            lowest_price: entry_price,
            status: PositionStatus::Open,
            realized_pnl: 0.0,
            exit_price: None,
            exit_time: None,
            exit_reason: None,
            pnl_percent: None,
        };

        info!(
            id = %pos.id,
            symbol,
            side = %side,
            entry_price,
            size,
            stop_loss,
            take_profit_1,
            take_profit_2,
            "position opened"
        );

        open.push(pos.clone());
        Some(pos)
    }

    // -------------------------------------------------------------------------
    // Price updates
    // -------------------------------------------------------------------------

    /// Update the highest/lowest watermarks for one position. Watermarks move
    /// monotonically; a stale price never lowers them.
    pub fn update_price(&self, position_id: &str, current_price: f64) {
        let mut open = self.open.write();
        if let Some(pos) = open.iter_mut().find(|p| p.id == position_id) {
            if current_price > pos.highest_price {
                pos.highest_price = current_price;
                debug!(id = %pos.id, highest = pos.highest_price, "highest watermark raised");
            }
            if current_price < pos.lowest_price {
                pos.lowest_price = current_price;
                debug!(id = %pos.id, lowest = pos.lowest_price, "lowest watermark lowered");
            }
        }
    }

    // -------------------------------------------------------------------------
    // TP1 partial close
    // -------------------------------------------------------------------------

    /// Register a TP1 partial fill: half the size comes off, `tp1_hit` is
    /// latched, and the stop moves to breakeven (entry price).
    ///
    /// Returns the size that was closed, or `None` for an unknown/already
    /// partialled position.
    pub fn apply_tp1(&self, position_id: &str, fill_price: f64) -> Option<f64> {
        let mut open = self.open.write();
        let pos = open
            .iter_mut()
            .find(|p| p.id == position_id && !p.tp1_hit)?;

        let closed_size = pos.size * 0.5;
        pos.size -= closed_size;
        pos.tp1_hit = true;
        pos.stop_loss = pos.entry_price;
        pos.realized_pnl += pos.side.direction() * (fill_price - pos.entry_price) * closed_size;

        info!(
            id = %pos.id,
            fill_price,
            closed_size,
            remaining = pos.size,
            new_stop = pos.stop_loss,
            "TP1 partial close; stop moved to breakeven"
        );

        Some(closed_size)
    }

    // -------------------------------------------------------------------------
    // Close
    // -------------------------------------------------------------------------

    /// Close a position and move it to the closed list. Returns the closed
    /// snapshot with exit fields populated, or `None` if no open position
    /// matches.
    pub fn close_position(&self, position_id: &str, exit_price: f64, reason: &str) -> Option<Position> {
        let mut open = self.open.write();
        let idx = open.iter().position(|p| p.id == position_id)?;
        let mut pos = open.remove(idx);
        drop(open);

        pos.status = PositionStatus::Closed;
        pos.realized_pnl += pos.side.direction() * (exit_price - pos.entry_price) * pos.size;
        pos.exit_price = Some(exit_price);
        pos.exit_time = Some(self.clock.now_utc());
        pos.exit_reason = Some(reason.to_string());
        pos.pnl_percent = Some(pos.pnl_percent_at(exit_price));

        info!(
            id = %pos.id,
            reason,
            exit_price,
            pnl_percent = pos.pnl_percent.unwrap_or(0.0),
            "position closed"
        );

        self.closed.write().push(pos.clone());
        Some(pos)
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn open_count(&self) -> usize {
        self.open.read().len()
    }

    pub fn max_open(&self) -> usize {
        self.max_open
    }

    /// Snapshot of all currently open positions.
    pub fn open_snapshot(&self) -> Vec<Position> {
        self.open.read().clone()
    }

    /// The most recent `count` closed positions (newest first).
    pub fn closed_snapshot(&self, count: usize) -> Vec<Position> {
        let closed = self.closed.read();
        closed.iter().rev().take(count).cloned().collect()
    }

    pub fn has_open_for(&self, symbol: &str) -> bool {
        self.open.read().iter().any(|p| p.symbol == symbol)
    }
}

impl std::fmt::Debug for PositionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionManager")
            .field("open", &self.open.read().len())
            .field("closed", &self.closed.read().len())
            .field("max_open", &self.max_open)
            .finish()
    }
}
