//! Stability gate
//!
//! Debounces per-frame votes into committed direction changes. A concrete
//! vote bumps its own counter and zeroes the others; a `none` vote changes
//! nothing. A direction commits once its counter reaches the threshold,
//! unless it is the reversal of the current direction.

use tracing::{debug, info};

use crate::classifier::{Direction, DirectionVote};
use crate::config::StabilityConfig;

/// Result of feeding one vote to the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// `none` vote, counters untouched
    Ignored,
    /// Vote counted, no commit yet (or vote for the current direction)
    Accumulating { direction: Direction, count: u32 },
    /// Threshold reached on the reversal of the current direction
    ReversalRejected { direction: Direction },
    /// Direction changed
    Committed(Direction),
}

/// Debounce state machine over direction votes
#[derive(Debug, Clone)]
pub struct StabilityGate {
    current: Direction,
    counts: [u32; 4],
    threshold: u32,
}

impl StabilityGate {
    pub fn new(config: &StabilityConfig) -> Self {
        Self {
            current: config.initial_direction,
            counts: [0; 4],
            threshold: config.threshold.max(1),
        }
    }

    /// Feed one per-frame vote
    pub fn observe(&mut self, vote: DirectionVote) -> GateOutcome {
        let Some(direction) = vote.direction() else {
            return GateOutcome::Ignored;
        };

        let idx = direction.index();
        let count = self.counts[idx].saturating_add(1);
        self.counts = [0; 4];
        self.counts[idx] = count;

        if count < self.threshold || direction == self.current {
            return GateOutcome::Accumulating { direction, count };
        }

        if direction == self.current.opposite() {
            debug!("Rejected reversal {} -> {} after {} votes", self.current, direction, count);
            return GateOutcome::ReversalRejected { direction };
        }

        info!("Direction committed: {} -> {}", self.current, direction);
        self.current = direction;
        self.counts = [0; 4];
        GateOutcome::Committed(direction)
    }

    /// Currently committed direction
    pub fn current(&self) -> Direction {
        self.current
    }

    /// Accumulated votes for `direction`
    pub fn count(&self, direction: Direction) -> u32 {
        self.counts[direction.index()]
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

impl Default for StabilityGate {
    fn default() -> Self {
        Self::new(&StabilityConfig::default())
    }
}
