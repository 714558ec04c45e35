//! Optimistic status affordance.
//!
//! A viewer flips the open/concluded control immediately and the store
//! confirms later. The affordance is a two-state machine whose only exits
//! from `Pending` are `confirm` (store accepted) and `rollback` (store
//! refused), so a failed write always restores the last confirmed status.

use domains::ReportStatus;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffordanceState {
    Settled(ReportStatus),
    Pending {
        confirmed: ReportStatus,
        requested: ReportStatus,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AffordanceError {
    #[error("a status change is already in flight")]
    InFlight,
    #[error("no status change is in flight")]
    NotPending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusAffordance {
    state: AffordanceState,
}

impl StatusAffordance {
    pub fn new(status: ReportStatus) -> Self {
        Self {
            state: AffordanceState::Settled(status),
        }
    }

    pub fn state(&self) -> AffordanceState {
        self.state
    }

    /// What the control displays right now, optimistic value included.
    pub fn shown(&self) -> ReportStatus {
        match self.state {
            AffordanceState::Settled(s) => s,
            AffordanceState::Pending { requested, .. } => requested,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, AffordanceState::Pending { .. })
    }

    /// Settled → Pending. Returns the status to write.
    pub fn begin_toggle(&mut self) -> Result<ReportStatus, AffordanceError> {
        match self.state {
            AffordanceState::Settled(confirmed) => {
                let requested = confirmed.toggled();
                self.state = AffordanceState::Pending { confirmed, requested };
                Ok(requested)
            }
            AffordanceState::Pending { .. } => Err(AffordanceError::InFlight),
        }
    }

    /// Pending → Settled(requested).
    pub fn confirm(&mut self) -> Result<ReportStatus, AffordanceError> {
        match self.state {
            AffordanceState::Pending { requested, .. } => {
                self.state = AffordanceState::Settled(requested);
                Ok(requested)
            }
            AffordanceState::Settled(_) => Err(AffordanceError::NotPending),
        }
    }

    /// Pending → Settled(confirmed): the rollback edge.
    pub fn rollback(&mut self) -> Result<ReportStatus, AffordanceError> {
        match self.state {
            AffordanceState::Pending { confirmed, .. } => {
                self.state = AffordanceState::Settled(confirmed);
                Ok(confirmed)
            }
            AffordanceState::Settled(_) => Err(AffordanceError::NotPending),
        }
    }

    /// Adopts the status seen on the live query. Ignored while a write is in flight.
    pub fn sync(&mut self, authoritative: ReportStatus) {
        if let AffordanceState::Settled(_) = self.state {
            self.state = AffordanceState::Settled(authoritative);
        }
    }
}
