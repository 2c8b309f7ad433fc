//! Tick-driven resolution of the leader's total path distance.

use glam::Vec3;

/// Progress of the history readiness step started on every departure.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum HistoryReadiness {
    /// No departure is being prepared.
    #[default]
    Idle,
    /// Waiting for the steering backend to report a path distance.
    AwaitingPathDistance {
        /// Ticks left before the step gives up.
        attempts_left: u8,
        /// Destination captured when the leader departed.
        destination: Vec3,
    },
    /// The path distance resolved and every grid point was flagged.
    Resolved {
        /// Path distance reported by the steering backend.
        path_distance: f32,
    },
    /// The path distance never resolved.
    Failed,
}

impl HistoryReadiness {
    /// Starts waiting for the path distance towards `destination`.
    #[must_use]
    pub fn await_path(attempts: u8, destination: Vec3) -> Self {
        Self::AwaitingPathDistance {
            attempts_left: attempts.max(1),
            destination,
        }
    }

    /// Whether the step still needs ticks to finish.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::AwaitingPathDistance { .. })
    }
}
