//! Per-follower targets bound to the formation leader.
//!
//! A grid point resolves the world position its follower should chase using
//! one of four strategies: the leader's live pose, the leader's recorded
//! history at an offset-derived lag, a synthetic history laid out when the
//! real path is too short, or an anchor on the formation tail.

use glam::Vec3;

use crate::{
    heading::{forward, right_of, rotate_offset},
    history::HistoryBuffer,
};

/// Sentinel position no real trajectory produces.
pub const UNREACHABLE: Vec3 = Vec3::INFINITY;

/// Read-only snapshot of the leader borrowed for one dispatch.
#[derive(Clone, Copy, Debug)]
pub struct LeaderView<'a> {
    /// Current leader position.
    pub position: Vec3,
    /// Current leader heading in radians.
    pub yaw: f32,
    /// Average speed over the span covered by the real history.
    pub average_velocity: f32,
    /// Leader speed cap, used to pace synthetic history.
    pub max_speed: f32,
    /// Current simulated time in seconds.
    pub now: f32,
    /// Real history recorded while moving.
    pub history: Option<&'a HistoryBuffer>,
    /// Synthetic history written on arrival.
    pub fake_history: Option<&'a HistoryBuffer>,
}

/// Anchor used by grid points that never started replaying history.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TailAnchor {
    /// The leader is the tail; the grid point falls back to synthetic history.
    Leader,
    /// A follower replaying real history anchors the grid point.
    Follower {
        /// Local offset of the tail grid point.
        offset: Vec3,
        /// Last resolved position of the tail grid point.
        position: Vec3,
        /// Instantaneous speed of the tail follower.
        velocity_magnitude: f32,
    },
}

/// Positional target of a single follower slot.
#[derive(Clone, Debug, PartialEq)]
pub struct GridPoint {
    offset: Vec3,
    position: Vec3,
    reached: bool,
    has_history_data: bool,
    using_history_data: bool,
}

impl GridPoint {
    /// Creates a grid point at the given local offset, unresolved until first updated.
    #[must_use]
    pub const fn new(offset: Vec3) -> Self {
        Self {
            offset,
            position: UNREACHABLE,
            reached: false,
            has_history_data: false,
            using_history_data: false,
        }
    }

    /// Creates a grid point already resolved against the leader's current pose.
    #[must_use]
    pub fn bound(offset: Vec3, leader_position: Vec3, leader_yaw: f32) -> Self {
        let mut point = Self::new(offset);
        point.update_live_position(leader_position, leader_yaw);
        point
    }

    /// Local offset relative to the leader's facing.
    #[must_use]
    pub const fn offset(&self) -> Vec3 {
        self.offset
    }

    /// Last resolved world position.
    #[must_use]
    pub const fn position(&self) -> Vec3 {
        self.position
    }

    /// Whether the position holds a real target rather than the sentinel.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.position.is_finite()
    }

    /// Whether the bound follower reported arrival.
    #[must_use]
    pub const fn reached(&self) -> bool {
        self.reached
    }

    /// Whether the leader's path is long enough for this slot to replay real history.
    #[must_use]
    pub const fn has_history_data(&self) -> bool {
        self.has_history_data
    }

    /// Whether the position was last resolved from real history.
    #[must_use]
    pub const fn using_history_data(&self) -> bool {
        self.using_history_data
    }

    /// Records that the bound follower arrived.
    pub fn mark_reached(&mut self) {
        self.reached = true;
    }

    /// Flags whether real history can cover this slot.
    pub fn set_has_history_data(&mut self, has_history_data: bool) {
        self.has_history_data = has_history_data;
    }

    /// Clears every flag and invalidates the position.
    pub fn reset(&mut self) {
        self.using_history_data = false;
        self.has_history_data = false;
        self.reached = false;
        self.position = UNREACHABLE;
    }

    /// Position of the slot relative to the leader's current pose.
    #[must_use]
    pub fn live_position(&self, leader_position: Vec3, leader_yaw: f32) -> Vec3 {
        let flat = Vec3::new(self.offset.x, 0.0, self.offset.z);
        leader_position + rotate_offset(flat, leader_yaw)
    }

    /// Resolves the slot against the leader's current pose.
    pub fn update_live_position(&mut self, leader_position: Vec3, leader_yaw: f32) {
        self.position = self.live_position(leader_position, leader_yaw);
    }

    /// Resolves the slot from the leader's real history.
    ///
    /// Returns `false` and keeps the previous position while the leader is
    /// stationary or the history does not reach back far enough yet.
    pub fn update_from_history(&mut self, leader: &LeaderView<'_>) -> bool {
        if leader.average_velocity <= 0.0 {
            return false;
        }
        let Some(history) = leader.history else {
            return false;
        };

        let lag = -self.offset.z / leader.average_velocity;
        let Some(sample) = history.try_interpolate(leader.now - lag) else {
            return false;
        };

        let mut position = sample.position;
        if self.offset.x.abs() > 0.0 {
            let heading = (leader.position - sample.position).normalize_or_zero();
            position += right_of(heading) * self.offset.x;
        }

        self.position = position;
        self.using_history_data = true;
        true
    }

    /// Resolves the slot from the synthetic history laid out on arrival.
    pub fn update_from_fake_history(&mut self, leader: &LeaderView<'_>) -> bool {
        if leader.max_speed <= 0.0 {
            return false;
        }
        let Some(history) = leader.fake_history else {
            return false;
        };

        let lag = -self.offset.z / leader.max_speed;
        let Some(sample) = history.try_interpolate(leader.now - lag) else {
            return false;
        };

        let heading = forward(sample.yaw);
        let right = right_of(heading);
        self.position = sample.position + right * self.offset.x + heading * self.offset.z;
        true
    }

    /// Resolves the slot relative to the formation tail.
    pub fn update_from_tail(&mut self, leader: &LeaderView<'_>, tail: TailAnchor) -> bool {
        let (tail_offset, tail_position, tail_speed) = match tail {
            TailAnchor::Leader => return self.update_from_fake_history(leader),
            TailAnchor::Follower {
                offset,
                position,
                velocity_magnitude,
            } => (offset, position, velocity_magnitude),
        };
        if !tail_position.is_finite() {
            return false;
        }

        let speed = if tail_speed > 0.0 {
            tail_speed
        } else {
            leader.max_speed
        };
        if speed <= 0.0 {
            return false;
        }
        let Some(history) = leader.history else {
            return false;
        };

        let lag = -self.offset.z / speed;
        let Some(sample) = history.try_interpolate(leader.now - lag) else {
            return false;
        };

        let heading = forward(sample.yaw);
        let right = right_of(heading);
        let relative_z = self.offset.z - tail_offset.z;
        self.position = tail_position + right * self.offset.x + heading * relative_z;
        true
    }
}
