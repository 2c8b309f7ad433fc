#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the formation movement engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative formation world, and the leader/follower systems. Adapters
//! submit [`Command`] values describing desired mutations, the world executes
//! those commands via its `apply` entry point, and then broadcasts [`Event`]
//! values describing what changed. The history buffer and grid point types
//! live here as well because every system reads them.

pub mod grid_point;
pub mod heading;
pub mod history;

use std::{fmt, time::Duration};

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use grid_point::{GridPoint, LeaderView, TailAnchor, UNREACHABLE};
pub use history::{HistoryBuffer, LocationSample};

/// Hard cap applied to the history depth regardless of formation geometry.
pub const MAX_HISTORY_ENTRIES: usize = 300;

/// Movement state shared by the leader and follower controllers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementState {
    /// Agent has not been initialised yet.
    #[default]
    None,
    /// Agent has no active target.
    Idle,
    /// Agent is travelling toward its target.
    Moving,
    /// Agent arrived and is holding position.
    ReachedDestination,
}

/// Describes how grid points derive their targets from the leader.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationMode {
    /// Followers replay the leader's recorded trajectory at an offset-derived lag.
    #[default]
    History,
    /// Followers track the leader's current position rotated by its current yaw.
    Live,
}

/// Unique identifier assigned to a follower when it is spawned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FollowerId(u32);

impl FollowerId {
    /// Creates a new follower identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for FollowerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "follower#{}", self.0)
    }
}

/// The rearmost agent currently moving on real history data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FormationTail {
    /// No follower qualified, so the leader anchors the formation.
    #[default]
    Leader,
    /// The follower bound to the grid point at the provided roster slot.
    Follower {
        /// Roster slot of the tail grid point.
        slot: usize,
    },
}

/// Geometric arrangement used to generate follower offsets.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FormationStyle {
    /// Single file column behind the leader.
    VerticalLine,
    /// Centered row abreast.
    HorizontalLine,
    /// Chevron opening backwards from a tip follower.
    Wedge,
    /// Filled triangle whose rows widen by one follower each.
    Triangle,
    /// Followers spread along a circular arc.
    Arc {
        /// Angle subtended by the arc, in degrees.
        arc_angle_degrees: f32,
    },
    /// Followers evenly distributed on a circle behind the leader.
    Circle,
    /// Rectangular block of rows and columns.
    Matrix {
        /// Number of followers per row.
        columns: u32,
        /// Row hosting the visual leader.
        leader_row: u32,
        /// Whether interior slots are occupied or only the border.
        fill: bool,
    },
    /// Front rank with the visual leader centered behind it.
    ShieldWall,
}

/// Full description of a formation that can be spawned or switched to.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormationType {
    /// Layout geometry.
    pub style: FormationStyle,
    /// How followers derive their targets.
    pub simulation_mode: SimulationMode,
    /// Number of followers to spawn.
    pub follower_count: u32,
    /// Spacing between neighbouring followers in world units.
    pub spacing: f32,
    /// Extra distance placing the whole layout behind the leader.
    pub leader_z_offset: f32,
    /// Cruise speed applied to the leader and every follower.
    pub speed: f32,
}

impl Default for FormationType {
    fn default() -> Self {
        Self {
            style: FormationStyle::Wedge,
            simulation_mode: SimulationMode::History,
            follower_count: 5,
            spacing: 2.0,
            leader_z_offset: 2.0,
            speed: 5.0,
        }
    }
}

/// Local offsets produced by a formation style plus the visual leader slot.
#[derive(Clone, Debug, PartialEq)]
pub struct FormationLayout {
    offsets: Vec<Vec3>,
    visual_leader: usize,
}

impl FormationLayout {
    /// Creates a layout from offsets and the slot hosting the visual leader.
    #[must_use]
    pub fn new(offsets: Vec<Vec3>, visual_leader: usize) -> Self {
        Self {
            offsets,
            visual_leader,
        }
    }

    /// Offsets relative to the leader's facing; `+z` is forward, `+x` is right.
    #[must_use]
    pub fn offsets(&self) -> &[Vec3] {
        &self.offsets
    }

    /// Slot that hosts the visual leader.
    #[must_use]
    pub const fn visual_leader(&self) -> usize {
        self.visual_leader
    }

    /// Number of slots described by the layout.
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Reports whether the layout contains no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Validates that the layout can host a formation.
    pub fn validate(&self) -> Result<(), FormationError> {
        if self.offsets.is_empty() {
            return Err(FormationError::EmptyLayout);
        }
        if self.visual_leader >= self.offsets.len() {
            return Err(FormationError::VisualLeaderOutOfRange {
                index: self.visual_leader,
                slots: self.offsets.len(),
            });
        }
        Ok(())
    }
}

/// Tuning knobs governing sampling, chasing and catch-up behaviour.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormationConfig {
    /// Seconds between two recorded leader samples.
    pub sample_interval: f32,
    /// Fixed simulation step used to space synthetic samples.
    pub fixed_dt: f32,
    /// Upper bound on the history depth.
    pub max_history_entries: usize,
    /// Number of ticks spent waiting for a resolved path distance.
    pub readiness_attempts: u8,
    /// Extra distance beyond the arrival radius before the leader starts moving.
    pub leader_chase_distance: f32,
    /// Extra distance beyond the arrival radius before a follower starts moving.
    pub follower_chase_distance: f32,
    /// Multiple of the default speed a lagging follower may reach.
    pub max_velocity_coefficient: f32,
    /// Gap beyond the ideal tolerance at which the catch-up speed saturates.
    pub catch_up_distance: f32,
    /// Minimum dot product between follower and leader forward to count as aligned.
    pub facing_dot_threshold: f32,
    /// Rotation slerp rate applied while a follower aligns in place.
    pub rotation_rate: f32,
    /// Seed for the deterministic random source.
    pub rng_seed: u64,
}

impl Default for FormationConfig {
    fn default() -> Self {
        Self {
            sample_interval: 0.2,
            fixed_dt: 0.02,
            max_history_entries: MAX_HISTORY_ENTRIES,
            readiness_attempts: 3,
            leader_chase_distance: 1.0,
            follower_chase_distance: 0.1,
            max_velocity_coefficient: 1.5,
            catch_up_distance: 1.0,
            facing_dot_threshold: 0.99,
            rotation_rate: 10.0,
            rng_seed: 0x5eed_f0a1_77c3_9b21,
        }
    }
}

/// Reasons a formation request was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum FormationError {
    /// The formation style produced no offsets.
    #[error("formation layout contains no slots")]
    EmptyLayout,
    /// The visual leader slot does not exist in the layout.
    #[error("visual leader slot {index} is outside the {slots} available slots")]
    VisualLeaderOutOfRange {
        /// Requested slot.
        index: usize,
        /// Number of slots in the layout.
        slots: usize,
    },
    /// The request needs an existing roster but none was spawned.
    #[error("formation has no followers")]
    EmptyRoster,
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Replaces the roster with followers arranged by the provided formation.
    SpawnFormation {
        /// Formation describing geometry, speed and simulation mode.
        formation: FormationType,
        /// Whether followers are placed on their slots immediately.
        teleport: bool,
    },
    /// Rearranges the existing roster into a new formation style.
    ///
    /// Roster, spacing, speed and simulation mode stay as spawned.
    ChangeFormationType {
        /// Formation supplying the new style and `leader_z_offset`; its other fields are ignored.
        formation: FormationType,
    },
    /// Promotes a randomly selected follower into the visual leader slot.
    RandomizeVisualLeader,
    /// Updates the leader's destination.
    SetTarget {
        /// New destination, or `None` to clear it.
        target: Option<Vec3>,
    },
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that a new roster was spawned.
    FormationSpawned {
        /// Followers in slot order.
        followers: Vec<FollowerId>,
        /// Follower occupying the visual leader slot.
        visual_leader: FollowerId,
        /// History depth, present when the formation replays history.
        history_entries: Option<usize>,
    },
    /// Reports that a spawn or change request was rejected.
    FormationRejected {
        /// Specific reason the request failed.
        reason: FormationError,
    },
    /// Confirms that the roster was rearranged into a new style.
    FormationChanged {
        /// Style now in effect.
        style: FormationStyle,
        /// Follower occupying the visual leader slot.
        visual_leader: FollowerId,
        /// History depth, present when the formation replays history.
        history_entries: Option<usize>,
    },
    /// Announces a new visual leader.
    VisualLeaderChanged {
        /// Follower promoted into the slot.
        follower: FollowerId,
        /// Slot hosting the visual leader.
        slot: usize,
    },
    /// Confirms the leader's destination was updated.
    TargetChanged {
        /// Destination now in effect.
        target: Option<Vec3>,
    },
    /// Reports a leader state transition.
    LeaderStateChanged {
        /// State before the transition.
        from: MovementState,
        /// State after the transition.
        to: MovementState,
    },
    /// Reports a follower state transition.
    FollowerStateChanged {
        /// Follower that transitioned.
        follower: FollowerId,
        /// State before the transition.
        from: MovementState,
        /// State after the transition.
        to: MovementState,
    },
    /// The leader resolved its path length and flagged every grid point.
    HistoryReadinessResolved {
        /// Total path distance reported by the steering backend.
        path_distance: f32,
        /// Number of grid points that cannot rely on real history.
        missing_history: usize,
    },
    /// The path length never resolved; the formation falls back to synthetic history.
    HistoryReadinessFailed {
        /// Number of ticks spent waiting.
        attempts: u8,
    },
    /// A synthetic trajectory was written for grid points lacking history.
    FakeHistorySynthesized {
        /// Number of samples written.
        samples: usize,
    },
    /// The leader selected a new formation tail on arrival.
    FormationTailSelected {
        /// Selected tail.
        tail: FormationTail,
    },
    /// Every grid point reached its final position.
    FormationArrived,
}

/// Capability surface of a steering backend driving one agent.
///
/// Each movement backend implements this trait so controllers never need to
/// know which concrete agent type moves the body.
pub trait Steering: fmt::Debug {
    /// Current world position.
    fn position(&self) -> Vec3;

    /// Current heading in radians around the vertical axis.
    fn yaw(&self) -> f32;

    /// Overrides the current heading.
    fn set_yaw(&mut self, yaw: f32);

    /// Velocity the backend wants to travel with this tick.
    fn desired_velocity(&self) -> Vec3;

    /// Speed cap currently in effect.
    fn max_speed(&self) -> f32;

    /// Updates the speed cap.
    fn set_max_speed(&mut self, speed: f32);

    /// Sets or clears the destination.
    fn set_destination(&mut self, destination: Option<Vec3>);

    /// Path distance to `destination`, or `None` while the path is unresolved.
    ///
    /// Implementations may retarget themselves to answer the query.
    fn remaining_distance(&mut self, destination: Vec3) -> Option<f32>;

    /// Whether the agent is within its arrival radius of the destination.
    fn reached_destination(&self) -> bool;

    /// Whether the agent currently follows a resolved path.
    fn has_path(&self) -> bool;

    /// Halts or resumes movement.
    fn set_stopped(&mut self, stopped: bool);

    /// Whether movement is halted.
    fn is_stopped(&self) -> bool;

    /// Moves the agent instantly, discarding momentum.
    fn teleport(&mut self, position: Vec3);

    /// Enables or disables automatic rotation toward the travel direction.
    fn set_rotation_enabled(&mut self, enabled: bool);

    /// Radius within which the destination counts as reached.
    fn end_reached_distance(&self) -> f32;

    /// Integrates movement over `dt` seconds.
    fn advance(&mut self, dt: f32);
}

/// Reports whether an agent should start travelling toward `target`.
///
/// The path distance must be known and exceed `chase_distance` plus the
/// agent's arrival radius. Unresolved targets never trigger a chase.
pub fn should_chase(steering: &mut dyn Steering, target: Vec3, chase_distance: f32) -> bool {
    if !target.is_finite() {
        return false;
    }
    match steering.remaining_distance(target) {
        Some(distance) if distance > 0.0 => {
            distance > chase_distance + steering.end_reached_distance()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_validation_rejects_empty_offsets() {
        let layout = FormationLayout::new(Vec::new(), 0);
        assert_eq!(layout.validate(), Err(FormationError::EmptyLayout));
    }

    #[test]
    fn layout_validation_rejects_out_of_range_visual_leader() {
        let layout = FormationLayout::new(vec![Vec3::ZERO, Vec3::NEG_Z], 2);
        assert_eq!(
            layout.validate(),
            Err(FormationError::VisualLeaderOutOfRange { index: 2, slots: 2 })
        );
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let config: FormationConfig =
            toml::from_str("sample_interval = 0.5\n").expect("partial config parses");
        assert_eq!(config.sample_interval, 0.5);
        assert_eq!(config.max_history_entries, MAX_HISTORY_ENTRIES);
        assert_eq!(config.readiness_attempts, 3);
    }

    #[test]
    fn formation_style_uses_tagged_representation() {
        let formation: FormationType = toml::from_str(
            "follower_count = 7\n[style]\nkind = \"arc\"\narc_angle_degrees = 120.0\n",
        )
        .expect("formation parses");
        assert_eq!(
            formation.style,
            FormationStyle::Arc {
                arc_angle_degrees: 120.0
            }
        );
        assert_eq!(formation.follower_count, 7);
        assert_eq!(formation.simulation_mode, SimulationMode::History);
    }

    #[test]
    fn follower_id_display_is_stable() {
        assert_eq!(FollowerId::new(4).to_string(), "follower#4");
    }
}
