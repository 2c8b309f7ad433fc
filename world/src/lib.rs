#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative formation state.
//!
//! The world owns the leader, the follower roster and the grid points that
//! bind them, and mutates them only through [`apply`]. Every tick runs the
//! leader's sampling step, resolves grid points for the active simulation
//! mode, advances the leader and follower state machines, and finally
//! integrates every steering backend.

mod formation;

use std::{fmt, time::Duration};

use formation_core::{Command, Event, FollowerId, FormationConfig, MovementState, Steering};
use formation_system_follower::LeaderPose;
use formation_system_leader::{LeaderController, TickContext};
use glam::Vec3;
use log::info;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use formation::Formation;

pub use formation::required_history_entries;

/// Creates the steering backend for a freshly spawned follower.
///
/// Returning `None` spawns the follower without a body; it keeps its slot but
/// never moves.
pub type SteeringFactory = Box<dyn FnMut(FollowerId) -> Option<Box<dyn Steering>>>;

#[derive(Debug, Default)]
pub(crate) struct LeaderAgent {
    pub(crate) steering: Option<Box<dyn Steering>>,
    pub(crate) controller: LeaderController,
    pub(crate) target: Option<Vec3>,
}

/// Represents the authoritative formation world.
pub struct World {
    config: FormationConfig,
    clock: Duration,
    leader: LeaderAgent,
    formation: Formation,
    spawn_follower: SteeringFactory,
    rng: ChaCha8Rng,
    arrived: bool,
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("leader", &self.leader)
            .field("formation", &self.formation)
            .field("arrived", &self.arrived)
            .finish_non_exhaustive()
    }
}

impl World {
    /// Creates a world around the leader's steering backend.
    ///
    /// A missing leader backend leaves the world inert: spawns are skipped and
    /// ticks only advance the clock.
    #[must_use]
    pub fn new(
        config: FormationConfig,
        leader: Option<Box<dyn Steering>>,
        spawn_follower: SteeringFactory,
    ) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            config,
            clock: Duration::ZERO,
            leader: LeaderAgent {
                steering: leader,
                ..LeaderAgent::default()
            },
            formation: Formation::default(),
            spawn_follower,
            arrived: false,
        }
    }

    fn now(&self) -> f32 {
        self.clock.as_secs_f32()
    }

    fn tick(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        self.clock = self.clock.saturating_add(dt);
        out_events.push(Event::TimeAdvanced { dt });

        let now = self.now();
        let step = dt.as_secs_f32();
        let mode = self.formation.simulation_mode();
        let Some(steering) = self.leader.steering.as_deref_mut() else {
            return;
        };

        let controller = &mut self.leader.controller;
        controller.measure_velocity(steering);
        controller.sample_history(steering, now, &self.config);
        self.formation.dispatch(controller, steering, now);

        if let Some(target) = self.leader.target {
            controller.update(
                steering,
                &mut self.formation.grid_points,
                TickContext {
                    now,
                    target,
                    mode,
                    config: &self.config,
                },
                out_events,
            );
        }

        let pose = LeaderPose {
            position: steering.position(),
            yaw: steering.yaw(),
            stopped: controller.state() != MovementState::Moving,
        };
        self.formation
            .update_followers(pose, &self.config, step, out_events);

        steering.advance(step);
        self.formation.advance(step);

        let arrived = self.formation.all_reached();
        if arrived && !self.arrived {
            info!("formation arrived at {now:.2}s");
            out_events.push(Event::FormationArrived);
        }
        self.arrived = arrived;
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::SpawnFormation {
            formation,
            teleport,
        } => {
            let now = world.now();
            world.formation.spawn(
                formation,
                teleport,
                &mut world.leader,
                &mut world.spawn_follower,
                &world.config,
                now,
                out_events,
            );
            world.arrived = false;
        }
        Command::ChangeFormationType { formation } => {
            let now = world.now();
            world.formation.change_formation_type(
                formation,
                &mut world.leader,
                &world.config,
                now,
                out_events,
            );
            world.arrived = false;
        }
        Command::RandomizeVisualLeader => {
            world
                .formation
                .randomize_visual_leader(&mut world.rng, out_events);
        }
        Command::SetTarget { target } => {
            let target = target.filter(|point| point.is_finite());
            world.leader.target = target;
            out_events.push(Event::TargetChanged { target });
        }
        Command::Tick { dt } => world.tick(dt, out_events),
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::time::Duration;

    use formation_core::{
        FollowerId, FormationConfig, FormationTail, FormationType, GridPoint, MovementState,
        SimulationMode,
    };
    use formation_system_leader::LeaderController;
    use glam::Vec3;

    use super::World;

    /// Read-only snapshot of the formation leader.
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub struct LeaderSnapshot {
        /// Current position, absent without a steering backend.
        pub position: Option<Vec3>,
        /// Current heading in radians.
        pub yaw: f32,
        /// Movement state.
        pub state: MovementState,
        /// Horizontal speed measured on the last tick.
        pub velocity_magnitude: f32,
        /// Average speed over the recorded history.
        pub average_velocity: f32,
        /// Destination in effect.
        pub target: Option<Vec3>,
        /// Rearmost agent replaying real history.
        pub tail: FormationTail,
    }

    /// Read-only snapshot of one follower.
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub struct FollowerSnapshot {
        /// Follower identifier.
        pub id: FollowerId,
        /// Roster slot.
        pub slot: usize,
        /// Whether the slot maps onto a grid point of the current layout.
        pub assigned: bool,
        /// Current position, absent without a steering backend.
        pub position: Option<Vec3>,
        /// Current heading in radians.
        pub yaw: f32,
        /// Movement state.
        pub state: MovementState,
        /// Horizontal speed measured on the last tick.
        pub velocity_magnitude: f32,
    }

    /// Simulated time elapsed since the world was created.
    #[must_use]
    pub fn clock(world: &World) -> Duration {
        world.clock
    }

    /// Tuning the world was created with.
    #[must_use]
    pub fn config(world: &World) -> &FormationConfig {
        &world.config
    }

    /// Captures the leader's pose and movement state.
    #[must_use]
    pub fn leader(world: &World) -> LeaderSnapshot {
        let steering = world.leader.steering.as_deref();
        let controller = &world.leader.controller;
        LeaderSnapshot {
            position: steering.map(|steering| steering.position()),
            yaw: steering.map_or(0.0, |steering| steering.yaw()),
            state: controller.state(),
            velocity_magnitude: controller.velocity_magnitude(),
            average_velocity: controller.average_velocity(),
            target: world.leader.target,
            tail: controller.tail(),
        }
    }

    /// Provides the leader controller, including its history buffers.
    #[must_use]
    pub fn leader_controller(world: &World) -> &LeaderController {
        &world.leader.controller
    }

    /// Grid points of the current layout in slot order.
    #[must_use]
    pub fn grid_points(world: &World) -> &[GridPoint] {
        &world.formation.grid_points
    }

    /// Captures every follower in slot order.
    #[must_use]
    pub fn followers(world: &World) -> Vec<FollowerSnapshot> {
        let assigned = world.formation.grid_points.len();
        world
            .formation
            .followers
            .iter()
            .enumerate()
            .map(|(slot, follower)| {
                let steering = follower.steering.as_deref();
                FollowerSnapshot {
                    id: follower.id,
                    slot,
                    assigned: slot < assigned,
                    position: steering.map(|steering| steering.position()),
                    yaw: steering.map_or(0.0, |steering| steering.yaw()),
                    state: follower.controller.state(),
                    velocity_magnitude: follower.controller.velocity_magnitude(),
                }
            })
            .collect()
    }

    /// Follower occupying the visual leader slot.
    #[must_use]
    pub fn visual_leader(world: &World) -> Option<FollowerId> {
        world.formation.visual_leader_id()
    }

    /// Slot hosting the visual leader.
    #[must_use]
    pub fn visual_leader_slot(world: &World) -> usize {
        world.formation.visual_leader
    }

    /// History depth of the current formation, absent in live mode.
    #[must_use]
    pub fn history_entries(world: &World) -> Option<usize> {
        world.formation.history_entries
    }

    /// Simulation mode of the current formation.
    #[must_use]
    pub fn simulation_mode(world: &World) -> SimulationMode {
        world.formation.simulation_mode()
    }

    /// Formation in effect, absent until one was spawned.
    #[must_use]
    pub fn formation_type(world: &World) -> Option<FormationType> {
        world.formation.spawned
    }

    /// Whether every grid point reported arrival.
    #[must_use]
    pub fn formation_arrived(world: &World) -> bool {
        world.arrived
    }
}
