#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Leader controller driving the formation's movement and history state.
//!
//! The leader owns the real history buffer it records while moving, the
//! synthetic buffer it lays out on arrival, and the readiness step that
//! decides which grid points the real path can cover. Grid points are owned
//! by the world and lent to the controller for the duration of a tick.

pub mod fake_path;
pub mod readiness;
pub mod tail;

use formation_core::{
    should_chase, Event, FormationConfig, FormationTail, GridPoint, HistoryBuffer, LeaderView,
    LocationSample, MovementState, SimulationMode, Steering,
};
use glam::Vec3;
use log::{debug, info, warn};

pub use fake_path::FakePath;
pub use readiness::HistoryReadiness;

/// Inputs shared by every step of a leader tick.
#[derive(Clone, Copy, Debug)]
pub struct TickContext<'a> {
    /// Current simulated time in seconds.
    pub now: f32,
    /// Destination the leader should travel to.
    pub target: Vec3,
    /// How grid points derive their targets.
    pub mode: SimulationMode,
    /// Formation tuning.
    pub config: &'a FormationConfig,
}

/// Movement and history state machine of the formation leader.
#[derive(Clone, Debug, Default)]
pub struct LeaderController {
    state: MovementState,
    velocity_magnitude: f32,
    average_velocity: f32,
    history: Option<HistoryBuffer>,
    fake_history: Option<HistoryBuffer>,
    max_history_entries: usize,
    last_sample_time: f32,
    readiness: HistoryReadiness,
    fake_path: Option<FakePath>,
    tail: FormationTail,
}

impl LeaderController {
    /// Creates a controller without history storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current movement state.
    #[must_use]
    pub const fn state(&self) -> MovementState {
        self.state
    }

    /// Horizontal speed measured on the last tick.
    #[must_use]
    pub const fn velocity_magnitude(&self) -> f32 {
        self.velocity_magnitude
    }

    /// Average speed over the span covered by the real history.
    #[must_use]
    pub const fn average_velocity(&self) -> f32 {
        self.average_velocity
    }

    /// Real history recorded while moving.
    #[must_use]
    pub fn history(&self) -> Option<&HistoryBuffer> {
        self.history.as_ref()
    }

    /// Synthetic history written on arrival.
    #[must_use]
    pub fn fake_history(&self) -> Option<&HistoryBuffer> {
        self.fake_history.as_ref()
    }

    /// Capacity used whenever a history buffer is (re)created.
    #[must_use]
    pub const fn max_history_entries(&self) -> usize {
        self.max_history_entries
    }

    /// Progress of the readiness step for the current departure.
    #[must_use]
    pub const fn readiness(&self) -> HistoryReadiness {
        self.readiness
    }

    /// Synthetic trajectory awaiting the next arrival, if any.
    #[must_use]
    pub const fn fake_path(&self) -> Option<&FakePath> {
        self.fake_path.as_ref()
    }

    /// Rearmost agent replaying real history, selected on arrival.
    #[must_use]
    pub const fn tail(&self) -> FormationTail {
        self.tail
    }

    /// Recreates the real history buffer with `max_history_entries` slots.
    pub fn initialize(&mut self, max_history_entries: usize, now: f32) {
        self.max_history_entries = max_history_entries;
        self.history = Some(HistoryBuffer::with_capacity(max_history_entries));
        self.last_sample_time = now;
        info!("leader history sized to {max_history_entries} entries");
    }

    /// Drops every history buffer, used when the formation tracks the leader live.
    pub fn release_history(&mut self) {
        self.history = None;
        self.fake_history = None;
        self.fake_path = None;
        self.readiness = HistoryReadiness::Idle;
        self.tail = FormationTail::Leader;
    }

    /// Measures the leader's horizontal speed from the steering backend.
    pub fn measure_velocity(&mut self, steering: &dyn Steering) {
        let velocity = steering.desired_velocity();
        self.velocity_magnitude = Vec3::new(velocity.x, 0.0, velocity.z).length();
    }

    /// Refreshes the average velocity and records a sample when one is due.
    ///
    /// Does nothing until [`initialize`](Self::initialize) created a buffer.
    pub fn sample_history(&mut self, steering: &dyn Steering, now: f32, config: &FormationConfig) {
        let moving = self.state == MovementState::Moving;
        let Some(history) = self.history.as_mut() else {
            return;
        };

        self.average_velocity = 0.0;
        if moving && history.len() > 1 {
            if let Some(oldest) = history.oldest() {
                let span = now - oldest.timestamp;
                if span > 0.0 {
                    self.average_velocity = steering.position().distance(oldest.position) / span;
                }
            }
        }

        if moving && now - self.last_sample_time >= config.sample_interval {
            self.last_sample_time = now;
            history.insert(LocationSample::new(steering.position(), steering.yaw(), now));
        }
    }

    /// Borrows the leader state grid points resolve against.
    #[must_use]
    pub fn view(&self, steering: &dyn Steering, now: f32) -> LeaderView<'_> {
        LeaderView {
            position: steering.position(),
            yaw: steering.yaw(),
            average_velocity: self.average_velocity,
            max_speed: steering.max_speed(),
            now,
            history: self.history.as_ref(),
            fake_history: self.fake_history.as_ref(),
        }
    }

    /// Advances the state machine and the readiness step by one tick.
    pub fn update(
        &mut self,
        steering: &mut dyn Steering,
        grid_points: &mut [GridPoint],
        ctx: TickContext<'_>,
        out: &mut Vec<Event>,
    ) {
        match self.state {
            MovementState::None | MovementState::Idle | MovementState::ReachedDestination => {
                if should_chase(steering, ctx.target, ctx.config.leader_chase_distance) {
                    self.enter_moving(steering, grid_points, ctx, out);
                }
            }
            MovementState::Moving => {
                if !steering.is_stopped() {
                    steering.set_destination(Some(ctx.target));
                    if steering.reached_destination() && self.velocity_magnitude <= 0.0 {
                        self.enter_reached(steering, grid_points, ctx, out);
                    }
                }
            }
        }

        self.advance_readiness(steering, grid_points, ctx, out);
    }

    fn enter_moving(
        &mut self,
        steering: &mut dyn Steering,
        grid_points: &mut [GridPoint],
        ctx: TickContext<'_>,
        out: &mut Vec<Event>,
    ) {
        steering.set_stopped(false);
        steering.set_destination(Some(ctx.target));
        for point in grid_points.iter_mut() {
            point.reset();
        }

        self.fake_path = None;
        self.fake_history = None;
        self.tail = FormationTail::Leader;
        self.readiness = HistoryReadiness::Idle;
        if ctx.mode == SimulationMode::History {
            self.history = Some(HistoryBuffer::with_capacity(self.max_history_entries));
            self.last_sample_time = ctx.now;
            self.readiness =
                HistoryReadiness::await_path(ctx.config.readiness_attempts, ctx.target);
        }

        self.set_state(MovementState::Moving, out);
    }

    fn enter_reached(
        &mut self,
        steering: &mut dyn Steering,
        grid_points: &[GridPoint],
        ctx: TickContext<'_>,
        out: &mut Vec<Event>,
    ) {
        steering.set_stopped(true);
        self.average_velocity = 0.0;
        self.velocity_magnitude = 0.0;
        self.last_sample_time = ctx.now;
        self.set_state(MovementState::ReachedDestination, out);

        // A pending readiness step finishes the arrival once it settles.
        if ctx.mode == SimulationMode::History && !self.readiness.is_pending() {
            self.synthesize_fake_history(steering, ctx, out);
            self.select_tail(grid_points, out);
        }
    }

    fn advance_readiness(
        &mut self,
        steering: &mut dyn Steering,
        grid_points: &mut [GridPoint],
        ctx: TickContext<'_>,
        out: &mut Vec<Event>,
    ) {
        let HistoryReadiness::AwaitingPathDistance {
            attempts_left,
            destination,
        } = self.readiness
        else {
            return;
        };

        match steering.remaining_distance(destination) {
            Some(path_distance) if path_distance > 0.0 && path_distance.is_finite() => {
                let missing_history = tail::flag_history_coverage(grid_points, path_distance);
                self.readiness = HistoryReadiness::Resolved { path_distance };
                out.push(Event::HistoryReadinessResolved {
                    path_distance,
                    missing_history,
                });

                if missing_history > 0 {
                    let anchor = tail::rearmost_with_history(grid_points)
                        .map_or(Vec3::ZERO, |slot| grid_points[slot].offset());
                    info!("{missing_history} grid points need a synthetic path");
                    self.plan_fake_path(&*steering, destination, anchor);
                } else {
                    info!("every grid point can replay real history");
                }
            }
            _ => {
                let attempts_left = attempts_left.saturating_sub(1);
                if attempts_left > 0 {
                    self.readiness = HistoryReadiness::AwaitingPathDistance {
                        attempts_left,
                        destination,
                    };
                    return;
                }

                let attempts = ctx.config.readiness_attempts.max(1);
                warn!("path distance unresolved after {attempts} attempts");
                self.readiness = HistoryReadiness::Failed;
                out.push(Event::HistoryReadinessFailed { attempts });
                self.plan_fake_path(&*steering, destination, Vec3::ZERO);
            }
        }

        if self.state == MovementState::ReachedDestination {
            self.synthesize_fake_history(&*steering, ctx, out);
            self.select_tail(grid_points, out);
        }
    }

    fn plan_fake_path(&mut self, steering: &dyn Steering, destination: Vec3, anchor: Vec3) {
        let path = FakePath::compute(steering.position(), steering.yaw(), destination, anchor);
        debug!(
            "synthetic path planned from {:?} to {:?}",
            path.start(),
            path.end()
        );
        self.fake_path = Some(path);
    }

    fn synthesize_fake_history(
        &mut self,
        steering: &dyn Steering,
        ctx: TickContext<'_>,
        out: &mut Vec<Event>,
    ) {
        let Some(path) = self.fake_path.take() else {
            return;
        };

        let buffer = path.synthesize(
            ctx.now,
            steering.max_speed(),
            ctx.config.fixed_dt,
            self.max_history_entries,
        );
        let samples = buffer.len();
        self.fake_history = Some(buffer);
        debug!("synthetic history written with {samples} samples");
        out.push(Event::FakeHistorySynthesized { samples });
    }

    fn select_tail(&mut self, grid_points: &[GridPoint], out: &mut Vec<Event>) {
        let tail = tail::select_tail(grid_points);
        match tail {
            FormationTail::Leader => debug!("leader anchors the formation tail"),
            FormationTail::Follower { slot } => {
                debug!("grid point {slot} anchors the formation tail");
            }
        }
        self.tail = tail;
        out.push(Event::FormationTailSelected { tail });
    }

    fn set_state(&mut self, state: MovementState, out: &mut Vec<Event>) {
        if self.state == state {
            return;
        }
        debug!("leader state {:?} -> {:?}", self.state, state);
        out.push(Event::LeaderStateChanged {
            from: self.state,
            to: state,
        });
        self.state = state;
    }
}
