#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Chase controller moving a single follower onto its grid point.

use formation_core::{
    heading::{forward, lerp_yaw},
    should_chase, Event, FollowerId, FormationConfig, GridPoint, MovementState, Steering,
};
use glam::Vec3;
use log::debug;

/// Arrival tolerance kept below the steering backend's own radius.
const IDEAL_GAP_MARGIN: f32 = 0.1;

/// Leader pose a follower aligns with while holding its slot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LeaderPose {
    /// Current leader position.
    pub position: Vec3,
    /// Current leader heading in radians.
    pub yaw: f32,
    /// Whether the leader has stopped travelling.
    pub stopped: bool,
}

/// Chase state machine of one follower.
#[derive(Clone, Debug, Default)]
pub struct FollowerController {
    state: MovementState,
    velocity_magnitude: f32,
    default_speed: f32,
}

impl FollowerController {
    /// Creates an unbound controller.
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

    /// Cruise speed the catch-up ramp starts from.
    #[must_use]
    pub const fn default_speed(&self) -> f32 {
        self.default_speed
    }

    /// Applies the formation's cruise speed.
    pub fn set_default_speed(&mut self, steering: &mut dyn Steering, speed: f32) {
        steering.set_max_speed(speed);
        self.default_speed = speed;
    }

    /// Binds the follower to a (new) grid point, returning it to idle.
    pub fn bind(&mut self, id: FollowerId, out: &mut Vec<Event>) {
        self.set_state(id, MovementState::Idle, out);
    }

    /// Advances the chase state machine by one tick.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        id: FollowerId,
        steering: &mut dyn Steering,
        grid_point: &mut GridPoint,
        leader: LeaderPose,
        config: &FormationConfig,
        dt: f32,
        out: &mut Vec<Event>,
    ) {
        self.measure_velocity(&*steering);

        match self.state {
            MovementState::None => {}
            MovementState::Idle | MovementState::ReachedDestination => {
                let target = grid_point.position();
                if should_chase(steering, target, config.follower_chase_distance) {
                    steering.set_stopped(false);
                    steering.set_rotation_enabled(true);
                    self.set_state(id, MovementState::Moving, out);
                }
            }
            MovementState::Moving => {
                self.chase(id, steering, grid_point, leader, config, dt, out);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn chase(
        &mut self,
        id: FollowerId,
        steering: &mut dyn Steering,
        grid_point: &mut GridPoint,
        leader: LeaderPose,
        config: &FormationConfig,
        dt: f32,
        out: &mut Vec<Event>,
    ) {
        self.adjust_speed(steering, grid_point, leader, config);

        let target = grid_point.position();
        if target.is_finite() {
            steering.set_destination(Some(target));
            self.measure_velocity(&*steering);
        }

        if !steering.reached_destination() || self.velocity_magnitude > 0.0 || !leader.stopped {
            return;
        }

        let facing = forward(steering.yaw()).dot(forward(leader.yaw));
        if facing < config.facing_dot_threshold {
            steering.set_rotation_enabled(false);
            let t = (config.rotation_rate * dt).min(1.0);
            steering.set_yaw(lerp_yaw(steering.yaw(), leader.yaw, t));
            return;
        }

        steering.set_stopped(true);
        steering.set_destination(None);
        grid_point.mark_reached();
        self.set_state(id, MovementState::ReachedDestination, out);
    }

    fn measure_velocity(&mut self, steering: &dyn Steering) {
        let velocity = steering.desired_velocity();
        self.velocity_magnitude = Vec3::new(velocity.x, 0.0, velocity.z).length();
    }

    /// Ramps the speed cap up while the follower lags behind its live slot.
    fn adjust_speed(
        &self,
        steering: &mut dyn Steering,
        grid_point: &GridPoint,
        leader: LeaderPose,
        config: &FormationConfig,
    ) {
        if !steering.has_path() {
            return;
        }

        let live = grid_point.live_position(leader.position, leader.yaw);
        let gap = steering.position().distance(live);
        let ideal_gap = steering.end_reached_distance() - IDEAL_GAP_MARGIN;

        let speed = if gap > ideal_gap {
            let ratio = ((gap - ideal_gap) / config.catch_up_distance.max(f32::EPSILON))
                .clamp(0.0, 1.0);
            let boosted = self.default_speed * config.max_velocity_coefficient;
            self.default_speed + (boosted - self.default_speed) * ratio
        } else {
            self.default_speed
        };
        steering.set_max_speed(speed);
    }

    fn set_state(&mut self, id: FollowerId, state: MovementState, out: &mut Vec<Event>) {
        if self.state == state {
            return;
        }
        debug!("{id} state {:?} -> {:?}", self.state, state);
        out.push(Event::FollowerStateChanged {
            follower: id,
            from: self.state,
            to: state,
        });
        self.state = state;
    }
}
