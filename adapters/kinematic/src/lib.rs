#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Straight-line steering backend for headless simulation.
//!
//! Agents travel directly toward their destination at their speed cap and
//! stop exactly on it. Path searches can be given
//! a latency measured in ticks so callers exercise the unresolved-distance
//! paths a real navigation mesh produces.

use formation_core::{heading::yaw_of, Steering};
use glam::Vec3;

/// Arrival radius used when none is configured.
pub const DEFAULT_END_REACHED_DISTANCE: f32 = 0.2;

const ARRIVAL_EPSILON: f32 = 1.0e-4;

#[derive(Clone, Copy, Debug, PartialEq)]
struct PathSearch {
    destination: Vec3,
    ticks_left: u32,
}

impl PathSearch {
    fn resolves(&self, destination: Vec3) -> bool {
        self.destination == destination && self.ticks_left == 0
    }

    fn tick(&mut self) {
        self.ticks_left = self.ticks_left.saturating_sub(1);
    }
}

/// Kinematic body implementing [`Steering`].
#[derive(Clone, Debug)]
pub struct KinematicAgent {
    position: Vec3,
    yaw: f32,
    max_speed: f32,
    destination: Option<Vec3>,
    stopped: bool,
    rotation_enabled: bool,
    end_reached_distance: f32,
    path_latency: u32,
    path: Option<PathSearch>,
    probe: Option<PathSearch>,
}

impl KinematicAgent {
    /// Creates a stopped agent at `position` facing `+z`.
    #[must_use]
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            yaw: 0.0,
            max_speed: 0.0,
            destination: None,
            stopped: true,
            rotation_enabled: true,
            end_reached_distance: DEFAULT_END_REACHED_DISTANCE,
            path_latency: 0,
            path: None,
            probe: None,
        }
    }

    /// Sets the initial heading.
    #[must_use]
    pub fn with_yaw(mut self, yaw: f32) -> Self {
        self.yaw = yaw;
        self
    }

    /// Sets the initial speed cap.
    #[must_use]
    pub fn with_max_speed(mut self, speed: f32) -> Self {
        self.max_speed = speed.max(0.0);
        self
    }

    /// Sets the arrival radius.
    #[must_use]
    pub fn with_end_reached_distance(mut self, distance: f32) -> Self {
        self.end_reached_distance = distance.max(0.0);
        self
    }

    /// Number of ticks a path search takes before distances resolve.
    #[must_use]
    pub fn with_path_latency(mut self, ticks: u32) -> Self {
        self.path_latency = ticks;
        self
    }

    /// Destination currently travelled to.
    #[must_use]
    pub const fn destination(&self) -> Option<Vec3> {
        self.destination
    }

    /// Whether automatic rotation is enabled.
    #[must_use]
    pub const fn rotation_enabled(&self) -> bool {
        self.rotation_enabled
    }

    fn start_search(&self, current: Option<PathSearch>, destination: Vec3) -> PathSearch {
        match current {
            Some(search) if search.destination == destination => search,
            _ => PathSearch {
                destination,
                ticks_left: self.path_latency,
            },
        }
    }

    fn integrate(&mut self, dt: f32) {
        let Some(destination) = self.destination else {
            return;
        };
        if self.stopped || !self.has_path() {
            return;
        }

        let delta = destination - self.position;
        let distance = delta.length();
        if distance <= ARRIVAL_EPSILON {
            return;
        }
        let step = self.max_speed * dt.max(0.0);
        if step >= distance {
            self.position = destination;
        } else if step > 0.0 {
            self.position += delta / distance * step;
        } else {
            return;
        }

        if self.rotation_enabled {
            if let Some(yaw) = yaw_of(delta) {
                self.yaw = yaw;
            }
        }
    }
}

impl Steering for KinematicAgent {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn yaw(&self) -> f32 {
        self.yaw
    }

    fn set_yaw(&mut self, yaw: f32) {
        self.yaw = yaw;
    }

    fn desired_velocity(&self) -> Vec3 {
        let Some(destination) = self.destination else {
            return Vec3::ZERO;
        };
        let delta = destination - self.position;
        if self.stopped || !self.has_path() || delta.length() <= ARRIVAL_EPSILON {
            return Vec3::ZERO;
        }
        delta.normalize_or_zero() * self.max_speed
    }

    fn max_speed(&self) -> f32 {
        self.max_speed
    }

    fn set_max_speed(&mut self, speed: f32) {
        self.max_speed = speed.max(0.0);
    }

    fn set_destination(&mut self, destination: Option<Vec3>) {
        self.destination = destination.filter(|point| point.is_finite());
        if let Some(point) = self.destination {
            self.path = Some(self.start_search(self.path, point));
        }
    }

    fn remaining_distance(&mut self, destination: Vec3) -> Option<f32> {
        if !destination.is_finite() {
            return None;
        }

        let resolved = if self.destination == Some(destination) {
            self.path.map_or(false, |path| path.resolves(destination))
        } else {
            let probe = self.start_search(self.probe, destination);
            self.probe = Some(probe);
            probe.resolves(destination)
        };
        resolved.then(|| self.position.distance(destination))
    }

    fn reached_destination(&self) -> bool {
        self.destination
            .map_or(false, |destination| {
                self.position.distance(destination) <= self.end_reached_distance
            })
    }

    fn has_path(&self) -> bool {
        match (self.destination, self.path) {
            (Some(destination), Some(path)) => path.resolves(destination),
            _ => false,
        }
    }

    fn set_stopped(&mut self, stopped: bool) {
        self.stopped = stopped;
    }

    fn is_stopped(&self) -> bool {
        self.stopped
    }

    fn teleport(&mut self, position: Vec3) {
        self.position = position;
    }

    fn set_rotation_enabled(&mut self, enabled: bool) {
        self.rotation_enabled = enabled;
    }

    fn end_reached_distance(&self) -> f32 {
        self.end_reached_distance
    }

    fn advance(&mut self, dt: f32) {
        self.integrate(dt);
        for search in [self.path.as_mut(), self.probe.as_mut()].into_iter().flatten() {
            search.tick();
        }
    }
}
