//! Roster, grid points and history sizing of the spawned formation.

use formation_core::{
    Event, FollowerId, FormationConfig, FormationError, FormationLayout, FormationTail,
    FormationType, GridPoint, MovementState, SimulationMode, Steering, TailAnchor,
};
use formation_system_follower::{FollowerController, LeaderPose};
use formation_system_layouts::{layout, layout_for};
use formation_system_leader::LeaderController;
use glam::Vec3;
use log::{info, warn};
use rand::Rng;

use crate::{LeaderAgent, SteeringFactory};

const MIN_EXPECTED_SPEED_FRACTION: f32 = 0.1;
const MIN_EXPECTED_SPEED: f32 = 0.01;

/// Number of history samples needed so the deepest offset finds a bracket
/// even when the leader crawls at a tenth of its speed cap.
///
/// The result is clamped to at least one sample per follower and at most
/// `cap`; when the two bounds cross, the cap wins.
#[must_use]
pub fn required_history_entries(
    offsets: &[Vec3],
    max_speed: f32,
    sample_interval: f32,
    follower_count: usize,
    cap: usize,
) -> usize {
    let min_expected_speed = (max_speed * MIN_EXPECTED_SPEED_FRACTION).max(MIN_EXPECTED_SPEED);
    let max_offset = offsets
        .iter()
        .map(|offset| offset.length())
        .fold(0.0_f32, f32::max);
    let max_lag = max_offset / min_expected_speed;
    // Float to integer casts saturate, so a zero interval lands on the cap.
    let needed = (max_lag / sample_interval).ceil() as usize;
    needed.max(follower_count).min(cap)
}

#[derive(Debug)]
pub(crate) struct Follower {
    pub(crate) id: FollowerId,
    pub(crate) steering: Option<Box<dyn Steering>>,
    pub(crate) controller: FollowerController,
}

impl Follower {
    fn rebind(&mut self, out: &mut Vec<Event>) {
        if let Some(steering) = self.steering.as_deref_mut() {
            steering.set_stopped(true);
        }
        self.controller.bind(self.id, out);
    }
}

#[derive(Debug, Default)]
pub(crate) struct Formation {
    pub(crate) spawned: Option<FormationType>,
    pub(crate) followers: Vec<Follower>,
    pub(crate) grid_points: Vec<GridPoint>,
    pub(crate) visual_leader: usize,
    pub(crate) history_entries: Option<usize>,
    next_follower: u32,
}

impl Formation {
    pub(crate) fn simulation_mode(&self) -> SimulationMode {
        self.spawned
            .map_or(SimulationMode::default(), |formation| formation.simulation_mode)
    }

    pub(crate) fn visual_leader_id(&self) -> Option<FollowerId> {
        self.followers
            .get(self.visual_leader)
            .map(|follower| follower.id)
    }

    /// Whether every assigned grid point reported arrival.
    pub(crate) fn all_reached(&self) -> bool {
        !self.grid_points.is_empty() && self.grid_points.iter().all(GridPoint::reached)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn spawn(
        &mut self,
        formation: FormationType,
        teleport: bool,
        leader: &mut LeaderAgent,
        spawn_follower: &mut SteeringFactory,
        config: &FormationConfig,
        now: f32,
        out: &mut Vec<Event>,
    ) {
        let layout = layout_for(&formation);
        if let Err(reason) = layout.validate() {
            warn!("formation spawn rejected: {reason}");
            out.push(Event::FormationRejected { reason });
            return;
        }
        let Some(leader_steering) = leader.steering.as_deref_mut() else {
            warn!("formation spawn skipped: leader has no steering backend");
            return;
        };

        leader_steering.set_max_speed(formation.speed);
        let leader_position = leader_steering.position();
        let leader_yaw = leader_steering.yaw();
        let leader_speed = leader_steering.max_speed();

        let mut followers = Vec::with_capacity(layout.len());
        let mut grid_points = Vec::with_capacity(layout.len());
        for offset in layout.offsets() {
            let id = FollowerId::new(self.next_follower);
            self.next_follower = self.next_follower.wrapping_add(1);

            let point = GridPoint::bound(*offset, leader_position, leader_yaw);
            let mut controller = FollowerController::new();
            let mut steering = spawn_follower(id);
            match steering.as_deref_mut() {
                Some(body) => {
                    if teleport {
                        body.teleport(point.position());
                    }
                    body.set_yaw(leader_yaw);
                    controller.set_default_speed(body, formation.speed);
                }
                None => warn!("{id} spawned without a steering backend and will stay idle"),
            }
            controller.bind(id, out);

            followers.push(Follower {
                id,
                steering,
                controller,
            });
            grid_points.push(point);
        }

        self.followers = followers;
        self.grid_points = grid_points;
        self.visual_leader = layout.visual_leader();
        self.spawned = Some(formation);
        self.history_entries = self.size_history(
            &layout,
            formation.simulation_mode,
            leader_speed,
            &mut leader.controller,
            config,
            now,
        );

        info!(
            "spawned {} followers in {:?} formation",
            self.followers.len(),
            formation.style
        );
        out.push(Event::FormationSpawned {
            followers: self.followers.iter().map(|follower| follower.id).collect(),
            visual_leader: self.followers[self.visual_leader].id,
            history_entries: self.history_entries,
        });
    }

    pub(crate) fn change_formation_type(
        &mut self,
        formation: FormationType,
        leader: &mut LeaderAgent,
        config: &FormationConfig,
        now: f32,
        out: &mut Vec<Event>,
    ) {
        let Some(spawned) = self.spawned.filter(|_| !self.followers.is_empty()) else {
            warn!("formation change rejected: no roster spawned");
            out.push(Event::FormationRejected {
                reason: FormationError::EmptyRoster,
            });
            return;
        };

        let layout = layout(
            formation.style,
            self.followers.len(),
            spawned.spacing,
            formation.leader_z_offset,
        );
        if let Err(reason) = layout.validate() {
            warn!("formation change rejected: {reason}");
            out.push(Event::FormationRejected { reason });
            return;
        }

        let pose = leader
            .steering
            .as_deref()
            .map(|steering| (steering.position(), steering.yaw()));
        self.grid_points = layout
            .offsets()
            .iter()
            .map(|&offset| match pose {
                Some((position, yaw)) => GridPoint::bound(offset, position, yaw),
                None => GridPoint::new(offset),
            })
            .collect();
        self.visual_leader = layout.visual_leader();
        for follower in &mut self.followers {
            follower.rebind(out);
        }

        let current = FormationType {
            style: formation.style,
            leader_z_offset: formation.leader_z_offset,
            ..spawned
        };
        self.spawned = Some(current);

        let leader_speed = leader
            .steering
            .as_deref()
            .map_or(current.speed, |steering| steering.max_speed());
        self.history_entries = self.size_history(
            &layout,
            current.simulation_mode,
            leader_speed,
            &mut leader.controller,
            config,
            now,
        );

        if self.grid_points.len() < self.followers.len() {
            info!(
                "{} followers have no slot in {:?} formation",
                self.followers.len() - self.grid_points.len(),
                current.style
            );
        }
        out.push(Event::FormationChanged {
            style: current.style,
            visual_leader: self.followers[self.visual_leader].id,
            history_entries: self.history_entries,
        });
    }

    pub(crate) fn randomize_visual_leader<R: Rng>(&mut self, rng: &mut R, out: &mut Vec<Event>) {
        if self.followers.is_empty() {
            out.push(Event::FormationRejected {
                reason: FormationError::EmptyRoster,
            });
            return;
        }

        let chosen = rng.gen_range(0..self.followers.len());
        let slot = self.visual_leader;
        self.followers.swap(slot, chosen);
        for follower in &mut self.followers {
            follower.rebind(out);
        }

        let follower = self.followers[slot].id;
        info!("{follower} promoted to visual leader");
        out.push(Event::VisualLeaderChanged { follower, slot });
    }

    fn size_history(
        &self,
        layout: &FormationLayout,
        mode: SimulationMode,
        leader_speed: f32,
        leader: &mut LeaderController,
        config: &FormationConfig,
        now: f32,
    ) -> Option<usize> {
        match mode {
            SimulationMode::History => {
                let entries = required_history_entries(
                    layout.offsets(),
                    leader_speed,
                    config.sample_interval,
                    self.followers.len(),
                    config.max_history_entries,
                );
                leader.initialize(entries, now);
                Some(entries)
            }
            SimulationMode::Live => {
                leader.release_history();
                None
            }
        }
    }

    /// Resolves every grid point against the leader for the current tick.
    pub(crate) fn dispatch(
        &mut self,
        leader: &LeaderController,
        leader_steering: &dyn Steering,
        now: f32,
    ) {
        let state = leader.state();
        match self.simulation_mode() {
            SimulationMode::History => {
                let view = leader.view(leader_steering, now);
                let tail = self.tail_anchor(leader.tail());
                for point in self.grid_points.iter_mut().filter(|point| !point.reached()) {
                    match state {
                        MovementState::Moving => {
                            let _ = point.update_from_history(&view);
                        }
                        MovementState::ReachedDestination => {
                            match (point.has_history_data(), point.using_history_data()) {
                                (false, false) => {
                                    let _ = point.update_from_fake_history(&view);
                                }
                                (true, false) => {
                                    let _ = point.update_from_tail(&view, tail);
                                }
                                _ => {}
                            }
                        }
                        MovementState::None | MovementState::Idle => {}
                    }
                }
            }
            SimulationMode::Live => {
                if !matches!(
                    state,
                    MovementState::Moving | MovementState::ReachedDestination
                ) {
                    return;
                }
                let position = leader_steering.position();
                let yaw = leader_steering.yaw();
                for point in self.grid_points.iter_mut().filter(|point| !point.reached()) {
                    point.update_live_position(position, yaw);
                }
            }
        }
    }

    fn tail_anchor(&self, tail: FormationTail) -> TailAnchor {
        let FormationTail::Follower { slot } = tail else {
            return TailAnchor::Leader;
        };
        match (self.grid_points.get(slot), self.followers.get(slot)) {
            (Some(point), Some(follower)) => TailAnchor::Follower {
                offset: point.offset(),
                position: point.position(),
                velocity_magnitude: follower.controller.velocity_magnitude(),
            },
            _ => TailAnchor::Leader,
        }
    }

    /// Runs every follower bound to a grid point; the rest stay idle.
    pub(crate) fn update_followers(
        &mut self,
        leader: LeaderPose,
        config: &FormationConfig,
        dt: f32,
        out: &mut Vec<Event>,
    ) {
        for (follower, point) in self.followers.iter_mut().zip(self.grid_points.iter_mut()) {
            let Some(steering) = follower.steering.as_deref_mut() else {
                continue;
            };
            follower
                .controller
                .update(follower.id, steering, point, leader, config, dt, out);
        }
    }

    pub(crate) fn advance(&mut self, dt: f32) {
        for steering in self
            .followers
            .iter_mut()
            .filter_map(|follower| follower.steering.as_deref_mut())
        {
            steering.advance(dt);
        }
    }
}
