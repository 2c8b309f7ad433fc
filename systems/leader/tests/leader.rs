use std::collections::VecDeque;

use formation_core::{
    Event, FormationConfig, FormationTail, GridPoint, MovementState, SimulationMode, Steering,
};
use formation_system_leader::{HistoryReadiness, LeaderController, TickContext};
use glam::Vec3;

#[derive(Debug)]
struct ScriptedSteering {
    position: Vec3,
    yaw: f32,
    velocity: Vec3,
    max_speed: f32,
    destination: Option<Vec3>,
    distances: VecDeque<Option<f32>>,
    reached: bool,
    stopped: bool,
}

impl ScriptedSteering {
    fn new(distances: &[Option<f32>]) -> Self {
        Self {
            position: Vec3::ZERO,
            yaw: 0.0,
            velocity: Vec3::ZERO,
            max_speed: 5.0,
            destination: None,
            distances: distances.iter().copied().collect(),
            reached: false,
            stopped: true,
        }
    }
}

impl Steering for ScriptedSteering {
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
        self.velocity
    }

    fn max_speed(&self) -> f32 {
        self.max_speed
    }

    fn set_max_speed(&mut self, speed: f32) {
        self.max_speed = speed;
    }

    fn set_destination(&mut self, destination: Option<Vec3>) {
        self.destination = destination;
    }

    fn remaining_distance(&mut self, _destination: Vec3) -> Option<f32> {
        self.distances.pop_front().flatten()
    }

    fn reached_destination(&self) -> bool {
        self.reached
    }

    fn has_path(&self) -> bool {
        self.destination.is_some()
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

    fn set_rotation_enabled(&mut self, _enabled: bool) {}

    fn end_reached_distance(&self) -> f32 {
        0.2
    }

    fn advance(&mut self, _dt: f32) {}
}

const TARGET: Vec3 = Vec3::new(0.0, 0.0, 20.0);

fn column() -> Vec<GridPoint> {
    (1..=5)
        .map(|index| GridPoint::new(Vec3::new(0.0, 0.0, -10.0 * index as f32)))
        .collect()
}

fn tick(
    controller: &mut LeaderController,
    steering: &mut ScriptedSteering,
    grid_points: &mut [GridPoint],
    config: &FormationConfig,
    now: f32,
) -> Vec<Event> {
    let mut events = Vec::new();
    controller.measure_velocity(steering);
    controller.sample_history(steering, now, config);
    controller.update(
        steering,
        grid_points,
        TickContext {
            now,
            target: TARGET,
            mode: SimulationMode::History,
            config,
        },
        &mut events,
    );
    events
}

#[test]
fn departure_resolves_readiness_and_plans_synthetic_path() {
    let config = FormationConfig::default();
    let mut controller = LeaderController::new();
    controller.initialize(300, 0.0);
    let mut steering = ScriptedSteering::new(&[Some(20.0), Some(20.0)]);
    let mut points = column();

    let events = tick(&mut controller, &mut steering, &mut points, &config, 0.0);

    assert_eq!(
        events,
        vec![
            Event::LeaderStateChanged {
                from: MovementState::None,
                to: MovementState::Moving,
            },
            Event::HistoryReadinessResolved {
                path_distance: 20.0,
                missing_history: 3,
            },
        ]
    );
    assert!(!steering.stopped);
    assert_eq!(steering.destination, Some(TARGET));
    assert_eq!(
        controller.readiness(),
        HistoryReadiness::Resolved {
            path_distance: 20.0
        }
    );

    let flags: Vec<bool> = points.iter().map(GridPoint::has_history_data).collect();
    assert_eq!(flags, vec![true, true, false, false, false]);

    // Anchored on the slot 20 units back, so the line starts where the leader stands.
    let path = controller.fake_path().expect("synthetic path planned");
    assert!(path.start().length() < 1.0e-4);
    assert_eq!(path.end(), TARGET);
}

#[test]
fn leader_ignores_targets_inside_chase_distance() {
    let config = FormationConfig::default();
    let mut controller = LeaderController::new();
    let mut steering = ScriptedSteering::new(&[Some(1.0)]);
    let mut points = column();

    let events = tick(&mut controller, &mut steering, &mut points, &config, 0.0);

    assert!(events.is_empty());
    assert_eq!(controller.state(), MovementState::None);
    assert!(steering.stopped);
}

#[test]
fn unresolved_path_fails_after_configured_attempts() {
    let config = FormationConfig::default();
    let mut controller = LeaderController::new();
    controller.initialize(300, 0.0);
    let mut steering = ScriptedSteering::new(&[Some(20.0), None, None, None]);
    let mut points = column();

    let mut events = Vec::new();
    for step in 0..3 {
        events.extend(tick(
            &mut controller,
            &mut steering,
            &mut points,
            &config,
            step as f32 * 0.02,
        ));
    }

    assert_eq!(controller.readiness(), HistoryReadiness::Failed);
    assert!(events.contains(&Event::HistoryReadinessFailed { attempts: 3 }));
    assert!(points.iter().all(|point| !point.has_history_data()));

    let path = controller.fake_path().expect("fallback path planned");
    assert_eq!(path.start(), TARGET);
}

#[test]
fn arrival_synthesizes_history_and_selects_tail() {
    let config = FormationConfig::default();
    let mut controller = LeaderController::new();
    controller.initialize(300, 0.0);
    let mut steering = ScriptedSteering::new(&[Some(20.0), Some(20.0)]);
    let mut points = column();
    let _ = tick(&mut controller, &mut steering, &mut points, &config, 0.0);

    steering.velocity = Vec3::new(0.0, 0.0, 5.0);
    steering.reached = true;
    let events = tick(&mut controller, &mut steering, &mut points, &config, 3.0);
    assert!(events.is_empty(), "still moving while velocity is non-zero");

    steering.velocity = Vec3::ZERO;
    steering.position = TARGET;
    let events = tick(&mut controller, &mut steering, &mut points, &config, 4.0);

    assert_eq!(events.len(), 3);
    assert_eq!(
        events[0],
        Event::LeaderStateChanged {
            from: MovementState::Moving,
            to: MovementState::ReachedDestination,
        }
    );
    assert!(matches!(events[1], Event::FakeHistorySynthesized { samples } if samples > 2));
    assert_eq!(
        events[2],
        Event::FormationTailSelected {
            tail: FormationTail::Leader
        }
    );

    assert!(steering.stopped);
    assert_eq!(controller.average_velocity(), 0.0);
    assert_eq!(controller.velocity_magnitude(), 0.0);
    assert!(controller.fake_path().is_none());

    let fake = controller.fake_history().expect("synthetic history written");
    let newest = fake.newest().expect("synthetic history has samples");
    assert_eq!(newest.position, TARGET);
    assert_eq!(newest.timestamp, 4.0);
}

#[test]
fn sampling_tracks_average_velocity_while_moving() {
    let config = FormationConfig {
        sample_interval: 0.25,
        ..FormationConfig::default()
    };
    let mut controller = LeaderController::new();
    controller.initialize(16, 0.0);
    let mut steering = ScriptedSteering::new(&[Some(20.0), Some(20.0)]);
    let mut points = column();
    let _ = tick(&mut controller, &mut steering, &mut points, &config, 0.0);

    for step in 1..=3 {
        let now = step as f32 * 0.25;
        steering.position = Vec3::new(0.0, 0.0, now * 5.0);
        controller.sample_history(&steering, now, &config);
    }

    let history = controller.history().expect("history initialised");
    assert_eq!(history.len(), 3);
    assert!((controller.average_velocity() - 5.0).abs() < 1.0e-4);
    assert_eq!(history.newest().map(|sample| sample.timestamp), Some(0.75));
}

#[test]
fn departure_resets_grid_points() {
    let config = FormationConfig::default();
    let mut controller = LeaderController::new();
    controller.initialize(300, 0.0);
    let mut steering = ScriptedSteering::new(&[Some(20.0), None]);
    let mut points = column();
    for point in &mut points {
        point.update_live_position(Vec3::ZERO, 0.0);
        point.mark_reached();
    }

    let _ = tick(&mut controller, &mut steering, &mut points, &config, 0.0);

    assert!(points
        .iter()
        .all(|point| !point.is_resolved() && !point.reached()));
}

#[test]
fn arrival_waits_for_pending_readiness() {
    let config = FormationConfig::default();
    let mut controller = LeaderController::new();
    controller.initialize(300, 0.0);
    let mut steering = ScriptedSteering::new(&[Some(20.0), None, None, Some(0.0), Some(20.0)]);
    let mut points = column();

    let _ = tick(&mut controller, &mut steering, &mut points, &config, 0.0);
    steering.reached = true;
    let arrival = tick(&mut controller, &mut steering, &mut points, &config, 0.02);

    assert_eq!(controller.state(), MovementState::ReachedDestination);
    assert!(controller.readiness().is_pending());
    assert!(!arrival
        .iter()
        .any(|event| matches!(event, Event::FormationTailSelected { .. })));

    let settled = tick(&mut controller, &mut steering, &mut points, &config, 0.04);

    assert!(!controller.readiness().is_pending());
    assert_eq!(
        settled
            .iter()
            .filter(|event| matches!(event, Event::FormationTailSelected { .. }))
            .count(),
        1
    );
    assert!(settled
        .iter()
        .any(|event| matches!(event, Event::FakeHistorySynthesized { .. })));
    assert!(controller.fake_history().is_some());
}

#[test]
fn restart_supersedes_pending_readiness() {
    let config = FormationConfig::default();
    let mut controller = LeaderController::new();
    controller.initialize(300, 0.0);
    let mut steering = ScriptedSteering::new(&[Some(20.0), None, None, Some(30.0), Some(30.0)]);
    let mut points = column();

    let _ = tick(&mut controller, &mut steering, &mut points, &config, 0.0);
    steering.reached = true;
    let arrival = tick(&mut controller, &mut steering, &mut points, &config, 0.02);
    assert_eq!(controller.state(), MovementState::ReachedDestination);
    assert!(!arrival
        .iter()
        .any(|event| matches!(event, Event::FakeHistorySynthesized { .. })));

    steering.reached = false;
    let restart = tick(&mut controller, &mut steering, &mut points, &config, 0.04);

    assert_eq!(controller.state(), MovementState::Moving);
    assert_eq!(
        controller.readiness(),
        HistoryReadiness::Resolved {
            path_distance: 30.0
        }
    );
    assert!(!restart
        .iter()
        .any(|event| matches!(event, Event::HistoryReadinessFailed { .. })));
    assert!(controller.fake_history().is_none());
}

#[test]
fn live_mode_skips_history_readiness() {
    let config = FormationConfig::default();
    let mut controller = LeaderController::new();
    let mut steering = ScriptedSteering::new(&[Some(20.0)]);
    let mut points = column();
    let mut events = Vec::new();

    controller.update(
        &mut steering,
        &mut points,
        TickContext {
            now: 0.0,
            target: TARGET,
            mode: SimulationMode::Live,
            config: &config,
        },
        &mut events,
    );

    assert_eq!(controller.state(), MovementState::Moving);
    assert_eq!(controller.readiness(), HistoryReadiness::Idle);
    assert!(controller.history().is_none());
}
