use std::time::Duration;

use formation_core::{
    Command, Event, FollowerId, FormationConfig, FormationError, FormationStyle, FormationTail,
    FormationType, MovementState, SimulationMode, Steering,
};
use formation_kinematic::KinematicAgent;
use formation_world::{self as world, query, World};
use glam::Vec3;

const TICK: Duration = Duration::from_millis(20);

fn world_with_leader(leader: KinematicAgent) -> World {
    World::new(
        FormationConfig::default(),
        Some(Box::new(leader)),
        Box::new(|_: FollowerId| {
            Some(Box::new(KinematicAgent::new(Vec3::ZERO)) as Box<dyn Steering>)
        }),
    )
}

fn apply(world: &mut World, command: Command) -> Vec<Event> {
    let mut events = Vec::new();
    world::apply(world, command, &mut events);
    events
}

fn run(world: &mut World, seconds: f32) -> Vec<Event> {
    let ticks = (seconds / TICK.as_secs_f32()).round() as usize;
    let mut events = Vec::new();
    for _ in 0..ticks {
        world::apply(world, Command::Tick { dt: TICK }, &mut events);
    }
    events
}

fn formation(style: FormationStyle, follower_count: u32, spacing: f32) -> FormationType {
    FormationType {
        style,
        follower_count,
        spacing,
        ..FormationType::default()
    }
}

fn count_arrivals(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, Event::FormationArrived))
        .count()
}

#[test]
fn short_path_column_falls_back_to_synthetic_history() {
    let mut world = world_with_leader(KinematicAgent::new(Vec3::ZERO));
    let _ = apply(
        &mut world,
        Command::SpawnFormation {
            formation: formation(FormationStyle::VerticalLine, 5, 10.0),
            teleport: true,
        },
    );
    let _ = apply(
        &mut world,
        Command::SetTarget {
            target: Some(Vec3::new(0.0, 0.0, 20.0)),
        },
    );

    let events = run(&mut world, 25.0);

    assert!(events.contains(&Event::HistoryReadinessResolved {
        path_distance: 20.0,
        missing_history: 3,
    }));
    assert!(events
        .iter()
        .any(|event| matches!(event, Event::FakeHistorySynthesized { .. })));
    assert!(events.contains(&Event::FormationTailSelected {
        tail: FormationTail::Follower { slot: 0 },
    }));
    assert_eq!(count_arrivals(&events), 1);

    let points = query::grid_points(&world);
    assert!(points[1].has_history_data());
    assert!(!points[4].has_history_data());
    assert!(points.iter().all(|point| point.is_resolved() && point.reached()));

    let leader = query::leader(&world);
    assert_eq!(leader.state, MovementState::ReachedDestination);
    assert_eq!(leader.position, Some(Vec3::new(0.0, 0.0, 20.0)));
    assert!(query::formation_arrived(&world));
    assert!(query::followers(&world)
        .iter()
        .all(|follower| follower.state == MovementState::ReachedDestination));
}

#[test]
fn wedge_replays_real_history_and_arrives_once() {
    let mut world = world_with_leader(KinematicAgent::new(Vec3::ZERO));
    let _ = apply(
        &mut world,
        Command::SpawnFormation {
            formation: formation(FormationStyle::Wedge, 5, 2.0),
            teleport: true,
        },
    );
    let _ = apply(
        &mut world,
        Command::SetTarget {
            target: Some(Vec3::new(0.0, 0.0, 40.0)),
        },
    );

    let events = run(&mut world, 20.0);

    assert!(events.contains(&Event::HistoryReadinessResolved {
        path_distance: 40.0,
        missing_history: 0,
    }));
    assert!(!events
        .iter()
        .any(|event| matches!(event, Event::FakeHistorySynthesized { .. })));
    assert_eq!(count_arrivals(&events), 1);

    for point in query::grid_points(&world) {
        assert!(point.using_history_data());
        assert!(point.reached());
    }
    for follower in query::followers(&world) {
        let position = follower.position.expect("follower has a body");
        assert!(position.z < 40.0, "{position:?} overtook the leader");
    }
}

#[test]
fn formation_change_at_rest_walks_followers_to_new_slots() {
    let mut world = world_with_leader(KinematicAgent::new(Vec3::ZERO));
    let _ = apply(
        &mut world,
        Command::SpawnFormation {
            formation: formation(FormationStyle::Wedge, 5, 2.0),
            teleport: true,
        },
    );
    let _ = apply(
        &mut world,
        Command::SetTarget {
            target: Some(Vec3::new(0.0, 0.0, 40.0)),
        },
    );
    assert_eq!(count_arrivals(&run(&mut world, 20.0)), 1);

    let changed = apply(
        &mut world,
        Command::ChangeFormationType {
            formation: FormationType {
                style: FormationStyle::HorizontalLine,
                leader_z_offset: 10.0,
                ..FormationType::default()
            },
        },
    );
    assert!(matches!(
        changed.last(),
        Some(Event::FormationChanged {
            style: FormationStyle::HorizontalLine,
            ..
        })
    ));
    assert!(!query::formation_arrived(&world));
    let leader_position = Vec3::new(0.0, 0.0, 40.0);
    for point in query::grid_points(&world) {
        assert!(point.is_resolved());
        assert!((point.position() - point.live_position(leader_position, 0.0)).length() < 1.0e-4);
    }

    let events = run(&mut world, 15.0);

    assert_eq!(count_arrivals(&events), 1);
    assert!(query::formation_arrived(&world));
    let points = query::grid_points(&world);
    for follower in query::followers(&world) {
        assert_eq!(follower.state, MovementState::ReachedDestination);
        let point = &points[follower.slot];
        assert!(point.reached());
        let position = follower.position.expect("follower has a body");
        assert!((position - point.position()).length() < 1.0e-3);
    }
}

#[test]
fn live_formation_tracks_the_leader_pose() {
    let mut world = world_with_leader(KinematicAgent::new(Vec3::ZERO));
    let _ = apply(
        &mut world,
        Command::SpawnFormation {
            formation: FormationType {
                simulation_mode: SimulationMode::Live,
                ..formation(FormationStyle::HorizontalLine, 3, 2.0)
            },
            teleport: true,
        },
    );
    assert_eq!(query::history_entries(&world), None);
    assert!(query::leader_controller(&world).history().is_none());

    let _ = apply(
        &mut world,
        Command::SetTarget {
            target: Some(Vec3::new(0.0, 0.0, 20.0)),
        },
    );
    let events = run(&mut world, 10.0);

    assert!(!events
        .iter()
        .any(|event| matches!(event, Event::HistoryReadinessResolved { .. })));
    assert_eq!(count_arrivals(&events), 1);

    let leader = query::leader(&world).position.expect("leader has a body");
    for (point, follower) in query::grid_points(&world)
        .iter()
        .zip(query::followers(&world))
    {
        let expected = point.live_position(leader, 0.0);
        let position = follower.position.expect("follower has a body");
        assert!(position.distance(expected) < 1.0e-3);
    }
}

#[test]
fn unresolved_path_distance_still_brings_the_formation_home() {
    let mut world = world_with_leader(KinematicAgent::new(Vec3::ZERO).with_path_latency(5));
    let _ = apply(
        &mut world,
        Command::SpawnFormation {
            formation: formation(FormationStyle::VerticalLine, 3, 2.0),
            teleport: true,
        },
    );
    let _ = apply(
        &mut world,
        Command::SetTarget {
            target: Some(Vec3::new(0.0, 0.0, 20.0)),
        },
    );

    let events = run(&mut world, 20.0);

    assert!(events.contains(&Event::HistoryReadinessFailed { attempts: 3 }));
    assert!(!events
        .iter()
        .any(|event| matches!(event, Event::HistoryReadinessResolved { .. })));
    assert_eq!(count_arrivals(&events), 1);
    assert!(query::grid_points(&world)
        .iter()
        .all(|point| !point.has_history_data() && point.reached()));
}

#[test]
fn new_target_restarts_the_formation() {
    let mut world = world_with_leader(KinematicAgent::new(Vec3::ZERO));
    let _ = apply(
        &mut world,
        Command::SpawnFormation {
            formation: formation(FormationStyle::Wedge, 3, 2.0),
            teleport: true,
        },
    );
    let _ = apply(
        &mut world,
        Command::SetTarget {
            target: Some(Vec3::new(0.0, 0.0, 20.0)),
        },
    );
    let first = run(&mut world, 15.0);
    assert_eq!(count_arrivals(&first), 1);

    let _ = apply(
        &mut world,
        Command::SetTarget {
            target: Some(Vec3::new(20.0, 0.0, 20.0)),
        },
    );
    let second = run(&mut world, 0.02);
    assert!(second.contains(&Event::LeaderStateChanged {
        from: MovementState::ReachedDestination,
        to: MovementState::Moving,
    }));
    assert!(!query::formation_arrived(&world));
    assert!(query::grid_points(&world)
        .iter()
        .all(|point| !point.is_resolved() && !point.reached()));

    let third = run(&mut world, 20.0);
    assert_eq!(count_arrivals(&third), 1);
    assert_eq!(
        query::leader(&world).position,
        Some(Vec3::new(20.0, 0.0, 20.0))
    );
}

#[test]
fn cleared_target_pauses_the_leader() {
    let mut world = world_with_leader(KinematicAgent::new(Vec3::ZERO));
    let _ = apply(
        &mut world,
        Command::SpawnFormation {
            formation: formation(FormationStyle::Wedge, 3, 2.0),
            teleport: true,
        },
    );

    let events = run(&mut world, 1.0);

    assert!(!events
        .iter()
        .any(|event| matches!(event, Event::LeaderStateChanged { .. })));
    assert_eq!(query::leader(&world).state, MovementState::None);
    assert_eq!(query::leader(&world).position, Some(Vec3::ZERO));
}

#[test]
fn spawning_without_followers_is_rejected() {
    let mut world = world_with_leader(KinematicAgent::new(Vec3::ZERO));

    let events = apply(
        &mut world,
        Command::SpawnFormation {
            formation: formation(FormationStyle::Wedge, 0, 2.0),
            teleport: true,
        },
    );

    assert_eq!(
        events,
        vec![Event::FormationRejected {
            reason: FormationError::EmptyLayout,
        }]
    );
    assert!(query::followers(&world).is_empty());
}
