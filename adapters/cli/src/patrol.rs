//! Waypoint loop issuing follow-up commands whenever the formation arrives.

use formation_core::{Command, Event, FormationType};
use glam::Vec3;
use log::info;

use crate::scenario::Schedule;

/// Cycles the leader through waypoints and applies the formation schedule.
#[derive(Clone, Debug)]
pub(crate) struct Patrol {
    waypoints: Vec<Vec3>,
    next_waypoint: usize,
    arrivals: u32,
    formation: FormationType,
    schedule: Schedule,
    next_style: usize,
}

impl Patrol {
    pub(crate) fn new(waypoints: Vec<Vec3>, formation: FormationType, schedule: Schedule) -> Self {
        Self {
            waypoints,
            next_waypoint: 0,
            arrivals: 0,
            formation,
            schedule,
            next_style: 0,
        }
    }

    /// Number of arrivals observed so far.
    pub(crate) const fn arrivals(&self) -> u32 {
        self.arrivals
    }

    /// Command sending the leader to the next waypoint.
    pub(crate) fn advance(&mut self) -> Option<Command> {
        let target = *self.waypoints.get(self.next_waypoint)?;
        self.next_waypoint = (self.next_waypoint + 1) % self.waypoints.len();
        Some(Command::SetTarget {
            target: Some(target),
        })
    }

    /// Queues the commands that follow the events of one tick.
    pub(crate) fn observe(&mut self, events: &[Event], commands: &mut Vec<Command>) {
        for event in events {
            if !matches!(event, Event::FormationArrived) {
                continue;
            }
            self.arrivals += 1;
            info!("arrival #{}", self.arrivals);

            if let Some(formation) = self.scheduled_change() {
                commands.push(Command::ChangeFormationType { formation });
            }
            if self.schedule.randomize_leader {
                commands.push(Command::RandomizeVisualLeader);
            }
            commands.extend(self.advance());
        }
    }

    fn scheduled_change(&mut self) -> Option<FormationType> {
        let every = self.schedule.change_every;
        if every == 0 || self.arrivals % every != 0 {
            return None;
        }
        let style = *self.schedule.styles.get(self.next_style)?;
        self.next_style = (self.next_style + 1) % self.schedule.styles.len();
        self.formation.style = style;
        Some(self.formation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formation_core::FormationStyle;

    fn target(command: &Command) -> Option<Vec3> {
        match command {
            Command::SetTarget { target } => *target,
            _ => None,
        }
    }

    #[test]
    fn waypoints_cycle_on_arrival() {
        let a = Vec3::new(0.0, 0.0, 10.0);
        let b = Vec3::new(10.0, 0.0, 10.0);
        let mut patrol = Patrol::new(vec![a, b], FormationType::default(), Schedule::default());
        let mut commands = Vec::new();

        assert_eq!(patrol.advance().as_ref().and_then(target), Some(a));
        patrol.observe(&[Event::FormationArrived], &mut commands);
        patrol.observe(&[Event::FormationArrived], &mut commands);

        let targets: Vec<Option<Vec3>> = commands.iter().map(target).collect();
        assert_eq!(targets, vec![Some(b), Some(a)]);
        assert_eq!(patrol.arrivals(), 2);
    }

    #[test]
    fn schedule_switches_styles_and_randomizes() {
        let schedule = Schedule {
            change_every: 2,
            styles: vec![FormationStyle::Circle, FormationStyle::Triangle],
            randomize_leader: true,
        };
        let mut patrol = Patrol::new(vec![Vec3::Z], FormationType::default(), schedule);
        let mut commands = Vec::new();

        patrol.observe(&[Event::FormationArrived], &mut commands);
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0], Command::RandomizeVisualLeader);

        commands.clear();
        patrol.observe(&[Event::FormationArrived], &mut commands);
        assert!(matches!(
            commands[0],
            Command::ChangeFormationType {
                formation: FormationType {
                    style: FormationStyle::Circle,
                    ..
                }
            }
        ));
        assert_eq!(commands.len(), 3);
    }
}
