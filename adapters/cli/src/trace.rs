//! Periodic position trace printed while the scenario runs.

use std::io::Write;

use anyhow::Result;
use clap::ValueEnum;
use formation_core::MovementState;
use formation_world::{query, World};
use glam::Vec3;
use serde::Serialize;

/// Output encoding of the trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum TraceFormat {
    /// Human readable summary lines.
    Text,
    /// One JSON document per line.
    Json,
}

#[derive(Clone, Copy, Debug, Serialize)]
struct FollowerTrace {
    id: u32,
    position: Option<Vec3>,
    state: MovementState,
}

/// Snapshot of the formation at one reporting tick.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct TraceLine {
    tick: u64,
    time: f32,
    leader: Option<Vec3>,
    leader_state: MovementState,
    visual_leader: Option<u32>,
    arrived: bool,
    followers: Vec<FollowerTrace>,
}

impl TraceLine {
    pub(crate) fn capture(world: &World, tick: u64) -> Self {
        let leader = query::leader(world);
        Self {
            tick,
            time: query::clock(world).as_secs_f32(),
            leader: leader.position,
            leader_state: leader.state,
            visual_leader: query::visual_leader(world).map(|id| id.get()),
            arrived: query::formation_arrived(world),
            followers: query::followers(world)
                .into_iter()
                .map(|follower| FollowerTrace {
                    id: follower.id.get(),
                    position: follower.position,
                    state: follower.state,
                })
                .collect(),
        }
    }

    pub(crate) fn write(&self, format: TraceFormat, out: &mut impl Write) -> Result<()> {
        match format {
            TraceFormat::Json => {
                serde_json::to_writer(&mut *out, self)?;
                writeln!(out)?;
            }
            TraceFormat::Text => writeln!(out, "{}", self.summary())?,
        }
        Ok(())
    }

    fn summary(&self) -> String {
        let total = self.followers.len();
        let count = |state: MovementState| {
            self.followers
                .iter()
                .filter(|follower| follower.state == state)
                .count()
        };
        let leader = self.leader.map_or_else(
            || "-".to_owned(),
            |position| format!("({:.2}, {:.2}, {:.2})", position.x, position.y, position.z),
        );
        format!(
            "tick {:>6} t={:>7.2}s leader={leader} {:?} moving={}/{total} reached={}/{total}{}",
            self.tick,
            self.time,
            self.leader_state,
            count(MovementState::Moving),
            count(MovementState::ReachedDestination),
            if self.arrived { " arrived" } else { "" },
        )
    }
}
