//! TOML scenario describing a patrol run.

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use formation_core::{FormationConfig, FormationStyle, FormationType};
use glam::Vec3;
use serde::Deserialize;
use thiserror::Error;

/// Reasons a scenario could not be loaded.
#[derive(Debug, Error)]
pub(crate) enum ScenarioError {
    /// The file could not be read.
    #[error("failed to read {}", path.display())]
    Read {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The file is not a valid scenario document.
    #[error("failed to parse {}", path.display())]
    Parse {
        /// File that was requested.
        path: PathBuf,
        /// Underlying TOML failure.
        #[source]
        source: toml::de::Error,
    },
    /// The patrol has nowhere to go.
    #[error("scenario lists no waypoints")]
    NoWaypoints,
    /// A waypoint contains a non-finite coordinate.
    #[error("waypoint {index} is not a finite point")]
    InvalidWaypoint {
        /// Position of the waypoint in the list.
        index: usize,
    },
    /// The tick length cannot advance the simulation.
    #[error("tick length {0} must be a positive number of seconds")]
    InvalidTick(f32),
}

/// Starting pose and path behaviour of the leader.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct LeaderSpec {
    pub(crate) position: Vec3,
    pub(crate) yaw: f32,
    pub(crate) path_latency: u32,
}

impl Default for LeaderSpec {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            yaw: 0.0,
            path_latency: 0,
        }
    }
}

/// Formation changes applied while patrolling.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct Schedule {
    /// Switches to the next style after this many arrivals; zero disables switching.
    pub(crate) change_every: u32,
    /// Styles cycled through on each switch.
    pub(crate) styles: Vec<FormationStyle>,
    /// Promotes a random follower to visual leader after every arrival.
    pub(crate) randomize_leader: bool,
}

/// Complete scenario document.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct Scenario {
    pub(crate) ticks: u64,
    pub(crate) tick_seconds: f32,
    pub(crate) report_every: u64,
    pub(crate) teleport: bool,
    pub(crate) waypoints: Vec<Vec3>,
    pub(crate) leader: LeaderSpec,
    pub(crate) formation: FormationType,
    pub(crate) schedule: Schedule,
    pub(crate) config: FormationConfig,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            ticks: 3_000,
            tick_seconds: 0.02,
            report_every: 50,
            teleport: true,
            waypoints: Vec::new(),
            leader: LeaderSpec::default(),
            formation: FormationType::default(),
            schedule: Schedule::default(),
            config: FormationConfig::default(),
        }
    }
}

impl Scenario {
    /// Reads and validates the scenario stored at `path`.
    pub(crate) fn load(path: &Path) -> Result<Self, ScenarioError> {
        let text = fs::read_to_string(path).map_err(|source| ScenarioError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let scenario: Self = toml::from_str(&text).map_err(|source| ScenarioError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> Result<(), ScenarioError> {
        if self.waypoints.is_empty() {
            return Err(ScenarioError::NoWaypoints);
        }
        if let Some(index) = self.waypoints.iter().position(|point| !point.is_finite()) {
            return Err(ScenarioError::InvalidWaypoint { index });
        }
        if !(self.tick_seconds.is_finite() && self.tick_seconds > 0.0) {
            return Err(ScenarioError::InvalidTick(self.tick_seconds));
        }
        Ok(())
    }

    /// Simulated time covered by one tick.
    pub(crate) fn tick(&self) -> Duration {
        Duration::from_secs_f32(self.tick_seconds)
    }
}
