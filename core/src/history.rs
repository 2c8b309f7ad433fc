//! Fixed-capacity ring buffer of timestamped leader samples.

use glam::Vec3;

use crate::heading::lerp_yaw;

const MIN_SAMPLES_TO_INTERPOLATE: usize = 2;

/// Location of the leader recorded at a point in simulated time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocationSample {
    /// World position of the leader.
    pub position: Vec3,
    /// Heading of the leader in radians.
    pub yaw: f32,
    /// Simulated time, in seconds, at which the sample was taken.
    pub timestamp: f32,
}

impl LocationSample {
    /// Creates a new sample.
    #[must_use]
    pub const fn new(position: Vec3, yaw: f32, timestamp: f32) -> Self {
        Self {
            position,
            yaw,
            timestamp,
        }
    }
}

/// Overwrite-oldest ring buffer that keeps samples in insertion order.
#[derive(Clone, Debug)]
pub struct HistoryBuffer {
    slots: Vec<LocationSample>,
    capacity: usize,
    cursor: usize,
}

impl HistoryBuffer {
    /// Creates an empty buffer holding at most `capacity` samples (at least one).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            cursor: 0,
        }
    }

    /// Maximum number of retained samples.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of samples currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Reports whether no sample has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Reports whether the next insert overwrites the oldest sample.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.slots.len() == self.capacity
    }

    /// Records a sample, overwriting the oldest one once the buffer is full.
    pub fn insert(&mut self, sample: LocationSample) {
        if self.slots.len() < self.capacity {
            self.slots.push(sample);
        } else {
            self.slots[self.cursor] = sample;
        }
        self.cursor = (self.cursor + 1) % self.capacity;
    }

    /// Drops every retained sample while keeping the capacity.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.cursor = 0;
    }

    /// Chronologically oldest retained sample.
    #[must_use]
    pub fn oldest(&self) -> Option<LocationSample> {
        self.at(0)
    }

    /// Most recently recorded sample.
    #[must_use]
    pub fn newest(&self) -> Option<LocationSample> {
        self.slots.len().checked_sub(1).and_then(|last| self.at(last))
    }

    /// Iterator over retained samples from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = LocationSample> + '_ {
        (0..self.slots.len()).filter_map(move |index| self.at(index))
    }

    /// Interpolates the recorded trajectory at `target_time`.
    ///
    /// Scans adjacent pairs from newest to oldest and blends the first pair
    /// that brackets the requested time. Returns `None` when fewer than two
    /// samples exist or the time lies outside the recorded range.
    #[must_use]
    pub fn try_interpolate(&self, target_time: f32) -> Option<LocationSample> {
        if self.slots.len() < MIN_SAMPLES_TO_INTERPOLATE {
            return None;
        }

        for newer_index in (1..self.slots.len()).rev() {
            let newer = self.at(newer_index)?;
            let older = self.at(newer_index - 1)?;
            if older.timestamp <= target_time && target_time <= newer.timestamp {
                let span = newer.timestamp - older.timestamp;
                let t = if span > 0.0 {
                    ((target_time - older.timestamp) / span).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                return Some(LocationSample {
                    position: older.position.lerp(newer.position, t),
                    yaw: lerp_yaw(older.yaw, newer.yaw, t),
                    timestamp: target_time,
                });
            }
        }

        None
    }

    fn at(&self, chronological: usize) -> Option<LocationSample> {
        if chronological >= self.slots.len() {
            return None;
        }
        let index = if self.is_full() {
            (self.cursor + chronological) % self.capacity
        } else {
            chronological
        };
        self.slots.get(index).copied()
    }
}
