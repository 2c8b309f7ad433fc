//! Straight-line synthetic trajectory for grid points the real path cannot cover.
//!
//! When the leader's path is shorter than the deepest offset in the formation,
//! the rear slots would never find a bracketing sample. The leader instead lays
//! out a line from where the rearmost history-capable slot will stand on
//! arrival to the destination, and backdates samples along it so the line ends
//! at the moment of arrival.

use formation_core::{
    heading::{rotate_offset, yaw_of},
    HistoryBuffer, LocationSample,
};
use glam::Vec3;

const MIN_SAMPLE_SPACING: f32 = 1.0e-3;
const STEP_TOLERANCE: f32 = 1.0e-3;

/// Endpoints and heading of a synthetic trajectory.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FakePath {
    start: Vec3,
    end: Vec3,
    yaw: f32,
}

impl FakePath {
    /// Lays out the line that ends at `destination`.
    ///
    /// `anchor_offset` is rotated to face along the leader's direction of
    /// travel and added to the destination to find the start of the line.
    #[must_use]
    pub fn compute(
        leader_position: Vec3,
        leader_yaw: f32,
        destination: Vec3,
        anchor_offset: Vec3,
    ) -> Self {
        let travel_yaw = yaw_of(destination - leader_position).unwrap_or(leader_yaw);
        let start = destination + rotate_offset(anchor_offset, travel_yaw);
        let yaw = yaw_of(destination - start).unwrap_or(travel_yaw);
        Self {
            start,
            end: destination,
            yaw,
        }
    }

    /// Start of the line.
    #[must_use]
    pub const fn start(&self) -> Vec3 {
        self.start
    }

    /// End of the line, the leader's destination.
    #[must_use]
    pub const fn end(&self) -> Vec3 {
        self.end
    }

    /// Heading carried by every synthetic sample.
    #[must_use]
    pub const fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Fills a buffer with samples spaced every `sample_spacing` seconds.
    ///
    /// The final sample sits on the destination and is stamped `now`; earlier
    /// samples are backdated by the time needed to cover the line at
    /// `max_speed`.
    #[must_use]
    pub fn synthesize(
        &self,
        now: f32,
        max_speed: f32,
        sample_spacing: f32,
        capacity: usize,
    ) -> HistoryBuffer {
        let spacing = sample_spacing.max(MIN_SAMPLE_SPACING);
        let distance = self.start.distance(self.end);
        let duration = if max_speed > 0.0 {
            (distance / max_speed).clamp(spacing, f32::MAX)
        } else {
            spacing
        };
        let span = duration + spacing;

        let mut buffer = HistoryBuffer::with_capacity(capacity);
        let steps = ((span / spacing - STEP_TOLERANCE).ceil() as usize)
            .min(buffer.capacity().saturating_sub(1));

        for step in (1..=steps).rev() {
            let back = step as f32 * spacing;
            let t = ((span - back) / duration).clamp(0.0, 1.0);
            buffer.insert(LocationSample::new(
                self.start.lerp(self.end, t),
                self.yaw,
                now - back,
            ));
        }
        buffer.insert(LocationSample::new(self.end, self.yaw, now));

        buffer
    }
}
