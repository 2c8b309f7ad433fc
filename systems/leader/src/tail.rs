//! Rear-to-front queries over the grid point roster.

use formation_core::{FormationTail, GridPoint};

/// Slots ordered from the rearmost grid point to the front.
///
/// Depth is the magnitude of the z offset; ties prefer the higher slot.
#[must_use]
pub fn rear_to_front(grid_points: &[GridPoint]) -> Vec<usize> {
    let mut slots: Vec<usize> = (0..grid_points.len()).collect();
    slots.sort_by(|&a, &b| {
        let depth_a = grid_points[a].offset().z.abs();
        let depth_b = grid_points[b].offset().z.abs();
        depth_b.total_cmp(&depth_a).then(b.cmp(&a))
    });
    slots
}

/// Picks the rearmost grid point that both can and does replay real history.
#[must_use]
pub fn select_tail(grid_points: &[GridPoint]) -> FormationTail {
    rear_to_front(grid_points)
        .into_iter()
        .find(|&slot| {
            let point = &grid_points[slot];
            point.has_history_data() && point.using_history_data()
        })
        .map_or(FormationTail::Leader, |slot| FormationTail::Follower { slot })
}

/// Rearmost grid point whose offset is covered by the real path.
#[must_use]
pub fn rearmost_with_history(grid_points: &[GridPoint]) -> Option<usize> {
    rear_to_front(grid_points)
        .into_iter()
        .find(|&slot| grid_points[slot].has_history_data())
}

/// Flags every grid point whose depth fits within `path_distance`.
///
/// Returns the number of grid points that cannot rely on real history.
pub fn flag_history_coverage(grid_points: &mut [GridPoint], path_distance: f32) -> usize {
    let mut missing = 0;
    for point in grid_points.iter_mut() {
        let covered = point.offset().z.abs() <= path_distance;
        point.set_has_history_data(covered);
        if !covered {
            missing += 1;
        }
    }
    missing
}
