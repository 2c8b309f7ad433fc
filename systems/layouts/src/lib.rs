#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure formation-shape generators.
//!
//! Every style maps a follower count and spacing onto local offsets relative
//! to the leader's facing (`+z` forward, `+x` right) and names the slot that
//! hosts the visual leader. Generators are deterministic so re-applying the
//! same style to the same roster always produces the same layout.

use std::f32::consts::PI;

use formation_core::{FormationLayout, FormationStyle, FormationType};
use glam::Vec3;

/// Generates the layout for a formation using its own follower count.
#[must_use]
pub fn layout_for(formation: &FormationType) -> FormationLayout {
    layout(
        formation.style,
        formation.follower_count as usize,
        formation.spacing,
        formation.leader_z_offset,
    )
}

/// Generates offsets and the visual leader slot for `style`.
#[must_use]
pub fn layout(
    style: FormationStyle,
    follower_count: usize,
    spacing: f32,
    leader_z_offset: f32,
) -> FormationLayout {
    if follower_count == 0 {
        return FormationLayout::new(Vec::new(), 0);
    }

    match style {
        FormationStyle::VerticalLine => {
            FormationLayout::new(vertical_line(follower_count, spacing), 0)
        }
        FormationStyle::HorizontalLine => FormationLayout::new(
            horizontal_line(follower_count, spacing, leader_z_offset),
            follower_count / 2,
        ),
        FormationStyle::Wedge => {
            FormationLayout::new(wedge(follower_count, spacing, leader_z_offset), 0)
        }
        FormationStyle::Triangle => {
            FormationLayout::new(triangle(follower_count, spacing, leader_z_offset), 0)
        }
        FormationStyle::Arc { arc_angle_degrees } => FormationLayout::new(
            arc(follower_count, spacing, leader_z_offset, arc_angle_degrees),
            follower_count / 2,
        ),
        FormationStyle::Circle => {
            FormationLayout::new(circle(follower_count, spacing, leader_z_offset), 0)
        }
        FormationStyle::Matrix {
            columns,
            leader_row,
            fill,
        } => matrix(follower_count, spacing, columns, leader_row, fill),
        FormationStyle::ShieldWall => {
            let offsets = shield_wall(follower_count, spacing);
            let visual_leader = offsets.len().saturating_sub(1);
            FormationLayout::new(offsets, visual_leader)
        }
    }
}

fn vertical_line(count: usize, spacing: f32) -> Vec<Vec3> {
    (0..count)
        .map(|index| Vec3::new(0.0, 0.0, -spacing * (index + 1) as f32))
        .collect()
}

fn centered_row(count: usize, spacing: f32, z: f32) -> Vec<Vec3> {
    let half = (count / 2) as f32;
    let nudge = if count % 2 == 0 { spacing / 2.0 } else { 0.0 };
    (0..count)
        .map(|index| Vec3::new((index as f32 - half) * spacing + nudge, 0.0, z))
        .collect()
}

fn horizontal_line(count: usize, spacing: f32, leader_z_offset: f32) -> Vec<Vec3> {
    centered_row(count, spacing, -leader_z_offset)
}

fn wedge(count: usize, spacing: f32, leader_z_offset: f32) -> Vec<Vec3> {
    let mut offsets = Vec::with_capacity(count);
    offsets.push(Vec3::new(0.0, 0.0, -leader_z_offset));

    for index in 0..count - 1 {
        let pair = (index / 2 + 1) as f32;
        let side = if index % 2 == 0 { -1.0 } else { 1.0 };
        offsets.push(Vec3::new(
            side * pair * spacing,
            0.0,
            -pair * spacing - leader_z_offset,
        ));
    }

    offsets
}

fn triangle(count: usize, spacing: f32, leader_z_offset: f32) -> Vec<Vec3> {
    let mut offsets = Vec::with_capacity(count);
    offsets.push(Vec3::new(0.0, 0.0, -leader_z_offset));

    let mut row = 1usize;
    while offsets.len() < count {
        let units = row + 1;
        let z = -(row as f32) * spacing - leader_z_offset;
        let width = (units - 1) as f32 * spacing;
        for index in 0..units {
            if offsets.len() >= count {
                break;
            }
            offsets.push(Vec3::new(-width / 2.0 + index as f32 * spacing, 0.0, z));
        }
        row += 1;
    }

    offsets
}

fn arc(count: usize, spacing: f32, leader_z_offset: f32, arc_angle_degrees: f32) -> Vec<Vec3> {
    let arc_radians = arc_angle_degrees.to_radians();
    if count == 1 || arc_radians <= f32::EPSILON {
        return centered_row(count, spacing, -spacing - leader_z_offset);
    }

    let radius = spacing * (count - 1) as f32 / arc_radians;
    let start = -arc_radians / 2.0;
    let step = arc_radians / (count - 1) as f32;

    (0..count)
        .map(|index| {
            let angle = start + step * index as f32;
            Vec3::new(
                angle.sin() * radius,
                0.0,
                angle.cos() * radius - spacing - leader_z_offset,
            )
        })
        .collect()
}

fn circle(count: usize, spacing: f32, leader_z_offset: f32) -> Vec<Vec3> {
    let radius = count as f32 * spacing / PI;
    (0..count)
        .map(|index| {
            let angle = index as f32 * 2.0 * PI / count as f32;
            Vec3::new(
                radius * angle.sin(),
                0.0,
                -radius + radius * angle.cos() - leader_z_offset,
            )
        })
        .collect()
}

fn matrix(
    count: usize,
    spacing: f32,
    columns: u32,
    leader_row: u32,
    fill: bool,
) -> FormationLayout {
    let columns = columns.max(1) as usize;
    let half_columns = (columns - 1) / 2;
    let row_count = count / columns;

    let mut offsets = Vec::with_capacity(count);
    for index in 0..count {
        let row = index / columns;
        let column = index % columns;

        if !fill {
            let border = row == 0
                || row + 1 == row_count
                || column == 0
                || column + 1 == columns;
            if !border {
                continue;
            }
        }

        let x = (column as f32 - half_columns as f32) * spacing;
        let z = -((row + 1) as f32) * spacing;
        offsets.push(Vec3::new(x, 0.0, z));
    }

    let raw = leader_row as usize * columns + half_columns;
    let visual_leader = raw.min(offsets.len().saturating_sub(1));
    FormationLayout::new(offsets, visual_leader)
}

fn shield_wall(count: usize, spacing: f32) -> Vec<Vec3> {
    let front_rank = count - 1;
    let mut offsets = centered_row(front_rank, spacing, -spacing);
    let last_z = offsets.last().map_or(-spacing, |offset| offset.z);
    offsets.push(Vec3::new(0.0, 0.0, last_z - spacing));
    offsets
}
