//! Canvas placement for imported nodes.

use crate::Position;
use crate::primitives::{
    DEFAULT_COLUMNS_PER_ROW, DEFAULT_HORIZONTAL_SPACING, DEFAULT_JITTER_X, DEFAULT_JITTER_Y,
    DEFAULT_VERTICAL_SPACING, MATERIAL_GROUP_SPREAD,
};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Grid parameters for import layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub columns_per_row: usize,
    pub horizontal_spacing: f64,
    pub vertical_spacing: f64,
    pub jitter_x: f64,
    pub jitter_y: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            columns_per_row: DEFAULT_COLUMNS_PER_ROW,
            horizontal_spacing: DEFAULT_HORIZONTAL_SPACING,
            vertical_spacing: DEFAULT_VERTICAL_SPACING,
            jitter_x: DEFAULT_JITTER_X,
            jitter_y: DEFAULT_JITTER_Y,
        }
    }
}

impl LayoutConfig {
    fn columns(&self) -> usize {
        self.columns_per_row.max(1)
    }

    fn jitter<R: Rng + ?Sized>(&self, rng: &mut R) -> (f64, f64) {
        (spread(rng, self.jitter_x), spread(rng, self.jitter_y))
    }
}

fn spread<R: Rng + ?Sized>(rng: &mut R, amplitude: f64) -> f64 {
    let amplitude = amplitude.abs();
    if amplitude > 0.0 {
        rng.gen_range(-amplitude..=amplitude)
    } else {
        0.0
    }
}

/// Row-major grid centred horizontally on `origin`, starting one row above it.
pub fn grid_positions<R: Rng + ?Sized>(
    count: usize,
    origin: Position,
    config: &LayoutConfig,
    rng: &mut R,
) -> Vec<Position> {
    let columns = config.columns();
    let left = origin.x - (columns - 1) as f64 * config.horizontal_spacing / 2.0;
    let top = origin.y - config.vertical_spacing;

    (0..count)
        .map(|i| {
            let (row, col) = (i / columns, i % columns);
            let (jx, jy) = config.jitter(rng);
            Position::new(
                left + col as f64 * config.horizontal_spacing + jx,
                top + row as f64 * config.vertical_spacing + jy,
            )
        })
        .collect()
}

/// Vertical columns, one per group, spread horizontally around `origin`.
///
/// `groups[i]` is the group index of item `i`; `group_count` is the number of
/// distinct groups.
pub fn clustered_positions<R: Rng + ?Sized>(
    groups: &[usize],
    group_count: usize,
    origin: Position,
    config: &LayoutConfig,
    rng: &mut R,
) -> Vec<Position> {
    let centre = group_count.saturating_sub(1) as f64 / 2.0;
    let step = config.vertical_spacing / 1.5;
    let top = origin.y - config.vertical_spacing * 2.5;
    let mut filled = vec![0usize; group_count.max(1)];

    groups
        .iter()
        .map(|&group| {
            let slot = filled.get(group).copied().unwrap_or(0);
            if let Some(count) = filled.get_mut(group) {
                *count += 1;
            }
            let offset = (group as f64 - centre) * config.horizontal_spacing * MATERIAL_GROUP_SPREAD;
            let (jx, jy) = config.jitter(rng);
            Position::new(origin.x + offset + jx, top + slot as f64 * step + jy)
        })
        .collect()
}

/// Where the synthetic final product of a BOM import sits.
#[must_use]
pub fn final_product_position(origin: Position, config: &LayoutConfig) -> Position {
    Position::new(origin.x, origin.y + config.vertical_spacing * 3.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn still() -> LayoutConfig {
        LayoutConfig {
            jitter_x: 0.0,
            jitter_y: 0.0,
            ..LayoutConfig::default()
        }
    }

    #[test]
    fn grid_wraps_rows() {
        let mut rng = StdRng::seed_from_u64(1);
        let positions = grid_positions(4, Position::new(0.0, 0.0), &still(), &mut rng);
        assert_eq!(positions[0], Position::new(-300.0, -250.0));
        assert_eq!(positions[2], Position::new(300.0, -250.0));
        assert_eq!(positions[3], Position::new(-300.0, 0.0));
    }

    #[test]
    fn jitter_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let config = LayoutConfig::default();
        for p in grid_positions(30, Position::new(0.0, 0.0), &config, &mut rng) {
            let col_x = [-300.0, 0.0, 300.0]
                .iter()
                .map(|c: &f64| (p.x - c).abs())
                .fold(f64::MAX, f64::min);
            assert!(col_x <= config.jitter_x);
        }
    }

    #[test]
    fn clusters_offset_by_group() {
        let mut rng = StdRng::seed_from_u64(1);
        let positions =
            clustered_positions(&[0, 1, 0], 2, Position::new(0.0, 0.0), &still(), &mut rng);
        assert!((positions[0].x + 225.0).abs() < 1e-9);
        assert!((positions[1].x - 225.0).abs() < 1e-9);
        assert!(positions[2].y > positions[0].y);
    }
}
