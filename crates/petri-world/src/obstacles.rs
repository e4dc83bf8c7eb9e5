//! Obstacle layout presets.
//!
//! A preset expands into the list of tiles to block on a given grid. Presets
//! are painted in one bounded synchronous pass by the grid.

use std::str::FromStr;

use petri_types::Position;
use rand::Rng;
use serde::Deserialize;

use crate::error::WorldError;

/// Share of tiles blocked by [`ObstaclePreset::Scatter`].
const SCATTER_DENSITY: f64 = 0.05;

/// Spacing between corridor walls.
const CORRIDOR_SPACING: usize = 6;

/// Spacing between gaps in corridor walls.
const CORRIDOR_GAP_SPACING: usize = 8;

/// Spacing of checkerboard pillars.
const PILLAR_SPACING: usize = 4;

/// Named obstacle layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObstaclePreset {
    /// No obstacles.
    #[default]
    None,
    /// A vertical wall down the middle with two gates.
    Midline,
    /// A wall around the border.
    Perimeter,
    /// Horizontal walls with regular gaps.
    Corridors,
    /// Sparse single-tile pillars.
    Checkerboard,
    /// Randomly scattered blocks.
    Scatter,
}

impl ObstaclePreset {
    /// Every preset, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::None,
        Self::Midline,
        Self::Perimeter,
        Self::Corridors,
        Self::Checkerboard,
        Self::Scatter,
    ];

    /// A random non-empty preset.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let all = Self::ALL;
        let choices = all.get(1..).unwrap_or_default();
        let pick = rng.random_range(0..choices.len().max(1));
        choices.get(pick).copied().unwrap_or(Self::None)
    }

    /// Tiles this preset blocks on a `rows` x `cols` grid.
    ///
    /// The output may contain duplicates for [`ObstaclePreset::Scatter`].
    pub fn tiles<R: Rng + ?Sized>(self, rows: usize, cols: usize, rng: &mut R) -> Vec<Position> {
        if rows == 0 || cols == 0 {
            return Vec::new();
        }
        let all = (0..rows).flat_map(move |r| (0..cols).map(move |c| Position::new(r, c)));
        match self {
            Self::None => Vec::new(),
            Self::Midline => {
                let wall = cols / 2;
                let gates = [rows / 4, rows.saturating_mul(3) / 4];
                (0..rows)
                    .filter(|r| !gates.contains(r))
                    .map(|r| Position::new(r, wall))
                    .collect()
            }
            Self::Perimeter => {
                let (last_r, last_c) = (rows.saturating_sub(1), cols.saturating_sub(1));
                all.filter(|p| p.row == 0 || p.col == 0 || p.row == last_r || p.col == last_c)
                    .collect()
            }
            Self::Corridors => all
                .filter(|p| {
                    p.row % CORRIDOR_SPACING == CORRIDOR_SPACING - 1
                        && p.col % CORRIDOR_GAP_SPACING > 1
                })
                .collect(),
            Self::Checkerboard => all
                .filter(|p| {
                    p.row % PILLAR_SPACING == PILLAR_SPACING / 2
                        && p.col % PILLAR_SPACING == PILLAR_SPACING / 2
                })
                .collect(),
            Self::Scatter => {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let count = (rows.saturating_mul(cols) as f64 * SCATTER_DENSITY).round() as usize;
                (0..count)
                    .map(|_| Position::new(rng.random_range(0..rows), rng.random_range(0..cols)))
                    .collect()
            }
        }
    }
}

impl FromStr for ObstaclePreset {
    type Err = WorldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Self::None),
            "midline" => Ok(Self::Midline),
            "perimeter" => Ok(Self::Perimeter),
            "corridors" => Ok(Self::Corridors),
            "checkerboard" => Ok(Self::Checkerboard),
            "scatter" => Ok(Self::Scatter),
            other => Err(WorldError::UnknownPreset {
                name: other.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn perimeter_covers_border_only() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let tiles = ObstaclePreset::Perimeter.tiles(4, 5, &mut rng);
        assert_eq!(tiles.len(), 2 * 5 + 2 * 2);
        assert!(!tiles.contains(&Position::new(1, 1)));
    }

    #[test]
    fn midline_leaves_gates_open() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let tiles = ObstaclePreset::Midline.tiles(8, 8, &mut rng);
        assert_eq!(tiles.len(), 6);
        assert!(tiles.iter().all(|p| p.col == 4));
    }

    #[test]
    fn scatter_stays_in_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let tiles = ObstaclePreset::Scatter.tiles(20, 20, &mut rng);
        assert_eq!(tiles.len(), 20);
        assert!(tiles.iter().all(|p| p.row < 20 && p.col < 20));
    }

    #[test]
    fn random_preset_is_never_none() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        for _ in 0..50 {
            assert_ne!(ObstaclePreset::random(&mut rng), ObstaclePreset::None);
        }
    }

    #[test]
    fn parses_names() {
        assert_eq!("Corridors".parse::<ObstaclePreset>(), Ok(ObstaclePreset::Corridors));
        assert!(matches!(
            "maze".parse::<ObstaclePreset>(),
            Err(WorldError::UnknownPreset { .. })
        ));
    }
}
