//! Spatial hashing using Morton encoding (Z-order curve).
//!
//! Boids are bucketed into a uniform grid centred on the origin. Each cell is
//! keyed by the 30-bit Morton code of its integer coordinates, so sorting the
//! `(code, index)` pairs groups every cell into one contiguous run and keeps
//! spatially close cells close in memory.
//!
//! The index is rebuilt from scratch every tick and is read-only while forces
//! are computed, so it can be shared freely across worker threads.
//!
//! ```ignore
//! let config = SpatialConfig::for_radius(20.0, 120.0);
//! let mut index = SpatialIndex::new(config);
//! index.rebuild(&positions);
//! for n in index.query_neighbors(positions[0], 20.0, Some(0)) {
//!     // n.index, n.offset, n.distance_sq
//! }
//! ```

use glam::{UVec3, Vec3};

/// Largest grid resolution per axis that still fits a 30-bit Morton code.
pub const MAX_GRID_RESOLUTION: u32 = 1024;

/// Configuration for the spatial hashing grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpatialConfig {
    /// Size of each cell in world units.
    pub cell_size: f32,
    /// Number of cells per dimension (grid is `grid_resolution^3`).
    pub grid_resolution: u32,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self::for_radius(20.0, 120.0)
    }
}

impl SpatialConfig {
    /// Explicit cell size and resolution.
    ///
    /// `grid_resolution` is rounded up to a power of two and capped at
    /// [`MAX_GRID_RESOLUTION`]. A non-positive cell size falls back to 1.
    pub fn new(cell_size: f32, grid_resolution: u32) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 { cell_size } else { 1.0 };
        let grid_resolution = grid_resolution.clamp(1, MAX_GRID_RESOLUTION).next_power_of_two();
        Self {
            cell_size,
            grid_resolution,
        }
    }

    /// Grid sized for queries of `radius` over a box of `half_extent`.
    ///
    /// Cells are at least `radius` wide so a query touches the 3x3x3 block
    /// around its cell, and never smaller than the box divided by the maximum
    /// resolution.
    pub fn for_radius(radius: f32, half_extent: f32) -> Self {
        let span = 2.0 * half_extent.abs().max(f32::EPSILON);
        let min_cell = span / MAX_GRID_RESOLUTION as f32;
        let cell_size = if radius.is_finite() { radius.max(min_cell) } else { span };
        let cells = (span / cell_size).ceil().max(1.0) as u32;
        Self::new(cell_size, cells)
    }

    /// Total number of cells in the grid.
    pub fn total_cells(&self) -> u64 {
        let r = self.grid_resolution as u64;
        r * r * r
    }

    /// Integer cell coordinates of a world position, clamped to the grid.
    pub fn pos_to_cell(&self, pos: Vec3) -> UVec3 {
        // Offset by half the grid to centre it on the origin
        let half_grid = self.grid_resolution as f32 * self.cell_size * 0.5;
        let normalized = (pos + Vec3::splat(half_grid)) / self.cell_size;
        let max = (self.grid_resolution - 1) as f32;
        let clamped = normalized.clamp(Vec3::ZERO, Vec3::splat(max));
        // NaN survives clamp; treat it as the origin cell
        let clamped = Vec3::select(clamped.is_nan_mask(), Vec3::ZERO, clamped);
        clamped.as_uvec3()
    }

    /// Morton code of the cell containing `pos`.
    #[inline]
    pub fn pos_to_morton(&self, pos: Vec3) -> u32 {
        let c = self.pos_to_cell(pos);
        morton_encode(c.x, c.y, c.z)
    }
}

/// Expand a 10-bit integer to 30 bits by inserting two zeros between bits.
#[inline]
pub fn expand_bits(v: u32) -> u32 {
    let mut x = v & 0x0000_03FF;
    x = (x | (x << 16)) & 0x0300_00FF;
    x = (x | (x << 8)) & 0x0300_F00F;
    x = (x | (x << 4)) & 0x030C_30C3;
    x = (x | (x << 2)) & 0x0924_9249;
    x
}

/// Compact 30 bits back to 10 by taking every third bit.
#[inline]
pub fn compact_bits(v: u32) -> u32 {
    let mut x = v & 0x0924_9249;
    x = (x | (x >> 2)) & 0x030C_30C3;
    x = (x | (x >> 4)) & 0x0300_F00F;
    x = (x | (x >> 8)) & 0x0300_00FF;
    x = (x | (x >> 16)) & 0x0000_03FF;
    x
}

/// 30-bit Morton code for a cell (each coordinate 0-1023).
#[inline]
pub fn morton_encode(x: u32, y: u32, z: u32) -> u32 {
    expand_bits(x) | (expand_bits(y) << 1) | (expand_bits(z) << 2)
}

/// Inverse of [`morton_encode`].
#[inline]
pub fn morton_decode(code: u32) -> UVec3 {
    UVec3::new(compact_bits(code), compact_bits(code >> 1), compact_bits(code >> 2))
}

/// One hit from a neighbour query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbor {
    /// Index into the position slice the index was built from.
    pub index: usize,
    /// `neighbor_position - query_position`.
    pub offset: Vec3,
    pub distance_sq: f32,
}

/// Uniform-grid neighbour index over a frozen set of positions.
#[derive(Clone, Debug)]
pub struct SpatialIndex {
    config: SpatialConfig,
    /// `(morton_code, agent_index)` sorted by code then index.
    entries: Vec<(u32, u32)>,
    positions: Vec<Vec3>,
}

impl SpatialIndex {
    pub fn new(config: SpatialConfig) -> Self {
        Self {
            config,
            entries: Vec::new(),
            positions: Vec::new(),
        }
    }

    pub fn config(&self) -> SpatialConfig {
        self.config
    }

    /// Replace the grid configuration. Takes effect at the next rebuild.
    pub fn set_config(&mut self, config: SpatialConfig) {
        self.config = config;
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Bucket every position. Buffers are reused between ticks.
    pub fn rebuild(&mut self, positions: &[Vec3]) {
        let config = self.config;
        self.positions.clear();
        self.positions.extend_from_slice(positions);
        self.entries.clear();
        self.entries.extend(
            positions
                .iter()
                .enumerate()
                .map(|(i, p)| (config.pos_to_morton(*p), i as u32)),
        );
        self.entries.sort_unstable();
    }

    /// Number of distinct occupied cells.
    pub fn occupied_cells(&self) -> usize {
        let mut count = 0;
        let mut last = None;
        for (code, _) in &self.entries {
            if last != Some(*code) {
                count += 1;
                last = Some(*code);
            }
        }
        count
    }

    /// Agents bucketed in the cell with this Morton code.
    fn cell(&self, code: u32) -> &[(u32, u32)] {
        let start = self.entries.partition_point(|(c, _)| *c < code);
        let end = start + self.entries[start..].partition_point(|(c, _)| *c == code);
        &self.entries[start..end]
    }

    /// Visit every agent in the block of cells that can contain points within
    /// `radius` of `position`, without the exact distance check.
    ///
    /// The block is `(2k+1)^3` cells with `k = ceil(radius / cell_size)`.
    pub fn candidates_in_cells(&self, position: Vec3, radius: f32, mut visit: impl FnMut(usize)) {
        if self.entries.is_empty() {
            return;
        }
        let res = self.config.grid_resolution as i64;
        let k = if radius.is_finite() && radius > 0.0 {
            ((radius / self.config.cell_size).ceil() as i64).clamp(1, res)
        } else if radius.is_finite() {
            1
        } else {
            res
        };
        let center = self.config.pos_to_cell(position).as_i64vec3();
        let lo = (center - k).max(glam::I64Vec3::ZERO);
        let hi = (center + k).min(glam::I64Vec3::splat(res - 1));

        for z in lo.z..=hi.z {
            for y in lo.y..=hi.y {
                for x in lo.x..=hi.x {
                    let code = morton_encode(x as u32, y as u32, z as u32);
                    for (_, idx) in self.cell(code) {
                        visit(*idx as usize);
                    }
                }
            }
        }
    }

    /// Visit every agent strictly within `radius` of `position`, skipping
    /// `exclude`.
    pub fn for_each_neighbor(
        &self,
        position: Vec3,
        radius: f32,
        exclude: Option<usize>,
        mut visit: impl FnMut(Neighbor),
    ) {
        let radius_sq = radius * radius;
        self.candidates_in_cells(position, radius, |index| {
            if Some(index) == exclude {
                return;
            }
            let offset = self.positions[index] - position;
            let distance_sq = offset.length_squared();
            if distance_sq < radius_sq {
                visit(Neighbor {
                    index,
                    offset,
                    distance_sq,
                });
            }
        });
    }

    /// All agents strictly within `radius` of `position`, excluding
    /// `exclude`. Order is deterministic for a given set of positions.
    pub fn query_neighbors(
        &self,
        position: Vec3,
        radius: f32,
        exclude: Option<usize>,
    ) -> Vec<Neighbor> {
        let mut out = Vec::new();
        self.for_each_neighbor(position, radius, exclude, |n| out.push(n));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_morton_round_trip_corners() {
        let corners = [
            (0, 0, 0),
            (1023, 0, 0),
            (0, 1023, 0),
            (0, 0, 1023),
            (1023, 1023, 1023),
            (5, 300, 17),
        ];
        for (x, y, z) in corners {
            let code = morton_encode(x, y, z);
            assert!(code < (1 << 30));
            assert_eq!(morton_decode(code), UVec3::new(x, y, z));
        }
    }

    #[test]
    fn test_morton_interleaving() {
        assert_eq!(morton_encode(1, 0, 0), 0b001);
        assert_eq!(morton_encode(0, 1, 0), 0b010);
        assert_eq!(morton_encode(0, 0, 1), 0b100);
        assert_eq!(morton_encode(2, 0, 0), 0b001_000);
    }

    #[test]
    fn test_config_for_radius() {
        let config = SpatialConfig::for_radius(20.0, 120.0);
        assert_eq!(config.cell_size, 20.0);
        // 240 / 20 = 12 cells, rounded up to 16
        assert_eq!(config.grid_resolution, 16);

        let tiny = SpatialConfig::for_radius(0.0, 120.0);
        assert_eq!(tiny.grid_resolution, MAX_GRID_RESOLUTION);
        assert!(tiny.cell_size > 0.0);
    }

    #[test]
    fn test_pos_to_cell_clamps_outside() {
        let config = SpatialConfig::new(1.0, 16);
        assert_eq!(config.pos_to_cell(Vec3::splat(-1000.0)), UVec3::ZERO);
        assert_eq!(config.pos_to_cell(Vec3::splat(1000.0)), UVec3::splat(15));
        assert_eq!(config.pos_to_cell(Vec3::ZERO), UVec3::splat(8));
        assert_eq!(config.pos_to_cell(Vec3::splat(f32::NAN)), UVec3::ZERO);
    }

    #[test]
    fn test_query_excludes_self_and_far() {
        let positions = vec![Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::new(50.0, 0.0, 0.0)];
        let mut index = SpatialIndex::new(SpatialConfig::for_radius(5.0, 120.0));
        index.rebuild(&positions);

        let hits = index.query_neighbors(Vec3::ZERO, 5.0, Some(0));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].index, 1);
        assert_eq!(hits[0].offset, Vec3::X);
        assert_eq!(hits[0].distance_sq, 1.0);
    }

    #[test]
    fn test_query_matches_brute_force() {
        let mut rng = SmallRng::seed_from_u64(7);
        let positions: Vec<Vec3> = (0..500)
            .map(|_| {
                Vec3::new(
                    rng.gen_range(-130.0..130.0),
                    rng.gen_range(-130.0..130.0),
                    rng.gen_range(-130.0..130.0),
                )
            })
            .collect();
        let radius = 20.0;
        let mut index = SpatialIndex::new(SpatialConfig::for_radius(radius, 120.0));
        index.rebuild(&positions);

        for (i, p) in positions.iter().enumerate().take(50) {
            let mut got: Vec<usize> = index
                .query_neighbors(*p, radius, Some(i))
                .iter()
                .map(|n| n.index)
                .collect();
            got.sort_unstable();
            let expected: Vec<usize> = positions
                .iter()
                .enumerate()
                .filter(|(j, q)| *j != i && q.distance_squared(*p) < radius * radius)
                .map(|(j, _)| j)
                .collect();
            assert_eq!(got, expected, "mismatch for agent {}", i);
        }
    }

    #[test]
    fn test_radius_larger_than_cell() {
        let positions = vec![Vec3::ZERO, Vec3::new(9.0, 0.0, 0.0)];
        let mut index = SpatialIndex::new(SpatialConfig::new(2.0, 128));
        index.rebuild(&positions);
        assert_eq!(index.query_neighbors(Vec3::ZERO, 10.0, Some(0)).len(), 1);
    }

    #[test]
    fn test_occupied_cells() {
        let positions = vec![Vec3::ZERO, Vec3::new(0.1, 0.1, 0.1), Vec3::splat(60.0)];
        let mut index = SpatialIndex::new(SpatialConfig::for_radius(20.0, 120.0));
        index.rebuild(&positions);
        assert_eq!(index.occupied_cells(), 2);

        index.rebuild(&[]);
        assert!(index.is_empty());
        assert!(index.query_neighbors(Vec3::ZERO, 20.0, None).is_empty());
    }

    #[test]
    fn test_candidates_include_false_positives() {
        let positions = vec![Vec3::ZERO, Vec3::new(19.0, 19.0, 0.0)];
        let mut index = SpatialIndex::new(SpatialConfig::for_radius(20.0, 120.0));
        index.rebuild(&positions);
        let mut seen = Vec::new();
        index.candidates_in_cells(Vec3::ZERO, 20.0, |i| seen.push(i));
        assert_eq!(seen.len(), 2);
        // ~26.9 apart, filtered by the exact check
        assert!(index.query_neighbors(Vec3::ZERO, 20.0, Some(0)).is_empty());
    }
}
