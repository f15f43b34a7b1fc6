//! Tile maps consumed by `INIT_GAME`.
//!
//! A [`TileMap`] is a 3D grid of integer tile ids stored as
//! `tiles[y][z][x]`. Iteration is always in that raster order (layer by
//! layer, row by row, column by column) so that entity ids derived from
//! creation order are identical on every process.
//!
//! | Tile id | Meaning |
//! |---|---|
//! | 1 | player spawn point (no entity) |
//! | 2 | wall |
//! | 3 | ammo pickup |
//! | 5 | health pickup |
//!
//! Every other id is ignored.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// World units per tile along each axis.
pub const TILE_SIZE: f32 = 2.0;

// ---------------------------------------------------------------------------
// Tile
// ---------------------------------------------------------------------------

/// The tile ids the game understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tile {
    PlayerSpawn,
    Wall,
    AmmoPickup,
    HealthPickup,
}

impl Tile {
    pub fn from_id(id: u8) -> Option<Tile> {
        match id {
            1 => Some(Tile::PlayerSpawn),
            2 => Some(Tile::Wall),
            3 => Some(Tile::AmmoPickup),
            5 => Some(Tile::HealthPickup),
            _ => None,
        }
    }
}

/// World position of the tile at grid coordinates `(x, y, z)`.
pub fn tile_position(x: usize, y: usize, z: usize) -> Vec3 {
    Vec3::new(x as f32, y as f32, z as f32) * TILE_SIZE
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("failed to parse tile map: {0}")]
    Parse(#[from] serde_json::Error),

    /// Layers have differing numbers of rows.
    #[error("tile map is ragged: layer {layer} has {found} rows, expected {expected}")]
    RaggedLayer {
        layer: usize,
        found: usize,
        expected: usize,
    },

    /// Rows have differing numbers of columns.
    #[error("tile map is ragged: layer {layer} row {row} has {found} columns, expected {expected}")]
    Ragged {
        layer: usize,
        row: usize,
        found: usize,
        expected: usize,
    },
}

// ---------------------------------------------------------------------------
// TileMap
// ---------------------------------------------------------------------------

/// A rectangular 3D grid of tile ids, `tiles[y][z][x]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileMap {
    tiles: Vec<Vec<Vec<u8>>>,
}

impl TileMap {
    /// Build a map from layers, checking that it is rectangular.
    pub fn new(tiles: Vec<Vec<Vec<u8>>>) -> Result<Self, MapError> {
        let depth = tiles.first().map_or(0, Vec::len);
        let width = tiles
            .first()
            .and_then(|layer| layer.first())
            .map_or(0, Vec::len);
        for (y, layer) in tiles.iter().enumerate() {
            if layer.len() != depth {
                return Err(MapError::RaggedLayer {
                    layer: y,
                    found: layer.len(),
                    expected: depth,
                });
            }
            for (z, row) in layer.iter().enumerate() {
                if row.len() != width {
                    return Err(MapError::Ragged {
                        layer: y,
                        row: z,
                        found: row.len(),
                        expected: width,
                    });
                }
            }
        }
        Ok(Self { tiles })
    }

    /// Parse a map from its JSON form (an array of layers of rows).
    pub fn from_json(text: &str) -> Result<Self, MapError> {
        let tiles: Vec<Vec<Vec<u8>>> = serde_json::from_str(text)?;
        Self::new(tiles)
    }

    /// A map with no tiles.
    pub fn empty() -> Self {
        Self { tiles: Vec::new() }
    }

    /// The built-in arena: a 12x12 walled floor with four spawn corners, two
    /// pillars, two ammo pickups and a health pickup in the middle.
    pub fn default_arena() -> Self {
        const N: usize = 12;
        let border = |x: usize, z: usize| x == 0 || z == 0 || x == N - 1 || z == N - 1;

        let floor = vec![vec![2u8; N]; N];
        let mut ground = vec![vec![0u8; N]; N];
        let mut top = vec![vec![0u8; N]; N];
        for z in 0..N {
            for x in 0..N {
                if border(x, z) {
                    ground[z][x] = 2;
                    top[z][x] = 2;
                }
            }
        }
        for (x, z) in [(1, 1), (N - 2, 1), (1, N - 2), (N - 2, N - 2)] {
            ground[z][x] = 1;
        }
        ground[4][4] = 2;
        ground[7][7] = 2;
        ground[6][3] = 3;
        ground[5][8] = 3;
        ground[6][6] = 5;

        Self {
            tiles: vec![floor, ground, top],
        }
    }

    /// `(width, height, depth)` in tiles.
    pub fn dimensions(&self) -> (usize, usize, usize) {
        let height = self.tiles.len();
        let depth = self.tiles.first().map_or(0, Vec::len);
        let width = self
            .tiles
            .first()
            .and_then(|layer| layer.first())
            .map_or(0, Vec::len);
        (width, height, depth)
    }

    /// Visit every tile as `(id, x, y, z)` in raster order.
    pub fn for_each_tile(&self, mut f: impl FnMut(u8, usize, usize, usize)) {
        for (y, layer) in self.tiles.iter().enumerate() {
            for (z, row) in layer.iter().enumerate() {
                for (x, &id) in row.iter().enumerate() {
                    f(id, x, y, z);
                }
            }
        }
    }
}

impl Default for TileMap {
    fn default() -> Self {
        Self::default_arena()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
