//! The shared reserve of undrawn tiles

use super::tile::{Tile, INVENTORY};
use rand::prelude::*;

/// Undrawn tiles. Draws are uniform random removals.
#[derive(Debug, Clone)]
pub struct Pool {
    tiles: Vec<Tile>,
}

impl Pool {
    /// A pool holding the complete 106-tile inventory.
    pub fn full() -> Self {
        Self {
            tiles: INVENTORY.clone(),
        }
    }

    /// A pool holding exactly the given tiles.
    #[cfg(test)]
    pub fn from_tiles(tiles: Vec<Tile>) -> Self {
        Self { tiles }
    }

    /// Draw one tile, or `None` when the pool is exhausted.
    pub fn draw_with_rng<R: Rng>(&mut self, rng: &mut R) -> Option<Tile> {
        if self.tiles.is_empty() {
            return None;
        }
        let index = rng.random_range(0..self.tiles.len());
        Some(self.tiles.swap_remove(index))
    }

    /// Draw up to `count` tiles. Fewer come back if the pool runs dry.
    pub fn draw_many_with_rng<R: Rng>(&mut self, count: usize, rng: &mut R) -> Vec<Tile> {
        (0..count).map_while(|_| self.draw_with_rng(rng)).collect()
    }

    /// Return tiles to the pool (a departing player's rack).
    pub fn put_back(&mut self, tiles: impl IntoIterator<Item = Tile>) {
        self.tiles.extend(tiles);
    }

    /// Restore the complete inventory for a new round.
    pub fn refill(&mut self) {
        self.tiles = INVENTORY.clone();
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    #[cfg(test)]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::full()
    }
}
