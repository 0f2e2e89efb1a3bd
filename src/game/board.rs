//! The shared table: committed rows plus the scratch grid a batch is
//! applied to before it is allowed to replace them.

use super::tile::Tile;
use super::validation::{convert_row_to_set, TileSet};
use std::fmt;

/// Committed board. Every row reads as a valid set at commit time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Board {
    rows: Vec<Vec<Tile>>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<Vec<Tile>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<Tile>] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Read every row as a set. `Err(row)` names the first row with no
    /// valid interpretation.
    pub fn sets(&self) -> Result<Vec<TileSet>, usize> {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| convert_row_to_set(row).ok_or(i))
            .collect()
    }

    pub fn first_invalid_row(&self) -> Option<usize> {
        self.sets().err()
    }

    #[cfg(test)]
    pub fn is_valid(&self) -> bool {
        self.first_invalid_row().is_none()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str("[")?;
            for (j, tile) in row.iter().enumerate() {
                if j > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{}", tile)?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}

/// Mutable working copy of the board used while a batch is applied.
///
/// Cells may be empty so that removing a tile does not shift the indices
/// later actions in the same batch refer to. [`Grid::compact`] closes the
/// holes and drops empty rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grid {
    cells: Vec<Vec<Option<Tile>>>,
}

impl Grid {
    pub fn from_board(board: &Board) -> Self {
        Self {
            cells: board
                .rows
                .iter()
                .map(|row| row.iter().copied().map(Some).collect())
                .collect(),
        }
    }

    /// Put a tile at `(row, index)`. Returns `false`, leaving the grid
    /// untouched, when the target is out of range.
    ///
    /// `row` may be one past the last row, which opens a new row, and
    /// `index` may be one past the last cell of the row. An empty cell is
    /// filled; an occupied cell pushes the rest of the row right.
    pub fn place(&mut self, tile: Tile, row: usize, index: usize) -> bool {
        if row > self.cells.len() {
            return false;
        }
        if row == self.cells.len() {
            self.cells.push(Vec::new());
        }
        let cells = &mut self.cells[row];
        if index > cells.len() {
            return false;
        }
        if index == cells.len() {
            cells.push(Some(tile));
        } else if cells[index].is_none() {
            cells[index] = Some(tile);
        } else {
            cells.insert(index, Some(tile));
        }
        true
    }

    /// Take the first tile in `row` equal to `tile`, leaving a hole.
    pub fn take(&mut self, row: usize, tile: &Tile) -> Option<Tile> {
        let cell = self
            .cells
            .get_mut(row)?
            .iter_mut()
            .find(|cell| cell.as_ref() == Some(tile))?;
        cell.take()
    }

    /// Tiles currently in `row`, holes skipped.
    pub fn row_tiles(&self, row: usize) -> Vec<Tile> {
        self.cells
            .get(row)
            .map(|cells| cells.iter().flatten().copied().collect())
            .unwrap_or_default()
    }

    /// Close holes and drop empty rows.
    pub fn compact(self) -> Board {
        let rows = self
            .cells
            .into_iter()
            .map(|cells| cells.into_iter().flatten().collect::<Vec<_>>())
            .filter(|row| !row.is_empty())
            .collect();
        Board { rows }
    }
}
