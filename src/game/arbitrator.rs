//! Move transaction engine
//!
//! The host runs every batch through [`execute_batch`] against a scratch
//! copy of the board and the acting player's rack. Nothing the batch does
//! is visible until the whole batch is proven valid; a rejected batch
//! leaves the live board and rack exactly as they were.

use super::board::{Board, Grid};
use super::player::Rack;
use super::scoring::{score_row, INITIAL_MELD_THRESHOLD};
use super::tile::Tile;
use super::validation::MIN_SET_SIZE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One primitive step of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Action {
    /// Put a rack tile on the board
    Place { tile: Tile, row: usize, index: usize },
    /// Relocate a tile already on the board
    Move {
        from_row: usize,
        tile: Tile,
        to_row: usize,
        index: usize,
    },
}

/// Why a batch, or a turn request, was turned down. Sent to the player as
/// `Invalid { code }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalidCode {
    IllegalAction,
    TileNotOwned,
    NoSuchTile,
    MoveBeforeInitialMeld,
    InsufficientPoints,
    NotYourTurn,
    NotPlaying,
}

/// Broad class of a rejected batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Tile not in the acting player's rack
    Ownership,
    /// Row or tile on the board does not exist
    Structural,
    /// Batch applied cleanly but breaks a rule
    RuleViolation,
}

/// A rejected batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    TileNotOwned(Tile),
    NoSuchTile { row: usize, tile: Tile },
    /// Target cell lies past the end of the grid
    OutOfRange { row: usize, index: usize },
    MoveBeforeInitialMeld,
    /// A row touched by the initial meld received fewer than 3 tiles
    SetTooSmall { row: usize },
    InsufficientPoints { score: u32 },
    InvalidRow { row: usize },
}

impl BatchError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BatchError::TileNotOwned(_) => ErrorCategory::Ownership,
            BatchError::NoSuchTile { .. } | BatchError::OutOfRange { .. } => {
                ErrorCategory::Structural
            }
            BatchError::MoveBeforeInitialMeld
            | BatchError::SetTooSmall { .. }
            | BatchError::InsufficientPoints { .. }
            | BatchError::InvalidRow { .. } => ErrorCategory::RuleViolation,
        }
    }

    pub fn code(&self) -> InvalidCode {
        match self {
            BatchError::TileNotOwned(_) => InvalidCode::TileNotOwned,
            BatchError::NoSuchTile { .. } | BatchError::OutOfRange { .. } => {
                InvalidCode::NoSuchTile
            }
            BatchError::MoveBeforeInitialMeld => InvalidCode::MoveBeforeInitialMeld,
            BatchError::SetTooSmall { .. } | BatchError::InsufficientPoints { .. } => {
                InvalidCode::InsufficientPoints
            }
            BatchError::InvalidRow { .. } => InvalidCode::IllegalAction,
        }
    }
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchError::TileNotOwned(tile) => write!(f, "{} is not in the rack", tile),
            BatchError::NoSuchTile { row, tile } => write!(f, "no {} in row {}", tile, row),
            BatchError::OutOfRange { row, index } => {
                write!(f, "row {} index {} is past the end of the board", row, index)
            }
            BatchError::MoveBeforeInitialMeld => {
                write!(f, "tiles on the board cannot be moved before the initial meld")
            }
            BatchError::SetTooSmall { row } => {
                write!(f, "initial meld row {} needs at least {} tiles", row, MIN_SET_SIZE)
            }
            BatchError::InsufficientPoints { score } => write!(
                f,
                "initial meld is worth {} points, {} needed",
                score, INITIAL_MELD_THRESHOLD
            ),
            BatchError::InvalidRow { row } => write!(f, "row {} is not a valid set", row),
        }
    }
}

impl std::error::Error for BatchError {}

/// The state a successful batch produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub board: Board,
    pub rack: Rack,
    /// Tiles that left the rack
    pub placed: Vec<Tile>,
    /// Score of the initial meld, if this batch was one
    pub meld_score: Option<u32>,
}

/// Apply `actions` in order to copies of `board` and `rack`.
///
/// Row indices always refer to the grid as it stands during the batch;
/// rows are compacted only once every action has applied.
pub fn execute_batch(
    board: &Board,
    rack: &Rack,
    made_initial_meld: bool,
    actions: &[Action],
) -> Result<Commit, BatchError> {
    let mut grid = Grid::from_board(board);
    let mut rack = rack.clone();
    let mut placed = Vec::new();
    // rows receiving rack tiles, with how many they received
    let mut touched: BTreeMap<usize, usize> = BTreeMap::new();

    for action in actions {
        match *action {
            Action::Place { tile, row, index } => {
                let tile = rack.take(&tile).ok_or(BatchError::TileNotOwned(tile))?;
                if !grid.place(tile, row, index) {
                    return Err(BatchError::OutOfRange { row, index });
                }
                placed.push(tile);
                *touched.entry(row).or_default() += 1;
            }
            Action::Move {
                from_row,
                tile,
                to_row,
                index,
            } => {
                if !made_initial_meld {
                    return Err(BatchError::MoveBeforeInitialMeld);
                }
                let tile = grid
                    .take(from_row, &tile)
                    .ok_or(BatchError::NoSuchTile { row: from_row, tile })?;
                if !grid.place(tile, to_row, index) {
                    return Err(BatchError::OutOfRange { row: to_row, index });
                }
            }
        }
    }

    let meld_score = if made_initial_meld {
        None
    } else {
        if let Some((&row, _)) = touched.iter().find(|(_, count)| **count < MIN_SET_SIZE) {
            return Err(BatchError::SetTooSmall { row });
        }
        let score: u32 = touched.keys().map(|&row| score_row(&grid.row_tiles(row))).sum();
        if score < INITIAL_MELD_THRESHOLD {
            return Err(BatchError::InsufficientPoints { score });
        }
        Some(score)
    };

    let board = grid.compact();
    if let Some(row) = board.first_invalid_row() {
        return Err(BatchError::InvalidRow { row });
    }

    Ok(Commit {
        board,
        rack,
        placed,
        meld_score,
    })
}
