//! Game logic: tiles, sets, the board, scoring and the turn orchestrator

pub mod arbitrator;
pub mod board;
pub mod player;
pub mod pool;
pub mod scoring;
pub mod session;
pub mod strategy;
pub mod tile;
pub mod timer;
pub mod validation;

pub use arbitrator::{execute_batch, Action, BatchError, InvalidCode};
pub use board::Board;
pub use player::{Player, Rack};
pub use session::{Departure, PlayAgainOutcome, Session, SessionError, TurnOutcome, TurnReport};
pub use strategy::{GreedyStrategy, Strategy, TurnView};
pub use tile::{Tile, TileColor};
