//! Seated players and their private racks

use super::arbitrator::Action;
use super::scoring::rack_value;
use super::strategy::{GreedyStrategy, RemoteStrategy, Strategy, TurnView};
use super::tile::Tile;

/// A player's private tiles.
///
/// Duplicate-valued tiles are interchangeable: taking "R5" removes the
/// first R5 found, whichever copy that is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rack {
    tiles: Vec<Tile>,
}

impl Rack {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn from_tiles(tiles: Vec<Tile>) -> Self {
        Self { tiles }
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn add(&mut self, tile: Tile) {
        self.tiles.push(tile);
    }

    pub fn extend(&mut self, tiles: impl IntoIterator<Item = Tile>) {
        self.tiles.extend(tiles);
    }

    /// Remove the first tile equal to `tile`.
    pub fn take(&mut self, tile: &Tile) -> Option<Tile> {
        let index = self.tiles.iter().position(|t| t == tile)?;
        Some(self.tiles.remove(index))
    }

    /// Empty the rack, handing back what was on it.
    pub fn drain(&mut self) -> Vec<Tile> {
        std::mem::take(&mut self.tiles)
    }

    /// Tiles in sorted order, for display and multiset comparison.
    pub fn sorted(&self) -> Vec<Tile> {
        let mut tiles = self.tiles.clone();
        tiles.sort();
        tiles
    }

    /// Penalty value if the round ended now
    pub fn value(&self) -> u32 {
        rack_value(&self.tiles)
    }
}

/// A seat at the table.
///
/// Humans and automated agents share this record; the only difference is
/// the [`Strategy`] deciding their batches.
#[derive(Debug)]
pub struct Player {
    name: String,
    pub rack: Rack,
    /// Score for the round in progress
    pub score: i32,
    /// Sum of all settled rounds
    pub final_score: i32,
    pub won_rounds: u32,
    pub made_initial_meld: bool,
    pub skipped_turns: u32,
    /// Actions committed during the current turn
    pub move_history: Vec<Action>,
    pub ready: bool,
    strategy: Box<dyn Strategy>,
}

impl Player {
    pub fn new(name: impl Into<String>, strategy: Box<dyn Strategy>) -> Self {
        Self {
            name: name.into(),
            rack: Rack::new(),
            score: 0,
            final_score: 0,
            won_rounds: 0,
            made_initial_meld: false,
            skipped_turns: 0,
            move_history: Vec::new(),
            ready: false,
            strategy,
        }
    }

    /// A player whose batches arrive over the network
    pub fn remote(name: impl Into<String>) -> Self {
        Self::new(name, Box::new(RemoteStrategy))
    }

    /// An automated agent. Always ready.
    pub fn automated(name: impl Into<String>) -> Self {
        let mut player = Self::new(name, Box::new(GreedyStrategy));
        player.ready = true;
        player
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_automated(&self) -> bool {
        self.strategy.is_automated()
    }

    pub fn has_won(&self) -> bool {
        self.rack.is_empty()
    }

    /// Ask the strategy for a batch. `None` means the batch comes from
    /// outside.
    pub fn decide(&mut self, view: &TurnView<'_>) -> Option<Vec<Action>> {
        self.strategy.decide(view)
    }

    /// Move the settled round score into the running total.
    pub fn fold_score(&mut self) {
        self.final_score += self.score;
    }

    /// Clear per-round state before a new deal.
    pub fn reset_for_round(&mut self) {
        self.rack = Rack::new();
        self.score = 0;
        self.made_initial_meld = false;
        self.skipped_turns = 0;
        self.move_history.clear();
    }
}
