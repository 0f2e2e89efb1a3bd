//! Tile-set validation
//!
//! A committed row must read as either:
//! - a Run: 3+ tiles, one color, consecutive numbers, jokers fill positions
//! - a Group: 3-4 tiles, one number, no repeated color

use super::tile::{Tile, TileColor, MAX_NUMBER, MIN_NUMBER};
use std::collections::HashSet;
use std::fmt;

/// Minimum tiles in any set
pub const MIN_SET_SIZE: usize = 3;

/// Maximum tiles in a group (one per color)
pub const MAX_GROUP_SIZE: usize = 4;

/// Consecutive same-color tiles in positional order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    tiles: Vec<Tile>,
}

/// Same-number tiles of distinct colors, order irrelevant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    tiles: Vec<Tile>,
}

/// A row that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileSet {
    Run(Run),
    Group(Group),
}

impl Run {
    pub fn new(tiles: Vec<Tile>) -> Self {
        Self { tiles }
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// The number every position stands for, anchored on the first
    /// non-joker tile. `None` when the row holds only jokers.
    pub fn positions(&self) -> Option<Vec<i32>> {
        let (anchor_index, anchor) = self
            .tiles
            .iter()
            .enumerate()
            .find(|(_, t)| !t.is_joker())?;
        let base = anchor.number() as i32 - anchor_index as i32;
        Some((0..self.tiles.len()).map(|i| base + i as i32).collect())
    }

    pub fn is_valid(&self) -> bool {
        if self.tiles.len() < MIN_SET_SIZE {
            return false;
        }

        let mut color: Option<TileColor> = None;
        for tile in self.tiles.iter().filter(|t| !t.is_joker()) {
            match color {
                None => color = tile.color(),
                Some(c) if tile.color() != Some(c) => return false,
                Some(_) => {}
            }
        }

        let Some(positions) = self.positions() else {
            return false;
        };

        // every position, joker or not, must land inside 1..=13
        let first = positions[0];
        let last = positions[positions.len() - 1];
        if first < MIN_NUMBER as i32 || last > MAX_NUMBER as i32 {
            return false;
        }

        self.tiles
            .iter()
            .zip(&positions)
            .filter(|(t, _)| !t.is_joker())
            .all(|(t, p)| t.number() as i32 == *p)
    }
}

impl Group {
    pub fn new(tiles: Vec<Tile>) -> Self {
        Self { tiles }
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// The shared number, taken from the first non-joker tile
    pub fn number(&self) -> Option<u8> {
        self.tiles.iter().find(|t| !t.is_joker()).map(|t| t.number())
    }

    pub fn is_valid(&self) -> bool {
        if self.tiles.len() < MIN_SET_SIZE || self.tiles.len() > MAX_GROUP_SIZE {
            return false;
        }
        let Some(number) = self.number() else {
            return false;
        };
        let mut colors = HashSet::new();
        self.tiles
            .iter()
            .filter(|t| !t.is_joker())
            .all(|t| t.number() == number && colors.insert(t.color()))
    }
}

impl TileSet {
    pub fn tiles(&self) -> &[Tile] {
        match self {
            TileSet::Run(run) => run.tiles(),
            TileSet::Group(group) => group.tiles(),
        }
    }
}

impl fmt::Display for TileSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            TileSet::Run(_) => "run",
            TileSet::Group(_) => "group",
        };
        write!(f, "{} [", kind)?;
        for (i, tile) in self.tiles().iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", tile)?;
        }
        f.write_str("]")
    }
}

/// Interpret a row as a set: Run first, then Group.
/// Returns `None` when neither reading is valid.
pub fn convert_row_to_set(row: &[Tile]) -> Option<TileSet> {
    let run = Run::new(row.to_vec());
    if run.is_valid() {
        return Some(TileSet::Run(run));
    }
    let group = Group::new(row.to_vec());
    if group.is_valid() {
        return Some(TileSet::Group(group));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tile::parse_tiles;

    fn run(s: &str) -> Run {
        Run::new(parse_tiles(s).unwrap())
    }

    fn group(s: &str) -> Group {
        Group::new(parse_tiles(s).unwrap())
    }

    #[test]
    fn test_all_same_color_triples_are_runs() {
        for color in TileColor::ALL {
            for start in 1..=11u8 {
                let tiles = (start..start + 3).map(|n| Tile::new(n, color)).collect();
                assert!(Run::new(tiles).is_valid(), "{:?} from {}", color, start);
            }
        }
    }

    #[test]
    fn test_run_too_short() {
        assert!(!run("R1 R2").is_valid());
        assert!(!run("").is_valid());
    }

    #[test]
    fn test_run_mixed_colors() {
        assert!(!run("R3 b4 R5").is_valid());
    }

    #[test]
    fn test_run_not_consecutive() {
        assert!(!run("R3 R5 R6").is_valid());
        assert!(!run("R5 R4 R3").is_valid());
        assert!(!run("R3 R3 R4").is_valid());
    }

    #[test]
    fn test_run_joker_fills_gap() {
        assert!(run("R3 J R5").is_valid());
        assert!(run("R1 J R3").is_valid());
        assert!(run("J R2 R3").is_valid());
        assert!(run("R11 R12 J").is_valid());
    }

    #[test]
    fn test_run_two_jokers_gap_too_big() {
        assert!(!run("R3 J J R7").is_valid());
    }

    #[test]
    fn test_run_adjacent_interior_jokers() {
        assert!(run("R3 J J R6").is_valid());
        assert!(!run("R3 J J R5").is_valid());
    }

    #[test]
    fn test_run_joker_past_boundary_rejected() {
        // joker would have to be 0
        assert!(!run("J R1 R2").is_valid());
        // joker would have to be 14
        assert!(!run("R12 R13 J").is_valid());
        assert!(!run("J J R2 R3").is_valid());
    }

    #[test]
    fn test_run_only_jokers() {
        assert!(!run("J J J").is_valid());
    }

    #[test]
    fn test_run_full_length() {
        let tiles = (1..=13).map(|n| Tile::new(n, TileColor::Blue)).collect();
        assert!(Run::new(tiles).is_valid());
    }

    #[test]
    fn test_run_positions() {
        assert_eq!(run("J J R5").positions(), Some(vec![3, 4, 5]));
        assert_eq!(run("J J J").positions(), None);
    }

    #[test]
    fn test_group_valid() {
        assert!(group("R5 B5 Y5").is_valid());
        assert!(group("R5 B5 Y5 b5").is_valid());
        assert!(group("R5 J Y5").is_valid());
        assert!(group("J J Y5").is_valid());
    }

    #[test]
    fn test_group_duplicate_color() {
        assert!(!group("R5 R5 Y5").is_valid());
        assert!(!group("R5 B5 R5 b5").is_valid());
        assert!(!group("R5 J R5").is_valid());
    }

    #[test]
    fn test_group_size_bounds() {
        assert!(!group("R5 B5").is_valid());
        assert!(!group("R5 B5 Y5 b5 J").is_valid());
    }

    #[test]
    fn test_group_mixed_numbers() {
        assert!(!group("R5 B6 Y5").is_valid());
    }

    #[test]
    fn test_group_only_jokers() {
        assert!(!group("J J J").is_valid());
    }

    #[test]
    fn test_convert_prefers_run() {
        let set = convert_row_to_set(&parse_tiles("R1 R2 R3").unwrap()).unwrap();
        assert!(matches!(set, TileSet::Run(_)));
        let set = convert_row_to_set(&parse_tiles("R5 B5 Y5").unwrap()).unwrap();
        assert!(matches!(set, TileSet::Group(_)));
        // readable both ways; run wins
        let set = convert_row_to_set(&parse_tiles("J J R5").unwrap()).unwrap();
        assert!(matches!(set, TileSet::Run(_)));
        assert_eq!(set.to_string(), "run [J J R5]");
        assert!(convert_row_to_set(&parse_tiles("R1 B7 Y2").unwrap()).is_none());
    }
}
