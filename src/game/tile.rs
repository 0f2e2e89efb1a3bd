//! Tiles, colors and their external token encoding

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lowest number printed on a tile
pub const MIN_NUMBER: u8 = 1;

/// Highest number printed on a tile
pub const MAX_NUMBER: u8 = 13;

/// Copies of every color/number combination in the inventory
pub const COPIES: usize = 2;

/// Jokers in the inventory
pub const JOKERS: usize = 2;

/// Token used for the joker on the wire
pub const JOKER_TOKEN: &str = "J";

/// The full tile inventory: 2 x 13 x 4 numbered tiles plus 2 jokers.
pub static INVENTORY: Lazy<Vec<Tile>> = Lazy::new(|| {
    let mut tiles = Vec::with_capacity(COPIES * TileColor::ALL.len() * MAX_NUMBER as usize + JOKERS);
    for number in MIN_NUMBER..=MAX_NUMBER {
        for color in TileColor::ALL {
            for _ in 0..COPIES {
                tiles.push(Tile::new(number, color));
            }
        }
    }
    tiles.extend(std::iter::repeat(Tile::joker()).take(JOKERS));
    tiles
});

/// One of the four tile colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TileColor {
    Black,
    Blue,
    Yellow,
    Red,
}

impl TileColor {
    pub const ALL: [TileColor; 4] = [
        TileColor::Black,
        TileColor::Blue,
        TileColor::Yellow,
        TileColor::Red,
    ];

    /// Single-character encoding. Case matters: `B` is black, `b` is blue.
    pub fn as_char(self) -> char {
        match self {
            TileColor::Black => 'B',
            TileColor::Blue => 'b',
            TileColor::Yellow => 'Y',
            TileColor::Red => 'R',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'B' => Some(TileColor::Black),
            'b' => Some(TileColor::Blue),
            'Y' => Some(TileColor::Yellow),
            'R' => Some(TileColor::Red),
            _ => None,
        }
    }
}

/// A single tile.
///
/// Tiles are plain values: two tiles with the same number and color are
/// interchangeable, and nothing tracks which physical copy is which. The
/// joker is the colorless tile numbered zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tile {
    number: u8,
    color: Option<TileColor>,
}

impl Tile {
    /// Create a numbered tile. Callers are expected to pass 1..=13; use
    /// [`Tile::from_str`] for untrusted input.
    pub const fn new(number: u8, color: TileColor) -> Self {
        Self {
            number,
            color: Some(color),
        }
    }

    pub const fn joker() -> Self {
        Self {
            number: 0,
            color: None,
        }
    }

    pub fn is_joker(&self) -> bool {
        self.number == 0 && self.color.is_none()
    }

    /// Printed number, 0 for the joker
    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn color(&self) -> Option<TileColor> {
        self.color
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.color {
            Some(color) => write!(f, "{}{}", color.as_char(), self.number),
            None => f.write_str(JOKER_TOKEN),
        }
    }
}

/// Error returned when a tile token cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileParseError {
    /// Token was empty
    Empty,
    /// First character is not a known color
    UnknownColor(char),
    /// Number part is missing, not numeric, or outside 1..=13
    BadNumber(String),
}

impl fmt::Display for TileParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileParseError::Empty => write!(f, "empty tile token"),
            TileParseError::UnknownColor(c) => write!(f, "unknown tile color '{}'", c),
            TileParseError::BadNumber(s) => {
                write!(f, "tile number must be {}-{}, got '{}'", MIN_NUMBER, MAX_NUMBER, s)
            }
        }
    }
}

impl std::error::Error for TileParseError {}

impl FromStr for Tile {
    type Err = TileParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == JOKER_TOKEN {
            return Ok(Tile::joker());
        }
        let mut chars = s.chars();
        let first = chars.next().ok_or(TileParseError::Empty)?;
        let color = TileColor::from_char(first).ok_or(TileParseError::UnknownColor(first))?;
        let rest = chars.as_str();
        // canonical decimal only: no sign, no leading zero
        if rest.is_empty() || rest.starts_with('0') || !rest.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TileParseError::BadNumber(rest.to_string()));
        }
        let number: u8 = rest
            .parse()
            .map_err(|_| TileParseError::BadNumber(rest.to_string()))?;
        if !(MIN_NUMBER..=MAX_NUMBER).contains(&number) {
            return Err(TileParseError::BadNumber(rest.to_string()));
        }
        Ok(Tile::new(number, color))
    }
}

impl TryFrom<String> for Tile {
    type Error = TileParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Tile> for String {
    fn from(tile: Tile) -> Self {
        tile.to_string()
    }
}

/// Parse a whitespace/comma separated list of tokens, e.g. `"R1 R2 J"`.
#[cfg(test)]
pub fn parse_tiles(s: &str) -> Result<Vec<Tile>, TileParseError> {
    s.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(str::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_size() {
        assert_eq!(INVENTORY.len(), 106);
        assert_eq!(INVENTORY.iter().filter(|t| t.is_joker()).count(), 2);
        let red_fives = INVENTORY
            .iter()
            .filter(|t| **t == Tile::new(5, TileColor::Red))
            .count();
        assert_eq!(red_fives, 2);
    }

    #[test]
    fn test_joker_sentinel() {
        let joker = Tile::joker();
        assert!(joker.is_joker());
        assert_eq!(joker.number(), 0);
        assert_eq!(joker.color(), None);
        assert!(!Tile::new(1, TileColor::Blue).is_joker());
    }

    #[test]
    fn test_token_encoding() {
        assert_eq!(Tile::new(5, TileColor::Red).to_string(), "R5");
        assert_eq!(Tile::new(13, TileColor::Blue).to_string(), "b13");
        assert_eq!(Tile::new(1, TileColor::Black).to_string(), "B1");
        assert_eq!(Tile::new(9, TileColor::Yellow).to_string(), "Y9");
        assert_eq!(Tile::joker().to_string(), "J");
    }

    #[test]
    fn test_parse_distinguishes_blue_and_black() {
        assert_eq!("b4".parse::<Tile>().unwrap().color(), Some(TileColor::Blue));
        assert_eq!("B4".parse::<Tile>().unwrap().color(), Some(TileColor::Black));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<Tile>(), Err(TileParseError::Empty));
        assert_eq!("G3".parse::<Tile>(), Err(TileParseError::UnknownColor('G')));
        assert!(matches!("R14".parse::<Tile>(), Err(TileParseError::BadNumber(_))));
        assert!(matches!("R0".parse::<Tile>(), Err(TileParseError::BadNumber(_))));
        assert!(matches!("R".parse::<Tile>(), Err(TileParseError::BadNumber(_))));
    }

    #[test]
    fn test_parse_rejects_non_canonical_numbers() {
        for token in ["R+5", "R05", "b013", "Y 5", "R5 ", "R-1", "R1x", "R٣"] {
            assert!(
                matches!(token.parse::<Tile>(), Err(TileParseError::BadNumber(_))),
                "{:?} should not parse",
                token
            );
        }
        assert_eq!(" R5".parse::<Tile>(), Err(TileParseError::UnknownColor(' ')));
        assert_eq!("R5".parse::<Tile>(), Ok(Tile::new(5, TileColor::Red)));
        assert_eq!("b13".parse::<Tile>(), Ok(Tile::new(13, TileColor::Blue)));
        assert!(serde_json::from_str::<Tile>(r#""R+5""#).is_err());
        assert!(serde_json::from_str::<Tile>(r#""R05""#).is_err());
    }

    #[test]
    fn test_parse_tiles_list() {
        let tiles = parse_tiles("R1, R2 J").unwrap();
        assert_eq!(
            tiles,
            vec![Tile::new(1, TileColor::Red), Tile::new(2, TileColor::Red), Tile::joker()]
        );
    }

    #[test]
    fn test_serde_uses_token() {
        let json = serde_json::to_string(&vec![Tile::new(7, TileColor::Yellow), Tile::joker()]).unwrap();
        assert_eq!(json, r#"["Y7","J"]"#);
        let back: Vec<Tile> = serde_json::from_str(&json).unwrap();
        assert_eq!(back[0], Tile::new(7, TileColor::Yellow));
        assert!(serde_json::from_str::<Tile>(r#""X1""#).is_err());
    }
}
