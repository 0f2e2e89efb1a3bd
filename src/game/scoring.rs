//! Point values: meld scoring for the initial-meld gate and the rack
//! penalty charged at the end of a round.

use super::tile::Tile;
use super::validation::Run;

/// Points a player must lay down before their first meld counts
pub const INITIAL_MELD_THRESHOLD: u32 = 30;

/// Value of a joker left on a rack when the round ends
pub const JOKER_PENALTY: u32 = 30;

/// Score a single row.
///
/// Without jokers this is the sum of the numbers. With jokers the row is
/// read as a run when it is run-shaped (each joker worth the number it
/// stands in for) and otherwise as a group (each joker worth the shared
/// number). A 3-tile row holding 2 jokers fits both readings and takes the
/// larger score.
pub fn score_row(row: &[Tile]) -> u32 {
    let numbers: Vec<u32> = row
        .iter()
        .filter(|t| !t.is_joker())
        .map(|t| t.number() as u32)
        .collect();
    let jokers = row.len() - numbers.len();
    let plain: u32 = numbers.iter().sum();

    if jokers == 0 || numbers.is_empty() {
        return plain;
    }

    let run = run_score(row);
    let group = group_score(&numbers, row.len());

    if row.len() == 3 && jokers == 2 {
        return run.unwrap_or(0).max(group.unwrap_or(0));
    }
    run.or(group).unwrap_or(plain)
}

/// Positional run score: a joker before the first known tile scores
/// `first - distance`, every later joker scores one more than the tile
/// before it.
fn run_score(row: &[Tile]) -> Option<u32> {
    let run = Run::new(row.to_vec());
    if !run.is_valid() {
        return None;
    }
    let positions = run.positions()?;
    Some(positions.into_iter().map(|p| p as u32).sum())
}

fn group_score(numbers: &[u32], len: usize) -> Option<u32> {
    let first = *numbers.first()?;
    if numbers.iter().all(|n| *n == first) {
        Some(first * len as u32)
    } else {
        None
    }
}

/// Penalty value of the tiles left on a rack
pub fn rack_value(tiles: &[Tile]) -> u32 {
    tiles
        .iter()
        .map(|t| {
            if t.is_joker() {
                JOKER_PENALTY
            } else {
                t.number() as u32
            }
        })
        .sum()
}
