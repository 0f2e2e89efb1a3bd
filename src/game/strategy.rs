//! Who decides a seat's batch: the network, or a built-in agent

use super::arbitrator::Action;
use super::board::Board;
use super::scoring::{score_row, INITIAL_MELD_THRESHOLD};
use super::tile::{Tile, TileColor, MAX_NUMBER, MIN_NUMBER};
use super::validation::convert_row_to_set;
use std::cmp::Reverse;
use std::fmt;

/// What a strategy may look at when deciding a turn
#[derive(Debug, Clone, Copy)]
pub struct TurnView<'a> {
    pub rack: &'a [Tile],
    pub board: &'a Board,
    pub pool_size: usize,
    pub made_initial_meld: bool,
}

/// Decides the next batch for a seat.
pub trait Strategy: Send + fmt::Debug {
    /// The batch to submit, or `None` when it will arrive from outside.
    /// An empty batch means draw.
    fn decide(&mut self, view: &TurnView<'_>) -> Option<Vec<Action>>;

    fn is_automated(&self) -> bool {
        true
    }
}

/// A human on the other end of a connection.
#[derive(Debug, Default, Clone, Copy)]
pub struct RemoteStrategy;

impl Strategy for RemoteStrategy {
    fn decide(&mut self, _view: &TurnView<'_>) -> Option<Vec<Action>> {
        None
    }

    fn is_automated(&self) -> bool {
        false
    }
}

/// Lays down whatever sets its rack forms on its own, as new rows.
///
/// Before the initial meld it only plays once the sets it found reach the
/// threshold; otherwise it draws.
#[derive(Debug, Default, Clone, Copy)]
pub struct GreedyStrategy;

impl Strategy for GreedyStrategy {
    fn decide(&mut self, view: &TurnView<'_>) -> Option<Vec<Action>> {
        let mut sets = find_sets(view.rack);

        if !view.made_initial_meld {
            sets.sort_by_key(|set| Reverse(score_row(set)));
            let mut total = 0;
            let mut chosen = Vec::new();
            for set in sets {
                if total >= INITIAL_MELD_THRESHOLD {
                    break;
                }
                total += score_row(&set);
                chosen.push(set);
            }
            if total < INITIAL_MELD_THRESHOLD {
                return Some(Vec::new());
            }
            sets = chosen;
        }

        Some(place_as_new_rows(&sets, view.board.len()))
    }
}

/// Actions laying each set down as a fresh row after the existing ones
pub fn place_as_new_rows(sets: &[Vec<Tile>], first_row: usize) -> Vec<Action> {
    sets.iter()
        .enumerate()
        .flat_map(|(k, set)| {
            set.iter().enumerate().map(move |(index, tile)| Action::Place {
                tile: *tile,
                row: first_row + k,
                index,
            })
        })
        .collect()
}

/// Partition a rack into sets, groups first and then runs.
///
/// Jokers are only spent to bridge a single missing number or to bring a
/// set from 2 tiles up to 3. Every returned set is valid on its own and no
/// rack tile is used twice.
pub fn find_sets(rack: &[Tile]) -> Vec<Vec<Tile>> {
    let mut remaining: Vec<Tile> = rack.iter().filter(|t| !t.is_joker()).copied().collect();
    let mut jokers = rack.len() - remaining.len();
    let mut sets = Vec::new();

    for number in (MIN_NUMBER..=MAX_NUMBER).rev() {
        let mut colors: Vec<TileColor> = remaining
            .iter()
            .filter(|t| t.number() == number)
            .filter_map(|t| t.color())
            .collect();
        colors.sort();
        colors.dedup();

        if colors.len() < 2 || (colors.len() == 2 && jokers == 0) {
            continue;
        }
        let mut set: Vec<Tile> = colors.iter().take(4).map(|c| Tile::new(number, *c)).collect();
        let mut used = 0;
        if set.len() < 3 {
            set.push(Tile::joker());
            used = 1;
        }
        if convert_row_to_set(&set).is_some() {
            jokers -= used;
            remove_all(&mut remaining, &set);
            sets.push(set);
        }
    }

    for color in TileColor::ALL {
        let mut numbers: Vec<u8> = remaining
            .iter()
            .filter(|t| t.color() == Some(color))
            .map(|t| t.number())
            .collect();
        numbers.sort();
        numbers.dedup();

        let mut i = 0;
        while i < numbers.len() {
            let mut run = vec![Tile::new(numbers[i], color)];
            let mut last = numbers[i];
            let mut used = 0;
            let mut j = i + 1;
            while j < numbers.len() {
                if numbers[j] == last + 1 {
                    run.push(Tile::new(numbers[j], color));
                } else if numbers[j] == last + 2 && used < jokers {
                    run.push(Tile::joker());
                    run.push(Tile::new(numbers[j], color));
                    used += 1;
                } else {
                    break;
                }
                last = numbers[j];
                j += 1;
            }
            if run.len() == 2 && used < jokers {
                if last < MAX_NUMBER {
                    run.push(Tile::joker());
                } else {
                    run.insert(0, Tile::joker());
                }
                used += 1;
            }
            if run.len() >= 3 && convert_row_to_set(&run).is_some() {
                jokers -= used;
                remove_all(&mut remaining, &run);
                sets.push(run);
            }
            i = j;
        }
    }

    sets
}

fn remove_all(remaining: &mut Vec<Tile>, set: &[Tile]) {
    for tile in set.iter().filter(|t| !t.is_joker()) {
        if let Some(index) = remaining.iter().position(|t| t == tile) {
            remaining.remove(index);
        }
    }
}
