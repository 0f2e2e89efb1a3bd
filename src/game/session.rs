//! Turn orchestrator
//!
//! A [`Session`] owns the board, pool and seats for one game and is the
//! only thing that mutates them. The host loop feeds it batches, deadline
//! checks, play-again votes and departures one at a time, which is all the
//! serialization the game state needs.
//!
//! Turn lifecycle:
//! `AwaitingBatch -> Validating -> Committed | RolledBack -> RoundCheck -> NextTurn`
//! until a round check finds a winner, then `RoundOver` and eventually
//! `GameOver`.

use super::arbitrator::{execute_batch, Action, BatchError};
use super::board::Board;
use super::player::Player;
use super::pool::Pool;
use super::strategy::TurnView;
use super::tile::Tile;
use super::timer::TurnTimer;
use log::{debug, info, log_enabled, warn, Level};
use rand::prelude::*;
use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};

/// Tiles dealt to every player at the start of a round
pub const HAND_SIZE: usize = 14;

/// Tiles drawn after a rejected batch
pub const REJECT_PENALTY: usize = 1;

/// Tiles drawn after a missed deadline
pub const TIMEOUT_PENALTY: usize = 3;

/// Seats needed to play
pub const MIN_PLAYERS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No round dealt yet
    Waiting,
    AwaitingBatch,
    Validating,
    Committed,
    RolledBack,
    RoundCheck,
    NextTurn,
    /// Round settled, collecting play-again votes
    RoundOver,
    GameOver,
}

/// What happened to the acting player's turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Committed {
        actions: Vec<Action>,
        meld_score: Option<u32>,
    },
    Drew(Tile),
    /// Empty batch with nothing left to draw
    Skipped,
    RolledBack {
        error: BatchError,
        penalty: Vec<Tile>,
    },
    TimedOut {
        penalty: Vec<Tile>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundEndReason {
    EmptyRack,
    /// Pool empty and every seat skipped in a row
    Stalemate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundResult {
    pub winner: String,
    pub reason: RoundEndReason,
    /// Settled round score per seat, in seat order
    pub scores: Vec<(String, i32)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReport {
    pub player: String,
    pub outcome: TurnOutcome,
    /// Set when this turn ended the round
    pub round: Option<RoundResult>,
    /// Whose turn it is now, if the round goes on
    pub next: Option<String>,
    /// Board as this turn left it
    pub board: Board,
    /// The actor's rack as this turn left it, sorted
    pub hand: Vec<Tile>,
}

impl TurnReport {
    /// Actions that reached the board this turn
    pub fn moves(&self) -> &[Action] {
        match &self.outcome {
            TurnOutcome::Committed { actions, .. } => actions,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayAgainOutcome {
    /// Still waiting on other votes
    Waiting,
    NewRound,
    GameOver { winner: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Departure {
    /// The game goes on. `next` is set when the turn moved.
    Continued { next: Option<String> },
    GameOver { winner: Option<String> },
}

/// Requests the session turns down without touching any state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    UnknownPlayer(String),
    NotYourTurn,
    /// Nothing to act on in the current phase
    NotPlaying,
    NotEnoughPlayers,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::UnknownPlayer(name) => write!(f, "unknown player '{}'", name),
            SessionError::NotYourTurn => write!(f, "not your turn"),
            SessionError::NotPlaying => write!(f, "no turn in progress"),
            SessionError::NotEnoughPlayers => {
                write!(f, "at least {} players are needed", MIN_PLAYERS)
            }
        }
    }
}

impl std::error::Error for SessionError {}

pub struct Session {
    players: Vec<Player>,
    board: Board,
    pool: Pool,
    current: usize,
    turn_id: u64,
    phase: Phase,
    timer: TurnTimer,
    turn_timeout: Option<Duration>,
    consecutive_skips: usize,
    pool_empty_at_turn_start: bool,
    rounds_played: u32,
    votes: HashSet<String>,
    last_actor: Option<String>,
    last_moves: Vec<Action>,
    winner: Option<String>,
    rng: StdRng,
}

impl Session {
    /// Seat `players` in the given order. `turn_timeout` of `None`
    /// disables the deadline.
    pub fn new(players: Vec<Player>, turn_timeout: Option<Duration>) -> Self {
        Self::with_rng(players, turn_timeout, StdRng::from_os_rng())
    }

    /// Same as [`Session::new`] with a specific RNG (for testing/seeding).
    pub fn with_rng(players: Vec<Player>, turn_timeout: Option<Duration>, rng: StdRng) -> Self {
        Self {
            players,
            board: Board::new(),
            pool: Pool::full(),
            current: 0,
            turn_id: 0,
            phase: Phase::Waiting,
            timer: TurnTimer::new(),
            turn_timeout,
            consecutive_skips: 0,
            pool_empty_at_turn_start: false,
            rounds_played: 0,
            votes: HashSet::new(),
            last_actor: None,
            last_moves: Vec::new(),
            winner: None,
            rng,
        }
    }

    pub fn player(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.name() == name)
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn rounds_played(&self) -> u32 {
        self.rounds_played
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    pub fn last_actor(&self) -> Option<&str> {
        self.last_actor.as_deref()
    }

    /// Actions the last actor committed, empty if their turn committed
    /// nothing
    pub fn last_moves(&self) -> &[Action] {
        &self.last_moves
    }

    /// The player whose turn it is, while a turn is open
    pub fn current_player(&self) -> Option<&Player> {
        match self.phase {
            Phase::AwaitingBatch => self.players.get(self.current),
            _ => None,
        }
    }

    fn seat_of(&self, name: &str) -> Result<usize, SessionError> {
        self.players
            .iter()
            .position(|p| p.name() == name)
            .ok_or_else(|| SessionError::UnknownPlayer(name.to_string()))
    }

    fn transition(&mut self, next: Phase) {
        debug!("turn {}: {:?} -> {:?}", self.turn_id, self.phase, next);
        self.phase = next;
    }

    /// Reset the table and deal a fresh round. Seat order is kept.
    pub fn start_round(&mut self, now: Instant) -> Result<(), SessionError> {
        if self.players.len() < MIN_PLAYERS {
            return Err(SessionError::NotEnoughPlayers);
        }
        self.pool.refill();
        self.board.clear();
        self.votes.clear();
        self.consecutive_skips = 0;
        self.last_actor = None;
        self.last_moves.clear();
        for player in &mut self.players {
            player.reset_for_round();
            let hand = self.pool.draw_many_with_rng(HAND_SIZE, &mut self.rng);
            player.rack.extend(hand);
        }
        self.current = 0;
        info!(
            "round {} dealt to {} players, {} tiles left in pool",
            self.rounds_played + 1,
            self.players.len(),
            self.pool.len()
        );
        self.begin_turn(now);
        Ok(())
    }

    fn begin_turn(&mut self, now: Instant) {
        self.turn_id += 1;
        self.pool_empty_at_turn_start = self.pool.is_empty();
        self.players[self.current].move_history.clear();
        match self.turn_timeout {
            Some(timeout) => self.timer.arm(self.turn_id, timeout, now),
            None => self.timer.cancel(),
        }
        self.transition(Phase::AwaitingBatch);
        debug!("turn {} belongs to {}", self.turn_id, self.players[self.current].name());
    }

    /// Run one batch for `name`. An empty batch draws, or skips when the
    /// pool is empty.
    ///
    /// A batch arriving after the turn's deadline has passed is refused;
    /// the timeout itself is applied by [`Session::poll_deadline`].
    pub fn submit(
        &mut self,
        name: &str,
        actions: Vec<Action>,
        now: Instant,
    ) -> Result<TurnReport, SessionError> {
        let seat = self.seat_of(name)?;
        if self.phase != Phase::AwaitingBatch {
            return Err(SessionError::NotPlaying);
        }
        if seat != self.current || self.timer.has_expired(now) {
            return Err(SessionError::NotYourTurn);
        }

        self.timer.cancel();
        self.transition(Phase::Validating);
        let outcome = if actions.is_empty() {
            self.draw_or_skip()
        } else {
            self.apply_batch(actions)
        };
        Ok(self.finish_turn(outcome, now))
    }

    fn apply_batch(&mut self, actions: Vec<Action>) -> TurnOutcome {
        let player = &mut self.players[self.current];
        match execute_batch(&self.board, &player.rack, player.made_initial_meld, &actions) {
            Ok(commit) => {
                self.board = commit.board;
                player.rack = commit.rack;
                if commit.meld_score.is_some() {
                    player.made_initial_meld = true;
                }
                player.move_history = actions.clone();
                info!(
                    "{} committed {} actions, placed {} tiles",
                    player.name(),
                    actions.len(),
                    commit.placed.len()
                );
                if log_enabled!(Level::Debug) {
                    for set in self.board.sets().unwrap_or_default() {
                        debug!("  {}", set);
                    }
                }
                self.transition(Phase::Committed);
                self.consecutive_skips = 0;
                TurnOutcome::Committed {
                    actions,
                    meld_score: commit.meld_score,
                }
            }
            Err(error) => {
                warn!(
                    "{} batch rejected ({:?}): {}",
                    player.name(),
                    error.category(),
                    error
                );
                player.move_history.clear();
                let penalty = self.pool.draw_many_with_rng(REJECT_PENALTY, &mut self.rng);
                player.rack.extend(penalty.iter().copied());
                self.transition(Phase::RolledBack);
                self.record_no_commit(!penalty.is_empty());
                TurnOutcome::RolledBack { error, penalty }
            }
        }
    }

    fn draw_or_skip(&mut self) -> TurnOutcome {
        match self.pool.draw_with_rng(&mut self.rng) {
            Some(tile) => {
                self.players[self.current].rack.add(tile);
                self.record_no_commit(true);
                TurnOutcome::Drew(tile)
            }
            None => {
                self.record_no_commit(false);
                TurnOutcome::Skipped
            }
        }
    }

    fn record_no_commit(&mut self, drew: bool) {
        if drew {
            self.consecutive_skips = 0;
        } else if self.pool_empty_at_turn_start {
            self.consecutive_skips += 1;
            self.players[self.current].skipped_turns += 1;
        }
    }

    /// Apply the timeout if the open turn's deadline has passed.
    pub fn poll_deadline(&mut self, now: Instant) -> Option<TurnReport> {
        if self.phase != Phase::AwaitingBatch {
            return None;
        }
        let turn = self.timer.expired(now)?;
        if turn != self.turn_id {
            return None;
        }

        let player = &mut self.players[self.current];
        info!("{} ran out of time on turn {}", player.name(), turn);
        player.move_history.clear();
        let penalty = self.pool.draw_many_with_rng(TIMEOUT_PENALTY, &mut self.rng);
        player.rack.extend(penalty.iter().copied());
        self.record_no_commit(!penalty.is_empty());
        Some(self.finish_turn(TurnOutcome::TimedOut { penalty }, now))
    }

    fn finish_turn(&mut self, outcome: TurnOutcome, now: Instant) -> TurnReport {
        let actor = self.players[self.current].name().to_string();
        let hand = self.players[self.current].rack.sorted();
        let board = self.board.clone();
        self.last_actor = Some(actor.clone());
        self.last_moves = match &outcome {
            TurnOutcome::Committed { actions, .. } => actions.clone(),
            _ => Vec::new(),
        };

        self.transition(Phase::RoundCheck);
        let round = self.round_check();
        let next = if round.is_some() {
            None
        } else {
            self.transition(Phase::NextTurn);
            self.current = (self.current + 1) % self.players.len();
            self.begin_turn(now);
            Some(self.players[self.current].name().to_string())
        };

        TurnReport {
            player: actor,
            outcome,
            round,
            next,
            board,
            hand,
        }
    }

    fn round_check(&mut self) -> Option<RoundResult> {
        if let Some(winner) = self.players.iter().position(Player::has_won) {
            return Some(self.settle_empty_rack(winner));
        }
        if self.pool.is_empty() && self.consecutive_skips >= self.players.len() {
            return Some(self.settle_stalemate());
        }
        None
    }

    /// Every other player pays the value of their rack to the winner.
    fn settle_empty_rack(&mut self, winner: usize) -> RoundResult {
        let mut total = 0;
        for (seat, player) in self.players.iter_mut().enumerate() {
            if seat != winner {
                let value = player.rack.value() as i32;
                player.score = -value;
                total += value;
            }
        }
        self.players[winner].score = total;
        self.finish_round(winner, RoundEndReason::EmptyRack)
    }

    /// Everyone is charged their rack; the best score then collects the
    /// margin over each other player.
    fn settle_stalemate(&mut self) -> RoundResult {
        for player in &mut self.players {
            player.score = -(player.rack.value() as i32);
        }
        let mut winner = 0;
        for (seat, player) in self.players.iter().enumerate() {
            if player.score > self.players[winner].score {
                winner = seat;
            }
        }
        let best = self.players[winner].score;
        let margin: i32 = self.players.iter().map(|p| best - p.score).sum();
        self.players[winner].score += margin;
        self.finish_round(winner, RoundEndReason::Stalemate)
    }

    fn finish_round(&mut self, winner: usize, reason: RoundEndReason) -> RoundResult {
        self.timer.cancel();
        self.players[winner].won_rounds += 1;
        for player in &mut self.players {
            player.fold_score();
        }
        self.rounds_played += 1;
        self.votes = self
            .players
            .iter()
            .filter(|p| p.is_automated())
            .map(|p| p.name().to_string())
            .collect();
        self.transition(Phase::RoundOver);

        let result = RoundResult {
            winner: self.players[winner].name().to_string(),
            reason,
            scores: self
                .players
                .iter()
                .map(|p| (p.name().to_string(), p.score))
                .collect(),
        };
        info!("round {} won by {} ({:?})", self.rounds_played, result.winner, reason);
        result
    }

    /// Record a play-again answer. One `no` ends the game; a new round is
    /// dealt once every seat has said yes.
    pub fn play_again(
        &mut self,
        name: &str,
        again: bool,
        now: Instant,
    ) -> Result<PlayAgainOutcome, SessionError> {
        self.seat_of(name)?;
        if self.phase != Phase::RoundOver {
            return Err(SessionError::NotPlaying);
        }
        if !again {
            info!("{} declined another round", name);
            self.end_game();
            return Ok(PlayAgainOutcome::GameOver {
                winner: self.winner.clone(),
            });
        }
        self.votes.insert(name.to_string());
        if self.all_voted() {
            self.start_round(now)?;
            return Ok(PlayAgainOutcome::NewRound);
        }
        Ok(PlayAgainOutcome::Waiting)
    }

    fn all_voted(&self) -> bool {
        self.players.iter().all(|p| self.votes.contains(p.name()))
    }

    fn end_game(&mut self) {
        self.timer.cancel();
        self.winner = self.game_winner().map(|p| p.name().to_string());
        self.transition(Phase::GameOver);
        info!("game over, winner {:?}", self.winner);
    }

    /// Most rounds won, then highest total score, then earliest seat.
    pub fn game_winner(&self) -> Option<&Player> {
        let mut best: Option<&Player> = None;
        for player in &self.players {
            let better = match best {
                None => true,
                Some(b) => {
                    (player.won_rounds, player.final_score) > (b.won_rounds, b.final_score)
                }
            };
            if better {
                best = Some(player);
            }
        }
        best
    }

    /// Take a seat out of the game. Its rack goes back into the pool.
    pub fn remove_player(&mut self, name: &str, now: Instant) -> Result<Departure, SessionError> {
        let seat = self.seat_of(name)?;
        let mut player = self.players.remove(seat);
        self.pool.put_back(player.rack.drain());
        self.votes.remove(name);
        info!("{} left the game, {} seats remain", name, self.players.len());

        if self.phase == Phase::GameOver {
            return Ok(Departure::GameOver {
                winner: self.winner.clone(),
            });
        }
        if self.phase == Phase::Waiting {
            return Ok(Departure::Continued { next: None });
        }
        if self.players.len() < MIN_PLAYERS {
            self.timer.cancel();
            self.winner = self.players.first().map(|p| p.name().to_string());
            self.transition(Phase::GameOver);
            return Ok(Departure::GameOver {
                winner: self.winner.clone(),
            });
        }

        match self.phase {
            Phase::AwaitingBatch if seat == self.current => {
                self.timer.cancel();
                if self.current >= self.players.len() {
                    self.current = 0;
                }
                self.begin_turn(now);
                Ok(Departure::Continued {
                    next: Some(self.players[self.current].name().to_string()),
                })
            }
            Phase::AwaitingBatch => {
                if seat < self.current {
                    self.current -= 1;
                }
                Ok(Departure::Continued { next: None })
            }
            Phase::RoundOver if self.all_voted() => {
                self.start_round(now)?;
                Ok(Departure::Continued {
                    next: Some(self.players[self.current].name().to_string()),
                })
            }
            _ => Ok(Departure::Continued { next: None }),
        }
    }

    /// Ask the current seat's strategy for a batch. `None` when the seat is
    /// played from outside or no turn is open.
    pub fn automated_batch(&mut self) -> Option<Vec<Action>> {
        if self.phase != Phase::AwaitingBatch {
            return None;
        }
        let player = &mut self.players[self.current];
        if !player.is_automated() {
            return None;
        }
        let rack = player.rack.tiles().to_vec();
        let view = TurnView {
            rack: &rack,
            board: &self.board,
            pool_size: self.pool.len(),
            made_initial_meld: player.made_initial_meld,
        };
        player.decide(&view)
    }

    /// Play automated seats until a remote seat holds the turn or the
    /// round ends.
    pub fn run_automated(&mut self, now: Instant) -> Vec<TurnReport> {
        let mut reports = Vec::new();
        while let Some(actions) = self.automated_batch() {
            let name = self.players[self.current].name().to_string();
            match self.submit(&name, actions, now) {
                Ok(report) => reports.push(report),
                Err(e) => {
                    warn!("automated turn for {} refused: {}", name, e);
                    break;
                }
            }
        }
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::arbitrator::InvalidCode;
    use crate::game::player::Rack;
    use crate::game::tile::parse_tiles;

    const TIMEOUT: Duration = Duration::from_secs(30);

    fn session(names: &[&str], timeout: Option<Duration>) -> (Session, Instant) {
        let players = names.iter().map(|n| Player::remote(*n)).collect();
        let mut session = Session::with_rng(players, timeout, StdRng::seed_from_u64(9));
        let now = Instant::now();
        session.start_round(now).unwrap();
        (session, now)
    }

    fn set_rack(session: &mut Session, seat: usize, tiles: &str) {
        session.players[seat].rack = Rack::from_tiles(parse_tiles(tiles).unwrap());
    }

    fn place_row(s: &str, row: usize) -> Vec<Action> {
        parse_tiles(s)
            .unwrap()
            .into_iter()
            .enumerate()
            .map(|(index, tile)| Action::Place { tile, row, index })
            .collect()
    }

    #[test]
    fn test_start_round_deals_hands() {
        let (session, _) = session(&["alice", "bob", "carol"], None);
        for player in &session.players {
            assert_eq!(player.rack.len(), HAND_SIZE);
        }
        assert_eq!(session.pool.len(), 106 - 3 * HAND_SIZE);
        assert_eq!(session.phase(), Phase::AwaitingBatch);
        assert_eq!(session.current_player().unwrap().name(), "alice");
    }

    #[test]
    fn test_start_needs_two_players() {
        let mut session = Session::new(vec![Player::remote("alice")], None);
        assert_eq!(
            session.start_round(Instant::now()),
            Err(SessionError::NotEnoughPlayers)
        );
    }

    #[test]
    fn test_wrong_player_is_refused() {
        let (mut session, now) = session(&["alice", "bob"], None);
        let before = session.players[1].rack.clone();
        assert_eq!(
            session.submit("bob", vec![], now),
            Err(SessionError::NotYourTurn)
        );
        assert_eq!(
            session.submit("mallory", vec![], now),
            Err(SessionError::UnknownPlayer("mallory".to_string()))
        );
        assert_eq!(session.players[1].rack, before);
        assert_eq!(session.current_player().unwrap().name(), "alice");
    }

    #[test]
    fn test_empty_batch_draws_and_advances() {
        let (mut session, now) = session(&["alice", "bob"], None);
        let pool_before = session.pool.len();
        let report = session.submit("alice", vec![], now).unwrap();
        assert!(matches!(report.outcome, TurnOutcome::Drew(_)));
        assert_eq!(report.next.as_deref(), Some("bob"));
        assert_eq!(session.players[0].rack.len(), HAND_SIZE + 1);
        assert_eq!(session.pool.len(), pool_before - 1);
    }

    #[test]
    fn test_rejected_batch_rolls_back_with_penalty() {
        let (mut session, now) = session(&["alice", "bob"], None);
        set_rack(&mut session, 0, "R1 R2 R3 Y7");
        let board_before = session.board().clone();
        let mut rack_before = session.players[0].rack.sorted();

        let report = session.submit("alice", place_row("R1 R2 R3", 0), now).unwrap();

        let TurnOutcome::RolledBack { error, penalty } = report.outcome else {
            panic!("expected rollback");
        };
        assert_eq!(error.code(), InvalidCode::InsufficientPoints);
        assert_eq!(penalty.len(), REJECT_PENALTY);
        assert_eq!(session.board(), &board_before);
        rack_before.extend(penalty);
        rack_before.sort();
        assert_eq!(session.players[0].rack.sorted(), rack_before);
        assert!(session.players[0].move_history.is_empty());
        assert!(session.last_moves().is_empty());
        assert_eq!(report.next.as_deref(), Some("bob"));
    }

    #[test]
    fn test_rejected_move_and_place_restores_board_and_rack() {
        let (mut session, now) = session(&["alice", "bob"], None);
        let board_before = Board::from_rows(vec![
            parse_tiles("R1 R2 R3 R4").unwrap(),
            parse_tiles("b5 b6 b7").unwrap(),
        ]);
        session.board = board_before.clone();
        session.players[0].made_initial_meld = true;
        set_rack(&mut session, 0, "Y9 R8 R8");
        let mut rack_before = session.players[0].rack.sorted();

        let actions = vec![
            Action::Move {
                from_row: 0,
                tile: "R4".parse().unwrap(),
                to_row: 1,
                index: 3,
            },
            Action::Place {
                tile: "Y9".parse().unwrap(),
                row: 0,
                index: 4,
            },
        ];
        let report = session.submit("alice", actions, now).unwrap();

        let TurnOutcome::RolledBack { error, penalty } = report.outcome else {
            panic!("expected rollback");
        };
        assert_eq!(error.code(), InvalidCode::IllegalAction);
        assert_eq!(session.board(), &board_before);
        assert_eq!(report.board, board_before);
        rack_before.extend(penalty);
        rack_before.sort();
        assert_eq!(session.players[0].rack.sorted(), rack_before);
        assert_eq!(report.hand, rack_before);
    }

    #[test]
    fn test_automated_reports_carry_their_own_board() {
        let players = vec![
            Player::automated("ada"),
            Player::automated("bob"),
            Player::remote("alice"),
        ];
        let mut session = Session::with_rng(players, None, StdRng::seed_from_u64(9));
        let now = Instant::now();
        session.start_round(now).unwrap();
        set_rack(&mut session, 0, "R10 R11 R12 Y1");
        set_rack(&mut session, 1, "b10 b11 b12 Y2");

        let reports = session.run_automated(now);
        assert_eq!(reports.len(), 2);

        assert_eq!(reports[0].player, "ada");
        assert_eq!(reports[0].board.rows(), &[parse_tiles("R10 R11 R12").unwrap()]);
        assert_eq!(reports[0].moves().len(), 3);
        assert_eq!(reports[0].hand, parse_tiles("Y1").unwrap());

        assert_eq!(reports[1].player, "bob");
        assert_eq!(reports[1].board.len(), 2);
        assert_eq!(reports[1].moves().len(), 3);
        assert_ne!(reports[0].moves(), reports[1].moves());
        assert_eq!(reports[1].next.as_deref(), Some("alice"));
    }

    #[test]
    fn test_committed_batch_updates_board() {
        let (mut session, now) = session(&["alice", "bob"], None);
        set_rack(&mut session, 0, "R10 R11 R12 Y7");
        let actions = place_row("R10 R11 R12", 0);
        let report = session.submit("alice", actions.clone(), now).unwrap();

        assert_eq!(
            report.outcome,
            TurnOutcome::Committed {
                actions: actions.clone(),
                meld_score: Some(33)
            }
        );
        assert_eq!(session.board().len(), 1);
        assert!(session.players[0].made_initial_meld);
        assert_eq!(session.players[0].move_history, actions);
        assert_eq!(session.last_actor(), Some("alice"));
        assert_eq!(session.last_moves(), actions.as_slice());
    }

    #[test]
    fn test_timeout_penalizes_and_advances() {
        let (mut session, now) = session(&["alice", "bob"], Some(TIMEOUT));
        assert!(session.poll_deadline(now + Duration::from_secs(29)).is_none());

        let report = session.poll_deadline(now + TIMEOUT).unwrap();
        assert_eq!(report.player, "alice");
        let TurnOutcome::TimedOut { penalty } = report.outcome else {
            panic!("expected timeout");
        };
        assert_eq!(penalty.len(), TIMEOUT_PENALTY);
        assert_eq!(session.players[0].rack.len(), HAND_SIZE + TIMEOUT_PENALTY);
        assert_eq!(session.current_player().unwrap().name(), "bob");

        // late batch from the player who timed out
        assert_eq!(
            session.submit("alice", vec![], now + TIMEOUT),
            Err(SessionError::NotYourTurn)
        );
    }

    #[test]
    fn test_batch_after_deadline_is_refused() {
        let (mut session, now) = session(&["alice", "bob"], Some(TIMEOUT));
        let late = now + TIMEOUT + Duration::from_secs(1);
        assert_eq!(session.submit("alice", vec![], late), Err(SessionError::NotYourTurn));
        assert!(session.poll_deadline(late).is_some());
    }

    #[test]
    fn test_commit_cancels_turn_timer() {
        let (mut session, now) = session(&["alice", "bob"], Some(TIMEOUT));
        let first_turn = session.turn_id;
        session.submit("alice", vec![], now + Duration::from_secs(5)).unwrap();
        assert_ne!(session.turn_id, first_turn);
        // alice's old deadline passes; bob's turn started 5s later
        assert!(session.poll_deadline(now + TIMEOUT).is_none());
        let report = session.poll_deadline(now + TIMEOUT + Duration::from_secs(5)).unwrap();
        assert_eq!(report.player, "bob");
    }

    #[test]
    fn test_no_deadline_when_disabled() {
        let (mut session, now) = session(&["alice", "bob"], None);
        assert!(session.deadline().is_none());
        assert!(session.poll_deadline(now + Duration::from_secs(3600)).is_none());
    }

    #[test]
    fn test_empty_rack_wins_round() {
        let (mut session, now) = session(&["alice", "bob", "carol"], None);
        set_rack(&mut session, 0, "R10 R11 R12");
        set_rack(&mut session, 1, "R1 J");
        set_rack(&mut session, 2, "b4 b5");

        let report = session.submit("alice", place_row("R10 R11 R12", 0), now).unwrap();
        let round = report.round.unwrap();

        assert_eq!(round.winner, "alice");
        assert_eq!(round.reason, RoundEndReason::EmptyRack);
        assert_eq!(
            round.scores,
            vec![
                ("alice".to_string(), 31 + 9),
                ("bob".to_string(), -31),
                ("carol".to_string(), -9)
            ]
        );
        assert_eq!(report.next, None);
        assert_eq!(session.phase(), Phase::RoundOver);
        assert_eq!(session.players[0].won_rounds, 1);
        assert_eq!(session.players[0].final_score, 40);
    }

    #[test]
    fn test_stalemate_after_every_seat_skips() {
        let (mut session, now) = session(&["alice", "bob"], None);
        session.pool = Pool::from_tiles(Vec::new());
        session.begin_turn(now);
        set_rack(&mut session, 0, "R5");
        set_rack(&mut session, 1, "R4 b6");

        let report = session.submit("alice", vec![], now).unwrap();
        assert_eq!(report.outcome, TurnOutcome::Skipped);
        assert!(report.round.is_none());

        let report = session.submit("bob", vec![], now).unwrap();
        let round = report.round.unwrap();
        assert_eq!(round.reason, RoundEndReason::Stalemate);
        assert_eq!(round.winner, "alice");
        // alice -5, bob -10, alice collects the margin of 5
        assert_eq!(
            round.scores,
            vec![("alice".to_string(), 0), ("bob".to_string(), -10)]
        );
    }

    #[test]
    fn test_draw_resets_skip_count() {
        let (mut session, now) = session(&["alice", "bob"], None);
        session.pool = Pool::from_tiles(Vec::new());
        session.begin_turn(now);
        session.submit("alice", vec![], now).unwrap();
        assert_eq!(session.consecutive_skips, 1);

        session.pool.put_back(parse_tiles("Y3").unwrap());
        session.begin_turn(now);
        session.submit("bob", vec![], now).unwrap();
        assert_eq!(session.consecutive_skips, 0);
    }

    #[test]
    fn test_play_again_yes_deals_new_round() {
        let (mut session, now) = session(&["alice", "bob"], None);
        set_rack(&mut session, 0, "R10 R11 R12");
        session.submit("alice", place_row("R10 R11 R12", 0), now).unwrap();

        assert_eq!(session.play_again("alice", true, now), Ok(PlayAgainOutcome::Waiting));
        assert_eq!(session.play_again("bob", true, now), Ok(PlayAgainOutcome::NewRound));
        assert_eq!(session.phase(), Phase::AwaitingBatch);
        assert!(session.board().rows().is_empty());
        assert_eq!(session.players[0].rack.len(), HAND_SIZE);
        assert_eq!(session.players[0].name(), "alice");
        assert_eq!(session.rounds_played(), 1);
    }

    #[test]
    fn test_play_again_no_ends_game() {
        let (mut session, now) = session(&["alice", "bob"], None);
        set_rack(&mut session, 1, "R10 R11 R12");
        session.submit("alice", vec![], now).unwrap();
        session.submit("bob", place_row("R10 R11 R12", 0), now).unwrap();

        let outcome = session.play_again("alice", false, now).unwrap();
        assert_eq!(
            outcome,
            PlayAgainOutcome::GameOver {
                winner: Some("bob".to_string())
            }
        );
        assert_eq!(session.phase(), Phase::GameOver);
    }

    #[test]
    fn test_play_again_outside_round_end() {
        let (mut session, now) = session(&["alice", "bob"], None);
        assert_eq!(
            session.play_again("alice", true, now),
            Err(SessionError::NotPlaying)
        );
    }

    #[test]
    fn test_game_winner_tie_breaks() {
        let (mut session, _) = session(&["alice", "bob", "carol"], None);
        session.players[0].won_rounds = 1;
        session.players[1].won_rounds = 2;
        session.players[2].won_rounds = 2;
        session.players[1].final_score = 10;
        session.players[2].final_score = 25;
        assert_eq!(session.game_winner().unwrap().name(), "carol");

        session.players[2].final_score = 10;
        assert_eq!(session.game_winner().unwrap().name(), "bob");
    }

    #[test]
    fn test_current_player_leaving_advances_turn() {
        let (mut session, now) = session(&["alice", "bob", "carol"], None);
        let pool_before = session.pool.len();
        let departure = session.remove_player("alice", now).unwrap();
        assert_eq!(
            departure,
            Departure::Continued {
                next: Some("bob".to_string())
            }
        );
        assert_eq!(session.pool.len(), pool_before + HAND_SIZE);
        assert_eq!(session.current_player().unwrap().name(), "bob");
    }

    #[test]
    fn test_earlier_seat_leaving_keeps_turn() {
        let (mut session, now) = session(&["alice", "bob", "carol"], None);
        session.submit("alice", vec![], now).unwrap();
        let departure = session.remove_player("alice", now).unwrap();
        assert_eq!(departure, Departure::Continued { next: None });
        assert_eq!(session.current_player().unwrap().name(), "bob");
    }

    #[test]
    fn test_last_opponent_leaving_ends_game() {
        let (mut session, now) = session(&["alice", "bob"], None);
        let departure = session.remove_player("bob", now).unwrap();
        assert_eq!(
            departure,
            Departure::GameOver {
                winner: Some("alice".to_string())
            }
        );
        assert_eq!(session.phase(), Phase::GameOver);
        assert!(session.submit("alice", vec![], now).is_err());
    }

    #[test]
    fn test_automated_seats_play_a_round() {
        let players = vec![Player::automated("bot-1"), Player::automated("bot-2")];
        let mut session = Session::with_rng(players, None, StdRng::seed_from_u64(3));
        let now = Instant::now();
        session.start_round(now).unwrap();

        let reports = session.run_automated(now);
        assert!(!reports.is_empty());
        assert_eq!(session.phase(), Phase::RoundOver);
        assert!(reports.last().unwrap().round.is_some());
        assert!(session.board().is_valid());
        // bots vote yes on their own
        assert!(session.all_voted());
    }

    #[test]
    fn test_automated_stops_at_remote_seat() {
        let (mut session, now) = session(&["alice", "bob"], None);
        assert!(session.automated_batch().is_none());
        assert!(session.run_automated(now).is_empty());
    }
}
