//! Lobby management for multiplayer games
//!
//! Handles:
//! - Hosting a table (server + optional mDNS advertisement)
//! - Seating players and starting the game once everyone is ready
//! - Driving the authoritative session from network input
//! - A headless client that plays the greedy strategy over the wire

use crate::config::Config;
use crate::game::session::Phase;
use crate::game::{
    Action, Board, GreedyStrategy, InvalidCode, Player, Session, SessionError, Strategy, Tile,
    TurnOutcome, TurnReport, TurnView,
};
use crate::game::{Departure, PlayAgainOutcome};
use crate::network::{Client, ErrorCode, Message, Server, ServerEvent, ServiceDiscovery};
use log::{debug, info, warn};
use rand::prelude::*;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

/// Longest accepted player name
pub const MAX_NAME_LEN: usize = 16;

/// A seat at the table before and during a game
#[derive(Debug, Clone)]
pub struct Seat {
    pub name: String,
    pub ready: bool,
    /// Connection playing this seat; `None` for an automated seat
    pub addr: Option<SocketAddr>,
}

impl Seat {
    pub fn is_automated(&self) -> bool {
        self.addr.is_none()
    }
}

/// Events from the lobby
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyEvent {
    /// We were given a seat
    Seated { players: Vec<String> },
    /// The host turned us away
    Refused(ErrorCode),
    /// A player joined the lobby
    PlayerJoined(String),
    /// A player left the lobby
    PlayerLeft(String),
    PlayerReady(String),
    GameStarted { players: Vec<String> },
    /// A new round was dealt
    RoundStarted { round: u32 },
    /// One turn was resolved
    TurnPlayed(TurnReport),
    RoundEnded { scores: Vec<(String, i32)> },
    GameEnded { winner: Option<String> },
    /// Connection was lost
    Disconnected,
}

/// Names are 1-16 characters of letters, digits, `_` or `-`
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().count() <= MAX_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// A hosted table (server side)
pub struct HostedLobby {
    config: Config,
    /// TCP server for connections
    server: Server,
    /// mDNS service discovery, when advertising
    discovery: Option<ServiceDiscovery>,
    /// Seats in join order, automated seats first
    seats: Vec<Seat>,
    /// The running game, if any
    session: Option<Session>,
    /// Mapping from socket address to player name
    addr_to_player: HashMap<SocketAddr, String>,
    /// Mapping from player name to socket address
    player_to_addr: HashMap<String, SocketAddr>,
}

impl HostedLobby {
    /// Start listening and seat the configured bots
    pub fn new(config: Config) -> Result<Self, String> {
        let server = Server::start_on_port(config.port)
            .map_err(|e| format!("Failed to start server: {}", e))?;
        let port = server.port();

        let discovery = if config.advertise {
            let instance = format!("rummikub-{:08x}", rand::rng().random::<u32>());
            let mut discovery = ServiceDiscovery::new()?;
            discovery.advertise(&instance, &config.table_name, port)?;
            info!("advertising table '{}' as {}", config.table_name, instance);
            Some(discovery)
        } else {
            None
        };

        let seats = config
            .bots
            .iter()
            .map(|name| Seat {
                name: name.clone(),
                ready: true,
                addr: None,
            })
            .collect();

        Ok(Self {
            config,
            server,
            discovery,
            seats,
            session: None,
            addr_to_player: HashMap::new(),
            player_to_addr: HashMap::new(),
        })
    }

    /// Get the port the table is listening on
    pub fn port(&self) -> u16 {
        self.server.port()
    }

    #[cfg(test)]
    pub fn seats(&self) -> &[Seat] {
        &self.seats
    }

    #[cfg(test)]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.server.is_running()
    }

    /// Run one iteration of the host loop
    pub fn poll(&mut self, now: Instant) -> Vec<LobbyEvent> {
        let mut events = Vec::new();

        // The deadline is checked before any input so a late batch
        // cannot slip in after the turn expired
        let expired = self.session.as_mut().and_then(|s| s.poll_deadline(now));
        if let Some(report) = expired {
            self.publish_turn(report, &mut events);
        }

        for event in self.server.poll() {
            match event {
                ServerEvent::PeerConnected { addr } => {
                    debug!("connection from {} ({} open)", addr, self.server.peer_count());
                }
                ServerEvent::PeerDisconnected { addr, .. } => {
                    if let Some(name) = self.addr_to_player.get(&addr).cloned() {
                        self.handle_departure(&name, now, &mut events);
                    }
                }
                ServerEvent::Malformed { from, reason } => {
                    debug!("malformed message from {}: {}", from, reason);
                    self.refuse(from, ErrorCode::UnsupportedCommand);
                }
                ServerEvent::MessageReceived { from, message, .. } => {
                    self.handle_message(from, message, now, &mut events);
                }
            }
        }

        self.drive_automated(now, &mut events);
        events
    }

    fn handle_message(
        &mut self,
        from: SocketAddr,
        message: Message,
        now: Instant,
        events: &mut Vec<LobbyEvent>,
    ) {
        match message {
            Message::Hello { name } => self.handle_hello(from, name, events),
            Message::Ready { name } => {
                if self.seated_name(from) != Some(name.as_str()) {
                    self.refuse(from, ErrorCode::PlayerUnknown);
                    return;
                }
                if let Some(seat) = self.seats.iter_mut().find(|s| s.name == name) {
                    if !seat.ready {
                        seat.ready = true;
                        events.push(LobbyEvent::PlayerReady(name));
                    }
                }
                self.try_start(now, events);
            }
            Message::MoveBatch { actions } => self.handle_batch(from, actions, now, events),
            Message::PlayAgain { again } => self.handle_play_again(from, again, now, events),
            Message::Disconnect { name } => {
                if self.seated_name(from) == Some(name.as_str()) {
                    self.handle_departure(&name, now, events);
                    self.server.disconnect(from);
                } else {
                    self.refuse(from, ErrorCode::PlayerUnknown);
                }
            }
            other => {
                debug!("{} sent a host-only message: {:?}", from, other);
                self.refuse(from, ErrorCode::UnsupportedCommand);
            }
        }
    }

    fn handle_hello(&mut self, from: SocketAddr, name: String, events: &mut Vec<LobbyEvent>) {
        if self.seated_name(from) == Some(name.as_str()) {
            // repeated hello from a seated connection
            self.welcome(from, &name);
            return;
        }

        let refusal = if !is_valid_name(&name) || self.addr_to_player.contains_key(&from) {
            Some(ErrorCode::InvalidName)
        } else if self.session.is_some() {
            Some(ErrorCode::GameInProgress)
        } else if self.seats.iter().any(|s| s.name == name) {
            Some(ErrorCode::NameTaken)
        } else if self.seats.len() >= self.config.max_players {
            Some(ErrorCode::LobbyFull)
        } else {
            None
        };
        if let Some(code) = refusal {
            info!("refused seat '{}' from {}: {:?}", name, from, code);
            self.refuse(from, code);
            return;
        }

        self.seats.push(Seat {
            name: name.clone(),
            ready: false,
            addr: Some(from),
        });
        self.addr_to_player.insert(from, name.clone());
        self.player_to_addr.insert(name.clone(), from);
        self.server.set_player_name(from, &name);
        info!("{} took seat {} from {}", name, self.seats.len(), from);

        self.welcome(from, &name);
        self.server
            .broadcast_except(Some(from), &Message::PlayerJoined { name: name.clone() });
        events.push(LobbyEvent::PlayerJoined(name));
    }

    fn welcome(&self, to: SocketAddr, name: &str) {
        let msg = Message::Welcome {
            name: name.to_string(),
            players: self.seat_names(),
        };
        if let Err(e) = self.server.send_to(to, &msg) {
            warn!("could not welcome {}: {}", name, e);
        }
    }

    fn handle_batch(
        &mut self,
        from: SocketAddr,
        actions: Vec<Action>,
        now: Instant,
        events: &mut Vec<LobbyEvent>,
    ) {
        let Some(name) = self.seated_name(from).map(str::to_string) else {
            self.refuse(from, ErrorCode::PlayerUnknown);
            return;
        };
        let Some(session) = self.session.as_mut() else {
            self.reject(from, InvalidCode::NotPlaying);
            return;
        };
        match session.submit(&name, actions, now) {
            Ok(report) => self.publish_turn(report, events),
            Err(e) => {
                debug!("batch from {} refused: {}", name, e);
                self.answer_session_error(from, e);
            }
        }
    }

    fn handle_play_again(
        &mut self,
        from: SocketAddr,
        again: bool,
        now: Instant,
        events: &mut Vec<LobbyEvent>,
    ) {
        let Some(name) = self.seated_name(from).map(str::to_string) else {
            self.refuse(from, ErrorCode::PlayerUnknown);
            return;
        };
        let Some(session) = self.session.as_mut() else {
            self.reject(from, InvalidCode::NotPlaying);
            return;
        };
        match session.play_again(&name, again, now) {
            Ok(PlayAgainOutcome::Waiting) => {}
            Ok(PlayAgainOutcome::NewRound) => self.announce_round(events),
            Ok(PlayAgainOutcome::GameOver { winner }) => self.finish_game(winner, events),
            Err(e) => self.answer_session_error(from, e),
        }
    }

    fn handle_departure(&mut self, name: &str, now: Instant, events: &mut Vec<LobbyEvent>) {
        if let Some(addr) = self.player_to_addr.remove(name) {
            self.addr_to_player.remove(&addr);
        }
        self.seats.retain(|s| s.name != name);
        info!("{} left the table", name);
        self.server.broadcast(&Message::PlayerLeft {
            name: name.to_string(),
        });
        events.push(LobbyEvent::PlayerLeft(name.to_string()));

        let Some(session) = self.session.as_mut() else {
            return;
        };
        let before = session.phase();
        match session.remove_player(name, now) {
            Ok(Departure::GameOver { winner }) => self.finish_game(winner, events),
            Ok(Departure::Continued { next }) => {
                if !self.seats.iter().any(|s| !s.is_automated()) {
                    let winner = self
                        .session
                        .as_ref()
                        .and_then(|s| s.game_winner())
                        .map(|p| p.name().to_string());
                    info!("no players left at the table, ending the game");
                    self.finish_game(winner, events);
                } else if before == Phase::RoundOver && next.is_some() {
                    // the departure completed the play-again vote
                    self.announce_round(events);
                } else if let Some(next) = next {
                    self.server.broadcast(&Message::Turn { player: next });
                }
            }
            Err(e) => warn!("could not remove {} from the game: {}", name, e),
        }
    }

    /// Start the game once enough seats are filled and all are ready
    fn try_start(&mut self, now: Instant, events: &mut Vec<LobbyEvent>) {
        if self.session.is_some()
            || self.seats.len() < self.config.min_players
            || !self.seats.iter().all(|s| s.ready)
        {
            return;
        }

        let players = self
            .seats
            .iter()
            .map(|seat| {
                if seat.is_automated() {
                    Player::automated(seat.name.clone())
                } else {
                    Player::remote(seat.name.clone())
                }
            })
            .collect();
        let mut session = Session::new(players, self.config.turn_timeout());
        if let Err(e) = session.start_round(now) {
            warn!("could not start the game: {}", e);
            return;
        }
        self.session = Some(session);

        let names = self.seat_names();
        info!("game starting with {}", names.join(", "));
        self.server.broadcast(&Message::GameStart {
            players: names.clone(),
        });
        events.push(LobbyEvent::GameStarted { players: names });
        self.announce_round(events);
    }

    /// Deal view for a fresh round: every hand, the empty board, first turn
    fn announce_round(&self, events: &mut Vec<LobbyEvent>) {
        let Some(session) = &self.session else {
            return;
        };
        for seat in &self.seats {
            self.send_hand(&seat.name);
        }
        self.server.broadcast(&board_message(session));
        if let Some(player) = session.current_player() {
            self.server.broadcast(&Message::Turn {
                player: player.name().to_string(),
            });
        }
        events.push(LobbyEvent::RoundStarted {
            round: session.rounds_played() + 1,
        });
    }

    /// Tell everyone what a turn did, from the state that turn left
    fn publish_turn(&self, report: TurnReport, events: &mut Vec<LobbyEvent>) {
        self.server.broadcast(&Message::Board {
            rows: report.board.rows().to_vec(),
            last_actor: Some(report.player.clone()),
            last_moves: report.moves().to_vec(),
        });
        self.send_to_player(
            &report.player,
            &Message::Hand {
                tiles: report.hand.clone(),
            },
        );

        match &report.outcome {
            TurnOutcome::TimedOut { .. } => {
                self.server.broadcast(&Message::Timeout {
                    player: report.player.clone(),
                });
            }
            TurnOutcome::RolledBack { error, .. } => {
                if let Some(&addr) = self.player_to_addr.get(&report.player) {
                    self.reject(addr, error.code());
                }
            }
            _ => {}
        }

        if let Some(round) = &report.round {
            self.server.broadcast(&Message::RoundEnd {
                scores: round.scores.clone(),
            });
        }
        if let Some(next) = &report.next {
            self.server.broadcast(&Message::Turn {
                player: next.clone(),
            });
        }

        let round_scores = report.round.as_ref().map(|r| r.scores.clone());
        events.push(LobbyEvent::TurnPlayed(report));
        if let Some(scores) = round_scores {
            events.push(LobbyEvent::RoundEnded { scores });
        }
    }

    /// Let automated seats play until a remote seat holds the turn
    fn drive_automated(&mut self, now: Instant, events: &mut Vec<LobbyEvent>) {
        let reports = match self.session.as_mut() {
            Some(session) => session.run_automated(now),
            None => return,
        };
        for report in reports {
            self.publish_turn(report, events);
        }
    }

    fn finish_game(&mut self, winner: Option<String>, events: &mut Vec<LobbyEvent>) {
        info!("game over, winner {:?}", winner);
        self.server.broadcast(&Message::GameEnd {
            winner: winner.clone(),
        });
        self.session = None;
        // people at the table have to ready up again for the next game
        for seat in self.seats.iter_mut().filter(|s| !s.is_automated()) {
            seat.ready = false;
        }
        events.push(LobbyEvent::GameEnded { winner });
    }

    fn send_hand(&self, name: &str) {
        let Some(player) = self.session.as_ref().and_then(|s| s.player(name)) else {
            return;
        };
        self.send_to_player(
            name,
            &Message::Hand {
                tiles: player.rack.sorted(),
            },
        );
    }

    /// Unicast to a seated connection; automated seats have none
    fn send_to_player(&self, name: &str, msg: &Message) {
        let Some(&addr) = self.player_to_addr.get(name) else {
            return;
        };
        if let Err(e) = self.server.send_to(addr, msg) {
            warn!("could not send to {}: {}", name, e);
        }
    }

    fn answer_session_error(&self, to: SocketAddr, error: SessionError) {
        match error {
            SessionError::UnknownPlayer(_) => self.refuse(to, ErrorCode::PlayerUnknown),
            SessionError::NotYourTurn => self.reject(to, InvalidCode::NotYourTurn),
            SessionError::NotPlaying | SessionError::NotEnoughPlayers => {
                self.reject(to, InvalidCode::NotPlaying)
            }
        }
    }

    fn refuse(&self, to: SocketAddr, code: ErrorCode) {
        let _ = self.server.send_to(to, &Message::Error { code });
    }

    fn reject(&self, to: SocketAddr, code: InvalidCode) {
        let _ = self.server.send_to(to, &Message::Invalid { code });
    }

    fn seated_name(&self, addr: SocketAddr) -> Option<&str> {
        self.addr_to_player.get(&addr).map(String::as_str)
    }

    fn seat_names(&self) -> Vec<String> {
        self.seats.iter().map(|s| s.name.clone()).collect()
    }

    /// Clean up and stop the lobby
    pub fn shutdown(mut self) -> Result<(), String> {
        self.server.stop();
        if let Some(mut discovery) = self.discovery.take() {
            discovery.stop_advertising()?;
            discovery.shutdown()?;
        }
        Ok(())
    }
}

fn board_message(session: &Session) -> Message {
    Message::Board {
        rows: session.board().rows().to_vec(),
        last_actor: session.last_actor().map(str::to_string),
        last_moves: session.last_moves().to_vec(),
    }
}

/// A joined table (client side), played by the greedy strategy
pub struct JoinedLobby {
    /// Connection to the host
    client: Client,
    strategy: GreedyStrategy,
    rack: Vec<Tile>,
    board: Board,
    made_initial_meld: bool,
    rounds_played: u32,
    /// Rounds to play before answering no to play-again
    max_rounds: u32,
    seated: bool,
    finished: bool,
}

impl JoinedLobby {
    /// Connect to a host and ask for a seat
    pub fn join(addr: SocketAddr, player_name: String, max_rounds: u32) -> Result<Self, String> {
        let client = Client::connect_addr(addr, player_name)
            .map_err(|e| format!("Failed to connect: {}", e))?;
        Self::with_client(client, max_rounds)
    }

    /// Same as [`JoinedLobby::join`] from an address string
    pub fn connect(addr: &str, player_name: String, max_rounds: u32) -> Result<Self, String> {
        let client =
            Client::connect(addr, player_name).map_err(|e| format!("Failed to connect: {}", e))?;
        Self::with_client(client, max_rounds)
    }

    fn with_client(mut client: Client, max_rounds: u32) -> Result<Self, String> {
        client
            .hello()
            .map_err(|e| format!("Failed to join: {}", e))?;
        Ok(Self {
            client,
            strategy: GreedyStrategy,
            rack: Vec::new(),
            board: Board::new(),
            made_initial_meld: false,
            rounds_played: 0,
            max_rounds: max_rounds.max(1),
            seated: false,
            finished: false,
        })
    }

    pub fn player_name(&self) -> &str {
        self.client.player_name()
    }

    pub fn rounds_played(&self) -> u32 {
        self.rounds_played
    }

    /// True once the game ended or the host turned us away
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Poll for lobby events, playing our turns as they come up
    pub fn poll(&mut self) -> Vec<LobbyEvent> {
        let mut events = Vec::new();

        // Check if still connected
        if !self.client.is_connected() {
            self.finished = true;
            events.push(LobbyEvent::Disconnected);
            return events;
        }

        for msg in self.client.poll() {
            match msg {
                Message::Welcome { players, .. } => {
                    self.seated = true;
                    if let Err(e) = self.client.ready() {
                        warn!("could not send ready: {}", e);
                    }
                    events.push(LobbyEvent::Seated { players });
                }
                Message::PlayerJoined { name } => {
                    events.push(LobbyEvent::PlayerJoined(name));
                }
                Message::PlayerLeft { name } => {
                    events.push(LobbyEvent::PlayerLeft(name));
                }
                Message::GameStart { players } => {
                    events.push(LobbyEvent::GameStarted { players });
                }
                Message::Hand { tiles } => {
                    self.rack = tiles;
                }
                Message::Board {
                    rows,
                    last_actor,
                    last_moves,
                } => {
                    self.board = Board::from_rows(rows);
                    match last_actor {
                        // a fresh deal
                        None => self.made_initial_meld = false,
                        Some(actor) if actor == self.player_name() && !last_moves.is_empty() => {
                            self.made_initial_meld = true;
                        }
                        Some(_) => {}
                    }
                }
                Message::Turn { player } => {
                    if player == self.player_name() {
                        self.take_turn();
                    }
                }
                Message::RoundEnd { scores } => {
                    self.rounds_played += 1;
                    let again = self.rounds_played < self.max_rounds;
                    if let Err(e) = self.client.play_again(again) {
                        warn!("could not answer play-again: {}", e);
                    }
                    events.push(LobbyEvent::RoundEnded { scores });
                }
                Message::GameEnd { winner } => {
                    self.finished = true;
                    events.push(LobbyEvent::GameEnded { winner });
                }
                Message::Timeout { player } => {
                    debug!("{} timed out", player);
                }
                Message::Invalid { code } => {
                    warn!("host rejected our request: {:?}", code);
                }
                Message::Error { code } => {
                    warn!("host refused us: {:?}", code);
                    if !self.seated {
                        self.finished = true;
                        events.push(LobbyEvent::Refused(code));
                    }
                }
                other => debug!("ignoring {:?}", other),
            }
        }

        events
    }

    fn take_turn(&mut self) {
        let view = TurnView {
            rack: &self.rack,
            board: &self.board,
            pool_size: 0,
            made_initial_meld: self.made_initial_meld,
        };
        let actions = self.strategy.decide(&view).unwrap_or_default();
        debug!("playing {} actions", actions.len());
        if let Err(e) = self.client.send_moves(actions) {
            warn!("could not send moves: {}", e);
        }
    }

    /// Leave the table
    pub fn leave(self) {
        let _ = self.client.leave();
    }
}
