//! Network protocol message types
//!
//! Length-prefixed JSON messages over TCP: a 4-byte big-endian length
//! followed by the serde-encoded body.

use crate::game::{Action, InvalidCode, Tile};
use serde::{Deserialize, Serialize};
use std::io::{self, Read};

/// Largest body accepted from the wire
pub const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// Why a request was refused outside of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    InvalidName,
    NameTaken,
    LobbyFull,
    GameInProgress,
    PlayerUnknown,
    UnsupportedCommand,
}

/// Messages between host and players
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    // player -> host
    /// Ask for a seat
    Hello { name: String },
    Ready { name: String },
    /// One turn's actions; empty means draw
    MoveBatch { actions: Vec<Action> },
    PlayAgain { again: bool },
    Disconnect { name: String },

    // host -> player
    /// Seat granted; `players` lists everyone seated so far
    Welcome { name: String, players: Vec<String> },
    PlayerJoined { name: String },
    PlayerLeft { name: String },
    GameStart { players: Vec<String> },
    /// The receiver's rack
    Hand { tiles: Vec<Tile> },
    Board {
        rows: Vec<Vec<Tile>>,
        last_actor: Option<String>,
        last_moves: Vec<Action>,
    },
    Turn { player: String },
    RoundEnd { scores: Vec<(String, i32)> },
    GameEnd { winner: Option<String> },
    Timeout { player: String },
    Invalid { code: InvalidCode },
    Error { code: ErrorCode },
}

impl Message {
    /// Serialize message to bytes (length-prefixed JSON)
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let json = serde_json::to_vec(self)?;
        let mut bytes = Vec::with_capacity(4 + json.len());
        bytes.extend_from_slice(&(json.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&json);
        Ok(bytes)
    }

    /// Decode a message body without its length prefix
    pub fn decode(body: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(body)
    }

    /// Write message to a stream
    #[cfg(test)]
    pub fn write_to(&self, stream: &mut impl io::Write) -> io::Result<()> {
        let bytes = self.to_bytes()?;
        stream.write_all(&bytes)?;
        stream.flush()
    }

    /// Read one message from a stream. A body that does not decode is
    /// reported as `InvalidData`.
    #[cfg(test)]
    pub fn read_from(stream: &mut impl Read) -> io::Result<Self> {
        let body = read_frame(stream)?;
        Ok(Self::decode(&body)?)
    }
}

/// Read one length-prefixed frame and return its body.
pub fn read_frame(stream: &mut impl Read) -> io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf) as usize;

    if len > MAX_MESSAGE_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "message too large"));
    }

    let mut body = vec![0u8; len];
    stream.read_exact(&mut body)?;
    Ok(body)
}
