//! TCP client for joining a host

use super::peer::{Peer, PeerInput};
use super::protocol::Message;
use super::server::DEFAULT_PORT;
use crate::game::Action;
use log::warn;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

/// A player connection to a host
pub struct Client {
    /// Connection to the host
    peer: Peer,
    /// Our player name
    player_name: String,
    /// Whether we've said hello
    greeted: bool,
}

impl Client {
    /// Connect to a host at the given address
    ///
    /// The address can be:
    /// - "IP:PORT" (e.g., "192.168.1.100:55777")
    /// - "IP" (uses the default port)
    /// - "hostname:PORT"
    /// - "hostname" (uses the default port)
    pub fn connect(addr: &str, player_name: String) -> io::Result<Self> {
        let socket_addr = parse_address(addr)?;
        Self::connect_addr(socket_addr, player_name)
    }

    /// Connect to a host at the given socket address
    pub fn connect_addr(addr: SocketAddr, player_name: String) -> io::Result<Self> {
        let peer = Peer::connect(addr)?;

        Ok(Client {
            peer,
            player_name,
            greeted: false,
        })
    }

    /// Ask the host for a seat
    pub fn hello(&mut self) -> io::Result<()> {
        if self.greeted {
            return Ok(());
        }
        self.peer.send(&Message::Hello {
            name: self.player_name.clone(),
        })?;
        self.greeted = true;
        Ok(())
    }

    pub fn ready(&self) -> io::Result<()> {
        self.peer.send(&Message::Ready {
            name: self.player_name.clone(),
        })
    }

    /// Submit this turn's batch. An empty batch draws.
    pub fn send_moves(&self, actions: Vec<Action>) -> io::Result<()> {
        self.peer.send(&Message::MoveBatch { actions })
    }

    pub fn play_again(&self, again: bool) -> io::Result<()> {
        self.peer.send(&Message::PlayAgain { again })
    }

    /// Tell the host we are leaving
    pub fn leave(&self) -> io::Result<()> {
        self.peer.send(&Message::Disconnect {
            name: self.player_name.clone(),
        })
    }

    /// Poll for incoming messages from the host
    pub fn poll(&mut self) -> Vec<Message> {
        self.peer
            .recv_all()
            .into_iter()
            .filter_map(|input| self.accept(input))
            .collect()
    }

    /// Wait up to `timeout` for the next message from the host
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<Message> {
        let input = self.peer.recv_timeout(timeout)?;
        self.accept(input)
    }

    fn accept(&self, input: PeerInput) -> Option<Message> {
        match input {
            PeerInput::Message(msg) => Some(msg),
            PeerInput::Malformed(reason) => {
                warn!("ignoring malformed message from host: {}", reason);
                None
            }
        }
    }

    /// Check if still connected
    pub fn is_connected(&self) -> bool {
        self.peer.is_alive()
    }

    /// Get our player name
    pub fn player_name(&self) -> &str {
        &self.player_name
    }
}

/// Parse an address string into a SocketAddr
///
/// Handles formats:
/// - "192.168.1.100:55777" -> parse directly
/// - "192.168.1.100" -> add default port
/// - "hostname:55777" -> resolve and use port
/// - "hostname" -> resolve and use default port
pub fn parse_address(addr: &str) -> io::Result<SocketAddr> {
    let with_port = if addr.contains(':') {
        addr.to_string()
    } else {
        format!("{}:{}", addr, DEFAULT_PORT)
    };
    with_port
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "could not resolve address"))
}
