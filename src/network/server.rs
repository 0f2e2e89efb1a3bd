//! TCP server for hosting games

use super::peer::{Peer, PeerInput};
use super::protocol::Message;
use log::{info, warn};
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

/// Default port for rummikub hosts
pub const DEFAULT_PORT: u16 = 55777;

/// Maximum port to try when auto-incrementing
const MAX_PORT: u16 = 55877;

/// A game host that accepts peer connections
pub struct Server {
    /// Local address the server is bound to
    addr: SocketAddr,
    /// Channel to receive new peer connections
    new_peers_rx: Receiver<Peer>,
    /// Connected peers
    peers: Vec<Peer>,
    /// Running flag
    running: bool,
}

impl Server {
    /// Start a new server on a specific port with auto-increment fallback.
    /// Port 0 lets the OS pick.
    pub fn start_on_port(start_port: u16) -> io::Result<Self> {
        let mut port = start_port;
        let listener = loop {
            match TcpListener::bind(("0.0.0.0", port)) {
                Ok(l) => break l,
                Err(e) if e.kind() == io::ErrorKind::AddrInUse && port != 0 && port < MAX_PORT => {
                    port += 1;
                }
                Err(e) => return Err(e),
            }
        };

        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;
        info!("listening on {}", addr);

        let (new_peers_tx, new_peers_rx) = channel();

        // Spawn acceptor thread
        thread::spawn(move || {
            accept_loop(listener, new_peers_tx);
        });

        Ok(Server {
            addr,
            new_peers_rx,
            peers: Vec::new(),
            running: true,
        })
    }

    /// Get the port the server is listening on
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Poll for new connections and messages
    pub fn poll(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();

        // Accept new peers
        loop {
            match self.new_peers_rx.try_recv() {
                Ok(peer) => {
                    events.push(ServerEvent::PeerConnected { addr: peer.addr });
                    self.peers.push(peer);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.running = false;
                    break;
                }
            }
        }

        // Collect messages from peers and track disconnections
        let mut disconnected = Vec::new();
        for (i, peer) in self.peers.iter_mut().enumerate() {
            for input in peer.recv_all() {
                match input {
                    PeerInput::Message(message) => events.push(ServerEvent::MessageReceived {
                        from: peer.addr,
                        player_name: peer.player_name.clone(),
                        message,
                    }),
                    PeerInput::Malformed(reason) => events.push(ServerEvent::Malformed {
                        from: peer.addr,
                        reason,
                    }),
                }
            }
            if !peer.is_alive() {
                disconnected.push(i);
            }
        }

        // Remove disconnected peers (in reverse order to preserve indices)
        for i in disconnected.into_iter().rev() {
            let peer = self.peers.remove(i);
            events.push(ServerEvent::PeerDisconnected {
                addr: peer.addr,
                player_name: peer.player_name.clone(),
            });
        }

        events
    }

    /// Bind a player name to a connection once the host has seated it
    pub fn set_player_name(&mut self, addr: SocketAddr, name: &str) {
        if let Some(peer) = self.peers.iter_mut().find(|p| p.addr == addr) {
            peer.set_player_name(name.to_string());
        }
    }

    /// Broadcast a message to all connected peers (serializes once)
    pub fn broadcast(&self, msg: &Message) {
        self.broadcast_except(None, msg);
    }

    /// Broadcast to everyone but `skip`
    pub fn broadcast_except(&self, skip: Option<SocketAddr>, msg: &Message) {
        let bytes = match msg.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("could not encode {:?}: {}", msg, e);
                return;
            }
        };
        for peer in self.peers.iter().filter(|p| Some(p.addr) != skip) {
            let _ = peer.send_raw(bytes.clone());
        }
    }

    /// Send a message to a specific peer by address
    pub fn send_to(&self, addr: SocketAddr, msg: &Message) -> io::Result<()> {
        self.peers
            .iter()
            .find(|p| p.addr == addr)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "peer not found"))?
            .send(msg)
    }

    /// Drop a connection from the host side
    pub fn disconnect(&mut self, addr: SocketAddr) {
        self.peers.retain(|p| p.addr != addr);
    }

    /// Get the number of connected peers
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Check if the server is still running
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Stop the server
    pub fn stop(&mut self) {
        self.running = false;
        self.peers.clear();
    }
}

/// Events from the server
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A new peer connected
    PeerConnected { addr: SocketAddr },
    /// A peer disconnected
    PeerDisconnected {
        addr: SocketAddr,
        player_name: Option<String>,
    },
    /// A message was received from a peer
    MessageReceived {
        from: SocketAddr,
        player_name: Option<String>,
        message: Message,
    },
    /// A peer sent a frame that did not decode
    Malformed { from: SocketAddr, reason: String },
}

fn accept_loop(listener: TcpListener, tx: Sender<Peer>) {
    loop {
        match listener.accept() {
            Ok((stream, addr)) => match Peer::new(stream) {
                Ok(peer) => {
                    if tx.send(peer).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("could not set up connection from {}: {}", addr, e),
            },
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(_) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn poll_until<F: Fn(&ServerEvent) -> bool>(server: &mut Server, pred: F) -> Vec<ServerEvent> {
        let start = Instant::now();
        let mut seen = Vec::new();
        while start.elapsed() < Duration::from_secs(3) {
            let events = server.poll();
            let done = events.iter().any(&pred);
            seen.extend(events);
            if done {
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }
        seen
    }

    #[test]
    fn test_server_auto_increment_port() {
        let server1 = Server::start_on_port(55800).unwrap();
        let port1 = server1.port();

        let server2 = Server::start_on_port(port1).unwrap();
        let port2 = server2.port();

        assert_ne!(port1, port2);
        assert_eq!(port2, port1 + 1);
    }

    #[test]
    fn test_server_accepts_connection() {
        let mut server = Server::start_on_port(0).unwrap();
        let addr = SocketAddr::from(([127, 0, 0, 1], server.port()));

        let _client = Peer::connect(addr).unwrap();

        let events = poll_until(&mut server, |e| matches!(e, ServerEvent::PeerConnected { .. }));
        assert!(events.iter().any(|e| matches!(e, ServerEvent::PeerConnected { .. })));
        assert_eq!(server.peer_count(), 1);
    }

    #[test]
    fn test_server_receives_and_replies() {
        let mut server = Server::start_on_port(0).unwrap();
        let addr = SocketAddr::from(([127, 0, 0, 1], server.port()));

        let mut client = Peer::connect(addr).unwrap();
        client
            .send(&Message::Hello {
                name: "alice".to_string(),
            })
            .unwrap();

        let events = poll_until(&mut server, |e| matches!(e, ServerEvent::MessageReceived { .. }));
        let from = events
            .iter()
            .find_map(|e| match e {
                ServerEvent::MessageReceived { from, message, .. } => {
                    assert_eq!(
                        message,
                        &Message::Hello {
                            name: "alice".to_string()
                        }
                    );
                    Some(*from)
                }
                _ => None,
            })
            .unwrap();

        server.broadcast(&Message::Turn {
            player: "alice".to_string(),
        });
        server.send_to(from, &Message::Hand { tiles: vec![] }).unwrap();

        let first = client.recv_timeout(Duration::from_secs(2));
        assert_eq!(
            first,
            Some(PeerInput::Message(Message::Turn {
                player: "alice".to_string()
            }))
        );
        let second = client.recv_timeout(Duration::from_secs(2));
        assert_eq!(second, Some(PeerInput::Message(Message::Hand { tiles: vec![] })));
    }

    #[test]
    fn test_server_reports_disconnect() {
        let mut server = Server::start_on_port(0).unwrap();
        let addr = SocketAddr::from(([127, 0, 0, 1], server.port()));

        let client = Peer::connect(addr).unwrap();
        poll_until(&mut server, |e| matches!(e, ServerEvent::PeerConnected { .. }));
        drop(client);

        let events = poll_until(&mut server, |e| matches!(e, ServerEvent::PeerDisconnected { .. }));
        assert!(events.iter().any(|e| matches!(e, ServerEvent::PeerDisconnected { .. })));
        assert_eq!(server.peer_count(), 0);
    }
}
