//! Peer connection handling
//!
//! Every connection gets a reader thread and a writer thread. The owner
//! only ever talks to them through channels.

use super::protocol::{read_frame, Message};
use log::{debug, warn};
use std::io::{self, ErrorKind, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

/// What the reader thread hands back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerInput {
    Message(Message),
    /// A complete frame whose body did not decode
    Malformed(String),
}

/// A connected peer
pub struct Peer {
    /// Peer's address
    pub addr: SocketAddr,
    /// Peer's player name (once they've said hello)
    pub player_name: Option<String>,
    /// Encoded frames for the writer thread
    tx: Sender<Vec<u8>>,
    /// Input from the reader thread
    rx: Receiver<PeerInput>,
    /// Handle used to unblock the reader on drop
    stream: TcpStream,
    /// Whether the connection is still alive
    alive: bool,
}

impl Peer {
    /// Create a new peer from a TCP stream
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        let addr = stream.peer_addr()?;

        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;
        stream.set_write_timeout(Some(Duration::from_secs(5)))?;

        let (outgoing_tx, outgoing_rx) = channel::<Vec<u8>>();
        let (incoming_tx, incoming_rx) = channel::<PeerInput>();

        let mut read_stream = stream.try_clone()?;
        let mut write_stream = stream.try_clone()?;

        // Writer thread
        thread::spawn(move || {
            while let Ok(bytes) = outgoing_rx.recv() {
                if write_stream.write_all(&bytes).and_then(|_| write_stream.flush()).is_err() {
                    break;
                }
            }
        });

        // Reader thread
        thread::spawn(move || loop {
            let input = match read_frame(&mut read_stream) {
                Ok(body) => match Message::decode(&body) {
                    Ok(msg) => PeerInput::Message(msg),
                    Err(e) => {
                        warn!("malformed message from {}: {}", addr, e);
                        PeerInput::Malformed(e.to_string())
                    }
                },
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("connection to {} closed: {}", addr, e);
                    break;
                }
            };
            if incoming_tx.send(input).is_err() {
                break;
            }
        });

        Ok(Peer {
            addr,
            player_name: None,
            tx: outgoing_tx,
            rx: incoming_rx,
            stream,
            alive: true,
        })
    }

    /// Connect to a peer at the given address
    pub fn connect(addr: SocketAddr) -> io::Result<Self> {
        let stream = TcpStream::connect_timeout(&addr, Duration::from_secs(5))?;
        Self::new(stream)
    }

    /// Send a message to this peer
    pub fn send(&self, msg: &Message) -> io::Result<()> {
        self.send_raw(msg.to_bytes()?)
    }

    /// Send an already encoded frame
    pub fn send_raw(&self, bytes: Vec<u8>) -> io::Result<()> {
        self.tx
            .send(bytes)
            .map_err(|_| io::Error::new(ErrorKind::BrokenPipe, "peer disconnected"))
    }

    /// Try to receive input from this peer (non-blocking)
    pub fn try_recv(&mut self) -> Option<PeerInput> {
        match self.rx.try_recv() {
            Ok(input) => Some(input),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.alive = false;
                None
            }
        }
    }

    /// Receive all pending input from this peer
    pub fn recv_all(&mut self) -> Vec<PeerInput> {
        let mut inputs = Vec::new();
        while let Some(input) = self.try_recv() {
            inputs.push(input);
        }
        inputs
    }

    /// Block up to `timeout` for the next input
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<PeerInput> {
        match self.rx.recv_timeout(timeout) {
            Ok(input) => Some(input),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => None,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                self.alive = false;
                None
            }
        }
    }

    /// Check if the peer connection is still alive
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Set the player name for this peer
    pub fn set_player_name(&mut self, name: String) {
        self.player_name = Some(name);
    }
}

impl Drop for Peer {
    fn drop(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
