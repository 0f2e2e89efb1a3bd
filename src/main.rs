//! Rummikub - authoritative LAN table for tile rummy
//!
//! `host` runs the table; `join` sits a greedy player at one.

mod config;
mod game;
mod lobby;
mod network;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use config::Config;
use lobby::{HostedLobby, JoinedLobby, LobbyEvent};
use log::{info, warn, LevelFilter};
use network::ServiceDiscovery;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

/// How long `join` browses the network when no address is given
const BROWSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// error, warn, info, debug or trace
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Host a table and run the game")]
    Host {
        /// Config file (defaults to the platform config dir)
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        port: Option<u16>,
        /// Seat an automated player with this name (repeatable)
        #[arg(long = "bot")]
        bots: Vec<String>,
        /// Seconds per turn
        #[arg(long, conflicts_with = "no_timeout")]
        turn_timeout: Option<u64>,
        /// Let turns run without a deadline
        #[arg(long)]
        no_timeout: bool,
        /// Announce the table over mDNS
        #[arg(long)]
        advertise: bool,
    },
    #[command(about = "Join a table and play with the greedy strategy")]
    Join {
        /// IP[:PORT] of the host; browses the local network when omitted
        addr: Option<String>,
        #[arg(long)]
        name: String,
        /// Rounds to play before declining another
        #[arg(long, default_value_t = 1)]
        rounds: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Host {
            config,
            port,
            bots,
            turn_timeout,
            no_timeout,
            advertise,
        } => {
            let mut config = Config::load(config.as_deref())?;
            if let Some(port) = port {
                config.port = port;
            }
            if !bots.is_empty() {
                config.bots = bots;
            }
            if no_timeout {
                config.turn_timeout_secs = None;
            } else if turn_timeout.is_some() {
                config.turn_timeout_secs = turn_timeout;
            }
            config.advertise |= advertise;
            if let Some(level) = cli.log_level {
                config.log_level = level;
            }
            config.validate()?;
            init_logging(&config.log_level)?;
            host(config)
        }
        Command::Join { addr, name, rounds } => {
            init_logging(cli.log_level.as_deref().unwrap_or("info"))?;
            join(addr, name, rounds)
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let level: LevelFilter = level
        .parse()
        .map_err(|_| anyhow!("unknown log level '{}'", level))?;
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .build();
    simplelog::TermLogger::init(
        level,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;
    Ok(())
}

fn host(config: Config) -> Result<()> {
    let tick = config.tick();
    let mut lobby = HostedLobby::new(config).map_err(|e| anyhow!(e))?;
    info!("table open on port {}", lobby.port());

    while lobby.is_running() {
        for event in lobby.poll(Instant::now()) {
            log_event(&event);
        }
        thread::sleep(tick);
    }

    lobby.shutdown().map_err(|e| anyhow!(e))
}

fn join(addr: Option<String>, name: String, rounds: u32) -> Result<()> {
    let mut lobby = match addr {
        Some(addr) => JoinedLobby::connect(&addr, name, rounds),
        None => JoinedLobby::join(browse()?, name, rounds),
    }
    .map_err(|e| anyhow!(e))?;
    info!("connected as {}", lobby.player_name());

    while !lobby.is_finished() {
        for event in lobby.poll() {
            log_event(&event);
            if let LobbyEvent::Refused(code) = event {
                bail!("host refused the seat: {:?}", code);
            }
        }
        thread::sleep(Duration::from_millis(20));
    }
    info!("played {} round(s)", lobby.rounds_played());
    lobby.leave();
    Ok(())
}

/// First host that answers on the local network
fn browse() -> Result<SocketAddr> {
    let discovery = ServiceDiscovery::new().map_err(|e| anyhow!(e))?;
    let hosts = discovery.browse().map_err(|e| anyhow!(e))?;
    info!("looking for tables on the local network...");

    let found = hosts.recv_timeout(BROWSE_TIMEOUT).ok().and_then(|host| {
        info!("found table '{}' at {}", host.table, host.instance);
        host.addresses
            .first()
            .map(|ip| SocketAddr::new(*ip, host.port))
    });

    if let Err(e) = discovery.stop_browsing() {
        warn!("{}", e);
    }
    if let Err(e) = discovery.shutdown() {
        warn!("{}", e);
    }
    found.ok_or_else(|| anyhow!("no table found on the local network"))
}

fn log_event(event: &LobbyEvent) {
    match event {
        LobbyEvent::TurnPlayed(report) => {
            info!("{}: {:?}", report.player, report.outcome);
            if let Some(round) = &report.round {
                info!("{} won the round ({:?})", round.winner, round.reason);
            }
        }
        LobbyEvent::RoundEnded { scores } => {
            for (name, score) in scores {
                info!("  {:<16} {:>5}", name, score);
            }
        }
        LobbyEvent::GameEnded { winner } => match winner {
            Some(winner) => info!("game over, {} wins", winner),
            None => info!("game over"),
        },
        other => info!("{:?}", other),
    }
}
