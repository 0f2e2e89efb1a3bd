//! Networking: TCP host/client, length-prefixed protocol, mDNS discovery
//!
//! This module provides:
//! - TCP server for hosting games (default port 55777 with auto-increment)
//! - TCP client for joining games (manual connect via IP:PORT, or mDNS)
//! - Length-prefixed JSON protocol
//! - mDNS-SD advertising and browsing for hosts on the local network

pub mod client;
pub mod peer;
pub mod protocol;
pub mod server;

pub use client::Client;
pub use protocol::{ErrorCode, Message};
pub use server::{Server, ServerEvent};

use log::debug;
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use std::net::IpAddr;
use std::sync::mpsc;
use std::thread;

/// Service type hosts register under
pub const SERVICE_TYPE: &str = "_rummikub._tcp.local.";

/// Current protocol version
pub const PROTOCOL_VERSION: &str = "1";

/// A host found on the local network
#[derive(Debug, Clone)]
pub struct HostInfo {
    /// Instance name the host registered
    pub instance: String,
    /// Name the host advertised for its table
    pub table: String,
    pub version: String,
    /// IP addresses, IPv4 first
    pub addresses: Vec<IpAddr>,
    pub port: u16,
}

/// Service discovery manager for finding hosts on the local network
pub struct ServiceDiscovery {
    daemon: ServiceDaemon,
    registered: Option<String>,
}

impl ServiceDiscovery {
    /// Create a new service discovery instance
    pub fn new() -> Result<Self, String> {
        let daemon =
            ServiceDaemon::new().map_err(|e| format!("Failed to create mDNS daemon: {}", e))?;

        Ok(Self {
            daemon,
            registered: None,
        })
    }

    /// Advertise a hosted table on the local network
    ///
    /// # Arguments
    /// * `instance` - Unique instance name on the network
    /// * `table` - Human-readable table name
    /// * `port` - Port the host is listening on
    pub fn advertise(&mut self, instance: &str, table: &str, port: u16) -> Result<(), String> {
        let properties = [("version", PROTOCOL_VERSION), ("table", table)];
        let hostname = format!("{}.local.", instance);

        let service_info = ServiceInfo::new(
            SERVICE_TYPE,
            instance,
            &hostname,
            (),
            port,
            &properties[..],
        )
        .map_err(|e| format!("Failed to create service info: {}", e))?
        .enable_addr_auto();

        self.daemon
            .register(service_info)
            .map_err(|e| format!("Failed to register service: {}", e))?;

        debug!("advertising {} on port {}", instance, port);
        self.registered = Some(instance.to_string());
        Ok(())
    }

    /// Stop advertising on the network
    pub fn stop_advertising(&mut self) -> Result<(), String> {
        if let Some(instance) = self.registered.take() {
            self.daemon
                .unregister(&service_fullname(&instance))
                .map_err(|e| format!("Failed to unregister service: {}", e))?;
        }
        Ok(())
    }

    /// Start browsing for hosts
    ///
    /// Returns a receiver that emits every host as it resolves
    pub fn browse(&self) -> Result<mpsc::Receiver<HostInfo>, String> {
        let receiver = self
            .daemon
            .browse(SERVICE_TYPE)
            .map_err(|e| format!("Failed to start browsing: {}", e))?;

        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            while let Ok(event) = receiver.recv() {
                if let ServiceEvent::ServiceResolved(info) = event {
                    let properties = info.get_properties();

                    let table = properties
                        .get_property_val_str("table")
                        .unwrap_or_default()
                        .to_string();
                    let version = properties
                        .get_property_val_str("version")
                        .unwrap_or(PROTOCOL_VERSION)
                        .to_string();

                    // IPv6 link-local addresses need a scope id that IpAddr
                    // doesn't carry, so try IPv4 first
                    let mut addresses: Vec<IpAddr> = info
                        .get_addresses()
                        .iter()
                        .map(|s| s.to_ip_addr())
                        .collect();
                    addresses.sort_by_key(|addr| match addr {
                        IpAddr::V4(_) => 0,
                        IpAddr::V6(_) => 1,
                    });

                    // hosts register as "<instance>.local."
                    let hostname = info.get_hostname();
                    let instance = hostname
                        .strip_suffix(".local.")
                        .unwrap_or(hostname)
                        .to_string();

                    let host = HostInfo {
                        instance,
                        table,
                        version,
                        addresses,
                        port: info.get_port(),
                    };
                    if tx.send(host).is_err() {
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }

    /// Stop browsing for hosts
    pub fn stop_browsing(&self) -> Result<(), String> {
        self.daemon
            .stop_browse(SERVICE_TYPE)
            .map_err(|e| format!("Failed to stop browsing: {}", e))
    }

    /// Shutdown the discovery service
    pub fn shutdown(self) -> Result<(), String> {
        self.daemon
            .shutdown()
            .map_err(|e| format!("Failed to shutdown daemon: {}", e))?;
        Ok(())
    }
}

fn service_fullname(instance: &str) -> String {
    format!("{}.{}", instance, SERVICE_TYPE)
}
