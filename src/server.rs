//! UDP transport and the serve loop.
//!
//! One socket bound to 0.0.0.0:67 with SO_BROADCAST, one receive
//! buffer, and strictly serial packet handling: each datagram is
//! rewritten in place into its reply under the table mutex, then sent
//! to the subnet broadcast address at the client's source port. A
//! background task snapshots the table every five seconds when it has
//! changed.
//!
//! The server clock is milliseconds since startup, so lease expiries
//! restored from a snapshot age out against the new clock.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::{Duration, Instant};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::{Config, PoolConfig};
use crate::error::{Error, Result};
use crate::lease::LeaseTable;
use crate::packet::DHCP_BUFFER_SIZE;
use crate::reply::dhcp_reply;
use crate::snapshot;

const DHCP_SERVER_PORT: u16 = 67;
const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(5);

/// Replies go to the subnet broadcast, but back at whatever port the
/// request came from.
fn reply_destination(pool: &PoolConfig, source: SocketAddr) -> SocketAddrV4 {
    SocketAddrV4::new(pool.broadcast_address(), source.port())
}

/// Writes the table to `path` when it has unsaved changes.
///
/// The dirty flag is drained up front so mutations landing during the
/// write are not masked, and re-marked on failure so the next tick
/// retries instead of losing the changes. Returns whether a write
/// happened.
async fn commit_if_dirty(leases: &Arc<Mutex<LeaseTable>>, path: &str) -> Result<bool> {
    let snapshot = {
        let mut table = leases.lock().await;
        if !table.dirty() {
            return Ok(false);
        }
        table.clear_dirty();
        table.clone()
    };
    match snapshot::save(&snapshot, path).await {
        Ok(()) => Ok(true),
        Err(error) => {
            leases.lock().await.mark_dirty();
            Err(error)
        }
    }
}

pub struct DhcpServer {
    socket: UdpSocket,
    leases: Arc<Mutex<LeaseTable>>,
    domain_name: Option<String>,
    snapshot_file: String,
    started: Instant,
}

impl DhcpServer {
    pub async fn new(config: &Config, leases: Arc<Mutex<LeaseTable>>) -> Result<Self> {
        let socket = Self::create_socket()?;

        {
            let table = leases.lock().await;
            let pool = table.pool();
            info!(
                "DHCP server starting on {}:{}",
                pool.server_ip, DHCP_SERVER_PORT
            );
            info!(
                "IP pool: {} - {} ({} addresses)",
                pool.address_for_slot(0),
                pool.address_for_slot(usize::from(pool.pool_size.saturating_sub(1))),
                pool.pool_size
            );
        }

        Ok(Self {
            socket,
            leases,
            domain_name: config.domain_name.clone(),
            snapshot_file: config.snapshot_file.clone(),
            started: Instant::now(),
        })
    }

    fn create_socket() -> Result<UdpSocket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|error| Error::Socket(format!("Failed to create socket: {}", error)))?;

        socket
            .set_reuse_address(true)
            .map_err(|error| Error::Socket(format!("Failed to set SO_REUSEADDR: {}", error)))?;

        socket
            .set_broadcast(true)
            .map_err(|error| Error::Socket(format!("Failed to set SO_BROADCAST: {}", error)))?;

        socket
            .set_nonblocking(true)
            .map_err(|error| Error::Socket(format!("Failed to set non-blocking: {}", error)))?;

        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DHCP_SERVER_PORT);
        socket
            .bind(&bind_addr.into())
            .map_err(|error| Error::Socket(format!("Failed to bind to {}: {}", bind_addr, error)))?;

        let std_socket: std::net::UdpSocket = socket.into();
        let tokio_socket = UdpSocket::from_std(std_socket).map_err(|error| {
            Error::Socket(format!("Failed to convert to tokio socket: {}", error))
        })?;

        Ok(tokio_socket)
    }

    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn spawn_snapshot_task(&self) {
        let leases = Arc::clone(&self.leases);
        let path = self.snapshot_file.clone();

        tokio::spawn(async move {
            let mut timer = tokio::time::interval(SNAPSHOT_INTERVAL);
            loop {
                timer.tick().await;
                if let Err(error) = commit_if_dirty(&leases, &path).await {
                    warn!("Failed to write lease snapshot: {}", error);
                }
            }
        });
    }

    pub async fn run(&self) -> Result<()> {
        let mut buffer = [0u8; DHCP_BUFFER_SIZE];

        self.spawn_snapshot_task();
        info!("DHCP server ready and listening");

        loop {
            match self.socket.recv_from(&mut buffer).await {
                Ok((packet_len, source)) => {
                    let (reply_len, destination) = {
                        let mut leases = self.leases.lock().await;
                        let server_ip = leases.pool().server_ip;
                        let destination = reply_destination(leases.pool(), source);
                        let reply_len = dhcp_reply(
                            &mut buffer,
                            packet_len,
                            server_ip,
                            self.domain_name.as_deref(),
                            &mut leases,
                            self.now_ms(),
                        );
                        (reply_len, destination)
                    };

                    if reply_len > 0 {
                        if let Err(error) =
                            self.socket.send_to(&buffer[..reply_len], destination).await
                        {
                            warn!("Failed to send reply to {}: {}", destination, error);
                        }
                    }
                }
                Err(error) => {
                    error!("Error receiving packet: {}", error);
                }
            }
        }
    }

    /// Writes the current table to the snapshot file, dirty or not.
    /// The flag only clears once the write lands.
    pub async fn save_leases(&self) -> Result<()> {
        let snapshot = self.leases.lock().await.clone();
        snapshot::save(&snapshot, &self.snapshot_file).await?;
        self.leases.lock().await.clear_dirty();
        Ok(())
    }
}
