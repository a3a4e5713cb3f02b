//! # leasepool
//!
//! A small DHCP server (RFC 2131/2132) that hands out addresses from a
//! fixed pool of slots, one slot per host octet.
//!
//! ## Features
//!
//! - DISCOVER/OFFER/REQUEST/ACK handshake, NAK for everything else
//! - In-place packet rewriting: the request buffer becomes the reply
//! - Slot-addressed lease table where a client keeps its address even
//!   past expiry, until an operator intervenes
//! - Per-client ignore overrides
//! - Binary lease snapshots across restarts, JSON import/export
//! - Replies broadcast to the subnet, so unconfigured clients hear them
//! - Async/await with Tokio
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tokio::sync::Mutex;
//!
//! use leasepool::{Config, DhcpServer, snapshot};
//!
//! #[tokio::main]
//! async fn main() -> leasepool::Result<()> {
//!     let config = Config::load_or_create("config.json")?;
//!     let table = snapshot::load_or_new(&config.snapshot_file, config.pool.clone()).await?;
//!     let server = DhcpServer::new(&config, Arc::new(Mutex::new(table))).await?;
//!     server.run().await
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`Config`] - Pool bounds, server identity, domain, snapshot path
//! - [`LeaseTable`] - Slot-addressed lease store with reclamation
//! - [`dhcp_reply`](reply::dhcp_reply) - The request-to-reply rewrite
//! - [`DhcpServer`] - UDP transport on port 67 plus periodic snapshots
//! - [`admin`] - Operator surface: dumps, edits, import/export

pub mod admin;
pub mod config;
pub mod error;
pub mod lease;
pub mod options;
pub mod packet;
pub mod reply;
pub mod server;
pub mod snapshot;

pub use config::{Config, PoolConfig};
pub use error::{Error, Result};
pub use lease::{LeaseRecord, LeaseStatus, LeaseTable};
pub use options::{MessageType, OptionCode};
pub use packet::{DhcpFrame, OptionsWriter};
pub use reply::dhcp_reply;
pub use server::DhcpServer;
