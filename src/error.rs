//! Error types for the DHCP server.
//!
//! All fallible operations in this crate return [`Result<T>`], which uses
//! the [`Error`] enum for error variants. The packet codec and the lease
//! table are deliberately infallible: they report failure through return
//! values (a zero reply length, `None`, `false`), so the variants here cover
//! the surrounding plumbing only.

/// Errors that can occur during DHCP server operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File system or network I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error (config or import/export files).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid server configuration.
    ///
    /// Returned by [`Config::validate`](crate::Config::validate) when the
    /// configuration contains invalid values (e.g. a pool that extends past
    /// the last usable host octet).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A persisted lease snapshot could not be decoded.
    ///
    /// The snapshot has a fixed length and field order; anything else (a
    /// truncated file, an unknown status byte) is rejected rather than
    /// partially applied.
    #[error("Invalid lease snapshot: {0}")]
    InvalidSnapshot(String),

    /// A textual MAC or IPv4 address could not be parsed.
    ///
    /// Produced by the import path, which reads addresses from
    /// operator-supplied JSON.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Socket creation or configuration error.
    ///
    /// Typically occurs when binding to port 67 without administrator
    /// privileges.
    #[error("Socket error: {0}")]
    Socket(String),
}

/// A specialized Result type for DHCP operations.
pub type Result<T> = std::result::Result<T, Error>;
