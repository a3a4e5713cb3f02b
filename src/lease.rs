//! Fixed-capacity lease table with slot addressing.
//!
//! The table owns the pool configuration and a fixed array of lease
//! records. Slot `i` serves exactly one IP address, computed from the
//! pool configuration, and holds at most one client MAC. There is no
//! free list and no hash map; every lookup is a linear scan over at
//! most [`LEASE_CAPACITY`] entries. It implements the slot-addressed
//! lease store including:
//!
//! - MAC-to-slot lookup with lazy reclamation of expired entries
//! - Allocation of never-used slots for new clients
//! - Administrative moves, removals, and per-client ignore flags
//! - Pool reconfiguration (lease time, start octet, size, increment)
//!
//! # Thread Safety
//!
//! Nothing here is synchronized. The server wraps the table in a single
//! mutex held across each lookup-then-update sequence; see
//! [`crate::server`].

use std::fmt;
use std::net::Ipv4Addr;

use crate::config::PoolConfig;
use crate::error::{Error, Result};

/// Number of lease slots in the table.
pub const LEASE_CAPACITY: usize = 100;

// Slots are addressed by their final host octet in exports and on the
// operator surface, so indices must fit a single byte.
const _: () = assert!(LEASE_CAPACITY < 0xff);

/// An all-zero MAC, the marker for a never-used slot.
pub const ZERO_MAC: [u8; 6] = [0; 6];

/// Lifecycle state of a lease slot.
///
/// The reply path never consults this; replies are driven by MAC
/// presence and the ignore flag alone. Status feeds the operator
/// display and the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum LeaseStatus {
    /// Never used, reclaimed after expiry, or parked by an operator.
    #[default]
    Available = 0,
    /// An offer went out and the client has not requested yet.
    Offered = 1,
    /// The client requested the address and was acknowledged.
    Acknowledged = 2,
}

impl TryFrom<u8> for LeaseStatus {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, u8> {
        match value {
            0 => Ok(Self::Available),
            1 => Ok(Self::Offered),
            2 => Ok(Self::Acknowledged),
            other => Err(other),
        }
    }
}

impl fmt::Display for LeaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Available => "AVAILABLE",
            Self::Offered => "OFFERED",
            Self::Acknowledged => "ACKNOWLEDGED",
        };
        write!(f, "{}", name)
    }
}

/// One slot of the lease table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LeaseRecord {
    /// Client hardware address; all zeros while the slot is unused.
    pub mac: [u8; 6],
    /// Absolute expiry on the server clock, in milliseconds. Zero until
    /// the slot is first assigned.
    pub expires_at_ms: u64,
    /// Display state; see [`LeaseStatus`].
    pub status: LeaseStatus,
    /// When set, the client is refused with NAK instead of served.
    pub ignore: bool,
}

/// Slot-addressed lease store.
///
/// Owns the pool configuration so the slot-to-address mapping and the
/// slot bounds travel with the records they govern. Every mutation sets
/// a dirty flag that the snapshot writer polls.
#[derive(Debug, Clone)]
pub struct LeaseTable {
    pool: PoolConfig,
    records: [LeaseRecord; LEASE_CAPACITY],
    dirty: bool,
}

impl LeaseTable {
    /// Creates an empty table over the given pool.
    ///
    /// `pool_size` is clamped to [`LEASE_CAPACITY`]; the table never
    /// exposes more slots than it has records.
    pub fn new(mut pool: PoolConfig) -> Self {
        pool.pool_size = pool.pool_size.min(LEASE_CAPACITY as u8);
        Self {
            pool,
            records: [LeaseRecord::default(); LEASE_CAPACITY],
            dirty: false,
        }
    }

    /// Reassembles a table from snapshot parts. Callers have already
    /// validated `pool`.
    pub(crate) fn from_parts(pool: PoolConfig, records: [LeaseRecord; LEASE_CAPACITY]) -> Self {
        Self {
            pool,
            records,
            dirty: false,
        }
    }

    /// The pool configuration governing this table.
    pub fn pool(&self) -> &PoolConfig {
        &self.pool
    }

    pub(crate) fn records(&self) -> &[LeaseRecord; LEASE_CAPACITY] {
        &self.records
    }

    /// True if `slot` addresses a record inside the active pool.
    pub fn is_valid_slot(&self, slot: usize) -> bool {
        slot < usize::from(self.pool.pool_size)
    }

    /// True if `slot` is valid and holds a client MAC.
    pub fn is_occupied(&self, slot: usize) -> bool {
        self.record(slot).is_some_and(|record| record.mac != ZERO_MAC)
    }

    /// The record at `slot`, if the slot is inside the active pool.
    pub fn record(&self, slot: usize) -> Option<&LeaseRecord> {
        self.is_valid_slot(slot).then(|| &self.records[slot])
    }

    /// The IP address served from `slot`.
    pub fn address_for_slot(&self, slot: usize) -> Option<Ipv4Addr> {
        self.is_valid_slot(slot)
            .then(|| self.pool.address_for_slot(slot))
    }

    /// Looks up the slot holding `mac`.
    ///
    /// The whole pool is scanned for a match first; only when no slot
    /// matches does a reclamation sweep run, resetting the status of
    /// every occupied slot whose lease lapsed before `now_ms`. Swept
    /// slots keep their MAC and expiry, so a returning client still
    /// finds its old slot and a new client never inherits one.
    pub fn find_by_mac(&mut self, mac: &[u8; 6], now_ms: u64) -> Option<usize> {
        let pool_size = usize::from(self.pool.pool_size);

        for slot in 0..pool_size {
            if self.records[slot].mac == *mac {
                return Some(slot);
            }
        }

        for record in &mut self.records[..pool_size] {
            if record.mac != ZERO_MAC
                && record.expires_at_ms < now_ms
                && record.status != LeaseStatus::Available
            {
                record.status = LeaseStatus::Available;
                self.dirty = true;
            }
        }

        None
    }

    /// Claims a slot for a client the table has never seen.
    ///
    /// Only never-used slots qualify. Expired slots are not candidates;
    /// they stay reserved for their last holder until an operator
    /// removes them.
    pub fn allocate_new(&mut self, now_ms: u64) -> Option<usize> {
        self.find_by_mac(&ZERO_MAC, now_ms)
    }

    /// Writes a lease into `slot`.
    ///
    /// A slot changing hands drops its ignore flag; a renewal by the
    /// same MAC keeps it. Returns false when `slot` is outside the
    /// pool.
    pub fn set_lease(
        &mut self,
        slot: usize,
        mac: &[u8; 6],
        expires_at_ms: u64,
        status: LeaseStatus,
    ) -> bool {
        if !self.is_valid_slot(slot) {
            return false;
        }
        let record = &mut self.records[slot];
        if record.mac != *mac {
            record.ignore = false;
        }
        record.mac = *mac;
        record.expires_at_ms = expires_at_ms;
        record.status = status;
        self.dirty = true;
        true
    }

    /// Clears `slot` back to never-used.
    pub fn delete_lease(&mut self, slot: usize) -> bool {
        if !self.is_valid_slot(slot) {
            return false;
        }
        self.records[slot] = LeaseRecord::default();
        self.dirty = true;
        true
    }

    /// Clears every slot back to never-used.
    pub fn clear(&mut self) {
        self.records = [LeaseRecord::default(); LEASE_CAPACITY];
        self.dirty = true;
    }

    /// Exchanges the records at `a` and `b` and resets both statuses.
    /// The clients involved re-request their new addresses.
    pub fn swap_lease(&mut self, a: usize, b: usize) -> bool {
        if !self.is_valid_slot(a) || !self.is_valid_slot(b) {
            return false;
        }
        self.records.swap(a, b);
        self.records[a].status = LeaseStatus::Available;
        self.records[b].status = LeaseStatus::Available;
        self.dirty = true;
        true
    }

    /// Flags or unflags a client to be refused service.
    pub fn set_ignore(&mut self, slot: usize, ignore: bool) -> bool {
        if !self.is_valid_slot(slot) {
            return false;
        }
        self.records[slot].ignore = ignore;
        self.dirty = true;
        true
    }

    /// Seconds until the lease at `slot` lapses, negative once it has.
    pub fn expiry_remaining_seconds(&self, slot: usize, now_ms: u64) -> Option<i64> {
        self.is_valid_slot(slot)
            .then(|| (self.records[slot].expires_at_ms as i64 - now_ms as i64) / 1000)
    }

    /// Replaces the lease duration handed to clients.
    pub fn set_lease_duration(&mut self, seconds: u32) -> bool {
        self.apply_pool(PoolConfig {
            lease_duration_seconds: seconds,
            ..self.pool
        })
    }

    /// Moves the first pool address to host octet `octet`.
    pub fn set_start_octet(&mut self, octet: u8) -> bool {
        self.apply_pool(PoolConfig {
            start_address_octet: octet,
            ..self.pool
        })
    }

    /// Resizes the active pool. Records past the new size are kept but
    /// unreachable until the pool grows over them again.
    pub fn set_pool_size(&mut self, count: u8) -> bool {
        if count == 0 {
            return false;
        }
        self.apply_pool(PoolConfig {
            pool_size: count,
            ..self.pool
        })
    }

    /// Changes the third-octet offset applied to every pool address.
    /// Every address in the table moves at once, so all statuses reset.
    pub fn set_address_increment(&mut self, increment: u8) -> bool {
        if !self.apply_pool(PoolConfig {
            address_increment: increment,
            ..self.pool
        }) {
            return false;
        }
        for record in &mut self.records {
            record.status = LeaseStatus::Available;
        }
        true
    }

    fn apply_pool(&mut self, candidate: PoolConfig) -> bool {
        if candidate.validate().is_err() {
            return false;
        }
        self.pool = candidate;
        self.dirty = true;
        true
    }

    /// True when the table has changed since the last snapshot write.
    pub fn dirty(&self) -> bool {
        self.dirty
    }

    /// Re-flags the table as unsaved after a failed snapshot write, so
    /// the next commit retries.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Clears the dirty flag after a successful snapshot write.
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}

/// Formats a MAC as lowercase colon-separated hex.
pub fn format_mac(mac: &[u8; 6]) -> String {
    mac.iter()
        .map(|byte| format!("{:02x}", byte))
        .collect::<Vec<_>>()
        .join(":")
}

/// Parses a MAC from colon- or dash-separated hex pairs.
pub fn parse_mac(text: &str) -> Result<[u8; 6]> {
    let invalid = || Error::InvalidAddress(format!("not a MAC address: {}", text));
    let normalized = text.replace('-', ":");
    let mut parts = normalized.split(':');
    let mut mac = [0u8; 6];
    for byte in &mut mac {
        let part = parts.next().ok_or_else(invalid)?;
        *byte = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
    }
    if parts.next().is_some() {
        return Err(invalid());
    }
    Ok(mac)
}
