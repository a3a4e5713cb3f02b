//! Operator surface over the lease table.
//!
//! Slots are addressed by the final host octet of their pool address,
//! translated by subtracting the pool start octet, and each operation
//! maps onto one [`LeaseTable`] call. Also home to the human-readable
//! table dump and the JSON import/export documents.

use std::fmt::Write as _;
use std::net::Ipv4Addr;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::lease::{LeaseStatus, LeaseTable, ZERO_MAC, format_mac, parse_mac};

/// Status label on the server identity row of exports and dumps.
const SERVER_STATUS: &str = "DHCP Server";

fn slot_for_octet(table: &LeaseTable, octet: u8) -> Option<usize> {
    let slot = usize::from(octet.checked_sub(table.pool().start_address_octet)?);
    table.is_valid_slot(slot).then_some(slot)
}

/// Swaps the leases at two pool addresses, given by final host octet.
pub fn move_lease_by_octet(table: &mut LeaseTable, from_octet: u8, to_octet: u8) -> bool {
    match (
        slot_for_octet(table, from_octet),
        slot_for_octet(table, to_octet),
    ) {
        (Some(from), Some(to)) => table.swap_lease(from, to),
        _ => false,
    }
}

/// Clears the lease at the pool address with final host octet `octet`.
pub fn remove_lease_by_octet(table: &mut LeaseTable, octet: u8) -> bool {
    match slot_for_octet(table, octet) {
        Some(slot) => table.delete_lease(slot),
        None => false,
    }
}

/// Sets or clears the ignore override for the client at `octet`.
pub fn set_ignore_by_octet(table: &mut LeaseTable, octet: u8, ignore: bool) -> bool {
    match slot_for_octet(table, octet) {
        Some(slot) => table.set_ignore(slot, ignore),
        None => false,
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LeaseRow {
    ip_address: String,
    mac_address: String,
    #[serde(default)]
    expires: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Serialize)]
struct ExportDocument {
    lease_time: u32,
    start_octet: u8,
    last_octet: u8,
    exported_at: String,
    table: Vec<LeaseRow>,
}

#[derive(Debug, Deserialize)]
struct ImportDocument {
    lease_time: Option<u32>,
    start_octet: Option<u8>,
    last_octet: Option<u8>,
    table: Option<Vec<LeaseRow>>,
}

fn table_rows(table: &LeaseTable, now_ms: u64) -> Vec<LeaseRow> {
    let pool = table.pool();
    let mut rows = vec![LeaseRow {
        ip_address: pool.server_ip.to_string(),
        mac_address: format_mac(&pool.server_mac),
        expires: String::new(),
        status: SERVER_STATUS.to_string(),
    }];

    for slot in 0..usize::from(pool.pool_size) {
        let Some(record) = table.record(slot) else {
            continue;
        };
        if record.mac == ZERO_MAC {
            continue;
        }
        rows.push(LeaseRow {
            ip_address: pool.address_for_slot(slot).to_string(),
            mac_address: format_mac(&record.mac),
            expires: table
                .expiry_remaining_seconds(slot, now_ms)
                .unwrap_or(0)
                .to_string(),
            status: record.status.to_string(),
        });
    }

    rows
}

/// Renders the table for the console: pool header, then the server
/// identity row and one line per occupied slot. Expiry is in seconds,
/// negative once the lease has lapsed.
pub fn format_lease_table(table: &LeaseTable, now_ms: u64) -> String {
    let pool = table.pool();
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Lease time: {} seconds, address increment: {}",
        pool.lease_duration_seconds, pool.address_increment
    );
    let _ = writeln!(
        out,
        "Pool: {} - {} ({} addresses)",
        pool.address_for_slot(0),
        pool.address_for_slot(usize::from(pool.pool_size.saturating_sub(1))),
        pool.pool_size
    );
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<16}{:<19}{:<13}{}",
        "IP Address", "MAC Address", "Expires (s)", "Status"
    );
    for row in table_rows(table, now_ms) {
        let _ = writeln!(
            out,
            "{:<16}{:<19}{:<13}{}",
            row.ip_address, row.mac_address, row.expires, row.status
        );
    }

    out
}

fn display_address(address: Ipv4Addr) -> String {
    if address == Ipv4Addr::BROADCAST {
        "(not configured)".to_string()
    } else {
        address.to_string()
    }
}

/// Renders the pool and server identity for the console.
pub fn format_pool_summary(pool: &PoolConfig, domain_name: Option<&str>) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Server: {} ({})",
        pool.server_ip,
        format_mac(&pool.server_mac)
    );
    let _ = writeln!(
        out,
        "Subnet mask: {}, broadcast: {}",
        pool.subnet_mask,
        pool.broadcast_address()
    );
    let _ = writeln!(
        out,
        "Gateway: {}, DNS: {}",
        display_address(pool.gateway),
        display_address(pool.dns)
    );
    let _ = writeln!(out, "Domain: {}", domain_name.unwrap_or("(none)"));
    let _ = writeln!(
        out,
        "Pool: {} - {} ({} addresses), increment {}",
        pool.address_for_slot(0),
        pool.address_for_slot(usize::from(pool.pool_size.saturating_sub(1))),
        pool.pool_size,
        pool.address_increment
    );
    let _ = writeln!(out, "Lease time: {} seconds", pool.lease_duration_seconds);

    out
}

/// Serializes the table to a pretty-printed JSON document with the
/// pool bounds, a wall-clock export stamp, and one row per occupied
/// slot behind the server identity row.
pub fn export_json(table: &LeaseTable, now_ms: u64) -> Result<String> {
    let pool = table.pool();
    let document = ExportDocument {
        lease_time: pool.lease_duration_seconds,
        start_octet: pool.start_address_octet,
        last_octet: pool.last_address_octet(),
        exported_at: Utc::now().to_rfc3339(),
        table: table_rows(table, now_ms),
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

/// Applies a JSON document to the table.
///
/// Pool fields are optional and applied through the validating
/// mutators; out-of-bounds values are refused without touching the
/// pool. A `table` array, when present, wipes the table and reloads
/// each row into the slot named by the final octet of its address.
/// Rows outside the active pool are dropped, and reloaded rows start
/// over as available with no expiry.
///
/// Every row parses before anything is applied, so a malformed
/// document leaves the table exactly as it was.
///
/// # Errors
///
/// Returns [`Error::Json`] on malformed JSON and
/// [`Error::InvalidAddress`] on an unparseable IP or MAC.
pub fn import_json(table: &mut LeaseTable, json: &str) -> Result<()> {
    let document: ImportDocument = serde_json::from_str(json)?;

    let parsed = match document.table {
        Some(rows) => {
            let mut parsed = Vec::with_capacity(rows.len());
            for row in rows {
                if row.status == SERVER_STATUS {
                    continue;
                }
                let address: Ipv4Addr = row.ip_address.parse().map_err(|_| {
                    Error::InvalidAddress(format!("not an IPv4 address: {}", row.ip_address))
                })?;
                let mac = parse_mac(&row.mac_address)?;
                parsed.push((address.octets()[3], mac));
            }
            Some(parsed)
        }
        None => None,
    };

    if let Some(seconds) = document.lease_time {
        table.set_lease_duration(seconds);
    }
    if let Some(octet) = document.start_octet {
        table.set_start_octet(octet);
    }
    if let Some(octet) = document.last_octet {
        if let Some(span) = octet.checked_sub(table.pool().start_address_octet) {
            table.set_pool_size(span + 1);
        }
    }

    let Some(rows) = parsed else {
        return Ok(());
    };

    table.clear();
    for (octet, mac) in rows {
        if let Some(slot) = slot_for_octet(table, octet) {
            table.set_lease(slot, &mac, 0, LeaseStatus::Available);
        }
    }

    Ok(())
}
