//! Binary lease snapshots.
//!
//! The whole table serializes to one fixed-length byte block: the pool
//! header followed by every record, multi-byte integers big-endian. A
//! snapshot is rewritten in full on every save and rejected outright on
//! any length or field mismatch, so a torn or corrupted file never
//! half-loads.

use std::net::Ipv4Addr;
use std::path::Path;

use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::lease::{LEASE_CAPACITY, LeaseRecord, LeaseStatus, LeaseTable};

const POOL_ENCODED_LEN: usize = 6 + 4 + 4 + 4 + 4 + 1 + 1 + 1 + 4;
const RECORD_ENCODED_LEN: usize = 6 + 8 + 1 + 1;

/// Exact size of an encoded snapshot in bytes.
pub const SNAPSHOT_LEN: usize = POOL_ENCODED_LEN + LEASE_CAPACITY * RECORD_ENCODED_LEN;

struct Reader<'a> {
    bytes: &'a [u8],
    index: usize,
}

impl Reader<'_> {
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.index..self.index + N]);
        self.index += N;
        out
    }

    fn byte(&mut self) -> u8 {
        let value = self.bytes[self.index];
        self.index += 1;
        value
    }
}

/// Serializes the table, pool header first, then all
/// [`LEASE_CAPACITY`] records in slot order.
pub fn encode(table: &LeaseTable) -> Vec<u8> {
    let pool = table.pool();
    let mut bytes = Vec::with_capacity(SNAPSHOT_LEN);

    bytes.extend_from_slice(&pool.server_mac);
    bytes.extend_from_slice(&pool.server_ip.octets());
    bytes.extend_from_slice(&pool.subnet_mask.octets());
    bytes.extend_from_slice(&pool.gateway.octets());
    bytes.extend_from_slice(&pool.dns.octets());
    bytes.push(pool.start_address_octet);
    bytes.push(pool.pool_size);
    bytes.push(pool.address_increment);
    bytes.extend_from_slice(&pool.lease_duration_seconds.to_be_bytes());

    for record in table.records() {
        bytes.extend_from_slice(&record.mac);
        bytes.extend_from_slice(&record.expires_at_ms.to_be_bytes());
        bytes.push(record.status as u8);
        bytes.push(record.ignore as u8);
    }

    bytes
}

/// Rebuilds a table from snapshot bytes.
///
/// # Errors
///
/// Returns [`Error::InvalidSnapshot`] unless the input is exactly
/// [`SNAPSHOT_LEN`] bytes with a valid pool header and well-formed
/// status and ignore bytes in every record.
pub fn decode(bytes: &[u8]) -> Result<LeaseTable> {
    if bytes.len() != SNAPSHOT_LEN {
        return Err(Error::InvalidSnapshot(format!(
            "expected {} bytes, got {}",
            SNAPSHOT_LEN,
            bytes.len()
        )));
    }

    let mut reader = Reader { bytes, index: 0 };
    let pool = PoolConfig {
        server_mac: reader.take(),
        server_ip: Ipv4Addr::from(reader.take::<4>()),
        subnet_mask: Ipv4Addr::from(reader.take::<4>()),
        gateway: Ipv4Addr::from(reader.take::<4>()),
        dns: Ipv4Addr::from(reader.take::<4>()),
        start_address_octet: reader.byte(),
        pool_size: reader.byte(),
        address_increment: reader.byte(),
        lease_duration_seconds: u32::from_be_bytes(reader.take()),
    };
    pool.validate()
        .map_err(|error| Error::InvalidSnapshot(format!("bad pool header: {}", error)))?;

    let mut records = [LeaseRecord::default(); LEASE_CAPACITY];
    for record in &mut records {
        let mac = reader.take();
        let expires_at_ms = u64::from_be_bytes(reader.take());
        let status = LeaseStatus::try_from(reader.byte())
            .map_err(|value| Error::InvalidSnapshot(format!("bad status byte {}", value)))?;
        let ignore = match reader.byte() {
            0 => false,
            1 => true,
            other => {
                return Err(Error::InvalidSnapshot(format!("bad ignore byte {}", other)));
            }
        };
        *record = LeaseRecord {
            mac,
            expires_at_ms,
            status,
            ignore,
        };
    }

    Ok(LeaseTable::from_parts(pool, records))
}

/// Loads the table from `path`, or builds an empty one over
/// `default_pool` when no snapshot exists yet.
///
/// Expiries are carried verbatim even though the server clock restarts
/// at zero; stale entries resolve through the usual reclamation sweep.
pub async fn load_or_new<P: AsRef<Path>>(path: P, default_pool: PoolConfig) -> Result<LeaseTable> {
    let path = path.as_ref();
    if path.exists() {
        let bytes = tokio::fs::read(path).await?;
        decode(&bytes)
    } else {
        Ok(LeaseTable::new(default_pool))
    }
}

/// Writes the table to `path`, replacing any previous snapshot.
pub async fn save<P: AsRef<Path>>(table: &LeaseTable, path: P) -> Result<()> {
    tokio::fs::write(path, encode(table)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestGuard(String);
    impl Drop for TestGuard {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    fn mac(last: u8) -> [u8; 6] {
        [0xaa, 0xbb, 0xcc, 0xdd, 0xee, last]
    }

    fn populated_table() -> LeaseTable {
        let pool = PoolConfig {
            server_mac: [0x02, 0x11, 0x22, 0x33, 0x44, 0x55],
            server_ip: Ipv4Addr::new(192, 168, 7, 1),
            subnet_mask: Ipv4Addr::new(255, 255, 255, 0),
            gateway: Ipv4Addr::new(192, 168, 7, 254),
            dns: Ipv4Addr::new(9, 9, 9, 9),
            start_address_octet: 50,
            pool_size: 20,
            lease_duration_seconds: 7_200,
            address_increment: 3,
        };
        let mut table = LeaseTable::new(pool);
        table.set_lease(0, &mac(0x01), 123_456, LeaseStatus::Acknowledged);
        table.set_lease(5, &mac(0x02), 999_999, LeaseStatus::Offered);
        table.set_ignore(5, true);
        table
    }

    #[test]
    fn test_encoded_length_is_fixed() {
        let table = LeaseTable::new(PoolConfig::default());
        assert_eq!(encode(&table).len(), SNAPSHOT_LEN);
        assert_eq!(encode(&populated_table()).len(), SNAPSHOT_LEN);
    }

    #[test]
    fn test_round_trip_preserves_everything() {
        let table = populated_table();
        let decoded = decode(&encode(&table)).unwrap();

        assert_eq!(decoded.pool(), table.pool());
        assert_eq!(decoded.records()[..], table.records()[..]);
        assert!(!decoded.dirty());
    }

    #[test]
    fn test_wrong_length_rejected() {
        let bytes = encode(&populated_table());

        let result = decode(&bytes[..SNAPSHOT_LEN - 1]);
        assert!(matches!(result, Err(Error::InvalidSnapshot(_))));

        let mut extended = bytes.clone();
        extended.push(0);
        assert!(matches!(
            decode(&extended),
            Err(Error::InvalidSnapshot(_))
        ));

        assert!(matches!(decode(&[]), Err(Error::InvalidSnapshot(_))));
    }

    #[test]
    fn test_bad_status_byte_rejected() {
        let mut bytes = encode(&populated_table());
        bytes[POOL_ENCODED_LEN + 14] = 9;
        assert!(matches!(decode(&bytes), Err(Error::InvalidSnapshot(_))));
    }

    #[test]
    fn test_bad_ignore_byte_rejected() {
        let mut bytes = encode(&populated_table());
        bytes[POOL_ENCODED_LEN + 15] = 7;
        assert!(matches!(decode(&bytes), Err(Error::InvalidSnapshot(_))));
    }

    #[test]
    fn test_bad_pool_header_rejected() {
        let mut bytes = encode(&populated_table());
        // Zero start octet never validates.
        bytes[22] = 0;
        assert!(matches!(decode(&bytes), Err(Error::InvalidSnapshot(_))));
    }

    #[test]
    fn test_reclaim_applies_to_restored_records() {
        let mut table = LeaseTable::new(PoolConfig::default());
        table.set_lease(0, &mac(0x01), 5_000, LeaseStatus::Acknowledged);

        let mut restored = decode(&encode(&table)).unwrap();

        assert_eq!(restored.find_by_mac(&mac(0x09), 4_000), None);
        assert_eq!(
            restored.record(0).unwrap().status,
            LeaseStatus::Acknowledged
        );

        assert_eq!(restored.find_by_mac(&mac(0x09), 6_000), None);
        assert_eq!(restored.record(0).unwrap().status, LeaseStatus::Available);
        assert_eq!(restored.record(0).unwrap().mac, mac(0x01));
    }

    #[tokio::test]
    async fn test_load_or_new_without_file() {
        let pool = PoolConfig {
            start_address_octet: 30,
            ..PoolConfig::default()
        };
        let table = load_or_new("test_snapshot_missing.bin", pool.clone())
            .await
            .unwrap();

        assert_eq!(table.pool(), &pool);
        assert!(!table.is_occupied(0));
    }

    #[tokio::test]
    async fn test_save_then_load_wins_over_default_pool() {
        let path = "test_snapshot_reload.bin".to_string();
        let _guard = TestGuard(path.clone());

        let table = populated_table();
        save(&table, &path).await.unwrap();

        let loaded = load_or_new(&path, PoolConfig::default()).await.unwrap();
        assert_eq!(loaded.pool(), table.pool());
        assert_eq!(loaded.record(0).unwrap().mac, mac(0x01));
        assert!(loaded.record(5).unwrap().ignore);
    }
}
