use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;

use crate::error::{Error, Result};
use crate::lease::LEASE_CAPACITY;

/// Pool geometry and server identity. Lives inside the lease table, is
/// carried by the snapshot, and seeds from the config file on first boot.
///
/// A slot maps to its address by masking the server address down to the
/// network base, then offsetting the fourth octet by `start_address_octet`
/// plus the slot index and the third octet by `address_increment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub server_mac: [u8; 6],
    pub server_ip: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
    /// 255.255.255.255 means not configured; only displayed, never handed
    /// out in replies.
    pub gateway: Ipv4Addr,
    /// 255.255.255.255 means not configured; only displayed, never handed
    /// out in replies.
    pub dns: Ipv4Addr,
    pub start_address_octet: u8,
    pub pool_size: u8,
    pub lease_duration_seconds: u32,
    pub address_increment: u8,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            server_mac: [0xde, 0xad, 0xcc, 0x00, 0x00, 0x01],
            server_ip: Ipv4Addr::new(10, 10, 0, 1),
            subnet_mask: Ipv4Addr::new(255, 255, 0, 0),
            gateway: Ipv4Addr::BROADCAST,
            dns: Ipv4Addr::BROADCAST,
            start_address_octet: 101,
            pool_size: LEASE_CAPACITY as u8,
            lease_duration_seconds: 86400,
            address_increment: 0,
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<()> {
        if self.start_address_octet == 0 {
            return Err(Error::InvalidConfig(
                "start_address_octet must be at least 1".to_string(),
            ));
        }

        if self.start_address_octet as u16 + self.pool_size as u16 > 255 {
            return Err(Error::InvalidConfig(
                "pool must fit within host octets 1-254".to_string(),
            ));
        }

        if self.pool_size as usize > LEASE_CAPACITY {
            return Err(Error::InvalidConfig(format!(
                "pool_size {} exceeds the table capacity {}",
                self.pool_size, LEASE_CAPACITY
            )));
        }

        if self.address_increment > 9 {
            return Err(Error::InvalidConfig(
                "address_increment must be 0-9".to_string(),
            ));
        }

        if self.lease_duration_seconds == 0 {
            return Err(Error::InvalidConfig(
                "lease_duration_seconds must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// The IPv4 address assigned to a pool slot. Pure: two calls with the
    /// same config and slot always agree. Octet arithmetic wraps, matching
    /// the wire's byte semantics; validated configs never wrap.
    pub fn address_for_slot(&self, slot: usize) -> Ipv4Addr {
        let mut octets = self.server_ip.octets();
        let mask = self.subnet_mask.octets();
        for (octet, mask_octet) in octets.iter_mut().zip(mask) {
            *octet &= mask_octet;
        }
        octets[2] = octets[2].wrapping_add(self.address_increment);
        octets[3] = octets[3].wrapping_add(self.start_address_octet.wrapping_add(slot as u8));
        Ipv4Addr::from(octets)
    }

    /// Directed broadcast address for the server's subnet; replies are
    /// sent here.
    pub fn broadcast_address(&self) -> Ipv4Addr {
        let ip = u32::from(self.server_ip);
        let mask = u32::from(self.subnet_mask);
        Ipv4Addr::from(ip | !mask)
    }

    /// Last host octet covered by the pool, for display.
    pub fn last_address_octet(&self) -> u8 {
        (self.start_address_octet as u16 + self.pool_size as u16).saturating_sub(1) as u8
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub pool: PoolConfig,
    pub domain_name: Option<String>,
    pub snapshot_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            domain_name: None,
            snapshot_file: "leases.snapshot".to_string(),
        }
    }
}

impl Config {
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save(path)?;
            Ok(config)
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.pool.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_start_octet_zero_rejected() {
        let pool = PoolConfig {
            start_address_octet: 0,
            ..Default::default()
        };
        assert!(pool.validate().is_err());
    }

    #[test]
    fn test_pool_past_last_host_octet_rejected() {
        let pool = PoolConfig {
            start_address_octet: 200,
            pool_size: 56,
            ..Default::default()
        };
        assert!(pool.validate().is_err());

        let pool = PoolConfig {
            start_address_octet: 200,
            pool_size: 55,
            ..Default::default()
        };
        assert!(pool.validate().is_ok());
    }

    #[test]
    fn test_address_increment_bound() {
        let pool = PoolConfig {
            address_increment: 10,
            ..Default::default()
        };
        assert!(pool.validate().is_err());

        let pool = PoolConfig {
            address_increment: 9,
            ..Default::default()
        };
        assert!(pool.validate().is_ok());
    }

    #[test]
    fn test_zero_lease_duration_rejected() {
        let pool = PoolConfig {
            lease_duration_seconds: 0,
            ..Default::default()
        };
        assert!(pool.validate().is_err());
    }

    #[test]
    fn test_address_for_slot() {
        let pool = PoolConfig::default();
        assert_eq!(pool.address_for_slot(0), Ipv4Addr::new(10, 10, 0, 101));
        assert_eq!(pool.address_for_slot(53), Ipv4Addr::new(10, 10, 0, 154));
        // Pure: same inputs, same answer.
        assert_eq!(pool.address_for_slot(0), pool.address_for_slot(0));
    }

    #[test]
    fn test_address_for_slot_with_increment() {
        let pool = PoolConfig {
            address_increment: 5,
            ..Default::default()
        };
        assert_eq!(pool.address_for_slot(0), Ipv4Addr::new(10, 10, 5, 101));
    }

    #[test]
    fn test_address_for_slot_masks_host_bits() {
        let pool = PoolConfig {
            server_ip: Ipv4Addr::new(192, 168, 40, 1),
            subnet_mask: Ipv4Addr::new(255, 255, 255, 0),
            start_address_octet: 10,
            pool_size: 20,
            ..Default::default()
        };
        assert_eq!(pool.address_for_slot(3), Ipv4Addr::new(192, 168, 40, 13));
    }

    #[test]
    fn test_broadcast_address() {
        let pool = PoolConfig::default();
        assert_eq!(pool.broadcast_address(), Ipv4Addr::new(10, 10, 255, 255));

        let pool = PoolConfig {
            server_ip: Ipv4Addr::new(192, 168, 40, 1),
            subnet_mask: Ipv4Addr::new(255, 255, 255, 0),
            ..Default::default()
        };
        assert_eq!(pool.broadcast_address(), Ipv4Addr::new(192, 168, 40, 255));
    }

    #[test]
    fn test_last_address_octet() {
        let pool = PoolConfig::default();
        assert_eq!(pool.last_address_octet(), 200);
    }

    #[test]
    fn test_load_or_create_roundtrip() {
        struct Guard(std::path::PathBuf);
        impl Drop for Guard {
            fn drop(&mut self) {
                let _ = std::fs::remove_file(&self.0);
            }
        }

        let path = std::env::temp_dir().join(format!("leasepool-config-{}.json", std::process::id()));
        let _guard = Guard(path.clone());

        let created = Config::load_or_create(&path).unwrap();
        assert!(path.exists());

        let reloaded = Config::load_or_create(&path).unwrap();
        assert_eq!(created.pool, reloaded.pool);
        assert_eq!(created.snapshot_file, reloaded.snapshot_file);
    }
}
