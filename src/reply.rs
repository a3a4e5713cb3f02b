//! BOOTP/DHCP reply construction.
//!
//! [`dhcp_reply`] rewrites a request buffer into its reply in place:
//! the fixed header flips to a BOOTREPLY, the assigned address lands in
//! `yiaddr`, and a fresh options region replaces the client's. The
//! exchange implements the DISCOVER/OFFER then REQUEST/ACK handshake
//! against the slot table in [`crate::lease`], refusing everything else
//! with NAK.

use std::net::Ipv4Addr;

use tracing::{debug, info, warn};

use crate::lease::{LeaseStatus, LeaseTable, format_mac};
use crate::options::{MessageType, OptionCode};
use crate::packet::{BOOTREPLY, BOOTREQUEST, DhcpFrame};

/// How long a fresh offer holds its slot before the reclamation sweep
/// may reset it (10 seconds).
const OFFER_EXPIRY_MS: u64 = 10_000;

/// Cap on honored parameter request list entries (option 55).
const MAX_REQUESTED_OPTIONS: usize = 12;

/// Builds the reply for `buf[..packet_len]` in place and returns the
/// reply length in bytes, or 0 when the packet is not a BOOTREQUEST or
/// is too short to carry one.
///
/// Requests without a magic cookie or a readable message type are
/// refused with NAK rather than dropped. The caller holds the lease
/// table lock for the whole call, so the lookup and the update land as
/// one step.
pub fn dhcp_reply(
    buf: &mut [u8],
    packet_len: usize,
    server_ip: Ipv4Addr,
    domain_name: Option<&str>,
    leases: &mut LeaseTable,
    now_ms: u64,
) -> usize {
    let Some(mut frame) = DhcpFrame::new(buf, packet_len) else {
        return 0;
    };
    if frame.op() != BOOTREQUEST {
        return 0;
    }

    frame.set_op(BOOTREPLY);
    frame.clear_secs();

    let client_mac = frame.client_mac();
    let client = format_mac(&client_mac);

    if frame.giaddr() != Ipv4Addr::UNSPECIFIED {
        debug!("relayed request via {} answered directly", frame.giaddr());
    }

    let request_type = if frame.has_magic_cookie() {
        frame
            .message_type_byte()
            .and_then(|byte| MessageType::try_from(byte).ok())
    } else {
        None
    };
    let xid = frame.xid();
    match request_type {
        Some(message_type) => debug!("{} from {} (xid {:08x})", message_type, client, xid),
        None => debug!("no DHCP message type from {} (xid {:08x})", client, xid),
    }

    let mut requested = [0u8; MAX_REQUESTED_OPTIONS];
    let mut requested_len = 0;
    if frame.has_magic_cookie() {
        if let Some(data) = frame.find_option(OptionCode::ParameterRequestList) {
            requested_len = data.len().min(MAX_REQUESTED_OPTIONS);
            requested[..requested_len].copy_from_slice(&data[..requested_len]);
        }
    }

    let lease_duration = leases.pool().lease_duration_seconds;
    let subnet_mask = leases.pool().subnet_mask;

    let mut slot = leases.find_by_mac(&client_mac, now_ms);

    let response = match request_type {
        Some(MessageType::Discover) => {
            if slot.is_none() {
                slot = leases.allocate_new(now_ms);
            }
            match slot {
                Some(slot) if !leases.record(slot).is_some_and(|record| record.ignore) => {
                    leases.set_lease(
                        slot,
                        &client_mac,
                        now_ms + OFFER_EXPIRY_MS,
                        LeaseStatus::Offered,
                    );
                    MessageType::Offer
                }
                _ => MessageType::Nak,
            }
        }
        Some(MessageType::Request) => match slot {
            Some(slot) if !leases.record(slot).is_some_and(|record| record.ignore) => {
                let expires_at_ms = now_ms + u64::from(lease_duration) * 1000;
                leases.set_lease(slot, &client_mac, expires_at_ms, LeaseStatus::Acknowledged);
                MessageType::Ack
            }
            _ => MessageType::Nak,
        },
        _ => MessageType::Nak,
    };

    // Even a refused client gets the slot's address in yiaddr when one
    // is bound to its MAC.
    let assigned = slot.and_then(|slot| leases.address_for_slot(slot));
    if let Some(address) = assigned {
        frame.set_yiaddr(address);
    }

    match (response, assigned) {
        (MessageType::Offer, Some(address)) => info!("OFFER {} to {}", address, client),
        (MessageType::Ack, Some(address)) => {
            info!(
                "ACK {} to {} (lease: {} seconds)",
                address, client, lease_duration
            );
        }
        (MessageType::Nak, _) => warn!("NAK to {}", client),
        _ => {}
    }

    let mut writer = frame.options_writer();
    writer.push(OptionCode::MessageType, &[response as u8]);
    // Some clients, iOS among them, require the server identifier
    // directly after the message type.
    writer.push(OptionCode::ServerIdentifier, &server_ip.octets());
    writer.push_u32(OptionCode::LeaseTime, lease_duration);
    writer.push_u32(OptionCode::RenewalTime, lease_duration / 2);
    writer.push_u32(
        OptionCode::RebindingTime,
        ((u64::from(lease_duration) * 7) / 8) as u32,
    );

    for &code in &requested[..requested_len] {
        match OptionCode::try_from(code) {
            Ok(OptionCode::SubnetMask) => {
                writer.push(OptionCode::SubnetMask, &subnet_mask.octets());
            }
            Ok(OptionCode::LogServer) => {
                // No log server to hand out; advertise the null address.
                writer.push(OptionCode::LogServer, &[0, 0, 0, 0]);
            }
            Ok(code @ (OptionCode::Router | OptionCode::DnsServer)) => {
                writer.push(code, &server_ip.octets());
            }
            Ok(OptionCode::DomainName) => {
                if let Some(domain) = domain_name.filter(|domain| !domain.is_empty()) {
                    writer.push(OptionCode::DomainName, domain.as_bytes());
                }
            }
            _ => {}
        }
    }

    writer.finish()
}
