//! DHCP option codes and message types as defined in RFC 2132.
//!
//! DHCP uses options to convey configuration parameters between servers and
//! clients. Each option is a TLV: code (1 byte), length (1 byte), data.
//! This server recognizes a small fixed set of codes; everything else in a
//! client's parameter request list is skipped.
//!
//! # References
//!
//! - RFC 2132: DHCP Options and BOOTP Vendor Extensions

/// DHCP option codes recognized by this server.
///
/// Requested codes outside this set are ignored rather than answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OptionCode {
    /// Padding byte; carries no length or value.
    Pad = 0,
    /// Subnet mask of the client's network (RFC 2132 §3.3).
    SubnetMask = 1,
    /// Default gateway (RFC 2132 §3.5); answered with the server address.
    Router = 3,
    /// Name server (RFC 2132 §3.8); answered with the server address.
    DnsServer = 6,
    /// MIT-LCS UDP log server (RFC 2132 §3.10); answered with a
    /// zero-address placeholder.
    LogServer = 7,
    /// DNS domain suffix for the client (RFC 2132 §3.17).
    DomainName = 15,
    /// Lease duration in seconds (RFC 2132 §9.2).
    LeaseTime = 51,
    /// Message type discriminator (RFC 2132 §9.6).
    MessageType = 53,
    /// The answering server's address (RFC 2132 §9.7).
    ServerIdentifier = 54,
    /// Codes the client wants answered (RFC 2132 §9.8).
    ParameterRequestList = 55,
    /// Renewal timer T1 (RFC 2132 §9.11).
    RenewalTime = 58,
    /// Rebinding timer T2 (RFC 2132 §9.12).
    RebindingTime = 59,
    /// Terminates the option list.
    End = 255,
}

impl TryFrom<u8> for OptionCode {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Pad),
            1 => Ok(Self::SubnetMask),
            3 => Ok(Self::Router),
            6 => Ok(Self::DnsServer),
            7 => Ok(Self::LogServer),
            15 => Ok(Self::DomainName),
            51 => Ok(Self::LeaseTime),
            53 => Ok(Self::MessageType),
            54 => Ok(Self::ServerIdentifier),
            55 => Ok(Self::ParameterRequestList),
            58 => Ok(Self::RenewalTime),
            59 => Ok(Self::RebindingTime),
            255 => Ok(Self::End),
            other => Err(other),
        }
    }
}

/// DHCP message types (Option 53) as defined in RFC 2132 §9.6.
///
/// Only DISCOVER and REQUEST are honored by this server; every other type
/// classifies the exchange for logging and is answered with NAK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Client probe for available servers.
    Discover = 1,
    /// Server answer to DISCOVER carrying a candidate address.
    Offer = 2,
    /// Client acceptance of an offered address, or a renewal.
    Request = 3,
    /// Client report that an offered address is taken.
    Decline = 4,
    /// Server confirmation of a REQUEST.
    Ack = 5,
    /// Server refusal.
    Nak = 6,
    /// Client giving an address back early.
    Release = 7,
    /// Client asking for parameters without an address.
    Inform = 8,
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Discover),
            2 => Ok(Self::Offer),
            3 => Ok(Self::Request),
            4 => Ok(Self::Decline),
            5 => Ok(Self::Ack),
            6 => Ok(Self::Nak),
            7 => Ok(Self::Release),
            8 => Ok(Self::Inform),
            other => Err(other),
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discover => write!(f, "DISCOVER"),
            Self::Offer => write!(f, "OFFER"),
            Self::Request => write!(f, "REQUEST"),
            Self::Decline => write!(f, "DECLINE"),
            Self::Ack => write!(f, "ACK"),
            Self::Nak => write!(f, "NAK"),
            Self::Release => write!(f, "RELEASE"),
            Self::Inform => write!(f, "INFORM"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_conversions() {
        for value in 1..=8u8 {
            let msg_type = MessageType::try_from(value).unwrap();
            assert_eq!(msg_type as u8, value);
        }
        assert!(MessageType::try_from(0).is_err());
        assert!(MessageType::try_from(9).is_err());
    }

    #[test]
    fn test_option_code_conversions() {
        for code in [
            OptionCode::Pad,
            OptionCode::SubnetMask,
            OptionCode::Router,
            OptionCode::DnsServer,
            OptionCode::LogServer,
            OptionCode::DomainName,
            OptionCode::LeaseTime,
            OptionCode::MessageType,
            OptionCode::ServerIdentifier,
            OptionCode::ParameterRequestList,
            OptionCode::RenewalTime,
            OptionCode::RebindingTime,
            OptionCode::End,
        ] {
            assert_eq!(OptionCode::try_from(code as u8), Ok(code));
        }
    }

    #[test]
    fn test_unrecognized_option_code_rejected() {
        assert_eq!(OptionCode::try_from(50), Err(50));
        assert_eq!(OptionCode::try_from(82), Err(82));
        assert_eq!(OptionCode::try_from(200), Err(200));
    }

    #[test]
    fn test_message_type_display() {
        assert_eq!(format!("{}", MessageType::Discover), "DISCOVER");
        assert_eq!(format!("{}", MessageType::Offer), "OFFER");
        assert_eq!(format!("{}", MessageType::Request), "REQUEST");
        assert_eq!(format!("{}", MessageType::Decline), "DECLINE");
        assert_eq!(format!("{}", MessageType::Ack), "ACK");
        assert_eq!(format!("{}", MessageType::Nak), "NAK");
        assert_eq!(format!("{}", MessageType::Release), "RELEASE");
        assert_eq!(format!("{}", MessageType::Inform), "INFORM");
    }
}
