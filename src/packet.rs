//! Raw DHCP/BOOTP frame access per RFC 2131.
//!
//! A DHCP packet consists of a fixed 236-byte header followed by a 4-byte
//! magic cookie and variable-length options. Replies are built in the same
//! buffer the request arrived in: the fixed header is mostly echoed (xid,
//! flags, chaddr, giaddr come back unchanged), a few fields are rewritten,
//! and the options region is overwritten from scratch. [`DhcpFrame`] is a
//! mutable view over that buffer; [`OptionsWriter`] emits the reply TLVs.
//!
//! # Packet Structure
//!
//! ```text
//! 0                   1                   2                   3
//! 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     op (1)    |   htype (1)   |   hlen (1)    |   hops (1)    |
//! +---------------+---------------+---------------+---------------+
//! |                            xid (4)                            |
//! +-------------------------------+-------------------------------+
//! |           secs (2)            |           flags (2)           |
//! +-------------------------------+-------------------------------+
//! |                          ciaddr (4)                           |
//! +---------------------------------------------------------------+
//! |                          yiaddr (4)                           |
//! +---------------------------------------------------------------+
//! |                          siaddr (4)                           |
//! +---------------------------------------------------------------+
//! |                          giaddr (4)                           |
//! +---------------------------------------------------------------+
//! |                          chaddr (16)                          |
//! +---------------------------------------------------------------+
//! |                          sname (64)                           |
//! +---------------------------------------------------------------+
//! |                          file (128)                           |
//! +---------------------------------------------------------------+
//! |                    magic cookie (4) = 99.130.83.99            |
//! +---------------------------------------------------------------+
//! |                          options (variable)                   |
//! +---------------------------------------------------------------+
//! ```
//!
//! # References
//!
//! - RFC 2131: Dynamic Host Configuration Protocol

use std::net::Ipv4Addr;

use crate::options::OptionCode;

/// DHCP magic cookie that identifies DHCP packets (vs plain BOOTP).
pub const DHCP_MAGIC_COOKIE: [u8; 4] = [99, 130, 83, 99];

const OP_OFFSET: usize = 0;
const XID_OFFSET: usize = 4;
const SECS_OFFSET: usize = 8;
const YIADDR_OFFSET: usize = 16;
const GIADDR_OFFSET: usize = 24;
const CHADDR_OFFSET: usize = 28;

const DHCP_SNAME_SIZE: usize = 64;
const DHCP_FILE_SIZE: usize = 128;

/// Offset of the magic cookie: everything before it is the fixed header.
pub const DHCP_MAGIC_COOKIE_OFFSET: usize = CHADDR_OFFSET + 16 + DHCP_SNAME_SIZE + DHCP_FILE_SIZE;

/// Offset of the first option TLV, directly after the magic cookie.
pub const DHCP_OPTIONS_OFFSET: usize = DHCP_MAGIC_COOKIE_OFFSET + DHCP_MAGIC_COOKIE.len();

/// Transport buffer size for receiving and building packets.
///
/// 576 bytes is the minimum MTU that all hosts must accept per RFC 791,
/// and comfortably holds the largest reply this server emits.
pub const DHCP_BUFFER_SIZE: usize = 576;

/// BOOTP/DHCP operation code for client requests.
pub const BOOTREQUEST: u8 = 1;

/// BOOTP/DHCP operation code for server replies.
pub const BOOTREPLY: u8 = 2;

/// A mutable view over a raw DHCP packet buffer.
///
/// `packet_len` is the received datagram's size and bounds all option
/// scans; writes may extend past it up to the buffer's capacity, which is
/// how a short request grows into a longer reply.
pub struct DhcpFrame<'a> {
    buf: &'a mut [u8],
    packet_len: usize,
}

impl<'a> DhcpFrame<'a> {
    /// Wraps a received packet.
    ///
    /// Returns `None` when the datagram cannot hold the fixed header plus
    /// the magic cookie, or claims more bytes than the buffer has. Such
    /// packets are dropped without a reply.
    pub fn new(buf: &'a mut [u8], packet_len: usize) -> Option<Self> {
        if packet_len < DHCP_OPTIONS_OFFSET || packet_len > buf.len() {
            return None;
        }
        Some(Self { buf, packet_len })
    }

    /// Operation code: [`BOOTREQUEST`] or [`BOOTREPLY`].
    pub fn op(&self) -> u8 {
        self.buf[OP_OFFSET]
    }

    pub fn set_op(&mut self, op: u8) {
        self.buf[OP_OFFSET] = op;
    }

    /// Transaction ID chosen by the client, echoed in replies.
    pub fn xid(&self) -> u32 {
        u32::from_be_bytes([
            self.buf[XID_OFFSET],
            self.buf[XID_OFFSET + 1],
            self.buf[XID_OFFSET + 2],
            self.buf[XID_OFFSET + 3],
        ])
    }

    /// Zeroes the elapsed-seconds field. Some clients send garbage here,
    /// so replies never echo it.
    pub fn clear_secs(&mut self) {
        self.buf[SECS_OFFSET] = 0;
        self.buf[SECS_OFFSET + 1] = 0;
    }

    /// Relay gateway address. Non-zero means the request was relayed.
    pub fn giaddr(&self) -> Ipv4Addr {
        Ipv4Addr::new(
            self.buf[GIADDR_OFFSET],
            self.buf[GIADDR_OFFSET + 1],
            self.buf[GIADDR_OFFSET + 2],
            self.buf[GIADDR_OFFSET + 3],
        )
    }

    /// The client hardware address: first 6 bytes of `chaddr`.
    pub fn client_mac(&self) -> [u8; 6] {
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&self.buf[CHADDR_OFFSET..CHADDR_OFFSET + 6]);
        mac
    }

    /// Writes the address being assigned to the client.
    pub fn set_yiaddr(&mut self, addr: Ipv4Addr) {
        self.buf[YIADDR_OFFSET..YIADDR_OFFSET + 4].copy_from_slice(&addr.octets());
    }

    /// True when the options region starts with the DHCP magic cookie.
    /// Without it there are no options worth scanning.
    pub fn has_magic_cookie(&self) -> bool {
        self.buf[DHCP_MAGIC_COOKIE_OFFSET..DHCP_OPTIONS_OFFSET] == DHCP_MAGIC_COOKIE
    }

    /// Scans the request's option TLVs for `code` and returns its value.
    ///
    /// The walk is bounded by the received length, skips pad bytes, and
    /// stops at the end marker or at a truncated option. Absent or
    /// unreadable options return `None`.
    pub fn find_option(&self, code: OptionCode) -> Option<&[u8]> {
        let options = &self.buf[DHCP_OPTIONS_OFFSET..self.packet_len];
        let mut index = 0;
        while index < options.len() {
            let current = options[index];
            if current == OptionCode::End as u8 {
                return None;
            }
            if current == OptionCode::Pad as u8 {
                index += 1;
                continue;
            }
            if index + 1 >= options.len() {
                return None;
            }
            let len = options[index + 1] as usize;
            if index + 2 + len > options.len() {
                return None;
            }
            if current == code as u8 {
                return Some(&options[index + 2..index + 2 + len]);
            }
            index += 2 + len;
        }
        None
    }

    /// First byte of the message-type option (53), if present and non-empty.
    pub fn message_type_byte(&self) -> Option<u8> {
        self.find_option(OptionCode::MessageType)
            .and_then(|value| value.first())
            .copied()
    }

    /// Starts the reply's options region: rewrites the canonical magic
    /// cookie and returns a writer positioned at the first TLV.
    ///
    /// This consumes the frame; scanning the request must happen first.
    pub fn options_writer(self) -> OptionsWriter<'a> {
        let Self { buf, .. } = self;
        buf[DHCP_MAGIC_COOKIE_OFFSET..DHCP_OPTIONS_OFFSET].copy_from_slice(&DHCP_MAGIC_COOKIE);
        OptionsWriter {
            buf: &mut buf[DHCP_OPTIONS_OFFSET..],
            cursor: 0,
        }
    }
}

/// Emits reply option TLVs into the options region of a packet buffer.
///
/// Every write is bounds-checked against the buffer's capacity, with one
/// byte held back so the end marker always fits. An option that does not
/// fit is skipped, never split.
pub struct OptionsWriter<'a> {
    buf: &'a mut [u8],
    cursor: usize,
}

impl OptionsWriter<'_> {
    /// Appends one `[code, len, data…]` option. Data longer than an option
    /// can carry (255 bytes) is truncated. Returns whether it was written.
    pub fn push(&mut self, code: OptionCode, data: &[u8]) -> bool {
        let len = data.len().min(255);
        if self.cursor + 2 + len + 1 > self.buf.len() {
            return false;
        }
        self.buf[self.cursor] = code as u8;
        self.buf[self.cursor + 1] = len as u8;
        self.buf[self.cursor + 2..self.cursor + 2 + len].copy_from_slice(&data[..len]);
        self.cursor += 2 + len;
        true
    }

    /// Appends a 4-byte big-endian integer option (lease time, T1, T2).
    pub fn push_u32(&mut self, code: OptionCode, value: u32) -> bool {
        self.push(code, &value.to_be_bytes())
    }

    /// Writes the end marker and returns the total reply length, fixed
    /// header and cookie included.
    pub fn finish(mut self) -> usize {
        if self.cursor < self.buf.len() {
            self.buf[self.cursor] = OptionCode::End as u8;
            self.cursor += 1;
        }
        DHCP_OPTIONS_OFFSET + self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_test_request(options: &[u8]) -> Vec<u8> {
        let mut packet = vec![0u8; DHCP_BUFFER_SIZE];

        packet[0] = BOOTREQUEST;
        packet[1] = 1;
        packet[2] = 6;
        packet[4..8].copy_from_slice(&0x12345678u32.to_be_bytes());
        packet[8..10].copy_from_slice(&513u16.to_be_bytes());
        packet[10..12].copy_from_slice(&0x8000u16.to_be_bytes());
        packet[28..34].copy_from_slice(&[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        packet[236..240].copy_from_slice(&DHCP_MAGIC_COOKIE);
        packet[240..240 + options.len()].copy_from_slice(options);
        packet
    }

    #[test]
    fn test_frame_rejects_short_packets() {
        let mut buf = [0u8; DHCP_BUFFER_SIZE];
        assert!(DhcpFrame::new(&mut buf, 239).is_none());
        assert!(DhcpFrame::new(&mut buf, 0).is_none());
        assert!(DhcpFrame::new(&mut buf, DHCP_BUFFER_SIZE + 1).is_none());
        assert!(DhcpFrame::new(&mut buf, 240).is_some());
    }

    #[test]
    fn test_header_accessors() {
        let mut packet = build_test_request(&[53, 1, 1, 255]);
        let len = packet.len();
        let mut frame = DhcpFrame::new(&mut packet, len).unwrap();

        assert_eq!(frame.op(), BOOTREQUEST);
        assert_eq!(frame.xid(), 0x12345678);
        assert_eq!(frame.client_mac(), [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        assert!(frame.has_magic_cookie());
        assert_eq!(frame.giaddr(), Ipv4Addr::UNSPECIFIED);

        frame.set_op(BOOTREPLY);
        frame.clear_secs();
        frame.set_yiaddr(Ipv4Addr::new(10, 10, 0, 101));
        assert_eq!(packet[0], BOOTREPLY);
        assert_eq!(&packet[8..10], &[0, 0]);
        assert_eq!(&packet[16..20], &[10, 10, 0, 101]);
    }

    #[test]
    fn test_find_option() {
        let mut packet = build_test_request(&[53, 1, 3, 55, 4, 1, 3, 6, 15, 255]);
        let len = packet.len();
        let frame = DhcpFrame::new(&mut packet, len).unwrap();

        assert_eq!(frame.message_type_byte(), Some(3));
        assert_eq!(
            frame.find_option(OptionCode::ParameterRequestList),
            Some(&[1, 3, 6, 15][..])
        );
        assert_eq!(frame.find_option(OptionCode::LeaseTime), None);
    }

    #[test]
    fn test_find_option_skips_pad_and_stops_at_end() {
        let mut packet = build_test_request(&[0, 0, 53, 1, 1, 255, 55, 2, 1, 3]);
        let len = packet.len();
        let frame = DhcpFrame::new(&mut packet, len).unwrap();

        assert_eq!(frame.message_type_byte(), Some(1));
        // Past the end marker, so never reached.
        assert_eq!(frame.find_option(OptionCode::ParameterRequestList), None);
    }

    #[test]
    fn test_find_option_truncated_length() {
        // Option 53 claims 5 bytes but the packet ends after 1.
        let mut packet = build_test_request(&[53, 5, 1]);
        let packet_len = 240 + 3;
        let frame = DhcpFrame::new(&mut packet, packet_len).unwrap();
        assert_eq!(frame.message_type_byte(), None);
    }

    #[test]
    fn test_find_option_bounded_by_packet_len() {
        // The option exists in the buffer but beyond the received length.
        let mut packet = build_test_request(&[53, 1, 1, 255]);
        let frame = DhcpFrame::new(&mut packet, 240).unwrap();
        assert_eq!(frame.message_type_byte(), None);
    }

    #[test]
    fn test_empty_message_type_option() {
        let mut packet = build_test_request(&[53, 0, 255]);
        let len = packet.len();
        let frame = DhcpFrame::new(&mut packet, len).unwrap();
        assert_eq!(frame.message_type_byte(), None);
    }

    #[test]
    fn test_options_writer_emits_tlvs() {
        let mut packet = build_test_request(&[53, 1, 1, 255]);
        let len = packet.len();
        let frame = DhcpFrame::new(&mut packet, len).unwrap();

        let mut writer = frame.options_writer();
        assert!(writer.push(OptionCode::MessageType, &[2]));
        assert!(writer.push_u32(OptionCode::LeaseTime, 86400));
        let total = writer.finish();

        assert_eq!(total, 240 + 3 + 6 + 1);
        assert_eq!(&packet[236..240], &DHCP_MAGIC_COOKIE);
        assert_eq!(&packet[240..243], &[53, 1, 2]);
        assert_eq!(&packet[243..249], &[51, 4, 0, 1, 0x51, 0x80]);
        assert_eq!(packet[249], 255);
    }

    #[test]
    fn test_options_writer_rewrites_cookie() {
        let mut packet = build_test_request(&[53, 1, 1, 255]);
        packet[236..240].copy_from_slice(&[1, 2, 3, 4]);
        let len = packet.len();
        let frame = DhcpFrame::new(&mut packet, len).unwrap();

        let writer = frame.options_writer();
        writer.finish();
        assert_eq!(&packet[236..240], &DHCP_MAGIC_COOKIE);
    }

    #[test]
    fn test_options_writer_capacity() {
        let mut packet = build_test_request(&[]);
        let frame = DhcpFrame::new(&mut packet, 240).unwrap();
        let mut writer = frame.options_writer();

        // 336 bytes of options region; fill with 47 7-byte options,
        // leaving 7 bytes: one more fits only with the end byte reserved.
        for _ in 0..47 {
            assert!(writer.push(OptionCode::DnsServer, &[0, 0, 0, 0, 0]));
        }
        assert!(!writer.push(OptionCode::DnsServer, &[0, 0, 0, 0, 0, 0]));
        assert!(writer.push(OptionCode::SubnetMask, &[255, 255, 0, 0]));
        let total = writer.finish();
        assert!(total <= DHCP_BUFFER_SIZE);
        assert_eq!(packet[total - 1], 255);
    }

    #[test]
    fn test_options_writer_truncates_oversized_data() {
        let mut packet = build_test_request(&[]);
        let frame = DhcpFrame::new(&mut packet, 240).unwrap();
        let mut writer = frame.options_writer();

        let data = [b'a'; 300];
        assert!(writer.push(OptionCode::DomainName, &data));
        let total = writer.finish();
        assert_eq!(packet[241], 255);
        assert_eq!(total, 240 + 2 + 255 + 1);
    }
}
