//! IGMPv2 (RFC 2236): fixed 8-byte header, unsigned checksum (no
//! pseudo-header, no zero-means-all-ones special case).

use core::fmt;
use std::net::Ipv4Addr;

use crate::checksum;
use crate::config::ParseConfig;
use crate::error::{Error, Result};
use crate::packet::Packet;
use crate::segment::ByteSegment;

const TYPE: usize = 0;
const MAX_RESPONSE_TIME: usize = 1;
const CHECKSUM: usize = 2;
const GROUP_ADDRESS: usize = 4;

/// IGMPv2's header happens to be the same length as UDP's, but the two are
/// unrelated protocols; this gets its own named constant rather than reusing
/// `udp::HEADER_LEN`.
pub const IGMPV2_HEADER_LEN: usize = 8;

enum_with_unknown! {
    pub enum Message(u8) {
        MembershipQuery = 0x11,
        MembershipReportV1 = 0x12,
        MembershipReportV2 = 0x16,
        LeaveGroup = 0x17,
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Message::MembershipQuery => write!(f, "MembershipQuery"),
            Message::MembershipReportV1 => write!(f, "MembershipReportV1"),
            Message::MembershipReportV2 => write!(f, "MembershipReportV2"),
            Message::LeaveGroup => write!(f, "LeaveGroup"),
            Message::Unknown(ty) => write!(f, "0x{ty:02x}"),
        }
    }
}

/// An IGMPv2 message. `max_response_time` is stored on the wire in units of
/// 0.1 seconds; the typed accessor converts to seconds only at the format
/// boundary (raw getter stays in wire units, matching how every other
/// message-specific field here is exposed untouched).
#[derive(Debug)]
pub struct Igmpv2Packet {
    header: ByteSegment,
    config: ParseConfig,
}

impl Igmpv2Packet {
    pub fn parse(segment: ByteSegment, config: ParseConfig) -> Result<Igmpv2Packet> {
        if segment.len() < IGMPV2_HEADER_LEN {
            return Err(Error::Truncated {
                layer: "igmpv2",
                need: IGMPV2_HEADER_LEN,
                have: segment.len(),
            });
        }
        let header = segment.slice(0, IGMPV2_HEADER_LEN)?;
        Ok(Igmpv2Packet { header, config })
    }

    pub fn message(&self) -> Message {
        Message::from(self.header.read_u8(TYPE).expect("clipped header"))
    }

    /// Raw wire value, in units of 0.1 seconds.
    pub fn max_response_time_raw(&self) -> u8 {
        self.header.read_u8(MAX_RESPONSE_TIME).expect("clipped header")
    }

    /// `max_response_time_raw` converted to seconds.
    pub fn max_response_time_secs(&self) -> f64 {
        self.max_response_time_raw() as f64 / 10.0
    }

    pub fn checksum(&self) -> u16 {
        self.header.read_u16_be(CHECKSUM).expect("clipped header")
    }

    pub fn group_address(&self) -> Ipv4Addr {
        self.header.read_ipv4(GROUP_ADDRESS).expect("clipped header")
    }

    pub fn set_message(&mut self, message: Message) -> Result<()> {
        self.header.write_u8(TYPE, message.into())
    }

    pub fn set_max_response_time_raw(&mut self, tenths_of_a_second: u8) -> Result<()> {
        self.header.write_u8(MAX_RESPONSE_TIME, tenths_of_a_second)
    }

    pub fn set_group_address(&mut self, addr: Ipv4Addr) -> Result<()> {
        self.header.write_ipv4(GROUP_ADDRESS, addr)
    }

    /// Unlike UDP there is no all-zero special case: the checksum is a
    /// plain unsigned RFC 1071 sum with no pseudo-header (§5.4). A no-op
    /// under a `ParseConfig::igmpv2` policy that excludes `Tx`.
    pub fn recompute_checksum(&mut self) -> Result<()> {
        if !self.config.igmpv2.compute_on_emit() {
            return Ok(());
        }
        self.header.write_u16_be(CHECKSUM, 0)?;
        let sum = checksum::finalize(checksum::data(&self.header.to_vec()), false);
        self.header.write_u16_be(CHECKSUM, sum)
    }

    /// Trivially `true` under a `ParseConfig::igmpv2` policy that excludes
    /// `Rx`.
    pub fn valid_checksum(&self) -> bool {
        if !self.config.igmpv2.verify_on_parse() {
            return true;
        }
        checksum::data(&self.header.to_vec()) == 0xffff
    }
}

impl Packet for Igmpv2Packet {
    fn header(&self) -> &ByteSegment {
        &self.header
    }

    fn payload_bytes(&self) -> Vec<u8> {
        Vec::new()
    }

    fn format(&self, _verbose: bool, _color: bool) -> String {
        format!(
            "IGMPv2 {} group={} max_response={}s checksum_valid={}",
            self.message(),
            self.group_address(),
            self.max_response_time_secs(),
            self.valid_checksum(),
        )
    }
}

impl fmt::Display for Igmpv2Packet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.format(false, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Matches the worked membership-report example: bytes
    /// `{0x16, 0x64, <checksum>, 0xE0, 0x00, 0x00, 0x01}` decode to
    /// MembershipReportV2, max_response_time 10.0s, group 224.0.0.1.
    #[test]
    fn membership_report_example() {
        let mut bytes = vec![0u8; IGMPV2_HEADER_LEN];
        bytes[TYPE] = 0x16;
        bytes[MAX_RESPONSE_TIME] = 0x64;
        bytes[GROUP_ADDRESS..GROUP_ADDRESS + 4].copy_from_slice(&[224, 0, 0, 1]);
        let mut igmp = Igmpv2Packet::parse(ByteSegment::new(bytes), ParseConfig::default()).unwrap();
        igmp.recompute_checksum().unwrap();

        assert_eq!(igmp.message(), Message::MembershipReportV2);
        assert_eq!(igmp.max_response_time_secs(), 10.0);
        assert_eq!(igmp.group_address(), Ipv4Addr::new(224, 0, 0, 1));
        assert!(igmp.valid_checksum());
    }

    #[test]
    fn leave_group_round_trips() {
        let mut igmp = Igmpv2Packet::parse(ByteSegment::new(vec![0u8; IGMPV2_HEADER_LEN]), ParseConfig::default()).unwrap();
        igmp.set_message(Message::LeaveGroup).unwrap();
        igmp.set_group_address(Ipv4Addr::new(239, 1, 2, 3)).unwrap();
        assert_eq!(igmp.message(), Message::LeaveGroup);
        assert_eq!(igmp.group_address(), Ipv4Addr::new(239, 1, 2, 3));
    }
}
