//! ICMPv6 (RFC 4443): same `{type, code, checksum}` prefix shape as
//! ICMPv4, but the checksum *does* include the IPv6 pseudo-header.

use core::fmt;

use crate::checksum;
use crate::config::ParseConfig;
use crate::error::{Error, Result};
use crate::packet::{IpPseudoHeader, Packet};
use crate::segment::ByteSegment;

const TYPE: usize = 0;
const CODE: usize = 1;
const CHECKSUM: usize = 2;
const REST: usize = 4;
pub const HEADER_LEN: usize = 8;

enum_with_unknown! {
    pub enum Message(u8) {
        DestinationUnreachable = 1,
        PacketTooBig = 2,
        TimeExceeded = 3,
        ParameterProblem = 4,
        EchoRequest = 128,
        EchoReply = 129,
        NeighborSolicitation = 135,
        NeighborAdvertisement = 136,
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Message::DestinationUnreachable => write!(f, "DestinationUnreachable"),
            Message::PacketTooBig => write!(f, "PacketTooBig"),
            Message::TimeExceeded => write!(f, "TimeExceeded"),
            Message::ParameterProblem => write!(f, "ParameterProblem"),
            Message::EchoRequest => write!(f, "EchoRequest"),
            Message::EchoReply => write!(f, "EchoReply"),
            Message::NeighborSolicitation => write!(f, "NeighborSolicitation"),
            Message::NeighborAdvertisement => write!(f, "NeighborAdvertisement"),
            Message::Unknown(ty) => write!(f, "0x{ty:02x}"),
        }
    }
}

/// Only Echo- and NeighborSolicitation-class messages are modeled as typed
/// variants (§5.4); everything else decodes to the generic `Unknown(type,
/// code, rest)` shape via [`Message::Unknown`] plus
/// [`Icmpv6Packet::rest_of_header_and_data`].
#[derive(Debug)]
pub struct Icmpv6Packet {
    header: ByteSegment,
    message: Message,
    pseudo: IpPseudoHeader,
    config: ParseConfig,
}

impl Icmpv6Packet {
    pub fn parse(segment: ByteSegment, pseudo: IpPseudoHeader, config: ParseConfig) -> Result<Icmpv6Packet> {
        if segment.len() < HEADER_LEN {
            return Err(Error::Truncated {
                layer: "icmpv6",
                need: HEADER_LEN,
                have: segment.len(),
            });
        }
        let header = segment.slice(0, segment.len())?;
        let message = Message::from(header.read_u8(TYPE)?);
        Ok(Icmpv6Packet { header, message, pseudo, config })
    }

    pub fn message(&self) -> Message {
        self.message
    }

    pub fn code(&self) -> u8 {
        self.header.read_u8(CODE).expect("clipped header")
    }

    pub fn checksum(&self) -> u16 {
        self.header.read_u16_be(CHECKSUM).expect("clipped header")
    }

    pub fn identifier(&self) -> Option<u16> {
        matches!(self.message, Message::EchoRequest | Message::EchoReply)
            .then(|| self.header.read_u16_be(REST).expect("clipped header"))
    }

    pub fn sequence(&self) -> Option<u16> {
        matches!(self.message, Message::EchoRequest | Message::EchoReply)
            .then(|| self.header.read_u16_be(REST + 2).expect("clipped header"))
    }

    pub fn target_address(&self) -> Option<std::net::Ipv6Addr> {
        matches!(self.message, Message::NeighborSolicitation | Message::NeighborAdvertisement)
            .then(|| self.header.read_ipv6(REST).expect("clipped header"))
    }

    pub fn rest_of_header_and_data(&self) -> Vec<u8> {
        self.header
            .read_bytes(REST, self.header.len() - REST)
            .expect("clipped header")
    }

    /// Unlike ICMPv4, the checksum includes the IPv6 pseudo-header (§5.4,
    /// the one place `AttachPseudoIPHeader` differs by protocol). A no-op
    /// under a `ParseConfig::icmpv6` policy that excludes `Tx`.
    pub fn recompute_checksum(&mut self) -> Result<()> {
        if !self.config.icmpv6.compute_on_emit() {
            return Ok(());
        }
        self.header.write_u16_be(CHECKSUM, 0)?;
        let sum = checksum::finalize(self.checksum_with_pseudo(), false);
        self.header.write_u16_be(CHECKSUM, sum)
    }

    /// Trivially `true` under a `ParseConfig::icmpv6` policy that excludes
    /// `Rx`.
    pub fn valid_checksum(&self) -> bool {
        if !self.config.icmpv6.verify_on_parse() {
            return true;
        }
        self.checksum_with_pseudo() == 0xffff
    }

    fn checksum_with_pseudo(&self) -> u16 {
        let bytes = self.header.to_vec();
        let pseudo = match self.pseudo {
            IpPseudoHeader::V6 { src, dst, next_header } => {
                checksum::pseudo_header_v6(src, dst, next_header, bytes.len() as u32)
            }
            IpPseudoHeader::V4 { .. } => 0,
        };
        checksum::combine(&[pseudo, checksum::data(&bytes)])
    }
}

impl Packet for Icmpv6Packet {
    fn header(&self) -> &ByteSegment {
        &self.header
    }

    fn payload_bytes(&self) -> Vec<u8> {
        Vec::new()
    }

    fn format(&self, _verbose: bool, _color: bool) -> String {
        format!("ICMPv6 {} code={} checksum_valid={}", self.message(), self.code(), self.valid_checksum())
    }
}

impl fmt::Display for Icmpv6Packet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.format(false, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    #[test]
    fn neighbor_solicitation_exposes_target_address() {
        let mut bytes = vec![0u8; HEADER_LEN + 16];
        bytes[TYPE] = 135;
        bytes[REST..REST + 16].copy_from_slice(&Ipv6Addr::LOCALHOST.octets());
        let pseudo = IpPseudoHeader::V6 {
            src: Ipv6Addr::LOCALHOST,
            dst: Ipv6Addr::LOCALHOST,
            next_header: 58,
        };
        let icmp = Icmpv6Packet::parse(ByteSegment::new(bytes), pseudo, ParseConfig::default()).unwrap();
        assert_eq!(icmp.message(), Message::NeighborSolicitation);
        assert_eq!(icmp.target_address(), Some(Ipv6Addr::LOCALHOST));
    }

    #[test]
    fn checksum_includes_pseudo_header() {
        let mut bytes = vec![0u8; HEADER_LEN];
        bytes[TYPE] = 128;
        let pseudo = IpPseudoHeader::V6 {
            src: Ipv6Addr::LOCALHOST,
            dst: Ipv6Addr::LOCALHOST,
            next_header: 58,
        };
        let mut icmp = Icmpv6Packet::parse(ByteSegment::new(bytes), pseudo, ParseConfig::default()).unwrap();
        icmp.recompute_checksum().unwrap();
        assert!(icmp.valid_checksum());
    }
}
