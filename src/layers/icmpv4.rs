//! ICMPv4 (RFC 792): `{type, code, checksum}` fixed prefix, then a
//! type-dependent rest-of-header. Checksum excludes any pseudo-header.

use core::fmt;

use crate::checksum;
use crate::config::ParseConfig;
use crate::error::{Error, Result};
use crate::packet::Packet;
use crate::segment::ByteSegment;

const TYPE: usize = 0;
const CODE: usize = 1;
const CHECKSUM: usize = 2;
const REST: usize = 4;
pub const HEADER_LEN: usize = 8;

enum_with_unknown! {
    pub enum Message(u8) {
        EchoReply = 0,
        DestinationUnreachable = 3,
        EchoRequest = 8,
        TimeExceeded = 11,
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Message::EchoReply => write!(f, "EchoReply"),
            Message::DestinationUnreachable => write!(f, "DestinationUnreachable"),
            Message::EchoRequest => write!(f, "EchoRequest"),
            Message::TimeExceeded => write!(f, "TimeExceeded"),
            Message::Unknown(ty) => write!(f, "0x{ty:02x}"),
        }
    }
}

/// An ICMPv4 message. Only Echo Request/Reply expose typed `identifier`/
/// `sequence` accessors; everything else's rest-of-header is exposed as raw
/// bytes (§5.4 ICMPv4 specifics).
#[derive(Debug)]
pub struct Icmpv4Packet {
    header: ByteSegment,
    message: Message,
    config: ParseConfig,
}

impl Icmpv4Packet {
    pub fn parse(segment: ByteSegment, config: ParseConfig) -> Result<Icmpv4Packet> {
        if segment.len() < HEADER_LEN {
            return Err(Error::Truncated {
                layer: "icmpv4",
                need: HEADER_LEN,
                have: segment.len(),
            });
        }
        let header = segment.slice(0, segment.len())?;
        let message = Message::from(header.read_u8(TYPE)?);
        Ok(Icmpv4Packet { header, message, config })
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

    pub fn rest_of_header_and_data(&self) -> Vec<u8> {
        self.header
            .read_bytes(REST, self.header.len() - REST)
            .expect("clipped header")
    }

    /// A no-op under a `ParseConfig::icmpv4` policy that excludes `Tx`.
    pub fn recompute_checksum(&mut self) -> Result<()> {
        if !self.config.icmpv4.compute_on_emit() {
            return Ok(());
        }
        self.header.write_u16_be(CHECKSUM, 0)?;
        let sum = checksum::finalize(checksum::data(&self.header.to_vec()), false);
        self.header.write_u16_be(CHECKSUM, sum)
    }

    /// The sum including the original checksum field must fold to `0xFFFF`
    /// (not zero — see `ipv4::Ipv4Packet::valid_checksum` for the same
    /// invariant spelled out). Trivially `true` under a `ParseConfig::icmpv4`
    /// policy that excludes `Rx`.
    pub fn valid_checksum(&self) -> bool {
        if !self.config.icmpv4.verify_on_parse() {
            return true;
        }
        checksum::data(&self.header.to_vec()) == 0xffff
    }
}

impl Packet for Icmpv4Packet {
    fn header(&self) -> &ByteSegment {
        &self.header
    }

    fn payload_bytes(&self) -> Vec<u8> {
        Vec::new()
    }

    fn format(&self, _verbose: bool, _color: bool) -> String {
        format!("ICMPv4 {} code={} checksum_valid={}", self.message(), self.code(), self.valid_checksum())
    }
}

impl fmt::Display for Icmpv4Packet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.format(false, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_request_exposes_identifier_and_sequence() {
        let mut bytes = vec![0u8; HEADER_LEN];
        bytes[TYPE] = 8;
        bytes[REST..REST + 2].copy_from_slice(&0x1234u16.to_be_bytes());
        bytes[REST + 2..REST + 4].copy_from_slice(&7u16.to_be_bytes());
        let icmp = Icmpv4Packet::parse(ByteSegment::new(bytes), ParseConfig::default()).unwrap();
        assert_eq!(icmp.message(), Message::EchoRequest);
        assert_eq!(icmp.identifier(), Some(0x1234));
        assert_eq!(icmp.sequence(), Some(7));
    }

    #[test]
    fn checksum_roundtrips() {
        let mut bytes = vec![0u8; HEADER_LEN];
        bytes[TYPE] = 8;
        let mut icmp = Icmpv4Packet::parse(ByteSegment::new(bytes), ParseConfig::default()).unwrap();
        icmp.recompute_checksum().unwrap();
        assert!(icmp.valid_checksum());
    }
}
