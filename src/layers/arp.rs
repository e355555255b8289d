//! Address Resolution Protocol (RFC 826), generalized beyond the
//! teacher's hard-coded Ethernet+IPv4 case: address field widths are
//! driven by the wire `hardware_len`/`protocol_len` bytes (teacher:
//! `wire/arp.rs`'s `field::SHA`/`SPA`/`THA`/`TPA` range functions).

use core::fmt;

use crate::error::{Error, Result};
use crate::packet::Packet;
use crate::segment::ByteSegment;

const HTYPE: usize = 0;
const PTYPE: usize = 2;
const HLEN: usize = 4;
const PLEN: usize = 5;
const OPER: usize = 6;
const FIXED_LEN: usize = 8;

enum_with_unknown! {
    pub enum HardwareType(u16) {
        Ethernet = 1,
    }
}

enum_with_unknown! {
    pub enum Operation(u16) {
        Request = 1,
        Reply = 2,
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Operation::Request => write!(f, "request"),
            Operation::Reply => write!(f, "reply"),
            Operation::Unknown(op) => write!(f, "0x{op:04x}"),
        }
    }
}

/// An ARP packet. Only the fixed 8-byte prefix is interpreted structurally;
/// the four address fields are exposed as opaque byte slices whose width is
/// read from `hardware_len`/`protocol_len`, with typed convenience
/// accessors for the common Ethernet+IPv4 case.
#[derive(Debug)]
pub struct ArpPacket {
    header: ByteSegment,
}

impl ArpPacket {
    fn sha_offset(&self) -> usize {
        OPER + 2
    }

    fn spa_offset(&self) -> usize {
        self.sha_offset() + self.hardware_len() as usize
    }

    fn tha_offset(&self) -> usize {
        self.spa_offset() + self.protocol_len() as usize
    }

    fn tpa_offset(&self) -> usize {
        self.tha_offset() + self.hardware_len() as usize
    }

    fn total_len(hardware_len: u8, protocol_len: u8) -> usize {
        FIXED_LEN + 2 * (hardware_len as usize + protocol_len as usize)
    }

    pub fn parse(segment: ByteSegment) -> Result<ArpPacket> {
        if segment.len() < FIXED_LEN {
            return Err(Error::Truncated {
                layer: "arp",
                need: FIXED_LEN,
                have: segment.len(),
            });
        }
        let hardware_len = segment.read_u8(HLEN)?;
        let protocol_len = segment.read_u8(PLEN)?;
        let header_len = Self::total_len(hardware_len, protocol_len);
        if segment.len() < header_len {
            return Err(Error::Truncated {
                layer: "arp",
                need: header_len,
                have: segment.len(),
            });
        }
        let header = segment.slice(0, header_len)?;
        Ok(ArpPacket { header })
    }

    pub fn hardware_type(&self) -> HardwareType {
        HardwareType::from(self.header.read_u16_be(HTYPE).expect("clipped header"))
    }

    pub fn protocol_type(&self) -> crate::layers::EtherType {
        crate::layers::EtherType::from(self.header.read_u16_be(PTYPE).expect("clipped header"))
    }

    pub fn hardware_len(&self) -> u8 {
        self.header.read_u8(HLEN).expect("clipped header")
    }

    pub fn protocol_len(&self) -> u8 {
        self.header.read_u8(PLEN).expect("clipped header")
    }

    pub fn operation(&self) -> Operation {
        Operation::from(self.header.read_u16_be(OPER).expect("clipped header"))
    }

    pub fn set_operation(&mut self, op: Operation) -> Result<()> {
        self.header.write_u16_be(OPER, op.into())
    }

    pub fn source_hardware_addr(&self) -> Vec<u8> {
        let off = self.sha_offset();
        self.header.read_bytes(off, self.hardware_len() as usize).expect("clipped header")
    }

    pub fn source_protocol_addr(&self) -> Vec<u8> {
        let off = self.spa_offset();
        self.header.read_bytes(off, self.protocol_len() as usize).expect("clipped header")
    }

    pub fn target_hardware_addr(&self) -> Vec<u8> {
        let off = self.tha_offset();
        self.header.read_bytes(off, self.hardware_len() as usize).expect("clipped header")
    }

    pub fn target_protocol_addr(&self) -> Vec<u8> {
        let off = self.tpa_offset();
        self.header.read_bytes(off, self.protocol_len() as usize).expect("clipped header")
    }

    /// The sender's IPv4 address, when this is the common Ethernet+IPv4 case.
    pub fn source_ipv4(&self) -> Option<std::net::Ipv4Addr> {
        if self.hardware_type() == HardwareType::Ethernet && self.protocol_len() == 4 {
            self.header.read_ipv4(self.spa_offset()).ok()
        } else {
            None
        }
    }

    /// The target's IPv4 address, when this is the common Ethernet+IPv4 case.
    pub fn target_ipv4(&self) -> Option<std::net::Ipv4Addr> {
        if self.hardware_type() == HardwareType::Ethernet && self.protocol_len() == 4 {
            self.header.read_ipv4(self.tpa_offset()).ok()
        } else {
            None
        }
    }
}

impl Packet for ArpPacket {
    fn header(&self) -> &ByteSegment {
        &self.header
    }

    fn payload_bytes(&self) -> Vec<u8> {
        Vec::new()
    }

    fn format(&self, _verbose: bool, _color: bool) -> String {
        format!(
            "ARP {} hw={:?} proto={} sha={:02x?} spa={:02x?} tha={:02x?} tpa={:02x?}",
            self.operation(),
            self.hardware_type(),
            self.protocol_type(),
            self.source_hardware_addr(),
            self.source_protocol_addr(),
            self.target_hardware_addr(),
            self.target_protocol_addr(),
        )
    }
}

impl fmt::Display for ArpPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.format(false, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn sample_request() -> Vec<u8> {
        let mut bytes = vec![0u8; FIXED_LEN + 2 * (6 + 4)];
        bytes[HTYPE..HTYPE + 2].copy_from_slice(&1u16.to_be_bytes());
        bytes[PTYPE..PTYPE + 2].copy_from_slice(&0x0800u16.to_be_bytes());
        bytes[HLEN] = 6;
        bytes[PLEN] = 4;
        bytes[OPER..OPER + 2].copy_from_slice(&1u16.to_be_bytes());
        bytes[8..14].copy_from_slice(&[0x02, 0, 0, 0, 0, 1]);
        bytes[14..18].copy_from_slice(&Ipv4Addr::new(10, 0, 0, 1).octets());
        bytes[24..28].copy_from_slice(&Ipv4Addr::new(10, 0, 0, 2).octets());
        bytes
    }

    #[test]
    fn parses_ethernet_ipv4_request() {
        let arp = ArpPacket::parse(ByteSegment::new(sample_request())).unwrap();
        assert_eq!(arp.operation(), Operation::Request);
        assert_eq!(arp.source_ipv4(), Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(arp.target_ipv4(), Some(Ipv4Addr::new(10, 0, 0, 2)));
    }

    #[test]
    fn truncated_fixed_prefix_is_error() {
        assert!(matches!(
            ArpPacket::parse(ByteSegment::new(vec![0u8; 4])),
            Err(Error::Truncated { layer: "arp", .. })
        ));
    }
}
