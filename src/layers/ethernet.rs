//! Ethernet II framing (grounded in the teacher's `wire/ethernet.rs` field
//! layout and `types/ether.rs`'s getter/setter naming).

use core::fmt;
use std::cell::RefCell;

use crate::addr::EthernetAddress;
use crate::config::ParseConfig;
use crate::error::{Error, Result};
use crate::layers::arp::ArpPacket;
use crate::layers::ipv4::Ipv4Packet;
use crate::layers::ipv6::Ipv6Packet;
use crate::layers::lldp::LldpPacket;
use crate::layers::pppoe::PppoePacket;
use crate::packet::{decode_lazily, format_layer, Packet, PacketOrPayload};
use crate::segment::ByteSegment;

const DESTINATION: usize = 0;
const SOURCE: usize = 6;
const ETHERTYPE: usize = 12;
pub const HEADER_LEN: usize = 14;

enum_with_unknown! {
    /// The Ethernet II "type" field, naming the encapsulated protocol.
    pub enum EtherType(u16) {
        Ipv4 = 0x0800,
        Arp = 0x0806,
        WakeOnLan = 0x0842,
        PppoeDiscovery = 0x8863,
        PppoeSession = 0x8864,
        Ipv6 = 0x86DD,
        Lldp = 0x88CC,
    }
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            EtherType::Ipv4 => write!(f, "IPv4"),
            EtherType::Arp => write!(f, "ARP"),
            EtherType::WakeOnLan => write!(f, "WakeOnLan"),
            EtherType::PppoeDiscovery => write!(f, "PPPoE Discovery"),
            EtherType::PppoeSession => write!(f, "PPPoE Session"),
            EtherType::Ipv6 => write!(f, "IPv6"),
            EtherType::Lldp => write!(f, "LLDP"),
            EtherType::Unknown(id) => write!(f, "0x{id:04x}"),
        }
    }
}

/// An Ethernet II frame: a fixed 14-byte header followed by a payload whose
/// interpretation is chosen by [`EtherType`].
#[derive(Debug)]
pub struct EthernetPacket {
    header: ByteSegment,
    ethertype: EtherType,
    config: ParseConfig,
    payload: RefCell<PacketOrPayload>,
}

impl EthernetPacket {
    pub fn parse(segment: ByteSegment, config: &ParseConfig) -> Result<EthernetPacket> {
        if segment.len() < HEADER_LEN {
            return Err(Error::Truncated {
                layer: "ethernet",
                need: HEADER_LEN,
                have: segment.len(),
            });
        }
        let buffer_len = segment.buffer_len();
        let header = segment.slice(0, HEADER_LEN)?;
        let ethertype = EtherType::from(header.read_u16_be(ETHERTYPE)?);
        let payload = header.encapsulated(buffer_len)?;
        Ok(EthernetPacket {
            header,
            ethertype,
            config: *config,
            payload: RefCell::new(PacketOrPayload::Raw(payload)),
        })
    }

    pub fn destination(&self) -> EthernetAddress {
        self.header.read_mac(DESTINATION).expect("clipped header")
    }

    pub fn source(&self) -> EthernetAddress {
        self.header.read_mac(SOURCE).expect("clipped header")
    }

    pub fn ethertype(&self) -> EtherType {
        self.ethertype
    }

    pub fn set_destination(&mut self, addr: EthernetAddress) -> Result<()> {
        self.header.write_mac(DESTINATION, addr)
    }

    pub fn set_source(&mut self, addr: EthernetAddress) -> Result<()> {
        self.header.write_mac(SOURCE, addr)
    }

    pub fn set_ethertype(&mut self, ethertype: EtherType) -> Result<()> {
        self.header.write_u16_be(ETHERTYPE, ethertype.into())?;
        self.ethertype = ethertype;
        Ok(())
    }

    /// The decoded next layer, dispatched by [`EtherType`]. Lazily decoded
    /// and cached on the first call (§3 "PacketOrPayload").
    pub fn payload(&self) -> std::cell::Ref<PacketOrPayload> {
        let ethertype = self.ethertype;
        let config = self.config;
        decode_lazily(&self.payload, move |segment| -> Box<dyn Packet> {
            match ethertype {
                EtherType::Ipv4 => match Ipv4Packet::parse(segment.clone(), config) {
                    Ok(p) => Box::new(p),
                    Err(_) => Box::new(crate::layers::raw::RawLayer::parse(segment.clone()).expect("zero-len header")),
                },
                EtherType::Ipv6 => match Ipv6Packet::parse(segment.clone(), config) {
                    Ok(p) => Box::new(p),
                    Err(_) => Box::new(crate::layers::raw::RawLayer::parse(segment.clone()).expect("zero-len header")),
                },
                EtherType::Arp => match ArpPacket::parse(segment.clone()) {
                    Ok(p) => Box::new(p),
                    Err(_) => Box::new(crate::layers::raw::RawLayer::parse(segment.clone()).expect("zero-len header")),
                },
                EtherType::PppoeDiscovery | EtherType::PppoeSession => {
                    let kind = if ethertype == EtherType::PppoeSession {
                        crate::layers::pppoe::Kind::Session
                    } else {
                        crate::layers::pppoe::Kind::Discovery
                    };
                    match PppoePacket::parse(segment.clone(), kind) {
                        Ok(p) => Box::new(p),
                        Err(_) => Box::new(crate::layers::raw::RawLayer::parse(segment.clone()).expect("zero-len header")),
                    }
                }
                EtherType::Lldp => match LldpPacket::parse(segment.clone()) {
                    Ok(p) => Box::new(p),
                    Err(_) => Box::new(crate::layers::raw::RawLayer::parse(segment.clone()).expect("zero-len header")),
                },
                EtherType::WakeOnLan | EtherType::Unknown(_) => {
                    Box::new(crate::layers::raw::RawLayer::parse(segment.clone()).expect("zero-len header"))
                }
            }
        })
    }
}

impl Packet for EthernetPacket {
    fn header(&self) -> &ByteSegment {
        &self.header
    }

    fn payload_bytes(&self) -> Vec<u8> {
        self.payload.borrow().to_bytes()
    }

    fn format(&self, verbose: bool, color: bool) -> String {
        let line = format!(
            "Ethernet II src={} dst={} type={}",
            self.source(),
            self.destination(),
            self.ethertype()
        );
        format_layer(line, &self.payload.borrow(), verbose, color)
    }
}

impl fmt::Display for EthernetPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.format(false, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ipv4_frame() -> Vec<u8> {
        let mut bytes = vec![0u8; HEADER_LEN + 4];
        bytes[DESTINATION..SOURCE].copy_from_slice(&[0xff; 6]);
        bytes[SOURCE..ETHERTYPE].copy_from_slice(&[0x02, 0, 0, 0, 0, 1]);
        bytes[ETHERTYPE..ETHERTYPE + 2].copy_from_slice(&0x0800u16.to_be_bytes());
        bytes
    }

    #[test]
    fn parses_fields_and_dispatches_by_ethertype() {
        let bytes = sample_ipv4_frame();
        let frame = EthernetPacket::parse(ByteSegment::new(bytes), &ParseConfig::default()).unwrap();
        assert_eq!(frame.destination(), EthernetAddress::BROADCAST);
        assert_eq!(frame.ethertype(), EtherType::Ipv4);
    }

    #[test]
    fn unknown_ethertype_is_raw_not_error() {
        let mut bytes = sample_ipv4_frame();
        bytes[ETHERTYPE..ETHERTYPE + 2].copy_from_slice(&0xBEEFu16.to_be_bytes());
        let frame = EthernetPacket::parse(ByteSegment::new(bytes), &ParseConfig::default()).unwrap();
        assert!(matches!(frame.ethertype(), EtherType::Unknown(0xBEEF)));
        assert!(frame.payload().as_raw().is_some());
    }

    #[test]
    fn truncated_header_is_error() {
        let bytes = vec![0u8; 10];
        assert!(matches!(
            EthernetPacket::parse(ByteSegment::new(bytes), &ParseConfig::default()),
            Err(Error::Truncated { layer: "ethernet", .. })
        ));
    }
}
