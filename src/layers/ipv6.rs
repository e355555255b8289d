//! IPv6 (RFC 8200): fixed 40-byte header plus a walk over extension headers
//! before reaching the upper-layer protocol.

use core::fmt;
use std::cell::RefCell;
use std::net::Ipv6Addr;

use crate::config::ParseConfig;
use crate::error::{Error, Result};
use crate::layers::ip::IpProtocol;
use crate::layers::ipv4::dispatch_ip_payload;
use crate::packet::{decode_lazily, format_layer, IpPseudoHeader, Packet, PacketOrPayload};
use crate::segment::ByteSegment;

const VER_TC_FL: usize = 0;
const PAYLOAD_LEN: usize = 4;
const NEXT_HEADER: usize = 6;
const HOP_LIMIT: usize = 7;
const SRC: usize = 8;
const DST: usize = 24;
pub const HEADER_LEN: usize = 40;

/// An IPv6 datagram. Unlike IPv4, `PayloadLength` is explicit rather than
/// derived from a total-length field; extension headers are walked ahead of
/// time so that `protocol()` always names the upper-layer protocol, not
/// necessarily the wire `NextHeader` byte of the fixed header.
#[derive(Debug)]
pub struct Ipv6Packet {
    header: ByteSegment,
    protocol: IpProtocol,
    config: ParseConfig,
    payload: RefCell<PacketOrPayload>,
}

impl Ipv6Packet {
    pub fn parse(segment: ByteSegment, config: ParseConfig) -> Result<Ipv6Packet> {
        if segment.len() < HEADER_LEN {
            return Err(Error::Truncated {
                layer: "ipv6",
                need: HEADER_LEN,
                have: segment.len(),
            });
        }
        let header = segment.slice(0, HEADER_LEN)?;
        let payload_len = header.read_u16_be(PAYLOAD_LEN)? as usize;
        let bound = header.offset() + HEADER_LEN + payload_len;
        let buffer_len = header.buffer_len();
        if bound > buffer_len {
            return Err(Error::Truncated {
                layer: "ipv6",
                need: HEADER_LEN + payload_len,
                have: buffer_len - header.offset(),
            });
        }
        let mut next_header = IpProtocol::from(header.read_u8(NEXT_HEADER)?);
        let mut cursor = header.encapsulated(bound)?;

        // Walk extension headers (Hop-by-Hop, Routing, DestOpts, Fragment)
        // until the upper-layer protocol is reached.
        loop {
            match next_header {
                IpProtocol::HopByHop | IpProtocol::Ipv6Route | IpProtocol::Ipv6Opts => {
                    if cursor.len() < 2 {
                        return Err(Error::Truncated {
                            layer: "ipv6-ext",
                            need: 2,
                            have: cursor.len(),
                        });
                    }
                    let ext_next = IpProtocol::from(cursor.read_u8(0)?);
                    let ext_len = (cursor.read_u8(1)? as usize + 1) * 8;
                    if cursor.len() < ext_len {
                        return Err(Error::Truncated {
                            layer: "ipv6-ext",
                            need: ext_len,
                            have: cursor.len(),
                        });
                    }
                    cursor = cursor.slice(ext_len, cursor.len() - ext_len)?;
                    next_header = ext_next;
                }
                IpProtocol::Ipv6Frag => {
                    // RFC 8200: fixed 8 bytes, no length-in-units field of its own.
                    const FRAGMENT_LEN: usize = 8;
                    if cursor.len() < FRAGMENT_LEN {
                        return Err(Error::Truncated {
                            layer: "ipv6-ext",
                            need: FRAGMENT_LEN,
                            have: cursor.len(),
                        });
                    }
                    let ext_next = IpProtocol::from(cursor.read_u8(0)?);
                    cursor = cursor.slice(FRAGMENT_LEN, cursor.len() - FRAGMENT_LEN)?;
                    next_header = ext_next;
                }
                _ => break,
            }
        }

        Ok(Ipv6Packet {
            header,
            protocol: next_header,
            config,
            payload: RefCell::new(PacketOrPayload::Raw(cursor)),
        })
    }

    pub fn traffic_class(&self) -> u8 {
        let word = self.header.read_u32_be(VER_TC_FL).expect("clipped header");
        ((word >> 20) & 0xff) as u8
    }

    pub fn flow_label(&self) -> u32 {
        let word = self.header.read_u32_be(VER_TC_FL).expect("clipped header");
        word & 0x000f_ffff
    }

    pub fn payload_length(&self) -> u16 {
        self.header.read_u16_be(PAYLOAD_LEN).expect("clipped header")
    }

    /// The upper-layer protocol reached after walking any extension headers
    /// (distilled-spec scenario 5: Fragment -> TCP, not the fixed header's
    /// own `NextHeader` byte).
    pub fn protocol(&self) -> IpProtocol {
        self.protocol
    }

    pub fn hop_limit(&self) -> u8 {
        self.header.read_u8(HOP_LIMIT).expect("clipped header")
    }

    pub fn src_addr(&self) -> Ipv6Addr {
        self.header.read_ipv6(SRC).expect("clipped header")
    }

    pub fn dst_addr(&self) -> Ipv6Addr {
        self.header.read_ipv6(DST).expect("clipped header")
    }

    pub fn set_src_addr(&mut self, addr: Ipv6Addr) -> Result<()> {
        self.header.write_ipv6(SRC, addr)
    }

    pub fn set_dst_addr(&mut self, addr: Ipv6Addr) -> Result<()> {
        self.header.write_ipv6(DST, addr)
    }

    pub fn set_hop_limit(&mut self, hop_limit: u8) -> Result<()> {
        self.header.write_u8(HOP_LIMIT, hop_limit)
    }

    pub fn pseudo_header(&self) -> IpPseudoHeader {
        IpPseudoHeader::V6 {
            src: self.src_addr(),
            dst: self.dst_addr(),
            next_header: self.protocol.into(),
        }
    }

    pub fn payload(&self) -> std::cell::Ref<PacketOrPayload> {
        let protocol = self.protocol;
        let pseudo = self.pseudo_header();
        let config = self.config;
        decode_lazily(&self.payload, move |segment| -> Box<dyn Packet> {
            dispatch_ip_payload(protocol, pseudo, segment, config)
        })
    }
}

impl Packet for Ipv6Packet {
    fn header(&self) -> &ByteSegment {
        &self.header
    }

    fn payload_bytes(&self) -> Vec<u8> {
        self.payload.borrow().to_bytes()
    }

    fn format(&self, verbose: bool, color: bool) -> String {
        let line = format!(
            "IPv6 {} -> {} next_header={} hop_limit={}",
            self.src_addr(),
            self.dst_addr(),
            self.protocol(),
            self.hop_limit(),
        );
        format_layer(line, &self.payload.borrow(), verbose, color)
    }
}

impl fmt::Display for Ipv6Packet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.format(false, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_header(next_header: u8, payload_len: u16) -> Vec<u8> {
        let mut bytes = vec![0u8; HEADER_LEN + payload_len as usize];
        bytes[VER_TC_FL] = 0x60;
        bytes[PAYLOAD_LEN..PAYLOAD_LEN + 2].copy_from_slice(&payload_len.to_be_bytes());
        bytes[NEXT_HEADER] = next_header;
        bytes[HOP_LIMIT] = 64;
        bytes[SRC..SRC + 16].copy_from_slice(&Ipv6Addr::LOCALHOST.octets());
        bytes[DST..DST + 16].copy_from_slice(&Ipv6Addr::LOCALHOST.octets());
        bytes
    }

    #[test]
    fn walks_fragment_extension_header_to_tcp() {
        // distilled-spec scenario 5: NextHeader=44 (Fragment) -> TCP.
        let mut bytes = base_header(44, 8 + 20);
        let ext_start = HEADER_LEN;
        bytes[ext_start] = 6; // next header inside fragment ext = TCP
        let tcp_start = ext_start + 8;
        bytes[tcp_start + 12] = 5 << 4; // DataOffset = 5
        let pkt = Ipv6Packet::parse(ByteSegment::new(bytes), ParseConfig::default()).unwrap();
        assert_eq!(pkt.protocol(), IpProtocol::Tcp);
    }

    #[test]
    fn truncated_fixed_header_is_error() {
        assert!(matches!(
            Ipv6Packet::parse(ByteSegment::new(vec![0u8; 10]), ParseConfig::default()),
            Err(Error::Truncated { layer: "ipv6", .. })
        ));
    }
}
