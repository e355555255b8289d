//! IPv4 (RFC 791). Field layout grounded in the teacher's `types/ipv4.rs`
//! `Ipv4Header` struct; checksum validation mirrors its `verify_checksum`.

use core::fmt;
use std::cell::RefCell;
use std::net::Ipv4Addr;

use crate::checksum;
use crate::config::ParseConfig;
use crate::error::{Error, Result};
use crate::layers::icmpv4::Icmpv4Packet;
use crate::layers::igmpv2::Igmpv2Packet;
use crate::layers::ip::IpProtocol;
use crate::layers::ipv6::Ipv6Packet;
use crate::layers::tcp::TcpPacket;
use crate::layers::udp::UdpPacket;
use crate::packet::{decode_lazily, format_layer, IpPseudoHeader, Packet, PacketOrPayload};
use crate::segment::ByteSegment;

const VER_IHL: usize = 0;
const TOS: usize = 1;
const TOTAL_LEN: usize = 2;
const IDENT: usize = 4;
const FLAGS_FRAG: usize = 6;
const TTL: usize = 8;
const PROTOCOL: usize = 9;
const CHECKSUM: usize = 10;
const SRC: usize = 12;
const DST: usize = 16;
pub const MIN_HEADER_LEN: usize = 20;

/// An IPv4 datagram. `header.length` is clipped to `IHL * 4` once the IHL
/// nibble is read; `TotalLength` additionally bounds the payload so a
/// declared-short datagram never exposes trailing garbage from a larger
/// capture buffer.
#[derive(Debug)]
pub struct Ipv4Packet {
    header: ByteSegment,
    protocol: IpProtocol,
    total_len: u16,
    config: ParseConfig,
    payload: RefCell<PacketOrPayload>,
}

impl Ipv4Packet {
    pub fn parse(segment: ByteSegment, config: ParseConfig) -> Result<Ipv4Packet> {
        if segment.len() < MIN_HEADER_LEN {
            return Err(Error::Truncated {
                layer: "ipv4",
                need: MIN_HEADER_LEN,
                have: segment.len(),
            });
        }
        let ver_ihl = segment.read_u8(VER_IHL)?;
        let ihl = (ver_ihl & 0x0f) as usize;
        if ihl < 5 {
            return Err(Error::Malformed {
                layer: "ipv4",
                detail: "IHL < 5",
            });
        }
        let header_len = ihl * 4;
        if segment.len() < header_len {
            return Err(Error::Truncated {
                layer: "ipv4",
                need: header_len,
                have: segment.len(),
            });
        }
        let header = segment.slice(0, header_len)?;
        let total_len = header.read_u16_be(TOTAL_LEN)?;
        if (total_len as usize) < header_len {
            return Err(Error::Malformed {
                layer: "ipv4",
                detail: "TotalLength < header length",
            });
        }
        let bound = header.offset() + total_len as usize;
        let buffer_len = header.buffer_len();
        if bound > buffer_len {
            return Err(Error::Truncated {
                layer: "ipv4",
                need: total_len as usize,
                have: buffer_len - header.offset(),
            });
        }
        let protocol = IpProtocol::from(header.read_u8(PROTOCOL)?);
        log::trace!("ipv4: ihl={header_len} total_len={total_len} protocol={protocol}");
        let payload = header.encapsulated(bound)?;
        Ok(Ipv4Packet {
            header,
            protocol,
            total_len,
            config,
            payload: RefCell::new(PacketOrPayload::Raw(payload)),
        })
    }

    pub fn version(&self) -> u8 {
        self.header.read_u8(VER_IHL).expect("clipped header") >> 4
    }

    pub fn ihl(&self) -> u8 {
        self.header.read_u8(VER_IHL).expect("clipped header") & 0x0f
    }

    pub fn tos(&self) -> u8 {
        self.header.read_u8(TOS).expect("clipped header")
    }

    pub fn total_len(&self) -> u16 {
        self.total_len
    }

    pub fn identification(&self) -> u16 {
        self.header.read_u16_be(IDENT).expect("clipped header")
    }

    pub fn flags_and_fragment_offset(&self) -> u16 {
        self.header.read_u16_be(FLAGS_FRAG).expect("clipped header")
    }

    pub fn dont_fragment(&self) -> bool {
        self.flags_and_fragment_offset() & 0x4000 != 0
    }

    pub fn more_fragments(&self) -> bool {
        self.flags_and_fragment_offset() & 0x2000 != 0
    }

    pub fn fragment_offset(&self) -> u16 {
        self.flags_and_fragment_offset() & 0x1fff
    }

    pub fn ttl(&self) -> u8 {
        self.header.read_u8(TTL).expect("clipped header")
    }

    pub fn protocol(&self) -> IpProtocol {
        self.protocol
    }

    pub fn checksum(&self) -> u16 {
        self.header.read_u16_be(CHECKSUM).expect("clipped header")
    }

    pub fn src_addr(&self) -> Ipv4Addr {
        self.header.read_ipv4(SRC).expect("clipped header")
    }

    pub fn dst_addr(&self) -> Ipv4Addr {
        self.header.read_ipv4(DST).expect("clipped header")
    }

    /// The option bytes, `[20, IHL*4)`, exposed opaquely (§5.4 IPv4 specifics
    /// — this crate does not decode individual IPv4 option kinds).
    pub fn options(&self) -> Vec<u8> {
        let header_len = self.header.len();
        if header_len <= MIN_HEADER_LEN {
            Vec::new()
        } else {
            self.header
                .read_bytes(MIN_HEADER_LEN, header_len - MIN_HEADER_LEN)
                .expect("clipped header")
        }
    }

    pub fn set_ttl(&mut self, ttl: u8) -> Result<()> {
        self.header.write_u8(TTL, ttl)
    }

    pub fn set_src_addr(&mut self, addr: Ipv4Addr) -> Result<()> {
        self.header.write_ipv4(SRC, addr)
    }

    pub fn set_dst_addr(&mut self, addr: Ipv4Addr) -> Result<()> {
        self.header.write_ipv4(DST, addr)
    }

    pub fn set_protocol(&mut self, protocol: IpProtocol) -> Result<()> {
        self.header.write_u8(PROTOCOL, protocol.into())?;
        self.protocol = protocol;
        Ok(())
    }

    /// The pseudo-header this layer contributes to a TCP/UDP/ICMPv4 child's
    /// checksum (§5.2, §5.3 "explicit-parameter form").
    pub fn pseudo_header(&self) -> IpPseudoHeader {
        IpPseudoHeader::V4 {
            src: self.src_addr(),
            dst: self.dst_addr(),
            protocol: self.protocol.into(),
        }
    }

    /// Recompute and write the IPv4 header checksum. Covers only the IP
    /// header (IHL*4 bytes); excludes any pseudo-header (§5.1). A no-op
    /// under a `ParseConfig::ipv4` policy that excludes `Tx`.
    pub fn recompute_checksum(&mut self) -> Result<()> {
        if !self.config.ipv4.compute_on_emit() {
            return Ok(());
        }
        self.header.write_u16_be(CHECKSUM, 0)?;
        let bytes = self.header.to_vec();
        let sum = checksum::finalize(checksum::data(&bytes), false);
        self.header.write_u16_be(CHECKSUM, sum)
    }

    /// Validate the header checksum without zeroing the on-wire field
    /// first (§5.2 point 4): the sum including the original checksum must
    /// fold to `0xFFFF`. Trivially `true` under a `ParseConfig::ipv4`
    /// policy that excludes `Rx` (the policy says not to look).
    pub fn valid_checksum(&self) -> bool {
        if !self.config.ipv4.verify_on_parse() {
            return true;
        }
        checksum::data(&self.header.to_vec()) == 0xffff
    }

    /// The decoded next layer, dispatched by [`IpProtocol`].
    pub fn payload(&self) -> std::cell::Ref<PacketOrPayload> {
        let protocol = self.protocol;
        let pseudo = self.pseudo_header();
        let config = self.config;
        decode_lazily(&self.payload, move |segment| -> Box<dyn Packet> {
            dispatch_ip_payload(protocol, pseudo, segment, config)
        })
    }
}

/// Shared by IPv4 and IPv6: construct the decoded child for an upper-layer
/// protocol number, given the parent's pseudo-header and checksum policy.
pub(crate) fn dispatch_ip_payload(
    protocol: IpProtocol,
    pseudo: IpPseudoHeader,
    segment: &ByteSegment,
    config: ParseConfig,
) -> Box<dyn Packet> {
    let raw = || -> Box<dyn Packet> {
        Box::new(crate::layers::raw::RawLayer::parse(segment.clone()).expect("zero-len header"))
    };
    match protocol {
        IpProtocol::Tcp => TcpPacket::parse(segment.clone(), pseudo, config)
            .map(|p| Box::new(p) as Box<dyn Packet>)
            .unwrap_or_else(|_| raw()),
        IpProtocol::Udp => UdpPacket::parse(segment.clone(), pseudo, config)
            .map(|p| Box::new(p) as Box<dyn Packet>)
            .unwrap_or_else(|_| raw()),
        IpProtocol::Icmp => Icmpv4Packet::parse(segment.clone(), config)
            .map(|p| Box::new(p) as Box<dyn Packet>)
            .unwrap_or_else(|_| raw()),
        IpProtocol::Icmpv6 => crate::layers::icmpv6::Icmpv6Packet::parse(segment.clone(), pseudo, config)
            .map(|p| Box::new(p) as Box<dyn Packet>)
            .unwrap_or_else(|_| raw()),
        IpProtocol::Igmp => Igmpv2Packet::parse(segment.clone(), config)
            .map(|p| Box::new(p) as Box<dyn Packet>)
            .unwrap_or_else(|_| raw()),
        IpProtocol::Ipv6 => Ipv6Packet::parse(segment.clone(), config)
            .map(|p| Box::new(p) as Box<dyn Packet>)
            .unwrap_or_else(|_| raw()),
        _ => {
            log::debug!("ip: unknown upper-layer protocol {protocol}");
            raw()
        }
    }
}

impl Packet for Ipv4Packet {
    fn header(&self) -> &ByteSegment {
        &self.header
    }

    fn payload_bytes(&self) -> Vec<u8> {
        self.payload.borrow().to_bytes()
    }

    fn format(&self, verbose: bool, color: bool) -> String {
        let line = format!(
            "IPv4 {} -> {} proto={} ttl={} len={} checksum_valid={}",
            self.src_addr(),
            self.dst_addr(),
            self.protocol(),
            self.ttl(),
            self.total_len(),
            self.valid_checksum(),
        );
        format_layer(line, &self.payload.borrow(), verbose, color)
    }
}

impl fmt::Display for Ipv4Packet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.format(false, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header(total_len: u16, protocol: u8) -> Vec<u8> {
        let mut bytes = vec![0u8; total_len as usize];
        bytes[VER_IHL] = 0x45;
        bytes[TOTAL_LEN..TOTAL_LEN + 2].copy_from_slice(&total_len.to_be_bytes());
        bytes[TTL] = 64;
        bytes[PROTOCOL] = protocol;
        bytes[SRC..SRC + 4].copy_from_slice(&Ipv4Addr::new(10, 0, 0, 1).octets());
        bytes[DST..DST + 4].copy_from_slice(&Ipv4Addr::new(10, 0, 0, 2).octets());
        bytes
    }

    #[test]
    fn ihl_below_5_is_malformed() {
        let mut bytes = sample_header(20, 6);
        bytes[VER_IHL] = 0x44;
        assert!(matches!(
            Ipv4Packet::parse(ByteSegment::new(bytes), ParseConfig::default()),
            Err(Error::Malformed { layer: "ipv4", .. })
        ));
    }

    #[test]
    fn truncation_rejected_when_total_len_exceeds_buffer() {
        // distilled-spec scenario 6: TotalLength=100 claimed in a 40-byte buffer.
        let mut bytes = sample_header(40, 6);
        bytes[TOTAL_LEN..TOTAL_LEN + 2].copy_from_slice(&100u16.to_be_bytes());
        assert!(matches!(
            Ipv4Packet::parse(ByteSegment::new(bytes), ParseConfig::default()),
            Err(Error::Truncated {
                layer: "ipv4",
                need: 100,
                have: 40,
            })
        ));
    }

    #[test]
    fn checksum_roundtrips() {
        let bytes = sample_header(20, 6);
        let mut pkt = Ipv4Packet::parse(ByteSegment::new(bytes), ParseConfig::default()).unwrap();
        pkt.recompute_checksum().unwrap();
        assert!(pkt.valid_checksum());
        let again = pkt.checksum();
        pkt.recompute_checksum().unwrap();
        assert_eq!(pkt.checksum(), again);
    }
}
