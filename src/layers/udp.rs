//! UDP (RFC 768): fixed 8-byte header, `length` includes the header itself.

use core::fmt;
use std::cell::RefCell;

use crate::checksum;
use crate::config::ParseConfig;
use crate::error::{Error, Result};
use crate::layers::{ApplicationLayerHint, NoDispatch, UdpDispatch};
use crate::packet::{format_layer, IpPseudoHeader, Packet, PacketOrPayload};
use crate::segment::ByteSegment;

const SRC_PORT: usize = 0;
const DST_PORT: usize = 2;
const LENGTH: usize = 4;
const CHECKSUM: usize = 6;
pub const HEADER_LEN: usize = 8;

#[derive(Debug)]
pub struct UdpPacket {
    header: ByteSegment,
    pseudo: IpPseudoHeader,
    config: ParseConfig,
    payload: RefCell<PacketOrPayload>,
}

impl UdpPacket {
    pub fn parse(segment: ByteSegment, pseudo: IpPseudoHeader, config: ParseConfig) -> Result<UdpPacket> {
        if segment.len() < HEADER_LEN {
            return Err(Error::Truncated {
                layer: "udp",
                need: HEADER_LEN,
                have: segment.len(),
            });
        }
        let header = segment.slice(0, HEADER_LEN)?;
        let length = header.read_u16_be(LENGTH)? as usize;
        if length < HEADER_LEN {
            return Err(Error::Malformed {
                layer: "udp",
                detail: "length < header length",
            });
        }
        let bound = header.offset() + length;
        let buffer_len = header.buffer_len();
        if bound > buffer_len {
            return Err(Error::Truncated {
                layer: "udp",
                need: length,
                have: buffer_len - header.offset(),
            });
        }
        let payload = header.encapsulated(bound)?;
        Ok(UdpPacket {
            header,
            pseudo,
            config,
            payload: RefCell::new(PacketOrPayload::Raw(payload)),
        })
    }

    pub fn src_port(&self) -> u16 {
        self.header.read_u16_be(SRC_PORT).expect("clipped header")
    }

    pub fn dst_port(&self) -> u16 {
        self.header.read_u16_be(DST_PORT).expect("clipped header")
    }

    pub fn length(&self) -> u16 {
        self.header.read_u16_be(LENGTH).expect("clipped header")
    }

    pub fn checksum(&self) -> u16 {
        self.header.read_u16_be(CHECKSUM).expect("clipped header")
    }

    pub fn set_src_port(&mut self, port: u16) -> Result<()> {
        self.header.write_u16_be(SRC_PORT, port)
    }

    pub fn set_dst_port(&mut self, port: u16) -> Result<()> {
        self.header.write_u16_be(DST_PORT, port)
    }

    /// Recompute and write the UDP checksum. RFC 768: an all-zero result
    /// folds to `0xFFFF` on the wire, never a literal zero (that means "no
    /// checksum"). A no-op under a `ParseConfig::udp` policy that excludes
    /// `Tx`.
    pub fn recompute_checksum(&mut self) -> Result<()> {
        if !self.config.udp.compute_on_emit() {
            return Ok(());
        }
        self.header.write_u16_be(CHECKSUM, 0)?;
        let sum = self.checksum_over_current_bytes(true);
        self.header.write_u16_be(CHECKSUM, sum)
    }

    /// A zero checksum on the wire means "no checksum sent" for UDP over
    /// IPv4 and validation short-circuits to `true` (teacher:
    /// `Packet::verify_checksum` in `wire/udp.rs`). Trivially `true` under
    /// a `ParseConfig::udp` policy that excludes `Rx`.
    pub fn valid_checksum(&self) -> bool {
        if !self.config.udp.verify_on_parse() {
            return true;
        }
        if self.checksum() == 0 && matches!(self.pseudo, IpPseudoHeader::V4 { .. }) {
            return true;
        }
        self.checksum_over_current_bytes_raw() == 0xffff
    }

    fn pseudo_sum(&self, length: u32) -> u16 {
        match self.pseudo {
            IpPseudoHeader::V4 { src, dst, protocol } => checksum::pseudo_header_v4(src, dst, protocol, length),
            IpPseudoHeader::V6 { src, dst, next_header } => {
                checksum::pseudo_header_v6(src, dst, next_header, length)
            }
        }
    }

    fn checksum_over_current_bytes(&self, zero_means_all_ones: bool) -> u16 {
        let header_bytes = self.header.to_vec();
        let payload_bytes = self.payload.borrow().to_bytes();
        let length = (header_bytes.len() + payload_bytes.len()) as u32;
        let pseudo = self.pseudo_sum(length);
        let body = checksum::combine(&[checksum::data(&header_bytes), checksum::data(&payload_bytes)]);
        checksum::finalize(checksum::combine(&[pseudo, body]), zero_means_all_ones)
    }

    /// Sum over the pseudo-header, header, and payload *as they currently
    /// stand* (checksum field included, not zeroed). A correctly-set
    /// checksum makes this fold to `0xFFFF`, never zero.
    fn checksum_over_current_bytes_raw(&self) -> u16 {
        let header_bytes = self.header.to_vec();
        let payload_bytes = self.payload.borrow().to_bytes();
        let length = (header_bytes.len() + payload_bytes.len()) as u32;
        let pseudo = self.pseudo_sum(length);
        let body = checksum::combine(&[checksum::data(&header_bytes), checksum::data(&payload_bytes)]);
        checksum::combine(&[pseudo, body])
    }

    /// Ask an optional [`UdpDispatch`] hook what it believes the payload to
    /// be. The crate itself never decodes the result; this is an opaque
    /// pluggable hook only (§5.6).
    pub fn dispatch_hint(&self, dispatch: &dyn UdpDispatch) -> Option<ApplicationLayerHint> {
        dispatch.dispatch(self.src_port(), self.dst_port())
    }
}

impl Packet for UdpPacket {
    fn header(&self) -> &ByteSegment {
        &self.header
    }

    fn payload_bytes(&self) -> Vec<u8> {
        self.payload.borrow().to_bytes()
    }

    fn format(&self, verbose: bool, color: bool) -> String {
        let hint = self.dispatch_hint(&NoDispatch);
        let line = format!(
            "UDP {} -> {} len={} hint={hint:?}",
            self.src_port(),
            self.dst_port(),
            self.length(),
        );
        format_layer(line, &self.payload.borrow(), verbose, color)
    }
}

impl fmt::Display for UdpPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.format(false, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn sample(length: u16) -> Vec<u8> {
        let mut bytes = vec![0u8; length as usize];
        bytes[SRC_PORT..SRC_PORT + 2].copy_from_slice(&53u16.to_be_bytes());
        bytes[DST_PORT..DST_PORT + 2].copy_from_slice(&5353u16.to_be_bytes());
        bytes[LENGTH..LENGTH + 2].copy_from_slice(&length.to_be_bytes());
        bytes
    }

    #[test]
    fn zero_checksum_over_ipv4_is_valid() {
        let pseudo = IpPseudoHeader::V4 {
            src: Ipv4Addr::new(10, 0, 0, 1),
            dst: Ipv4Addr::new(10, 0, 0, 2),
            protocol: 17,
        };
        let udp = UdpPacket::parse(ByteSegment::new(sample(8)), pseudo, ParseConfig::default()).unwrap();
        assert_eq!(udp.checksum(), 0);
        assert!(udp.valid_checksum());
    }

    #[test]
    fn recompute_is_idempotent() {
        let pseudo = IpPseudoHeader::V4 {
            src: Ipv4Addr::new(10, 0, 0, 1),
            dst: Ipv4Addr::new(10, 0, 0, 2),
            protocol: 17,
        };
        let mut udp = UdpPacket::parse(ByteSegment::new(sample(12)), pseudo, ParseConfig::default()).unwrap();
        udp.recompute_checksum().unwrap();
        let first = udp.checksum();
        udp.recompute_checksum().unwrap();
        assert_eq!(udp.checksum(), first);
    }
}
