//! PPPoE (RFC 2516): a 6-byte header over either a Discovery TLV chain or an
//! opaque PPP Session payload. Grounded in the teacher's ethernet dispatch
//! style (`wire::ethernet::EtherType`), generalized to a new frame kind the
//! teacher never implements.

use core::fmt;
use std::cell::RefCell;

use crate::error::{Error, Result};
use crate::packet::{format_layer, Packet, PacketOrPayload};
use crate::segment::ByteSegment;

const VERSION_TYPE: usize = 0;
const CODE: usize = 1;
const SESSION_ID: usize = 2;
const LENGTH: usize = 4;
pub const HEADER_LEN: usize = 6;

const TAG_TYPE: usize = 0;
const TAG_LENGTH: usize = 2;
const TAG_HEADER_LEN: usize = 4;

enum_with_unknown! {
    pub enum Code(u8) {
        PadiActiveDiscoveryInitiation = 0x09,
        PadoActiveDiscoveryOffer = 0x07,
        PadrActiveDiscoveryRequest = 0x19,
        PadsActiveDiscoverySessionConfirmation = 0x65,
        Padt = 0xa7,
        Session = 0x00,
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Code::PadiActiveDiscoveryInitiation => write!(f, "PADI"),
            Code::PadoActiveDiscoveryOffer => write!(f, "PADO"),
            Code::PadrActiveDiscoveryRequest => write!(f, "PADR"),
            Code::PadsActiveDiscoverySessionConfirmation => write!(f, "PADS"),
            Code::Padt => write!(f, "PADT"),
            Code::Session => write!(f, "Session"),
            Code::Unknown(c) => write!(f, "0x{c:02x}"),
        }
    }
}

/// A single Discovery-stage tag: `{tag_type: u16, tag_value: [u8]}`. Read
/// only — tags are never resized in place (§5.6 Non-goals: no TLV mutation
/// outside LLDP).
#[derive(Debug, Clone)]
pub struct Tag {
    pub tag_type: u16,
    pub value: Vec<u8>,
}

/// Parse the flat TLV chain carried by a PPPoE Discovery payload.
pub fn parse_tags(bytes: &[u8]) -> Result<Vec<Tag>> {
    let mut tags = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if i + TAG_HEADER_LEN > bytes.len() {
            return Err(Error::Truncated {
                layer: "pppoe-tag",
                need: i + TAG_HEADER_LEN,
                have: bytes.len(),
            });
        }
        let tag_type = u16::from_be_bytes([bytes[i + TAG_TYPE], bytes[i + TAG_TYPE + 1]]);
        let tag_len = u16::from_be_bytes([bytes[i + TAG_LENGTH], bytes[i + TAG_LENGTH + 1]]) as usize;
        let value_start = i + TAG_HEADER_LEN;
        if value_start + tag_len > bytes.len() {
            return Err(Error::Truncated {
                layer: "pppoe-tag",
                need: value_start + tag_len,
                have: bytes.len(),
            });
        }
        tags.push(Tag {
            tag_type,
            value: bytes[value_start..value_start + tag_len].to_vec(),
        });
        i = value_start + tag_len;
    }
    Ok(tags)
}

/// Which of the two PPPoE payload shapes a frame carries, decided by the
/// caller from the carrying EtherType (0x8863 Discovery vs 0x8864 Session)
/// since PPPoE's own header doesn't distinguish them on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Discovery,
    Session,
}

#[derive(Debug)]
pub struct PppoePacket {
    header: ByteSegment,
    kind: Kind,
    payload: RefCell<PacketOrPayload>,
}

impl PppoePacket {
    pub fn parse(segment: ByteSegment, kind: Kind) -> Result<PppoePacket> {
        if segment.len() < HEADER_LEN {
            return Err(Error::Truncated {
                layer: "pppoe",
                need: HEADER_LEN,
                have: segment.len(),
            });
        }
        let header = segment.slice(0, HEADER_LEN)?;
        let length = header.read_u16_be(LENGTH)? as usize;
        let bound = header.offset() + length;
        let buffer_len = header.buffer_len();
        if bound > buffer_len {
            return Err(Error::Truncated {
                layer: "pppoe",
                need: length,
                have: buffer_len - header.offset(),
            });
        }
        let payload = header.encapsulated(bound)?;
        Ok(PppoePacket {
            header,
            kind,
            payload: RefCell::new(PacketOrPayload::Raw(payload)),
        })
    }

    pub fn version(&self) -> u8 {
        self.header.read_u8(VERSION_TYPE).expect("clipped header") >> 4
    }

    pub fn type_field(&self) -> u8 {
        self.header.read_u8(VERSION_TYPE).expect("clipped header") & 0x0f
    }

    pub fn code(&self) -> Code {
        Code::from(self.header.read_u8(CODE).expect("clipped header"))
    }

    pub fn session_id(&self) -> u16 {
        self.header.read_u16_be(SESSION_ID).expect("clipped header")
    }

    pub fn length(&self) -> u16 {
        self.header.read_u16_be(LENGTH).expect("clipped header")
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Discovery-stage tags, or an empty vec for a Session frame (its
    /// payload is opaque PPP, exposed via [`Packet::payload_bytes`] instead).
    pub fn tags(&self) -> Result<Vec<Tag>> {
        match self.kind {
            Kind::Discovery => parse_tags(&self.payload.borrow().to_bytes()),
            Kind::Session => Ok(Vec::new()),
        }
    }
}

impl Packet for PppoePacket {
    fn header(&self) -> &ByteSegment {
        &self.header
    }

    fn payload_bytes(&self) -> Vec<u8> {
        self.payload.borrow().to_bytes()
    }

    fn format(&self, verbose: bool, color: bool) -> String {
        let line = format!(
            "PPPoE {:?} {} session={} len={}",
            self.kind(),
            self.code(),
            self.session_id(),
            self.length(),
        );
        format_layer(line, &self.payload.borrow(), verbose, color)
    }
}

impl fmt::Display for PppoePacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.format(false, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discovery_sample() -> Vec<u8> {
        let mut tag = vec![0x01, 0x01, 0x00, 0x03, b'i', b's', b'p'];
        let length = tag.len() as u16;
        let mut bytes = vec![0u8; HEADER_LEN];
        bytes[VERSION_TYPE] = 0x11;
        bytes[CODE] = 0x09;
        bytes[LENGTH..LENGTH + 2].copy_from_slice(&length.to_be_bytes());
        bytes.append(&mut tag);
        bytes
    }

    #[test]
    fn discovery_tags_parse() {
        let pppoe = PppoePacket::parse(ByteSegment::new(discovery_sample()), Kind::Discovery).unwrap();
        assert_eq!(pppoe.code(), Code::PadiActiveDiscoveryInitiation);
        let tags = pppoe.tags().unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].tag_type, 0x0101);
        assert_eq!(tags[0].value, b"isp");
    }

    #[test]
    fn session_payload_is_opaque() {
        let mut bytes = vec![0u8; HEADER_LEN + 4];
        bytes[VERSION_TYPE] = 0x11;
        bytes[LENGTH..LENGTH + 2].copy_from_slice(&4u16.to_be_bytes());
        bytes[HEADER_LEN..].copy_from_slice(&[0xc0, 0x21, 0x01, 0x02]);
        let pppoe = PppoePacket::parse(ByteSegment::new(bytes), Kind::Session).unwrap();
        assert!(pppoe.tags().unwrap().is_empty());
        assert_eq!(pppoe.payload_bytes(), vec![0xc0, 0x21, 0x01, 0x02]);
    }
}
