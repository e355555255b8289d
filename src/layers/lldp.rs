//! LLDP (IEEE 802.1AB): a chain of TLVs, each a 2-byte header packing a
//! 7-bit `type` and a 9-bit `length` ahead of `length` value bytes.
//! Terminates at type 0 (EndOfLldpdu). Grounded in the teacher's
//! `resize_with_shift`-based option mutation style from the TCP options
//! parser, generalized to a TLV chain with no fixed frame length.

use core::fmt;

use crate::error::{Error, Result};
use crate::packet::Packet;
use crate::segment::ByteSegment;

const TLV_HEADER_LEN: usize = 2;

const TYPE_END_OF_LLDPDU: u8 = 0;
const TYPE_CHASSIS_ID: u8 = 1;
const TYPE_PORT_ID: u8 = 2;
const TYPE_TTL: u8 = 3;
const TYPE_SYSTEM_NAME: u8 = 5;
const TYPE_SYSTEM_DESCRIPTION: u8 = 6;
const TYPE_CAPABILITIES: u8 = 7;
const TYPE_MANAGEMENT_ADDRESS: u8 = 8;
const TYPE_ORGANIZATION_SPECIFIC: u8 = 127;

/// The protocol-defined maximum length of a ManagementAddress TLV's object
/// identifier (§5.5 point 6).
pub const MAX_MANAGEMENT_ADDRESS_OID_LEN: usize = 128;

/// A decoded LLDP TLV value. `Unknown` carries any type this crate does not
/// interpret further, including vendor-private ranges other than 127.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LldpTlv {
    EndOfLldpdu,
    ChassisId(Vec<u8>),
    PortId(Vec<u8>),
    Ttl(u16),
    SystemName(Vec<u8>),
    SystemDescription(Vec<u8>),
    Capabilities { available: u16, enabled: u16 },
    /// `{address_subtype, address, interface_subtype, interface_number,
    /// obj_id_length, obj_id}` per RFC-ish practice; `obj_id` is the field
    /// whose length the resize scenario grows.
    ManagementAddress {
        address_subtype: u8,
        address: Vec<u8>,
        interface_subtype: u8,
        interface_number: u32,
        obj_id: Vec<u8>,
    },
    OrganizationSpecific { oui: [u8; 3], subtype: u8, bytes: Vec<u8> },
    Unknown { tlv_type: u8, bytes: Vec<u8> },
}

impl LldpTlv {
    pub fn tlv_type(&self) -> u8 {
        match self {
            LldpTlv::EndOfLldpdu => TYPE_END_OF_LLDPDU,
            LldpTlv::ChassisId(_) => TYPE_CHASSIS_ID,
            LldpTlv::PortId(_) => TYPE_PORT_ID,
            LldpTlv::Ttl(_) => TYPE_TTL,
            LldpTlv::SystemName(_) => TYPE_SYSTEM_NAME,
            LldpTlv::SystemDescription(_) => TYPE_SYSTEM_DESCRIPTION,
            LldpTlv::Capabilities { .. } => TYPE_CAPABILITIES,
            LldpTlv::ManagementAddress { .. } => TYPE_MANAGEMENT_ADDRESS,
            LldpTlv::OrganizationSpecific { .. } => TYPE_ORGANIZATION_SPECIFIC,
            LldpTlv::Unknown { tlv_type, .. } => *tlv_type,
        }
    }

    fn value_bytes(&self) -> Vec<u8> {
        use byteorder::{ByteOrder, NetworkEndian};
        match self {
            LldpTlv::EndOfLldpdu => Vec::new(),
            LldpTlv::ChassisId(bytes)
            | LldpTlv::PortId(bytes)
            | LldpTlv::SystemName(bytes)
            | LldpTlv::SystemDescription(bytes) => bytes.clone(),
            LldpTlv::Ttl(seconds) => seconds.to_be_bytes().to_vec(),
            LldpTlv::Capabilities { available, enabled } => {
                let mut out = vec![0u8; 4];
                NetworkEndian::write_u16(&mut out[0..2], *available);
                NetworkEndian::write_u16(&mut out[2..4], *enabled);
                out
            }
            LldpTlv::ManagementAddress {
                address_subtype,
                address,
                interface_subtype,
                interface_number,
                obj_id,
            } => {
                let mut out = Vec::new();
                out.push((address.len() + 1) as u8);
                out.push(*address_subtype);
                out.extend_from_slice(address);
                out.push(*interface_subtype);
                out.extend_from_slice(&interface_number.to_be_bytes());
                out.push(obj_id.len() as u8);
                out.extend_from_slice(obj_id);
                out
            }
            LldpTlv::OrganizationSpecific { oui, subtype, bytes } => {
                let mut out = Vec::with_capacity(4 + bytes.len());
                out.extend_from_slice(oui);
                out.push(*subtype);
                out.extend_from_slice(bytes);
                out
            }
            LldpTlv::Unknown { bytes, .. } => bytes.clone(),
        }
    }
}

fn decode_value(tlv_type: u8, value: &[u8]) -> LldpTlv {
    use byteorder::{ByteOrder, NetworkEndian};
    match tlv_type {
        TYPE_END_OF_LLDPDU => LldpTlv::EndOfLldpdu,
        TYPE_CHASSIS_ID => LldpTlv::ChassisId(value.to_vec()),
        TYPE_PORT_ID => LldpTlv::PortId(value.to_vec()),
        TYPE_TTL if value.len() == 2 => LldpTlv::Ttl(NetworkEndian::read_u16(value)),
        TYPE_SYSTEM_NAME => LldpTlv::SystemName(value.to_vec()),
        TYPE_SYSTEM_DESCRIPTION => LldpTlv::SystemDescription(value.to_vec()),
        TYPE_CAPABILITIES if value.len() == 4 => LldpTlv::Capabilities {
            available: NetworkEndian::read_u16(&value[0..2]),
            enabled: NetworkEndian::read_u16(&value[2..4]),
        },
        TYPE_MANAGEMENT_ADDRESS if value.len() >= 2 => {
            let address_len = value[0].saturating_sub(1) as usize;
            if value.len() < 2 + address_len + 1 + 4 + 1 {
                return LldpTlv::Unknown { tlv_type, bytes: value.to_vec() };
            }
            let address_subtype = value[1];
            let address = value[2..2 + address_len].to_vec();
            let mut i = 2 + address_len;
            let interface_subtype = value[i];
            i += 1;
            let interface_number = NetworkEndian::read_u32(&value[i..i + 4]);
            i += 4;
            let obj_id_length = value[i] as usize;
            i += 1;
            if value.len() < i + obj_id_length {
                return LldpTlv::Unknown { tlv_type, bytes: value.to_vec() };
            }
            LldpTlv::ManagementAddress {
                address_subtype,
                address,
                interface_subtype,
                interface_number,
                obj_id: value[i..i + obj_id_length].to_vec(),
            }
        }
        TYPE_ORGANIZATION_SPECIFIC if value.len() >= 4 => LldpTlv::OrganizationSpecific {
            oui: [value[0], value[1], value[2]],
            subtype: value[3],
            bytes: value[4..].to_vec(),
        },
        _ => LldpTlv::Unknown { tlv_type, bytes: value.to_vec() },
    }
}

/// Parse a full LLDP TLV chain out of `bytes`, stopping at (and including)
/// the first EndOfLldpdu TLV, or at the end of `bytes` if none is present.
pub fn parse_tlvs(bytes: &[u8]) -> Result<Vec<LldpTlv>> {
    let mut tlvs = Vec::new();
    let mut i = 0;
    loop {
        if i + TLV_HEADER_LEN > bytes.len() {
            if i == bytes.len() {
                break;
            }
            return Err(Error::Truncated {
                layer: "lldp-tlv",
                need: i + TLV_HEADER_LEN,
                have: bytes.len(),
            });
        }
        let header = u16::from_be_bytes([bytes[i], bytes[i + 1]]);
        let tlv_type = (header >> 9) as u8;
        let length = (header & 0x01ff) as usize;
        let value_start = i + TLV_HEADER_LEN;
        if value_start + length > bytes.len() {
            return Err(Error::Truncated {
                layer: "lldp-tlv",
                need: value_start + length,
                have: bytes.len(),
            });
        }
        let tlv = decode_value(tlv_type, &bytes[value_start..value_start + length]);
        let is_end = matches!(tlv, LldpTlv::EndOfLldpdu);
        tlvs.push(tlv);
        i = value_start + length;
        if is_end {
            break;
        }
    }
    Ok(tlvs)
}

pub fn emit_tlvs(tlvs: &[LldpTlv]) -> Vec<u8> {
    let mut out = Vec::new();
    for tlv in tlvs {
        let value = tlv.value_bytes();
        let header = ((tlv.tlv_type() as u16) << 9) | (value.len() as u16 & 0x01ff);
        out.extend_from_slice(&header.to_be_bytes());
        out.extend_from_slice(&value);
    }
    out
}

/// An LLDP Data Unit. Unlike every other layer, LLDP has no fixed-size
/// header of its own: the "header" segment here spans the whole TLV chain,
/// and individual TLVs are addressed by index rather than by a byte offset
/// a caller would otherwise have to compute.
#[derive(Debug)]
pub struct LldpPacket {
    header: ByteSegment,
}

impl LldpPacket {
    pub fn parse(segment: ByteSegment) -> Result<LldpPacket> {
        let header = segment.slice(0, segment.len())?;
        parse_tlvs(&header.to_vec())?;
        Ok(LldpPacket { header })
    }

    pub fn tlvs(&self) -> Vec<LldpTlv> {
        parse_tlvs(&self.header.to_vec()).expect("validated at parse time")
    }

    /// Byte offset (into this layer's header) of the `index`th TLV's 2-byte
    /// header, or `None` if there is no such TLV.
    fn offset_of(&self, index: usize) -> Option<usize> {
        let bytes = self.header.to_vec();
        let mut i = 0;
        for current in 0..=index {
            if i + TLV_HEADER_LEN > bytes.len() {
                return None;
            }
            if current == index {
                return Some(i);
            }
            let header = u16::from_be_bytes([bytes[i], bytes[i + 1]]);
            let length = (header & 0x01ff) as usize;
            i += TLV_HEADER_LEN + length;
        }
        None
    }

    /// Replace the TLV at `index` with `new_tlv`, following §5.5's
    /// six-step in-place mutation: reject an over-limit value before any
    /// buffer mutation, then shift the trailing bytes into a freshly
    /// allocated buffer and write the new length prefix and value.
    pub fn set_tlv(&mut self, index: usize, new_tlv: LldpTlv) -> Result<()> {
        if let LldpTlv::ManagementAddress { ref obj_id, .. } = new_tlv {
            if obj_id.len() > MAX_MANAGEMENT_ADDRESS_OID_LEN {
                return Err(Error::ValueOutOfRange {
                    field: "lldp.management_address.obj_id",
                    max: MAX_MANAGEMENT_ADDRESS_OID_LEN,
                    got: obj_id.len(),
                });
            }
        }

        let bytes = self.header.to_vec();
        let tlv_start = self.offset_of(index).ok_or(Error::Truncated {
            layer: "lldp-tlv",
            need: index + 1,
            have: self.tlvs().len(),
        })?;
        let old_header = u16::from_be_bytes([bytes[tlv_start], bytes[tlv_start + 1]]);
        let old_length = (old_header & 0x01ff) as usize;
        let old_total = self.header.len();

        let new_value = new_tlv.value_bytes();
        let new_header = ((new_tlv.tlv_type() as u16) << 9) | (new_value.len() as u16 & 0x01ff);

        let field_start = self.header.offset() + tlv_start + TLV_HEADER_LEN;
        self.header.resize_with_shift(field_start, old_length, new_value.len())?;
        self.header.write_u16_be(tlv_start, new_header)?;
        self.header.write_bytes(tlv_start + TLV_HEADER_LEN, &new_value)?;
        debug_assert_eq!(
            self.header.len() as isize,
            old_total as isize + (new_value.len() as isize - old_length as isize)
        );
        Ok(())
    }
}

impl Packet for LldpPacket {
    fn header(&self) -> &ByteSegment {
        &self.header
    }

    fn payload_bytes(&self) -> Vec<u8> {
        Vec::new()
    }

    fn format(&self, verbose: bool, _color: bool) -> String {
        if verbose {
            format!("LLDP {:?}", self.tlvs())
        } else {
            format!("LLDP ({} TLVs)", self.tlvs().len())
        }
    }
}

impl fmt::Display for LldpPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.format(false, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chain() -> Vec<u8> {
        let tlvs = vec![
            LldpTlv::ChassisId(vec![0x04, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]),
            LldpTlv::Ttl(120),
            LldpTlv::ManagementAddress {
                address_subtype: 1,
                address: vec![192, 168, 1, 1],
                interface_subtype: 2,
                interface_number: 1,
                obj_id: Vec::new(),
            },
            LldpTlv::EndOfLldpdu,
        ];
        emit_tlvs(&tlvs)
    }

    #[test]
    fn parses_chain_up_to_end_of_lldpdu() {
        let lldp = LldpPacket::parse(ByteSegment::new(sample_chain())).unwrap();
        let tlvs = lldp.tlvs();
        assert_eq!(tlvs.len(), 4);
        assert_eq!(tlvs[1], LldpTlv::Ttl(120));
        assert_eq!(tlvs[3], LldpTlv::EndOfLldpdu);
    }

    /// The worked resize example: a ManagementAddress TLV's object
    /// identifier grows from empty to 11 bytes ("1.3.6.1.4.1"); the TLV
    /// length grows by 11 and surrounding TLVs are untouched.
    #[test]
    fn management_address_obj_id_resize_grows_in_place() {
        let mut lldp = LldpPacket::parse(ByteSegment::new(sample_chain())).unwrap();
        let before = lldp.tlvs();
        let new_obj_id = b"1.3.6.1.4.1".to_vec();

        lldp.set_tlv(
            2,
            LldpTlv::ManagementAddress {
                address_subtype: 1,
                address: vec![192, 168, 1, 1],
                interface_subtype: 2,
                interface_number: 1,
                obj_id: new_obj_id.clone(),
            },
        )
        .unwrap();

        let after = lldp.tlvs();
        assert_eq!(after.len(), 4);
        assert_eq!(after[0], before[0]);
        assert_eq!(after[1], before[1]);
        assert_eq!(after[3], LldpTlv::EndOfLldpdu);
        match &after[2] {
            LldpTlv::ManagementAddress { obj_id, .. } => {
                assert_eq!(obj_id.len(), 11);
                assert_eq!(obj_id, &new_obj_id);
            }
            other => panic!("expected ManagementAddress, got {other:?}"),
        }
    }

    #[test]
    fn oversized_obj_id_is_rejected_before_mutation() {
        let mut lldp = LldpPacket::parse(ByteSegment::new(sample_chain())).unwrap();
        let huge = vec![0u8; MAX_MANAGEMENT_ADDRESS_OID_LEN + 1];
        let before = lldp.header().to_vec();

        let err = lldp
            .set_tlv(
                2,
                LldpTlv::ManagementAddress {
                    address_subtype: 1,
                    address: vec![192, 168, 1, 1],
                    interface_subtype: 2,
                    interface_number: 1,
                    obj_id: huge,
                },
            )
            .unwrap_err();

        assert!(matches!(err, Error::ValueOutOfRange { .. }));
        assert_eq!(lldp.header().to_vec(), before);
    }
}
