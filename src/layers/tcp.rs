//! TCP (RFC 793): fixed 20-byte prefix, variable-length options region, and
//! checksum over the IP pseudo-header + segment.

use core::fmt;
use std::cell::RefCell;

use bitflags::bitflags;

use crate::checksum;
use crate::config::ParseConfig;
use crate::error::{Error, Result};
use crate::packet::{format_layer, IpPseudoHeader, Packet, PacketOrPayload};
use crate::segment::ByteSegment;

const SRC_PORT: usize = 0;
const DST_PORT: usize = 2;
const SEQ_NUM: usize = 4;
const ACK_NUM: usize = 8;
const DATA_OFF_FLAGS: usize = 12;
const WINDOW: usize = 14;
const CHECKSUM: usize = 16;
const URGENT_PTR: usize = 18;
pub const MIN_HEADER_LEN: usize = 20;
/// Minimum length of a DDM (Distributed Data Management) header, the
/// magic-byte check DRDA recognition is gated on (§5.4).
pub const DDM_HEADER_LEN: usize = 6;

bitflags! {
    /// The nine control-bit flags occupying the low 9 bits of the
    /// DataOffset+Flags word, high to low: NS CWR ECE URG ACK PSH RST SYN FIN.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TcpFlags: u16 {
        const FIN = 0x001;
        const SYN = 0x002;
        const RST = 0x004;
        const PSH = 0x008;
        const ACK = 0x010;
        const URG = 0x020;
        const ECE = 0x040;
        const CWR = 0x080;
        const NS  = 0x100;
    }
}

/// A single TCP option, as scanned per §5.5 of the expanded spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TcpOption {
    EndOfList,
    NoOp,
    Mss(u16),
    WindowScale(u8),
    SackPermitted,
    Sack(Vec<(u32, u32)>),
    Timestamp { value: u32, echo_reply: u32 },
    Md5Signature(Vec<u8>),
    UserTimeout(u16),
    /// Accepted as opaque under the default (non-strict) policy; see
    /// `ParseConfig::strict_options`.
    Experimental { kind: u8, bytes: Vec<u8> },
    Unknown { kind: u8, bytes: Vec<u8> },
}

const KIND_END: u8 = 0;
const KIND_NOP: u8 = 1;
const KIND_MSS: u8 = 2;
const KIND_WINDOW_SCALE: u8 = 3;
const KIND_SACK_PERMITTED: u8 = 4;
const KIND_SACK: u8 = 5;
const KIND_TIMESTAMP: u8 = 8;
const KIND_MD5: u8 = 19;
const KIND_USER_TIMEOUT: u8 = 28;
const EXPERIMENTAL_KINDS: &[u8] = &[9, 10, 11, 12, 13, 27];

impl TcpOption {
    pub fn kind(&self) -> u8 {
        match self {
            TcpOption::EndOfList => KIND_END,
            TcpOption::NoOp => KIND_NOP,
            TcpOption::Mss(_) => KIND_MSS,
            TcpOption::WindowScale(_) => KIND_WINDOW_SCALE,
            TcpOption::SackPermitted => KIND_SACK_PERMITTED,
            TcpOption::Sack(_) => KIND_SACK,
            TcpOption::Timestamp { .. } => KIND_TIMESTAMP,
            TcpOption::Md5Signature(_) => KIND_MD5,
            TcpOption::UserTimeout(_) => KIND_USER_TIMEOUT,
            TcpOption::Experimental { kind, .. } => *kind,
            TcpOption::Unknown { kind, .. } => *kind,
        }
    }

    /// Wire length of this option, including the `kind`/`length` bytes
    /// where present.
    pub fn wire_len(&self) -> usize {
        match self {
            TcpOption::EndOfList | TcpOption::NoOp => 1,
            TcpOption::Mss(_) => 4,
            TcpOption::WindowScale(_) => 3,
            TcpOption::SackPermitted => 2,
            TcpOption::Sack(blocks) => 2 + blocks.len() * 8,
            TcpOption::Timestamp { .. } => 10,
            TcpOption::Md5Signature(_) => 18,
            TcpOption::UserTimeout(_) => 4,
            TcpOption::Experimental { bytes, .. } | TcpOption::Unknown { bytes, .. } => 2 + bytes.len(),
        }
    }
}

/// Scan the options region `[0, len)` of `bytes` (relative to the options
/// start, i.e. TCP header byte 20) into a list of [`TcpOption`]s.
///
/// Per §5.5: `kind == 0`/`1` have implicit length 1; everything else reads
/// an explicit length byte and spans `[offset, offset+length)`. `strict`
/// controls whether the experimental-range kinds are surfaced as an
/// `Experimental` opaque value (default) or rejected outright.
pub fn parse_options(bytes: &[u8], strict: bool) -> Result<Vec<TcpOption>> {
    let mut options = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let kind = bytes[i];
        if kind == KIND_END {
            options.push(TcpOption::EndOfList);
            i += 1;
            continue;
        }
        if kind == KIND_NOP {
            options.push(TcpOption::NoOp);
            i += 1;
            continue;
        }
        if i + 1 >= bytes.len() {
            return Err(Error::Truncated {
                layer: "tcp-options",
                need: i + 2,
                have: bytes.len(),
            });
        }
        let length = bytes[i + 1] as usize;
        if length < 2 {
            return Err(Error::Malformed {
                layer: "tcp-options",
                detail: "option length < 2",
            });
        }
        if i + length > bytes.len() {
            return Err(Error::Truncated {
                layer: "tcp-options",
                need: i + length,
                have: bytes.len(),
            });
        }
        let value = &bytes[i + 2..i + length];
        if EXPERIMENTAL_KINDS.contains(&kind) {
            if strict {
                return Err(Error::UnsupportedExperimental {
                    feature: "tcp-option",
                });
            }
            log::debug!("tcp: experimental option kind={kind} accepted as opaque");
            options.push(TcpOption::Experimental {
                kind,
                bytes: value.to_vec(),
            });
        } else {
            options.push(decode_known_option(kind, value));
        }
        i += length;
    }
    Ok(options)
}

fn decode_known_option(kind: u8, value: &[u8]) -> TcpOption {
    use byteorder::{ByteOrder, NetworkEndian};
    match kind {
        KIND_MSS if value.len() == 2 => TcpOption::Mss(NetworkEndian::read_u16(value)),
        KIND_WINDOW_SCALE if value.len() == 1 => TcpOption::WindowScale(value[0]),
        KIND_SACK_PERMITTED if value.is_empty() => TcpOption::SackPermitted,
        KIND_SACK if value.len() % 8 == 0 => TcpOption::Sack(
            value
                .chunks_exact(8)
                .map(|c| (NetworkEndian::read_u32(&c[0..4]), NetworkEndian::read_u32(&c[4..8])))
                .collect(),
        ),
        KIND_TIMESTAMP if value.len() == 8 => TcpOption::Timestamp {
            value: NetworkEndian::read_u32(&value[0..4]),
            echo_reply: NetworkEndian::read_u32(&value[4..8]),
        },
        KIND_MD5 if value.len() == 16 => TcpOption::Md5Signature(value.to_vec()),
        KIND_USER_TIMEOUT if value.len() == 2 => TcpOption::UserTimeout(NetworkEndian::read_u16(value)),
        _ => TcpOption::Unknown {
            kind,
            bytes: value.to_vec(),
        },
    }
}

/// Serialize `options` back to wire bytes, padding to a multiple of 4 with
/// `NoOp` (TCP headers are quantized to 32-bit words by `DataOffset`, §5.5
/// point 6a).
pub fn emit_options(options: &[TcpOption]) -> Vec<u8> {
    use byteorder::{ByteOrder, NetworkEndian};
    let mut out = Vec::new();
    for opt in options {
        match opt {
            TcpOption::EndOfList => out.push(KIND_END),
            TcpOption::NoOp => out.push(KIND_NOP),
            TcpOption::Mss(mss) => {
                out.extend_from_slice(&[KIND_MSS, 4]);
                let mut buf = [0u8; 2];
                NetworkEndian::write_u16(&mut buf, *mss);
                out.extend_from_slice(&buf);
            }
            TcpOption::WindowScale(shift) => out.extend_from_slice(&[KIND_WINDOW_SCALE, 3, *shift]),
            TcpOption::SackPermitted => out.extend_from_slice(&[KIND_SACK_PERMITTED, 2]),
            TcpOption::Sack(blocks) => {
                out.push(KIND_SACK);
                out.push((2 + blocks.len() * 8) as u8);
                for (left, right) in blocks {
                    let mut buf = [0u8; 4];
                    NetworkEndian::write_u32(&mut buf, *left);
                    out.extend_from_slice(&buf);
                    NetworkEndian::write_u32(&mut buf, *right);
                    out.extend_from_slice(&buf);
                }
            }
            TcpOption::Timestamp { value, echo_reply } => {
                out.extend_from_slice(&[KIND_TIMESTAMP, 10]);
                let mut buf = [0u8; 4];
                NetworkEndian::write_u32(&mut buf, *value);
                out.extend_from_slice(&buf);
                NetworkEndian::write_u32(&mut buf, *echo_reply);
                out.extend_from_slice(&buf);
            }
            TcpOption::Md5Signature(bytes) => {
                out.extend_from_slice(&[KIND_MD5, 18]);
                out.extend_from_slice(bytes);
            }
            TcpOption::UserTimeout(timeout) => {
                out.extend_from_slice(&[KIND_USER_TIMEOUT, 4]);
                let mut buf = [0u8; 2];
                NetworkEndian::write_u16(&mut buf, *timeout);
                out.extend_from_slice(&buf);
            }
            TcpOption::Experimental { kind, bytes } | TcpOption::Unknown { kind, bytes } => {
                out.push(*kind);
                out.push((2 + bytes.len()) as u8);
                out.extend_from_slice(bytes);
            }
        }
    }
    while out.len() % 4 != 0 {
        out.push(KIND_NOP);
    }
    out
}

/// A TCP segment.
#[derive(Debug)]
pub struct TcpPacket {
    header: ByteSegment,
    pseudo: IpPseudoHeader,
    config: ParseConfig,
    payload: RefCell<PacketOrPayload>,
}

impl TcpPacket {
    pub fn parse(segment: ByteSegment, pseudo: IpPseudoHeader, config: ParseConfig) -> Result<TcpPacket> {
        if segment.len() < MIN_HEADER_LEN {
            return Err(Error::Truncated {
                layer: "tcp",
                need: MIN_HEADER_LEN,
                have: segment.len(),
            });
        }
        let data_off_flags = segment.read_u16_be(DATA_OFF_FLAGS)?;
        let data_offset = (data_off_flags >> 12) as usize;
        if data_offset < 5 {
            return Err(Error::Malformed {
                layer: "tcp",
                detail: "DataOffset < 5",
            });
        }
        let header_len = data_offset * 4;
        if segment.len() < header_len {
            return Err(Error::Truncated {
                layer: "tcp",
                need: header_len,
                have: segment.len(),
            });
        }
        let header = segment.slice(0, header_len)?;
        let buffer_len = header.buffer_len();
        let payload = header.encapsulated(buffer_len)?;
        Ok(TcpPacket {
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

    pub fn sequence_number(&self) -> u32 {
        self.header.read_u32_be(SEQ_NUM).expect("clipped header")
    }

    pub fn ack_number(&self) -> u32 {
        self.header.read_u32_be(ACK_NUM).expect("clipped header")
    }

    pub fn data_offset(&self) -> u8 {
        (self.header.read_u16_be(DATA_OFF_FLAGS).expect("clipped header") >> 12) as u8
    }

    pub fn flags(&self) -> TcpFlags {
        TcpFlags::from_bits_truncate(
            self.header.read_u16_be(DATA_OFF_FLAGS).expect("clipped header") & 0x01ff,
        )
    }

    pub fn syn(&self) -> bool {
        self.flags().contains(TcpFlags::SYN)
    }

    pub fn ack(&self) -> bool {
        self.flags().contains(TcpFlags::ACK)
    }

    pub fn fin(&self) -> bool {
        self.flags().contains(TcpFlags::FIN)
    }

    pub fn rst(&self) -> bool {
        self.flags().contains(TcpFlags::RST)
    }

    pub fn window_size(&self) -> u16 {
        self.header.read_u16_be(WINDOW).expect("clipped header")
    }

    pub fn checksum(&self) -> u16 {
        self.header.read_u16_be(CHECKSUM).expect("clipped header")
    }

    pub fn urgent_pointer(&self) -> u16 {
        self.header.read_u16_be(URGENT_PTR).expect("clipped header")
    }

    /// The DRDA-magic dispatch hook (§5.4): `true` when the payload's
    /// third byte is `0xD0` and at least [`DDM_HEADER_LEN`] bytes are
    /// present. This crate ships no DRDA decoder — the flag is the opaque
    /// hint a caller can act on, matching [`crate::layers::UdpDispatch`]'s
    /// shape for the transport layer that does get a pluggable hook.
    pub fn is_drda_magic(&self) -> bool {
        let payload = self.payload.borrow();
        let bytes = payload.to_bytes();
        bytes.len() >= DDM_HEADER_LEN && bytes[2] == 0xD0
    }

    /// The options region, `[20, DataOffset*4)`. Per the distilled spec §9
    /// (dropped restriction): this never fails on `URG` — there is no
    /// URG-dependent gate here at all.
    pub fn options(&self, strict: bool) -> Result<Vec<TcpOption>> {
        let header_len = self.header.len();
        let bytes = self.header.read_bytes(MIN_HEADER_LEN, header_len - MIN_HEADER_LEN)?;
        parse_options(&bytes, strict)
    }

    pub fn set_sequence_number(&mut self, seq: u32) -> Result<()> {
        self.header.write_u32_be(SEQ_NUM, seq)
    }

    pub fn set_ack_number(&mut self, ack: u32) -> Result<()> {
        self.header.write_u32_be(ACK_NUM, ack)
    }

    pub fn set_flags(&mut self, flags: TcpFlags) -> Result<()> {
        let data_offset = self.data_offset();
        let word = ((data_offset as u16) << 12) | flags.bits();
        self.header.write_u16_be(DATA_OFF_FLAGS, word)
    }

    pub fn set_window_size(&mut self, window: u16) -> Result<()> {
        self.header.write_u16_be(WINDOW, window)
    }

    /// Replace the options region wholesale, resizing the header in place
    /// (§5.5 point 6): the new options are padded to a 4-byte multiple, the
    /// TCP header (not the whole frame) is shifted, and `DataOffset` is
    /// rewritten. The checksum is left stale; call `recompute_checksum`
    /// explicitly afterwards.
    pub fn set_options(&mut self, options: &[TcpOption]) -> Result<()> {
        let new_bytes = emit_options(options);
        let old_header_len = self.header.len();
        let old_options_len = old_header_len - MIN_HEADER_LEN;
        let new_header_len = MIN_HEADER_LEN + new_bytes.len();
        if new_header_len / 4 > 15 {
            return Err(Error::ValueOutOfRange {
                field: "tcp.options",
                max: (15 - 5) * 4,
                got: new_bytes.len(),
            });
        }
        let field_start = self.header.offset() + MIN_HEADER_LEN;
        self.header
            .resize_with_shift(field_start, old_options_len, new_bytes.len())?;
        self.header.write_bytes(MIN_HEADER_LEN, &new_bytes)?;
        let new_data_offset = (new_header_len / 4) as u16;
        let flags = self.header.read_u16_be(DATA_OFF_FLAGS)? & 0x01ff;
        self.header
            .write_u16_be(DATA_OFF_FLAGS, (new_data_offset << 12) | flags)?;
        self.refresh()
    }

    /// Re-derive the payload segment from the (possibly just-resized)
    /// header. Must be called after any setter that resizes the header
    /// (§6 "Ordering").
    pub fn refresh(&mut self) -> Result<()> {
        let header_len = self.header.len();
        let header = self.header.slice(0, header_len)?;
        let buffer_len = header.buffer_len();
        let payload = header.encapsulated(buffer_len)?;
        self.header = header;
        self.payload = RefCell::new(PacketOrPayload::Raw(payload));
        Ok(())
    }

    /// Recompute and write the TCP checksum over the pseudo-header, this
    /// layer's header, and its payload. A no-op under a `ParseConfig::tcp`
    /// policy that excludes `Tx`.
    pub fn recompute_checksum(&mut self) -> Result<()> {
        if !self.config.tcp.compute_on_emit() {
            return Ok(());
        }
        self.header.write_u16_be(CHECKSUM, 0)?;
        let sum = self.checksum_over_current_bytes();
        self.header.write_u16_be(CHECKSUM, sum)
    }

    /// Trivially `true` under a `ParseConfig::tcp` policy that excludes
    /// `Rx` (the policy says not to look).
    pub fn valid_checksum(&self) -> bool {
        if !self.config.tcp.verify_on_parse() {
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

    fn checksum_over_current_bytes(&self) -> u16 {
        let header_bytes = self.header.to_vec();
        let payload_bytes = self.payload.borrow().to_bytes();
        let length = (header_bytes.len() + payload_bytes.len()) as u32;
        let pseudo = self.pseudo_sum(length);
        let body = checksum::combine(&[checksum::data(&header_bytes), checksum::data(&payload_bytes)]);
        checksum::finalize(checksum::combine(&[pseudo, body]), false)
    }

    /// Sum over the pseudo-header, header, and payload as they currently
    /// stand (checksum field included, not zeroed); folds to `0xFFFF` for a
    /// correctly-set checksum.
    fn checksum_over_current_bytes_raw(&self) -> u16 {
        let header_bytes = self.header.to_vec();
        let payload_bytes = self.payload.borrow().to_bytes();
        let length = (header_bytes.len() + payload_bytes.len()) as u32;
        let pseudo = self.pseudo_sum(length);
        let body = checksum::combine(&[checksum::data(&header_bytes), checksum::data(&payload_bytes)]);
        checksum::combine(&[pseudo, body])
    }
}

impl Packet for TcpPacket {
    fn header(&self) -> &ByteSegment {
        &self.header
    }

    fn payload_bytes(&self) -> Vec<u8> {
        self.payload.borrow().to_bytes()
    }

    fn format(&self, verbose: bool, color: bool) -> String {
        let line = format!(
            "TCP {} -> {} seq={} ack={} flags={:?} window={}",
            self.src_port(),
            self.dst_port(),
            self.sequence_number(),
            self.ack_number(),
            self.flags(),
            self.window_size(),
        );
        format_layer(line, &self.payload.borrow(), verbose, color)
    }
}

impl fmt::Display for TcpPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.format(false, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn syn_with_mss() -> Vec<u8> {
        // distilled-spec scenario 1.
        let mut bytes = vec![0u8; 24];
        bytes[SRC_PORT..SRC_PORT + 2].copy_from_slice(&49152u16.to_be_bytes());
        bytes[DST_PORT..DST_PORT + 2].copy_from_slice(&80u16.to_be_bytes());
        bytes[SEQ_NUM..SEQ_NUM + 4].copy_from_slice(&0x12345678u32.to_be_bytes());
        let data_off_flags = (6u16 << 12) | 0x002;
        bytes[DATA_OFF_FLAGS..DATA_OFF_FLAGS + 2].copy_from_slice(&data_off_flags.to_be_bytes());
        bytes[20] = KIND_MSS;
        bytes[21] = 4;
        bytes[22..24].copy_from_slice(&1460u16.to_be_bytes());
        bytes
    }

    fn pseudo() -> IpPseudoHeader {
        IpPseudoHeader::V4 {
            src: Ipv4Addr::new(10, 0, 0, 1),
            dst: Ipv4Addr::new(10, 0, 0, 2),
            protocol: 6,
        }
    }

    #[test]
    fn parses_syn_with_mss_option() {
        let tcp = TcpPacket::parse(ByteSegment::new(syn_with_mss()), pseudo(), ParseConfig::default()).unwrap();
        assert!(tcp.syn());
        assert_eq!(tcp.sequence_number(), 0x12345678);
        assert_eq!(tcp.options(false).unwrap(), vec![TcpOption::Mss(1460)]);
    }

    #[test]
    fn noop_padding_parses_in_order() {
        // distilled-spec scenario 4.
        let bytes = [0x01, 0x01, 0x02, 0x04, 0x05, 0xB4, 0x00];
        let opts = parse_options(&bytes, false).unwrap();
        assert_eq!(
            opts,
            vec![TcpOption::NoOp, TcpOption::NoOp, TcpOption::Mss(1460), TcpOption::EndOfList]
        );
    }

    #[test]
    fn checksum_determinism() {
        let mut tcp = TcpPacket::parse(ByteSegment::new(syn_with_mss()), pseudo(), ParseConfig::default()).unwrap();
        tcp.recompute_checksum().unwrap();
        let first = tcp.checksum();
        tcp.recompute_checksum().unwrap();
        assert_eq!(tcp.checksum(), first);
        assert!(tcp.valid_checksum());
    }

    #[test]
    fn set_options_resizes_and_updates_data_offset() {
        let mut tcp = TcpPacket::parse(ByteSegment::new(syn_with_mss()), pseudo(), ParseConfig::default()).unwrap();
        tcp.set_options(&[TcpOption::Mss(1460), TcpOption::WindowScale(7), TcpOption::EndOfList])
            .unwrap();
        assert_eq!(tcp.data_offset() as usize * 4, tcp.header().len());
        assert_eq!(
            tcp.options(false).unwrap(),
            vec![TcpOption::Mss(1460), TcpOption::WindowScale(7), TcpOption::EndOfList]
        );
    }

    #[test]
    fn strict_mode_rejects_experimental_option() {
        let bytes = [9u8, 4, 0xaa, 0xbb];
        assert!(matches!(
            parse_options(&bytes, true),
            Err(Error::UnsupportedExperimental { .. })
        ));
        let opts = parse_options(&bytes, false).unwrap();
        assert_eq!(
            opts,
            vec![TcpOption::Experimental {
                kind: 9,
                bytes: vec![0xaa, 0xbb]
            }]
        );
    }

    #[test]
    fn drda_magic_hint_matches_third_byte() {
        let mut bytes = syn_with_mss();
        bytes.extend_from_slice(&[0x00, 0x06, 0xD0, 0x41, 0x00, 0x01]);
        let tcp = TcpPacket::parse(ByteSegment::new(bytes), pseudo(), ParseConfig::default()).unwrap();
        assert!(tcp.is_drda_magic());
    }

    #[test]
    fn drda_magic_hint_false_when_too_short_or_mismatched() {
        let tcp = TcpPacket::parse(ByteSegment::new(syn_with_mss()), pseudo(), ParseConfig::default()).unwrap();
        assert!(!tcp.is_drda_magic());

        let mut bytes = syn_with_mss();
        bytes.extend_from_slice(&[0x00, 0x06, 0x00, 0x41, 0x00, 0x01]);
        let tcp = TcpPacket::parse(ByteSegment::new(bytes), pseudo(), ParseConfig::default()).unwrap();
        assert!(!tcp.is_drda_magic());
    }
}
