//! The recursive `Packet` trait hierarchy and its lazy-decode payload slot.
//!
//! Grounded in the teacher's `wire` module shape (a `Packet<T>` per layer)
//! but reworked per the design notes: rather than deep inheritance or a
//! parent back-reference, each layer is a concrete type implementing a
//! shared `Packet` trait, payload storage is a `Decoded(Box<dyn Packet>) |
//! Raw(ByteSegment)` sum behind a `RefCell` for lazy decoding, and checksum
//! computation that needs pseudo-header fields takes them as an explicit
//! argument instead of reaching up through a parent pointer.

use std::cell::{Ref, RefCell};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::segment::ByteSegment;

/// Pseudo-header fields owned by a parent IP layer, threaded explicitly into
/// a transport/ICMP layer's checksum computation instead of via a parent
/// back-reference (see module docs and SPEC_FULL.md §5.3/§10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpPseudoHeader {
    V4 {
        src: Ipv4Addr,
        dst: Ipv4Addr,
        protocol: u8,
    },
    V6 {
        src: Ipv6Addr,
        dst: Ipv6Addr,
        next_header: u8,
    },
}

/// A layered view over a byte buffer: owns a header `ByteSegment` and knows
/// how to recursively stringify itself and its encapsulated payload.
///
/// `header().length` always equals the decoded header length for this
/// layer (clipped during construction); a concrete type's payload segment
/// begins exactly at `header().offset() + header().len()`.
pub trait Packet: fmt::Debug {
    /// This layer's own header window.
    fn header(&self) -> &ByteSegment;

    /// The raw bytes of just this layer's header.
    fn header_bytes(&self) -> Vec<u8> {
        self.header().to_vec()
    }

    /// This layer's payload, as bytes — either the still-undecoded raw
    /// segment or the fully reserialized decoded child.
    fn payload_bytes(&self) -> Vec<u8>;

    /// Recursively stringify this layer and its payload. Diagnostic only;
    /// the exact text is not part of the contract (§7).
    fn format(&self, verbose: bool, color: bool) -> String;

    /// Reconstruct the full frame from this layer down: header followed by
    /// payload, recursively. `serialize(parse(b)) == b` when nothing has
    /// been mutated.
    fn to_vec(&self) -> Vec<u8> {
        let mut out = self.header_bytes();
        out.extend(self.payload_bytes());
        out
    }
}

/// The payload slot: either an undecoded window onto the remaining bytes,
/// or a fully decoded child packet. Decoding is lazy and the result is
/// cached in place (the one piece of cached state in the whole crate; see
/// SPEC_FULL.md §3).
#[derive(Debug)]
pub enum PacketOrPayload {
    Decoded(Box<dyn Packet>),
    Raw(ByteSegment),
}

impl PacketOrPayload {
    pub fn as_raw(&self) -> Option<&ByteSegment> {
        match self {
            PacketOrPayload::Raw(seg) => Some(seg),
            PacketOrPayload::Decoded(_) => None,
        }
    }

    pub fn as_decoded(&self) -> Option<&dyn Packet> {
        match self {
            PacketOrPayload::Decoded(p) => Some(p.as_ref()),
            PacketOrPayload::Raw(_) => None,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            PacketOrPayload::Raw(seg) => seg.to_vec(),
            PacketOrPayload::Decoded(p) => p.to_vec(),
        }
    }

    fn format(&self, verbose: bool, color: bool) -> String {
        match self {
            PacketOrPayload::Raw(seg) => {
                if seg.is_empty() {
                    String::new()
                } else if verbose {
                    format!("\nRawData ({} bytes): {:02x?}", seg.len(), seg.to_vec())
                } else {
                    format!("\nRawData ({} bytes)", seg.len())
                }
            }
            PacketOrPayload::Decoded(p) => format!("\n{}", p.format(verbose, color)),
        }
    }
}

/// Ensure `slot` holds a `Decoded` child, dispatching through `decode` the
/// first time it is asked for, and return the slot's current borrow.
///
/// This is the one piece of machinery every layer's typed payload getter
/// shares; lifting it out of each layer avoids repeating the
/// borrow/check/decode/cache dance per protocol.
pub fn decode_lazily<'a>(
    slot: &'a RefCell<PacketOrPayload>,
    decode: impl FnOnce(&ByteSegment) -> Box<dyn Packet>,
) -> Ref<'a, PacketOrPayload> {
    let needs_decode = matches!(&*slot.borrow(), PacketOrPayload::Raw(_));
    if needs_decode {
        let segment = match &*slot.borrow() {
            PacketOrPayload::Raw(seg) => seg.clone(),
            PacketOrPayload::Decoded(_) => unreachable!(),
        };
        let child = decode(&segment);
        *slot.borrow_mut() = PacketOrPayload::Decoded(child);
    }
    slot.borrow()
}

/// Shared helper for `Packet::format` impls: render `header_line`, then
/// append the payload's own recursive rendering.
pub fn format_layer(header_line: String, payload: &PacketOrPayload, verbose: bool, color: bool) -> String {
    let mut out = header_line;
    out.push_str(&payload.format(verbose, color));
    out
}
