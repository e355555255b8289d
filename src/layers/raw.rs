//! The degenerate "no link layer" wrapper used by [`LinkLayerType::Raw`].
//!
//! [`LinkLayerType::Raw`]: crate::layers::LinkLayerType::Raw

use std::cell::RefCell;
use std::fmt;

use crate::error::Result;
use crate::packet::{Packet, PacketOrPayload};
use crate::segment::ByteSegment;

/// A zero-length header wrapping an entire buffer as undecoded payload.
#[derive(Debug)]
pub struct RawLayer {
    header: ByteSegment,
    payload: RefCell<PacketOrPayload>,
}

impl RawLayer {
    /// Bounds the payload to `segment`'s own declared length, not the whole
    /// backing buffer — used as the dispatch fallback for length-bounded
    /// parents (e.g. an IPv4 datagram with `TotalLength` short of the
    /// capture buffer), so falling back to Raw never exposes trailing bytes
    /// past the parent's own bound (SPEC_FULL §9 encapsulation-bounding).
    pub fn parse(segment: ByteSegment) -> Result<RawLayer> {
        let bound = segment.offset() + segment.len();
        let header = segment.slice(0, 0)?;
        let payload = header.encapsulated(bound)?;
        Ok(RawLayer {
            header,
            payload: RefCell::new(PacketOrPayload::Raw(payload)),
        })
    }
}

impl Packet for RawLayer {
    fn header(&self) -> &ByteSegment {
        &self.header
    }

    fn payload_bytes(&self) -> Vec<u8> {
        self.payload.borrow().to_bytes()
    }

    fn format(&self, verbose: bool, color: bool) -> String {
        crate::packet::format_layer("Raw".to_string(), &self.payload.borrow(), verbose, color)
    }
}

impl fmt::Display for RawLayer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.format(false, false))
    }
}
