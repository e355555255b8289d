//! Concrete per-protocol layer parsers and the top-level dispatch factory.
//!
//! Each submodule owns one wire format and follows the same shape: a struct
//! wrapping a [`crate::segment::ByteSegment`], a constructor that clips the
//! header to its decoded length and validates declared lengths against the
//! segment, and a lazily-decoded [`crate::packet::PacketOrPayload`] for
//! whatever follows. Dispatch on an unrecognized key is never an error —
//! see each module's `dispatch` function.

pub mod arp;
pub mod ethernet;
pub mod icmpv4;
pub mod icmpv6;
pub mod igmpv2;
pub mod ip;
pub mod ipv4;
pub mod ipv6;
pub mod lldp;
pub mod pppoe;
pub mod raw;
pub mod tcp;
pub mod udp;

use crate::config::ParseConfig;
use crate::error::Result;
use crate::packet::Packet;
use crate::segment::ByteSegment;

pub use ethernet::EtherType;
pub use ip::IpProtocol;

/// The medium a captured/synthesized frame arrived over. Mirrors the
/// teacher's `phy::Medium` distinction but without any interface or device
/// machinery attached to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkLayerType {
    /// An Ethernet II frame: dispatch through [`ethernet::EthernetPacket`].
    Ethernet,
    /// No link layer is present; the buffer is exposed as an opaque layer
    /// with a zero-length header (callers decode it themselves, e.g. by
    /// constructing an [`ipv4::Ipv4Packet`] directly from its payload).
    Raw,
}

/// A caller-supplied hook that may steer how a UDP payload is interpreted,
/// the same opaque-and-pluggable shape as TCP's DRDA-magic check. The
/// default implementation never recognizes anything, leaving the payload
/// `Raw`.
pub trait UdpDispatch {
    fn dispatch(&self, src_port: u16, dst_port: u16) -> Option<ApplicationLayerHint>;
}

/// What a [`UdpDispatch`] hook believes the payload to be. This crate does
/// not ship a decoder for any of these; the hint exists so a caller wrapping
/// this crate can plug one in without forking the UDP parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationLayerHint {
    Dns,
    Dhcp,
    Other(&'static str),
}

/// The default [`UdpDispatch`]: always `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDispatch;

impl UdpDispatch for NoDispatch {
    fn dispatch(&self, _src_port: u16, _dst_port: u16) -> Option<ApplicationLayerHint> {
        None
    }
}

/// Wrap `bytes` in a fresh buffer and dispatch on `link_layer_type`.
///
/// This is the single entry point into the crate: it owns the buffer (no
/// caller-visible borrow), decodes just the outermost layer eagerly, and
/// leaves every layer below it as a lazily-decoded [`crate::PacketOrPayload`].
pub fn parse(link_layer_type: LinkLayerType, bytes: Vec<u8>, config: &ParseConfig) -> Result<Box<dyn Packet>> {
    let segment = ByteSegment::new(bytes);
    match link_layer_type {
        LinkLayerType::Ethernet => Ok(Box::new(ethernet::EthernetPacket::parse(segment, config)?)),
        LinkLayerType::Raw => Ok(Box::new(raw::RawLayer::parse(segment)?)),
    }
}
