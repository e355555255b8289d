//! A zero-copy, in-place view layer over byte buffers holding captured or
//! synthesized network frames.
//!
//! The core abstraction is [`segment::ByteSegment`]: a bounds-checked window
//! onto a shared, resizable buffer. Each protocol layer in [`layers`] wraps a
//! `ByteSegment` spanning just its own header and exposes the remaining
//! bytes as its payload, lazily decoded into the next layer on demand
//! ([`packet::PacketOrPayload`]). [`layers::parse`] is the top-level entry
//! point.

#[macro_use]
mod macros;

pub mod addr;
pub mod checksum;
pub mod config;
pub mod error;
pub mod layers;
pub mod packet;
pub mod segment;

pub use config::{Checksum, ParseConfig};
pub use error::{Error, Result};
pub use layers::{parse, LinkLayerType};
pub use packet::{IpPseudoHeader, Packet, PacketOrPayload};
pub use segment::ByteSegment;
