//! Parse/emit configuration.
//!
//! Modeled on the checksum-capabilities knob of tap-based stacks: a small,
//! `Copy` struct threaded through parsing and emission rather than a global.

/// A description of checksum behavior for a particular protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Checksum {
    /// Verify checksum when parsing and compute checksum when emitting.
    #[default]
    Both,
    /// Verify checksum when parsing only.
    Rx,
    /// Compute checksum when emitting only.
    Tx,
    /// Ignore checksum entirely (neither verify nor compute).
    None,
}

impl Checksum {
    pub fn verify_on_parse(self) -> bool {
        matches!(self, Checksum::Both | Checksum::Rx)
    }

    pub fn compute_on_emit(self) -> bool {
        matches!(self, Checksum::Both | Checksum::Tx)
    }
}

/// Per-protocol checksum policy plus the strict-options switch, threaded
/// through every layer's parse/recompute/valid operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseConfig {
    pub ipv4: Checksum,
    pub udp: Checksum,
    pub tcp: Checksum,
    pub icmpv4: Checksum,
    pub icmpv6: Checksum,
    pub igmpv2: Checksum,
    /// When `true`, TCP options in the "experimental" range (RFC draft
    /// reservations the crate does not decode) raise
    /// `Error::UnsupportedExperimental` instead of being retained as an
    /// opaque `TcpOption::Experimental` value.
    pub strict_options: bool,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig {
            ipv4: Checksum::Both,
            udp: Checksum::Both,
            tcp: Checksum::Both,
            icmpv4: Checksum::Both,
            icmpv6: Checksum::Both,
            igmpv2: Checksum::Both,
            strict_options: false,
        }
    }
}

impl ParseConfig {
    /// Configuration that skips every checksum check and never rejects an
    /// experimental option; useful for fuzzing and for replaying captures
    /// known to predate a checksum-offloading NIC.
    pub fn ignored() -> Self {
        ParseConfig {
            ipv4: Checksum::None,
            udp: Checksum::None,
            tcp: Checksum::None,
            icmpv4: Checksum::None,
            icmpv6: Checksum::None,
            igmpv2: Checksum::None,
            strict_options: false,
        }
    }
}
