use core::fmt;

/// Parsing or mutating a packet failed.
///
/// Unknown enumeration values (EtherType, IP protocol, option/TLV kind) are
/// never an `Error` variant — they are surfaced as `Unknown(n)` values by the
/// layer that reads them (see the `enum_with_unknown!` macro). Checksum
/// mismatches are likewise not an `Error`; they are exposed as a `bool`
/// predicate only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A header or length-prefixed field extends past its containing segment.
    Truncated {
        layer: &'static str,
        need: usize,
        have: usize,
    },
    /// A setter rejected a value that exceeds a protocol-defined maximum.
    ValueOutOfRange {
        field: &'static str,
        max: usize,
        got: usize,
    },
    /// A structural inconsistency detectable without full semantic knowledge
    /// of the layer above (e.g. an IPv4 IHL below 5).
    Malformed {
        layer: &'static str,
        detail: &'static str,
    },
    /// An experimental/reserved option or TLV was rejected because the
    /// caller opted into `ParseConfig::strict_options`.
    UnsupportedExperimental { feature: &'static str },
}

pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Truncated { layer, need, have } => write!(
                f,
                "{layer}: truncated buffer, need {need} bytes, have {have}"
            ),
            Error::ValueOutOfRange { field, max, got } => write!(
                f,
                "{field}: value out of range, max {max}, got {got}"
            ),
            Error::Malformed { layer, detail } => write!(f, "{layer}: malformed ({detail})"),
            Error::UnsupportedExperimental { feature } => {
                write!(f, "experimental feature rejected in strict mode: {feature}")
            }
        }
    }
}

impl std::error::Error for Error {}
