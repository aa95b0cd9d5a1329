use thiserror::Error as ThisError;

/// Stable, signed 16-bit error codes exposed at the engine's ABI boundary.
///
/// These mirror the codes a CSN.1 decoder/encoder has historically returned;
/// callers that need the raw code (rather than the richer [`Error`] variant)
/// should use [`Error::code`].
pub mod codes {
    pub const GENERAL: i16 = -1;
    pub const DATA_NOT_VALID: i16 = -2;
    pub const IN_SCRIPT: i16 = -3;
    pub const INVALID_UNION_INDEX: i16 = -4;
    pub const NEED_MORE_BITS_TO_UNPACK: i16 = -5;
    pub const ILLEGAL_BIT_VALUE: i16 = -6;
    pub const INTERNAL: i16 = -7;
    pub const STREAM_NOT_SUPPORTED: i16 = -8;
    pub const MESSAGE_TOO_LONG: i16 = -9;
    pub const NOT_IMPLEMENTED: i16 = 999;
}

/// Engine-level failure, carrying the directive label and bit position at
/// the point of failure wherever that information is available.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum Error {
    #[error("{label}: need more bits to unpack at bit {position}")]
    NeedMoreBits { label: &'static str, position: i64 },

    #[error("{label}: data not valid at bit {position} (expected {expected:#x}, got {actual:#x})")]
    DataNotValid {
        label: &'static str,
        position: i64,
        expected: u64,
        actual: u64,
    },

    #[error("{label}: malformed description ({reason})")]
    InScript {
        label: &'static str,
        reason: &'static str,
    },

    #[error("{label}: invalid union index {index} for k={k}")]
    InvalidUnionIndex {
        label: &'static str,
        index: u8,
        k: u8,
    },

    #[error("{label}: illegal bit value at bit {position}")]
    IllegalBitValue { label: &'static str, position: i64 },

    #[error("{label}: width {bits} bits exceeds the supported maximum")]
    General { label: &'static str, bits: u32 },

    #[error("{label}: internal engine error ({reason})")]
    Internal {
        label: &'static str,
        reason: &'static str,
    },

    #[error("{label}: array width {bits} bits is not implemented")]
    NotImplemented { label: &'static str, bits: u32 },

    #[error("{label}: explicit trap, code {code}")]
    Trap { label: &'static str, code: i16 },

    #[error("message too long: needed {needed} bits, buffer holds {available}")]
    MessageTooLong { needed: usize, available: usize },
}

impl Error {
    /// The stable, signed 16-bit code a C-style ABI caller would see.
    pub fn code(&self) -> i16 {
        use codes::*;
        match self {
            Error::NeedMoreBits { .. } => NEED_MORE_BITS_TO_UNPACK,
            Error::DataNotValid { .. } => DATA_NOT_VALID,
            Error::InScript { .. } => IN_SCRIPT,
            Error::InvalidUnionIndex { .. } => INVALID_UNION_INDEX,
            Error::IllegalBitValue { .. } => ILLEGAL_BIT_VALUE,
            Error::General { .. } => GENERAL,
            Error::Internal { .. } => INTERNAL,
            Error::NotImplemented { .. } => NOT_IMPLEMENTED,
            Error::Trap { code, .. } => *code,
            Error::MessageTooLong { .. } => MESSAGE_TOO_LONG,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Error::NeedMoreBits { label, .. }
            | Error::DataNotValid { label, .. }
            | Error::InScript { label, .. }
            | Error::InvalidUnionIndex { label, .. }
            | Error::IllegalBitValue { label, .. }
            | Error::General { label, .. }
            | Error::Internal { label, .. }
            | Error::NotImplemented { label, .. }
            | Error::Trap { label, .. } => label,
            Error::MessageTooLong { .. } => "<buffer>",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
