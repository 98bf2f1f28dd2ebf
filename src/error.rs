//! Library-wide error and result types.

use std::fmt;
use std::io;

/// Result alias used throughout chiapos.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors the library can produce.
///
/// Error messages are kept intentionally terse; callers that need richer
/// context should wrap `Error` in their own type.
#[derive(Debug)]
pub enum Error {
    /// `k` was outside the supported `[15, 59]` range.
    InvalidK(u8),
    /// A seed was not exactly 32 bytes.
    InvalidSeed,
    /// A memo exceeded the 16-bit length prefix budget.
    MemoTooLong,
    /// A hex string could not be decoded, or decoded to the wrong length.
    InvalidHex,
    /// A magic/signature field did not match the expected value.
    BadMagic,
    /// The stream ended before all expected bytes could be read.
    UnexpectedEof,
    /// A structural constraint was violated (message describes which one).
    Parse(&'static str),
    /// Plot file content failed a structural sanity check on read. Not
    /// fatal to the process — callers should treat the plot as unusable.
    Corrupt(&'static str),
    /// A bit-sequence operation (append/concat/shift) would exceed the
    /// maximum representable length of the storage backing it.
    CapacityExceeded,
    /// A back-pointer offset reached the 11-bit field's limit (>= 2048).
    /// Indicates the bucket distribution no longer matches `k`.
    BucketCrowded,
    /// An ANS `small_delta` symbol reached the encoder's 256-symbol alphabet
    /// limit, or decoding produced the `0xff` sentinel.
    DeltaOverflow,
    /// The ANS table failed to decode a valid byte stream.
    AnsDecode,
    /// An underlying I/O operation failed.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidK(k) => write!(f, "invalid k: {k} (must be 15..=59)"),
            Error::InvalidSeed => write!(f, "seed must be exactly 32 bytes"),
            Error::MemoTooLong => write!(f, "memo exceeds 65535 bytes"),
            Error::InvalidHex => write!(f, "invalid hex string"),
            Error::BadMagic => write!(f, "bad magic value"),
            Error::UnexpectedEof => write!(f, "unexpected end of file"),
            Error::Parse(s) => write!(f, "parse error: {s}"),
            Error::Corrupt(s) => write!(f, "invalid plot: {s}"),
            Error::CapacityExceeded => write!(f, "bit sequence capacity exceeded"),
            Error::BucketCrowded => write!(f, "back-pointer offset exceeded 11 bits"),
            Error::DeltaOverflow => write!(f, "ANS delta symbol out of range"),
            Error::AnsDecode => write!(f, "ANS stream failed to decode"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let Error::Io(e) = self {
            Some(e)
        } else {
            None
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
