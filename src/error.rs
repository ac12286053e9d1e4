//! Error types for archive operations.

use thiserror::Error;

/// Structural problems found while interpreting ZIP bytes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    /// No end of central directory signature anywhere in the image.
    #[error("could not find end of central directory record")]
    EocdNotFound,

    /// A fixed-size record runs past the end of the data.
    #[error("truncated {0} record")]
    TruncatedRecord(&'static str),

    /// A record did not start with its expected signature.
    #[error("invalid {record} signature at offset {offset:#x}")]
    InvalidSignature { record: &'static str, offset: u64 },

    /// The recorded central directory start lies past the EOCD record.
    #[error("central directory offset {cd_offset:#x} is beyond EOCD at {eocd_offset:#x}")]
    CentralDirectoryOutOfBounds { cd_offset: u64, eocd_offset: u64 },

    /// Decompressed data does not match the stored CRC-32.
    #[error("checksum mismatch for {name}: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },

    /// Entry name would be written outside the extraction directory.
    #[error("unsafe entry path: {0}")]
    UnsafePath(String),

    /// A layout variant this crate does not handle (ZIP64, data descriptors, ...).
    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Errors that can occur when reading, creating or splicing archives.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed archive data.
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// Entry names are stored with a 16-bit length.
    #[error("entry name is {0} bytes, the limit is 65535")]
    NameTooLong(usize),
}

impl Error {
    pub(crate) fn unsupported(what: impl Into<String>) -> Self {
        Error::Format(FormatError::Unsupported(what.into()))
    }

    /// True for [`Error::Format`], including the EOCD lookup failure.
    pub fn is_format(&self) -> bool {
        matches!(self, Error::Format(_))
    }
}

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, Error>;
