//! Serialization of a single local-file-header record.
//!
//! An entry chunk is the on-disk form of one archive member as it appears
//! before the central directory:
//!
//! ```text
//! offset  size  field
//!      0     4  signature PK\x03\x04
//!      4     2  version needed (2.0)
//!      6     2  general purpose flags
//!      8     2  compression method
//!     10     2  DOS modification time
//!     12     2  DOS modification date
//!     14     4  CRC-32 of uncompressed data
//!     18     4  compressed size
//!     22     4  uncompressed size
//!     26     2  name length N
//!     28     2  extra length E
//!     30     N  name
//!   30+N     E  extended timestamp extra field
//! 30+N+E     -  payload
//! ```
//!
//! All integers are little-endian.

use byteorder::{LittleEndian, WriteBytesExt};
use std::time::{SystemTime, UNIX_EPOCH};

use super::encoder::EncodedPayload;
use super::structures::{
    CompressionMethod, EXTENDED_TIMESTAMP_LEN, EXTENDED_TIMESTAMP_TAG, LFH_SIGNATURE, LFH_SIZE,
    VERSION_NEEDED,
};
use crate::error::{Error, Result};

/// Current time as a 32-bit Unix timestamp, saturating.
pub fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().min(u32::MAX as u64) as u32)
        .unwrap_or(0)
}

/// Header fields of a built chunk, kept for the central directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkHeader {
    pub name: String,
    pub method: CompressionMethod,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub dos_time: u16,
    pub dos_date: u16,
    pub unix_mtime: u32,
}

impl ChunkHeader {
    /// The extended timestamp extra block: tag, size 5, flags 1, mtime.
    pub fn extra_field(&self) -> [u8; EXTENDED_TIMESTAMP_LEN] {
        let mut extra = [0u8; EXTENDED_TIMESTAMP_LEN];
        extra[0..2].copy_from_slice(&EXTENDED_TIMESTAMP_TAG.to_le_bytes());
        extra[2..4].copy_from_slice(&5u16.to_le_bytes());
        extra[4] = 1;
        extra[5..9].copy_from_slice(&self.unix_mtime.to_le_bytes());
        extra
    }
}

/// One serialized local-file-header record plus payload.
#[derive(Debug, Clone)]
pub struct EntryChunk {
    pub header: ChunkHeader,
    pub bytes: Vec<u8>,
}

impl EntryChunk {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Builds an [`EntryChunk`] from a name and an encoded payload.
///
/// ```
/// use zipsplice::zip::{EntryChunkBuilder, StreamingEncoder};
///
/// let payload = StreamingEncoder::new().encode(&b"hello"[..]).unwrap();
/// let chunk = EntryChunkBuilder::new("hello.txt")
///     .timestamp(0)
///     .build(&payload)
///     .unwrap();
/// assert_eq!(&chunk.bytes[..4], b"PK\x03\x04");
/// ```
#[derive(Debug, Clone)]
pub struct EntryChunkBuilder {
    name: String,
    timestamp: Option<u32>,
    dos_time: u16,
    dos_date: u16,
}

impl EntryChunkBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timestamp: None,
            dos_time: 0,
            dos_date: 0,
        }
    }

    /// Unix seconds for the extended timestamp field. Defaults to now.
    pub fn timestamp(mut self, secs: u32) -> Self {
        self.timestamp = Some(secs);
        self
    }

    /// DOS time and date fields. Left zero unless set.
    pub fn dos_datetime(mut self, time: u16, date: u16) -> Self {
        self.dos_time = time;
        self.dos_date = date;
        self
    }

    /// Build a deflate entry around an encoded payload.
    pub fn build(self, payload: &EncodedPayload) -> Result<EntryChunk> {
        let uncompressed_size = u32::try_from(payload.uncompressed_size).map_err(|_| {
            Error::unsupported(format!(
                "{} is {} bytes uncompressed, ZIP64 is required",
                self.name, payload.uncompressed_size
            ))
        })?;
        let compressed_size = u32::try_from(payload.compressed.len()).map_err(|_| {
            Error::unsupported(format!("{} compresses past 4 GiB", self.name))
        })?;
        self.assemble(
            CompressionMethod::Deflate,
            payload.crc32,
            compressed_size,
            uncompressed_size,
            &payload.compressed,
        )
    }

    /// Build a stored, empty directory entry. A trailing `/` is added if missing.
    pub fn build_directory(mut self) -> Result<EntryChunk> {
        if !self.name.ends_with('/') {
            self.name.push('/');
        }
        self.assemble(CompressionMethod::Stored, 0, 0, 0, &[])
    }

    fn assemble(
        self,
        method: CompressionMethod,
        crc32: u32,
        compressed_size: u32,
        uncompressed_size: u32,
        payload: &[u8],
    ) -> Result<EntryChunk> {
        let name_len =
            u16::try_from(self.name.len()).map_err(|_| Error::NameTooLong(self.name.len()))?;

        let header = ChunkHeader {
            method,
            crc32,
            compressed_size,
            uncompressed_size,
            dos_time: self.dos_time,
            dos_date: self.dos_date,
            unix_mtime: self.timestamp.unwrap_or_else(unix_now),
            name: self.name,
        };
        let extra = header.extra_field();

        let mut bytes =
            Vec::with_capacity(LFH_SIZE + header.name.len() + extra.len() + payload.len());
        bytes.extend_from_slice(LFH_SIGNATURE);
        bytes.write_u16::<LittleEndian>(VERSION_NEEDED)?;
        bytes.write_u16::<LittleEndian>(0)?; // flags
        bytes.write_u16::<LittleEndian>(method.as_u16())?;
        bytes.write_u16::<LittleEndian>(header.dos_time)?;
        bytes.write_u16::<LittleEndian>(header.dos_date)?;
        bytes.write_u32::<LittleEndian>(header.crc32)?;
        bytes.write_u32::<LittleEndian>(header.compressed_size)?;
        bytes.write_u32::<LittleEndian>(header.uncompressed_size)?;
        bytes.write_u16::<LittleEndian>(name_len)?;
        bytes.write_u16::<LittleEndian>(extra.len() as u16)?;
        bytes.extend_from_slice(header.name.as_bytes());
        bytes.extend_from_slice(&extra);
        bytes.extend_from_slice(payload);

        Ok(EntryChunk { header, bytes })
    }
}
