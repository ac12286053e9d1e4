//! Single-pass deflate compression with CRC-32 of the input.

use std::io::{self, Read};

use flate2::write::DeflateEncoder;
use flate2::{Compression, CrcReader};

/// Output of one [`StreamingEncoder::encode`] pass.
#[derive(Debug, Clone)]
pub struct EncodedPayload {
    /// Raw deflate stream, finalized.
    pub compressed: Vec<u8>,
    /// CRC-32 of the uncompressed bytes.
    pub crc32: u32,
    /// Number of uncompressed bytes read from the source.
    pub uncompressed_size: u64,
}

/// Compresses a byte stream while checksumming it.
///
/// The source is read exactly once: bytes flow through a [`CrcReader`]
/// into the deflate encoder.
#[derive(Debug, Clone, Copy)]
pub struct StreamingEncoder {
    level: Compression,
}

impl Default for StreamingEncoder {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl StreamingEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encode<R: Read>(&self, source: R) -> io::Result<EncodedPayload> {
        let mut reader = CrcReader::new(source);
        let mut encoder = DeflateEncoder::new(Vec::new(), self.level);

        let uncompressed_size = io::copy(&mut reader, &mut encoder)?;
        // finish() flushes the final block; without it the stream is not decodable
        let compressed = encoder.finish()?;

        Ok(EncodedPayload {
            compressed,
            crc32: reader.crc().sum(),
            uncompressed_size,
        })
    }
}
