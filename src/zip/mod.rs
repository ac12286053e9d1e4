//! ZIP archive reading, writing and splicing.
//!
//! ## Architecture
//!
//! - [`structures`]: Data structures representing ZIP format elements (EOCD, file headers, etc.)
//! - [`parser`]: Low-level parsing of ZIP structures from raw bytes
//! - [`extractor`]: Decompression and extraction to disk
//! - [`encoder`]: Deflate compression with CRC-32 in one pass
//! - [`chunk`]: Serialization of one local file header record
//! - [`locator`]: EOCD lookup over an in-memory image
//! - [`splice`]: Insertion of new entries into a finished archive
//! - [`writer`]: Creation of new archives from a directory tree
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! Splicing exploits this layout: new local entries can be slotted in
//! between (1) and (2) as long as the EOCD's central directory offset is
//! moved by the same amount.
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - STORED (no compression) method for reading and directories
//! - DEFLATE compression method
//!
//! ## Limitations
//!
//! - No ZIP64 support
//! - No encryption support
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods

pub mod chunk;
pub mod encoder;
mod extractor;
pub mod locator;
mod parser;
pub mod splice;
mod structures;
pub mod writer;

pub use chunk::{EntryChunk, EntryChunkBuilder};
pub use encoder::{EncodedPayload, StreamingEncoder};
pub use extractor::ZipExtractor;
pub use locator::{EocdLocation, locate_eocd};
pub use parser::ZipParser;
pub use splice::{AppendEntry, ArchiveSplicer, EntrySource, SpliceReport, splice_image};
pub use structures::*;
pub use writer::{ArchiveWriter, create_archive};
