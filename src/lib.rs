//! # zipsplice
//!
//! Append entries to an already finalized ZIP archive without rewriting it.
//!
//! New entries are compressed, serialized as local file header records and
//! inserted as one block right before the archive's central directory; the
//! end of central directory record is then patched to point past them. The
//! rest of the archive is copied byte for byte and the file is replaced
//! atomically.
//!
//! Around that core the crate provides the usual path-level operations:
//! creating an archive from a directory tree (optionally after existing
//! leading bytes, e.g. a self-extracting stub), listing and extracting.
//!
//! ## Features
//!
//! - Splice deflate entries into an existing archive in place
//! - Create archives from files and directory trees
//! - List entries from the central directory or by walking local headers
//! - Extract with CRC verification, permissions and modification times
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use zipsplice::zip::{AppendEntry, ArchiveSplicer};
//!
//! fn main() -> zipsplice::Result<()> {
//!     let report = ArchiveSplicer::new().append(
//!         Path::new("bundle.zip"),
//!         &[AppendEntry::from_bytes("notes.txt", b"hello".to_vec())],
//!     )?;
//!     println!("central directory now at {:#x}", report.cd_offset);
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod cli;
pub mod error;
pub mod io;
pub mod zip;

pub use archive::{
    ArchiveOutcome, create_or_append_archive, create_or_append_entries, extract_archive,
    is_archive, list_archive_entries, list_local_entries,
};
pub use cli::Cli;
pub use error::{Error, FormatError, Result};
pub use io::{LocalFileReader, ReadAt};
pub use zip::{ArchiveSplicer, ZipExtractor, ZipFileEntry};
