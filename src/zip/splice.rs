//! In-place augmentation of finalized archives.
//!
//! New entries are serialized as local-file-header chunks and inserted as one
//! contiguous block directly ahead of the existing central directory. The
//! EOCD's central directory offset is then moved forward by the block length.
//! The central directory itself is left untouched, so spliced entries do not
//! appear in a central-directory listing; walk local headers to see them
//! (see [`ZipParser::local_entries`](super::ZipParser::local_entries)).

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use tempfile::NamedTempFile;

use super::chunk::{EntryChunk, EntryChunkBuilder};
use super::encoder::{EncodedPayload, StreamingEncoder};
use super::locator::{EocdLocation, locate_eocd};
use crate::error::{Error, Result};

/// Where the bytes of an appended entry come from.
#[derive(Debug, Clone)]
pub enum EntrySource {
    /// Read from the filesystem when the splice runs.
    Path(PathBuf),
    /// Already in memory.
    Bytes(Vec<u8>),
}

/// A named entry to splice into an archive.
#[derive(Debug, Clone)]
pub struct AppendEntry {
    pub name: String,
    pub source: EntrySource,
}

impl AppendEntry {
    pub fn new(name: impl Into<String>, source: EntrySource) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }

    /// An entry stored under the base name of `path`.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self::new(name, EntrySource::Path(path))
    }

    pub fn from_bytes(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self::new(name, EntrySource::Bytes(data.into()))
    }
}

/// Outcome of a splice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpliceReport {
    /// Stored names, in archive order.
    pub appended: Vec<String>,
    /// Sources that could not be read.
    pub skipped: Vec<PathBuf>,
    /// Length of the inserted block.
    pub inserted_len: usize,
    /// Central directory offset before the splice.
    pub original_cd_offset: u32,
    /// Central directory offset now recorded in the EOCD.
    pub cd_offset: u32,
}

/// Splices entries into an existing archive.
#[derive(Debug, Clone, Default)]
pub struct ArchiveSplicer {
    encoder: StreamingEncoder,
    timestamp: Option<u32>,
}

impl ArchiveSplicer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp every new entry with `secs` instead of the current time.
    pub fn with_timestamp(mut self, secs: u32) -> Self {
        self.timestamp = Some(secs);
        self
    }

    /// Append files under their base names.
    pub fn append_files<P: AsRef<Path>>(
        &self,
        archive: &Path,
        files: &[P],
    ) -> Result<SpliceReport> {
        let entries: Vec<_> = files
            .iter()
            .map(|p| AppendEntry::from_path(p.as_ref()))
            .collect();
        self.append(archive, &entries)
    }

    /// Append `entries` to the archive at `archive` and atomically replace it.
    ///
    /// Unreadable path sources are logged and skipped. Any other failure
    /// leaves the archive untouched.
    pub fn append(&self, archive: &Path, entries: &[AppendEntry]) -> Result<SpliceReport> {
        let image = fs::read(archive)?;
        let location = locate_eocd(&image)?;

        let (chunks, skipped) = self.build_chunks(entries)?;
        let inserted: Vec<u8> = chunks.iter().flat_map(|c| c.bytes.iter().copied()).collect();

        let mut report = SpliceReport {
            appended: chunks.into_iter().map(|c| c.header.name).collect(),
            skipped,
            inserted_len: inserted.len(),
            original_cd_offset: location.cd_offset,
            cd_offset: location.cd_offset,
        };
        if inserted.is_empty() {
            debug!("nothing to insert into {}", archive.display());
            return Ok(report);
        }

        let (new_image, cd_offset) = splice_at(image, location, &inserted)?;
        replace_file(archive, &new_image)?;
        report.cd_offset = cd_offset;

        info!(
            "inserted {} entries ({} bytes) above the central directory of {}",
            report.appended.len(),
            inserted.len(),
            archive.display()
        );
        Ok(report)
    }

    /// Encode every entry in input order. Path sources that fail to read are skipped.
    pub fn build_chunks(&self, entries: &[AppendEntry]) -> Result<(Vec<EntryChunk>, Vec<PathBuf>)> {
        let mut chunks = Vec::with_capacity(entries.len());
        let mut skipped = Vec::new();

        for entry in entries {
            let encoded = match &entry.source {
                EntrySource::Bytes(data) => self.encoder.encode(&data[..])?,
                EntrySource::Path(path) => match self.encode_file(path) {
                    Ok(encoded) => encoded,
                    Err(e) => {
                        warn!("skipping {}: {e}", path.display());
                        skipped.push(path.clone());
                        continue;
                    }
                },
            };

            let mut builder = EntryChunkBuilder::new(entry.name.as_str());
            if let Some(secs) = self.timestamp {
                builder = builder.timestamp(secs);
            }
            let chunk = builder.build(&encoded)?;
            debug!(
                "built chunk for {} ({} -> {} bytes)",
                entry.name,
                encoded.uncompressed_size,
                chunk.len()
            );
            chunks.push(chunk);
        }

        Ok((chunks, skipped))
    }

    fn encode_file(&self, path: &Path) -> io::Result<EncodedPayload> {
        if fs::metadata(path)?.is_dir() {
            return Err(io::Error::other("is a directory"));
        }
        self.encoder.encode(File::open(path)?)
    }
}

/// Insert `inserted` ahead of the central directory of `image`.
///
/// Returns the new image and the central directory offset recorded in it.
pub fn splice_image(image: Vec<u8>, inserted: &[u8]) -> Result<(Vec<u8>, u32)> {
    let location = locate_eocd(&image)?;
    splice_at(image, location, inserted)
}

fn splice_at(
    mut image: Vec<u8>,
    location: EocdLocation,
    inserted: &[u8],
) -> Result<(Vec<u8>, u32)> {
    let new_cd_offset = u32::try_from(inserted.len())
        .ok()
        .and_then(|len| location.cd_offset.checked_add(len))
        .filter(|&offset| offset != u32::MAX)
        .ok_or_else(|| Error::unsupported("central directory offset past 4 GiB requires ZIP64"))?;

    // The patch lands after the insertion point, in the part that moves.
    image[location.cd_offset_field()].copy_from_slice(&new_cd_offset.to_le_bytes());

    let at = location.cd_offset as usize;
    let mut out = Vec::with_capacity(image.len() + inserted.len());
    out.extend_from_slice(&image[..at]);
    out.extend_from_slice(inserted);
    out.extend_from_slice(&image[at..]);
    debug!(
        "central directory moved from {:#x} to {new_cd_offset:#x}",
        location.cd_offset
    );

    Ok((out, new_cd_offset))
}

/// Write `image` next to `path` and rename it over the original.
///
/// Symlinks are resolved first, so the link survives and its target is
/// replaced. Permissions and, where allowed, ownership carry over.
fn replace_file(path: &Path, image: &[u8]) -> Result<()> {
    let target = fs::canonicalize(path)?;
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let metadata = fs::metadata(&target)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(image)?;
    tmp.as_file().sync_all()?;
    fs::set_permissions(tmp.path(), metadata.permissions())?;
    copy_owner(tmp.path(), &metadata);
    tmp.persist(&target).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(unix)]
fn copy_owner(path: &Path, original: &fs::Metadata) {
    use std::os::unix::fs::MetadataExt;
    if let Err(e) = std::os::unix::fs::chown(path, Some(original.uid()), Some(original.gid())) {
        warn!("could not keep owner of {}: {e}", path.display());
    }
}

#[cfg(not(unix))]
fn copy_owner(_path: &Path, _original: &fs::Metadata) {}
