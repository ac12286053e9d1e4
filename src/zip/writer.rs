//! Whole-archive creation.
//!
//! Entries are written as local header chunks, followed by the central
//! directory and the EOCD record. All offsets are absolute positions in the
//! underlying file, so an archive can begin after arbitrary leading bytes
//! such as a self-extracting stub.

use byteorder::{LittleEndian, WriteBytesExt};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path};
use std::time::UNIX_EPOCH;

use log::{debug, info};
use walkdir::WalkDir;

use super::chunk::{ChunkHeader, EntryChunk, EntryChunkBuilder, unix_now};
use super::encoder::StreamingEncoder;
use super::splice::{AppendEntry, EntrySource};
use super::structures::{
    CDFH_SIGNATURE, EndOfCentralDirectory, VERSION_MADE_BY, VERSION_NEEDED, dos_datetime,
};
use crate::error::{Error, Result};

const S_IFREG: u32 = 0o100000;
const S_IFDIR: u32 = 0o040000;
/// MS-DOS directory attribute, set alongside the Unix mode.
const DOS_DIRECTORY: u32 = 0x10;

struct CentralRecord {
    header: ChunkHeader,
    lfh_offset: u32,
    external_attrs: u32,
}

/// Streams entries into a new archive.
pub struct ArchiveWriter<W: Write> {
    writer: W,
    offset: u64,
    records: Vec<CentralRecord>,
    encoder: StreamingEncoder,
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(writer: W) -> Self {
        Self::at_offset(writer, 0)
    }

    /// Start an archive whose first byte lands at absolute position `offset`.
    pub fn at_offset(writer: W, offset: u64) -> Self {
        Self {
            writer,
            offset,
            records: Vec::new(),
            encoder: StreamingEncoder::new(),
        }
    }

    /// Compress `source` into a file entry.
    pub fn add_file<R: Read>(
        &mut self,
        name: &str,
        source: R,
        mode: u32,
        mtime: i64,
    ) -> Result<()> {
        let payload = self.encoder.encode(source)?;
        let chunk = Self::builder(name, mtime).build(&payload)?;
        self.push(chunk, (S_IFREG | (mode & 0o7777)) << 16)
    }

    pub fn add_directory(&mut self, name: &str, mode: u32, mtime: i64) -> Result<()> {
        let chunk = Self::builder(name, mtime).build_directory()?;
        self.push(chunk, ((S_IFDIR | (mode & 0o7777)) << 16) | DOS_DIRECTORY)
    }

    fn builder(name: &str, mtime: i64) -> EntryChunkBuilder {
        let (time, date) = dos_datetime(mtime);
        EntryChunkBuilder::new(name)
            .dos_datetime(time, date)
            .timestamp(mtime.clamp(0, u32::MAX as i64) as u32)
    }

    fn push(&mut self, chunk: EntryChunk, external_attrs: u32) -> Result<()> {
        let lfh_offset = u32::try_from(self.offset)
            .map_err(|_| Error::unsupported("local header past 4 GiB requires ZIP64"))?;
        self.writer.write_all(&chunk.bytes)?;
        self.offset += chunk.len() as u64;
        debug!("wrote {} at {lfh_offset:#x}", chunk.header.name);

        self.records.push(CentralRecord {
            header: chunk.header,
            lfh_offset,
            external_attrs,
        });
        Ok(())
    }

    /// Write the central directory and EOCD, returning the inner writer.
    pub fn finish(mut self) -> Result<W> {
        let cd_offset = self.offset;
        let total = u16::try_from(self.records.len())
            .ok()
            .filter(|&n| n != u16::MAX)
            .ok_or_else(|| Error::unsupported("more than 65534 entries requires ZIP64"))?;

        let mut cd = Vec::new();
        for record in &self.records {
            let header = &record.header;
            let extra = header.extra_field();
            cd.extend_from_slice(CDFH_SIGNATURE);
            cd.write_u16::<LittleEndian>(VERSION_MADE_BY)?;
            cd.write_u16::<LittleEndian>(VERSION_NEEDED)?;
            cd.write_u16::<LittleEndian>(0)?; // flags
            cd.write_u16::<LittleEndian>(header.method.as_u16())?;
            cd.write_u16::<LittleEndian>(header.dos_time)?;
            cd.write_u16::<LittleEndian>(header.dos_date)?;
            cd.write_u32::<LittleEndian>(header.crc32)?;
            cd.write_u32::<LittleEndian>(header.compressed_size)?;
            cd.write_u32::<LittleEndian>(header.uncompressed_size)?;
            cd.write_u16::<LittleEndian>(header.name.len() as u16)?;
            cd.write_u16::<LittleEndian>(extra.len() as u16)?;
            cd.write_u16::<LittleEndian>(0)?; // comment length
            cd.write_u16::<LittleEndian>(0)?; // disk number start
            cd.write_u16::<LittleEndian>(0)?; // internal attributes
            cd.write_u32::<LittleEndian>(record.external_attrs)?;
            cd.write_u32::<LittleEndian>(record.lfh_offset)?;
            cd.extend_from_slice(header.name.as_bytes());
            cd.extend_from_slice(&extra);
        }

        let cd_offset32 = u32::try_from(cd_offset)
            .ok()
            .filter(|&o| o != u32::MAX)
            .ok_or_else(|| Error::unsupported("central directory past 4 GiB requires ZIP64"))?;
        let cd_size = u32::try_from(cd.len())
            .map_err(|_| Error::unsupported("central directory larger than 4 GiB"))?;

        cd.extend_from_slice(EndOfCentralDirectory::SIGNATURE);
        cd.write_u16::<LittleEndian>(0)?; // this disk
        cd.write_u16::<LittleEndian>(0)?; // disk with central directory
        cd.write_u16::<LittleEndian>(total)?;
        cd.write_u16::<LittleEndian>(total)?;
        cd.write_u32::<LittleEndian>(cd_size)?;
        cd.write_u32::<LittleEndian>(cd_offset32)?;
        cd.write_u16::<LittleEndian>(0)?; // comment length

        self.writer.write_all(&cd)?;
        self.writer.flush()?;
        debug!("central directory at {cd_offset:#x}, {total} entries");
        Ok(self.writer)
    }
}

/// Archive name for a walked path: `/`-separated, relative, no `.` or `..`.
fn entry_name(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(unix)]
fn unix_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

#[cfg(not(unix))]
fn unix_mode(metadata: &fs::Metadata) -> u32 {
    match (metadata.is_dir(), metadata.permissions().readonly()) {
        (true, _) => 0o755,
        (false, true) => 0o444,
        (false, false) => 0o644,
    }
}

fn mtime_secs(metadata: &fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Create an archive at the end of `path` holding everything under `sources`.
///
/// Each source is walked recursively; directories become empty directory
/// entries. `named` entries follow under their given names. Existing bytes
/// in `path` are kept in front of the archive. On failure the file is cut
/// back to its original length.
pub fn create_archive<P: AsRef<Path>>(
    path: &Path,
    sources: &[P],
    named: &[AppendEntry],
) -> Result<()> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    let start = file.seek(SeekFrom::End(0))?;

    let result = write_tree(&file, start, sources, named);
    if result.is_err() {
        file.set_len(start)?;
        return result;
    }

    file.sync_all()?;
    info!("created archive {} at offset {start:#x}", path.display());
    Ok(())
}

fn write_tree<P: AsRef<Path>>(
    file: &File,
    start: u64,
    sources: &[P],
    named: &[AppendEntry],
) -> Result<()> {
    let mut writer = ArchiveWriter::at_offset(BufWriter::new(file), start);

    for source in sources {
        for entry in WalkDir::new(source.as_ref()) {
            let entry = entry.map_err(std::io::Error::from)?;
            let name = entry_name(entry.path());
            if name.is_empty() {
                continue;
            }
            let metadata = entry.metadata().map_err(std::io::Error::from)?;
            let (mode, mtime) = (unix_mode(&metadata), mtime_secs(&metadata));

            if metadata.is_dir() {
                writer.add_directory(&name, mode, mtime)?;
            } else {
                writer.add_file(&name, File::open(entry.path())?, mode, mtime)?;
            }
        }
    }

    for entry in named {
        match &entry.source {
            EntrySource::Bytes(data) => {
                writer.add_file(&entry.name, &data[..], 0o644, unix_now() as i64)?;
            }
            EntrySource::Path(path) => {
                let metadata = fs::metadata(path)?;
                let (mode, mtime) = (unix_mode(&metadata), mtime_secs(&metadata));
                writer.add_file(&entry.name, File::open(path)?, mode, mtime)?;
            }
        }
    }

    writer.finish()?;
    Ok(())
}
