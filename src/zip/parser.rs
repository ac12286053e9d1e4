//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP file structures,
//! reading from any source that implements the [`ReadAt`] trait.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. Read the Central Directory to get metadata for all files
//! 3. For extraction, read each file's Local File Header and data
//!
//! Entries spliced in without a central directory record are only visible
//! by walking local headers forward, which [`ZipParser::local_entries`] does.

use byteorder::{LittleEndian, ReadBytesExt};
use log::debug;
use std::io::{Cursor, Read};

use crate::error::{Error, FormatError, Result};
use crate::io::ReadAt;

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Low-level ZIP file parser.
///
/// This struct handles reading and parsing ZIP structures from
/// a data source. It's generic over the reader type to support
/// both files on disk and in-memory images.
///
/// ## Example
///
/// ```ignore
/// let parser = ZipParser::new(reader);
/// let entries = parser.list_files()?;
/// for entry in entries {
///     let offset = parser.get_data_offset(&entry)?;
///     // Read file data from offset...
/// }
/// ```
pub struct ZipParser<R: ReadAt> {
    /// The underlying data source
    reader: R,
    /// Total size of the archive in bytes
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    /// Create a new parser for the given reader.
    pub fn new(reader: R) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// Unlike the splice locator, this honours the comment field: a
    /// candidate only counts if its comment length reaches exactly to the
    /// end of the file.
    ///
    /// # Returns
    ///
    /// A tuple of (EOCD record, offset of EOCD in file).
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::EocdNotFound`] if no valid EOCD can be found,
    /// indicating the file is not a valid ZIP archive.
    pub fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        // Optimization: First try the simple case where there's no comment.
        if self.size >= EndOfCentralDirectory::SIZE as u64 {
            let offset = self.size - EndOfCentralDirectory::SIZE as u64;
            let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
            self.reader
                .read_exact_at(offset, &mut buf, "end of central directory")?;

            if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && &buf[20..22] == b"\x00\x00" {
                let eocd = EndOfCentralDirectory::from_bytes(&buf)?;
                return Ok((eocd, offset));
            }
        }

        // EOCD not at expected location - it may precede a comment.
        let search_size = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE as u64).min(self.size);
        let search_start = self.size - search_size;

        let mut buf = vec![0u8; search_size as usize];
        self.reader
            .read_exact_at(search_start, &mut buf, "end of central directory")?;

        let Some(last) = buf.len().checked_sub(EndOfCentralDirectory::SIZE) else {
            return Err(FormatError::EocdNotFound.into());
        };
        for i in (0..=last).rev() {
            if &buf[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
                let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;

                if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                    let eocd = EndOfCentralDirectory::from_bytes(
                        &buf[i..i + EndOfCentralDirectory::SIZE],
                    )?;
                    return Ok((eocd, search_start + i as u64));
                }
            }
        }

        Err(FormatError::EocdNotFound.into())
    }

    /// Read the EOCD and check that the central directory it describes fits.
    fn central_directory(&self) -> Result<EndOfCentralDirectory> {
        let (eocd, eocd_offset) = self.find_eocd()?;
        if eocd.is_zip64() {
            return Err(Error::unsupported("ZIP64 archive"));
        }
        if eocd.disk_number != eocd.disk_with_cd || eocd.disk_entries != eocd.total_entries {
            return Err(Error::unsupported("multi-disk archive"));
        }

        let cd_end = eocd.cd_offset as u64 + eocd.cd_size as u64;
        if cd_end > eocd_offset {
            return Err(FormatError::CentralDirectoryOutOfBounds {
                cd_offset: eocd.cd_offset as u64,
                eocd_offset,
            }
            .into());
        }
        debug!(
            "EOCD at {eocd_offset:#x}: {} entries, central directory {:#x}..{cd_end:#x}",
            eocd.total_entries, eocd.cd_offset
        );
        Ok(eocd)
    }

    /// List all files in the ZIP archive, in central directory order.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive is invalid or cannot be read.
    pub fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        let eocd = self.central_directory()?;

        // Read the entire Central Directory in one go
        let mut cd_data = vec![0u8; eocd.cd_size as usize];
        self.reader
            .read_exact_at(eocd.cd_offset as u64, &mut cd_data, "central directory")?;

        let mut entries = Vec::with_capacity(eocd.total_entries as usize);
        let mut cursor = Cursor::new(cd_data.as_slice());

        for _ in 0..eocd.total_entries {
            let entry = self.parse_cdfh(&mut cursor, eocd.cd_offset as u64)?;
            entries.push(entry);
        }

        Ok(entries)
    }

    /// Parse a Central Directory File Header from a cursor.
    fn parse_cdfh(&self, cursor: &mut Cursor<&[u8]>, cd_offset: u64) -> Result<ZipFileEntry> {
        let record_offset = cd_offset + cursor.position();
        let remaining = cursor.get_ref().len() as u64 - cursor.position();
        if remaining < CDFH_MIN_SIZE as u64 {
            return Err(FormatError::TruncatedRecord("central directory file header").into());
        }

        // Read and verify the signature (PK\x01\x02)
        let mut sig = [0u8; 4];
        cursor.read_exact(&mut sig)?;
        if sig != CDFH_SIGNATURE {
            return Err(FormatError::InvalidSignature {
                record: "central directory file header",
                offset: record_offset,
            }
            .into());
        }

        let version_made_by = cursor.read_u16::<LittleEndian>()?;
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let _flags = cursor.read_u16::<LittleEndian>()?;
        let compression_method = cursor.read_u16::<LittleEndian>()?;
        let last_mod_time = cursor.read_u16::<LittleEndian>()?;
        let last_mod_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let compressed_size = cursor.read_u32::<LittleEndian>()?;
        let uncompressed_size = cursor.read_u32::<LittleEndian>()?;
        let file_name_length = cursor.read_u16::<LittleEndian>()?;
        let extra_field_length = cursor.read_u16::<LittleEndian>()?;
        let file_comment_length = cursor.read_u16::<LittleEndian>()?;
        let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
        let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
        let external_attrs = cursor.read_u32::<LittleEndian>()?;
        let lfh_offset = cursor.read_u32::<LittleEndian>()?;

        if compressed_size == u32::MAX || uncompressed_size == u32::MAX || lfh_offset == u32::MAX {
            return Err(Error::unsupported("ZIP64 entry"));
        }

        let mut file_name_bytes = vec![0u8; file_name_length as usize];
        cursor
            .read_exact(&mut file_name_bytes)
            .map_err(|_| FormatError::TruncatedRecord("central directory file name"))?;
        // Use lossy conversion to handle non-UTF8 filenames gracefully
        let file_name = String::from_utf8_lossy(&file_name_bytes).to_string();

        let mut extra = vec![0u8; extra_field_length as usize];
        cursor
            .read_exact(&mut extra)
            .map_err(|_| FormatError::TruncatedRecord("central directory extra field"))?;

        // Skip over the file comment (we don't use it)
        cursor.set_position(cursor.position() + file_comment_length as u64);

        // Upper byte 3 marks a Unix host; the mode lives in the high 16 bits
        let unix_mode = (version_made_by >> 8 == 3)
            .then_some(external_attrs >> 16)
            .filter(|&mode| mode != 0);

        Ok(ZipFileEntry {
            is_directory: file_name.ends_with('/'),
            file_name,
            compression_method: CompressionMethod::from_u16(compression_method),
            compressed_size: compressed_size as u64,
            uncompressed_size: uncompressed_size as u64,
            crc32,
            lfh_offset: lfh_offset as u64,
            last_mod_time,
            last_mod_date,
            unix_mtime: extended_mtime(&extra),
            unix_mode,
        })
    }

    /// Read the Local File Header at `offset`, with its name and extra field.
    pub fn read_local_header(&self, offset: u64) -> Result<(LocalFileHeader, String, Vec<u8>)> {
        let mut lfh_buf = [0u8; LFH_SIZE];
        self.reader
            .read_exact_at(offset, &mut lfh_buf, "local file header")?;
        let header = LocalFileHeader::from_bytes(&lfh_buf, offset)?;

        let mut variable = vec![0u8; header.variable_data_size() as usize];
        self.reader
            .read_exact_at(offset + LFH_SIZE as u64, &mut variable, "local file header")?;
        let extra = variable.split_off(header.file_name_length as usize);
        let name = String::from_utf8_lossy(&variable).to_string();

        Ok((header, name, extra))
    }

    /// Walk local file headers from the first entry up to the central directory.
    ///
    /// This sees every entry physically present, including ones that were
    /// spliced in without a central directory record. The walk starts at
    /// the lowest local header offset in the central directory. For an
    /// archive whose directory is empty it starts at the first local header
    /// signature whose chain of entries ends exactly at the directory, so
    /// signature bytes inside a leading stub are passed over.
    ///
    /// Indexed entries take their sizes from the central directory, which
    /// also covers entries whose sizes follow the data in a descriptor.
    pub fn local_entries(&self) -> Result<Vec<ZipFileEntry>> {
        let eocd = self.central_directory()?;
        let cd_offset = eocd.cd_offset as u64;
        let indexed = self.list_files()?;

        if let Some(first) = indexed.iter().map(|e| e.lfh_offset).min() {
            return self.walk_local(first, cd_offset, &indexed);
        }

        for start in self.local_signatures(cd_offset)? {
            match self.walk_local(start, cd_offset, &indexed) {
                Ok(entries) => return Ok(entries),
                Err(e) => debug!("no local header chain from {start:#x}: {e}"),
            }
        }
        Ok(Vec::new())
    }

    fn walk_local(
        &self,
        mut offset: u64,
        cd_offset: u64,
        indexed: &[ZipFileEntry],
    ) -> Result<Vec<ZipFileEntry>> {
        let mut entries = Vec::new();
        while offset < cd_offset {
            let (header, file_name, extra) = self.read_local_header(offset)?;
            let has_descriptor = header.flags & FLAG_DATA_DESCRIPTOR != 0;

            let entry = match indexed.iter().find(|e| e.lfh_offset == offset) {
                Some(central) => central.clone(),
                None if has_descriptor => {
                    return Err(Error::unsupported(format!(
                        "{file_name}: data descriptor without a central directory record"
                    )));
                }
                None => ZipFileEntry {
                    is_directory: file_name.ends_with('/'),
                    file_name,
                    compression_method: CompressionMethod::from_u16(header.compression_method),
                    compressed_size: header.compressed_size as u64,
                    uncompressed_size: header.uncompressed_size as u64,
                    crc32: header.crc32,
                    lfh_offset: offset,
                    last_mod_time: header.last_mod_time,
                    last_mod_date: header.last_mod_date,
                    unix_mtime: extended_mtime(&extra),
                    unix_mode: None,
                },
            };

            let mut next = offset
                + LFH_SIZE as u64
                + header.variable_data_size()
                + entry.compressed_size;
            if has_descriptor {
                next += self.data_descriptor_len(next)?;
            }
            entries.push(entry);
            offset = next;
        }

        if offset != cd_offset {
            return Err(FormatError::TruncatedRecord("local file entry").into());
        }
        Ok(entries)
    }

    /// Length of the data descriptor at `offset`; its signature is optional.
    fn data_descriptor_len(&self, offset: u64) -> Result<u64> {
        let mut sig = [0u8; 4];
        self.reader
            .read_exact_at(offset, &mut sig, "data descriptor")?;
        Ok(if sig == DATA_DESCRIPTOR_SIGNATURE {
            DATA_DESCRIPTOR_SIZE as u64
        } else {
            DATA_DESCRIPTOR_SIZE as u64 - 4
        })
    }

    /// Every position of `PK\x03\x04` in `[0, end)`.
    fn local_signatures(&self, end: u64) -> Result<Vec<u64>> {
        let mut data = vec![0u8; end as usize];
        self.reader.read_exact_at(0, &mut data, "archive prefix")?;
        Ok(data
            .windows(LFH_SIGNATURE.len())
            .enumerate()
            .filter(|(_, w)| *w == LFH_SIGNATURE)
            .map(|(p, _)| p as u64)
            .collect())
    }

    /// Get the actual data offset for a file entry.
    ///
    /// The Local File Header (LFH) has variable-length fields (filename,
    /// extra field) that may differ from the Central Directory entry.
    /// This method reads the LFH to calculate where the actual file
    /// data begins.
    pub fn get_data_offset(&self, entry: &ZipFileEntry) -> Result<u64> {
        let mut lfh_buf = [0u8; LFH_SIZE];
        self.reader
            .read_exact_at(entry.lfh_offset, &mut lfh_buf, "local file header")?;
        let header = LocalFileHeader::from_bytes(&lfh_buf, entry.lfh_offset)?;

        // Data starts after: LFH (30 bytes) + filename + extra field
        Ok(entry.lfh_offset + LFH_SIZE as u64 + header.variable_data_size())
    }

    /// Get a reference to the underlying reader.
    pub fn reader(&self) -> &R {
        &self.reader
    }
}
