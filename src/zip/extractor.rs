use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use filetime::FileTime;
use flate2::Crc;
use flate2::read::DeflateDecoder;
use log::debug;

use crate::error::{Error, FormatError, Result};
use crate::io::ReadAt;

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// ZIP file extractor
pub struct ZipExtractor<R: ReadAt> {
    parser: ZipParser<R>,
}

impl<R: ReadAt> ZipExtractor<R> {
    pub fn new(reader: R) -> Self {
        Self {
            parser: ZipParser::new(reader),
        }
    }

    pub fn parser(&self) -> &ZipParser<R> {
        &self.parser
    }

    /// List all files in the archive
    pub fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        self.parser.list_files()
    }

    /// Extract file data to memory, verifying its CRC-32
    pub fn extract_to_memory(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        let data_offset = self.parser.get_data_offset(entry)?;

        let mut raw = vec![0u8; entry.compressed_size as usize];
        self.parser
            .reader()
            .read_exact_at(data_offset, &mut raw, "entry data")?;

        let data = match entry.compression_method {
            CompressionMethod::Stored => raw,
            CompressionMethod::Deflate => {
                let mut out = Vec::with_capacity(entry.uncompressed_size as usize);
                DeflateDecoder::new(raw.as_slice()).read_to_end(&mut out)?;
                out
            }
            CompressionMethod::Unknown(method) => {
                return Err(Error::unsupported(format!(
                    "compression method {method} for {}",
                    entry.file_name
                )));
            }
        };

        let mut crc = Crc::new();
        crc.update(&data);
        if crc.sum() != entry.crc32 {
            return Err(FormatError::ChecksumMismatch {
                name: entry.file_name.clone(),
                expected: entry.crc32,
                actual: crc.sum(),
            }
            .into());
        }

        Ok(data)
    }

    /// Extract one entry below `destination`, creating parent directories.
    ///
    /// Returns the path written.
    pub fn extract_entry(&self, entry: &ZipFileEntry, destination: &Path) -> Result<PathBuf> {
        let output_path = destination.join(sanitized_path(&entry.file_name)?);

        if entry.is_directory {
            fs::create_dir_all(&output_path)?;
            set_permissions(&output_path, entry.unix_mode)?;
            return Ok(output_path);
        }

        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let data = self.extract_to_memory(entry)?;
        fs::write(&output_path, &data)?;
        set_permissions(&output_path, entry.unix_mode)?;

        if let Some(secs) = entry.modified() {
            let mtime = FileTime::from_unix_time(secs, 0);
            filetime::set_file_times(&output_path, mtime, mtime)?;
        }
        debug!("extracted {} ({} bytes)", output_path.display(), data.len());

        Ok(output_path)
    }

    /// Extract every central directory entry below `destination`
    pub fn extract_all(&self, destination: &Path) -> Result<Vec<PathBuf>> {
        self.list_files()?
            .iter()
            .map(|entry| self.extract_entry(entry, destination))
            .collect()
    }
}

/// Turn an entry name into a relative path that stays inside the destination.
fn sanitized_path(name: &str) -> Result<PathBuf> {
    let path = Path::new(name);
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(FormatError::UnsafePath(name.to_string()).into());
            }
        }
    }
    if out.as_os_str().is_empty() {
        return Err(FormatError::UnsafePath(name.to_string()).into());
    }
    Ok(out)
}

#[cfg(unix)]
fn set_permissions(path: &Path, mode: Option<u32>) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    if let Some(mode) = mode {
        fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_permissions(_path: &Path, _mode: Option<u32>) -> Result<()> {
    Ok(())
}
