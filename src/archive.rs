//! Path-level archive operations.

use std::path::{Path, PathBuf};

use log::debug;

use crate::error::Result;
use crate::io::LocalFileReader;
use crate::zip::{
    AppendEntry, ArchiveSplicer, SpliceReport, ZipExtractor, ZipParser, create_archive,
};

/// What [`create_or_append_archive`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// A new archive was written at the end of the file.
    Created,
    /// Entries were spliced into an existing archive.
    Appended(SpliceReport),
}

/// True if the file at `path` parses as a ZIP archive.
pub fn is_archive(path: &Path) -> bool {
    let Ok(reader) = LocalFileReader::new(path) else {
        return false;
    };
    match ZipParser::new(reader).list_files() {
        Ok(_) => true,
        Err(e) => {
            debug!("{} is not an archive: {e}", path.display());
            false
        }
    }
}

/// Create a new archive from `sources`, or splice them into an existing one.
///
/// When `path` is not already an archive every source is walked recursively
/// and written after whatever bytes the file already holds. Otherwise each
/// source is spliced in under its base name; directories and unreadable
/// files are skipped.
pub fn create_or_append_archive<P: AsRef<Path>>(
    path: &Path,
    sources: &[P],
) -> Result<ArchiveOutcome> {
    create_or_append_entries(path, sources, &[], &ArchiveSplicer::new())
}

/// Like [`create_or_append_archive`], plus `named` entries stored under
/// their own names on either path.
///
/// Named entries follow the sources. When creating, an unreadable named
/// entry fails the whole operation; when splicing it is skipped.
pub fn create_or_append_entries<P: AsRef<Path>>(
    path: &Path,
    sources: &[P],
    named: &[AppendEntry],
    splicer: &ArchiveSplicer,
) -> Result<ArchiveOutcome> {
    if is_archive(path) {
        let entries: Vec<_> = sources
            .iter()
            .map(|p| AppendEntry::from_path(p.as_ref()))
            .chain(named.iter().cloned())
            .collect();
        return Ok(ArchiveOutcome::Appended(splicer.append(path, &entries)?));
    }

    create_archive(path, sources, named)?;
    Ok(ArchiveOutcome::Created)
}

/// Extract every entry of the archive at `archive` below `destination`.
pub fn extract_archive(archive: &Path, destination: &Path) -> Result<Vec<PathBuf>> {
    let extractor = ZipExtractor::new(LocalFileReader::new(archive)?);
    extractor.extract_all(destination)
}

/// Entry names in central directory order.
pub fn list_archive_entries(path: &Path) -> Result<Vec<String>> {
    let parser = ZipParser::new(LocalFileReader::new(path)?);
    Ok(parser
        .list_files()?
        .into_iter()
        .map(|e| e.file_name)
        .collect())
}

/// Entry names in on-disk order, including spliced entries.
pub fn list_local_entries(path: &Path) -> Result<Vec<String>> {
    let parser = ZipParser::new(LocalFileReader::new(path)?);
    Ok(parser
        .local_entries()?
        .into_iter()
        .map(|e| e.file_name)
        .collect())
}
