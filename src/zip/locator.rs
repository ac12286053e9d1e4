//! End of central directory lookup over an in-memory archive image.

use log::debug;

use super::structures::EndOfCentralDirectory;
use crate::error::{Error, FormatError, Result};

/// Where the EOCD sits and what central directory offset it records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EocdLocation {
    /// Byte offset of the `PK\x05\x06` signature.
    pub eocd_offset: usize,
    /// Start of the central directory as recorded in the EOCD.
    pub cd_offset: u32,
}

impl EocdLocation {
    /// Byte range of the central directory offset field within the image.
    pub fn cd_offset_field(&self) -> std::ops::Range<usize> {
        let start = self.eocd_offset + EndOfCentralDirectory::CD_OFFSET_FIELD;
        start..start + 4
    }
}

/// Scan backward from `len - 4` for the EOCD signature.
///
/// The last occurrence counts: compressed data earlier in the file may contain
/// the same four bytes by chance. A comment holding the signature is not
/// detected.
pub fn locate_eocd(image: &[u8]) -> Result<EocdLocation> {
    let sig = EndOfCentralDirectory::SIGNATURE;
    let Some(last) = image.len().checked_sub(sig.len()) else {
        return Err(FormatError::EocdNotFound.into());
    };

    let eocd_offset = (0..=last)
        .rev()
        .find(|&i| &image[i..i + sig.len()] == sig)
        .ok_or(FormatError::EocdNotFound)?;
    debug!("found EOCD record at {eocd_offset:#x}");

    let field_start = eocd_offset + EndOfCentralDirectory::CD_OFFSET_FIELD;
    let field = image
        .get(field_start..field_start + 4)
        .ok_or(FormatError::TruncatedRecord("end of central directory"))?;
    let cd_offset = u32::from_le_bytes([field[0], field[1], field[2], field[3]]);

    if cd_offset == u32::MAX {
        return Err(Error::unsupported("ZIP64 central directory offset"));
    }
    if cd_offset as usize > eocd_offset {
        return Err(FormatError::CentralDirectoryOutOfBounds {
            cd_offset: cd_offset as u64,
            eocd_offset: eocd_offset as u64,
        }
        .into());
    }
    debug!("central directory recorded at {cd_offset:#x}");

    Ok(EocdLocation {
        eocd_offset,
        cd_offset,
    })
}
