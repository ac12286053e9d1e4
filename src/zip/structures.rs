use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use crate::error::{FormatError, Result};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
#[derive(Debug, Clone, Copy)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;
    /// Displacement of the central directory offset field from the signature.
    pub const CD_OFFSET_FIELD: usize = 16;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(FormatError::TruncatedRecord("end of central directory").into());
        }

        if &data[0..4] != Self::SIGNATURE {
            return Err(FormatError::InvalidSignature {
                record: "end of central directory",
                offset: 0,
            }
            .into());
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    pub fn is_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFFFFFF
            || self.cd_offset == 0xFFFFFFFF
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// Version needed to extract: 2.0, deflate and directories.
pub const VERSION_NEEDED: u16 = 0x0014;
/// Version made by: Unix host, ZIP 2.0. Makes the external attributes carry a mode.
pub const VERSION_MADE_BY: u16 = 0x0314;

/// General purpose flag bit 3: sizes and CRC follow the data in a descriptor.
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
/// Optional signature in front of a data descriptor.
pub const DATA_DESCRIPTOR_SIGNATURE: &[u8] = b"PK\x07\x08";
/// Signature, CRC-32 and both 32-bit sizes.
pub const DATA_DESCRIPTOR_SIZE: usize = 16;

/// Extended timestamp extra field ("UT").
pub const EXTENDED_TIMESTAMP_TAG: u16 = 0x5455;
/// Tag, size, flags and one 32-bit modification time.
pub const EXTENDED_TIMESTAMP_LEN: usize = 9;

/// Fixed-size fields of a Local File Header, after the signature.
#[derive(Debug, Clone, Copy)]
pub struct LocalFileHeader {
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name_length: u16,
    pub extra_field_length: u16,
}

impl LocalFileHeader {
    pub fn from_bytes(data: &[u8], offset: u64) -> Result<Self> {
        if data.len() < LFH_SIZE {
            return Err(FormatError::TruncatedRecord("local file header").into());
        }
        if &data[0..4] != LFH_SIGNATURE {
            return Err(FormatError::InvalidSignature {
                record: "local file header",
                offset,
            }
            .into());
        }

        let mut cursor = Cursor::new(&data[4..LFH_SIZE]);
        Ok(Self {
            version_needed: cursor.read_u16::<LittleEndian>()?,
            flags: cursor.read_u16::<LittleEndian>()?,
            compression_method: cursor.read_u16::<LittleEndian>()?,
            last_mod_time: cursor.read_u16::<LittleEndian>()?,
            last_mod_date: cursor.read_u16::<LittleEndian>()?,
            crc32: cursor.read_u32::<LittleEndian>()?,
            compressed_size: cursor.read_u32::<LittleEndian>()?,
            uncompressed_size: cursor.read_u32::<LittleEndian>()?,
            file_name_length: cursor.read_u16::<LittleEndian>()?,
            extra_field_length: cursor.read_u16::<LittleEndian>()?,
        })
    }

    /// Total variable-length data size following this header.
    pub fn variable_data_size(&self) -> u64 {
        self.file_name_length as u64 + self.extra_field_length as u64
    }
}

/// Find the modification time in an extended timestamp extra field, if any.
pub fn extended_mtime(extra: &[u8]) -> Option<u32> {
    let mut cursor = Cursor::new(extra);
    while (cursor.position() as usize) + 4 <= extra.len() {
        let tag = cursor.read_u16::<LittleEndian>().ok()?;
        let size = cursor.read_u16::<LittleEndian>().ok()? as u64;
        let start = cursor.position();
        if tag == EXTENDED_TIMESTAMP_TAG && size >= 5 {
            let flags = cursor.read_u8().ok()?;
            if flags & 1 != 0 {
                return cursor.read_u32::<LittleEndian>().ok();
            }
        }
        cursor.set_position(start + size);
    }
    None
}

/// Parsed ZIP file entry information
#[derive(Debug, Clone)]
pub struct ZipFileEntry {
    pub file_name: String,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub lfh_offset: u64,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    /// Unix seconds from the extended timestamp extra field.
    pub unix_mtime: Option<u32>,
    /// Unix permission bits, when the entry was made on a Unix host.
    pub unix_mode: Option<u32>,
    pub is_directory: bool,
}

impl ZipFileEntry {
    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }

    /// Modification time as Unix seconds.
    ///
    /// Prefers the extended timestamp; otherwise reads the DOS fields as UTC.
    /// Returns `None` when neither holds a valid time.
    pub fn modified(&self) -> Option<i64> {
        if let Some(secs) = self.unix_mtime {
            return Some(secs as i64);
        }
        let (year, month, day) = self.mod_date();
        let (hour, minute, second) = self.mod_time();
        let dt = jiff::civil::DateTime::new(
            year as i16,
            month as i8,
            day as i8,
            hour as i8,
            minute as i8,
            second as i8,
            0,
        )
        .ok()?;
        let zoned = dt.to_zoned(jiff::tz::TimeZone::UTC).ok()?;
        Some(zoned.timestamp().as_second())
    }
}

/// Earliest DOS timestamp, 1980-01-01 00:00:00.
const DOS_MIN: (u16, u16) = (0, (1 << 5) | 1);
/// Latest DOS timestamp, 2107-12-31 23:59:58.
const DOS_MAX: (u16, u16) = ((23 << 11) | (59 << 5) | 29, (127 << 9) | (12 << 5) | 31);

/// Encode Unix seconds as DOS (time, date), UTC.
///
/// The format covers 1980 through 2107; times outside clamp to the nearest end.
pub fn dos_datetime(unix_secs: i64) -> (u16, u16) {
    let Ok(ts) = jiff::Timestamp::from_second(unix_secs) else {
        return if unix_secs < 0 { DOS_MIN } else { DOS_MAX };
    };
    let dt = ts.to_zoned(jiff::tz::TimeZone::UTC).datetime();
    if dt.year() < 1980 {
        return DOS_MIN;
    }
    if dt.year() > 2107 {
        return DOS_MAX;
    }
    let time = ((dt.hour() as u16) << 11) | ((dt.minute() as u16) << 5) | (dt.second() as u16 / 2);
    let date = (((dt.year() - 1980) as u16) << 9) | ((dt.month() as u16) << 5) | dt.day() as u16;
    (time, date)
}
