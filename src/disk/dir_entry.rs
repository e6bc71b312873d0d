use chrono::{Datelike, Local, Timelike};

use super::DIR_ENTRY_SIZE;
use crate::codec::Field;
use crate::error::{FsError, Result};

/// Directory entry attribute bits.
pub mod attr {
    pub const READ_ONLY: u8 = 0x01;
    pub const HIDDEN: u8 = 0x02;
    pub const SYSTEM: u8 = 0x04;
    pub const VOLUME_ID: u8 = 0x08;
    pub const DIRECTORY: u8 = 0x10;
    pub const ARCHIVE: u8 = 0x20;
    pub const LONG_NAME: u8 = READ_ONLY | HIDDEN | SYSTEM | VOLUME_ID;
}

const NAME: Field = Field::ascii("name", 0, 11);
const ATTR: Field = Field::int("attr", 11, 1);
const NT_RES: Field = Field::int("nt_res", 12, 1);
const CREATION_TIME_TENTH: Field = Field::int("creation_time_tenth", 13, 1);
const CREATION_TIME: Field = Field::int("creation_time", 14, 1);
const CREATION_DATE: Field = Field::int("creation_date", 16, 2);
const LAST_ACCESSED_DATE: Field = Field::int("last_accessed_date", 18, 2);
const FIRST_CLUSTER_HI: Field = Field::int("first_cluster_hi", 20, 2);
const MODIFIED_TIME: Field = Field::int("modified_time", 22, 2);
const MODIFIED_DATE: Field = Field::int("modified_date", 24, 2);
const FIRST_CLUSTER_LO: Field = Field::int("first_cluster_lo", 26, 2);
const FILE_SIZE: Field = Field::int("file_size", 28, 4);

/// Schema of one 32-byte directory entry.
pub const DIR_ENTRY_FIELDS: [Field; 12] = [
    NAME,
    ATTR,
    NT_RES,
    CREATION_TIME_TENTH,
    CREATION_TIME,
    CREATION_DATE,
    LAST_ACCESSED_DATE,
    FIRST_CLUSTER_HI,
    MODIFIED_TIME,
    MODIFIED_DATE,
    FIRST_CLUSTER_LO,
    FILE_SIZE,
];

/// Timestamp words stored into a new directory entry, already in the
/// on-disk FAT encodings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timestamp {
    pub creation_time_tenth: u8,
    pub creation_time: u8,
    pub creation_date: u16,
    pub last_accessed_date: u16,
    pub modified_time: u16,
    pub modified_date: u16,
}

impl Timestamp {
    /// Captures the current wall clock in FAT date/time encoding.
    pub fn now() -> Self {
        let now = Local::now();
        let date = fat_date(now.year(), now.month(), now.day());
        let time = fat_time(now.hour(), now.minute(), now.second());
        Timestamp {
            creation_time_tenth: 0,
            creation_time: time as u8,
            creation_date: date,
            last_accessed_date: date,
            modified_time: time,
            modified_date: date,
        }
    }
}

/// Packs a date into the FAT word: years since 1980 (7 bits), month
/// (4 bits), day (5 bits).
fn fat_date(year: i32, month: u32, day: u32) -> u16 {
    let years = (year - 1980).clamp(0, 127) as u16;
    (years << 9) | ((month as u16) << 5) | (day as u16)
}

/// Packs a time into the FAT word: hours (5 bits), minutes (6 bits),
/// seconds / 2 (5 bits).
fn fat_time(hour: u32, minute: u32, second: u32) -> u16 {
    ((hour as u16) << 11) | ((minute as u16) << 5) | ((second as u16) >> 1)
}

/// One 32-byte directory entry. The name is the full 11-byte space-padded
/// 8.3 field; comparisons are by exact form. An entry with a zero
/// attribute byte is a free slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: [u8; 11],
    pub attr: u8,
    pub nt_res: u8,
    pub creation_time_tenth: u8,
    pub creation_time: u8,
    pub creation_date: u16,
    pub last_accessed_date: u16,
    pub first_cluster_hi: u16,
    pub modified_time: u16,
    pub modified_date: u16,
    pub first_cluster_lo: u16,
    pub file_size: u32,
}

impl DirEntry {
    pub fn new(name: [u8; 11], attr: u8, cluster: u16, stamp: &Timestamp) -> Self {
        DirEntry {
            name,
            attr,
            nt_res: 0,
            creation_time_tenth: stamp.creation_time_tenth,
            creation_time: stamp.creation_time,
            creation_date: stamp.creation_date,
            last_accessed_date: stamp.last_accessed_date,
            first_cluster_hi: 0,
            modified_time: stamp.modified_time,
            modified_date: stamp.modified_date,
            first_cluster_lo: cluster,
            file_size: 0,
        }
    }

    pub fn from_bytes(data: &[u8]) -> Self {
        debug_assert!(data.len() >= DIR_ENTRY_SIZE);
        let mut name = [0u8; 11];
        name.copy_from_slice(NAME.get_bytes(data));

        DirEntry {
            name,
            attr: ATTR.get(data) as u8,
            nt_res: NT_RES.get(data) as u8,
            creation_time_tenth: CREATION_TIME_TENTH.get(data) as u8,
            creation_time: CREATION_TIME.get(data) as u8,
            creation_date: CREATION_DATE.get(data) as u16,
            last_accessed_date: LAST_ACCESSED_DATE.get(data) as u16,
            first_cluster_hi: FIRST_CLUSTER_HI.get(data) as u16,
            modified_time: MODIFIED_TIME.get(data) as u16,
            modified_date: MODIFIED_DATE.get(data) as u16,
            first_cluster_lo: FIRST_CLUSTER_LO.get(data) as u16,
            file_size: FILE_SIZE.get(data) as u32,
        }
    }

    pub fn to_bytes(&self) -> [u8; DIR_ENTRY_SIZE] {
        let mut bytes = [0u8; DIR_ENTRY_SIZE];
        NAME.put_bytes(&mut bytes, &self.name);
        ATTR.put(&mut bytes, self.attr as u64);
        NT_RES.put(&mut bytes, self.nt_res as u64);
        CREATION_TIME_TENTH.put(&mut bytes, self.creation_time_tenth as u64);
        CREATION_TIME.put(&mut bytes, self.creation_time as u64);
        CREATION_DATE.put(&mut bytes, self.creation_date as u64);
        LAST_ACCESSED_DATE.put(&mut bytes, self.last_accessed_date as u64);
        FIRST_CLUSTER_HI.put(&mut bytes, self.first_cluster_hi as u64);
        MODIFIED_TIME.put(&mut bytes, self.modified_time as u64);
        MODIFIED_DATE.put(&mut bytes, self.modified_date as u64);
        FIRST_CLUSTER_LO.put(&mut bytes, self.first_cluster_lo as u64);
        FILE_SIZE.put(&mut bytes, self.file_size as u64);
        bytes
    }

    pub fn is_free(&self) -> bool {
        self.attr == 0
    }

    pub fn is_directory(&self) -> bool {
        self.attr & attr::DIRECTORY != 0
    }

    /// Human-readable `NAME.EXT` form with the padding stripped.
    pub fn display_name(&self) -> String {
        display_name(&self.name)
    }
}

/// Renders an 11-byte name field as `NAME.EXT`, dropping the padding.
pub fn display_name(name: &[u8; 11]) -> String {
    let base = String::from_utf8_lossy(&name[..8]).trim_end().to_string();
    let ext = String::from_utf8_lossy(&name[8..]).trim_end().to_string();
    if ext.is_empty() {
        base
    } else {
        format!("{}.{}", base, ext)
    }
}

/// Normalizes a path segment to the 11-byte space-padded, upper-cased 8.3
/// name field. `.` and `..` keep their literal forms.
pub fn short_name(name: &str) -> Result<[u8; 11]> {
    let mut out = [b' '; 11];

    if name == "." || name == ".." {
        out[..name.len()].copy_from_slice(name.as_bytes());
        return Ok(out);
    }

    let (base, ext) = match name.rsplit_once('.') {
        Some((base, ext)) => (base, ext),
        None => (name, ""),
    };

    if base.is_empty() || base.len() > 8 || ext.len() > 3 || base.contains('.') {
        return Err(FsError::InvalidName(name.to_string()));
    }
    if !is_8_3_part(base) || (!ext.is_empty() && !is_8_3_part(ext)) {
        return Err(FsError::InvalidName(name.to_string()));
    }

    for (i, byte) in base.bytes().enumerate() {
        out[i] = byte.to_ascii_uppercase();
    }
    for (i, byte) in ext.bytes().enumerate() {
        out[8 + i] = byte.to_ascii_uppercase();
    }
    Ok(out)
}

fn is_8_3_part(part: &str) -> bool {
    part.bytes()
        .all(|b| b.is_ascii_graphic() && b != b'/' && b != b'\\' && b != b'.')
}
