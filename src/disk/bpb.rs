use super::SECTOR_SIZE;
use crate::codec::Field;

const JUMP_BOOT: Field = Field::int("jump_boot", 0, 3);
const OEM_NAME: Field = Field::ascii("oem_name", 3, 8);
const BYTES_PER_SECTOR: Field = Field::int("bytes_per_sector", 11, 2);
const SECTORS_PER_CLUSTER: Field = Field::int("sectors_per_cluster", 13, 1);
const RESERVED_SECTORS: Field = Field::int("reserved_sectors", 14, 2);
const N_FATS: Field = Field::int("n_fats", 16, 1);
const ROOT_ENTRIES: Field = Field::int("root_entries", 17, 2);
const SMALL_SECTOR_COUNT: Field = Field::int("small_sector_count", 19, 2);
const MEDIA_DESCRIPTOR: Field = Field::int("media_descriptor", 21, 1);
const SECTORS_PER_FAT16: Field = Field::int("sectors_per_fat16", 22, 2);
const SECTORS_PER_TRACK: Field = Field::int("sectors_per_track", 24, 2);
const N_HEADS: Field = Field::int("n_heads", 26, 2);
const HIDDEN_SECTORS: Field = Field::int("hidden_sectors", 28, 2);
const LARGE_SECTOR_COUNT: Field = Field::int("large_sector_count", 32, 4);

const DRIVE_NUMBER: Field = Field::int("drive_number", 36, 1);
const NT_FLAGS: Field = Field::int("nt_flags", 37, 1);
const SIGNATURE: Field = Field::int("signature", 38, 1);
const VOLUME_ID: Field = Field::int("volume_id", 39, 4);
const VOLUME_LABEL: Field = Field::ascii("volume_label", 43, 11);
const SYSTEM_IDENTIFIER: Field = Field::ascii("system_identifier", 54, 8);

/// Schema of the classic BPB fields.
pub const BPB_FIELDS: [Field; 14] = [
    JUMP_BOOT,
    OEM_NAME,
    BYTES_PER_SECTOR,
    SECTORS_PER_CLUSTER,
    RESERVED_SECTORS,
    N_FATS,
    ROOT_ENTRIES,
    SMALL_SECTOR_COUNT,
    MEDIA_DESCRIPTOR,
    SECTORS_PER_FAT16,
    SECTORS_PER_TRACK,
    N_HEADS,
    HIDDEN_SECTORS,
    LARGE_SECTOR_COUNT,
];

/// Schema of the FAT16 extended fields at offsets 36..62.
pub const BPB_EXT_FIELDS: [Field; 6] = [
    DRIVE_NUMBER,
    NT_FLAGS,
    SIGNATURE,
    VOLUME_ID,
    VOLUME_LABEL,
    SYSTEM_IDENTIFIER,
];

/// BIOS parameter block of a FAT16 volume, parsed from the first sector of
/// its partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BiosParameterBlock {
    pub jump_boot: [u8; 3],
    pub oem_name: [u8; 8],
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub n_fats: u8,
    pub root_entries: u16,
    pub small_sector_count: u16,
    pub media_descriptor: u8,
    pub sectors_per_fat16: u16,
    pub sectors_per_track: u16,
    pub n_heads: u16,
    pub hidden_sectors: u16,
    pub large_sector_count: u32,
    pub drive_number: u8,
    pub nt_flags: u8,
    pub signature: u8,
    pub volume_id: u32,
    pub volume_label: [u8; 11],
    pub system_identifier: [u8; 8],
}

impl BiosParameterBlock {
    /// Builds a BPB with conventional defaults for everything the caller
    /// does not control.
    pub fn new(
        sectors_per_cluster: u8,
        reserved_sectors: u16,
        n_fats: u8,
        root_entries: u16,
        small_sector_count: u16,
        media_descriptor: u8,
        sectors_per_fat16: u16,
    ) -> Self {
        BiosParameterBlock {
            jump_boot: [0xEB, 0x3C, 0x90],
            oem_name: *b"MSWIN4.1",
            bytes_per_sector: SECTOR_SIZE as u16,
            sectors_per_cluster,
            reserved_sectors,
            n_fats,
            root_entries,
            small_sector_count,
            media_descriptor,
            sectors_per_fat16,
            sectors_per_track: 63,
            n_heads: 16,
            hidden_sectors: 0,
            large_sector_count: 0,
            drive_number: 0x80,
            nt_flags: 0,
            signature: 0x29,
            volume_id: 0,
            volume_label: *b"NO NAME    ",
            system_identifier: *b"FAT16   ",
        }
    }

    pub fn from_sector(data: &[u8]) -> Result<Self, String> {
        if data.len() < 62 {
            return Err(format!("boot sector too short: {} bytes", data.len()));
        }

        let mut jump_boot = [0u8; 3];
        jump_boot.copy_from_slice(JUMP_BOOT.get_bytes(data));
        let mut oem_name = [0u8; 8];
        oem_name.copy_from_slice(OEM_NAME.get_bytes(data));
        let mut volume_label = [0u8; 11];
        volume_label.copy_from_slice(VOLUME_LABEL.get_bytes(data));
        let mut system_identifier = [0u8; 8];
        system_identifier.copy_from_slice(SYSTEM_IDENTIFIER.get_bytes(data));

        Ok(BiosParameterBlock {
            jump_boot,
            oem_name,
            bytes_per_sector: BYTES_PER_SECTOR.get(data) as u16,
            sectors_per_cluster: SECTORS_PER_CLUSTER.get(data) as u8,
            reserved_sectors: RESERVED_SECTORS.get(data) as u16,
            n_fats: N_FATS.get(data) as u8,
            root_entries: ROOT_ENTRIES.get(data) as u16,
            small_sector_count: SMALL_SECTOR_COUNT.get(data) as u16,
            media_descriptor: MEDIA_DESCRIPTOR.get(data) as u8,
            sectors_per_fat16: SECTORS_PER_FAT16.get(data) as u16,
            sectors_per_track: SECTORS_PER_TRACK.get(data) as u16,
            n_heads: N_HEADS.get(data) as u16,
            hidden_sectors: HIDDEN_SECTORS.get(data) as u16,
            large_sector_count: LARGE_SECTOR_COUNT.get(data) as u32,
            drive_number: DRIVE_NUMBER.get(data) as u8,
            nt_flags: NT_FLAGS.get(data) as u8,
            signature: SIGNATURE.get(data) as u8,
            volume_id: VOLUME_ID.get(data) as u32,
            volume_label,
            system_identifier,
        })
    }

    /// Serializes a full boot sector: the BPB fields plus the 0x55AA
    /// signature at offset 510.
    pub fn to_bytes(&self) -> [u8; SECTOR_SIZE] {
        let mut data = [0u8; SECTOR_SIZE];

        JUMP_BOOT.put_bytes(&mut data, &self.jump_boot);
        OEM_NAME.put_bytes(&mut data, &self.oem_name);
        BYTES_PER_SECTOR.put(&mut data, self.bytes_per_sector as u64);
        SECTORS_PER_CLUSTER.put(&mut data, self.sectors_per_cluster as u64);
        RESERVED_SECTORS.put(&mut data, self.reserved_sectors as u64);
        N_FATS.put(&mut data, self.n_fats as u64);
        ROOT_ENTRIES.put(&mut data, self.root_entries as u64);
        SMALL_SECTOR_COUNT.put(&mut data, self.small_sector_count as u64);
        MEDIA_DESCRIPTOR.put(&mut data, self.media_descriptor as u64);
        SECTORS_PER_FAT16.put(&mut data, self.sectors_per_fat16 as u64);
        SECTORS_PER_TRACK.put(&mut data, self.sectors_per_track as u64);
        N_HEADS.put(&mut data, self.n_heads as u64);
        HIDDEN_SECTORS.put(&mut data, self.hidden_sectors as u64);
        LARGE_SECTOR_COUNT.put(&mut data, self.large_sector_count as u64);

        DRIVE_NUMBER.put(&mut data, self.drive_number as u64);
        NT_FLAGS.put(&mut data, self.nt_flags as u64);
        SIGNATURE.put(&mut data, self.signature as u64);
        VOLUME_ID.put(&mut data, self.volume_id as u64);
        VOLUME_LABEL.put_bytes(&mut data, &self.volume_label);
        SYSTEM_IDENTIFIER.put_bytes(&mut data, &self.system_identifier);

        data[SECTOR_SIZE - 2] = 0x55;
        data[SECTOR_SIZE - 1] = 0xAA;
        data
    }
}
