use std::fmt;

use super::{DirectoryDescriptor, FIRST_DATA_CLUSTER};
use crate::disk::{attr, BiosParameterBlock, Partition, SectorStore, DIR_ENTRY_SIZE};
use crate::error::{FsError, Result};

/// Sector arithmetic of one mounted volume, derived from the BPB once at
/// mount. All values are absolute sector indices into the image except
/// the counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub bytes_per_sector: u32,
    pub sectors_per_cluster: u32,
    pub total_sectors: u32,
    pub sectors_per_fat: u32,
    pub n_fats: u32,
    pub root_dir_sectors: u32,
    pub data_sectors: u32,
    pub n_clusters: u32,
    pub first_fat_sector: u32,
    pub first_root_dir_sector: u32,
    pub first_data_sector: u32,
}

impl Geometry {
    pub fn from_bpb(bpb: &BiosParameterBlock, partition_start: u32) -> std::result::Result<Self, String> {
        let bytes_per_sector = bpb.bytes_per_sector as u32;
        let sectors_per_cluster = bpb.sectors_per_cluster as u32;
        let total_sectors = bpb.small_sector_count as u32;
        let sectors_per_fat = bpb.sectors_per_fat16 as u32;
        let n_fats = bpb.n_fats as u32;

        if bytes_per_sector == 0 || sectors_per_cluster == 0 || sectors_per_fat == 0 {
            return Err("zero-valued geometry field".to_string());
        }

        let root_dir_sectors =
            (bpb.root_entries as u32 * DIR_ENTRY_SIZE as u32).div_ceil(bytes_per_sector);
        let overhead = bpb.reserved_sectors as u32 + n_fats * sectors_per_fat + root_dir_sectors;
        let data_sectors = total_sectors
            .checked_sub(overhead)
            .ok_or_else(|| format!("{} overhead sectors exceed {} total", overhead, total_sectors))?;

        let first_fat_sector = partition_start + bpb.reserved_sectors as u32;
        let first_root_dir_sector = first_fat_sector + n_fats * sectors_per_fat;
        let first_data_sector = first_root_dir_sector + root_dir_sectors;

        Ok(Geometry {
            bytes_per_sector,
            sectors_per_cluster,
            total_sectors,
            sectors_per_fat,
            n_fats,
            root_dir_sectors,
            data_sectors,
            n_clusters: data_sectors / sectors_per_cluster,
            first_fat_sector,
            first_root_dir_sector,
            first_data_sector,
        })
    }

    /// First absolute sector of data cluster `cluster`. Defined for
    /// cluster numbers >= 2 only.
    pub fn first_sector_of_cluster(&self, cluster: u16) -> u32 {
        debug_assert!(cluster >= FIRST_DATA_CLUSTER);
        (cluster as u32 - 2) * self.sectors_per_cluster + self.first_data_sector
    }

    /// Whether `cluster` names a cluster inside the data region.
    pub fn is_data_cluster(&self, cluster: u16) -> bool {
        (FIRST_DATA_CLUSTER as u32..self.n_clusters + 2).contains(&(cluster as u32))
    }
}

/// One mounted FAT16 volume: the partition record it came from, its BPB,
/// the derived geometry, and the current working directory. The sector
/// store is owned by the caller and passed into each operation.
pub struct Volume {
    pub partition: Partition,
    pub bpb: BiosParameterBlock,
    pub geometry: Geometry,
    pub cwd: DirectoryDescriptor,
}

impl Volume {
    /// Parses the BPB at the partition's first sector and derives the
    /// volume geometry. Fails on a BPB this engine cannot interpret, or
    /// when the FAT and root directory regions fall outside the image.
    pub fn mount(store: &SectorStore, partition: Partition) -> Result<Self> {
        let sector = store.read(partition.sector)?;
        let bpb = BiosParameterBlock::from_sector(sector).map_err(FsError::CorruptImage)?;

        if bpb.bytes_per_sector as usize != crate::disk::SECTOR_SIZE {
            return Err(FsError::CorruptImage(format!(
                "unsupported sector size {}",
                bpb.bytes_per_sector
            )));
        }
        if bpb.small_sector_count == 0 {
            return Err(FsError::CorruptImage("zero sector count".to_string()));
        }

        let geometry =
            Geometry::from_bpb(&bpb, partition.sector).map_err(FsError::CorruptImage)?;

        let metadata_end = geometry.first_data_sector;
        if metadata_end as usize > store.len() {
            return Err(FsError::CorruptImage(format!(
                "volume metadata extends to sector {} but the image has {}",
                metadata_end,
                store.len()
            )));
        }

        log::debug!(
            "mounted volume at sector {}: {} clusters of {} sectors",
            partition.sector,
            geometry.n_clusters,
            geometry.sectors_per_cluster
        );

        let cwd = DirectoryDescriptor {
            cluster: 0,
            sector: geometry.first_root_dir_sector,
            attr: attr::DIRECTORY,
        };

        Ok(Volume {
            partition,
            bpb,
            geometry,
            cwd,
        })
    }

    /// Descriptor of the fixed root directory region.
    pub fn root(&self) -> DirectoryDescriptor {
        DirectoryDescriptor {
            cluster: 0,
            sector: self.geometry.first_root_dir_sector,
            attr: attr::DIRECTORY,
        }
    }

    /// Indices of every sector in the partition with at least one nonzero
    /// byte. Sectors beyond the image end are skipped.
    pub fn nonempty_sectors(&self, store: &SectorStore) -> Vec<u32> {
        let start = self.partition.sector;
        let end = start.saturating_add(self.partition.size).min(store.len() as u32);
        (start..end)
            .filter(|&index| {
                store
                    .read(index)
                    .map(|sector| sector.iter().any(|&b| b != 0))
                    .unwrap_or(false)
            })
            .collect()
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let g = &self.geometry;
        writeln!(f, "total_sectors: {}", g.total_sectors)?;
        writeln!(f, "sectors_per_fat: {}", g.sectors_per_fat)?;
        writeln!(f, "root_dir_sectors: {}", g.root_dir_sectors)?;
        writeln!(f, "data_sectors: {}", g.data_sectors)?;
        writeln!(f, "n_clusters: {}", g.n_clusters)?;
        writeln!(f, "first_fat_sector: {}", g.first_fat_sector)?;
        writeln!(f, "first_root_dir_sector: {}", g.first_root_dir_sector)?;
        write!(f, "first_data_sector: {}", g.first_data_sector)
    }
}
