/*
 * Image-Level Filesystem
 * ======================
 *
 * Owns the sector store for the lifetime of a session and the volumes
 * mounted out of it. Loading reads the whole image into memory; every
 * mutation lands in the store; flushing serializes the store back to the
 * image file in one pass.
 *
 * The MBR is parsed once. Each partition record with a nonzero starting
 * LBA is mounted as a FAT16 volume; records that fail mount validation
 * are logged and skipped. When no partition qualifies at all, sector 0 is
 * tried as the BPB of a single bare volume spanning the image.
 */

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::disk::{Mbr, Partition, SectorStore, Timestamp};
use crate::error::{FsError, Result};
use crate::fat::{DirectoryDescriptor, FileDescriptor, FileInfo, Volume};

pub struct FileSystem {
    store: SectorStore,
    mbr: Mbr,
    volumes: BTreeMap<usize, Volume>,
    active: usize,
}

impl FileSystem {
    /// Loads a disk image file.
    pub fn open(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Mounts a disk image already in memory.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let store = SectorStore::from_bytes(data);
        let mbr = Mbr::from_bytes(store.read(0)?).map_err(FsError::CorruptImage)?;

        let mut volumes = BTreeMap::new();
        for (index, partition) in mbr.partitions.iter().enumerate() {
            if !partition.is_present() {
                continue;
            }
            match Volume::mount(&store, *partition) {
                Ok(volume) => {
                    volumes.insert(index, volume);
                }
                Err(err) => log::warn!("skipping partition {}: {}", index, err),
            }
        }

        if volumes.is_empty() {
            // No usable partition table; try the image as one bare volume
            let whole = Partition {
                indicator: 0,
                start_chs: 0,
                kind: 0x06,
                end_chs: 0,
                sector: 0,
                size: store.len() as u32,
            };
            match Volume::mount(&store, whole) {
                Ok(volume) => {
                    log::info!("no MBR partitions; mounted sector 0 as a bare volume");
                    volumes.insert(0, volume);
                }
                Err(err) => log::debug!("sector 0 is not a bare volume either: {}", err),
            }
        }

        let active = volumes.keys().next().copied().unwrap_or(0);
        Ok(FileSystem {
            store,
            mbr,
            volumes,
            active,
        })
    }

    /// Serializes the sector store back to `path`, sectors in order.
    pub fn flush_to(&self, path: &Path) -> Result<()> {
        fs::write(path, self.store.to_bytes())?;
        log::info!("flushed {} sectors to {}", self.store.len(), path.display());
        Ok(())
    }

    pub fn store(&self) -> &SectorStore {
        &self.store
    }

    pub fn mbr(&self) -> &Mbr {
        &self.mbr
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn is_formatted(&self, index: usize) -> bool {
        self.volumes.contains_key(&index)
    }

    /// Selects the active partition. Only mounted partitions qualify.
    pub fn set_active(&mut self, index: usize) -> Result<()> {
        if self.volumes.contains_key(&index) {
            self.active = index;
            Ok(())
        } else {
            Err(FsError::InvalidPartition(index))
        }
    }

    pub fn volume(&self) -> Result<&Volume> {
        self.volumes
            .get(&self.active)
            .ok_or(FsError::InvalidPartition(self.active))
    }

    fn parts_mut(&mut self) -> Result<(&mut Volume, &mut SectorStore)> {
        let FileSystem { store, volumes, active, .. } = self;
        let volume = volumes
            .get_mut(active)
            .ok_or(FsError::InvalidPartition(*active))?;
        Ok((volume, store))
    }

    pub fn cwd(&self) -> Result<DirectoryDescriptor> {
        Ok(self.volume()?.cwd)
    }

    pub fn chdir(&mut self, path: &str) -> Result<()> {
        let (volume, store) = self.parts_mut()?;
        volume.chdir(store, path)
    }

    pub fn mkdir(&mut self, path: &str, stamp: &Timestamp) -> Result<DirectoryDescriptor> {
        let (volume, store) = self.parts_mut()?;
        volume.create_directory(store, path, stamp)
    }

    pub fn touch(&mut self, path: &str, stamp: &Timestamp) -> Result<FileDescriptor> {
        let (volume, store) = self.parts_mut()?;
        volume.create_file(store, path, stamp)
    }

    pub fn readdir_cwd(&self) -> Result<Vec<FileInfo>> {
        let volume = self.volume()?;
        volume.readdir(&self.store, volume.cwd)
    }

    pub fn nonempty_sectors(&self) -> Result<Vec<u32>> {
        Ok(self.volume()?.nonempty_sectors(&self.store))
    }
}
