use super::SECTOR_SIZE;
use crate::error::{FsError, Result};

/// The in-memory image: an indexable array of fixed-size sectors. All
/// engine mutations land here; persistence is a single whole-image
/// serialization on shutdown.
pub struct SectorStore {
    sectors: Vec<[u8; SECTOR_SIZE]>,
}

impl SectorStore {
    /// Creates a zero-filled store of `count` sectors.
    pub fn with_sectors(count: usize) -> Self {
        SectorStore {
            sectors: vec![[0u8; SECTOR_SIZE]; count],
        }
    }

    /// Splits a flat image into sectors. A trailing partial sector is
    /// zero-padded to the full width.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut sectors = Vec::with_capacity(data.len().div_ceil(SECTOR_SIZE));
        for chunk in data.chunks(SECTOR_SIZE) {
            let mut sector = [0u8; SECTOR_SIZE];
            sector[..chunk.len()].copy_from_slice(chunk);
            sectors.push(sector);
        }
        SectorStore { sectors }
    }

    pub fn len(&self) -> usize {
        self.sectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }

    pub fn read(&self, index: u32) -> Result<&[u8; SECTOR_SIZE]> {
        self.sectors
            .get(index as usize)
            .ok_or(FsError::InvalidSector(index))
    }

    pub fn read_mut(&mut self, index: u32) -> Result<&mut [u8; SECTOR_SIZE]> {
        self.sectors
            .get_mut(index as usize)
            .ok_or(FsError::InvalidSector(index))
    }

    /// Overwrites `bytes` into sector `index` starting at `offset`. The
    /// write must fit inside the sector; there is no wrap.
    pub fn write(&mut self, index: u32, offset: usize, bytes: &[u8]) -> Result<()> {
        debug_assert!(offset + bytes.len() <= SECTOR_SIZE);
        let sector = self.read_mut(index)?;
        sector[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Serializes the store back to a flat image, sectors in order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.sectors.len() * SECTOR_SIZE);
        for sector in &self.sectors {
            data.extend_from_slice(sector);
        }
        data
    }
}
