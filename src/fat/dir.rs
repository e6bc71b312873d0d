/*
 * Directory Operations
 * ====================
 *
 * Slot iteration, lookup, creation, and path resolution over directory
 * regions. Two kinds of region exist: the fixed root directory (the
 * cluster-0 sentinel, spanning `root_dir_sectors` sectors and never
 * extensible) and ordinary directories (one cluster per region, chained
 * through the FAT).
 *
 * The raw iterator walks exactly one region and never follows the chain;
 * lookup, listing, and the free-slot search do their own chain walks so
 * that every allocation is explicit.
 */

use super::{DirectoryDescriptor, FileDescriptor, FileInfo, Volume, END_OF_CHAIN};
use crate::disk::{attr, short_name, DirEntry, SectorStore, Timestamp, DIR_ENTRY_SIZE, SECTOR_SIZE};
use crate::error::{FsError, Result};

const ENTRIES_PER_SECTOR: usize = SECTOR_SIZE / DIR_ENTRY_SIZE;

/// Iterator over every 32-byte slot of one directory region, yielding
/// `(sector, offset_within_sector, entry)`.
pub struct DirEntries<'a> {
    store: &'a SectorStore,
    first_sector: u32,
    n_slots: usize,
    index: usize,
}

impl Iterator for DirEntries<'_> {
    type Item = (u32, usize, DirEntry);

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.n_slots {
            return None;
        }
        let sector = self.first_sector + (self.index / ENTRIES_PER_SECTOR) as u32;
        let offset = (self.index % ENTRIES_PER_SECTOR) * DIR_ENTRY_SIZE;
        self.index += 1;

        // Mount guarantees metadata sectors exist; a truncated data region
        // simply ends the listing.
        let data = self.store.read(sector).ok()?;
        Some((sector, offset, DirEntry::from_bytes(&data[offset..offset + DIR_ENTRY_SIZE])))
    }
}

impl Volume {
    /// Every slot in the directory region named by `cluster`: the fixed
    /// root region for the cluster-0 sentinel, one data cluster otherwise.
    pub fn entries_in<'a>(&self, store: &'a SectorStore, cluster: u16) -> DirEntries<'a> {
        let (first_sector, n_sectors) = if cluster == 0 {
            (self.geometry.first_root_dir_sector, self.geometry.root_dir_sectors)
        } else {
            (self.geometry.first_sector_of_cluster(cluster), self.geometry.sectors_per_cluster)
        };
        DirEntries {
            store,
            first_sector,
            n_slots: n_sectors as usize * ENTRIES_PER_SECTOR,
            index: 0,
        }
    }

    /// Looks `name` up in the directory starting at `cluster`, following
    /// the FAT chain of a non-root directory.
    pub fn find_in_dir(
        &self,
        store: &SectorStore,
        cluster: u16,
        name: &[u8; 11],
    ) -> Result<Option<(u32, usize, DirEntry)>> {
        let mut current = cluster;
        let mut steps = 0u32;
        loop {
            for (sector, offset, entry) in self.entries_in(store, current) {
                if !entry.is_free() && entry.name == *name {
                    return Ok(Some((sector, offset, entry)));
                }
            }
            if current == 0 {
                return Ok(None);
            }
            match self.next_in_chain(store, current)? {
                Some(next) => current = next,
                None => return Ok(None),
            }
            steps += 1;
            if steps > self.geometry.n_clusters {
                return Err(FsError::CorruptImage(format!(
                    "directory chain from cluster {} does not terminate",
                    cluster
                )));
            }
        }
    }

    /// Finds a free slot in the directory starting at `cluster`, extending
    /// the chain with a freshly zeroed cluster when every slot is taken.
    /// The root region cannot grow; a full root is out of space.
    ///
    /// Invariant: a new chain cluster is marked end-of-chain before the
    /// predecessor is pointed at it, so no reachable cluster ever reads
    /// as free.
    pub fn scan_for_free_slot(&self, store: &mut SectorStore, cluster: u16) -> Result<(u32, usize)> {
        let mut current = cluster;
        let mut steps = 0u32;
        loop {
            for (sector, offset, entry) in self.entries_in(store, current) {
                if entry.is_free() {
                    return Ok((sector, offset));
                }
            }
            if current == 0 {
                return Err(FsError::OutOfSpace);
            }
            match self.next_in_chain(store, current)? {
                Some(next) => current = next,
                None => {
                    let new = self.scan_fat(store)?.ok_or(FsError::OutOfSpace)?;
                    self.write_fat(store, new, END_OF_CHAIN)?;
                    self.reset_cluster(store, new)?;
                    self.write_fat(store, current, new)?;
                    current = new;
                }
            }
            steps += 1;
            if steps > self.geometry.n_clusters {
                return Err(FsError::CorruptImage(format!(
                    "directory chain from cluster {} does not terminate",
                    cluster
                )));
            }
        }
    }

    /// Creates an entry named `name` under `parent` and allocates its
    /// first cluster. The directory slot is secured before the cluster is
    /// allocated, so a full parent fails without touching the FAT.
    fn create_entry(
        &self,
        store: &mut SectorStore,
        parent: DirectoryDescriptor,
        name: &str,
        entry_attr: u8,
        stamp: &Timestamp,
    ) -> Result<(DirEntry, u32)> {
        let name11 = short_name(name)?;
        if self.find_in_dir(store, parent.cluster, &name11)?.is_some() {
            return Err(FsError::AlreadyExists(name.to_string()));
        }

        let (slot_sector, slot_offset) = self.scan_for_free_slot(store, parent.cluster)?;
        let free = self.scan_fat(store)?.ok_or(FsError::OutOfSpace)?;
        self.write_fat(store, free, END_OF_CHAIN)?;

        let entry = DirEntry::new(name11, entry_attr, free, stamp);
        store.write(slot_sector, slot_offset, &entry.to_bytes())?;

        if entry_attr & attr::DIRECTORY != 0 {
            self.reset_cluster(store, free)?;
            let first = self.geometry.first_sector_of_cluster(free);
            let dot = DirEntry::new(short_name(".")?, attr::DIRECTORY | attr::HIDDEN, free, stamp);
            let dotdot = DirEntry::new(
                short_name("..")?,
                attr::DIRECTORY | attr::HIDDEN,
                parent.cluster,
                stamp,
            );
            store.write(first, 0, &dot.to_bytes())?;
            store.write(first, DIR_ENTRY_SIZE, &dotdot.to_bytes())?;
        }

        log::info!("created {} at cluster {}", name, free);
        Ok((entry, slot_sector))
    }

    /// Splits `path` into its parent directory path and leaf name.
    fn split_path(path: &str) -> Result<(&str, &str)> {
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            // "" or "/" names an existing directory, never a creatable one
            return Err(FsError::AlreadyExists(path.to_string()));
        }
        match trimmed.rsplit_once('/') {
            Some((parent, leaf)) => {
                if parent.is_empty() {
                    Ok(("/", leaf))
                } else {
                    Ok((parent, leaf))
                }
            }
            None => Ok(("", trimmed)),
        }
    }

    /// Creates a directory at `path`, seeded with `.` and `..`.
    pub fn create_directory(
        &self,
        store: &mut SectorStore,
        path: &str,
        stamp: &Timestamp,
    ) -> Result<DirectoryDescriptor> {
        let (parent_path, name) = Self::split_path(path)?;
        let parent = self.follow_path(store, parent_path)?;
        let (entry, _) = self.create_entry(store, parent, name, attr::DIRECTORY, stamp)?;
        Ok(DirectoryDescriptor {
            cluster: entry.first_cluster_lo,
            sector: self.geometry.first_sector_of_cluster(entry.first_cluster_lo),
            attr: entry.attr,
        })
    }

    /// Creates an empty file at `path`.
    pub fn create_file(
        &self,
        store: &mut SectorStore,
        path: &str,
        stamp: &Timestamp,
    ) -> Result<FileDescriptor> {
        let (parent_path, name) = Self::split_path(path)?;
        let parent = self.follow_path(store, parent_path)?;
        let (entry, slot_sector) = self.create_entry(store, parent, name, attr::ARCHIVE, stamp)?;
        Ok(FileDescriptor {
            cluster: entry.first_cluster_lo,
            dir_sector: slot_sector,
            attr: entry.attr,
            size: entry.file_size,
        })
    }

    /// Resolves a `/`-separated path to a directory descriptor. An
    /// absolute path starts at the root, anything else at the current
    /// working directory; empty segments are skipped.
    pub fn follow_path(&self, store: &SectorStore, path: &str) -> Result<DirectoryDescriptor> {
        let mut dp = if path.starts_with('/') { self.root() } else { self.cwd };

        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let name = short_name(segment)?;
            match self.find_in_dir(store, dp.cluster, &name)? {
                Some((_, _, entry)) => {
                    if !entry.is_directory() {
                        return Err(FsError::NotADirectory(segment.to_string()));
                    }
                    if entry.first_cluster_lo != 0 && !self.geometry.is_data_cluster(entry.first_cluster_lo) {
                        return Err(FsError::CorruptImage(format!(
                            "entry {} points at invalid cluster {}",
                            segment, entry.first_cluster_lo
                        )));
                    }
                    dp.cluster = entry.first_cluster_lo;
                    dp.sector = if entry.first_cluster_lo == 0 {
                        // ".." of a first-level directory points back at
                        // the root sentinel
                        self.geometry.first_root_dir_sector
                    } else {
                        self.geometry.first_sector_of_cluster(entry.first_cluster_lo)
                    };
                    dp.attr = entry.attr;
                }
                None => return Err(FsError::PathNotFound(path.to_string())),
            }
        }
        Ok(dp)
    }

    /// Repoints the current working directory at `path`.
    pub fn chdir(&mut self, store: &SectorStore, path: &str) -> Result<()> {
        self.cwd = self.follow_path(store, path)?;
        Ok(())
    }

    /// Lists every live entry of the directory at `dp`, following the
    /// chain of a non-root directory.
    pub fn readdir(&self, store: &SectorStore, dp: DirectoryDescriptor) -> Result<Vec<FileInfo>> {
        let mut listing = Vec::new();
        let mut current = dp.cluster;
        let mut steps = 0u32;
        loop {
            for (_, _, entry) in self.entries_in(store, current) {
                if !entry.is_free() {
                    listing.push(FileInfo {
                        size: entry.file_size,
                        name: entry.name,
                        creation_date: entry.creation_date,
                        creation_time: entry.creation_time,
                        attr: entry.attr,
                    });
                }
            }
            if current == 0 {
                break;
            }
            match self.next_in_chain(store, current)? {
                Some(next) => current = next,
                None => break,
            }
            steps += 1;
            if steps > self.geometry.n_clusters {
                return Err(FsError::CorruptImage(format!(
                    "directory chain from cluster {} does not terminate",
                    dp.cluster
                )));
            }
        }
        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::super::volume::testutil::bare_volume;
    use super::super::FREE_CLUSTER;
    use super::*;

    fn stamp() -> Timestamp {
        Timestamp {
            creation_time_tenth: 0x01,
            creation_time: 0x02,
            creation_date: 0x0002,
            last_accessed_date: 0x0003,
            modified_time: 0x0004,
            modified_date: 0x0005,
        }
    }

    #[test]
    fn test_entries_in_root_counts_slots() {
        let (volume, store) = bare_volume(4, 32, 1024, 4);
        let slots: Vec<_> = volume.entries_in(&store, 0).collect();

        // 32 root entries over 2 sectors
        assert_eq!(slots.len(), 32);
        assert_eq!(slots[0].0, volume.geometry.first_root_dir_sector);
        assert_eq!(slots[0].1, 0);
        assert_eq!(slots[16].0, volume.geometry.first_root_dir_sector + 1);
        assert_eq!(slots[16].1, 0);
        assert_eq!(slots[17].1, DIR_ENTRY_SIZE);
        assert!(slots.iter().all(|(_, _, e)| e.is_free()));
    }

    #[test]
    fn test_entries_in_cluster_does_not_follow_chain() {
        let (volume, mut store) = bare_volume(2, 16, 64, 1);
        volume.write_fat(&mut store, 2, 3).unwrap();
        volume.write_fat(&mut store, 3, END_OF_CHAIN).unwrap();

        let slots: Vec<_> = volume.entries_in(&store, 2).collect();
        assert_eq!(slots.len(), 2 * (SECTOR_SIZE / DIR_ENTRY_SIZE));
        assert!(slots
            .iter()
            .all(|(sector, _, _)| *sector < volume.geometry.first_sector_of_cluster(3)));
    }

    #[test]
    fn test_mkdir_in_root() {
        let (volume, mut store) = bare_volume(4, 32, 1024, 4);
        let dp = volume.create_directory(&mut store, "FOO", &stamp()).unwrap();

        assert_eq!(dp.cluster, 2);
        assert_eq!(dp.sector, volume.geometry.first_data_sector);
        assert_eq!(dp.attr, attr::DIRECTORY);
        assert_eq!(volume.read_fat(&store, 2).unwrap(), END_OF_CHAIN);

        // Root slot 0 holds the new entry
        let root = store.read(volume.geometry.first_root_dir_sector).unwrap();
        let entry = DirEntry::from_bytes(&root[..DIR_ENTRY_SIZE]);
        assert_eq!(&entry.name, b"FOO        ");
        assert_eq!(entry.attr, attr::DIRECTORY);
        assert_eq!(entry.first_cluster_lo, 2);

        // New cluster starts with "." and ".."
        let first = store.read(dp.sector).unwrap();
        let dot = DirEntry::from_bytes(&first[..DIR_ENTRY_SIZE]);
        assert_eq!(&dot.name, b".          ");
        assert_eq!(dot.attr, attr::DIRECTORY | attr::HIDDEN);
        assert_eq!(dot.first_cluster_lo, 2);
        let dotdot = DirEntry::from_bytes(&first[DIR_ENTRY_SIZE..2 * DIR_ENTRY_SIZE]);
        assert_eq!(&dotdot.name, b"..         ");
        assert_eq!(dotdot.attr, attr::DIRECTORY | attr::HIDDEN);
        assert_eq!(dotdot.first_cluster_lo, 0);
    }

    #[test]
    fn test_touch_in_root() {
        let (volume, mut store) = bare_volume(4, 32, 1024, 4);
        let fp = volume.create_file(&mut store, "HELLO.TXT", &stamp()).unwrap();

        assert_eq!(fp.cluster, 2);
        assert_eq!(fp.dir_sector, volume.geometry.first_root_dir_sector);
        assert_eq!(fp.attr, attr::ARCHIVE);
        assert_eq!(fp.size, 0);
        assert_eq!(volume.read_fat(&store, 2).unwrap(), END_OF_CHAIN);

        // A plain file's cluster is not seeded with entries
        let first = store.read(volume.geometry.first_sector_of_cluster(2)).unwrap();
        assert!(first.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_create_duplicate_fails() {
        let (volume, mut store) = bare_volume(4, 32, 1024, 4);
        volume.create_directory(&mut store, "FOO", &stamp()).unwrap();

        assert!(matches!(
            volume.create_directory(&mut store, "FOO", &stamp()),
            Err(FsError::AlreadyExists(_))
        ));
        // Lowercase input collides with the stored upper-cased form
        assert!(matches!(
            volume.create_file(&mut store, "foo", &stamp()),
            Err(FsError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_nested_mkdir() {
        let (mut volume, mut store) = bare_volume(4, 32, 1024, 4);
        volume.create_directory(&mut store, "FOO", &stamp()).unwrap();
        volume.chdir(&store, "FOO").unwrap();
        let bar = volume.create_directory(&mut store, "BAR", &stamp()).unwrap();

        assert_eq!(bar.cluster, 3);
        assert_eq!(volume.read_fat(&store, 3).unwrap(), END_OF_CHAIN);

        // ".." inside BAR points back at FOO
        let first = store.read(volume.geometry.first_sector_of_cluster(3)).unwrap();
        let dotdot = DirEntry::from_bytes(&first[DIR_ENTRY_SIZE..2 * DIR_ENTRY_SIZE]);
        assert_eq!(dotdot.first_cluster_lo, 2);
    }

    #[test]
    fn test_follow_path_absolute_and_relative() {
        let (mut volume, mut store) = bare_volume(4, 32, 1024, 4);
        volume.create_directory(&mut store, "FOO", &stamp()).unwrap();
        volume.chdir(&store, "FOO").unwrap();
        volume.create_directory(&mut store, "BAR", &stamp()).unwrap();

        let relative = volume.follow_path(&store, "BAR").unwrap();
        let absolute = volume.follow_path(&store, "/FOO/BAR").unwrap();
        assert_eq!(relative, absolute);

        // Empty path names the current directory, "/" names the root
        assert_eq!(volume.follow_path(&store, "").unwrap(), volume.cwd);
        assert_eq!(volume.follow_path(&store, "/").unwrap(), volume.root());
    }

    #[test]
    fn test_follow_path_dotdot_returns_to_root() {
        let (mut volume, mut store) = bare_volume(4, 32, 1024, 4);
        volume.create_directory(&mut store, "FOO", &stamp()).unwrap();
        volume.chdir(&store, "FOO").unwrap();

        let back = volume.follow_path(&store, "..").unwrap();
        assert_eq!(back.cluster, 0);
        assert_eq!(back.sector, volume.geometry.first_root_dir_sector);
    }

    #[test]
    fn test_follow_path_errors() {
        let (volume, mut store) = bare_volume(4, 32, 1024, 4);
        volume.create_file(&mut store, "FILE.TXT", &stamp()).unwrap();

        assert!(matches!(
            volume.follow_path(&store, "MISSING"),
            Err(FsError::PathNotFound(_))
        ));
        assert!(matches!(
            volume.follow_path(&store, "FILE.TXT"),
            Err(FsError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_lookup_requires_exact_name() {
        let (volume, mut store) = bare_volume(4, 32, 1024, 4);
        volume.create_directory(&mut store, "FOOBAR", &stamp()).unwrap();

        // A prefix of a stored name is not a match
        assert!(matches!(
            volume.follow_path(&store, "FOO"),
            Err(FsError::PathNotFound(_))
        ));
    }

    #[test]
    fn test_readdir() {
        let (volume, mut store) = bare_volume(4, 32, 1024, 4);
        volume.create_directory(&mut store, "FOO", &stamp()).unwrap();
        volume.create_file(&mut store, "A.TXT", &stamp()).unwrap();

        let listing = volume.readdir(&store, volume.cwd).unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].display_name(), "FOO");
        assert!(listing[0].is_directory());
        assert_eq!(listing[1].display_name(), "A.TXT");
        assert!(!listing[1].is_directory());

        let foo = volume.follow_path(&store, "FOO").unwrap();
        let inside = volume.readdir(&store, foo).unwrap();
        let names: Vec<_> = inside.iter().map(|i| i.display_name()).collect();
        assert_eq!(names, vec![".", ".."]);
    }

    #[test]
    fn test_full_root_fails_without_fat_mutation() {
        let (volume, mut store) = bare_volume(4, 16, 1024, 4);

        // 16 root entries fill exactly one sector
        for i in 0..16 {
            volume
                .create_directory(&mut store, &format!("DIR{}", i), &stamp())
                .unwrap();
        }
        let next_free = volume.scan_fat(&store).unwrap().unwrap();

        assert!(matches!(
            volume.create_directory(&mut store, "ONEMORE", &stamp()),
            Err(FsError::OutOfSpace)
        ));
        // The cluster that would have been handed out is still free
        assert_eq!(volume.read_fat(&store, next_free).unwrap(), FREE_CLUSTER);
        assert_eq!(volume.scan_fat(&store).unwrap(), Some(next_free));
    }

    #[test]
    fn test_chain_extension_on_full_directory() {
        let (mut volume, mut store) = bare_volume(1, 16, 256, 2);
        volume.create_directory(&mut store, "DIR", &stamp()).unwrap();
        volume.chdir(&store, "DIR").unwrap();
        let dir_cluster = volume.cwd.cluster;

        // One 512-byte cluster holds 16 slots; "." and ".." occupy two
        for i in 0..14 {
            volume
                .create_file(&mut store, &format!("F{}", i), &stamp())
                .unwrap();
        }
        assert_eq!(volume.read_fat(&store, dir_cluster).unwrap(), END_OF_CHAIN);

        let before = volume.scan_fat(&store).unwrap().unwrap();
        volume.create_file(&mut store, "OVERFLOW", &stamp()).unwrap();

        // The first free cluster became the chain extension...
        let extension = volume.read_fat(&store, dir_cluster).unwrap();
        assert_eq!(extension, before);
        assert_eq!(volume.read_fat(&store, extension).unwrap(), END_OF_CHAIN);

        // ...and the new entry landed at its start
        let first = store.read(volume.geometry.first_sector_of_cluster(extension)).unwrap();
        let entry = DirEntry::from_bytes(&first[..DIR_ENTRY_SIZE]);
        assert_eq!(&entry.name, b"OVERFLOW   ");
        assert!(first[DIR_ENTRY_SIZE..].iter().all(|&b| b == 0));

        // The whole chain is still reachable, and listing sees all 15 files
        assert_eq!(
            volume.walk_chain(&store, dir_cluster).unwrap(),
            vec![dir_cluster, extension]
        );
        let listing = volume.readdir(&store, volume.cwd).unwrap();
        assert_eq!(listing.len(), 2 + 15);
    }

    #[test]
    fn test_create_rejects_bad_parent() {
        let (volume, mut store) = bare_volume(4, 32, 1024, 4);
        assert!(matches!(
            volume.create_directory(&mut store, "NOPE/CHILD", &stamp()),
            Err(FsError::PathNotFound(_))
        ));
        assert!(matches!(
            volume.create_directory(&mut store, "/", &stamp()),
            Err(FsError::AlreadyExists(_))
        ));
    }
}
