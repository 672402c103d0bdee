//! File allocation table: cluster chains and their allocator

use super::{BlockDevice, DirectoryTable, FsError, FsLayout};
use crate::constants::fs::{END_OF_CHAIN, FAT_ENTRY_SIZE, FREE_CLUSTER};
use alloc::vec;
use alloc::vec::Vec;
use log::debug;

/// Represents a 16-bit FAT entry pointing to the next cluster in a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatEntry {
    /// Cluster number or special value (0=free, 0xFFFF=end)
    pub cluster: u16,
}

impl FatEntry {
    pub const FREE: FatEntry = FatEntry {
        cluster: FREE_CLUSTER,
    };
    pub const END_OF_CHAIN: FatEntry = FatEntry {
        cluster: END_OF_CHAIN,
    };

    /// Returns true if this entry marks the end of a cluster chain
    pub fn is_end_of_chain(&self) -> bool {
        self.cluster == END_OF_CHAIN
    }

    /// Returns true if this cluster is unused/free
    pub fn is_free(&self) -> bool {
        self.cluster == FREE_CLUSTER
    }

    /// Next cluster in the chain, if this entry is a link
    pub fn next(&self) -> Option<u16> {
        if self.is_free() || self.is_end_of_chain() {
            None
        } else {
            Some(self.cluster)
        }
    }
}

/// In-memory image of the FAT region. Entries are stored high byte first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatTable {
    bytes: Vec<u8>,
}

impl FatTable {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len() / FAT_ENTRY_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, cluster: usize) -> Option<FatEntry> {
        let at = cluster * FAT_ENTRY_SIZE;
        let raw = self.bytes.get(at..at + FAT_ENTRY_SIZE)?;
        Some(FatEntry {
            cluster: u16::from_be_bytes([raw[0], raw[1]]),
        })
    }

    pub fn set(&mut self, cluster: usize, entry: FatEntry) {
        let at = cluster * FAT_ENTRY_SIZE;
        self.bytes[at..at + FAT_ENTRY_SIZE].copy_from_slice(&entry.cluster.to_be_bytes());
    }

    pub fn free_count(&self) -> usize {
        (0..self.len())
            .filter(|&i| self.get(i).is_some_and(|e| e.is_free()))
            .count()
    }

    /// First-fit ascending allocation of `count` entries.
    ///
    /// Each free entry found is linked from the previous one and the last is
    /// terminated. Returns the head, or `NoFreeClusters` with the table
    /// untouched.
    pub fn allocate_chain(&mut self, count: usize) -> Result<u16, FsError> {
        let free: Vec<usize> = (0..self.len())
            .filter(|&i| self.get(i).is_some_and(|e| e.is_free()))
            .take(count)
            .collect();
        if count == 0 || free.len() < count {
            return Err(FsError::NoFreeClusters);
        }

        for pair in free.windows(2) {
            self.set(
                pair[0],
                FatEntry {
                    cluster: pair[1] as u16,
                },
            );
        }
        self.set(free[count - 1], FatEntry::END_OF_CHAIN);
        Ok(free[0] as u16)
    }

    /// Walks a chain from `head` to its end-of-chain marker
    pub fn chain(&self, head: u16) -> Result<Vec<u16>, FsError> {
        let mut clusters = Vec::new();
        let mut current = head;
        loop {
            let entry = match self.get(current as usize) {
                Some(entry) => entry,
                None if clusters.is_empty() => return Err(FsError::NotFound),
                None => return Err(FsError::CorruptChain),
            };
            if entry.is_free() {
                return Err(if clusters.is_empty() {
                    FsError::NotFound
                } else {
                    FsError::CorruptChain
                });
            }
            clusters.push(current);
            // A chain longer than the table must loop
            if clusters.len() > self.len() {
                return Err(FsError::CorruptChain);
            }
            match entry.next() {
                Some(next) => current = next,
                None => return Ok(clusters),
            }
        }
    }

    /// Frees every entry of a chain
    pub fn release_chain(&mut self, head: u16) -> Result<usize, FsError> {
        let clusters = self.chain(head)?;
        for &cluster in &clusters {
            self.set(cluster as usize, FatEntry::FREE);
        }
        Ok(clusters.len())
    }
}

/// Owns the location of the FAT region and persists chain changes.
#[derive(Debug)]
pub struct FatAllocator {
    start: u64,
    sectors: usize,
    bytes: usize,
}

impl FatAllocator {
    pub fn new(layout: &FsLayout, sector_size: usize) -> Self {
        Self {
            start: layout.fat_start,
            sectors: layout.fat_sectors(sector_size),
            bytes: layout.fat_bytes(),
        }
    }

    /// Writes an all-free FAT
    pub fn format(&self, device: &mut dyn BlockDevice) -> Result<(), FsError> {
        self.store(device, &FatTable::from_bytes(vec![0u8; self.bytes]))
    }

    pub fn load(&self, device: &dyn BlockDevice) -> Result<FatTable, FsError> {
        let mut bytes = vec![0u8; self.bytes];
        device.read_sectors(self.start, self.sectors, &mut bytes)?;
        Ok(FatTable::from_bytes(bytes))
    }

    pub fn store(&self, device: &mut dyn BlockDevice, table: &FatTable) -> Result<(), FsError> {
        device.write_sectors(self.start, self.sectors, table.as_bytes())
    }

    /// Allocates and persists a chain of `clusters_needed` entries.
    ///
    /// The region is only written once the whole chain has been built, so
    /// a failed request leaves the disk as it was.
    pub fn allocate_chain(
        &self,
        device: &mut dyn BlockDevice,
        clusters_needed: usize,
    ) -> Result<u16, FsError> {
        let mut table = self.load(device)?;
        let head = table.allocate_chain(clusters_needed)?;
        self.store(device, &table)?;
        debug!("fat: allocated {} entries from {}", clusters_needed, head);
        Ok(head)
    }

    /// Frees a persisted chain
    pub fn release_chain(&self, device: &mut dyn BlockDevice, head: u16) -> Result<(), FsError> {
        let mut table = self.load(device)?;
        table.release_chain(head)?;
        self.store(device, &table)
    }

    pub fn chain(&self, device: &dyn BlockDevice, head: u16) -> Result<Vec<u16>, FsError> {
        self.load(device)?.chain(head)
    }

    pub fn free_count(&self, device: &dyn BlockDevice) -> Result<usize, FsError> {
        Ok(self.load(device)?.free_count())
    }

    /// Records `first_cluster` as the head of the file in `slot`
    pub fn link_directory_entry(
        &self,
        device: &mut dyn BlockDevice,
        directory: &mut DirectoryTable,
        slot: usize,
        first_cluster: u16,
    ) -> Result<(), FsError> {
        directory.set_first_cluster(device, slot, first_cluster)
    }
}
