//! Volume superblock and its cached manager

use super::{BlockDevice, FsError, FsLayout};
use crate::constants::fs::{LABEL_LENGTH, SUPERBLOCK_MAGIC};
use alloc::vec;
use log::debug;

/// Encoded size of the superblock record
pub const SUPERBLOCK_SIZE: usize = 20 + LABEL_LENGTH;

/// Volume metadata. Stored little-endian at the start of the superblock
/// sector:
///
/// | bytes  | field                  |
/// |--------|------------------------|
/// | 0..4   | magic                  |
/// | 4..8   | `total_sectors`        |
/// | 8..10  | `sectors_per_cluster`  |
/// | 10..12 | `bytes_per_sector`     |
/// | 12..16 | `available_sectors`    |
/// | 16..20 | `available_direntries` |
/// | 20..36 | `label`, NUL padded    |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    pub total_sectors: u32,
    pub sectors_per_cluster: u16,
    pub bytes_per_sector: u16,
    pub available_sectors: u32,
    pub available_direntries: u32,
    pub label: [u8; LABEL_LENGTH],
}

impl Superblock {
    /// Builds the label field; the last byte always stays NUL.
    pub fn encode_label(label: &str) -> Result<[u8; LABEL_LENGTH], FsError> {
        let bytes = label.as_bytes();
        if bytes.len() >= LABEL_LENGTH || bytes.contains(&0) {
            return Err(FsError::InvalidName);
        }
        let mut field = [0u8; LABEL_LENGTH];
        field[..bytes.len()].copy_from_slice(bytes);
        Ok(field)
    }

    /// Returns the label up to its terminator
    pub fn label(&self) -> &str {
        let end = self
            .label
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(LABEL_LENGTH);
        core::str::from_utf8(&self.label[..end]).unwrap_or("")
    }

    pub fn encode(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&SUPERBLOCK_MAGIC.to_le_bytes());
        out[4..8].copy_from_slice(&self.total_sectors.to_le_bytes());
        out[8..10].copy_from_slice(&self.sectors_per_cluster.to_le_bytes());
        out[10..12].copy_from_slice(&self.bytes_per_sector.to_le_bytes());
        out[12..16].copy_from_slice(&self.available_sectors.to_le_bytes());
        out[16..20].copy_from_slice(&self.available_direntries.to_le_bytes());
        out[20..SUPERBLOCK_SIZE].copy_from_slice(&self.label);
    }

    pub fn decode(raw: &[u8]) -> Result<Self, FsError> {
        if raw.len() < SUPERBLOCK_SIZE {
            return Err(FsError::BadSuperblock);
        }
        let u16_at = |at: usize| u16::from_le_bytes([raw[at], raw[at + 1]]);
        let u32_at =
            |at: usize| u32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]]);

        if u32_at(0) != SUPERBLOCK_MAGIC {
            return Err(FsError::BadSuperblock);
        }

        let mut label = [0u8; LABEL_LENGTH];
        label.copy_from_slice(&raw[20..SUPERBLOCK_SIZE]);

        Ok(Self {
            total_sectors: u32_at(4),
            sectors_per_cluster: u16_at(8),
            bytes_per_sector: u16_at(10),
            available_sectors: u32_at(12),
            available_direntries: u32_at(16),
            label,
        })
    }
}

/// In-memory copy of the superblock, written through to its fixed sector
/// after every counter change.
#[derive(Debug)]
pub struct SuperblockManager {
    cached: Superblock,
    sector: u64,
}

impl SuperblockManager {
    /// Writes a fresh superblock and takes ownership of it
    pub fn create(
        device: &mut dyn BlockDevice,
        layout: &FsLayout,
        superblock: Superblock,
    ) -> Result<Self, FsError> {
        let manager = Self {
            cached: superblock,
            sector: layout.superblock_sector,
        };
        manager.persist(device)?;
        Ok(manager)
    }

    /// Reads the superblock sector into the cache.
    ///
    /// Rejects a record whose magic, sector size or counters do not match
    /// the device and layout.
    pub fn mount(device: &mut dyn BlockDevice, layout: &FsLayout) -> Result<Self, FsError> {
        let mut buffer = vec![0u8; device.sector_size()];
        device.read_sectors(layout.superblock_sector, 1, &mut buffer)?;
        let cached = Superblock::decode(&buffer)?;

        if cached.bytes_per_sector as usize != device.sector_size()
            || cached.sectors_per_cluster == 0
            || cached.available_sectors as usize > layout.max_clusters
            || cached.available_direntries as usize > layout.max_dir
        {
            return Err(FsError::BadSuperblock);
        }

        Ok(Self {
            cached,
            sector: layout.superblock_sector,
        })
    }

    /// Serializes the cached structure back to its sector
    pub fn persist(&self, device: &mut dyn BlockDevice) -> Result<(), FsError> {
        let mut buffer = vec![0u8; device.sector_size()];
        self.cached.encode(&mut buffer);
        device.write_sectors(self.sector, 1, &buffer)
    }

    pub fn superblock(&self) -> &Superblock {
        &self.cached
    }

    pub fn has_free_directory_slot(&self) -> bool {
        self.cached.available_direntries > 0
    }

    pub fn has_free_sectors(&self, sectors: u32) -> bool {
        self.cached.available_sectors >= sectors
    }

    /// Sectors consumed by `clusters` clusters
    pub fn cluster_sectors(&self, clusters: u32) -> u32 {
        clusters.saturating_mul(self.cached.sectors_per_cluster as u32)
    }

    /// Takes one directory slot and `clusters` clusters off the free
    /// counters and persists them. The cache is left untouched on failure.
    pub fn reserve(&mut self, device: &mut dyn BlockDevice, clusters: u32) -> Result<(), FsError> {
        if !self.has_free_directory_slot() {
            return Err(FsError::NoFreeDirectorySlot);
        }
        let sectors = self.cluster_sectors(clusters);
        if !self.has_free_sectors(sectors) {
            return Err(FsError::NoFreeSectors);
        }

        let previous = self.cached.clone();
        self.cached.available_direntries -= 1;
        self.cached.available_sectors -= sectors;
        if let Err(e) = self.persist(device) {
            self.cached = previous;
            return Err(e);
        }

        debug!(
            "superblock: reserved 1 slot, {} sectors ({} slots, {} sectors left)",
            sectors, self.cached.available_direntries, self.cached.available_sectors
        );
        Ok(())
    }

    /// Undoes a `reserve` of the same size. With `slot` false only the
    /// clusters go back; the directory slot stays counted as used.
    pub fn release(
        &mut self,
        device: &mut dyn BlockDevice,
        clusters: u32,
        slot: bool,
    ) -> Result<(), FsError> {
        let previous = self.cached.clone();
        if slot {
            self.cached.available_direntries += 1;
        }
        self.cached.available_sectors += self.cluster_sectors(clusters);
        if let Err(e) = self.persist(device) {
            self.cached = previous;
            return Err(e);
        }
        Ok(())
    }
}
