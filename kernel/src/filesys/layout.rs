//! Fixed on-disk region layout

use super::{superblock::SUPERBLOCK_SIZE, FsError};
use crate::constants::fs::*;

/// Sector addresses and capacities of the three metadata regions.
///
/// The FAT tracks `max_clusters` allocation units; the data area that
/// they describe starts right after the FAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsLayout {
    pub superblock_sector: u64,
    pub dir_start: u64,
    pub fat_start: u64,
    pub max_dir: usize,
    pub max_clusters: usize,
    /// Only consulted by `Volume::format`; a mounted volume uses the value
    /// recorded in its superblock.
    pub sectors_per_cluster: u16,
}

impl Default for FsLayout {
    fn default() -> Self {
        Self {
            superblock_sector: START_FS,
            dir_start: START_DIR,
            fat_start: START_FAT,
            max_dir: MAX_DIR,
            max_clusters: MAX_SECTORS,
            sectors_per_cluster: SECTORS_PER_CLUSTER,
        }
    }
}

impl FsLayout {
    pub fn dir_bytes(&self) -> usize {
        self.max_dir * DIR_ENTRY_SIZE
    }

    pub fn dir_sectors(&self, sector_size: usize) -> usize {
        self.dir_bytes() / sector_size
    }

    pub fn fat_bytes(&self) -> usize {
        self.max_clusters * FAT_ENTRY_SIZE
    }

    pub fn fat_sectors(&self, sector_size: usize) -> usize {
        self.fat_bytes() / sector_size
    }

    /// First sector of the data area
    pub fn data_start(&self, sector_size: usize) -> u64 {
        self.fat_start + self.fat_sectors(sector_size) as u64
    }

    /// Checks that the layout fits a device of the given geometry.
    pub fn validate(&self, sector_size: usize, total_sectors: u64) -> Result<(), FsError> {
        if sector_size < SUPERBLOCK_SIZE || self.sectors_per_cluster == 0 {
            return Err(FsError::InvalidLayout);
        }

        // Regions are transferred whole, so they must be whole sectors
        if self.max_dir == 0 || self.dir_bytes() % sector_size != 0 {
            return Err(FsError::InvalidLayout);
        }
        if self.max_clusters == 0 || self.fat_bytes() % sector_size != 0 {
            return Err(FsError::InvalidLayout);
        }

        // Slot and cluster indices are stored as u16; END_OF_CHAIN stays reserved
        if self.max_dir > u16::MAX as usize || self.max_clusters >= END_OF_CHAIN as usize {
            return Err(FsError::InvalidLayout);
        }

        let superblock = (self.superblock_sector, self.superblock_sector + 1);
        let dir = (
            self.dir_start,
            self.dir_start + self.dir_sectors(sector_size) as u64,
        );
        let fat = (self.fat_start, self.data_start(sector_size));
        if overlaps(superblock, dir) || overlaps(superblock, fat) || overlaps(dir, fat) {
            return Err(FsError::InvalidLayout);
        }

        let data_end = [superblock.1, dir.1, fat.1]
            .into_iter()
            .max()
            .unwrap_or(0)
            .max(self.data_start(sector_size) + self.max_clusters as u64);
        if data_end > total_sectors {
            return Err(FsError::InvalidLayout);
        }

        Ok(())
    }
}

/// Half-open sector ranges
fn overlaps(a: (u64, u64), b: (u64, u64)) -> bool {
    a.0 < b.1 && b.0 < a.1
}
