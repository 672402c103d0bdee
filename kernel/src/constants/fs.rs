//! On-disk filesystem constants.
//!
//! Region addresses are in sectors. `FsLayout::default()` is built from
//! these values.

/// Size of a disk sector in bytes
pub const SECTOR_SIZE: usize = 512;

/// Sector holding the superblock
pub const START_FS: u64 = 1;

/// First sector of the directory region
pub const START_DIR: u64 = 2;

/// First sector of the FAT region
pub const START_FAT: u64 = 4;

/// Number of directory slots
pub const MAX_DIR: usize = 64;

/// Number of FAT entries (allocation units tracked by the FAT)
pub const MAX_SECTORS: usize = 2048;

/// Sectors per cluster written by `Volume::format` unless overridden
pub const SECTORS_PER_CLUSTER: u16 = 1;

/// Size of an on-disk directory record in bytes
pub const DIR_ENTRY_SIZE: usize = 16;

/// Size of FAT entry in bytes (16-bit, high byte first)
pub const FAT_ENTRY_SIZE: usize = 2;

/// Maximum visible length of a filename
pub const MAX_FILENAME_LENGTH: usize = 10;

/// Length of the volume label field
pub const LABEL_LENGTH: usize = 16;

/// FAT value for an unused cluster
pub const FREE_CLUSTER: u16 = 0x0000;

/// FAT value terminating a cluster chain
pub const END_OF_CHAIN: u16 = 0xFFFF;

/// First-byte marker of a released directory slot
pub const FREE_ENTRY_MARKER: u8 = b'?';

/// Superblock magic, "MNFS" little-endian
pub const SUPERBLOCK_MAGIC: u32 = 0x5346_4E4D;
