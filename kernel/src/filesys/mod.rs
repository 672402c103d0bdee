//! Single-volume filesystem: a cached superblock, a fixed directory table
//! and FAT cluster chains, all reached through raw sector I/O.

use core::fmt;
use core::result::Result;

pub mod block;
pub mod directory;
pub mod fat;
pub mod layout;
pub mod superblock;
pub mod volume;

pub use directory::{DirEntry, DirectoryTable};
pub use fat::{FatAllocator, FatEntry, FatTable};
pub use layout::FsLayout;
pub use superblock::{Superblock, SuperblockManager};
pub use volume::Volume;

// Define error types for the filesystem operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    InvalidName,
    NoFreeDirectorySlot,
    NoFreeSectors,
    NoFreeClusters,
    /// Slot scan found nothing even though the superblock counter allowed it
    DirectoryFull,
    AlreadyExists,
    NotFound,
    CorruptChain,
    BadSuperblock,
    InvalidLayout,
    IOError,
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsError::InvalidName => write!(f, "Invalid filename"),
            FsError::NoFreeDirectorySlot => write!(f, "No available directory slot"),
            FsError::NoFreeSectors => write!(f, "No available sectors"),
            FsError::NoFreeClusters => write!(f, "Not enough free clusters"),
            FsError::DirectoryFull => write!(f, "No free directory entry found"),
            FsError::AlreadyExists => write!(f, "File already exists"),
            FsError::NotFound => write!(f, "Not found"),
            FsError::CorruptChain => write!(f, "Corrupt cluster chain"),
            FsError::BadSuperblock => write!(f, "Bad superblock"),
            FsError::InvalidLayout => write!(f, "Invalid volume layout"),
            FsError::IOError => write!(f, "Disk I/O failure"),
        }
    }
}

/// Sector-addressed storage device.
///
/// Transfers are whole sectors: `buf.len()` must equal
/// `count * sector_size()`.
pub trait BlockDevice: Send + Sync {
    fn identify(&mut self) -> Result<(), FsError>;
    fn read_sectors(&self, start: u64, count: usize, buf: &mut [u8]) -> Result<(), FsError>;
    fn write_sectors(&mut self, start: u64, count: usize, buf: &[u8]) -> Result<(), FsError>;
    fn sector_size(&self) -> usize;
    fn total_sectors(&self) -> u64;
}
