//! In-memory block device implementation

use crate::filesys::{BlockDevice, FsError};
use alloc::vec;
use alloc::vec::Vec;
use core::result::Result;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Block device that stores data in memory
pub struct MemoryBlockDevice {
    /// Sectors of data, each sector_size bytes
    sectors: Vec<Vec<u8>>,

    /// Size of each sector in bytes
    sector_size: usize,

    /// Set once `identify` has been called
    identified: bool,

    /// Number of read transfers served
    reads: AtomicUsize,

    /// Number of write transfers served
    writes: AtomicUsize,

    /// Writes left before one injected failure, if armed
    fail_after: Option<usize>,
}

impl MemoryBlockDevice {
    /// Creates a new zero-filled memory device with given size
    pub fn new(total_sectors: u64, sector_size: usize) -> Self {
        let sectors = (0..total_sectors).map(|_| vec![0; sector_size]).collect();
        Self {
            sectors,
            sector_size,
            identified: false,
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            fail_after: None,
        }
    }

    pub fn is_identified(&self) -> bool {
        self.identified
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// Lets `n` more writes succeed, fails the next one with `IOError`,
    /// then behaves normally again. `None` disarms.
    pub fn fail_write_after(&mut self, n: Option<usize>) {
        self.fail_after = n;
    }

    /// Raw view of one sector
    pub fn sector(&self, sector: u64) -> Option<&[u8]> {
        self.sectors.get(sector as usize).map(Vec::as_slice)
    }

    /// Validates the sector range and buffer length of a transfer
    fn validate(&self, start: u64, count: usize, len: usize) -> Result<(), FsError> {
        let end = start
            .checked_add(count as u64)
            .ok_or(FsError::IOError)?;
        if count == 0 || end > self.sectors.len() as u64 {
            return Err(FsError::IOError);
        }
        if len != count * self.sector_size {
            return Err(FsError::IOError);
        }
        Ok(())
    }
}

impl BlockDevice for MemoryBlockDevice {
    fn identify(&mut self) -> Result<(), FsError> {
        self.identified = true;
        Ok(())
    }

    /// Reads `count` sectors into buffer
    fn read_sectors(&self, start: u64, count: usize, buf: &mut [u8]) -> Result<(), FsError> {
        self.validate(start, count, buf.len())?;
        for (i, chunk) in buf.chunks_exact_mut(self.sector_size).enumerate() {
            chunk.copy_from_slice(&self.sectors[start as usize + i]);
        }
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Writes buffer to `count` sectors
    fn write_sectors(&mut self, start: u64, count: usize, buf: &[u8]) -> Result<(), FsError> {
        self.validate(start, count, buf.len())?;
        match self.fail_after {
            Some(0) => {
                self.fail_after = None;
                return Err(FsError::IOError);
            }
            Some(ref mut left) => *left -= 1,
            None => {}
        }
        for (i, chunk) in buf.chunks_exact(self.sector_size).enumerate() {
            self.sectors[start as usize + i].copy_from_slice(chunk);
        }
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Returns size of each sector
    fn sector_size(&self) -> usize {
        self.sector_size
    }

    /// Returns total number of sectors
    fn total_sectors(&self) -> u64 {
        self.sectors.len() as u64
    }
}
