//! Fixed-capacity directory table
//!
//! Each slot is a 16-byte record inside one contiguous region that is
//! always transferred whole.

use super::{BlockDevice, FsError, FsLayout};
use crate::constants::fs::{DIR_ENTRY_SIZE, FREE_ENTRY_MARKER, MAX_FILENAME_LENGTH};
use alloc::vec;
use alloc::vec::Vec;

/// Name field width: the visible characters plus a terminator
const NAME_FIELD: usize = MAX_FILENAME_LENGTH + 1;
const SIZE_OFFSET: usize = 12;
const FAT_ENTRY_OFFSET: usize = 14;

/// On-disk directory record (16 bytes)
///
/// | bytes  | field                        |
/// |--------|------------------------------|
/// | 0..11  | name, NUL terminated/padded  |
/// | 11     | reserved                     |
/// | 12..14 | size, little-endian          |
/// | 14..16 | first cluster, little-endian |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    name: [u8; NAME_FIELD],
    pub size: u16,
    pub fat_entry: u16,
}

/// Rejects names that cannot be stored or would read back as a free slot.
pub fn validate_name(name: &str) -> Result<(), FsError> {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes.len() > MAX_FILENAME_LENGTH {
        return Err(FsError::InvalidName);
    }
    if bytes[0] == FREE_ENTRY_MARKER || bytes.contains(&0) {
        return Err(FsError::InvalidName);
    }
    Ok(())
}

impl DirEntry {
    /// Creates a zero-sized entry
    pub fn new(name: &str, fat_entry: u16) -> Result<Self, FsError> {
        validate_name(name)?;
        let mut field = [0u8; NAME_FIELD];
        field[..name.len()].copy_from_slice(name.as_bytes());
        Ok(Self {
            name: field,
            size: 0,
            fat_entry,
        })
    }

    pub fn name(&self) -> &str {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_FIELD);
        core::str::from_utf8(&self.name[..end]).unwrap_or("")
    }

    /// Returns true if the raw record marks an unused slot
    pub fn is_free_record(raw: &[u8]) -> bool {
        raw[0] == 0 || raw[0] == FREE_ENTRY_MARKER
    }

    pub fn encode(&self, out: &mut [u8]) {
        out[..DIR_ENTRY_SIZE].fill(0);
        out[..NAME_FIELD].copy_from_slice(&self.name);
        out[SIZE_OFFSET..SIZE_OFFSET + 2].copy_from_slice(&self.size.to_le_bytes());
        out[FAT_ENTRY_OFFSET..FAT_ENTRY_OFFSET + 2].copy_from_slice(&self.fat_entry.to_le_bytes());
    }

    pub fn decode(raw: &[u8]) -> Self {
        let mut name = [0u8; NAME_FIELD];
        name.copy_from_slice(&raw[..NAME_FIELD]);
        // A full-width name on disk still reads back terminated
        name[NAME_FIELD - 1] = 0;
        Self {
            name,
            size: u16::from_le_bytes([raw[SIZE_OFFSET], raw[SIZE_OFFSET + 1]]),
            fat_entry: u16::from_le_bytes([raw[FAT_ENTRY_OFFSET], raw[FAT_ENTRY_OFFSET + 1]]),
        }
    }
}

/// Slot occupancy bitmap mirroring the on-disk directory region.
#[derive(Debug)]
pub struct DirectoryTable {
    occupied: Vec<bool>,
    start: u64,
    sectors: usize,
}

impl DirectoryTable {
    /// Writes an empty directory region
    pub fn format(device: &mut dyn BlockDevice, layout: &FsLayout) -> Result<(), FsError> {
        let sectors = layout.dir_sectors(device.sector_size());
        let zero = vec![0u8; layout.dir_bytes()];
        device.write_sectors(layout.dir_start, sectors, &zero)
    }

    /// Reads the whole region in one transfer and derives occupancy from
    /// each record's first byte.
    pub fn load(device: &mut dyn BlockDevice, layout: &FsLayout) -> Result<Self, FsError> {
        let mut table = Self {
            occupied: Vec::new(),
            start: layout.dir_start,
            sectors: layout.dir_sectors(device.sector_size()),
        };
        let region = table.read_region(device)?;
        table.occupied = region
            .chunks_exact(DIR_ENTRY_SIZE)
            .map(|raw| !DirEntry::is_free_record(raw))
            .collect();
        Ok(table)
    }

    pub fn capacity(&self) -> usize {
        self.occupied.len()
    }

    pub fn is_occupied(&self, index: usize) -> bool {
        self.occupied.get(index).copied().unwrap_or(false)
    }

    pub fn free_slots(&self) -> usize {
        self.occupied.iter().filter(|&&used| !used).count()
    }

    /// One digit per slot, `1` when occupied
    pub fn occupancy(&self) -> impl Iterator<Item = u8> + '_ {
        self.occupied.iter().map(|&used| used as u8)
    }

    /// Claims the lowest free slot for `name`.
    ///
    /// The record's `fat_entry` holds the slot index until
    /// `set_first_cluster` replaces it. Nothing changes when the name is
    /// invalid, the table is full or the write fails.
    pub fn allocate_slot(
        &mut self,
        device: &mut dyn BlockDevice,
        name: &str,
    ) -> Result<usize, FsError> {
        validate_name(name)?;
        let index = self
            .occupied
            .iter()
            .position(|&used| !used)
            .ok_or(FsError::DirectoryFull)?;
        let entry = DirEntry::new(name, index as u16)?;

        let mut region = self.read_region(device)?;
        entry.encode(record_mut(&mut region, index));
        self.write_region(device, &region)?;

        self.occupied[index] = true;
        Ok(index)
    }

    /// Points an occupied slot at the head of its cluster chain
    pub fn set_first_cluster(
        &mut self,
        device: &mut dyn BlockDevice,
        index: usize,
        cluster: u16,
    ) -> Result<(), FsError> {
        if !self.is_occupied(index) {
            return Err(FsError::NotFound);
        }
        let mut region = self.read_region(device)?;
        record_mut(&mut region, index)[FAT_ENTRY_OFFSET..FAT_ENTRY_OFFSET + 2]
            .copy_from_slice(&cluster.to_le_bytes());
        self.write_region(device, &region)
    }

    /// Marks a slot free again, on disk and in the bitmap
    pub fn release_slot(
        &mut self,
        device: &mut dyn BlockDevice,
        index: usize,
    ) -> Result<(), FsError> {
        if !self.is_occupied(index) {
            return Err(FsError::NotFound);
        }
        let mut region = self.read_region(device)?;
        let record = record_mut(&mut region, index);
        record.fill(0);
        record[0] = FREE_ENTRY_MARKER;
        self.write_region(device, &region)?;

        self.occupied[index] = false;
        Ok(())
    }

    /// Decodes every occupied slot
    pub fn entries(&self, device: &dyn BlockDevice) -> Result<Vec<(usize, DirEntry)>, FsError> {
        let region = self.read_region(device)?;
        Ok(region
            .chunks_exact(DIR_ENTRY_SIZE)
            .enumerate()
            .filter(|(index, _)| self.is_occupied(*index))
            .map(|(index, raw)| (index, DirEntry::decode(raw)))
            .collect())
    }

    pub fn find(
        &self,
        device: &dyn BlockDevice,
        name: &str,
    ) -> Result<Option<(usize, DirEntry)>, FsError> {
        Ok(self
            .entries(device)?
            .into_iter()
            .find(|(_, entry)| entry.name() == name))
    }

    fn read_region(&self, device: &dyn BlockDevice) -> Result<Vec<u8>, FsError> {
        let mut region = vec![0u8; self.sectors * device.sector_size()];
        device.read_sectors(self.start, self.sectors, &mut region)?;
        Ok(region)
    }

    fn write_region(&self, device: &mut dyn BlockDevice, region: &[u8]) -> Result<(), FsError> {
        device.write_sectors(self.start, self.sectors, region)
    }
}

fn record_mut(region: &mut [u8], index: usize) -> &mut [u8] {
    &mut region[index * DIR_ENTRY_SIZE..(index + 1) * DIR_ENTRY_SIZE]
}
