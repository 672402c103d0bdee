//! Mounted volume: the single access context for superblock, directory and
//! FAT state.

use super::directory::validate_name;
use super::*;
use alloc::string::String;
use alloc::vec::Vec;
use log::{error, info, warn};

/// Clusters reserved for a newly created file
const CLUSTERS_PER_FILE: u32 = 1;

/// A mounted filesystem and the device it lives on.
///
/// All metadata mutation goes through `&mut self`, which makes the
/// single-writer discipline of the kernel explicit.
pub struct Volume<D: BlockDevice> {
    device: D,
    layout: FsLayout,
    superblock: SuperblockManager,
    directory: DirectoryTable,
    fat: FatAllocator,
}

impl<D: BlockDevice> Volume<D> {
    /// Lays down an empty filesystem and mounts it
    pub fn format(mut device: D, layout: FsLayout, label: &str) -> Result<Self, FsError> {
        device.identify()?;
        let sector_size = device.sector_size();
        let total_sectors = device.total_sectors();
        layout.validate(sector_size, total_sectors)?;

        let superblock = Superblock {
            total_sectors: u32::try_from(total_sectors).map_err(|_| FsError::InvalidLayout)?,
            sectors_per_cluster: layout.sectors_per_cluster,
            bytes_per_sector: u16::try_from(sector_size).map_err(|_| FsError::InvalidLayout)?,
            available_sectors: layout.max_clusters as u32,
            available_direntries: layout.max_dir as u32,
            label: Superblock::encode_label(label)?,
        };

        DirectoryTable::format(&mut device, &layout)?;
        FatAllocator::new(&layout, sector_size).format(&mut device)?;
        SuperblockManager::create(&mut device, &layout, superblock)?;

        info!(
            "Formatted volume '{}': {} sectors, {} slots, {} clusters",
            label, total_sectors, layout.max_dir, layout.max_clusters
        );
        Self::mount(device, layout)
    }

    /// Reads the superblock and directory table into memory
    pub fn mount(mut device: D, layout: FsLayout) -> Result<Self, FsError> {
        device.identify()?;
        let sector_size = device.sector_size();
        layout.validate(sector_size, device.total_sectors())?;

        let superblock = SuperblockManager::mount(&mut device, &layout)?;
        let directory = DirectoryTable::load(&mut device, &layout)?;
        let fat = FatAllocator::new(&layout, sector_size);

        Ok(Self {
            device,
            layout,
            superblock,
            directory,
            fat,
        })
    }

    /// Mounts and logs the volume summary
    pub fn mount_and_report(device: D, layout: FsLayout) -> Result<Self, FsError> {
        let volume = Self::mount(device, layout)?;
        volume.report();
        Ok(volume)
    }

    /// Logs geometry, free counters, label and per-slot occupancy
    pub fn report(&self) {
        let sb = self.superblock.superblock();
        info!("Filesystem initialized with the following parameters:");
        info!("Total sectors: {}", sb.total_sectors);
        info!("Sectors per cluster: {}", sb.sectors_per_cluster);
        info!("Bytes per sector: {}", sb.bytes_per_sector);
        info!("Available sectors: {}", sb.available_sectors);
        info!("Available dir entries: {}", sb.available_direntries);
        info!("Filesystem label: {}", sb.label());
        info!("Dir Status: {}", self.occupancy());
    }

    /// Slot occupancy as a string of `0`/`1` digits
    pub fn occupancy(&self) -> String {
        self.directory
            .occupancy()
            .map(|bit| char::from(b'0' + bit))
            .collect()
    }

    /// Creates an empty file holding one cluster.
    ///
    /// Phases run in order: reserve counters in the superblock, claim a
    /// directory slot, allocate and link a FAT chain. A failing phase
    /// undoes the earlier ones, so on error the volume is unchanged.
    pub fn create_file(&mut self, name: &str) -> Result<usize, FsError> {
        if let Err(e) = validate_name(name) {
            warn!("create_file: invalid filename '{}'", name);
            return Err(e);
        }
        if self.directory.find(&self.device, name)?.is_some() {
            warn!("create_file: '{}' already exists", name);
            return Err(FsError::AlreadyExists);
        }

        if let Err(e) = self.superblock.reserve(&mut self.device, CLUSTERS_PER_FILE) {
            warn!("create_file: superblock: {}", e);
            return Err(e);
        }

        let slot = match self.directory.allocate_slot(&mut self.device, name) {
            Ok(slot) => slot,
            Err(e) => {
                warn!("create_file: directory: {}", e);
                self.undo_reservation(true);
                return Err(e);
            }
        };

        let chain_len = self.superblock.cluster_sectors(CLUSTERS_PER_FILE) as usize;
        let head = match self.fat.allocate_chain(&mut self.device, chain_len) {
            Ok(head) => head,
            Err(e) => {
                warn!("create_file: fat: {}", e);
                let slot_freed = self.undo_slot(slot);
                self.undo_reservation(slot_freed);
                return Err(e);
            }
        };

        if let Err(e) =
            self.fat
                .link_directory_entry(&mut self.device, &mut self.directory, slot, head)
        {
            warn!("create_file: fat: {}", e);
            if let Err(undo) = self.fat.release_chain(&mut self.device, head) {
                error!("create_file: could not release chain at {}: {}", head, undo);
            }
            let slot_freed = self.undo_slot(slot);
            self.undo_reservation(slot_freed);
            return Err(e);
        }

        info!("Created '{}' in slot {} at cluster {}", name, slot, head);
        Ok(slot)
    }

    /// A slot that could not be freed stays counted as used
    fn undo_reservation(&mut self, slot_freed: bool) {
        if let Err(e) = self
            .superblock
            .release(&mut self.device, CLUSTERS_PER_FILE, slot_freed)
        {
            error!("create_file: could not restore superblock counters: {}", e);
        }
    }

    fn undo_slot(&mut self, slot: usize) -> bool {
        match self.directory.release_slot(&mut self.device, slot) {
            Ok(()) => true,
            Err(e) => {
                error!("create_file: could not release slot {}: {}", slot, e);
                false
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Result<DirEntry, FsError> {
        self.directory
            .find(&self.device, name)?
            .map(|(_, entry)| entry)
            .ok_or(FsError::NotFound)
    }

    /// Occupied slots with their records
    pub fn list(&self) -> Result<Vec<(usize, DirEntry)>, FsError> {
        self.directory.entries(&self.device)
    }

    pub fn chain(&self, first_cluster: u16) -> Result<Vec<u16>, FsError> {
        self.fat.chain(&self.device, first_cluster)
    }

    pub fn free_clusters(&self) -> Result<usize, FsError> {
        self.fat.free_count(&self.device)
    }

    pub fn superblock(&self) -> &Superblock {
        self.superblock.superblock()
    }

    pub fn directory(&self) -> &DirectoryTable {
        &self.directory
    }

    pub fn layout(&self) -> &FsLayout {
        &self.layout
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::fs::SECTOR_SIZE;
    use crate::filesys::block::MemoryBlockDevice;

    fn layout(sectors_per_cluster: u16) -> FsLayout {
        FsLayout {
            superblock_sector: 1,
            dir_start: 2,
            fat_start: 3,
            max_dir: 32,
            max_clusters: 256,
            sectors_per_cluster,
        }
    }

    fn formatted(sectors_per_cluster: u16) -> Volume<MemoryBlockDevice> {
        let dev = MemoryBlockDevice::new(300, SECTOR_SIZE);
        Volume::format(dev, layout(sectors_per_cluster), "TESTVOL").unwrap()
    }

    /// Counters must match what the FAT and bitmap actually hold
    fn assert_counters_consistent(volume: &Volume<MemoryBlockDevice>) {
        let sb = volume.superblock();
        assert_eq!(sb.available_sectors as usize, volume.free_clusters().unwrap());
        assert_eq!(
            sb.available_direntries as usize,
            volume.directory().free_slots()
        );
    }

    #[test]
    fn test_format_and_mount() {
        let volume = formatted(2);
        let sb = volume.superblock();
        assert_eq!(sb.total_sectors, 300);
        assert_eq!(sb.sectors_per_cluster, 2);
        assert_eq!(sb.bytes_per_sector, 512);
        assert_eq!(sb.available_sectors, 256);
        assert_eq!(sb.available_direntries, 32);
        assert_eq!(sb.label(), "TESTVOL");
        assert!(volume.device().is_identified());
        assert_eq!(volume.occupancy(), "0".repeat(32));
        assert_counters_consistent(&volume);
    }

    #[test]
    fn test_format_rejects_small_device() {
        let dev = MemoryBlockDevice::new(100, SECTOR_SIZE);
        assert_eq!(
            Volume::format(dev, layout(1), "X").err(),
            Some(FsError::InvalidLayout)
        );
    }

    #[test]
    fn test_create_file_allocates_everything_once() {
        let mut volume = formatted(3);
        let slot = volume.create_file("hello.txt").unwrap();
        assert_eq!(slot, 0);

        let entry = volume.lookup("hello.txt").unwrap();
        assert_eq!(entry.size, 0);
        assert_eq!(entry.fat_entry, 0);
        assert_eq!(volume.chain(entry.fat_entry).unwrap(), vec![0, 1, 2]);

        let sb = volume.superblock();
        assert_eq!(sb.available_direntries, 31);
        assert_eq!(sb.available_sectors, 253);
        assert_counters_consistent(&volume);
    }

    #[test]
    fn test_files_get_consecutive_slots_and_chains() {
        let mut volume = formatted(2);
        assert_eq!(volume.create_file("a").unwrap(), 0);
        assert_eq!(volume.create_file("b").unwrap(), 1);

        let b = volume.lookup("b").unwrap();
        assert_eq!(volume.chain(b.fat_entry).unwrap(), vec![2, 3]);
        assert_eq!(volume.occupancy()[..3], *"110");

        let names: Vec<String> = volume
            .list()
            .unwrap()
            .into_iter()
            .map(|(_, e)| String::from(e.name()))
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_invalid_name_changes_nothing() {
        let mut volume = formatted(1);
        let writes = volume.device().write_count();
        assert_eq!(volume.create_file("eleven-char"), Err(FsError::InvalidName));
        assert_eq!(volume.create_file(""), Err(FsError::InvalidName));
        assert_eq!(volume.device().write_count(), writes);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut volume = formatted(1);
        volume.create_file("dup").unwrap();
        assert_eq!(volume.create_file("dup"), Err(FsError::AlreadyExists));
        assert_eq!(volume.superblock().available_direntries, 31);
    }

    #[test]
    fn test_directory_exhaustion_reported_by_superblock() {
        let mut volume = formatted(1);
        for i in 0..32 {
            volume.create_file(&alloc::format!("f{}", i)).unwrap();
        }
        assert_eq!(volume.create_file("one-more"), Err(FsError::NoFreeDirectorySlot));
        assert_counters_consistent(&volume);
    }

    #[test]
    fn test_sector_exhaustion_fails_before_mutation() {
        // 256 entries, 100 per file: the third file cannot fit
        let mut volume = formatted(100);
        volume.create_file("a").unwrap();
        volume.create_file("b").unwrap();
        assert_eq!(volume.superblock().available_sectors, 56);

        let before = volume.superblock().clone();
        let writes = volume.device().write_count();
        assert_eq!(volume.create_file("c"), Err(FsError::NoFreeSectors));
        assert_eq!(volume.superblock(), &before);
        assert_eq!(volume.device().write_count(), writes);
        assert_counters_consistent(&volume);
    }

    #[test]
    fn test_fat_failure_rolls_back_superblock_and_slot() {
        let mut volume = formatted(2);
        volume.create_file("a").unwrap();

        // Hide free FAT entries from the counters so phase 1 passes and
        // phase 3 runs out
        let fat = FatAllocator::new(volume.layout(), SECTOR_SIZE);
        let mut table = fat.load(volume.device()).unwrap();
        table.allocate_chain(253).unwrap();
        fat.store(volume.device_mut(), &table).unwrap();

        let sb_before = volume.superblock().clone();
        let fat_before = fat.load(volume.device()).unwrap();
        assert_eq!(volume.create_file("b"), Err(FsError::NoFreeClusters));

        assert_eq!(volume.superblock(), &sb_before);
        assert_eq!(fat.load(volume.device()).unwrap(), fat_before);
        assert!(!volume.directory().is_occupied(1));
        assert_eq!(volume.lookup("b"), Err(FsError::NotFound));

        let remounted = Volume::mount(volume.into_device(), layout(2)).unwrap();
        assert_eq!(remounted.superblock(), &sb_before);
        assert!(!remounted.directory().is_occupied(1));
    }

    #[test]
    fn test_directory_full_despite_counter_rolls_back() {
        let mut volume = formatted(1);
        let before = volume.superblock().clone();

        // occupied records the superblock does not account for
        let region = vec![b'x'; SECTOR_SIZE];
        volume.device_mut().write_sectors(2, 1, &region).unwrap();
        let mut volume = Volume::mount(volume.into_device(), layout(1)).unwrap();
        assert_eq!(volume.directory().free_slots(), 0);
        assert_eq!(volume.superblock().available_direntries, 32);

        assert_eq!(volume.create_file("new"), Err(FsError::DirectoryFull));
        assert_eq!(volume.superblock(), &before);

        let remounted = Volume::mount(volume.into_device(), layout(1)).unwrap();
        assert_eq!(remounted.superblock(), &before);
    }

    #[test]
    fn test_stuck_slot_stays_counted_as_used() {
        let mut volume = formatted(2);
        volume.create_file("a").unwrap();

        let fat = FatAllocator::new(volume.layout(), SECTOR_SIZE);
        let mut table = fat.load(volume.device()).unwrap();
        table.allocate_chain(253).unwrap();
        fat.store(volume.device_mut(), &table).unwrap();
        let before = volume.superblock().clone();

        // writes: superblock, directory, then freeing the slot fails
        volume.device_mut().fail_write_after(Some(2));
        assert_eq!(volume.create_file("b"), Err(FsError::NoFreeClusters));

        let sb = volume.superblock();
        assert_eq!(sb.available_sectors, before.available_sectors);
        assert_eq!(sb.available_direntries, before.available_direntries - 1);
        assert!(volume.directory().is_occupied(1));
        assert_eq!(
            sb.available_direntries as usize,
            volume.directory().free_slots()
        );
    }

    #[test]
    fn test_directory_write_failure_restores_counters() {
        let mut volume = formatted(1);
        let before = volume.superblock().clone();

        // write 1: superblock reservation, write 2: directory region
        volume.device_mut().fail_write_after(Some(1));
        assert_eq!(volume.create_file("a"), Err(FsError::IOError));
        assert_eq!(volume.superblock(), &before);
        assert!(!volume.directory().is_occupied(0));

        let remounted = Volume::mount(volume.into_device(), layout(1)).unwrap();
        assert_eq!(remounted.superblock(), &before);
        assert!(!remounted.directory().is_occupied(0));
    }

    #[test]
    fn test_link_failure_releases_chain() {
        let mut volume = formatted(2);
        let before = volume.superblock().clone();

        // writes: superblock, directory, FAT, then the link rewrite fails
        volume.device_mut().fail_write_after(Some(3));
        assert_eq!(volume.create_file("a"), Err(FsError::IOError));

        assert_eq!(volume.superblock(), &before);
        assert_eq!(volume.free_clusters().unwrap(), 256);
        assert!(volume.list().unwrap().is_empty());
        assert_counters_consistent(&volume);

        // the volume is still usable afterwards
        assert_eq!(volume.create_file("a").unwrap(), 0);
        assert_eq!(volume.lookup("a").unwrap().fat_entry, 0);
    }

    #[test]
    fn test_remount_reproduces_state() {
        let mut volume = formatted(2);
        volume.create_file("boot.cfg").unwrap();
        volume.create_file("init").unwrap();
        let sb = volume.superblock().clone();
        let listing = volume.list().unwrap();

        let remounted = Volume::mount_and_report(volume.into_device(), layout(2)).unwrap();
        assert_eq!(remounted.superblock(), &sb);
        assert_eq!(remounted.list().unwrap(), listing);
        assert_eq!(remounted.occupancy()[..2], *"11");
        let head = remounted.lookup("init").unwrap().fat_entry;
        let chain = remounted.chain(head).unwrap();
        assert_eq!(chain, vec![2, 3]);
    }
}
