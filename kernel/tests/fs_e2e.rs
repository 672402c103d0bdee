use minos::constants::fs::{MAX_DIR, MAX_SECTORS, SECTOR_SIZE};
use minos::filesys::block::MemoryBlockDevice;
use minos::filesys::{FsError, FsLayout, Volume};

fn fresh_volume() -> Volume<MemoryBlockDevice> {
    let device = MemoryBlockDevice::new(4096, SECTOR_SIZE);
    Volume::format(device, FsLayout::default(), "minos").unwrap()
}

#[test]
fn test_format_create_and_remount() {
    let mut volume = fresh_volume();
    assert_eq!(volume.superblock().label(), "minos");
    assert_eq!(volume.superblock().available_sectors, MAX_SECTORS as u32);
    assert_eq!(volume.superblock().available_direntries, MAX_DIR as u32);

    let names = ["boot.cfg", "init", "motd"];
    let slots: Vec<usize> = names
        .iter()
        .map(|name| volume.create_file(name).unwrap())
        .collect();
    assert_eq!(slots, vec![0, 1, 2]);

    let volume = Volume::mount(volume.into_device(), FsLayout::default()).unwrap();
    let sb = volume.superblock();
    assert_eq!(sb.available_sectors, MAX_SECTORS as u32 - 3);
    assert_eq!(sb.available_direntries, MAX_DIR as u32 - 3);
    assert_eq!(volume.occupancy().chars().filter(|&c| c == '1').count(), 3);
    assert_eq!(
        volume.free_clusters().unwrap(),
        sb.available_sectors as usize
    );

    for name in names {
        let entry = volume.lookup(name).unwrap();
        assert_eq!(entry.name(), name);
        let chain = volume.chain(entry.fat_entry).unwrap();
        assert_eq!(chain.len(), 1);
    }
}

#[test]
fn test_directory_exhaustion_is_reported() {
    let mut volume = fresh_volume();
    for i in 0..MAX_DIR {
        volume.create_file(&format!("f{}", i)).unwrap();
    }
    assert_eq!(
        volume.create_file("overflow"),
        Err(FsError::NoFreeDirectorySlot)
    );
    assert_eq!(volume.superblock().available_direntries, 0);
    assert_eq!(volume.list().unwrap().len(), MAX_DIR);
}

#[test]
fn test_garbage_disk_does_not_mount() {
    let device = MemoryBlockDevice::new(4096, SECTOR_SIZE);
    assert_eq!(
        Volume::mount(device, FsLayout::default()).err(),
        Some(FsError::BadSuperblock)
    );
}
