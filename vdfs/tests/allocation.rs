use std::sync::Arc;

use block_dev::RamDisk;
use vdfs::{BlockId, Error, FileSystem, Geometry, InodeId, Resource, BLOCK_SIZE};

fn small_fs() -> FileSystem {
    let geometry = Geometry {
        total_blocks: 200,
        inode_count: 24,
    };
    FileSystem::format(
        Arc::new(RamDisk::new(BLOCK_SIZE, geometry.total_blocks as usize)),
        geometry,
    )
    .unwrap()
}

fn assert_conserved(fs: &FileSystem) {
    let stat = fs.stat_fs();
    assert_eq!(stat.free_blocks, stat.data_blocks - fs.allocated_blocks());
    assert_eq!(stat.free_inodes, stat.inode_count - fs.allocated_inodes());
}

#[test]
fn counters_track_bitmaps_through_mixed_sequence() {
    let mut fs = small_fs();
    assert_conserved(&fs);

    let mut blocks = Vec::new();
    for round in 0..30 {
        blocks.push(fs.alloc_block().unwrap());
        if round % 3 == 0 {
            let victim = blocks.remove(round % blocks.len());
            fs.free_block(victim).unwrap();
        }
        assert_conserved(&fs);
    }

    let inodes: Vec<_> = (0..5).map(|_| fs.alloc_inode().unwrap()).collect();
    assert_conserved(&fs);
    for id in inodes {
        fs.free_inode(id).unwrap();
        assert_conserved(&fs);
    }
}

#[test]
fn allocation_never_hands_out_a_set_bit() {
    let mut fs = small_fs();
    let mut seen = Vec::new();
    loop {
        let before: Vec<_> = seen.clone();
        match fs.alloc_block() {
            Ok(id) => {
                assert!(!before.contains(&id));
                assert!(fs.is_block_allocated(id));
                seen.push(id);
            }
            Err(Error::AllocationExhausted(Resource::Block)) => break,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(fs.stat_fs().free_blocks, 0);
    assert_conserved(&fs);
}

#[test]
fn freed_inode_is_reused_and_zeroed() {
    let mut fs = small_fs();
    let id = fs.alloc_inode().unwrap();
    let mut inode = fs.read_inode(id).unwrap();
    inode.size = 99;
    inode.owner = 42;
    inode.direct[0] = BlockId::new(150);
    fs.write_inode(&inode).unwrap();

    fs.free_inode(id).unwrap();
    let record = fs.read_inode(id).unwrap();
    assert_eq!(record, vdfs::DiskInode::empty(id));

    assert_eq!(fs.alloc_inode().unwrap(), id);
}

#[test]
fn metadata_blocks_cannot_be_released() {
    let mut fs = small_fs();
    let data_start = fs.super_block().data_start;

    for id in [0, 1, data_start - 1] {
        assert!(matches!(
            fs.free_block(BlockId::new(id)),
            Err(Error::InvalidRelease(_))
        ));
    }
    assert!(matches!(
        fs.free_inode(InodeId::new(23)),
        Err(Error::InvalidRelease(23))
    ));
    assert_conserved(&fs);
}
