//! # 分配器
//!
//! 超级块与两张位图只归分配器所有。每次分配、释放都立即写穿：
//! 先写受影响的位图块，再写超级块。两次写之间出错会使二者不一致，
//! 这里不做任何补救。

use crate::{
    layout::{Bitmap, SuperBlock},
    BlockId, BlockStore, Error, InodeId, Resource, Result,
};

#[derive(Debug, Clone)]
pub struct Allocator {
    super_block: SuperBlock,
    inode_bitmap: Bitmap,
    /// 只覆盖数据区：第 i 位对应块 `data_start + i`
    block_bitmap: Bitmap,
}

impl Allocator {
    /// 全空的分配器，用于格式化
    pub fn new(super_block: SuperBlock) -> Self {
        let inode_bitmap = Bitmap::new(
            super_block.inode_bitmap_start,
            super_block.inode_bitmap_blocks,
            super_block.inode_count,
        );
        let block_bitmap = Bitmap::new(
            super_block.block_bitmap_start,
            super_block.block_bitmap_blocks,
            super_block.data_blocks,
        );

        Self {
            super_block,
            inode_bitmap,
            block_bitmap,
        }
    }

    /// 把磁盘上的两张位图读进内存
    pub fn load(store: &BlockStore, super_block: SuperBlock) -> Result<Self> {
        let inode_bitmap = Bitmap::load(
            store,
            super_block.inode_bitmap_start,
            super_block.inode_bitmap_blocks,
            super_block.inode_count,
        )?;
        let block_bitmap = Bitmap::load(
            store,
            super_block.block_bitmap_start,
            super_block.block_bitmap_blocks,
            super_block.data_blocks,
        )?;

        let alloc = Self {
            super_block,
            inode_bitmap,
            block_bitmap,
        };
        if !alloc.is_consistent() {
            log::warn!(
                "free counters disagree with bitmaps: {} blocks / {} inodes recorded free, {} / {} by bitmap",
                alloc.super_block.free_blocks,
                alloc.super_block.free_inodes,
                alloc.super_block.data_blocks.saturating_sub(alloc.allocated_blocks()),
                alloc.super_block.inode_count.saturating_sub(alloc.allocated_inodes()),
            );
        }

        Ok(alloc)
    }

    #[inline]
    pub fn super_block(&self) -> &SuperBlock {
        &self.super_block
    }

    #[inline]
    pub fn allocated_blocks(&self) -> u32 {
        self.block_bitmap.count_set()
    }

    #[inline]
    pub fn allocated_inodes(&self) -> u32 {
        self.inode_bitmap.count_set()
    }

    /// 空闲计数与位图是否一致
    pub fn is_consistent(&self) -> bool {
        let sb = &self.super_block;
        sb.free_blocks + self.allocated_blocks() == sb.data_blocks
            && sb.free_inodes + self.allocated_inodes() == sb.inode_count
    }

    pub fn is_block_allocated(&self, id: BlockId) -> bool {
        u32::from(id)
            .checked_sub(self.super_block.data_start)
            .is_some_and(|index| self.block_bitmap.is_set(index))
    }

    #[inline]
    pub fn is_inode_allocated(&self, id: InodeId) -> bool {
        self.inode_bitmap.is_set(id.into())
    }

    /// 分配编号最小的空闲数据块，并清零其内容
    pub fn alloc_block(&mut self, store: &BlockStore) -> Result<BlockId> {
        let Some(index) = self.block_bitmap.first_clear() else {
            log::warn!("data region exhausted");
            return Err(Error::AllocationExhausted(Resource::Block));
        };

        self.block_bitmap.set(index);
        if let Err(e) = self.block_bitmap.persist_bit(store, index) {
            self.block_bitmap.clear(index);
            return Err(e);
        }
        self.super_block.free_blocks -= 1;
        self.super_block.persist(store)?;

        let id = BlockId::new(self.super_block.data_start + index);
        store.zero_block(id)?;
        log::debug!("alloc block {id}");

        Ok(id)
    }

    pub fn free_block(&mut self, store: &BlockStore, id: BlockId) -> Result<()> {
        let raw = u32::from(id);
        let Some(index) = raw
            .checked_sub(self.super_block.data_start)
            .filter(|&index| self.block_bitmap.is_set(index))
        else {
            log::warn!("refuse to free block {id}: not an allocated data block");
            return Err(Error::InvalidRelease(raw));
        };

        self.block_bitmap.clear(index);
        self.block_bitmap.persist_bit(store, index)?;
        self.super_block.free_blocks += 1;
        self.super_block.persist(store)?;
        log::debug!("free block {id}");

        Ok(())
    }

    /// 分配编号最小的空闲 inode；记录本身由 inode 表负责初始化
    pub fn alloc_inode(&mut self, store: &BlockStore) -> Result<InodeId> {
        let Some(index) = self.inode_bitmap.first_clear() else {
            log::warn!("inode table exhausted");
            return Err(Error::AllocationExhausted(Resource::Inode));
        };

        self.inode_bitmap.set(index);
        if let Err(e) = self.inode_bitmap.persist_bit(store, index) {
            self.inode_bitmap.clear(index);
            return Err(e);
        }
        self.super_block.free_inodes -= 1;
        self.super_block.persist(store)?;
        log::debug!("alloc inode {index}");

        Ok(InodeId::new(index))
    }

    pub fn free_inode(&mut self, store: &BlockStore, id: InodeId) -> Result<()> {
        let index = u32::from(id);
        if !self.inode_bitmap.is_set(index) {
            log::warn!("refuse to free inode {id}: not allocated");
            return Err(Error::InvalidRelease(index));
        }

        self.inode_bitmap.clear(index);
        self.inode_bitmap.persist_bit(store, index)?;
        self.super_block.free_inodes += 1;
        self.super_block.persist(store)?;
        log::debug!("free inode {id}");

        Ok(())
    }

    /// 完整写回超级块与全部位图块
    pub fn sync(&self, store: &BlockStore) -> Result<()> {
        self.super_block.persist(store)?;
        self.inode_bitmap.persist_all(store)?;
        self.block_bitmap.persist_all(store)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use block_dev::RamDisk;

    use super::*;
    use crate::{Geometry, BLOCK_SIZE};

    fn fresh() -> (BlockStore, Allocator) {
        let geometry = Geometry {
            total_blocks: 256,
            inode_count: 16,
        };
        let store =
            BlockStore::new(Arc::new(RamDisk::new(BLOCK_SIZE, geometry.total_blocks as usize)))
                .unwrap();
        let alloc = Allocator::new(geometry.layout().unwrap());
        alloc.sync(&store).unwrap();
        (store, alloc)
    }

    #[test]
    fn blocks_come_from_the_data_region_lowest_first() {
        let (store, mut alloc) = fresh();
        let start = alloc.super_block().data_start;

        let a = alloc.alloc_block(&store).unwrap();
        let b = alloc.alloc_block(&store).unwrap();
        assert_eq!(u32::from(a), start);
        assert_eq!(u32::from(b), start + 1);

        alloc.free_block(&store, a).unwrap();
        assert_eq!(alloc.alloc_block(&store).unwrap(), a);
        assert!(alloc.is_consistent());
    }

    #[test]
    fn freshly_allocated_block_is_zeroed() {
        let (store, mut alloc) = fresh();
        let id = alloc.alloc_block(&store).unwrap();
        store.modify(id, |data| data.fill(0x5A)).unwrap();
        alloc.free_block(&store, id).unwrap();

        let id = alloc.alloc_block(&store).unwrap();
        assert!(store.read_block(id).unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn bad_releases_are_rejected() {
        let (store, mut alloc) = fresh();
        let start = alloc.super_block().data_start;

        assert!(matches!(
            alloc.free_block(&store, BlockId::new(1)),
            Err(Error::InvalidRelease(1))
        ));
        assert!(matches!(
            alloc.free_block(&store, BlockId::new(start)),
            Err(Error::InvalidRelease(_))
        ));
        assert!(matches!(
            alloc.free_inode(&store, InodeId::new(3)),
            Err(Error::InvalidRelease(3))
        ));
        assert!(alloc.is_consistent());
    }

    #[test]
    fn inode_exhaustion_is_reported() {
        let (store, mut alloc) = fresh();
        for i in 0..16 {
            assert_eq!(alloc.alloc_inode(&store).unwrap(), InodeId::new(i));
        }
        assert!(matches!(
            alloc.alloc_inode(&store),
            Err(Error::AllocationExhausted(Resource::Inode))
        ));
        assert_eq!(alloc.super_block().free_inodes, 0);
    }

    #[test]
    fn bitmaps_survive_reload() {
        let (store, mut alloc) = fresh();
        let block = alloc.alloc_block(&store).unwrap();
        let inode = alloc.alloc_inode(&store).unwrap();

        let sb = SuperBlock::read(&store).unwrap();
        let reloaded = Allocator::load(&store, sb).unwrap();
        assert!(reloaded.is_block_allocated(block));
        assert!(reloaded.is_inode_allocated(inode));
        assert!(reloaded.is_consistent());
    }
}
