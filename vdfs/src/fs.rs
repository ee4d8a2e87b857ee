//! # 磁盘管理层
//!
//! 构建出磁盘的布局并使用：格式化、挂载，并把块存储、分配器与 inode 表串起来。

use std::sync::Arc;

use block_dev::BlockDevice;
use enumflags2::BitFlags;
use typed_bytesize::ByteSizeIec;

use crate::{
    allocator::Allocator, inode_table::InodeTable, layout::SuperBlock, BlockId, BlockStore,
    DirEntry, DiskInode, Error, InodeId, InodeKind, Permission, Result, BLOCK_BITS, BLOCK_SIZE,
    DIR_DEFAULT_PERM, INODES_PER_BLOCK,
};

pub struct FileSystem {
    pub(crate) store: BlockStore,
    pub(crate) alloc: Allocator,
    pub(crate) inodes: InodeTable,
}

/// 格式化参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub total_blocks: u32,
    pub inode_count: u32,
}

/// 文件系统的容量统计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsStat {
    pub block_size: u32,
    pub total_blocks: u32,
    pub data_blocks: u32,
    pub free_blocks: u32,
    pub inode_count: u32,
    pub free_inodes: u32,
}

impl Default for Geometry {
    /// 16 MiB 的磁盘，4096 个 inode
    fn default() -> Self {
        Self {
            total_blocks: (ByteSizeIec::mib(16).0 / BLOCK_SIZE as u64) as u32,
            inode_count: 4096,
        }
    }
}

impl Geometry {
    /// 按 超级块 | inode 位图 | 数据块位图 | inode 区域 | 数据块区域 划分磁盘
    pub fn layout(&self) -> Result<SuperBlock> {
        let bits = BLOCK_BITS as u32;
        if self.inode_count == 0 {
            return Err(Error::InvalidFormat);
        }

        let inode_bitmap_blocks = self.inode_count.div_ceil(bits);
        let inode_table_blocks = self.inode_count.div_ceil(INODES_PER_BLOCK as u32);
        // 余下的块由数据块位图与数据块分享，每个位图块能管理 BLOCK_BITS 个数据块
        let rest = self
            .total_blocks
            .checked_sub(1 + inode_bitmap_blocks + inode_table_blocks)
            .ok_or(Error::InvalidFormat)?;
        let block_bitmap_blocks = rest.div_ceil(bits + 1);
        let data_blocks = rest - block_bitmap_blocks;
        if data_blocks == 0 {
            return Err(Error::InvalidFormat);
        }

        let inode_bitmap_start = 1;
        let block_bitmap_start = inode_bitmap_start + inode_bitmap_blocks;
        let inode_table_start = block_bitmap_start + block_bitmap_blocks;
        let data_start = inode_table_start + inode_table_blocks;

        Ok(SuperBlock {
            block_size: BLOCK_SIZE as u32,
            total_blocks: self.total_blocks,
            free_blocks: data_blocks,
            inode_count: self.inode_count,
            free_inodes: self.inode_count,
            inode_bitmap_start,
            inode_bitmap_blocks,
            block_bitmap_start,
            block_bitmap_blocks,
            inode_table_start,
            inode_table_blocks,
            data_start,
            data_blocks,
            root_inode: InodeId::ROOT,
        })
    }
}

impl FileSystem {
    /// 在设备上建立一个全新的文件系统，只含根目录
    pub fn format(device: Arc<dyn BlockDevice>, geometry: Geometry) -> Result<Self> {
        let mut store = BlockStore::new(device)?;
        if geometry.total_blocks > store.total_blocks() {
            log::error!(
                "geometry needs {} blocks but the device only has {}",
                geometry.total_blocks,
                store.total_blocks()
            );
            return Err(Error::InvalidFormat);
        }
        let super_block = geometry.layout()?;
        store.narrow(super_block.total_blocks);

        // 元数据区全部清零，数据块在分配时再清零
        for i in 0..super_block.data_start {
            store.zero_block(BlockId::new(i))?;
        }

        let alloc = Allocator::new(super_block.clone());
        alloc.sync(&store)?;
        let mut fs = Self {
            store,
            alloc,
            inodes: InodeTable::new(super_block.inode_table_start, super_block.inode_count),
        };

        let root = fs.alloc.alloc_inode(&fs.store)?;
        if root != InodeId::ROOT {
            return Err(Error::InvalidFormat);
        }
        let block = fs.alloc.alloc_block(&fs.store)?;
        fs.init_inode(
            root,
            InodeKind::Directory,
            Permission::from_mode(DIR_DEFAULT_PERM),
            0,
            0,
            Some(block),
        )?;
        fs.add_entry(root, DirEntry::new(".", root)?)?;
        fs.add_entry(root, DirEntry::new("..", root)?)?;

        log::info!(
            "formatted {} blocks: {} inodes, data region {}..{}",
            super_block.total_blocks,
            super_block.inode_count,
            super_block.data_start,
            super_block.total_blocks
        );

        Ok(fs)
    }

    /// 挂载已有的文件系统：先读超级块，再把位图载入内存
    pub fn open(device: Arc<dyn BlockDevice>) -> Result<Self> {
        let mut store = BlockStore::new(device)?;
        if store.total_blocks() == 0 {
            return Err(Error::InvalidFormat);
        }
        let super_block = SuperBlock::read(&store)?;
        if super_block.total_blocks > store.total_blocks() {
            return Err(Error::InvalidFormat);
        }
        store.narrow(super_block.total_blocks);

        let alloc = Allocator::load(&store, super_block.clone())?;
        let fs = Self {
            store,
            alloc,
            inodes: InodeTable::new(super_block.inode_table_start, super_block.inode_count),
        };
        if !fs.read_inode(fs.root())?.is_dir() {
            log::error!("root inode is not a directory");
            return Err(Error::InvalidFormat);
        }

        log::info!(
            "opened vdfs: {}/{} blocks free, {}/{} inodes free",
            super_block.free_blocks,
            super_block.data_blocks,
            super_block.free_inodes,
            super_block.inode_count
        );
        Ok(fs)
    }

    /// 完整写回超级块与位图
    pub fn sync(&self) -> Result<()> {
        self.alloc.sync(&self.store)?;
        log::info!("superblock and bitmaps flushed");
        Ok(())
    }

    pub fn stat_fs(&self) -> FsStat {
        let sb = self.alloc.super_block();
        FsStat {
            block_size: sb.block_size,
            total_blocks: sb.total_blocks,
            data_blocks: sb.data_blocks,
            free_blocks: sb.free_blocks,
            inode_count: sb.inode_count,
            free_inodes: sb.free_inodes,
        }
    }

    #[inline]
    pub fn root(&self) -> InodeId {
        self.alloc.super_block().root_inode
    }

    #[inline]
    pub fn super_block(&self) -> &SuperBlock {
        self.alloc.super_block()
    }

    #[inline]
    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    #[inline]
    pub fn is_block_allocated(&self, id: BlockId) -> bool {
        self.alloc.is_block_allocated(id)
    }

    #[inline]
    pub fn is_inode_allocated(&self, id: InodeId) -> bool {
        self.alloc.is_inode_allocated(id)
    }

    #[inline]
    pub fn allocated_blocks(&self) -> u32 {
        self.alloc.allocated_blocks()
    }

    #[inline]
    pub fn allocated_inodes(&self) -> u32 {
        self.alloc.allocated_inodes()
    }

    /// 分配 inode，并写入一条只带编号的空记录
    pub fn alloc_inode(&mut self) -> Result<InodeId> {
        let id = self.alloc.alloc_inode(&self.store)?;
        self.inodes.write(&self.store, &DiskInode::empty(id))?;
        Ok(id)
    }

    /// 释放 inode，记录清零但保留编号
    pub fn free_inode(&mut self, id: InodeId) -> Result<()> {
        self.alloc.free_inode(&self.store, id)?;
        self.inodes.write(&self.store, &DiskInode::empty(id))
    }

    #[inline]
    pub fn alloc_block(&mut self) -> Result<BlockId> {
        self.alloc.alloc_block(&self.store)
    }

    #[inline]
    pub fn free_block(&mut self, id: BlockId) -> Result<()> {
        self.alloc.free_block(&self.store, id)
    }

    #[inline]
    pub fn read_inode(&self, id: InodeId) -> Result<DiskInode> {
        self.inodes.read(&self.store, id)
    }

    #[inline]
    pub fn write_inode(&self, inode: &DiskInode) -> Result<()> {
        self.inodes.write(&self.store, inode)
    }

    pub fn init_inode(
        &self,
        id: InodeId,
        kind: InodeKind,
        perm: BitFlags<Permission>,
        owner: u32,
        group: u32,
        first_block: Option<BlockId>,
    ) -> Result<DiskInode> {
        self.inodes
            .init(&self.store, id, kind, perm, owner, group, first_block)
    }
}
