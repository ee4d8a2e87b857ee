use super::{get_u32, put_u32};
use crate::{BlockId, BlockStore, DataBlock, Error, InodeId, Result, BLOCK_SIZE, MAGIC};

/// 超级块：
/// - 提供文件系统合法性校验；
/// - 定位其它连续区域；
/// - 记录空闲块与空闲 inode 的计数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperBlock {
    pub block_size: u32,
    /// 文件系统占据块数
    pub total_blocks: u32,
    /// 数据区内的空闲块数
    pub free_blocks: u32,
    pub inode_count: u32,
    pub free_inodes: u32,
    pub inode_bitmap_start: u32,
    pub inode_bitmap_blocks: u32,
    pub block_bitmap_start: u32,
    pub block_bitmap_blocks: u32,
    pub inode_table_start: u32,
    pub inode_table_blocks: u32,
    pub data_start: u32,
    pub data_blocks: u32,
    pub root_inode: InodeId,
}

impl SuperBlock {
    const MAGIC: usize = 0;
    const BLOCK_SIZE: usize = 4;
    const TOTAL_BLOCKS: usize = 8;
    const FREE_BLOCKS: usize = 12;
    const INODE_COUNT: usize = 16;
    const FREE_INODES: usize = 20;
    const INODE_BITMAP_START: usize = 24;
    const INODE_BITMAP_BLOCKS: usize = 28;
    const BLOCK_BITMAP_START: usize = 32;
    const BLOCK_BITMAP_BLOCKS: usize = 36;
    const INODE_TABLE_START: usize = 40;
    const INODE_TABLE_BLOCKS: usize = 44;
    const DATA_START: usize = 48;
    const DATA_BLOCKS: usize = 52;
    const ROOT_INODE: usize = 56;

    pub fn encode(&self) -> DataBlock {
        let mut buf = [0; BLOCK_SIZE];
        put_u32(&mut buf, Self::MAGIC, MAGIC);
        put_u32(&mut buf, Self::BLOCK_SIZE, self.block_size);
        put_u32(&mut buf, Self::TOTAL_BLOCKS, self.total_blocks);
        put_u32(&mut buf, Self::FREE_BLOCKS, self.free_blocks);
        put_u32(&mut buf, Self::INODE_COUNT, self.inode_count);
        put_u32(&mut buf, Self::FREE_INODES, self.free_inodes);
        put_u32(&mut buf, Self::INODE_BITMAP_START, self.inode_bitmap_start);
        put_u32(&mut buf, Self::INODE_BITMAP_BLOCKS, self.inode_bitmap_blocks);
        put_u32(&mut buf, Self::BLOCK_BITMAP_START, self.block_bitmap_start);
        put_u32(&mut buf, Self::BLOCK_BITMAP_BLOCKS, self.block_bitmap_blocks);
        put_u32(&mut buf, Self::INODE_TABLE_START, self.inode_table_start);
        put_u32(&mut buf, Self::INODE_TABLE_BLOCKS, self.inode_table_blocks);
        put_u32(&mut buf, Self::DATA_START, self.data_start);
        put_u32(&mut buf, Self::DATA_BLOCKS, self.data_blocks);
        put_u32(&mut buf, Self::ROOT_INODE, self.root_inode.into());
        buf
    }

    /// 魔数或块大小不符时拒绝解码
    pub fn decode(buf: &DataBlock) -> Result<Self> {
        if get_u32(buf, Self::MAGIC) != MAGIC {
            return Err(Error::InvalidFormat);
        }

        let sb = Self {
            block_size: get_u32(buf, Self::BLOCK_SIZE),
            total_blocks: get_u32(buf, Self::TOTAL_BLOCKS),
            free_blocks: get_u32(buf, Self::FREE_BLOCKS),
            inode_count: get_u32(buf, Self::INODE_COUNT),
            free_inodes: get_u32(buf, Self::FREE_INODES),
            inode_bitmap_start: get_u32(buf, Self::INODE_BITMAP_START),
            inode_bitmap_blocks: get_u32(buf, Self::INODE_BITMAP_BLOCKS),
            block_bitmap_start: get_u32(buf, Self::BLOCK_BITMAP_START),
            block_bitmap_blocks: get_u32(buf, Self::BLOCK_BITMAP_BLOCKS),
            inode_table_start: get_u32(buf, Self::INODE_TABLE_START),
            inode_table_blocks: get_u32(buf, Self::INODE_TABLE_BLOCKS),
            data_start: get_u32(buf, Self::DATA_START),
            data_blocks: get_u32(buf, Self::DATA_BLOCKS),
            root_inode: get_u32(buf, Self::ROOT_INODE).into(),
        };

        if !sb.is_valid() {
            return Err(Error::InvalidFormat);
        }
        Ok(sb)
    }

    /// 区域首尾相接，且恰好铺满整个文件系统
    pub fn is_valid(&self) -> bool {
        self.block_size as usize == BLOCK_SIZE
            && self.inode_bitmap_start == 1
            && self.block_bitmap_start == self.inode_bitmap_start + self.inode_bitmap_blocks
            && self.inode_table_start == self.block_bitmap_start + self.block_bitmap_blocks
            && self.data_start == self.inode_table_start + self.inode_table_blocks
            && self.data_start.checked_add(self.data_blocks) == Some(self.total_blocks)
            && self.free_blocks <= self.data_blocks
            && self.free_inodes <= self.inode_count
    }

    #[inline]
    pub fn read(store: &BlockStore) -> Result<Self> {
        Self::decode(&store.read_block(BlockId::SUPER)?)
    }

    #[inline]
    pub fn persist(&self, store: &BlockStore) -> Result<()> {
        store.write_block(BlockId::SUPER, &self.encode())
    }
}
