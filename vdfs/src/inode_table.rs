use enumflags2::BitFlags;

use crate::{
    BlockId, BlockStore, DiskInode, Error, InodeId, InodeKind, Permission, Result, INODES_PER_BLOCK,
    INODE_SIZE,
};

/// inode 区域：定长记录紧密排列，每块放 [`INODES_PER_BLOCK`] 个
#[derive(Debug, Clone, Copy)]
pub struct InodeTable {
    start_block: u32,
    count: u32,
}

impl InodeTable {
    pub fn new(start_block: u32, count: u32) -> Self {
        Self { start_block, count }
    }

    /// 通过ID获取 inode 在磁盘上的位置：**块ID**以及**块内偏移**
    pub fn position(&self, id: InodeId) -> Result<(BlockId, usize)> {
        let raw = u32::from(id);
        if raw >= self.count {
            return Err(Error::OutOfRange(raw));
        }

        let block_id = BlockId::new(self.start_block + raw / INODES_PER_BLOCK as u32);
        let offset = raw as usize % INODES_PER_BLOCK * INODE_SIZE;
        Ok((block_id, offset))
    }

    pub fn read(&self, store: &BlockStore, id: InodeId) -> Result<DiskInode> {
        let (block_id, offset) = self.position(id)?;
        let data = store.read_block(block_id)?;
        DiskInode::decode(&data[offset..offset + INODE_SIZE])
    }

    /// 只改写所在块中的这一条记录
    pub fn write(&self, store: &BlockStore, inode: &DiskInode) -> Result<()> {
        let (block_id, offset) = self.position(inode.id)?;
        store.modify(block_id, |data| {
            inode.encode(&mut data[offset..offset + INODE_SIZE]);
        })
    }

    /// 清零记录并写入元信息，使其在挂进任何目录之前就是良构的
    #[allow(clippy::too_many_arguments)]
    pub fn init(
        &self,
        store: &BlockStore,
        id: InodeId,
        kind: InodeKind,
        perm: BitFlags<Permission>,
        owner: u32,
        group: u32,
        first_block: Option<BlockId>,
    ) -> Result<DiskInode> {
        let mut inode = DiskInode::new(id, kind, perm, owner, group);
        if let Some(block) = first_block {
            inode.direct[0] = block;
            inode.block_count = 1;
        }
        self.write(store, &inode)?;
        Ok(inode)
    }
}
