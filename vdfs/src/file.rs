//! # 文件内容层
//!
//! 文件的第 i 个数据块：i < [`DIRECT_COUNT`] 时存于直接索引，
//! 否则存于一级间接索引块的第 `i - DIRECT_COUNT` 项。
//! 间接索引块在直接索引用尽时才分配，其中未使用的项为空指针。
//!
//! 最后一个数据块中 `size` 之后的字节恒为零。

use enumflags2::BitFlags;

use crate::{
    layout::{get_u32, put_u32},
    Access, BlockId, DiskInode, Error, FileSystem, InodeId, InodeKind, Result, User, BLOCK_SIZE,
    DIRECT_COUNT, MAX_FILE_BLOCKS,
};

impl FileSystem {
    /// 读取 inode，并确认它是普通文件
    pub fn read_file_inode(&self, id: InodeId) -> Result<DiskInode> {
        let inode = self.read_inode(id)?;
        if !inode.is_file() {
            return Err(Error::TypeMismatch {
                expected: InodeKind::File,
            });
        }
        Ok(inode)
    }

    /// 逻辑上 inode 指向一系列数据块，此处传入的是这些数据块的索引（逻辑索引），
    /// 返回块的绝对编号
    pub fn block_at(&self, inode: &DiskInode, index: usize) -> Result<BlockId> {
        if index >= inode.block_count as usize {
            return Err(Error::OutOfRange(index as u32));
        }

        if index < DIRECT_COUNT {
            Ok(inode.direct[index])
        } else {
            let slot = (index - DIRECT_COUNT) * 4;
            self.store.map(inode.indirect, |data| get_u32(data, slot).into())
        }
    }

    /// 按顺序列出 inode 的全部数据块，不含间接索引块
    pub fn data_blocks(&self, id: InodeId) -> Result<Vec<BlockId>> {
        let inode = self.read_inode(id)?;
        (0..inode.block_count as usize)
            .map(|index| self.block_at(&inode, index))
            .collect()
    }

    /// 把 `block` 挂到文件末尾，必要时先分配间接索引块
    pub fn grow_one_block(&mut self, id: InodeId, block: BlockId) -> Result<()> {
        let mut inode = self.read_inode(id)?;
        self.push_block(&mut inode, block)?;
        self.write_inode(&inode)
    }

    /// 释放全部数据块与间接索引块，长度归零
    pub fn release_all(&mut self, id: InodeId) -> Result<()> {
        let mut inode = self.read_inode(id)?;
        let result = self.shrink_to(&mut inode, 0);
        inode.size = 0;
        self.write_inode(&inode)?;
        result
    }

    /// 覆盖写：先释放旧内容，再按需分配新块并依次写入。
    ///
    /// 超出单个文件容量时不做任何改动；中途分配失败时，
    /// 新分配的块全部归还，文件变为空。
    pub fn write(&mut self, id: InodeId, content: &[u8]) -> Result<usize> {
        let mut inode = self.read_file_inode(id)?;
        let needed = content.len().div_ceil(BLOCK_SIZE);
        if needed > MAX_FILE_BLOCKS {
            log::warn!(
                "{} bytes need {needed} blocks, inode {id} holds at most {MAX_FILE_BLOCKS}",
                content.len()
            );
            return Err(Error::CapacityExceeded);
        }

        let result = self
            .shrink_to(&mut inode, 0)
            .and_then(|()| self.fill_blocks(&mut inode, content));
        match result {
            Ok(()) => inode.size = content.len() as u32,
            Err(_) => {
                // 归还本次分配的块；旧内容已无法恢复
                if let Err(e) = self.shrink_to(&mut inode, 0) {
                    log::error!("inode {id}: failed to release blocks of a failed write: {e}");
                }
                inode.size = 0;
            }
        }
        self.write_inode(&inode)?;
        result.map(|()| content.len())
    }

    /// 顺序读出至多 `max_len` 字节
    pub fn read(&self, id: InodeId, max_len: usize) -> Result<Vec<u8>> {
        let inode = self.read_file_inode(id)?;
        let len = max_len.min(inode.size as usize);

        let mut content = Vec::with_capacity(len);
        let mut index = 0;
        while content.len() < len {
            let block = self.block_at(&inode, index)?;
            let chunk = (len - content.len()).min(BLOCK_SIZE);
            self.store.map(block, |data| content.extend_from_slice(&data[..chunk]))?;
            index += 1;
        }

        Ok(content)
    }

    /// 调整文件长度：缩短时释放多余的块，增长时补零块
    pub fn truncate(&mut self, id: InodeId, len: u32) -> Result<()> {
        let mut inode = self.read_file_inode(id)?;
        let needed = (len as usize).div_ceil(BLOCK_SIZE);
        if needed > MAX_FILE_BLOCKS {
            return Err(Error::CapacityExceeded);
        }

        let old_blocks = inode.block_count as usize;
        if len < inode.size {
            self.shrink_to(&mut inode, needed)?;
            // 保持末块尾部为零
            let tail = len as usize % BLOCK_SIZE;
            if tail != 0 {
                let last = self.block_at(&inode, needed - 1)?;
                self.store.modify(last, |data| data[tail..].fill(0))?;
            }
        } else {
            while (inode.block_count as usize) < needed {
                if let Err(e) = self.append_zeroed(&mut inode) {
                    if let Err(e) = self.shrink_to(&mut inode, old_blocks) {
                        log::error!("inode {id}: failed to roll back truncate: {e}");
                    }
                    self.write_inode(&inode)?;
                    return Err(e);
                }
            }
        }

        inode.size = len;
        self.write_inode(&inode)
    }

    /// 属主、属组、其他依次匹配；超级用户总是允许
    pub fn has_permission(
        &self,
        id: InodeId,
        access: BitFlags<Access>,
        user: &User,
    ) -> Result<bool> {
        Ok(self.read_inode(id)?.permits(user, access))
    }

    fn fill_blocks(&mut self, inode: &mut DiskInode, content: &[u8]) -> Result<()> {
        for chunk in content.chunks(BLOCK_SIZE) {
            let block = self.alloc_block()?;
            if let Err(e) = self
                .store
                .modify(block, |data| data[..chunk.len()].copy_from_slice(chunk))
                .and_then(|()| self.push_block(inode, block))
            {
                if let Err(free_err) = self.free_block(block) {
                    log::error!("block {block} leaked: {free_err}");
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn append_zeroed(&mut self, inode: &mut DiskInode) -> Result<()> {
        let block = self.alloc_block()?;
        if let Err(e) = self.push_block(inode, block) {
            if let Err(free_err) = self.free_block(block) {
                log::error!("block {block} leaked: {free_err}");
            }
            return Err(e);
        }
        Ok(())
    }

    fn push_block(&mut self, inode: &mut DiskInode, block: BlockId) -> Result<()> {
        let index = inode.block_count as usize;
        if index >= MAX_FILE_BLOCKS {
            return Err(Error::CapacityExceeded);
        }

        if index < DIRECT_COUNT {
            inode.direct[index] = block;
        } else {
            if inode.indirect.is_null() {
                inode.indirect = self.alloc_block()?;
                log::debug!("inode {} grows an indirect block {}", inode.id, inode.indirect);
            }
            let slot = (index - DIRECT_COUNT) * 4;
            self.store.modify(inode.indirect, |data| put_u32(data, slot, block.into()))?;
        }
        inode.block_count += 1;

        Ok(())
    }

    /// 从末尾依次摘下并释放数据块，直到只剩 `blocks` 块；
    /// 间接索引块在不再需要时一并释放
    fn shrink_to(&mut self, inode: &mut DiskInode, blocks: usize) -> Result<()> {
        while inode.block_count as usize > blocks {
            let index = inode.block_count as usize - 1;
            let block = self.block_at(inode, index)?;

            if index < DIRECT_COUNT {
                inode.direct[index] = BlockId::NULL;
            } else {
                let slot = (index - DIRECT_COUNT) * 4;
                self.store.modify(inode.indirect, |data| put_u32(data, slot, 0))?;
            }
            inode.block_count -= 1;
            self.free_block(block)?;

            if inode.block_count as usize <= DIRECT_COUNT && !inode.indirect.is_null() {
                let indirect = inode.indirect;
                inode.indirect = BlockId::NULL;
                self.free_block(indirect)?;
            }
        }
        Ok(())
    }
}
