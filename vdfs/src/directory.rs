//! # 目录层
//!
//! 目录的内容是紧密排列的 [`DirEntry`] 数组，没有空洞：
//! 条目数恒等于 `size / DirEntry::SIZE`。删除非末尾的条目时，
//! 用末尾条目覆盖它，再截掉末尾。
//!
//! 目录只使用直接索引。

use enumflags2::BitFlags;

use crate::{
    BlockId, DirEntry, DiskInode, Error, FileSystem, InodeId, InodeKind, Permission, Result,
    BLOCK_SIZE, MAX_DIR_ENTRIES,
};

const ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / DirEntry::SIZE;

impl FileSystem {
    /// 读取 inode，并确认它是目录
    pub fn read_dir_inode(&self, dir: InodeId) -> Result<DiskInode> {
        let inode = self.read_inode(dir)?;
        if !inode.is_dir() {
            return Err(Error::TypeMismatch {
                expected: InodeKind::Directory,
            });
        }
        Ok(inode)
    }

    /// 按存储顺序列出全部目录项，含 `.` 与 `..`
    pub fn entries(&self, dir: InodeId) -> Result<Vec<DirEntry>> {
        let inode = self.read_dir_inode(dir)?;
        let count = entry_count(&inode);

        let mut entries = Vec::with_capacity(count);
        for (block_index, &block_id) in inode.direct.iter().enumerate() {
            let first = block_index * ENTRIES_PER_BLOCK;
            if first >= count {
                break;
            }
            let data = self.store.read_block(block_id)?;
            for slot in 0..ENTRIES_PER_BLOCK.min(count - first) {
                let offset = slot * DirEntry::SIZE;
                entries.push(DirEntry::decode(&data[offset..offset + DirEntry::SIZE])?);
            }
        }

        Ok(entries)
    }

    /// 逐块线性查找，名字须完全相同
    pub fn find_entry(&self, dir: InodeId, name: &str) -> Result<InodeId> {
        self.entries(dir)?
            .into_iter()
            .find(|entry| entry.name() == name)
            .map(|entry| entry.inode_id())
            .ok_or(Error::NotFound)
    }

    /// 追加到目录末尾；跨过块边界时分配新块
    pub fn add_entry(&mut self, dir: InodeId, entry: DirEntry) -> Result<()> {
        let mut inode = self.read_dir_inode(dir)?;
        let index = entry_count(&inode);
        if index >= MAX_DIR_ENTRIES {
            log::warn!("directory {dir} is full");
            return Err(Error::CapacityExceeded);
        }

        let block_index = index / ENTRIES_PER_BLOCK;
        if block_index >= inode.block_count as usize {
            let block = self.alloc_block()?;
            inode.direct[block_index] = block;
            inode.block_count += 1;
        }

        let (block_id, offset) = entry_position(&inode, index);
        self.store.modify(block_id, |data| {
            entry.encode(&mut data[offset..offset + DirEntry::SIZE]);
        })?;
        inode.size += DirEntry::SIZE as u32;
        self.write_inode(&inode)?;
        log::debug!("link {:?} -> {} in {dir}", entry.name(), entry.inode_id());

        Ok(())
    }

    /// 删除目录项并保持紧密排列，返回被删项指向的 inode
    pub fn remove_entry(&mut self, dir: InodeId, name: &str) -> Result<InodeId> {
        let mut inode = self.read_dir_inode(dir)?;
        let entries = self.entries(dir)?;
        let index = entries
            .iter()
            .position(|entry| entry.name() == name)
            .ok_or(Error::NotFound)?;
        let removed = entries[index].inode_id();

        let last = entries.len() - 1;
        if index != last {
            let (block_id, offset) = entry_position(&inode, index);
            self.store.modify(block_id, |data| {
                entries[last].encode(&mut data[offset..offset + DirEntry::SIZE]);
            })?;
        }
        inode.size -= DirEntry::SIZE as u32;

        // 末尾退回块边界以内时，释放不再使用的块
        let needed = (inode.size as usize).div_ceil(BLOCK_SIZE);
        while inode.block_count as usize > needed {
            let block_index = inode.block_count as usize - 1;
            let block = inode.direct[block_index];
            self.free_block(block)?;
            inode.direct[block_index] = BlockId::NULL;
            inode.block_count -= 1;
        }
        self.write_inode(&inode)?;
        log::debug!("unlink {name:?} from {dir}");

        Ok(removed)
    }

    /// 在 `parent` 下新建文件或目录。
    ///
    /// 新目录会分配首个数据块，并写入 `.` 与 `..`；新文件不占数据块。
    /// 中途失败时已分配的资源不会回收。
    pub fn create(
        &mut self,
        parent: InodeId,
        name: &str,
        kind: InodeKind,
        perm: BitFlags<Permission>,
        owner: u32,
        group: u32,
    ) -> Result<InodeId> {
        if matches!(name, "." | "..") || kind == InodeKind::Free {
            return Err(Error::InvalidName);
        }
        // 先校验名字，失败时不分配任何资源
        DirEntry::new(name, InodeId::ROOT)?;

        let parent_inode = self.read_dir_inode(parent)?;
        match self.find_entry(parent, name) {
            Ok(_) => return Err(Error::AlreadyExists),
            Err(Error::NotFound) => (),
            Err(e) => return Err(e),
        }
        if entry_count(&parent_inode) >= MAX_DIR_ENTRIES {
            return Err(Error::CapacityExceeded);
        }

        let id = self.alloc_inode()?;
        if kind == InodeKind::Directory {
            let block = self.alloc_block()?;
            self.init_inode(id, kind, perm, owner, group, Some(block))?;
            self.add_entry(id, DirEntry::new(".", id)?)?;
            self.add_entry(id, DirEntry::new("..", parent)?)?;
        } else {
            self.init_inode(id, kind, perm, owner, group, None)?;
        }
        self.add_entry(parent, DirEntry::new(name, id)?)?;
        log::debug!("created {kind:?} {name:?} as inode {id} under {parent}");

        Ok(id)
    }

    /// 释放目标的全部数据块与 inode，再把它从父目录中删去。
    ///
    /// 目录必须只剩 `.` 与 `..`。
    pub fn unlink(&mut self, parent: InodeId, name: &str) -> Result<()> {
        if matches!(name, "." | "..") {
            return Err(Error::InvalidName);
        }

        let target = self.find_entry(parent, name)?;
        let inode = self.read_inode(target)?;
        if inode.is_dir() && !is_empty_dir(&inode) {
            return Err(Error::NotEmpty);
        }

        self.release_all(target)?;
        self.free_inode(target)?;
        self.remove_entry(parent, name)?;
        Ok(())
    }
}

/// 只剩 `.` 与 `..`
#[inline]
pub(crate) fn is_empty_dir(inode: &DiskInode) -> bool {
    inode.size as usize <= 2 * DirEntry::SIZE
}

#[inline]
fn entry_count(inode: &DiskInode) -> usize {
    inode.size as usize / DirEntry::SIZE
}

fn entry_position(inode: &DiskInode, index: usize) -> (BlockId, usize) {
    let offset = index * DirEntry::SIZE;
    (inode.direct[offset / BLOCK_SIZE], offset % BLOCK_SIZE)
}
