//! # 访问锁
//!
//! 单写者、多读者的计数，持久化在 inode 的 `readers`/`writing` 字段里，
//! 每次状态变化都立即写回。锁是劝告性的：不经过它直接修改 inode 并不会被阻止。
//! 进程在获取与释放之间崩溃，会留下一把永远不会被释放的锁。

use crate::{DiskInode, Error, FileSystem, InodeId, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessState {
    Idle,
    Reading(u32),
    Writing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
}

impl DiskInode {
    pub fn access_state(&self) -> AccessState {
        match (self.writing, self.readers) {
            (true, _) => AccessState::Writing,
            (false, 0) => AccessState::Idle,
            (false, n) => AccessState::Reading(n),
        }
    }
}

impl FileSystem {
    #[inline]
    pub fn access_state(&self, id: InodeId) -> Result<AccessState> {
        Ok(self.read_inode(id)?.access_state())
    }

    /// `Idle | Reading(n)` → `Reading(n + 1)`
    pub fn acquire_read(&self, id: InodeId) -> Result<()> {
        let mut inode = self.read_inode(id)?;
        if inode.writing {
            log::warn!("inode {id} is being written");
            return Err(Error::ResourceBusy);
        }

        inode.readers += 1;
        self.write_inode(&inode)?;
        log::debug!("inode {id}: {:?}", inode.access_state());
        Ok(())
    }

    /// `Idle` → `Writing`
    pub fn acquire_write(&self, id: InodeId) -> Result<()> {
        let mut inode = self.read_inode(id)?;
        if inode.access_state() != AccessState::Idle {
            log::warn!("inode {id} is busy: {:?}", inode.access_state());
            return Err(Error::ResourceBusy);
        }

        inode.writing = true;
        self.write_inode(&inode)?;
        log::debug!("inode {id}: Writing");
        Ok(())
    }

    /// `Reading(n)` → `Reading(n - 1)`，减到零即 `Idle`
    pub fn release_read(&self, id: InodeId) -> Result<()> {
        let mut inode = self.read_inode(id)?;
        inode.readers = inode.readers.saturating_sub(1);
        self.write_inode(&inode)?;
        log::debug!("inode {id}: {:?}", inode.access_state());
        Ok(())
    }

    /// `Writing` → `Idle`
    pub fn release_write(&self, id: InodeId) -> Result<()> {
        let mut inode = self.read_inode(id)?;
        inode.writing = false;
        self.write_inode(&inode)?;
        log::debug!("inode {id}: {:?}", inode.access_state());
        Ok(())
    }

    /// 在锁的保护下执行 `f`，无论 `f` 成败都会释放锁
    pub fn with_access<V>(
        &mut self,
        id: InodeId,
        mode: AccessMode,
        f: impl FnOnce(&mut Self) -> Result<V>,
    ) -> Result<V> {
        match mode {
            AccessMode::Read => self.acquire_read(id)?,
            AccessMode::Write => self.acquire_write(id)?,
        }

        let value = f(self);
        let released = match mode {
            AccessMode::Read => self.release_read(id),
            AccessMode::Write => self.release_write(id),
        };

        let value = value?;
        released?;
        Ok(value)
    }
}
