//! # 会话层
//!
//! 在结构操作之上加入身份、权限检查与访问锁。当前用户与当前目录
//! 由显式的 [`Session`] 携带，每个操作都把它作为参数。

use enumflags2::BitFlags;

use crate::{
    directory::is_empty_dir, Access, AccessMode, DiskInode, Error, FileSystem, InodeId, InodeKind,
    Path, Permission, Result, User, DIR_DEFAULT_PERM, FILE_DEFAULT_PERM,
};

/// 当前用户与当前目录
#[derive(Debug, Clone)]
pub struct Session {
    user: User,
    cwd: InodeId,
    /// 仅用于展示
    cwd_path: String,
}

/// `ls` 的一行
#[derive(Debug, Clone)]
pub struct Listing {
    pub name: String,
    pub inode: DiskInode,
}

impl Session {
    /// 从根目录开始的会话
    pub fn new(fs: &FileSystem, user: User) -> Self {
        Self {
            user,
            cwd: fs.root(),
            cwd_path: String::from("/"),
        }
    }

    #[inline]
    pub fn user(&self) -> User {
        self.user
    }

    #[inline]
    pub fn cwd(&self) -> InodeId {
        self.cwd
    }

    #[inline]
    pub fn cwd_path(&self) -> &str {
        &self.cwd_path
    }

    /// 切换用户，当前目录不变
    #[inline]
    pub fn switch_user(&mut self, user: User) {
        self.user = user;
    }
}

impl FileSystem {
    /// 列出当前目录，不含 `.` 与 `..`
    pub fn list(&self, session: &Session) -> Result<Vec<Listing>> {
        let dir = self.read_dir_inode(session.cwd)?;
        self.check(&dir, session, Access::Read.into())?;

        self.entries(session.cwd)?
            .into_iter()
            .filter(|entry| !entry.is_dot())
            .map(|entry| {
                Ok(Listing {
                    inode: self.read_inode(entry.inode_id())?,
                    name: entry.name().to_owned(),
                })
            })
            .collect()
    }

    pub fn change_dir(&self, session: &mut Session, path: &str) -> Result<()> {
        let target = self.resolve(session.cwd, path)?;
        let inode = self.read_dir_inode(target)?;
        self.check(&inode, session, Access::Exec.into())?;

        session.cwd = target;
        session.cwd_path = path.normalize(&session.cwd_path);
        Ok(())
    }

    pub fn make_dir(
        &mut self,
        session: &Session,
        path: &str,
        perm: Option<BitFlags<Permission>>,
    ) -> Result<InodeId> {
        let perm = perm.unwrap_or_else(|| Permission::from_mode(DIR_DEFAULT_PERM));
        self.create_in(session, path, InodeKind::Directory, perm)
    }

    pub fn touch(
        &mut self,
        session: &Session,
        path: &str,
        perm: Option<BitFlags<Permission>>,
    ) -> Result<InodeId> {
        let perm = perm.unwrap_or_else(|| Permission::from_mode(FILE_DEFAULT_PERM));
        self.create_in(session, path, InodeKind::File, perm)
    }

    /// 删除文件或空目录。
    ///
    /// 访客不能删除；父目录需要写权限；目标被占用时返回 [`Error::ResourceBusy`]。
    pub fn remove(&mut self, session: &Session, path: &str) -> Result<()> {
        if session.user.is_guest() {
            log::warn!("guest {} may not remove {path:?}", session.user.uid);
            return Err(Error::PermissionDenied);
        }

        let (parent, name) = self.resolve_parent(session.cwd, path)?;
        if matches!(name, "." | "..") {
            return Err(Error::InvalidName);
        }
        let parent_inode = self.read_dir_inode(parent)?;
        self.check(&parent_inode, session, Access::Write.into())?;

        let target = self.find_entry(parent, name)?;
        if target == session.cwd {
            return Err(Error::ResourceBusy);
        }
        let inode = self.read_inode(target)?;
        if inode.is_dir() && !is_empty_dir(&inode) {
            return Err(Error::NotEmpty);
        }

        self.acquire_write(target)?;
        if let Err(e) = self.unlink(parent, name) {
            // 目标可能已被释放，此时锁随记录一起清零
            if self.is_inode_allocated(target) {
                self.release_write(target)?;
            }
            return Err(e);
        }
        log::info!("removed {path:?} (inode {target})");

        Ok(())
    }

    pub fn read_file(&mut self, session: &Session, path: &str) -> Result<Vec<u8>> {
        let id = self.resolve(session.cwd, path)?;
        let inode = self.read_file_inode(id)?;
        self.check(&inode, session, Access::Read.into())?;

        self.with_access(id, AccessMode::Read, |fs| fs.read(id, usize::MAX))
    }

    /// 覆盖写入已有文件
    pub fn write_file(&mut self, session: &Session, path: &str, content: &[u8]) -> Result<usize> {
        let id = self.resolve(session.cwd, path)?;
        let inode = self.read_file_inode(id)?;
        self.check(&inode, session, Access::Write.into())?;

        self.with_access(id, AccessMode::Write, |fs| fs.write(id, content))
    }

    fn create_in(
        &mut self,
        session: &Session,
        path: &str,
        kind: InodeKind,
        perm: BitFlags<Permission>,
    ) -> Result<InodeId> {
        let (parent, name) = self.resolve_parent(session.cwd, path)?;
        let parent_inode = self.read_dir_inode(parent)?;
        self.check(&parent_inode, session, Access::Write.into())?;

        let user = session.user;
        self.create(parent, name, kind, perm, user.uid, user.gid)
    }

    fn check(&self, inode: &DiskInode, session: &Session, access: BitFlags<Access>) -> Result<()> {
        if inode.permits(&session.user, access) {
            Ok(())
        } else {
            log::warn!(
                "user {}:{} lacks {access:?} on inode {}",
                session.user.uid,
                session.user.gid,
                inode.id
            );
            Err(Error::PermissionDenied)
        }
    }
}
