//! 用户身份与权限判定

use enumflags2::{bitflags, BitFlags};

use crate::DiskInode;

pub const GID_ROOT: u32 = 0;
pub const GID_USERS: u32 = 1;
pub const GID_GUEST: u32 = 2;

/// 一次访问所需的权限，取值与 rwx 三元组中的位一致
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Exec = 1,
    Write = 2,
    Read = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct User {
    pub uid: u32,
    pub gid: u32,
}

impl User {
    pub const ROOT: Self = Self::new(0, GID_ROOT);

    pub const fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }

    /// uid 为 0 或属于 root 组都视为超级用户
    #[inline]
    pub fn is_root(&self) -> bool {
        self.uid == 0 || self.gid == GID_ROOT
    }

    #[inline]
    pub fn is_guest(&self) -> bool {
        self.gid == GID_GUEST
    }
}

impl DiskInode {
    /// 依次按属主、属组、其他选出 rwx 三元组，再检查 `required` 是否都在其中
    pub fn permits(&self, user: &User, required: BitFlags<Access>) -> bool {
        if user.is_root() {
            return true;
        }

        let shift = if user.uid == self.owner {
            6
        } else if user.gid == self.group {
            3
        } else {
            0
        };
        let granted = (self.perm.bits() >> shift) as u8 & 0o7;
        granted & required.bits() == required.bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InodeId, InodeKind, Permission};

    fn inode(mode: u16) -> DiskInode {
        DiskInode::new(InodeId::new(1), InodeKind::File, Permission::from_mode(mode), 100, 1)
    }

    #[test]
    fn root_bypasses_everything() {
        let inode = inode(0o000);
        assert!(inode.permits(&User::ROOT, BitFlags::all()));
        assert!(inode.permits(&User::new(7, GID_ROOT), Access::Write.into()));
        assert!(inode.permits(&User::new(0, GID_GUEST), Access::Read.into()));
    }

    #[test]
    fn owner_only_file_locks_out_others() {
        let inode = inode(0o600);
        let owner = User::new(100, GID_USERS);
        let peer = User::new(101, GID_USERS);
        let stranger = User::new(200, GID_GUEST);

        assert!(inode.permits(&owner, Access::Read | Access::Write));
        assert!(!inode.permits(&owner, Access::Exec.into()));
        assert!(!inode.permits(&peer, Access::Write.into()));
        assert!(!inode.permits(&stranger, Access::Read.into()));
    }

    #[test]
    fn owner_triplet_takes_priority_over_group() {
        // 属主没有读权限，即使属组有，也不退回到属组
        let inode = inode(0o070);
        assert!(!inode.permits(&User::new(100, 1), Access::Read.into()));
        assert!(inode.permits(&User::new(5, 1), Access::Read.into()));
        assert!(!inode.permits(&User::new(5, 2), Access::Read.into()));
    }
}
