//! 磁盘上的 inode
//!
//! 每个 inode 定长 128 字节，一块放 4 个：
//!
//! | 偏移 | 字段 |
//! |------|------|
//! | 0    | id |
//! | 4    | mode = (类型 << 9) \| 权限位 |
//! | 8    | owner |
//! | 12   | group |
//! | 16   | size（字节） |
//! | 20   | block_count（数据块数，不含间接索引块） |
//! | 24   | direct\[10\] |
//! | 64   | indirect |
//! | 68   | readers |
//! | 72   | writing |
//! | 76   | 保留，全零 |

use enumflags2::{bitflags, BitFlags};

use super::{get_u32, put_u32};
use crate::{BlockId, Error, InodeId, Result, DIRECT_COUNT, INODE_SIZE};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DiskInode {
    pub id: InodeId,
    pub kind: InodeKind,
    pub perm: BitFlags<Permission>,
    pub owner: u32,
    pub group: u32,
    /// 文件为内容字节数；目录为 `条目数 * DirEntry::SIZE`
    pub size: u32,
    /// 非空的直接索引与间接索引槽位之和
    pub block_count: u32,
    pub direct: [BlockId; DIRECT_COUNT],
    /// 指向一个一级索引块，用尽直接索引前保持为空
    pub indirect: BlockId,
    /// 访问锁：当前读者个数
    pub readers: u32,
    /// 访问锁：是否有写者
    pub writing: bool,
}

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum InodeKind {
    /// 未分配的槽位
    #[default]
    Free,
    File,
    Directory,
}

/// rwx × (属主, 属组, 其他)
#[bitflags]
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    OtherExec = 0o001,
    OtherWrite = 0o002,
    OtherRead = 0o004,
    GroupExec = 0o010,
    GroupWrite = 0o020,
    GroupRead = 0o040,
    OwnerExec = 0o100,
    OwnerWrite = 0o200,
    OwnerRead = 0o400,
}

impl Permission {
    /// 从八进制模式（如 `0o644`）取出权限位，多余的位被丢弃
    #[inline]
    pub fn from_mode(mode: u16) -> BitFlags<Self> {
        BitFlags::from_bits_truncate(mode)
    }
}

impl InodeKind {
    fn raw(self) -> u32 {
        match self {
            Self::Free => 0,
            Self::File => 1,
            Self::Directory => 2,
        }
    }

    fn from_raw(raw: u32) -> Result<Self> {
        match raw {
            0 => Ok(Self::Free),
            1 => Ok(Self::File),
            2 => Ok(Self::Directory),
            _ => Err(Error::InvalidFormat),
        }
    }
}

impl DiskInode {
    const ID: usize = 0;
    const MODE: usize = 4;
    const OWNER: usize = 8;
    const GROUP: usize = 12;
    const SIZE: usize = 16;
    const BLOCK_COUNT: usize = 20;
    const DIRECT: usize = 24;
    const INDIRECT: usize = Self::DIRECT + 4 * DIRECT_COUNT;
    const READERS: usize = Self::INDIRECT + 4;
    const WRITING: usize = Self::READERS + 4;

    const TYPE_SHIFT: u32 = 9;
    const PERM_MASK: u32 = 0o777;

    /// 全零的记录，只保留编号；所有索引都是空指针
    #[inline]
    pub fn empty(id: InodeId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    #[inline]
    pub fn new(
        id: InodeId,
        kind: InodeKind,
        perm: BitFlags<Permission>,
        owner: u32,
        group: u32,
    ) -> Self {
        Self {
            id,
            kind,
            perm,
            owner,
            group,
            ..Default::default()
        }
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind == InodeKind::Directory
    }

    #[inline]
    pub fn is_file(&self) -> bool {
        self.kind == InodeKind::File
    }

    #[inline]
    pub fn mode(&self) -> u32 {
        self.kind.raw() << Self::TYPE_SHIFT | u32::from(self.perm.bits())
    }

    pub fn encode(&self, buf: &mut [u8]) {
        let buf = &mut buf[..INODE_SIZE];
        buf.fill(0);
        put_u32(buf, Self::ID, self.id.into());
        put_u32(buf, Self::MODE, self.mode());
        put_u32(buf, Self::OWNER, self.owner);
        put_u32(buf, Self::GROUP, self.group);
        put_u32(buf, Self::SIZE, self.size);
        put_u32(buf, Self::BLOCK_COUNT, self.block_count);
        for (i, block) in self.direct.iter().enumerate() {
            put_u32(buf, Self::DIRECT + 4 * i, (*block).into());
        }
        put_u32(buf, Self::INDIRECT, self.indirect.into());
        put_u32(buf, Self::READERS, self.readers);
        put_u32(buf, Self::WRITING, self.writing.into());
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mode = get_u32(buf, Self::MODE);

        Ok(Self {
            id: get_u32(buf, Self::ID).into(),
            kind: InodeKind::from_raw(mode >> Self::TYPE_SHIFT)?,
            perm: Permission::from_mode((mode & Self::PERM_MASK) as u16),
            owner: get_u32(buf, Self::OWNER),
            group: get_u32(buf, Self::GROUP),
            size: get_u32(buf, Self::SIZE),
            block_count: get_u32(buf, Self::BLOCK_COUNT),
            direct: core::array::from_fn(|i| get_u32(buf, Self::DIRECT + 4 * i).into()),
            indirect: get_u32(buf, Self::INDIRECT).into(),
            readers: get_u32(buf, Self::READERS),
            writing: get_u32(buf, Self::WRITING) != 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_packs_kind_above_permission_bits() {
        let inode = DiskInode::new(
            InodeId::new(7),
            InodeKind::Directory,
            Permission::from_mode(0o755),
            3,
            1,
        );
        assert_eq!(inode.mode(), 2 << 9 | 0o755);
    }

    #[test]
    fn record_layout_is_fixed() {
        let mut inode = DiskInode::new(
            InodeId::new(5),
            InodeKind::File,
            Permission::from_mode(0o640),
            1000,
            1,
        );
        inode.size = 1234;
        inode.block_count = 3;
        inode.direct[..3].copy_from_slice(&[BlockId::new(40), BlockId::new(41), BlockId::new(42)]);
        inode.readers = 2;

        let mut raw = [0xFFu8; INODE_SIZE];
        inode.encode(&mut raw);
        assert_eq!(&raw[0..4], &5u32.to_le_bytes());
        assert_eq!(&raw[4..8], &(1u32 << 9 | 0o640).to_le_bytes());
        assert_eq!(&raw[24..28], &40u32.to_le_bytes());
        assert_eq!(&raw[68..72], &2u32.to_le_bytes());
        assert!(raw[76..].iter().all(|&b| b == 0));

        assert_eq!(DiskInode::decode(&raw).unwrap(), inode);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let mut raw = [0u8; INODE_SIZE];
        put_u32(&mut raw, DiskInode::MODE, 7 << 9);
        assert!(matches!(DiskInode::decode(&raw), Err(Error::InvalidFormat)));
    }
}
