use derive_more::{Display, From, Into};

/// 磁盘上的绝对块号
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, From, Into)]
#[repr(transparent)]
pub struct BlockId(u32);

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, From, Into)]
#[repr(transparent)]
pub struct InodeId(u32);

impl BlockId {
    /// 空指针。0 号块永远是超级块，不可能出现在任何 inode 的索引里，
    /// 所以新清零的索引区天然全是空指针。
    pub const NULL: Self = Self(0);

    pub const SUPER: Self = Self(0);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self == Self::NULL
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl InodeId {
    pub const ROOT: Self = Self(0);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }
}
