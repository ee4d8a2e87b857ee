use core::fmt;
use std::io;

use crate::InodeKind;

/// 可被耗尽的资源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Block,
    Inode,
}

#[derive(Debug)]
pub enum Error {
    /// 底层块设备出错
    Io(io::Error),
    /// 超级块校验失败，或格式化参数放不下
    InvalidFormat,
    /// 块号或 inode 编号越界
    OutOfRange(u32),
    /// 释放了不属于可分配区域、或本就空闲的资源
    InvalidRelease(u32),
    AllocationExhausted(Resource),
    NotFound,
    AlreadyExists,
    TypeMismatch { expected: InodeKind },
    /// 目录里还有 `.` 与 `..` 以外的项
    NotEmpty,
    /// 名字为空、过长，或含有 `/`、`\0`，或是 `.`/`..`
    InvalidName,
    PermissionDenied,
    /// 访问锁冲突
    ResourceBusy,
    /// 文件或目录超出了索引所能表示的容量
    CapacityExceeded,
}

pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "device I/O failed: {e}"),
            Self::InvalidFormat => f.write_str("not a valid vdfs image"),
            Self::OutOfRange(id) => write!(f, "id {id} is out of range"),
            Self::InvalidRelease(id) => write!(f, "cannot release {id}"),
            Self::AllocationExhausted(Resource::Block) => f.write_str("no free data block left"),
            Self::AllocationExhausted(Resource::Inode) => f.write_str("no free inode left"),
            Self::NotFound => f.write_str("no such file or directory"),
            Self::AlreadyExists => f.write_str("file exists"),
            Self::TypeMismatch {
                expected: InodeKind::Directory,
            } => f.write_str("not a directory"),
            Self::TypeMismatch { .. } => f.write_str("is a directory"),
            Self::NotEmpty => f.write_str("directory not empty"),
            Self::InvalidName => f.write_str("invalid file name"),
            Self::PermissionDenied => f.write_str("permission denied"),
            Self::ResourceBusy => f.write_str("resource is being accessed by someone else"),
            Self::CapacityExceeded => f.write_str("capacity exceeded"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
