//! vdfs：把一个普通文件当作磁盘，在上面模拟类 Unix 文件系统。

/* vdfs 的整体架构，自上而下 */

// 会话层：带权限检查与访问锁的 ls/cd/mkdir/touch/rm/cat/write
mod vfs;

// 路径解析：逐级查找目录项；另有仅供展示的路径规范化
mod path;

// 访问锁：持久化在 inode 里的读写计数
mod lock;

// 文件内容层：直接/一级间接索引到数据块的映射
mod file;

// 目录层：紧凑存放的目录项数组
mod directory;

// 磁盘管理层：格式化、挂载，串起分配器与 inode 表
mod fs;
mod allocator;
mod inode_table;

// 磁盘数据结构层：各结构的定长编解码
mod layout;

// 块存储层：带透写缓存的整块读写
mod block_store;

mod access;
mod error;
mod id;

pub use block_dev::BlockDevice;

pub use self::{
    access::{Access, User, GID_GUEST, GID_ROOT, GID_USERS},
    block_store::BlockStore,
    error::{Error, Resource, Result},
    fs::{FileSystem, FsStat, Geometry},
    id::{BlockId, InodeId},
    layout::{DirEntry, DiskInode, InodeKind, Permission, SuperBlock},
    lock::{AccessMode, AccessState},
    path::Path,
    vfs::{Listing, Session},
};

pub const MAGIC: u32 = 0x5644_4653;
pub const BLOCK_SIZE: usize = 512;
pub const BLOCK_BITS: usize = BLOCK_SIZE * 8;

/// 每个 inode 在磁盘上占 128 字节
pub const INODE_SIZE: usize = 128;
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;

/// 直接索引个数
pub const DIRECT_COUNT: usize = 10;
/// 一级间接索引块能容纳的块编号个数
pub const INDIRECT_COUNT: usize = BLOCK_SIZE / 4;
/// 单个文件最多占用的数据块（不含间接索引块本身）
pub const MAX_FILE_BLOCKS: usize = DIRECT_COUNT + INDIRECT_COUNT;

/// 目录最多使用直接索引，因此条目数有上限
pub const MAX_DIR_ENTRIES: usize = DIRECT_COUNT * BLOCK_SIZE / DirEntry::SIZE;

/// 文件名的最大字节数，目录项里最后一字节留给 `\0`
pub const NAME_MAX_LEN: usize = 27;

pub const DIR_DEFAULT_PERM: u16 = 0o755;
pub const FILE_DEFAULT_PERM: u16 = 0o644;

pub type DataBlock = [u8; BLOCK_SIZE];
