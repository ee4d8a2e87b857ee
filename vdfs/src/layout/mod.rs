//! # 磁盘数据结构层
//!
//! vdfs 的磁盘布局：
//! 超级块 | inode 位图 | 数据块位图 | inode 区域 | 数据块区域
//!
//! 所有结构都通过显式的编解码函数与字节互转，字段一律小端序、定长、定偏移，
//! 与宿主的结构体布局和对齐无关。

mod super_block;
pub use super_block::SuperBlock;

mod bitmap;
pub use bitmap::Bitmap;

mod inode;
pub use inode::{DiskInode, InodeKind, Permission};

/// 目录项，也属于磁盘文件系统数据结构
mod dir_entry;
pub use dir_entry::DirEntry;

#[inline]
pub(crate) fn get_u32(buf: &[u8], offset: usize) -> u32 {
    let mut bytes = [0; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

#[inline]
pub(crate) fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
