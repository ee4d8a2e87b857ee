//! # 块设备接口层
//!
//! 块设备是以**块**为单位存储数据的设备，例如磁盘、光盘、U盘等；
//! [`BlockDevice`] 就是对读写块设备的抽象，
//! 实现了此特质的类型称为**块设备驱动**。
//!
//! 驱动只负责搬运整块字节，块号是否越界、块内数据如何解释都由上层决定。

use std::any::Any;
use std::io;
use std::sync::Mutex;

/// 块设备驱动特质
pub trait BlockDevice: Send + Sync + Any {
    /// 块的字节数，`buf` 的长度必须与之相等
    fn block_size(&self) -> usize;

    /// 设备总块数
    fn num_blocks(&self) -> usize;

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> io::Result<()>;

    /// 写入一整块；返回时数据必须已经交给了底层介质，驱动不得自行缓冲。
    fn write_block(&self, block_id: usize, buf: &[u8]) -> io::Result<()>;
}

/// 内存中的块设备，数据随进程消失。
#[derive(Debug)]
pub struct RamDisk {
    block_size: usize,
    data: Mutex<Vec<u8>>,
}

impl RamDisk {
    pub fn new(block_size: usize, num_blocks: usize) -> Self {
        Self {
            block_size,
            data: Mutex::new(vec![0; block_size * num_blocks]),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<u8>> {
        // 持锁期间不会 panic，中毒只可能来自调用方的测试断言
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn range(&self, block_id: usize, len: usize) -> io::Result<std::ops::Range<usize>> {
        if len != self.block_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a complete block!",
            ));
        }
        if block_id >= self.num_blocks() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("block {block_id} is beyond the end of the device"),
            ));
        }
        let start = block_id * self.block_size;
        Ok(start..start + self.block_size)
    }
}

impl BlockDevice for RamDisk {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn num_blocks(&self) -> usize {
        self.lock().len() / self.block_size
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> io::Result<()> {
        let range = self.range(block_id, buf.len())?;
        buf.copy_from_slice(&self.lock()[range]);
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> io::Result<()> {
        let range = self.range(block_id, buf.len())?;
        self.lock()[range].copy_from_slice(buf);
        Ok(())
    }
}
