use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use block_dev::BlockDevice;
use vdfs::BLOCK_SIZE;

/// 以宿主机上的普通文件充当磁盘
#[derive(Debug)]
pub struct BlockFile {
    file: Mutex<File>,
    num_blocks: usize,
}

impl BlockFile {
    /// 打开已有的镜像，末尾不足一块的部分被忽略
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let num_blocks = file.metadata()?.len() as usize / BLOCK_SIZE;
        Ok(Self::new(file, num_blocks))
    }

    /// 新建（或清空）镜像，并扩展到 `num_blocks` 块
    pub fn create(path: &Path, num_blocks: usize) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len((num_blocks * BLOCK_SIZE) as u64)?;
        Ok(Self::new(file, num_blocks))
    }

    fn new(file: File, num_blocks: usize) -> Self {
        Self {
            file: Mutex::new(file),
            num_blocks,
        }
    }

    fn seek_to(&self, block_id: usize, len: usize) -> io::Result<MutexGuard<'_, File>> {
        if len != BLOCK_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a complete block!",
            ));
        }
        if block_id >= self.num_blocks {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("block {block_id} is beyond the end of the image"),
            ));
        }

        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))?;
        Ok(file)
    }
}

impl BlockDevice for BlockFile {
    fn block_size(&self) -> usize {
        BLOCK_SIZE
    }

    fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> io::Result<()> {
        self.seek_to(block_id, buf.len())?.read_exact(buf)
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> io::Result<()> {
        let mut file = self.seek_to(block_id, buf.len())?;
        file.write_all(buf)?;
        file.flush()
    }
}
