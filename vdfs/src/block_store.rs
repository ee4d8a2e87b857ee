//! # 块存储层
//!
//! 所有对块设备的读写都经过 [`BlockStore`]：它负责块号越界检查，
//! 并在内存里保留最近读写过的若干块。
//!
//! 与 easy-fs 的写回缓存不同，这里的缓存是**透写**的：
//! 写操作先同步落到块设备，成功后才更新缓存，缓存里永远没有脏块。

use std::sync::Arc;

use block_dev::BlockDevice;
use spin::Mutex;

use crate::{BlockId, DataBlock, Error, Result, BLOCK_SIZE};

pub struct BlockStore {
    device: Arc<dyn BlockDevice>,
    total_blocks: u32,
    cache: Mutex<BlockCache>,
}

/// 最近使用过的块的副本
struct BlockCache {
    queue: Vec<(BlockId, Box<DataBlock>)>,
}

impl BlockStore {
    pub fn new(device: Arc<dyn BlockDevice>) -> Result<Self> {
        if device.block_size() != BLOCK_SIZE {
            log::error!(
                "device block size {} does not match {BLOCK_SIZE}",
                device.block_size()
            );
            return Err(Error::InvalidFormat);
        }
        let total_blocks = u32::try_from(device.num_blocks()).map_err(|_| Error::InvalidFormat)?;

        Ok(Self {
            device,
            total_blocks,
            cache: Mutex::new(BlockCache::new()),
        })
    }

    #[inline]
    pub fn total_blocks(&self) -> u32 {
        self.total_blocks
    }

    /// 文件系统可能只占用设备的前一部分，之后的块号一律越界
    pub fn narrow(&mut self, total_blocks: u32) {
        self.total_blocks = self.total_blocks.min(total_blocks);
    }

    pub fn read_block(&self, id: BlockId) -> Result<DataBlock> {
        self.check(id)?;

        if let Some(data) = self.cache.lock().get(id) {
            return Ok(*data);
        }

        let mut data = [0; BLOCK_SIZE];
        self.device.read_block(id.index(), &mut data)?;
        self.cache.lock().put(id, &data);
        Ok(data)
    }

    pub fn write_block(&self, id: BlockId, data: &DataBlock) -> Result<()> {
        self.check(id)?;

        if let Err(e) = self.device.write_block(id.index(), data) {
            // 设备状态未知，缓存里的旧副本不可信
            self.cache.lock().evict(id);
            return Err(e.into());
        }
        self.cache.lock().put(id, data);
        Ok(())
    }

    #[inline]
    pub fn zero_block(&self, id: BlockId) -> Result<()> {
        self.write_block(id, &[0; BLOCK_SIZE])
    }

    /// 读取一块并处理
    #[inline]
    pub fn map<V>(&self, id: BlockId, f: impl FnOnce(&DataBlock) -> V) -> Result<V> {
        Ok(f(&self.read_block(id)?))
    }

    /// 读-改-写一整块
    pub fn modify<V>(&self, id: BlockId, f: impl FnOnce(&mut DataBlock) -> V) -> Result<V> {
        let mut data = self.read_block(id)?;
        let value = f(&mut data);
        self.write_block(id, &data)?;
        Ok(value)
    }

    fn check(&self, id: BlockId) -> Result<()> {
        if u32::from(id) >= self.total_blocks {
            return Err(Error::OutOfRange(id.into()));
        }
        Ok(())
    }
}

impl BlockCache {
    /// 块缓存个数的上限
    const CAPACITY: usize = 16;

    const fn new() -> Self {
        Self { queue: Vec::new() }
    }

    fn get(&self, id: BlockId) -> Option<&DataBlock> {
        self.queue
            .iter()
            .find_map(|(cached, data)| (*cached == id).then_some(&**data))
    }

    fn put(&mut self, id: BlockId, data: &DataBlock) {
        if let Some((_, cached)) = self.queue.iter_mut().find(|(cached, _)| *cached == id) {
            cached.copy_from_slice(data);
            return;
        }

        // 触及上限，踢走最早进入的块
        if self.queue.len() == Self::CAPACITY {
            self.queue.remove(0);
        }
        self.queue.push((id, Box::new(*data)));
    }

    fn evict(&mut self, id: BlockId) {
        self.queue.retain(|(cached, _)| *cached != id);
    }
}

#[cfg(test)]
mod tests {
    use block_dev::RamDisk;

    use super::*;

    #[test]
    fn out_of_range_is_rejected() {
        let store = BlockStore::new(Arc::new(RamDisk::new(BLOCK_SIZE, 8))).unwrap();
        assert!(matches!(
            store.read_block(BlockId::new(8)),
            Err(Error::OutOfRange(8))
        ));
        assert!(matches!(
            store.write_block(BlockId::new(9), &[0; BLOCK_SIZE]),
            Err(Error::OutOfRange(9))
        ));
    }

    #[test]
    fn writes_reach_the_device_immediately() {
        let disk = Arc::new(RamDisk::new(BLOCK_SIZE, 8));
        let store = BlockStore::new(disk.clone()).unwrap();

        store.modify(BlockId::new(3), |data| data[10] = 0xAB).unwrap();

        let mut raw = [0; BLOCK_SIZE];
        disk.read_block(3, &mut raw).unwrap();
        assert_eq!(raw[10], 0xAB);
        assert_eq!(store.read_block(BlockId::new(3)).unwrap()[10], 0xAB);
    }

    #[test]
    fn cache_eviction_keeps_contents_correct() {
        let store = BlockStore::new(Arc::new(RamDisk::new(BLOCK_SIZE, 64))).unwrap();
        for i in 0..40u32 {
            store
                .modify(BlockId::new(i), |data| data[0] = i as u8)
                .unwrap();
        }
        for i in 0..40u32 {
            assert_eq!(store.read_block(BlockId::new(i)).unwrap()[0], i as u8);
        }
    }

    #[test]
    fn mismatched_block_size_is_rejected() {
        assert!(matches!(
            BlockStore::new(Arc::new(RamDisk::new(1024, 8))),
            Err(Error::InvalidFormat)
        ));
    }
}
