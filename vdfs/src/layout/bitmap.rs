use crate::{BlockId, BlockStore, Result, BLOCK_BITS, BLOCK_SIZE};

/// 位图区域，记录其指示区域的分配情况。
///
/// 位图常驻内存，并与磁盘上的位图块一一对应：
/// 第 i 位位于第 `i / BLOCK_BITS` 个位图块的第 `i % BLOCK_BITS / 8` 字节，
/// 字节内从低位到高位排列。
#[derive(Debug, Clone)]
pub struct Bitmap {
    /// 位图的起始块
    start_block: u32,
    /// 位图所指示的单元数，超出部分的位永不使用
    capacity: u32,
    bits: Vec<u8>,
}

impl Bitmap {
    /// 全部空闲的位图
    pub fn new(start_block: u32, blocks: u32, capacity: u32) -> Self {
        debug_assert!(capacity as usize <= blocks as usize * BLOCK_BITS);
        Self {
            start_block,
            capacity,
            bits: vec![0; blocks as usize * BLOCK_SIZE],
        }
    }

    pub fn load(store: &BlockStore, start_block: u32, blocks: u32, capacity: u32) -> Result<Self> {
        let mut bitmap = Self::new(start_block, blocks, capacity);
        for (i, chunk) in bitmap.bits.chunks_mut(BLOCK_SIZE).enumerate() {
            chunk.copy_from_slice(&store.read_block(BlockId::new(start_block + i as u32))?);
        }
        Ok(bitmap)
    }

    #[inline]
    pub fn is_set(&self, index: u32) -> bool {
        index < self.capacity && self.bits[index as usize / 8] & (1 << (index % 8)) != 0
    }

    /// 已置位的个数
    pub fn count_set(&self) -> u32 {
        self.bits.iter().map(|byte| byte.count_ones()).sum()
    }

    /// 编号最小的空闲位
    pub fn first_clear(&self) -> Option<u32> {
        let (byte_index, byte) = self
            .bits
            .iter()
            .enumerate()
            .find(|&(_, &byte)| byte != u8::MAX)?;
        let index = (byte_index * 8) as u32 + byte.trailing_ones();
        (index < self.capacity).then_some(index)
    }

    /// 置位，返回原先的值
    pub fn set(&mut self, index: u32) -> bool {
        let was_set = self.is_set(index);
        self.bits[index as usize / 8] |= 1 << (index % 8);
        was_set
    }

    /// 清零，返回原先的值
    pub fn clear(&mut self, index: u32) -> bool {
        let was_set = self.is_set(index);
        self.bits[index as usize / 8] &= !(1 << (index % 8));
        was_set
    }

    /// 把第 `index` 位所在的那一个位图块写回磁盘
    pub fn persist_bit(&self, store: &BlockStore, index: u32) -> Result<()> {
        self.persist_block(store, index as usize / BLOCK_BITS)
    }

    pub fn persist_all(&self, store: &BlockStore) -> Result<()> {
        (0..self.bits.len() / BLOCK_SIZE).try_for_each(|block| self.persist_block(store, block))
    }

    fn persist_block(&self, store: &BlockStore, block: usize) -> Result<()> {
        let mut data = [0; BLOCK_SIZE];
        data.copy_from_slice(&self.bits[block * BLOCK_SIZE..(block + 1) * BLOCK_SIZE]);
        store.write_block(BlockId::new(self.start_block + block as u32), &data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowest_clear_bit_wins() {
        let mut bitmap = Bitmap::new(1, 1, 20);
        for i in 0..10 {
            bitmap.set(i);
        }
        bitmap.clear(3);
        assert_eq!(bitmap.first_clear(), Some(3));
        bitmap.set(3);
        assert_eq!(bitmap.first_clear(), Some(10));
        assert_eq!(bitmap.count_set(), 10);
    }

    #[test]
    fn capacity_bounds_the_scan() {
        let mut bitmap = Bitmap::new(1, 1, 12);
        for i in 0..12 {
            assert!(!bitmap.set(i));
        }
        assert_eq!(bitmap.first_clear(), None);
        assert!(!bitmap.is_set(12));
    }
}
