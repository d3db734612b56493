//! # 映像层
//!
//! 整个卷的内容常驻内存，所有结构都直接在映像上按偏移取用。
//! 与块设备的交互只发生在装载和 [`Image::sync`] 时：
//! 每块记录自上次同步以来是否被修改，同步时只写回脏块。

use alloc::vec;
use alloc::vec::Vec;
use core::mem;

use block_dev::BlockDevice;

use crate::{BLOCK_SIZE, DataBlock};

/// 按 8 字节对齐的块，保证块内按 `u32`/`u64` 解释时地址合法
#[derive(Clone)]
#[repr(C, align(8))]
struct Block(DataBlock);

pub struct Image {
    blocks: Vec<Block>,
    /// 是否为脏块
    modified: Vec<bool>,
}

impl Image {
    /// 全零映像，所有块都视为已修改
    pub fn new(total_blocks: usize) -> Self {
        Self {
            blocks: vec![Block([0; BLOCK_SIZE]); total_blocks],
            modified: vec![true; total_blocks],
        }
    }

    pub fn load(block_device: &dyn BlockDevice, total_blocks: usize) -> Self {
        let mut blocks = vec![Block([0; BLOCK_SIZE]); total_blocks];
        for (block_id, block) in blocks.iter_mut().enumerate() {
            block_device.read_block(block_id, &mut block.0);
        }

        Self {
            blocks,
            modified: vec![false; total_blocks],
        }
    }

    /// 把脏块写回块设备，返回写回的块数
    pub fn sync(&mut self, block_device: &dyn BlockDevice) -> usize {
        let mut written = 0;
        for (block_id, modified) in self.modified.iter_mut().enumerate() {
            if *modified {
                *modified = false;
                block_device.write_block(block_id, &self.blocks[block_id].0);
                written += 1;
            }
        }
        written
    }

    pub fn get<T: Sized>(&self, block_id: u32, offset: usize) -> &T {
        check_bounds::<T>(offset);
        let block = &self.blocks[block_id as usize].0;
        unsafe { &*block.as_ptr().add(offset).cast() }
    }

    pub fn get_mut<T: Sized>(&mut self, block_id: u32, offset: usize) -> &mut T {
        check_bounds::<T>(offset);
        self.modified[block_id as usize] = true;
        let block = &mut self.blocks[block_id as usize].0;
        unsafe { &mut *block.as_mut_ptr().add(offset).cast() }
    }

    #[inline]
    pub fn map<T: Sized, V>(&self, block_id: u32, offset: usize, f: impl FnOnce(&T) -> V) -> V {
        f(self.get(block_id, offset))
    }

    #[inline]
    pub fn map_mut<T: Sized, V>(
        &mut self,
        block_id: u32,
        offset: usize,
        f: impl FnOnce(&mut T) -> V,
    ) -> V {
        f(self.get_mut(block_id, offset))
    }

    #[inline]
    pub fn zero(&mut self, block_id: u32) {
        self.map_mut(block_id, 0, |data_block: &mut DataBlock| data_block.fill(0));
    }
}

/// 块按 8 字节对齐，偏移对齐即地址对齐
#[inline]
fn check_bounds<T>(offset: usize) {
    assert!(mem::size_of::<T>() + offset <= BLOCK_SIZE);
    assert_eq!(offset % mem::align_of::<T>(), 0, "misaligned on-disk access");
}
