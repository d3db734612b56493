use log::{debug, warn};

use crate::BLOCK_BITS;
use crate::image::Image;

/// 位图区域内块的结构
type BitmapBlock = [u64; BLOCK_BITS / 64];

/// 块位图，每一位对应卷上的一块：1 为空闲，0 为已分配。
///
/// 引导块、超级块、位图自身和 inode 表构成保留区域，
/// 它们的位在格式化时即置 0，且拒绝被释放。
#[derive(Debug)]
pub struct Bitmap {
    /// 位图的起始块
    start_block_id: u32,
    /// 位图占用块数
    blocks: u32,
    /// 数据区域的首块
    data_start: u32,
    /// 卷的总块数
    total_blocks: u32,
}

/// 块编号
struct BlockID(u32);

impl Bitmap {
    #[inline]
    pub fn new(start_block_id: u32, blocks: u32, data_start: u32, total_blocks: u32) -> Self {
        Self {
            start_block_id,
            blocks,
            data_start,
            total_blocks,
        }
    }

    /// 把数据区域的位全部置为空闲
    pub fn init(&self, image: &mut Image) {
        for block_id in self.data_start..self.total_blocks {
            let (block_index, group_index, ingroup_index) = BlockID(block_id).decode();
            image.map_mut(
                self.start_block_id + block_index as u32,
                0,
                |bitmap_block: &mut BitmapBlock| bitmap_block[group_index] |= 1 << ingroup_index,
            );
        }
    }

    /// 从数据区域首块开始寻找空闲块，分配并返回其编号。
    /// 若位图的空间用尽，则返回空。
    pub fn alloc(&self, image: &mut Image) -> Option<u32> {
        let first_block_index = self.data_start as usize / BLOCK_BITS;

        for block_index in first_block_index..self.blocks as usize {
            let bitmap_block_id = self.start_block_id + block_index as u32;
            let Some((group_index, ingroup_index)) =
                image.map(bitmap_block_id, 0, |bitmap_block: &BitmapBlock| {
                    bitmap_block
                        .iter()
                        .enumerate()
                        .find_map(|(group_index, &bits)| {
                            let bits = bits & self.floor_mask(block_index, group_index);
                            (bits != 0).then_some((group_index, bits.trailing_zeros()))
                        })
                })
            else {
                continue;
            };

            image.map_mut(bitmap_block_id, 0, |bitmap_block: &mut BitmapBlock| {
                bitmap_block[group_index] &= !(1 << ingroup_index)
            });
            let block_id = BlockID::encode(block_index, group_index, ingroup_index as usize);
            debug!("allocated block {block_id}");
            return Some(block_id);
        }

        None
    }

    /// 释放一块。保留区域内的块与越界的块都被拒绝
    pub fn dealloc(&self, image: &mut Image, block_id: u32) {
        if block_id < self.data_start || block_id >= self.total_blocks {
            warn!("refused to free reserved block {block_id}");
            return;
        }

        let (block_index, group_index, ingroup_index) = BlockID(block_id).decode();
        let freed = image.map_mut(
            self.start_block_id + block_index as u32,
            0,
            |bitmap_block: &mut BitmapBlock| {
                let was_free = bitmap_block[group_index] & (1 << ingroup_index) != 0;
                bitmap_block[group_index] |= 1 << ingroup_index;
                !was_free
            },
        );

        if freed {
            debug!("freed block {block_id}");
        } else {
            warn!("block {block_id} was already free");
        }
    }

    pub fn count_free(&self, image: &Image) -> usize {
        (0..self.blocks)
            .map(|block_index| {
                image.map(
                    self.start_block_id + block_index,
                    0,
                    |bitmap_block: &BitmapBlock| {
                        bitmap_block
                            .iter()
                            .map(|bits| bits.count_ones() as usize)
                            .sum::<usize>()
                    },
                )
            })
            .sum()
    }
}

impl Bitmap {
    /// 屏蔽掉数据区域之前的位
    fn floor_mask(&self, block_index: usize, group_index: usize) -> u64 {
        let group_start = block_index * BLOCK_BITS + group_index * 64;
        match (self.data_start as usize).checked_sub(group_start) {
            None | Some(0) => u64::MAX,
            Some(below) if below < 64 => u64::MAX << below,
            Some(_) => 0,
        }
    }
}

impl BlockID {
    /// 线性映射编码得到块ID
    #[inline]
    fn encode(block_index: usize, group_index: usize, ingroup_index: usize) -> u32 {
        (block_index * BLOCK_BITS + group_index * 64 + ingroup_index) as u32
    }

    fn decode(self) -> (usize, usize, usize) {
        let mut block_id = self.0 as usize;

        let block_index = block_id / BLOCK_BITS;
        block_id %= BLOCK_BITS;
        (block_index, block_id / 64, block_id % 64)
    }
}
