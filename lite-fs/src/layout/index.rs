//! 块索引换算
//!
//! 文件内的第 `b` 块（从 0 计）落在哪一级索引上只取决于 `b` 本身：
//! - `b < NDIRECT`：直接索引的第 `b` 项
//! - `b < NDIRECT + NINDIRECT`：一级索引块的第 `b - NDIRECT` 项
//! - 其余：二级索引块的第 `(b - NDIRECT - NINDIRECT) / NINDIRECT` 项
//!   所指的一级索引块内，第 `(b - NDIRECT - NINDIRECT) % NINDIRECT` 项

use crate::BLOCK_SIZE;

/// 直接索引块可编号数量
pub const NDIRECT: usize = 10;
/// 间接索引块的编号容量
pub const NINDIRECT: usize = BLOCK_SIZE / 4;
/// 单个文件最多可编号的数据块数
pub const MAX_FILE_BLOCKS: usize = NDIRECT + NINDIRECT + NINDIRECT * NINDIRECT;

/// 间接索引块
pub type IndirectBlock = [u32; NINDIRECT];

#[inline]
pub fn needs_double_indirect(b: usize) -> bool {
    b >= NDIRECT + NINDIRECT
}

/// 第 `b` 块所在的一级索引块在二级索引块中的位置。
/// 直接索引返回空；挂在 inode 自身一级索引下的返回 0。
#[inline]
pub fn indirect_slot(b: usize) -> Option<usize> {
    if b < NDIRECT {
        None
    } else if !needs_double_indirect(b) {
        Some(0)
    } else {
        Some((b - NDIRECT - NINDIRECT) / NINDIRECT)
    }
}

/// 第 `b` 块在最终持有它的编号数组中的位置
#[inline]
pub fn direct_slot(b: usize) -> usize {
    if b < NDIRECT {
        b
    } else if !needs_double_indirect(b) {
        b - NDIRECT
    } else {
        (b - NDIRECT - NINDIRECT) % NINDIRECT
    }
}

/// 容纳 `size` 字节需要的数据块数
#[inline]
pub fn count_data_blocks(size: u32) -> usize {
    (size as usize).div_ceil(BLOCK_SIZE)
}
