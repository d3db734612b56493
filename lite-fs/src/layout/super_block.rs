use crate::{BLOCK_BITS, MAGIC};

use super::INODES_PER_BLOCK;

/// 超级块位于 1 号块：
/// - 提供文件系统合法性校验；
/// - 定位其它连续区域
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct SuperBlock {
    /// 魔数：用于校验文件系统合法性
    magic: u32,
    /// 文件系统占据块数
    pub nblocks: u32,
    /// inode 表的容量
    pub ninodes: u32,
    /// inode 表的起始块
    pub first_inode_block: u32,
}

impl SuperBlock {
    /// 超级块所在的块
    pub const BLOCK_ID: u32 = 1;
    /// 块位图的起始块
    pub const BITMAP_START: u32 = 2;

    #[inline]
    pub fn init(&mut self, nblocks: u32, ninodes: u32) {
        *self = Self {
            magic: MAGIC,
            nblocks,
            ninodes,
            first_inode_block: Self::BITMAP_START + Self::bitmap_blocks_for(nblocks),
        };
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC
            && self.first_inode_block == Self::BITMAP_START + self.bitmap_blocks()
            && self.data_area_start() < self.nblocks
    }

    #[inline]
    pub fn bitmap_blocks(&self) -> u32 {
        Self::bitmap_blocks_for(self.nblocks)
    }

    #[inline]
    pub fn inode_blocks(&self) -> u32 {
        self.ninodes.div_ceil(INODES_PER_BLOCK as u32)
    }

    /// 数据区域的首块，之前的块都属于保留区域
    #[inline]
    pub fn data_area_start(&self) -> u32 {
        self.first_inode_block + self.inode_blocks()
    }

    #[inline]
    fn bitmap_blocks_for(nblocks: u32) -> u32 {
        nblocks.div_ceil(BLOCK_BITS as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_arithmetic() {
        let mut super_block = SuperBlock {
            magic: 0,
            nblocks: 0,
            ninodes: 0,
            first_inode_block: 0,
        };
        assert!(!super_block.is_valid());

        super_block.init(4096, 64);
        assert!(super_block.is_valid());
        assert_eq!(super_block.bitmap_blocks(), 1);
        assert_eq!(super_block.first_inode_block, 3);
        assert_eq!(super_block.inode_blocks(), 4);
        assert_eq!(super_block.data_area_start(), 7);

        super_block.init(16384, 1024);
        assert_eq!(super_block.bitmap_blocks(), 2);
        assert_eq!(super_block.data_area_start(), 4 + 64);
    }

    #[test]
    fn geometry_without_data_region_is_invalid() {
        let mut super_block = SuperBlock {
            magic: 0,
            nblocks: 0,
            ninodes: 0,
            first_inode_block: 0,
        };
        super_block.init(8, 128);
        assert!(!super_block.is_valid());
    }
}
