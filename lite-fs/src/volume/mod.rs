//! # 卷管理层
//!
//! [`Volume`] 聚合了超级块、块位图、inode 表与数据区域，
//! 所有磁盘操作都以它为接收者，不存在全局状态。
//!
//! 卷本身不加锁，并发访问由 [`FileSystem`](crate::FileSystem) 的读写锁串行化。

mod chain;
mod data;
mod dir;

use alloc::sync::Arc;

use block_dev::BlockDevice;
use log::{error, info};
use spin::RwLock;
use vfs::{Error, Result};

use crate::image::Image;
use crate::layout::*;
use crate::{FileSystem, ROOT_INO};

pub struct Volume {
    image: Image,
    super_block: SuperBlock,
    bitmap: Bitmap,
}

impl Volume {
    /// 在内存中格式化出一个新卷，根目录已就位。
    /// 放不下数据区域的几何参数会被拒绝。
    pub fn format(total_blocks: u32, inode_count: u32) -> Result<Self> {
        if total_blocks <= SuperBlock::BLOCK_ID || inode_count <= ROOT_INO {
            return Err(Error::InvalidArgument);
        }

        let mut image = Image::new(total_blocks as usize);
        let super_block = image.map_mut(
            SuperBlock::BLOCK_ID,
            0,
            |super_block: &mut SuperBlock| {
                super_block.init(total_blocks, inode_count);
                *super_block
            },
        );
        if !super_block.is_valid() {
            return Err(Error::InvalidArgument);
        }

        let mut volume = Self::assemble(image, super_block);
        volume.bitmap.init(&mut volume.image);

        let mut root = DiskInode::default();
        root.init(DiskInodeKind::Directory, 0o755);
        volume.write_inode(ROOT_INO, &root)?;

        info!(
            "formatted {total_blocks} blocks, {inode_count} inodes, data area starts at block {}",
            super_block.data_area_start()
        );
        Ok(volume)
    }

    /// 先读超级块确定卷的大小，再读入整个卷
    pub fn load(block_device: &dyn BlockDevice) -> Result<Self> {
        let head = Image::load(block_device, SuperBlock::BLOCK_ID as usize + 1);
        let super_block = *head.get::<SuperBlock>(SuperBlock::BLOCK_ID, 0);
        if !super_block.is_valid() {
            error!("corrupt superblock: {super_block:?}");
            return Err(Error::Io);
        }

        let image = Image::load(block_device, super_block.nblocks as usize);
        info!(
            "loaded {} blocks, {} inodes",
            super_block.nblocks, super_block.ninodes
        );
        Ok(Self::assemble(image, super_block))
    }

    /// 将修改过的块写回块设备
    pub fn sync(&mut self, block_device: &dyn BlockDevice) {
        let written = self.image.sync(block_device);
        info!("synced {written} blocks");
    }

    #[inline]
    pub fn share(self) -> FileSystem {
        Arc::new(RwLock::new(self))
    }

    #[inline]
    pub fn super_block(&self) -> &SuperBlock {
        &self.super_block
    }

    pub fn free_blocks(&self) -> usize {
        self.bitmap.count_free(&self.image)
    }

    /// 读出 inode 记录的副本，修改后须经 [`Volume::write_inode`] 写回
    pub fn inode(&self, ino: u32) -> Result<DiskInode> {
        let (block_id, offset) = self.inode_pos(ino)?;
        Ok(*self.image.get(block_id, offset))
    }

    pub fn write_inode(&mut self, ino: u32, inode: &DiskInode) -> Result<()> {
        let (block_id, offset) = self.inode_pos(ino)?;
        *self.image.get_mut(block_id, offset) = *inode;
        Ok(())
    }

    pub fn symlink_inode(&self, ino: u32) -> Result<SymlinkInode> {
        let (block_id, offset) = self.inode_pos(ino)?;
        Ok(*self.image.get(block_id, offset))
    }

    pub fn write_symlink_inode(&mut self, ino: u32, inode: &SymlinkInode) -> Result<()> {
        let (block_id, offset) = self.inode_pos(ino)?;
        *self.image.get_mut(block_id, offset) = *inode;
        Ok(())
    }
}

impl Volume {
    fn assemble(image: Image, super_block: SuperBlock) -> Self {
        let bitmap = Bitmap::new(
            SuperBlock::BITMAP_START,
            super_block.bitmap_blocks(),
            super_block.data_area_start(),
            super_block.nblocks,
        );

        Self {
            image,
            super_block,
            bitmap,
        }
    }

    /// 通过编号获取 inode 在磁盘上的位置：**块ID**以及**块内偏移**
    fn inode_pos(&self, ino: u32) -> Result<(u32, usize)> {
        if ino == 0 || ino >= self.super_block.ninodes {
            error!("inode {ino} is out of range");
            return Err(Error::Io);
        }

        let block_id = self.super_block.first_inode_block + ino / INODES_PER_BLOCK as u32;
        let offset = ino as usize % INODES_PER_BLOCK * INODE_SIZE;
        Ok((block_id, offset))
    }

    /// 分配一块并清零
    fn alloc_zeroed(&mut self) -> Option<u32> {
        let block_id = self.bitmap.alloc(&mut self.image)?;
        self.image.zero(block_id);
        Some(block_id)
    }

    #[inline]
    fn free_block(&mut self, block_id: u32) {
        self.bitmap.dealloc(&mut self.image, block_id);
    }

    /// 块链中的编号只能指向数据区域
    #[inline]
    fn is_data_block(&self, block_id: u32) -> bool {
        block_id >= self.super_block.data_area_start() && block_id < self.super_block.nblocks
    }
}
