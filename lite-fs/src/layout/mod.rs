//! # 磁盘数据结构层
//!
//! lite-fs 的磁盘布局：
//! 引导块 | 超级块 | 块位图 | 索引节点区域 | 数据块区域
//!
//! 所有整数均为小端序 `u32`。

mod super_block;
pub use super_block::SuperBlock;

mod bitmap;
pub use bitmap::Bitmap;

mod inode;
pub use inode::{
    DiskInode, DiskInodeKind, INODE_SIZE, INODES_PER_BLOCK, MAX_SYMLINK_LEN, SymlinkInode,
};

mod index;
pub use index::{
    IndirectBlock, MAX_FILE_BLOCKS, NDIRECT, NINDIRECT, count_data_blocks, direct_slot,
    indirect_slot, needs_double_indirect,
};

/// 文件项，也属于磁盘文件系统数据结构
mod dir_entry;
pub use dir_entry::{DirEntry, MAX_NAME_LEN};
