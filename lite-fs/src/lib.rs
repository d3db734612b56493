#![no_std]

extern crate alloc;

/* lite-fs 的整体架构，自上而下 */

// 索引节点层：对外的文件、目录、符号链接操作，负责加锁
mod inode;

// 卷管理层：位图分配、块链伸缩、读写路径与目录项存取
mod volume;

// 磁盘数据结构层：表示磁盘文件系统的数据结构
mod layout;

// 映像层：整卷常驻内存，按块记录修改
mod image;

pub use self::{
    inode::{FileSystem, Inode, ReadDir},
    layout::{
        DirEntry, DiskInode, DiskInodeKind, IndirectBlock, MAX_FILE_BLOCKS, MAX_NAME_LEN,
        MAX_SYMLINK_LEN, NDIRECT, NINDIRECT, SuperBlock, SymlinkInode, direct_slot,
        indirect_slot, needs_double_indirect,
    },
    volume::Volume,
};

pub const MAGIC: u32 = 0x0131_01AE;
pub const BLOCK_SIZE: usize = 1024;
pub const BLOCK_BITS: usize = BLOCK_SIZE * 8;

/// 根目录的 inode 编号；0 号 inode 永不使用，它在目录项里表示空槽
pub const ROOT_INO: u32 = 1;

type DataBlock = [u8; BLOCK_SIZE];
