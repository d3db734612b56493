//! 磁盘上的 inode 记录
//!
//! 普通文件与目录通过块链引用数据：
//! - 直接索引：`NDIRECT` 个块编号，每个都指向一个**数据块**
//! - 一级间接：指向一个间接索引块，块内连续存储数据块编号
//! - 二级间接：指向一个二级索引块，块内连续存储间接索引块的编号
//!
//! 符号链接不占用数据块，它的目标路径就地存放，与块链字段重叠。

use core::mem;

use vfs::{DirEntryType, Error, Result};

use super::NDIRECT;
use crate::BLOCK_SIZE;

pub const INODE_SIZE: usize = 64;
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;
/// 符号链接目标的最大长度，末尾还留有 `\0`
pub const MAX_SYMLINK_LEN: usize = INODE_SIZE - 3 * mem::size_of::<u32>() - 1;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct DiskInode {
    /// 以字节计的大小
    pub size: u32,
    /// 文件类型，取值见 [`DiskInodeKind`]
    ftype: u32,
    /// 硬链接个数，为 0 时该槽位可复用
    pub nlink: u32,
    /// 权限位
    pub mode: u32,
    /// 直接索引块
    pub direct: [u32; NDIRECT],
    /// 指向一个一级索引块
    pub indirect: u32,
    /// 指向一个二级索引块
    pub indirect2: u32,
}

/// 符号链接的 inode 视图，与 [`DiskInode`] 共用同一条记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct SymlinkInode {
    /// 目标路径长度
    pub size: u32,
    ftype: u32,
    pub nlink: u32,
    target: [u8; MAX_SYMLINK_LEN + 1],
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DiskInodeKind {
    #[default]
    File = 0,
    Directory = 1,
    Symlink = 2,
}

impl DiskInode {
    #[inline]
    pub fn init(&mut self, kind: DiskInodeKind, mode: u32) {
        *self = Self {
            ftype: kind as u32,
            nlink: 1,
            mode,
            ..Default::default()
        }
    }

    /// 磁盘上的类型字段可能已损坏，无法识别时视为 I/O 错误
    pub fn kind(&self) -> Result<DiskInodeKind> {
        match self.ftype {
            0 => Ok(DiskInodeKind::File),
            1 => Ok(DiskInodeKind::Directory),
            2 => Ok(DiskInodeKind::Symlink),
            _ => Err(Error::Io),
        }
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.ftype == DiskInodeKind::Directory as u32
    }

    #[inline]
    pub fn is_symlink(&self) -> bool {
        self.ftype == DiskInodeKind::Symlink as u32
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.nlink == 0
    }
}

impl SymlinkInode {
    /// 目标超长时返回 [`Error::NameTooLong`]
    pub fn new(target: &[u8]) -> Result<Self> {
        if target.len() > MAX_SYMLINK_LEN {
            return Err(Error::NameTooLong);
        }

        let mut buf = [0; MAX_SYMLINK_LEN + 1];
        buf[..target.len()].copy_from_slice(target);
        Ok(Self {
            size: target.len() as u32,
            ftype: DiskInodeKind::Symlink as u32,
            nlink: 1,
            target: buf,
        })
    }

    #[inline]
    pub fn target(&self) -> &[u8] {
        let len = (self.size as usize).min(MAX_SYMLINK_LEN);
        &self.target[..len]
    }
}

impl From<DiskInodeKind> for DirEntryType {
    fn from(kind: DiskInodeKind) -> Self {
        match kind {
            DiskInodeKind::File => Self::Regular,
            DiskInodeKind::Directory => Self::Directory,
            DiskInodeKind::Symlink => Self::SymLink,
        }
    }
}
