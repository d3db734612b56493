use enumflags2::{BitFlags, bitflags};

use crate::DirEntryType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    /// Inode number
    pub inode: u64,
    pub kind: DirEntryType,
    pub mode: BitFlags<Mode>,
    /// 硬链接个数
    pub links: u32,
    /// File size
    pub size: u64,
    /// Occupying data blocks
    pub blocks: u64,
    /// Optimal I/O block size
    pub block_size: u64,
}

/// 权限位，与 POSIX `st_mode` 的低 12 位一致
#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    OtherExec = 0o0001,
    OtherWrite = 0o0002,
    OtherRead = 0o0004,
    GroupExec = 0o0010,
    GroupWrite = 0o0020,
    GroupRead = 0o0040,
    OwnerExec = 0o0100,
    OwnerWrite = 0o0200,
    OwnerRead = 0o0400,
    Sticky = 0o1000,
    SetGid = 0o2000,
    SetUid = 0o4000,
}
