use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// 目录项或名字不存在
    NotFound,
    /// 创建、链接时撞上同名项
    AlreadyExists,
    /// 名字或符号链接目标超出定长上限
    NameTooLong,
    /// 位图或 inode 表耗尽，或文件超出块链可编址的范围
    NoSpace,
    /// 磁盘结构不变式被破坏：该有的索引块不见了，或在范围内的偏移解析不出块
    Io,
    /// 例如对目录改变大小
    PermissionDenied,
    IsADirectory,
    NotADirectory,
    InvalidArgument,
}

pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::NotFound => "no such file or directory",
            Self::AlreadyExists => "file exists",
            Self::NameTooLong => "file name too long",
            Self::NoSpace => "no space left on device",
            Self::Io => "input/output error",
            Self::PermissionDenied => "operation not permitted",
            Self::IsADirectory => "is a directory",
            Self::NotADirectory => "not a directory",
            Self::InvalidArgument => "invalid argument",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for Error {}
