use alloc::string::String;

/// 目录遍历时交给上层的目录项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Inode number
    pub inode: u64,
    pub ty: DirEntryType,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum DirEntryType {
    Directory,
    SymLink,
    #[default]
    Regular,
}

impl DirEntry {
    #[inline]
    pub fn new(name: impl Into<String>, inode: u64, ty: DirEntryType) -> Self {
        Self {
            inode,
            ty,
            name: name.into(),
        }
    }
}
