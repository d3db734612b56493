use core::{ptr, slice};

/// 名字的最大长度，末尾还留有 `\0`
pub const MAX_NAME_LEN: usize = 123;

/// 文件系统项的元信息
#[derive(Debug, Clone)]
#[repr(C)]
pub struct DirEntry {
    /// 为 0 时表示空槽
    inode_id: u32,
    // 最后一字节留给 \0
    name: [u8; MAX_NAME_LEN + 1],
}

impl DirEntry {
    /// 元信息大小恒为128字节
    pub const SIZE: usize = 128;

    /// 名字长度由调用者校验
    #[inline]
    pub fn new(name: &[u8], inode_id: u32) -> Self {
        let mut buf = [0; MAX_NAME_LEN + 1];
        buf[..name.len()].copy_from_slice(name);

        Self {
            inode_id,
            name: buf,
        }
    }

    /// 名字的原始字节，不含 `\0`
    pub fn name(&self) -> &[u8] {
        let len = self
            .name
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(MAX_NAME_LEN + 1);
        &self.name[..len]
    }

    #[inline]
    pub fn inode_id(&self) -> u32 {
        self.inode_id
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inode_id == 0
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(ptr::from_ref(self).cast(), Self::SIZE) }
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(ptr::from_mut(self).cast(), Self::SIZE) }
    }
}

impl Default for DirEntry {
    fn default() -> Self {
        Self {
            inode_id: 0,
            name: [0; MAX_NAME_LEN + 1],
        }
    }
}
