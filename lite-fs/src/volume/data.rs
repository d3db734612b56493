//! 按字节读写文件内容

use enumflags2::BitFlags;
use log::{error, trace};
use vfs::{DirEntryType, Error, Mode, Result, Stat};

use super::Volume;
use crate::layout::*;
use crate::{BLOCK_SIZE, DataBlock};

impl Volume {
    /// 从 `offset` 处读到 `buf`，读取范围截断在文件末尾，返回实际读取的字节数
    pub fn read(&self, ino: u32, offset: usize, buf: &mut [u8]) -> Result<usize> {
        let inode = self.inode(ino)?;
        match inode.kind()? {
            DiskInodeKind::File => self.read_data(&inode, offset, buf),
            DiskInodeKind::Directory => Err(Error::IsADirectory),
            DiskInodeKind::Symlink => Err(Error::InvalidArgument),
        }
    }

    /// 把 `buf` 写到 `offset` 处，`append` 时从文件末尾写起。
    /// 写入越过文件末尾时先扩展文件，扩展失败则不写入任何内容。
    pub fn write(&mut self, ino: u32, offset: usize, buf: &[u8], append: bool) -> Result<usize> {
        let mut inode = self.inode(ino)?;
        match inode.kind()? {
            DiskInodeKind::File => {}
            DiskInodeKind::Directory => return Err(Error::IsADirectory),
            DiskInodeKind::Symlink => return Err(Error::InvalidArgument),
        }

        let result = self.write_data(&mut inode, offset, buf, append);
        self.write_inode(ino, &inode)?;
        result
    }

    /// 改变文件大小；目录不允许
    pub fn set_size(&mut self, ino: u32, size: u32) -> Result<()> {
        let mut inode = self.inode(ino)?;
        if inode.is_dir() {
            return Err(Error::PermissionDenied);
        }

        let result = self.change_size(&mut inode, size);
        self.write_inode(ino, &inode)?;
        result
    }

    /// 更新权限位。符号链接的记录里没有权限位，忽略。
    pub fn set_mode(&mut self, ino: u32, mode: BitFlags<Mode>) -> Result<()> {
        let mut inode = self.inode(ino)?;
        if inode.is_symlink() {
            return Ok(());
        }

        inode.mode = mode.bits();
        self.write_inode(ino, &inode)
    }

    pub fn stat(&self, ino: u32) -> Result<Stat> {
        let inode = self.inode(ino)?;
        let kind = inode.kind()?;

        let (mode, links, blocks) = match kind {
            DiskInodeKind::Symlink => {
                let symlink = self.symlink_inode(ino)?;
                return Ok(Stat {
                    inode: ino as u64,
                    kind: DirEntryType::SymLink,
                    mode: BitFlags::from_bits_truncate(0o777),
                    links: symlink.nlink,
                    size: symlink.size as u64,
                    blocks: 0,
                    block_size: BLOCK_SIZE as u64,
                });
            }
            // 目录还被自身的 `..` 引用
            DiskInodeKind::Directory => (inode.mode, inode.nlink + 1, count_data_blocks(inode.size)),
            DiskInodeKind::File => (inode.mode, inode.nlink, count_data_blocks(inode.size)),
        };

        Ok(Stat {
            inode: ino as u64,
            kind: kind.into(),
            mode: BitFlags::from_bits_truncate(mode),
            links,
            size: inode.size as u64,
            blocks: blocks as u64,
            block_size: BLOCK_SIZE as u64,
        })
    }
}

impl Volume {
    pub(super) fn read_data(
        &self,
        inode: &DiskInode,
        offset: usize,
        buf: &mut [u8],
    ) -> Result<usize> {
        let end = offset.saturating_add(buf.len()).min(inode.size as usize);
        let mut pos = offset;
        let mut read_size = 0;

        while pos < end {
            let block_id = self.resolve(inode, pos as u32).ok_or_else(|| {
                error!("offset {pos} within file size resolves to no block");
                Error::Io
            })?;
            let inblock_offset = pos % BLOCK_SIZE;
            let len = (BLOCK_SIZE - inblock_offset).min(end - pos);

            self.image.map(block_id, 0, |data_block: &DataBlock| {
                buf[read_size..read_size + len]
                    .copy_from_slice(&data_block[inblock_offset..inblock_offset + len])
            });
            trace!("read {len} bytes from block {block_id}");

            pos += len;
            read_size += len;
        }

        Ok(read_size)
    }

    pub(super) fn write_data(
        &mut self,
        inode: &mut DiskInode,
        offset: usize,
        buf: &[u8],
        append: bool,
    ) -> Result<usize> {
        let offset = if append { inode.size as usize } else { offset };
        let end = offset
            .checked_add(buf.len())
            .and_then(|end| u32::try_from(end).ok())
            .ok_or(Error::NoSpace)?;
        if end > inode.size {
            self.change_size(inode, end)?;
        }

        let end = end as usize;
        let mut pos = offset;
        let mut write_size = 0;

        while pos < end {
            let block_id = self.resolve(inode, pos as u32).ok_or_else(|| {
                error!("offset {pos} within file size resolves to no block");
                Error::Io
            })?;
            let inblock_offset = pos % BLOCK_SIZE;
            let len = (BLOCK_SIZE - inblock_offset).min(end - pos);

            self.image.map_mut(block_id, 0, |data_block: &mut DataBlock| {
                data_block[inblock_offset..inblock_offset + len]
                    .copy_from_slice(&buf[write_size..write_size + len])
            });
            trace!("wrote {len} bytes to block {block_id}");

            pos += len;
            write_size += len;
        }

        Ok(write_size)
    }
}
