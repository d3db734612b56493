//! 块链的解析与伸缩
//!
//! 所有操作都作用于 inode 记录的副本，由调用者写回。
//! 伸缩每次只动一块；新分配的块在挂上块链之前都已清零，
//! 文件大小只在所有块都挂好之后才推进。

use alloc::vec::Vec;

use log::{debug, error, warn};
use vfs::{Error, Result};

use super::Volume;
use crate::BLOCK_SIZE;
use crate::layout::*;

impl Volume {
    /// 把文件内的字节偏移解析为块编号。
    /// 偏移越过文件末尾、inode 是符号链接或块链残缺时返回空。
    pub fn resolve(&self, inode: &DiskInode, offset: u32) -> Option<u32> {
        if inode.is_symlink() || offset >= inode.size {
            return None;
        }

        let b = offset as usize / BLOCK_SIZE;
        let block_id = match indirect_slot(b) {
            None => inode.direct[direct_slot(b)],
            Some(slot) => {
                let indirect = if needs_double_indirect(b) {
                    self.pointer(inode.indirect2, slot)?
                } else {
                    inode.indirect
                };
                self.pointer(indirect, direct_slot(b))?
            }
        };

        self.is_data_block(block_id).then_some(block_id)
    }

    /// 文件增长一块。
    ///
    /// 需要的二级索引块、一级索引块和数据块依次分配，全部到手后才挂上块链；
    /// 任一步分配失败都会释放本次已分配的块并返回 [`Error::NoSpace`]，
    /// 此时 inode 保持原样。
    pub fn add_block(&mut self, inode: &mut DiskInode) -> Result<()> {
        if inode.is_symlink() {
            return Err(Error::InvalidArgument);
        }

        let n = count_data_blocks(inode.size);
        if n >= MAX_FILE_BLOCKS {
            warn!("file already spans the whole block chain");
            return Err(Error::NoSpace);
        }

        // 先确认第 n 块的上级索引块哪些已存在，哪些需要新建
        let (indirect2, indirect) = match indirect_slot(n) {
            None => (None, None),
            Some(_) if !needs_double_indirect(n) => {
                (None, Some(self.existing(inode.indirect, direct_slot(n))?))
            }
            Some(slot) => {
                let indirect2 = self.existing(inode.indirect2, slot + direct_slot(n))?;
                let indirect = match indirect2 {
                    Some(table) => self.existing(self.read_pointer(table, slot), direct_slot(n))?,
                    None => None,
                };
                (Some(indirect2), Some(indirect))
            }
        };

        let mut reserved = Vec::with_capacity(3);
        let new_indirect2 = match indirect2 {
            Some(None) => Some(self.reserve(&mut reserved)?),
            _ => None,
        };
        let new_indirect = match indirect {
            Some(None) => Some(self.reserve(&mut reserved)?),
            _ => None,
        };
        let data = self.reserve(&mut reserved)?;

        // 挂链
        match indirect_slot(n) {
            None => inode.direct[n] = data,
            Some(_) if !needs_double_indirect(n) => {
                if let Some(block_id) = new_indirect {
                    inode.indirect = block_id;
                }
                self.write_pointer(inode.indirect, direct_slot(n), data);
            }
            Some(slot) => {
                if let Some(block_id) = new_indirect2 {
                    inode.indirect2 = block_id;
                }
                if let Some(block_id) = new_indirect {
                    self.write_pointer(inode.indirect2, slot, block_id);
                }
                let table = self.read_pointer(inode.indirect2, slot);
                self.write_pointer(table, direct_slot(n), data);
            }
        }

        inode.size = ((n + 1) * BLOCK_SIZE) as u32;
        debug!("grew file to {} blocks, data block {data}", n + 1);
        Ok(())
    }

    /// 文件缩短一块，随之清空的索引块一并释放。
    ///
    /// 所有块编号都在释放之前校验，残缺的块链返回 [`Error::Io`]。
    pub fn remove_block(&mut self, inode: &mut DiskInode) -> Result<()> {
        if inode.is_symlink() {
            return Err(Error::InvalidArgument);
        }

        let n = count_data_blocks(inode.size);
        if n == 0 {
            return Ok(());
        }
        let b = n - 1;

        match indirect_slot(b) {
            None => {
                let data = self.required(inode.direct[b])?;
                self.free_block(data);
                inode.direct[b] = 0;
            }
            Some(_) if !needs_double_indirect(b) => {
                let indirect = self.required(inode.indirect)?;
                let data = self.required(self.read_pointer(indirect, direct_slot(b)))?;

                self.free_block(data);
                self.write_pointer(indirect, direct_slot(b), 0);
                if direct_slot(b) == 0 {
                    self.free_block(indirect);
                    inode.indirect = 0;
                }
            }
            Some(slot) => {
                let indirect2 = self.required(inode.indirect2)?;
                let indirect = self.required(self.read_pointer(indirect2, slot))?;
                let data = self.required(self.read_pointer(indirect, direct_slot(b)))?;

                self.free_block(data);
                self.write_pointer(indirect, direct_slot(b), 0);
                if direct_slot(b) == 0 {
                    self.free_block(indirect);
                    self.write_pointer(indirect2, slot, 0);
                    if slot == 0 {
                        self.free_block(indirect2);
                        inode.indirect2 = 0;
                    }
                }
            }
        }

        inode.size = (b * BLOCK_SIZE) as u32;
        debug!("shrank file to {b} blocks");
        Ok(())
    }

    /// 逐块伸缩到容纳 `new_size` 字节，成功后大小恰为 `new_size`。
    ///
    /// 增长途中空间不足时，本次加上的块全部撤回，inode 恢复原状。
    pub fn change_size(&mut self, inode: &mut DiskInode, new_size: u32) -> Result<()> {
        if inode.is_symlink() {
            return Err(Error::InvalidArgument);
        }

        let target = count_data_blocks(new_size);
        if target > MAX_FILE_BLOCKS {
            warn!("{new_size} bytes exceed the maximum file size");
            return Err(Error::NoSpace);
        }

        let old_size = inode.size;
        let mut added = 0;
        while count_data_blocks(inode.size) < target {
            match self.add_block(inode) {
                Ok(()) => added += 1,
                Err(Error::NoSpace) => {
                    warn!("rolling back {added} block(s) after running out of space");
                    for _ in 0..added {
                        self.remove_block(inode)?;
                    }
                    inode.size = old_size;
                    return Err(Error::NoSpace);
                }
                Err(err) => return Err(err),
            }
        }
        while count_data_blocks(inode.size) > target {
            self.remove_block(inode)?;
        }

        inode.size = new_size;
        Ok(())
    }
}

impl Volume {
    /// 分配一块清零的块并记入 `reserved`；
    /// 失败时释放 `reserved` 中已有的块
    fn reserve(&mut self, reserved: &mut Vec<u32>) -> Result<u32> {
        if let Some(block_id) = self.alloc_zeroed() {
            reserved.push(block_id);
            return Ok(block_id);
        }

        for &block_id in reserved.iter().rev() {
            self.free_block(block_id);
        }
        warn!("volume is full, released {} reserved block(s)", reserved.len());
        Err(Error::NoSpace)
    }

    /// 增长时的上级索引块：已存在时返回其编号，需要新建时返回空。
    /// 它本应存在（`slot` 不是首项）却为空时，块链残缺。
    fn existing(&self, block_id: u32, slot: usize) -> Result<Option<u32>> {
        match block_id {
            0 if slot == 0 => Ok(None),
            0 => {
                error!("missing index block before slot {slot}");
                Err(Error::Io)
            }
            block_id => self.required(block_id).map(Some),
        }
    }

    /// 块链中必须存在的块
    fn required(&self, block_id: u32) -> Result<u32> {
        if self.is_data_block(block_id) {
            Ok(block_id)
        } else {
            error!("block chain references invalid block {block_id}");
            Err(Error::Io)
        }
    }

    /// 读取索引块中的编号，索引块非法时返回空
    fn pointer(&self, table: u32, slot: usize) -> Option<u32> {
        self.is_data_block(table)
            .then(|| self.read_pointer(table, slot))
    }

    #[inline]
    fn read_pointer(&self, table: u32, slot: usize) -> u32 {
        self.image
            .map(table, 0, |indirect_block: &IndirectBlock| indirect_block[slot])
    }

    #[inline]
    fn write_pointer(&mut self, table: u32, slot: usize, block_id: u32) {
        self.image
            .map_mut(table, 0, |indirect_block: &mut IndirectBlock| {
                indirect_block[slot] = block_id
            });
    }
}
