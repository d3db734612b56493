//! # 索引节点层
//!
//! 位于内存的文件句柄，确立了文件系统的操作逻辑：
//! 通过多个 [`Inode`] 形成文件树。
//!
//! 句柄只记录 inode 编号，真正的状态都在 [`Volume`] 里。
//! 改动卷的操作在一次调用内持有写锁，只读操作持有读锁。

use alloc::string::String;
use alloc::sync::Arc;

use enumflags2::BitFlags;
use spin::RwLock;
use vfs::{DirEntry, Mode, Result, Stat};

use crate::{ROOT_INO, Volume};

/// 挂载后共享的卷
pub type FileSystem = Arc<RwLock<Volume>>;

#[derive(Clone)]
pub struct Inode {
    ino: u32,
    fs: FileSystem,
}

impl Inode {
    pub fn root(fs: &FileSystem) -> Self {
        Self::new(ROOT_INO, fs.clone())
    }

    #[inline]
    pub fn ino(&self) -> u32 {
        self.ino
    }

    /// 根据文件名获取 inode
    pub fn find(&self, name: &str) -> Result<Self> {
        let (ino, _) = self.fs.read().find_entry(self.ino, name.as_bytes())?;
        Ok(self.child(ino))
    }

    /// 在当前目录下创建普通文件
    pub fn create(&self, name: &str, mode: BitFlags<Mode>) -> Result<Self> {
        let ino = self
            .fs
            .write()
            .create(self.ino, name.as_bytes(), mode.bits())?;
        Ok(self.child(ino))
    }

    /// 在当前目录下为 `target` 新增名字 `name`
    pub fn link(&self, name: &str, target: &Inode) -> Result<()> {
        self.fs
            .write()
            .link(target.ino, self.ino, name.as_bytes())
    }

    pub fn symlink(&self, name: &str, target: &str) -> Result<Self> {
        let ino = self
            .fs
            .write()
            .symlink(self.ino, name.as_bytes(), target.as_bytes())?;
        Ok(self.child(ino))
    }

    pub fn unlink(&self, name: &str) -> Result<()> {
        self.fs.write().unlink(self.ino, name.as_bytes())
    }

    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<usize> {
        self.fs.read().read(self.ino, offset, buf)
    }

    pub fn write_at(&self, offset: usize, buf: &[u8]) -> Result<usize> {
        self.fs.write().write(self.ino, offset, buf, false)
    }

    /// 写到文件末尾
    pub fn append(&self, buf: &[u8]) -> Result<usize> {
        self.fs.write().write(self.ino, 0, buf, true)
    }

    /// 修改属性：先改大小，再改权限位
    pub fn set_attr(&self, size: Option<u32>, mode: Option<BitFlags<Mode>>) -> Result<()> {
        let mut fs = self.fs.write();
        if let Some(size) = size {
            fs.set_size(self.ino, size)?;
        }
        if let Some(mode) = mode {
            fs.set_mode(self.ino, mode)?;
        }
        Ok(())
    }

    /// 读出符号链接的目标，`uid` 为 0 时视为超级用户
    pub fn read_link(&self, uid: u32) -> Result<String> {
        self.fs.read().follow_link(self.ino, uid)
    }

    /// 从 `cursor` 开始遍历目录，`parent` 提供 `..` 的编号
    pub fn read_dir(&self, parent: &Inode, cursor: usize) -> ReadDir {
        ReadDir {
            dir: self.clone(),
            parent: parent.ino,
            cursor,
            done: false,
        }
    }

    pub fn stat(&self) -> Result<Stat> {
        self.fs.read().stat(self.ino)
    }
}

impl Inode {
    #[inline]
    fn new(ino: u32, fs: FileSystem) -> Self {
        Self { ino, fs }
    }

    #[inline]
    fn child(&self, ino: u32) -> Self {
        Self::new(ino, self.fs.clone())
    }
}

/// 可中断、可恢复的目录遍历。
///
/// 每一步单独加读锁；把 [`ReadDir::cursor`] 交给 [`Inode::read_dir`] 即可从断点继续。
pub struct ReadDir {
    dir: Inode,
    parent: u32,
    cursor: usize,
    done: bool,
}

impl ReadDir {
    /// 下一项的游标
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

impl Iterator for ReadDir {
    type Item = Result<DirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let step = self
            .dir
            .fs
            .read()
            .dir_entry_at(self.dir.ino, self.parent, self.cursor);
        match step {
            Ok(Some((entry, next))) => {
                self.cursor = next;
                Some(Ok(entry))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
