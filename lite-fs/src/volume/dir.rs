//! 目录项存取与基于它的创建、链接、删除操作
//!
//! 目录的内容就是一串定长的 [`DirEntry`]，与普通文件一样经由块链读写。
//! inode 编号为 0 的槽位是空槽，可被复用。

use alloc::string::String;

use log::debug;
use vfs::{DirEntryType, Error, Result};

use super::Volume;
use crate::layout::*;
use crate::{BLOCK_SIZE, ROOT_INO};

/// 条件符号链接的前缀：`root?甲:乙`，超级用户解析为甲，其余用户解析为乙
const CONDITIONAL_PREFIX: &[u8] = b"root?";

impl Volume {
    /// 在目录中按名字查找，返回目标 inode 编号以及目录项在目录内的偏移
    pub fn find_entry(&self, dir_ino: u32, name: &[u8]) -> Result<(u32, usize)> {
        let dir = self.dir_inode(dir_ino)?;
        let name = validate_name(name)?;
        self.find_in(&dir, name)?.ok_or(Error::NotFound)
    }

    /// 找一个空槽；没有时目录增长一块，新块全零即全是空槽。返回槽位的偏移
    pub fn create_blank_entry(&mut self, dir_ino: u32) -> Result<usize> {
        let mut dir = self.dir_inode(dir_ino)?;
        let result = self.blank_slot(&mut dir);
        self.write_inode(dir_ino, &dir)?;
        result
    }

    /// 在目录下创建普通文件，返回其 inode 编号
    pub fn create(&mut self, dir_ino: u32, name: &[u8], mode: u32) -> Result<u32> {
        let name = self.check_new_entry(dir_ino, name)?;

        let slot = self.create_blank_entry(dir_ino)?;
        let ino = self.free_inode()?;

        let mut inode = DiskInode::default();
        inode.init(DiskInodeKind::File, mode);
        self.write_inode(ino, &inode)?;
        self.write_entry(dir_ino, slot, &DirEntry::new(name, ino))?;

        debug!("created inode {ino} for {:?}", String::from_utf8_lossy(name));
        Ok(ino)
    }

    /// 为已有的 inode 新增一个名字；目录不可硬链接
    pub fn link(&mut self, target_ino: u32, dir_ino: u32, name: &[u8]) -> Result<()> {
        let name = self.check_new_entry(dir_ino, name)?;

        let mut target = self.inode(target_ino)?;
        if target.is_dir() {
            return Err(Error::PermissionDenied);
        }
        if target.is_free() {
            return Err(Error::NotFound);
        }

        let slot = self.create_blank_entry(dir_ino)?;
        // 符号链接与普通 inode 的 nlink 字段位置相同
        target.nlink += 1;
        self.write_inode(target_ino, &target)?;
        self.write_entry(dir_ino, slot, &DirEntry::new(name, target_ino))?;

        debug!("linked inode {target_ino}, nlink now {}", target.nlink);
        Ok(())
    }

    /// 创建符号链接，目标路径就地存放在 inode 中
    pub fn symlink(&mut self, dir_ino: u32, name: &[u8], target: &[u8]) -> Result<u32> {
        let name = self.check_new_entry(dir_ino, name)?;
        let symlink = SymlinkInode::new(target)?;

        let slot = self.create_blank_entry(dir_ino)?;
        let ino = self.free_inode()?;

        self.write_symlink_inode(ino, &symlink)?;
        self.write_entry(dir_ino, slot, &DirEntry::new(name, ino))?;

        debug!("created symlink inode {ino}");
        Ok(ino)
    }

    /// 删除目录项并减少目标的链接数。
    ///
    /// NOTE: 链接数归零的 inode 不回收其块链，这些块直到 inode 被复用时才会泄漏出去。
    pub fn unlink(&mut self, dir_ino: u32, name: &[u8]) -> Result<()> {
        let (ino, offset) = self.find_entry(dir_ino, name)?;

        // 只清零编号字段，残留的名字无碍
        let mut dir = self.inode(dir_ino)?;
        self.write_data(&mut dir, offset, &0u32.to_le_bytes(), false)?;

        let mut inode = self.inode(ino)?;
        inode.nlink = inode.nlink.saturating_sub(1);
        self.write_inode(ino, &inode)?;

        if inode.is_free() {
            debug!("inode {ino} orphaned, its blocks are retained");
        } else {
            debug!("unlinked inode {ino}, nlink now {}", inode.nlink);
        }
        Ok(())
    }

    /// 读出符号链接的目标。条件链接按 `uid` 选择其中一半，存储的字节不会被改动。
    pub fn follow_link(&self, ino: u32, uid: u32) -> Result<String> {
        if !self.inode(ino)?.is_symlink() {
            return Err(Error::InvalidArgument);
        }

        let symlink = self.symlink_inode(ino)?;
        let target = select_target(symlink.target(), uid);
        core::str::from_utf8(target)
            .map(String::from)
            .map_err(|_| Error::Io)
    }

    /// 目录遍历的一步。
    ///
    /// 游标 0、1 分别是 `.` 和 `..`；其后游标 `c` 对应偏移 `(c - 2) * DirEntry::SIZE` 的槽位，
    /// 空槽被跳过。返回目录项与下一次调用使用的游标，遍历结束时返回空。
    pub fn dir_entry_at(
        &self,
        dir_ino: u32,
        parent_ino: u32,
        cursor: usize,
    ) -> Result<Option<(vfs::DirEntry, usize)>> {
        let dir = self.dir_inode(dir_ino)?;

        match cursor {
            0 => {
                let entry = vfs::DirEntry::new(".", dir_ino as u64, DirEntryType::Directory);
                return Ok(Some((entry, 1)));
            }
            1 => {
                let entry = vfs::DirEntry::new("..", parent_ino as u64, DirEntryType::Directory);
                return Ok(Some((entry, 2)));
            }
            _ => {}
        }

        let mut entry = DirEntry::default();
        let mut cursor = cursor;
        loop {
            let offset = (cursor - 2).saturating_mul(DirEntry::SIZE);
            if offset >= dir.size as usize {
                return Ok(None);
            }
            self.read_data(&dir, offset, entry.as_bytes_mut())?;
            cursor += 1;

            if entry.is_empty() {
                continue;
            }

            let ty = self.inode(entry.inode_id())?.kind()?.into();
            let name = String::from_utf8_lossy(entry.name()).into_owned();
            let dir_entry = vfs::DirEntry::new(name, entry.inode_id() as u64, ty);
            return Ok(Some((dir_entry, cursor)));
        }
    }
}

impl Volume {
    fn dir_inode(&self, ino: u32) -> Result<DiskInode> {
        let inode = self.inode(ino)?;
        if inode.is_dir() {
            Ok(inode)
        } else {
            Err(Error::NotADirectory)
        }
    }

    /// 校验名字并确认目录中没有同名项
    fn check_new_entry<'n>(&self, dir_ino: u32, name: &'n [u8]) -> Result<&'n [u8]> {
        let dir = self.dir_inode(dir_ino)?;
        let name = validate_name(name)?;
        match self.find_in(&dir, name)? {
            Some(_) => Err(Error::AlreadyExists),
            None => Ok(name),
        }
    }

    fn find_in(&self, dir: &DiskInode, name: &[u8]) -> Result<Option<(u32, usize)>> {
        let mut entry = DirEntry::default();
        for offset in (0..dir.size as usize).step_by(DirEntry::SIZE) {
            self.read_data(dir, offset, entry.as_bytes_mut())?;
            if !entry.is_empty() && entry.name() == name {
                return Ok(Some((entry.inode_id(), offset)));
            }
        }

        Ok(None)
    }

    fn blank_slot(&mut self, dir: &mut DiskInode) -> Result<usize> {
        let mut entry = DirEntry::default();
        for offset in (0..dir.size as usize).step_by(DirEntry::SIZE) {
            self.read_data(dir, offset, entry.as_bytes_mut())?;
            if entry.is_empty() {
                return Ok(offset);
            }
        }

        let offset = count_data_blocks(dir.size) * BLOCK_SIZE;
        self.add_block(dir)?;
        Ok(offset)
    }

    fn write_entry(&mut self, dir_ino: u32, offset: usize, entry: &DirEntry) -> Result<()> {
        let mut dir = self.inode(dir_ino)?;
        self.write_data(&mut dir, offset, entry.as_bytes(), false)?;
        self.write_inode(dir_ino, &dir)
    }

    /// 从根目录之后找第一个空闲的 inode
    fn free_inode(&self) -> Result<u32> {
        for ino in ROOT_INO + 1..self.super_block.ninodes {
            if self.inode(ino)?.is_free() {
                return Ok(ino);
            }
        }

        Err(Error::NoSpace)
    }
}

fn validate_name(name: &[u8]) -> Result<&[u8]> {
    if name.len() > MAX_NAME_LEN {
        Err(Error::NameTooLong)
    } else if name.is_empty() || name.contains(&0) {
        Err(Error::InvalidArgument)
    } else {
        Ok(name)
    }
}

fn select_target(target: &[u8], uid: u32) -> &[u8] {
    let Some(rest) = target.strip_prefix(CONDITIONAL_PREFIX) else {
        return target;
    };

    match rest.iter().position(|&c| c == b':') {
        Some(colon) if uid == 0 => &rest[..colon],
        Some(colon) => &rest[colon + 1..],
        None => rest,
    }
}

#[cfg(test)]
mod tests {
    use alloc::format;
    use alloc::string::ToString;
    use alloc::vec::Vec;

    use super::*;
    use crate::volume::tests::volume;

    /// 从 `cursor` 遍历到底，记下每一项以及取它时的游标
    fn walk(volume: &Volume, dir: u32, cursor: usize) -> Vec<(usize, vfs::DirEntry)> {
        let mut entries = Vec::new();
        let mut cursor = cursor;
        while let Some((entry, next)) = volume.dir_entry_at(dir, ROOT_INO, cursor).unwrap() {
            entries.push((cursor, entry));
            cursor = next;
        }
        entries
    }

    fn assert_resumable(volume: &Volume) {
        let full = walk(volume, ROOT_INO, 0);
        for (i, (cursor, _)) in full.iter().enumerate() {
            let rest = walk(volume, ROOT_INO, *cursor);
            assert_eq!(rest, full[i..]);
        }

        let (_, last) = full.last().unwrap();
        let after_last = volume
            .dir_entry_at(ROOT_INO, ROOT_INO, full.len() + 1000)
            .unwrap();
        assert!(after_last.is_none(), "{last:?} should be the final entry");
    }

    #[test]
    fn create_and_find() {
        let mut volume = volume();
        let ino = volume.create(ROOT_INO, b"a.txt", 0o644).unwrap();
        assert!(ino > ROOT_INO);

        let (found, offset) = volume.find_entry(ROOT_INO, b"a.txt").unwrap();
        assert_eq!(found, ino);
        assert_eq!(offset, 0);
        assert_eq!(volume.find_entry(ROOT_INO, b"a.tx"), Err(Error::NotFound));
        assert_eq!(volume.find_entry(ino, b"a.txt"), Err(Error::NotADirectory));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut volume = volume();
        let ino = volume.create(ROOT_INO, b"dup", 0o644).unwrap();
        assert_eq!(volume.create(ROOT_INO, b"dup", 0o644), Err(Error::AlreadyExists));
        assert_eq!(volume.symlink(ROOT_INO, b"dup", b"x"), Err(Error::AlreadyExists));
        assert_eq!(volume.link(ino, ROOT_INO, b"dup"), Err(Error::AlreadyExists));
    }

    #[test]
    fn name_length_limits() {
        let mut volume = volume();
        let longest = [b'n'; MAX_NAME_LEN];
        volume.create(ROOT_INO, &longest, 0o644).unwrap();
        assert!(volume.find_entry(ROOT_INO, &longest).is_ok());

        let too_long = [b'n'; MAX_NAME_LEN + 1];
        assert_eq!(volume.create(ROOT_INO, &too_long, 0o644), Err(Error::NameTooLong));
        assert_eq!(volume.find_entry(ROOT_INO, &too_long), Err(Error::NameTooLong));

        assert_eq!(volume.create(ROOT_INO, b"", 0o644), Err(Error::InvalidArgument));
        assert_eq!(volume.create(ROOT_INO, b"a\0b", 0o644), Err(Error::InvalidArgument));
    }

    #[test]
    fn directory_grows_one_block_at_a_time() {
        let mut volume = volume();
        let per_block = BLOCK_SIZE / DirEntry::SIZE;
        for i in 0..=per_block {
            volume.create(ROOT_INO, format!("f{i}").as_bytes(), 0o644).unwrap();
        }

        let root = volume.inode(ROOT_INO).unwrap();
        assert_eq!(root.size as usize, 2 * BLOCK_SIZE);
        let last = format!("f{per_block}");
        let (_, offset) = volume.find_entry(ROOT_INO, last.as_bytes()).unwrap();
        assert_eq!(offset, BLOCK_SIZE);
    }

    #[test]
    fn blank_entry_reuses_tombstone() {
        let mut volume = volume();
        for name in [b"a", b"b", b"c"] {
            volume.create(ROOT_INO, name, 0o644).unwrap();
        }
        let (_, b_offset) = volume.find_entry(ROOT_INO, b"b").unwrap();

        volume.unlink(ROOT_INO, b"b").unwrap();
        assert_eq!(volume.find_entry(ROOT_INO, b"b"), Err(Error::NotFound));
        assert_eq!(volume.create_blank_entry(ROOT_INO), Ok(b_offset));

        volume.create(ROOT_INO, b"d", 0o644).unwrap();
        assert_eq!(volume.find_entry(ROOT_INO, b"d").unwrap().1, b_offset);
    }

    #[test]
    fn blank_entry_is_never_live() {
        let mut volume = volume();
        for i in 0..12 {
            volume.create(ROOT_INO, format!("e{i}").as_bytes(), 0o644).unwrap();
        }
        volume.unlink(ROOT_INO, b"e4").unwrap();

        let slot = volume.create_blank_entry(ROOT_INO).unwrap();
        for i in 0..12 {
            if let Ok((_, offset)) = volume.find_entry(ROOT_INO, format!("e{i}").as_bytes()) {
                assert_ne!(offset, slot);
            }
        }
    }

    #[test]
    fn unlink_keeps_blocks_of_orphan() {
        let mut volume = volume();
        let ino = volume.create(ROOT_INO, b"victim", 0o644).unwrap();
        volume.write(ino, 0, &[7; 3 * BLOCK_SIZE], false).unwrap();
        let free = volume.free_blocks();

        volume.unlink(ROOT_INO, b"victim").unwrap();
        assert_eq!(volume.free_blocks(), free);
        let orphan = volume.inode(ino).unwrap();
        assert!(orphan.is_free());
        assert_eq!(orphan.size as usize, 3 * BLOCK_SIZE);

        assert_eq!(volume.unlink(ROOT_INO, b"victim"), Err(Error::NotFound));
        // 空闲的 inode 会被下一次创建复用
        assert_eq!(volume.create(ROOT_INO, b"next", 0o644), Ok(ino));
    }

    #[test]
    fn hard_links_share_inode() {
        let mut volume = volume();
        let ino = volume.create(ROOT_INO, b"orig", 0o644).unwrap();
        volume.write(ino, 0, b"shared", false).unwrap();
        volume.link(ino, ROOT_INO, b"alias").unwrap();
        assert_eq!(volume.inode(ino).unwrap().nlink, 2);

        volume.unlink(ROOT_INO, b"orig").unwrap();
        let (alias, _) = volume.find_entry(ROOT_INO, b"alias").unwrap();
        assert_eq!(alias, ino);

        let mut buf = [0; 6];
        assert_eq!(volume.read(alias, 0, &mut buf), Ok(6));
        assert_eq!(&buf, b"shared");
        assert_eq!(volume.inode(ino).unwrap().nlink, 1);
    }

    #[test]
    fn link_rejects_directories_and_orphans() {
        let mut volume = volume();
        assert_eq!(volume.link(ROOT_INO, ROOT_INO, b"loop"), Err(Error::PermissionDenied));

        let ino = volume.create(ROOT_INO, b"gone", 0o644).unwrap();
        volume.unlink(ROOT_INO, b"gone").unwrap();
        assert_eq!(volume.link(ino, ROOT_INO, b"back"), Err(Error::NotFound));
    }

    #[test]
    fn inode_table_exhaustion() {
        // 只有 2、3 号 inode 可用
        let mut volume = Volume::format(64, 4).unwrap();
        volume.create(ROOT_INO, b"one", 0o644).unwrap();
        volume.symlink(ROOT_INO, b"two", b"one").unwrap();
        assert_eq!(volume.create(ROOT_INO, b"three", 0o644), Err(Error::NoSpace));
        assert_eq!(volume.symlink(ROOT_INO, b"four", b"one"), Err(Error::NoSpace));
    }

    #[test]
    fn plain_symlink() {
        let mut volume = volume();
        let ino = volume.symlink(ROOT_INO, b"ln", b"/etc/passwd").unwrap();
        assert_eq!(volume.follow_link(ino, 0).unwrap(), "/etc/passwd");
        assert_eq!(volume.follow_link(ino, 1000).unwrap(), "/etc/passwd");
        assert_eq!(volume.inode(ino).unwrap().kind(), Ok(DiskInodeKind::Symlink));
    }

    #[test]
    fn conditional_symlink_depends_on_caller() {
        let mut volume = volume();
        let ino = volume
            .symlink(ROOT_INO, b"cond", b"root?/root/secret:/tmp/public")
            .unwrap();

        assert_eq!(volume.follow_link(ino, 0).unwrap(), "/root/secret");
        assert_eq!(volume.follow_link(ino, 1000).unwrap(), "/tmp/public");
        // 解析不改动存储的内容
        assert_eq!(volume.follow_link(ino, 0).unwrap(), "/root/secret");
        assert_eq!(
            volume.symlink_inode(ino).unwrap().target(),
            b"root?/root/secret:/tmp/public"
        );

        let ino = volume.symlink(ROOT_INO, b"half", b"root?/only").unwrap();
        assert_eq!(volume.follow_link(ino, 0).unwrap(), "/only");
        assert_eq!(volume.follow_link(ino, 7).unwrap(), "/only");
    }

    #[test]
    fn symlink_limits() {
        let mut volume = volume();
        let target = "t".repeat(MAX_SYMLINK_LEN + 1);
        assert_eq!(
            volume.symlink(ROOT_INO, b"long", target.as_bytes()),
            Err(Error::NameTooLong)
        );
        assert_eq!(volume.find_entry(ROOT_INO, b"long"), Err(Error::NotFound));

        let ino = volume.create(ROOT_INO, b"plain", 0o644).unwrap();
        assert_eq!(volume.follow_link(ino, 0), Err(Error::InvalidArgument));
    }

    #[test]
    fn enumerate_empty_directory() {
        let volume = volume();
        let entries = walk(&volume, ROOT_INO, 0);
        let names: Vec<_> = entries.iter().map(|(_, e)| e.name.as_str()).collect();
        assert_eq!(names, [".", ".."]);
        assert_resumable(&volume);
    }

    #[test]
    fn enumerate_single_entry() {
        let mut volume = volume();
        let ino = volume.symlink(ROOT_INO, b"only", b"x").unwrap();

        let entries = walk(&volume, ROOT_INO, 0);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].1, vfs::DirEntry::new("only", ino as u64, DirEntryType::SymLink));
        assert_resumable(&volume);
    }

    #[test]
    fn enumerate_many_blocks_with_tombstones() {
        let mut volume = volume();
        for i in 0..20 {
            volume.create(ROOT_INO, format!("file{i:02}").as_bytes(), 0o644).unwrap();
        }
        for i in (0..20).step_by(3) {
            volume.unlink(ROOT_INO, format!("file{i:02}").as_bytes()).unwrap();
        }

        let names: Vec<_> = walk(&volume, ROOT_INO, 0)
            .into_iter()
            .skip(2)
            .map(|(_, entry)| entry.name)
            .collect();
        let expected: Vec<_> = (0..20)
            .filter(|i| i % 3 != 0)
            .map(|i| format!("file{i:02}"))
            .collect();
        assert_eq!(names, expected);
        assert_resumable(&volume);
    }

    #[test]
    fn enumerate_reports_entry_kinds() {
        let mut volume = volume();
        volume.create(ROOT_INO, b"reg", 0o644).unwrap();
        volume.symlink(ROOT_INO, b"sym", b"reg").unwrap();

        let kinds: Vec<_> = walk(&volume, ROOT_INO, 0)
            .into_iter()
            .map(|(_, entry)| (entry.name, entry.ty))
            .collect();
        assert_eq!(
            kinds,
            [
                (".".to_string(), DirEntryType::Directory),
                ("..".to_string(), DirEntryType::Directory),
                ("reg".to_string(), DirEntryType::Regular),
                ("sym".to_string(), DirEntryType::SymLink),
            ]
        );
    }
}
