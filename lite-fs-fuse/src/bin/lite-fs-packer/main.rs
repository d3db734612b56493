mod cli;

use std::fs::{self, Metadata, OpenOptions};
use std::io;

use clap::Parser;
use cli::Cli;
use enumflags2::BitFlags;
use lite_fs::{BLOCK_SIZE, Inode, Volume};
use lite_fs_fuse::BlockFile;
use log::{info, warn};

fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    info!("source={:?} out_dir={:?}", cli.source, cli.out_dir);

    let fd = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(cli.out_dir.join("fs.img"))?;
    fd.set_len(cli.blocks as u64 * BLOCK_SIZE as u64)?;
    let block_file = BlockFile::new(fd);

    let volume = Volume::format(cli.blocks, cli.inodes)
        .map_err(io::Error::other)?
        .share();
    let root = Inode::root(&volume);

    let mut entries = fs::read_dir(&cli.source)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            warn!("skipping non UTF-8 name {:?}", entry.file_name());
            continue;
        };

        let metadata = entry.metadata()?;
        if metadata.is_symlink() {
            let target = fs::read_link(entry.path())?;
            let Some(target) = target.to_str() else {
                warn!("skipping {name}: non UTF-8 link target");
                continue;
            };
            info!("symlink: {name} -> {target}");
            root.symlink(&name, target).map_err(io::Error::other)?;
        } else if metadata.is_file() {
            let data = fs::read(entry.path())?;
            info!("file: {name} ({} bytes)", data.len());
            root.create(&name, host_mode(&metadata))
                .and_then(|inode| inode.write_at(0, &data))
                .map_err(io::Error::other)?;
        } else {
            warn!("skipping {name}: not a regular file");
        }
    }

    let mut volume = volume.write();
    info!("{} blocks left free", volume.free_blocks());
    volume.sync(&block_file);

    Ok(())
}

#[cfg(unix)]
fn host_mode(metadata: &Metadata) -> BitFlags<vfs::Mode> {
    use std::os::unix::fs::PermissionsExt;

    BitFlags::from_bits_truncate(metadata.permissions().mode())
}

#[cfg(not(unix))]
fn host_mode(metadata: &Metadata) -> BitFlags<vfs::Mode> {
    let mode = if metadata.permissions().readonly() { 0o444 } else { 0o644 };
    BitFlags::from_bits_truncate(mode)
}
