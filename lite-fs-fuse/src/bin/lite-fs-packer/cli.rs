use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
pub struct Cli {
    /// Directory whose files are packed into the image root
    #[arg(long, short)]
    pub source: PathBuf,

    /// Output directory, the image is written as `fs.img`
    #[arg(long, short = 'O')]
    pub out_dir: PathBuf,

    /// Total blocks of the image
    #[arg(long, default_value_t = 16384)]
    pub blocks: u32,

    /// Capacity of the inode table
    #[arg(long, default_value_t = 1024)]
    pub inodes: u32,
}
