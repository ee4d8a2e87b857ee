use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
pub struct Cli {
    /// Disk image backing the filesystem
    #[arg(long, short, default_value = "vdisk.img")]
    pub disk: PathBuf,

    /// User list, one `uid gid` pair per line
    #[arg(long, short, default_value = "user_data.dat")]
    pub users: PathBuf,

    /// Re-format the disk image even if it is valid
    #[arg(long)]
    pub format: bool,

    /// Size of a newly created image in MiB
    #[arg(long, default_value_t = 16)]
    pub size: u64,

    /// Number of inodes of a newly created image
    #[arg(long, default_value_t = 4096)]
    pub inodes: u32,
}
