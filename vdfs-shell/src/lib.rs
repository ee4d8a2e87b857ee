
mod block_file;
mod shell;
mod users;

use std::path::Path;
use std::sync::Arc;

use vdfs::{Error, FileSystem, Geometry};

pub use self::{
    block_file::BlockFile,
    shell::{parse_perm, perm_string, Flow, Shell},
    users::{SwitchError, Switched, UserList},
};

/// 挂载磁盘镜像：镜像存在且合法时直接打开，否则按 `geometry` 新建并格式化
pub fn mount(disk: &Path, geometry: Geometry, force_format: bool) -> vdfs::Result<FileSystem> {
    if !force_format && disk.exists() {
        match FileSystem::open(Arc::new(BlockFile::open(disk)?)) {
            Ok(fs) => return Ok(fs),
            Err(Error::InvalidFormat) => {
                log::warn!("{} is not a valid vdfs image, formatting", disk.display())
            }
            Err(e) => return Err(e),
        }
    }

    log::info!(
        "creating {} with {} blocks and {} inodes",
        disk.display(),
        geometry.total_blocks,
        geometry.inode_count
    );
    let device = BlockFile::create(disk, geometry.total_blocks as usize)?;
    FileSystem::format(Arc::new(device), geometry)
}
