mod cli;

use std::error::Error;
use std::io;

use clap::Parser;
use cli::Cli;
use typed_bytesize::ByteSizeIec;
use vdfs::{Geometry, BLOCK_SIZE};
use vdfs_shell::{Shell, UserList};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let geometry = Geometry {
        total_blocks: u32::try_from(ByteSizeIec::mib(cli.size).0 / BLOCK_SIZE as u64)?,
        inode_count: cli.inodes,
    };
    let fs = vdfs_shell::mount(&cli.disk, geometry, cli.format)?;
    let users = UserList::load(&cli.users)?;

    let mut shell = Shell::new(fs, users);
    shell.run(io::stdin().lock(), &mut io::stdout())?;

    shell.users().save(&cli.users)?;
    log::info!("users saved to {}", cli.users.display());

    Ok(())
}
