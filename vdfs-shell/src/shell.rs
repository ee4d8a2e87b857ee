//! 交互式命令行：解析一行输入并调用文件系统的会话操作

use std::io::{self, BufRead, Write};

use enumflags2::BitFlags;
use vdfs::{FileSystem, Permission, Session, User, GID_GUEST, GID_ROOT};

use crate::users::{Switched, UserList};

const HELP: &str = "\
commands:
    ls                      list the current directory
    cd    <path>            change the working directory
    mkdir <name> [perm]     create a directory (octal perm, default 755)
    touch <name> [perm]     create an empty file (octal perm, default 644)
    rm    <name>            remove a file or an empty directory
    cat   <name>            print a file
    write <name> <content>  overwrite a file with the content
    su    <uid> <gid>       switch user, creating it if unknown
    pwd                     print the working directory
    df                      show free blocks and inodes
    exit/logout             save and quit";

/// 执行完一条命令后是否继续
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Shell {
    fs: FileSystem,
    session: Session,
    users: UserList,
}

impl Shell {
    /// 以 root 身份从根目录开始
    pub fn new(fs: FileSystem, users: UserList) -> Self {
        let session = Session::new(&fs, User::ROOT);
        Self { fs, session, users }
    }

    #[inline]
    pub fn fs(&self) -> &FileSystem {
        &self.fs
    }

    #[inline]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[inline]
    pub fn users(&self) -> &UserList {
        &self.users
    }

    pub fn prompt(&self) -> String {
        let user = self.session.user();
        let who = match user.gid {
            GID_ROOT => String::from("root"),
            GID_GUEST => format!("guest{}", user.uid),
            _ => format!("user{}", user.uid),
        };
        format!("[{who}@vdfs{}]$ ", self.session.cwd_path())
    }

    /// 读到 `exit`/`logout` 或输入结束为止
    pub fn run(&mut self, input: impl BufRead, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "Welcome to vdfs! (type 'help' for the command list)")?;

        let mut lines = input.lines();
        loop {
            write!(out, "{}", self.prompt())?;
            out.flush()?;

            let Some(line) = lines.next().transpose()? else {
                writeln!(out)?;
                self.shutdown(out)?;
                return Ok(());
            };
            if self.execute(&line, out)? == Flow::Exit {
                return Ok(());
            }
        }
    }

    /// 执行一行命令。文件系统的错误只打印出来，不会中断会话
    pub fn execute(&mut self, line: &str, out: &mut impl Write) -> io::Result<Flow> {
        let args: Vec<&str> = line.split_whitespace().collect();
        let Some((&cmd, args)) = args.split_first() else {
            return Ok(Flow::Continue);
        };
        log::debug!("execute {cmd} {args:?}");

        match (cmd, args) {
            ("exit" | "logout", _) => {
                self.shutdown(out)?;
                return Ok(Flow::Exit);
            }
            ("help", _) => writeln!(out, "{HELP}")?,
            ("ls", _) => self.list(out)?,
            ("pwd", _) => writeln!(out, "{}", self.session.cwd_path())?,
            ("df", _) => self.df(out)?,
            ("cd", [path, ..]) => {
                if let Err(e) = self.fs.change_dir(&mut self.session, path) {
                    writeln!(out, "cd: {path}: {e}")?;
                }
            }
            ("mkdir" | "touch", [name, rest @ ..]) => {
                let perm = match rest.first().map(|perm| parse_perm(perm)) {
                    None => None,
                    Some(Some(perm)) => Some(perm),
                    Some(None) => {
                        writeln!(out, "{cmd}: invalid permission {:?}", rest[0])?;
                        return Ok(Flow::Continue);
                    }
                };
                let result = if cmd == "mkdir" {
                    self.fs.make_dir(&self.session, name, perm)
                } else {
                    self.fs.touch(&self.session, name, perm)
                };
                if let Err(e) = result {
                    writeln!(out, "{cmd}: {name}: {e}")?;
                }
            }
            ("rm", [name, ..]) => {
                if let Err(e) = self.fs.remove(&self.session, name) {
                    writeln!(out, "rm: {name}: {e}")?;
                }
            }
            ("cat", [name, ..]) => match self.fs.read_file(&self.session, name) {
                Ok(content) => writeln!(out, "{}", String::from_utf8_lossy(&content))?,
                Err(e) => writeln!(out, "cat: {name}: {e}")?,
            },
            ("write", [name, content @ ..]) if !content.is_empty() => {
                let content = content.join(" ");
                if let Err(e) = self
                    .fs
                    .write_file(&self.session, name, content.as_bytes())
                {
                    writeln!(out, "write: {name}: {e}")?;
                }
            }
            ("su", [uid, gid, ..]) => self.switch_user(uid, gid, out)?,
            ("cd", _) => writeln!(out, "usage: cd <path>")?,
            ("mkdir", _) => writeln!(out, "usage: mkdir <name> [perm]")?,
            ("touch", _) => writeln!(out, "usage: touch <name> [perm]")?,
            ("rm", _) => writeln!(out, "usage: rm <name>")?,
            ("cat", _) => writeln!(out, "usage: cat <name>")?,
            ("write", _) => writeln!(out, "usage: write <name> <content>")?,
            ("su", _) => writeln!(out, "usage: su <uid> <gid>")?,
            _ => writeln!(out, "unknown command: {cmd}! type 'help' for the command list")?,
        }

        Ok(Flow::Continue)
    }

    fn list(&self, out: &mut impl Write) -> io::Result<()> {
        let listings = match self.fs.list(&self.session) {
            Ok(listings) => listings,
            Err(e) => return writeln!(out, "ls: {e}"),
        };

        for listing in listings {
            let inode = &listing.inode;
            let tag = if inode.is_dir() { "[DIR]" } else { "[FILE]" };
            writeln!(
                out,
                "{tag:<8}{:<20}UID:{:<6}GID:{:<6}  {}",
                listing.name,
                inode.owner,
                inode.group,
                perm_string(inode.perm)
            )?;
        }
        Ok(())
    }

    fn df(&self, out: &mut impl Write) -> io::Result<()> {
        let stat = self.fs.stat_fs();
        writeln!(
            out,
            "blocks: {}/{} free ({} bytes each), inodes: {}/{} free",
            stat.free_blocks, stat.data_blocks, stat.block_size, stat.free_inodes, stat.inode_count
        )
    }

    fn switch_user(&mut self, uid: &str, gid: &str, out: &mut impl Write) -> io::Result<()> {
        let (Ok(uid), Ok(gid)) = (uid.parse::<u32>(), gid.parse::<u32>()) else {
            return writeln!(out, "su: ids must be non-negative numbers");
        };

        match self.users.switch(self.session.user(), uid, gid) {
            Ok(switched) => {
                match switched {
                    Switched::Created(user) => {
                        writeln!(out, "new user created: UID {} GID {}", user.uid, user.gid)?
                    }
                    Switched::Regrouped { user, from } => writeln!(
                        out,
                        "user {} moved from group {from} to {}",
                        user.uid, user.gid
                    )?,
                    Switched::Existing(_) => (),
                }
                self.session.switch_user(switched.user());
                writeln!(out, "now acting as {}", self.prompt_name())
            }
            Err(e) => writeln!(out, "su: {e}"),
        }
    }

    fn prompt_name(&self) -> String {
        let user = self.session.user();
        match user.gid {
            GID_ROOT => String::from("root"),
            GID_GUEST => format!("guest {}", user.uid),
            _ => format!("user {}", user.uid),
        }
    }

    /// 写回超级块与位图
    fn shutdown(&mut self, out: &mut impl Write) -> io::Result<()> {
        if let Err(e) = self.fs.sync() {
            log::error!("failed to flush the disk: {e}");
            writeln!(out, "warning: failed to flush the disk: {e}")?;
        }
        writeln!(out, "Bye!")
    }
}

/// 八进制权限，如 `755`、`0644`
pub fn parse_perm(text: &str) -> Option<BitFlags<Permission>> {
    u16::from_str_radix(text, 8)
        .ok()
        .filter(|&mode| mode <= 0o777)
        .map(Permission::from_mode)
}

/// `rwx r-x r-x` 形式
pub fn perm_string(perm: BitFlags<Permission>) -> String {
    use Permission::*;

    [
        [OwnerRead, OwnerWrite, OwnerExec],
        [GroupRead, GroupWrite, GroupExec],
        [OtherRead, OtherWrite, OtherExec],
    ]
    .iter()
    .map(|triplet| {
        triplet
            .iter()
            .zip(['r', 'w', 'x'])
            .map(|(&flag, c)| if perm.contains(flag) { c } else { '-' })
            .collect::<String>()
    })
    .collect::<Vec<_>>()
    .join(" ")
}
