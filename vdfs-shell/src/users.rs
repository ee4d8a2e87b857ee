//! 用户列表：每行一个 `uid gid`

use core::fmt;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::Path;

use vdfs::{User, GID_ROOT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserList {
    users: Vec<User>,
}

/// `su` 成功后的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Switched {
    Existing(User),
    /// 已有用户，同时被改到了新组
    Regrouped { user: User, from: u32 },
    Created(User),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchError {
    /// 只有 root 组能修改别人的组
    RegroupDenied,
    /// 任何人都不能把已有用户改进 root 组
    PromotionDenied,
    /// 只有 root 组能新建 root 组的用户
    CreationDenied,
}

impl fmt::Display for SwitchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RegroupDenied => "only the root group may change a user's group",
            Self::PromotionDenied => "an existing user cannot be promoted to the root group",
            Self::CreationDenied => "only the root group may create a root-group user",
        })
    }
}

impl std::error::Error for SwitchError {}

impl Default for UserList {
    fn default() -> Self {
        Self {
            users: vec![User::ROOT],
        }
    }
}

impl Switched {
    pub fn user(&self) -> User {
        match *self {
            Self::Existing(user) | Self::Regrouped { user, .. } | Self::Created(user) => user,
        }
    }
}

impl UserList {
    /// 文件不存在时只有 root
    pub fn load(path: &Path) -> io::Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!("{} not found, starting with root only", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e),
        };

        let mut list = Self::parse(&text);
        if list.find(0).is_none() {
            list.users.insert(0, User::ROOT);
        }
        log::info!("loaded {} users from {}", list.users.len(), path.display());
        Ok(list)
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.to_string())
    }

    /// 逐行解析，格式不对的行被跳过
    pub fn parse(text: &str) -> Self {
        let users = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| {
                let mut fields = line.split_whitespace().map(str::parse::<u32>);
                match (fields.next(), fields.next(), fields.next()) {
                    (Some(Ok(uid)), Some(Ok(gid)), None) => Some(User::new(uid, gid)),
                    _ => {
                        log::warn!("skip malformed user line {line:?}");
                        None
                    }
                }
            })
            .collect();

        Self { users }
    }

    pub fn find(&self, uid: u32) -> Option<User> {
        self.users.iter().copied().find(|user| user.uid == uid)
    }

    #[inline]
    pub fn users(&self) -> &[User] {
        &self.users
    }

    /// 以 `current` 的身份切换到 `uid`，用户不存在时自动创建
    pub fn switch(&mut self, current: User, uid: u32, gid: u32) -> Result<Switched, SwitchError> {
        let caller_is_root_group = current.gid == GID_ROOT;

        let Some(index) = self.users.iter().position(|user| user.uid == uid) else {
            if gid == GID_ROOT && !caller_is_root_group {
                return Err(SwitchError::CreationDenied);
            }
            let user = User::new(uid, gid);
            self.users.push(user);
            log::info!("created user {uid} in group {gid}");
            return Ok(Switched::Created(user));
        };

        let slot = &mut self.users[index];
        if slot.gid == gid {
            return Ok(Switched::Existing(*slot));
        }
        if !caller_is_root_group {
            return Err(SwitchError::RegroupDenied);
        }
        if gid == GID_ROOT {
            return Err(SwitchError::PromotionDenied);
        }

        let from = slot.gid;
        slot.gid = gid;
        log::info!("moved user {uid} from group {from} to {gid}");
        Ok(Switched::Regrouped { user: *slot, from })
    }
}

impl fmt::Display for UserList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.users
            .iter()
            .try_for_each(|user| writeln!(f, "{} {}", user.uid, user.gid))
    }
}

#[cfg(test)]
mod tests {
    use vdfs::{GID_GUEST, GID_USERS};

    use super::*;

    #[test]
    fn parse_and_print_agree() {
        let list = UserList::parse("0 0\n100 1\n\nbad line\n200 2\n");
        assert_eq!(list.users().len(), 3);
        assert_eq!(list.to_string(), "0 0\n100 1\n200 2\n");
    }

    #[test]
    fn switch_rules() {
        let mut list = UserList::default();
        let root = User::ROOT;

        let alice = list.switch(root, 100, GID_USERS).unwrap();
        assert_eq!(alice, Switched::Created(User::new(100, GID_USERS)));

        // 普通用户不能改组，也不能新建 root 组用户
        let as_alice = alice.user();
        assert_eq!(
            list.switch(as_alice, 0, GID_USERS),
            Err(SwitchError::RegroupDenied)
        );
        assert_eq!(
            list.switch(as_alice, 7, GID_ROOT),
            Err(SwitchError::CreationDenied)
        );
        assert_eq!(
            list.switch(as_alice, 300, GID_GUEST).unwrap(),
            Switched::Created(User::new(300, GID_GUEST))
        );

        // root 组可以改组，但不能改进 root 组
        assert_eq!(
            list.switch(root, 100, GID_ROOT),
            Err(SwitchError::PromotionDenied)
        );
        assert_eq!(
            list.switch(root, 100, GID_GUEST).unwrap(),
            Switched::Regrouped {
                user: User::new(100, GID_GUEST),
                from: GID_USERS
            }
        );
        assert_eq!(
            list.switch(as_alice, 0, GID_ROOT).unwrap(),
            Switched::Existing(User::ROOT)
        );
    }
}
