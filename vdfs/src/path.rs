//! # 路径解析
//!
//! 结构上的解析只依赖目录里真实存放的 `.` 与 `..`，逐级查找目录项。
//! [`Path::normalize`] 只在字符串层面工作，供提示符等展示用途，
//! 不能用来判断存在性或权限。

use crate::{Error, FileSystem, InodeId, Result};

pub trait Path: ToOwned {
    fn is_absolute(&self) -> bool;

    fn is_relative(&self) -> bool {
        !self.is_absolute()
    }

    /// 返回不以`/`结束、不包含相对项的绝对路径。
    ///
    /// `cwd` 为绝对路径。根目录的 `..` 仍是根目录。
    fn normalize(&self, cwd: &Self) -> Self::Owned;

    /// 返回路径的`(父目录, 文件名)`，父目录为空串时表示当前目录。
    ///
    /// 路径为空或只有`/`时返回`None`。
    fn parent_file(&self) -> Option<(&Self, &Self)>;
}

impl Path for str {
    fn is_absolute(&self) -> bool {
        self.starts_with('/')
    }

    fn normalize(&self, cwd: &Self) -> String {
        let mut cmps = Vec::new();
        if self.is_relative() {
            cmps.extend(cwd.split('/').filter(|s| !s.is_empty() && *s != "."));
        }

        for cmp in self.split('/') {
            match cmp {
                ".." => {
                    cmps.pop();
                }
                "." | "" => (),
                s => cmps.push(s),
            }
        }

        if cmps.is_empty() {
            return String::from("/");
        }
        cmps.iter().fold(String::new(), |mut path, cmp| {
            path.push('/');
            path.push_str(cmp);
            path
        })
    }

    fn parent_file(&self) -> Option<(&Self, &Self)> {
        let path = self.trim_end_matches('/');
        if path.is_empty() {
            return None;
        }

        Some(match path.rsplit_once('/') {
            Some(("", file)) => ("/", file),
            Some((parent, file)) => (parent, file),
            None => ("", path),
        })
    }
}

impl FileSystem {
    /// 从 `start` 出发逐级查找；绝对路径从根目录出发。
    ///
    /// 空分量与 `.` 被跳过，`..` 按目录里存放的真实父目录解析。
    pub fn resolve(&self, start: InodeId, path: &str) -> Result<InodeId> {
        let mut current = if path.is_absolute() { self.root() } else { start };

        for cmp in path.split('/').filter(|cmp| !cmp.is_empty() && *cmp != ".") {
            current = self.find_entry(current, cmp)?;
        }

        Ok(current)
    }

    /// 解析路径的父目录，返回 `(父目录, 文件名)`
    pub fn resolve_parent<'a>(&self, start: InodeId, path: &'a str) -> Result<(InodeId, &'a str)> {
        let (parent, name) = path.parent_file().ok_or(Error::InvalidName)?;
        let parent = if parent.is_empty() {
            start
        } else {
            self.resolve(start, parent)?
        };
        Ok((parent, name))
    }
}
