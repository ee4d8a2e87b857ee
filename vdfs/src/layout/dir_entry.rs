use super::{get_u32, put_u32};
use crate::{Error, InodeId, Result, NAME_MAX_LEN};

/// 目录项：定长名字 + inode 编号
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    // 最后一字节留给 \0
    name: [u8; NAME_MAX_LEN + 1],
    inode_id: InodeId,
}

impl DirEntry {
    /// 目录项大小恒为32字节
    pub const SIZE: usize = 32;

    const INODE_ID: usize = NAME_MAX_LEN + 1;

    /// 名字不得为空、超长，也不得含有 `/` 或 `\0`
    pub fn new(name: &str, inode_id: InodeId) -> Result<Self> {
        let bytes = name.as_bytes();
        if bytes.is_empty() || bytes.len() > NAME_MAX_LEN || bytes.iter().any(|&c| c == b'/' || c == 0)
        {
            return Err(Error::InvalidName);
        }

        let mut raw = [0; NAME_MAX_LEN + 1];
        raw[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            name: raw,
            inode_id,
        })
    }

    pub fn name(&self) -> &str {
        let len = self.name_len();
        core::str::from_utf8(&self.name[..len]).unwrap_or_default()
    }

    #[inline]
    pub fn inode_id(&self) -> InodeId {
        self.inode_id
    }

    #[inline]
    pub fn is_dot(&self) -> bool {
        matches!(self.name(), "." | "..")
    }

    pub fn encode(&self, buf: &mut [u8]) {
        buf[..=NAME_MAX_LEN].copy_from_slice(&self.name);
        put_u32(buf, Self::INODE_ID, self.inode_id.into());
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut name = [0; NAME_MAX_LEN + 1];
        name.copy_from_slice(&buf[..=NAME_MAX_LEN]);
        let entry = Self {
            name,
            inode_id: get_u32(buf, Self::INODE_ID).into(),
        };

        if entry.name[NAME_MAX_LEN] != 0
            || core::str::from_utf8(&entry.name[..entry.name_len()]).is_err()
        {
            return Err(Error::InvalidFormat);
        }
        Ok(entry)
    }

    fn name_len(&self) -> usize {
        self.name
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(NAME_MAX_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_validated() {
        assert!(DirEntry::new("notes.txt", InodeId::new(3)).is_ok());
        assert!(DirEntry::new(&"a".repeat(NAME_MAX_LEN), InodeId::new(3)).is_ok());

        for bad in ["", "a/b", "nul\0", "a".repeat(NAME_MAX_LEN + 1).as_str()] {
            assert!(matches!(
                DirEntry::new(bad, InodeId::new(3)),
                Err(Error::InvalidName)
            ));
        }
    }

    #[test]
    fn record_layout_is_fixed() {
        let entry = DirEntry::new("docs", InodeId::new(0x0102_0304)).unwrap();
        let mut raw = [0xFFu8; DirEntry::SIZE];
        entry.encode(&mut raw);

        assert_eq!(&raw[..4], b"docs");
        assert!(raw[4..28].iter().all(|&b| b == 0));
        assert_eq!(&raw[28..], &[4, 3, 2, 1]);
        assert_eq!(DirEntry::decode(&raw).unwrap(), entry);
    }

    #[test]
    fn dot_entries_are_recognised() {
        assert!(DirEntry::new(".", InodeId::ROOT).unwrap().is_dot());
        assert!(DirEntry::new("..", InodeId::ROOT).unwrap().is_dot());
        assert!(!DirEntry::new("...", InodeId::ROOT).unwrap().is_dot());
    }
}
