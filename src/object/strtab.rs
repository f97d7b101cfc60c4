//! An ordinal-indexed, deduplicated string table.
//!
//! Unlike the teacher's byte-offset-indexed `Strtab` (the ELF convention),
//! [`Section`](crate::object::section::Section) names,
//! [`Symbol`](crate::object::symbol::Symbol) names and so on are referenced
//! by *ordinal* index per spec.md §3 ("Strings are referenced by ordinal
//! index, not byte offset"), so this table is owned storage plus a
//! dedup map rather than a borrowed byte slice.

use std::collections::HashMap;

use scroll::ctx::StrCtx;
use scroll::{Pread, Pwrite};

#[derive(Debug, Clone, Default)]
pub struct Strtab {
    strings: Vec<String>,
    index: HashMap<String, u32>,
}

impl Strtab {
    /// A fresh table always contains the empty string at index 0
    /// (spec.md §4.5).
    pub fn new() -> Self {
        let mut t = Strtab {
            strings: Vec::new(),
            index: HashMap::new(),
        };
        t.add("");
        t
    }

    /// Inserts `s`, returning its index. Idempotent: a second insertion of
    /// the same string returns the existing index.
    pub fn add(&mut self, s: &str) -> u32 {
        if let Some(&idx) = self.index.get(s) {
            return idx;
        }
        let idx = self.strings.len() as u32;
        self.strings.push(s.to_string());
        self.index.insert(s.to_string(), idx);
        idx
    }

    pub fn get(&self, idx: u32) -> Option<&str> {
        self.strings.get(idx as usize).map(|s| s.as_str())
    }

    pub fn find(&self, s: &str) -> Option<u32> {
        self.index.get(s).copied()
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(|s| s.as_str())
    }

    /// Serializes as `u32 count` followed by `count` NUL-terminated strings
    /// (spec.md §6), the same delimited-string convention the teacher's own
    /// `Strtab` reads via `scroll`'s `StrCtx` (`examples/m4b-goblin/src/strtab.rs`).
    pub fn to_bytes(&self) -> Vec<u8> {
        let body_len: usize = self.strings.iter().map(|s| s.len() + 1).sum();
        let mut out = vec![0u8; 4 + body_len];
        out.pwrite_with(self.strings.len() as u32, 0, scroll::LE)
            .expect("fixed-size buffer");
        let mut cursor = 4usize;
        for s in &self.strings {
            let written = out
                .pwrite_with(s.as_str(), cursor, StrCtx::from(0u8))
                .expect("fixed-size buffer");
            cursor += written;
        }
        out
    }

    /// Parses the on-disk form produced by [`Strtab::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> crate::error::Result<Self> {
        use crate::error::Error;
        let count: u32 = bytes.pread_with(0, scroll::LE).map_err(Error::Scroll)?;
        let mut t = Strtab {
            strings: Vec::new(),
            index: HashMap::new(),
        };
        let mut cursor = 4usize;
        for _ in 0..count {
            let s: &str = bytes
                .pread_with(cursor, StrCtx::from(0u8))
                .map_err(Error::Scroll)?;
            cursor += s.len() + 1;
            let idx = t.strings.len() as u32;
            t.strings.push(s.to_string());
            t.index.insert(s.to_string(), idx);
        }
        Ok(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_always_index_zero() {
        let t = Strtab::new();
        assert_eq!(t.get(0), Some(""));
    }

    #[test]
    fn add_is_idempotent() {
        let mut t = Strtab::new();
        let a = t.add("foo");
        let b = t.add("foo");
        assert_eq!(a, b);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn round_trips_through_bytes() {
        let mut t = Strtab::new();
        t.add("_start");
        t.add("main");
        let bytes = t.to_bytes();
        let t2 = Strtab::from_bytes(&bytes).unwrap();
        assert_eq!(t2.find("_start"), t.find("_start"));
        assert_eq!(t2.find("main"), t.find("main"));
        assert_eq!(t2.len(), t.len());
    }
}
