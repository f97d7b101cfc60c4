//! Sections: named byte arrays typed per spec.md §3.

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Text,
    Data,
    Bss,
    Symtab,
    RelText,
    RelData,
    RelBss,
    Strtab,
    Debug,
}

impl SectionKind {
    pub fn as_u32(self) -> u32 {
        match self {
            SectionKind::Text => 0,
            SectionKind::Data => 1,
            SectionKind::Bss => 2,
            SectionKind::Symtab => 3,
            SectionKind::RelText => 4,
            SectionKind::RelData => 5,
            SectionKind::RelBss => 6,
            SectionKind::Strtab => 7,
            SectionKind::Debug => 8,
        }
    }

    pub fn from_u32(v: u32) -> Result<Self> {
        Ok(match v {
            0 => SectionKind::Text,
            1 => SectionKind::Data,
            2 => SectionKind::Bss,
            3 => SectionKind::Symtab,
            4 => SectionKind::RelText,
            5 => SectionKind::RelData,
            6 => SectionKind::RelBss,
            7 => SectionKind::Strtab,
            8 => SectionKind::Debug,
            other => return Err(Error::Malformed(format!("unknown section type {}", other))),
        })
    }
}

/// Canonical on-disk ordering of sections (spec.md §4.5).
pub const CANONICAL_ORDER: &[SectionKind] = &[
    SectionKind::Text,
    SectionKind::Data,
    SectionKind::Bss,
    SectionKind::Symtab,
    SectionKind::RelText,
    SectionKind::RelData,
    SectionKind::RelBss,
    SectionKind::Strtab,
];

#[derive(Debug, Clone)]
pub struct Section {
    pub name: u32,
    pub kind: SectionKind,
    pub entry_size: u32,
    pub data: Vec<u8>,
}

impl Section {
    pub fn new(name: u32, kind: SectionKind) -> Self {
        Section {
            name,
            kind,
            entry_size: 0,
            data: Vec::new(),
        }
    }

    pub fn size(&self) -> u32 {
        self.data.len() as u32
    }
}
