//! The relocatable object file: sections, symbols, relocations and strings
//! tied together and given a fixed on-disk layout (spec.md §6).

use scroll::{Pread, Pwrite, SizeWith};

use crate::error::{Error, Result};
use crate::object::reloc::{RelocKind, Relocation};
use crate::object::section::{Section, SectionKind, CANONICAL_ORDER};
use crate::object::strtab::Strtab;
use crate::object::symbol::{Binding, SymbolTable, SECTION_NONE};

/// `file_type` values (spec.md §6).
pub const FILE_TYPE_RELOCATABLE: u16 = 1;
pub const FILE_TYPE_EXECUTABLE: u16 = 2;

/// The only defined `target_machine` value.
pub const TARGET_MACHINE_EMU32: u16 = 1;

#[derive(Debug, Clone, Copy, Pread, Pwrite, SizeWith)]
#[repr(C)]
struct RawHeader {
    file_type: u16,
    target_machine: u16,
    flags: u16,
    n_sections: u16,
    reserved: [u8; 16],
}

const HEADER_SIZE: usize = 24;

#[derive(Debug, Clone, Copy, Pread, Pwrite, SizeWith)]
#[repr(C)]
struct RawSectionHeader {
    name: u32,
    kind: u32,
    start: u32,
    size: u32,
    entry_size: u32,
    reserved: [u8; 16],
}

const SECTION_HEADER_SIZE: usize = 36;

#[derive(Debug, Clone, Copy, Pread, Pwrite, SizeWith)]
#[repr(C)]
struct RawSymEntry {
    name: u32,
    value: u32,
    binding: u16,
    section: i32,
    reserved: [u8; 12],
}

const SYM_ENTRY_SIZE: usize = 26;

#[derive(Debug, Clone, Copy, Pread, Pwrite, SizeWith)]
#[repr(C)]
struct RawRelocEntry {
    offset: u32,
    symbol: u32,
    kind: u32,
    shift: u32,
    reserved: [u8; 12],
}

const RELOC_ENTRY_SIZE: usize = 28;

/// A relocatable object: the in-memory form produced by the assembler and
/// consumed by the linker.
#[derive(Debug, Clone, Default)]
pub struct ObjectFile {
    pub strtab: Strtab,
    pub symbols: SymbolTable,
    pub sections: Vec<Section>,
    /// Relocations against the text section, by section index.
    pub relocs: Vec<(u32, Relocation)>,
}

impl ObjectFile {
    pub fn new() -> Self {
        ObjectFile {
            strtab: Strtab::new(),
            symbols: SymbolTable::new(),
            sections: Vec::new(),
            relocs: Vec::new(),
        }
    }

    pub fn add_string(&mut self, s: &str) -> u32 {
        self.strtab.add(s)
    }

    pub fn add_section(&mut self, name: &str, kind: SectionKind) -> u32 {
        if let Some(idx) = self.find_section(kind) {
            return idx;
        }
        let name_idx = self.add_string(name);
        let idx = self.sections.len() as u32;
        self.sections.push(Section::new(name_idx, kind));
        idx
    }

    pub fn find_section(&self, kind: SectionKind) -> Option<u32> {
        self.sections
            .iter()
            .position(|s| s.kind == kind)
            .map(|i| i as u32)
    }

    pub fn section(&self, idx: u32) -> Option<&Section> {
        self.sections.get(idx as usize)
    }

    pub fn section_mut(&mut self, idx: u32) -> Option<&mut Section> {
        self.sections.get_mut(idx as usize)
    }

    pub fn add_symbol(
        &mut self,
        name: &str,
        value: u32,
        binding: Binding,
        section: Option<u32>,
    ) -> Result<usize> {
        let name_idx = self.add_string(name);
        self.symbols
            .add(name_idx, value, binding, section.unwrap_or(SECTION_NONE), name)
    }

    pub fn add_reloc(&mut self, section: u32, offset: u32, symbol: u32, kind: RelocKind, token: usize) {
        self.relocs.push((
            section,
            Relocation {
                offset,
                symbol,
                kind,
                token,
            },
        ));
    }

    /// Serializes a relocatable object in canonical section order
    /// (spec.md §4.5): Text, Data, Bss, Symtab, RelText, RelData, RelBss,
    /// Strtab.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.to_bytes_as(FILE_TYPE_RELOCATABLE)
    }

    /// Serializes as an executable (`file_type` 2), used by the linker once
    /// every relocation has been resolved against a load address.
    pub fn to_executable_bytes(&self) -> Result<Vec<u8>> {
        self.to_bytes_as(FILE_TYPE_EXECUTABLE)
    }

    fn to_bytes_as(&self, file_type: u16) -> Result<Vec<u8>> {
        let mut ordered: Vec<&Section> = Vec::new();
        for kind in CANONICAL_ORDER {
            if let Some(idx) = self.find_section(*kind) {
                ordered.push(&self.sections[idx as usize]);
            }
        }

        let symtab_bytes = self.symtab_bytes();
        let strtab_bytes = self.strtab.to_bytes();

        let mut body_bytes: Vec<Vec<u8>> = Vec::new();
        for section in &ordered {
            let bytes = match section.kind {
                SectionKind::Symtab => symtab_bytes.clone(),
                SectionKind::Strtab => strtab_bytes.clone(),
                SectionKind::RelText | SectionKind::RelData | SectionKind::RelBss => {
                    self.reloc_bytes_for(section.kind)
                }
                _ => section.data.clone(),
            };
            body_bytes.push(bytes);
        }

        let header = RawHeader {
            file_type,
            target_machine: TARGET_MACHINE_EMU32,
            flags: 0,
            n_sections: ordered.len() as u16,
            reserved: [0; 16],
        };

        let mut offset = HEADER_SIZE + ordered.len() * SECTION_HEADER_SIZE;
        let mut section_headers = Vec::with_capacity(ordered.len());
        for (section, bytes) in ordered.iter().zip(body_bytes.iter()) {
            section_headers.push(RawSectionHeader {
                name: section.name,
                kind: section.kind.as_u32(),
                start: offset as u32,
                size: bytes.len() as u32,
                entry_size: section.entry_size,
                reserved: [0; 16],
            });
            offset += bytes.len();
        }

        let mut out = vec![0u8; offset];
        out.pwrite_with(header, 0, scroll::LE).map_err(Error::Scroll)?;
        let mut cursor = HEADER_SIZE;
        for sh in &section_headers {
            out.pwrite_with(*sh, cursor, scroll::LE).map_err(Error::Scroll)?;
            cursor += SECTION_HEADER_SIZE;
        }
        for (sh, bytes) in section_headers.iter().zip(body_bytes.iter()) {
            out[sh.start as usize..sh.start as usize + bytes.len()].copy_from_slice(bytes);
        }

        Ok(out)
    }

    fn symtab_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.symbols.len() * SYM_ENTRY_SIZE);
        for sym in self.symbols.iter() {
            let raw = RawSymEntry {
                name: sym.name,
                value: sym.value,
                binding: sym.binding.as_u16(),
                section: sym.section as i32,
                reserved: [0; 12],
            };
            let mut buf = [0u8; SYM_ENTRY_SIZE];
            buf.pwrite_with(raw, 0, scroll::LE).expect("fixed-size buffer");
            out.extend_from_slice(&buf);
        }
        out
    }

    fn reloc_bytes_for(&self, kind: SectionKind) -> Vec<u8> {
        let wanted_section_kind = match kind {
            SectionKind::RelText => SectionKind::Text,
            SectionKind::RelData => SectionKind::Data,
            SectionKind::RelBss => SectionKind::Bss,
            _ => unreachable!("reloc_bytes_for called with non-relocation section kind"),
        };
        let Some(target_idx) = self.find_section(wanted_section_kind) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for (section_idx, reloc) in &self.relocs {
            if *section_idx != target_idx {
                continue;
            }
            let raw = RawRelocEntry {
                offset: reloc.offset,
                symbol: reloc.symbol,
                kind: reloc.kind.as_u32(),
                shift: reloc.kind.shift(),
                reserved: [0; 12],
            };
            let mut buf = [0u8; RELOC_ENTRY_SIZE];
            buf.pwrite_with(raw, 0, scroll::LE).expect("fixed-size buffer");
            out.extend_from_slice(&buf);
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let header: RawHeader = bytes.pread_with(0, scroll::LE).map_err(Error::Scroll)?;
        if header.target_machine != TARGET_MACHINE_EMU32 {
            return Err(Error::BadObjectMagic);
        }
        if header.file_type != FILE_TYPE_RELOCATABLE && header.file_type != FILE_TYPE_EXECUTABLE {
            return Err(Error::Malformed(format!("unknown file_type {}", header.file_type)));
        }

        let mut cursor = HEADER_SIZE;
        let mut headers = Vec::with_capacity(header.n_sections as usize);
        for _ in 0..header.n_sections {
            let sh: RawSectionHeader = bytes.pread_with(cursor, scroll::LE).map_err(Error::Scroll)?;
            headers.push(sh);
            cursor += SECTION_HEADER_SIZE;
        }

        let mut obj = ObjectFile::new();
        obj.strtab = Strtab::new();

        let mut strtab_body: Option<&[u8]> = None;
        let mut symtab_body: Option<&[u8]> = None;
        let mut reloc_bodies: Vec<(SectionKind, &[u8])> = Vec::new();
        let mut plain_sections: Vec<(RawSectionHeader, &[u8])> = Vec::new();

        for sh in &headers {
            let kind = SectionKind::from_u32(sh.kind)?;
            let body = bytes
                .get(sh.start as usize..sh.start as usize + sh.size as usize)
                .ok_or_else(|| Error::Malformed("section body out of range".into()))?;
            match kind {
                SectionKind::Strtab => strtab_body = Some(body),
                SectionKind::Symtab => symtab_body = Some(body),
                SectionKind::RelText | SectionKind::RelData | SectionKind::RelBss => {
                    reloc_bodies.push((kind, body))
                }
                _ => plain_sections.push((*sh, body)),
            }
        }

        if let Some(strtab_bytes) = strtab_body {
            obj.strtab = Strtab::from_bytes(strtab_bytes)?;
        }

        for (sh, body) in &plain_sections {
            let kind = SectionKind::from_u32(sh.kind)?;
            let mut section = Section::new(sh.name, kind);
            section.entry_size = sh.entry_size;
            section.data = body.to_vec();
            obj.sections.push(section);
        }

        if let Some(body) = symtab_body {
            if body.len() % SYM_ENTRY_SIZE != 0 {
                return Err(Error::Malformed("truncated symbol table".into()));
            }
            for chunk in body.chunks(SYM_ENTRY_SIZE) {
                let raw: RawSymEntry = chunk.pread_with(0, scroll::LE).map_err(Error::Scroll)?;
                let binding = Binding::from_u16(raw.binding)?;
                obj.symbols
                    .add(raw.name, raw.value, binding, raw.section as u32, "")?;
            }
        }

        for (kind, body) in reloc_bodies {
            let target_kind = match kind {
                SectionKind::RelText => SectionKind::Text,
                SectionKind::RelData => SectionKind::Data,
                SectionKind::RelBss => SectionKind::Bss,
                _ => unreachable!(),
            };
            let Some(target_idx) = obj.find_section(target_kind) else {
                continue;
            };
            if body.len() % RELOC_ENTRY_SIZE != 0 {
                return Err(Error::Malformed("truncated relocation table".into()));
            }
            for chunk in body.chunks(RELOC_ENTRY_SIZE) {
                let raw: RawRelocEntry = chunk.pread_with(0, scroll::LE).map_err(Error::Scroll)?;
                let reloc = Relocation {
                    offset: raw.offset,
                    symbol: raw.symbol,
                    kind: RelocKind::from_u32(raw.kind)?,
                    token: 0,
                };
                obj.relocs.push((target_idx, reloc));
            }
        }

        Ok(obj)
    }
}
