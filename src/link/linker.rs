//! The linker/loader (C7, spec.md §4.7): resolves every surviving
//! relocation against a final symbol value and materializes the object's
//! bytes into the system bus at a chosen base address.

use crate::bus::Bus;
use crate::cpu::Cpu;
use crate::error::{Error, Result};
use crate::object::{Binding, ObjectFile, SectionKind};

/// The byte length TEXT/DATA/BSS would occupy once laid out back-to-back
/// starting at `start` — the image layout `link` writes into the bus.
struct Layout {
    text_base: u32,
    data_base: u32,
    bss_base: u32,
}

fn layout(obj: &ObjectFile, start: u32) -> Layout {
    let text_len = obj
        .find_section(SectionKind::Text)
        .and_then(|i| obj.section(i))
        .map(|s| s.size())
        .unwrap_or(0);
    let data_len = obj
        .find_section(SectionKind::Data)
        .and_then(|i| obj.section(i))
        .map(|s| s.size())
        .unwrap_or(0);
    Layout {
        text_base: start,
        data_base: start + text_len,
        bss_base: start + text_len + data_len,
    }
}

fn section_base(layout: &Layout, obj: &ObjectFile, section_idx: u32) -> Option<u32> {
    let kind = obj.section(section_idx)?.kind;
    Some(match kind {
        SectionKind::Text => layout.text_base,
        SectionKind::Data => layout.data_base,
        SectionKind::Bss => layout.bss_base,
        _ => return None,
    })
}

/// Resolves `object`'s outstanding relocations against `start`, writes its
/// sections into `bus`, and points `cpu.pc` at the translated `_start`
/// symbol. Translation is bypassed (`memory_mapped = false`): no process
/// is bound to the MMU yet at load time.
pub fn link(object: &ObjectFile, start: u32, bus: &mut Bus, cpu: &mut Cpu) -> Result<()> {
    let layout = layout(object, start);

    let mut text_bytes = object
        .find_section(SectionKind::Text)
        .and_then(|i| object.section(i))
        .map(|s| s.data.clone())
        .unwrap_or_default();

    for (section_idx, reloc) in &object.relocs {
        let Some(text_idx) = object.find_section(SectionKind::Text) else {
            continue;
        };
        if *section_idx != text_idx {
            // Only REL_TEXT entries are defined to carry fix-ups per
            // spec.md §4.7; DATA/BSS never hold symbolic references.
            continue;
        }
        let symbol = object
            .symbols
            .get(reloc.symbol as usize)
            .ok_or_else(|| Error::UndefinedSymbol(format!("symbol index {}", reloc.symbol)))?;
        if symbol.binding == Binding::Weak {
            let name = object.strtab.get(symbol.name).unwrap_or("<unknown>");
            return Err(Error::UndefinedSymbol(name.to_string()));
        }
        let sym_section = symbol.section;
        let base = section_base(&layout, object, sym_section)
            .ok_or_else(|| Error::UndefinedSymbol("symbol section is not loadable".to_string()))?;
        let absolute = base + symbol.value;
        let site_addr = layout.text_base + reloc.offset;

        let word_off = reloc.offset as usize;
        let word = crate::bits::unpack_le32(&text_bytes[word_off..word_off + 4]);
        let patched = crate::object::reloc::apply(reloc.kind, word, absolute, site_addr)?;
        text_bytes[word_off..word_off + 4].copy_from_slice(&crate::bits::pack_le32(patched));
    }

    bus.write_phys(layout.text_base, &text_bytes)?;

    if let Some(data_idx) = object.find_section(SectionKind::Data) {
        let data = &object.section(data_idx).unwrap().data;
        if !data.is_empty() {
            bus.write_phys(layout.data_base, data)?;
        }
    }

    if let Some(bss_idx) = object.find_section(SectionKind::Bss) {
        let bss_len = object.section(bss_idx).unwrap().size();
        if bss_len > 0 {
            bus.write_phys(layout.bss_base, &vec![0u8; bss_len as usize])?;
        }
    }

    let start_name_idx = object
        .strtab
        .find("_start")
        .ok_or_else(|| Error::UndefinedSymbol("_start".to_string()))?;
    let start_sym_idx = object
        .symbols
        .index_of_name(start_name_idx)
        .ok_or_else(|| Error::UndefinedSymbol("_start".to_string()))?;
    let start_sym = object.symbols.get(start_sym_idx).unwrap();
    if start_sym.binding == Binding::Weak {
        return Err(Error::UndefinedSymbol("_start".to_string()));
    }
    let base = section_base(&layout, object, start_sym.section)
        .ok_or_else(|| Error::UndefinedSymbol("_start".to_string()))?;
    cpu.pc = base + start_sym.value;

    Ok(())
}
