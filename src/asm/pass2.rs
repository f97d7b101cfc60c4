//! Pass 2: "fill local" (spec.md §4.6). Walks the same token stream a
//! second time, and for every relocation pass 1 recorded, tries to resolve
//! it against a symbol defined *within this same assembly unit*, using the
//! scope chain that was open at the relocation's token position.
//!
//! A relocation whose target is found locally is either patched in place
//! (`BOffset22`, since branch displacement is self-contained) or simply
//! retargeted onto the resolved local symbol index and left for the
//! linker (every other kind, since those carry absolute/page addresses
//! the linker alone can compute). A `BOffset22` relocation that resolves
//! to nothing, local or otherwise, is a hard error: a branch target must
//! live somewhere in the final image, and unlike a data reference it can
//! never be satisfied by a symbol some other unit provides, because nothing
//! outside this unit can be reached with a 22-bit in-unit word offset.

use crate::error::{Error, Result};
use crate::lex::{Token, TokenKind};
use crate::object::{Binding, ObjectFile, RelocKind};

use crate::asm::scope::{self, ScopeStack};

/// Replays every `.scope`/`.scend` directive up to (but not including)
/// `token_pos`, returning the scope chain open at that point, innermost
/// first.
fn scope_chain_at(tokens: &[Token], token_pos: usize) -> Vec<u32> {
    let mut scopes = ScopeStack::new();
    for tok in &tokens[..token_pos.min(tokens.len())] {
        match &tok.kind {
            TokenKind::AsmDirective(d) if d == ".scope" => {
                scopes.push();
            }
            TokenKind::AsmDirective(d) if d == ".scend" => {
                scopes.pop();
            }
            _ => {}
        }
    }
    scopes.chain().collect()
}

/// Resolves a relocation's original symbol name against the chain, from
/// innermost scope outward to the bare global name.
fn resolve_local(obj: &ObjectFile, base_name: &str, chain: &[u32]) -> Option<usize> {
    for &scope_id in chain {
        let mangled = scope::mangle(base_name, scope_id);
        if let Some(idx) = obj.strtab.find(&mangled) {
            if let Some(sym_idx) = obj.symbols.index_of_name(idx) {
                return Some(sym_idx);
            }
        }
    }
    let idx = obj.strtab.find(base_name)?;
    obj.symbols.index_of_name(idx)
}

/// Runs pass 2 over `tokens` (the same trivia-filtered slice pass 1 saw),
/// resolving or retargeting every relocation recorded in `obj`.
pub fn run(obj: &mut ObjectFile, tokens: &[Token]) -> Result<()> {
    let relocs = std::mem::take(&mut obj.relocs);
    let mut resolved = Vec::with_capacity(relocs.len());

    for (section_idx, reloc) in relocs {
        let chain = scope_chain_at(tokens, reloc.token);
        let original = obj
            .symbols
            .get(reloc.symbol as usize)
            .expect("relocation always references a live symbol table entry");
        let base_name = strip_scope_suffix(
            obj.strtab.get(original.name).unwrap_or_default(),
        );

        let local = resolve_local(obj, base_name, &chain);

        match local {
            Some(local_idx) if local_idx != reloc.symbol as usize => {
                if reloc.kind == RelocKind::BOffset22 {
                    patch_branch(obj, section_idx, &reloc, local_idx)?;
                } else {
                    let mut retargeted = reloc;
                    retargeted.symbol = local_idx as u32;
                    resolved.push((section_idx, retargeted));
                }
            }
            _ => {
                if reloc.kind == RelocKind::BOffset22 {
                    // Not found under scope mangling; maybe the plain
                    // global name was since upgraded from WEAK by a
                    // definition elsewhere in this unit.
                    let sym = obj.symbols.get(reloc.symbol as usize).unwrap();
                    if sym.binding != Binding::Weak && sym.section.is_some_in(obj) {
                        patch_branch(obj, section_idx, &reloc, reloc.symbol as usize)?;
                    } else {
                        return Err(Error::UndefinedLocal(base_name.to_string()));
                    }
                } else {
                    resolved.push((section_idx, reloc));
                }
            }
        }
    }

    obj.relocs = resolved;
    Ok(())
}

fn strip_scope_suffix(name: &str) -> &str {
    match name.find("::SCOPE:") {
        Some(i) => &name[..i],
        None => name,
    }
}

fn patch_branch(
    obj: &mut ObjectFile,
    section_idx: u32,
    reloc: &crate::object::Relocation,
    target_symbol_idx: usize,
) -> Result<()> {
    let target = *obj.symbols.get(target_symbol_idx).unwrap();
    let site_addr = reloc.offset;
    let target_addr = target.value;
    let section = obj.section_mut(section_idx).unwrap();
    let word = crate::bits::unpack_le32(&section.data[reloc.offset as usize..reloc.offset as usize + 4]);
    let patched = crate::object::reloc::apply(RelocKind::BOffset22, word, target_addr, site_addr)?;
    section.data[reloc.offset as usize..reloc.offset as usize + 4]
        .copy_from_slice(&crate::bits::pack_le32(patched));
    Ok(())
}

/// Small helper trait so `patch_branch`'s eligibility check above reads as
/// a single condition rather than an `Option` match: a symbol only
/// qualifies as a resolvable in-unit branch target once it is bound to a
/// real section (not [`SECTION_NONE`]).
trait SectionBound {
    fn is_some_in(&self, obj: &ObjectFile) -> bool;
}

impl SectionBound for u32 {
    fn is_some_in(&self, obj: &ObjectFile) -> bool {
        *self != crate::object::SECTION_NONE && obj.section(*self).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::tokenize;
    use crate::object::Binding;

    fn filtered(src: &str) -> Vec<Token> {
        tokenize(src).unwrap().into_iter().filter(|t| !t.is_trivia()).collect()
    }

    #[test]
    fn resolves_forward_branch_within_unit() {
        // spec.md S2: `b forward` at offset 0, `forward:` at offset 8.
        let tokens = filtered(".text\n_start: b forward\n hlt\n forward: hlt");
        let mut state = crate::asm::pass1::run(&tokens).unwrap();
        assert_eq!(state.obj.relocs.len(), 1);
        run(&mut state.obj, &tokens).unwrap();
        assert_eq!(state.obj.relocs.len(), 0);
        let text = state.obj.section(state.text_idx.unwrap()).unwrap();
        let word = crate::bits::unpack_le32(&text.data[0..4]);
        let field = word & 0x3FFFFF;
        let signed = crate::bits::sign_extend(field, 22);
        assert_eq!(signed, 2); // 8 bytes / 4
    }

    #[test]
    fn scoped_label_shadows_outer_one() {
        let tokens = filtered(
            ".text\n\
             loop: hlt\n\
             .scope\n\
             b loop\n\
             loop: hlt\n\
             .scend\n",
        );
        let mut state = crate::asm::pass1::run(&tokens).unwrap();
        run(&mut state.obj, &tokens).unwrap();
        assert_eq!(state.obj.relocs.len(), 0);
        let text = state.obj.section(state.text_idx.unwrap()).unwrap();
        // b loop at offset 4 should target the inner loop at offset 8, not
        // the outer one at offset 0.
        let word = crate::bits::unpack_le32(&text.data[4..8]);
        let field = word & 0x3FFFFF;
        let signed = crate::bits::sign_extend(field, 22);
        assert_eq!(signed, 1); // (8 - 4) / 4
    }

    #[test]
    fn unresolvable_branch_target_is_undefined_local() {
        let tokens = filtered(".text\n b elsewhere\n hlt");
        let mut state = crate::asm::pass1::run(&tokens).unwrap();
        let err = run(&mut state.obj, &tokens).unwrap_err();
        assert!(matches!(err, Error::UndefinedLocal(_)));
    }

    #[test]
    fn data_relocation_passes_through_to_linker_retargeted() {
        let tokens = filtered(".text\n adrp x0, :hi20:buf\n.data\nbuf: .word 0");
        let mut state = crate::asm::pass1::run(&tokens).unwrap();
        run(&mut state.obj, &tokens).unwrap();
        assert_eq!(state.obj.relocs.len(), 1);
        let (_, reloc) = &state.obj.relocs[0];
        let sym = state.obj.symbols.get(reloc.symbol as usize).unwrap();
        assert_eq!(sym.binding, Binding::Local);
    }
}
