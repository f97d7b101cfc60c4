//! Ties pass 1 and pass 2 together into the public `assemble` entry point
//! (spec.md §4.6).

use crate::error::Result;
use crate::lex::Token;
use crate::object::ObjectFile;

use crate::asm::{pass1, pass2};

/// Assembles a full token stream (as produced by [`crate::lex::tokenize`])
/// into a relocatable [`ObjectFile`]. Trivia tokens (whitespace, comments)
/// are filtered out once up front; every other token is consumed by
/// exactly one of the two passes.
pub fn assemble(tokens: &[Token]) -> Result<ObjectFile> {
    let filtered: Vec<Token> = tokens.iter().filter(|t| !t.is_trivia()).cloned().collect();
    let mut state = pass1::run(&filtered)?;
    pass2::run(&mut state.obj, &filtered)?;
    Ok(state.obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::opcode::Opcode;
    use crate::lex::tokenize;
    use crate::object::Binding;

    fn assemble_src(src: &str) -> ObjectFile {
        let tokens = tokenize(src).unwrap();
        assemble(&tokens).unwrap()
    }

    #[test]
    fn scenario_s1_assembles_clean() {
        let obj = assemble_src(".text\n.global _start\n_start: mov x0, #5\n add x1, x0, #3\n hlt");
        assert_eq!(obj.relocs.len(), 0);
        let text = obj.section(obj.find_section(crate::object::SectionKind::Text).unwrap()).unwrap();
        assert_eq!(text.data.len(), 12);
    }

    #[test]
    fn data_and_bss_sections_coexist() {
        let obj = assemble_src(
            ".data\n\
             greeting: .asciz \"hi\"\n\
             .bss\n\
             buffer: .advance 16\n",
        );
        let data = obj.section(obj.find_section(crate::object::SectionKind::Data).unwrap()).unwrap();
        assert_eq!(data.data, b"hi\0");
        let bss = obj.section(obj.find_section(crate::object::SectionKind::Bss).unwrap()).unwrap();
        assert_eq!(bss.data.len(), 16);
    }

    #[test]
    fn s_suffixed_and_alias_mnemonics_round_trip() {
        let obj = assemble_src(".text\n adds x0, x1, #1\n cmp x2, #4\n ret\n");
        let text = obj.section(obj.find_section(crate::object::SectionKind::Text).unwrap()).unwrap();
        assert_eq!(text.data.len(), 12);
        let w0 = crate::bits::unpack_le32(&text.data[0..4]);
        let (op0, _) = crate::isa::decode::decode(w0).unwrap();
        assert_eq!(op0, Opcode::Add);
        let w2 = crate::bits::unpack_le32(&text.data[8..12]);
        let (op2, _) = crate::isa::decode::decode(w2).unwrap();
        assert_eq!(op2, Opcode::Bx);
    }

    #[test]
    fn undefined_global_data_reference_survives_for_the_linker() {
        let obj = assemble_src(".text\n_start: adrp x0, :hi20:external_buf\n hlt");
        assert_eq!(obj.relocs.len(), 1);
        let (_, reloc) = &obj.relocs[0];
        let sym = obj.symbols.get(reloc.symbol as usize).unwrap();
        assert_eq!(sym.binding, Binding::Weak);
    }

    #[test]
    fn unresolvable_branch_target_is_an_error() {
        let tokens = tokenize(".text\n_start: bl helper\n hlt").unwrap();
        let err = assemble(&tokens).unwrap_err();
        assert!(matches!(err, crate::error::Error::UndefinedLocal(_)));
    }
}
