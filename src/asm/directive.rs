//! Assembler directive handlers, dispatched by name from pass 1 (spec.md
//! §4.6). Each directive body consumes whatever operands follow it from
//! the cursor and mutates `state` accordingly.

use crate::error::{Error, Result};
use crate::lex::{Token, TokenKind};
use crate::object::Binding;

use crate::asm::pass1::{align_to, expect_symbol_name, pad_to, parse_int, parse_int_list, AsmState, Cursor, CurrentSection};

fn expect_eq(cursor: &mut Cursor) -> Result<()> {
    match cursor.expect_any()? {
        Token { kind: TokenKind::Symbol(s), .. } if s == "=" => Ok(()),
        t => Err(Error::UnexpectedToken(t.text.clone())),
    }
}

pub fn handle(state: &mut AsmState, cursor: &mut Cursor, name: &str) -> Result<()> {
    match name {
        ".text" => {
            if state.text_idx.is_none() {
                state.ensure_text();
            }
            state.section = CurrentSection::Text;
            Ok(())
        }
        ".data" => {
            if state.data_idx.is_none() {
                state.ensure_data();
            }
            state.section = CurrentSection::Data;
            Ok(())
        }
        ".bss" => {
            if state.bss_idx.is_none() {
                state.ensure_bss();
            }
            state.section = CurrentSection::Bss;
            Ok(())
        }
        ".global" | ".globl" => {
            let name = expect_symbol_name(cursor)?;
            state.mark_global(&name);
            Ok(())
        }
        ".extern" => {
            let name = expect_symbol_name(cursor)?;
            state.symbol_ref(&name);
            Ok(())
        }
        ".byte" => emit_ints(state, cursor, 1, false),
        ".sbyte" => emit_ints(state, cursor, 1, true),
        ".dbyte" => emit_ints_be(state, cursor, 2),
        ".sdbyte" => emit_ints_be(state, cursor, 2),
        ".word" => emit_ints(state, cursor, 4, false),
        ".sword" => emit_ints(state, cursor, 4, true),
        ".dword" => emit_ints(state, cursor, 8, false),
        ".sdword" => emit_ints(state, cursor, 8, true),
        ".ascii" => emit_string(state, cursor, false),
        ".asciz" | ".asciiz" => emit_string(state, cursor, true),
        ".align" => {
            let n = parse_int(cursor)?;
            align_to(state, n as u32)
        }
        ".advance" => {
            let n = parse_int(cursor)?;
            pad_to(state, n as u32)
        }
        ".org" => {
            let n = parse_int(cursor)?;
            pad_to(state, n as u32)
        }
        ".scope" => {
            state.scopes.push();
            Ok(())
        }
        ".scend" => {
            if state.scopes.pop().is_none() {
                Err(Error::UnterminatedScope)
            } else {
                Ok(())
            }
        }
        ".equ" | ".set" => {
            // `.equ NAME = value` — a rarely exercised convenience for
            // naming an absolute constant rather than a section label.
            let name = expect_symbol_name(cursor)?;
            expect_eq(cursor)?;
            let v = parse_int(cursor)?;
            let name_idx = state.obj.add_string(&name);
            state
                .obj
                .symbols
                .add(name_idx, v as u32, Binding::Local, crate::object::SECTION_NONE, &name)?;
            Ok(())
        }
        other => Err(Error::UnexpectedToken(other.to_string())),
    }
}

fn emit_ints(state: &mut AsmState, cursor: &mut Cursor, width: usize, signed: bool) -> Result<()> {
    let values = parse_int_list(cursor)?;
    for v in values {
        if !signed && v < 0 {
            return Err(Error::OutOfRangeImmediate { value: v, width: (width * 8) as u32 });
        }
        let bytes: Vec<u8> = match width {
            1 => vec![v as u8],
            4 => crate::bits::pack_le32(v as u32).to_vec(),
            8 => crate::bits::pack_le64(v as u64).to_vec(),
            _ => unreachable!("emit_ints called with an unsupported width"),
        };
        state.push_bytes(&bytes)?;
    }
    Ok(())
}

/// `.dbyte`/`.sdbyte`: 16-bit, big-endian (spec.md §4.6 — the one
/// directive family that packs big-endian, matching the original's
/// network-order convention for two-byte fields).
fn emit_ints_be(state: &mut AsmState, cursor: &mut Cursor, width: usize) -> Result<()> {
    debug_assert_eq!(width, 2);
    let values = parse_int_list(cursor)?;
    for v in values {
        state.push_bytes(&(v as u16).to_be_bytes())?;
    }
    Ok(())
}

fn emit_string(state: &mut AsmState, cursor: &mut Cursor, nul_terminate: bool) -> Result<()> {
    let s = match cursor.expect_any()? {
        Token { kind: TokenKind::StringLiteral(s), .. } => s.clone(),
        t => return Err(Error::UnexpectedToken(t.text.clone())),
    };
    state.push_bytes(s.as_bytes())?;
    if nul_terminate {
        state.push_bytes(&[0])?;
    }
    Ok(())
}
