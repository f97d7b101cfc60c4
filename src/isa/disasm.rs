//! Canonical textual disassembly.
//!
//! A dispatch table indexed by primary opcode (the same [`OPCODES`] table
//! used by encode/decode) produces a textual form following each format's
//! template, with two field-aware rewrites spec.md calls out explicitly:
//! `cmp`/`cmn`/`tst`/`teq` never print their implicit zero-register
//! destination, and a format-B2 instruction with `Xd == 29` prints as
//! `ret`. Neither is done by substring-matching the output (the REDESIGN
//! FLAGS section calls that out as a defect in the source).

use crate::isa::cond::Cond;
use crate::isa::decode::decode;
use crate::isa::format::{AddrMode, Format};
use crate::isa::opcode::{by_opcode, Opcode};
use crate::isa::operands::*;
use crate::error::Result;

/// Register 31 is `xzr`, register 30 is `sp` by convention; all others
/// print as `xN`.
pub fn reg_name(r: u8) -> String {
    match r {
        31 => "xzr".to_string(),
        30 => "sp".to_string(),
        n => format!("x{}", n),
    }
}

fn fmt_shifted_reg(sr: &ShiftedReg) -> String {
    if sr.imm5 == 0 {
        reg_name(sr.rm)
    } else {
        format!(
            "{}, {} #{}",
            reg_name(sr.rm),
            sr.shift_type.mnemonic(),
            sr.imm5
        )
    }
}

fn fmt_mem(rn: u8, mem: &MemOperand) -> String {
    let base = reg_name(rn);
    match (&mem.addr_mode, &mem.offset) {
        (AddrMode::Offset, MemOffset::Imm(0)) => format!("[{}]", base),
        (AddrMode::Offset, MemOffset::Imm(i)) => format!("[{}, #{}]", base, i),
        (AddrMode::Offset, MemOffset::Reg(sr)) => format!("[{}, {}]", base, fmt_shifted_reg(sr)),
        (AddrMode::PreInc, MemOffset::Imm(i)) => format!("[{}, #{}]!", base, i),
        (AddrMode::PreInc, MemOffset::Reg(sr)) => format!("[{}, {}]!", base, fmt_shifted_reg(sr)),
        (AddrMode::PostInc, MemOffset::Imm(i)) => format!("[{}], #{}", base, i),
        (AddrMode::PostInc, MemOffset::Reg(sr)) => format!("[{}], {}", base, fmt_shifted_reg(sr)),
    }
}

fn cond_suffix(cond: Cond) -> String {
    if cond == Cond::Al {
        String::new()
    } else {
        format!(".{}", cond.mnemonic())
    }
}

/// `sub`/`add`/`and`/`eor` with `S` set and `xzr` destination are the
/// `cmp`/`cmn`/`tst`/`teq` aliases; anything else keeps its own mnemonic.
fn alu_alias(mnemonic: &str, s: bool, rd: u8) -> Option<&'static str> {
    if !s || rd != 31 {
        return None;
    }
    match mnemonic {
        "sub" => Some("cmp"),
        "add" => Some("cmn"),
        "and" => Some("tst"),
        "eor" => Some("teq"),
        _ => None,
    }
}

fn fmt_op2(op2: &AluOp2) -> String {
    match op2 {
        AluOp2::Imm(i) => format!("#{}", i),
        AluOp2::Reg(sr) => fmt_shifted_reg(sr),
    }
}

/// Disassembles a single decoded instruction into its canonical text form.
pub fn disassemble_word(word: u32) -> Result<String> {
    let (opcode, operands) = decode(word)?;
    Ok(disassemble(opcode, &operands))
}

/// Disassembles an already-decoded instruction.
pub fn disassemble(opcode: Opcode, operands: &Operands) -> String {
    let def = by_opcode(opcode);
    match (def.format, operands) {
        (Format::O, Operands::Alu { s, rd, rn, op2 }) => {
            if let Some(alias) = alu_alias(def.mnemonic, *s, *rd) {
                format!("{} {}, {}", alias, reg_name(*rn), fmt_op2(op2))
            } else {
                let mnem = if *s {
                    format!("{}s", def.mnemonic)
                } else {
                    def.mnemonic.to_string()
                };
                format!(
                    "{} {}, {}, {}",
                    mnem,
                    reg_name(*rd),
                    reg_name(*rn),
                    fmt_op2(op2)
                )
            }
        }
        (Format::O1, Operands::Shift { rd, rn, amt }) => {
            let operand = match amt {
                ShiftAmt::Imm(n) => format!("#{}", n),
                ShiftAmt::Reg(r) => reg_name(*r),
            };
            format!(
                "{} {}, {}, {}",
                def.mnemonic,
                reg_name(*rd),
                reg_name(*rn),
                operand
            )
        }
        (Format::O2, Operands::WideMul { s, rlo, rhi, rn, rm }) => {
            let mnem = if *s {
                format!("{}s", def.mnemonic)
            } else {
                def.mnemonic.to_string()
            };
            format!(
                "{} {}, {}, {}, {}",
                mnem,
                reg_name(*rlo),
                reg_name(*rhi),
                reg_name(*rn),
                reg_name(*rm)
            )
        }
        (Format::O3, Operands::Move { s, rd, src }) => {
            let mnem = if *s {
                format!("{}s", def.mnemonic)
            } else {
                def.mnemonic.to_string()
            };
            let operand = match src {
                MoveSrc::Imm(i) => format!("#{}", i),
                MoveSrc::Reg { rn, .. } => reg_name(*rn),
            };
            format!("{} {}, {}", mnem, reg_name(*rd), operand)
        }
        (Format::M, Operands::LoadStore { rt, rn, mem, .. }) => {
            format!("{} {}, {}", def.mnemonic, reg_name(*rt), fmt_mem(*rn, mem))
        }
        (Format::M1, Operands::Atomic { rt, rn, rm }) => {
            format!(
                "{} {}, {}, [{}]",
                def.mnemonic,
                reg_name(*rt),
                reg_name(*rn),
                reg_name(*rm)
            )
        }
        (Format::M2, Operands::Adrp { rd, imm20 }) => {
            format!("{} {}, #{}", def.mnemonic, reg_name(*rd), imm20)
        }
        (Format::B1, Operands::Branch { cond, simm22 }) => {
            format!("{}{} #{}", def.mnemonic, cond_suffix(*cond), simm22)
        }
        (Format::B2, Operands::BranchReg { cond, rd }) => {
            if *rd == 29 {
                "ret".to_string()
            } else {
                format!("{}{} {}", def.mnemonic, cond_suffix(*cond), reg_name(*rd))
            }
        }
        (Format::O, Operands::None) => def.mnemonic.to_string(),
        _ => format!("{} <malformed operands>", def.mnemonic),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::encode::encode;

    #[test]
    fn cmp_alias_omits_destination() {
        let text = disassemble(
            Opcode::Sub,
            &Operands::Alu {
                s: true,
                rd: 31,
                rn: 2,
                op2: AluOp2::Imm(4),
            },
        );
        assert_eq!(text, "cmp x2, #4");
    }

    #[test]
    fn plain_subs_keeps_destination_when_not_xzr() {
        let text = disassemble(
            Opcode::Sub,
            &Operands::Alu {
                s: true,
                rd: 1,
                rn: 2,
                op2: AluOp2::Imm(4),
            },
        );
        assert_eq!(text, "subs x1, x2, #4");
    }

    #[test]
    fn bx_x29_disassembles_to_ret() {
        let text = disassemble(
            Opcode::Bx,
            &Operands::BranchReg {
                cond: Cond::Al,
                rd: 29,
            },
        );
        assert_eq!(text, "ret");
    }

    #[test]
    fn conditional_branch_prints_suffix() {
        let text = disassemble(
            Opcode::B,
            &Operands::Branch {
                cond: Cond::Eq,
                simm22: 4,
            },
        );
        assert_eq!(text, "b.eq #4");
    }

    #[test]
    fn mov_immediate_round_trips_word() {
        let word = encode(
            Opcode::Mov,
            &Operands::Move {
                s: false,
                rd: 0,
                src: MoveSrc::Imm(5),
            },
        )
        .unwrap();
        assert_eq!(disassemble_word(word).unwrap(), "mov x0, #5");
    }
}
