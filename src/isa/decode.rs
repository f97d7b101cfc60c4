//! Unpacks a 32-bit instruction word into its [`Opcode`] and [`Operands`],
//! the exact inverse of [`crate::isa::encode::encode`].

use crate::bits::{bitfield_s, bitfield_u};
use crate::error::{Error, Result};
use crate::isa::cond::Cond;
use crate::isa::format::{AddrMode, Format, ShiftType};
use crate::isa::opcode::{by_value, Opcode};
use crate::isa::operands::*;

fn reg(w: u32, lo: u32) -> u8 {
    bitfield_u(w, lo, 5) as u8
}

/// Decodes `word` into its opcode and operands.
pub fn decode(word: u32) -> Result<(Opcode, Operands)> {
    let opcode_value = bitfield_u(word, 26, 6);
    let def = by_value(opcode_value).ok_or(Error::BadInstr(word))?;

    if def.opcode == Opcode::Hlt {
        return Ok((Opcode::Hlt, Operands::None));
    }

    let operands = match def.format {
        Format::O => {
            let s = bitfield_u(word, 25, 1) == 1;
            let rd = reg(word, 20);
            let rn = reg(word, 15);
            let imm_flag = bitfield_u(word, 14, 1) == 1;
            let op2 = if imm_flag {
                AluOp2::Imm(bitfield_u(word, 0, 14))
            } else {
                AluOp2::Reg(ShiftedReg {
                    rm: reg(word, 9),
                    shift_type: ShiftType::from_u32(bitfield_u(word, 7, 2)),
                    imm5: bitfield_u(word, 2, 5) as u8,
                })
            };
            Operands::Alu { s, rd, rn, op2 }
        }
        Format::O1 => {
            let rd = reg(word, 20);
            let rn = reg(word, 15);
            let imm_flag = bitfield_u(word, 14, 1) == 1;
            let amt = if imm_flag {
                ShiftAmt::Imm(bitfield_u(word, 2, 5) as u8)
            } else {
                ShiftAmt::Reg(reg(word, 9))
            };
            Operands::Shift { rd, rn, amt }
        }
        Format::O2 => Operands::WideMul {
            s: bitfield_u(word, 25, 1) == 1,
            rlo: reg(word, 20),
            rhi: reg(word, 15),
            rn: reg(word, 9),
            rm: bitfield_u(word, 4, 5) as u8,
        },
        Format::O3 => {
            let s = bitfield_u(word, 25, 1) == 1;
            let rd = reg(word, 20);
            let imm_flag = bitfield_u(word, 19, 1) == 1;
            let src = if imm_flag {
                MoveSrc::Imm(bitfield_u(word, 0, 19))
            } else {
                MoveSrc::Reg {
                    rn: reg(word, 14),
                    imm14: bitfield_u(word, 0, 14),
                }
            };
            Operands::Move { s, rd, src }
        }
        Format::M => {
            let signed = bitfield_u(word, 25, 1) == 1;
            let rt = reg(word, 20);
            let rn = reg(word, 15);
            let imm_flag = bitfield_u(word, 14, 1) == 1;
            let addr_mode = AddrMode::from_u32(bitfield_u(word, 0, 2));
            let offset = if imm_flag {
                MemOffset::Imm(bitfield_s(word, 2, 12))
            } else {
                MemOffset::Reg(ShiftedReg {
                    rm: reg(word, 9),
                    shift_type: ShiftType::from_u32(bitfield_u(word, 7, 2)),
                    imm5: bitfield_u(word, 2, 5) as u8,
                })
            };
            Operands::LoadStore {
                signed,
                rt,
                rn,
                mem: MemOperand { addr_mode, offset },
            }
        }
        Format::M1 => Operands::Atomic {
            rt: reg(word, 20),
            rn: reg(word, 15),
            rm: reg(word, 9),
        },
        Format::M2 => Operands::Adrp {
            rd: reg(word, 20),
            imm20: bitfield_u(word, 0, 20),
        },
        Format::B1 => Operands::Branch {
            cond: Cond::from_u32(bitfield_u(word, 22, 4)),
            simm22: bitfield_s(word, 0, 22),
        },
        Format::B2 => Operands::BranchReg {
            cond: Cond::from_u32(bitfield_u(word, 22, 4)),
            rd: reg(word, 17),
        },
    };

    Ok((def.opcode, operands))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::encode::encode;
    use crate::isa::opcode::OPCODES;

    fn sample_operands(format: crate::isa::format::Format) -> Operands {
        use crate::isa::format::Format::*;
        match format {
            O => Operands::Alu {
                s: true,
                rd: 3,
                rn: 4,
                op2: AluOp2::Imm(10),
            },
            O1 => Operands::Shift {
                rd: 1,
                rn: 2,
                amt: ShiftAmt::Imm(7),
            },
            O2 => Operands::WideMul {
                s: false,
                rlo: 1,
                rhi: 2,
                rn: 3,
                rm: 4,
            },
            O3 => Operands::Move {
                s: true,
                rd: 5,
                src: MoveSrc::Imm(1234),
            },
            M => Operands::LoadStore {
                signed: false,
                rt: 1,
                rn: 2,
                mem: MemOperand {
                    addr_mode: AddrMode::Offset,
                    offset: MemOffset::Imm(-5),
                },
            },
            M1 => Operands::Atomic {
                rt: 1,
                rn: 2,
                rm: 3,
            },
            M2 => Operands::Adrp { rd: 1, imm20: 42 },
            B1 => Operands::Branch {
                cond: Cond::Al,
                simm22: -8,
            },
            B2 => Operands::BranchReg {
                cond: Cond::Al,
                rd: 29,
            },
        }
    }

    #[test]
    fn round_trip_every_format() {
        // decode(encode(fields)) == fields for at least one representative
        // instruction per format (spec.md §8.1).
        let representatives = [
            Opcode::Add,
            Opcode::Lsl,
            Opcode::Umull,
            Opcode::Mov,
            Opcode::Ldr,
            Opcode::Swp,
            Opcode::Adrp,
            Opcode::B,
            Opcode::Bx,
        ];
        for op in representatives {
            let def = crate::isa::opcode::by_opcode(op);
            let operands = sample_operands(def.format);
            let word = encode(op, &operands).unwrap();
            let (decoded_op, decoded_operands) = decode(word).unwrap();
            assert_eq!(decoded_op, op);
            assert_eq!(decoded_operands, operands);
        }
    }

    #[test]
    fn unknown_opcode_is_bad_instr() {
        // every primary opcode in 0..54 is defined; 63 is not.
        let word = 63u32 << 26;
        assert!(matches!(decode(word), Err(Error::BadInstr(_))));
    }

    #[test]
    fn every_defined_opcode_decodes_without_panicking() {
        for def in OPCODES {
            let word = def.value << 26;
            assert!(decode(word).is_ok(), "opcode {} failed to decode", def.mnemonic);
        }
    }
}
