//! The 64-entry executor table, built in parallel with
//! [`crate::isa::opcode`]'s table over the same primary-opcode indices
//! (spec.md §9: a single flat table shared by encoder, decoder, and
//! executor).

use crate::bus::Bus;
use crate::cpu::{exec, Cpu};
use crate::error::Result;
use crate::isa::opcode::{table as opcode_table, Opcode, OPCODE_TABLE_LEN};
use crate::isa::operands::Operands;

pub type Handler = fn(&mut Cpu, &mut Bus, Opcode, u32, Operands) -> Result<()>;

fn handler_for(opcode: Opcode, is_float: bool) -> Handler {
    if is_float {
        return exec::exec_float_unimplemented;
    }
    use Opcode::*;
    match opcode {
        Hlt => exec::exec_hlt,
        Add | Sub | Rsb | Adc | Sbc | Rsc | Mul | And | Orr | Eor | Bic => exec::exec_alu,
        Lsl | Lsr | Asr | Ror => exec::exec_shift,
        Umull | Smull => exec::exec_widemul,
        Mov | Mvn => exec::exec_move,
        Ldr | Str | Ldrb | Strb | Ldrh | Strh => exec::exec_loadstore,
        Swp | Swpb | Swph => exec::exec_atomic,
        Adrp => exec::exec_adrp,
        B | Bl | Swi => exec::exec_branch,
        Bx | Blx => exec::exec_branch_reg,
        _ => exec::exec_float_unimplemented,
    }
}

/// Builds the table, panicking if any populated `isa` opcode slot ends up
/// without an executor — the same "unreachable slot in a complete table"
/// contract violation the codec's own table construction guards against.
pub fn build() -> [Option<Handler>; OPCODE_TABLE_LEN] {
    let mut table: [Option<Handler>; OPCODE_TABLE_LEN] = [None; OPCODE_TABLE_LEN];
    let isa_table = opcode_table();
    for slot in isa_table.iter() {
        if let Some(def) = slot {
            table[def.value as usize] = Some(handler_for(def.opcode, def.is_float));
        }
    }
    for (value, (isa_slot, exec_slot)) in isa_table.iter().zip(table.iter()).enumerate() {
        assert_eq!(
            isa_slot.is_some(),
            exec_slot.is_some(),
            "opcode slot {} defined in isa table has no executor",
            value
        );
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executor_table_covers_every_defined_opcode() {
        let table = build();
        for def in crate::isa::opcode::OPCODES {
            assert!(table[def.value as usize].is_some(), "missing executor for {}", def.mnemonic);
        }
    }
}
