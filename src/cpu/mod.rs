//! The CPU core (C11, spec.md §4.11): registers, PSTATE, and the
//! fetch/decode/execute loop.

pub mod dispatch;
pub mod exec;
pub mod intrinsics;
pub mod pstate;
pub mod registers;

pub use pstate::PState;
pub use registers::{Registers, LR_REG, SP_REG, ZERO_REG};

use crate::bus::Bus;
use crate::error::Result;

/// Register that holds the syscall number on `swi` entry; arguments follow
/// in x0..x5 (spec.md §6 lists the intrinsics but not which register
/// carries the number — this core uses x8, mirroring the AArch64 `w8`
/// convention the other instruction formats already echo).
pub const NR_REG: u8 = 8;

#[derive(Debug, Default)]
pub struct Cpu {
    pub regs: Registers,
    pub pstate: PState,
    pub pc: u32,
    pub halted: bool,
}

impl Cpu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs until halted or either cap is reached, whichever comes first
    /// (spec.md §5: `run(cycles, instructions)`).
    pub fn run(&mut self, bus: &mut Bus, cycles: u32, instructions: u32) -> Result<()> {
        exec::run(self, bus, cycles, instructions)
    }
}
