//! The 6-bit primary opcode space and its dispatch table.
//!
//! A single flat array, indexed by the primary opcode, is shared by the
//! encoder, decoder and disassembler (spec.md §9: "a single flat table of
//! function pointers / closures... shared between encoder, decoder, and
//! executor"). [`crate::cpu::dispatch`] builds a parallel executor table
//! over the same indices and asserts every defined opcode here has an
//! executor, so the codec/execution correspondence is enforced at startup
//! rather than left to drift.

use crate::isa::format::Format;

pub const OPCODE_TABLE_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Hlt,
    Add,
    Sub,
    Rsb,
    Adc,
    Sbc,
    Rsc,
    Mul,
    And,
    Orr,
    Eor,
    Bic,
    Lsl,
    Lsr,
    Asr,
    Ror,
    Umull,
    Smull,
    Mov,
    Mvn,
    Ldr,
    Str,
    Ldrb,
    Strb,
    Ldrh,
    Strh,
    Swp,
    Swpb,
    Swph,
    Adrp,
    B,
    Bl,
    Swi,
    Bx,
    Blx,
    VAddF32,
    VSubF32,
    VMulF32,
    VDivF32,
    VNegF32,
    VAbsF32,
    VSqrtF32,
    VCmpF32,
    VMovF32,
    VCvtF32S32,
    VCvtS32F32,
    VLdrF32,
    VStrF32,
    VMlaF32,
    VMlsF32,
    VRecipF32,
    VNmulF32,
    VFmaF32,
    VFmsF32,
}

#[derive(Debug, Clone, Copy)]
pub struct OpcodeDef {
    pub opcode: Opcode,
    pub value: u32,
    pub mnemonic: &'static str,
    pub format: Format,
    /// Floating-point opcodes decode and disassemble but raise `BadInstr`
    /// on execution (no floating-point semantics are implemented).
    pub is_float: bool,
}

macro_rules! def {
    ($op:ident, $val:expr, $mnem:expr, $fmt:expr) => {
        OpcodeDef {
            opcode: Opcode::$op,
            value: $val,
            mnemonic: $mnem,
            format: $fmt,
            is_float: false,
        }
    };
    ($op:ident, $val:expr, $mnem:expr, $fmt:expr, float) => {
        OpcodeDef {
            opcode: Opcode::$op,
            value: $val,
            mnemonic: $mnem,
            format: $fmt,
            is_float: true,
        }
    };
}

/// All defined opcodes, in ascending numeric order. `cmp`/`cmn`/`tst`/`teq`
/// and `ret` are not opcodes: they are assembler/disassembler aliases over
/// `sub`/`add`/`and`/`eor` (S-bit set, `xzr` destination) and `bx x29`
/// respectively (spec.md §4.6).
pub const OPCODES: &[OpcodeDef] = &[
    def!(Hlt, 0, "hlt", Format::O),
    def!(Add, 1, "add", Format::O),
    def!(Sub, 2, "sub", Format::O),
    def!(Rsb, 3, "rsb", Format::O),
    def!(Adc, 4, "adc", Format::O),
    def!(Sbc, 5, "sbc", Format::O),
    def!(Rsc, 6, "rsc", Format::O),
    def!(Mul, 7, "mul", Format::O),
    def!(And, 8, "and", Format::O),
    def!(Orr, 9, "orr", Format::O),
    def!(Eor, 10, "eor", Format::O),
    def!(Bic, 11, "bic", Format::O),
    def!(Lsl, 12, "lsl", Format::O1),
    def!(Lsr, 13, "lsr", Format::O1),
    def!(Asr, 14, "asr", Format::O1),
    def!(Ror, 15, "ror", Format::O1),
    def!(Umull, 16, "umull", Format::O2),
    def!(Smull, 17, "smull", Format::O2),
    def!(Mvn, 18, "mvn", Format::O3),
    def!(Ldr, 19, "ldr", Format::M),
    def!(Str, 20, "str", Format::M),
    def!(Ldrb, 21, "ldrb", Format::M),
    def!(Strb, 22, "strb", Format::M),
    def!(Ldrh, 23, "ldrh", Format::M),
    def!(Strh, 24, "strh", Format::M),
    def!(Swp, 25, "swp", Format::M1),
    def!(Swpb, 26, "swpb", Format::M1),
    def!(Swph, 27, "swph", Format::M1),
    def!(Adrp, 28, "adrp", Format::M2),
    def!(B, 29, "b", Format::B1),
    def!(Bl, 30, "bl", Format::B1),
    def!(Swi, 31, "swi", Format::B1),
    def!(Bx, 32, "bx", Format::B2),
    def!(Blx, 33, "blx", Format::B2),
    // Pinned to 0x22 by spec.md scenario S1 ("opcode `mov`=0x22").
    def!(Mov, 0x22, "mov", Format::O3),
    def!(VAddF32, 35, "vadd_f32", Format::O, float),
    def!(VSubF32, 36, "vsub_f32", Format::O, float),
    def!(VMulF32, 37, "vmul_f32", Format::O, float),
    def!(VDivF32, 38, "vdiv_f32", Format::O, float),
    def!(VNegF32, 39, "vneg_f32", Format::O3, float),
    def!(VAbsF32, 40, "vabs_f32", Format::O3, float),
    def!(VSqrtF32, 41, "vsqrt_f32", Format::O3, float),
    def!(VCmpF32, 42, "vcmp_f32", Format::O, float),
    def!(VMovF32, 43, "vmov_f32", Format::O3, float),
    def!(VCvtF32S32, 44, "vcvt_f32_s32", Format::O3, float),
    def!(VCvtS32F32, 45, "vcvt_s32_f32", Format::O3, float),
    def!(VLdrF32, 46, "vldr_f32", Format::M, float),
    def!(VStrF32, 47, "vstr_f32", Format::M, float),
    def!(VMlaF32, 48, "vmla_f32", Format::O, float),
    def!(VMlsF32, 49, "vmls_f32", Format::O, float),
    def!(VRecipF32, 50, "vrecip_f32", Format::O3, float),
    def!(VNmulF32, 51, "vnmul_f32", Format::O, float),
    def!(VFmaF32, 52, "vfma_f32", Format::O, float),
    def!(VFmsF32, 53, "vfms_f32", Format::O, float),
];

/// Builds the `[Option<&OpcodeDef>; 64]` table used by encode/decode/disasm,
/// indexed by primary opcode value.
pub fn table() -> [Option<&'static OpcodeDef>; OPCODE_TABLE_LEN] {
    let mut table: [Option<&'static OpcodeDef>; OPCODE_TABLE_LEN] = [None; OPCODE_TABLE_LEN];
    for def in OPCODES {
        table[def.value as usize] = Some(def);
    }
    table
}

pub fn by_opcode(op: Opcode) -> &'static OpcodeDef {
    OPCODES
        .iter()
        .find(|d| d.opcode == op)
        .expect("every Opcode variant has a table entry")
}

pub fn by_mnemonic(mnemonic: &str) -> Option<&'static OpcodeDef> {
    OPCODES.iter().find(|d| d.mnemonic == mnemonic)
}

pub fn by_value(value: u32) -> Option<&'static OpcodeDef> {
    OPCODES.iter().find(|d| d.value == value)
}
