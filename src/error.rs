//! Crate-wide error type.
//!
//! Every fallible operation in this crate returns [`Result`]. Lex/parse and
//! assembly errors carry a [`SourcePos`](crate::lex::SourcePos) when one is
//! available so a driver can build a diagnostic; execution and memory errors
//! carry just enough state (address, register, syscall number) to explain
//! themselves without a logger.

use core::fmt;
use std::error;
use std::io;

use crate::lex::SourcePos;

#[derive(Debug)]
pub enum Error {
    // --- Lex/Parse ---
    UnterminatedComment,
    UnterminatedString,
    UnknownToken(String, SourcePos),
    UnexpectedEof,

    // --- Assembly ---
    MultipleDefinition(String),
    UndefinedLocal(String),
    OutOfRangeImmediate { value: i64, width: u32 },
    InvalidAddressingMode(String),
    InstructionOutsideText,
    DirectiveOutsideValidSection(String),
    UnterminatedScope,
    UnexpectedToken(String),

    // --- Link ---
    UndefinedSymbol(String),
    BadRelocationKind(u32),

    // --- I/O ---
    Io(io::Error),
    Scroll(scroll::Error),
    FileNotFound(String),
    BadObjectMagic,

    // --- Execution ---
    BadInstr(u32),
    BadRegister(u8),
    BadSyscall(u32),
    Halt,

    // --- Memory ---
    OutOfBounds(u32),
    AccessDenied(u32),
    ConflictAddresses,

    // --- MMU ---
    InvalidAddress(u32),
    NoFreePhysicalPage,

    // --- Allocator ---
    NotEnoughSpace(u32),
    InvalidRange(u32, u32),
    DoubleFree(u32, u32),

    Malformed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnterminatedComment => write!(f, "unterminated block comment"),
            Error::UnterminatedString => write!(f, "unterminated string literal"),
            Error::UnknownToken(text, pos) => {
                write!(f, "unknown token {:?} at {}", text, pos)
            }
            Error::UnexpectedEof => write!(f, "unexpected end of token stream"),
            Error::MultipleDefinition(name) => {
                write!(f, "multiple definition of symbol `{}`", name)
            }
            Error::UndefinedLocal(name) => write!(f, "undefined local symbol `{}`", name),
            Error::OutOfRangeImmediate { value, width } => write!(
                f,
                "immediate {} does not fit in a {}-bit field",
                value, width
            ),
            Error::InvalidAddressingMode(msg) => write!(f, "invalid addressing mode: {}", msg),
            Error::InstructionOutsideText => write!(f, "instruction outside .text section"),
            Error::DirectiveOutsideValidSection(d) => {
                write!(f, "directive `{}` used outside its valid section", d)
            }
            Error::UnterminatedScope => write!(f, "`.scope` without matching `.scend`"),
            Error::UnexpectedToken(msg) => write!(f, "unexpected token: {}", msg),
            Error::UndefinedSymbol(name) => write!(f, "undefined symbol `{}`", name),
            Error::BadRelocationKind(k) => write!(f, "unknown relocation kind {}", k),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Scroll(e) => write!(f, "binary layout error: {}", e),
            Error::FileNotFound(p) => write!(f, "file not found: {}", p),
            Error::BadObjectMagic => write!(f, "bad object file magic/header"),
            Error::BadInstr(word) => write!(f, "bad instruction word 0x{:08x}", word),
            Error::BadRegister(r) => write!(f, "bad register index {}", r),
            Error::BadSyscall(n) => write!(f, "unknown syscall number {}", n),
            Error::Halt => write!(f, "cpu halted"),
            Error::OutOfBounds(addr) => write!(f, "address 0x{:08x} out of bounds", addr),
            Error::AccessDenied(addr) => write!(f, "access denied at address 0x{:08x}", addr),
            Error::ConflictAddresses => write!(f, "overlapping memory device ranges"),
            Error::InvalidAddress(va) => write!(f, "unmappable virtual address 0x{:08x}", va),
            Error::NoFreePhysicalPage => write!(f, "no free physical page (swap exhausted)"),
            Error::NotEnoughSpace(n) => write!(f, "not enough space to allocate {} units", n),
            Error::InvalidRange(start, len) => {
                write!(f, "invalid range [{}, {})", start, start + len)
            }
            Error::DoubleFree(start, len) => {
                write!(f, "double free of range [{}, {})", start, start + len)
            }
            Error::Malformed(msg) => write!(f, "malformed: {}", msg),
        }
    }
}

impl error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<scroll::Error> for Error {
    fn from(e: scroll::Error) -> Self {
        Error::Scroll(e)
    }
}

pub type Result<T> = core::result::Result<T, Error>;
