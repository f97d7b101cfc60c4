//! Token types and source positions produced by [`crate::lex::tokenizer`].

use std::fmt;

use crate::isa::cond::Cond;
use crate::isa::format::ShiftType;
use crate::isa::opcode::Opcode;

/// A position in the original source file, line/column 1-based, `offset`
/// the 0-based byte offset (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourcePos {
    pub line: u32,
    pub col: u32,
    pub offset: u32,
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// A numeric literal's base, kept only for round-tripping text back to a
/// preprocessor; the assembler only ever needs the parsed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Radix {
    Decimal,
    Hex,
    Binary,
    Octal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Spaces, tabs, newlines. Retained in the stream (spec.md §4.4) so a
    /// preprocessor upstream of this crate can reformat its output; the
    /// assembler's own cursor skips them.
    Whitespace,
    /// A line comment (`; ...`) or block comment (`;* ... *;`), retained
    /// for the same reason as whitespace.
    Comment,
    IntLiteral { value: i64, radix: Radix },
    StringLiteral(String),
    CharLiteral(u8),
    Comma,
    Colon,
    LParen,
    RParen,
    LBracket,
    RBracket,
    /// `!`, the write-back suffix on pre-increment memory operands.
    Bang,
    /// `#`, the immediate-value prefix.
    Hash,
    /// A `:lo12:`/`:hi20:`/`:lo19:`/`:hi13:` relocation hint (the tag
    /// without the surrounding colons).
    RelocHint(String),
    /// A name beginning with `.` (`.text`, `.global`, ...).
    AsmDirective(String),
    /// A name beginning with `#` followed by a letter (`#include`, ...) —
    /// peripheral preprocessor syntax this crate never interprets, only
    /// tokenizes so a preprocessor upstream can.
    PreprocDirective(String),
    /// `x0`..`x29`, `sp` (alias x30), `xzr` (alias x31).
    Register(u8),
    /// A standalone condition mnemonic, e.g. the `eq` in `b.eq`.
    Condition(Cond),
    /// `lsl`/`lsr`/`asr`/`ror` used as an operand, not an instruction.
    ShiftKeyword(ShiftType),
    /// An instruction mnemonic, with an optional `.cond` suffix folded in
    /// (`b.eq` lexes as one token: `Mnemonic { opcode: B, cond: Some(Eq) }`).
    Mnemonic { opcode: Opcode, cond: Option<Cond> },
    /// Anything else: labels, symbol references, unrecognized text.
    Symbol(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub pos: SourcePos,
}

impl Token {
    pub fn is_trivia(&self) -> bool {
        matches!(self.kind, TokenKind::Whitespace | TokenKind::Comment)
    }
}
