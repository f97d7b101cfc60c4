//! The object file model: sections, symbols, relocations, strings, and
//! their binary serialization, plus the BAR1 static-library container.

pub mod archive;
pub mod file;
pub mod reloc;
pub mod section;
pub mod strtab;
pub mod symbol;

pub use archive::Archive;
pub use file::ObjectFile;
pub use reloc::{RelocKind, Relocation};
pub use section::{Section, SectionKind, CANONICAL_ORDER};
pub use strtab::Strtab;
pub use symbol::{Binding, Symbol, SymbolTable, SECTION_NONE};
