//! The linker/loader (C7, spec.md §4.7): resolves relocations against a
//! chosen load address and materializes sections into the system bus.

mod linker;

pub use linker::link;
