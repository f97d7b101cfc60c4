//! Symbol table entries and their merge rule.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Sentinel for "no section" (spec.md §3: `section: section-index or NONE`).
pub const SECTION_NONE: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Local = 0,
    Global = 1,
    Weak = 2,
}

impl Binding {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn from_u16(v: u16) -> Result<Self> {
        Ok(match v {
            0 => Binding::Local,
            1 => Binding::Global,
            2 => Binding::Weak,
            other => return Err(Error::Malformed(format!("unknown symbol binding {}", other))),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    /// Ordinal index into the string table.
    pub name: u32,
    pub value: u32,
    pub binding: Binding,
    /// Section ordinal, or [`SECTION_NONE`].
    pub section: u32,
}

/// Symbols keyed by mangled name index, enforcing the invariant that every
/// name appears at most once and implementing the WEAK-upgrade merge rule
/// (spec.md §4.5).
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    by_name: HashMap<u32, usize>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new symbol, or merges into an existing one with the same
    /// name index. Returns the resulting symbol's table index.
    pub fn add(
        &mut self,
        name: u32,
        value: u32,
        binding: Binding,
        section: u32,
        name_for_error: &str,
    ) -> Result<usize> {
        if let Some(&idx) = self.by_name.get(&name) {
            let existing = self.symbols[idx];
            match (existing.binding, binding) {
                (Binding::Weak, Binding::Weak) => Ok(idx),
                (Binding::Weak, _) => {
                    self.symbols[idx] = Symbol {
                        name,
                        value,
                        binding,
                        section,
                    };
                    Ok(idx)
                }
                (_, Binding::Weak) => Ok(idx),
                (_, _) => Err(Error::MultipleDefinition(name_for_error.to_string())),
            }
        } else {
            let idx = self.symbols.len();
            self.symbols.push(Symbol {
                name,
                value,
                binding,
                section,
            });
            self.by_name.insert(name, idx);
            Ok(idx)
        }
    }

    pub fn get(&self, idx: usize) -> Option<&Symbol> {
        self.symbols.get(idx)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut Symbol> {
        self.symbols.get_mut(idx)
    }

    pub fn index_of_name(&self, name: u32) -> Option<usize> {
        self.by_name.get(&name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weak_then_global_upgrades() {
        let mut t = SymbolTable::new();
        let i1 = t.add(5, 0, Binding::Weak, SECTION_NONE, "foo").unwrap();
        let i2 = t.add(5, 100, Binding::Global, 0, "foo").unwrap();
        assert_eq!(i1, i2);
        assert_eq!(t.get(i1).unwrap().value, 100);
        assert_eq!(t.get(i1).unwrap().binding, Binding::Global);
    }

    #[test]
    fn two_non_weak_definitions_is_fatal() {
        let mut t = SymbolTable::new();
        t.add(5, 0, Binding::Global, 0, "foo").unwrap();
        let err = t.add(5, 4, Binding::Global, 0, "foo").unwrap_err();
        assert!(matches!(err, Error::MultipleDefinition(_)));
    }

    #[test]
    fn global_then_weak_keeps_global() {
        let mut t = SymbolTable::new();
        t.add(5, 100, Binding::Global, 0, "foo").unwrap();
        t.add(5, 0, Binding::Weak, SECTION_NONE, "foo").unwrap();
        assert_eq!(t.get(0).unwrap().value, 100);
        assert_eq!(t.get(0).unwrap().binding, Binding::Global);
    }
}
