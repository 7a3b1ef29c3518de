//! Symbol table: the compile-time view of the record schema.
//!
//! The table is supplied by the caller and maps each identifier to its
//! runtime environment slot and static type. It is immutable for the
//! duration of one compile; the core never persists or serializes it.

use std::collections::HashMap;

use crate::types::Type;

/// One table entry: where the value lives at runtime and what type it has.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolEntry {
    pub slot: usize,
    pub ty: Type,
}

/// Mapping from identifier name to `(slot index, type)`.
///
/// Slots are assigned in definition order, matching the layout of the
/// runtime environment array the caller fills per record.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    entries: HashMap<String, SymbolEntry>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    /// Build a table from an ordered field list, e.g. the result of
    /// `parse_annotation_types`.
    pub fn from_fields(fields: &[(String, Type)]) -> SymbolTable {
        let mut table = SymbolTable::new();
        for (name, ty) in fields {
            table.define(name.clone(), ty.clone());
        }
        table
    }

    /// Define a symbol, assigning it the next slot. Returns the slot index.
    pub fn define(&mut self, name: String, ty: Type) -> usize {
        let slot = self.entries.len();
        self.entries.insert(name, SymbolEntry { slot, ty });
        slot
    }

    pub fn lookup(&self, name: &str) -> Option<&SymbolEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigns_slots_in_definition_order() {
        let mut table = SymbolTable::new();
        assert_eq!(table.define("chrom".into(), Type::String), 0);
        assert_eq!(table.define("pos".into(), Type::Int), 1);
        assert_eq!(table.lookup("pos").map(|e| e.slot), Some(1));
        assert_eq!(table.lookup("chrom").map(|e| e.ty.clone()), Some(Type::String));
        assert!(table.lookup("missing").is_none());
    }
}
