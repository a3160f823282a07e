use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::value::SymbolId;

/// Interned symbol table. Each unique symbol name maps to a unique SymbolId,
/// so `(eq? 'foo 'foo)` holds because both resolve to the same id.
///
/// There is one table per process. It is created on first use and never
/// torn down; names are leaked so `name` can hand out `&'static str`.
pub struct SymbolTable {
    name_to_id: HashMap<&'static str, SymbolId>,
    id_to_name: Vec<&'static str>,
}

/// Well-known symbol IDs, pre-interned when the table is created.
/// These must match the order of `WELL_KNOWN` below.
pub mod sym {
    use crate::value::SymbolId;

    pub const QUOTE: SymbolId = SymbolId(0);
    pub const IF: SymbolId = SymbolId(1);
    pub const BEGIN: SymbolId = SymbolId(2);
    pub const LAMBDA: SymbolId = SymbolId(3);
    pub const DEFINE: SymbolId = SymbolId(4);
    pub const SETQ: SymbolId = SymbolId(5);
    pub const APPLY: SymbolId = SymbolId(6);
    pub const CALLCC: SymbolId = SymbolId(7);
}

const WELL_KNOWN: [&str; 8] = [
    "quote", "if", "begin", "lambda", "define", "set!", "apply", "call/cc",
];

static TABLE: Lazy<Mutex<SymbolTable>> = Lazy::new(|| Mutex::new(SymbolTable::new()));

impl SymbolTable {
    fn new() -> Self {
        let mut table = SymbolTable {
            name_to_id: HashMap::new(),
            id_to_name: Vec::new(),
        };
        for name in WELL_KNOWN {
            table.insert(name);
        }
        table
    }

    fn insert(&mut self, name: &str) -> SymbolId {
        if let Some(&id) = self.name_to_id.get(name) {
            return id;
        }
        let name: &'static str = Box::leak(name.to_owned().into_boxed_str());
        let id = SymbolId(self.id_to_name.len() as u32);
        self.name_to_id.insert(name, id);
        self.id_to_name.push(name);
        id
    }
}

/// Intern a symbol name. Returns the existing ID if already interned,
/// or creates a new one.
pub fn intern(name: &str) -> SymbolId {
    TABLE.lock().insert(name)
}

/// Look up a symbol name by its ID.
pub fn name(id: SymbolId) -> &'static str {
    TABLE.lock().id_to_name[id.0 as usize]
}

/// Total number of interned symbols.
pub fn count() -> usize {
    TABLE.lock().id_to_name.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_symbols_are_preinterned() {
        assert_eq!(intern("quote"), sym::QUOTE);
        assert_eq!(intern("set!"), sym::SETQ);
        assert_eq!(intern("call/cc"), sym::CALLCC);
        assert_eq!(name(sym::LAMBDA), "lambda");
    }

    #[test]
    fn interning_is_idempotent() {
        let a = intern("interning-is-idempotent");
        let b = intern("interning-is-idempotent");
        assert_eq!(a, b);
        assert!(count() >= WELL_KNOWN.len() + 1);
    }
}
