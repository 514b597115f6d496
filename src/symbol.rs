use rustc_hash::FxHashMap;

use crate::value::SymbolId;

/// Interned symbol table. Each unique spelling maps to a unique SymbolId, so
/// `(eq? 'foo 'foo)` holds and the evaluator compares symbols by id.
pub struct SymbolTable {
    name_to_id: FxHashMap<Box<str>, SymbolId>,
    id_to_name: Vec<Box<str>>,
}

/// Well-known symbol IDs, pre-interned at startup.
/// These must match the order of interning in SymbolTable::new().
pub mod sym {
    use crate::value::SymbolId;

    pub const QUOTE: SymbolId = SymbolId(0);
    pub const QUOTE_SYNTAX: SymbolId = SymbolId(1);
    pub const SYNTAX: SymbolId = SymbolId(2);
    pub const SYNTAX_LOC: SymbolId = SymbolId(3);
    pub const SET: SymbolId = SymbolId(4);
    pub const IF: SymbolId = SymbolId(5);
    pub const LAMBDA: SymbolId = SymbolId(6);
    pub const BEGIN: SymbolId = SymbolId(7);
    pub const DEFINE_VALUES: SymbolId = SymbolId(8);
    pub const LET_VALUES: SymbolId = SymbolId(9);
    pub const LETREC_VALUES: SymbolId = SymbolId(10);
    pub const COND: SymbolId = SymbolId(11);
    pub const ELSE: SymbolId = SymbolId(12);
    pub const AND: SymbolId = SymbolId(13);
    pub const OR: SymbolId = SymbolId(14);
    // Sugar keywords, recognized only when sugar is enabled.
    pub const DEFINE: SymbolId = SymbolId(15);
    pub const LET: SymbolId = SymbolId(16);
    pub const LETREC: SymbolId = SymbolId(17);
}

const WELL_KNOWN: [&str; 18] = [
    "quote",
    "quote-syntax",
    "syntax",
    "syntax/loc",
    "set!",
    "if",
    "lambda",
    "begin",
    "define-values",
    "let-values",
    "letrec-values",
    "cond",
    "else",
    "and",
    "or",
    "define",
    "let",
    "letrec",
];

impl SymbolTable {
    /// Create a new symbol table with all well-known symbols pre-interned.
    pub fn new() -> Self {
        let mut table = SymbolTable {
            name_to_id: FxHashMap::default(),
            id_to_name: Vec::with_capacity(256),
        };
        for name in WELL_KNOWN {
            table.intern(name);
        }
        table
    }

    /// Intern a symbol name. Returns the existing ID if already interned,
    /// or creates a new one.
    pub fn intern(&mut self, name: &str) -> SymbolId {
        if let Some(&id) = self.name_to_id.get(name) {
            return id;
        }
        let id = SymbolId(self.id_to_name.len() as u32);
        self.name_to_id.insert(name.into(), id);
        self.id_to_name.push(name.into());
        id
    }

    /// Look up a symbol name by its ID.
    pub fn name(&self, id: SymbolId) -> &str {
        &self.id_to_name[id.index()]
    }

    /// Look up a symbol ID by name, without interning.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.name_to_id.get(name).copied()
    }

    /// Total number of interned symbols.
    pub fn count(&self) -> usize {
        self.id_to_name.len()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut symbols = SymbolTable::new();
        let a = symbols.intern("foo");
        let b = symbols.intern("foo");
        assert_eq!(a, b);
        assert_ne!(a, symbols.intern("bar"));
        assert_eq!(symbols.name(a), "foo");
    }

    #[test]
    fn well_known_ids_match_names() {
        let symbols = SymbolTable::new();
        assert_eq!(symbols.name(sym::QUOTE), "quote");
        assert_eq!(symbols.name(sym::SYNTAX_LOC), "syntax/loc");
        assert_eq!(symbols.name(sym::LETREC_VALUES), "letrec-values");
        assert_eq!(symbols.name(sym::LETREC), "letrec");
        assert_eq!(symbols.lookup("else"), Some(sym::ELSE));
        assert_eq!(symbols.count(), WELL_KNOWN.len());
    }
}
