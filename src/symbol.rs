//! Minimal symbol interning. The real lexer/parser (out of scope here) owns
//! the production interner; this is just enough of one to let the core be
//! self-contained and testable.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::rc::Rc;

/// An interned identifier. Cheap to copy and compare; two `Symbol`s compare
/// equal iff they were interned from equal strings in the same table.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Symbol(u32);

/// Interning pool. `Symbol`s from different tables must never be compared;
/// nothing in this crate enforces that, same as the classic `Symbol` module
/// this is modeled on.
#[derive(Debug, Default)]
pub struct SymbolTable {
    strings: Vec<Rc<str>>,
    ids: HashMap<Rc<str>, u32>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, s: &str) -> Symbol {
        if let Some(&id) = self.ids.get(s) {
            return Symbol(id);
        }
        let id = self.strings.len() as u32;
        let rc: Rc<str> = Rc::from(s);
        self.strings.push(rc.clone());
        self.ids.insert(rc, id);
        Symbol(id)
    }

    pub fn name(&self, sym: Symbol) -> &str {
        &self.strings[sym.0 as usize]
    }
}

/// A display helper that pairs a `Symbol` with the table it was interned in,
/// so it can be formatted without threading the table everywhere by hand.
pub struct SymbolDisplay<'a>(pub Symbol, pub &'a SymbolTable);

impl<'a> Display for SymbolDisplay<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.1.name(self.0))
    }
}
