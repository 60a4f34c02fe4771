//! Nested compile-time symbol table with free-variable promotion.
//!
//! Scope/`Symbol` shape follows the reference `compiler/symbolTable.go`;
//! the `Symbol`/`Scope` naming and newtype-style doc density follow the
//! teacher's `namespace.rs` (`NamespaceId`).

use ahash::AHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    Local,
    BuiltIn,
    Free,
    Function,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub scope: Scope,
    pub index: u16,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    store: AHashMap<String, Symbol>,
    outer: Option<Box<SymbolTable>>,
    pub free_symbols: Vec<Symbol>,
    num_definitions: u16,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters a new scope nested inside `outer`, taking ownership of it.
    pub fn new_enclosed(outer: SymbolTable) -> Self {
        Self { store: AHashMap::default(), outer: Some(Box::new(outer)), free_symbols: Vec::new(), num_definitions: 0 }
    }

    /// Leaves this scope, returning the outer one it was nested in.
    pub fn leave(self) -> SymbolTable {
        *self.outer.expect("leave() called on the outermost symbol table")
    }

    pub fn num_definitions(&self) -> u16 {
        self.num_definitions
    }

    pub fn is_global(&self) -> bool {
        self.outer.is_none()
    }

    pub fn define(&mut self, name: &str) -> Symbol {
        let scope = if self.outer.is_none() { Scope::Global } else { Scope::Local };
        let symbol = Symbol { name: name.to_string(), scope, index: self.num_definitions };
        self.num_definitions += 1;
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    pub fn define_builtin(&mut self, index: u16, name: &str) -> Symbol {
        let symbol = Symbol { name: name.to_string(), scope: Scope::BuiltIn, index };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Binds a function's own name so it can call itself without capturing
    /// a free variable for that purpose.
    pub fn define_function_name(&mut self, name: &str) -> Symbol {
        let symbol = Symbol { name: name.to_string(), scope: Scope::Function, index: 0 };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Resolves `name`, promoting an enclosing `Local` to `Free` (and
    /// recording it in `free_symbols`) wherever the lookup crosses a
    /// function boundary.
    pub fn resolve(&mut self, name: &str) -> Option<Symbol> {
        if let Some(sym) = self.store.get(name) {
            return Some(sym.clone());
        }
        let outer = self.outer.as_mut()?;
        let sym = outer.resolve(name)?;
        match sym.scope {
            Scope::Global | Scope::BuiltIn => Some(sym),
            _ => Some(self.define_free(sym)),
        }
    }

    fn define_free(&mut self, original: Symbol) -> Symbol {
        self.free_symbols.push(original.clone());
        let symbol = Symbol { name: original.name, scope: Scope::Free, index: (self.free_symbols.len() - 1) as u16 };
        self.store.insert(symbol.name.clone(), symbol.clone());
        symbol
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_define_and_resolve() {
        let mut table = SymbolTable::new();
        table.define("a");
        let sym = table.resolve("a").unwrap();
        assert_eq!(sym.scope, Scope::Global);
        assert_eq!(sym.index, 0);
    }

    #[test]
    fn local_shadowing_does_not_leak_to_global_resolve() {
        let mut global = SymbolTable::new();
        global.define("a");
        let mut local = SymbolTable::new_enclosed(global);
        local.define("a");
        let sym = local.resolve("a").unwrap();
        assert_eq!(sym.scope, Scope::Local);
    }

    #[test]
    fn free_variable_promotion_single_level() {
        let mut global = SymbolTable::new();
        global.define("a");
        let mut outer = SymbolTable::new_enclosed(global);
        outer.define("b");
        let mut inner = SymbolTable::new_enclosed(outer);
        let sym = inner.resolve("b").unwrap();
        assert_eq!(sym.scope, Scope::Free);
        assert_eq!(inner.free_symbols.len(), 1);
        assert_eq!(inner.free_symbols[0].name, "b");
    }

    #[test]
    fn global_symbol_is_never_promoted_to_free() {
        let mut global = SymbolTable::new();
        global.define("a");
        let outer = SymbolTable::new_enclosed(global);
        let mut inner = SymbolTable::new_enclosed(outer);
        let sym = inner.resolve("a").unwrap();
        assert_eq!(sym.scope, Scope::Global);
        assert!(inner.free_symbols.is_empty());
    }

    #[test]
    fn function_name_resolves_in_its_own_body() {
        let mut table = SymbolTable::new();
        table.define_function_name("fib");
        let sym = table.resolve("fib").unwrap();
        assert_eq!(sym.scope, Scope::Function);
    }
}
