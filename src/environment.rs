//! Lexical scope chain used by the tree-walking interpreter.
//!
//! Grounded on the reference `object/environment.go`, written in the
//! teacher's `get`/`get_mut`-style accessor naming (see `namespace.rs`).

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;

use crate::value::Value;

#[derive(Debug, Default)]
pub struct Environment {
    store: AHashMap<String, Value>,
    outer: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self { store: AHashMap::default(), outer: None }))
    }

    pub fn enclosed(outer: Rc<RefCell<Environment>>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self { store: AHashMap::default(), outer: Some(outer) }))
    }

    /// Looks up `name`, walking outward through enclosing scopes.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.store.get(name) {
            return Some(v.clone());
        }
        self.outer.as_ref().and_then(|outer| outer.borrow().get(name))
    }

    /// Introduces or replaces a binding in the *current* scope (`var`).
    pub fn define(&mut self, name: &str, value: Value) {
        self.store.insert(name.to_string(), value);
    }

    /// Writes to the nearest enclosing scope that already binds `name`.
    /// Returns `false` if no scope binds it.
    pub fn assign(&mut self, name: &str, value: Value) -> bool {
        if self.store.contains_key(name) {
            self.store.insert(name.to_string(), value);
            return true;
        }
        match &self.outer {
            Some(outer) => outer.borrow_mut().assign(name, value),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_outer_chain() {
        let outer = Environment::new();
        outer.borrow_mut().define("x", Value::Number(5));
        let inner = Environment::enclosed(outer);
        assert!(matches!(inner.borrow().get("x"), Some(Value::Number(5))));
    }

    #[test]
    fn assign_writes_through_to_defining_scope() {
        let outer = Environment::new();
        outer.borrow_mut().define("x", Value::Number(1));
        let inner = Environment::enclosed(outer.clone());
        assert!(inner.borrow_mut().assign("x", Value::Number(2)));
        assert!(matches!(outer.borrow().get("x"), Some(Value::Number(2))));
    }

    #[test]
    fn assign_to_undefined_name_fails() {
        let env = Environment::new();
        assert!(!env.borrow_mut().assign("missing", Value::Null));
    }
}
