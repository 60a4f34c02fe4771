//! Runtime value model and operator semantics shared by both execution backends.
//!
//! The tagged `Value` enum and its `add`/`sub`/... free functions follow the
//! teacher's `value.rs` naming convention (there: `py_add`, `py_sub`, ...),
//! but without the teacher's heap-arena + manual reference counting: arrays
//! and dictionaries alias freely via `Rc<RefCell<_>>`, which the spec's own
//! "no GC beyond the host" non-goal licenses.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::{BlockStatement, Identifier};
use crate::environment::Environment;
use crate::print_sink::PrintSink;

pub type BuiltinFn = fn(&[Value], &mut dyn PrintSink) -> Result<Value, String>;

/// A function defined as a `function(...) { ... }` literal, evaluated by the
/// tree interpreter. Captures the environment active at definition time.
#[derive(Debug)]
pub struct TreeFunctionObj {
    pub name: Option<String>,
    pub parameters: Vec<Identifier>,
    pub body: BlockStatement,
    pub env: Rc<RefCell<Environment>>,
}

/// A compiled function body: a raw instruction buffer plus its local-slot
/// count. Shares the enclosing program's constant pool rather than owning
/// one of its own.
#[derive(Debug)]
pub struct CompiledFunction {
    pub instructions: Vec<u8>,
    pub num_locals: u16,
    pub num_parameters: u8,
}

/// A closure over a compiled function: the function plus its captured free values.
#[derive(Debug)]
pub struct ClosureObj {
    pub function: Rc<CompiledFunction>,
    pub free: Vec<Value>,
}

/// A registered built-in, named for error messages and disassembly.
#[derive(Debug, Clone, Copy)]
pub struct BuiltIn {
    pub name: &'static str,
    pub func: BuiltinFn,
}

/// An array pseudo-method bound to a specific array instance, produced by
/// indexing with a method name (`arr["push"]`) and invoked via a normal
/// call expression (§9 of SPEC_FULL.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayMethod {
    Push,
}

/// The tagged runtime value every backend operates on.
#[derive(Debug, Clone)]
pub enum Value {
    Number(i64),
    Float(f64),
    Boolean(bool),
    Null,
    String(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Dictionary(Rc<RefCell<Dict>>),
    TreeFunction(Rc<TreeFunctionObj>),
    BytecodeFunction(Rc<CompiledFunction>),
    Closure(Rc<ClosureObj>),
    BuiltIn(BuiltIn),
    ArrayMethod(Rc<RefCell<Vec<Value>>>, ArrayMethod),
}

/// A dictionary mapping hashable keys to (key, value) pairs.
///
/// Maps hash -> list of (key, value) pairs sharing that hash; the inner
/// `Vec` resolves collisions. `IndexMap` preserves insertion order of
/// distinct hash buckets.
#[derive(Debug, Default)]
pub struct Dict {
    buckets: IndexMap<u64, Vec<(Value, Value)>>,
    len: usize,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, key: &Value) -> Result<Option<Value>, String> {
        let hash = hash_value(key)?;
        Ok(self.buckets.get(&hash).and_then(|bucket| bucket.iter().find(|(k, _)| values_equal(k, key)).map(|(_, v)| v.clone())))
    }

    pub fn insert(&mut self, key: Value, value: Value) -> Result<(), String> {
        let hash = hash_value(&key)?;
        let bucket = self.buckets.entry(hash).or_default();
        if let Some(slot) = bucket.iter_mut().find(|(k, _)| values_equal(k, &key)) {
            slot.1 = value;
        } else {
            bucket.push((key, value));
            self.len += 1;
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Value, Value)> {
        self.buckets.values().flatten()
    }
}

/// Computes the `(type-tag, 64-bit key)` hash for a dictionary key.
pub fn hash_value(v: &Value) -> Result<u64, String> {
    let mut hasher = ahash::AHasher::default();
    match v {
        Value::Number(n) => {
            0u8.hash(&mut hasher);
            n.hash(&mut hasher);
        }
        Value::Float(f) => {
            1u8.hash(&mut hasher);
            f.to_bits().hash(&mut hasher);
        }
        Value::Boolean(b) => {
            2u8.hash(&mut hasher);
            b.hash(&mut hasher);
        }
        Value::Null => 3u8.hash(&mut hasher),
        Value::String(s) => {
            4u8.hash(&mut hasher);
            s.as_bytes().hash(&mut hasher);
        }
        other => return Err(format!("unhashable type: {}", other.type_name())),
    }
    Ok(hasher.finish())
}

/// `==` semantics: different value kinds are always unequal; same-kind
/// values compare by content (strings), by value (numbers/bool/null), or by
/// reference identity (arrays, dictionaries, functions).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Number(x), Value::Float(y)) | (Value::Float(y), Value::Number(x)) => (*x as f64) == *y,
        (Value::Boolean(x), Value::Boolean(y)) => x == y,
        (Value::Null, Value::Null) => true,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => Rc::ptr_eq(x, y),
        (Value::Dictionary(x), Value::Dictionary(y)) => Rc::ptr_eq(x, y),
        (Value::TreeFunction(x), Value::TreeFunction(y)) => Rc::ptr_eq(x, y),
        (Value::BytecodeFunction(x), Value::BytecodeFunction(y)) => Rc::ptr_eq(x, y),
        (Value::Closure(x), Value::Closure(y)) => Rc::ptr_eq(x, y),
        (Value::BuiltIn(x), Value::BuiltIn(y)) => x.name == y.name,
        (Value::ArrayMethod(x, mx), Value::ArrayMethod(y, my)) => Rc::ptr_eq(x, y) && mx == my,
        _ => false,
    }
}

/// Deep structural equality used only by tests to compare tree-interpreter
/// and VM results; never invoked by language-level `==`.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(x), Value::Array(y)) => {
            let x = x.borrow();
            let y = y.borrow();
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| deep_equal(a, b))
        }
        (Value::Dictionary(x), Value::Dictionary(y)) => {
            let x = x.borrow();
            let y = y.borrow();
            x.len() == y.len() && x.iter().all(|(k, v)| y.get(k).ok().flatten().is_some_and(|yv| deep_equal(v, &yv)))
        }
        _ => values_equal(a, b),
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "Number",
            Value::Float(_) => "Float",
            Value::Boolean(_) => "Boolean",
            Value::Null => "Null",
            Value::String(_) => "String",
            Value::Array(_) => "Array",
            Value::Dictionary(_) => "Dictionary",
            Value::TreeFunction(_) => "Function",
            Value::BytecodeFunction(_) => "Function",
            Value::Closure(_) => "Function",
            Value::BuiltIn(_) => "BuiltIn",
            Value::ArrayMethod(..) => "Function",
        }
    }

    /// The single truthiness table used by the partial evaluator, the tree
    /// interpreter, and the VM: only `Null` and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            _ => true,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::TreeFunction(_) | Value::BytecodeFunction(_) | Value::Closure(_) | Value::BuiltIn(_) | Value::ArrayMethod(..))
    }
}

fn promote(a: &Value, b: &Value) -> Option<(f64, f64)> {
    match (a, b) {
        (Value::Number(x), Value::Float(y)) => Some((*x as f64, *y)),
        (Value::Float(x), Value::Number(y)) => Some((*x, *y as f64)),
        (Value::Float(x), Value::Float(y)) => Some((*x, *y)),
        _ => None,
    }
}

pub fn add(a: &Value, b: &Value) -> Result<Value, String> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Ok(Value::Number(x + y)),
        (Value::String(x), Value::String(y)) => Ok(Value::String(Rc::from(format!("{x}{y}").as_str()))),
        _ => {
            if let Some((x, y)) = promote(a, b) {
                Ok(Value::Float(x + y))
            } else {
                Err(format!("unsupported operand types for +: {} and {}", a.type_name(), b.type_name()))
            }
        }
    }
}

pub fn sub(a: &Value, b: &Value) -> Result<Value, String> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Ok(Value::Number(x - y)),
        _ => {
            if let Some((x, y)) = promote(a, b) {
                Ok(Value::Float(x - y))
            } else {
                Err(format!("unsupported operand types for -: {} and {}", a.type_name(), b.type_name()))
            }
        }
    }
}

pub fn mul(a: &Value, b: &Value) -> Result<Value, String> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Ok(Value::Number(x * y)),
        _ => {
            if let Some((x, y)) = promote(a, b) {
                Ok(Value::Float(x * y))
            } else {
                Err(format!("unsupported operand types for *: {} and {}", a.type_name(), b.type_name()))
            }
        }
    }
}

pub fn div(a: &Value, b: &Value) -> Result<Value, String> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if *y != 0 && x % y == 0 {
                Ok(Value::Number(x / y))
            } else {
                Ok(Value::Float(*x as f64 / *y as f64))
            }
        }
        _ => {
            if let Some((x, y)) = promote(a, b) {
                Ok(Value::Float(x / y))
            } else {
                Err(format!("unsupported operand types for /: {} and {}", a.type_name(), b.type_name()))
            }
        }
    }
}

pub fn shl(a: &Value, b: &Value) -> Result<Value, String> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Ok(Value::Number(x << (*y as u32 & 63))),
        _ => Err(format!("unsupported operand types for <<: {} and {}", a.type_name(), b.type_name())),
    }
}

pub fn xor(a: &Value, b: &Value) -> Result<Value, String> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Ok(Value::Number(x ^ y)),
        _ => Err(format!("unsupported operand types for ^: {} and {}", a.type_name(), b.type_name())),
    }
}

fn cmp_f64(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y),
        _ => promote(a, b).and_then(|(x, y)| x.partial_cmp(&y)),
    }
}

pub fn lt(a: &Value, b: &Value) -> Result<Value, String> {
    cmp_f64(a, b).map(|o| Value::Boolean(o.is_lt())).ok_or_else(|| format!("unsupported operand types for <: {} and {}", a.type_name(), b.type_name()))
}

pub fn gt(a: &Value, b: &Value) -> Result<Value, String> {
    cmp_f64(a, b).map(|o| Value::Boolean(o.is_gt())).ok_or_else(|| format!("unsupported operand types for >: {} and {}", a.type_name(), b.type_name()))
}

pub fn eq(a: &Value, b: &Value) -> Value {
    Value::Boolean(values_equal(a, b))
}

pub fn neq(a: &Value, b: &Value) -> Value {
    Value::Boolean(!values_equal(a, b))
}

pub fn neg(a: &Value) -> Result<Value, String> {
    match a {
        Value::Number(x) => Ok(Value::Number(-x)),
        Value::Float(x) => Ok(Value::Float(-x)),
        _ => Err(format!("unsupported operand type for unary -: {}", a.type_name())),
    }
}

pub fn not(a: &Value) -> Value {
    Value::Boolean(!a.is_truthy())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Null => write!(f, "null"),
            Value::String(s) => write!(f, "{s}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, v) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Dictionary(dict) => {
                write!(f, "{{")?;
                for (i, (k, v)) in dict.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::TreeFunction(func) => write!(f, "<function {}>", func.name.as_deref().unwrap_or("anonymous")),
            Value::BytecodeFunction(_) => write!(f, "<function>"),
            Value::Closure(_) => write!(f, "<function>"),
            Value::BuiltIn(b) => write!(f, "<built-in {}>", b.name),
            Value::ArrayMethod(_, m) => write!(f, "<built-in method {m:?}>"),
        }
    }
}

/// Reads `target[key]`, dispatching on the target's type. Shared by the
/// tree interpreter and the VM so both agree on indexing semantics.
pub fn index_get(target: &Value, key: &Value) -> Result<Value, String> {
    match target {
        Value::Array(items) => match key {
            Value::String(name) => match name.as_ref() {
                crate::builtins::ARRAY_LENGTH => Ok(Value::Number(items.borrow().len() as i64)),
                crate::builtins::ARRAY_PUSH => Ok(Value::ArrayMethod(Rc::clone(items), ArrayMethod::Push)),
                other => Err(format!("array has no method '{other}'")),
            },
            Value::Number(n) => {
                let items = items.borrow();
                if *n < 0 || *n as usize >= items.len() {
                    Ok(Value::Null)
                } else {
                    Ok(items[*n as usize].clone())
                }
            }
            _ => Err(format!("array index must be a Number or String, got {}", key.type_name())),
        },
        Value::Dictionary(dict) => dict.borrow().get(key).map(|v| v.unwrap_or(Value::Null)),
        other => Err(format!("type {} is not indexable", other.type_name())),
    }
}

/// Performs `target[key] = value`, mutating `target` in place.
pub fn index_set(target: &Value, key: &Value, value: Value) -> Result<(), String> {
    match target {
        Value::Array(items) => {
            let Value::Number(n) = key else {
                return Err(format!("array index must be a Number, got {}", key.type_name()));
            };
            if *n < 0 {
                return Err("array index out of range".to_string());
            }
            let mut items = items.borrow_mut();
            let index = *n as usize;
            if index >= items.len() {
                items.resize(index + 1, Value::Null);
            }
            items[index] = value;
            Ok(())
        }
        Value::Dictionary(dict) => dict.borrow_mut().insert(key.clone(), value),
        other => Err(format!("type {} does not support item assignment", other.type_name())),
    }
}

/// Invokes a built-in or array pseudo-method. Returns `None` for callables
/// (`TreeFunction`/`BytecodeFunction`/`Closure`) each backend must dispatch
/// itself since those require recursive evaluation.
pub fn call_simple(callee: &Value, args: &[Value], sink: &mut dyn PrintSink) -> Option<Result<Value, String>> {
    match callee {
        Value::BuiltIn(b) => Some((b.func)(args, sink)),
        Value::ArrayMethod(arr, ArrayMethod::Push) => Some({
            let mut arr = arr.borrow_mut();
            for a in args {
                arr.push(a.clone());
            }
            Ok(Value::Number(arr.len() as i64))
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_division_with_remainder_promotes_to_float() {
        let result = div(&Value::Number(7), &Value::Number(2)).unwrap();
        assert!(matches!(result, Value::Float(f) if (f - 3.5).abs() < 1e-9));
    }

    #[test]
    fn exact_number_division_stays_integer() {
        let result = div(&Value::Number(6), &Value::Number(2)).unwrap();
        assert!(matches!(result, Value::Number(3)));
    }

    #[test]
    fn division_by_zero_is_infinity_not_error() {
        let result = div(&Value::Number(1), &Value::Number(0)).unwrap();
        assert!(matches!(result, Value::Float(f) if f.is_infinite()));
    }

    #[test]
    fn truthiness_table() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
        assert!(Value::Number(0).is_truthy());
        assert!(Value::String(Rc::from("")).is_truthy());
    }

    #[test]
    fn equality_across_kinds_is_false() {
        assert!(!values_equal(&Value::Number(1), &Value::String(Rc::from("1"))));
    }

    #[test]
    fn dict_hash_bucket_roundtrip() {
        let mut dict = Dict::new();
        dict.insert(Value::String(Rc::from("color")), Value::String(Rc::from("red"))).unwrap();
        let got = dict.get(&Value::String(Rc::from("color"))).unwrap().unwrap();
        assert!(matches!(got, Value::String(s) if &*s == "red"));
    }
}
