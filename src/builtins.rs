//! The fixed, ordered built-in registry shared by the compiler (symbol-table
//! seeding) and the VM (`GetBuiltIn` index lookup).
//!
//! Follows the teacher's `builtins/mod.rs` registry-table pattern, scaled
//! down to the handful of built-ins this language exposes.

use crate::print_sink::PrintSink;
use crate::value::{BuiltIn, Value};

fn console_log(args: &[Value], sink: &mut dyn PrintSink) -> Result<Value, String> {
    for arg in args {
        sink.print_line(&arg.to_string());
    }
    Ok(Value::Null)
}

/// The ordered list of built-ins. Index in this list is the `GetBuiltIn`
/// operand the compiler and VM agree on.
pub const BUILTINS: &[BuiltIn] = &[BuiltIn { name: "console.log", func: console_log }];

pub fn lookup(name: &str) -> Option<(u16, BuiltIn)> {
    BUILTINS.iter().enumerate().find(|(_, b)| b.name == name).map(|(i, b)| (i as u16, *b))
}

pub fn by_index(index: u16) -> Option<BuiltIn> {
    BUILTINS.get(index as usize).copied()
}

/// Array pseudo-methods accessed via string indexing (`arr["length"]`,
/// `arr["push"](v)`) rather than the built-in registry above, since they are
/// bound to a specific array instance (§9 of SPEC_FULL.md).
pub const ARRAY_LENGTH: &str = "length";
pub const ARRAY_PUSH: &str = "push";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::print_sink::VecSink;

    #[test]
    fn console_log_writes_each_argument_on_its_own_line() {
        let mut sink = VecSink::default();
        console_log(&[Value::Number(1), Value::Number(2)], &mut sink).unwrap();
        assert_eq!(sink.0, vec!["1".to_string(), "2".to_string()]);
    }

    #[test]
    fn lookup_matches_by_index() {
        let (idx, builtin) = lookup("console.log").unwrap();
        assert_eq!(by_index(idx).unwrap().name, builtin.name);
    }
}
