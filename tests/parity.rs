//! End-to-end scenarios both backends must agree on (SPEC_FULL.md §8), plus
//! the boundary behaviors listed alongside them.

use scriptlang::{compile, parse, run_tree, run_vm, NullSink, Value};

fn run_both(src: &str) -> (Value, Value) {
    let program = parse(src, "t.js").unwrap();
    let tree_result = run_tree(&program, "t.js", &mut NullSink).unwrap();
    let bytecode = compile(&program, "t.js").unwrap();
    let vm_result = run_vm(bytecode, "t.js", &mut NullSink).unwrap();
    (tree_result, vm_result)
}

fn assert_both_agree(src: &str, expected: &str) {
    let (tree_result, vm_result) = run_both(src);
    assert_eq!(tree_result.to_string(), expected, "tree interpreter mismatch for {src:?}");
    assert_eq!(vm_result.to_string(), expected, "vm mismatch for {src:?}");
}

#[test]
fn scenario_1_arithmetic_and_globals() {
    assert_both_agree("var a = 5; var b = a * 7; b;", "35");
}

#[test]
fn scenario_2_function_calls_and_nesting() {
    assert_both_agree("var add = function(x,y){ return x+y; }; add(5, add(5, 5));", "15");
}

#[test]
fn scenario_3_recursive_fibonacci() {
    let src = "var fib = function(x) { if (x == 0) { return 0 } else { if (x == 1) { return 1 } else { fib(x-1) + fib(x-2) } } }; fib(15);";
    assert_both_agree(src, "610");
}

#[test]
fn scenario_4_array_index_assign_and_length() {
    assert_both_agree(r#"var arr = [10]; arr[1] = 90; arr["length"];"#, "2");
}

#[test]
fn scenario_5_dictionary_assign_and_read() {
    assert_both_agree(r#"var d = {"color": "red"}; d["taste"] = "sweet"; d["taste"];"#, "sweet");
}

#[test]
fn scenario_6_for_loop_leaks_induction_variable() {
    assert_both_agree("for (var i = 0; i < 5; i = i + 1) {}; i;", "5");
}

#[test]
fn boundary_i64_max_literal() {
    assert_both_agree("9223372036854775807;", "9223372036854775807");
}

#[test]
fn boundary_empty_array_and_dict() {
    assert_both_agree(r#"[]["length"];"#, "0");
    let (tree_result, vm_result) = run_both("{};");
    assert!(matches!(tree_result, Value::Dictionary(d) if d.borrow().is_empty()));
    assert!(matches!(vm_result, Value::Dictionary(d) if d.borrow().is_empty()));
}

#[test]
fn boundary_negative_and_out_of_range_index_is_null() {
    assert_both_agree("[1,2,3][-1];", "null");
    assert_both_agree("[1,2,3][99];", "null");
}

#[test]
fn boundary_division_by_zero_is_float_infinity() {
    let (tree_result, vm_result) = run_both("1/0;");
    assert!(matches!(tree_result, Value::Float(f) if f.is_infinite()));
    assert!(matches!(vm_result, Value::Float(f) if f.is_infinite()));
}

#[test]
fn partial_eval_is_a_semantic_refinement() {
    let src = "var a = 2 + 3 * 4; a;";
    let mut program = parse(src, "t.js").unwrap();
    let baseline = run_vm(compile(&program, "t.js").unwrap(), "t.js", &mut NullSink).unwrap();
    scriptlang::partial_eval(&mut program);
    let folded = run_vm(compile(&program, "t.js").unwrap(), "t.js", &mut NullSink).unwrap();
    assert_eq!(baseline.to_string(), folded.to_string());
}

#[test]
fn closures_agree_across_backends() {
    let src = "var make_adder = function(x) { return function(y) { return x + y; }; }; var add5 = make_adder(5); add5(10);";
    assert_both_agree(src, "15");
}

#[test]
fn local_reassignment_inside_function_does_not_leak_to_globals() {
    let src = "var a = 1; var f = function(a) { a = a + 1; return a; }; f(10); a;";
    assert_both_agree(src, "1");
}

#[test]
fn bracket_assign_statements_do_not_leak_vm_stack_slots() {
    let src = "var arr = [0]; for (var i = 0; i < 2000; i = i + 1) { arr[0] = i; }; arr[0];";
    assert_both_agree(src, "1999");
}

#[test]
fn mismatched_call_arity_errors_on_both_backends() {
    let src = "var f = function(x,y){ return x+y; }; f(1,2,3);";
    let program = parse(src, "t.js").unwrap();
    assert!(run_tree(&program, "t.js", &mut NullSink).is_err());
    let bytecode = compile(&program, "t.js").unwrap();
    assert!(run_vm(bytecode, "t.js", &mut NullSink).is_err());
}
