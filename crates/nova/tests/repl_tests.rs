//! REPL-mode semantics: persistence across lines, redefinition, bare
//! expressions, and the differences from batch mode.

use nova::{ErrorKind, Interpreter, Value};
use pretty_assertions::assert_eq;

// =============================================================================
// 1. Persistence
// =============================================================================

/// Variables defined in one line persist to the next.
#[test]
fn bindings_persist_across_lines() {
    let mut interp = Interpreter::new();
    interp.eval_repl("val a = 10").unwrap();
    interp.eval_repl("val b = 20").unwrap();
    assert_eq!(interp.eval_repl("a + b").unwrap(), Value::Int(30));
}

/// A function defined in one line can be called in a later line.
#[test]
fn functions_persist_across_lines() {
    let mut interp = Interpreter::new();
    interp.eval_repl("fun double(n: Int) = n * 2").unwrap();
    assert_eq!(interp.eval_repl("double(21)").unwrap(), Value::Int(42));
}

#[test]
fn classes_persist_across_lines() {
    let mut interp = Interpreter::new();
    interp.eval_repl("class Point(val x: Int, val y: Int)").unwrap();
    assert_eq!(interp.eval_repl("Point(3, 4).x").unwrap(), Value::Int(3));
}

// =============================================================================
// 2. Redefinition
// =============================================================================

/// REPL mode overwrites user bindings in place; batch mode rejects them.
#[test]
fn repl_permits_redefinition_batch_does_not() {
    let mut interp = Interpreter::new();
    interp.eval_repl("val x = 1").unwrap();
    interp.eval_repl("val x = 2").unwrap();
    assert_eq!(interp.eval_repl("x").unwrap(), Value::Int(2));

    let mut batch = Interpreter::new();
    batch.eval("val y = 1").unwrap();
    // the second batch eval still targets the same globals
    assert_eq!(batch.eval("val y = 2").unwrap_err().kind, ErrorKind::AlreadyDefined);
}

#[test]
fn repl_can_change_mutability_on_redefinition() {
    let mut interp = Interpreter::new();
    interp.eval_repl("val x = 1").unwrap();
    interp.eval_repl("var x = 5").unwrap();
    interp.eval_repl("x = 6").unwrap();
    assert_eq!(interp.eval_repl("x").unwrap(), Value::Int(6));
}

/// Sealed subclassing across lines is tolerated in REPL mode (batch mode
/// rejects it; see the class tests).
#[test]
fn repl_allows_cross_line_sealed_subclassing() {
    let mut interp = Interpreter::new();
    interp.eval_repl("sealed class Node").unwrap();
    interp.eval_repl("class Leaf : Node()").unwrap();
    assert_eq!(interp.eval_repl("Leaf() is Node").unwrap(), Value::Bool(true));
}

// =============================================================================
// 3. Bare expressions and state
// =============================================================================

#[test]
fn bare_expressions_return_their_value() {
    let mut interp = Interpreter::new();
    assert_eq!(interp.eval_repl("1 + 2").unwrap(), Value::Int(3));
    assert_eq!(interp.eval_repl("\"a\" + \"b\"").unwrap(), Value::from_str_slice("ab"));
}

#[test]
fn statements_return_unit() {
    let mut interp = Interpreter::new();
    assert_eq!(interp.eval_repl("val q = 1").unwrap(), Value::Unit);
}

#[test]
fn repl_mode_flag_controls_eval_behaviour() {
    let mut interp = Interpreter::new();
    interp.set_repl_mode(true);
    interp.eval("val x = 1").unwrap();
    interp.eval("val x = 2").unwrap();
    assert_eq!(interp.eval("x").unwrap(), Value::Int(2));
}

#[test]
fn globals_are_inspectable_by_the_embedder() {
    let mut interp = Interpreter::new();
    interp.eval_repl("val answer = 42").unwrap();
    assert_eq!(interp.globals().get("answer").unwrap(), Value::Int(42));
}

#[test]
fn mutating_state_accumulates_across_lines() {
    let mut interp = Interpreter::new();
    interp.eval_repl("var total = 0").unwrap();
    for i in 1..=5 {
        interp.eval_repl(&format!("total = total + {i}")).unwrap();
    }
    assert_eq!(interp.eval_repl("total").unwrap(), Value::Int(15));
}
