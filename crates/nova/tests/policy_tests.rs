//! Security policy enforcement: budgets, stdio gating, host-class access,
//! and the uncatchability of policy errors.

use std::time::Duration;

use nova::{Budgets, ErrorKind, Interpreter, SecurityPolicy, Value};
use pretty_assertions::assert_eq;

// =============================================================================
// 1. Budgets
// =============================================================================

#[test]
fn loop_budget_is_enforced_and_uncatchable() {
    let policy = SecurityPolicy::unrestricted().with_budgets(Budgets {
        max_loop_iterations: Some(100),
        ..Budgets::unlimited()
    });
    let mut interp = Interpreter::with_policy(policy);
    let src = r#"try { while (true) { 1 } } catch (e: Exception) { "swallowed" }"#;
    let err = interp.eval(src).expect_err("the loop budget must trip");
    assert_eq!(err.kind, ErrorKind::LoopLimit);
}

#[test]
fn loop_budget_spans_nested_loops() {
    let policy = SecurityPolicy::unrestricted().with_budgets(Budgets {
        max_loop_iterations: Some(50),
        ..Budgets::unlimited()
    });
    let mut interp = Interpreter::with_policy(policy);
    let src = "for (i in 1..10) { for (j in 1..10) { i + j } }";
    assert_eq!(interp.eval(src).unwrap_err().kind, ErrorKind::LoopLimit);
}

#[test]
fn wall_clock_timeout_is_polled_at_loop_heads() {
    let policy = SecurityPolicy::unrestricted().with_budgets(Budgets {
        max_execution_time: Some(Duration::from_millis(30)),
        ..Budgets::unlimited()
    });
    let mut interp = Interpreter::with_policy(policy);
    let err = interp
        .eval("var i = 0\nwhile (true) { i = i + 1 }")
        .expect_err("the deadline must trip");
    assert_eq!(err.kind, ErrorKind::Timeout);
}

#[test]
fn budgets_reset_between_evals() {
    let policy = SecurityPolicy::unrestricted().with_budgets(Budgets {
        max_loop_iterations: Some(100),
        ..Budgets::unlimited()
    });
    let mut interp = Interpreter::with_policy(policy);
    for _ in 0..3 {
        // each outermost eval gets a fresh counter
        assert_eq!(
            interp.eval("var n = 0\nfor (i in 1..50) { n = n + 1 }\nn").unwrap(),
            Value::Int(50)
        );
    }
}

#[test]
fn recursion_budget_comes_from_the_policy() {
    let policy = SecurityPolicy::unrestricted().with_budgets(Budgets {
        max_recursion_depth: Some(16),
        ..Budgets::unlimited()
    });
    let mut interp = Interpreter::with_policy(policy);
    let err = interp
        .eval("fun f(n: Int): Int = if (n == 0) 0 else 1 + f(n - 1)\nf(100)")
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::RecursionLimit);
}

// =============================================================================
// 2. Stdio gating
// =============================================================================

#[test]
fn stdio_builtins_are_unregistered_when_denied() {
    let mut interp = Interpreter::with_policy(SecurityPolicy::unrestricted().without_stdio());
    let err = interp.eval("println(\"hi\")").unwrap_err();
    assert_eq!(err.kind, ErrorKind::UndefinedVariable);
    let err = interp.eval("readLine()").unwrap_err();
    assert_eq!(err.kind, ErrorKind::UndefinedVariable);
}

#[test]
fn strict_policy_keeps_stdio() {
    let mut interp = Interpreter::with_policy(SecurityPolicy::strict());
    let out = nova::CollectSink::new();
    interp.set_stdout(out.clone());
    interp.eval("println(\"sandboxed\")").unwrap();
    assert_eq!(out.output(), "sandboxed\n");
}

// =============================================================================
// 3. Host-class access
// =============================================================================

/// Seed 7: STANDARD denies Runtime but allows collections.
#[test]
fn standard_policy_gates_host_classes() {
    let mut interp = Interpreter::with_policy(SecurityPolicy::standard());
    let err = interp.eval("Java.type(\"java.lang.Runtime\")").unwrap_err();
    assert_eq!(err.kind, ErrorKind::SecurityDenied);
    assert!(err.message.contains("Security denied"), "got: {}", err.message);

    let ok = interp.eval("Java.type(\"java.util.ArrayList\")").unwrap();
    assert!(matches!(ok, Value::External(_)));
}

#[test]
fn standard_policy_denies_listed_methods() {
    let mut interp = Interpreter::with_policy(SecurityPolicy::standard());
    let err = interp
        .eval("Java.static(\"java.lang.System\", \"exit\", 0)")
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::SecurityDenied);
    // an un-denied method on the same class passes the gate
    let ok = interp
        .eval("Java.static(\"java.lang.System\", \"currentTimeMillis\")")
        .unwrap();
    assert!(matches!(ok, Value::Long(_)));
}

#[test]
fn strict_policy_disables_interop_entirely() {
    let mut interp = Interpreter::with_policy(SecurityPolicy::strict());
    // the Java namespace itself is not installed without interop
    let err = interp.eval("Java.type(\"java.util.ArrayList\")").unwrap_err();
    assert_eq!(err.kind, ErrorKind::UndefinedVariable);
}

#[test]
fn security_errors_bypass_user_catch() {
    let mut interp = Interpreter::with_policy(SecurityPolicy::standard());
    let src = r#"try { Java.type("java.lang.Runtime") } catch (e: Exception) { "caught" }"#;
    let err = interp.eval(src).expect_err("policy errors are uncatchable");
    assert_eq!(err.kind, ErrorKind::SecurityDenied);
}

// =============================================================================
// 4. Policy bundle queries
// =============================================================================

#[test]
fn policy_query_surface() {
    let policy = SecurityPolicy::standard();
    assert!(policy.is_class_allowed("java.util.HashMap"));
    assert!(!policy.is_class_allowed("java.io.File"));
    assert!(!policy.is_method_allowed("java.lang.System", "loadLibrary"));
    assert!(policy.is_method_allowed("java.lang.Math", "sqrt"));
}
