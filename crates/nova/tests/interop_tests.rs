//! Host-interop bridge: class handles, statics, fields, bean-style member
//! access, SAM conversion, marshalling, and cause preservation.

use std::sync::Arc;

use nova::{ErrorKind, EvalResult, HostClass, Interpreter, Value};
use pretty_assertions::assert_eq;

fn eval(src: &str) -> Value {
    Interpreter::new().eval(src).expect("eval failed")
}

// =============================================================================
// 1. Class handles and construction
// =============================================================================

#[test]
fn java_type_returns_a_callable_class_handle() {
    let src = r#"val ArrayList = Java.type("java.util.ArrayList")
val list = ArrayList()
list.add(1)
list.add(2)
list.size()"#;
    assert_eq!(eval(src), Value::Int(2));
}

#[test]
fn java_new_is_the_one_step_shortcut() {
    let src = r#"val sb = Java.new("java.lang.StringBuilder", "a")
sb.append("b")
sb.toString()"#;
    assert_eq!(eval(src), Value::from_str_slice("ab"));
}

#[test]
fn java_static_and_field() {
    assert_eq!(
        eval(r#"Java.static("java.lang.Math", "max", 3, 5)"#),
        Value::Int(5)
    );
    assert_eq!(
        eval(r#"Java.field("java.lang.Integer", "MAX_VALUE")"#),
        Value::Int(i32::MAX)
    );
    assert_eq!(
        eval(r#"Java.static("java.lang.Integer", "parseInt", "123")"#),
        Value::Int(123)
    );
}

#[test]
fn java_class_alias_matches_java_type() {
    let src = r#"val handle = javaClass("java.lang.Math")
handle.sqrt(16.0)"#;
    assert_eq!(eval(src), Value::Double(4.0));
}

#[test]
fn missing_host_class_is_a_host_error() {
    let mut interp = Interpreter::new();
    let err = interp.eval(r#"Java.type("com.example.Nope")"#).unwrap_err();
    assert_eq!(err.kind, ErrorKind::HostError);
}

// =============================================================================
// 2. Member access
// =============================================================================

/// `.field` tries `getField()`/`isField()` before the direct field.
#[test]
fn bean_style_member_reads() {
    let src = r#"val list = Java.new("java.util.ArrayList")
list.empty"#;
    assert_eq!(eval(src), Value::Bool(true));
}

#[test]
fn static_fields_read_through_the_handle() {
    let src = r#"val Math = Java.type("java.lang.Math")
Math.PI > 3.14"#;
    assert_eq!(eval(src), Value::Bool(true));
}

#[test]
fn host_methods_resolve_with_widening() {
    // Int arguments widen to the double-typed host parameters
    assert_eq!(eval(r#"Java.static("java.lang.Math", "pow", 2, 10)"#), Value::Double(1024.0));
}

// =============================================================================
// 3. Auto-import
// =============================================================================

/// `java.lang` simple names resolve without an import when interop is on.
#[test]
fn java_lang_is_visible_by_simple_name() {
    assert_eq!(eval("Math.sqrt(25.0)"), Value::Double(5.0));
    assert_eq!(eval("Integer.parseInt(\"7\")"), Value::Int(7));
}

/// The auto-import never shadows Nova's own top-level builtins.
#[test]
fn auto_import_does_not_shadow_builtins() {
    // `abs` is a Nova builtin returning Int for Int input; the host Math.abs
    // would produce a Double
    assert_eq!(eval("abs(-3)"), Value::Int(3));
}

// =============================================================================
// 4. SAM conversion
// =============================================================================

#[test]
fn lambdas_convert_to_single_method_interfaces() {
    let src = r#"var hits = 0
val r = { hits = hits + 1 } as Runnable
r.run()
r.run()
hits"#;
    assert_eq!(eval(src), Value::Int(2));
}

#[test]
fn sam_conversion_passes_arguments_through() {
    let src = r#"val f = { x -> x + 1 } as java.util.function.Function
f.apply(41)"#;
    assert_eq!(eval(src), Value::Int(42));
}

#[test]
fn safe_cast_to_non_sam_interface_yields_null() {
    assert_eq!(eval("val f = { 1 } as? java.util.ArrayList\nf"), Value::Null);
}

// =============================================================================
// 5. Errors and causes
// =============================================================================

/// Host-side failures surface as HostError and keep the original cause.
#[test]
fn host_exception_cause_is_preserved() {
    let mut interp = Interpreter::new();
    let err = interp
        .eval(r#"Java.static("java.lang.Integer", "parseInt", "not-a-number")"#)
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::HostError);
    assert!(err.cause.is_some(), "the host cause must be preserved");
    let source = std::error::Error::source(&err).expect("source chains to the host exception");
    assert!(source.to_string().contains("parseInt"));
}

#[test]
fn host_errors_are_catchable_user_side() {
    let src = r#"try { Java.static("java.lang.Integer", "parseInt", "zz") } catch (e: Exception) { "recovered" }"#;
    assert_eq!(eval(src), Value::from_str_slice("recovered"));
}

// =============================================================================
// 6. Embedder-registered classes and natives
// =============================================================================

#[derive(Debug)]
struct TicketCounter;

impl HostClass for TicketCounter {
    fn fqn(&self) -> &str {
        "com.example.Tickets"
    }

    fn invoke_static(&self, method: &str, args: &[Value], _interp: &mut Interpreter) -> Option<EvalResult<Value>> {
        match method {
            "issue" => {
                let seed = args.first().and_then(|v| v.as_long().ok()).unwrap_or(0);
                Some(Ok(Value::from_i64(seed + 1000)))
            }
            _ => None,
        }
    }
}

#[test]
fn embedder_host_classes_join_the_registry() {
    let mut interp = Interpreter::new();
    interp.register_host_class(Arc::new(TicketCounter));
    assert_eq!(
        interp
            .eval(r#"Java.static("com.example.Tickets", "issue", 7)"#)
            .unwrap(),
        Value::Long(1007)
    );
}

#[test]
fn registered_natives_are_plain_globals() {
    let mut interp = Interpreter::new();
    interp.register_native("triple", Some(1), |_, args| {
        let n = args.positional.first().cloned().unwrap_or(Value::Null).as_long()?;
        Ok(Value::from_i64(n * 3))
    });
    assert_eq!(interp.eval("triple(14)").unwrap(), Value::Long(42));
}

#[test]
fn natives_can_call_back_into_nova() {
    let mut interp = Interpreter::new();
    interp.register_native("applyTwice", Some(2), |interp, args| {
        let f = args.positional.first().cloned().unwrap_or(Value::Null);
        let x = args.positional.get(1).cloned().unwrap_or(Value::Null);
        let once = interp.call_function(f.clone(), vec![x])?;
        interp.call_function(f, vec![once])
    });
    assert_eq!(
        interp.eval("applyTwice({ n -> n * 10 }, 4)").unwrap(),
        Value::Int(400)
    );
}
