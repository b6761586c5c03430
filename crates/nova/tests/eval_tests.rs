//! End-to-end tests for the expression/statement evaluator: literals,
//! operators, control flow, closures, null safety, pipelines, and tail-call
//! elimination.

use nova::{ErrorKind, Interpreter, Value};
use pretty_assertions::assert_eq;

fn eval(src: &str) -> Value {
    Interpreter::new().eval(src).expect("eval failed")
}

fn eval_err(src: &str) -> nova::NovaError {
    Interpreter::new().eval(src).expect_err("expected an error")
}

// =============================================================================
// 1. Literals, arithmetic, and coercion
// =============================================================================

/// The value of a program is its last expression statement.
#[test]
fn program_value_is_last_expression() {
    assert_eq!(eval("1 + 2"), Value::Int(3));
    assert_eq!(eval("val x = 10\nx * 2"), Value::Int(20));
}

#[test]
fn numeric_promotion_follows_the_lattice() {
    assert_eq!(eval("1 + 2L"), Value::Long(3));
    assert_eq!(eval("1 + 0.5"), Value::Double(1.5));
    assert_eq!(eval("2L * 3"), Value::Long(6));
    assert_eq!(eval("1.5f + 1.5f"), Value::Float(3.0));
}

#[test]
fn int_overflow_widens_to_long() {
    assert_eq!(eval("2147483647 + 1"), Value::Long(2_147_483_648));
}

#[test]
fn integer_division_by_zero_fails() {
    assert_eq!(eval_err("1 / 0").kind, ErrorKind::DivisionByZero);
    assert_eq!(eval_err("5 % 0").kind, ErrorKind::DivisionByZero);
}

#[test]
fn float_division_follows_ieee() {
    assert_eq!(eval("1.0 / 0.0"), Value::Double(f64::INFINITY));
}

#[test]
fn modulo_truncates_toward_zero() {
    assert_eq!(eval("-7 % 3"), Value::Int(-1));
    assert_eq!(eval("7 % -3"), Value::Int(1));
}

/// `Int(3) == Long(3) == Double(3.0)` in the language itself.
#[test]
fn cross_type_numeric_equality() {
    assert_eq!(eval("3 == 3L"), Value::Bool(true));
    assert_eq!(eval("3 == 3.0"), Value::Bool(true));
    assert_eq!(eval("3L == 3.0f"), Value::Bool(true));
    assert_eq!(eval("3 == 3.5"), Value::Bool(false));
}

#[test]
fn string_concatenation_uses_canonical_forms() {
    assert_eq!(eval(r#""n=" + 3"#), Value::from_str_slice("n=3"));
    assert_eq!(eval(r#""v:" + null"#), Value::from_str_slice("v:null"));
    assert_eq!(eval(r#""d:" + 2.0"#), Value::from_str_slice("d:2.0"));
}

// =============================================================================
// 2. Seed scenarios
// =============================================================================

/// Seed 1: classic recursive factorial.
#[test]
fn seed_factorial() {
    let src = "fun fact(n: Int): Int = if (n <= 1) 1 else n * fact(n - 1)\nfact(5)";
    assert_eq!(eval(src), Value::Int(120));
}

/// Seed 2: map literal, lookup, insertion, size.
#[test]
fn seed_map_literal() {
    assert_eq!(eval("val m = #{\"a\": 1, \"b\": 2}\nm[\"b\"]"), Value::Int(2));
    assert_eq!(
        eval("val m = #{\"a\": 1, \"b\": 2}\nm[\"c\"] = 3\nm.size()"),
        Value::Int(3)
    );
}

/// Seed 3: loop over a range accumulating a string.
#[test]
fn seed_range_loop() {
    let src = "var s = \"\"\nfor (i in 1..5) { s = s + i }\ns";
    assert_eq!(eval(src), Value::from_str_slice("12345"));
}

/// Seed 4: try/catch/finally as an expression.
#[test]
fn seed_try_catch() {
    let src = r#"try { throw "boom" } catch (e: Exception) { "caught:" + e } finally {}"#;
    assert_eq!(eval(src), Value::from_str_slice("caught:boom"));
}

/// Seed 6: self-tail-recursion runs in constant frames.
#[test]
fn seed_tail_call_elimination() {
    let src = "fun g(n: Int, acc: Long): Long = if (n == 0) acc else g(n - 1, acc + n)\ng(100000, 0L)";
    assert_eq!(eval(src), Value::Long(5_000_050_000));
}

/// Seed 10: interpolation vs raw strings.
#[test]
fn seed_interpolation() {
    assert_eq!(
        eval("val world = \"Nova\"\n\"hello $world\""),
        Value::from_str_slice("hello Nova")
    );
    assert_eq!(eval(r#"r"$world""#), Value::from_str_slice("$world"));
    assert_eq!(eval("val n = 6\n\"${n * 7}\""), Value::from_str_slice("42"));
}

// =============================================================================
// 3. Control flow
// =============================================================================

#[test]
fn if_is_an_expression() {
    assert_eq!(eval("if (true) 1 else 2"), Value::Int(1));
    assert_eq!(eval("if (false) 1"), Value::Unit);
    assert_eq!(eval("if (1 < 2) \"y\" else \"n\""), Value::from_str_slice("y"));
}

#[test]
fn truthiness_drives_conditions() {
    assert_eq!(eval("if (\"\") 1 else 2"), Value::Int(2));
    assert_eq!(eval("if ([]) 1 else 2"), Value::Int(2));
    assert_eq!(eval("if (0) 1 else 2"), Value::Int(1));
}

#[test]
fn when_without_subject_takes_first_truthy_arm() {
    let src = r#"val x = 7
when {
    x < 5 -> "small"
    x < 10 -> "medium"
    else -> "large"
}"#;
    assert_eq!(eval(src), Value::from_str_slice("medium"));
}

#[test]
fn when_with_subject_supports_all_arm_forms() {
    let src = r#"fun classify(x: Any): String = when (x) {
    1, 2 -> "one-or-two"
    in 3..9 -> "digit"
    is String -> "text"
    else -> "other"
}
classify(2) + " " + classify(5) + " " + classify("hi") + " " + classify(99)"#;
    assert_eq!(eval(src), Value::from_str_slice("one-or-two digit text other"));
}

#[test]
fn when_binds_its_subject() {
    let src = r#"when (val r = 6 * 7) {
    in 0..10 -> "small " + r
    else -> "big " + r
}"#;
    assert_eq!(eval(src), Value::from_str_slice("big 42"));
}

#[test]
fn while_with_break_and_continue() {
    let src = r"var sum = 0
var i = 0
while (true) {
    i = i + 1
    if (i > 10) { break }
    if (i % 2 == 0) { continue }
    sum = sum + i
}
sum";
    assert_eq!(eval(src), Value::Int(25));
}

#[test]
fn for_iterates_lists_strings_and_map_entries() {
    assert_eq!(eval("var n = 0\nfor (x in [1, 2, 3]) { n = n + x }\nn"), Value::Int(6));
    assert_eq!(
        eval("var s = \"\"\nfor (c in \"abc\") { s = s + c }\ns"),
        Value::from_str_slice("abc")
    );
    let src = r#"val m = #{"a": 1, "b": 2}
var s = ""
for ((k, v) in m.entries()) { s = s + k + v }
s"#;
    assert_eq!(eval(src), Value::from_str_slice("a1b2"));
}

#[test]
fn ternary_is_lazy_and_right_associative() {
    assert_eq!(eval("true ? 1 : 2"), Value::Int(1));
    assert_eq!(eval("false ? 1 : true ? 2 : 3"), Value::Int(2));
    // the untaken branch must not evaluate
    assert_eq!(eval("true ? 1 : 1 / 0"), Value::Int(1));
}

/// finally runs exactly once on every exit path.
#[test]
fn finally_runs_on_all_paths() {
    let src = r#"var log = ""
fun f(mode: Int): String {
    try {
        if (mode == 0) { return "ret" }
        if (mode == 1) { throw "up" }
        "norm"
    } catch (e: Exception) {
        "caught"
    } finally {
        log = log + "F"
    }
}
f(0)
f(1)
f(2)
log"#;
    assert_eq!(eval(src), Value::from_str_slice("FFF"));
}

#[test]
fn finally_throw_supersedes_inflight_error() {
    let src = r#"try { throw "first" } catch (e: DivisionByZero) { "no" } finally { throw "second" }"#;
    let err = eval_err(src);
    assert_eq!(err.message, "second");
}

#[test]
fn catch_arms_match_by_kind_name() {
    let src = r#"try { 1 / 0 } catch (e: DivisionByZero) { "div" } catch (e: Exception) { "other" }"#;
    assert_eq!(eval(src), Value::from_str_slice("div"));
}

#[test]
fn uncaught_errors_carry_the_call_stack() {
    let src = "fun boom() { throw \"kaboom\" }\nfun outer() { boom() }\nouter()";
    let err = eval_err(src);
    assert_eq!(err.message, "kaboom");
    let formatted = err.format_with_stack();
    assert!(formatted.contains("Call Stack:"), "got: {formatted}");
    assert!(formatted.contains("at boom("), "got: {formatted}");
    assert!(formatted.contains("at outer("), "got: {formatted}");
}

// =============================================================================
// 4. Bindings, closures, destructuring
// =============================================================================

#[test]
fn val_cannot_be_reassigned() {
    let err = eval_err("val x = 1\nx = 2");
    assert!(err.message.contains("Cannot reassign val"));
}

#[test]
fn duplicate_definition_fails_in_batch_mode() {
    assert_eq!(eval_err("val x = 1\nval x = 2").kind, ErrorKind::AlreadyDefined);
}

/// A lambda captures the live binding, not a copy.
#[test]
fn closures_capture_by_reference() {
    let src = r"var count = 0
val incr = { count = count + 1 }
incr()
incr()
incr()
count";
    assert_eq!(eval(src), Value::Int(3));
}

#[test]
fn destructuring_lists_and_skipping() {
    assert_eq!(eval("val (a, _, c) = [1, 2, 3]\na + c"), Value::Int(4));
}

#[test]
fn over_destructuring_fails() {
    let err = eval_err("val (a, b, c) = [1, 2]");
    assert!(err.message.contains("destructure"));
}

#[test]
fn destructuring_pairs() {
    assert_eq!(eval("val (k, v) = \"a\" to 1\nk + v"), Value::from_str_slice("a1"));
}

#[test]
fn guard_let_binds_or_exits() {
    let src = r#"fun f(x: Any): String {
    guard let v = x else { return "missing" }
    "got " + v
}
f(5) + "/" + f(null)"#;
    assert_eq!(eval(src), Value::from_str_slice("got 5/missing"));
}

#[test]
fn if_let_binds_when_non_null() {
    let src = r#"fun f(x: Any): String = if let v = x { "some " + v } else { "none" }
f(1) + "/" + f(null)"#;
    assert_eq!(eval(src), Value::from_str_slice("some 1/none"));
}

// =============================================================================
// 5. Null safety
// =============================================================================

#[test]
fn safe_call_short_circuits() {
    assert_eq!(eval("null?.anything()"), Value::Null);
    assert_eq!(eval("null?.field"), Value::Null);
    assert_eq!(eval("null?[0]"), Value::Null);
    assert_eq!(eval("\"abc\"?.length()"), Value::Int(3));
}

#[test]
fn elvis_takes_rhs_only_on_null() {
    assert_eq!(eval("null ?: 5"), Value::Int(5));
    assert_eq!(eval("3 ?: 5"), Value::Int(3));
    // falsy-but-non-null values stay
    assert_eq!(eval("0 ?: 5"), Value::Int(0));
}

#[test]
fn elvis_rhs_may_throw() {
    let err = eval_err(r#"val v = null ?: throw "none""#);
    assert_eq!(err.message, "none");
}

#[test]
fn null_coalescing_assignment() {
    assert_eq!(eval("var x = null\nx ??= 5\nx"), Value::Int(5));
    assert_eq!(eval("var x = 1\nx ??= 5\nx"), Value::Int(1));
}

#[test]
fn postfix_question_propagates_null() {
    let src = r#"fun inner(x: Any): Any = x
fun outer(x: Any): Any {
    val v = inner(x)?
    "got " + v
}
outer(null)"#;
    assert_eq!(eval(src), Value::Null);
}

#[test]
fn postfix_question_propagates_err_and_unwraps_ok() {
    let src = r#"fun half(n: Int): Result = if (n % 2 == 0) Ok(n / 2) else Err("odd")
fun quarter(n: Int): Result {
    val h = half(n)?
    half(h)
}
quarter(8).unwrap()"#;
    assert_eq!(eval(src), Value::Int(2));

    let src = r#"fun half(n: Int): Result = if (n % 2 == 0) Ok(n / 2) else Err("odd")
fun quarter(n: Int): Result {
    val h = half(n)?
    half(h)
}
quarter(5).isErr()"#;
    assert_eq!(eval(src), Value::Bool(true));
}

// =============================================================================
// 6. Result and Pair
// =============================================================================

/// `Ok(x).map(f).unwrap() == f(x)`; `Err(e).map(f) == Err(e)`.
#[test]
fn result_monad_laws() {
    assert_eq!(eval("Ok(2).map({ x -> x * 10 }).unwrap()"), Value::Int(20));
    assert_eq!(eval("Err(\"e\").map({ x -> x * 10 }).isErr()"), Value::Bool(true));
    assert_eq!(eval("Err(\"e\").unwrapOr(7)"), Value::Int(7));
}

#[test]
fn unwrapping_err_raises() {
    assert_eq!(eval_err("Err(\"boom\").unwrap()").kind, ErrorKind::UnwrapError);
}

#[test]
fn run_catching_wraps_outcomes() {
    assert_eq!(eval("runCatching({ 6 * 7 }).unwrap()"), Value::Int(42));
    assert_eq!(eval("runCatching({ throw \"x\" }).isErr()"), Value::Bool(true));
}

#[test]
fn pair_access_and_indexing() {
    assert_eq!(eval("val p = Pair(1, 2)\np.first + p.second"), Value::Int(3));
    assert_eq!(eval("val p = \"a\" to \"b\"\np[0] + p[1]"), Value::from_str_slice("ab"));
}

// =============================================================================
// 7. Collections and ranges
// =============================================================================

#[test]
fn list_methods_cover_the_spec_table() {
    assert_eq!(eval("[1, 2, 3].map({ x -> x * 2 }).sum()"), Value::Int(12));
    assert_eq!(eval("[1, 2, 3, 4].filter({ x -> x % 2 == 0 }).size()"), Value::Int(2));
    assert_eq!(eval("[3, 1, 2].sorted()"), eval("[1, 2, 3]"));
    assert_eq!(eval("[1, 2, 2, 3].distinct().size()"), Value::Int(3));
    assert_eq!(eval("[1, 2, 3].reduce(0, { acc, x -> acc + x })"), Value::Int(6));
    assert_eq!(eval("[1, 2, 3].joinToString(\"-\")"), Value::from_str_slice("1-2-3"));
    assert_eq!(eval("[1, 2, 3].any({ x -> x > 2 })"), Value::Bool(true));
    assert_eq!(eval("[1, 2, 3].all({ x -> x > 0 })"), Value::Bool(true));
    assert_eq!(eval("[1, 2, 3].none({ x -> x > 5 })"), Value::Bool(true));
    assert_eq!(eval("[1, 2, 3].reversed()"), eval("[3, 2, 1]"));
    assert_eq!(eval("[1, 2, 3].take(2)"), eval("[1, 2]"));
    assert_eq!(eval("[1, 2, 3].drop(2)"), eval("[3]"));
    assert_eq!(eval("[1, 2].zip([\"a\", \"b\"]).size()"), Value::Int(2));
    assert_eq!(eval("[1, 2, 3].find({ x -> x > 1 })"), Value::Int(2));
    assert_eq!(eval("[1, 2, 3].count({ x -> x > 1 })"), Value::Int(2));
    assert_eq!(eval("[[1, 2], [3]].flatMap({ x -> x })"), eval("[1, 2, 3]"));
    assert_eq!(eval("[1, 2].forEach({ x -> x })"), Value::Unit);
}

#[test]
fn trailing_lambdas_on_collection_methods() {
    assert_eq!(eval("[1, 2, 3].map { it * it }.last()"), Value::Int(9));
}

#[test]
fn negative_indexing_and_slicing() {
    assert_eq!(eval("[10, 20, 30][-1]"), Value::Int(30));
    assert_eq!(eval("val l = [1, 2, 3, 4, 5]\nl[1..3]"), eval("[2, 3, 4]"));
    assert_eq!(eval("val l = [1, 2, 3, 4, 5]\nl[1..<3]"), eval("[2, 3]"));
    assert_eq!(eval("val l = [1, 2, 3, 4, 5]\nl[..1]"), eval("[1, 2]"));
    assert_eq!(eval("val l = [1, 2, 3, 4, 5]\nl[3..]"), eval("[4, 5]"));
    assert_eq!(eval_err("[1, 2][5]").kind, ErrorKind::IndexOutOfBounds);
}

#[test]
fn string_indexing_and_slicing() {
    assert_eq!(eval("\"hello\"[0]"), Value::Char('h'));
    assert_eq!(eval("\"hello\"[-1]"), Value::Char('o'));
    assert_eq!(eval("\"hello\"[1..3]"), Value::from_str_slice("ell"));
}

#[test]
fn map_missing_key_fails_but_get_returns_null() {
    assert_eq!(eval_err("#{\"a\": 1}[\"b\"]").kind, ErrorKind::KeyNotFound);
    assert_eq!(eval("#{\"a\": 1}.get(\"b\")"), Value::Null);
    assert_eq!(eval("#{\"a\": 1}.getOrDefault(\"b\", 9)"), Value::Int(9));
}

#[test]
fn ranges_are_sized_iterable_and_o1_contains() {
    assert_eq!(eval("(1..5).size()"), Value::Int(5));
    assert_eq!(eval("(1..<5).size()"), Value::Int(4));
    assert_eq!(eval("3 in 1..5"), Value::Bool(true));
    assert_eq!(eval("5 in 1..<5"), Value::Bool(false));
    assert_eq!(eval("6 !in 1..5"), Value::Bool(true));
    assert_eq!(eval("(1..4).toList()"), eval("[1, 2, 3, 4]"));
    assert_eq!(eval("(1..3).map({ x -> x * x })"), eval("[1, 4, 9]"));
}

#[test]
fn spread_unpacks_into_calls_and_literals() {
    let src = "fun sum3(a: Int, b: Int, c: Int) = a + b + c\nval xs = [1, 2, 3]\nsum3(*xs)";
    assert_eq!(eval(src), Value::Int(6));
    assert_eq!(eval("val xs = [2, 3]\n[1, *xs, 4].size()"), Value::Int(4));
}

#[test]
fn typed_arrays_have_per_type_defaults() {
    assert_eq!(eval("Array<Int>(3)[0]"), Value::Int(0));
    assert_eq!(eval("Array<String>(2)[1]"), Value::from_str_slice(""));
    assert_eq!(eval("Array<Bool>(1)[0]"), Value::Bool(false));
    assert_eq!(eval("val a = Array<Int>(3)\na[1] = 7\na[1]"), Value::Int(7));
    assert_eq!(eval("Array<Int>(4) { it * it }[3]"), Value::Int(9));
}

// =============================================================================
// 8. Strings
// =============================================================================

#[test]
fn string_methods_cover_the_spec_table() {
    assert_eq!(eval("\"héllo\".length()"), Value::Int(5));
    assert_eq!(eval("\"abc\".toUpperCase()"), Value::from_str_slice("ABC"));
    assert_eq!(eval("\"AbC\".toLowerCase()"), Value::from_str_slice("abc"));
    assert_eq!(eval("\"hello\".contains(\"ell\")"), Value::Bool(true));
    assert_eq!(eval("\"hello\".startsWith(\"he\")"), Value::Bool(true));
    assert_eq!(eval("\"hello\".endsWith(\"lo\")"), Value::Bool(true));
    assert_eq!(eval("\"hello\".indexOf(\"ll\")"), Value::Int(2));
    assert_eq!(eval("\"hello\".substring(1, 3)"), Value::from_str_slice("el"));
    assert_eq!(eval("\"hello\".substring(2)"), Value::from_str_slice("llo"));
    assert_eq!(eval("\"a-b-c\".replace(\"-\", \"+\")"), Value::from_str_slice("a+b+c"));
    assert_eq!(eval("\"  x  \".trim()"), Value::from_str_slice("x"));
    assert_eq!(eval("\"a,b,c\".split(\",\").size()"), Value::Int(3));
    assert_eq!(eval("\"ab\".repeat(3)"), Value::from_str_slice("ababab"));
    assert_eq!(eval("\"7\".padStart(3, '0')"), Value::from_str_slice("007"));
    assert_eq!(eval("\"7\".padEnd(3)"), Value::from_str_slice("7  "));
    assert_eq!(eval("\"42\".toInt()"), Value::Int(42));
    assert_eq!(eval("\"2.5\".toDouble()"), Value::Double(2.5));
}

#[test]
fn string_comparison_is_lexicographic() {
    assert_eq!(eval("\"abc\" < \"abd\""), Value::Bool(true));
    assert_eq!(eval("\"b\" > \"a\""), Value::Bool(true));
}

#[test]
fn incomparable_operands_fail() {
    assert_eq!(eval_err("[1] < [2]").kind, ErrorKind::IncomparableOperands);
}

// =============================================================================
// 9. Pipelines, partials, chained comparison, scope functions
// =============================================================================

#[test]
fn pipelines_thread_values() {
    let src = "fun double(x: Int) = x * 2\nfun inc(x: Int) = x + 1\n5 |> double |> inc";
    assert_eq!(eval(src), Value::Int(11));
}

#[test]
fn pipeline_placeholder_selects_the_slot() {
    let src = "fun sub(a: Int, b: Int) = a - b\n10 |> sub(100, _)";
    assert_eq!(eval(src), Value::Int(90));
}

#[test]
fn partial_application_builds_smaller_functions() {
    let src = "fun add(a: Int, b: Int) = a + b\nval add10 = add(10, _)\nadd10(5)";
    assert_eq!(eval(src), Value::Int(15));
    let src = "fun add3(a: Int, b: Int, c: Int) = a + b + c\nval f = add3(1, _, _)\nf(2, 3)";
    assert_eq!(eval(src), Value::Int(6));
}

#[test]
fn chained_comparison_expands_with_single_evaluation() {
    assert_eq!(eval("1 < 2 < 3"), Value::Bool(true));
    assert_eq!(eval("1 < 2 < 2"), Value::Bool(false));
    // the middle operand evaluates exactly once
    let src = r"var hits = 0
fun mid(): Int {
    hits = hits + 1
    2
}
val ok = 1 < mid() < 3
hits";
    assert_eq!(eval(src), Value::Int(1));
}

#[test]
fn scope_functions_follow_their_conventions() {
    assert_eq!(eval("5.let { it + 1 }"), Value::Int(6));
    assert_eq!(eval("5.also { it + 1 }"), Value::Int(5));
    assert_eq!(eval("\"abc\".run { this.length() }"), Value::Int(3));
    assert_eq!(eval("\"abc\".apply { this.length() }"), Value::from_str_slice("abc"));
    assert_eq!(eval("10.takeIf { it > 5 }"), Value::Int(10));
    assert_eq!(eval("3.takeIf { it > 5 }"), Value::Null);
    assert_eq!(eval("3.takeUnless { it > 5 }"), Value::Int(3));
}

#[test]
fn method_references_dispatch_through_the_receiver() {
    let src = "val f = String::length\nf(\"hello\")";
    assert_eq!(eval(src), Value::Int(5));
    let src = "fun triple(x: Int) = x * 3\nval g = ::triple\ng(7)";
    assert_eq!(eval(src), Value::Int(21));
}

// =============================================================================
// 10. Tail-call machinery and recursion limits
// =============================================================================

/// Deep non-tail recursion trips the recursion budget instead of smashing the
/// host stack; the limit error is uncatchable.
#[test]
fn non_tail_recursion_hits_the_recursion_limit() {
    use nova::{Budgets, SecurityPolicy};
    let policy = SecurityPolicy::unrestricted().with_budgets(Budgets {
        max_recursion_depth: Some(200),
        ..Budgets::unlimited()
    });
    let src = r#"fun down(n: Int): Int = if (n == 0) 0 else 1 + down(n - 1)
try { down(100000) } catch (e: Exception) { "swallowed" }"#;
    let err = Interpreter::with_policy(policy).eval(src).expect_err("expected an error");
    assert_eq!(err.kind, ErrorKind::RecursionLimit);
}

#[test]
fn tail_recursion_in_when_arms() {
    let src = r"fun count(n: Int, acc: Int): Int = when {
    n == 0 -> acc
    else -> count(n - 1, acc + 1)
}
count(50000, 0)";
    assert_eq!(eval(src), Value::Int(50_000));
}

#[test]
fn inc_dec_rewrite_bindings() {
    assert_eq!(eval("var i = 0\ni++\n++i\ni"), Value::Int(2));
    assert_eq!(eval("var i = 5\nval old = i--\nold - i"), Value::Int(1));
}

// =============================================================================
// 11. MIR precompilation
// =============================================================================

#[test]
fn precompiled_mir_round_trips_and_executes() {
    let mut interp = Interpreter::new();
    let mir = interp
        .precompile_to_mir("fun add(a: Int, b: Int) = a + b\nadd(20, 22)")
        .unwrap();
    let bytes = mir.dump().unwrap();
    let restored = nova::Mir::load(&bytes).unwrap();
    assert_eq!(interp.execute_mir(&restored).unwrap(), Value::Int(42));
}

#[test]
fn stdout_goes_through_the_sink() {
    use nova::CollectSink;
    let mut interp = Interpreter::new();
    let out = CollectSink::new();
    interp.set_stdout(out.clone());
    interp.eval("println(\"a\", 1)\nprint(\"b\")").unwrap();
    assert_eq!(out.output(), "a 1\nb");
}

#[test]
fn read_line_pulls_from_the_input_source() {
    use nova::QueuedInput;
    let mut interp = Interpreter::new();
    interp.set_stdin(QueuedInput::new(["first", "second"]));
    assert_eq!(interp.eval("readLine()").unwrap(), Value::from_str_slice("first"));
    assert_eq!(interp.eval("readLine()").unwrap(), Value::from_str_slice("second"));
    assert_eq!(interp.eval("readLine()").unwrap(), Value::Null);
}
