//! Tests for the class/object/enum system: instantiation order,
//! inheritance, companions, visibility, annotation macros, extensions, and
//! operator overloads.

use nova::{ErrorKind, Interpreter, Value};
use pretty_assertions::assert_eq;

fn eval(src: &str) -> Value {
    Interpreter::new().eval(src).expect("eval failed")
}

fn eval_err(src: &str) -> nova::NovaError {
    Interpreter::new().eval(src).expect_err("expected an error")
}

// =============================================================================
// 1. Declaration and instantiation
// =============================================================================

#[test]
fn primary_constructor_binds_fields() {
    let src = "class Point(val x: Int, val y: Int)\nval p = Point(3, 4)\np.x * 100 + p.y";
    assert_eq!(eval(src), Value::Int(304));
}

#[test]
fn constructor_defaults_and_named_arguments() {
    let src = r#"class Config(val host: String = "localhost", val port: Int = 80)
val c = Config(port = 8080)
c.host + ":" + c.port"#;
    assert_eq!(eval(src), Value::from_str_slice("localhost:8080"));
}

#[test]
fn constructor_arity_mismatch_fails() {
    let src = "class Point(val x: Int, val y: Int)\nPoint(1)";
    assert_eq!(eval_err(src).kind, ErrorKind::ConstructorArgMismatch);
}

/// Property initialisers and init blocks run in lexical order; a property
/// declared before an init block is visible inside it.
#[test]
fn initializers_run_in_lexical_order() {
    let src = r#"var order = ""
class C(val seed: Int) {
    val a = seed + 1
    init { order = order + "first:" + a }
    val b = a * 10
    init { order = order + " second:" + b }
}
C(1)
order"#;
    assert_eq!(eval(src), Value::from_str_slice("first:2 second:20"));
}

#[test]
fn secondary_constructor_delegates_then_runs_its_body() {
    let src = r#"class Rect(val w: Int, val h: Int) {
    var label = "rect"
    constructor(size: Int) : this(size, size) { label = "square" }
}
val r = Rect(5)
"" + (r.w * r.h) + " " + r.label"#;
    assert_eq!(eval(src), Value::from_str_slice("25 square"));
}

#[test]
fn methods_see_fields_through_implicit_this() {
    let src = r"class Counter(var n: Int) {
    fun bump() { n = n + 1 }
    fun twice() { bump()
 bump() }
    fun value() = n
}
val c = Counter(5)
c.twice()
c.value()";
    assert_eq!(eval(src), Value::Int(7));
}

// =============================================================================
// 2. Inheritance and interfaces
// =============================================================================

#[test]
fn subclass_inherits_and_overrides() {
    let src = r#"open class Animal(val name: String) {
    fun greet(): String = "I am " + name
    fun sound(): String = "..."
}
class Dog(name: String) : Animal(name) {
    override fun sound(): String = "woof"
}
val d = Dog("Rex")
d.greet() + " " + d.sound()"#;
    assert_eq!(eval(src), Value::from_str_slice("I am Rex woof"));
}

#[test]
fn super_calls_reach_the_parent_implementation() {
    let src = r#"open class Base {
    fun describe(): String = "base"
}
class Derived : Base() {
    override fun describe(): String = super.describe() + "+derived"
}
Derived().describe()"#;
    assert_eq!(eval(src), Value::from_str_slice("base+derived"));
}

#[test]
fn interface_default_methods_apply() {
    let src = r#"interface Greeter {
    fun name(): String
    fun greet(): String = "hello " + name()
}
class Person(val n: String) : Greeter {
    override fun name(): String = n
}
Person("Ada").greet()"#;
    assert_eq!(eval(src), Value::from_str_slice("hello Ada"));
}

#[test]
fn unimplemented_interface_member_blocks_instantiation() {
    let src = r"interface Greeter {
    fun name(): String
}
class Silent : Greeter
Silent()";
    assert_eq!(eval_err(src).kind, ErrorKind::AbstractInstantiation);
}

#[test]
fn abstract_classes_cannot_be_instantiated() {
    let src = "abstract class Shape\nShape()";
    assert_eq!(eval_err(src).kind, ErrorKind::AbstractInstantiation);
}

#[test]
fn is_checks_cover_the_hierarchy() {
    let src = r"interface Shape
open class Figure
class Circle : Figure(), Shape
val c = Circle()
(c is Circle) && (c is Figure) && (c is Shape) && (c !is String)";
    assert_eq!(eval(src), Value::Bool(true));
}

/// Sealed classes reject cross-unit subclassing in batch mode.
#[test]
fn sealed_subclassing_is_confined_to_the_unit() {
    let mut interp = Interpreter::new();
    interp
        .eval("sealed class Expr\nclass Lit(val v: Int) : Expr()")
        .expect("same-unit subclassing must work");
    let err = interp
        .eval("class Neg(val e: Int) : Expr()")
        .expect_err("cross-unit subclassing must fail");
    assert_eq!(err.kind, ErrorKind::SealedSubclass);
}

// =============================================================================
// 3. Visibility
// =============================================================================

#[test]
fn private_members_are_sealed_off() {
    let src = r"class Safe(private val secret: Int) {
    fun reveal() = secret
}
Safe(42).secret";
    assert_eq!(eval_err(src).kind, ErrorKind::VisibilityError);

    let src = r"class Safe(private val secret: Int) {
    fun reveal() = secret
}
Safe(42).reveal()";
    assert_eq!(eval(src), Value::Int(42));
}

#[test]
fn private_methods_are_only_callable_internally() {
    let src = r"class Machine {
    private fun step() = 1
    fun run() = step() + step()
}
Machine().run()";
    assert_eq!(eval(src), Value::Int(2));

    let src = r"class Machine {
    private fun step() = 1
}
Machine().step()";
    assert_eq!(eval_err(src).kind, ErrorKind::VisibilityError);
}

#[test]
fn protected_members_open_to_subclasses() {
    let src = r"open class Base {
    protected fun core() = 9
}
class Sub : Base() {
    fun use() = core()
}
Sub().use()";
    assert_eq!(eval(src), Value::Int(9));
}

// =============================================================================
// 4. Companions, objects, enums
// =============================================================================

#[test]
fn companion_members_resolve_via_the_class_name() {
    let src = r"class Point(val x: Int, val y: Int) {
    companion object {
        val zero = 0
        fun origin() = Point(zero, zero)
    }
}
val o = Point.origin()
o.x + o.y";
    assert_eq!(eval(src), Value::Int(0));
}

#[test]
fn objects_are_lazy_singletons() {
    let src = r"var inits = 0
object Registry {
    val stamp = { inits = inits + 1
 inits }()
}
val a = Registry
val b = Registry
inits";
    assert_eq!(eval(src), Value::Int(1));
}

#[test]
fn object_identity_is_stable() {
    let src = "object Single\nSingle == Single";
    assert_eq!(eval(src), Value::Bool(true));
}

#[test]
fn enums_expose_name_ordinal_values_and_value_of() {
    let src = "enum class Color(val rgb: Int) { RED(1), GREEN(2), BLUE(4) }\nColor.GREEN.name";
    assert_eq!(eval(src), Value::from_str_slice("GREEN"));
    let src = "enum class Color(val rgb: Int) { RED(1), GREEN(2), BLUE(4) }\nColor.BLUE.ordinal";
    assert_eq!(eval(src), Value::Int(2));
    let src = "enum class Color(val rgb: Int) { RED(1), GREEN(2), BLUE(4) }\nColor.values().size()";
    assert_eq!(eval(src), Value::Int(3));
    let src = "enum class Color(val rgb: Int) { RED(1), GREEN(2), BLUE(4) }\nColor.valueOf(\"RED\").rgb";
    assert_eq!(eval(src), Value::Int(1));
    let src = "enum class Color { RED }\nColor.valueOf(\"PINK\")";
    assert_eq!(eval_err(src).kind, ErrorKind::NoSuchEnumEntry);
}

// =============================================================================
// 5. Annotation macros
// =============================================================================

/// Seed 5: @data synthesis of copy + componentN.
#[test]
fn data_classes_get_copy_and_components() {
    let src = "@data class P(val x: Int, val y: Int)\nval (a, b) = P(3, 4).copy(x = 10)\na * 100 + b";
    assert_eq!(eval(src), Value::Int(1004));
}

#[test]
fn data_class_sugar_matches_the_annotation() {
    let src = "data class P(val x: Int, val y: Int)\nval (a, b) = P(3, 4)\na + b";
    assert_eq!(eval(src), Value::Int(7));
}

#[test]
fn data_classes_compare_structurally() {
    let src = "@data class P(val x: Int, val y: Int)\nP(1, 2) == P(1, 2)";
    assert_eq!(eval(src), Value::Bool(true));
    let src = "@data class P(val x: Int, val y: Int)\nP(1, 2) == P(1, 3)";
    assert_eq!(eval(src), Value::Bool(false));
    // non-data instances compare by identity
    let src = "class Q(val x: Int)\nQ(1) == Q(1)";
    assert_eq!(eval(src), Value::Bool(false));
}

#[test]
fn data_class_to_string_is_structural() {
    let src = "@data class P(val x: Int, val y: Int)\n\"\" + P(1, 2)";
    assert_eq!(eval(src), Value::from_str_slice("P(x=1, y=2)"));
}

#[test]
fn builder_macro_generates_a_fluent_companion_builder() {
    let src = r#"@builder class User(val name: String = "", val age: Int = 0)
val u = User.builder().name("Ada").age(36).build()
u.name + ":" + u.age"#;
    assert_eq!(eval(src), Value::from_str_slice("Ada:36"));
}

#[test]
fn custom_annotation_processors_run_once_at_declaration() {
    use std::sync::{Arc as StdArc, Mutex};
    let seen: StdArc<Mutex<Vec<(String, Option<Value>)>>> = StdArc::new(Mutex::new(Vec::new()));
    let record = StdArc::clone(&seen);
    let mut interp = Interpreter::new();
    interp.register_annotation_processor(
        "table",
        StdArc::new(move |_interp, class, args| {
            record
                .lock()
                .unwrap()
                .push((class.name.to_string(), args.get("name").cloned()));
            Ok(())
        }),
    );
    interp
        .eval("annotation class table(val name: String)\n@table(name = \"users\") class User(val id: Int)\nUser(1)\nUser(2)")
        .unwrap();
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1, "processor must run once per declaration, not per instance");
    assert_eq!(seen[0].0, "User");
    assert_eq!(seen[0].1, Some(Value::from_str_slice("users")));
}

#[test]
fn annotation_classes_cannot_be_instantiated() {
    let src = "annotation class tag(val name: String)\ntag(\"x\")";
    assert_eq!(eval_err(src).kind, ErrorKind::AbstractInstantiation);
}

// =============================================================================
// 6. Extensions, operators, receiver lambdas
// =============================================================================

#[test]
fn extension_functions_dispatch_on_the_receiver_type() {
    let src = "fun Int.doubled() = this * 2\n21.doubled()";
    assert_eq!(eval(src), Value::Int(42));
    let src = "fun String.shout() = this.toUpperCase() + \"!\"\n\"hey\".shout()";
    assert_eq!(eval(src), Value::from_str_slice("HEY!"));
}

/// An extension shadows a built-in only at the same arity.
#[test]
fn extension_shadowing_is_arity_exact() {
    let src = "fun String.length() = 99\n\"abc\".length()";
    assert_eq!(eval(src), Value::Int(99));
    // different arity: the built-in zero-arg version still works
    let src = "fun String.length(bonus: Int) = 100 + bonus\n\"abc\".length() + \"abc\".length(1)";
    assert_eq!(eval(src), Value::Int(104));
}

#[test]
fn extension_properties_compute_from_this() {
    let src = "val String.head get() = this[0]\n\"nova\".head";
    assert_eq!(eval(src), Value::Char('n'));
}

#[test]
fn extensions_apply_to_user_classes() {
    let src = "class Box(val v: Int)\nfun Box.unwrapped() = this.v\nBox(8).unwrapped()";
    assert_eq!(eval(src), Value::Int(8));
}

#[test]
fn operator_overloads_route_through_methods() {
    let src = r"class Vec(val x: Int, val y: Int) {
    fun plus(o: Vec) = Vec(x + o.x, y + o.y)
    fun times(k: Int) = Vec(x * k, y * k)
    fun unaryMinus() = Vec(0 - x, 0 - y)
}
val v = (Vec(1, 2) + Vec(3, 4)) * 2
val n = -v
n.x * 1000 + n.y";
    assert_eq!(eval(src), Value::Int(-8012));
}

#[test]
fn compare_to_drives_ordering_operators() {
    let src = r"class Money(val cents: Int) {
    fun compareTo(o: Money): Int = cents - o.cents
}
(Money(100) < Money(200)) && (Money(300) >= Money(300))";
    assert_eq!(eval(src), Value::Bool(true));
}

#[test]
fn get_set_and_invoke_operators() {
    let src = r"class Grid {
    val cells = #{}
    fun get(i: Int) = cells.getOrDefault(i, 0)
    fun set(i: Int, v: Int) { cells.set(i, v) }
    fun invoke(i: Int) = get(i) * 10
}
val g = Grid()
g[3] = 7
g[3] + g(3)";
    assert_eq!(eval(src), Value::Int(77));
}

#[test]
fn contains_operator_backs_in() {
    let src = r"class Evens {
    fun contains(x: Int) = x % 2 == 0
}
(4 in Evens()) && (3 !in Evens())";
    assert_eq!(eval(src), Value::Bool(true));
}

#[test]
fn user_receiver_lambdas_bind_this() {
    let src = "val describe = { \"len=\" + this.length() }\n\"hello\".describe()";
    assert_eq!(eval(src), Value::from_str_slice("len=5"));
}

// =============================================================================
// 7. Reified type parameters and casts
// =============================================================================

#[test]
fn reified_type_params_bind_per_call_site() {
    let src = "inline fun <reified T> isA(x: Any) = x is T\n\"\" + isA<Int>(3) + \" \" + isA<String>(3)";
    assert_eq!(eval(src), Value::from_str_slice("true false"));
}

#[test]
fn reified_class_literal_names_the_type() {
    let src = "inline fun <reified T> typeName(): String = \"\" + T::class\ntypeName<String>()";
    assert_eq!(eval(src), Value::from_str_slice("String"));
}

#[test]
fn casts_assert_and_safe_casts_null_out() {
    assert_eq!(eval("val x: Any = \"s\"\nx as String"), Value::from_str_slice("s"));
    assert_eq!(eval_err("\"s\" as List").kind, ErrorKind::CastError);
    assert_eq!(eval("\"s\" as? List"), Value::Null);
    assert_eq!(eval("3 as Double"), Value::Double(3.0));
    assert_eq!(eval("3.9 as Int"), Value::Int(3));
}

#[test]
fn class_of_returns_a_reflection_handle() {
    let src = "class Widget\nval w = Widget()\n\"\" + classOf(w)";
    assert_eq!(eval(src), Value::from_str_slice("<class Widget>"));
    assert_eq!(eval("classOf(3)"), Value::from_str_slice("Int"));
}
