//! Quantified invariants, round-trip properties, and boundary conditions,
//! driven end to end through the interpreter rather than against individual
//! modules (the arithmetic-kernel invariants like overflow fallback and
//! division-by-zero tagging already have direct unit coverage in
//! `number.rs` and aren't repeated here).

use rossa::{Interpreter, Value};

fn is_integer(v: &Value) -> bool {
    matches!(v, Value::Number(n) if n.is_integer())
}

fn num(v: &Value) -> f64 {
    match v {
        Value::Number(n) => n.as_f64(),
        other => panic!("expected a Number, got {other:?}"),
    }
}

// =============================================================================
// Overload stability
// =============================================================================

/// Whichever fixed-arity overload scores strictly highest for a call site
/// wins regardless of how many lower-scoring overloads were declared
/// around it, and in what order.
#[test]
fn highest_scoring_overload_wins_regardless_of_declaration_order() {
    let mut interp = Interpreter::without_stdlib();
    interp
        .run(
            "<test>",
            r#"
            def g(x) -> "any";
            def g(x: Number) -> "num";
            def g(x: String) -> "str";
            "#,
        )
        .unwrap();
    assert!(interp.run("<test>", "g(1);").unwrap().value_eq(&Value::string("num")));
    assert!(interp.run("<test>", "g(\"x\");").unwrap().value_eq(&Value::string("str")));
}

// =============================================================================
// Deep copy vs const aliasing (§3.2 invariants 3-4)
// =============================================================================

#[test]
fn plain_var_assignment_of_an_array_deep_copies() {
    let mut interp = Interpreter::without_stdlib();
    let v = interp
        .run(
            "<test>",
            r#"
            var a = [1, 2, 3];
            var b = a;
            b[0] = 99;
            a[0];
            "#,
        )
        .unwrap();
    assert_eq!(num(&v), 1.0);
}

#[test]
fn const_declared_source_is_aliased_through_a_plain_rebinding() {
    let mut interp = Interpreter::without_stdlib();
    let v = interp
        .run(
            "<test>",
            r#"
            a := [1, 2, 3];
            var b = a;
            b[0] = 99;
            a[0];
            "#,
        )
        .unwrap();
    assert_eq!(num(&v), 99.0);
}

// =============================================================================
// Inheritance extension and dispatch (§3.3, §4.8)
// =============================================================================

#[test]
fn subclass_instance_satisfies_a_parent_typed_parameter() {
    let mut interp = Interpreter::without_stdlib();
    interp
        .run(
            "<test>",
            r#"
            struct A {}
            struct B : A {}
            def f(x: A) -> "matched-A";
            def f(x) -> "fallback";
            var b = new B();
            "#,
        )
        .unwrap();
    assert!(interp.run("<test>", "f(b);").unwrap().value_eq(&Value::string("matched-A")));
}

// =============================================================================
// Deleter runs exactly once (§3.3, §5)
// =============================================================================

#[test]
fn deleter_fires_exactly_once_when_the_instance_is_dropped() {
    let mut interp = Interpreter::without_stdlib();
    let v = interp
        .run(
            "<test>",
            r#"
            var log = [0];
            struct Noisy {
                def rem() { log[0] = log[0] + 1; }
            }
            if (true) {
                var n = new Noisy();
            }
            log[0];
            "#,
        )
        .unwrap();
    assert_eq!(num(&v), 1.0);
}

// =============================================================================
// Loop hygiene and return semantics (§3.3, §4.5)
// =============================================================================

#[test]
fn for_loop_variable_does_not_leak_past_the_loop() {
    let mut interp = Interpreter::without_stdlib();
    interp.run("<test>", "for (i in [1, 2, 3]) { var seen = i; }").unwrap();
    assert!(interp.run("<test>", "seen;").is_err());
    assert!(interp.run("<test>", "i;").is_err());
}

#[test]
fn return_inside_a_loop_exits_the_enclosing_function_only() {
    let mut interp = Interpreter::without_stdlib();
    let v = interp
        .run(
            "<test>",
            r#"
            def firstOver(xs, limit) {
                for (x in xs) {
                    if (x > limit) { return x; }
                }
                return nil;
            }
            firstOver([1, 2, 3, 4, 5], 3);
            "#,
        )
        .unwrap();
    assert_eq!(num(&v), 4.0);
}

// =============================================================================
// Round-trip / idempotence (§8.2)
// =============================================================================

#[test]
fn integer_number_survives_a_tostring_then_parse_round_trip() {
    let mut interp = Interpreter::without_stdlib();
    let v = interp.run("<test>", "parse(42 -> String);").unwrap();
    assert!(is_integer(&v));
    assert_eq!(num(&v), 42.0);
}

#[test]
fn char_code_then_char_string_round_trips() {
    let mut interp = Interpreter::without_stdlib();
    let v = interp.run("<test>", r#"chars(codes("Q"));"#).unwrap();
    assert!(v.value_eq(&Value::string("Q")));
}

#[test]
fn parsing_a_printed_array_of_pure_values_reproduces_an_equal_array() {
    let mut interp = Interpreter::without_stdlib();
    let v = interp
        .run(
            "<test>",
            r#"
            var original = [1, 2, 3];
            parse(original -> String);
            "#,
        )
        .unwrap();
    let Value::Array(items) = v else { panic!("expected an Array, got {v:?}") };
    let got: Vec<f64> = items.borrow().iter().map(num).collect();
    assert_eq!(got, vec![1.0, 2.0, 3.0]);
}

// =============================================================================
// Boundary conditions (§8.3)
// =============================================================================

#[test]
fn indexing_at_length_is_out_of_bounds() {
    let mut interp = Interpreter::without_stdlib();
    assert!(interp.run("<test>", "var a = [1, 2, 3]; a[3];").is_err());
}

/// No overload exists for the arity called with — the resolve table has
/// nothing to offer, fixed-arity or varargs — and the call throws rather
/// than silently coercing arguments.
#[test]
fn calling_with_an_arity_no_overload_covers_throws_no_overload() {
    let mut interp = Interpreter::without_stdlib();
    interp.run("<test>", "def h() -> 1;").unwrap();
    let err = interp.run("<test>", "h(1, 2);").unwrap_err();
    assert!(err.message.contains("no overload"), "unexpected message: {}", err.message);
}

#[test]
fn switch_with_no_matching_case_and_no_else_yields_nil() {
    let mut interp = Interpreter::without_stdlib();
    let v = interp
        .run(
            "<test>",
            r#"
            switch 5 of {
                case 1: "one";
                case 2: "two";
            }
            "#,
        )
        .unwrap();
    assert!(matches!(v, Value::Nil));
}

#[test]
fn division_by_zero_is_positive_infinity_end_to_end() {
    let mut interp = Interpreter::without_stdlib();
    let v = interp.run("<test>", "1 / 0;").unwrap();
    assert!(num(&v).is_infinite() && num(&v) > 0.0);
}
