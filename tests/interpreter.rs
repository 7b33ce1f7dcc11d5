#[cfg(test)]
mod interpreter_tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use rulox as lox;

    use lox::error::LoxError;
    use lox::interpreter::Interpreter;
    use lox::parser::Parser;
    use lox::resolver::Resolver;
    use lox::scanner::scan;
    use lox::value::Value;

    /// Run `source` through the full pipeline with a captured output sink.
    /// Returns everything `print` wrote plus the interpreter outcome.
    fn run(source: &str) -> (String, Result<(), LoxError>) {
        let tokens = scan(source).expect("scan failed");
        let statements = Parser::new(&tokens).parse().expect("parse failed");
        let locals = Resolver::new().resolve(&statements).expect("resolve failed");

        let sink: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));

        let mut interpreter = Interpreter::with_output(sink.clone());
        interpreter.add_resolutions(locals);

        let result = interpreter.interpret(&statements);
        let output = String::from_utf8(sink.borrow().clone()).unwrap();

        (output, result)
    }

    fn run_ok(source: &str) -> String {
        let (output, result) = run(source);
        result.expect("program was expected to succeed");
        output
    }

    fn run_err(source: &str) -> (String, LoxError) {
        let (output, result) = run(source);
        (output, result.expect_err("program was expected to fail"))
    }

    /// Run only the static stages and return the resolver's rejection.
    fn resolve_err(source: &str) -> LoxError {
        let tokens = scan(source).expect("scan failed");
        let statements = Parser::new(&tokens).parse().expect("parse failed");

        Resolver::new()
            .resolve(&statements)
            .expect_err("resolver was expected to reject this program")
    }

    // ───────────────────────── expressions & scoping ─────────────────────────

    #[test]
    fn test_interp_01_multiplication_binds_tighter_than_addition() {
        assert_eq!(run_ok("print 1 + 2 * 3;"), "7\n");
        assert_eq!(run_ok("print (1 + 2) * 3;"), "9\n");
    }

    #[test]
    fn test_interp_02_block_scoping_shadows_outer_binding() {
        let output = run_ok("var a = 1; { var a = 2; print a; } print a;");

        assert_eq!(output, "2\n1\n");
    }

    #[test]
    fn test_interp_03_string_concatenation() {
        assert_eq!(run_ok("print \"foo\" + \"bar\";"), "foobar\n");
    }

    #[test]
    fn test_interp_04_equality_never_coerces() {
        let output = run_ok(
            "print 1 == 1; \
             print \"1\" == 1; \
             print nil == nil; \
             print nil == false;",
        );

        assert_eq!(output, "true\nfalse\ntrue\nfalse\n");
    }

    #[test]
    fn test_interp_05_truthiness() {
        // Only nil and false are falsy; 0 and "" are truthy.
        let output = run_ok(
            "if (0) print \"zero\"; \
             if (\"\") print \"empty\"; \
             if (nil) print \"nil\"; else print \"no nil\"; \
             if (false) print \"false\"; else print \"no false\";",
        );

        assert_eq!(output, "zero\nempty\nno nil\nno false\n");
    }

    #[test]
    fn test_interp_06_logical_short_circuit_yields_operand() {
        let output = run_ok(
            "print nil or \"fallback\"; \
             print \"first\" or ignored; \
             print nil and ignored; \
             print 1 and 2;",
        );

        // `ignored` is undefined but never evaluated.
        assert_eq!(output, "fallback\nfirst\nnil\n2\n");
    }

    #[test]
    fn test_interp_07_division_follows_host_float_semantics() {
        assert_eq!(run_ok("print 7 / 2;"), "3.5\n");
        assert_eq!(run_ok("print 1 / 0;"), "inf\n");
    }

    // ───────────────────────── functions & closures ──────────────────────────

    #[test]
    fn test_interp_08_factorial_of_ten() {
        let output = run_ok(
            "fun fact(n) { if (n <= 1) return 1; return n * fact(n - 1); } \
             print fact(10);",
        );

        assert_eq!(output, "3628800\n");
    }

    #[test]
    fn test_interp_09_counter_closure_keeps_state() {
        let output = run_ok(
            "fun makeCounter() { \
               var count = 0; \
               fun inc() { count = count + 1; return count; } \
               return inc; \
             } \
             var c = makeCounter(); \
             print c(); print c(); print c();",
        );

        assert_eq!(output, "1\n2\n3\n");
    }

    #[test]
    fn test_interp_10_sibling_closures_share_their_scope() {
        // Two closures born in the same scope alias it: writes through one
        // are visible through the other.
        let output = run_ok(
            "var get; var set; \
             { \
               var shared = 0; \
               fun g() { return shared; } \
               fun s(v) { shared = v; } \
               get = g; set = s; \
             } \
             set(42); \
             print get();",
        );

        assert_eq!(output, "42\n");
    }

    #[test]
    fn test_interp_11_loop_body_closures_capture_per_iteration() {
        // Each iteration's block creates a fresh scope, so each closure sees
        // its own binding, not the loop's final value.
        let output = run_ok(
            "var first; var second; \
             var i = 0; \
             while (i < 2) { \
               var j = i; \
               fun show() { print j; } \
               if (i == 0) first = show; else second = show; \
               i = i + 1; \
             } \
             first(); second();",
        );

        assert_eq!(output, "0\n1\n");
    }

    #[test]
    fn test_interp_12_return_unwinds_to_call_boundary() {
        let output = run_ok(
            "fun find() { \
               var i = 0; \
               while (true) { \
                 if (i == 3) return i; \
                 i = i + 1; \
               } \
             } \
             print find();",
        );

        assert_eq!(output, "3\n");
    }

    #[test]
    fn test_interp_13_bare_return_yields_nil() {
        assert_eq!(run_ok("fun f() { return; } print f();"), "nil\n");
        assert_eq!(run_ok("fun f() { 1 + 1; } print f();"), "nil\n");
    }

    #[test]
    fn test_interp_14_wrong_arity_fails_before_body_runs() {
        let (output, err) = run_err("fun f(a, b) { print \"ran\"; } f(1);");

        // The body's print must not have executed.
        assert_eq!(output, "");
        assert!(err
            .to_string()
            .contains("Expected 2 arguments but got 1"));
    }

    #[test]
    fn test_interp_15_recursion_limit_is_a_runtime_error() {
        let (_, err) = run_err("fun f() { f(); } f();");

        assert!(err.to_string().contains("Stack overflow"));
    }

    // ─────────────────────────── classes & methods ───────────────────────────

    #[test]
    fn test_interp_16_fields_and_methods() {
        let output = run_ok(
            "class Point { \
               init(x, y) { this.x = x; this.y = y; } \
               sum() { return this.x + this.y; } \
             } \
             var p = Point(3, 4); \
             print p.sum(); \
             p.x = 30; \
             print p.sum();",
        );

        assert_eq!(output, "7\n34\n");
    }

    #[test]
    fn test_interp_17_inherited_initializer_sets_fields_through_this() {
        let output = run_ok(
            "class A { init(x) { this.x = x; } } \
             class B < A { } \
             print B(5).x;",
        );

        assert_eq!(output, "5\n");
    }

    #[test]
    fn test_interp_18_initializer_arity_is_enforced_on_the_class() {
        let (output, err) = run_err("class A { init(x) { this.x = x; } } A();");

        assert_eq!(output, "");
        assert!(err
            .to_string()
            .contains("Expected 1 arguments but got 0"));
    }

    #[test]
    fn test_interp_19_bare_return_in_initializer_still_yields_instance() {
        let output = run_ok(
            "class A { init() { this.v = 1; return; this.v = 2; } } \
             print A().v;",
        );

        assert_eq!(output, "1\n");
    }

    #[test]
    fn test_interp_20_method_access_binds_this_each_time() {
        let output = run_ok(
            "class Person { init(n) { this.n = n; } name() { return this.n; } } \
             var m = Person(\"bob\").name; \
             print m();",
        );

        assert_eq!(output, "bob\n");
    }

    #[test]
    fn test_interp_21_super_calls_method_with_current_this() {
        let output = run_ok(
            "class Doughnut { cook() { return \"fry\"; } } \
             class Cruller < Doughnut { \
               cook() { return super.cook() + \" then glaze\"; } \
             } \
             print Cruller().cook();",
        );

        assert_eq!(output, "fry then glaze\n");
    }

    #[test]
    fn test_interp_22_super_starts_one_past_the_defining_class() {
        // `super` in B's method resolves against A even when the runtime
        // receiver is a C, whose own chain starts at C < B.
        let output = run_ok(
            "class A { which() { return \"A\"; } } \
             class B < A { \
               which() { return \"B\"; } \
               test() { return super.which(); } \
             } \
             class C < B { } \
             print C().test();",
        );

        assert_eq!(output, "A\n");
    }

    #[test]
    fn test_interp_23_superclass_must_be_a_class() {
        let (_, err) = run_err("var NotAClass = 1; class Sub < NotAClass { }");

        assert!(err.to_string().contains("Superclass must be a class"));
    }

    // ─────────────────────────── runtime error taxonomy ──────────────────────

    #[test]
    fn test_interp_24_undefined_variable() {
        let (_, err) = run_err("print missing;");

        assert!(err.to_string().contains("Undefined variable 'missing'"));
        assert_eq!(err.exit_code(), 70);
    }

    #[test]
    fn test_interp_25_undefined_property() {
        let (_, err) = run_err("class A { } print A().nope;");

        assert!(err.to_string().contains("Undefined property 'nope'"));
    }

    #[test]
    fn test_interp_26_only_instances_have_properties() {
        let (_, err) = run_err("print \"str\".length;");

        assert!(err.to_string().contains("Only instances have properties"));
    }

    #[test]
    fn test_interp_27_calling_a_non_callable() {
        let (_, err) = run_err("\"not a function\"();");

        assert!(err
            .to_string()
            .contains("Can only call functions and classes"));
    }

    #[test]
    fn test_interp_28_operand_type_errors_name_the_operation() {
        let (_, err) = run_err("print 1 + \"one\";");
        assert!(err
            .to_string()
            .contains("Operands must be two numbers or two strings"));

        let (_, err) = run_err("print -\"one\";");
        assert!(err.to_string().contains("Operand must be a number"));

        let (_, err) = run_err("print 1 < \"two\";");
        assert!(err.to_string().contains("Operands must be numbers"));
    }

    #[test]
    fn test_interp_29_runtime_error_inside_call_unwinds_all_frames() {
        let (output, err) = run_err(
            "fun inner() { return missing; } \
             fun outer() { print \"before\"; return inner(); } \
             outer(); \
             print \"after\";",
        );

        // `before` printed, then the error unwound past both calls and the
        // trailing statement never ran.
        assert_eq!(output, "before\n");
        assert!(err.to_string().contains("Undefined variable 'missing'"));
    }

    // ─────────────────────────── static rejections ───────────────────────────

    #[test]
    fn test_interp_30_self_referential_initializer_is_static_error() {
        // At top level too, not just inside blocks.
        let err = resolve_err("var a = a;");
        assert!(err.to_string().contains("own initializer"));
        assert_eq!(err.exit_code(), 65);

        let err = resolve_err("{ var b = b; }");
        assert!(err.to_string().contains("own initializer"));
    }

    #[test]
    fn test_interp_31_return_outside_function_is_static_error() {
        let err = resolve_err("return 1;");

        assert!(err.to_string().contains("outside of function"));
    }

    #[test]
    fn test_interp_32_this_outside_class_is_static_error() {
        let err = resolve_err("print this;");
        assert!(err.to_string().contains("'this' outside of a class"));

        let err = resolve_err("fun f() { return this; }");
        assert!(err.to_string().contains("'this' outside of a class"));
    }

    #[test]
    fn test_interp_33_super_requires_a_superclass() {
        let err = resolve_err("class A { m() { return super.m(); } }");
        assert!(err
            .to_string()
            .contains("'super' in a class with no superclass"));

        let err = resolve_err("fun f() { return super.m(); }");
        assert!(err.to_string().contains("'super' outside of a class"));
    }

    #[test]
    fn test_interp_34_redeclaration_in_same_scope_is_static_error() {
        let err = resolve_err("{ var a = 1; var a = 2; }");

        assert!(err.to_string().contains("already declared"));
    }

    #[test]
    fn test_interp_35_value_returned_from_initializer_is_static_error() {
        let err = resolve_err("class A { init() { return 1; } }");

        assert!(err.to_string().contains("return a value from an initializer"));
    }

    #[test]
    fn test_interp_36_class_cannot_inherit_from_itself() {
        let err = resolve_err("class A < A { }");

        assert!(err.to_string().contains("cannot inherit from itself"));
    }

    // ─────────────────────────── native injection ────────────────────────────

    fn native_double(args: &[Value]) -> Result<Value, String> {
        match &args[0] {
            Value::Number(n) => Ok(Value::Number(n * 2.0)),
            _ => Err("double expects a number.".to_string()),
        }
    }

    #[test]
    fn test_interp_37_injected_natives_flow_through_the_call_path() {
        let tokens = scan("print double(21); double();").expect("scan failed");
        let statements = Parser::new(&tokens).parse().expect("parse failed");
        let locals = Resolver::new().resolve(&statements).expect("resolve failed");

        let sink: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
        let mut interpreter = Interpreter::with_output(sink.clone());
        interpreter.define_native("double", 1, native_double);
        interpreter.add_resolutions(locals);

        let err = interpreter
            .interpret(&statements)
            .expect_err("second call has wrong arity");

        // First call succeeded through the generic callable path; the
        // second was rejected on arity before the native ran.
        let output = String::from_utf8(sink.borrow().clone()).unwrap();
        assert_eq!(output, "42\n");
        assert!(err.to_string().contains("Expected 1 arguments but got 0"));
    }

    #[test]
    fn test_interp_38_native_failures_become_runtime_errors_with_lines() {
        let tokens = scan("\n\ndouble(\"nope\");").expect("scan failed");
        let statements = Parser::new(&tokens).parse().expect("parse failed");
        let locals = Resolver::new().resolve(&statements).expect("resolve failed");

        let sink: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
        let mut interpreter = Interpreter::with_output(sink.clone());
        interpreter.define_native("double", 1, native_double);
        interpreter.add_resolutions(locals);

        let err = interpreter.interpret(&statements).expect_err("native fails");

        assert!(err.to_string().contains("double expects a number"));
        assert!(err.to_string().contains("[line 3]"));
        assert_eq!(err.exit_code(), 70);
    }
}
