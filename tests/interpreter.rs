#[cfg(test)]
mod interpreter_tests {
    use std::cell::RefCell;
    use std::io::{self, Write};
    use std::rc::Rc;

    use rox::error::{ErrorKind, LoxError};
    use rox::interpreter::{Interpreter, InterpreterConfig};
    use rox::{Lox, Value};

    /// Output sink shared between the interpreter and the test.
    #[derive(Clone, Default)]
    struct Captured(Rc<RefCell<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.borrow().clone())
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    fn session(config: InterpreterConfig) -> (Lox, Captured) {
        let out = Captured::default();
        let interpreter = Interpreter::with_output(Box::new(out.clone())).with_config(config);
        (Lox::with_interpreter(interpreter), out)
    }

    fn run(source: &str) -> Vec<String> {
        let (mut lox, out) = session(InterpreterConfig::default());
        if let Err(e) = lox.run(source) {
            panic!("program failed: {}", e);
        }
        out.lines()
    }

    fn run_err(source: &str) -> LoxError {
        let (mut lox, _) = session(InterpreterConfig::default());
        lox.run(source).unwrap_err()
    }

    fn eval(source: &str) -> Value {
        let (mut lox, _) = session(InterpreterConfig::default());
        lox.run(source).unwrap().expect("a lone expression yields a value")
    }

    #[test]
    fn test_arithmetic_and_number_display() {
        assert_eq!(eval("1 + 2 * 3").to_string(), "7");
        assert_eq!(eval("(1 + 2) * 3").to_string(), "9");
        assert_eq!(eval("10 / 4").to_string(), "2.5");
        assert_eq!(eval("-(3 - 5)").to_string(), "2");
        assert_eq!(eval("1 / 0").to_string(), "Infinity");
        assert_eq!(eval("-1 / 0").to_string(), "-Infinity");
        assert_eq!(eval("0 / 0").to_string(), "NaN");
    }

    #[test]
    fn test_comparison_and_equality() {
        assert_eq!(eval("1 < 2"), Value::Bool(true));
        assert_eq!(eval("2 <= 1"), Value::Bool(false));
        assert_eq!(eval("\"a\" < \"b\""), Value::Bool(true));
        assert_eq!(eval("1 == 1"), Value::Bool(true));
        assert_eq!(eval("nil == nil"), Value::Bool(true));
        assert_eq!(eval("1 == \"1\""), Value::Bool(false));
        assert_eq!(eval("\"x\" != \"x\""), Value::Bool(false));
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(
            eval("\"foo\" + \"bar\""),
            Value::String("foobar".to_string())
        );
    }

    #[test]
    fn test_mixed_plus_is_a_runtime_error() {
        let err = run_err("print 1 + \"a\";");

        assert_eq!(err.kind(), ErrorKind::Runtime);
        assert_eq!(
            err.to_string(),
            "[line 1] Runtime error: Operands of '+' must be two numbers or two strings."
        );
    }

    #[test]
    fn test_operand_type_errors() {
        assert_eq!(
            run_err("-\"a\";").to_string(),
            "[line 1] Runtime error: Operand of '-' must be a number."
        );
        assert_eq!(
            run_err("print 2 * nil;").to_string(),
            "[line 1] Runtime error: Operands of '*' must be numbers."
        );
        assert_eq!(
            run_err("\"a\"();").to_string(),
            "[line 1] Runtime error: Can only call functions and classes."
        );
        assert_eq!(
            run_err("print undefined;").to_string(),
            "[line 1] Runtime error: Undefined variable 'undefined'."
        );
    }

    #[test]
    fn test_truthiness_and_logical_operators() {
        assert_eq!(eval("!nil"), Value::Bool(true));
        assert_eq!(eval("!0"), Value::Bool(false));
        assert_eq!(eval("!\"\""), Value::Bool(false));
        assert_eq!(eval("nil or \"yes\""), Value::String("yes".to_string()));
        assert_eq!(eval("1 and 2"), Value::Number(2.0));
        assert_eq!(eval("false and undefined"), Value::Bool(false));
        assert_eq!(eval("true or undefined"), Value::Bool(true));
    }

    #[test]
    fn test_block_scoping_shadows_and_restores() {
        let output = run("var a = 1; { var a = 2; print a; } print a;");
        assert_eq!(output, ["2", "1"]);
    }

    #[test]
    fn test_control_flow() {
        let output = run(
            "var total = 0;
             for (var i = 0; i < 5; i = i + 1) {
               if (i == 2) total = total + 10; else total = total + i;
             }
             print total;
             var n = 3;
             while (n > 0) n = n - 1;
             print n;",
        );
        assert_eq!(output, ["18", "0"]);
    }

    #[test]
    fn test_closures_keep_independent_state() {
        let output = run(
            "fun makeCounter() {
               var count = 0;
               fun counter() { count = count + 1; return count; }
               return counter;
             }
             var a = makeCounter();
             var b = makeCounter();
             print a();
             print a();
             print b();
             print a();",
        );
        assert_eq!(output, ["1", "2", "1", "3"]);
    }

    #[test]
    fn test_closure_binding_is_static() {
        let output = run(
            "var a = \"global\";
             {
               fun show() { print a; }
               show();
               var a = \"block\";
               show();
             }",
        );
        assert_eq!(output, ["global", "global"]);
    }

    #[test]
    fn test_recursion_and_return() {
        let output = run(
            "fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); }
             print fib(15);",
        );
        assert_eq!(output, ["610"]);
    }

    #[test]
    fn test_callable_display_and_arity() {
        let output = run(
            "fun f(a, b) {}
             class C {}
             print f;
             print C;
             print C();
             print clock;",
        );
        assert_eq!(output, ["<fn f>", "<class C>", "<instance of C>", "<native fn clock>"]);

        let err = run_err("fun f(a, b) {} f(1);");
        assert_eq!(
            err.to_string(),
            "[line 1] Runtime error: Expected 2 arguments but got 1."
        );
    }

    #[test]
    fn test_fields_and_methods() {
        let output = run(
            "class Point {
               init(x, y) { this.x = x; this.y = y; }
               sum() { return this.x + this.y; }
             }
             var p = Point(2, 3);
             print p.sum();
             p.x = 10;
             var m = p.sum;
             print m();",
        );
        assert_eq!(output, ["5", "13"]);

        assert_eq!(
            run_err("class A {} A().missing;").to_string(),
            "[line 1] Runtime error: Undefined property 'missing'."
        );
        assert_eq!(
            run_err("var x = 1; x.y = 2;").to_string(),
            "[line 1] Runtime error: Only instances have fields."
        );
        assert_eq!(
            run_err("var s = \"text\"; print s.length;").to_string(),
            "[line 1] Runtime error: Only instances have properties."
        );
    }

    #[test]
    fn test_initializer_returns_this() {
        let output = run(
            "class A {
               init() { this.v = 1; return; }
             }
             var a = A();
             a.v = 2;
             print a.init() == a;
             print a.v;",
        );
        assert_eq!(output, ["true", "1"]);
    }

    #[test]
    fn test_super_dispatch_keeps_this() {
        let output = run(
            "class A {
               name() { return \"A\"; }
               describe() { return \"I am \" + this.name(); }
             }
             class B < A {
               name() { return \"B\"; }
               describe() { return super.describe() + \"!\"; }
             }
             print B().describe();",
        );
        assert_eq!(output, ["I am B!"]);
    }

    #[test]
    fn test_inherited_initializer() {
        let output = run(
            "class A { init(v) { this.v = v; } }
             class B < A {}
             print B(7).v;",
        );
        assert_eq!(output, ["7"]);

        assert_eq!(
            run_err("var NotAClass = 1; class B < NotAClass {}").to_string(),
            "[line 1] Runtime error: Superclass must be a class."
        );
    }

    #[test]
    fn test_session_continues_after_runtime_error() {
        let (mut lox, out) = session(InterpreterConfig::default());

        assert!(lox.run("var x = 1;").unwrap().is_none());

        let err = lox.run("print x + nil;").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Runtime);

        assert_eq!(lox.run("x + 1").unwrap(), Some(Value::Number(2.0)));
        lox.run("fun twice(n) { return n * 2; }").unwrap();
        lox.run("print twice(x);").unwrap();

        assert_eq!(out.lines(), ["2"]);
    }

    #[test]
    fn test_session_rejects_static_errors_without_running() {
        let (mut lox, out) = session(InterpreterConfig::default());

        let err = lox.run("print \"before\"; return 1;").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Static);
        assert!(out.lines().is_empty());

        let err = lox.run("print (;").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
    }

    #[test]
    fn test_deep_recursion_reports_stack_overflow() {
        let (mut lox, _) = session(InterpreterConfig { max_call_depth: 32 });
        assert_eq!(lox.interpreter().config().max_call_depth, 32);

        let err = lox
            .run("fun down(n) { return down(n + 1); } down(0);")
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Runtime);
        assert_eq!(err.to_string(), "[line 1] Runtime error: Stack overflow.");

        // The limit is per run; a shallow call works afterwards.
        lox.run("fun one() { return 1; }").unwrap();
        assert_eq!(lox.run("one()").unwrap(), Some(Value::Number(1.0)));
    }

    #[test]
    fn test_host_functions_can_be_registered() {
        let (mut lox, out) = session(InterpreterConfig::default());

        lox.interpreter()
            .define_native("double", 1, |args: &[Value]| match &args[0] {
                Value::Number(n) => Ok(Value::Number(n * 2.0)),
                other => Err(format!("Cannot double {}.", other.type_name())),
            });

        lox.run("print double(21);").unwrap();
        assert_eq!(out.lines(), ["42"]);

        let err = lox.run("double(\"x\");").unwrap_err();
        assert_eq!(
            err.to_string(),
            "[line 1] Runtime error: Cannot double string."
        );
    }

    #[test]
    fn test_globals_visible_through_interpreter() {
        let (mut lox, _) = session(InterpreterConfig::default());

        lox.run("var answer = 40 + 2;").unwrap();
        assert_eq!(lox.interpreter().global("answer"), Some(Value::Number(42.0)));
        assert_eq!(lox.interpreter().global("missing"), None);
    }

    #[test]
    fn test_value_equality_is_identity_for_objects() {
        let output = run(
            "class A {}
             var a = A();
             var b = A();
             var c = a;
             print a == b;
             print a == c;
             fun f() {}
             print f == f;",
        );
        assert_eq!(output, ["false", "true", "true"]);
    }

    #[test]
    fn test_run_file_executes_a_whole_program() {
        let path = std::env::temp_dir().join(format!("rox-run-file-{}.lox", std::process::id()));
        std::fs::write(&path, "var greeting = \"hello\";\nprint greeting + \" world\";\n").unwrap();

        let (mut lox, out) = session(InterpreterConfig::default());
        let result = lox.run_file(&path);
        std::fs::remove_file(&path).unwrap();

        assert!(result.unwrap().is_none());
        assert_eq!(out.lines(), ["hello world"]);

        let err = lox.run_file(std::env::temp_dir().join("rox-no-such-file.lox")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_call_depth_limit_holds_for_nested_bodies() {
        let (mut lox, out) = session(InterpreterConfig::default());

        lox.run(
            "fun f(n) {
               if (n > 0) { while (true) { { { return f(n - 1) + 0; } } } }
               return 0;
             }",
        )
        .unwrap();

        lox.run("print f(250);").unwrap();
        assert_eq!(out.lines(), ["0"]);

        // Reported at the innermost call, on the body's second line.
        let err = lox.run("print f(300);").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Runtime);
        assert_eq!(err.to_string(), "[line 2] Runtime error: Stack overflow.");

        lox.run("print f(10);").unwrap();
        assert_eq!(out.lines(), ["0", "0"]);
    }

    #[test]
    fn test_session_survives_excessive_nesting() {
        let (mut lox, out) = session(InterpreterConfig::default());

        let parens = format!("{}1{}", "(".repeat(50_000), ")".repeat(50_000));
        let err = lox.run(&parens).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert!(err.to_string().ends_with("Too much nesting."));

        let sum = format!("print 1{};", " + 1".repeat(200_000));
        let err = lox.run(&sum).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert_eq!(err.errors().len(), 1);

        let nested = format!("{}2{}", "(".repeat(200), ")".repeat(200));
        assert_eq!(lox.run(&nested).unwrap(), Some(Value::Number(2.0)));

        lox.run("print \"still here\";").unwrap();
        assert_eq!(out.lines(), ["still here"]);
    }

    #[test]
    fn test_top_level_annotations_are_released() {
        let (mut lox, out) = session(InterpreterConfig::default());

        lox.run("fun add(a, b) { var sum = a + b; return sum; }").unwrap();
        let retained = lox.interpreter().resolved_bindings();
        assert!(retained > 0);

        for _ in 0..50 {
            lox.run("{ var x = 1; { var y = x + 1; print add(x, y); } }")
                .unwrap();
            lox.run("for (var i = 0; i < 1; i = i + 1) {}").unwrap();
        }

        assert_eq!(lox.interpreter().resolved_bindings(), retained);
        assert_eq!(out.lines().len(), 50);
        assert_eq!(lox.run("add(2, 3)").unwrap(), Some(Value::Number(5.0)));

        // A failed unit releases its top-level annotations as well.
        assert!(lox.run("{ var z = 1; print z + nil; }").is_err());
        assert_eq!(lox.interpreter().resolved_bindings(), retained);
    }
}
