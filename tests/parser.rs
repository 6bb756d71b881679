#[cfg(test)]
mod parser_tests {
    use rox::ast::{Expr, LiteralValue, Stmt};
    use rox::ast_printer::AstPrinter;
    use rox::error::{ErrorKind, LoxError};
    use rox::parser::{Parser, MAX_NESTING};
    use rox::scanner::scan_tokens;

    fn parse_program(source: &str) -> Result<Vec<Stmt>, LoxError> {
        let tokens = scan_tokens(source)?;
        Parser::new(&tokens).parse()
    }

    fn parse_expr(source: &str) -> Expr {
        let tokens = scan_tokens(source).unwrap();
        Parser::new(&tokens).parse_expression().unwrap()
    }

    fn sexpr(source: &str) -> String {
        AstPrinter.print(&parse_expr(source))
    }

    #[test]
    fn test_precedence_and_associativity() {
        assert_eq!(sexpr("1 + 2 * 3"), "(+ 1.0 (* 2.0 3.0))");
        assert_eq!(sexpr("1 - 2 - 3"), "(- (- 1.0 2.0) 3.0)");
        assert_eq!(sexpr("(1 + 2) * 3"), "(* (group (+ 1.0 2.0)) 3.0)");
        assert_eq!(sexpr("!-x == nil"), "(== (! (- x)) nil)");
        assert_eq!(sexpr("a or b and c"), "(or a (and b c))");
        assert_eq!(sexpr("a = b = 3"), "(= a (= b 3.0))");
    }

    #[test]
    fn test_calls_and_properties() {
        assert_eq!(sexpr("f(1, \"two\")(x)"), "(call (call f 1.0 two) x)");
        assert_eq!(sexpr("a.b.c"), "(. (. a b) c)");
        assert_eq!(sexpr("a.b = 1"), "(= (. a b) 1.0)");
        assert_eq!(sexpr("super.m"), "(super m)");
        assert_eq!(sexpr("this.x"), "(. this x)");
    }

    #[test]
    fn test_parse_expression_requires_whole_input() {
        let tokens = scan_tokens("1 + 2;").unwrap();
        let err = Parser::new(&tokens).parse_expression().unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert_eq!(
            err.to_string(),
            "[line 1] Error at ';': Expect end of expression."
        );
    }

    #[test]
    fn test_three_syntax_errors_are_reported_together() {
        let source = "var = 1;\nprint ;\nvar x 2;\nprint \"fine\";";
        let err = parse_program(source).unwrap_err();

        let errors = err.errors();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().all(|e| e.kind() == ErrorKind::Syntax));

        assert_eq!(
            errors[0].to_string(),
            "[line 1] Error at '=': Expect variable name."
        );
        assert_eq!(errors[1].to_string(), "[line 2] Error at ';': Expect expression.");
        assert_eq!(
            errors[2].to_string(),
            "[line 3] Error at '2': Expect ';' after variable declaration."
        );
    }

    #[test]
    fn test_missing_semicolon_at_end() {
        let err = parse_program("print 1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "[line 1] Error at end: Expect ';' after value."
        );
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse_program("1 + 2 = 3;").unwrap_err();
        assert_eq!(
            err.to_string(),
            "[line 1] Error at '=': Invalid assignment target."
        );
    }

    #[test]
    fn test_for_loop_desugars_to_while() {
        let statements = parse_program("for (var i = 0; i < 3; i = i + 1) print i;").unwrap();
        assert_eq!(statements.len(), 1);

        let Stmt::Block(outer) = &statements[0] else {
            panic!("expected outer block, got {:?}", statements[0]);
        };
        assert_eq!(outer.len(), 2);
        assert!(matches!(&outer[0], Stmt::Var { name, .. } if name.lexeme == "i"));

        let Stmt::While { condition, body } = &outer[1] else {
            panic!("expected while, got {:?}", outer[1]);
        };
        assert_eq!(AstPrinter.print(condition), "(< i 3.0)");

        let Stmt::Block(inner) = body.as_ref() else {
            panic!("expected inner block, got {:?}", body);
        };
        assert!(matches!(&inner[0], Stmt::Print(_)));
        assert!(matches!(&inner[1], Stmt::Expression(Expr::Assign { .. })));
    }

    #[test]
    fn test_bare_for_loop_has_true_condition() {
        let statements = parse_program("for (;;) print 1;").unwrap();

        let Stmt::While { condition, body } = &statements[0] else {
            panic!("expected bare while, got {:?}", statements[0]);
        };
        assert_eq!(*condition, Expr::Literal(LiteralValue::True));
        assert!(matches!(body.as_ref(), Stmt::Print(_)));
    }

    #[test]
    fn test_class_declaration_shape() {
        let statements =
            parse_program("class B < A { init(x) { this.x = x; } get() { return this.x; } }")
                .unwrap();

        let Stmt::Class {
            name,
            superclass,
            methods,
        } = &statements[0]
        else {
            panic!("expected class, got {:?}", statements[0]);
        };

        assert_eq!(name.lexeme, "B");
        assert!(matches!(superclass, Some(Expr::Variable { name, .. }) if name.lexeme == "A"));

        let names: Vec<&str> = methods.iter().map(|m| m.name.lexeme.as_str()).collect();
        assert_eq!(names, ["init", "get"]);
        assert_eq!(methods[0].params.len(), 1);
    }

    #[test]
    fn test_too_many_arguments_is_reported() {
        let args: Vec<String> = (0..256).map(|i| i.to_string()).collect();
        let source = format!("f({});", args.join(", "));

        let err = parse_program(&source).unwrap_err();
        assert_eq!(err.errors().len(), 1);
        assert!(err
            .to_string()
            .ends_with("Can't have more than 255 arguments."));
    }

    #[test]
    fn test_too_many_parameters_is_reported_once() {
        let params: Vec<String> = (0..256).map(|i| format!("p{}", i)).collect();
        let declaration = format!("fun f({}) {{}}", params.join(", "));

        let err = parse_program(&format!("{}\nprint \"after\";", declaration)).unwrap_err();
        let errors = err.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind(), ErrorKind::Syntax);
        assert!(errors[0]
            .to_string()
            .ends_with("Can't have more than 255 parameters."));

        // Parsing carries on past the oversized declaration.
        let err = parse_program(&format!("{}\nvar x 1;", declaration)).unwrap_err();
        let errors = err.errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors[1].to_string(),
            "[line 2] Error at '1': Expect ';' after variable declaration."
        );
    }

    #[test]
    fn test_excessive_nesting_is_a_syntax_error() {
        let deep = format!("{}1{}", "(".repeat(50_000), ")".repeat(50_000));
        let tokens = scan_tokens(&deep).unwrap();
        let err = Parser::new(&tokens).parse_expression().unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert_eq!(err.errors().len(), 1);
        assert_eq!(err.to_string(), "[line 1] Error at '(': Too much nesting.");

        let long_sum = format!("print 1{};", " + 1".repeat(200_000));
        let err = parse_program(&long_sum).unwrap_err();
        assert_eq!(err.errors().len(), 1);
        assert!(err.to_string().ends_with("Too much nesting."));

        let blocks = format!("{}{}", "{".repeat(50_000), "}".repeat(50_000));
        let err = parse_program(&blocks).unwrap_err();
        assert!(err.errors()[0].to_string().ends_with("Too much nesting."));

        let unary = format!("{}x", "!".repeat(50_000));
        let tokens = scan_tokens(&unary).unwrap();
        assert!(Parser::new(&tokens).parse_expression().is_err());
    }

    #[test]
    fn test_moderate_nesting_still_parses() {
        let depth = MAX_NESTING / 4;
        let grouped = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        assert!(sexpr(&grouped).starts_with("(group (group"));

        let sum = format!("1{}", " + 1".repeat(depth));
        assert!(sexpr(&sum).starts_with("(+ (+"));

        let blocks = format!("{}print 1;{}", "{".repeat(depth), "}".repeat(depth));
        assert_eq!(parse_program(&blocks).unwrap().len(), 1);

        let chain = format!("a{}", ".b".repeat(depth));
        assert!(sexpr(&chain).ends_with(" b)"));
    }

    #[test]
    fn test_printed_source_parses_back_to_the_same_tree() {
        let sources = [
            "1 + 2 * 3 - 4 / 5",
            "-(1 + 2) * 3",
            "!(a == b) or c and d != e",
            "a = b.c = f(1, g(2), \"s\")",
            "x >= 1.5 and y <= 2",
            "super.method(this)",
            "((nested))",
        ];

        for source in sources {
            let first = parse_expr(source);
            let rendered = AstPrinter.to_source(&first);
            let second = parse_expr(&rendered);

            assert_eq!(
                AstPrinter.print(&first),
                AstPrinter.print(&second),
                "round trip of {:?} via {:?}",
                source,
                rendered
            );
        }
    }
}
