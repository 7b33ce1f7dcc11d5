#[cfg(test)]
mod parser_tests {
    use rulox as lox;

    use lox::ast::Stmt;
    use lox::ast_printer::AstPrinter;
    use lox::parser::Parser;
    use lox::scanner::scan;

    fn parse_source(source: &str) -> Vec<Stmt> {
        let tokens = scan(source).expect("scan failed");

        Parser::new(&tokens).parse().expect("parse failed")
    }

    fn print_source(source: &str) -> String {
        AstPrinter::print_program(&parse_source(source))
    }

    /// Printing a parse and re-parsing the output must reach a fixpoint:
    /// the printer's text describes the same tree the parser built.
    fn assert_round_trip(source: &str) {
        let first = print_source(source);
        let second = print_source(&first);

        assert_eq!(first, second, "printer output is not re-parse stable");
    }

    #[test]
    fn test_parser_01_round_trip_expressions() {
        assert_round_trip("print 1 + 2 * 3;");
        assert_round_trip("print (1 + 2) * 3;");
        assert_round_trip("print -x.y(1, \"two\", nil) == !done or a and b;");
        assert_round_trip("a = b = c + 1;");
    }

    #[test]
    fn test_parser_02_round_trip_statements() {
        assert_round_trip(
            "var a = 1; \
             { var b = a + 1; print b; } \
             if (a < 2) print \"small\"; else print \"big\"; \
             while (a < 10) a = a + 1;",
        );
    }

    #[test]
    fn test_parser_03_round_trip_functions_and_classes() {
        assert_round_trip(
            "fun add(a, b) { return a + b; } \
             class Point { init(x, y) { this.x = x; this.y = y; } \
             norm() { return this.x * this.x + this.y * this.y; } } \
             class Origin < Point { norm() { return super.norm(); } } \
             print Origin(0, 0).norm();",
        );
    }

    #[test]
    fn test_parser_04_for_desugars_to_while() {
        let printed = print_source("for (var i = 0; i < 3; i = i + 1) print i;");

        // The tree contains only core statements: an initializer block
        // wrapping a while whose body carries the increment.
        assert_eq!(
            printed,
            "{ var i = 0; while (i < 3) { print i; i = i + 1; } }"
        );

        assert_round_trip("for (var i = 0; i < 3; i = i + 1) print i;");
    }

    #[test]
    fn test_parser_05_precedence_shape() {
        // `*` binds tighter than `+`: no grouping appears in the output
        // because none is needed to reproduce the tree.
        assert_eq!(print_source("print 1 + 2 * 3;"), "print 1 + 2 * 3;");

        // Explicit grouping survives printing.
        assert_eq!(print_source("print (1 + 2) * 3;"), "print (1 + 2) * 3;");
    }

    #[test]
    fn test_parser_06_invalid_assignment_target() {
        let tokens = scan("1 = 2;").unwrap();
        let errors = Parser::new(&tokens).parse().unwrap_err();

        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("Invalid assignment target"));

        let tokens = scan("a + b = c;").unwrap();
        let errors = Parser::new(&tokens).parse().unwrap_err();

        assert!(errors[0].to_string().contains("Invalid assignment target"));
    }

    #[test]
    fn test_parser_07_property_target_is_valid() {
        // `a.b = c` must parse (it becomes a Set node), unlike `a + b = c`.
        assert_round_trip("a.b = c;");
        assert_round_trip("a.b.c = d;");
    }

    #[test]
    fn test_parser_08_reports_multiple_errors_in_one_pass() {
        let source = "var ;\nprint 1;\n+ 2;";

        let tokens = scan(source).unwrap();
        let errors = Parser::new(&tokens).parse().unwrap_err();

        assert_eq!(errors.len(), 2, "expected both independent errors: {:?}", errors);
        assert!(errors[0].to_string().contains("Expected variable name"));
        assert!(errors[1].to_string().contains("Expected expression"));
    }

    #[test]
    fn test_parser_09_super_requires_method_name() {
        let tokens = scan("super;").unwrap();
        let errors = Parser::new(&tokens).parse().unwrap_err();

        assert!(errors[0].to_string().contains("Expected '.' after 'super'"));
    }

    #[test]
    fn test_parser_10_expression_ids_are_unique_and_offsettable() {
        let tokens = scan("a = b + c;").unwrap();

        let mut parser = Parser::with_base_id(&tokens, 100);
        parser.parse().unwrap();

        // a (target), b, c and the assignment itself each took an id.
        assert_eq!(parser.id_high_water(), 104);
    }
}
