#[cfg(test)]
mod parser_tests {
    use rox as lox;

    use lox::error::LoxError;
    use lox::expr::{Expr, LiteralValue};
    use lox::parse_source;
    use lox::stmt::Stmt;
    use lox::token::TokenType;

    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Vec<Stmt> {
        match parse_source(source) {
            Ok(statements) => statements,
            Err(errors) => panic!("unexpected errors: {:?}", errors),
        }
    }

    fn parse_errors(source: &str) -> Vec<String> {
        match parse_source(source) {
            Ok(statements) => panic!("expected errors, parsed {:?}", statements),
            Err(errors) => errors.iter().map(LoxError::to_string).collect(),
        }
    }

    /// The expression of a single expression statement.
    fn expression(source: &str) -> Expr {
        let mut statements = parse(source);
        assert_eq!(statements.len(), 1);

        match statements.remove(0) {
            Stmt::Expression(expr) => expr,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    fn number(expr: &Expr) -> f64 {
        match expr {
            Expr::Literal(LiteralValue::Number(n)) => *n,
            other => panic!("expected number literal, got {:?}", other),
        }
    }

    #[test]
    fn test_power_is_right_associative() {
        let Expr::Binary {
            left,
            operator,
            right,
        } = expression("2 ** 3 ** 2;")
        else {
            panic!("expected binary");
        };

        assert_eq!(operator.token_type, TokenType::STAR_STAR);
        assert_eq!(number(&left), 2.0);
        assert!(matches!(*right, Expr::Binary { .. }));
    }

    #[test]
    fn test_minus_is_left_associative() {
        let Expr::Binary { left, right, .. } = expression("1 - 2 - 3;") else {
            panic!("expected binary");
        };

        assert!(matches!(*left, Expr::Binary { .. }));
        assert_eq!(number(&right), 3.0);
    }

    #[test]
    fn test_unary_binds_tighter_than_power() {
        let Expr::Binary { left, operator, .. } = expression("-2 ** 2;") else {
            panic!("expected binary");
        };

        assert_eq!(operator.token_type, TokenType::STAR_STAR);
        assert!(matches!(*left, Expr::Unary { .. }));
    }

    #[test]
    fn test_factor_binds_tighter_than_term() {
        let Expr::Binary {
            operator, right, ..
        } = expression("1 + 2 * 3;")
        else {
            panic!("expected binary");
        };

        assert_eq!(operator.token_type, TokenType::PLUS);
        assert!(matches!(*right, Expr::Binary { .. }));
    }

    #[test]
    fn test_ternary_nests_to_the_right() {
        let Expr::Ternary { else_branch, .. } = expression("a ? b : c ? d : e;") else {
            panic!("expected ternary");
        };

        assert!(matches!(*else_branch, Expr::Ternary { .. }));
    }

    #[test]
    fn test_ternary_binds_looser_than_or() {
        let Expr::Ternary { condition, .. } = expression("a or b ? 1 : 2;") else {
            panic!("expected ternary");
        };

        assert!(matches!(*condition, Expr::Logical { .. }));
    }

    #[test]
    fn test_assignment_is_right_associative() {
        let Expr::Assign { target, value } = expression("a = b = 1;") else {
            panic!("expected assignment");
        };

        assert_eq!(target.name.lexeme, "a");
        assert!(matches!(*value, Expr::Assign { .. }));
    }

    #[test]
    fn test_property_assignment_becomes_set() {
        let Expr::Set { name, .. } = expression("point.x = 1;") else {
            panic!("expected set");
        };

        assert_eq!(name.lexeme, "x");
    }

    #[test]
    fn test_call_chain() {
        let Expr::Call {
            callee, arguments, ..
        } = expression("a.b(1, 2)(3);")
        else {
            panic!("expected call");
        };

        assert_eq!(arguments.len(), 1);
        assert!(matches!(*callee, Expr::Call { ref arguments, .. } if arguments.len() == 2));
    }

    #[test]
    fn test_named_function_is_a_var_binding() {
        let statements = parse("fun add(a, b) { return a + b; }");

        let [Stmt::Var {
            name,
            initializer: Some(Expr::Function(decl)),
        }] = statements.as_slice()
        else {
            panic!("expected var bound to a function, got {:?}", statements);
        };

        assert_eq!(name.lexeme, "add");
        assert_eq!(decl.params.len(), 2);
        assert_eq!(decl.body.len(), 1);
    }

    #[test]
    fn test_anonymous_function_expression() {
        let Expr::Call { callee, .. } = expression("(fun (x) { print x; })(1);") else {
            panic!("expected call");
        };

        assert!(matches!(*callee, Expr::Grouping(ref inner) if matches!(**inner, Expr::Function(_))));
    }

    #[test]
    fn test_switch_desugars_to_hidden_var_and_if_chain() {
        let statements = parse("switch (x) { 1 => print 1; 2 => print 2; _ => print 0; }");

        let [Stmt::Block(block)] = statements.as_slice() else {
            panic!("expected a single block, got {:?}", statements);
        };

        assert_eq!(block.len(), 2);

        let Stmt::Var { name, .. } = &block[0] else {
            panic!("expected hidden var, got {:?}", block[0]);
        };
        assert!(name.lexeme.starts_with('$'));

        let Stmt::If {
            else_branch: Some(second),
            ..
        } = &block[1]
        else {
            panic!("expected if chain");
        };

        let Stmt::If {
            else_branch: Some(default),
            ..
        } = &**second
        else {
            panic!("expected second arm");
        };

        assert!(matches!(**default, Stmt::Print(_)));
    }

    #[test]
    fn test_switch_hidden_names_are_unique() {
        let statements = parse("switch (1) { 1 => print 1; } switch (2) { 2 => print 2; }");

        let names: Vec<&str> = statements
            .iter()
            .filter_map(|s| match s {
                Stmt::Block(block) => match block.first() {
                    Some(Stmt::Var { name, .. }) => Some(name.lexeme.as_str()),
                    _ => None,
                },
                _ => None,
            })
            .collect();

        assert_eq!(names.len(), 2);
        assert!(names[0] != names[1]);
    }

    #[test]
    fn test_switch_without_default_has_no_else() {
        let statements = parse("switch (x) { 1 => print 1; }");

        let [Stmt::Block(block)] = statements.as_slice() else {
            panic!("expected block");
        };

        assert!(matches!(block[1], Stmt::If { else_branch: None, .. }));
    }

    #[test]
    fn test_for_desugars_to_while() {
        let statements = parse("for (var i = 0; i < 3; i = i + 1) print i;");

        let [Stmt::Block(block)] = statements.as_slice() else {
            panic!("expected block");
        };

        assert!(matches!(block[0], Stmt::Var { .. }));

        let Stmt::While { body, .. } = &block[1] else {
            panic!("expected while");
        };

        assert!(matches!(**body, Stmt::Block(ref inner) if inner.len() == 2));
    }

    #[test]
    fn test_class_with_superclass() {
        let statements = parse("class B < A { init(x) { this.x = x; } get() { return super.get(); } }");

        let [Stmt::Class {
            name,
            superclass: Some(superclass),
            methods,
        }] = statements.as_slice()
        else {
            panic!("expected class");
        };

        assert_eq!(name.lexeme, "B");
        assert_eq!(superclass.name.lexeme, "A");
        assert_eq!(
            methods.iter().map(|m| m.name.lexeme.as_str()).collect::<Vec<_>>(),
            vec!["init", "get"]
        );
    }

    #[test]
    fn test_missing_expression_error() {
        assert_eq!(
            parse_errors("print 1 + ;"),
            vec!["[line 1] Error at ';': Expect expression.".to_string()]
        );
    }

    #[test]
    fn test_invalid_assignment_target() {
        assert_eq!(
            parse_errors("1 = 2;"),
            vec!["[line 1] Error at '=': Invalid assignment target.".to_string()]
        );
    }

    #[test]
    fn test_error_at_end() {
        assert_eq!(
            parse_errors("print 1"),
            vec!["[line 1] Error at end: Expect ';' after value.".to_string()]
        );
    }

    #[test]
    fn test_errors_are_collected_after_synchronizing() {
        let errors = parse_errors("var = 1;\nprint ;\nprint \"fine\";\nvar x = (1;");

        assert_eq!(errors.len(), 3);
        assert!(errors[0].starts_with("[line 1]"));
        assert!(errors[1].starts_with("[line 2]"));
        assert!(errors[2].starts_with("[line 4]"));
    }

    #[test]
    fn test_duplicate_default_arm() {
        assert_eq!(
            parse_errors("switch (1) { _ => print 1; _ => print 2; }"),
            vec!["[line 1] Error at '_': Cannot have more than one default case.".to_string()]
        );
    }

    #[test]
    fn test_too_many_arguments_is_reported_once() {
        let args: Vec<String> = (0..256).map(|i| i.to_string()).collect();
        let source = format!("f({});", args.join(", "));

        let errors = parse_errors(&source);

        assert_eq!(errors.len(), 1);
        assert!(errors[0].ends_with("Can't have more than 255 arguments."));
    }

    #[test]
    fn test_lexical_and_syntax_errors_reported_together() {
        let errors = parse_errors("var a = @;\nprint ;");

        assert_eq!(
            errors,
            vec![
                "[line 1] Error: Unexpected character: @".to_string(),
                "[line 1] Error at ';': Expect expression.".to_string(),
                "[line 2] Error at ';': Expect expression.".to_string(),
            ]
        );
    }
}
