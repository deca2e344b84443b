#[cfg(test)]
mod interpreter_tests {
    use rox as lox;

    use lox::error::{LoxError, RuntimeError};
    use lox::interpreter::InterpreterConfig;
    use lox::value::Value;
    use lox::Lox;

    use pretty_assertions::assert_eq;

    /// Runs `source` in a fresh session, returning stdout and any errors.
    fn run(source: &str) -> (String, Vec<LoxError>) {
        let mut lox = Lox::new(Vec::new());
        let errors = lox.run(source).err().unwrap_or_default();
        let out = String::from_utf8(lox.into_output()).expect("output is UTF-8");

        (out, errors)
    }

    fn output(source: &str) -> String {
        let (out, errors) = run(source);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        out
    }

    fn runtime_error(source: &str) -> RuntimeError {
        let (_, errors) = run(source);
        assert_eq!(errors.len(), 1, "expected one error, got {:?}", errors);

        match errors[0].runtime_kind() {
            Some(kind) => kind.clone(),
            None => panic!("expected a runtime error, got {}", errors[0]),
        }
    }

    #[test]
    fn test_arithmetic_and_precedence() {
        assert_eq!(output("print 1 + 2 * 3;"), "7\n");
        assert_eq!(output("print (1 + 2) * 3;"), "9\n");
        assert_eq!(output("print 10 / 4;"), "2.5\n");
        assert_eq!(output("print 8 - 3 - 2;"), "3\n");
    }

    #[test]
    fn test_power() {
        assert_eq!(output("print 2 ** 3 ** 2;"), "512\n");
        assert_eq!(output("print (2 ** 3) ** 2;"), "64\n");
        assert_eq!(output("print -2 ** 2;"), "4\n");
        assert_eq!(output("print 2 * 3 ** 2;"), "18\n");
        assert_eq!(output("print 4 ** 0.5;"), "2\n");
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(output("print 10 ** 400;"), "Infinity\n");
        assert_eq!(output("print -(10 ** 400);"), "-Infinity\n");
        assert_eq!(output("print -0;"), "-0\n");
        assert_eq!(output("print 3.0;"), "3\n");
        assert_eq!(output("print 0.1 + 0.2;"), "0.30000000000000004\n");
    }

    #[test]
    fn test_division_by_zero_is_nan() {
        assert_eq!(output("print 1 / 0;"), "NaN\n");
        assert_eq!(output("print -1 / 0;"), "NaN\n");
        assert_eq!(output("print 1 / -0;"), "NaN\n");
        assert_eq!(output("print 0 / 0;"), "NaN\n");
        assert_eq!(output("print 1 / 0 == 1 / 0;"), "false\n");
        assert_eq!(output("print 7 / 2;"), "3.5\n");
    }

    #[test]
    fn test_strings() {
        assert_eq!(output("print \"foo\" + \"bar\";"), "foobar\n");
        assert_eq!(output("print \"\";"), "\n");
    }

    #[test]
    fn test_truthiness_and_logic() {
        assert_eq!(output("print !nil;"), "true\n");
        assert_eq!(output("print !0;"), "false\n");
        assert_eq!(output("print !\"\";"), "false\n");
        assert_eq!(output("print nil or \"x\";"), "x\n");
        assert_eq!(output("print 1 and 2;"), "2\n");
        assert_eq!(output("print false and undefined;"), "false\n");
        assert_eq!(output("print true or undefined;"), "true\n");
    }

    #[test]
    fn test_equality() {
        assert_eq!(output("print nil == nil;"), "true\n");
        assert_eq!(output("print nil == false;"), "false\n");
        assert_eq!(output("print 1 == \"1\";"), "false\n");
        assert_eq!(output("print \"a\" == \"a\";"), "true\n");
        assert_eq!(output("print 1 != 2;"), "true\n");
        assert_eq!(output("print (0 / 0) == (0 / 0);"), "false\n");
    }

    #[test]
    fn test_comparison() {
        assert_eq!(output("print 1 < 2;"), "true\n");
        assert_eq!(output("print 2 <= 2;"), "true\n");
        assert_eq!(output("print 1 > 2;"), "false\n");
        assert_eq!(output("print 3 >= 4;"), "false\n");
    }

    #[test]
    fn test_ternary_evaluates_one_branch() {
        let source = "\
var hits = 0;
fun bump() { hits = hits + 1; return hits; }
print true ? \"yes\" : bump();
print false ? bump() : \"no\";
print hits;
print false ? 1 : true ? 2 : 3;
";
        assert_eq!(output(source), "yes\nno\n0\n2\n");
    }

    #[test]
    fn test_block_scoping_and_shadowing() {
        let source = "\
var a = 1;
{
  var a = 2;
  print a;
}
print a;
";
        assert_eq!(output(source), "2\n1\n");
    }

    #[test]
    fn test_assignment_returns_value() {
        assert_eq!(output("var a; var b; a = b = 3; print a; print b;"), "3\n3\n");
    }

    #[test]
    fn test_uninitialized_var_is_nil() {
        assert_eq!(output("var a; print a;"), "nil\n");
    }

    #[test]
    fn test_while_and_for() {
        assert_eq!(
            output("var i = 0; while (i < 3) { print i; i = i + 1; }"),
            "0\n1\n2\n"
        );
        assert_eq!(
            output("for (var i = 0; i < 3; i = i + 1) print i;"),
            "0\n1\n2\n"
        );
        assert_eq!(
            output("var n = 0; for (;n < 2;) n = n + 1; print n;"),
            "2\n"
        );
    }

    #[test]
    fn test_callable_rendering() {
        assert_eq!(output("fun add(a, b) {} print add;"), "<fn(a, b)>\n");
        assert_eq!(output("print fun () {};"), "<fn()>\n");
        assert_eq!(output("print clock;"), "<native fn clock>\n");
        assert_eq!(output("class Point {} print Point; print Point();"), "Point\nPoint instance\n");
    }

    #[test]
    fn test_clock_returns_seconds() {
        assert_eq!(output("print clock() > 1000000000;"), "true\n");
    }

    #[test]
    fn test_return_without_value_is_nil() {
        assert_eq!(output("fun f() { return; } print f();"), "nil\n");
        assert_eq!(output("fun g() {} print g();"), "nil\n");
    }

    #[test]
    fn test_return_exits_loops() {
        let program = "\
fun find(limit) {
  var i = 0;
  while (true) {
    if (i == limit) return i;
    i = i + 1;
  }
}
print find(4);
";
        assert_eq!(output(program), "4\n");
    }

    #[test]
    fn test_runtime_error_messages() {
        assert_eq!(runtime_error("print -\"x\";"), RuntimeError::OperandMustBeNumber);
        assert_eq!(runtime_error("print 1 - \"x\";"), RuntimeError::OperandsMustBeNumbers);
        assert_eq!(runtime_error("print 1 < \"x\";"), RuntimeError::OperandsMustBeNumbers);
        assert_eq!(
            runtime_error("print \"a\" + 1;"),
            RuntimeError::OperandsMustBeNumbersOrStrings
        );
        assert_eq!(
            runtime_error("print nope;"),
            RuntimeError::UndefinedVariable("nope".to_string())
        );
        assert_eq!(
            runtime_error("nope = 1;"),
            RuntimeError::UndefinedVariable("nope".to_string())
        );
        assert_eq!(runtime_error("\"str\"();"), RuntimeError::NotCallable);
        assert_eq!(
            runtime_error("fun f(a) {} f(1, 2);"),
            RuntimeError::ArityMismatch {
                expected: 1,
                got: 2
            }
        );
        assert_eq!(
            runtime_error("var x = 1; print x.y;"),
            RuntimeError::OnlyInstancesHaveProperties
        );
        assert_eq!(
            runtime_error("var x = 1; x.y = 2;"),
            RuntimeError::OnlyInstancesHaveFields
        );
        assert_eq!(
            runtime_error("class A {} print A().nope;"),
            RuntimeError::UndefinedProperty("nope".to_string())
        );
        assert_eq!(
            runtime_error("var NotAClass = \"x\"; class B < NotAClass {}"),
            RuntimeError::SuperclassMustBeClass
        );
    }

    #[test]
    fn test_runtime_error_display() {
        let (_, errors) = run("\n\nprint -true;");

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "Operand must be a number.\n[line 3]");
        assert_eq!(errors[0].exit_code(), 70);
    }

    #[test]
    fn test_runtime_error_does_not_stop_later_statements() {
        let (out, errors) = run("print \"before\";\n\"not a function\"();\nprint \"after\";");

        assert_eq!(out, "before\nafter\n");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].runtime_kind(), Some(&RuntimeError::NotCallable));
    }

    #[test]
    fn test_error_inside_block_restores_scope() {
        let source = "\
var a = \"outer\";
{ var a = \"inner\"; nope(); }
print a;
";
        let (out, errors) = run(source);

        assert_eq!(out, "outer\n");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_arguments_evaluate_left_to_right() {
        let source = "\
fun show(x) { print x; return x; }
fun pair(a, b) {}
pair(show(1), show(2));
";
        assert_eq!(output(source), "1\n2\n");
    }

    #[test]
    fn test_stack_overflow_is_a_runtime_error() {
        let config = InterpreterConfig { max_call_depth: 32 };
        let mut lox = Lox::with_config(Vec::new(), config);

        let errors = match lox.run("fun down(n) { return down(n + 1); }\ndown(0);\nprint \"recovered\";") {
            Ok(()) => panic!("expected a stack overflow"),
            Err(errors) => errors,
        };

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].runtime_kind(), Some(&RuntimeError::StackOverflow));
        assert_eq!(String::from_utf8_lossy(lox.output()), "recovered\n");
    }

    #[test]
    fn test_default_depth_limit_on_a_default_thread() {
        let mut lox = Lox::new(Vec::new());

        let errors = match lox.run("fun down(n) { return down(n + 1); }\ndown(0);\nprint \"recovered\";") {
            Ok(()) => panic!("expected a stack overflow"),
            Err(errors) => errors,
        };

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "Stack overflow.\n[line 1]");
        assert_eq!(String::from_utf8_lossy(lox.output()), "recovered\n");
    }

    #[test]
    fn test_default_depth_limit_through_methods_and_loops() {
        let source = "\
class Walker {
  step(n) {
    while (true) {
      return n > 1000000 ? n : this.step(n + 1);
    }
  }
}
Walker().step(0);
print \"recovered\";
";
        let mut lox = Lox::new(Vec::new());

        let errors = lox.run(source).err().unwrap_or_default();

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].runtime_kind(), Some(&RuntimeError::StackOverflow));
        assert_eq!(String::from_utf8_lossy(lox.output()), "recovered\n");
    }

    #[test]
    fn test_depth_limit_allows_calls_within_it() {
        let config = InterpreterConfig { max_call_depth: 32 };
        let mut lox = Lox::with_config(Vec::new(), config);

        let result = lox.run("fun count(n) { return n == 0 ? 0 : 1 + count(n - 1); }\nprint count(20);");

        assert!(result.is_ok(), "unexpected errors: {:?}", result);
        assert_eq!(String::from_utf8_lossy(lox.output()), "20\n");
    }

    #[test]
    fn test_globals_persist_between_runs() {
        let mut lox = Lox::new(Vec::new());

        assert!(lox.run("var a = 1;").is_ok());
        assert!(lox.run("fun inc() { a = a + 1; }").is_ok());
        assert!(lox.run("inc(); print a;").is_ok());

        assert_eq!(String::from_utf8_lossy(lox.output()), "2\n");

        let a = lox.interpreter().globals().borrow().get("a");
        assert_eq!(a, Some(Value::Number(2.0)));
    }

    #[test]
    fn test_static_errors_prevent_execution() {
        let (out, errors) = run("print \"runs?\";\nreturn 1;");

        assert_eq!(out, "");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].exit_code(), 65);
    }
}
