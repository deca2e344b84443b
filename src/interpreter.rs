//! Tree-walking evaluator.
//!
//! Statements execute to a [`Flow`]: either they finish normally or a
//! `return` is unwinding toward the nearest call. Runtime errors travel
//! separately through `Result`, so the two never mix.

use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use chrono::Utc;
use log::{debug, info};

use crate::environment::{EnvRef, Environment};
use crate::error::{LoxError, Result, RuntimeError};
use crate::expr::{Binding, Expr, LiteralValue, VarRef};
use crate::stmt::{Method, Stmt};
use crate::token::{Token, TokenType};
use crate::value::{Callable, LoxClass, LoxFunction, LoxInstance, NativeFunction, Value};

/// Nested calls allowed before a program fails with a stack overflow.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

/// Remaining host stack below which a call switches to a fresh segment.
const STACK_RED_ZONE: usize = 128 * 1024;

/// Size of each segment allocated when the host stack runs low.
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// Tunables for one interpreter instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpreterConfig {
    pub max_call_depth: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

/// How a statement finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Return(Value),
}

pub struct Interpreter<W: Write> {
    out: W,
    globals: EnvRef,
    environment: EnvRef,
    depth: usize,
    config: InterpreterConfig,
}

impl<W: Write> Interpreter<W> {
    /// Creates a new Interpreter printing to `out` and defines native functions such as `clock`.
    pub fn new(out: W) -> Self {
        Self::with_config(out, InterpreterConfig::default())
    }

    pub fn with_config(out: W, config: InterpreterConfig) -> Self {
        info!("Initializing Interpreter with {:?}", config);

        let globals: EnvRef = Environment::new().into_ref();

        debug!("Defining native function 'clock'");

        globals.borrow_mut().define(
            "clock",
            Value::Callable(Callable::Native(Rc::new(NativeFunction {
                name: "clock",
                arity: 0,
                func: |_args: &[Value]| {
                    let timestamp: f64 = Utc::now().timestamp_micros() as f64 / 1_000_000.0;
                    debug!("Native function 'clock' returned: {}", timestamp);
                    Ok(Value::Number(timestamp))
                },
            }))),
        );

        Self {
            out,
            environment: Rc::clone(&globals),
            globals,
            depth: 0,
            config,
        }
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    pub fn globals(&self) -> &EnvRef {
        &self.globals
    }

    /// Runs a resolved program. A runtime error aborts only the top-level
    /// statement it occurs in; the rest still run and every error is returned.
    pub fn interpret(&mut self, statements: &[Stmt]) -> std::result::Result<(), Vec<LoxError>> {
        debug!("Interpreting {} statements", statements.len());

        let mut errors: Vec<LoxError> = Vec::new();

        for stmt in statements {
            if let Err(e) = self.execute(stmt) {
                info!("Runtime error in top-level statement: {}", e);
                errors.push(e);
                self.depth = 0;
            }
        }

        if errors.is_empty() {
            info!("Interpretation completed successfully");
            Ok(())
        } else {
            Err(errors)
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    pub fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
            }

            Stmt::Print(expr) => {
                let value: Value = self.evaluate(expr)?;
                writeln!(self.out, "{}", value)?;
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Defining variable '{}' = {}", name.lexeme, value);
                self.environment.borrow_mut().define(&name.lexeme, value);
            }

            Stmt::Block(statements) => {
                let scope: EnvRef = Environment::with_enclosing(Rc::clone(&self.environment)).into_ref();
                return self.execute_block(statements, scope);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    return self.execute(then_branch);
                } else if let Some(else_branch) = else_branch {
                    return self.execute(else_branch);
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let Flow::Return(value) = self.execute(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                return Ok(Flow::Return(value));
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.execute_class(name, superclass.as_ref(), methods)?,
        }

        Ok(Flow::Normal)
    }

    /// Runs `statements` inside `scope`, restoring the current environment
    /// afterwards whether they finish, return, or fail.
    pub fn execute_block(&mut self, statements: &[Stmt], scope: EnvRef) -> Result<Flow> {
        let previous: EnvRef = std::mem::replace(&mut self.environment, scope);

        let result: Result<Flow> = self.execute_all(statements);

        self.environment = previous;

        result
    }

    fn execute_all(&mut self, statements: &[Stmt]) -> Result<Flow> {
        for stmt in statements {
            if let Flow::Return(value) = self.execute(stmt)? {
                return Ok(Flow::Return(value));
            }
        }

        Ok(Flow::Normal)
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&VarRef>,
        methods: &[Method],
    ) -> Result<()> {
        debug!("Defining class '{}'", name.lexeme);

        let superclass: Option<Rc<LoxClass>> = match superclass {
            Some(var) => match self.look_up_variable(var)? {
                Value::Callable(Callable::Class(class)) => Some(class),
                _ => {
                    return Err(LoxError::runtime(
                        var.name.line,
                        RuntimeError::SuperclassMustBeClass,
                    ))
                }
            },
            None => None,
        };

        self.environment
            .borrow_mut()
            .define(&name.lexeme, Value::Nil);

        // Methods of a subclass close over a scope holding `super`.
        let previous: Option<EnvRef> = superclass.as_ref().map(|class| {
            let mut scope: Environment = Environment::with_enclosing(Rc::clone(&self.environment));
            scope.define("super", Value::Callable(Callable::Class(Rc::clone(class))));
            std::mem::replace(&mut self.environment, scope.into_ref())
        });

        let table: HashMap<String, Rc<LoxFunction>> = methods
            .iter()
            .map(|method| {
                let function: LoxFunction = LoxFunction::new(
                    Rc::clone(&method.function),
                    Rc::clone(&self.environment),
                    method.name.lexeme == "init",
                );
                (method.name.lexeme.clone(), Rc::new(function))
            })
            .collect();

        if let Some(previous) = previous {
            self.environment = previous;
        }

        let class: LoxClass = LoxClass {
            name: name.lexeme.clone(),
            superclass,
            methods: table,
        };

        self.environment
            .borrow_mut()
            .assign(&name.lexeme, Value::Callable(Callable::Class(Rc::new(class))));

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::Bool(b) => Value::Bool(*b),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => {
                let right: Value = self.evaluate(right)?;

                match (&operator.token_type, right) {
                    (TokenType::MINUS, Value::Number(n)) => Ok(Value::Number(-n)),
                    (TokenType::MINUS, _) => Err(LoxError::runtime(
                        operator.line,
                        RuntimeError::OperandMustBeNumber,
                    )),
                    (TokenType::BANG, value) => Ok(Value::Bool(!value.is_truthy())),
                    _ => Err(invalid_operator(operator)),
                }
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left)?;
                let right: Value = self.evaluate(right)?;

                binary(operator, left, right)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left)?;

                let short_circuits: bool = match operator.token_type {
                    TokenType::OR => left.is_truthy(),
                    _ => !left.is_truthy(),
                };

                if short_circuits {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(then_branch)
                } else {
                    self.evaluate(else_branch)
                }
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee: Value = self.evaluate(callee)?;

                let mut args: Vec<Value> = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.evaluate(argument)?);
                }

                let Value::Callable(callable) = callee else {
                    return Err(LoxError::runtime(paren.line, RuntimeError::NotCallable));
                };

                if args.len() != callable.arity() {
                    return Err(LoxError::runtime(
                        paren.line,
                        RuntimeError::ArityMismatch {
                            expected: callable.arity(),
                            got: args.len(),
                        },
                    ));
                }

                self.call(&callable, args, paren.line)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => instance.get(&name.lexeme).ok_or_else(|| {
                    LoxError::runtime(
                        name.line,
                        RuntimeError::UndefinedProperty(name.lexeme.clone()),
                    )
                }),
                _ => Err(LoxError::runtime(
                    name.line,
                    RuntimeError::OnlyInstancesHaveProperties,
                )),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(LoxError::runtime(
                        name.line,
                        RuntimeError::OnlyInstancesHaveFields,
                    ));
                };

                let value: Value = self.evaluate(value)?;
                instance.set(&name.lexeme, value.clone());

                Ok(value)
            }

            Expr::This(var) => self.look_up_variable(var),

            Expr::Super { keyword, method } => self.evaluate_super(keyword, method),

            Expr::Variable(var) => self.look_up_variable(var),

            Expr::Assign { target, value } => {
                let value: Value = self.evaluate(value)?;
                self.assign_variable(target, value.clone())?;
                Ok(value)
            }

            Expr::Function(decl) => {
                let function: LoxFunction =
                    LoxFunction::new(Rc::clone(decl), Rc::clone(&self.environment), false);

                Ok(Value::Callable(Callable::Function(Rc::new(function))))
            }
        }
    }

    fn evaluate_super(&mut self, keyword: &VarRef, method: &Token) -> Result<Value> {
        let undefined = || {
            LoxError::runtime(
                keyword.name.line,
                RuntimeError::UndefinedVariable(keyword.name.lexeme.clone()),
            )
        };

        // `this` always lives one scope inside `super`.
        let Binding::Local(distance) = keyword.binding() else {
            return Err(undefined());
        };

        let superclass: Option<Value> = Environment::get_at(&self.environment, distance, "super");
        let object: Option<Value> = distance
            .checked_sub(1)
            .and_then(|d| Environment::get_at(&self.environment, d, "this"));

        let (Some(Value::Callable(Callable::Class(superclass))), Some(Value::Instance(instance))) =
            (superclass, object)
        else {
            return Err(undefined());
        };

        let found: Rc<LoxFunction> = superclass.find_method(&method.lexeme).ok_or_else(|| {
            LoxError::runtime(
                method.line,
                RuntimeError::UndefinedProperty(method.lexeme.clone()),
            )
        })?;

        Ok(Value::Callable(Callable::Function(Rc::new(
            found.bind(instance),
        ))))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Variables
    // ─────────────────────────────────────────────────────────────────────────

    fn look_up_variable(&self, var: &VarRef) -> Result<Value> {
        let name: &str = &var.name.lexeme;

        let found: Option<Value> = match var.binding() {
            Binding::Local(distance) => Environment::get_at(&self.environment, distance, name),
            Binding::Global => self.globals.borrow().get(name),
            Binding::Unresolved => None,
        };

        found.ok_or_else(|| {
            LoxError::runtime(
                var.name.line,
                RuntimeError::UndefinedVariable(name.to_string()),
            )
        })
    }

    fn assign_variable(&self, var: &VarRef, value: Value) -> Result<()> {
        let name: &str = &var.name.lexeme;

        let assigned: bool = match var.binding() {
            Binding::Local(distance) => {
                Environment::assign_at(&self.environment, distance, name, value)
            }
            Binding::Global => self.globals.borrow_mut().assign(name, value),
            Binding::Unresolved => false,
        };

        if assigned {
            Ok(())
        } else {
            Err(LoxError::runtime(
                var.name.line,
                RuntimeError::UndefinedVariable(name.to_string()),
            ))
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Calls
    // ─────────────────────────────────────────────────────────────────────────

    /// Invokes a callable whose arity has already been checked.
    fn call(&mut self, callable: &Callable, args: Vec<Value>, line: usize) -> Result<Value> {
        match callable {
            Callable::Native(native) => {
                debug!("Calling native function '{}'", native.name);
                (native.func)(&args).map_err(|e| LoxError::runtime(line, RuntimeError::Native(e)))
            }

            Callable::Function(function) => self.call_function(function, args, line),

            Callable::Class(class) => {
                debug!("Instantiating class '{}'", class.name);

                let instance: Rc<LoxInstance> = Rc::new(LoxInstance::new(Rc::clone(class)));

                if let Some(initializer) = class.find_method("init") {
                    let bound: LoxFunction = initializer.bind(Rc::clone(&instance));
                    self.call_function(&bound, args, line)?;
                }

                Ok(Value::Instance(instance))
            }
        }
    }

    fn call_function(&mut self, function: &LoxFunction, args: Vec<Value>, line: usize) -> Result<Value> {
        if self.depth >= self.config.max_call_depth {
            return Err(LoxError::runtime(line, RuntimeError::StackOverflow));
        }

        let mut scope: Environment = Environment::with_enclosing(Rc::clone(&function.closure));

        for (param, arg) in function.decl.params.iter().zip(args) {
            scope.define(&param.lexeme, arg);
        }

        // The depth limit, not the caller's thread size, bounds recursion.
        self.depth += 1;
        let result: Result<Flow> = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.execute_block(&function.decl.body, scope.into_ref())
        });
        self.depth -= 1;

        let flow: Flow = result?;

        if function.is_initializer {
            return Environment::get_at(&function.closure, 0, "this").ok_or_else(|| {
                LoxError::runtime(line, RuntimeError::UndefinedVariable("this".to_string()))
            });
        }

        match flow {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Nil),
        }
    }
}

fn invalid_operator(operator: &Token) -> LoxError {
    LoxError::runtime(
        operator.line,
        RuntimeError::InvalidOperator(operator.lexeme.clone()),
    )
}

fn numbers(operator: &Token, left: &Value, right: &Value) -> Result<(f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(LoxError::runtime(
            operator.line,
            RuntimeError::OperandsMustBeNumbers,
        )),
    }
}

fn binary(operator: &Token, left: Value, right: Value) -> Result<Value> {
    match operator.token_type {
        TokenType::PLUS => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
            _ => Err(LoxError::runtime(
                operator.line,
                RuntimeError::OperandsMustBeNumbersOrStrings,
            )),
        },

        TokenType::EQUAL_EQUAL => Ok(Value::Bool(left == right)),
        TokenType::BANG_EQUAL => Ok(Value::Bool(left != right)),

        TokenType::MINUS
        | TokenType::STAR
        | TokenType::SLASH
        | TokenType::STAR_STAR
        | TokenType::GREATER
        | TokenType::GREATER_EQUAL
        | TokenType::LESS
        | TokenType::LESS_EQUAL => {
            let (a, b) = numbers(operator, &left, &right)?;

            Ok(match operator.token_type {
                TokenType::MINUS => Value::Number(a - b),
                TokenType::STAR => Value::Number(a * b),
                // Any division by zero, either sign, is NaN.
                TokenType::SLASH if b == 0.0 => Value::Number(f64::NAN),
                TokenType::SLASH => Value::Number(a / b),
                TokenType::STAR_STAR => Value::Number(a.powf(b)),
                TokenType::GREATER => Value::Bool(a > b),
                TokenType::GREATER_EQUAL => Value::Bool(a >= b),
                TokenType::LESS => Value::Bool(a < b),
                _ => Value::Bool(a <= b),
            })
        }

        _ => Err(invalid_operator(operator)),
    }
}
