//! Static resolver pass for the **Lox** interpreter.
//!
//! This resolver does three things in one AST walk:
//! 1. Build lexical scopes (stack of `HashMap<String,bool>` tracking declared/defined).
//! 2. Report static errors (redeclaration, forward‑read in initializer, misplaced
//!    `return`, `this` or `super`, a class inheriting from itself).
//! 3. Annotate each variable occurrence with its [`Binding`]: a local at some
//!    depth, or a global. The interpreter never falls back to dynamic lookup
//!    that would see a later shadowing local.
//!
//! Errors do not stop the walk; every one found is reported.
//!
//! A read of a name whose declaration in the innermost scope is still being
//! initialised binds past it, to an enclosing local or a known global. Only
//! when no such binding exists is it an error.

use crate::error::LoxError;
use crate::expr::{Binding, Expr, FunctionDecl, VarRef};
use crate::stmt::{Method, Stmt};
use crate::token::Token;
use log::{debug, info};
use std::collections::{HashMap, HashSet};

/// Are we inside any function body?  Used to validate `return`.
///
/// Methods and initializers count as plain functions: `init` may return early,
/// and the interpreter hands back the instance whatever it returns.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
}

/// Are we inside a class body, and does it have a superclass?
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Resolver: tracks scopes, enforces static rules, and records binding
/// distances (locals vs. globals) directly on the tree.
pub struct Resolver {
    scopes: Vec<HashMap<String, bool>>, // false=declared, true=defined
    current_function: FunctionType,
    current_class: ClassType,
    /// Names declared at top level, in this pass or an earlier session.
    globals: HashSet<String>,
    errors: Vec<LoxError>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        info!("Resolver instantiated");
        Resolver {
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            globals: HashSet::new(),
            errors: Vec::new(),
        }
    }

    /// A resolver that already knows these global names, e.g. natives and
    /// the definitions of earlier REPL lines.
    pub fn with_globals<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut resolver: Resolver = Self::new();
        resolver.globals.extend(names.into_iter().map(Into::into));
        resolver
    }

    /// Walk all top‑level statements.
    pub fn resolve(&mut self, statements: &[Stmt]) -> std::result::Result<(), Vec<LoxError>> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        for stmt in statements {
            self.resolve_stmt(stmt);
        }

        if self.errors.is_empty() {
            Ok(())
        } else {
            info!("Resolve pass found {} error(s)", self.errors.len());
            Err(std::mem::take(&mut self.errors))
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.resolve_class(name, superclass.as_ref(), methods),

            Stmt::Block(statements) => {
                self.begin_scope();
                self.resolve_stmts(statements);
                self.end_scope();
            }

            Stmt::Var {
                name,
                initializer: Some(Expr::Function(decl)),
            } => {
                // A function may call itself, so its name is usable in its own body.
                debug!("Resolving function binding '{}'", name.lexeme);
                self.declare(name);
                self.define(name);
                self.resolve_function(decl, FunctionType::Function);
            }

            Stmt::Var { name, initializer } => {
                self.declare(name);
                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }
                self.define(name);
            }

            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb);
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.error(keyword, "Can't return from top-level code.");
                }
                if let Some(expr) = value {
                    self.resolve_expr(expr);
                }
            }
        }
    }

    fn resolve_stmts(&mut self, statements: &[Stmt]) {
        for s in statements {
            self.resolve_stmt(s);
        }
    }

    fn resolve_class(&mut self, name: &Token, superclass: Option<&VarRef>, methods: &[Method]) {
        debug!("Resolving class '{}'", name.lexeme);

        let enclosing_class: ClassType = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(name);
        self.define(name);

        if let Some(superclass) = superclass {
            if superclass.name.lexeme == name.lexeme {
                self.error(&superclass.name, "A class can't inherit from itself.");
            }

            self.current_class = ClassType::Subclass;
            self.resolve_local(superclass);

            self.begin_scope();
            self.mark_defined("super");
        }

        self.begin_scope();
        self.mark_defined("this");

        for method in methods {
            debug!("Resolving method '{}.{}'", name.lexeme, method.name.lexeme);
            self.resolve_function(&method.function, FunctionType::Function);
        }

        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => self.resolve_expr(inner),

            Expr::Unary { right, .. } => self.resolve_expr(right),

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                self.resolve_expr(condition);
                self.resolve_expr(then_branch);
                self.resolve_expr(else_branch);
            }

            Expr::Variable(var) => {
                let in_own_initializer: bool = self
                    .scopes
                    .last()
                    .is_some_and(|scope| scope.get(&var.name.lexeme) == Some(&false));

                if in_own_initializer {
                    self.resolve_past_innermost(var);
                } else {
                    self.resolve_local(var);
                }
            }

            Expr::Assign { target, value } => {
                // First resolve RHS, then bind LHS
                self.resolve_expr(value);
                self.resolve_local(target);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }

            Expr::Get { object, .. } => self.resolve_expr(object),

            Expr::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }

            Expr::This(var) => {
                if self.current_class == ClassType::None {
                    self.error(&var.name, "Can't use 'this' outside of a class.");
                    return;
                }

                self.resolve_local(var);
            }

            Expr::Super { keyword, .. } => {
                match self.current_class {
                    ClassType::None => {
                        self.error(&keyword.name, "Can't use 'super' outside of a class.");
                    }
                    ClassType::Class => {
                        self.error(
                            &keyword.name,
                            "Can't use 'super' in a class with no superclass.",
                        );
                    }
                    ClassType::Subclass => {}
                }

                self.resolve_local(keyword);
            }

            Expr::Function(decl) => self.resolve_function(decl, FunctionType::Function),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function’s parameters + body.
    fn resolve_function(&mut self, decl: &FunctionDecl, kind: FunctionType) {
        let enclosing: FunctionType = self.current_function;
        self.current_function = kind;

        self.begin_scope();
        for param in &decl.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_stmts(&decl.body);
        self.end_scope();

        self.current_function = enclosing;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token) {
        let duplicate: bool = match self.scopes.last_mut() {
            Some(scope) => scope.insert(name.lexeme.clone(), false).is_some(),
            None => {
                self.globals.insert(name.lexeme.clone());
                false
            }
        };

        if duplicate {
            self.error(name, "Already a variable with this name in this scope.");
        }
    }

    fn define(&mut self, name: &Token) {
        self.mark_defined(&name.lexeme);
    }

    fn mark_defined(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), true);
        }
    }

    fn error(&mut self, token: &Token, message: &str) {
        self.errors.push(LoxError::resolve(token, message));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding‑distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this variable occurrence as either:
    ///  - a local at depth `d`, or
    ///  - a global if not found in *any* scope.
    fn resolve_local(&mut self, var: &VarRef) {
        // 1. check innermost → outermost
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&var.name.lexeme) {
                debug!("Resolved '{}' at depth {}", var.name.lexeme, depth);
                var.resolve(Binding::Local(depth));
                return;
            }
        }

        // 2. not found in any local scope ⇒ global
        debug!("Resolved '{}' as global", var.name.lexeme);
        var.resolve(Binding::Global);
    }

    /// Bind a read made inside the initializer of a same-named local to the
    /// binding that local shadows.
    fn resolve_past_innermost(&mut self, var: &VarRef) {
        let name: &str = &var.name.lexeme;

        let enclosing: Option<usize> = self
            .scopes
            .iter()
            .rev()
            .skip(1)
            .position(|scope| scope.contains_key(name));

        match enclosing {
            Some(index) => {
                debug!("Resolved '{}' past its initializer at depth {}", name, index + 1);
                var.resolve(Binding::Local(index + 1));
            }
            None if self.globals.contains(name) => {
                debug!("Resolved '{}' past its initializer as global", name);
                var.resolve(Binding::Global);
            }
            None => {
                self.error(
                    &var.name,
                    "Can't read local variable in its own initializer.",
                );
            }
        }
    }
}
