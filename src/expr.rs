use std::cell::Cell;
use std::rc::Rc;

use crate::stmt::Stmt;
use crate::token::Token;

/// Where a name reference lives, as computed by the resolver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Binding {
    /// The resolver has not visited this node yet.
    #[default]
    Unresolved,

    /// Walk exactly this many enclosing links from the current environment.
    Local(usize),

    /// Look the name up in the global environment.
    Global,
}

/// A name occurrence together with its resolved binding.
///
/// The slot is a `Cell` so the resolver can annotate a tree that is already
/// shared with closures (function bodies sit behind `Rc`).
#[derive(Debug, Clone, PartialEq)]
pub struct VarRef {
    pub name: Token,
    pub binding: Cell<Binding>,
}

impl VarRef {
    pub fn new(name: Token) -> Self {
        Self {
            name,
            binding: Cell::new(Binding::Unresolved),
        }
    }

    pub fn binding(&self) -> Binding {
        self.binding.get()
    }

    pub fn resolve(&self, binding: Binding) {
        self.binding.set(binding);
    }
}

/// A literal constant that appears directly in the source code.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Number(f64),
    Str(String),
    Bool(bool),
    Nil,
}

/// Parameters and body shared by anonymous functions, desugared named
/// functions and class methods.
#[derive(Debug, PartialEq)]
pub struct FunctionDecl {
    /// The `fun` keyword, or the method name for methods.
    pub keyword: Token,
    pub params: Vec<Token>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(LiteralValue),

    Grouping(Box<Expr>),

    Unary {
        operator: Token,
        right: Box<Expr>,
    },

    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    /// Short‑circuiting `and` / `or`.
    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    /// `condition ? then_branch : else_branch`
    Ternary {
        condition: Box<Expr>,
        question: Token,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },

    Call {
        callee: Box<Expr>,
        /// The closing `)` token, retained for error reporting.
        paren: Token,
        arguments: Vec<Expr>,
    },

    /// object.property
    Get {
        object: Box<Expr>,
        name: Token,
    },

    /// object.property = value
    Set {
        object: Box<Expr>,
        name: Token,
        value: Box<Expr>,
    },

    This(VarRef),

    /// `super.method`; the binding locates the `super` slot.
    Super {
        keyword: VarRef,
        method: Token,
    },

    Variable(VarRef),

    Assign {
        target: VarRef,
        value: Box<Expr>,
    },

    /// `fun (params) { body }`
    Function(Rc<FunctionDecl>),
}
