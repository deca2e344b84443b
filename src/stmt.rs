use std::rc::Rc;

use crate::expr::{Expr, FunctionDecl, VarRef};
use crate::token::Token;

/// A method inside a class body.
#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub name: Token,
    pub function: Rc<FunctionDecl>,
}

/// Statements after desugaring. Named `fun` declarations arrive as `Var`
/// bound to an `Expr::Function`; `switch` and `for` arrive as `Block`s of
/// `Var`, `If` and `While`.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expression(Expr),

    Print(Expr),

    Var {
        name: Token,
        initializer: Option<Expr>,
    },

    Block(Vec<Stmt>),

    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    While {
        condition: Expr,
        body: Box<Stmt>,
    },

    Return {
        keyword: Token,
        value: Option<Expr>,
    },

    Class {
        name: Token,
        /// Resolved like any other variable read.
        superclass: Option<VarRef>,
        methods: Vec<Method>,
    },
}
