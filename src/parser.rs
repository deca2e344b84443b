/*!
Pratt parser for Lox.

### Logging Policy

| Location                     | Level  | Purpose                                   |
|------------------------------|--------|-------------------------------------------|
| `Parser::new`, `parse`       | `info` | Lifecycle milestones.                     |
| `declaration`, `statement`   | `debug`| High‑level descent into grammar branches. |
| desugarings                  | `debug`| Shape of the rewritten tree.              |

--------------------------------------------------------------------------------
Grammar (EBNF)
--------------------------------------------------------------------------------

```text
program        → declaration* EOF ;
declaration    → classDecl | funDecl | varDecl | statement ;
classDecl      → "class" IDENT ( "<" IDENT )? "{" method* "}" ;
method         → IDENT "(" parameters? ")" block ;
funDecl        → "fun" IDENT "(" parameters? ")" block ;
varDecl        → "var" IDENT ( "=" expression )? ";" ;
statement      → exprStmt | printStmt | ifStmt | whileStmt | forStmt
               | switchStmt | returnStmt | block ;
switchStmt     → "switch" "(" expression ")" "{" arm* "}" ;
arm            → ( expression | "_" ) "=>" statement ;
forStmt        → "for" "(" ( varDecl | exprStmt | ";" )
                 expression? ";" expression? ")" statement ;
block          → "{" declaration* "}" ;
expression     → Pratt loop over the table below ;
```

Binding powers, weakest first (`*` marks right associativity):

```text
=*  ?:*  or  and  == !=  < <= > >=  + -  * /  ***  unary  . ()  primary
```

Three surface forms never reach later passes:

* `fun name(p) { … }` becomes `var name = fun (p) { … };`
* `switch (e) { a => s1; _ => s2; }` becomes
  `{ var $switchN = e; if ($switchN == a) s1; else s2; }`
* `for (i; c; n) s` becomes `{ i; while (c) { s; n; } }`
*/

use std::rc::Rc;

use crate::error::{LoxError, Result};
use crate::expr::{Expr, FunctionDecl, LiteralValue, VarRef};
use crate::stmt::{Method, Stmt};
use crate::token::{Token, TokenType};

use log::{debug, info};

/// Parsers reject calls and declarations with more than this many arguments.
pub const MAX_ARITY: usize = 255;

/// Binding power of an infix/postfix operator, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    None,
    Assignment,
    Ternary,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
    Exponent,
    Unary,
    Call,
}

impl Precedence {
    fn of(token_type: &TokenType) -> Precedence {
        match token_type {
            TokenType::EQUAL => Precedence::Assignment,
            TokenType::QUESTION => Precedence::Ternary,
            TokenType::OR => Precedence::Or,
            TokenType::AND => Precedence::And,
            TokenType::BANG_EQUAL | TokenType::EQUAL_EQUAL => Precedence::Equality,
            TokenType::GREATER
            | TokenType::GREATER_EQUAL
            | TokenType::LESS
            | TokenType::LESS_EQUAL => Precedence::Comparison,
            TokenType::MINUS | TokenType::PLUS => Precedence::Term,
            TokenType::SLASH | TokenType::STAR => Precedence::Factor,
            TokenType::STAR_STAR => Precedence::Exponent,
            TokenType::LEFT_PAREN | TokenType::DOT => Precedence::Call,
            _ => Precedence::None,
        }
    }

    /// The next weaker level. Parsing a right operand at this level lets the
    /// same operator bind again, which makes it right associative.
    fn weaker(self) -> Precedence {
        match self {
            Precedence::None | Precedence::Assignment => Precedence::None,
            Precedence::Ternary => Precedence::Assignment,
            Precedence::Or => Precedence::Ternary,
            Precedence::And => Precedence::Or,
            Precedence::Equality => Precedence::And,
            Precedence::Comparison => Precedence::Equality,
            Precedence::Term => Precedence::Comparison,
            Precedence::Factor => Precedence::Term,
            Precedence::Exponent => Precedence::Factor,
            Precedence::Unary => Precedence::Exponent,
            Precedence::Call => Precedence::Unary,
        }
    }
}

/// Top‑level parser over a scanned token vector.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    errors: Vec<LoxError>,
    /// Numbers the hidden variables introduced by `switch`.
    switch_count: usize,
}

impl Parser {
    /// Construct a new parser. A trailing `EOF` is added if missing.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        info!("Parser created with {} tokens", tokens.len());

        if !matches!(tokens.last(), Some(t) if t.token_type == TokenType::EOF) {
            let line: usize = tokens.last().map_or(1, |t| t.line);
            tokens.push(Token::new(TokenType::EOF, "", line));
        }

        Self {
            tokens,
            current: 0,
            errors: Vec::new(),
            switch_count: 0,
        }
    }

    // ───────────────────────── public API ─────────────────────────

    /// Parse an entire program. Syntax errors are collected across the whole
    /// token stream; the statements are only returned when there were none.
    pub fn parse(mut self) -> std::result::Result<Vec<Stmt>, Vec<LoxError>> {
        info!("Beginning parse phase");

        let mut statements: Vec<Stmt> = Vec::new();

        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        info!(
            "Parsed {} statement(s) with {} error(s)",
            statements.len(),
            self.errors.len()
        );

        if self.errors.is_empty() {
            Ok(statements)
        } else {
            Err(self.errors)
        }
    }

    // ──────────────────────── declaration rules ───────────────────

    /// Parse one declaration, recovering at the next statement boundary on error.
    fn declaration(&mut self) -> Option<Stmt> {
        debug!("Entering declaration at line {}", self.peek().line);

        let result: Result<Stmt> = if self.matches(TokenType::CLASS) {
            self.class_declaration()
        } else if self.check(TokenType::FUN) && self.check_next(TokenType::IDENTIFIER) {
            self.advance();
            self.function_declaration()
        } else if self.matches(TokenType::VAR) {
            self.var_declaration()
        } else {
            self.statement()
        };

        match result {
            Ok(stmt) => Some(stmt),
            Err(e) => {
                debug!("Parse error, synchronizing: {}", e);
                self.errors.push(e);
                self.synchronize();
                None
            }
        }
    }

    fn class_declaration(&mut self) -> Result<Stmt> {
        let name: Token = self.consume(TokenType::IDENTIFIER, "Expect class name.")?;

        let superclass: Option<VarRef> = if self.matches(TokenType::LESS) {
            let super_name: Token = self.consume(TokenType::IDENTIFIER, "Expect superclass name.")?;
            Some(VarRef::new(super_name))
        } else {
            None
        };

        self.consume(TokenType::LEFT_BRACE, "Expect '{' before class body.")?;

        let mut methods: Vec<Method> = Vec::new();

        while !self.check(TokenType::RIGHT_BRACE) && !self.is_at_end() {
            let method_name: Token = self.consume(TokenType::IDENTIFIER, "Expect method name.")?;
            let function: Rc<FunctionDecl> = self.function_body(method_name.clone(), "method")?;

            methods.push(Method {
                name: method_name,
                function,
            });
        }

        self.consume(TokenType::RIGHT_BRACE, "Expect '}' after class body.")?;

        debug!(
            "Parsed class '{}' with {} method(s)",
            name.lexeme,
            methods.len()
        );

        Ok(Stmt::Class {
            name,
            superclass,
            methods,
        })
    }

    /// `fun name(params) body` is rewritten to a `var` bound to an anonymous function.
    fn function_declaration(&mut self) -> Result<Stmt> {
        let keyword: Token = self.previous().clone();
        let name: Token = self.consume(TokenType::IDENTIFIER, "Expect function name.")?;
        let function: Rc<FunctionDecl> = self.function_body(keyword, "function")?;

        debug!("Desugared function '{}' into a var declaration", name.lexeme);

        Ok(Stmt::Var {
            name,
            initializer: Some(Expr::Function(function)),
        })
    }

    /// Parses `"(" parameters? ")" block`, shared by every function form.
    fn function_body(&mut self, keyword: Token, kind: &str) -> Result<Rc<FunctionDecl>> {
        let open_message: String = match kind {
            "anonymous" => "Expect '(' after 'fun'.".to_string(),
            _ => format!("Expect '(' after {} name.", kind),
        };
        self.consume(TokenType::LEFT_PAREN, &open_message)?;

        let mut params: Vec<Token> = Vec::new();

        if !self.check(TokenType::RIGHT_PAREN) {
            loop {
                if params.len() >= MAX_ARITY {
                    let err = LoxError::parse(self.peek(), "Can't have more than 255 parameters.");
                    self.errors.push(err);
                }

                params.push(self.consume(TokenType::IDENTIFIER, "Expect parameter name.")?);

                if !self.matches(TokenType::COMMA) {
                    break;
                }
            }
        }

        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after parameters.")?;

        let body_message: String = match kind {
            "anonymous" => "Expect '{' before function body.".to_string(),
            _ => format!("Expect '{{' before {} body.", kind),
        };
        self.consume(TokenType::LEFT_BRACE, &body_message)?;

        let body: Vec<Stmt> = self.block()?;

        Ok(Rc::new(FunctionDecl {
            keyword,
            params,
            body,
        }))
    }

    fn var_declaration(&mut self) -> Result<Stmt> {
        let name: Token = self.consume(TokenType::IDENTIFIER, "Expect variable name.")?;

        let initializer: Option<Expr> = if self.matches(TokenType::EQUAL) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            TokenType::SEMICOLON,
            "Expect ';' after variable declaration.",
        )?;

        Ok(Stmt::Var { name, initializer })
    }

    // ───────────────────────── statement rules ────────────────────

    fn statement(&mut self) -> Result<Stmt> {
        debug!("Entering statement at line {}", self.peek().line);

        if self.matches(TokenType::FOR) {
            self.for_statement()
        } else if self.matches(TokenType::IF) {
            self.if_statement()
        } else if self.matches(TokenType::WHILE) {
            self.while_statement()
        } else if self.matches(TokenType::SWITCH) {
            self.switch_statement()
        } else if self.matches(TokenType::RETURN) {
            self.return_statement()
        } else if self.matches(TokenType::LEFT_BRACE) {
            Ok(Stmt::Block(self.block()?))
        } else if self.matches(TokenType::PRINT) {
            self.print_statement()
        } else {
            self.expression_statement()
        }
    }

    fn for_statement(&mut self) -> Result<Stmt> {
        let keyword_line: usize = self.previous().line;

        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'for'.")?;

        let initializer: Option<Stmt> = if self.matches(TokenType::SEMICOLON) {
            None
        } else if self.matches(TokenType::VAR) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition: Expr = if !self.check(TokenType::SEMICOLON) {
            self.expression()?
        } else {
            Expr::Literal(LiteralValue::Bool(true))
        };
        self.consume(TokenType::SEMICOLON, "Expect ';' after loop condition.")?;

        let increment: Option<Expr> = if !self.check(TokenType::RIGHT_PAREN) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after for clauses.")?;

        let mut body: Stmt = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }

        body = Stmt::While {
            condition,
            body: Box::new(body),
        };

        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        }

        debug!("Desugared for loop at line {} into while", keyword_line);

        Ok(body)
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'if'.")?;
        let condition: Expr = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after if condition.")?;

        let then_branch: Box<Stmt> = Box::new(self.statement()?);
        let else_branch: Option<Box<Stmt>> = if self.matches(TokenType::ELSE) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'while'.")?;
        let condition: Expr = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after condition.")?;
        let body: Box<Stmt> = Box::new(self.statement()?);

        Ok(Stmt::While { condition, body })
    }

    /// Rewrites a switch into a block that evaluates the subject once into a
    /// hidden local, followed by an `if`/`else if` chain comparing it with `==`.
    fn switch_statement(&mut self) -> Result<Stmt> {
        let keyword: Token = self.previous().clone();

        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'switch'.")?;
        let subject: Expr = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after switch subject.")?;
        self.consume(TokenType::LEFT_BRACE, "Expect '{' before switch arms.")?;

        // '$' can never start a scanned identifier, so user code cannot see it.
        let hidden: Token = Token::synthetic(
            TokenType::IDENTIFIER,
            &format!("$switch{}", self.switch_count),
            keyword.line,
        );
        self.switch_count += 1;

        let mut arms: Vec<(Expr, Stmt)> = Vec::new();
        let mut default: Option<Stmt> = None;

        while !self.check(TokenType::RIGHT_BRACE) && !self.is_at_end() {
            if self.check(TokenType::IDENTIFIER)
                && self.peek().lexeme == "_"
                && self.check_next(TokenType::EQUAL_GREATER)
            {
                let underscore: Token = self.advance().clone();
                self.advance(); // =>

                let action: Stmt = self.statement()?;

                if default.is_some() {
                    return Err(LoxError::parse(
                        &underscore,
                        "Cannot have more than one default case.",
                    ));
                }

                default = Some(action);
            } else {
                let case: Expr = self.expression()?;
                self.consume(TokenType::EQUAL_GREATER, "Expect '=>' after switch case.")?;
                let action: Stmt = self.statement()?;

                arms.push((case, action));
            }
        }

        self.consume(TokenType::RIGHT_BRACE, "Expect '}' after switch arms.")?;

        debug!(
            "Desugared switch at line {} with {} arm(s), default={}",
            keyword.line,
            arms.len(),
            default.is_some()
        );

        let mut chain: Option<Stmt> = default;

        for (case, action) in arms.into_iter().rev() {
            let condition: Expr = Expr::Binary {
                left: Box::new(Expr::Variable(VarRef::new(hidden.clone()))),
                operator: Token::synthetic(TokenType::EQUAL_EQUAL, "==", keyword.line),
                right: Box::new(case),
            };

            chain = Some(Stmt::If {
                condition,
                then_branch: Box::new(action),
                else_branch: chain.map(Box::new),
            });
        }

        let mut block: Vec<Stmt> = vec![Stmt::Var {
            name: hidden,
            initializer: Some(subject),
        }];

        block.extend(chain);

        Ok(Stmt::Block(block))
    }

    fn return_statement(&mut self) -> Result<Stmt> {
        let keyword: Token = self.previous().clone();

        let value: Option<Expr> = if !self.check(TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::SEMICOLON, "Expect ';' after return value.")?;

        Ok(Stmt::Return { keyword, value })
    }

    fn print_statement(&mut self) -> Result<Stmt> {
        let value: Expr = self.expression()?;

        self.consume(TokenType::SEMICOLON, "Expect ';' after value.")?;

        Ok(Stmt::Print(value))
    }

    fn expression_statement(&mut self) -> Result<Stmt> {
        let expr: Expr = self.expression()?;
        self.consume(TokenType::SEMICOLON, "Expect ';' after expression.")?;
        Ok(Stmt::Expression(expr))
    }

    /// Declarations up to the closing brace; the opening one is already consumed.
    fn block(&mut self) -> Result<Vec<Stmt>> {
        let mut statements: Vec<Stmt> = Vec::new();

        while !self.check(TokenType::RIGHT_BRACE) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        self.consume(TokenType::RIGHT_BRACE, "Expect '}' after block.")?;

        Ok(statements)
    }

    // ─────────────────────── expression rules (Pratt) ─────────────

    fn expression(&mut self) -> Result<Expr> {
        self.parse_precedence(Precedence::None)
    }

    /// Parse a prefix expression, then keep folding operators that bind more
    /// tightly than `min` into the left operand.
    fn parse_precedence(&mut self, min: Precedence) -> Result<Expr> {
        let mut left: Expr = self.prefix()?;

        loop {
            let precedence: Precedence = Precedence::of(&self.peek().token_type);

            if precedence <= min {
                break;
            }

            let operator: Token = self.advance().clone();
            left = self.infix(left, operator, precedence)?;
        }

        Ok(left)
    }

    fn prefix(&mut self) -> Result<Expr> {
        let token: Token = self.peek().clone();

        let expr: Expr = match token.token_type.clone() {
            TokenType::FALSE => {
                self.advance();
                Expr::Literal(LiteralValue::Bool(false))
            }

            TokenType::TRUE => {
                self.advance();
                Expr::Literal(LiteralValue::Bool(true))
            }

            TokenType::NIL => {
                self.advance();
                Expr::Literal(LiteralValue::Nil)
            }

            TokenType::NUMBER(n) => {
                self.advance();
                Expr::Literal(LiteralValue::Number(n))
            }

            TokenType::STRING(s) => {
                self.advance();
                Expr::Literal(LiteralValue::Str(s))
            }

            TokenType::LEFT_PAREN => {
                self.advance();
                let inner: Expr = self.expression()?;
                self.consume(TokenType::RIGHT_PAREN, "Expect ')' after expression.")?;
                Expr::Grouping(Box::new(inner))
            }

            TokenType::BANG | TokenType::MINUS => {
                self.advance();
                let right: Expr = self.parse_precedence(Precedence::Unary)?;
                Expr::Unary {
                    operator: token,
                    right: Box::new(right),
                }
            }

            TokenType::FUN => {
                self.advance();
                Expr::Function(self.function_body(token, "anonymous")?)
            }

            TokenType::IDENTIFIER => {
                self.advance();
                Expr::Variable(VarRef::new(token))
            }

            TokenType::THIS => {
                self.advance();
                Expr::This(VarRef::new(token))
            }

            TokenType::SUPER => {
                self.advance();
                self.consume(TokenType::DOT, "Expect '.' after 'super'.")?;
                let method: Token =
                    self.consume(TokenType::IDENTIFIER, "Expect superclass method name.")?;
                Expr::Super {
                    keyword: VarRef::new(token),
                    method,
                }
            }

            _ => return Err(LoxError::parse(&token, "Expect expression.")),
        };

        Ok(expr)
    }

    fn infix(&mut self, left: Expr, operator: Token, precedence: Precedence) -> Result<Expr> {
        match operator.token_type {
            TokenType::LEFT_PAREN => self.finish_call(left),

            TokenType::DOT => {
                let name: Token =
                    self.consume(TokenType::IDENTIFIER, "Expect property name after '.'.")?;

                Ok(Expr::Get {
                    object: Box::new(left),
                    name,
                })
            }

            TokenType::QUESTION => {
                // The middle operand is delimited by '?' and ':', so any expression fits.
                let then_branch: Expr = self.expression()?;
                self.consume(
                    TokenType::COLON,
                    "Expect ':' after then branch of ternary expression.",
                )?;
                let else_branch: Expr = self.parse_precedence(precedence.weaker())?;

                Ok(Expr::Ternary {
                    condition: Box::new(left),
                    question: operator,
                    then_branch: Box::new(then_branch),
                    else_branch: Box::new(else_branch),
                })
            }

            TokenType::EQUAL => {
                let value: Expr = self.parse_precedence(precedence.weaker())?;

                match left {
                    Expr::Variable(var) => Ok(Expr::Assign {
                        target: VarRef::new(var.name),
                        value: Box::new(value),
                    }),

                    Expr::Get { object, name } => Ok(Expr::Set {
                        object,
                        name,
                        value: Box::new(value),
                    }),

                    _ => Err(LoxError::parse(&operator, "Invalid assignment target.")),
                }
            }

            TokenType::AND | TokenType::OR => {
                let right: Expr = self.parse_precedence(precedence)?;

                Ok(Expr::Logical {
                    left: Box::new(left),
                    operator,
                    right: Box::new(right),
                })
            }

            _ => {
                let right_min: Precedence = if operator.token_type == TokenType::STAR_STAR {
                    precedence.weaker()
                } else {
                    precedence
                };
                let right: Expr = self.parse_precedence(right_min)?;

                Ok(Expr::Binary {
                    left: Box::new(left),
                    operator,
                    right: Box::new(right),
                })
            }
        }
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr> {
        let mut arguments: Vec<Expr> = Vec::new();

        if !self.check(TokenType::RIGHT_PAREN) {
            loop {
                if arguments.len() >= MAX_ARITY {
                    let err = LoxError::parse(self.peek(), "Can't have more than 255 arguments.");
                    self.errors.push(err);
                }

                arguments.push(self.expression()?);

                if !self.matches(TokenType::COMMA) {
                    break;
                }
            }
        }

        let paren: Token = self.consume(TokenType::RIGHT_PAREN, "Expect ')' after arguments.")?;

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    // ────────────────────── utility helpers ───────────────────────

    #[inline(always)]
    fn matches(&mut self, ttype: TokenType) -> bool {
        if self.check(ttype) {
            self.advance();

            return true;
        }

        false
    }

    #[inline(always)]
    fn consume(&mut self, ttype: TokenType, message: &str) -> Result<Token> {
        if self.check(ttype) {
            return Ok(self.advance().clone());
        }

        Err(LoxError::parse(self.peek(), message))
    }

    #[inline(always)]
    fn check(&self, ttype: TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        self.peek().token_type == ttype
    }

    /// Like [`check`], one token further ahead.
    #[inline(always)]
    fn check_next(&self, ttype: TokenType) -> bool {
        match self.tokens.get(self.current + 1) {
            Some(token) => token.token_type == ttype,
            None => false,
        }
    }

    #[inline(always)]
    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }

        self.previous()
    }

    #[inline(always)]
    fn is_at_end(&self) -> bool {
        matches!(self.peek().token_type, TokenType::EOF)
    }

    #[inline(always)]
    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    #[inline(always)]
    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    /// Discards tokens until it thinks it is at a statement boundary.
    fn synchronize(&mut self) {
        self.advance(); // skip the token that caused the error

        while !self.is_at_end() {
            if matches!(self.previous().token_type, TokenType::SEMICOLON) {
                return;
            }

            match self.peek().token_type {
                TokenType::CLASS
                | TokenType::FUN
                | TokenType::VAR
                | TokenType::FOR
                | TokenType::IF
                | TokenType::WHILE
                | TokenType::SWITCH
                | TokenType::PRINT
                | TokenType::RETURN => return,
                _ => {}
            }

            self.advance();
        }
    }
}
