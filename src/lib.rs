pub mod environment;
pub mod error;
pub mod expr;
pub mod interpreter;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod stmt;
pub mod token;
pub mod value;

use std::io::Write;

use log::info;

use crate::error::LoxError;
use crate::interpreter::{Interpreter, InterpreterConfig};
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;
use crate::stmt::Stmt;
use crate::token::Token;

/// One interpreter session: source text in, program output to `W`.
///
/// Globals survive between [`Lox::run`] calls, so a REPL can feed it one
/// line at a time.
pub struct Lox<W: Write> {
    interpreter: Interpreter<W>,
}

impl<W: Write> Lox<W> {
    pub fn new(out: W) -> Self {
        Self {
            interpreter: Interpreter::new(out),
        }
    }

    pub fn with_config(out: W, config: InterpreterConfig) -> Self {
        Self {
            interpreter: Interpreter::with_config(out, config),
        }
    }

    /// Scan, parse, resolve and execute `source`.
    ///
    /// Scan and parse errors are reported together and nothing runs. Resolve
    /// errors likewise stop execution. Runtime errors are collected per
    /// top-level statement.
    pub fn run(&mut self, source: &str) -> Result<(), Vec<LoxError>> {
        info!("Running {} byte(s) of source", source.len());

        let statements: Vec<Stmt> = parse_source(source)?;

        let known: Vec<String> = self
            .interpreter
            .globals()
            .borrow()
            .names()
            .map(str::to_string)
            .collect();

        Resolver::with_globals(known).resolve(&statements)?;

        self.interpreter.interpret(&statements)
    }

    pub fn interpreter(&self) -> &Interpreter<W> {
        &self.interpreter
    }

    pub fn output(&self) -> &W {
        self.interpreter.output()
    }

    pub fn into_output(self) -> W {
        self.interpreter.into_output()
    }
}

/// Scan and parse `source`, reporting lexical and syntax errors together.
pub fn parse_source(source: &str) -> Result<Vec<Stmt>, Vec<LoxError>> {
    let (tokens, mut errors): (Vec<Token>, Vec<LoxError>) = Scanner::new(source).scan_all();

    match Parser::new(tokens).parse() {
        Ok(statements) if errors.is_empty() => Ok(statements),
        Ok(_) => Err(errors),
        Err(parse_errors) => {
            errors.extend(parse_errors);
            Err(errors)
        }
    }
}
