//! Pipeline driver: scanner → parser → resolver → interpreter, once per unit
//! of source.  The interpreter (and with it the global frame) outlives each
//! unit, so a prompt session builds up state line by line and keeps going
//! after a failed line.

use std::fs;
use std::path::Path;

use log::{debug, info};

use crate::ast::{ExprId, Stmt};
use crate::error::Result;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::scan_tokens;
use crate::value::Value;

pub struct Lox {
    interpreter: Interpreter,
}

impl Default for Lox {
    fn default() -> Self {
        Self::new()
    }
}

impl Lox {
    pub fn new() -> Self {
        Self::with_interpreter(Interpreter::new())
    }

    pub fn with_interpreter(interpreter: Interpreter) -> Self {
        Self { interpreter }
    }

    pub fn interpreter(&mut self) -> &mut Interpreter {
        &mut self.interpreter
    }

    /// Run one unit of source.
    ///
    /// A unit that is exactly one expression (no trailing `;`) is evaluated
    /// and its value returned, which is what the prompt echoes.  Anything else
    /// is run as a program and yields `None`.
    pub fn run(&mut self, source: &str) -> Result<Option<Value>> {
        let tokens = scan_tokens(source)?;

        if let Ok(expr) = Parser::new(&tokens).parse_expression() {
            debug!("Unit is a lone expression");

            let locals = Resolver::new().resolve_expression(&expr)?;
            let transient: Vec<ExprId> = locals.transient().to_vec();
            self.interpreter.absorb(locals);

            let value = self.interpreter.evaluate(&expr);
            self.interpreter.forget(&transient);

            return value.map(Some);
        }

        let statements: Vec<Stmt> = Parser::new(&tokens).parse()?;
        let locals = Resolver::new().resolve(&statements)?;
        let transient: Vec<ExprId> = locals.transient().to_vec();
        self.interpreter.absorb(locals);

        // Function bodies keep their annotations; top-level code is done.
        let outcome = self.interpreter.interpret(&statements);
        self.interpreter.forget(&transient);
        outcome?;

        Ok(None)
    }

    /// Run a whole file as one unit.
    pub fn run_file<P: AsRef<Path>>(&mut self, path: P) -> Result<Option<Value>> {
        info!("Running file: {:?}", path.as_ref());

        let bytes: Vec<u8> = fs::read(path)?;
        let source: String = String::from_utf8(bytes)?;

        self.run(&source)
    }
}
