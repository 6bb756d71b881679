//! Centralised error hierarchy for the **Rox interpreter**.
//!
//! Every stage (scanner, parser, resolver, runtime) converts its failure modes
//! into one of the variants defined here.  The scanner, parser and resolver
//! *collect* their errors and hand them back as a single [`LoxError::Composite`];
//! the interpreter is fail‑fast and returns the first [`LoxError::Runtime`].
//!
//! The module **does not** print diagnostics itself.

use std::fmt;
use std::io;
use thiserror::Error;

use log::debug;

use crate::token::{Token, TokenType};

/// Which stage of the pipeline produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Lexer or parser could not recognise the input.
    Syntax,

    /// Resolver rejected a well‑formed program.
    Static,

    /// Evaluation failed.
    Runtime,

    /// The interpreter reached a state the grammar rules out.
    Internal,

    /// Host I/O failure (reading sources, writing output).
    Io,
}

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical or syntactic error.
    #[error("[line {line}] Error{at}: {message}")]
    Syntax {
        /// Human‑readable description.
        message: String,

        /// Location suffix such as ` at ';'` or ` at end` (may be empty).
        at: String,

        /// Byte offset into the source.
        offset: usize,

        /// 1‑based line where the error occurred.
        line: usize,
    },

    /// Static‑analysis failure reported by the resolver.
    #[error("[line {line}] Error{at}: {message}")]
    Static {
        message: String,
        at: String,
        offset: usize,
        line: usize,
    },

    /// Runtime evaluation error.
    #[error("[line {line}] Runtime error: {message}")]
    Runtime {
        message: String,
        offset: usize,
        line: usize,
    },

    /// Several errors gathered by one pass.
    #[error("{}", DisplayAll(.0))]
    Composite(Vec<LoxError>),

    /// Interpreter bug: a node reached a path the grammar makes impossible.
    #[error("Internal interpreter error: {0}")]
    Internal(String),

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// UTF‑8 decoding failure when ingesting external text.
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

struct DisplayAll<'e>(&'e [LoxError]);

impl fmt::Display for DisplayAll<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", err)?;
        }

        Ok(())
    }
}

/// ` at 'lexeme'` for ordinary tokens, ` at end` for EOF.
fn location_of(token: &Token) -> String {
    if token.token_type == TokenType::EOF {
        " at end".to_string()
    } else {
        format!(" at '{}'", token.lexeme)
    }
}

impl LoxError {
    /// Helper constructor for the **scanner**: no token exists yet, only a
    /// position.
    pub fn lex<S: Into<String>>(offset: usize, line: usize, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating lex error: line={}, msg={}", line, message);

        LoxError::Syntax {
            message,
            at: String::new(),
            offset,
            line,
        }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating parse error: line={}, msg={}", token.line, message);

        LoxError::Syntax {
            message,
            at: location_of(token),
            offset: token.offset,
            line: token.line,
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating static error: line={}, msg={}", token.line, message);

        LoxError::Static {
            message,
            at: location_of(token),
            offset: token.offset,
            line: token.line,
        }
    }

    /// Helper constructor for the **interpreter**.
    pub fn runtime<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating runtime error: line={}, msg={}", token.line, message);

        LoxError::Runtime {
            message,
            offset: token.offset,
            line: token.line,
        }
    }

    /// The stage that produced this error.  A composite reports the kind of
    /// its first entry.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoxError::Syntax { .. } => ErrorKind::Syntax,
            LoxError::Static { .. } => ErrorKind::Static,
            LoxError::Runtime { .. } => ErrorKind::Runtime,
            LoxError::Composite(errors) => errors
                .first()
                .map(LoxError::kind)
                .unwrap_or(ErrorKind::Internal),
            LoxError::Internal(_) => ErrorKind::Internal,
            LoxError::Io(_) | LoxError::Utf8(_) => ErrorKind::Io,
        }
    }

    /// Source offset of a located error.
    pub fn offset(&self) -> Option<usize> {
        match self {
            LoxError::Syntax { offset, .. }
            | LoxError::Static { offset, .. }
            | LoxError::Runtime { offset, .. } => Some(*offset),
            LoxError::Composite(errors) => errors.first().and_then(LoxError::offset),
            _ => None,
        }
    }

    /// Every individual error, with composites flattened.
    pub fn errors(&self) -> Vec<&LoxError> {
        match self {
            LoxError::Composite(errors) => errors.iter().flat_map(LoxError::errors).collect(),
            other => vec![other],
        }
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;
