//! Static resolver pass.
//!
//! This resolver does three things in one AST walk:
//! 1. Build lexical scopes (stack of `HashMap<String, VarStatus>` tracking
//!    declared/defined names).
//! 2. Report static errors (redeclaration, read in own initializer, invalid
//!    `return`, misplaced `this`/`super`, self‑inheritance).  Errors are
//!    accumulated and reported together once the walk is complete.
//! 3. Record, for *each* variable occurrence, at what distance its binding
//!    lives, so the interpreter never falls back to dynamic lookup that would
//!    see a later shadowing local.
//!
//! The stack starts with one implicit scope for the unit's top level; at run
//! time that scope is the global frame.  Names found in no scope are left
//! unannotated and looked up in the globals.

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::error::{LoxError, Result};
use crate::stack;
use crate::token::Token;
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Binding distances computed by the resolver, keyed by expression identity.
///
/// Occurrences outside every function body are also listed as transient:
/// once their unit has run no code can reach them again, so the interpreter
/// drops them instead of keeping them for the rest of the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Locals {
    depths: HashMap<ExprId, usize>,
    transient: Vec<ExprId>,
}

impl Locals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note_local(&mut self, id: ExprId, depth: usize) {
        self.depths.insert(id, depth);
    }

    /// `None` means the name is global.
    pub fn depth_of(&self, id: ExprId) -> Option<usize> {
        self.depths.get(&id).copied()
    }

    /// Merge another unit's annotations into this one.
    pub fn extend(&mut self, other: Locals) {
        self.depths.extend(other.depths);
        self.transient.extend(other.transient);
    }

    /// Annotations that only top-level code of the unit refers to.
    pub fn transient(&self) -> &[ExprId] {
        &self.transient
    }

    /// Remove the given annotations.
    pub fn forget(&mut self, ids: &[ExprId]) {
        let gone: HashSet<ExprId> = ids.iter().copied().collect();
        for id in &gone {
            self.depths.remove(id);
        }
        self.transient.retain(|id| !gone.contains(id));
    }

    pub fn len(&self) -> usize {
        self.depths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depths.is_empty()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum VarStatus {
    Declared,
    Defined,
}

/// What kind of function body are we in?  Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

/// What kind of class body are we in?  Used to validate `this` / `super`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Resolver: tracks scopes, enforces static rules, and records binding
/// distances.
pub struct Resolver {
    scopes: Vec<HashMap<String, VarStatus>>,
    current_function: FunctionType,
    current_class: ClassType,
    locals: Locals,
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
            scopes: vec![HashMap::new()],
            current_function: FunctionType::None,
            current_class: ClassType::None,
            locals: Locals::new(),
            errors: Vec::new(),
        }
    }

    /// Walk all top‑level statements.  Returns the binding distances, or every
    /// static error found.
    pub fn resolve(&mut self, statements: &[Stmt]) -> Result<Locals> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        self.reset();

        for stmt in statements {
            self.resolve_stmt(stmt);
        }

        self.finish()
    }

    /// Resolve a lone expression as if it were a top‑level statement.
    pub fn resolve_expression(&mut self, expr: &Expr) -> Result<Locals> {
        self.reset();
        self.resolve_expr(expr);
        self.finish()
    }

    fn reset(&mut self) {
        self.scopes = vec![HashMap::new()];
        self.current_function = FunctionType::None;
        self.current_class = ClassType::None;
        self.errors.clear();
        self.locals = Locals::new();
    }

    fn finish(&mut self) -> Result<Locals> {
        if self.errors.is_empty() {
            info!("Resolved {} local binding(s)", self.locals.len());
            Ok(std::mem::take(&mut self.locals))
        } else {
            info!("Resolve pass found {} error(s)", self.errors.len());
            Err(LoxError::Composite(std::mem::take(&mut self.errors)))
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        stack::guarded(|| self.resolve_stmt_inner(stmt))
    }

    fn resolve_stmt_inner(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();
                for s in statements {
                    self.resolve_stmt(s);
                }
                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                // declare → resolve initializer → define
                self.declare(name);
                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }
                self.define(&name.lexeme);
            }

            Stmt::Function(decl) => {
                // the name is visible *inside* its own body (recursion)
                self.declare(&decl.name);
                self.define(&decl.name.lexeme);
                self.resolve_function(decl, FunctionType::Function);
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.resolve_class(name, superclass.as_ref(), methods),

            Stmt::Expression(expr) | Stmt::Print(expr) => self.resolve_expr(expr),

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
                    if self.current_function == FunctionType::Initializer {
                        self.error(keyword, "Can't return a value from an initializer.");
                    }
                    self.resolve_expr(expr);
                }
            }
        }
    }

    fn resolve_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) {
        let enclosing_class = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(name);
        self.define(&name.lexeme);

        if let Some(superclass) = superclass {
            self.current_class = ClassType::Subclass;

            if let Expr::Variable { name: super_name, .. } = superclass {
                if super_name.lexeme == name.lexeme {
                    self.error(super_name, "A class can't inherit from itself.");
                }
            }

            self.resolve_expr(superclass);

            self.begin_scope();
            self.define("super");
        }

        self.begin_scope();
        self.define("this");

        for method in methods {
            let kind = if method.name.lexeme == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };

            self.resolve_function(method, kind);
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
        stack::guarded(|| self.resolve_expr_inner(expr))
    }

    fn resolve_expr_inner(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => self.resolve_expr(inner),

            Expr::Unary { right, .. } => self.resolve_expr(right),

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Variable { id, name } => {
                let innermost = self.scopes.last().and_then(|s| s.get(&name.lexeme));

                if innermost == Some(&VarStatus::Declared) {
                    self.error(name, "Can't read local variable in its own initializer.");
                }

                self.resolve_local(*id, name);
            }

            Expr::Assign { id, name, value } => {
                // First resolve RHS, then bind LHS
                self.resolve_expr(value);
                self.resolve_local(*id, name);
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

            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    self.error(keyword, "Can't use 'this' outside of a class.");
                    return;
                }

                self.resolve_local(*id, keyword);
            }

            Expr::Super { id, keyword, .. } => {
                match self.current_class {
                    ClassType::None => {
                        self.error(keyword, "Can't use 'super' outside of a class.");
                        return;
                    }
                    ClassType::Class => {
                        self.error(
                            keyword,
                            "Can't use 'super' in a class with no superclass.",
                        );
                        return;
                    }
                    ClassType::Subclass => {}
                }

                self.resolve_local(*id, keyword);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function's parameters + body.
    fn resolve_function(&mut self, decl: &FunctionDecl, kind: FunctionType) {
        let enclosing = self.current_function;
        self.current_function = kind;

        self.begin_scope();
        for param in &decl.params {
            self.declare(param);
            self.define(&param.lexeme);
        }
        for stmt in &decl.body {
            self.resolve_stmt(stmt);
        }
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
        let duplicate = match self.scopes.last_mut() {
            Some(scope) if scope.contains_key(&name.lexeme) => true,
            Some(scope) => {
                scope.insert(name.lexeme.clone(), VarStatus::Declared);
                false
            }
            None => false,
        };

        if duplicate {
            self.error(name, "Already a variable with this name in this scope.");
        }
    }

    fn define(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), VarStatus::Defined);
        }
    }

    fn error(&mut self, token: &Token, message: &str) {
        self.errors.push(LoxError::resolve(token, message));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding‑distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this occurrence as a local at depth `d` (innermost match wins),
    /// or leave it unannotated if no scope declares it.
    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                debug!("Resolved '{}' at depth {}", name.lexeme, depth);
                self.locals.note_local(id, depth);
                if self.current_function == FunctionType::None {
                    self.locals.transient.push(id);
                }
                return;
            }
        }

        debug!("Resolved '{}' as global", name.lexeme);
    }
}
