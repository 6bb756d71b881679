//! Tree‑walking evaluator.
//!
//! The active environment is passed explicitly through `execute` / `evaluate`
//! so that leaving a block, a call, or an error path can never leave the
//! interpreter pointing at the wrong frame.  `return` is not an error: it
//! travels back up as [`Flow::Return`] until the enclosing call consumes it.

use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{Expr, ExprId, LiteralValue, Stmt};
use crate::builtins;
use crate::callable::{Function, NativeFunction};
use crate::class::{Class, Instance};
use crate::environment::{Env, Environment};
use crate::error::{LoxError, Result};
use crate::resolver::Locals;
use crate::stack;
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Default limit on nested calls before reporting a stack overflow.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

/// Tunables of an [`Interpreter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpreterConfig {
    /// Nested calls deeper than this fail with a runtime error instead of
    /// exhausting the host stack.
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

pub struct Interpreter {
    globals: Env,
    locals: Locals,
    config: InterpreterConfig,
    out: Box<dyn Write>,
    depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Interpreter printing to stdout, with the built‑ins registered.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Interpreter whose `print` statements write to `out`.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        info!("Initializing Interpreter");

        let mut interpreter = Self {
            globals: Environment::new().into_shared(),
            locals: Locals::new(),
            config: InterpreterConfig::default(),
            out,
            depth: 0,
        };

        for native in builtins::all() {
            debug!("Defining native function '{}'", native.name);
            interpreter.register(native);
        }

        interpreter
    }

    pub fn with_config(mut self, config: InterpreterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// Register a host function in the global frame.
    pub fn define_native<F>(&mut self, name: &str, arity: usize, func: F)
    where
        F: Fn(&[Value]) -> std::result::Result<Value, String> + 'static,
    {
        self.register(NativeFunction::new(name, arity, func));
    }

    fn register(&mut self, native: NativeFunction) {
        let name = native.name.clone();
        self.globals
            .borrow_mut()
            .define(&name, Value::Native(Rc::new(native)));
    }

    /// Adopt the binding distances computed by the resolver.
    pub fn absorb(&mut self, locals: Locals) {
        debug!("Absorbing {} resolved binding(s)", locals.len());
        self.locals.extend(locals);
    }

    /// Drop annotations whose nodes can no longer run.
    pub fn forget(&mut self, ids: &[ExprId]) {
        debug!("Forgetting {} resolved binding(s)", ids.len());
        self.locals.forget(ids);
    }

    /// Number of resolved bindings currently held.
    pub fn resolved_bindings(&self) -> usize {
        self.locals.len()
    }

    /// Current value of a global, if defined.
    pub fn global(&self, name: &str) -> Option<Value> {
        Environment::lookup_at(&self.globals, 0, name)
    }

    /// Interprets a list of statements (a "program") in the global frame.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        debug!("Interpreting {} statements", statements.len());

        let globals: Env = Rc::clone(&self.globals);
        self.depth = 0;

        for stmt in statements {
            if let Flow::Return(_) = self.execute(stmt, &globals)? {
                return Err(LoxError::Internal(
                    "'return' escaped to top level".to_string(),
                ));
            }
        }

        self.out.flush()?;

        info!("Interpretation completed successfully");
        Ok(())
    }

    /// Evaluates a lone expression in the global frame.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        let globals: Env = Rc::clone(&self.globals);
        self.depth = 0;

        let value = self.evaluate_in(expr, &globals)?;
        self.out.flush()?;

        Ok(value)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    fn execute(&mut self, stmt: &Stmt, env: &Env) -> Result<Flow> {
        stack::guarded(|| self.execute_stmt(stmt, env))
    }

    fn execute_stmt(&mut self, stmt: &Stmt, env: &Env) -> Result<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate_in(expr, env)?;
            }

            Stmt::Print(expr) => {
                let value = self.evaluate_in(expr, env)?;
                writeln!(self.out, "{}", value)?;
                debug!("Printed value: {}", value);
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate_in(expr, env)?,
                    None => Value::Nil,
                };
                debug!("Defining variable '{}' = {}", name.lexeme, value);
                env.borrow_mut().define(&name.lexeme, value);
            }

            Stmt::Block(statements) => {
                let block_env = Environment::with_enclosing(Rc::clone(env)).into_shared();
                return self.execute_block(statements, &block_env);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate_in(condition, env)?.is_truthy() {
                    return self.execute(then_branch, env);
                } else if let Some(else_stmt) = else_branch {
                    return self.execute(else_stmt, env);
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate_in(condition, env)?.is_truthy() {
                    if let Flow::Return(value) = self.execute(body, env)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }

            Stmt::Function(decl) => {
                debug!("Defining function '{}'", decl.name.lexeme);
                let function = Function::new(Rc::clone(decl), Rc::clone(env), false);
                env.borrow_mut()
                    .define(&decl.name.lexeme, Value::Function(Rc::new(function)));
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate_in(expr, env)?,
                    None => Value::Nil,
                };
                debug!("Returning value: {}", value);
                return Ok(Flow::Return(value));
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                let superclass: Option<Rc<Class>> = match superclass {
                    Some(expr) => match self.evaluate_in(expr, env)? {
                        Value::Class(class) => Some(class),
                        _ => {
                            let at: &Token = match expr {
                                Expr::Variable { name, .. } => name,
                                _ => name,
                            };
                            return Err(LoxError::runtime(at, "Superclass must be a class."));
                        }
                    },
                    None => None,
                };

                env.borrow_mut().define(&name.lexeme, Value::Nil);

                // Methods of a subclass close over a frame holding `super`.
                let method_env: Env = match &superclass {
                    Some(class) => {
                        let mut frame = Environment::with_enclosing(Rc::clone(env));
                        frame.define("super", Value::Class(Rc::clone(class)));
                        frame.into_shared()
                    }
                    None => Rc::clone(env),
                };

                let table: HashMap<String, Rc<Function>> = methods
                    .iter()
                    .map(|decl| {
                        let function = Function::new(
                            Rc::clone(decl),
                            Rc::clone(&method_env),
                            decl.name.lexeme == "init",
                        );
                        (decl.name.lexeme.clone(), Rc::new(function))
                    })
                    .collect();

                let class = Class::new(&name.lexeme, superclass, table);
                info!("Class '{}' defined", name.lexeme);

                env.borrow_mut()
                    .define(&name.lexeme, Value::Class(Rc::new(class)));
            }
        }

        Ok(Flow::Normal)
    }

    /// Run `statements` in `env`, stopping at the first `return`.
    fn execute_block(&mut self, statements: &[Stmt], env: &Env) -> Result<Flow> {
        for stmt in statements {
            if let Flow::Return(value) = self.execute(stmt, env)? {
                return Ok(Flow::Return(value));
            }
        }

        Ok(Flow::Normal)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    fn evaluate_in(&mut self, expr: &Expr, env: &Env) -> Result<Value> {
        stack::guarded(|| self.evaluate_expr(expr, env))
    }

    fn evaluate_expr(&mut self, expr: &Expr, env: &Env) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate_in(inner, env),

            Expr::Unary { operator, right } => {
                let right = self.evaluate_in(right, env)?;
                self.evaluate_unary(operator, right)
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate_in(left, env)?;
                let right = self.evaluate_in(right, env)?;
                evaluate_binary(operator, left, right)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate_in(left, env)?;

                let decided = match operator.token_type {
                    TokenType::OR => left.is_truthy(),
                    _ => !left.is_truthy(),
                };

                if decided {
                    Ok(left)
                } else {
                    self.evaluate_in(right, env)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name, env),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate_in(value, env)?;

                match self.locals.depth_of(*id) {
                    Some(distance) => Environment::assign_at(env, distance, name, value.clone())?,
                    None => self.globals.borrow_mut().assign(name, value.clone())?,
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate_in(callee, env)?;

                let mut args: Vec<Value> = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    args.push(self.evaluate_in(arg, env)?);
                }

                self.call_value(callee, args, paren)
            }

            Expr::Get { object, name } => match self.evaluate_in(object, env)? {
                Value::Instance(instance) => instance.get(name),
                _ => Err(LoxError::runtime(name, "Only instances have properties.")),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate_in(object, env)? else {
                    return Err(LoxError::runtime(name, "Only instances have fields."));
                };

                let value = self.evaluate_in(value, env)?;
                instance.set(name, value.clone());

                Ok(value)
            }

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword, env),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method, env),
        }
    }

    fn evaluate_unary(&self, operator: &Token, right: Value) -> Result<Value> {
        match operator.token_type {
            TokenType::MINUS => match right {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(LoxError::runtime(operator, "Operand of '-' must be a number.")),
            },

            TokenType::BANG => Ok(Value::Bool(!right.is_truthy())),

            _ => Err(LoxError::Internal(format!(
                "'{}' parsed as a unary operator",
                operator.lexeme
            ))),
        }
    }

    fn look_up_variable(&self, id: ExprId, name: &Token, env: &Env) -> Result<Value> {
        match self.locals.depth_of(id) {
            Some(distance) => Environment::get_at(env, distance, name),
            None => self.globals.borrow().get(name),
        }
    }

    /// `super.method`: `super` lives at the resolved distance, `this` one
    /// frame closer (the frame created by binding).
    fn evaluate_super(
        &mut self,
        id: ExprId,
        keyword: &Token,
        method: &Token,
        env: &Env,
    ) -> Result<Value> {
        let distance: usize = self.locals.depth_of(id).ok_or_else(|| {
            LoxError::Internal(format!("unresolved 'super' at line {}", keyword.line))
        })?;

        let Some(Value::Class(superclass)) = Environment::lookup_at(env, distance, "super") else {
            return Err(LoxError::Internal("'super' is not bound to a class".to_string()));
        };

        let this = distance
            .checked_sub(1)
            .and_then(|d| Environment::lookup_at(env, d, "this"));
        let Some(Value::Instance(instance)) = this else {
            return Err(LoxError::Internal("'this' is not bound to an instance".to_string()));
        };

        let found: Rc<Function> = superclass.find_method(&method.lexeme).ok_or_else(|| {
            LoxError::runtime(method, format!("Undefined property '{}'.", method.lexeme))
        })?;

        Ok(Value::Function(Rc::new(found.bind(instance))))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Calls
    // ─────────────────────────────────────────────────────────────────────────

    fn call_value(&mut self, callee: Value, args: Vec<Value>, paren: &Token) -> Result<Value> {
        let arity: usize = match &callee {
            Value::Native(native) => native.arity,
            Value::Function(function) => function.arity(),
            Value::Class(class) => class.arity(),
            _ => {
                return Err(LoxError::runtime(
                    paren,
                    "Can only call functions and classes.",
                ))
            }
        };

        if args.len() != arity {
            return Err(LoxError::runtime(
                paren,
                format!("Expected {} arguments but got {}.", arity, args.len()),
            ));
        }

        match callee {
            Value::Native(native) => {
                debug!("Calling native function '{}'", native.name);
                native
                    .call(&args)
                    .map_err(|message| LoxError::runtime(paren, message))
            }

            Value::Function(function) => self.call_function(&function, args, paren),

            Value::Class(class) => {
                debug!("Instantiating class '{}'", class.name);
                let instance = Rc::new(Instance::new(Rc::clone(&class)));

                if let Some(init) = class.find_method("init") {
                    let bound = init.bind(Rc::clone(&instance));
                    self.call_function(&bound, args, paren)?;
                }

                Ok(Value::Instance(instance))
            }

            _ => Err(LoxError::Internal("callee changed kind".to_string())),
        }
    }

    fn call_function(&mut self, function: &Function, args: Vec<Value>, paren: &Token) -> Result<Value> {
        if self.depth >= self.config.max_call_depth {
            return Err(LoxError::runtime(paren, "Stack overflow."));
        }

        debug!("Calling user-defined function '{}'", function.name());

        // One frame per call, parented at the closure, not at the caller.
        let mut frame = Environment::with_enclosing(Rc::clone(&function.closure));
        for (param, arg) in function.declaration.params.iter().zip(args) {
            frame.define(&param.lexeme, arg);
        }
        let frame: Env = frame.into_shared();

        self.depth += 1;
        let flow = self.execute_block(&function.declaration.body, &frame);
        self.depth -= 1;

        let flow = flow?;

        if function.is_initializer {
            return Environment::lookup_at(&function.closure, 0, "this").ok_or_else(|| {
                LoxError::Internal(format!("initializer '{}' is not bound", function.name()))
            });
        }

        Ok(match flow {
            Flow::Return(value) => value,
            Flow::Normal => Value::Nil,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Operators
// ─────────────────────────────────────────────────────────────────────────────

fn evaluate_binary(operator: &Token, left: Value, right: Value) -> Result<Value> {
    let op: &str = &operator.lexeme;

    match operator.token_type {
        TokenType::EQUAL_EQUAL => return Ok(Value::Bool(left == right)),
        TokenType::BANG_EQUAL => return Ok(Value::Bool(left != right)),
        _ => {}
    }

    match (&operator.token_type, left, right) {
        (TokenType::PLUS, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
        (TokenType::PLUS, Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
        (TokenType::PLUS, _, _) => Err(LoxError::runtime(
            operator,
            "Operands of '+' must be two numbers or two strings.",
        )),

        (TokenType::MINUS, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),
        (TokenType::STAR, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),
        (TokenType::SLASH, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a / b)),

        (TokenType::GREATER, Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a > b)),
        (TokenType::GREATER_EQUAL, Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a >= b)),
        (TokenType::LESS, Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a < b)),
        (TokenType::LESS_EQUAL, Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a <= b)),

        (TokenType::GREATER, Value::String(a), Value::String(b)) => Ok(Value::Bool(a > b)),
        (TokenType::GREATER_EQUAL, Value::String(a), Value::String(b)) => Ok(Value::Bool(a >= b)),
        (TokenType::LESS, Value::String(a), Value::String(b)) => Ok(Value::Bool(a < b)),
        (TokenType::LESS_EQUAL, Value::String(a), Value::String(b)) => Ok(Value::Bool(a <= b)),

        (TokenType::GREATER | TokenType::GREATER_EQUAL | TokenType::LESS | TokenType::LESS_EQUAL, _, _) => {
            Err(LoxError::runtime(
                operator,
                format!("Operands of '{}' must be two numbers or two strings.", op),
            ))
        }

        (TokenType::MINUS | TokenType::STAR | TokenType::SLASH, _, _) => Err(LoxError::runtime(
            operator,
            format!("Operands of '{}' must be numbers.", op),
        )),

        _ => Err(LoxError::Internal(format!(
            "'{}' parsed as a binary operator",
            op
        ))),
    }
}
