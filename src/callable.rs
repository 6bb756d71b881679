//! Callable runtime objects: user functions (closures, bound methods) and
//! host‑provided native functions.

use std::fmt;
use std::rc::Rc;

use crate::ast::FunctionDecl;
use crate::class::Instance;
use crate::environment::{Env, Environment};
use crate::value::Value;

/// Signature of a host function.  The `String` error becomes a runtime error
/// located at the call site.
pub type NativeFn = dyn Fn(&[Value]) -> Result<Value, String>;

/// A function provided by the host rather than written in Rox.
pub struct NativeFunction {
    pub name: String,
    pub arity: usize,
    func: Box<NativeFn>,
}

impl NativeFunction {
    pub fn new<F>(name: &str, arity: usize, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + 'static,
    {
        Self {
            name: name.to_string(),
            arity,
            func: Box::new(func),
        }
    }

    pub fn call(&self, arguments: &[Value]) -> Result<Value, String> {
        (self.func)(arguments)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

/// A user‑defined function together with the frame it closed over.
pub struct Function {
    pub declaration: Rc<FunctionDecl>,
    pub closure: Env,
    pub is_initializer: bool,
}

impl Function {
    pub fn new(declaration: Rc<FunctionDecl>, closure: Env, is_initializer: bool) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    /// Specialise this method to `instance`: a new frame defining `this`
    /// sits between the method body and its original closure.
    pub fn bind(&self, instance: Rc<Instance>) -> Function {
        let mut environment = Environment::with_enclosing(Rc::clone(&self.closure));
        environment.define("this", Value::Instance(instance));

        Function::new(
            Rc::clone(&self.declaration),
            environment.into_shared(),
            self.is_initializer,
        )
    }
}

// The closure may reach back to this function, so it is not printed.
impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name())
            .field("arity", &self.arity())
            .field("is_initializer", &self.is_initializer)
            .finish_non_exhaustive()
    }
}
