use crate::error::{LoxError, Result};
use crate::token::Token;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Shared handle to a scope frame.  Closures, bound methods and active calls
/// may all hold the same frame.
pub type Env = Rc<RefCell<Environment>>;

/// One scope frame: its own bindings plus a link to the enclosing frame.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Env>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Env) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Wrap into a shareable handle.
    pub fn into_shared(self) -> Env {
        Rc::new(RefCell::new(self))
    }

    /// Bind `name` in this frame, replacing any previous binding.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Dynamic lookup through the whole chain.  Used for globals only; locals
    /// go through [`Environment::get_at`].
    pub fn get(&self, name: &Token) -> Result<Value> {
        if let Some(value) = self.values.get(&name.lexeme) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(undefined(name))
        }
    }

    pub fn assign(&mut self, name: &Token, value: Value) -> Result<()> {
        if let Some(slot) = self.values.get_mut(&name.lexeme) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(undefined(name))
        }
    }

    /// The frame exactly `distance` links up the chain from `env`.
    pub fn ancestor(env: &Env, distance: usize) -> Option<Env> {
        let mut frame: Env = Rc::clone(env);

        for _ in 0..distance {
            let parent: Env = frame.borrow().enclosing.clone()?;
            frame = parent;
        }

        Some(frame)
    }

    /// Look `name` up in the frame `distance` links up, without walking
    /// further.
    pub fn get_at(env: &Env, distance: usize, name: &Token) -> Result<Value> {
        Self::lookup_at(env, distance, &name.lexeme).ok_or_else(|| undefined(name))
    }

    /// Like [`get_at`](Self::get_at) for names that never appear as a token,
    /// such as `this` and `super`.
    pub fn lookup_at(env: &Env, distance: usize, name: &str) -> Option<Value> {
        Self::ancestor(env, distance)?.borrow().values.get(name).cloned()
    }

    pub fn assign_at(env: &Env, distance: usize, name: &Token, value: Value) -> Result<()> {
        let frame: Env = Self::ancestor(env, distance).ok_or_else(|| undefined(name))?;
        let mut frame = frame.borrow_mut();

        match frame.values.get_mut(&name.lexeme) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(undefined(name)),
        }
    }
}

fn undefined(name: &Token) -> LoxError {
    LoxError::runtime(name, format!("Undefined variable '{}'.", name.lexeme))
}
