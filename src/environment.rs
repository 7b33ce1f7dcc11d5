//! Runtime scope chain.
//!
//! One `Environment` per lexical scope, linked to its enclosing scope and
//! shared through `Rc<RefCell<_>>`: closures alias their defining scope, so
//! an assignment through one alias is visible through every other.
//!
//! `get`/`assign` walk the chain dynamically and exist for names the
//! resolver left unresolved (globals).  `get_at`/`assign_at` walk exactly
//! the resolver-computed number of hops and never search.

use crate::error::{LoxError, Result};
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Insert or overwrite `name` in this scope unconditionally.
    /// Same-scope redeclaration is this layer's business to allow; the
    /// resolver is the one place that rejects it.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Dynamic lookup: this scope first, then outward along the chain.
    pub fn get(&self, name: &str, line: usize) -> Result<Value> {
        if let Some(value) = self.values.get(name) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name, line)
        } else {
            Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            ))
        }
    }

    /// Dynamic assignment: nearest scope already holding `name` wins.
    pub fn assign(&mut self, name: &str, value: Value, line: usize) -> Result<()> {
        if self.values.contains_key(name) {
            self.values.insert(name.to_string(), value);
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value, line)
        } else {
            Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            ))
        }
    }
}

/// Walk exactly `distance` `enclosing` links from `env`.
///
/// The resolver guarantees the chain is deep enough; a short chain would be
/// an interpreter bug, surfaced as a runtime error rather than a panic.
fn ancestor(env: &Rc<RefCell<Environment>>, distance: usize, line: usize) -> Result<Rc<RefCell<Environment>>> {
    let mut current = Rc::clone(env);

    for _ in 0..distance {
        let next = match &current.borrow().enclosing {
            Some(enclosing) => Rc::clone(enclosing),
            None => {
                return Err(LoxError::runtime(
                    line,
                    "Scope chain shorter than resolved depth.",
                ));
            }
        };

        current = next;
    }

    Ok(current)
}

/// Read `name` exactly `distance` hops up the chain.
pub fn get_at(
    env: &Rc<RefCell<Environment>>,
    distance: usize,
    name: &str,
    line: usize,
) -> Result<Value> {
    let scope = ancestor(env, distance, line)?;

    let value = scope.borrow().values.get(name).cloned();

    value.ok_or_else(|| LoxError::runtime(line, format!("Undefined variable '{}'.", name)))
}

/// Write `name` exactly `distance` hops up the chain.
pub fn assign_at(
    env: &Rc<RefCell<Environment>>,
    distance: usize,
    name: &str,
    value: Value,
    line: usize,
) -> Result<()> {
    let scope = ancestor(env, distance, line)?;

    scope.borrow_mut().values.insert(name.to_string(), value);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_and_get_in_single_scope() {
        let mut env = Environment::new();
        env.define("a", Value::Number(1.0));
        env.define("b", Value::Number(2.0));

        assert_eq!(env.get("a", 1).unwrap(), Value::Number(1.0));
        assert_eq!(env.get("b", 1).unwrap(), Value::Number(2.0));
        assert!(env.get("c", 1).is_err());
    }

    #[test]
    fn inner_scope_shadows_without_clobbering_outer() {
        let global = Rc::new(RefCell::new(Environment::new()));
        global.borrow_mut().define("a", Value::Number(1.0));

        let inner = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
            &global,
        ))));
        inner.borrow_mut().define("a", Value::Number(3.0));

        assert_eq!(inner.borrow().get("a", 1).unwrap(), Value::Number(3.0));
        assert_eq!(global.borrow().get("a", 1).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn assign_walks_to_declaring_scope() {
        let global = Rc::new(RefCell::new(Environment::new()));
        global.borrow_mut().define("a", Value::Number(1.0));

        let inner = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
            &global,
        ))));

        inner
            .borrow_mut()
            .assign("a", Value::Number(9.0), 1)
            .unwrap();

        assert_eq!(global.borrow().get("a", 1).unwrap(), Value::Number(9.0));
        assert!(inner.borrow_mut().assign("missing", Value::Nil, 1).is_err());
    }

    #[test]
    fn exact_hop_accessors_skip_shadowing_scopes() {
        let global = Rc::new(RefCell::new(Environment::new()));
        global.borrow_mut().define("a", Value::Number(1.0));

        let mid = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
            &global,
        ))));
        mid.borrow_mut().define("a", Value::Number(2.0));

        let leaf = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(&mid))));

        assert_eq!(get_at(&leaf, 1, "a", 1).unwrap(), Value::Number(2.0));
        assert_eq!(get_at(&leaf, 2, "a", 1).unwrap(), Value::Number(1.0));

        assign_at(&leaf, 2, "a", Value::Number(7.0), 1).unwrap();
        assert_eq!(global.borrow().get("a", 1).unwrap(), Value::Number(7.0));
        assert_eq!(mid.borrow().get("a", 1).unwrap(), Value::Number(2.0));
    }
}
