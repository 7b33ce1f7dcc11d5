//! Callable runtime objects: user functions, classes, instances, natives.
//!
//! Everything invocable flows through the interpreter's single call site,
//! which checks arity against `arity()` *before* any body statement runs.
//! Classes are themselves callable: calling one allocates an [`Instance`]
//! and runs its bound `init`, if any.

use crate::ast::FunctionDecl;
use crate::environment::{self, Environment};
use crate::error::Result;
use crate::interpreter::{Flow, Interpreter};
use crate::value::Value;
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A host-provided function injected into the global environment.
///
/// Natives know nothing about source locations; a failure comes back as a
/// bare message and the interpreter stamps the call-site line onto it.
pub struct NativeFn {
    pub name: String,
    pub arity: usize,
    pub func: fn(&[Value]) -> std::result::Result<Value, String>,
}

impl std::fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

/// A user-declared function value: shared declaration plus the environment
/// captured at its definition site.  The environment is aliased, not copied,
/// so sibling closures observe each other's assignments.
#[derive(Debug)]
pub struct LoxFunction {
    declaration: Rc<FunctionDecl>,
    closure: Rc<RefCell<Environment>>,
    is_initializer: bool,
}

impl LoxFunction {
    pub fn new(
        declaration: Rc<FunctionDecl>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
    ) -> Self {
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

    /// Produce a fresh function whose closure predefines `this`.
    /// Every property access on an instance binds anew, so each access
    /// yields an independently callable value.
    pub fn bind(&self, instance: Rc<RefCell<Instance>>) -> LoxFunction {
        let mut env = Environment::with_enclosing(Rc::clone(&self.closure));
        env.define("this", Value::Instance(instance));

        LoxFunction {
            declaration: Rc::clone(&self.declaration),
            closure: Rc::new(RefCell::new(env)),
            is_initializer: self.is_initializer,
        }
    }

    /// Execute the body in a child of the captured closure environment.
    /// Arity has already been validated by the caller.
    pub fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value> {
        debug!("Calling function '{}'", self.name());

        let mut env = Environment::with_enclosing(Rc::clone(&self.closure));

        for (param, value) in self.declaration.params.iter().zip(arguments) {
            env.define(&param.lexeme, value);
        }

        let flow = interpreter.execute_block(&self.declaration.body, Rc::new(RefCell::new(env)))?;

        // An initializer always evaluates to its instance; `return;` inside
        // it just exits early.
        if self.is_initializer {
            return environment::get_at(&self.closure, 0, "this", self.declaration.name.line);
        }

        match flow {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Nil),
        }
    }
}

/// A class: name, optional superclass, and its method table.  Shared (`Rc`)
/// between every instance it creates.
#[derive(Debug)]
pub struct LoxClass {
    pub name: String,
    superclass: Option<Rc<LoxClass>>,
    methods: HashMap<String, Rc<LoxFunction>>,
}

impl LoxClass {
    pub fn new(
        name: String,
        superclass: Option<Rc<LoxClass>>,
        methods: HashMap<String, Rc<LoxFunction>>,
    ) -> Self {
        Self {
            name,
            superclass,
            methods,
        }
    }

    /// Look `name` up on this class, then transitively up the superclass
    /// chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        if let Some(method) = self.methods.get(name) {
            return Some(Rc::clone(method));
        }

        self.superclass
            .as_ref()
            .and_then(|superclass| superclass.find_method(name))
    }

    /// Constructor arity: `init`'s arity when present, otherwise zero.
    pub fn arity(&self) -> usize {
        self.find_method("init").map_or(0, |init| init.arity())
    }
}

/// Call a class: allocate an instance, then run bound `init` if present.
/// `init`'s return value is discarded; the instance is the result.
pub fn instantiate(
    class: &Rc<LoxClass>,
    interpreter: &mut Interpreter,
    arguments: Vec<Value>,
) -> Result<Value> {
    debug!("Instantiating class '{}'", class.name);

    let instance = Rc::new(RefCell::new(Instance::new(Rc::clone(class))));

    if let Some(init) = class.find_method("init") {
        init.bind(Rc::clone(&instance)).call(interpreter, arguments)?;
    }

    Ok(Value::Instance(instance))
}

/// An object: its class (shared, never owned) and a mutable field map.
#[derive(Debug)]
pub struct Instance {
    pub class: Rc<LoxClass>,
    fields: HashMap<String, Value>,
}

impl Instance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        Self {
            class,
            fields: HashMap::new(),
        }
    }

    /// Field write; creates the field if absent.
    pub fn set(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }
}

/// Property lookup on an instance handle: fields shadow methods, and a found
/// method is bound to the instance before being returned.  Returns `None`
/// when neither exists; the interpreter turns that into the
/// undefined-property error (it owns the token for the message).
pub fn instance_get(instance: &Rc<RefCell<Instance>>, name: &str) -> Option<Value> {
    if let Some(value) = instance.borrow().fields.get(name) {
        return Some(value.clone());
    }

    let method = instance.borrow().class.find_method(name);

    method.map(|method| Value::Function(Rc::new(method.bind(Rc::clone(instance)))))
}
