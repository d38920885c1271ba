use core::fmt;
use std::{cell::RefCell, collections::HashMap, rc::Rc};

use itertools::Itertools;
use log::debug;

use crate::{error::SchemeError, procedure::Formals, value::Value};

/// Shared handle to a frame. Closures and child frames keep their parent
/// alive through it.
pub type Env = Rc<Frame>;

/// An environment frame binds symbols to values.
///
/// The parent is fixed at construction and only ever points at a frame that
/// already existed, so the chain of frames can never form a cycle.
pub struct Frame {
    bindings: RefCell<HashMap<Rc<str>, Value>>,
    parent: Option<Env>,
}

impl Frame {
    /// The global frame: no parent.
    pub fn root() -> Env {
        Rc::new(Self {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
        })
    }

    pub fn new(parent: &Env) -> Env {
        Rc::new(Self {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent.clone()),
        })
    }

    pub fn parent(&self) -> Option<&Env> {
        self.parent.as_ref()
    }

    pub fn is_global(&self) -> bool {
        self.parent.is_none()
    }

    pub fn define(&self, symbol: &str, value: Value) {
        self.bindings.borrow_mut().insert(Rc::from(symbol), value);
    }

    /// Whether this frame itself (not its parents) binds `symbol`.
    pub fn binds(&self, symbol: &str) -> bool {
        self.bindings.borrow().contains_key(symbol)
    }

    /// Finds the innermost binding of `symbol`.
    ///
    /// Presence is decided by the key alone, so a symbol bound to
    /// [`Value::Undefined`] shadows outer bindings like any other value.
    pub fn lookup(&self, symbol: &str) -> Result<Value, SchemeError> {
        let mut frame = self;
        loop {
            if let Some(value) = frame.bindings.borrow().get(symbol) {
                return Ok(value.clone());
            }
            match &frame.parent {
                Some(parent) => frame = &**parent,
                None => return Err(SchemeError::UnboundName(symbol.to_owned())),
            }
        }
    }

    /// A new frame whose parent is `parent`, binding `formals` to `values`
    /// positionally. A rest formal collects the surplus values into a list.
    pub fn make_child_frame(parent: &Env, formals: &Formals, values: Vec<Value>) -> Result<Env, SchemeError> {
        formals.check_arity(values.len())?;

        let child = Self::new(parent);
        let mut values = values.into_iter();
        for name in formals.required() {
            // check_arity guarantees enough values
            if let Some(value) = values.next() {
                child.define(name, value);
            }
        }
        if let Some(rest) = formals.rest() {
            child.define(rest, Value::list(values));
        }

        debug!("new frame {:?}", child);
        Ok(child)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(parent) = &self.parent else {
            return write!(f, "<Global Frame>");
        };
        let bindings = self
            .bindings
            .borrow()
            .iter()
            .map(|(name, value)| format!("{}: {}", name, value))
            .sorted()
            .join(", ");
        write!(f, "<{{{}}} -> {:?}>", bindings, parent)
    }
}
