use core::fmt;
use std::cell::RefCell;

use log::trace;

use crate::{environment::Env, error::SchemeError, interpreter::evaluate, value::Value};

enum State {
    Pending { expr: Value, env: Env },
    Forced(Value),
}

/// A delayed expression, evaluated at most once.
pub struct Promise {
    state: RefCell<State>,
}

impl Promise {
    pub fn new(expr: Value, env: Env) -> Self {
        Self { state: RefCell::new(State::Pending { expr, env }) }
    }

    pub fn is_forced(&self) -> bool {
        matches!(*self.state.borrow(), State::Forced(_))
    }

    /// Evaluates the wrapped expression on the first call and caches the
    /// result; later calls return the cached value. The expression and its
    /// environment are released once forced.
    ///
    /// The result must be a pair or nil, since promises back stream tails.
    pub fn force(&self) -> Result<Value, SchemeError> {
        let (expr, env) = match &*self.state.borrow() {
            State::Forced(value) => return Ok(value.clone()),
            State::Pending { expr, env } => (expr.clone(), env.clone()),
        };

        trace!("forcing promise {}", expr);
        let value = evaluate(&expr, &env)?;
        if !(value.is_nil() || value.is_pair()) {
            return Err(SchemeError::type_error(format!(
                "result of forcing a promise should be a pair or nil, but was {}",
                value
            )));
        }

        let mut state = self.state.borrow_mut();
        // Forcing the promise from inside its own expression already stored a value.
        if let State::Forced(cached) = &*state {
            return Ok(cached.clone());
        }
        *state = State::Forced(value.clone());
        Ok(value)
    }
}

impl fmt::Display for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.is_forced() { "" } else { "not " };
        write!(f, "#[promise ({}forced)]", status)
    }
}
