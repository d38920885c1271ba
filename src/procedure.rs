use core::fmt;
use std::{collections::HashSet, rc::Rc};

use crate::{environment::Env, error::SchemeError, value::Value};

pub type PrimitiveFn = fn(Vec<Value>) -> Result<Value, SchemeError>;
pub type EnvPrimitiveFn = fn(Vec<Value>, &Env) -> Result<Value, SchemeError>;

/// How many arguments a procedure accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    min: usize,
    max: Option<usize>,
}

impl Arity {
    pub const fn exact(count: usize) -> Self {
        Self { min: count, max: Some(count) }
    }

    pub const fn at_least(min: usize) -> Self {
        Self { min, max: None }
    }

    pub const fn range(min: usize, max: usize) -> Self {
        Self { min, max: Some(max) }
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }

    pub fn validate(&self, name: &str, count: usize) -> Result<(), SchemeError> {
        if self.accepts(count) {
            return Ok(());
        }
        let problem = if count < self.min { "too few" } else { "too many" };
        Err(SchemeError::Arity(format!(
            "{} arguments to {}: expected {}, got {}",
            problem, name, self, count
        )))
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "{}", max),
            Some(max) => write!(f, "{} to {}", self.min, max),
            None => write!(f, "at least {}", self.min),
        }
    }
}

/// A validated parameter list: distinct symbols, optionally ending in a
/// rest symbol (`(a b . rest)` or a bare `args`).
#[derive(Debug, Clone)]
pub struct Formals {
    required: Vec<Rc<str>>,
    rest: Option<Rc<str>>,
}

impl Formals {
    pub fn parse(formals: &Value) -> Result<Self, SchemeError> {
        let mut seen = HashSet::new();
        let mut claim = |value: &Value| -> Result<Rc<str>, SchemeError> {
            let Value::Symbol(name) = value else {
                return Err(SchemeError::malformed(format!("non-symbol: {}", value)));
            };
            if !seen.insert(name.clone()) {
                return Err(SchemeError::DuplicateFormal(name.to_string()));
            }
            Ok(name.clone())
        };

        let mut required = Vec::new();
        let mut current = formals;
        while let Value::Pair(pair) = current {
            required.push(claim(&pair.first)?);
            current = &pair.rest;
        }
        let rest = match current {
            Value::Nil => None,
            tail => Some(claim(tail)?),
        };

        Ok(Self { required, rest })
    }

    pub fn required(&self) -> impl Iterator<Item = &str> {
        self.required.iter().map(|name| &**name)
    }

    pub fn rest(&self) -> Option<&str> {
        self.rest.as_deref()
    }

    pub fn arity(&self) -> Arity {
        match self.rest {
            Some(_) => Arity::at_least(self.required.len()),
            None => Arity::exact(self.required.len()),
        }
    }

    pub fn check_arity(&self, count: usize) -> Result<(), SchemeError> {
        self.arity().validate("function call", count)
    }
}

#[derive(Clone, Copy)]
pub enum BuiltinFn {
    Plain(PrimitiveFn),
    /// Receives the calling environment after the arguments.
    WithEnv(EnvPrimitiveFn),
}

/// A procedure implemented in Rust.
pub struct Builtin {
    name: &'static str,
    arity: Arity,
    func: BuiltinFn,
}

impl Builtin {
    pub fn new(name: &'static str, arity: Arity, func: PrimitiveFn) -> Self {
        Self { name, arity, func: BuiltinFn::Plain(func) }
    }

    pub fn with_env(name: &'static str, arity: Arity, func: EnvPrimitiveFn) -> Self {
        Self { name, arity, func: BuiltinFn::WithEnv(func) }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn uses_env(&self) -> bool {
        matches!(self.func, BuiltinFn::WithEnv(_))
    }

    pub fn call(&self, args: Vec<Value>, env: &Env) -> Result<Value, SchemeError> {
        self.arity.validate(self.name, args.len())?;
        match self.func {
            BuiltinFn::Plain(func) => func(args),
            BuiltinFn::WithEnv(func) => func(args, env),
        }
    }
}

/// A user-defined procedure: `lambda`, `define` and `define-macro` build these.
pub struct Lambda {
    formals: Value,
    params: Formals,
    body: Value,
    env: Env,
}

impl Lambda {
    pub fn new(formals: Value, body: Value, env: Env) -> Result<Self, SchemeError> {
        let params = Formals::parse(&formals)?;
        Ok(Self { formals, params, body, env })
    }

    pub fn params(&self) -> &Formals {
        &self.params
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn env(&self) -> &Env {
        &self.env
    }
}

/// A dynamically scoped procedure. It has no defining environment: calls
/// extend the caller's environment instead.
pub struct Mu {
    formals: Value,
    params: Formals,
    body: Value,
}

impl Mu {
    pub fn new(formals: Value, body: Value) -> Result<Self, SchemeError> {
        let params = Formals::parse(&formals)?;
        Ok(Self { formals, params, body })
    }

    pub fn params(&self) -> &Formals {
        &self.params
    }

    pub fn body(&self) -> &Value {
        &self.body
    }
}

#[derive(Clone)]
pub enum Procedure {
    Builtin(Rc<Builtin>),
    Lambda(Rc<Lambda>),
    /// Shares the shape of a lambda but receives unevaluated operands, and
    /// its result is evaluated again at the call site.
    Macro(Rc<Lambda>),
    Mu(Rc<Mu>),
}

impl Procedure {
    pub fn ptr_eq(&self, other: &Procedure) -> bool {
        match (self, other) {
            (Self::Builtin(a), Self::Builtin(b)) => Rc::ptr_eq(a, b),
            (Self::Lambda(a), Self::Lambda(b)) | (Self::Macro(a), Self::Macro(b)) => Rc::ptr_eq(a, b),
            (Self::Mu(a), Self::Mu(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<Builtin> for Value {
    fn from(builtin: Builtin) -> Self {
        Value::Procedure(Procedure::Builtin(Rc::new(builtin)))
    }
}

fn write_form(f: &mut fmt::Formatter<'_>, keyword: &str, formals: &Value, body: &Value) -> fmt::Result {
    let form = Value::cons(Value::symbol(keyword), Value::cons(formals.clone(), body.clone()));
    write!(f, "{}", form)
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin(builtin) => write!(f, "#[{}]", builtin.name),
            Self::Lambda(lambda) => write_form(f, "lambda", &lambda.formals, &lambda.body),
            Self::Macro(lambda) => write_form(f, "macro", &lambda.formals, &lambda.body),
            Self::Mu(mu) => write_form(f, "mu", &mu.formals, &mu.body),
        }
    }
}
