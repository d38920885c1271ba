use core::fmt;
use std::rc::Rc;

use itertools::Itertools;

use crate::{error::SchemeError, procedure::Procedure, promise::Promise};

/// A cons cell. Lists are chains of pairs terminated by [`Value::Nil`].
#[derive(Clone)]
pub struct Pair {
    pub first: Value,
    pub rest: Value,
}

// Code and data share this representation. Everything the reader produces is
// built from atoms and pairs; procedures and promises only appear at runtime.
#[derive(Clone)]
pub enum Value {
    Nil,
    Undefined,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Symbol(Rc<str>),
    Str(Rc<str>),
    Pair(Rc<Pair>),
    Procedure(Procedure),
    Promise(Rc<Promise>),
}

impl Value {
    pub fn cons(first: Value, rest: Value) -> Self {
        Self::Pair(Rc::new(Pair { first, rest }))
    }

    pub fn symbol(name: &str) -> Self {
        Self::Symbol(Rc::from(name))
    }

    pub fn string(text: &str) -> Self {
        Self::Str(Rc::from(text))
    }

    /// Builds a proper list out of `values`.
    pub fn list(values: impl IntoIterator<Item = Value>) -> Self {
        let mut values = values.into_iter().collect_vec();
        let mut list = Self::Nil;
        while let Some(value) = values.pop() {
            list = Self::cons(value, list);
        }
        list
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Self::Symbol(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_pair(&self) -> Option<&Pair> {
        match self {
            Self::Pair(pair) => Some(pair),
            _ => None,
        }
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, Self::Symbol(_))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    pub fn is_pair(&self) -> bool {
        matches!(self, Self::Pair(_))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Float(_))
    }

    /// Every value except `#f` counts as true.
    pub fn is_true(&self) -> bool {
        !self.is_false()
    }

    pub fn is_false(&self) -> bool {
        matches!(self, Self::Boolean(false))
    }

    /// Anything that is neither a symbol nor a pair evaluates to itself.
    pub fn is_self_evaluating(&self) -> bool {
        !matches!(self, Self::Symbol(_) | Self::Pair(_))
    }

    /// Whether this is a proper list: nil, or pairs ending in nil.
    pub fn is_list(&self) -> bool {
        let mut current = self;
        loop {
            match current {
                Self::Nil => return true,
                Self::Pair(pair) => current = &pair.rest,
                _ => return false,
            }
        }
    }

    pub fn iter(&self) -> ListIter<'_> {
        ListIter { current: self }
    }

    /// Length of a proper list; fails for anything else.
    pub fn len(&self) -> Result<usize, SchemeError> {
        if !self.is_list() {
            return Err(SchemeError::type_error(format!("length attempted on improper list: {}", self)));
        }
        Ok(self.iter().count())
    }

    /// Elements of a proper list.
    pub fn to_vec(&self) -> Result<Vec<Value>, SchemeError> {
        if !self.is_list() {
            return Err(SchemeError::malformed(format!("malformed list: {}", self)));
        }
        Ok(self.iter().cloned().collect())
    }

    /// Rebuilds the list spine applying `f` to every element. An improper
    /// tail is kept as it is.
    pub fn map_elements(
        &self,
        mut f: impl FnMut(&Value) -> Result<Value, SchemeError>,
    ) -> Result<Value, SchemeError> {
        let mut mapped = Vec::new();
        let mut current = self;
        while let Self::Pair(pair) = current {
            mapped.push(f(&pair.first)?);
            current = &pair.rest;
        }

        let mut result = current.clone();
        while let Some(value) = mapped.pop() {
            result = Self::cons(value, result);
        }
        Ok(result)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Undefined => "undefined",
            Self::Boolean(_) => "bool",
            Self::Integer(_) => "int",
            Self::Float(_) => "float",
            Self::Symbol(_) => "symbol",
            Self::Str(_) => "string",
            Self::Pair(_) => "pair",
            Self::Procedure(_) => "procedure",
            Self::Promise(_) => "promise",
        }
    }

    /// Identity comparison, with numbers, symbols and strings compared by value.
    pub fn is_eqv(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) | (Self::Undefined, Self::Undefined) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Symbol(a), Self::Symbol(b)) | (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Pair(a), Self::Pair(b)) => Rc::ptr_eq(a, b),
            (Self::Procedure(a), Self::Procedure(b)) => a.ptr_eq(b),
            (Self::Promise(a), Self::Promise(b)) => Rc::ptr_eq(a, b),
            (a, b) if a.is_number() && b.is_number() => numeric_eq(a, b),
            _ => false,
        }
    }

    /// Structural comparison of pairs, [`Value::is_eqv`] everywhere else.
    pub fn is_equal(&self, other: &Value) -> bool {
        let (mut a, mut b) = (self, other);
        loop {
            match (a, b) {
                (Self::Pair(x), Self::Pair(y)) => {
                    if !x.first.is_equal(&y.first) {
                        return false;
                    }
                    a = &x.rest;
                    b = &y.rest;
                }
                _ => return a.is_eqv(b),
            }
        }
    }

    /// A wrapper whose `Display` prints strings without quotes, the way the
    /// `display` builtin shows them.
    pub fn display(&self) -> Displayed<'_> {
        Displayed(self)
    }
}

fn numeric_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Integer(a), Value::Integer(b)) => a == b,
        (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => *a as f64 == *b,
        (Value::Float(a), Value::Float(b)) => a == b,
        _ => false,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.is_equal(other)
    }
}

pub struct ListIter<'a> {
    current: &'a Value,
}

impl<'a> Iterator for ListIter<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<Self::Item> {
        match self.current {
            Value::Pair(pair) => {
                self.current = &pair.rest;
                Some(&pair.first)
            }
            _ => None,
        }
    }
}

pub struct Displayed<'a>(&'a Value);

impl fmt::Display for Displayed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self.0, false)
    }
}

fn write_float(f: &mut fmt::Formatter<'_>, value: f64) -> fmt::Result {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        write!(f, "{:.1}", value)
    } else {
        write!(f, "{}", value)
    }
}

fn write_string(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    write!(f, "\"")?;
    for c in text.chars() {
        match c {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            c => write!(f, "{}", c)?,
        }
    }
    write!(f, "\"")
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &Value, quoted: bool) -> fmt::Result {
    match value {
        Value::Nil => write!(f, "()"),
        Value::Undefined => write!(f, "undefined"),
        Value::Boolean(true) => write!(f, "#t"),
        Value::Boolean(false) => write!(f, "#f"),
        Value::Integer(number) => write!(f, "{}", number),
        Value::Float(number) => write_float(f, *number),
        Value::Symbol(name) => write!(f, "{}", name),
        Value::Str(text) if quoted => write_string(f, text),
        Value::Str(text) => write!(f, "{}", text),
        Value::Procedure(procedure) => write!(f, "{}", procedure),
        Value::Promise(promise) => write!(f, "{}", promise),
        Value::Pair(pair) => {
            write!(f, "(")?;
            write_value(f, &pair.first, quoted)?;
            let mut rest = &pair.rest;
            loop {
                match rest {
                    Value::Nil => break,
                    Value::Pair(pair) => {
                        write!(f, " ")?;
                        write_value(f, &pair.first, quoted)?;
                        rest = &pair.rest;
                    }
                    tail => {
                        write!(f, " . ")?;
                        write_value(f, tail, quoted)?;
                        break;
                    }
                }
            }
            write!(f, ")")
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_value(f, self, true)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        (self as &dyn fmt::Display).fmt(f)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(values: &[i64]) -> Value {
        Value::list(values.iter().map(|n| Value::Integer(*n)))
    }

    #[test]
    fn prints_lists_and_dotted_pairs() {
        assert_eq!(numbers(&[1, 2, 3]).to_string(), "(1 2 3)");
        assert_eq!(Value::cons(1.into(), 2.into()).to_string(), "(1 . 2)");
        assert_eq!(Value::cons(1.into(), Value::cons(2.into(), 3.into())).to_string(), "(1 2 . 3)");
        assert_eq!(Value::Nil.to_string(), "()");
    }

    #[test]
    fn prints_atoms() {
        assert_eq!(Value::Float(3.0).to_string(), "3.0");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Boolean(false).to_string(), "#f");
        assert_eq!(Value::string("a\"b").to_string(), "\"a\\\"b\"");
        assert_eq!(Value::string("hi").display().to_string(), "hi");
    }

    #[test]
    fn proper_and_improper_lists() {
        assert!(numbers(&[1, 2]).is_list());
        assert!(Value::Nil.is_list());
        let improper = Value::cons(1.into(), 2.into());
        assert!(!improper.is_list());
        assert!(improper.to_vec().is_err());
        assert_eq!(numbers(&[4, 5, 6]).len(), Ok(3));
    }

    #[test]
    fn map_keeps_improper_tail() -> Result<(), SchemeError> {
        let improper = Value::cons(1.into(), Value::cons(2.into(), 3.into()));
        let doubled = improper.map_elements(|v| match v {
            Value::Integer(n) => Ok(Value::Integer(n * 2)),
            other => Ok(other.clone()),
        })?;
        assert_eq!(doubled.to_string(), "(2 4 . 3)");
        Ok(())
    }

    #[test]
    fn equivalence() {
        let list = numbers(&[1, 2]);
        assert!(list.is_eqv(&list.clone()));
        assert!(!list.is_eqv(&numbers(&[1, 2])));
        assert!(list.is_equal(&numbers(&[1, 2])));
        assert!(Value::Integer(2).is_eqv(&Value::Float(2.0)));
        assert!(Value::symbol("a").is_eqv(&Value::symbol("a")));
    }
}
