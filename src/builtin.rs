use std::cmp::Ordering;

use itertools::Itertools;
use log::debug;

use crate::{
    context::{scheme_load, scheme_load_all, write_output},
    environment::{Env, Frame},
    error::SchemeError,
    interpreter::{complete_apply, evaluate, validate_procedure},
    procedure::{Arity, Builtin},
    value::Value,
};

type BuiltinResult = Result<Value, SchemeError>;

fn wrong_type(name: &str, index: usize, value: &Value) -> SchemeError {
    SchemeError::type_error(format!(
        "argument {} of {} has wrong type ({})",
        index,
        name,
        value.type_name()
    ))
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn from_value(name: &str, index: usize, value: &Value) -> Result<Self, SchemeError> {
        match value {
            Value::Integer(integer) => Ok(Self::Int(*integer)),
            Value::Float(float) => Ok(Self::Float(*float)),
            other => Err(wrong_type(name, index, other)),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Self::Int(integer) => integer as f64,
            Self::Float(float) => float,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Self::Int(integer) => integer == 0,
            Self::Float(float) => float == 0.0,
        }
    }

    fn compare(self, other: Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

impl From<Number> for Value {
    fn from(number: Number) -> Self {
        match number {
            Number::Int(integer) => Value::Integer(integer),
            Number::Float(float) => Value::Float(float),
        }
    }
}

fn numbers(name: &str, values: &[Value]) -> Result<Vec<Number>, SchemeError> {
    values
        .iter()
        .enumerate()
        .map(|(index, value)| Number::from_value(name, index, value))
        .collect()
}

fn overflow(name: &str) -> SchemeError {
    SchemeError::type_error(format!("integer overflow in {}", name))
}

fn division_by_zero(name: &str) -> SchemeError {
    SchemeError::Arithmetic(format!("division by zero in {}", name))
}

// Exact when both operands are integers, floating point otherwise.
fn combine(
    name: &str,
    a: Number,
    b: Number,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Number, SchemeError> {
    match (a, b) {
        (Number::Int(a), Number::Int(b)) => int_op(a, b).map(Number::Int).ok_or_else(|| overflow(name)),
        (a, b) => Ok(Number::Float(float_op(a.as_f64(), b.as_f64()))),
    }
}

fn builtin_add(values: Vec<Value>) -> BuiltinResult {
    let mut sum = Number::Int(0);
    for number in numbers("+", &values)? {
        sum = combine("+", sum, number, i64::checked_add, |a, b| a + b)?;
    }
    Ok(sum.into())
}

fn builtin_mul(values: Vec<Value>) -> BuiltinResult {
    let mut product = Number::Int(1);
    for number in numbers("*", &values)? {
        product = combine("*", product, number, i64::checked_mul, |a, b| a * b)?;
    }
    Ok(product.into())
}

fn builtin_sub(values: Vec<Value>) -> BuiltinResult {
    let values = numbers("-", &values)?;
    let subtract = |a, b| combine("-", a, b, i64::checked_sub, |a, b| a - b);

    if let [only] = values[..] {
        return Ok(subtract(Number::Int(0), only)?.into());
    }
    let mut difference = values[0];
    for &number in &values[1..] {
        difference = subtract(difference, number)?;
    }
    Ok(difference.into())
}

fn divide(a: Number, b: Number) -> Result<Number, SchemeError> {
    if b.is_zero() {
        return Err(division_by_zero("/"));
    }
    match (a, b) {
        (Number::Int(a), Number::Int(b)) if a.checked_rem(b) == Some(0) => {
            a.checked_div(b).map(Number::Int).ok_or_else(|| overflow("/"))
        }
        (a, b) => Ok(Number::Float(a.as_f64() / b.as_f64())),
    }
}

fn builtin_div(values: Vec<Value>) -> BuiltinResult {
    let values = numbers("/", &values)?;
    if let [only] = values[..] {
        return Ok(divide(Number::Int(1), only)?.into());
    }
    let mut quotient = values[0];
    for &number in &values[1..] {
        quotient = divide(quotient, number)?;
    }
    Ok(quotient.into())
}

fn integer_division(
    name: &str,
    values: &[Value],
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> BuiltinResult {
    let values = numbers(name, values)?;
    let (a, b) = (values[0], values[1]);
    if b.is_zero() {
        return Err(division_by_zero(name));
    }
    Ok(combine(name, a, b, int_op, float_op)?.into())
}

fn builtin_quotient(values: Vec<Value>) -> BuiltinResult {
    integer_division("quotient", &values, i64::checked_div, |a, b| (a / b).trunc())
}

fn builtin_remainder(values: Vec<Value>) -> BuiltinResult {
    integer_division("remainder", &values, i64::checked_rem, |a, b| a % b)
}

// The result takes the sign of the divisor.
fn builtin_modulo(values: Vec<Value>) -> BuiltinResult {
    integer_division(
        "modulo",
        &values,
        |a, b| {
            let remainder = a.checked_rem(b)?;
            if remainder != 0 && (remainder < 0) != (b < 0) {
                remainder.checked_add(b)
            } else {
                Some(remainder)
            }
        },
        |a, b| {
            let remainder = a % b;
            if remainder != 0.0 && (remainder < 0.0) != (b < 0.0) {
                remainder + b
            } else {
                remainder
            }
        },
    )
}

fn builtin_abs(values: Vec<Value>) -> BuiltinResult {
    match Number::from_value("abs", 0, &values[0])? {
        Number::Int(integer) => integer.checked_abs().map(Value::Integer).ok_or_else(|| overflow("abs")),
        Number::Float(float) => Ok(Value::Float(float.abs())),
    }
}

fn builtin_expt(values: Vec<Value>) -> BuiltinResult {
    let values = numbers("expt", &values)?;
    match (values[0], values[1]) {
        (Number::Int(base), Number::Int(exponent)) if exponent >= 0 => {
            let exponent = u32::try_from(exponent).map_err(|_| overflow("expt"))?;
            base.checked_pow(exponent).map(Value::Integer).ok_or_else(|| overflow("expt"))
        }
        (base, exponent) => Ok(Value::Float(base.as_f64().powf(exponent.as_f64()))),
    }
}

fn extreme(name: &str, values: Vec<Value>, keep: Ordering) -> BuiltinResult {
    let numbers = numbers(name, &values)?;
    let mut best = 0;
    for (index, number) in numbers.iter().enumerate().skip(1) {
        if number.compare(numbers[best]) == Some(keep) {
            best = index;
        }
    }
    Ok(numbers[best].into())
}

fn builtin_min(values: Vec<Value>) -> BuiltinResult {
    extreme("min", values, Ordering::Less)
}

fn builtin_max(values: Vec<Value>) -> BuiltinResult {
    extreme("max", values, Ordering::Greater)
}

fn builtin_compare_impl(values: &[Number], f: fn(Ordering) -> bool) -> bool {
    if values.len() < 2 {
        return true;
    }
    values[0].compare(values[1]).is_some_and(f) && builtin_compare_impl(&values[1..], f)
}

fn builtin_compare(name: &str, values: Vec<Value>, f: fn(Ordering) -> bool) -> BuiltinResult {
    let values = numbers(name, &values)?;
    Ok(Value::Boolean(builtin_compare_impl(&values, f)))
}

fn builtin_eq(values: Vec<Value>) -> BuiltinResult {
    builtin_compare("=", values, Ordering::is_eq)
}

fn builtin_less(values: Vec<Value>) -> BuiltinResult {
    builtin_compare("<", values, Ordering::is_lt)
}

fn builtin_greater(values: Vec<Value>) -> BuiltinResult {
    builtin_compare(">", values, Ordering::is_gt)
}

fn builtin_less_eq(values: Vec<Value>) -> BuiltinResult {
    builtin_compare("<=", values, Ordering::is_le)
}

fn builtin_greater_eq(values: Vec<Value>) -> BuiltinResult {
    builtin_compare(">=", values, Ordering::is_ge)
}

fn integer_arg(name: &str, value: &Value) -> Result<i64, SchemeError> {
    match value {
        Value::Integer(integer) => Ok(*integer),
        other => Err(wrong_type(name, 0, other)),
    }
}

fn builtin_even(values: Vec<Value>) -> BuiltinResult {
    Ok(Value::Boolean(integer_arg("even?", &values[0])? % 2 == 0))
}

fn builtin_odd(values: Vec<Value>) -> BuiltinResult {
    Ok(Value::Boolean(integer_arg("odd?", &values[0])? % 2 != 0))
}

fn builtin_zero(values: Vec<Value>) -> BuiltinResult {
    Ok(Value::Boolean(Number::from_value("zero?", 0, &values[0])?.is_zero()))
}

fn builtin_number(values: Vec<Value>) -> BuiltinResult {
    Ok(Value::Boolean(values[0].is_number()))
}

fn builtin_integer(values: Vec<Value>) -> BuiltinResult {
    let integral = match values[0] {
        Value::Integer(_) => true,
        Value::Float(float) => float.fract() == 0.0,
        _ => false,
    };
    Ok(Value::Boolean(integral))
}

fn builtin_eqv(values: Vec<Value>) -> BuiltinResult {
    Ok(Value::Boolean(values[0].is_eqv(&values[1])))
}

fn builtin_equal(values: Vec<Value>) -> BuiltinResult {
    Ok(Value::Boolean(values[0].is_equal(&values[1])))
}

fn builtin_not(values: Vec<Value>) -> BuiltinResult {
    Ok(Value::Boolean(values[0].is_false()))
}

fn builtin_boolean(values: Vec<Value>) -> BuiltinResult {
    Ok(Value::Boolean(matches!(values[0], Value::Boolean(_))))
}

fn builtin_symbol(values: Vec<Value>) -> BuiltinResult {
    Ok(Value::Boolean(values[0].is_symbol()))
}

fn builtin_string(values: Vec<Value>) -> BuiltinResult {
    Ok(Value::Boolean(matches!(values[0], Value::Str(_))))
}

fn builtin_null(values: Vec<Value>) -> BuiltinResult {
    Ok(Value::Boolean(values[0].is_nil()))
}

fn builtin_pair(values: Vec<Value>) -> BuiltinResult {
    Ok(Value::Boolean(values[0].is_pair()))
}

fn builtin_list_p(values: Vec<Value>) -> BuiltinResult {
    Ok(Value::Boolean(values[0].is_list()))
}

fn builtin_procedure(values: Vec<Value>) -> BuiltinResult {
    Ok(Value::Boolean(matches!(values[0], Value::Procedure(_))))
}

fn builtin_promise(values: Vec<Value>) -> BuiltinResult {
    Ok(Value::Boolean(matches!(values[0], Value::Promise(_))))
}

fn builtin_cons(mut values: Vec<Value>) -> BuiltinResult {
    let rest = values.pop().unwrap_or(Value::Nil);
    let first = values.pop().unwrap_or(Value::Nil);
    Ok(Value::cons(first, rest))
}

fn builtin_car(values: Vec<Value>) -> BuiltinResult {
    match values[0].as_pair() {
        Some(pair) => Ok(pair.first.clone()),
        None => Err(wrong_type("car", 0, &values[0])),
    }
}

fn builtin_cdr(values: Vec<Value>) -> BuiltinResult {
    match values[0].as_pair() {
        Some(pair) => Ok(pair.rest.clone()),
        None => Err(wrong_type("cdr", 0, &values[0])),
    }
}

fn builtin_list(values: Vec<Value>) -> BuiltinResult {
    Ok(Value::list(values))
}

fn builtin_length(values: Vec<Value>) -> BuiltinResult {
    if !values[0].is_list() {
        return Err(wrong_type("length", 0, &values[0]));
    }
    let length = values[0].iter().count();
    i64::try_from(length).map(Value::Integer).map_err(|_| overflow("length"))
}

// Every argument but the last is copied; the last becomes the shared tail.
fn builtin_append(mut values: Vec<Value>) -> BuiltinResult {
    let Some(mut result) = values.pop() else {
        return Ok(Value::Nil);
    };
    for (index, list) in values.iter().enumerate().rev() {
        if !list.is_list() {
            return Err(wrong_type("append", index, list));
        }
        for element in list.iter().collect_vec().into_iter().rev() {
            result = Value::cons(element.clone(), result);
        }
    }
    Ok(result)
}

fn builtin_force(values: Vec<Value>) -> BuiltinResult {
    match &values[0] {
        Value::Promise(promise) => promise.force(),
        other => Err(wrong_type("force", 0, other)),
    }
}

fn builtin_cdr_stream(values: Vec<Value>) -> BuiltinResult {
    match values[0].as_pair().map(|pair| &pair.rest) {
        Some(Value::Promise(promise)) => promise.force(),
        _ => Err(wrong_type("cdr-stream", 0, &values[0])),
    }
}

fn builtin_string_append(values: Vec<Value>) -> BuiltinResult {
    let mut text = String::new();
    for (index, value) in values.iter().enumerate() {
        match value {
            Value::Str(part) => text.push_str(part),
            other => return Err(wrong_type("string-append", index, other)),
        }
    }
    Ok(Value::string(&text))
}

fn builtin_symbol_to_string(values: Vec<Value>) -> BuiltinResult {
    match values[0].as_symbol() {
        Some(name) => Ok(Value::string(name)),
        None => Err(wrong_type("symbol->string", 0, &values[0])),
    }
}

fn builtin_string_to_symbol(values: Vec<Value>) -> BuiltinResult {
    match &values[0] {
        Value::Str(text) => Ok(Value::symbol(text)),
        other => Err(wrong_type("string->symbol", 0, other)),
    }
}

fn write_text(text: &str) -> BuiltinResult {
    write_output(text)?;
    Ok(Value::Undefined)
}

fn builtin_display(values: Vec<Value>) -> BuiltinResult {
    write_text(&values[0].display().to_string())
}

fn builtin_displayln(values: Vec<Value>) -> BuiltinResult {
    write_text(&format!("{}\n", values[0].display()))
}

fn builtin_print(values: Vec<Value>) -> BuiltinResult {
    write_text(&format!("{}\n", values[0]))
}

fn builtin_newline(_values: Vec<Value>) -> BuiltinResult {
    write_text("\n")
}

fn builtin_error(values: Vec<Value>) -> BuiltinResult {
    let message = match values.first() {
        Some(Value::Str(text)) => text.to_string(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    Err(SchemeError::UserError(message))
}

fn builtin_eval(values: Vec<Value>, env: &Env) -> BuiltinResult {
    evaluate(&values[0], env)
}

fn builtin_apply(values: Vec<Value>, env: &Env) -> BuiltinResult {
    let procedure = validate_procedure(&values[0])?;
    if !values[1].is_list() {
        return Err(wrong_type("apply", 1, &values[1]));
    }
    complete_apply(&procedure, values[1].to_vec()?, env)
}

fn file_name(name: &str, value: &Value) -> Result<String, SchemeError> {
    match value {
        Value::Symbol(text) | Value::Str(text) => Ok(text.to_string()),
        other => Err(wrong_type(name, 0, other)),
    }
}

fn builtin_load(values: Vec<Value>, env: &Env) -> BuiltinResult {
    let name = file_name("load", &values[0])?;
    let quiet = values.get(1).map_or(true, Value::is_true);
    scheme_load(&name, quiet, env)?;
    Ok(Value::Undefined)
}

fn builtin_load_all(values: Vec<Value>, env: &Env) -> BuiltinResult {
    let directory = file_name("load-all", &values[0])?;
    scheme_load_all(&directory, env)?;
    Ok(Value::Undefined)
}

fn list_argument(name: &str, index: usize, value: &Value) -> Result<Vec<Value>, SchemeError> {
    if !value.is_list() {
        return Err(wrong_type(name, index, value));
    }
    value.to_vec()
}

fn builtin_map(values: Vec<Value>, env: &Env) -> BuiltinResult {
    let function = validate_procedure(&values[0])?;
    let mapped = list_argument("map", 1, &values[1])?
        .into_iter()
        .map(|element| complete_apply(&function, vec![element], env))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::list(mapped))
}

fn builtin_filter(values: Vec<Value>, env: &Env) -> BuiltinResult {
    let function = validate_procedure(&values[0])?;
    let mut kept = vec![];
    for element in list_argument("filter", 1, &values[1])? {
        if complete_apply(&function, vec![element.clone()], env)?.is_true() {
            kept.push(element);
        }
    }
    Ok(Value::list(kept))
}

fn builtin_reduce(values: Vec<Value>, env: &Env) -> BuiltinResult {
    let function = validate_procedure(&values[0])?;
    let mut elements = list_argument("reduce", 1, &values[1])?.into_iter();
    let Some(mut accumulator) = elements.next() else {
        return Err(wrong_type("reduce", 1, &values[1]));
    };
    for element in elements {
        accumulator = complete_apply(&function, vec![accumulator, element], env)?;
    }
    Ok(accumulator)
}

fn builtins() -> Vec<Builtin> {
    vec![
        Builtin::new("+", Arity::at_least(0), builtin_add),
        Builtin::new("-", Arity::at_least(1), builtin_sub),
        Builtin::new("*", Arity::at_least(0), builtin_mul),
        Builtin::new("/", Arity::at_least(1), builtin_div),
        Builtin::new("quotient", Arity::exact(2), builtin_quotient),
        Builtin::new("modulo", Arity::exact(2), builtin_modulo),
        Builtin::new("remainder", Arity::exact(2), builtin_remainder),
        Builtin::new("abs", Arity::exact(1), builtin_abs),
        Builtin::new("expt", Arity::exact(2), builtin_expt),
        Builtin::new("min", Arity::at_least(1), builtin_min),
        Builtin::new("max", Arity::at_least(1), builtin_max),
        Builtin::new("=", Arity::at_least(1), builtin_eq),
        Builtin::new("<", Arity::at_least(1), builtin_less),
        Builtin::new(">", Arity::at_least(1), builtin_greater),
        Builtin::new("<=", Arity::at_least(1), builtin_less_eq),
        Builtin::new(">=", Arity::at_least(1), builtin_greater_eq),
        Builtin::new("even?", Arity::exact(1), builtin_even),
        Builtin::new("odd?", Arity::exact(1), builtin_odd),
        Builtin::new("zero?", Arity::exact(1), builtin_zero),
        Builtin::new("number?", Arity::exact(1), builtin_number),
        Builtin::new("integer?", Arity::exact(1), builtin_integer),
        Builtin::new("eq?", Arity::exact(2), builtin_eqv),
        Builtin::new("eqv?", Arity::exact(2), builtin_eqv),
        Builtin::new("equal?", Arity::exact(2), builtin_equal),
        Builtin::new("not", Arity::exact(1), builtin_not),
        Builtin::new("boolean?", Arity::exact(1), builtin_boolean),
        Builtin::new("symbol?", Arity::exact(1), builtin_symbol),
        Builtin::new("string?", Arity::exact(1), builtin_string),
        Builtin::new("null?", Arity::exact(1), builtin_null),
        Builtin::new("pair?", Arity::exact(1), builtin_pair),
        Builtin::new("list?", Arity::exact(1), builtin_list_p),
        Builtin::new("procedure?", Arity::exact(1), builtin_procedure),
        Builtin::new("promise?", Arity::exact(1), builtin_promise),
        Builtin::new("cons", Arity::exact(2), builtin_cons),
        Builtin::new("car", Arity::exact(1), builtin_car),
        Builtin::new("cdr", Arity::exact(1), builtin_cdr),
        Builtin::new("list", Arity::at_least(0), builtin_list),
        Builtin::new("length", Arity::exact(1), builtin_length),
        Builtin::new("append", Arity::at_least(0), builtin_append),
        Builtin::new("force", Arity::exact(1), builtin_force),
        Builtin::new("cdr-stream", Arity::exact(1), builtin_cdr_stream),
        Builtin::new("string-append", Arity::at_least(0), builtin_string_append),
        Builtin::new("symbol->string", Arity::exact(1), builtin_symbol_to_string),
        Builtin::new("string->symbol", Arity::exact(1), builtin_string_to_symbol),
        Builtin::new("display", Arity::exact(1), builtin_display),
        Builtin::new("displayln", Arity::exact(1), builtin_displayln),
        Builtin::new("print", Arity::exact(1), builtin_print),
        Builtin::new("newline", Arity::exact(0), builtin_newline),
        Builtin::new("error", Arity::range(0, 1), builtin_error),
        Builtin::with_env("eval", Arity::exact(1), builtin_eval),
        Builtin::with_env("apply", Arity::exact(2), builtin_apply),
        Builtin::with_env("load", Arity::range(1, 2), builtin_load),
        Builtin::with_env("load-all", Arity::exact(1), builtin_load_all),
        Builtin::with_env("map", Arity::exact(2), builtin_map),
        Builtin::with_env("filter", Arity::exact(2), builtin_filter),
        Builtin::with_env("reduce", Arity::exact(2), builtin_reduce),
    ]
}

/// A fresh global frame holding every builtin procedure.
pub fn create_global_frame() -> Env {
    let env = Frame::root();
    for builtin in builtins() {
        env.define(builtin.name(), builtin.into());
    }
    env.define("undefined", Value::Undefined);
    debug!("global frame ready");
    env
}

#[cfg(test)]
mod tests {
    use crate::{context::Interpreter, interpreter::EvaluationResult};

    use super::*;

    fn run(source: &str) -> EvaluationResult {
        Interpreter::new().evaluate_str(source)
    }

    fn printed(source: &str) -> String {
        match run(source) {
            Ok(value) => value.to_string(),
            Err(err) => err.name().to_owned(),
        }
    }

    #[test]
    fn integer_arithmetic_stays_exact() {
        assert_eq!(printed("(+ 1 2 3)"), "6");
        assert_eq!(printed("(+)"), "0");
        assert_eq!(printed("(*)"), "1");
        assert_eq!(printed("(- 5)"), "-5");
        assert_eq!(printed("(- 10 1 2)"), "7");
        assert_eq!(printed("(* 2 3 4)"), "24");
    }

    #[test]
    fn floats_are_contagious() {
        assert_eq!(printed("(+ 1 2.5)"), "3.5");
        assert_eq!(printed("(* 2 1.5)"), "3.0");
        assert_eq!(printed("(- 1.0)"), "-1.0");
    }

    #[test]
    fn division() {
        assert_eq!(printed("(/ 6 3)"), "2");
        assert_eq!(printed("(/ 7 2)"), "3.5");
        assert_eq!(printed("(/ 4)"), "0.25");
        assert_eq!(printed("(/ 1 0)"), "ArithmeticError");
        assert_eq!(printed("(/ 1.0 0)"), "ArithmeticError");
    }

    #[test]
    fn integer_division_family() {
        assert_eq!(printed("(quotient 7 2)"), "3");
        assert_eq!(printed("(quotient -7 2)"), "-3");
        assert_eq!(printed("(remainder -7 2)"), "-1");
        assert_eq!(printed("(modulo -7 2)"), "1");
        assert_eq!(printed("(modulo 7 -2)"), "-1");
        assert_eq!(printed("(modulo 7 0)"), "ArithmeticError");
    }

    #[test]
    fn overflow_is_a_type_error() {
        assert_eq!(printed("(* 9223372036854775807 2)"), "TypeError");
        assert_eq!(printed("(expt 2 64)"), "TypeError");
        assert_eq!(printed("(expt 2 10)"), "1024");
        assert_eq!(printed("(expt 2 -1)"), "0.5");
    }

    #[test]
    fn min_max_abs() {
        assert_eq!(printed("(min 3 1 2)"), "1");
        assert_eq!(printed("(max 3 1.5 2)"), "3");
        assert_eq!(printed("(abs -4)"), "4");
        assert_eq!(printed("(abs -4.5)"), "4.5");
    }

    #[test]
    fn comparisons_chain() {
        assert_eq!(printed("(< 1 2 3)"), "#t");
        assert_eq!(printed("(< 1 3 2)"), "#f");
        assert_eq!(printed("(= 2 2.0)"), "#t");
        assert_eq!(printed("(>= 3 3 1)"), "#t");
        assert_eq!(printed("(< 1 'a)"), "TypeError");
    }

    #[test]
    fn numeric_predicates() {
        assert_eq!(printed("(even? 4)"), "#t");
        assert_eq!(printed("(odd? -3)"), "#t");
        assert_eq!(printed("(zero? 0.0)"), "#t");
        assert_eq!(printed("(integer? 2.0)"), "#t");
        assert_eq!(printed("(integer? 2.5)"), "#f");
        assert_eq!(printed("(number? 'x)"), "#f");
    }

    #[test]
    fn type_errors_name_the_argument() {
        let error = run("(+ 1 'a)").unwrap_err();
        assert_eq!(error.to_string(), "argument 1 of + has wrong type (symbol)");
        assert_eq!(printed("(car 1)"), "TypeError");
        assert_eq!(printed("(car)"), "ArityError");
    }

    #[test]
    fn equivalence() {
        assert_eq!(printed("(eq? 'a 'a)"), "#t");
        assert_eq!(printed("(eq? (list 1) (list 1))"), "#f");
        assert_eq!(printed("(equal? (list 1 (list 2)) '(1 (2)))"), "#t");
        assert_eq!(printed("(define x (list 1)) (eqv? x x)"), "#t");
        assert_eq!(printed("(not 0)"), "#f");
        assert_eq!(printed("(not #f)"), "#t");
    }

    #[test]
    fn type_predicates() {
        assert_eq!(printed("(list (boolean? #f) (symbol? 'a) (string? \"s\") (null? nil))"), "(#t #t #t #t)");
        assert_eq!(printed("(list (pair? '(1)) (list? '(1 . 2)) (procedure? car) (promise? (delay 1)))"), "(#t #f #t #t)");
    }

    #[test]
    fn list_operations() {
        assert_eq!(printed("(cons 1 2)"), "(1 . 2)");
        assert_eq!(printed("(car '(1 2))"), "1");
        assert_eq!(printed("(cdr '(1 2))"), "(2)");
        assert_eq!(printed("(length '(1 2 3))"), "3");
        assert_eq!(printed("(length '(1 . 2))"), "TypeError");
        assert_eq!(printed("(append '(1 2) '(3) '() '(4 . 5))"), "(1 2 3 4 . 5)");
        assert_eq!(printed("(append)"), "()");
    }

    #[test]
    fn strings_and_symbols() {
        assert_eq!(printed("(string-append \"ab\" \"cd\")"), "\"abcd\"");
        assert_eq!(printed("(symbol->string 'abc)"), "\"abc\"");
        assert_eq!(printed("(string->symbol \"abc\")"), "abc");
    }

    #[test]
    fn error_raises_user_error() {
        let error = run("(error \"something broke\")").unwrap_err();
        assert_eq!(error, SchemeError::UserError("something broke".to_owned()));
        assert_eq!(printed("(error)"), "UserError");
    }

    #[test]
    fn higher_order_builtins() {
        assert_eq!(printed("(map (lambda (x) (* x x)) '(1 2 3))"), "(1 4 9)");
        assert_eq!(printed("(filter odd? '(1 2 3 4 5))"), "(1 3 5)");
        assert_eq!(printed("(filter (lambda (x) x) '(1 #f 2))"), "(1 2)");
        assert_eq!(printed("(reduce + '(1 2 3 4))"), "10");
        assert_eq!(printed("(reduce + nil)"), "TypeError");
        assert_eq!(printed("(map car 5)"), "TypeError");
        assert_eq!(printed("(map 5 '(1))"), "NotCallableError");
    }

    #[test]
    fn apply_and_eval() {
        assert_eq!(printed("(apply + '(1 2 3))"), "6");
        assert_eq!(printed("(apply (lambda (x y) (- x y)) (list 5 2))"), "3");
        assert_eq!(printed("(eval '(* 2 21))"), "42");
        assert_eq!(printed("(define (f) (define y 7) (eval 'y)) (f)"), "7");
    }

    #[test]
    fn streams() {
        assert_eq!(printed("(force (delay (list 1 2)))"), "(1 2)");
        assert_eq!(printed("(force 1)"), "TypeError");
        assert_eq!(printed("(cdr-stream (cons-stream 1 nil))"), "()");
        assert_eq!(printed("(cdr-stream '(1 2))"), "TypeError");
    }

    #[test]
    fn global_frame_contents() -> anyhow::Result<()> {
        let env = create_global_frame();
        assert!(env.is_global());
        assert!(env.lookup("undefined")?.is_undefined());
        assert_eq!(env.lookup("car")?.to_string(), "#[car]");
        assert!(matches!(env.lookup("exit"), Err(SchemeError::UnboundName(_))));
        Ok(())
    }
}
