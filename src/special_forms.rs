use std::rc::Rc;

use log::debug;

use crate::{
    environment::{Env, Frame},
    error::SchemeError,
    interpreter::{eval_all, evaluate, scheme_eval, Evaluation, TailResult},
    procedure::{Formals, Lambda, Mu, Procedure},
    promise::Promise,
    value::Value,
};

/// A special form receives its operands unevaluated, along with the
/// environment the form appears in.
pub(crate) type SpecialForm = fn(&Value, &Env) -> TailResult;

pub(crate) fn lookup(name: &str) -> Option<SpecialForm> {
    let form: SpecialForm = match name {
        "and" => do_and_form,
        "begin" => do_begin_form,
        "cond" => do_cond_form,
        "cons-stream" => do_cons_stream_form,
        "define" => do_define_form,
        "define-macro" => do_define_macro,
        "delay" => do_delay_form,
        "if" => do_if_form,
        "lambda" => do_lambda_form,
        "let" => do_let_form,
        "mu" => do_mu_form,
        "or" => do_or_form,
        "quasiquote" => do_quasiquote_form,
        "quote" => do_quote_form,
        "unquote" => do_unquote,
        _ => return None,
    };
    Some(form)
}

/// Checks that `expr` is a proper list with at least `min` and at most `max`
/// elements, and returns those elements.
pub(crate) fn validate_form(expr: &Value, min: usize, max: Option<usize>) -> Result<Vec<Value>, SchemeError> {
    if !expr.is_list() {
        return Err(SchemeError::malformed(format!("badly formed expression: {}", expr)));
    }
    let elements = expr.to_vec()?;
    if elements.len() < min {
        return Err(SchemeError::malformed("too few operands in form"));
    }
    if max.is_some_and(|max| elements.len() > max) {
        return Err(SchemeError::malformed("too many operands in form"));
    }
    Ok(elements)
}

// Everything after the first element of a validated, non-empty form.
fn rest_of(expr: &Value) -> Value {
    expr.as_pair().map_or(Value::Nil, |pair| pair.rest.clone())
}

fn done(value: Value) -> TailResult {
    Ok(Evaluation::Done(value))
}

fn do_quote_form(expressions: &Value, _env: &Env) -> TailResult {
    let operands = validate_form(expressions, 1, Some(1))?;
    done(operands[0].clone())
}

fn do_if_form(expressions: &Value, env: &Env) -> TailResult {
    let operands = validate_form(expressions, 2, Some(3))?;
    if evaluate(&operands[0], env)?.is_true() {
        scheme_eval(&operands[1], env, true)
    } else if let Some(alternative) = operands.get(2) {
        scheme_eval(alternative, env, true)
    } else {
        done(Value::Undefined)
    }
}

// `and` stops at the first false value, `or` at the first true one. The last
// operand is in tail position.
fn short_circuit(expressions: &Value, env: &Env, stop_on: bool, empty: bool) -> TailResult {
    let operands = validate_form(expressions, 0, None)?;
    let Some((last, init)) = operands.split_last() else {
        return done(Value::Boolean(empty));
    };
    for operand in init {
        let value = evaluate(operand, env)?;
        if value.is_true() == stop_on {
            return done(value);
        }
    }
    scheme_eval(last, env, true)
}

fn do_and_form(expressions: &Value, env: &Env) -> TailResult {
    short_circuit(expressions, env, false, true)
}

fn do_or_form(expressions: &Value, env: &Env) -> TailResult {
    short_circuit(expressions, env, true, false)
}

fn do_cond_form(expressions: &Value, env: &Env) -> TailResult {
    let clauses = validate_form(expressions, 0, None)?;
    for (index, clause) in clauses.iter().enumerate() {
        let parts = validate_form(clause, 1, None)?;
        let test = if parts[0].as_symbol() == Some("else") {
            if index + 1 != clauses.len() {
                return Err(SchemeError::malformed("else must be last"));
            }
            Value::Boolean(true)
        } else {
            evaluate(&parts[0], env)?
        };

        if test.is_true() {
            let body = rest_of(clause);
            if body.is_nil() {
                return done(test);
            }
            return eval_all(&body, env);
        }
    }
    done(Value::Undefined)
}

fn do_begin_form(expressions: &Value, env: &Env) -> TailResult {
    validate_form(expressions, 0, None)?;
    eval_all(expressions, env)
}

fn do_define_form(expressions: &Value, env: &Env) -> TailResult {
    let operands = validate_form(expressions, 2, None)?;
    match &operands[0] {
        Value::Symbol(name) => {
            if operands.len() > 2 {
                return Err(SchemeError::malformed("too many operands in form"));
            }
            let value = evaluate(&operands[1], env)?;
            debug!("define {} = {}", name, value);
            env.define(name, value);
            done(operands[0].clone())
        }
        // (define (name . formals) body...) binds a lambda
        Value::Pair(target) => {
            let Some(name) = target.first.as_symbol() else {
                return Err(SchemeError::malformed(format!("non-symbol: {}", target.first)));
            };
            let lambda = Lambda::new(target.rest.clone(), rest_of(expressions), env.clone())?;
            debug!("define procedure {}", name);
            env.define(name, Value::Procedure(Procedure::Lambda(Rc::new(lambda))));
            done(target.first.clone())
        }
        other => Err(SchemeError::malformed(format!("non-symbol: {}", other))),
    }
}

fn do_lambda_form(expressions: &Value, env: &Env) -> TailResult {
    let operands = validate_form(expressions, 2, None)?;
    let lambda = Lambda::new(operands[0].clone(), rest_of(expressions), env.clone())?;
    done(Value::Procedure(Procedure::Lambda(Rc::new(lambda))))
}

fn do_mu_form(expressions: &Value, _env: &Env) -> TailResult {
    let operands = validate_form(expressions, 2, None)?;
    let mu = Mu::new(operands[0].clone(), rest_of(expressions))?;
    done(Value::Procedure(Procedure::Mu(Rc::new(mu))))
}

fn do_let_form(expressions: &Value, env: &Env) -> TailResult {
    let operands = validate_form(expressions, 2, None)?;
    let let_env = make_let_frame(&operands[0], env)?;
    eval_all(&rest_of(expressions), &let_env)
}

/// A child frame of `env` binding every `(name value)` pair of `bindings`.
/// All values are evaluated in `env` before any name is bound.
fn make_let_frame(bindings: &Value, env: &Env) -> Result<Env, SchemeError> {
    if !bindings.is_list() {
        return Err(SchemeError::malformed("bad bindings list in let form"));
    }

    let mut names = vec![];
    let mut values = vec![];
    for binding in bindings.iter() {
        let binding = validate_form(binding, 2, Some(2))?;
        names.push(binding[0].clone());
        values.push(evaluate(&binding[1], env)?);
    }

    let formals = Formals::parse(&Value::list(names))?;
    Frame::make_child_frame(env, &formals, values)
}

fn do_define_macro(expressions: &Value, env: &Env) -> TailResult {
    let operands = validate_form(expressions, 2, None)?;
    let Value::Pair(target) = &operands[0] else {
        return Err(SchemeError::malformed(format!("wrong macro form: {}", operands[0])));
    };
    let Some(name) = target.first.as_symbol() else {
        return Err(SchemeError::malformed(format!("non-symbol: {}", target.first)));
    };

    let with_macro = Lambda::new(target.rest.clone(), rest_of(expressions), env.clone())?;
    debug!("define macro {}", name);
    env.define(name, Value::Procedure(Procedure::Macro(Rc::new(with_macro))));
    done(target.first.clone())
}

// Rebuilds `value`, evaluating the unquotes that sit at nesting level zero.
fn quasiquote_item(value: &Value, env: &Env, level: usize) -> Result<Value, SchemeError> {
    let Value::Pair(pair) = value else {
        return Ok(value.clone());
    };

    let level = match pair.first.as_symbol() {
        Some("unquote") => {
            let level = level - 1;
            if level == 0 {
                let operands = validate_form(&pair.rest, 1, Some(1))?;
                return evaluate(&operands[0], env);
            }
            level
        }
        Some("quasiquote") => level + 1,
        _ => level,
    };

    value.map_elements(|element| quasiquote_item(element, env, level))
}

fn do_quasiquote_form(expressions: &Value, env: &Env) -> TailResult {
    let operands = validate_form(expressions, 1, Some(1))?;
    quasiquote_item(&operands[0], env, 1).map(Evaluation::Done)
}

fn do_unquote(_expressions: &Value, _env: &Env) -> TailResult {
    Err(SchemeError::UnquoteOutsideQuasiquote)
}

fn do_delay_form(expressions: &Value, env: &Env) -> TailResult {
    let operands = validate_form(expressions, 1, Some(1))?;
    done(Value::Promise(Rc::new(Promise::new(operands[0].clone(), env.clone()))))
}

fn do_cons_stream_form(expressions: &Value, env: &Env) -> TailResult {
    let operands = validate_form(expressions, 2, Some(2))?;
    let first = evaluate(&operands[0], env)?;
    let rest = Value::Promise(Rc::new(Promise::new(operands[1].clone(), env.clone())));
    done(Value::cons(first, rest))
}
