use std::cell::Cell;

use log::{trace, warn};

use crate::{
    environment::{Env, Frame},
    error::SchemeError,
    procedure::{Lambda, Procedure},
    special_forms,
    value::Value,
};

pub type EvaluationResult = Result<Value, SchemeError>;
pub type TailResult = Result<Evaluation, SchemeError>;

/// Default nesting limit for [`evaluate`].
pub const DEFAULT_MAX_DEPTH: usize = 10_000;

// Remaining stack below which `evaluate` moves onto a fresh segment, and the
// size of that segment.
const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
    static MAX_DEPTH: Cell<usize> = const { Cell::new(DEFAULT_MAX_DEPTH) };
}

// Counts nested calls of `evaluate` on this thread, so runaway non-tail
// recursion is reported as an error instead of overflowing the host stack.
struct DepthGuard;

impl DepthGuard {
    fn enter() -> Result<Self, SchemeError> {
        let depth = DEPTH.with(Cell::get) + 1;
        let limit = MAX_DEPTH.with(Cell::get);
        if depth > limit {
            warn!("recursion limit of {} reached", limit);
            return Err(SchemeError::RecursionDepthExceeded);
        }
        DEPTH.with(|cell| cell.set(depth));
        Ok(Self)
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DEPTH.with(|cell| cell.set(cell.get() - 1));
    }
}

/// Runs `f` with the evaluation nesting limit set to `limit`.
pub fn with_max_depth<T>(limit: usize, f: impl FnOnce() -> T) -> T {
    let previous = MAX_DEPTH.with(|cell| cell.replace(limit));
    let result = f();
    MAX_DEPTH.with(|cell| cell.set(previous));
    result
}

/// An expression still to be evaluated in an environment.
pub struct Thunk {
    expr: Value,
    env: Env,
}

/// Outcome of one evaluation step: a value, or a tail expression the caller
/// has to keep evaluating.
pub enum Evaluation {
    Done(Value),
    Thunk(Thunk),
}

impl Evaluation {
    /// Runs the trampoline until a value comes out.
    pub fn resolve(self) -> EvaluationResult {
        match self {
            Self::Done(value) => Ok(value),
            Self::Thunk(Thunk { expr, env }) => evaluate(&expr, &env),
        }
    }
}

/// Evaluates `expr` in `env`.
///
/// In tail position anything but a symbol or a self-evaluating atom is handed
/// back as a thunk, leaving the loop in [`evaluate`] to continue with it.
pub fn scheme_eval(expr: &Value, env: &Env, tail: bool) -> TailResult {
    if tail && !expr.is_symbol() && !expr.is_self_evaluating() {
        return Ok(Evaluation::Thunk(Thunk {
            expr: expr.clone(),
            env: env.clone(),
        }));
    }
    evaluate(expr, env).map(Evaluation::Done)
}

/// Evaluates `expr` in `env` to a value. Tail calls are run iteratively, so
/// they do not grow the host stack.
///
/// Nested evaluations grow the stack on demand, so the depth limit is reached
/// before the host stack is exhausted whatever thread this runs on.
pub fn evaluate(expr: &Value, env: &Env) -> EvaluationResult {
    let _guard = DepthGuard::enter()?;
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || run_trampoline(expr, env))
}

fn run_trampoline(expr: &Value, env: &Env) -> EvaluationResult {
    let mut result = eval_step(expr, env)?;
    loop {
        match result {
            Evaluation::Done(value) => return Ok(value),
            Evaluation::Thunk(thunk) => {
                trace!("tail call {}", thunk.expr);
                result = eval_step(&thunk.expr, &thunk.env)?;
            }
        }
    }
}

fn eval_step(expr: &Value, env: &Env) -> TailResult {
    if let Some(name) = expr.as_symbol() {
        return env.lookup(name).map(Evaluation::Done);
    }
    if expr.is_self_evaluating() {
        return Ok(Evaluation::Done(expr.clone()));
    }

    // All non-atomic expressions are combinations
    let Some(pair) = expr.as_pair().filter(|_| expr.is_list()) else {
        return Err(SchemeError::malformed(format!("malformed list: {}", expr)));
    };

    if let Some(form) = pair.first.as_symbol().and_then(special_forms::lookup) {
        return form(&pair.rest, env);
    }

    let procedure = validate_procedure(&evaluate(&pair.first, env)?)?;
    if let Procedure::Macro(with_macro) = &procedure {
        let expansion = apply_macro(with_macro, &pair.rest)?;
        return evaluate(&expansion, env).map(Evaluation::Done);
    }

    let args = pair
        .rest
        .iter()
        .map(|operand| evaluate(operand, env))
        .collect::<Result<Vec<_>, _>>()?;
    scheme_apply(&procedure, args, env)
}

/// The procedure inside `value`, or a [`SchemeError::NotCallable`].
pub fn validate_procedure(value: &Value) -> Result<Procedure, SchemeError> {
    match value {
        Value::Procedure(procedure) => Ok(procedure.clone()),
        other => Err(SchemeError::NotCallable(format!("{}: {}", other.type_name(), other))),
    }
}

fn apply_lambda(lambda: &Lambda, args: Vec<Value>) -> TailResult {
    let frame = Frame::make_child_frame(lambda.env(), lambda.params(), args)?;
    eval_all(lambda.body(), &frame)
}

// The operands reach the macro unevaluated; its result is the expansion.
fn apply_macro(with_macro: &Lambda, operands: &Value) -> EvaluationResult {
    let expansion = apply_lambda(with_macro, operands.to_vec()?)?.resolve()?;
    trace!("macro expanded to {}", expansion);
    Ok(expansion)
}

/// Applies `procedure` to already evaluated `args`. `env` is the calling
/// environment: builtins that ask for it receive it, and `mu` procedures
/// extend it.
pub fn scheme_apply(procedure: &Procedure, args: Vec<Value>, env: &Env) -> TailResult {
    trace!("apply {} to {} arguments", procedure, args.len());
    match procedure {
        Procedure::Builtin(builtin) => builtin.call(args, env).map(Evaluation::Done),
        Procedure::Lambda(lambda) | Procedure::Macro(lambda) => apply_lambda(lambda, args),
        Procedure::Mu(mu) => {
            let frame = Frame::make_child_frame(env, mu.params(), args)?;
            eval_all(mu.body(), &frame)
        }
    }
}

/// Like [`scheme_apply`], but never returns a thunk.
pub fn complete_apply(procedure: &Procedure, args: Vec<Value>, env: &Env) -> EvaluationResult {
    scheme_apply(procedure, args, env)?.resolve()
}

/// Evaluates each expression of the list `expressions` in order and yields
/// the last one in tail position. An empty list gives undefined.
pub fn eval_all(expressions: &Value, env: &Env) -> TailResult {
    let mut current = expressions;
    while let Value::Pair(pair) = current {
        if !pair.rest.is_pair() {
            return scheme_eval(&pair.first, env, true);
        }
        evaluate(&pair.first, env)?;
        current = &pair.rest;
    }
    Ok(Evaluation::Done(Value::Undefined))
}
