#![no_main]

use core::fmt;
use std::{cell::RefCell, io, rc::Rc};

use itertools::Itertools;
use libfuzzer_sys::{arbitrary::Arbitrary, fuzz_target};
use scheme::{Config, Interpreter};

// Builtins and load from variables
#[derive(Arbitrary, Debug)]
enum SchemeAtom {
    Add, Sub, Mul, Div,
    True, False, Nil,
    Greater, GreaterEq,
    Less, LessEq, Eq,

    List, Car, Cdr, Length,
    Append, Map, Filter, Reduce,
    Force, CdrStream, Apply, Eval,

    Identifier(String),
    Integer(i64),
    Float(f64),
}

impl fmt::Display for SchemeAtom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", match self {
            SchemeAtom::Add => "+",
            SchemeAtom::Sub => "-",
            SchemeAtom::Mul => "*",
            SchemeAtom::Div => "/",
            SchemeAtom::True => "#t",
            SchemeAtom::False => "#f",
            SchemeAtom::Nil => "nil",
            SchemeAtom::Greater => ">",
            SchemeAtom::GreaterEq => ">=",
            SchemeAtom::Less => "<",
            SchemeAtom::LessEq => "<=",
            SchemeAtom::Eq => "=",
            SchemeAtom::List => "list",
            SchemeAtom::Car => "car",
            SchemeAtom::Cdr => "cdr",
            SchemeAtom::Length => "length",
            SchemeAtom::Append => "append",
            SchemeAtom::Map => "map",
            SchemeAtom::Filter => "filter",
            SchemeAtom::Reduce => "reduce",
            SchemeAtom::Force => "force",
            SchemeAtom::CdrStream => "cdr-stream",
            SchemeAtom::Apply => "apply",
            SchemeAtom::Eval => "eval",
            SchemeAtom::Identifier(identifier) => identifier,
            SchemeAtom::Integer(value) => return write!(f, "{}", value),
            SchemeAtom::Float(value) => return write!(f, "{:?}", value),
        })
    }
}

#[derive(Arbitrary, Debug)]
enum SchemeCommand {
    // Special forms
    Lambda(Vec<SchemeCommand>),
    Mu(Vec<SchemeCommand>),
    Define(Vec<SchemeCommand>),
    DefineMacro(Vec<SchemeCommand>),
    If(Vec<SchemeCommand>),
    Cond(Vec<SchemeCommand>),
    And(Vec<SchemeCommand>),
    Or(Vec<SchemeCommand>),
    Begin(Vec<SchemeCommand>),
    Let(Vec<SchemeCommand>),
    Quote(Vec<SchemeCommand>),
    Quasiquote(Vec<SchemeCommand>),
    Unquote(Vec<SchemeCommand>),
    Delay(Vec<SchemeCommand>),
    ConsStream(Vec<SchemeCommand>),

    Call(Vec<SchemeCommand>),
    Atom(SchemeAtom),
}

fn stringify_arguments(values: &[SchemeCommand]) -> String {
    values.iter()
        .map(SchemeCommand::to_string)
        .join(" ")
}

impl fmt::Display for SchemeCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (keyword, args) = match self {
            SchemeCommand::Atom(atom) => return atom.fmt(f),
            SchemeCommand::Call(args) => return write!(f, "({})", stringify_arguments(args)),
            SchemeCommand::Lambda(args) => ("lambda", args),
            SchemeCommand::Mu(args) => ("mu", args),
            SchemeCommand::Define(args) => ("define", args),
            SchemeCommand::DefineMacro(args) => ("define-macro", args),
            SchemeCommand::If(args) => ("if", args),
            SchemeCommand::Cond(args) => ("cond", args),
            SchemeCommand::And(args) => ("and", args),
            SchemeCommand::Or(args) => ("or", args),
            SchemeCommand::Begin(args) => ("begin", args),
            SchemeCommand::Let(args) => ("let", args),
            SchemeCommand::Quote(args) => ("quote", args),
            SchemeCommand::Quasiquote(args) => ("quasiquote", args),
            SchemeCommand::Unquote(args) => ("unquote", args),
            SchemeCommand::Delay(args) => ("delay", args),
            SchemeCommand::ConsStream(args) => ("cons-stream", args),
        };

        write!(f, "({} {})", keyword, stringify_arguments(args))
    }
}

fuzz_target!(|commands: Vec<SchemeCommand>| {
    // A low limit keeps runaway recursion cheap.
    let interpreter = Interpreter::with_config(Config { max_depth: 256, ..Config::default() })
        .output_to(Rc::new(RefCell::new(io::sink())));

    for command in commands {
        let _ = interpreter.evaluate_str(&command.to_string());
    }
});
