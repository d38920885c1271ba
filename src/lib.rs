mod builtin;
mod context;
mod environment;
mod error;
mod interpreter;
mod parser;
mod procedure;
mod promise;
mod special_forms;
mod value;

#[cfg(test)]
mod test_utils;

pub use builtin::create_global_frame;
pub use context::{
    line_source, read_eval_print_loop, scheme_load, scheme_load_all, scheme_open, with_output, write_output, Config,
    Interpreter, Output, ReplOptions, LOAD_EXTENSION,
};
pub use environment::{Env, Frame};
pub use error::SchemeError;
pub use interpreter::{
    complete_apply, eval_all, evaluate, scheme_apply, scheme_eval, validate_procedure, with_max_depth, Evaluation,
    EvaluationResult, TailResult, DEFAULT_MAX_DEPTH,
};
pub use parser::{parse, read_line, scheme_read, tokenize_line, Buffer, Lexeme};
pub use procedure::{Arity, Builtin, Formals, Lambda, Mu, Procedure};
pub use promise::Promise;
pub use value::{Pair, Value};
