use thiserror::Error;

/// Every recoverable failure the reader or the evaluator can produce.
///
/// The read-eval-print loop catches all of these at the top-level expression
/// boundary, prints `Error: <message>` and moves on to the next input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemeError {
    #[error("unknown identifier: {0}")]
    UnboundName(String),

    #[error("{0}")]
    MalformedExpression(String),

    #[error("{0}")]
    Arity(String),

    #[error("{0} is not callable")]
    NotCallable(String),

    #[error("duplicate symbol: {0}")]
    DuplicateFormal(String),

    #[error("unquote outside of quasiquote")]
    UnquoteOutsideQuasiquote,

    #[error("{0}")]
    TypeError(String),

    #[error("{0}")]
    SyntaxError(String),

    #[error("{0}")]
    UserError(String),

    #[error("{0}")]
    IoError(String),

    #[error("{0}")]
    Arithmetic(String),

    #[error("maximum recursion depth exceeded")]
    RecursionDepthExceeded,
}

impl SchemeError {
    /// Stable class name, used when reporting and in test fixtures.
    pub fn name(&self) -> &'static str {
        match self {
            Self::UnboundName(_) => "UnboundNameError",
            Self::MalformedExpression(_) => "MalformedExpressionError",
            Self::Arity(_) => "ArityError",
            Self::NotCallable(_) => "NotCallableError",
            Self::DuplicateFormal(_) => "DuplicateFormalError",
            Self::UnquoteOutsideQuasiquote => "UnquoteOutsideQuasiquoteError",
            Self::TypeError(_) => "TypeError",
            Self::SyntaxError(_) => "SyntaxError",
            Self::UserError(_) => "UserError",
            Self::IoError(_) => "IoError",
            Self::Arithmetic(_) => "ArithmeticError",
            Self::RecursionDepthExceeded => "RecursionDepthError",
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedExpression(message.into())
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError(message.into())
    }
}

impl From<std::io::Error> for SchemeError {
    fn from(error: std::io::Error) -> Self {
        Self::IoError(error.to_string())
    }
}
