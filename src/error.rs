use thiserror::Error;

use crate::procedure::Arity;

/// Errors raised while reading or evaluating. Every one of them is fatal to
/// the evaluation that raised it; the driver decides whether to keep going.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("{0}: unbound variable")]
    UnboundVariable(String),

    /// Malformed special form. The message cites the offending expression.
    #[error("{0}")]
    BadSyntax(String),

    /// A primitive received an argument of the wrong type.
    #[error("{procedure}: contract violation; expected {expected}, given {given}")]
    BadType {
        procedure: String,
        expected: &'static str,
        given: String,
    },

    /// Wrong number of arguments, or wrong number of values.
    #[error("{procedure}: arity mismatch; expected {expected}, given {given}")]
    ArityMismatch {
        procedure: String,
        expected: Arity,
        given: usize,
    },

    #[error("application: not a procedure; given {0}")]
    NotAProcedure(String),

    /// `to-syntax` met a value that cannot be wrapped.
    #[error("datum->syntax: cannot convert {0}")]
    Conversion(String),

    /// Raised by the `error` primitive.
    #[error("{0}")]
    User(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("heap capacity exceeded")]
    HeapOverflow,

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for EvalError {
    fn from(err: std::io::Error) -> Self {
        EvalError::Io(err.to_string())
    }
}

pub type EvalResult<T> = Result<T, EvalError>;
