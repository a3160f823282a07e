use thiserror::Error;

/// Whether a call supplied too few or too many arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArityKind {
    TooFew,
    TooMany,
}

impl std::fmt::Display for ArityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArityKind::TooFew => write!(f, "too few arguments"),
            ArityKind::TooMany => write!(f, "too many arguments"),
        }
    }
}

/// Errors that can occur while reading or evaluating.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed token stream: a stray `)` or a bad dotted tail.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// The tokens ran out in the middle of an expression.
    /// Recoverable at a read boundary: supply more text and retry.
    #[error("unexpected EOF")]
    EndOfInput,

    /// Unbound variable, either looked up or targeted by `set!`.
    #[error("unbound variable: {0}")]
    Reference(String),

    /// Wrong number of arguments to an intrinsic or closure.
    #[error("arity not matched ({kind}): {callee} and {args}")]
    Arity {
        callee: String,
        args: String,
        kind: ArityKind,
    },

    /// Tried to apply something that is not a procedure.
    #[error("not a function: {callee} with {args}")]
    NotCallable { callee: String, args: String },

    /// Raised by the guest `error` procedure.
    #[error("{reason}: {irritant}")]
    Guest { reason: String, irritant: String },

    /// Wrong type of operand for an intrinsic.
    #[error("type error: {0}")]
    Type(String),

    /// Pair cell capacity exceeded.
    #[error("heap capacity exceeded")]
    HeapOverflow,

    /// `evaluate` was called while an earlier evaluation is suspended.
    #[error("an evaluation is already suspended")]
    Busy,

    #[error("I/O error: {0}")]
    Io(String),

    /// Internal interpreter error (should not happen in correct code).
    #[error("internal error: {0}")]
    Internal(String),

    /// An evaluator fault decorated with the frames left on the stack.
    #[error("{error}\n\t{trace}")]
    Traced { error: Box<Error>, trace: String },
}

impl Error {
    /// True for errors the guest program raised itself via `error`.
    pub fn is_guest(&self) -> bool {
        matches!(self, Error::Guest { .. })
    }

    /// The error with any stack decoration removed.
    pub fn root(&self) -> &Error {
        match self {
            Error::Traced { error, .. } => error.root(),
            other => other,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

pub type SchemeResult<T> = Result<T, Error>;
