//! Runtime error types for the Gauntlet evaluator.
//!
//! [`EvalError`] is the single error channel of the evaluator. Besides real
//! failures it threads `return`, `break` and `continue` out of nested
//! statements. Language-level exceptions are [`Exception`] values whose class
//! is an [`ExceptionKind`]; handlers match on that hierarchy.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Built-in exception classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExceptionKind {
    BaseException,
    GeneratorExit,
    Exception,
    StopIteration,
    NameError,
    TypeError,
    ValueError,
    KeyError,
    IndexError,
    AttributeError,
    ZeroDivisionError,
    OverflowError,
    RuntimeError,
    RecursionError,
}

impl ExceptionKind {
    pub const ALL: [ExceptionKind; 14] = [
        Self::BaseException,
        Self::GeneratorExit,
        Self::Exception,
        Self::StopIteration,
        Self::NameError,
        Self::TypeError,
        Self::ValueError,
        Self::KeyError,
        Self::IndexError,
        Self::AttributeError,
        Self::ZeroDivisionError,
        Self::OverflowError,
        Self::RuntimeError,
        Self::RecursionError,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::BaseException => "BaseException",
            Self::GeneratorExit => "GeneratorExit",
            Self::Exception => "Exception",
            Self::StopIteration => "StopIteration",
            Self::NameError => "NameError",
            Self::TypeError => "TypeError",
            Self::ValueError => "ValueError",
            Self::KeyError => "KeyError",
            Self::IndexError => "IndexError",
            Self::AttributeError => "AttributeError",
            Self::ZeroDivisionError => "ZeroDivisionError",
            Self::OverflowError => "OverflowError",
            Self::RuntimeError => "RuntimeError",
            Self::RecursionError => "RecursionError",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Direct base class; `None` only for `BaseException`.
    pub fn base(self) -> Option<Self> {
        match self {
            Self::BaseException => None,
            Self::GeneratorExit | Self::Exception => Some(Self::BaseException),
            Self::RecursionError => Some(Self::RuntimeError),
            _ => Some(Self::Exception),
        }
    }

    pub fn is_subclass_of(self, other: Self) -> bool {
        let mut cur = Some(self);
        while let Some(kind) = cur {
            if kind == other {
                return true;
            }
            cur = kind.base();
        }
        false
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A raised (or raisable) exception instance.
#[derive(Debug, Clone)]
pub struct Exception {
    pub kind: ExceptionKind,
    pub message: Option<String>,
    /// `StopIteration.value`: the generator's return value. `None` otherwise.
    pub value: Value,
}

impl Exception {
    pub fn new(kind: ExceptionKind) -> Self {
        Self {
            kind,
            message: None,
            value: Value::None,
        }
    }

    pub fn with_message(kind: ExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: Some(message.into()),
            value: Value::None,
        }
    }

    pub fn stop_iteration(value: Value) -> Self {
        Self {
            kind: ExceptionKind::StopIteration,
            message: None,
            value,
        }
    }

    /// `str(exc)`: the message, or empty.
    pub fn message_text(&self) -> String {
        match &self.message {
            Some(m) => m.clone(),
            None if !self.value.is_none() => self.value.repr(),
            None => String::new(),
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.message_text();
        if text.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {text}", self.kind)
        }
    }
}

/// Coarse classification of evaluation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    UnresolvedName,
    UnsupportedOperation,
    ExhaustedGenerator,
    GeneratorProtocolViolation,
    UnhandledPropagatedException,
    GasExhausted,
    /// `return`/`break`/`continue` escaped every enclosing construct.
    MisplacedControlFlow,
}

/// Evaluation error: runtime failures and non-local control flow.
#[derive(Debug, Clone, Error)]
pub enum EvalError {
    /// A name missing from every reachable scope and from the builtins.
    #[error("NameError: name '{0}' is not defined")]
    UnresolvedName(String),
    /// Operation not supported for the operand types, including item
    /// assignment into an immutable container.
    #[error("TypeError: {0}")]
    UnsupportedOperation(String),
    /// Advancing a generator that has run past its end. Carries the return value.
    #[error("StopIteration")]
    ExhaustedGenerator(Value),
    /// A generator yielded in response to `close()`.
    #[error("RuntimeError: {0}")]
    GeneratorProtocolViolation(String),
    /// Any other language-level exception in flight.
    #[error("{0}")]
    Raised(Exception),
    /// `return` statement (used internally for control flow)
    #[error("'return' outside function")]
    Return(Value),
    #[error("'break' outside loop")]
    Break,
    #[error("'continue' not properly in loop")]
    Continue,
    /// Step budget exhausted. Not catchable by handlers.
    #[error("gas exhausted")]
    GasExhausted,
}

impl EvalError {
    pub fn raise(kind: ExceptionKind, message: impl Into<String>) -> Self {
        Self::Raised(Exception::with_message(kind, message))
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedOperation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnresolvedName(_) => ErrorKind::UnresolvedName,
            Self::UnsupportedOperation(_) => ErrorKind::UnsupportedOperation,
            Self::ExhaustedGenerator(_) => ErrorKind::ExhaustedGenerator,
            Self::GeneratorProtocolViolation(_) => ErrorKind::GeneratorProtocolViolation,
            Self::Raised(exc) => match exc.kind {
                ExceptionKind::NameError => ErrorKind::UnresolvedName,
                ExceptionKind::TypeError => ErrorKind::UnsupportedOperation,
                ExceptionKind::StopIteration => ErrorKind::ExhaustedGenerator,
                _ => ErrorKind::UnhandledPropagatedException,
            },
            Self::Return(_) | Self::Break | Self::Continue => ErrorKind::MisplacedControlFlow,
            Self::GasExhausted => ErrorKind::GasExhausted,
        }
    }

    /// The exception object a handler sees, or `None` if handlers cannot catch this.
    pub fn to_exception(&self) -> Option<Exception> {
        match self {
            Self::UnresolvedName(name) => Some(Exception::with_message(
                ExceptionKind::NameError,
                format!("name '{name}' is not defined"),
            )),
            Self::UnsupportedOperation(msg) => {
                Some(Exception::with_message(ExceptionKind::TypeError, msg.clone()))
            }
            Self::ExhaustedGenerator(value) => Some(Exception::stop_iteration(value.clone())),
            Self::GeneratorProtocolViolation(msg) => {
                Some(Exception::with_message(ExceptionKind::RuntimeError, msg.clone()))
            }
            Self::Raised(exc) => Some(exc.clone()),
            Self::Return(_) | Self::Break | Self::Continue | Self::GasExhausted => None,
        }
    }

    pub fn exception_kind(&self) -> Option<ExceptionKind> {
        match self {
            Self::UnresolvedName(_) => Some(ExceptionKind::NameError),
            Self::UnsupportedOperation(_) => Some(ExceptionKind::TypeError),
            Self::ExhaustedGenerator(_) => Some(ExceptionKind::StopIteration),
            Self::GeneratorProtocolViolation(_) => Some(ExceptionKind::RuntimeError),
            Self::Raised(exc) => Some(exc.kind),
            _ => None,
        }
    }

    /// True if this is a language exception of `kind` or one of its subclasses.
    pub fn is_instance_of(&self, kind: ExceptionKind) -> bool {
        self.exception_kind()
            .is_some_and(|k| k.is_subclass_of(kind))
    }
}

impl From<Exception> for EvalError {
    fn from(exc: Exception) -> Self {
        Self::Raised(exc)
    }
}

/// Result alias for evaluator operations.
pub type EvalResult<T> = Result<T, EvalError>;
