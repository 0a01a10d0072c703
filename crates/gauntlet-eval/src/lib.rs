//! Gauntlet tree-walking evaluator.
//!
//! Executes programs directly from the typed AST in `gauntlet-types`. The
//! semantics it is held to are the easy-to-get-wrong ones: chained
//! comparisons short-circuit, generators suspend and resume across
//! `try`/`finally`, augmented assignment mutates in place before it
//! rebinds, `match` tries cases in order, and a comprehension's outer
//! iterable is the only part that sees an enclosing class body.
//!
//! [`Interpreter`] and [`evaluate`] are the host-facing entry points;
//! [`probe_runner`] checks programs against golden output traces.

mod assign;
pub mod builtins;
mod compare;
pub mod config;
pub mod env;
pub mod error;
pub mod evaluator;
pub mod generator;
pub mod interpreter;
pub mod iter;
pub mod ops;
pub mod pattern;
pub mod probe_runner;
mod scope;
pub mod trace;
pub mod value;

pub use builtins::Builtin;
pub use config::EvalConfig;
pub use env::{Env, Environment, ScopeKind};
pub use error::{ErrorKind, EvalError, EvalResult, Exception, ExceptionKind};
pub use evaluator::Evaluator;
pub use generator::{Completion, Generator, GeneratorState};
pub use interpreter::{evaluate, Evaluation, Interpreter};
pub use probe_runner::{run_probe, run_probes, Probe, ProbeResult, ProbeRunSummary};
pub use trace::OutputTrace;
pub use value::Value;
