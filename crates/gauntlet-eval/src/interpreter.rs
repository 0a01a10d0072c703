//! Host-facing entry points.
//!
//! [`Interpreter`] owns an evaluator and a module scope that persists across
//! runs. [`evaluate`] is the one-shot form: run a program in a given scope
//! and hand back everything it printed together with its outcome.

use crate::config::EvalConfig;
use crate::env::{Env, Environment};
use crate::error::{EvalError, EvalResult, Exception};
use crate::evaluator::Evaluator;
use crate::generator::Generator;
use crate::trace::OutputTrace;
use crate::value::Value;
use gauntlet_types::ast::Program;
use std::collections::BTreeMap;

/// A long-lived evaluation session.
///
/// Module-level bindings survive between [`run`](Self::run) calls, so a host
/// can load definitions once and then drive them with [`call`](Self::call)
/// or the generator controls.
pub struct Interpreter {
    eval: Evaluator,
    globals: Env,
}

impl Interpreter {
    pub fn new(config: EvalConfig) -> Self {
        Self::with_env(config, Environment::global())
    }

    /// Use an existing module scope, e.g. one pre-populated by the host.
    pub fn with_env(config: EvalConfig, globals: Env) -> Self {
        Self {
            eval: Evaluator::new(config),
            globals,
        }
    }

    /// Execute `program` at module level.
    ///
    /// Returns the value of the last top-level expression statement, or
    /// `None` if there was none. An exception nobody caught comes back as
    /// the error; output printed before it stays in [`output`](Self::output).
    pub fn run(&mut self, program: &Program) -> EvalResult<Value> {
        let result = self.eval.exec_module(&program.body, &self.globals);
        if let Err(err) = &result {
            tracing::debug!(kind = ?err.kind(), %err, "uncaught error at module level");
        }
        result
    }

    // ══════════════════════════════════════════════════════════════════════
    // Inspection
    // ══════════════════════════════════════════════════════════════════════

    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.get_local(name)
    }

    pub fn globals(&self) -> BTreeMap<String, Value> {
        self.globals.snapshot()
    }

    pub fn env(&self) -> &Env {
        &self.globals
    }

    pub fn output(&self) -> &OutputTrace {
        &self.eval.trace
    }

    pub fn clear_output(&mut self) {
        self.eval.trace.clear();
    }

    pub fn take_output(&mut self) -> Vec<String> {
        self.eval.trace.take()
    }

    pub fn gas_used(&self) -> u64 {
        self.eval.gas_used()
    }

    // ══════════════════════════════════════════════════════════════════════
    // Driving
    // ══════════════════════════════════════════════════════════════════════

    /// Call a module-level function by name.
    pub fn call(&mut self, name: &str, args: Vec<Value>) -> EvalResult<Value> {
        let callee = self
            .globals
            .get_local(name)
            .ok_or_else(|| EvalError::UnresolvedName(name.to_string()))?;
        self.eval.call_value(&callee, args)
    }

    pub fn advance(&mut self, gen: &Generator) -> EvalResult<Value> {
        self.eval.advance(gen)
    }

    pub fn send(&mut self, gen: &Generator, value: Value) -> EvalResult<Value> {
        self.eval.send(gen, value)
    }

    pub fn throw(&mut self, gen: &Generator, exception: Exception) -> EvalResult<Value> {
        self.eval.throw(gen, EvalError::Raised(exception))
    }

    pub fn close(&mut self, gen: &Generator) -> EvalResult<()> {
        self.eval.close(gen)
    }
}

/// Output and outcome of a one-shot [`evaluate`].
#[derive(Debug)]
pub struct Evaluation {
    pub output: OutputTrace,
    pub result: EvalResult<Value>,
}

/// Run `program` in `env` with the default configuration.
pub fn evaluate(program: &Program, env: &Env) -> Evaluation {
    let mut interp = Interpreter::with_env(EvalConfig::default(), env.clone());
    let result = interp.run(program);
    Evaluation {
        output: std::mem::take(&mut interp.eval.trace),
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExceptionKind;
    use gauntlet_types::builder as b;

    #[test]
    fn run_returns_last_expression_value() {
        let program = b::program(vec![
            b::let_("x", b::int(4)),
            b::expr_stmt(b::binary(b::name("x"), gauntlet_types::ast::BinOp::Mul, b::int(2))),
        ]);
        let mut interp = Interpreter::new(EvalConfig::default());
        assert_eq!(interp.run(&program).unwrap(), Value::Int(8));
        assert_eq!(interp.global("x"), Some(Value::Int(4)));
    }

    #[test]
    fn globals_persist_between_runs() {
        let mut interp = Interpreter::new(EvalConfig::default());
        interp
            .run(&b::program(vec![b::def(
                "double",
                vec![b::param("n")],
                vec![b::return_(Some(b::binary(
                    b::name("n"),
                    gauntlet_types::ast::BinOp::Add,
                    b::name("n"),
                )))],
            )]))
            .unwrap();
        assert_eq!(interp.call("double", vec![Value::Int(21)]).unwrap(), Value::Int(42));
        assert!(matches!(
            interp.call("missing", vec![]),
            Err(EvalError::UnresolvedName(_))
        ));
    }

    #[test]
    fn evaluate_keeps_output_before_error() {
        let program = b::program(vec![
            b::print(vec![b::string("before")]),
            b::raise(Some(b::call_name("ValueError", vec![b::string("boom")]))),
            b::print(vec![b::string("after")]),
        ]);
        let evaluation = evaluate(&program, &Environment::global());
        assert_eq!(evaluation.output.lines(), ["before"]);
        let err = evaluation.result.unwrap_err();
        assert!(err.is_instance_of(ExceptionKind::ValueError));
        assert_eq!(err.to_string(), "ValueError: boom");
    }

    #[test]
    fn host_drives_generator() {
        let mut interp = Interpreter::new(EvalConfig::default());
        interp
            .run(&b::program(vec![
                b::def(
                    "gen",
                    vec![],
                    vec![b::try_(
                        vec![b::yield_stmt(b::int(1)), b::yield_stmt(b::int(2))],
                        vec![b::handler(
                            Some(b::name("ValueError")),
                            None,
                            vec![b::print(vec![b::string("caught")])],
                        )],
                        None,
                        None,
                    )],
                ),
                b::let_("g", b::call_name("gen", vec![])),
            ]))
            .unwrap();
        let Some(Value::Generator(gen)) = interp.global("g") else {
            panic!("g is not a generator");
        };
        assert_eq!(interp.advance(&gen).unwrap(), Value::Int(1));
        let err = interp
            .throw(&gen, Exception::new(ExceptionKind::ValueError))
            .unwrap_err();
        assert!(matches!(err, EvalError::ExhaustedGenerator(_)));
        assert_eq!(interp.output().lines(), ["caught"]);
        assert!(gen.is_completed());
        interp.close(&gen).unwrap();
    }
}
