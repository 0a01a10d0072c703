//! Golden-trace probe runner.
//!
//! A probe is a program plus the exact lines it must print and, optionally,
//! the kind of error it must end with. Each probe runs on a fresh
//! [`Interpreter`] so nothing leaks between them.

use crate::config::EvalConfig;
use crate::error::ErrorKind;
use crate::interpreter::Interpreter;
use gauntlet_types::ast::Program;
use serde::Serialize;

/// A single conformance probe.
#[derive(Debug, Clone)]
pub struct Probe {
    pub name: String,
    pub program: Program,
    pub expected_output: Vec<String>,
    /// `None` means the program must finish without an uncaught error.
    pub expected_error: Option<ErrorKind>,
}

impl Probe {
    pub fn new(name: impl Into<String>, program: Program, expected_output: &[&str]) -> Self {
        Self {
            name: name.into(),
            program,
            expected_output: expected_output.iter().map(|s| s.to_string()).collect(),
            expected_error: None,
        }
    }

    pub fn expecting_error(mut self, kind: ErrorKind) -> Self {
        self.expected_error = Some(kind);
        self
    }
}

/// Result of running a single probe.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub name: String,
    pub passed: bool,
    /// Everything the probe printed.
    pub output: Vec<String>,
    /// SHA-256 of the golden text, for comparing runs.
    pub digest: String,
    /// Why the probe failed.
    pub failure: Option<String>,
}

impl std::fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.passed {
            write!(f, "  ✓ {}", self.name)
        } else {
            write!(
                f,
                "  ✗ {}: {}",
                self.name,
                self.failure.as_deref().unwrap_or("unknown failure")
            )
        }
    }
}

/// Summary of a probe run.
#[derive(Debug, Serialize)]
pub struct ProbeRunSummary {
    pub results: Vec<ProbeResult>,
    pub passed: usize,
    pub failed: usize,
}

impl ProbeRunSummary {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

impl std::fmt::Display for ProbeRunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for r in &self.results {
            writeln!(f, "{r}")?;
        }
        writeln!(f, "\n{} passed, {} failed", self.passed, self.failed)
    }
}

/// Run every probe in order.
pub fn run_probes(probes: &[Probe], config: &EvalConfig) -> ProbeRunSummary {
    let results: Vec<ProbeResult> = probes.iter().map(|p| run_probe(p, config)).collect();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.len() - passed;
    ProbeRunSummary {
        results,
        passed,
        failed,
    }
}

/// Run one probe on a fresh interpreter.
pub fn run_probe(probe: &Probe, config: &EvalConfig) -> ProbeResult {
    let mut interp = Interpreter::new(config.clone());
    let outcome = interp.run(&probe.program);
    let digest = interp.output().digest();
    let output = interp.take_output();

    let failure = match (&outcome, probe.expected_error) {
        (Ok(_), Some(kind)) => Some(format!("expected {kind:?} error, program completed")),
        (Err(err), None) => Some(format!("uncaught error: {err}")),
        (Err(err), Some(kind)) if err.kind() != kind => {
            Some(format!("expected {kind:?} error, got {:?}: {err}", err.kind()))
        }
        _ => first_divergence(&probe.expected_output, &output),
    };
    tracing::debug!(probe = %probe.name, passed = failure.is_none(), "probe finished");

    ProbeResult {
        name: probe.name.clone(),
        passed: failure.is_none(),
        output,
        digest,
        failure,
    }
}

fn first_divergence(expected: &[String], actual: &[String]) -> Option<String> {
    let line = expected
        .iter()
        .zip(actual)
        .position(|(e, a)| e != a)
        .or_else(|| (expected.len() != actual.len()).then(|| expected.len().min(actual.len())))?;
    Some(format!(
        "output line {}: expected {:?}, got {:?}",
        line + 1,
        expected.get(line).map(String::as_str).unwrap_or("<end>"),
        actual.get(line).map(String::as_str).unwrap_or("<end>"),
    ))
}
