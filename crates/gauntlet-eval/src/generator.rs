//! Generator objects and the frame machine that runs their bodies.
//!
//! A generator body is executed by a trampoline over an explicit stack of
//! continuation frames instead of the host call stack, so it can stop at a
//! `yield` and pick up there later. Only statements that contain a `yield`
//! get frames; everything else runs through [`Evaluator::exec_stmt`] in one
//! step. The stack is owned by the generator object and moved out of it
//! while the body runs, which is also how re-entry is detected.
//!
//! Lifecycle:
//!
//! ```text
//! NotStarted --advance--> Running --yield--> Suspended --advance/throw--> Running
//!                            |                    |
//!                            +--return/raise--> Completed <--close--+
//! ```

use crate::env::Env;
use crate::error::{EvalError, EvalResult, Exception, ExceptionKind};
use crate::evaluator::Evaluator;
use crate::iter::ValueIter;
use crate::value::Value;
use gauntlet_types::ast::*;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Handle to a generator object. Clones share the same object.
#[derive(Clone)]
pub struct Generator(Rc<RefCell<GeneratorObject>>);

struct GeneratorObject {
    name: String,
    env: Env,
    state: GeneratorState,
    /// Saved continuation. Empty while running and after completion.
    frames: Vec<Frame>,
}

#[derive(Debug, Clone)]
pub enum GeneratorState {
    NotStarted,
    Suspended,
    Running,
    Completed(Completion),
}

/// How a generator body finished.
#[derive(Debug, Clone)]
pub enum Completion {
    Returned(Value),
    Raised(EvalError),
}

impl Generator {
    /// A not-started generator that will run `body` in `env`.
    pub fn new(name: String, body: Block, env: Env) -> Self {
        Self(Rc::new(RefCell::new(GeneratorObject {
            name,
            env,
            state: GeneratorState::NotStarted,
            frames: vec![Frame::Suite { block: body, pc: 0 }],
        })))
    }

    pub fn name(&self) -> String {
        self.0.borrow().name.clone()
    }

    pub fn state(&self) -> GeneratorState {
        self.0.borrow().state.clone()
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.0.borrow().state, GeneratorState::Completed(_))
    }

    pub fn ptr_eq(&self, other: &Generator) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Stable identity for hashing.
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    fn complete(&self, completion: Completion) {
        let mut obj = self.0.borrow_mut();
        obj.frames.clear();
        obj.state = GeneratorState::Completed(completion);
    }
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let obj = self.0.borrow();
        f.debug_struct("Generator")
            .field("name", &obj.name)
            .field("state", &obj.state)
            .field("frames", &obj.frames.len())
            .finish()
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Frames
// ══════════════════════════════════════════════════════════════════════════════

enum Frame {
    /// Statements of a block; `pc` is the next one to run.
    Suite { block: Block, pc: usize },
    /// A suspended `yield`. Resuming assigns the sent value to `targets`.
    YieldPoint { targets: Vec<Expr> },
    /// A loop whose body can yield. Stepping it re-tests the condition.
    While(Rc<WhileStmt>),
    For { stmt: Rc<ForStmt>, iter: ValueIter },
    Try { stmt: Rc<TryStmt>, stage: TryStage },
}

/// Which part of a `try` statement is running above its frame.
enum TryStage {
    Body,
    Else,
    /// Running the handler for this exception.
    Handler(EvalError),
    /// Running `finally`; the pending error is re-raised afterwards.
    Finally(Option<EvalError>),
}

/// What the caller sends into a suspended body.
pub(crate) enum Resume {
    Send(Value),
    Throw(EvalError),
}

enum Outcome {
    Yielded(Value),
    Returned(Value),
}

// ══════════════════════════════════════════════════════════════════════════════
// Protocol
// ══════════════════════════════════════════════════════════════════════════════

impl Evaluator {
    /// Run the generator to its next yield and return the yielded value.
    pub fn advance(&mut self, gen: &Generator) -> EvalResult<Value> {
        self.resume_generator(gen, Resume::Send(Value::None))
    }

    /// Like [`advance`](Self::advance), but the paused `yield` evaluates to `value`.
    pub fn send(&mut self, gen: &Generator, value: Value) -> EvalResult<Value> {
        self.resume_generator(gen, Resume::Send(value))
    }

    /// Raise `err` at the paused `yield`.
    pub fn throw(&mut self, gen: &Generator, err: EvalError) -> EvalResult<Value> {
        self.resume_generator(gen, Resume::Throw(err))
    }

    /// Raise `GeneratorExit` at the paused `yield` and let the body finish.
    /// A no-op on generators that have not started or already completed.
    pub fn close(&mut self, gen: &Generator) -> EvalResult<()> {
        match gen.state() {
            GeneratorState::NotStarted => {
                gen.complete(Completion::Returned(Value::None));
                return Ok(());
            }
            GeneratorState::Completed(_) => return Ok(()),
            GeneratorState::Suspended | GeneratorState::Running => {}
        }
        let exit = EvalError::Raised(Exception::new(ExceptionKind::GeneratorExit));
        match self.resume_generator(gen, Resume::Throw(exit)) {
            Ok(value) => {
                tracing::debug!(generator = %gen.name(), yielded = %value.repr(), "yield after close");
                Err(EvalError::GeneratorProtocolViolation(
                    "generator ignored GeneratorExit".to_string(),
                ))
            }
            Err(EvalError::ExhaustedGenerator(_)) => Ok(()),
            Err(err) if err.is_instance_of(ExceptionKind::GeneratorExit) => {
                gen.complete(Completion::Returned(Value::None));
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Iterator-style advance: `None` once the generator is exhausted.
    pub fn next_item(&mut self, gen: &Generator) -> EvalResult<Option<Value>> {
        match self.advance(gen) {
            Ok(value) => Ok(Some(value)),
            Err(EvalError::ExhaustedGenerator(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub(crate) fn resume_generator(&mut self, gen: &Generator, resume: Resume) -> EvalResult<Value> {
        {
            let mut obj = gen.0.borrow_mut();
            let started = match &obj.state {
                GeneratorState::Running => {
                    return Err(EvalError::raise(
                        ExceptionKind::ValueError,
                        "generator already executing",
                    ));
                }
                GeneratorState::Completed(_) => {
                    return Err(match resume {
                        Resume::Send(_) => EvalError::ExhaustedGenerator(Value::None),
                        Resume::Throw(err) => err,
                    });
                }
                GeneratorState::NotStarted => false,
                GeneratorState::Suspended => true,
            };
            if !started {
                match &resume {
                    Resume::Throw(err) => {
                        obj.frames.clear();
                        obj.state = GeneratorState::Completed(Completion::Raised(err.clone()));
                        return Err(err.clone());
                    }
                    Resume::Send(value) if !value.is_none() => {
                        return Err(EvalError::unsupported(
                            "can't send non-None value to a just-started generator",
                        ));
                    }
                    Resume::Send(_) => {}
                }
            }
        }

        self.enter_frame()?;
        let (env, mut frames) = {
            let mut obj = gen.0.borrow_mut();
            obj.state = GeneratorState::Running;
            (obj.env.clone(), std::mem::take(&mut obj.frames))
        };

        // handlers that were running when the body suspended are active again
        let base = self.handling.len();
        for frame in &frames {
            if let Frame::Try { stage: TryStage::Handler(err), .. } = frame {
                self.handling.push(err.clone());
            }
        }
        let outcome = self.drive(&env, &mut frames, resume);
        self.handling.truncate(base);
        self.leave_frame();

        match outcome {
            Ok(Outcome::Yielded(value)) => {
                let mut obj = gen.0.borrow_mut();
                obj.frames = frames;
                obj.state = GeneratorState::Suspended;
                tracing::debug!(generator = %obj.name, value = %value.repr(), "suspended");
                Ok(value)
            }
            Ok(Outcome::Returned(value)) => {
                tracing::debug!(generator = %gen.name(), value = %value.repr(), "returned");
                gen.complete(Completion::Returned(value.clone()));
                Err(EvalError::ExhaustedGenerator(value))
            }
            Err(err) => {
                let err = if err.is_instance_of(ExceptionKind::StopIteration) {
                    EvalError::raise(ExceptionKind::RuntimeError, "generator raised StopIteration")
                } else {
                    err
                };
                tracing::debug!(generator = %gen.name(), error = %err, "raised");
                gen.complete(Completion::Raised(err.clone()));
                Err(err)
            }
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Trampoline
    // ══════════════════════════════════════════════════════════════════════

    /// Run frames until the body yields, returns or raises.
    fn drive(&mut self, env: &Env, frames: &mut Vec<Frame>, resume: Resume) -> EvalResult<Outcome> {
        let paused = match frames.last() {
            Some(Frame::YieldPoint { .. }) => frames.pop(),
            _ => None,
        };
        let mut flow = match (resume, paused) {
            (Resume::Throw(err), _) => Err(err),
            (Resume::Send(value), Some(Frame::YieldPoint { targets })) => {
                self.assign_targets(&targets, value, env)
            }
            (Resume::Send(_), _) => Ok(()),
        };

        loop {
            if let Err(err) = flow {
                if let Err(err) = self.unwind(frames, env, err) {
                    return match err {
                        EvalError::Return(value) => Ok(Outcome::Returned(value)),
                        other => Err(other),
                    };
                }
            }
            if frames.is_empty() {
                return Ok(Outcome::Returned(Value::None));
            }
            flow = match self.step(frames, env) {
                Ok(Some(value)) => return Ok(Outcome::Yielded(value)),
                Ok(None) => Ok(()),
                Err(err) => Err(err),
            };
        }
    }

    /// Advance the top frame by one unit of work.
    fn step(&mut self, frames: &mut Vec<Frame>, env: &Env) -> EvalResult<Option<Value>> {
        self.tick()?;
        let Some(frame) = frames.pop() else {
            return Ok(None);
        };
        match frame {
            Frame::Suite { block, pc } => {
                let Some(stmt) = block.get(pc) else {
                    return Ok(None);
                };
                frames.push(Frame::Suite {
                    block: block.clone(),
                    pc: pc + 1,
                });
                self.step_stmt(stmt, frames, env)
            }
            // only ever on top while suspended
            Frame::YieldPoint { .. } => Ok(None),
            Frame::While(stmt) => {
                if self.eval_expr(&stmt.condition, env)?.is_truthy() {
                    let body = stmt.body.clone();
                    frames.push(Frame::While(stmt));
                    frames.push(Frame::Suite { block: body, pc: 0 });
                } else if let Some(block) = &stmt.else_block {
                    frames.push(Frame::Suite {
                        block: block.clone(),
                        pc: 0,
                    });
                }
                Ok(None)
            }
            Frame::For { stmt, mut iter } => {
                match iter.next(self)? {
                    Some(item) => {
                        self.assign_target(&stmt.target, item, env)?;
                        let body = stmt.body.clone();
                        frames.push(Frame::For { stmt, iter });
                        frames.push(Frame::Suite { block: body, pc: 0 });
                    }
                    None => {
                        if let Some(block) = &stmt.else_block {
                            frames.push(Frame::Suite {
                                block: block.clone(),
                                pc: 0,
                            });
                        }
                    }
                }
                Ok(None)
            }
            Frame::Try { stmt, stage } => match stage {
                TryStage::Body => {
                    if let Some(block) = stmt.else_block.clone() {
                        frames.push(Frame::Try {
                            stmt,
                            stage: TryStage::Else,
                        });
                        frames.push(Frame::Suite { block, pc: 0 });
                    } else {
                        enter_finally(frames, stmt, None);
                    }
                    Ok(None)
                }
                TryStage::Else => {
                    enter_finally(frames, stmt, None);
                    Ok(None)
                }
                TryStage::Handler(_) => {
                    self.handling.pop();
                    enter_finally(frames, stmt, None);
                    Ok(None)
                }
                TryStage::Finally(Some(err)) => Err(err),
                TryStage::Finally(None) => Ok(None),
            },
        }
    }

    /// Execute one statement of a suite. Statements that can yield open
    /// frames; the rest run to completion here.
    fn step_stmt(
        &mut self,
        stmt: &Stmt,
        frames: &mut Vec<Frame>,
        env: &Env,
    ) -> EvalResult<Option<Value>> {
        if !stmt_yields(stmt) {
            self.exec_stmt(stmt, env)?;
            return Ok(None);
        }
        match stmt {
            Stmt::Expr(s) => match yield_operand(&s.expr) {
                Some(operand) => self.suspend(operand, Vec::new(), frames, env),
                None => self.exec_stmt(stmt, env).map(|()| None),
            },
            Stmt::Assign(s) => match yield_operand(&s.value) {
                Some(operand) => self.suspend(operand, s.targets.clone(), frames, env),
                None => self.exec_stmt(stmt, env).map(|()| None),
            },
            Stmt::If(s) => {
                let branch = if self.eval_expr(&s.condition, env)?.is_truthy() {
                    Some(s.then_block.clone())
                } else {
                    s.else_block.clone()
                };
                if let Some(block) = branch {
                    frames.push(Frame::Suite { block, pc: 0 });
                }
                Ok(None)
            }
            Stmt::While(s) => {
                frames.push(Frame::While(Rc::new(s.clone())));
                Ok(None)
            }
            Stmt::For(s) => {
                let iterable = self.eval_expr(&s.iterable, env)?;
                let iter = ValueIter::new(&iterable)?;
                frames.push(Frame::For {
                    stmt: Rc::new(s.clone()),
                    iter,
                });
                Ok(None)
            }
            Stmt::Try(s) => {
                let stmt = Rc::new(s.clone());
                let body = stmt.body.clone();
                frames.push(Frame::Try {
                    stmt,
                    stage: TryStage::Body,
                });
                frames.push(Frame::Suite { block: body, pc: 0 });
                Ok(None)
            }
            Stmt::Match(s) => {
                let subject = self.eval_expr(&s.subject, env)?;
                if let Some(case) = self.select_match_case(s, &subject, env)? {
                    frames.push(Frame::Suite {
                        block: case.body.clone(),
                        pc: 0,
                    });
                }
                Ok(None)
            }
            // yield somewhere the machine cannot pause; evaluating it reports that
            other => self.exec_stmt(other, env).map(|()| None),
        }
    }

    fn suspend(
        &mut self,
        operand: Option<&Expr>,
        targets: Vec<Expr>,
        frames: &mut Vec<Frame>,
        env: &Env,
    ) -> EvalResult<Option<Value>> {
        let value = match operand {
            Some(expr) => self.eval_expr(expr, env)?,
            None => Value::None,
        };
        frames.push(Frame::YieldPoint { targets });
        Ok(Some(value))
    }

    /// Pop frames until one absorbs `err`: a loop taking `break`/`continue`,
    /// a matching handler, or a `finally` that must run first. Returns the
    /// error back once no frame is left.
    fn unwind(&mut self, frames: &mut Vec<Frame>, env: &Env, mut err: EvalError) -> EvalResult<()> {
        while let Some(frame) = frames.pop() {
            match frame {
                Frame::Suite { .. } | Frame::YieldPoint { .. } => {}
                Frame::While(stmt) => match err {
                    EvalError::Break => return Ok(()),
                    EvalError::Continue => {
                        frames.push(Frame::While(stmt));
                        return Ok(());
                    }
                    _ => {}
                },
                Frame::For { stmt, iter } => match err {
                    EvalError::Break => return Ok(()),
                    EvalError::Continue => {
                        frames.push(Frame::For { stmt, iter });
                        return Ok(());
                    }
                    _ => {}
                },
                Frame::Try { stmt, stage } => {
                    match stage {
                        TryStage::Body => {
                            if let Some(exc) = err.to_exception() {
                                match self.find_handler(&stmt.handlers, &exc, env) {
                                    Ok(Some(handler)) => {
                                        let body = handler.body.clone();
                                        self.bind_handler(handler, exc, env);
                                        self.handling.push(err.clone());
                                        frames.push(Frame::Try {
                                            stmt: Rc::clone(&stmt),
                                            stage: TryStage::Handler(err),
                                        });
                                        frames.push(Frame::Suite { block: body, pc: 0 });
                                        return Ok(());
                                    }
                                    Ok(None) => {}
                                    Err(raised) => err = raised,
                                }
                            }
                        }
                        TryStage::Else => {}
                        TryStage::Handler(_) => {
                            self.handling.pop();
                        }
                        // error inside finally replaces the pending one
                        TryStage::Finally(_) => continue,
                    }
                    if stmt.finally_block.is_some() {
                        enter_finally(frames, stmt, Some(err));
                        return Ok(());
                    }
                }
            }
        }
        Err(err)
    }
}

/// Push the `finally` suite of `stmt`, carrying `pending` across it.
/// Without a `finally` clause the statement is simply done.
fn enter_finally(frames: &mut Vec<Frame>, stmt: Rc<TryStmt>, pending: Option<EvalError>) {
    if let Some(block) = stmt.finally_block.clone() {
        frames.push(Frame::Try {
            stmt,
            stage: TryStage::Finally(pending),
        });
        frames.push(Frame::Suite { block, pc: 0 });
    }
}

/// `Some(operand)` if `expr` is a bare `yield`.
fn yield_operand(expr: &Expr) -> Option<Option<&Expr>> {
    match &expr.kind {
        ExprKind::Yield(operand) => Some(operand.as_deref()),
        _ => None,
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Yield detection
// ══════════════════════════════════════════════════════════════════════════════

/// Whether a function body is a generator body. Nested functions, classes,
/// lambdas and comprehensions are separate scopes and are not searched.
pub fn block_yields(block: &Block) -> bool {
    block.iter().any(stmt_yields)
}

fn opt_block_yields(block: &Option<Block>) -> bool {
    block.as_ref().is_some_and(block_yields)
}

fn stmt_yields(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Expr(s) => expr_yields(&s.expr),
        Stmt::Assign(s) => expr_yields(&s.value) || s.targets.iter().any(expr_yields),
        Stmt::AugAssign(s) => expr_yields(&s.target) || expr_yields(&s.value),
        Stmt::If(s) => {
            expr_yields(&s.condition) || block_yields(&s.then_block) || opt_block_yields(&s.else_block)
        }
        Stmt::While(s) => {
            expr_yields(&s.condition) || block_yields(&s.body) || opt_block_yields(&s.else_block)
        }
        Stmt::For(s) => {
            expr_yields(&s.iterable)
                || expr_yields(&s.target)
                || block_yields(&s.body)
                || opt_block_yields(&s.else_block)
        }
        Stmt::Try(s) => {
            block_yields(&s.body)
                || s.handlers.iter().any(|h| {
                    h.exc_type.as_ref().is_some_and(expr_yields) || block_yields(&h.body)
                })
                || opt_block_yields(&s.else_block)
                || opt_block_yields(&s.finally_block)
        }
        Stmt::Return(s) => s.value.as_ref().is_some_and(expr_yields),
        Stmt::Raise(s) => s.exc.as_ref().is_some_and(expr_yields),
        Stmt::Match(s) => {
            expr_yields(&s.subject)
                || s.cases.iter().any(|c| {
                    c.guard.as_ref().is_some_and(expr_yields) || block_yields(&c.body)
                })
        }
        Stmt::FunctionDef(_)
        | Stmt::ClassDef(_)
        | Stmt::Break(_)
        | Stmt::Continue(_)
        | Stmt::Pass(_) => false,
    }
}

fn expr_yields(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Yield(_) => true,
        ExprKind::IntLit(_)
        | ExprKind::StrLit(_)
        | ExprKind::BoolLit(_)
        | ExprKind::NoneLit
        | ExprKind::Name(_)
        | ExprKind::Lambda(_)
        | ExprKind::Comprehension(_) => false,
        ExprKind::FString(parts) => parts
            .iter()
            .any(|p| matches!(p, FStringPart::Expr(e) if expr_yields(e))),
        ExprKind::List(items) | ExprKind::Tuple(items) | ExprKind::Set(items) => {
            items.iter().any(expr_yields)
        }
        ExprKind::Dict(entries) => entries
            .iter()
            .any(|e| expr_yields(&e.key) || expr_yields(&e.value)),
        ExprKind::Attribute { object, .. } => expr_yields(object),
        ExprKind::Subscript { object, index } => expr_yields(object) || expr_yields(index),
        ExprKind::Call { func, args } => expr_yields(func) || args.iter().any(expr_yields),
        ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
            expr_yields(left) || expr_yields(right)
        }
        ExprKind::Unary { operand, .. } => expr_yields(operand),
        ExprKind::Compare { left, comparisons } => {
            expr_yields(left) || comparisons.iter().any(|c| expr_yields(&c.operand))
        }
        ExprKind::Conditional {
            condition,
            then_expr,
            else_expr,
        } => expr_yields(condition) || expr_yields(then_expr) || expr_yields(else_expr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvalConfig;
    use crate::env::Environment;
    use gauntlet_types::builder as b;

    fn make(body: Vec<Stmt>) -> (Evaluator, Generator) {
        let ev = Evaluator::new(EvalConfig::default());
        let gen = Generator::new("g".to_string(), b::block(body), Environment::global());
        (ev, gen)
    }

    fn value_error() -> EvalError {
        EvalError::Raised(Exception::new(ExceptionKind::ValueError))
    }

    #[test]
    fn runs_nothing_until_first_advance() {
        let (ev, gen) = make(vec![b::print(vec![b::string("start")])]);
        assert!(matches!(gen.state(), GeneratorState::NotStarted));
        assert!(ev.trace.is_empty());
    }

    #[test]
    fn yields_in_order_then_exhausts() {
        let (mut ev, gen) = make(vec![
            b::yield_stmt(b::int(1)),
            b::yield_stmt(b::int(2)),
            b::return_(Some(b::string("done"))),
        ]);
        assert_eq!(ev.advance(&gen).unwrap(), Value::Int(1));
        assert!(matches!(gen.state(), GeneratorState::Suspended));
        assert_eq!(ev.advance(&gen).unwrap(), Value::Int(2));
        match ev.advance(&gen) {
            Err(EvalError::ExhaustedGenerator(v)) => assert_eq!(v, Value::str("done")),
            other => panic!("expected exhaustion, got {other:?}"),
        }
        // and again, with no return value this time
        assert!(matches!(ev.advance(&gen), Err(EvalError::ExhaustedGenerator(Value::None))));
    }

    #[test]
    fn loop_state_survives_suspension() {
        let (mut ev, gen) = make(vec![
            b::let_("i", b::int(0)),
            b::while_(
                b::compare(b::name("i"), vec![(CmpOp::Lt, b::int(3))]),
                vec![
                    b::yield_stmt(b::name("i")),
                    b::aug_assign(b::name("i"), BinOp::Add, b::int(1)),
                ],
            ),
        ]);
        let mut seen = Vec::new();
        while let Some(v) = ev.next_item(&gen).unwrap() {
            seen.push(v);
        }
        assert_eq!(seen, vec![Value::Int(0), Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn throw_is_caught_inside_and_finally_runs_last() {
        let (mut ev, gen) = make(vec![b::try_(
            vec![
                b::print(vec![b::string("start")]),
                b::yield_stmt(b::int(1)),
            ],
            vec![b::handler(
                Some(b::name("ValueError")),
                None,
                vec![
                    b::print(vec![b::string("caught")]),
                    b::yield_stmt(b::int(2)),
                ],
            )],
            None,
            Some(vec![b::print(vec![b::string("cleaned up")])]),
        )]);
        assert_eq!(ev.advance(&gen).unwrap(), Value::Int(1));
        assert_eq!(ev.throw(&gen, value_error()).unwrap(), Value::Int(2));
        assert!(matches!(ev.advance(&gen), Err(EvalError::ExhaustedGenerator(_))));
        assert_eq!(ev.trace.lines(), ["start", "caught", "cleaned up"]);
    }

    #[test]
    fn uncaught_throw_runs_finally_then_propagates() {
        let (mut ev, gen) = make(vec![b::try_(
            vec![b::yield_stmt(b::int(1))],
            vec![],
            None,
            Some(vec![b::print(vec![b::string("finally")])]),
        )]);
        ev.advance(&gen).unwrap();
        let err = ev.throw(&gen, value_error()).unwrap_err();
        assert!(err.is_instance_of(ExceptionKind::ValueError));
        assert_eq!(ev.trace.lines(), ["finally"]);
        assert!(matches!(
            gen.state(),
            GeneratorState::Completed(Completion::Raised(_))
        ));
    }

    #[test]
    fn nested_finally_blocks_run_innermost_first() {
        let (mut ev, gen) = make(vec![b::try_(
            vec![b::try_(
                vec![b::yield_stmt(b::int(1))],
                vec![],
                None,
                Some(vec![b::print(vec![b::string("inner")])]),
            )],
            vec![],
            None,
            Some(vec![b::print(vec![b::string("outer")])]),
        )]);
        ev.advance(&gen).unwrap();
        ev.close(&gen).unwrap();
        assert_eq!(ev.trace.lines(), ["inner", "outer"]);
        assert!(gen.is_completed());
    }

    #[test]
    fn close_is_not_caught_by_except_exception() {
        let (mut ev, gen) = make(vec![b::try_(
            vec![b::yield_stmt(b::int(1))],
            vec![b::handler(
                Some(b::name("Exception")),
                None,
                vec![b::print(vec![b::string("wrongly caught")])],
            )],
            None,
            None,
        )]);
        ev.advance(&gen).unwrap();
        ev.close(&gen).unwrap();
        assert!(ev.trace.is_empty());
    }

    #[test]
    fn yielding_during_close_is_a_protocol_violation() {
        let (mut ev, gen) = make(vec![b::try_(
            vec![b::yield_stmt(b::int(1))],
            vec![b::handler(
                Some(b::name("GeneratorExit")),
                None,
                vec![b::yield_stmt(b::int(2))],
            )],
            None,
            None,
        )]);
        ev.advance(&gen).unwrap();
        let err = ev.close(&gen).unwrap_err();
        assert!(matches!(err, EvalError::GeneratorProtocolViolation(_)));
        assert_eq!(err.to_string(), "RuntimeError: generator ignored GeneratorExit");
    }

    #[test]
    fn close_before_start_and_after_end_is_a_no_op() {
        let (mut ev, gen) = make(vec![b::print(vec![b::string("body")])]);
        ev.close(&gen).unwrap();
        ev.close(&gen).unwrap();
        assert!(ev.trace.is_empty());
        assert!(matches!(ev.advance(&gen), Err(EvalError::ExhaustedGenerator(_))));
    }

    #[test]
    fn throw_into_unstarted_generator_skips_body() {
        let (mut ev, gen) = make(vec![b::print(vec![b::string("body")])]);
        let err = ev.throw(&gen, value_error()).unwrap_err();
        assert!(err.is_instance_of(ExceptionKind::ValueError));
        assert!(ev.trace.is_empty());
        assert!(gen.is_completed());
    }

    #[test]
    fn send_becomes_value_of_yield() {
        let (mut ev, gen) = make(vec![
            b::assign(b::name("x"), b::yield_value(b::int(1))),
            b::yield_stmt(b::binary(b::name("x"), BinOp::Mul, b::int(10))),
        ]);
        assert_eq!(ev.advance(&gen).unwrap(), Value::Int(1));
        assert_eq!(ev.send(&gen, Value::Int(4)).unwrap(), Value::Int(40));
    }

    #[test]
    fn sending_into_unstarted_generator_requires_none() {
        let (mut ev, gen) = make(vec![b::yield_stmt(b::int(1))]);
        let err = ev.send(&gen, Value::Int(1)).unwrap_err();
        assert!(matches!(err, EvalError::UnsupportedOperation(_)));
        assert!(matches!(gen.state(), GeneratorState::NotStarted));
    }

    #[test]
    fn stop_iteration_inside_body_becomes_runtime_error() {
        let (mut ev, gen) = make(vec![b::raise(Some(b::name("StopIteration")))]);
        let err = ev.advance(&gen).unwrap_err();
        assert_eq!(err.to_string(), "RuntimeError: generator raised StopIteration");
    }

    #[test]
    fn break_in_suspended_loop_skips_else() {
        let (mut ev, gen) = make(vec![b::for_else(
            b::name("x"),
            b::list(vec![b::int(1), b::int(2)]),
            vec![
                b::yield_stmt(b::name("x")),
                b::break_(),
            ],
            Some(vec![b::print(vec![b::string("else")])]),
        )]);
        assert_eq!(ev.advance(&gen).unwrap(), Value::Int(1));
        assert!(ev.next_item(&gen).unwrap().is_none());
        assert!(ev.trace.is_empty());
    }

    #[test]
    fn detection_skips_nested_functions() {
        let body = b::block(vec![b::def("inner", vec![], vec![b::yield_stmt(b::int(1))])]);
        assert!(!block_yields(&body));
        let body = b::block(vec![b::if_(
            b::boolean(true),
            vec![b::yield_stmt(b::int(1))],
            None,
        )]);
        assert!(block_yields(&body));
    }
}
