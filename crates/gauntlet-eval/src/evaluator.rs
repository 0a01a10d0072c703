//! Core expression and statement evaluator.
//!
//! Statements run recursively against an explicit [`Env`]. Generator bodies
//! are the one exception: they are driven frame by frame by the machine in
//! [`crate::generator`], which falls back to [`Evaluator::exec_stmt`] for
//! every statement that cannot suspend.

use crate::builtins::Builtin;
use crate::config::EvalConfig;
use crate::env::{Env, Environment, ScopeKind};
use crate::error::{EvalError, EvalResult, Exception, ExceptionKind};
use crate::generator::{block_yields, Generator};
use crate::iter::ValueIter;
use crate::ops;
use crate::trace::OutputTrace;
use crate::value::{BoundMethod, Callable, ClassObject, Function, FunctionBody, Value};
use gauntlet_types::ast::*;
use std::rc::Rc;

/// The tree-walking evaluator.
pub struct Evaluator {
    /// Lines written by `print`.
    pub trace: OutputTrace,
    config: EvalConfig,
    /// Steps consumed so far.
    gas: u64,
    /// Active user-function and generator frames.
    depth: usize,
    /// Exceptions whose handlers are currently running, innermost last.
    /// A bare `raise` re-raises the last one.
    pub(crate) handling: Vec<EvalError>,
}

impl Evaluator {
    pub fn new(config: EvalConfig) -> Self {
        Self {
            trace: OutputTrace::default(),
            config,
            gas: 0,
            depth: 0,
            handling: Vec::new(),
        }
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub fn gas_used(&self) -> u64 {
        self.gas
    }

    /// Consume one unit of gas. Returns error if exhausted.
    pub(crate) fn tick(&mut self) -> EvalResult<()> {
        self.charge(1)
    }

    /// Consume `amount` units of gas at once (bulk operations like `range`).
    pub(crate) fn charge(&mut self, amount: u64) -> EvalResult<()> {
        self.gas = self.gas.saturating_add(amount);
        if self.gas > self.config.gas_limit {
            Err(EvalError::GasExhausted)
        } else {
            Ok(())
        }
    }

    /// `l op r`, charging one unit per item a sequence repetition builds.
    pub(crate) fn binary(&mut self, op: BinOp, l: &Value, r: &Value) -> EvalResult<Value> {
        if let Some(len) = ops::repeat_len(op, l, r)? {
            self.charge(u64::try_from(len).unwrap_or(u64::MAX))?;
        }
        ops::binary_op(op, l, r)
    }

    /// Enter a user-level frame, failing with `RecursionError` past the limit.
    pub(crate) fn enter_frame(&mut self) -> EvalResult<()> {
        if self.depth >= self.config.max_call_depth {
            return Err(EvalError::raise(
                ExceptionKind::RecursionError,
                "maximum recursion depth exceeded",
            ));
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave_frame(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    // ══════════════════════════════════════════════════════════════════════
    // Expression evaluation
    // ══════════════════════════════════════════════════════════════════════

    /// Evaluate an expression to a Value.
    pub fn eval_expr(&mut self, expr: &Expr, env: &Env) -> EvalResult<Value> {
        self.tick()?;
        match &expr.kind {
            ExprKind::IntLit(n) => Ok(Value::Int(*n)),
            ExprKind::StrLit(s) => Ok(Value::str(s.as_str())),
            ExprKind::BoolLit(b) => Ok(Value::Bool(*b)),
            ExprKind::NoneLit => Ok(Value::None),
            ExprKind::FString(parts) => self.eval_fstring(parts, env),

            ExprKind::List(items) => Ok(Value::list(self.eval_all(items, env)?)),
            ExprKind::Tuple(items) => Ok(Value::tuple(self.eval_all(items, env)?)),
            ExprKind::Set(items) => Value::set(self.eval_all(items, env)?),
            ExprKind::Dict(entries) => {
                let mut pairs = Vec::with_capacity(entries.len());
                for entry in entries {
                    let key = self.eval_expr(&entry.key, env)?;
                    let value = self.eval_expr(&entry.value, env)?;
                    pairs.push((key, value));
                }
                Value::dict(pairs)
            }

            ExprKind::Name(name) => self.lookup_name(name, env),
            ExprKind::Attribute { object, attr } => {
                let object = self.eval_expr(object, env)?;
                self.get_attr(&object, &attr.name)
            }
            ExprKind::Subscript { object, index } => {
                let object = self.eval_expr(object, env)?;
                let index = self.eval_expr(index, env)?;
                ops::get_item(&object, &index)
            }
            ExprKind::Call { func, args } => {
                let callee = self.eval_expr(func, env)?;
                let args = self.eval_all(args, env)?;
                self.call_value(&callee, args)
            }

            ExprKind::Binary { left, op, right } => {
                let l = self.eval_expr(left, env)?;
                let r = self.eval_expr(right, env)?;
                self.binary(*op, &l, &r)
            }
            ExprKind::Logical { left, op, right } => {
                let l = self.eval_expr(left, env)?;
                match (op, l.is_truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(l),
                    _ => self.eval_expr(right, env),
                }
            }
            ExprKind::Unary { op, operand } => {
                let v = self.eval_expr(operand, env)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!v.is_truthy())),
                    UnaryOp::Neg => ops::negate(&v),
                }
            }
            ExprKind::Compare { left, comparisons } => self.eval_compare(left, comparisons, env),
            ExprKind::Conditional {
                condition,
                then_expr,
                else_expr,
            } => {
                if self.eval_expr(condition, env)?.is_truthy() {
                    self.eval_expr(then_expr, env)
                } else {
                    self.eval_expr(else_expr, env)
                }
            }

            ExprKind::Lambda(lambda) => self.eval_lambda(lambda, env),
            ExprKind::Comprehension(comp) => self.eval_comprehension(comp, env),
            ExprKind::Yield(_) => Err(EvalError::unsupported(
                "'yield' is only supported as a statement or as the value of an assignment",
            )),
        }
    }

    fn eval_all(&mut self, exprs: &[Expr], env: &Env) -> EvalResult<Vec<Value>> {
        let mut values = Vec::with_capacity(exprs.len());
        for expr in exprs {
            values.push(self.eval_expr(expr, env)?);
        }
        Ok(values)
    }

    fn eval_fstring(&mut self, parts: &[FStringPart], env: &Env) -> EvalResult<Value> {
        let mut result = String::new();
        for part in parts {
            match part {
                FStringPart::Literal(s) => result.push_str(s),
                FStringPart::Expr(expr) => {
                    let val = self.eval_expr(expr, env)?;
                    result.push_str(&val.to_str());
                }
            }
        }
        Ok(Value::str(result))
    }

    fn eval_lambda(&mut self, lambda: &LambdaExpr, env: &Env) -> EvalResult<Value> {
        let (params, defaults) = self.eval_params(&lambda.params, env)?;
        Ok(Value::Callable(Callable::Function(Rc::new(Function {
            name: "<lambda>".to_string(),
            params,
            defaults,
            body: FunctionBody::Expr(lambda.body.clone()),
            closure: env.clone(),
            is_generator: false,
        }))))
    }

    /// Resolve a name: the scope chain, then builtins, then exception classes.
    pub fn lookup_name(&self, name: &str, env: &Env) -> EvalResult<Value> {
        if let Some(v) = env.get(name) {
            return Ok(v);
        }
        if let Some(b) = Builtin::from_name(name) {
            return Ok(Value::Callable(Callable::Builtin(b)));
        }
        if let Some(kind) = ExceptionKind::from_name(name) {
            return Ok(Value::Callable(Callable::ExceptionType(kind)));
        }
        Err(EvalError::UnresolvedName(name.to_string()))
    }

    // ── Attributes ────────────────────────────────────────────────────────

    pub fn get_attr(&mut self, object: &Value, name: &str) -> EvalResult<Value> {
        match (object, name) {
            (Value::Class(class), "__name__") => return Ok(Value::str(class.name.as_str())),
            (Value::Class(class), _) => {
                return class.namespace.get_local(name).ok_or_else(|| {
                    EvalError::raise(
                        ExceptionKind::AttributeError,
                        format!("type object '{}' has no attribute '{name}'", class.name),
                    )
                });
            }
            (Value::Callable(c), "__name__") => return Ok(Value::str(c.name())),
            (Value::Exception(exc), "value") => return Ok(exc.value.clone()),
            (Value::Exception(exc), "args") => {
                let args = match &exc.message {
                    Some(m) => vec![Value::str(m.as_str())],
                    None if !exc.value.is_none() => vec![exc.value.clone()],
                    None => vec![],
                };
                return Ok(Value::tuple(args));
            }
            _ => {}
        }
        if Builtin::method_exists(object, name) {
            return Ok(Value::Callable(Callable::BoundMethod(Rc::new(BoundMethod {
                receiver: object.clone(),
                name: name.to_string(),
            }))));
        }
        Err(EvalError::raise(
            ExceptionKind::AttributeError,
            format!("'{}' object has no attribute '{name}'", object.type_name()),
        ))
    }

    pub fn store_attr(&mut self, object: &Value, name: &str, value: Value) -> EvalResult<()> {
        match object {
            Value::Class(class) => {
                class.namespace.define(name, value);
                Ok(())
            }
            other => Err(EvalError::raise(
                ExceptionKind::AttributeError,
                format!("'{}' object attribute '{name}' is read-only", other.type_name()),
            )),
        }
    }

    // ── Calls ─────────────────────────────────────────────────────────────

    pub fn call_value(&mut self, callee: &Value, args: Vec<Value>) -> EvalResult<Value> {
        match callee {
            Value::Callable(Callable::Function(func)) => self.call_function(func, args),
            Value::Callable(Callable::Builtin(b)) => self.call_builtin(*b, args),
            Value::Callable(Callable::BoundMethod(m)) => {
                self.call_method(&m.receiver, &m.name, args)
            }
            Value::Callable(Callable::ExceptionType(kind)) => {
                Ok(Value::exception(new_exception(*kind, args)))
            }
            other => Err(EvalError::unsupported(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    /// Call a user function. Generator functions return a fresh, not-started
    /// generator without running any of the body.
    pub fn call_function(&mut self, func: &Rc<Function>, args: Vec<Value>) -> EvalResult<Value> {
        tracing::trace!(function = %func.name, argc = args.len(), "call");
        let env = bind_arguments(func, args)?;

        if func.is_generator {
            if let FunctionBody::Block(body) = &func.body {
                return Ok(Value::Generator(Generator::new(
                    func.name.clone(),
                    body.clone(),
                    env,
                )));
            }
        }

        self.enter_frame()?;
        let result = match &func.body {
            FunctionBody::Block(body) => self.exec_block(body, &env).map(|()| Value::None),
            FunctionBody::Expr(body) => self.eval_expr(body, &env),
        };
        self.leave_frame();

        match result {
            Err(EvalError::Return(value)) => Ok(value),
            other => other,
        }
    }

    fn eval_params(
        &mut self,
        params: &[Param],
        env: &Env,
    ) -> EvalResult<(Vec<String>, Vec<Option<Value>>)> {
        let mut names = Vec::with_capacity(params.len());
        let mut defaults = Vec::with_capacity(params.len());
        for param in params {
            names.push(param.name.name.clone());
            defaults.push(match &param.default {
                Some(expr) => Some(self.eval_expr(expr, env)?),
                None => None,
            });
        }
        Ok((names, defaults))
    }

    // ══════════════════════════════════════════════════════════════════════
    // Statement execution
    // ══════════════════════════════════════════════════════════════════════

    /// Run a module body. Returns the value of the last expression statement
    /// executed at top level, or None.
    pub fn exec_module(&mut self, body: &Block, env: &Env) -> EvalResult<Value> {
        let mut last = Value::None;
        for stmt in body.iter() {
            match stmt {
                Stmt::Expr(s) => last = self.eval_expr(&s.expr, env)?,
                other => {
                    self.exec_stmt(other, env)?;
                    last = Value::None;
                }
            }
        }
        Ok(last)
    }

    pub fn exec_block(&mut self, block: &Block, env: &Env) -> EvalResult<()> {
        for stmt in block.iter() {
            self.exec_stmt(stmt, env)?;
        }
        Ok(())
    }

    pub fn exec_stmt(&mut self, stmt: &Stmt, env: &Env) -> EvalResult<()> {
        self.tick()?;
        match stmt {
            Stmt::Expr(s) => self.eval_expr(&s.expr, env).map(drop),
            Stmt::Assign(s) => self.exec_assign(s, env),
            Stmt::AugAssign(s) => self.exec_aug_assign(s, env),
            Stmt::If(s) => {
                if self.eval_expr(&s.condition, env)?.is_truthy() {
                    self.exec_block(&s.then_block, env)
                } else if let Some(else_block) = &s.else_block {
                    self.exec_block(else_block, env)
                } else {
                    Ok(())
                }
            }
            Stmt::While(s) => self.exec_while(s, env),
            Stmt::For(s) => self.exec_for(s, env),
            Stmt::FunctionDef(def) => self.exec_function_def(def, env),
            Stmt::ClassDef(def) => self.exec_class_def(def, env),
            Stmt::Return(s) => {
                let value = match &s.value {
                    Some(expr) => self.eval_expr(expr, env)?,
                    None => Value::None,
                };
                Err(EvalError::Return(value))
            }
            Stmt::Try(s) => self.exec_try(s, env),
            Stmt::Raise(s) => Err(self.exec_raise(s, env)?),
            Stmt::Match(s) => self.exec_match(s, env),
            Stmt::Break(_) => Err(EvalError::Break),
            Stmt::Continue(_) => Err(EvalError::Continue),
            Stmt::Pass(_) => Ok(()),
        }
    }

    // ── Loops ─────────────────────────────────────────────────────────────

    fn exec_while(&mut self, stmt: &WhileStmt, env: &Env) -> EvalResult<()> {
        loop {
            self.tick()?;
            if !self.eval_expr(&stmt.condition, env)?.is_truthy() {
                break;
            }
            match self.exec_block(&stmt.body, env) {
                Ok(()) | Err(EvalError::Continue) => {}
                Err(EvalError::Break) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
        match &stmt.else_block {
            Some(block) => self.exec_block(block, env),
            None => Ok(()),
        }
    }

    fn exec_for(&mut self, stmt: &ForStmt, env: &Env) -> EvalResult<()> {
        let iterable = self.eval_expr(&stmt.iterable, env)?;
        let mut iter = ValueIter::new(&iterable)?;
        while let Some(item) = iter.next(self)? {
            self.tick()?;
            self.assign_target(&stmt.target, item, env)?;
            match self.exec_block(&stmt.body, env) {
                Ok(()) | Err(EvalError::Continue) => {}
                Err(EvalError::Break) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
        match &stmt.else_block {
            Some(block) => self.exec_block(block, env),
            None => Ok(()),
        }
    }

    // ── Definitions ───────────────────────────────────────────────────────

    fn exec_function_def(&mut self, def: &FunctionDef, env: &Env) -> EvalResult<()> {
        let (params, defaults) = self.eval_params(&def.params, env)?;
        let func = Function {
            name: def.name.name.clone(),
            params,
            defaults,
            body: FunctionBody::Block(def.body.clone()),
            closure: env.clone(),
            is_generator: block_yields(&def.body),
        };
        env.define(
            &def.name.name,
            Value::Callable(Callable::Function(Rc::new(func))),
        );
        Ok(())
    }

    /// Run the class body in its own scope and bind the resulting class object.
    fn exec_class_def(&mut self, def: &ClassDef, env: &Env) -> EvalResult<()> {
        let namespace = Environment::child(env, ScopeKind::Class);
        self.exec_block(&def.body, &namespace)?;
        tracing::debug!(class = %def.name.name, members = ?namespace.names(), "class created");
        env.define(
            &def.name.name,
            Value::Class(Rc::new(ClassObject {
                name: def.name.name.clone(),
                namespace,
            })),
        );
        Ok(())
    }

    // ── Exceptions ────────────────────────────────────────────────────────

    fn exec_try(&mut self, stmt: &TryStmt, env: &Env) -> EvalResult<()> {
        let outcome = match self.exec_block(&stmt.body, env) {
            Ok(()) => match &stmt.else_block {
                Some(block) => self.exec_block(block, env),
                None => Ok(()),
            },
            Err(err) => self.handle_exception(&stmt.handlers, err, env),
        };
        if let Some(finally) = &stmt.finally_block {
            self.exec_block(finally, env)?;
        }
        outcome
    }

    fn handle_exception(
        &mut self,
        handlers: &[ExceptHandler],
        err: EvalError,
        env: &Env,
    ) -> EvalResult<()> {
        let Some(exc) = err.to_exception() else {
            return Err(err);
        };
        let Some(handler) = self.find_handler(handlers, &exc, env)? else {
            return Err(err);
        };
        self.bind_handler(handler, exc, env);
        self.handling.push(err);
        let result = self.exec_block(&handler.body, env);
        self.handling.pop();
        result
    }

    /// First handler whose type matches `exc`, in source order.
    pub(crate) fn find_handler<'h>(
        &mut self,
        handlers: &'h [ExceptHandler],
        exc: &Exception,
        env: &Env,
    ) -> EvalResult<Option<&'h ExceptHandler>> {
        for handler in handlers {
            let Some(type_expr) = &handler.exc_type else {
                return Ok(Some(handler));
            };
            let expected = self.eval_expr(type_expr, env)?;
            if handler_matches(&expected, exc.kind)? {
                return Ok(Some(handler));
            }
        }
        Ok(None)
    }

    pub(crate) fn bind_handler(&mut self, handler: &ExceptHandler, exc: Exception, env: &Env) {
        if let Some(name) = &handler.name {
            env.define(&name.name, Value::exception(exc));
        }
    }

    /// Build the error a `raise` statement throws.
    fn exec_raise(&mut self, stmt: &RaiseStmt, env: &Env) -> EvalResult<EvalError> {
        match &stmt.exc {
            Some(expr) => {
                let value = self.eval_expr(expr, env)?;
                exception_from_value(&value)
            }
            None => Ok(self.handling.last().cloned().unwrap_or_else(|| {
                EvalError::raise(ExceptionKind::RuntimeError, "No active exception to reraise")
            })),
        }
    }
}

/// Bind call arguments positionally, filling trailing defaults.
fn bind_arguments(func: &Function, args: Vec<Value>) -> EvalResult<Env> {
    if args.len() > func.params.len() {
        return Err(EvalError::unsupported(format!(
            "{}() takes {} positional arguments but {} were given",
            func.name,
            func.params.len(),
            args.len()
        )));
    }
    let env = Environment::child(&func.closure, ScopeKind::Function);
    let given = args.len();
    for (name, value) in func.params.iter().zip(args) {
        env.define(name, value);
    }
    let mut missing = Vec::new();
    for (name, default) in func.params.iter().zip(&func.defaults).skip(given) {
        match default {
            Some(value) => env.define(name, value.clone()),
            None => missing.push(format!("'{name}'")),
        }
    }
    if !missing.is_empty() {
        return Err(EvalError::unsupported(format!(
            "{}() missing {} required positional argument{}: {}",
            func.name,
            missing.len(),
            if missing.len() == 1 { "" } else { "s" },
            missing.join(" and ")
        )));
    }
    Ok(env)
}

/// Instantiate an exception class with call arguments.
fn new_exception(kind: ExceptionKind, args: Vec<Value>) -> Exception {
    match (kind, args.as_slice()) {
        (_, []) => Exception::new(kind),
        (ExceptionKind::StopIteration, [value]) => Exception::stop_iteration(value.clone()),
        (_, [arg]) => Exception::with_message(kind, arg.to_str()),
        _ => Exception::with_message(kind, Value::tuple(args).repr()),
    }
}

/// Turn the operand of `raise` (or `throw`) into an error.
pub(crate) fn exception_from_value(value: &Value) -> EvalResult<EvalError> {
    match value {
        Value::Exception(exc) => Ok(EvalError::Raised((**exc).clone())),
        Value::Callable(Callable::ExceptionType(kind)) => {
            Ok(EvalError::Raised(Exception::new(*kind)))
        }
        other => Err(EvalError::unsupported(format!(
            "exceptions must derive from BaseException, not '{}'",
            other.type_name()
        ))),
    }
}

/// `except T:` where T is an exception class or a tuple of them.
fn handler_matches(expected: &Value, kind: ExceptionKind) -> EvalResult<bool> {
    match expected {
        Value::Callable(Callable::ExceptionType(base)) => Ok(kind.is_subclass_of(*base)),
        Value::Tuple(options) => {
            for option in options.iter() {
                if handler_matches(option, kind)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        _ => Err(EvalError::unsupported(
            "catching classes that do not inherit from BaseException is not allowed",
        )),
    }
}
