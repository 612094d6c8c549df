//! The tree-walking evaluator.
//!
//! One match arm per statement and expression variant. Control flow inside
//! blocks travels as [`Flow`] values (normal / return / break / continue);
//! errors travel as `Result` and halt the run where they surface.
//!
//! The evaluator itself knows nothing about instrumentation: the injected
//! `__step_*` calls are ordinary builtin calls that happen to report into
//! the run's [`ReportSink`]. Running an uninstrumented script through the
//! evaluator is equally valid (and is how the semantics-preservation tests
//! compare instrumented and plain runs).

use std::rc::Rc;

use smallvec::SmallVec;

use steplang_syntax::ast::{
    AssignOp, BinaryOp, Expr, ExprKind, LogicalOp, Program, Stmt, StmtKind, UnaryOp,
};

use super::env::{self, Binding, EnvRef, Environment};
use super::error::RuntimeError;
use super::value::{Builtin, ScriptFunction, Value};
use crate::codec;
use crate::report::ReportSink;

/// Interpreter limits.
#[derive(Debug, Clone, Copy)]
pub struct ExecConfig {
    /// Step ceiling per run; a runaway loop trips `StepLimitExceeded`.
    pub max_steps: u64,
    /// Maximum function call depth.
    pub max_call_depth: usize,
}

impl Default for ExecConfig {
    fn default() -> Self {
        ExecConfig {
            max_steps: 200_000,
            max_call_depth: 256,
        }
    }
}

/// How a statement finished.
pub(crate) enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// The evaluator for one run.
///
/// Holds the run's report sink (the explicit reporting context) and the
/// call-depth counter. A fresh `Interpreter` -- and a fresh environment
/// chain -- is built per run; nothing survives into the next one.
pub struct Interpreter<'run> {
    pub(crate) sink: &'run mut ReportSink,
    config: ExecConfig,
    depth: usize,
}

impl<'run> Interpreter<'run> {
    /// Runs a parsed program to completion against a fresh environment.
    pub fn run(
        program: &Program,
        sink: &'run mut ReportSink,
        config: ExecConfig,
    ) -> Result<(), RuntimeError> {
        let root = Environment::root();
        {
            let mut frame = root.borrow_mut();
            for builtin in Builtin::all() {
                frame.define(builtin.name(), Value::Builtin(*builtin));
            }
        }
        let globals = Environment::child(&root);

        let mut interp = Interpreter {
            sink,
            config,
            depth: 0,
        };
        hoist(&program.body, &globals);
        match interp.exec_stmts(&program.body, &globals)? {
            Flow::Normal => Ok(()),
            Flow::Return(_) => Err(RuntimeError::type_error(
                "'return' outside of a function",
            )),
            Flow::Break => Err(RuntimeError::type_error("'break' outside of a loop")),
            Flow::Continue => Err(RuntimeError::type_error("'continue' outside of a loop")),
        }
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn exec_stmts(&mut self, body: &[Stmt], env: &EnvRef) -> Result<Flow, RuntimeError> {
        for stmt in body {
            match self.exec_stmt(stmt, env)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    /// Runs `body` in a fresh child scope of `parent`.
    fn exec_block(&mut self, body: &[Stmt], parent: &EnvRef) -> Result<Flow, RuntimeError> {
        let env = Environment::child(parent);
        hoist(body, &env);
        self.exec_stmts(body, &env)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, env: &EnvRef) -> Result<Flow, RuntimeError> {
        match &stmt.kind {
            StmtKind::Let { name, init } => {
                let value = self.eval_expr(init, env)?;
                env.borrow_mut().define(name, value);
                Ok(Flow::Normal)
            }
            StmtKind::Expr { expr } => {
                self.eval_expr(expr, env)?;
                Ok(Flow::Normal)
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                if self.eval_expr(cond, env)?.truthy() {
                    self.exec_block(then_block, env)
                } else if let Some(else_block) = else_block {
                    self.exec_block(else_block, env)
                } else {
                    Ok(Flow::Normal)
                }
            }
            StmtKind::While { cond, body } => {
                while self.eval_expr(cond, env)?.truthy() {
                    match self.exec_block(body, env)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                // The header gets its own scope enclosing the body.
                let header = Environment::child(env);
                if let Some(init) = init {
                    match self.exec_stmt(init, &header)? {
                        Flow::Normal => {}
                        _ => {
                            return Err(RuntimeError::type_error(
                                "control transfer in 'for' initializer",
                            ))
                        }
                    }
                }
                loop {
                    if let Some(cond) = cond {
                        if !self.eval_expr(cond, &header)?.truthy() {
                            break;
                        }
                    }
                    match self.exec_block(body, &header)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                    if let Some(update) = update {
                        self.eval_expr(update, &header)?;
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::Function { name, params, body } => {
                let function = Value::Function(Rc::new(ScriptFunction {
                    name: Some(name.clone()),
                    params: params.clone(),
                    body: Rc::new(body.clone()),
                    env: Rc::clone(env),
                }));
                env.borrow_mut().define(name, function);
                Ok(Flow::Normal)
            }
            StmtKind::Return { value } => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr, env)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
            StmtKind::Throw { value } => {
                let value = self.eval_expr(value, env)?;
                Err(thrown(value))
            }
            StmtKind::Block { body } => self.exec_block(body, env),
        }
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    pub(crate) fn eval_expr(&mut self, expr: &Expr, env: &EnvRef) -> Result<Value, RuntimeError> {
        match &expr.kind {
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Num(n) => Ok(Value::Num(*n)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::Ident(name) => self.read_ident(name, env),
            ExprKind::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expr(item, env)?);
                }
                Ok(Value::array(values))
            }
            ExprKind::Object(entries) => {
                let mut map = indexmap::IndexMap::with_capacity(entries.len());
                for (key, value) in entries {
                    map.insert(key.clone(), self.eval_expr(value, env)?);
                }
                Ok(Value::object(map))
            }
            ExprKind::Unary { op, operand } => {
                let value = self.eval_expr(operand, env)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.truthy())),
                    UnaryOp::Neg => match value {
                        Value::Num(n) => Ok(Value::Num(-n)),
                        other => Err(RuntimeError::type_error(format!(
                            "cannot negate a {}",
                            other.type_name()
                        ))),
                    },
                }
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.eval_expr(left, env)?;
                let right = self.eval_expr(right, env)?;
                binary_op(*op, left, right)
            }
            ExprKind::Logical { op, left, right } => {
                let left = self.eval_expr(left, env)?;
                match op {
                    LogicalOp::And if !left.truthy() => Ok(left),
                    LogicalOp::Or if left.truthy() => Ok(left),
                    _ => self.eval_expr(right, env),
                }
            }
            ExprKind::Assign { op, target, value } => self.eval_assign(*op, target, value, env),
            ExprKind::Call { callee, args } => {
                let callee = self.eval_expr(callee, env)?;
                let mut argv: SmallVec<[Value; 4]> = SmallVec::new();
                for arg in args {
                    argv.push(self.eval_expr(arg, env)?);
                }
                self.call_value(callee, &argv, env)
            }
            ExprKind::Member { object, property } => {
                let object = self.eval_expr(object, env)?;
                read_member(&object, property)
            }
            ExprKind::Index { object, index } => {
                let object = self.eval_expr(object, env)?;
                let index = self.eval_expr(index, env)?;
                read_index(&object, &index)
            }
            ExprKind::Function { name, params, body } => {
                Ok(Value::Function(Rc::new(ScriptFunction {
                    name: name.clone(),
                    params: params.clone(),
                    body: Rc::new(body.clone()),
                    env: Rc::clone(env),
                })))
            }
            ExprKind::Seq(exprs) => {
                let mut last = Value::Null;
                for expr in exprs {
                    last = self.eval_expr(expr, env)?;
                }
                Ok(last)
            }
        }
    }

    fn read_ident(&self, name: &str, env: &EnvRef) -> Result<Value, RuntimeError> {
        match env::lookup(env, name) {
            Some(Binding::Init(value)) => Ok(value),
            Some(Binding::Uninitialized) => Err(RuntimeError::reference(format!(
                "cannot access '{}' before initialization",
                name
            ))),
            None => Err(RuntimeError::reference(format!(
                "'{}' is not defined",
                name
            ))),
        }
    }

    fn eval_assign(
        &mut self,
        op: AssignOp,
        target: &Expr,
        value: &Expr,
        env: &EnvRef,
    ) -> Result<Value, RuntimeError> {
        match &target.kind {
            ExprKind::Ident(name) => {
                let new_value = match op {
                    AssignOp::Assign => self.eval_expr(value, env)?,
                    _ => {
                        let current = self.read_ident(name, env)?;
                        let rhs = self.eval_expr(value, env)?;
                        compound(op, current, rhs)?
                    }
                };
                if !env::assign(env, name, new_value.clone()) {
                    return Err(RuntimeError::reference(format!(
                        "'{}' is not defined",
                        name
                    )));
                }
                Ok(new_value)
            }
            ExprKind::Member { object, property } => {
                let object = self.eval_expr(object, env)?;
                let new_value = match op {
                    AssignOp::Assign => self.eval_expr(value, env)?,
                    _ => {
                        let current = read_member(&object, property)?;
                        let rhs = self.eval_expr(value, env)?;
                        compound(op, current, rhs)?
                    }
                };
                write_member(&object, property, new_value.clone())?;
                Ok(new_value)
            }
            ExprKind::Index { object, index } => {
                let object = self.eval_expr(object, env)?;
                let index = self.eval_expr(index, env)?;
                let new_value = match op {
                    AssignOp::Assign => self.eval_expr(value, env)?,
                    _ => {
                        let current = read_index(&object, &index)?;
                        let rhs = self.eval_expr(value, env)?;
                        compound(op, current, rhs)?
                    }
                };
                write_index(&object, &index, new_value.clone())?;
                Ok(new_value)
            }
            // The parser only accepts the three target shapes above.
            _ => Err(RuntimeError::type_error("invalid assignment target")),
        }
    }

    pub(crate) fn call_value(
        &mut self,
        callee: Value,
        args: &[Value],
        env: &EnvRef,
    ) -> Result<Value, RuntimeError> {
        match callee {
            Value::Function(function) => self.call_script_function(&function, args),
            Value::Builtin(builtin) => self.call_builtin(builtin, args, env),
            other => Err(RuntimeError::type_error(format!(
                "{} is not a function",
                codec::display(&other)
            ))),
        }
    }

    fn call_script_function(
        &mut self,
        function: &ScriptFunction,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        if self.depth >= self.config.max_call_depth {
            return Err(RuntimeError::range(format!(
                "maximum call depth of {} exceeded",
                self.config.max_call_depth
            )));
        }

        // One frame holds parameters and body-level declarations together.
        let env = Environment::child(&function.env);
        {
            let mut frame = env.borrow_mut();
            for (i, param) in function.params.iter().enumerate() {
                frame.define(param, args.get(i).cloned().unwrap_or(Value::Null));
            }
        }
        hoist(&function.body, &env);

        self.depth += 1;
        let result = self.exec_stmts(&function.body, &env);
        self.depth -= 1;

        match result? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Null),
            Flow::Break => Err(RuntimeError::type_error("'break' outside of a loop")),
            Flow::Continue => Err(RuntimeError::type_error("'continue' outside of a loop")),
        }
    }
}

/// Declares a block's `let` and `function` names up front, uninitialized.
/// Parameters are defined by the caller before hoisting, so hoisting never
/// clobbers an argument unless the body genuinely redeclares it.
fn hoist(body: &[Stmt], env: &EnvRef) {
    let mut frame = env.borrow_mut();
    for stmt in body {
        match &stmt.kind {
            StmtKind::Let { name, .. } => frame.declare(name),
            StmtKind::Function { name, .. } => frame.declare(name),
            _ => {}
        }
    }
}

/// Folds a thrown script value into a runtime error, extracting `message`
/// from error-shaped objects.
fn thrown(value: Value) -> RuntimeError {
    let message = match &value {
        Value::Str(s) => s.clone(),
        Value::Object(cells) => match cells.try_borrow().ok().and_then(|entries| {
            entries.get("message").map(|m| codec::display(m))
        }) {
            Some(message) => message,
            None => codec::display(&value),
        },
        other => codec::display(other),
    };
    RuntimeError::Thrown {
        kind: "Error".to_string(),
        message,
    }
}

fn binary_op(op: BinaryOp, left: Value, right: Value) -> Result<Value, RuntimeError> {
    match op {
        BinaryOp::Add => match (&left, &right) {
            (Value::Num(a), Value::Num(b)) => Ok(Value::Num(a + b)),
            (Value::Str(_), _) | (_, Value::Str(_)) => Ok(Value::Str(format!(
                "{}{}",
                codec::display(&left),
                codec::display(&right)
            ))),
            _ => Err(RuntimeError::type_error(format!(
                "cannot add {} and {}",
                left.type_name(),
                right.type_name()
            ))),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            let (a, b) = numeric_operands(op, &left, &right)?;
            Ok(Value::Num(match op {
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                // Division by zero follows IEEE 754 (infinities, NaN); the
                // codec renders those as opaque number descriptors.
                BinaryOp::Div => a / b,
                BinaryOp::Rem => a % b,
                _ => unreachable!(),
            }))
        }
        BinaryOp::Eq => Ok(Value::Bool(left.loose_eq(&right))),
        BinaryOp::NotEq => Ok(Value::Bool(!left.loose_eq(&right))),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            match (&left, &right) {
                (Value::Num(a), Value::Num(b)) => Ok(Value::Bool(compare(op, a, b))),
                (Value::Str(a), Value::Str(b)) => Ok(Value::Bool(compare(op, a, b))),
                _ => Err(RuntimeError::type_error(format!(
                    "cannot compare {} and {}",
                    left.type_name(),
                    right.type_name()
                ))),
            }
        }
    }
}

fn compare<T: PartialOrd + ?Sized>(op: BinaryOp, a: &T, b: &T) -> bool {
    match op {
        BinaryOp::Lt => a < b,
        BinaryOp::LtEq => a <= b,
        BinaryOp::Gt => a > b,
        BinaryOp::GtEq => a >= b,
        _ => unreachable!(),
    }
}

fn numeric_operands(
    op: BinaryOp,
    left: &Value,
    right: &Value,
) -> Result<(f64, f64), RuntimeError> {
    match (left, right) {
        (Value::Num(a), Value::Num(b)) => Ok((*a, *b)),
        _ => {
            let name = match op {
                BinaryOp::Sub => "subtract",
                BinaryOp::Mul => "multiply",
                BinaryOp::Div => "divide",
                BinaryOp::Rem => "take the remainder of",
                _ => "combine",
            };
            Err(RuntimeError::type_error(format!(
                "cannot {} {} and {}",
                name,
                left.type_name(),
                right.type_name()
            )))
        }
    }
}

fn compound(op: AssignOp, current: Value, rhs: Value) -> Result<Value, RuntimeError> {
    match op {
        AssignOp::AddAssign => binary_op(BinaryOp::Add, current, rhs),
        AssignOp::SubAssign => binary_op(BinaryOp::Sub, current, rhs),
        AssignOp::Assign => Ok(rhs),
    }
}

fn read_member(object: &Value, property: &str) -> Result<Value, RuntimeError> {
    match object {
        Value::Object(cells) => Ok(cells
            .borrow()
            .get(property)
            .cloned()
            .unwrap_or(Value::Null)),
        Value::Array(cells) if property == "length" => {
            Ok(Value::Num(cells.borrow().len() as f64))
        }
        Value::Str(s) if property == "length" => Ok(Value::Num(s.chars().count() as f64)),
        Value::Array(_) | Value::Str(_) => Ok(Value::Null),
        Value::Null => Err(RuntimeError::type_error(format!(
            "cannot read property '{}' of null",
            property
        ))),
        _ => Ok(Value::Null),
    }
}

fn write_member(object: &Value, property: &str, value: Value) -> Result<(), RuntimeError> {
    match object {
        Value::Object(cells) => {
            cells.borrow_mut().insert(property.to_string(), value);
            Ok(())
        }
        other => Err(RuntimeError::type_error(format!(
            "cannot set property '{}' on a {}",
            property,
            other.type_name()
        ))),
    }
}

fn read_index(object: &Value, index: &Value) -> Result<Value, RuntimeError> {
    match (object, index) {
        (Value::Array(cells), Value::Num(n)) => {
            let items = cells.borrow();
            Ok(array_index(*n, items.len())
                .map(|i| items[i].clone())
                .unwrap_or(Value::Null))
        }
        (Value::Array(cells), Value::Str(key)) if key == "length" => {
            Ok(Value::Num(cells.borrow().len() as f64))
        }
        (Value::Object(cells), Value::Str(key)) => {
            Ok(cells.borrow().get(key).cloned().unwrap_or(Value::Null))
        }
        (Value::Object(cells), Value::Num(n)) => {
            let key = codec::display(&Value::Num(*n));
            Ok(cells.borrow().get(&key).cloned().unwrap_or(Value::Null))
        }
        (Value::Str(s), Value::Num(n)) => Ok(array_index(*n, s.chars().count())
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::Str(c.to_string()))
            .unwrap_or(Value::Null)),
        (Value::Null, _) => Err(RuntimeError::type_error("cannot index null")),
        (other, index) => Err(RuntimeError::type_error(format!(
            "cannot index a {} with a {}",
            other.type_name(),
            index.type_name()
        ))),
    }
}

fn write_index(object: &Value, index: &Value, value: Value) -> Result<(), RuntimeError> {
    match (object, index) {
        (Value::Array(cells), Value::Num(n)) => {
            let mut items = cells.borrow_mut();
            let len = items.len();
            match array_index(*n, len + 1) {
                Some(i) if i < len => {
                    items[i] = value;
                    Ok(())
                }
                // Writing one past the end appends.
                Some(_) => {
                    items.push(value);
                    Ok(())
                }
                None => Err(RuntimeError::range(format!(
                    "array index {} out of bounds (length {})",
                    n, len
                ))),
            }
        }
        (Value::Object(cells), Value::Str(key)) => {
            cells.borrow_mut().insert(key.clone(), value);
            Ok(())
        }
        (Value::Object(cells), Value::Num(n)) => {
            let key = codec::display(&Value::Num(*n));
            cells.borrow_mut().insert(key, value);
            Ok(())
        }
        (other, _) => Err(RuntimeError::type_error(format!(
            "cannot assign into a {}",
            other.type_name()
        ))),
    }
}

/// Converts a numeric index into a usable `usize` when it is a non-negative
/// integer inside `len`.
fn array_index(n: f64, len: usize) -> Option<usize> {
    if n.fract() != 0.0 || n < 0.0 || !n.is_finite() {
        return None;
    }
    let i = n as usize;
    (i < len).then_some(i)
}
