//! Builtin dispatch, including the reporting namespace.
//!
//! The `__step_*` builtins are where instrumented code meets the run's
//! [`crate::report::ReportSink`]:
//!
//! - `__step_before__(type, category, l1, c1, l2, c2)` emits a `before`
//!   step and yields `null`.
//! - `__step_after__(type, l1, c1, l2, c2)` emits a statement `after` step
//!   with the scope chain visible at the call site.
//! - `__step_value__(type, l1, c1, l2, c2, value)` emits an expression
//!   `after` step carrying the encoded value, then returns `value`
//!   unchanged -- which is what makes the instrumenter's expression
//!   wrappers transparent.
//!
//! Scope capture reads stored bindings only; no script code runs while a
//! snapshot is taken.

use indexmap::IndexMap;
use std::time::Duration;

use steplang_core::step::StepCategory;
use steplang_core::{Position, Span};

use super::env::EnvRef;
use super::error::RuntimeError;
use super::eval::Interpreter;
use super::value::{Builtin, Value};
use crate::codec;

impl Interpreter<'_> {
    pub(crate) fn call_builtin(
        &mut self,
        builtin: Builtin,
        args: &[Value],
        env: &EnvRef,
    ) -> Result<Value, RuntimeError> {
        match builtin {
            Builtin::Log => {
                let line = args.iter().map(codec::encode).collect();
                self.sink.push_log(line);
                Ok(Value::Null)
            }
            Builtin::Sleep => {
                let ms = number_arg(args, 0, "sleep")?;
                if !ms.is_finite() || ms < 0.0 {
                    return Err(RuntimeError::type_error(
                        "sleep requires a non-negative finite duration",
                    ));
                }
                std::thread::sleep(Duration::from_millis(ms as u64));
                Ok(Value::Null)
            }
            Builtin::Len => match args.first() {
                Some(Value::Str(s)) => Ok(Value::Num(s.chars().count() as f64)),
                Some(Value::Array(cells)) => Ok(Value::Num(cells.borrow().len() as f64)),
                Some(Value::Object(cells)) => Ok(Value::Num(cells.borrow().len() as f64)),
                _ => Err(RuntimeError::type_error(
                    "len requires a string, array, or object",
                )),
            },
            Builtin::Push => match args.first() {
                Some(Value::Array(cells)) => {
                    let value = args.get(1).cloned().unwrap_or(Value::Null);
                    let mut items = cells.borrow_mut();
                    items.push(value);
                    Ok(Value::Num(items.len() as f64))
                }
                _ => Err(RuntimeError::type_error("push requires an array")),
            },
            Builtin::Keys => match args.first() {
                Some(Value::Object(cells)) => {
                    let keys = cells
                        .borrow()
                        .keys()
                        .map(|k| Value::Str(k.clone()))
                        .collect();
                    Ok(Value::array(keys))
                }
                _ => Err(RuntimeError::type_error("keys requires an object")),
            },
            Builtin::Str => {
                let value = args.first().cloned().unwrap_or(Value::Null);
                Ok(Value::Str(codec::display(&value)))
            }
            Builtin::Error => {
                let message = args
                    .first()
                    .map(codec::display)
                    .unwrap_or_default();
                let mut entries = IndexMap::new();
                entries.insert("message".to_string(), Value::Str(message));
                Ok(Value::object(entries))
            }
            Builtin::StepBefore => {
                let node_type = string_arg(args, 0, "__step_before__")?;
                let category = match string_arg(args, 1, "__step_before__")?.as_str() {
                    "statement" => StepCategory::Statement,
                    _ => StepCategory::Expression,
                };
                let loc = span_args(args, 2, "__step_before__")?;
                self.sink.report_before(&node_type, category, loc)?;
                Ok(Value::Null)
            }
            Builtin::StepAfter => {
                let node_type = string_arg(args, 0, "__step_after__")?;
                let loc = span_args(args, 1, "__step_after__")?;
                let scopes = codec::snapshot_scopes(env);
                self.sink.report_statement_after(&node_type, loc, scopes)?;
                Ok(Value::Null)
            }
            Builtin::StepValue => {
                let node_type = string_arg(args, 0, "__step_value__")?;
                let loc = span_args(args, 1, "__step_value__")?;
                let payload = args.get(5).cloned().unwrap_or(Value::Null);
                let wire = codec::encode(&payload);
                let scopes = codec::snapshot_scopes(env);
                self.sink.report_value(&node_type, loc, scopes, wire)?;
                // The wrapper must be transparent: hand the value back.
                Ok(payload)
            }
        }
    }
}

fn string_arg(args: &[Value], index: usize, name: &str) -> Result<String, RuntimeError> {
    match args.get(index) {
        Some(Value::Str(s)) => Ok(s.clone()),
        _ => Err(RuntimeError::type_error(format!(
            "{} expects a string argument at position {}",
            name, index
        ))),
    }
}

fn number_arg(args: &[Value], index: usize, name: &str) -> Result<f64, RuntimeError> {
    match args.get(index) {
        Some(Value::Num(n)) => Ok(*n),
        _ => Err(RuntimeError::type_error(format!(
            "{} expects a number argument at position {}",
            name, index
        ))),
    }
}

/// Reads four consecutive number arguments as `l1, c1, l2, c2`.
fn span_args(args: &[Value], offset: usize, name: &str) -> Result<Span, RuntimeError> {
    let l1 = number_arg(args, offset, name)?;
    let c1 = number_arg(args, offset + 1, name)?;
    let l2 = number_arg(args, offset + 2, name)?;
    let c2 = number_arg(args, offset + 3, name)?;
    Ok(Span::new(
        Position::new(l1 as u32, c1 as u32),
        Position::new(l2 as u32, c2 as u32),
    ))
}
