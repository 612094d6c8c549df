//! The per-run report sink.
//!
//! One [`ReportSink`] exists per run -- it is the explicit reporting context
//! the instrumented code calls back into (via the `__step_*` builtins),
//! never process-wide state. It assigns step numbers and `dt` relative to
//! run start, buffers log lines until the next report, enforces the step
//! ceiling, and observes the cooperative cancel flag between steps.
//!
//! Steps are immutable once emitted: the sink appends records and hands the
//! finished array over exactly once via [`ReportSink::into_steps`]. An
//! optional observer sees each record at emission time, which is how the
//! isolation layers stream steps to the host while the run is still going.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use steplang_core::step::{LogLine, ScopeFrame, StepCategory, StepRecord, StepTime};
use steplang_core::{Span, WireValue};

use crate::interpreter::RuntimeError;

/// Callback invoked with each step as it is emitted.
pub type StepObserver = Box<dyn FnMut(&StepRecord) + Send>;

/// Per-run reporting context.
pub struct ReportSink {
    start: Instant,
    steps: Vec<StepRecord>,
    pending_logs: Vec<LogLine>,
    cancel: Arc<AtomicBool>,
    max_steps: u64,
    observer: Option<StepObserver>,
}

impl ReportSink {
    pub fn new(cancel: Arc<AtomicBool>, max_steps: u64) -> Self {
        ReportSink {
            start: Instant::now(),
            steps: Vec::new(),
            pending_logs: Vec::new(),
            cancel,
            max_steps,
            observer: None,
        }
    }

    /// Attaches a streaming observer.
    pub fn with_observer(mut self, observer: StepObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Emits the synthetic `init` step anchoring the trace at `num` 0.
    pub fn emit_init(&mut self) -> Result<(), RuntimeError> {
        self.push(StepRecord::init())
    }

    /// Emits a `before` step for a statement or expression node.
    pub fn report_before(
        &mut self,
        node_type: &str,
        category: StepCategory,
        loc: Span,
    ) -> Result<(), RuntimeError> {
        self.push(self.record(Some(StepTime::Before), category, node_type, loc))
    }

    /// Emits the `after` step of a statement, with the visible scope chain.
    pub fn report_statement_after(
        &mut self,
        node_type: &str,
        loc: Span,
        scopes: Vec<ScopeFrame>,
    ) -> Result<(), RuntimeError> {
        let mut step = self.record(
            Some(StepTime::After),
            StepCategory::Statement,
            node_type,
            loc,
        );
        step.scopes = scopes;
        self.push(step)
    }

    /// Emits the `after` step of an expression, carrying its value and the
    /// visible scope chain.
    pub fn report_value(
        &mut self,
        node_type: &str,
        loc: Span,
        scopes: Vec<ScopeFrame>,
        value: WireValue,
    ) -> Result<(), RuntimeError> {
        let mut step = self.record(
            Some(StepTime::After),
            StepCategory::Expression,
            node_type,
            loc,
        );
        step.value = Some(value);
        step.scopes = scopes;
        self.push(step)
    }

    /// A record skeleton; `num`, `dt`, and `logs` are stamped in [`push`].
    fn record(
        &self,
        time: Option<StepTime>,
        category: StepCategory,
        node_type: &str,
        loc: Span,
    ) -> StepRecord {
        StepRecord {
            num: 0,
            time,
            category,
            node_type: Some(node_type.to_string()),
            loc: Some(loc),
            value: None,
            scopes: Vec::new(),
            logs: Vec::new(),
            dt: 0,
            wait: None,
        }
    }

    /// Buffers one log line; it attaches to the next emitted step.
    pub fn push_log(&mut self, line: LogLine) {
        self.pending_logs.push(line);
    }

    /// Number of steps emitted so far.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Hands the finished step array over (once, consuming the sink).
    pub fn into_steps(self) -> Vec<StepRecord> {
        self.steps
    }

    fn push(&mut self, mut step: StepRecord) -> Result<(), RuntimeError> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(RuntimeError::Cancelled);
        }
        if self.steps.len() as u64 >= self.max_steps {
            return Err(RuntimeError::StepLimit {
                limit: self.max_steps,
            });
        }
        step.num = self.steps.len() as u32;
        step.dt = self.start.elapsed().as_millis() as u64;
        // At-most-once delivery: the buffer moves onto this step and clears.
        step.logs = std::mem::take(&mut self.pending_logs);
        if let Some(observer) = &mut self.observer {
            observer(&step);
        }
        self.steps.push(step);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steplang_core::Position;

    fn sink() -> ReportSink {
        ReportSink::new(Arc::new(AtomicBool::new(false)), 1000)
    }

    fn loc() -> Span {
        Span::new(Position::new(1, 0), Position::new(1, 5))
    }

    #[test]
    fn numbers_are_contiguous() {
        let mut sink = sink();
        sink.emit_init().unwrap();
        sink.report_before("LetStatement", StepCategory::Statement, loc())
            .unwrap();
        sink.report_statement_after("LetStatement", loc(), Vec::new())
            .unwrap();
        let steps = sink.into_steps();
        let nums: Vec<u32> = steps.iter().map(|s| s.num).collect();
        assert_eq!(nums, vec![0, 1, 2]);
    }

    #[test]
    fn logs_attach_once_and_clear() {
        let mut sink = sink();
        sink.emit_init().unwrap();
        sink.push_log(vec![WireValue::Str { value: "a".into() }]);
        sink.push_log(vec![WireValue::Str { value: "b".into() }]);
        sink.report_before("CallExpression", StepCategory::Expression, loc())
            .unwrap();
        sink.report_value("CallExpression", loc(), Vec::new(), WireValue::Null)
            .unwrap();
        let steps = sink.into_steps();
        assert_eq!(steps[1].logs.len(), 2);
        assert!(steps[2].logs.is_empty());
    }

    #[test]
    fn step_limit_halts_emission() {
        let mut sink = ReportSink::new(Arc::new(AtomicBool::new(false)), 2);
        sink.emit_init().unwrap();
        sink.report_before("X", StepCategory::Statement, loc()).unwrap();
        let err = sink
            .report_before("X", StepCategory::Statement, loc())
            .unwrap_err();
        assert!(matches!(err, RuntimeError::StepLimit { limit: 2 }));
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn cancel_flag_stops_reports() {
        let cancel = Arc::new(AtomicBool::new(false));
        let mut sink = ReportSink::new(Arc::clone(&cancel), 100);
        sink.emit_init().unwrap();
        cancel.store(true, Ordering::Relaxed);
        assert!(matches!(
            sink.report_before("X", StepCategory::Statement, loc()),
            Err(RuntimeError::Cancelled)
        ));
    }

    #[test]
    fn observer_sees_each_step() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let mut sink = ReportSink::new(Arc::new(AtomicBool::new(false)), 100)
            .with_observer(Box::new(move |step| {
                seen_clone.lock().unwrap().push(step.num);
            }));
        sink.emit_init().unwrap();
        sink.report_before("X", StepCategory::Statement, loc()).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
    }

    #[test]
    fn dt_is_non_decreasing() {
        let mut sink = sink();
        sink.emit_init().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        sink.report_before("X", StepCategory::Statement, loc()).unwrap();
        let steps = sink.into_steps();
        assert!(steps[1].dt >= steps[0].dt);
    }
}
