//! Capture tracing infrastructure.
//!
//! Provides a trait-based tracing system for argument capture with zero-cost abstraction.
//! When using [`NoopTracer`], all trace methods compile away entirely via monomorphization.
//!
//! # Architecture
//!
//! The [`CaptureTracer`] trait defines hook points at the interesting decisions the
//! reconciler and the capture guard make. Concrete implementations collect different
//! kinds of data:
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopTracer`] | Zero-cost no-op (default for the untraced entry points) |
//! | [`StderrTracer`] | Human-readable capture log to stderr |
//! | [`RecordingTracer`] | Full event recording for tests or post-mortem |
//!
//! # Usage
//!
//! ```ignore
//! // Production (zero overhead):
//! let call = reconcile(&signature, &locals, &OmitPolicy::None)?;
//!
//! // Debugging:
//! let call = reconcile_traced(&signature, &locals, &OmitPolicy::None, &mut StderrTracer::new())?;
//! ```

use crate::args::CallArgs;

/// Trace event emitted during capture.
///
/// Used by [`RecordingTracer`] to keep a full history of what the reconciler decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A signature was reconciled against a locals snapshot.
    Reconcile {
        /// Name of the callable whose signature was reconciled.
        func_name: String,
        /// Number of values placed in the positional list.
        positional: usize,
        /// Keyword names in the resulting mapping, in order.
        keywords: Vec<String>,
    },
    /// Non-empty `*args` forced earlier parameters into positional slots.
    Demote {
        /// Name of the callable.
        func_name: String,
        /// Number of positional-or-keyword parameters moved out of the keyword mapping.
        demoted: usize,
        /// Number of extra positional values taken from `*args`.
        var_args: usize,
    },
    /// A parameter was dropped because its value equals its declared default.
    OmitDefault {
        /// Name of the callable.
        func_name: String,
        /// Name of the omitted parameter.
        param: String,
    },
    /// An instance stored its captured call.
    Capture {
        /// Name of the initializer whose arguments were stored.
        func_name: String,
    },
    /// A capture call was ignored because the instance had already captured.
    CaptureSkipped {
        /// Name of the initializer whose capture attempt was ignored.
        func_name: String,
    },
}

/// Trait for capture tracing.
///
/// All methods have default no-op implementations, so [`NoopTracer`] requires
/// zero lines of code and compiles to zero instructions. Implementations only
/// override the hooks they care about.
pub trait CaptureTracer: std::fmt::Debug {
    /// Called once a reconciliation has produced its final argument split.
    #[inline(always)]
    fn on_reconcile(&mut self, _func_name: &str, _call: &CallArgs) {}

    /// Called when a non-empty `*args` demotes earlier keyword candidates to positional.
    ///
    /// # Arguments
    /// * `demoted` - Number of positional-or-keyword parameters moved to the positional list
    /// * `var_args` - Number of values contributed by `*args`
    #[inline(always)]
    fn on_demote(&mut self, _func_name: &str, _demoted: usize, _var_args: usize) {}

    /// Called for every parameter dropped by the omit-defaults policy.
    #[inline(always)]
    fn on_omit_default(&mut self, _func_name: &str, _param: &str) {}

    /// Called when an instance transitions from uncaptured to captured.
    #[inline(always)]
    fn on_capture(&mut self, _func_name: &str) {}

    /// Called when a capture attempt hits the already-captured guard.
    #[inline(always)]
    fn on_capture_skipped(&mut self, _func_name: &str) {}
}

// ============================================================================
// NoopTracer: zero-cost default
// ============================================================================

/// A tracer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl CaptureTracer for NoopTracer {}

// ============================================================================
// StderrTracer: human-readable capture log
// ============================================================================

/// Tracer that prints a human-readable capture log to stderr.
///
/// Output format:
/// ```text
/// [capture] Point: demoted 2 parameters, 3 values from *args
/// [capture] Point: omitted defaulted 'scale'
/// [capture] Point: args=('a1', 'a2', 'v1') kwargs=["kw"]
/// [capture] Point: stored
/// [capture] Base: skipped (already captured)
/// ```
#[derive(Debug, Default)]
pub struct StderrTracer {
    /// Number of lines written so far.
    lines: usize,
}

impl StderrTracer {
    /// Creates a new stderr tracer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of log lines written by this tracer.
    #[must_use]
    pub fn lines(&self) -> usize {
        self.lines
    }

    fn log(&mut self, func_name: &str, message: std::fmt::Arguments<'_>) {
        eprintln!("[capture] {func_name}: {message}");
        self.lines += 1;
    }
}

impl CaptureTracer for StderrTracer {
    fn on_reconcile(&mut self, func_name: &str, call: &CallArgs) {
        let args = crate::Object::Tuple(call.args().to_vec()).py_repr();
        let keywords: Vec<&str> = call.kwargs().keys().map(String::as_str).collect();
        self.log(func_name, format_args!("args={args} kwargs={keywords:?}"));
    }

    fn on_demote(&mut self, func_name: &str, demoted: usize, var_args: usize) {
        self.log(
            func_name,
            format_args!("demoted {demoted} parameters, {var_args} values from *args"),
        );
    }

    fn on_omit_default(&mut self, func_name: &str, param: &str) {
        self.log(func_name, format_args!("omitted defaulted '{param}'"));
    }

    fn on_capture(&mut self, func_name: &str) {
        self.log(func_name, format_args!("stored"));
    }

    fn on_capture_skipped(&mut self, func_name: &str) {
        self.log(func_name, format_args!("skipped (already captured)"));
    }
}

// ============================================================================
// RecordingTracer: full event recording
// ============================================================================

/// Tracer that records all events for inspection after the fact.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    /// All recorded events in chronological order.
    events: Vec<TraceEvent>,
}

impl RecordingTracer {
    /// Creates a new recording tracer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded events.
    #[must_use]
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Consumes the tracer and returns the recorded events.
    #[must_use]
    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }
}

impl CaptureTracer for RecordingTracer {
    fn on_reconcile(&mut self, func_name: &str, call: &CallArgs) {
        self.events.push(TraceEvent::Reconcile {
            func_name: func_name.to_owned(),
            positional: call.args().len(),
            keywords: call.kwargs().keys().cloned().collect(),
        });
    }

    fn on_demote(&mut self, func_name: &str, demoted: usize, var_args: usize) {
        self.events.push(TraceEvent::Demote {
            func_name: func_name.to_owned(),
            demoted,
            var_args,
        });
    }

    fn on_omit_default(&mut self, func_name: &str, param: &str) {
        self.events.push(TraceEvent::OmitDefault {
            func_name: func_name.to_owned(),
            param: param.to_owned(),
        });
    }

    fn on_capture(&mut self, func_name: &str) {
        self.events.push(TraceEvent::Capture {
            func_name: func_name.to_owned(),
        });
    }

    fn on_capture_skipped(&mut self, func_name: &str) {
        self.events.push(TraceEvent::CaptureSkipped {
            func_name: func_name.to_owned(),
        });
    }
}
