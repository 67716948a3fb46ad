#![doc = include_str!("../../../README.md")]

mod args;
mod capture;
mod exception;
mod object;
pub mod pickle;
mod serializable;
mod signature;
pub mod tracer;

pub use crate::{
    args::{CallArgs, Locals},
    capture::{OmitPolicy, reconcile, reconcile_traced},
    exception::{CaptureError, CaptureResult, ExcType},
    object::{ConversionError, DictPairs, Object},
    pickle::Registry,
    serializable::{InitArgs, ReconstructFn, Reduced, Serializable, StateDict, from_object, reconstruct},
    signature::{Param, ParamKind, Signature, SignatureBuilder},
    tracer::{CaptureTracer, NoopTracer, RecordingTracer, StderrTracer, TraceEvent},
};
