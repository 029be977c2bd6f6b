//! Measurement curves and their replayable operation queue.
//!
//! A [`Curve`] owns immutable raw (x, y) data and an append-only queue of
//! [`Operation`]s. [`Curve::process_data`] resets the calculated data to the
//! raw data and replays the whole queue, so the calculated result is always a
//! pure function of the raw data and the current queue.
//!
//! # Example
//!
//! ```
//! use transport_preview::core::curve::{Curve, NormalizeMethod, Operation};
//!
//! let mut curve = Curve::new(vec![0.0, 1.0, 2.0, 3.0], vec![1.0, 2.0, 2.0, 1.0]).unwrap();
//! curve.push_operation(Operation::AverageUpDown).unwrap();
//! curve.push_operation(Operation::Normalize(NormalizeMethod::Max)).unwrap();
//! curve.process_data().unwrap();
//! assert_eq!(curve.calc_y(), &[0.5, 1.0]);
//! ```

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::events::{EventSink, LogSink, ProcessingEvent};
use super::signal::{self, SignalError};
use super::ErrorKind;

/// Errors raised while building or replaying a curve's operation queue.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CurveError {
    #[error("x has {x_len} samples but y has {y_len}")]
    LengthMismatch { x_len: usize, y_len: usize },

    #[error("raw {axis} sample {index} is not finite")]
    NonFinite { axis: &'static str, index: usize },

    #[error("invalid {operation} method code {code}")]
    InvalidMethod { operation: &'static str, code: u8 },

    #[error("symmetrization needs exactly one of step or center, both were given")]
    AmbiguousSymmetryReference,

    #[error("symmetrization needs exactly one of step or center, neither was given")]
    MissingSymmetryReference,

    #[error("{operation} requires up/down sweep data, but the sweep has already been collapsed")]
    NotUpDownSweep { operation: &'static str },

    #[error("{operation} requires a non-empty signal")]
    EmptySignal { operation: &'static str },

    #[error("{operation} would divide by zero")]
    ZeroDivisor { operation: &'static str },

    #[error("symmetry step {value} resolves to a shift of zero samples")]
    DegenerateSymmetryStep { value: f64 },

    #[error(transparent)]
    Signal(#[from] SignalError),

    #[error("replay aborted at step {} ({operation}): {source}", index + 1)]
    Replay {
        index: usize,
        operation: String,
        #[source]
        source: Box<CurveError>,
    },
}

impl CurveError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CurveError::LengthMismatch { .. }
            | CurveError::NonFinite { .. }
            | CurveError::InvalidMethod { .. }
            | CurveError::AmbiguousSymmetryReference
            | CurveError::MissingSymmetryReference => ErrorKind::Configuration,
            CurveError::NotUpDownSweep { .. } | CurveError::EmptySignal { .. } => {
                ErrorKind::Precondition
            }
            CurveError::ZeroDivisor { .. } | CurveError::DegenerateSymmetryStep { .. } => {
                ErrorKind::NumericDegeneracy
            }
            CurveError::Signal(e) => e.kind(),
            CurveError::Replay { source, .. } => source.kind(),
        }
    }
}

/// Result type for curve operations.
pub type Result<T> = std::result::Result<T, CurveError>;

/// Which samples of a delta-method recording to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaMethod {
    /// All samples
    Raw,
    /// Samples 0, 2, 4, ...
    Even,
    /// Samples 1, 3, 5, ...
    Odd,
    /// even - odd
    Difference,
    /// even + odd
    Sum,
}

impl TryFrom<u8> for DeltaMethod {
    type Error = CurveError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(DeltaMethod::Raw),
            1 => Ok(DeltaMethod::Even),
            2 => Ok(DeltaMethod::Odd),
            3 => Ok(DeltaMethod::Difference),
            4 => Ok(DeltaMethod::Sum),
            _ => Err(CurveError::InvalidMethod {
                operation: "delta method",
                code,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizeMethod {
    None,
    Min,
    Max,
}

impl TryFrom<u8> for NormalizeMethod {
    type Error = CurveError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(NormalizeMethod::None),
            1 => Ok(NormalizeMethod::Min),
            2 => Ok(NormalizeMethod::Max),
            _ => Err(CurveError::InvalidMethod {
                operation: "normalize",
                code,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetMethod {
    None,
    Min,
    Max,
    Mean,
    /// Subtract a fixed value
    Value(f64),
}

impl OffsetMethod {
    /// Build from a method code; `value` is only read for code 4.
    pub fn from_code(code: u8, value: f64) -> Result<Self> {
        match code {
            0 => Ok(OffsetMethod::None),
            1 => Ok(OffsetMethod::Min),
            2 => Ok(OffsetMethod::Max),
            3 => Ok(OffsetMethod::Mean),
            4 => Ok(OffsetMethod::Value(value)),
            _ => Err(CurveError::InvalidMethod {
                operation: "offset correction",
                code,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymmetrizeMethod {
    None,
    Symmetric,
    Antisymmetric,
}

impl TryFrom<u8> for SymmetrizeMethod {
    type Error = CurveError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(SymmetrizeMethod::None),
            1 => Ok(SymmetrizeMethod::Symmetric),
            2 => Ok(SymmetrizeMethod::Antisymmetric),
            _ => Err(CurveError::InvalidMethod {
                operation: "symmetrize",
                code,
            }),
        }
    }
}

/// Where the symmetry lies, in x units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SymmetryReference {
    /// Period of the expected symmetry (ADMR data).
    Step(f64),
    /// Center to fold around (field sweeps).
    Center(f64),
}

/// Validated symmetrization parameters.
///
/// A reference is present exactly when the method is not `None`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SymmetrizeParams", into = "SymmetrizeParams")]
pub struct Symmetrization {
    method: SymmetrizeMethod,
    reference: Option<SymmetryReference>,
}

impl Symmetrization {
    pub fn new(method: SymmetrizeMethod, step: Option<f64>, center: Option<f64>) -> Result<Self> {
        let reference = match (method, step, center) {
            (SymmetrizeMethod::None, _, _) => None,
            (_, Some(_), Some(_)) => return Err(CurveError::AmbiguousSymmetryReference),
            (_, None, None) => return Err(CurveError::MissingSymmetryReference),
            (_, Some(step), None) => Some(SymmetryReference::Step(step)),
            (_, None, Some(center)) => Some(SymmetryReference::Center(center)),
        };
        Ok(Self { method, reference })
    }

    #[inline]
    pub fn method(&self) -> SymmetrizeMethod {
        self.method
    }

    #[inline]
    pub fn reference(&self) -> Option<SymmetryReference> {
        self.reference
    }

    fn is_active(&self) -> bool {
        self.reference.is_some()
    }
}

#[derive(Serialize, Deserialize)]
struct SymmetrizeParams {
    method: SymmetrizeMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    center: Option<f64>,
}

impl TryFrom<SymmetrizeParams> for Symmetrization {
    type Error = CurveError;

    fn try_from(params: SymmetrizeParams) -> Result<Self> {
        Symmetrization::new(params.method, params.step, params.center)
    }
}

impl From<Symmetrization> for SymmetrizeParams {
    fn from(sym: Symmetrization) -> Self {
        let (step, center) = match sym.reference {
            Some(SymmetryReference::Step(s)) => (Some(s), None),
            Some(SymmetryReference::Center(c)) => (None, Some(c)),
            None => (None, None),
        };
        Self {
            method: sym.method,
            step,
            center,
        }
    }
}

/// One queued processing step with its bound parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    DeltaMethod(DeltaMethod),
    AverageUpDown,
    Normalize(NormalizeMethod),
    OffsetCorrection(OffsetMethod),
    Symmetrize(Symmetrization),
}

impl Operation {
    /// Build a symmetrize operation from a method code and optional
    /// step/center values.
    pub fn symmetrize(method: u8, step: Option<f64>, center: Option<f64>) -> Result<Self> {
        let method = SymmetrizeMethod::try_from(method)?;
        Ok(Operation::Symmetrize(Symmetrization::new(method, step, center)?))
    }

    /// Short name of the operation kind.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::DeltaMethod(_) => "delta_method",
            Operation::AverageUpDown => "average_up_down",
            Operation::Normalize(_) => "normalize",
            Operation::OffsetCorrection(_) => "offset_correction",
            Operation::Symmetrize(_) => "symmetrize",
        }
    }

    /// Up/down flag after this operation, or an error if the operation
    /// cannot run on data in the given state.
    fn next_up_down_state(&self, up_down: bool) -> Result<bool> {
        match self {
            Operation::AverageUpDown if !up_down => Err(CurveError::NotUpDownSweep {
                operation: "average_up_down",
            }),
            Operation::AverageUpDown => Ok(false),
            Operation::Symmetrize(sym) if sym.is_active() => Ok(false),
            _ => Ok(up_down),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::DeltaMethod(m) => write!(f, "delta_method(method={m:?})"),
            Operation::AverageUpDown => write!(f, "average_up_down()"),
            Operation::Normalize(m) => write!(f, "normalize(method={m:?})"),
            Operation::OffsetCorrection(OffsetMethod::Value(v)) => {
                write!(f, "offset_correction(method=Value, value={v})")
            }
            Operation::OffsetCorrection(m) => write!(f, "offset_correction(method={m:?})"),
            Operation::Symmetrize(sym) => match sym.reference {
                Some(SymmetryReference::Step(s)) => {
                    write!(f, "symmetrize(method={:?}, step={s})", sym.method)
                }
                Some(SymmetryReference::Center(c)) => {
                    write!(f, "symmetrize(method={:?}, center={c})", sym.method)
                }
                None => write!(f, "symmetrize(method={:?})", sym.method),
            },
        }
    }
}

/// Provenance of a curve. Not interpreted by processing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurveMetadata {
    pub source_path: Option<PathBuf>,
    pub group: Option<String>,
    pub parameter_channel: Option<String>,
    pub parameter_value: Option<f64>,
    pub x_channel: Option<String>,
    pub y_channel: Option<String>,
}

/// Readout of the calculated data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveSummary {
    pub statistics: signal::SignalStatistics,
    /// Trapezoidal integral of y over x
    pub integral: f64,
}

impl fmt::Display for CurveSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "min {}, max {}, mean {}, integral {}",
            self.statistics.min, self.statistics.max, self.statistics.mean, self.integral
        )
    }
}

/// One measurement curve: raw data, derived data and the operation queue.
#[derive(Debug, Clone)]
pub struct Curve {
    raw_x: Vec<f64>,
    raw_y: Vec<f64>,
    calc_x: Vec<f64>,
    calc_y: Vec<f64>,
    raw_is_up_down: bool,
    is_up_down_sweep: bool,
    operations: Vec<Operation>,
    /// Display label
    pub label: Option<String>,
    pub metadata: CurveMetadata,
}

impl Curve {
    /// Create a curve from raw data recorded as an up/down sweep.
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self> {
        if x.len() != y.len() {
            return Err(CurveError::LengthMismatch {
                x_len: x.len(),
                y_len: y.len(),
            });
        }
        for (axis, values) in [("x", &x), ("y", &y)] {
            if let Some(index) = values.iter().position(|v| !v.is_finite()) {
                return Err(CurveError::NonFinite { axis, index });
            }
        }

        Ok(Self {
            calc_x: x.clone(),
            calc_y: y.clone(),
            raw_x: x,
            raw_y: y,
            raw_is_up_down: true,
            is_up_down_sweep: true,
            operations: Vec::new(),
            label: None,
            metadata: CurveMetadata::default(),
        })
    }

    /// Declare whether the raw data is a concatenated up/down sweep.
    ///
    /// Must be set before operations are queued.
    pub fn with_up_down_sweep(mut self, up_down: bool) -> Self {
        self.raw_is_up_down = up_down;
        self.is_up_down_sweep = up_down;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_metadata(mut self, metadata: CurveMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    #[inline]
    pub fn raw_x(&self) -> &[f64] {
        &self.raw_x
    }

    #[inline]
    pub fn raw_y(&self) -> &[f64] {
        &self.raw_y
    }

    #[inline]
    pub fn calc_x(&self) -> &[f64] {
        &self.calc_x
    }

    #[inline]
    pub fn calc_y(&self) -> &[f64] {
        &self.calc_y
    }

    /// Whether the calculated data is still a concatenated up/down sweep.
    #[inline]
    pub fn is_up_down_sweep(&self) -> bool {
        self.is_up_down_sweep
    }

    #[inline]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Append an operation to the queue.
    ///
    /// The entry is rejected, and the queue left unchanged, if it would
    /// violate the up/down sweep invariant given the operations already
    /// queued.
    pub fn push_operation(&mut self, operation: Operation) -> Result<()> {
        let state = self
            .operations
            .iter()
            .try_fold(self.raw_is_up_down, |state, op| op.next_up_down_state(state))?;
        operation.next_up_down_state(state)?;
        self.operations.push(operation);
        Ok(())
    }

    /// Append several operations in order, stopping at the first rejection.
    pub fn extend_operations<I>(&mut self, operations: I) -> Result<()>
    where
        I: IntoIterator<Item = Operation>,
    {
        for op in operations {
            self.push_operation(op)?;
        }
        Ok(())
    }

    /// Min, max, mean and integral of the calculated data; `None` when empty.
    pub fn summary(&self) -> Option<CurveSummary> {
        let statistics = signal::statistics(&self.calc_y).ok()?;
        Some(CurveSummary {
            statistics,
            integral: signal::trapezoid_integral(&self.calc_x, &self.calc_y),
        })
    }

    /// Numbered, human-readable rendering of the operation queue.
    pub fn history(&self) -> Vec<String> {
        self.operations
            .iter()
            .enumerate()
            .map(|(i, op)| format!("{}. {}", i + 1, op))
            .collect()
    }

    /// Recompute the calculated data, reporting through the `log` facade.
    pub fn process_data(&mut self) -> Result<()> {
        self.process_data_with(&LogSink)
    }

    /// Reset the calculated data to the raw data and replay every queued
    /// operation in order.
    ///
    /// On failure the calculated data reflects the operations before the
    /// failing one; nothing after it is executed.
    pub fn process_data_with(&mut self, sink: &dyn EventSink) -> Result<()> {
        self.calc_x = self.raw_x.clone();
        self.calc_y = self.raw_y.clone();
        self.is_up_down_sweep = self.raw_is_up_down;

        for index in 0..self.operations.len() {
            let operation = self.operations[index];
            self.apply(&operation, sink).map_err(|e| CurveError::Replay {
                index,
                operation: operation.to_string(),
                source: Box::new(e),
            })?;
            sink.emit(ProcessingEvent::OperationApplied {
                index,
                operation: operation.to_string(),
                len: self.calc_y.len(),
            });
        }
        Ok(())
    }

    fn apply(&mut self, operation: &Operation, sink: &dyn EventSink) -> Result<()> {
        let next_state = operation.next_up_down_state(self.is_up_down_sweep)?;
        match *operation {
            Operation::DeltaMethod(method) => self.apply_delta_method(method, sink),
            Operation::AverageUpDown => {
                self.calc_x = signal::average_up_down_sweep(&self.calc_x, 1);
                self.calc_y = signal::average_up_down_sweep(&self.calc_y, 1);
            }
            Operation::Normalize(method) => self.apply_normalize(method)?,
            Operation::OffsetCorrection(method) => self.apply_offset(method)?,
            Operation::Symmetrize(sym) => self.apply_symmetrize(sym, sink)?,
        }
        self.is_up_down_sweep = next_state;
        Ok(())
    }

    fn apply_delta_method(&mut self, method: DeltaMethod, sink: &dyn EventSink) {
        let xs = signal::separate_alternating_signal(&self.calc_x);
        let ys = signal::separate_alternating_signal(&self.calc_y);

        let (x, y) = match method {
            DeltaMethod::Raw => return,
            DeltaMethod::Even => (xs.even, ys.even),
            DeltaMethod::Odd => (xs.odd, ys.odd),
            DeltaMethod::Difference | DeltaMethod::Sum => {
                if !ys.is_balanced() {
                    sink.emit(ProcessingEvent::DataShapeWarning {
                        context: "delta method".to_string(),
                        len: self.calc_y.len(),
                        dropped: 1,
                    });
                }
                let y = if method == DeltaMethod::Sum {
                    ys.sum()
                } else {
                    ys.difference()
                };
                (xs.paired_even(), y)
            }
        };
        self.calc_x = x;
        self.calc_y = y;
    }

    fn apply_normalize(&mut self, method: NormalizeMethod) -> Result<()> {
        let divisor = match method {
            NormalizeMethod::None => return Ok(()),
            NormalizeMethod::Min => self.stats("normalize")?.min,
            NormalizeMethod::Max => self.stats("normalize")?.max,
        };
        if divisor == 0.0 {
            return Err(CurveError::ZeroDivisor {
                operation: "normalize",
            });
        }
        self.calc_y.iter_mut().for_each(|v| *v /= divisor);
        Ok(())
    }

    fn apply_offset(&mut self, method: OffsetMethod) -> Result<()> {
        let offset = match method {
            OffsetMethod::None => return Ok(()),
            OffsetMethod::Min => self.stats("offset correction")?.min,
            OffsetMethod::Max => self.stats("offset correction")?.max,
            OffsetMethod::Mean => self.stats("offset correction")?.mean,
            OffsetMethod::Value(v) => v,
        };
        self.calc_y.iter_mut().for_each(|v| *v -= offset);
        Ok(())
    }

    fn stats(&self, operation: &'static str) -> Result<signal::SignalStatistics> {
        signal::statistics(&self.calc_y).map_err(|_| CurveError::EmptySignal { operation })
    }

    fn apply_symmetrize(&mut self, sym: Symmetrization, sink: &dyn EventSink) -> Result<()> {
        let antisymmetric = match sym.method {
            SymmetrizeMethod::None => return Ok(()),
            SymmetrizeMethod::Symmetric => false,
            SymmetrizeMethod::Antisymmetric => true,
        };
        let Some(reference) = sym.reference else {
            return Err(CurveError::MissingSymmetryReference);
        };
        if self.calc_x.is_empty() {
            return Err(CurveError::EmptySignal {
                operation: "symmetrize",
            });
        }

        match reference {
            SymmetryReference::Center(value) => {
                let center = resolve_index(&self.calc_x, value, "center", sink);
                self.calc_y = if antisymmetric {
                    signal::anti_symmetrize_signal_zero(&self.calc_y, Some(center))?
                } else {
                    signal::symmetrize_signal_zero(&self.calc_y, Some(center))?
                };
                self.calc_x.truncate(self.calc_y.len());
                self.calc_x.reverse();
            }
            SymmetryReference::Step(value) => {
                let search = if self.is_up_down_sweep {
                    &self.calc_x[..(self.calc_x.len() / 2 + 1).min(self.calc_x.len())]
                } else {
                    &self.calc_x[..]
                };
                let origin = resolve_index(search, 0.0, "step origin", sink);
                let target = resolve_index(search, value, "step", sink);
                let step = origin.abs_diff(target);
                if step == 0 {
                    return Err(CurveError::DegenerateSymmetryStep { value });
                }

                self.calc_y = match (self.is_up_down_sweep, antisymmetric) {
                    (true, false) => signal::symmetrize_signal_up_down(&self.calc_y, step)?,
                    (true, true) => signal::anti_symmetrize_signal_up_down(&self.calc_y, step)?,
                    (false, false) => signal::symmetrize_signal(&self.calc_y, step)?,
                    (false, true) => signal::anti_symmetrize_signal(&self.calc_y, step)?,
                };
                self.calc_x.truncate(self.calc_y.len());
            }
        }
        Ok(())
    }
}

/// Nearest index to an x-unit reference. `x` must not be empty.
fn resolve_index(x: &[f64], value: f64, reference: &str, sink: &dyn EventSink) -> usize {
    let index = signal::nearest_index(x, value).unwrap_or(0);
    sink.emit(ProcessingEvent::SymmetryResolved {
        reference: reference.to_string(),
        index,
        value: x[index],
    });
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::{EventLog, NullSink};

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64).collect()
    }

    fn up_down_curve() -> Curve {
        // x: 0..4 up and back down, y peaks in the middle
        let x = vec![0.0, 1.0, 2.0, 3.0, 3.0, 2.0, 1.0, 0.0];
        let y = vec![1.0, 2.0, 3.0, 4.0, 6.0, 5.0, 4.0, 3.0];
        Curve::new(x, y).unwrap()
    }

    #[test]
    fn test_new_rejects_length_mismatch() {
        let err = Curve::new(vec![1.0, 2.0], vec![1.0]).unwrap_err();
        assert_eq!(err, CurveError::LengthMismatch { x_len: 2, y_len: 1 });
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_new_rejects_non_finite() {
        let err = Curve::new(vec![1.0, 2.0], vec![1.0, f64::NAN]).unwrap_err();
        assert_eq!(err, CurveError::NonFinite { axis: "y", index: 1 });
    }

    #[test]
    fn test_process_without_operations_copies_raw() {
        let mut curve = up_down_curve();
        curve.process_data_with(&NullSink).unwrap();
        assert_eq!(curve.calc_x(), curve.raw_x());
        assert_eq!(curve.calc_y(), curve.raw_y());
        assert!(curve.is_up_down_sweep());
    }

    #[test]
    fn test_average_up_down() {
        let mut curve = up_down_curve();
        curve.push_operation(Operation::AverageUpDown).unwrap();
        curve.process_data_with(&NullSink).unwrap();

        assert_eq!(curve.calc_x(), &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(curve.calc_y(), &[2.0, 3.0, 4.0, 5.0]);
        assert!(!curve.is_up_down_sweep());
    }

    #[test]
    fn test_average_twice_is_rejected() {
        let mut curve = up_down_curve();
        curve.push_operation(Operation::AverageUpDown).unwrap();
        let err = curve.push_operation(Operation::AverageUpDown).unwrap_err();

        assert_eq!(
            err,
            CurveError::NotUpDownSweep {
                operation: "average_up_down"
            }
        );
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert_eq!(curve.operations().len(), 1);
    }

    #[test]
    fn test_average_rejected_on_non_up_down_data() {
        let mut curve = Curve::new(ramp(4), ramp(4)).unwrap().with_up_down_sweep(false);
        assert!(curve.push_operation(Operation::AverageUpDown).is_err());
    }

    #[test]
    fn test_average_after_symmetrize_is_rejected() {
        let mut curve = up_down_curve();
        curve
            .push_operation(Operation::symmetrize(1, Some(1.0), None).unwrap())
            .unwrap();
        assert!(curve.push_operation(Operation::AverageUpDown).is_err());
    }

    #[test]
    fn test_process_data_is_idempotent() {
        let mut curve = up_down_curve();
        curve
            .extend_operations([
                Operation::DeltaMethod(DeltaMethod::Difference),
                Operation::Normalize(NormalizeMethod::Max),
                Operation::OffsetCorrection(OffsetMethod::Mean),
            ])
            .unwrap();

        curve.process_data_with(&NullSink).unwrap();
        let first = (curve.calc_x().to_vec(), curve.calc_y().to_vec());
        curve.process_data_with(&NullSink).unwrap();

        assert_eq!(curve.calc_x(), first.0.as_slice());
        assert_eq!(curve.calc_y(), first.1.as_slice());
        // Raw data is untouched
        assert_eq!(curve.raw_y(), up_down_curve().raw_y());
    }

    #[test]
    fn test_replay_matches_fresh_curve() {
        let ops = [
            Operation::Normalize(NormalizeMethod::Max),
            Operation::OffsetCorrection(OffsetMethod::Value(0.5)),
        ];

        let mut incremental = up_down_curve();
        incremental.push_operation(ops[0]).unwrap();
        incremental.process_data_with(&NullSink).unwrap();
        incremental.push_operation(ops[1]).unwrap();
        incremental.process_data_with(&NullSink).unwrap();

        let mut fresh = up_down_curve();
        fresh.extend_operations(ops).unwrap();
        fresh.process_data_with(&NullSink).unwrap();

        assert_eq!(incremental.calc_y(), fresh.calc_y());
    }

    #[test]
    fn test_operation_order_matters() {
        let normalize = Operation::Normalize(NormalizeMethod::Max);
        let offset = Operation::OffsetCorrection(OffsetMethod::Min);

        let mut a = up_down_curve();
        a.extend_operations([normalize, offset]).unwrap();
        a.process_data_with(&NullSink).unwrap();

        let mut b = up_down_curve();
        b.extend_operations([offset, normalize]).unwrap();
        b.process_data_with(&NullSink).unwrap();

        // max 6, min 1: (y/6 - 1/6) vs (y - 1)/5
        assert!((a.calc_y()[3] - 0.5).abs() < 1e-12);
        assert!((b.calc_y()[3] - 0.6).abs() < 1e-12);
        assert_ne!(a.calc_y(), b.calc_y());
    }

    #[test]
    fn test_delta_methods() {
        let x = ramp(6);
        let y = vec![5.0, 1.0, 7.0, 2.0, 9.0, 4.0];

        let run = |method| {
            let mut c = Curve::new(x.clone(), y.clone()).unwrap();
            c.push_operation(Operation::DeltaMethod(method)).unwrap();
            c.process_data_with(&NullSink).unwrap();
            (c.calc_x().to_vec(), c.calc_y().to_vec())
        };

        assert_eq!(run(DeltaMethod::Raw).1, y);
        assert_eq!(run(DeltaMethod::Even), (vec![0.0, 2.0, 4.0], vec![5.0, 7.0, 9.0]));
        assert_eq!(run(DeltaMethod::Odd), (vec![1.0, 3.0, 5.0], vec![1.0, 2.0, 4.0]));
        assert_eq!(run(DeltaMethod::Difference), (vec![0.0, 2.0, 4.0], vec![4.0, 5.0, 5.0]));
        assert_eq!(run(DeltaMethod::Sum).1, vec![6.0, 9.0, 13.0]);
    }

    #[test]
    fn test_delta_method_odd_length_warns() {
        let mut curve = Curve::new(ramp(5), ramp(5)).unwrap();
        curve
            .push_operation(Operation::DeltaMethod(DeltaMethod::Difference))
            .unwrap();
        let log = EventLog::new();
        curve.process_data_with(&log).unwrap();

        assert_eq!(curve.calc_y(), &[-1.0, -1.0]);
        assert_eq!(curve.calc_x(), &[0.0, 2.0]);
        assert_eq!(log.warnings().len(), 1);
    }

    #[test]
    fn test_normalize_and_offset() {
        let mut curve = Curve::new(ramp(3), vec![2.0, 4.0, 8.0]).unwrap();
        curve
            .push_operation(Operation::Normalize(NormalizeMethod::Min))
            .unwrap();
        curve.process_data_with(&NullSink).unwrap();
        assert_eq!(curve.calc_y(), &[1.0, 2.0, 4.0]);

        let mut curve = Curve::new(ramp(3), vec![2.0, 4.0, 9.0]).unwrap();
        curve
            .push_operation(Operation::OffsetCorrection(OffsetMethod::Mean))
            .unwrap();
        curve.process_data_with(&NullSink).unwrap();
        assert_eq!(curve.calc_y(), &[-3.0, -1.0, 4.0]);
    }

    #[test]
    fn test_normalize_by_zero_fails() {
        let mut curve = Curve::new(ramp(3), vec![0.0, 1.0, 2.0]).unwrap();
        curve
            .push_operation(Operation::Normalize(NormalizeMethod::Min))
            .unwrap();
        let err = curve.process_data_with(&NullSink).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NumericDegeneracy);
        assert!(matches!(err, CurveError::Replay { index: 0, .. }));
    }

    #[test]
    fn test_normalize_empty_signal_fails() {
        let mut curve = Curve::new(vec![], vec![]).unwrap();
        curve
            .push_operation(Operation::Normalize(NormalizeMethod::Max))
            .unwrap();
        let err = curve.process_data_with(&NullSink).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
    }

    #[test]
    fn test_symmetrize_requires_exactly_one_reference() {
        let both = Operation::symmetrize(1, Some(90.0), Some(0.0)).unwrap_err();
        assert_eq!(both, CurveError::AmbiguousSymmetryReference);
        assert_eq!(both.kind(), ErrorKind::Configuration);

        let neither = Operation::symmetrize(2, None, None).unwrap_err();
        assert_eq!(neither, CurveError::MissingSymmetryReference);

        // No-op symmetrization takes no reference
        assert!(Operation::symmetrize(0, None, None).is_ok());
        assert!(Operation::symmetrize(3, Some(1.0), None).is_err());
    }

    #[test]
    fn test_symmetrize_center() {
        // Field sweep from -3 to 3, y = even part + odd part
        let x: Vec<f64> = (-3..=3).map(f64::from).collect();
        let y: Vec<f64> = x.iter().map(|h| h * h + 0.5 * h).collect();
        let mut curve = Curve::new(x, y).unwrap().with_up_down_sweep(false);
        curve
            .push_operation(Operation::symmetrize(1, None, Some(0.0)).unwrap())
            .unwrap();
        curve.process_data_with(&NullSink).unwrap();

        assert_eq!(curve.calc_x(), &[-1.0, -2.0, -3.0]);
        assert_eq!(curve.calc_y(), &[9.0, 4.0, 1.0]);

        let mut anti = Curve::new(curve.raw_x().to_vec(), curve.raw_y().to_vec()).unwrap();
        anti.push_operation(Operation::symmetrize(2, None, Some(0.0)).unwrap())
            .unwrap();
        anti.process_data_with(&NullSink).unwrap();
        assert_eq!(anti.calc_y(), &[-1.5, -1.0, -0.5]);
    }

    #[test]
    fn test_symmetrize_step_after_average_uses_period_variant() {
        // Rotation in 45 degree steps, up and back down
        let up: Vec<f64> = (0..8).map(|i| f64::from(i) * 45.0).collect();
        let x: Vec<f64> = up.iter().chain(up.iter().rev()).copied().collect();
        let y: Vec<f64> = x.iter().map(|a| a.to_radians().cos()).collect();

        let mut curve = Curve::new(x, y).unwrap();
        curve
            .extend_operations([
                Operation::AverageUpDown,
                Operation::symmetrize(1, Some(180.0), None).unwrap(),
            ])
            .unwrap();
        let log = EventLog::new();
        curve.process_data_with(&log).unwrap();

        // cos is antisymmetric under a 180 degree shift
        assert_eq!(curve.calc_y().len(), 4);
        assert_eq!(curve.calc_x(), &[0.0, 45.0, 90.0, 135.0]);
        assert!(curve.calc_y().iter().all(|v| v.abs() < 1e-12));
        assert!(log
            .events()
            .iter()
            .any(|e| matches!(e, ProcessingEvent::SymmetryResolved { index: 4, .. })));
    }

    #[test]
    fn test_symmetrize_step_on_up_down_data() {
        let up: Vec<f64> = (0..8).map(|i| f64::from(i) * 45.0).collect();
        let x: Vec<f64> = up.iter().chain(up.iter().rev()).copied().collect();
        let y: Vec<f64> = x.iter().map(|a| 1.0 + a.to_radians().cos()).collect();

        let mut curve = Curve::new(x, y).unwrap();
        curve
            .push_operation(Operation::symmetrize(2, Some(90.0), None).unwrap())
            .unwrap();
        curve.process_data_with(&NullSink).unwrap();

        // step resolves to 2 samples, output is 2 * step long
        assert_eq!(curve.calc_y().len(), 4);
        assert_eq!(curve.calc_x(), &[0.0, 45.0, 90.0, 135.0]);
        assert!(!curve.is_up_down_sweep());
    }

    #[test]
    fn test_zero_step_is_degenerate() {
        let mut curve = Curve::new(ramp(6), ramp(6)).unwrap().with_up_down_sweep(false);
        curve
            .push_operation(Operation::symmetrize(1, Some(0.1), None).unwrap())
            .unwrap();
        let err = curve.process_data_with(&NullSink).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NumericDegeneracy);
    }

    #[test]
    fn test_replay_abort_keeps_prior_steps() {
        let mut curve = Curve::new(ramp(4), vec![0.0, 1.0, 2.0, 3.0])
            .unwrap()
            .with_up_down_sweep(false);
        curve
            .extend_operations([
                Operation::OffsetCorrection(OffsetMethod::Value(1.0)),
                Operation::symmetrize(1, None, Some(3.0)).unwrap(),
                Operation::OffsetCorrection(OffsetMethod::Value(100.0)),
            ])
            .unwrap();

        let err = curve.process_data_with(&NullSink).unwrap_err();
        assert!(matches!(err, CurveError::Replay { index: 1, .. }));
        // First offset applied, third never ran
        assert_eq!(curve.calc_y(), &[-1.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_summary_of_calculated_data() {
        let mut curve = Curve::new(vec![0.0, 1.0, 2.0], vec![1.0, 3.0, 2.0])
            .unwrap()
            .with_up_down_sweep(false);
        curve
            .push_operation(Operation::OffsetCorrection(OffsetMethod::Min))
            .unwrap();
        curve.process_data_with(&NullSink).unwrap();

        let summary = curve.summary().unwrap();
        assert_eq!(summary.statistics.min, 0.0);
        assert_eq!(summary.statistics.max, 2.0);
        assert_eq!(summary.statistics.mean, 1.0);
        assert_eq!(summary.integral, 2.5);
        assert_eq!(summary.to_string(), "min 0, max 2, mean 1, integral 2.5");

        let empty = Curve::new(Vec::new(), Vec::new()).unwrap();
        assert!(empty.summary().is_none());
    }

    #[test]
    fn test_history() {
        let mut curve = up_down_curve();
        curve
            .extend_operations([
                Operation::AverageUpDown,
                Operation::OffsetCorrection(OffsetMethod::Value(2.5)),
                Operation::symmetrize(2, Some(90.0), None).unwrap(),
            ])
            .unwrap();

        assert_eq!(
            curve.history(),
            vec![
                "1. average_up_down()".to_string(),
                "2. offset_correction(method=Value, value=2.5)".to_string(),
                "3. symmetrize(method=Antisymmetric, step=90)".to_string(),
            ]
        );
    }

    #[test]
    fn test_method_codes() {
        assert_eq!(DeltaMethod::try_from(3).unwrap(), DeltaMethod::Difference);
        assert!(DeltaMethod::try_from(5).is_err());
        assert_eq!(NormalizeMethod::try_from(2).unwrap(), NormalizeMethod::Max);
        assert!(NormalizeMethod::try_from(3).is_err());
        assert_eq!(OffsetMethod::from_code(4, 1.5).unwrap(), OffsetMethod::Value(1.5));
        assert!(OffsetMethod::from_code(5, 0.0).is_err());
    }

    #[test]
    fn test_operation_serde_roundtrip() {
        let ops = vec![
            Operation::DeltaMethod(DeltaMethod::Sum),
            Operation::AverageUpDown,
            Operation::symmetrize(1, None, Some(0.0)).unwrap(),
        ];
        let text = serde_yaml::to_string(&ops).unwrap();
        let parsed: Vec<Operation> = serde_yaml::from_str(&text).unwrap();
        assert_eq!(parsed, ops);
    }
}
