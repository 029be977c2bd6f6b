//! Core data types, signal primitives and text I/O.

pub mod curve;
pub mod events;
pub mod loaders;
pub mod signal;
pub mod writers;

use std::fmt;

pub use curve::{Curve, CurveError, CurveMetadata, CurveSummary, Operation};
pub use events::{EventLog, EventSink, LogSink, NullSink, ProcessingEvent};
pub use loaders::{load_columns, LoaderError};
pub use writers::{write_curve_text, write_fit_text, write_segment_text, WriteError};

/// Broad classification shared by every error type in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Contradictory or missing parameters.
    Configuration,
    /// Operation invoked in a state that violates an invariant.
    Precondition,
    /// Data or parameters make the computation ill-defined.
    NumericDegeneracy,
    /// Reading or writing files.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "configuration error",
            ErrorKind::Precondition => "precondition error",
            ErrorKind::NumericDegeneracy => "numeric degeneracy",
            ErrorKind::Io => "I/O error",
        };
        f.write_str(name)
    }
}
