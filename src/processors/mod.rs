//! Data processing modules.

pub mod fitting;
pub mod segmentation;

// Re-export key types for convenience
pub use fitting::{
    estimate_initial_guess, fit_cosine, fit_cosine_squared, FitError, FitModel, FitParameters,
    FitResult,
};
pub use segmentation::{
    segment_by_field, FieldSegment, SegmentInput, SegmentSignal, SegmentationError,
};
