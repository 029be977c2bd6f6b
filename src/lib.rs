//! Transport measurement preview and processing.
//!
//! This crate provides tools for:
//! - Separating delta-method (alternating polarity) recordings
//! - Averaging and symmetrizing up/down and angle-dependent sweeps
//! - Replaying queued operations on measurement curves
//! - Splitting multi-field rotation recordings into per-field segments
//! - Fitting cosine and cosine-squared models
//!
//! # Example
//!
//! ```
//! use transport_preview::core::curve::{Curve, Operation};
//! use transport_preview::core::events::EventLog;
//!
//! let x = vec![-1.0, 0.0, 1.0, 1.0, 0.0, -1.0];
//! let y = vec![1.0, 2.0, 3.0, 3.0, 2.0, 1.0];
//! let mut curve = Curve::new(x, y).unwrap();
//! curve.push_operation(Operation::AverageUpDown).unwrap();
//!
//! let events = EventLog::new();
//! curve.process_data_with(&events).unwrap();
//! assert_eq!(curve.calc_y(), &[1.0, 2.0, 3.0]);
//! assert!(!curve.is_up_down_sweep());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;

pub use config::{FitConfig, IoConfig, PipelineConfig, ProcessingConfig, SegmentationConfig};
pub use core::curve::{Curve, CurveError, CurveMetadata, Operation};
pub use core::ErrorKind;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
