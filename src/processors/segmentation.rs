//! Splitting multi-field recordings into per-field angle sweeps.
//!
//! A rotation experiment often records several angle sweeps back to back,
//! one per magnetic field value, into a single continuous stream. This
//! module cuts that stream into one [`FieldSegment`] per field step, in the
//! order the steps were measured.

use thiserror::Error;

use crate::config::SegmentationConfig;
use crate::core::events::{EventSink, ProcessingEvent};
use crate::core::signal::separate_alternating_signal;
use crate::core::ErrorKind;

/// Errors that can occur while segmenting a recording.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SegmentationError {
    #[error("field and angle columns differ in length ({field_len} vs {angle_len}) and no points-per-field count was given")]
    UndeterminedBoundaries { field_len: usize, angle_len: usize },

    #[error("{column} has {len} samples but the recording has {expected}")]
    LengthMismatch {
        column: &'static str,
        len: usize,
        expected: usize,
    },

    #[error("points per field must be positive")]
    ZeroPointsPerField,

    #[error("{segments} segments of {points_per_field} points need {segments} field values, got {available}")]
    MissingFieldValues {
        segments: usize,
        points_per_field: usize,
        available: usize,
    },

    #[error("denominator sample {index} is zero")]
    ZeroDenominator { index: usize },

    #[error("{column} sample {index} is not finite")]
    NonFinite { column: &'static str, index: usize },
}

impl SegmentationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SegmentationError::ZeroDenominator { .. } => ErrorKind::NumericDegeneracy,
            _ => ErrorKind::Configuration,
        }
    }
}

/// Result type for segmentation.
pub type Result<T> = std::result::Result<T, SegmentationError>;

/// Columns of a multi-field recording.
#[derive(Debug, Clone, Copy)]
pub struct SegmentInput<'a> {
    /// Field value per sample, or one value per segment when the number of
    /// points per field is fixed
    pub field: &'a [f64],
    pub angle: &'a [f64],
    /// Measured signal (e.g. voltage)
    pub numerator: &'a [f64],
    /// Optional normalizing signal (e.g. current)
    pub denominator: Option<&'a [f64]>,
}

/// Signal of one segment.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentSignal {
    /// Untouched slice
    Plain(Vec<f64>),
    /// Delta-method pairs
    Delta {
        diff: Vec<f64>,
        sum: Vec<f64>,
        raw1: Vec<f64>,
        raw2: Vec<f64>,
    },
}

impl SegmentSignal {
    /// The plain signal, or the pairwise difference for delta-method data.
    pub fn primary(&self) -> &[f64] {
        match self {
            SegmentSignal::Plain(signal) => signal,
            SegmentSignal::Delta { diff, .. } => diff,
        }
    }
}

/// One angle sweep at a fixed field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSegment {
    pub field: f64,
    /// First sample in the recording
    pub start: usize,
    /// One past the last sample in the recording
    pub end: usize,
    pub angle: Vec<f64>,
    pub signal: SegmentSignal,
    /// (min, max) of the denominator over the segment
    pub current_range: Option<(f64, f64)>,
}

impl FieldSegment {
    #[inline]
    pub fn len(&self) -> usize {
        self.angle.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.angle.is_empty()
    }
}

/// Start index of every run of equal consecutive values.
fn run_starts(field: &[f64]) -> Vec<usize> {
    let mut starts = Vec::new();
    for (i, value) in field.iter().enumerate() {
        if i == 0 || field[i - 1] != *value {
            starts.push(i);
        }
    }
    starts
}

/// Segment boundaries as (field value, start) pairs.
fn boundaries(input: &SegmentInput<'_>, points_per_field: Option<usize>) -> Result<Vec<(f64, usize)>> {
    let len = input.numerator.len();

    match points_per_field {
        Some(0) => Err(SegmentationError::ZeroPointsPerField),
        Some(n) => {
            let segments = len.div_ceil(n);
            let per_sample = input.field.len() == len;
            if !per_sample && input.field.len() < segments {
                return Err(SegmentationError::MissingFieldValues {
                    segments,
                    points_per_field: n,
                    available: input.field.len(),
                });
            }
            Ok((0..segments)
                .map(|k| {
                    let start = k * n;
                    let field = if per_sample { input.field[start] } else { input.field[k] };
                    (field, start)
                })
                .collect())
        }
        None => {
            if input.field.len() != input.angle.len() {
                return Err(SegmentationError::UndeterminedBoundaries {
                    field_len: input.field.len(),
                    angle_len: input.angle.len(),
                });
            }
            Ok(run_starts(input.field)
                .into_iter()
                .map(|start| (input.field[start], start))
                .collect())
        }
    }
}

fn check_len(column: &'static str, values: &[f64], expected: usize) -> Result<()> {
    if values.len() != expected {
        return Err(SegmentationError::LengthMismatch {
            column,
            len: values.len(),
            expected,
        });
    }
    Ok(())
}

/// Split a continuous multi-field recording into per-field segments.
///
/// Segments come out in measurement order: a field value that is visited
/// twice yields two segments. With the delta method enabled, a segment of
/// odd length loses its final sample (reported as a data-shape warning) and
/// exposes diff/sum/raw1/raw2 of its even/odd pairs. Non-finite samples in
/// any column are rejected.
///
/// # Arguments
///
/// * `input` - Field, angle and signal columns
/// * `options` - Delta-method switch and optional fixed points per field
/// * `sink` - Receives segment and warning events
///
/// # Example
///
/// ```
/// use transport_preview::config::SegmentationConfig;
/// use transport_preview::core::events::NullSink;
/// use transport_preview::processors::segmentation::{segment_by_field, SegmentInput};
///
/// let field = [1.0, 1.0, 2.0, 2.0];
/// let angle = [0.0, 90.0, 0.0, 90.0];
/// let signal = [5.0, 6.0, 7.0, 8.0];
/// let input = SegmentInput { field: &field, angle: &angle, numerator: &signal, denominator: None };
/// let options = SegmentationConfig { use_delta_method: false, points_per_field: None };
///
/// let segments = segment_by_field(&input, &options, &NullSink).unwrap();
/// assert_eq!(segments.len(), 2);
/// ```
pub fn segment_by_field(
    input: &SegmentInput<'_>,
    options: &SegmentationConfig,
    sink: &dyn EventSink,
) -> Result<Vec<FieldSegment>> {
    let len = input.numerator.len();
    check_len("angle", input.angle, len)?;

    let mut columns = vec![
        ("field", input.field),
        ("angle", input.angle),
        ("numerator", input.numerator),
    ];
    columns.extend(input.denominator.map(|d| ("denominator", d)));
    for (column, values) in columns {
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(SegmentationError::NonFinite { column, index });
        }
    }

    let signal: Vec<f64> = match input.denominator {
        Some(denominator) => {
            check_len("denominator", denominator, len)?;
            if let Some(index) = denominator.iter().position(|&d| d == 0.0) {
                return Err(SegmentationError::ZeroDenominator { index });
            }
            input
                .numerator
                .iter()
                .zip(denominator)
                .map(|(n, d)| n / d)
                .collect()
        }
        None => input.numerator.to_vec(),
    };

    let bounds = boundaries(input, options.points_per_field)?;
    let mut segments = Vec::with_capacity(bounds.len());

    for (k, &(field, start)) in bounds.iter().enumerate() {
        let mut end = bounds.get(k + 1).map_or(len, |&(_, next)| next);

        sink.emit(ProcessingEvent::SegmentDetected { field, start, end });

        if options.use_delta_method && (end - start) % 2 == 1 {
            sink.emit(ProcessingEvent::DataShapeWarning {
                context: format!("field segment {} (field {})", k, field),
                len: end - start,
                dropped: 1,
            });
            end -= 1;
        }

        let current_range = input.denominator.and_then(|d| {
            d[start..end].iter().fold(None, |acc: Option<(f64, f64)>, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
        });

        let angle_slice = &input.angle[start..end];
        let signal_slice = &signal[start..end];

        let (angle, signal) = if options.use_delta_method {
            let pairs = separate_alternating_signal(signal_slice);
            let angles = separate_alternating_signal(angle_slice);
            (
                angles.even,
                SegmentSignal::Delta {
                    diff: pairs.difference(),
                    sum: pairs.sum(),
                    raw1: pairs.even,
                    raw2: pairs.odd,
                },
            )
        } else {
            (angle_slice.to_vec(), SegmentSignal::Plain(signal_slice.to_vec()))
        };

        segments.push(FieldSegment {
            field,
            start,
            end,
            angle,
            signal,
            current_range,
        });
    }

    Ok(segments)
}
