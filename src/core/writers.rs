//! Plain-text export of curves, field segments and fits.
//!
//! Every file has the same layout:
//! - `#`-prefixed header lines with metadata and provenance
//! - a `# columns:` line naming the columns
//! - one delimited row per sample
//!
//! The files can be read back with [`crate::core::loaders::load_columns`].

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use super::curve::Curve;
use super::ErrorKind;
use crate::config::{InvalidDelimiter, IoConfig};
use crate::processors::fitting::FitResult;
use crate::processors::segmentation::{FieldSegment, SegmentSignal};

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// Delimiter that cannot be written as one byte.
    #[error(transparent)]
    Delimiter(#[from] InvalidDelimiter),

    /// Columns of different lengths.
    #[error("column length mismatch: '{column}' has {len} values, expected {expected}")]
    LengthMismatch {
        column: String,
        len: usize,
        expected: usize,
    },
}

impl WriteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WriteError::LengthMismatch { .. } | WriteError::Delimiter(_) => {
                ErrorKind::Configuration
            }
            _ => ErrorKind::Io,
        }
    }
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Write a commented header followed by equal-length numeric columns.
fn write_table(
    path: &Path,
    header: &[String],
    columns: &[(&str, &[f64])],
    io: &IoConfig,
) -> Result<()> {
    let delimiter = io.delimiter_byte()?;
    let expected = columns.first().map_or(0, |(_, c)| c.len());
    if let Some((name, col)) = columns.iter().find(|(_, c)| c.len() != expected) {
        return Err(WriteError::LengthMismatch {
            column: name.to_string(),
            len: col.len(),
            expected,
        });
    }

    ensure_parent_dirs(path)?;
    let path_str = path.display().to_string();
    let write_err = |e| WriteError::WriteFile {
        path: path_str.clone(),
        source: e,
    };

    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path_str.clone(),
        source: e,
    })?;
    let mut writer = BufWriter::new(file);

    for line in header {
        writeln!(writer, "# {}", line).map_err(write_err)?;
    }
    let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
    let separator = char::from(delimiter).to_string();
    writeln!(writer, "# columns: {}", names.join(&separator)).map_err(write_err)?;

    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_writer(writer);

    for row in 0..expected {
        let record: Vec<String> = columns
            .iter()
            .map(|(_, c)| format!("{:.*e}", io.precision, c[row]))
            .collect();
        csv_writer
            .write_record(&record)
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    csv_writer.flush().map_err(write_err)?;
    Ok(())
}

fn curve_header(curve: &Curve) -> Vec<String> {
    let meta = &curve.metadata;
    let mut header = Vec::new();

    if let Some(label) = &curve.label {
        header.push(format!("label: {}", label));
    }
    if let Some(source) = &meta.source_path {
        header.push(format!("source: {}", source.display()));
    }
    if let Some(group) = &meta.group {
        header.push(format!("group: {}", group));
    }
    match (&meta.parameter_channel, meta.parameter_value) {
        (Some(channel), Some(value)) => header.push(format!("parameter: {} = {}", channel, value)),
        (Some(channel), None) => header.push(format!("parameter: {}", channel)),
        (None, Some(value)) => header.push(format!("parameter: {}", value)),
        (None, None) => {}
    }
    if let Some(x) = &meta.x_channel {
        header.push(format!("x channel: {}", x));
    }
    if let Some(y) = &meta.y_channel {
        header.push(format!("y channel: {}", y));
    }

    header.push(format!("samples: raw {}, processed {}", curve.raw_x().len(), curve.calc_x().len()));
    if let Some(summary) = curve.summary() {
        header.push(format!("statistics: {}", summary));
    }
    if curve.operations().is_empty() {
        header.push("operations: none".to_string());
    } else {
        header.push("operations:".to_string());
        header.extend(curve.history().into_iter().map(|line| format!("  {}", line)));
    }
    header
}

/// Write a curve's processed data with its metadata and operation history.
///
/// # Example
///
/// ```no_run
/// use transport_preview::config::IoConfig;
/// use transport_preview::core::curve::Curve;
/// use transport_preview::core::writers::write_curve_text;
/// use std::path::Path;
///
/// let curve = Curve::new(vec![0.0, 1.0], vec![2.0, 3.0]).unwrap();
/// write_curve_text(Path::new("curve.dat"), &curve, &IoConfig::default()).unwrap();
/// ```
pub fn write_curve_text(path: &Path, curve: &Curve, io: &IoConfig) -> Result<()> {
    write_table(
        path,
        &curve_header(curve),
        &[("x", curve.calc_x()), ("y", curve.calc_y())],
        io,
    )
}

/// Write one field segment.
///
/// Plain segments have `angle` and `signal` columns; delta-method segments
/// have `angle`, `diff`, `sum`, `raw1` and `raw2`.
pub fn write_segment_text(path: &Path, segment: &FieldSegment, io: &IoConfig) -> Result<()> {
    let mut header = vec![
        format!("field: {}", segment.field),
        format!("samples: {}..{}", segment.start, segment.end),
    ];
    if let Some((min, max)) = segment.current_range {
        header.push(format!("current range: {} .. {}", min, max));
    }

    let angle = segment.angle.as_slice();
    match &segment.signal {
        SegmentSignal::Plain(signal) => {
            write_table(
                path,
                &header,
                &[("angle", angle), ("signal", signal.as_slice())],
                io,
            )
        }
        SegmentSignal::Delta {
            diff,
            sum,
            raw1,
            raw2,
        } => write_table(
            path,
            &header,
            &[
                ("angle", angle),
                ("diff", diff.as_slice()),
                ("sum", sum.as_slice()),
                ("raw1", raw1.as_slice()),
                ("raw2", raw2.as_slice()),
            ],
            io,
        ),
    }
}

/// Write data and fitted model side by side with the fit parameters.
pub fn write_fit_text(
    path: &Path,
    x: &[f64],
    y: &[f64],
    fit: &FitResult,
    model: &str,
    io: &IoConfig,
) -> Result<()> {
    let header = vec![
        format!("model: {}", model),
        format!("amplitude: {}", fit.amplitude),
        format!("frequency: {}", fit.frequency),
        format!("phase: {}", fit.phase),
        format!("offset: {}", fit.offset),
        format!("r_squared: {}", fit.r_squared),
        format!("iterations: {}", fit.iterations),
    ];
    write_table(
        path,
        &header,
        &[("x", x), ("y", y), ("fitted", fit.fitted.as_slice())],
        io,
    )
}
