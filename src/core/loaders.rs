//! Plain-text column import.
//!
//! Reads delimited numeric tables such as the ones written by
//! [`crate::core::writers`]: `#` comment lines, an optional header row, one
//! sample per row. Binary measurement formats are out of scope.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim};
use thiserror::Error;

use super::ErrorKind;
use crate::config::{InvalidDelimiter, IoConfig};

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Delimiter(#[from] InvalidDelimiter),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("Missing column {column}: row {row} has only {available} field(s)")]
    MissingColumn {
        column: usize,
        row: usize,
        available: usize,
    },

    #[error("Parse error in row {row}, column {column}: '{value}'")]
    ParseError {
        row: usize,
        column: usize,
        value: String,
    },
}

impl LoaderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoaderError::Io(_) | LoaderError::Csv(_) => ErrorKind::Io,
            LoaderError::Delimiter(_)
            | LoaderError::EmptyFile(_)
            | LoaderError::MissingColumn { .. }
            | LoaderError::ParseError { .. } => ErrorKind::Configuration,
        }
    }
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Load the requested columns of a delimited text file.
///
/// Returns one vector per requested column, in the order requested.
///
/// # Arguments
///
/// * `path` - Text file to read
/// * `columns` - Zero-based column indices
/// * `io` - Delimiter and header settings
pub fn load_columns(path: &Path, columns: &[usize], io: &IoConfig) -> Result<Vec<Vec<f64>>> {
    let file = File::open(path)?;
    let data = read_columns(BufReader::with_capacity(64 * 1024, file), columns, io)?;

    if data.first().map_or(true, |c| c.is_empty()) {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }
    Ok(data)
}

/// Load columns from any reader. Empty input yields empty columns.
pub fn read_columns<R: Read>(reader: R, columns: &[usize], io: &IoConfig) -> Result<Vec<Vec<f64>>> {
    let mut csv_reader = ReaderBuilder::new()
        .delimiter(io.delimiter_byte()?)
        .has_headers(io.has_header)
        .comment(Some(b'#'))
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut data: Vec<Vec<f64>> = vec![Vec::with_capacity(1024); columns.len()];

    for (row, record) in csv_reader.records().enumerate() {
        let record = record?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }

        for (out, &column) in data.iter_mut().zip(columns) {
            let field = record.get(column).ok_or(LoaderError::MissingColumn {
                column,
                row,
                available: record.len(),
            })?;
            let value = field.parse::<f64>().map_err(|_| LoaderError::ParseError {
                row,
                column,
                value: field.to_string(),
            })?;
            out.push(value);
        }
    }

    Ok(data)
}
