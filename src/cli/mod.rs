//! Command-line interface for transport data preview.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::core::curve::{CurveSummary, DeltaMethod, NormalizeMethod, OffsetMethod};
use crate::core::events::LogSink;
use crate::core::{load_columns, write_curve_text, write_fit_text, write_segment_text};
use crate::processors::fitting::{self, FitModel};
use crate::processors::segmentation::{segment_by_field, SegmentInput};
use crate::{Curve, CurveMetadata, Operation, PipelineConfig, SegmentationConfig};

#[derive(Parser)]
#[command(name = "transport-preview")]
#[command(about = "Transport measurement processing and fitting", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a processing chain to one or more (x, y) text files
    Process {
        /// Input text files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output directory
        #[arg(short, long)]
        output_dir: PathBuf,
        /// Zero-based x column
        #[arg(long, default_value_t = 0)]
        x_column: usize,
        /// Zero-based y column
        #[arg(long, default_value_t = 1)]
        y_column: usize,
        /// Delta method: 0 raw, 1 even, 2 odd, 3 difference, 4 sum
        #[arg(long)]
        delta: Option<u8>,
        /// Average the up and down halves of the sweep
        #[arg(long)]
        average: bool,
        /// Symmetrize: 0 none, 1 symmetric, 2 antisymmetric
        #[arg(long)]
        symmetrize: Option<u8>,
        /// Symmetry period in x units
        #[arg(long)]
        step: Option<f64>,
        /// Symmetry center in x units
        #[arg(long)]
        center: Option<f64>,
        /// Normalize: 0 none, 1 by min, 2 by max
        #[arg(long)]
        normalize: Option<u8>,
        /// Offset: 0 none, 1 min, 2 max, 3 mean, 4 value
        #[arg(long)]
        offset: Option<u8>,
        /// Constant subtracted with --offset 4
        #[arg(long, default_value_t = 0.0)]
        offset_value: f64,
        /// Input is a single sweep direction
        #[arg(long)]
        no_up_down: bool,
    },

    /// Split a multi-field rotation recording into per-field files
    Segment {
        /// Input text file
        input: PathBuf,
        /// Output directory
        #[arg(short, long)]
        output_dir: PathBuf,
        /// Zero-based field column
        #[arg(long)]
        field_column: usize,
        /// Zero-based angle column
        #[arg(long)]
        angle_column: usize,
        /// Zero-based signal (voltage) column
        #[arg(long)]
        signal_column: usize,
        /// Zero-based current column; the signal is divided by it
        #[arg(long)]
        current_column: Option<usize>,
        /// Fixed number of angle points per field
        #[arg(long)]
        points_per_field: Option<usize>,
        /// Keep the raw signal instead of delta-method pairs
        #[arg(long)]
        no_delta: bool,
    },

    /// Fit a cosine or cosine-squared model to (x, y)
    Fit {
        /// Input text file
        input: PathBuf,
        /// Zero-based x column
        #[arg(long, default_value_t = 0)]
        x_column: usize,
        /// Zero-based y column
        #[arg(long, default_value_t = 1)]
        y_column: usize,
        /// Fit a*cos^2(w*x+p) instead of a*cos(w*x+p)
        #[arg(long)]
        squared: bool,
        /// Do not fit a vertical offset
        #[arg(long)]
        no_offset: bool,
        /// Write data and fitted curve to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Operation flags of the `process` command.
#[derive(Debug, Default, Clone, PartialEq)]
struct OperationFlags {
    delta: Option<u8>,
    average: bool,
    symmetrize: Option<u8>,
    step: Option<f64>,
    center: Option<f64>,
    normalize: Option<u8>,
    offset: Option<u8>,
    offset_value: f64,
}

impl OperationFlags {
    fn is_empty(&self) -> bool {
        self.delta.is_none()
            && !self.average
            && self.symmetrize.is_none()
            && self.normalize.is_none()
            && self.offset.is_none()
    }

    /// Queue in the fixed order delta, average, symmetrize, normalize, offset.
    fn to_operations(&self) -> Result<Vec<Operation>> {
        let mut operations = Vec::new();
        if let Some(code) = self.delta {
            operations.push(Operation::DeltaMethod(DeltaMethod::try_from(code)?));
        }
        if self.average {
            operations.push(Operation::AverageUpDown);
        }
        if let Some(code) = self.symmetrize {
            operations.push(Operation::symmetrize(code, self.step, self.center)?);
        }
        if let Some(code) = self.normalize {
            operations.push(Operation::Normalize(NormalizeMethod::try_from(code)?));
        }
        if let Some(code) = self.offset {
            operations.push(Operation::OffsetCorrection(OffsetMethod::from_code(
                code,
                self.offset_value,
            )?));
        }
        Ok(operations)
    }
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Create a progress bar for batches of files
fn create_progress(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "data".to_string())
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    let config = match load_config(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Process {
            inputs,
            output_dir,
            x_column,
            y_column,
            delta,
            average,
            symmetrize,
            step,
            center,
            normalize,
            offset,
            offset_value,
            no_up_down,
        } => {
            let flags = OperationFlags {
                delta,
                average,
                symmetrize,
                step,
                center,
                normalize,
                offset,
                offset_value,
            };
            cmd_process(&inputs, &output_dir, [x_column, y_column], &flags, no_up_down, &config)
        }
        Commands::Segment {
            input,
            output_dir,
            field_column,
            angle_column,
            signal_column,
            current_column,
            points_per_field,
            no_delta,
        } => cmd_segment(
            &input,
            &output_dir,
            [field_column, angle_column, signal_column],
            current_column,
            points_per_field,
            no_delta,
            &config,
        ),
        Commands::Fit {
            input,
            x_column,
            y_column,
            squared,
            no_offset,
            output,
        } => cmd_fit(&input, [x_column, y_column], squared, no_offset, output, &config),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Load the YAML config if one was given, defaults otherwise.
fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            let config = PipelineConfig::from_yaml(path)
                .map_err(|e| anyhow!("failed to load config from {}: {}", path.display(), e))?;
            info!("Loaded config from: {}", path.display());
            Ok(config)
        }
        None => Ok(PipelineConfig::default()),
    }
}

/// Outcome of processing one input file.
#[derive(Debug)]
struct ProcessedFile {
    output: PathBuf,
    samples: usize,
    summary: Option<CurveSummary>,
}

/// Load, process and export one curve.
fn process_file(
    input: &Path,
    output_dir: &Path,
    columns: [usize; 2],
    operations: &[Operation],
    up_down_sweep: bool,
    config: &PipelineConfig,
) -> Result<ProcessedFile> {
    let mut data = load_columns(input, &columns, &config.io)
        .with_context(|| format!("failed to load {}", input.display()))?;
    let y = data.pop().unwrap_or_default();
    let x = data.pop().unwrap_or_default();

    let stem = file_stem(input);
    let mut curve = Curve::new(x, y)?
        .with_up_down_sweep(up_down_sweep)
        .with_label(stem.clone())
        .with_metadata(CurveMetadata {
            source_path: Some(input.to_path_buf()),
            x_channel: Some(format!("column {}", columns[0])),
            y_channel: Some(format!("column {}", columns[1])),
            ..CurveMetadata::default()
        });
    curve.extend_operations(operations.iter().copied())?;
    curve
        .process_data_with(&LogSink)
        .with_context(|| format!("processing {} failed", input.display()))?;

    let output = output_dir.join(format!("{}_processed.dat", stem));
    write_curve_text(&output, &curve, &config.io)?;
    Ok(ProcessedFile {
        output,
        samples: curve.calc_x().len(),
        summary: curve.summary(),
    })
}

fn cmd_process(
    inputs: &[PathBuf],
    output_dir: &Path,
    columns: [usize; 2],
    flags: &OperationFlags,
    no_up_down: bool,
    config: &PipelineConfig,
) -> Result<()> {
    let start = Instant::now();

    let operations = if flags.is_empty() {
        config.processing.operations.clone()
    } else {
        flags.to_operations()?
    };
    let up_down_sweep = config.processing.up_down_sweep && !no_up_down;

    println!("Processing {} file(s)...", inputs.len());
    println!("Output directory: {}", output_dir.display());
    if operations.is_empty() {
        println!("Operations: none");
    }
    for (i, op) in operations.iter().enumerate() {
        println!("  {}. {}", i + 1, op);
    }

    let progress = create_progress(inputs.len());
    let results: Vec<(&PathBuf, Result<ProcessedFile>)> = inputs
        .par_iter()
        .map(|input| {
            let result = process_file(input, output_dir, columns, &operations, up_down_sweep, config);
            progress.inc(1);
            (input, result)
        })
        .collect();
    progress.finish_and_clear();

    let mut failed = 0;
    for (input, result) in &results {
        match result {
            Ok(processed) => {
                println!(
                    "{} -> {} ({} samples)",
                    input.display(),
                    processed.output.display(),
                    processed.samples
                );
                if let Some(summary) = &processed.summary {
                    println!("    {}", summary);
                }
            }
            Err(e) => {
                error!("{}: {:#}", input.display(), e);
                failed += 1;
            }
        }
    }

    let mut items = vec![
        ("Output directory", output_dir.display().to_string()),
        ("Files processed", (results.len() - failed).to_string()),
        ("Files failed", failed.to_string()),
        ("Operations", operations.len().to_string()),
        ("Up/down sweep", up_down_sweep.to_string()),
    ];
    if let [(_, Ok(ProcessedFile { summary: Some(summary), .. }))] = results.as_slice() {
        items.push(("Min", format!("{:.6e}", summary.statistics.min)));
        items.push(("Max", format!("{:.6e}", summary.statistics.max)));
        items.push(("Mean", format!("{:.6e}", summary.statistics.mean)));
        items.push(("Integral", format!("{:.6e}", summary.integral)));
    }
    items.push(("Duration", format!("{:.2?}", start.elapsed())));
    print_summary("Processing Complete", &items);

    if failed > 0 {
        bail!("{} of {} file(s) failed", failed, results.len());
    }
    Ok(())
}

fn cmd_segment(
    input: &Path,
    output_dir: &Path,
    columns: [usize; 3],
    current_column: Option<usize>,
    points_per_field: Option<usize>,
    no_delta: bool,
    config: &PipelineConfig,
) -> Result<()> {
    let start = Instant::now();

    let mut wanted = columns.to_vec();
    wanted.extend(current_column);

    let spinner = create_spinner("Loading recording...");
    let data = load_columns(input, &wanted, &config.io)
        .with_context(|| format!("failed to load {}", input.display()))?;

    let options = SegmentationConfig {
        use_delta_method: config.segmentation.use_delta_method && !no_delta,
        points_per_field: points_per_field.or(config.segmentation.points_per_field),
    };
    let segment_input = SegmentInput {
        field: &data[0],
        angle: &data[1],
        numerator: &data[2],
        denominator: data.get(3).map(Vec::as_slice),
    };

    spinner.set_message("Segmenting by field...");
    let segments = segment_by_field(&segment_input, &options, &LogSink)?;

    spinner.set_message("Writing segments...");
    let stem = file_stem(input);
    for (k, segment) in segments.iter().enumerate() {
        let output = output_dir.join(format!("{}_seg{:03}_field{}.dat", stem, k, segment.field));
        write_segment_text(&output, segment, &config.io)?;
    }
    spinner.finish_and_clear();

    print_summary(
        "Segmentation Complete",
        &[
            ("Input file", input.display().to_string()),
            ("Output directory", output_dir.display().to_string()),
            ("Samples", data[0].len().to_string()),
            ("Segments", segments.len().to_string()),
            ("Delta method", options.use_delta_method.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_fit(
    input: &Path,
    columns: [usize; 2],
    squared: bool,
    no_offset: bool,
    output: Option<PathBuf>,
    config: &PipelineConfig,
) -> Result<()> {
    let start = Instant::now();

    let data = load_columns(input, &columns, &config.io)
        .with_context(|| format!("failed to load {}", input.display()))?;
    let (x, y) = (&data[0], &data[1]);

    let model = if squared {
        FitModel::CosineSquared
    } else {
        FitModel::Cosine
    };
    let fit_offset = config.fit.fit_offset && !no_offset;

    let spinner = create_spinner("Fitting...");
    let result = fitting::fit(model, x, y, fit_offset, None, &config.fit);
    spinner.finish_and_clear();
    let result = result.with_context(|| format!("{} fit of {} failed", model, input.display()))?;

    if let Some(path) = &output {
        write_fit_text(path, x, y, &result, model.name(), &config.io)?;
    }

    print_summary(
        "Fit Complete",
        &[
            ("Input file", input.display().to_string()),
            ("Model", model.to_string()),
            ("Amplitude", format!("{:.6e}", result.amplitude)),
            ("Frequency", format!("{:.6}", result.frequency)),
            ("Phase", format!("{:.6}", result.phase)),
            ("Offset", format!("{:.6e}", result.offset)),
            ("R²", format!("{:.6}", result.r_squared)),
            ("Iterations", result.iterations.to_string()),
            (
                "Output file",
                output.map_or_else(|| "-".to_string(), |p| p.display().to_string()),
            ),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}
