//! Harmonic fits of angle-dependent signals.
//!
//! Two models are supported:
//! - cosine: `a * cos(w * x + p) [+ c]`
//! - cosine squared: `a * cos(w * x + p)^2 [+ c]`
//!
//! Parameters are seeded from the dominant Fourier component of the signal
//! and refined by Levenberg-Marquardt least squares.

use std::f64::consts::PI;
use std::fmt;

use nalgebra::{DMatrix, DVector};
use rustfft::{num_complex::Complex, FftPlanner};
use thiserror::Error;

use crate::config::FitConfig;
use crate::core::ErrorKind;

const MIN_DAMPING: f64 = 1e-15;
const MAX_DAMPING: f64 = 1e16;

/// Errors that can occur during fitting.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FitError {
    #[error("x has {x_len} values but y has {y_len}")]
    LengthMismatch { x_len: usize, y_len: usize },

    #[error("insufficient data: {parameters} free parameters need at least {parameters} points, got {points}")]
    InsufficientData { points: usize, parameters: usize },

    #[error("non-finite value in {axis} at index {index}")]
    NonFinite { axis: &'static str, index: usize },

    #[error("singular Jacobian at iteration {iteration}")]
    SingularJacobian { iteration: usize },

    #[error("fit did not converge after {iterations} iterations (residual {residual_sum_squares:e})")]
    NotConverged {
        iterations: usize,
        residual_sum_squares: f64,
    },
}

impl FitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FitError::LengthMismatch { .. }
            | FitError::InsufficientData { .. }
            | FitError::NonFinite { .. } => ErrorKind::Configuration,
            FitError::SingularJacobian { .. } | FitError::NotConverged { .. } => {
                ErrorKind::NumericDegeneracy
            }
        }
    }
}

/// Result type for fitting.
pub type Result<T> = std::result::Result<T, FitError>;

/// Model shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitModel {
    Cosine,
    CosineSquared,
}

impl FitModel {
    /// Evaluate the model at `x`.
    #[inline]
    pub fn evaluate(&self, params: &FitParameters, x: f64) -> f64 {
        let theta = params.frequency * x + params.phase;
        match self {
            FitModel::Cosine => params.amplitude * theta.cos() + params.offset,
            FitModel::CosineSquared => params.amplitude * theta.cos().powi(2) + params.offset,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FitModel::Cosine => "cosine",
            FitModel::CosineSquared => "cosine_squared",
        }
    }

    /// Phase period after which the model repeats.
    fn phase_period(&self) -> f64 {
        match self {
            FitModel::Cosine => 2.0 * PI,
            FitModel::CosineSquared => PI,
        }
    }
}

impl fmt::Display for FitModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Model parameters. `frequency` is angular (radians per x unit).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitParameters {
    pub amplitude: f64,
    pub frequency: f64,
    pub phase: f64,
    pub offset: f64,
}

impl FitParameters {
    fn to_vector(self, fit_offset: bool) -> DVector<f64> {
        let mut values = vec![self.amplitude, self.frequency, self.phase];
        if fit_offset {
            values.push(self.offset);
        }
        DVector::from_vec(values)
    }

    fn from_vector(values: &DVector<f64>) -> Self {
        Self {
            amplitude: values[0],
            frequency: values[1],
            phase: values[2],
            offset: if values.len() > 3 { values[3] } else { 0.0 },
        }
    }
}

/// Outcome of a successful fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub amplitude: f64,
    pub frequency: f64,
    pub phase: f64,
    /// Zero when the offset was not fitted
    pub offset: f64,
    /// Model evaluated at every input x
    pub fitted: Vec<f64>,
    pub iterations: usize,
    pub residual_sum_squares: f64,
    /// Coefficient of determination
    pub r_squared: f64,
}

impl FitResult {
    pub fn parameters(&self) -> FitParameters {
        FitParameters {
            amplitude: self.amplitude,
            frequency: self.frequency,
            phase: self.phase,
            offset: self.offset,
        }
    }
}

fn free_parameters(fit_offset: bool) -> usize {
    if fit_offset {
        4
    } else {
        3
    }
}

fn validate(x: &[f64], y: &[f64], fit_offset: bool) -> Result<()> {
    if x.len() != y.len() {
        return Err(FitError::LengthMismatch {
            x_len: x.len(),
            y_len: y.len(),
        });
    }
    let parameters = free_parameters(fit_offset);
    if x.len() < parameters {
        return Err(FitError::InsufficientData {
            points: x.len(),
            parameters,
        });
    }
    for (axis, values) in [("x", x), ("y", y)] {
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(FitError::NonFinite { axis, index });
        }
    }
    Ok(())
}

/// Angular frequency of the strongest non-DC Fourier bin of `y`.
fn dominant_frequency(x: &[f64], y: &[f64]) -> f64 {
    let n = y.len();
    let mut buffer: Vec<Complex<f64>> = y.iter().map(|&v| Complex::new(v, 0.0)).collect();

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buffer);

    let peak = (1..=n / 2)
        .max_by(|&a, &b| buffer[a].norm_sqr().total_cmp(&buffer[b].norm_sqr()))
        .unwrap_or(1);

    let dx = (x[n - 1] - x[0]) / (n - 1) as f64;
    (2.0 * PI * peak as f64 / (n as f64 * dx)).abs()
}

/// Seed parameters from the spectrum and range of `y`.
///
/// A zero or non-finite frequency estimate (e.g. all x equal) is replaced by
/// `config.frequency_fallback`. The phase seed is always zero.
pub fn estimate_initial_guess(
    x: &[f64],
    y: &[f64],
    model: FitModel,
    fit_offset: bool,
    config: &FitConfig,
) -> Result<FitParameters> {
    validate(x, y, fit_offset)?;

    let mut frequency = dominant_frequency(x, y);
    if model == FitModel::CosineSquared {
        // cos^2 oscillates at twice the angular frequency
        frequency /= 2.0;
    }
    if frequency == 0.0 || !frequency.is_finite() {
        frequency = config.frequency_fallback;
    }

    let (min, max) = y
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

    let (amplitude, offset) = match model {
        FitModel::Cosine => ((max - min) / 2.0, (max + min) / 2.0),
        FitModel::CosineSquared => (max - min, min),
    };

    Ok(FitParameters {
        amplitude,
        frequency,
        phase: 0.0,
        offset: if fit_offset { offset } else { 0.0 },
    })
}

fn residuals(model: FitModel, params: &DVector<f64>, x: &[f64], y: &[f64]) -> DVector<f64> {
    let p = FitParameters::from_vector(params);
    DVector::from_iterator(x.len(), x.iter().zip(y).map(|(&xi, &yi)| model.evaluate(&p, xi) - yi))
}

fn jacobian(model: FitModel, params: &DVector<f64>, x: &[f64]) -> DMatrix<f64> {
    let p = FitParameters::from_vector(params);
    let mut jac = DMatrix::zeros(x.len(), params.len());

    for (i, &xi) in x.iter().enumerate() {
        let theta = p.frequency * xi + p.phase;
        let (d_amplitude, d_theta) = match model {
            FitModel::Cosine => (theta.cos(), -p.amplitude * theta.sin()),
            FitModel::CosineSquared => (theta.cos().powi(2), -p.amplitude * (2.0 * theta).sin()),
        };
        jac[(i, 0)] = d_amplitude;
        jac[(i, 1)] = d_theta * xi;
        jac[(i, 2)] = d_theta;
        if params.len() > 3 {
            jac[(i, 3)] = 1.0;
        }
    }
    jac
}

/// Levenberg-Marquardt refinement. Returns the parameters and the number of
/// iterations used.
fn refine(
    model: FitModel,
    x: &[f64],
    y: &[f64],
    seed: FitParameters,
    fit_offset: bool,
    config: &FitConfig,
) -> Result<(FitParameters, usize)> {
    let mut params = seed.to_vector(fit_offset);
    let mut residual = residuals(model, &params, x, y);
    let mut cost = residual.norm_squared();
    let mut damping = config.initial_damping;

    for iteration in 1..=config.max_iterations {
        let jac = jacobian(model, &params, x);
        if (0..jac.ncols()).any(|j| jac.column(j).iter().all(|v| *v == 0.0)) {
            return Err(FitError::SingularJacobian { iteration });
        }
        if cost == 0.0 {
            return Ok((FitParameters::from_vector(&params), iteration - 1));
        }

        let normal = jac.tr_mul(&jac);
        let rhs = -jac.tr_mul(&residual);

        loop {
            let mut damped = normal.clone();
            for j in 0..damped.nrows() {
                damped[(j, j)] += damping * normal[(j, j)];
            }

            let step = damped
                .lu()
                .solve(&rhs)
                .ok_or(FitError::SingularJacobian { iteration })?;

            let candidate = &params + &step;
            let candidate_residual = residuals(model, &candidate, x, y);
            let candidate_cost = candidate_residual.norm_squared();
            let small_step =
                step.norm() <= config.step_tolerance * (params.norm() + config.step_tolerance);

            if candidate_cost.is_finite() && candidate_cost < cost {
                let reduction = cost - candidate_cost;
                let converged = reduction <= config.tolerance * cost || small_step;

                params = candidate;
                residual = candidate_residual;
                cost = candidate_cost;
                damping = (damping / 10.0).max(MIN_DAMPING);

                if converged {
                    return Ok((FitParameters::from_vector(&params), iteration));
                }
                break;
            }

            if small_step {
                // No further progress possible at this scale
                return Ok((FitParameters::from_vector(&params), iteration));
            }

            damping *= 10.0;
            if damping > MAX_DAMPING {
                return Err(FitError::NotConverged {
                    iterations: iteration,
                    residual_sum_squares: cost,
                });
            }
        }
    }

    Err(FitError::NotConverged {
        iterations: config.max_iterations,
        residual_sum_squares: cost,
    })
}

/// Wrap `phase` into `(-period / 2, period / 2]`.
fn wrap_phase(phase: f64, period: f64) -> f64 {
    let wrapped = phase.rem_euclid(period);
    if wrapped > period / 2.0 {
        wrapped - period
    } else {
        wrapped
    }
}

/// Positive frequency, positive cosine amplitude, phase in the principal range.
fn canonicalize(model: FitModel, mut params: FitParameters) -> FitParameters {
    if params.frequency < 0.0 {
        params.frequency = -params.frequency;
        params.phase = -params.phase;
    }
    if model == FitModel::Cosine && params.amplitude < 0.0 {
        params.amplitude = -params.amplitude;
        params.phase += PI;
    }
    params.phase = wrap_phase(params.phase, model.phase_period());
    params
}

/// Fit `model` to (x, y).
pub fn fit(
    model: FitModel,
    x: &[f64],
    y: &[f64],
    fit_offset: bool,
    initial_guess: Option<FitParameters>,
    config: &FitConfig,
) -> Result<FitResult> {
    validate(x, y, fit_offset)?;

    let mut seed = match initial_guess {
        Some(guess) => guess,
        None => estimate_initial_guess(x, y, model, fit_offset, config)?,
    };
    if !fit_offset {
        seed.offset = 0.0;
    }

    let (params, iterations) = refine(model, x, y, seed, fit_offset, config)?;
    let params = canonicalize(model, params);

    let fitted: Vec<f64> = x.iter().map(|&xi| model.evaluate(&params, xi)).collect();
    let residual_sum_squares: f64 = fitted.iter().zip(y).map(|(f, v)| (f - v).powi(2)).sum();
    let mean = y.iter().sum::<f64>() / y.len() as f64;
    let total_sum_squares: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
    let r_squared = if total_sum_squares > 0.0 {
        1.0 - residual_sum_squares / total_sum_squares
    } else if residual_sum_squares == 0.0 {
        1.0
    } else {
        0.0
    };

    log::debug!(
        "{} fit converged after {} iterations: a={:.6}, w={:.6}, p={:.6}, c={:.6}, R²={:.6}",
        model,
        iterations,
        params.amplitude,
        params.frequency,
        params.phase,
        params.offset,
        r_squared
    );

    Ok(FitResult {
        amplitude: params.amplitude,
        frequency: params.frequency,
        phase: params.phase,
        offset: params.offset,
        fitted,
        iterations,
        residual_sum_squares,
        r_squared,
    })
}

/// Fit `a * cos(w * x + p) [+ c]`.
///
/// # Example
///
/// ```
/// use transport_preview::config::FitConfig;
/// use transport_preview::processors::fitting::fit_cosine;
///
/// let x: Vec<f64> = (0..200).map(|i| i as f64 * 0.08 * std::f64::consts::PI).collect();
/// let y: Vec<f64> = x.iter().map(|v| 3.0 * (0.5 * v + 0.2).cos()).collect();
///
/// let result = fit_cosine(&x, &y, false, None, &FitConfig::default()).unwrap();
/// assert!((result.amplitude - 3.0).abs() < 1e-6);
/// ```
pub fn fit_cosine(
    x: &[f64],
    y: &[f64],
    fit_offset: bool,
    initial_guess: Option<FitParameters>,
    config: &FitConfig,
) -> Result<FitResult> {
    fit(FitModel::Cosine, x, y, fit_offset, initial_guess, config)
}

/// Fit `a * cos(w * x + p)^2 [+ c]`.
pub fn fit_cosine_squared(
    x: &[f64],
    y: &[f64],
    fit_offset: bool,
    initial_guess: Option<FitParameters>,
    config: &FitConfig,
) -> Result<FitResult> {
    fit(FitModel::CosineSquared, x, y, fit_offset, initial_guess, config)
}
