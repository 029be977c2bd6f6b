//! Stateless transforms over one-dimensional measurement sequences.
//!
//! This module provides the building blocks the processing pipeline replays:
//! - Delta-method separation of alternating samples
//! - Averaging of concatenated up/down sweeps
//! - Symmetrization around a center index, a fixed index shift, or across
//!   the halves of an up/down sweep
//!
//! Every function here is pure. Symmetrization always truncates, so the
//! caller is responsible for slicing the companion x-axis to the output
//! length.

use thiserror::Error;

use super::ErrorKind;

/// Errors raised by the signal primitives.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    /// No center was given and the sequence has no unique middle sample.
    #[error("sequence of length {len} has no middle sample; provide an explicit center index")]
    EvenLengthWithoutCenter { len: usize },

    /// The mirrored partner of index 0 lies outside the sequence.
    #[error("center index {center} is out of range for a sequence of length {len}")]
    CenterOutOfRange { center: usize, len: usize },

    /// The symmetry shift leaves no samples to combine.
    #[error("symmetry step {step} is out of range for a sequence of length {len}")]
    ShiftOutOfRange { step: usize, len: usize },

    /// Statistics requested on an empty sequence.
    #[error("sequence is empty")]
    Empty,
}

impl SignalError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SignalError::EvenLengthWithoutCenter { .. } | SignalError::Empty => {
                ErrorKind::NumericDegeneracy
            }
            SignalError::CenterOutOfRange { .. } | SignalError::ShiftOutOfRange { .. } => {
                ErrorKind::Configuration
            }
        }
    }
}

/// Result type for signal operations.
pub type Result<T> = std::result::Result<T, SignalError>;

/// The two phases of a delta-method recording.
#[derive(Debug, Clone, PartialEq)]
pub struct AlternatingSplit {
    /// Samples at indices 0, 2, 4, ...
    pub even: Vec<f64>,
    /// Samples at indices 1, 3, 5, ...
    pub odd: Vec<f64>,
}

impl AlternatingSplit {
    /// True when every even sample has an odd partner.
    #[inline]
    pub fn is_balanced(&self) -> bool {
        self.even.len() == self.odd.len()
    }

    /// Number of complete (even, odd) pairs.
    #[inline]
    pub fn pairs(&self) -> usize {
        self.odd.len()
    }

    /// Even phase truncated to the paired length.
    pub fn paired_even(&self) -> Vec<f64> {
        self.even[..self.pairs()].to_vec()
    }

    /// Pairwise `even - odd`; an unmatched last sample is dropped.
    pub fn difference(&self) -> Vec<f64> {
        self.even.iter().zip(&self.odd).map(|(a, b)| a - b).collect()
    }

    /// Pairwise `even + odd`; an unmatched last sample is dropped.
    pub fn sum(&self) -> Vec<f64> {
        self.even.iter().zip(&self.odd).map(|(a, b)| a + b).collect()
    }
}

/// Split a sequence into its even- and odd-indexed samples.
///
/// For an odd-length input the even phase is one sample longer than the odd
/// phase; [`AlternatingSplit::is_balanced`] reports this so the caller can
/// raise a data-shape warning.
///
/// # Example
///
/// ```
/// use transport_preview::core::signal::separate_alternating_signal;
///
/// let split = separate_alternating_signal(&[0.0, 1.0, 2.0, 3.0]);
/// assert_eq!(split.even, vec![0.0, 2.0]);
/// assert_eq!(split.odd, vec![1.0, 3.0]);
/// ```
pub fn separate_alternating_signal(seq: &[f64]) -> AlternatingSplit {
    AlternatingSplit {
        even: seq.iter().step_by(2).copied().collect(),
        odd: seq.iter().skip(1).step_by(2).copied().collect(),
    }
}

/// Average a concatenated up/down sweep onto its first half.
///
/// Computes `(s[i] + s[n-1-i]) / 2` for `i < n/2`, `repetitions` times. An
/// odd-length input loses its unmatched middle sample.
pub fn average_up_down_sweep(seq: &[f64], repetitions: usize) -> Vec<f64> {
    let mut current = seq.to_vec();
    for _ in 0..repetitions {
        let half = current.len() / 2;
        current = current
            .iter()
            .zip(current.iter().rev())
            .take(half)
            .map(|(a, b)| (a + b) / 2.0)
            .collect();
    }
    current
}

fn resolve_center(len: usize, center: Option<usize>) -> Result<usize> {
    match center {
        None if len % 2 == 0 => Err(SignalError::EvenLengthWithoutCenter { len }),
        None => Ok(len / 2),
        Some(c) if 2 * c >= len => Err(SignalError::CenterOutOfRange { center: c, len }),
        Some(c) => Ok(c),
    }
}

fn fold_zero(y: &[f64], center: Option<usize>, sign: f64) -> Result<Vec<f64>> {
    let c = resolve_center(y.len(), center)?;
    Ok((0..c).map(|i| (y[i] + sign * y[2 * c - i]) / 2.0).collect())
}

/// Keep the part of `y` that is symmetric around `center`.
///
/// `out[i] = (y[i] + y[2c - i]) / 2` for `i < c`. Without a center the middle
/// sample of an odd-length sequence is used.
pub fn symmetrize_signal_zero(y: &[f64], center: Option<usize>) -> Result<Vec<f64>> {
    fold_zero(y, center, 1.0)
}

/// Keep the part of `y` that is antisymmetric around `center`.
///
/// `out[i] = (y[i] - y[2c - i]) / 2` for `i < c`.
pub fn anti_symmetrize_signal_zero(y: &[f64], center: Option<usize>) -> Result<Vec<f64>> {
    fold_zero(y, center, -1.0)
}

fn fold_shift(y: &[f64], step: usize, sign: f64) -> Result<Vec<f64>> {
    if step >= y.len() {
        return Err(SignalError::ShiftOutOfRange { step, len: y.len() });
    }
    let base = (y[0] + sign * y[step]) / 2.0;
    Ok(y.iter()
        .zip(&y[step..])
        .map(|(a, b)| (a + sign * b) / 2.0 - base)
        .collect())
}

/// Symmetrize periodic data whose symmetry partner sits `step` samples later.
///
/// `out[i] = (y[i] + y[i+step])/2 - (y[0] + y[step])/2` for `i < len - step`.
pub fn symmetrize_signal(y: &[f64], step: usize) -> Result<Vec<f64>> {
    fold_shift(y, step, 1.0)
}

/// Antisymmetrize periodic data whose partner sits `step` samples later.
///
/// `out[i] = (y[i] - y[i+step])/2 - (y[0] - y[step])/2` for `i < len - step`.
pub fn anti_symmetrize_signal(y: &[f64], step: usize) -> Result<Vec<f64>> {
    fold_shift(y, step, -1.0)
}

fn fold_up_down(y: &[f64], step: usize, sign: f64) -> Result<Vec<f64>> {
    let half = y.len() / 2;
    if step == 0 || 2 * step > half {
        return Err(SignalError::ShiftOutOfRange { step, len: y.len() });
    }
    let up = &y[..half];
    let down: Vec<f64> = y[half..2 * half].iter().rev().copied().collect();

    let crossed = (0..step).map(|i| (up[i] + sign * down[i + step]) / 2.0);
    let shifted = (step..2 * step).map(|i| (up[i] + sign * up[i - step]) / 2.0);
    Ok(crossed.chain(shifted).collect())
}

/// Symmetrize an up/down sweep by cross-combining its halves.
///
/// The first half is the up sweep, the reversed second half the down sweep.
/// For `i < step` the up sample is paired with the down sample `step` later,
/// for `step <= i < 2*step` with the up sample `step` earlier. The output has
/// `2*step` samples.
pub fn symmetrize_signal_up_down(y: &[f64], step: usize) -> Result<Vec<f64>> {
    fold_up_down(y, step, 1.0)
}

/// Antisymmetrize an up/down sweep by cross-differencing its halves.
pub fn anti_symmetrize_signal_up_down(y: &[f64], step: usize) -> Result<Vec<f64>> {
    fold_up_down(y, step, -1.0)
}

/// Index of the sample closest to `value`, or `None` for an empty slice.
pub fn nearest_index(x: &[f64], value: f64) -> Option<usize> {
    x.iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (*a - value).abs().total_cmp(&(*b - value).abs()))
        .map(|(i, _)| i)
}

/// Summary statistics of a sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalStatistics {
    pub len: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Compute min, max and mean of a non-empty sequence.
pub fn statistics(y: &[f64]) -> Result<SignalStatistics> {
    if y.is_empty() {
        return Err(SignalError::Empty);
    }
    let (min, max, sum) = y.iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY, 0.0),
        |(min, max, sum), &v| (min.min(v), max.max(v), sum + v),
    );
    Ok(SignalStatistics {
        len: y.len(),
        min,
        max,
        mean: sum / y.len() as f64,
    })
}

/// Integrate `y` over `x` with the trapezoidal rule.
pub fn trapezoid_integral(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-12, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn test_separate_alternating_even_length() {
        let split = separate_alternating_signal(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(split.even, vec![0.0, 2.0, 4.0]);
        assert_eq!(split.odd, vec![1.0, 3.0, 5.0]);
        assert!(split.is_balanced());
    }

    #[test]
    fn test_separate_alternating_odd_length() {
        let split = separate_alternating_signal(&[0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(split.even, vec![0.0, 2.0, 4.0]);
        assert_eq!(split.odd, vec![1.0, 3.0]);
        assert!(!split.is_balanced());

        // Pairing drops the unmatched last sample
        assert_eq!(split.difference(), vec![-1.0, -1.0]);
        assert_eq!(split.sum(), vec![1.0, 5.0]);
        assert_eq!(split.paired_even(), vec![0.0, 2.0]);
    }

    #[test]
    fn test_average_up_down_sweep() {
        assert_eq!(average_up_down_sweep(&[1.0, 2.0, 3.0, 4.0], 1), vec![2.5, 2.5]);
    }

    #[test]
    fn test_average_up_down_sweep_odd_and_repeated() {
        // Middle sample of an odd-length sweep is dropped
        assert_eq!(average_up_down_sweep(&[1.0, 2.0, 9.0, 4.0, 5.0], 1), vec![3.0, 3.0]);

        let twice = average_up_down_sweep(&[0.0, 2.0, 4.0, 6.0, 8.0, 10.0, 12.0, 14.0], 2);
        assert_eq!(twice, vec![7.0, 7.0]);
    }

    #[test]
    fn test_symmetric_plus_antisymmetric_reconstructs_half() {
        let y = [3.0, -1.0, 4.0, 1.5, -5.0, 9.0, 2.0];
        let sym = symmetrize_signal_zero(&y, None).unwrap();
        let anti = anti_symmetrize_signal_zero(&y, None).unwrap();
        assert_eq!(sym.len(), 3);
        let sum: Vec<f64> = sym.iter().zip(&anti).map(|(s, a)| s + a).collect();
        assert_close(&sum, &y[..3]);
    }

    #[test]
    fn test_symmetrize_zero_explicit_center() {
        let y = [1.0, 2.0, 3.0, 10.0, 5.0, 6.0];
        // center 2: pairs (0,4) and (1,3)
        let sym = symmetrize_signal_zero(&y, Some(2)).unwrap();
        assert_close(&sym, &[3.0, 6.0]);
        let anti = anti_symmetrize_signal_zero(&y, Some(2)).unwrap();
        assert_close(&anti, &[-2.0, -4.0]);
    }

    #[test]
    fn test_symmetrize_zero_even_length_without_center() {
        let err = symmetrize_signal_zero(&[1.0, 2.0, 3.0, 4.0], None).unwrap_err();
        assert_eq!(err, SignalError::EvenLengthWithoutCenter { len: 4 });
        assert_eq!(err.kind(), ErrorKind::NumericDegeneracy);
    }

    #[test]
    fn test_symmetrize_zero_center_out_of_range() {
        let err = anti_symmetrize_signal_zero(&[1.0, 2.0, 3.0, 4.0], Some(2)).unwrap_err();
        assert_eq!(err, SignalError::CenterOutOfRange { center: 2, len: 4 });
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_symmetrize_signal_step() {
        let y = [1.0, 2.0, 3.0, 4.0, 5.0];
        let base = (y[0] + y[2]) / 2.0;
        let expected: Vec<f64> = (0..3).map(|i| (y[i] + y[i + 2]) / 2.0 - base).collect();
        assert_close(&symmetrize_signal(&y, 2).unwrap(), &expected);
        assert_close(&expected, &[0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_anti_symmetrize_signal_step() {
        let y = [0.0, 1.0, 0.0, -1.0, 0.0, 1.0];
        // Antisymmetric under a shift of two samples
        let anti = anti_symmetrize_signal(&y, 2).unwrap();
        assert_close(&anti, &[0.0, 1.0, 0.0, -1.0]);
        let sym = symmetrize_signal(&y, 2).unwrap();
        assert_close(&sym, &[0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_symmetrize_signal_step_out_of_range() {
        let err = symmetrize_signal(&[1.0, 2.0], 2).unwrap_err();
        assert_eq!(err, SignalError::ShiftOutOfRange { step: 2, len: 2 });
    }

    #[test]
    fn test_symmetrize_up_down() {
        // up = [1, 2, 3, 4], down (reversed second half) = [10, 20, 30, 40]
        let y = [1.0, 2.0, 3.0, 4.0, 40.0, 30.0, 20.0, 10.0];
        let sym = symmetrize_signal_up_down(&y, 2).unwrap();
        assert_close(&sym, &[(1.0 + 30.0) / 2.0, (2.0 + 40.0) / 2.0, 2.0, 3.0]);
        let anti = anti_symmetrize_signal_up_down(&y, 2).unwrap();
        assert_close(&anti, &[(1.0 - 30.0) / 2.0, (2.0 - 40.0) / 2.0, 1.0, 1.0]);
    }

    #[test]
    fn test_symmetrize_up_down_step_too_large() {
        let y = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert!(symmetrize_signal_up_down(&y, 2).is_err());
        assert!(anti_symmetrize_signal_up_down(&y, 0).is_err());
    }

    #[test]
    fn test_nearest_index() {
        let x = [-2.0, -1.0, 0.1, 1.0, 2.0];
        assert_eq!(nearest_index(&x, 0.0), Some(2));
        assert_eq!(nearest_index(&x, 1.7), Some(4));
        assert_eq!(nearest_index(&[], 1.0), None);
    }

    #[test]
    fn test_statistics() {
        let stats = statistics(&[2.0, -1.0, 5.0]).unwrap();
        assert_eq!(stats.len, 3);
        assert_eq!(stats.min, -1.0);
        assert_eq!(stats.max, 5.0);
        assert!((stats.mean - 2.0).abs() < 1e-12);
        assert_eq!(statistics(&[]), Err(SignalError::Empty));
    }

    #[test]
    fn test_trapezoid_integral() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [0.0, 1.0, 2.0, 3.0];
        assert!((trapezoid_integral(&x, &y) - 4.5).abs() < 1e-12);
    }
}
