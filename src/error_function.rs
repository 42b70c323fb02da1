//! Error (loss) function types.

use itertools::multizip;
use serde_derive::{Deserialize, Serialize};

/// The error function minimized during training.
///
/// `CrossEntropy` is meant to sit on top of an [`Activator::Softmax`] output
/// layer. Its derivative is the combined softmax and cross entropy gradient
/// `output - target`, and softmax contributes a derivative of one, so the
/// pair cancels by construction. Other pairings are accepted but train
/// against the wrong gradient.
///
/// [`Activator::Softmax`]: crate::activator::Activator::Softmax
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorFunction {
    /// `-sum(t * ln(y))`, with `0 * ln(0)` taken as zero
    CrossEntropy,
    /// `sum((y - t)^2) / 2`
    HalfSquaredDifference,
}

impl Default for ErrorFunction {
    fn default() -> Self {
        ErrorFunction::HalfSquaredDifference
    }
}

impl ErrorFunction {
    /// Returns the total error of `current` against `target`.
    pub fn value(&self, target: &[f64], current: &[f64]) -> f64 {
        assert_eq!(target.len(), current.len());
        let pointwise = |(t, y): (&f64, &f64)| match *self {
            ErrorFunction::CrossEntropy => if *t == 0.0 { 0.0 } else { -t * y.ln() },
            ErrorFunction::HalfSquaredDifference => 0.5 * (y - t) * (y - t),
        };
        target.iter().zip(current.iter()).map(pointwise).sum()
    }

    /// Writes the gradient to back-propagate from each element of `current`
    /// into `out`.
    ///
    /// For `HalfSquaredDifference` this is the derivative of the error with
    /// respect to `current`. For `CrossEntropy` it is already the gradient
    /// with respect to the softmax inputs.
    pub fn derivative(&self, target: &[f64], current: &[f64], out: &mut [f64]) {
        assert_eq!(target.len(), current.len());
        assert_eq!(target.len(), out.len());
        // Both functions share `y - t`; cross entropy relies on the softmax
        // derivative being one.
        for (t, y, d) in multizip((target.iter(), current.iter(), out.iter_mut())) {
            *d = y - t;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_squared_difference() {
        let f = ErrorFunction::HalfSquaredDifference;
        assert!((f.value(&[0.01, 0.99], &[0.75136507, 0.772928465]) - 0.298371109).abs() < 1e-8);
        let mut d = [0.0; 2];
        f.derivative(&[1.0, 0.0], &[0.25, 0.5], &mut d);
        assert_eq!(d, [-0.75, 0.5]);
    }

    #[test]
    fn cross_entropy() {
        let f = ErrorFunction::CrossEntropy;
        let value = f.value(&[0.0, 1.0], &[0.5, 0.25]);
        assert!((value - 4f64.ln()).abs() < 1e-12);
        let mut d = [0.0; 2];
        f.derivative(&[0.0, 1.0], &[0.5, 0.25], &mut d);
        assert_eq!(d, [0.5, -0.75]);
    }

    #[test]
    fn cross_entropy_of_saturated_output() {
        let f = ErrorFunction::CrossEntropy;
        assert_eq!(f.value(&[1.0, 0.0], &[1.0, 0.0]), 0.0);
        let mut d = [0.0; 2];
        f.derivative(&[1.0, 0.0], &[1.0, 0.0], &mut d);
        assert_eq!(d, [0.0, 0.0]);
    }

    #[test]
    fn half_squared_difference_matches_difference_quotient() {
        let f = ErrorFunction::HalfSquaredDifference;
        let target = [0.2, 0.3, 0.5];
        let current = [0.4, 0.35, 0.25];
        let h = 1e-7;
        let mut d = [0.0; 3];
        f.derivative(&target, &current, &mut d);
        for j in 0..3 {
            let mut up = current;
            let mut down = current;
            up[j] += h;
            down[j] -= h;
            let numeric = (f.value(&target, &up) - f.value(&target, &down)) / (2.0 * h);
            assert!((d[j] - numeric).abs() < 1e-5);
        }
    }
}
