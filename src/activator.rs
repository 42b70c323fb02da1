//! Activation function types.

use std::fmt;
use std::str::FromStr;

use itertools::multizip;
use serde_derive::{Deserialize, Serialize};

use crate::error::Error;

/// [Activation function](https://en.wikipedia.org/wiki/Activation_function)
/// types.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Activator {
    /// Passes the affine output through unchanged.
    Identity,
    /// Rectified Linear Unit
    Rectifier,
    /// Sigmoid function
    Sigmoid,
    /// Normalizes the whole layer into a probability distribution.
    Softmax,
    /// Hyperbolic tan function
    TanH,
}

/// Every activator, in declaration order.
pub const ACTIVATORS: [Activator; 5] = [
    Activator::Identity,
    Activator::Rectifier,
    Activator::Sigmoid,
    Activator::Softmax,
    Activator::TanH,
];

impl Activator {
    /// The symbolic name written by the persistence codec.
    pub fn name(&self) -> &'static str {
        match *self {
            Activator::Identity => "IDENTITY",
            Activator::Rectifier => "RECTIFIER",
            Activator::Sigmoid => "SIGMOID",
            Activator::Softmax => "SOFTMAX",
            Activator::TanH => "TANH",
        }
    }

    /// Returns true if each output's derivative depends only on that output.
    ///
    /// Softmax couples every output of its layer. Its derivative is taken as
    /// one, which is only correct on an output layer trained with
    /// [`ErrorFunction::CrossEntropy`], whose derivative already carries the
    /// softmax term.
    ///
    /// [`ErrorFunction::CrossEntropy`]: crate::error_function::ErrorFunction::CrossEntropy
    pub fn is_single_folded(&self) -> bool {
        !matches!(*self, Activator::Softmax)
    }

    /// Evaluates `f(x)` for a single element.
    ///
    /// Softmax has no elementwise form; it yields `exp(x)` here and the
    /// normalization happens in [`Activator::activate`].
    pub fn f(&self, x: f64) -> f64 {
        match *self {
            Activator::Identity => x,
            Activator::Rectifier => if x > 0.0 { x } else { 0.0 },
            Activator::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activator::Softmax => x.exp(),
            Activator::TanH => 2.0 / (1.0 + (-2.0 * x).exp()) - 1.0,
        }
    }

    /// Evaluates the derivative `f'(x)`, where `x = f^{-1}(y)`.
    ///
    /// Note that this function takes in the *output* of the activation
    /// function, rather than the input. This is an optimization that means we
    /// don't have to store the intermediate results before activation.
    pub fn fprime(&self, y: f64) -> f64 {
        match *self {
            Activator::Identity | Activator::Softmax => 1.0,
            Activator::Rectifier => if y > 0.0 { 1.0 } else { 0.0 },
            Activator::Sigmoid => y * (1.0 - y),
            Activator::TanH => 1.0 - y * y,
        }
    }

    /// Replaces the pre-activation values in `values` with their activations.
    ///
    /// Softmax shifts by the largest value before exponentiating, so the sum
    /// of exponentials is at least one.
    pub fn activate(&self, values: &mut [f64]) {
        if let Activator::Softmax = *self {
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mut sum = 0.0;
            for v in values.iter_mut() {
                *v = self.f(*v - max);
                sum += *v;
            }
            for v in values.iter_mut() {
                *v /= sum;
            }
        } else {
            for v in values.iter_mut() {
                *v = self.f(*v);
            }
        }
    }

    /// Converts `errors`, the loss gradient with respect to this activator's
    /// `outputs`, into the gradient with respect to its inputs.
    pub fn backprop(&self, outputs: &[f64], errors: &mut [f64]) {
        assert_eq!(outputs.len(), errors.len());
        for (y, e) in multizip((outputs.iter(), errors.iter_mut())) {
            *e *= self.fprime(*y);
        }
    }
}

impl fmt::Display for Activator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Activator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ACTIVATORS
            .iter()
            .find(|a| a.name() == s)
            .copied()
            .ok_or_else(|| Error::UnsupportedFormat(format!("unknown activator {:?}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_sums_to_one() {
        let mut values = [0.3, -2.0, 5.5, 0.0, 1e-3];
        Activator::Softmax.activate(&mut values);
        let sum: f64 = values.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!(values.iter().all(|v| *v > 0.0));
    }

    #[test]
    fn elementwise_values() {
        assert_eq!(Activator::Identity.f(-3.5), -3.5);
        assert_eq!(Activator::Rectifier.f(-3.5), 0.0);
        assert_eq!(Activator::Rectifier.f(2.0), 2.0);
        assert!((Activator::Sigmoid.f(0.0) - 0.5).abs() < 1e-15);
        assert!((Activator::TanH.f(0.7) - 0.7f64.tanh()).abs() < 1e-12);
    }

    #[test]
    fn derivative_from_output() {
        let x = 0.42;
        let h = 1e-6;
        for a in [Activator::Identity, Activator::Sigmoid, Activator::TanH] {
            let numeric = (a.f(x + h) - a.f(x - h)) / (2.0 * h);
            assert!((a.fprime(a.f(x)) - numeric).abs() < 1e-6, "{}", a);
        }
        assert_eq!(Activator::Rectifier.fprime(0.0), 0.0);
        assert_eq!(Activator::Rectifier.fprime(0.1), 1.0);
    }

    #[test]
    fn softmax_saturates_without_overflow() {
        let mut values = [800.0, 0.0];
        Activator::Softmax.activate(&mut values);
        assert_eq!(values, [1.0, 0.0]);
    }

    #[test]
    fn softmax_backprop_passes_errors_through() {
        let mut outputs = [0.1, 0.7, -0.4];
        Activator::Softmax.activate(&mut outputs);
        let mut grad = [0.3, -1.0, 0.25];
        Activator::Softmax.backprop(&outputs, &mut grad);
        assert_eq!(grad, [0.3, -1.0, 0.25]);
    }

    #[test]
    fn only_softmax_is_not_single_folded() {
        for a in ACTIVATORS.iter() {
            assert_eq!(a.is_single_folded(), *a != Activator::Softmax);
        }
    }

    #[test]
    fn names_round_trip() {
        for a in ACTIVATORS.iter() {
            assert_eq!(a.name().parse::<Activator>().unwrap(), *a);
        }
        assert!(matches!(
            "LEAKY".parse::<Activator>(),
            Err(Error::UnsupportedFormat(_))
        ));
    }
}
