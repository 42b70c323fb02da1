//! Utilities for training neural networks.

use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, info, warn};

use crate::activator::Activator;
use crate::error_function::ErrorFunction;
use crate::network::Network;

/// Weight-update scale applied to every layer after the first while dropout
/// is enabled. The same value is used as the keep probability of the hidden
/// layers during the forward pass.
pub const DROPOUT_FACTOR: f64 = 0.5;

/// Trains a `Network` in place using online gradient descent.
///
/// The trainer borrows its network mutably for as long as it lives, so no
/// [`Invoker`](crate::Invoker) can read the network halfway through a
/// `train()` call. Scratch buffers are sized once from the network topology
/// and reused by every call.
#[derive(Debug)]
pub struct Trainer<'a> {
    network: &'a mut Network,
    error: ErrorFunction,
    learning_rate: f64,
    log_interval: usize,
    /// Activations of every layer from the latest forward pass.
    outputs: Vec<Vec<f64>>,
    /// `gradients[0]` holds the network input; `gradients[k + 1]` holds the
    /// error gradient at the output of layer `k`.
    gradients: Vec<Vec<f64>>,
}

impl<'a> Trainer<'a> {
    /// Creates a new Trainer instance.
    ///
    /// The trainer is initialized with some default values. These defaults are:
    ///
    /// * The half squared difference error function.
    /// * A learning rate of 0.1.
    /// * No per-epoch logging in [`Trainer::fit`].
    pub fn new(network: &'a mut Network) -> Self {
        let outputs = network.output_buffers();
        let mut gradients = Vec::with_capacity(network.depth() + 1);
        gradients.push(vec![0.0; network.input_len()]);
        gradients.extend(network.output_buffers());
        Trainer {
            network,
            error: ErrorFunction::default(),
            learning_rate: 0.1,
            log_interval: 0,
            outputs,
            gradients,
        }
    }

    /// Sets the error function to minimize.
    pub fn error_function(mut self, error: ErrorFunction) -> Self {
        let last = self.network.layer(self.network.depth() - 1).activator();
        if error == ErrorFunction::CrossEntropy && last != Activator::Softmax {
            warn!(
                output_activator = %last,
                "cross entropy is only meaningful on a softmax output layer"
            );
        } else if error != ErrorFunction::CrossEntropy && !last.is_single_folded() {
            warn!(
                output_activator = %last,
                error_function = ?error,
                "this output layer is only trained correctly with cross entropy"
            );
        }
        self.error = error;
        self
    }

    /// Sets the learning rate to use during gradient descent.
    pub fn learning_rate(mut self, rate: f64) -> Self {
        self.learning_rate = rate;
        self
    }

    /// Logs the epoch error every `n` epochs of [`Trainer::fit`]. Zero
    /// disables the per-epoch log.
    pub fn log_interval(mut self, n: usize) -> Self {
        self.log_interval = n;
        self
    }

    /// The network being trained.
    pub fn network(&self) -> &Network {
        &*self.network
    }

    /// Returns the configured error of `current` against `target`.
    pub fn error(&self, target: &[f64], current: &[f64]) -> f64 {
        self.error.value(target, current)
    }

    /// The weight-update scale for layer `k`.
    pub fn dropout_factor(&self, k: usize) -> f64 {
        if self.network.dropout() && k > 0 {
            DROPOUT_FACTOR
        } else {
            1.0
        }
    }

    /// Runs one forward and backward pass for a single training pair and
    /// updates every layer.
    ///
    /// Layers are updated from the last to the first. Each layer propagates
    /// its gradient with its weights from before the update, and every
    /// update uses the activations cached by this call's forward pass.
    ///
    /// Returns the error of the network output before the update.
    pub fn train(&mut self, input: &[f64], target: &[f64]) -> f64 {
        assert_eq!(target.len(), self.network.output_len());
        let depth = self.network.depth();
        let dropout = self.network.dropout();
        self.network.feed_forward(input, &mut self.outputs, |k| {
            if dropout && k + 1 < depth {
                DROPOUT_FACTOR
            } else {
                1.0
            }
        });

        let output = &self.outputs[depth - 1];
        let error = self.error.value(target, output);
        self.error.derivative(target, output, &mut self.gradients[depth]);
        self.gradients[0].copy_from_slice(input);

        for k in (0..depth).rev() {
            let scale = self.dropout_factor(k);
            let (before, after) = self.gradients.split_at_mut(k + 1);
            let (layer_input, upstream) = if k == 0 {
                (&before[0][..], None)
            } else {
                (&self.outputs[k - 1][..], Some(&mut before[k][..]))
            };
            self.network.layer_mut(k).backward(
                layer_input,
                &mut after[0],
                -self.learning_rate,
                upstream,
                &self.outputs[k],
                scale,
            );
        }
        error
    }

    /// Trains on each `(inputs[i], targets[i])` pair in order. Later pairs see
    /// the updates made by earlier ones.
    ///
    /// Returns the sum of the pre-update errors.
    pub fn train_batch<I, O>(&mut self, inputs: &[I], targets: &[O]) -> f64
    where
        I: AsRef<[f64]>,
        O: AsRef<[f64]>,
    {
        assert_eq!(inputs.len(), targets.len());
        inputs
            .iter()
            .zip(targets)
            .map(|(input, target)| self.train(input.as_ref(), target.as_ref()))
            .sum()
    }

    /// Trains on the labelled `examples` epoch after epoch until `condition`
    /// holds.
    ///
    /// The provided `examples` should be a list of labelled data, where each
    /// element takes the form `(network input, expected output)`.
    pub fn fit<I, O, C>(&mut self, examples: &[(I, O)], condition: C) -> Summary
    where
        I: AsRef<[f64]>,
        O: AsRef<[f64]>,
        C: Into<StopCondition>,
    {
        let condition = condition.into();
        let start_time = Instant::now();
        let mut summary = Summary {
            epochs: 0,
            error: f64::NAN,
            elapsed: Duration::default(),
        };
        if examples.is_empty() {
            warn!("no training examples provided");
            return summary;
        }

        loop {
            let mut total = 0.0;
            for (input, expected) in examples {
                total += self.train(input.as_ref(), expected.as_ref());
            }
            summary.epochs += 1;
            summary.error = total / examples.len() as f64;

            if self.log_interval > 0 && summary.epochs % self.log_interval == 0 {
                debug!(epoch = summary.epochs, error = summary.error, "training");
            }
            if condition.should_stop(summary.epochs, summary.error, start_time) {
                break;
            }
        }
        summary.elapsed = start_time.elapsed();
        info!(
            epochs = summary.epochs,
            error = summary.error,
            seconds = summary.elapsed.as_secs_f64(),
            "training finished"
        );
        summary
    }

    /// Scales every layer after the first by its dropout factor, so a network
    /// trained with dropout can be evaluated without it. Does nothing when
    /// dropout is disabled.
    pub fn compensate_dropout(&mut self) {
        for k in 1..self.network.depth() {
            let factor = self.dropout_factor(k);
            if factor != 1.0 {
                self.network.scale(k, factor);
            }
        }
    }

    /// Redraws every weight and bias of the network from `rng`.
    pub fn reinitialise<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for k in 0..self.network.depth() {
            self.network.randomise(k, rng);
        }
    }
}

/// The outcome of [`Trainer::fit`].
#[derive(Copy, Clone, Debug)]
pub struct Summary {
    /// Number of passes over the examples.
    pub epochs: usize,
    /// Mean error per example over the last epoch.
    pub error: f64,
    pub elapsed: Duration,
}

/// When to stop training
#[derive(Copy, Clone, Debug)]
pub enum StopCondition {
    /// Stops after the provided number of training epochs
    Iterations(usize),
    /// Stops when the mean epoch error drops below the provided threshold
    ErrorThreshold(f64),
    /// Stops after the provided duration
    Duration(Duration),
    /// Stops when the mean epoch error drops below `error`, or after `epochs`
    /// epochs, whichever comes first
    Bounded { epochs: usize, error: f64 },
}

impl From<Duration> for StopCondition {
    fn from(duration: Duration) -> StopCondition {
        StopCondition::Duration(duration)
    }
}

impl StopCondition {
    /// Returns true if training is complete.
    fn should_stop(&self, epoch: usize, training_error: f64, start_time: Instant) -> bool {
        match *self {
            StopCondition::Iterations(epochs) => epoch >= epochs,
            StopCondition::ErrorThreshold(threshold) => training_error < threshold,
            StopCondition::Duration(duration) => start_time.elapsed() >= duration,
            StopCondition::Bounded { epochs, error } => epoch >= epochs || training_error < error,
        }
    }
}
