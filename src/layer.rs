use crate::activator::Activator;
use crate::error::{Error, Result};

use ndarray::linalg::general_mat_vec_mul;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, Zip};
use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use serde_derive::{Deserialize, Serialize};

/// A wrapper for a single fully connected layer of the neural network
///
/// This performs efficient network updates by storing the weights for every
/// neuron as a single Matrix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLayer")]
pub struct Layer {
    /// The activation function to be used for every neuron in the layer.
    activator: Activator,
    /// The network weights, with each neuron's weights stored as a column.
    weights: Array2<f64>,
    /// One bias per neuron.
    bias: Array1<f64>,
}

impl Layer {
    /// Initializes a new, untrained layer.
    ///
    /// Arguments:
    ///
    ///  * `inputs` - the number of inputs to this layer.
    ///  * `outputs` - the number of outputs from this layer.
    ///  * `activator` - the activation function to be used for this layer's
    ///                  output.
    pub fn new(inputs: usize, outputs: usize, activator: Activator) -> Self {
        Self::with_rng(inputs, outputs, activator, &mut rand::thread_rng())
    }

    /// Like [`Layer::new`], drawing the initial parameters from `rng`.
    pub fn with_rng<R: Rng + ?Sized>(
        inputs: usize,
        outputs: usize,
        activator: Activator,
        rng: &mut R,
    ) -> Self {
        let mut layer = Layer {
            activator,
            weights: Array2::zeros((inputs, outputs)),
            bias: Array1::zeros(outputs),
        };
        layer.randomise(rng);
        layer
    }

    /// Assembles a layer from existing parameters.
    ///
    /// `weights` is indexed `[input, output]` and must have one column per
    /// entry of `bias`.
    pub fn from_parts(
        weights: Array2<f64>,
        bias: Array1<f64>,
        activator: Activator,
    ) -> Result<Self> {
        if weights.nrows() == 0 || weights.ncols() == 0 {
            return Err(Error::Config(format!(
                "layer must have inputs and outputs, got {}x{} weights",
                weights.nrows(),
                weights.ncols()
            )));
        }
        if bias.len() != weights.ncols() {
            return Err(Error::Config(format!(
                "{} biases for {} outputs",
                bias.len(),
                weights.ncols()
            )));
        }
        Ok(Layer {
            activator,
            weights,
            bias,
        })
    }

    /// Returns the number of inputs to this layer.
    pub fn input_len(&self) -> usize {
        self.weights.nrows()
    }

    /// Returns the number of outputs from this layer.
    pub fn output_len(&self) -> usize {
        self.weights.ncols()
    }

    /// Returns the activation function applied to this layer's output.
    pub fn activator(&self) -> Activator {
        self.activator
    }

    /// The weight matrix, indexed `[input, output]`.
    pub fn weights(&self) -> ArrayView2<'_, f64> {
        self.weights.view()
    }

    /// The bias vector, one entry per output.
    pub fn bias(&self) -> ArrayView1<'_, f64> {
        self.bias.view()
    }

    /// Feeds the provided `input` forward through the layer.
    ///
    /// When `keep_probability` is below one, every output is independently
    /// zeroed with probability `1 - keep_probability`. Surviving outputs are
    /// not rescaled.
    pub fn forward<'o>(
        &self,
        input: &[f64],
        output: &'o mut [f64],
        keep_probability: f64,
    ) -> &'o mut [f64] {
        assert_eq!(input.len(), self.input_len());
        assert_eq!(output.len(), self.output_len());
        {
            let mut z = ArrayViewMut1::from(&mut *output);
            z.assign(&self.bias);
            general_mat_vec_mul(1.0, &self.weights.t(), &ArrayView1::from(input), 1.0, &mut z);
        }
        self.activator.activate(output);
        if keep_probability < 1.0 {
            let mut rng = rand::thread_rng();
            for y in output.iter_mut() {
                if rng.gen::<f64>() >= keep_probability {
                    *y = 0.0;
                }
            }
        }
        output
    }

    /// Feeds `gradient`, the error gradient with respect to this layer's
    /// `output`, backwards through the layer and updates its parameters.
    ///
    /// On return `gradient` holds the gradient with respect to the affine
    /// output. If `upstream` is provided it receives the gradient with respect
    /// to `input`, computed from the weights before they are updated. Each
    /// weight then moves by `learning_rate * input[i] * gradient[j] * scale`
    /// and each bias by `learning_rate * gradient[j] * scale`, so descent
    /// needs a negative `learning_rate`.
    pub fn backward(
        &mut self,
        input: &[f64],
        gradient: &mut [f64],
        learning_rate: f64,
        upstream: Option<&mut [f64]>,
        output: &[f64],
        scale: f64,
    ) {
        assert_eq!(input.len(), self.input_len());
        assert_eq!(output.len(), self.output_len());
        assert_eq!(gradient.len(), self.output_len());
        self.activator.backprop(output, gradient);

        let gradient = ArrayView1::from(&*gradient);
        if let Some(upstream) = upstream {
            assert_eq!(upstream.len(), self.input_len());
            upstream.fill(0.0);
            general_mat_vec_mul(
                1.0,
                &self.weights,
                &gradient,
                0.0,
                &mut ArrayViewMut1::from(upstream),
            );
        }

        let rate = learning_rate * scale;
        Zip::from(self.weights.rows_mut())
            .and(&ArrayView1::from(input))
            .for_each(|mut row, &x| row.scaled_add(rate * x, &gradient));
        self.bias.scaled_add(rate, &gradient);
    }

    pub(crate) fn set_activator(&mut self, activator: Activator) {
        self.activator = activator;
    }

    pub(crate) fn set_weight(&mut self, input: usize, output: usize, value: f64) {
        self.weights[[input, output]] = value;
    }

    pub(crate) fn set_bias(&mut self, output: usize, value: f64) {
        self.bias[output] = value;
    }

    /// Redraws every weight and bias uniformly from `[-m, m]`, where
    /// `m = 1 / sqrt(inputs)`.
    pub(crate) fn randomise<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let m = 1.0 / (self.input_len() as f64).sqrt();
        let range = Uniform::new_inclusive(-m, m);
        self.weights.mapv_inplace(|_| range.sample(rng));
        self.bias.mapv_inplace(|_| range.sample(rng));
    }

    /// Multiplies every weight and bias by `factor`.
    pub(crate) fn scale(&mut self, factor: f64) {
        self.weights *= factor;
        self.bias *= factor;
    }
}

/// The serialized form of a `Layer`, checked before it becomes one.
#[derive(Deserialize)]
struct RawLayer {
    activator: Activator,
    weights: Array2<f64>,
    bias: Array1<f64>,
}

impl TryFrom<RawLayer> for Layer {
    type Error = Error;

    fn try_from(raw: RawLayer) -> Result<Self> {
        Layer::from_parts(raw.weights, raw.bias, raw.activator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fixed() -> Layer {
        let mut layer = Layer::new(2, 3, Activator::Identity);
        for i in 0..2 {
            for j in 0..3 {
                layer.set_weight(i, j, (i * 3 + j) as f64);
            }
        }
        for j in 0..3 {
            layer.set_bias(j, 0.5 * j as f64);
        }
        layer
    }

    #[test]
    fn initial_parameters_are_bounded() {
        let mut rng = StdRng::seed_from_u64(7);
        let layer = Layer::with_rng(16, 4, Activator::TanH, &mut rng);
        assert_eq!(layer.input_len(), 16);
        assert_eq!(layer.output_len(), 4);
        assert_eq!(layer.bias().len(), 4);
        let m = 0.25;
        assert!(layer.weights().iter().all(|w| w.abs() <= m));
        assert!(layer.bias().iter().all(|b| b.abs() <= m));
        assert!(layer.weights().iter().any(|w| *w != 0.0));
    }

    #[test]
    fn forward_is_affine_then_activation() {
        let layer = fixed();
        let mut out = [0.0; 3];
        layer.forward(&[1.0, 2.0], &mut out, 1.0);
        // column j: w[0][j] * 1 + w[1][j] * 2 + b[j]
        assert_eq!(out, [6.0, 9.5, 13.0]);
    }

    #[test]
    fn forward_overwrites_stale_output() {
        let layer = fixed();
        let mut out = [100.0; 3];
        layer.forward(&[1.0, 2.0], &mut out, 1.0);
        assert_eq!(out, [6.0, 9.5, 13.0]);
    }

    #[test]
    fn dropout_zeroes_without_rescaling() {
        let layer = fixed();
        let mut out = [0.0; 3];
        for _ in 0..50 {
            layer.forward(&[1.0, 2.0], &mut out, 0.5);
            for (y, expected) in out.iter().zip([6.0, 9.5, 13.0].iter()) {
                assert!(*y == 0.0 || y == expected);
            }
        }
        layer.forward(&[1.0, 2.0], &mut out, 0.0);
        assert_eq!(out, [0.0; 3]);
    }

    #[test]
    fn backward_propagates_before_updating() {
        let mut layer = fixed();
        let before = layer.clone();
        let input = [1.0, 2.0];
        let output = [6.0, 9.5, 13.0];
        let mut gradient = [1.0, 0.0, -1.0];
        let mut upstream = [7.0, 7.0];
        layer.backward(&input, &mut gradient, -0.1, Some(&mut upstream), &output, 1.0);

        // W . g with the original weights: rows are [0, 1, 2] and [3, 4, 5].
        assert_eq!(upstream, [-2.0, -2.0]);
        for i in 0..2 {
            for j in 0..3 {
                let expected = before.weights()[[i, j]] - 0.1 * input[i] * [1.0, 0.0, -1.0][j];
                assert!((layer.weights()[[i, j]] - expected).abs() < 1e-12);
            }
        }
        assert!((layer.bias()[0] - (0.0 - 0.1)).abs() < 1e-12);
        assert!((layer.bias()[1] - 0.5).abs() < 1e-12);
        assert!((layer.bias()[2] - (1.0 + 0.1)).abs() < 1e-12);
    }

    #[test]
    fn backward_scale_multiplies_the_step() {
        let mut full = fixed();
        let mut half = fixed();
        let output = [6.0, 9.5, 13.0];
        full.backward(&[1.0, 2.0], &mut [1.0, 1.0, 1.0], -0.2, None, &output, 1.0);
        half.backward(&[1.0, 2.0], &mut [1.0, 1.0, 1.0], -0.4, None, &output, 0.5);
        assert_eq!(full, half);
    }

    #[test]
    fn scale_multiplies_weights_and_bias() {
        let mut layer = fixed();
        layer.scale(0.5);
        assert_eq!(layer.weights()[[1, 2]], 2.5);
        assert_eq!(layer.bias()[2], 0.5);
    }

    #[test]
    fn from_parts_checks_shapes() {
        let layer = Layer::from_parts(
            Array2::from_elem((2, 3), 0.5),
            Array1::zeros(3),
            Activator::TanH,
        )
        .unwrap();
        assert_eq!(layer.input_len(), 2);
        assert_eq!(layer.output_len(), 3);
        assert_eq!(layer.weights()[[1, 2]], 0.5);

        assert!(matches!(
            Layer::from_parts(Array2::zeros((2, 3)), Array1::zeros(2), Activator::TanH),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Layer::from_parts(Array2::zeros((0, 3)), Array1::zeros(3), Activator::TanH),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn deserialize_rejects_mismatched_bias() {
        let layer = fixed();
        let mut value = serde_json::to_value(&layer).unwrap();
        value["bias"]["dim"] = serde_json::json!([2]);
        value["bias"]["data"].as_array_mut().unwrap().pop();
        assert!(serde_json::from_value::<Layer>(value).is_err());

        let json = serde_json::to_string(&layer).unwrap();
        assert_eq!(serde_json::from_str::<Layer>(&json).unwrap(), layer);
    }

    #[test]
    #[should_panic]
    fn input_size_mismatch_panics() {
        let layer = fixed();
        layer.forward(&[1.0], &mut [0.0; 3], 1.0);
    }
}
