//! A [Feedforward neural network]
//! (https://en.wikipedia.org/wiki/Feedforward_neural_network).
//!
//! # Example
//!
//! ```
//! # use ffnet::{Activator, Builder, Invoker};
//! let network = Builder::new(2, &[3, 1])
//!     .activators(Activator::Sigmoid)
//!     .bias(1, 0, 0.25)
//!     .build()
//!     .unwrap();
//! assert_eq!(network.depth(), 2);
//! assert_eq!(network.width(), 3);
//!
//! let mut invoker = Invoker::new(&network);
//! assert_eq!(invoker.invoke(&[0.5, -0.5]).len(), 1);
//! ```

use crate::activator::Activator;
use crate::error::{Error, Result};
use crate::layer::Layer;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_derive::{Deserialize, Serialize};

/// A Feedforward neural network
///
/// The topology is fixed once the network is built; only the weights and
/// biases change afterwards. Parameters are mutated through a
/// [`Trainer`](crate::Trainer), which borrows the network exclusively, so at
/// most one writer exists at a time and no reader sees a partial update.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "RawNetwork")]
pub struct Network {
    layers: Vec<Layer>,
    dropout: bool,
}

impl Network {
    /// Creates a new, untrained neural network.
    ///
    /// Arguments:
    ///  * `inputs` - the number of inputs to the network.
    ///  * `layers` - the number of neurons and the activation function of each
    ///               layer, in order.
    pub fn new(inputs: usize, layers: &[(usize, Activator)]) -> Result<Self> {
        Self::with_rng(inputs, layers, &mut rand::thread_rng())
    }

    /// Like [`Network::new`], drawing the initial parameters from `rng`.
    pub fn with_rng<R: Rng + ?Sized>(
        inputs: usize,
        layers: &[(usize, Activator)],
        rng: &mut R,
    ) -> Result<Self> {
        if inputs == 0 {
            return Err(Error::Config("network must have at least one input".into()));
        }
        let mut built = Vec::with_capacity(layers.len());
        let mut previous = inputs;
        for (k, &(outputs, activator)) in layers.iter().enumerate() {
            if outputs == 0 {
                return Err(Error::Config(format!("layer {} has no outputs", k)));
            }
            built.push(Layer::with_rng(previous, outputs, activator, rng));
            previous = outputs;
        }
        Self::from_layers(built)
    }

    /// Assembles a network from existing layers, checking that each layer
    /// consumes exactly what the previous one produces.
    pub fn from_layers(layers: Vec<Layer>) -> Result<Self> {
        if layers.is_empty() {
            return Err(Error::Config("network must have at least one layer".into()));
        }
        if layers[0].input_len() == 0 {
            return Err(Error::Config("network must have at least one input".into()));
        }
        for (k, pair) in layers.windows(2).enumerate() {
            if pair[0].output_len() != pair[1].input_len() {
                return Err(Error::Config(format!(
                    "layer {} produces {} outputs but layer {} expects {} inputs",
                    k,
                    pair[0].output_len(),
                    k + 1,
                    pair[1].input_len()
                )));
            }
        }
        Ok(Network {
            layers,
            dropout: false,
        })
    }

    /// Returns the number of layers.
    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    /// Returns the largest output count of any layer.
    pub fn width(&self) -> usize {
        self.layers.iter().map(Layer::output_len).max().unwrap_or(0)
    }

    /// Returns the size of the input layer to the network.
    pub fn input_len(&self) -> usize {
        self.layers[0].input_len()
    }

    /// Returns the size of the output layer from the network.
    pub fn output_len(&self) -> usize {
        self.layers[self.layers.len() - 1].output_len()
    }

    /// Returns every layer, input side first.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Returns layer `k`. Panics if `k >= depth()`.
    pub fn layer(&self, k: usize) -> &Layer {
        &self.layers[k]
    }

    /// Returns true if training applies dropout to the hidden layers.
    pub fn dropout(&self) -> bool {
        self.dropout
    }

    /// Returns one zeroed buffer per layer, sized to that layer's output.
    pub(crate) fn output_buffers(&self) -> Vec<Vec<f64>> {
        self.layers
            .iter()
            .map(|layer| vec![0.0; layer.output_len()])
            .collect()
    }

    /// Feeds `input` through every layer, leaving each layer's activations in
    /// `outputs`. `keep_probability(k)` gives the dropout keep probability
    /// for layer `k`.
    pub(crate) fn feed_forward<F>(
        &self,
        input: &[f64],
        outputs: &mut [Vec<f64>],
        keep_probability: F,
    ) where
        F: Fn(usize) -> f64,
    {
        assert_eq!(input.len(), self.input_len());
        assert_eq!(outputs.len(), self.depth());
        self.layers[0].forward(input, &mut outputs[0], keep_probability(0));
        for k in 1..self.layers.len() {
            let (before, after) = outputs.split_at_mut(k);
            self.layers[k].forward(&before[k - 1], &mut after[0], keep_probability(k));
        }
    }

    pub(crate) fn layer_mut(&mut self, k: usize) -> &mut Layer {
        &mut self.layers[k]
    }

    pub(crate) fn set_weight(&mut self, layer: usize, input: usize, output: usize, value: f64) {
        self.layers[layer].set_weight(input, output, value);
    }

    pub(crate) fn set_bias(&mut self, layer: usize, output: usize, value: f64) {
        self.layers[layer].set_bias(output, value);
    }

    pub(crate) fn set_activator(&mut self, layer: usize, activator: Activator) {
        self.layers[layer].set_activator(activator);
    }

    pub(crate) fn set_dropout(&mut self, dropout: bool) {
        self.dropout = dropout;
    }

    pub(crate) fn randomise<R: Rng + ?Sized>(&mut self, layer: usize, rng: &mut R) {
        self.layers[layer].randomise(rng);
    }

    /// Multiplies every weight and bias of `layer` by `factor`.
    pub(crate) fn scale(&mut self, layer: usize, factor: f64) {
        self.layers[layer].scale(factor);
    }
}

impl PartialEq for Network {
    fn eq(&self, other: &Self) -> bool {
        self.layers == other.layers
    }
}

/// Builds a new `Network`.
///
/// Parameter settings are applied after the random initialization, in the
/// order they were given. Index errors are reported by [`Builder::build`].
#[derive(Clone, Debug)]
pub struct Builder {
    inputs: usize,
    sizes: Vec<usize>,
    default_activator: Activator,
    activators: Vec<(usize, Activator)>,
    biases: Vec<(usize, usize, f64)>,
    weights: Vec<(usize, usize, usize, f64)>,
    dropout: bool,
    seed: Option<u64>,
}

impl Builder {
    /// Creates a new Builder instance.
    ///
    /// Arguments:
    ///  * `inputs` - the number of network inputs.
    ///  * `sizes` - the number of neurons in each layer.
    ///
    /// Every layer defaults to a sigmoid activation and dropout is off.
    pub fn new(inputs: usize, sizes: &[usize]) -> Self {
        Builder {
            inputs,
            sizes: sizes.into(),
            default_activator: Activator::Sigmoid,
            activators: Vec::new(),
            biases: Vec::new(),
            weights: Vec::new(),
            dropout: false,
            seed: None,
        }
    }

    /// Sets the activation function of a single layer.
    pub fn activator(mut self, layer: usize, activator: Activator) -> Self {
        self.activators.push((layer, activator));
        self
    }

    /// Sets the activation function of every layer, discarding earlier
    /// per-layer choices.
    pub fn activators(mut self, activator: Activator) -> Self {
        self.default_activator = activator;
        self.activators.clear();
        self
    }

    /// Sets the bias of neuron `output` in `layer`.
    pub fn bias(mut self, layer: usize, output: usize, value: f64) -> Self {
        self.biases.push((layer, output, value));
        self
    }

    /// Sets the weight from neuron `input` of the previous layer to neuron
    /// `output` of `layer`.
    pub fn weight(mut self, layer: usize, input: usize, output: usize, value: f64) -> Self {
        self.weights.push((layer, input, output, value));
        self
    }

    /// Enables or disables dropout during training.
    pub fn dropout(mut self, dropout: bool) -> Self {
        self.dropout = dropout;
        self
    }

    /// Seeds the random initialization, making the built network
    /// reproducible.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds the network, or returns an error if the topology or any
    /// parameter index is invalid.
    pub fn build(self) -> Result<Network> {
        let layers: Vec<(usize, Activator)> = self
            .sizes
            .iter()
            .map(|&size| (size, self.default_activator))
            .collect();
        let mut network = match self.seed {
            Some(seed) => Network::with_rng(self.inputs, &layers, &mut StdRng::seed_from_u64(seed))?,
            None => Network::new(self.inputs, &layers)?,
        };
        for &(layer, activator) in &self.activators {
            if layer >= network.depth() {
                return Err(Error::Config(format!(
                    "no layer {} to set activator {} on",
                    layer, activator
                )));
            }
            network.set_activator(layer, activator);
        }
        for &(layer, output, value) in &self.biases {
            if layer >= network.depth() || output >= network.layer(layer).output_len() {
                return Err(Error::Config(format!(
                    "no bias for neuron {} of layer {}",
                    output, layer
                )));
            }
            network.set_bias(layer, output, value);
        }
        for &(layer, input, output, value) in &self.weights {
            if layer >= network.depth()
                || input >= network.layer(layer).input_len()
                || output >= network.layer(layer).output_len()
            {
                return Err(Error::Config(format!(
                    "no weight from input {} to neuron {} of layer {}",
                    input, output, layer
                )));
            }
            network.set_weight(layer, input, output, value);
        }
        network.set_dropout(self.dropout);
        Ok(network)
    }
}

/// The serialized form of a `Network`, checked by [`Network::from_layers`].
#[derive(Deserialize)]
struct RawNetwork {
    layers: Vec<Layer>,
    dropout: bool,
}

impl TryFrom<RawNetwork> for Network {
    type Error = Error;

    fn try_from(raw: RawNetwork) -> Result<Self> {
        let mut network = Network::from_layers(raw.layers)?;
        network.dropout = raw.dropout;
        Ok(network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_few_layers() {
        assert!(matches!(Builder::new(2, &[]).build(), Err(Error::Config(_))));
    }

    #[test]
    fn empty_layer() {
        assert!(matches!(Builder::new(1, &[0, 1]).build(), Err(Error::Config(_))));
    }

    #[test]
    fn no_inputs() {
        assert!(matches!(Builder::new(0, &[1]).build(), Err(Error::Config(_))));
    }

    #[test]
    fn mismatched_layers() {
        let layers = vec![
            Layer::new(2, 3, Activator::TanH),
            Layer::new(4, 1, Activator::Sigmoid),
        ];
        assert!(matches!(Network::from_layers(layers), Err(Error::Config(_))));
    }

    #[test]
    fn out_of_range_settings() {
        assert!(Builder::new(2, &[2]).bias(0, 2, 1.0).build().is_err());
        assert!(Builder::new(2, &[2]).bias(1, 0, 1.0).build().is_err());
        assert!(Builder::new(2, &[2]).weight(0, 2, 0, 1.0).build().is_err());
        assert!(Builder::new(2, &[2]).weight(0, 0, 2, 1.0).build().is_err());
        assert!(Builder::new(2, &[2]).activator(1, Activator::TanH).build().is_err());
    }

    #[test]
    fn topology() {
        let network = Builder::new(3, &[5, 7, 2])
            .activator(2, Activator::Softmax)
            .build()
            .unwrap();
        assert_eq!(network.depth(), 3);
        assert_eq!(network.width(), 7);
        assert_eq!(network.input_len(), 3);
        assert_eq!(network.output_len(), 2);
        assert_eq!(network.layer(1).input_len(), 5);
        assert_eq!(network.layer(2).activator(), Activator::Softmax);
        assert_eq!(network.layer(0).activator(), Activator::Sigmoid);
        assert!(!network.dropout());
    }

    #[test]
    fn explicit_parameters() {
        let network = Builder::new(2, &[1])
            .weight(0, 1, 0, 0.75)
            .bias(0, 0, -0.5)
            .dropout(true)
            .build()
            .unwrap();
        assert_eq!(network.layer(0).weights()[[1, 0]], 0.75);
        assert_eq!(network.layer(0).bias()[0], -0.5);
        assert!(network.dropout());
    }

    #[test]
    fn seeded_builds_are_equal() {
        let a = Builder::new(4, &[3, 2]).seed(11).build().unwrap();
        let b = Builder::new(4, &[3, 2]).seed(11).build().unwrap();
        let c = Builder::new(4, &[3, 2]).seed(12).build().unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn equality_ignores_dropout_but_not_activator() {
        let a = Builder::new(2, &[2]).seed(3).build().unwrap();
        let mut b = a.clone();
        b.set_dropout(true);
        assert_eq!(a, b);
        let c = Builder::new(2, &[2]).activators(Activator::TanH).seed(3).build().unwrap();
        assert_eq!(a.layer(0).weights(), c.layer(0).weights());
        assert_ne!(a, c);
    }

    #[test]
    fn randomise_and_scale() {
        let mut network = Builder::new(2, &[2, 2]).seed(5).build().unwrap();
        let original = network.clone();
        network.scale(1, 2.0);
        assert_eq!(network.layer(0), original.layer(0));
        assert_eq!(network.layer(1).bias()[1], 2.0 * original.layer(1).bias()[1]);
        network.randomise(1, &mut StdRng::seed_from_u64(99));
        assert_ne!(network.layer(1), original.layer(1));
    }

    #[test]
    fn deserialize_validates_topology() {
        assert!(serde_json::from_str::<Network>(r#"{"layers":[],"dropout":false}"#).is_err());

        let network = Builder::new(2, &[3, 1]).seed(4).dropout(true).build().unwrap();
        let mut value = serde_json::to_value(&network).unwrap();
        let decoded: Network = serde_json::from_value(value.clone()).unwrap();
        assert!(decoded.dropout());
        value["layers"].as_array_mut().unwrap().reverse();
        assert!(serde_json::from_value::<Network>(value).is_err());
    }

    #[test]
    fn serde_round_trip() {
        let network = Builder::new(3, &[4, 2])
            .activator(1, Activator::Softmax)
            .seed(21)
            .build()
            .unwrap();
        let json = serde_json::to_string(&network).unwrap();
        let decoded: Network = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.layer(1).activator(), Activator::Softmax);
        assert_eq!(decoded.depth(), 2);
        assert!(!decoded.dropout());
        for (a, b) in network.layers().iter().zip(decoded.layers()) {
            for (x, y) in a.weights().iter().zip(b.weights().iter()) {
                assert!((x - y).abs() < 1e-12);
            }
        }
    }
}
