use crate::network::Network;

/// A reusable, forward-only evaluation context for a `Network`.
///
/// The invoker owns one output buffer per layer, allocated once and reused on
/// every call. A single invoker cannot serve two evaluations at once; give
/// each thread its own, they all borrow the same network.
#[derive(Debug)]
pub struct Invoker<'a> {
    network: &'a Network,
    outputs: Vec<Vec<f64>>,
}

impl<'a> Invoker<'a> {
    /// Creates an invoker with its own activation buffers for `network`.
    pub fn new(network: &'a Network) -> Self {
        Invoker {
            network,
            outputs: network.output_buffers(),
        }
    }

    /// The network being evaluated.
    pub fn network(&self) -> &'a Network {
        self.network
    }

    /// Feeds the provided `input` through the network, returning the output
    /// layer. Dropout is never applied.
    pub fn invoke(&mut self, input: &[f64]) -> &[f64] {
        self.network.feed_forward(input, &mut self.outputs, |_| 1.0);
        &self.outputs[self.outputs.len() - 1]
    }
}
