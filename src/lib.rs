//! A small feed-forward neural network engine.
//!
//! Networks are built with a [`Builder`], evaluated with an [`Invoker`],
//! trained in place by a [`Trainer`] and stored with the versioned binary
//! format in [`persistence`].
//!
//! # Example
//!
//! Let's train a simple neural network to compute the OR function:
//!
//! ```
//! use ffnet::{Activator, Builder, Invoker, StopCondition, Trainer};
//!
//! // Create examples of the OR function
//! let examples = [([0.0, 0.0], [0.0]),
//!                 ([0.0, 1.0], [1.0]),
//!                 ([1.0, 0.0], [1.0]),
//!                 ([1.0, 1.0], [1.0])];
//!
//! let mut network = Builder::new(2, &[4, 1])
//!     .activator(0, Activator::TanH)
//!     .activator(1, Activator::Sigmoid)
//!     .seed(3)
//!     .build()
//!     .unwrap();
//! Trainer::new(&mut network)
//!     .learning_rate(0.3)
//!     .fit(&examples[..], StopCondition::Iterations(5000));
//!
//! let mut invoker = Invoker::new(&network);
//! for (input, expected) in examples.iter() {
//!     let output = invoker.invoke(input);
//!     assert_eq!(output[0] > 0.5, expected[0] > 0.5);
//! }
//! ```

pub mod activator;
pub mod error;
pub mod error_function;
pub mod invoker;
pub mod layer;
pub mod network;
pub mod persistence;
pub mod stream;
pub mod trainer;

pub use crate::activator::Activator;
pub use crate::error::{Error, Result};
pub use crate::error_function::ErrorFunction;
pub use crate::invoker::Invoker;
pub use crate::layer::Layer;
pub use crate::network::{Builder, Network};
pub use crate::trainer::{StopCondition, Summary, Trainer};
