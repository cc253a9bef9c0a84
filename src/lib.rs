//! A feed-forward neural network that classifies 28x28 greyscale handwritten digits.
//!
//! The network is a stack of sigmoid [`Layer`]s joined by fully connected [`Connection`]s. It is
//! trained with mini-batch gradient steps on a cross-entropy style loss and scored by accuracy.
//! The [`mnist`] module loads the standard gzipped MNIST files.

pub mod activation;
pub mod connection;
pub mod error;
pub mod layer;
pub mod mnist;
pub mod network;
mod persist;

pub use connection::Connection;
pub use error::{NetworkError, Result};
pub use layer::Layer;
pub use network::{Gradients, INPUT_SIZE, Network, OUTPUT_SIZE, argmax};
