use crate::error::{NetworkError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The activations of every neuron at one depth of the network.
///
/// The length is fixed when the layer is created. Values are overwritten in place on every forward
/// pass but the layer is never resized.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Layer {
    values: Array1<f64>,
}

impl Layer {
    /// Creates a layer of `len` neurons, all with activation 0.0.
    pub fn new(len: usize) -> Layer {
        Layer {
            values: Array1::zeros(len),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get_values(&self) -> &Array1<f64> {
        &self.values
    }

    /// Replaces all activations at once. The new vector must have exactly the layer's length.
    pub fn set_values(&mut self, values: Array1<f64>) -> Result<()> {
        if values.len() != self.values.len() {
            return Err(NetworkError::shape(
                "layer values",
                &[self.values.len()],
                &[values.len()],
            ));
        }
        self.values = values;
        Ok(())
    }

    pub fn value_at(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    // Only for in-place `assign` from the forward pass. The vector must never be replaced.
    pub(crate) fn values_mut(&mut self) -> &mut Array1<f64> {
        &mut self.values
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Layer({})", self.len())
    }
}
