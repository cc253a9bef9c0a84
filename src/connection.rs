use crate::error::{NetworkError, Result};
use ndarray::{Array, Array1, Array2};
use ndarray_rand::{
    RandomExt,
    rand::Rng,
    rand_distr::Uniform,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The weights and biases linking one layer to the next.
///
/// Row `i` of the weight matrix and entry `i` of the bias vector both belong to neuron `i` of the
/// output layer, so the weights have shape `[output_len x input_len]`. The shape never changes
/// after construction: every setter checks it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Connection {
    weights: Array2<f64>,
    biases: Array1<f64>,
}

impl Connection {
    /// Creates the untrained connection between a layer of `input_len` neurons and one of
    /// `output_len` neurons, with every weight and bias drawn uniformly from [-1, 1].
    pub fn random<R: Rng + ?Sized>(input_len: usize, output_len: usize, rng: &mut R) -> Connection {
        let distribution = Uniform::new_inclusive(-1.0, 1.0);
        Connection {
            weights: Array::random_using((output_len, input_len), distribution, rng),
            biases: Array::random_using(output_len, distribution, rng),
        }
    }

    pub fn input_len(&self) -> usize {
        self.weights.ncols()
    }

    pub fn output_len(&self) -> usize {
        self.weights.nrows()
    }

    pub fn row_count(&self) -> usize {
        self.weights.nrows()
    }

    pub fn column_count(&self) -> usize {
        self.weights.ncols()
    }

    // Total number of weights. Only useful for summaries; the training maths never reads it.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    pub fn biases(&self) -> &Array1<f64> {
        &self.biases
    }

    pub fn set_weights(&mut self, weights: Array2<f64>) -> Result<()> {
        if weights.dim() != self.weights.dim() {
            return Err(NetworkError::shape(
                "connection weights",
                self.weights.shape(),
                weights.shape(),
            ));
        }
        self.weights = weights;
        Ok(())
    }

    pub fn set_biases(&mut self, biases: Array1<f64>) -> Result<()> {
        if biases.len() != self.biases.len() {
            return Err(NetworkError::shape(
                "connection biases",
                &[self.biases.len()],
                &[biases.len()],
            ));
        }
        self.biases = biases;
        Ok(())
    }

    pub fn weight_at(&self, row: usize, column: usize) -> Option<f64> {
        self.weights.get((row, column)).copied()
    }

    pub fn set_weight_at(&mut self, row: usize, column: usize, value: f64) -> Result<()> {
        let shape = [self.weights.nrows(), self.weights.ncols()];
        match self.weights.get_mut((row, column)) {
            Some(weight) => {
                *weight = value;
                Ok(())
            }
            None => Err(NetworkError::shape("weight index", &shape, &[row, column])),
        }
    }

    pub fn bias_at(&self, row: usize) -> Option<f64> {
        self.biases.get(row).copied()
    }

    // Weights and biases are only ever adjusted together by a training step, which has already
    // checked that the gradients match this connection's shape.
    pub(crate) fn parameters_mut(&mut self) -> (&mut Array2<f64>, &mut Array1<f64>) {
        (&mut self.weights, &mut self.biases)
    }

    // A connection read back from a snapshot can have any shape, so make sure the biases still line
    // up with the weight rows.
    pub(crate) fn check_consistent(&self) -> Result<()> {
        if self.biases.len() != self.weights.nrows() {
            return Err(NetworkError::shape(
                "connection biases",
                &[self.weights.nrows()],
                &[self.biases.len()],
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Connection({} -> {}, weights: {:?}, biases: {:?})",
            self.input_len(),
            self.output_len(),
            self.weights.shape(),
            self.biases.shape()
        )
    }
}
