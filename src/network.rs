use crate::activation::{sigmoid, sigmoid_derivative_from_output};
use crate::connection::Connection;
use crate::error::{NetworkError, Result};
use crate::layer::Layer;
use log::{debug, info};
use ndarray::{Array, Array1, Array2, ArrayView1};
use ndarray_rand::rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of pixels in a 28x28 greyscale image, i.e. the size of the input layer.
pub const INPUT_SIZE: usize = 28 * 28;
/// Number of digit classes, i.e. the size of the output layer.
pub const OUTPUT_SIZE: usize = 10;

/// A fully connected feed-forward digit classifier.
///
/// `layers` runs from the input layer, through the hidden layers, to the output layer.
/// `connections[i]` links `layers[i]` to `layers[i + 1]`, so there is always exactly one fewer
/// connection than there are layers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Network {
    layers: Vec<Layer>,
    connections: Vec<Connection>,
}

/// Per-connection gradients of the loss. `weights[i]` and `biases[i]` have the same shapes as the
/// weights and biases of `connections[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    pub weights: Vec<Array2<f64>>,
    pub biases: Vec<Array1<f64>>,
}

impl Gradients {
    fn zeros_like(network: &Network) -> Gradients {
        Gradients {
            weights: network
                .connections
                .iter()
                .map(|connection| Array::zeros(connection.weights().raw_dim()))
                .collect(),
            biases: network
                .connections
                .iter()
                .map(|connection| Array::zeros(connection.biases().raw_dim()))
                .collect(),
        }
    }

    fn accumulate(&mut self, other: &Gradients) {
        for (total, nabla) in self.weights.iter_mut().zip(other.weights.iter()) {
            *total += nabla;
        }
        for (total, nabla) in self.biases.iter_mut().zip(other.biases.iter()) {
            *total += nabla;
        }
    }
}

impl Network {
    /// Builds an untrained network with `hidden_layers` hidden layers of `hidden_size` neurons each
    /// between the 784-pixel input layer and the 10-class output layer. All weights and biases are
    /// drawn uniformly from [-1, 1] using `rng`.
    ///
    /// `hidden_layers` may be zero, giving a network that maps pixels straight to classes.
    pub fn new<R: Rng + ?Sized>(
        hidden_size: usize,
        hidden_layers: usize,
        rng: &mut R,
    ) -> Result<Network> {
        if hidden_layers > 0 && hidden_size == 0 {
            return Err(NetworkError::InvalidConfiguration(
                "hidden layers must have at least one neuron".to_string(),
            ));
        }
        // Backpropagation indexes every hidden connection's weight columns by the label, so a
        // hidden-to-hidden connection needs at least as many inputs as there are classes.
        if hidden_layers > 1 && hidden_size < OUTPUT_SIZE {
            return Err(NetworkError::InvalidConfiguration(format!(
                "with more than one hidden layer the hidden size must be at least {OUTPUT_SIZE}, \
                 got {hidden_size}"
            )));
        }

        let sizes: Vec<usize> = std::iter::once(INPUT_SIZE)
            .chain(std::iter::repeat_n(hidden_size, hidden_layers))
            .chain(std::iter::once(OUTPUT_SIZE))
            .collect();

        let network = Network {
            layers: sizes.iter().map(|&size| Layer::new(size)).collect(),
            connections: sizes
                // For each size paired with the following size, make the connection between them.
                .iter()
                .zip(sizes.iter().skip(1))
                .map(|(&current_size, &next_size)| Connection::random(current_size, next_size, rng))
                .collect(),
        };
        debug!("Built {network}");
        Ok(network)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Mutable access to the connections. Their setters reject any change of shape, so the network
    /// structure stays intact.
    pub fn connections_mut(&mut self) -> &mut [Connection] {
        &mut self.connections
    }

    pub fn hidden_layers(&self) -> usize {
        self.layers.len() - 2
    }

    /// Width of the hidden layers, or `None` for a network without any.
    pub fn hidden_size(&self) -> Option<usize> {
        (self.hidden_layers() > 0).then(|| self.layers[1].len())
    }

    /// Checks every structural invariant: input and output sizes, one connection per adjacent pair
    /// of layers, and each connection shaped `[next layer x previous layer]`.
    pub fn validate(&self) -> Result<()> {
        if self.layers.len() < 2 {
            return Err(NetworkError::InvalidConfiguration(format!(
                "a network needs at least an input and an output layer, got {} layers",
                self.layers.len()
            )));
        }
        if self.connections.len() != self.layers.len() - 1 {
            return Err(NetworkError::shape(
                "connection count",
                &[self.layers.len() - 1],
                &[self.connections.len()],
            ));
        }
        let input_len = self.layers[0].len();
        if input_len != INPUT_SIZE {
            return Err(NetworkError::shape("input layer", &[INPUT_SIZE], &[input_len]));
        }
        let output_len = self.output_layer().len();
        if output_len != OUTPUT_SIZE {
            return Err(NetworkError::shape("output layer", &[OUTPUT_SIZE], &[output_len]));
        }
        for (depth, connection) in self.connections.iter().enumerate() {
            connection.check_consistent()?;
            let expected = [self.layers[depth + 1].len(), self.layers[depth].len()];
            if connection.weights().shape() != expected {
                return Err(NetworkError::shape(
                    "connection weights",
                    &expected,
                    connection.weights().shape(),
                ));
            }
            let is_hidden = depth + 1 < self.connections.len();
            if is_hidden && connection.input_len() < OUTPUT_SIZE {
                return Err(NetworkError::InvalidConfiguration(format!(
                    "hidden connection {depth} has {} inputs, fewer than {OUTPUT_SIZE} classes",
                    connection.input_len()
                )));
            }
        }
        Ok(())
    }

    fn output_layer(&self) -> &Layer {
        &self.layers[self.layers.len() - 1]
    }

    fn check_label(&self, label: u8) -> Result<usize> {
        let label = usize::from(label);
        let classes = self.output_layer().len();
        if label >= classes {
            return Err(NetworkError::LabelOutOfRange { label, classes });
        }
        Ok(label)
    }

    /// Runs `image` (784 raw intensities in 0..=255) through the network, overwriting the
    /// activations of every layer.
    pub fn forward(&mut self, image: &[u8]) -> Result<()> {
        if image.len() != self.layers[0].len() {
            return Err(NetworkError::shape("image", &[self.layers[0].len()], &[image.len()]));
        }
        self.feedforward(image);
        Ok(())
    }

    // The unchecked forward pass: a_next = σ(w.a + b) for every connection in order.
    fn feedforward(&mut self, image: &[u8]) {
        for (value, &pixel) in self.layers[0].values_mut().iter_mut().zip(image) {
            *value = f64::from(pixel) / 255.0;
        }

        for (depth, connection) in self.connections.iter().enumerate() {
            let mut activation =
                connection.weights().dot(self.layers[depth].get_values()) + connection.biases();
            activation.mapv_inplace(sigmoid);
            self.layers[depth + 1].values_mut().assign(&activation);
        }
    }

    /// Activations of the output layer after the most recent forward pass.
    pub fn output_vector(&self) -> &Array1<f64> {
        self.output_layer().get_values()
    }

    /// The predicted digit: the index of the strongest output activation.
    pub fn output(&self) -> usize {
        argmax(self.output_vector().view())
    }

    /// Computes the loss gradients for a single labelled image.
    ///
    /// This runs a forward pass first and then walks the connections from the output side back to
    /// the input side. The result is indexed like [`Network::connections`].
    ///
    /// The error signal is a single scalar rather than a vector per layer:
    ///
    /// * Output connection: `delta = output[label] - 1`. The weight gradient is zero except for row
    ///   `label`, which is `delta` times the connection's input activations. The bias gradient is
    ///   zero except for entry `label`, which is `delta`.
    /// * Each hidden connection, going backwards: `delta *= w.column(label) · σ'(output)`, where `w`
    ///   and `output` are that connection's own weights and output activations. Every row of the
    ///   weight gradient is `delta` times the input activations and every bias gradient entry is
    ///   `delta`.
    ///
    /// Note that the same `label` column is used at every depth and that the bias gradient ignores
    /// which neuron it belongs to. This is not textbook backpropagation, and training with deep
    /// networks behaves accordingly.
    pub fn gradient(&mut self, image: &[u8], label: u8) -> Result<Gradients> {
        let label = self.check_label(label)?;
        self.forward(image)?;
        Ok(self.backpropagate(label))
    }

    // Reads the activations left by the last forward pass; `label` must already be checked.
    fn backpropagate(&self, label: usize) -> Gradients {
        let mut nabla = Gradients::zeros_like(self);
        let last = self.connections.len() - 1;

        let output_values = self.layers[last + 1].get_values();
        let mut delta = output_values[label] - 1.0;
        nabla.weights[last]
            .row_mut(label)
            .assign(&(self.layers[last].get_values() * delta));
        nabla.biases[last][label] = delta;

        for depth in (0..last).rev() {
            let connection = &self.connections[depth];
            let output_derivative = self.layers[depth + 1]
                .get_values()
                .mapv(sigmoid_derivative_from_output);
            delta *= connection.weights().column(label).dot(&output_derivative);

            let input_gradient = self.layers[depth].get_values() * delta;
            for mut row in nabla.weights[depth].rows_mut() {
                row.assign(&input_gradient);
            }
            nabla.biases[depth].fill(delta);
        }

        nabla
    }

    // Checks a labelled set at the public boundary: equal lengths, every image the size of the
    // input layer and every label a valid class. Returns the labels as class indices.
    fn check_examples<I: AsRef<[u8]>>(&self, images: &[I], labels: &[u8]) -> Result<Vec<usize>> {
        if images.len() != labels.len() {
            return Err(NetworkError::LengthMismatch {
                images: images.len(),
                labels: labels.len(),
            });
        }
        let input_len = self.layers[0].len();
        for image in images {
            let image = image.as_ref();
            if image.len() != input_len {
                return Err(NetworkError::shape("image", &[input_len], &[image.len()]));
            }
        }
        labels.iter().map(|&label| self.check_label(label)).collect()
    }

    /// Applies one batched step: the per-image gradients are summed and every connection moves by
    /// `factor * (sum / batch size)`.
    ///
    /// The step is added, not subtracted. Since the gradients are those of the cross-entropy loss,
    /// pass a negative `factor` to descend the loss. An empty batch leaves the network unchanged.
    pub fn update<I: AsRef<[u8]>>(&mut self, images: &[I], labels: &[u8], factor: f64) -> Result<()> {
        let labels = self.check_examples(images, labels)?;
        if images.is_empty() {
            return Ok(());
        }
        self.apply_batch(images, &labels, factor);
        Ok(())
    }

    // The unchecked batch step behind `update` and `train`.
    fn apply_batch<I: AsRef<[u8]>>(&mut self, images: &[I], labels: &[usize], factor: f64) {
        let mut total = Gradients::zeros_like(self);
        for (image, &label) in images.iter().zip(labels.iter()) {
            self.feedforward(image.as_ref());
            total.accumulate(&self.backpropagate(label));
        }

        let batch_size = images.len() as f64;
        debug!("Applying batch of {} with factor {factor}", images.len());
        for ((connection, nabla_weight), nabla_bias) in self
            .connections
            .iter_mut()
            .zip(total.weights.iter_mut())
            .zip(total.biases.iter_mut())
        {
            let (weights, biases) = connection.parameters_mut();
            nabla_weight.mapv_inplace(|nw| factor * (nw / batch_size));
            nabla_bias.mapv_inplace(|nb| factor * (nb / batch_size));
            *weights += &*nabla_weight;
            *biases += &*nabla_bias;
        }
    }

    /// Trains for `epochs` passes over the data. Each epoch visits the examples in a fresh random
    /// order, split into consecutive batches of `batch_size` (the last one may be shorter), and
    /// applies one [`Network::update`] step per batch.
    ///
    /// The whole set is checked before the first step, so an error leaves the network untouched.
    /// Only an index permutation is shuffled, so the caller's slices keep their order and every
    /// image stays paired with its label.
    pub fn train<I: AsRef<[u8]>, R: Rng + ?Sized>(
        &mut self,
        images: &[I],
        labels: &[u8],
        epochs: usize,
        factor: f64,
        batch_size: usize,
        rng: &mut R,
    ) -> Result<()> {
        let labels = self.check_examples(images, labels)?;
        if batch_size == 0 {
            return Err(NetworkError::InvalidConfiguration(
                "batch size must be at least 1".to_string(),
            ));
        }

        let mut order: Vec<usize> = (0..images.len()).collect();
        let batches = images.len().div_ceil(batch_size);
        for epoch in 0..epochs {
            info!("Epoch {}/{epochs}: {batches} batches of up to {batch_size}", epoch + 1);
            order.shuffle(rng);

            for batch in order.chunks(batch_size) {
                let batch_images: Vec<&[u8]> = batch.iter().map(|&i| images[i].as_ref()).collect();
                let batch_labels: Vec<usize> = batch.iter().map(|&i| labels[i]).collect();
                self.apply_batch(&batch_images, &batch_labels, factor);
            }
        }
        Ok(())
    }

    /// Number of `images` whose predicted digit equals its label.
    pub fn count_correct<I: AsRef<[u8]>>(&mut self, images: &[I], labels: &[u8]) -> Result<usize> {
        let labels = self.check_examples(images, labels)?;

        let mut correct_answers = 0;
        for (image, &label) in images.iter().zip(labels.iter()) {
            self.feedforward(image.as_ref());
            if self.output() == label {
                correct_answers += 1;
            }
        }
        Ok(correct_answers)
    }

    /// Fraction of `images` whose predicted digit equals its label. An empty set scores 0.0.
    pub fn test<I: AsRef<[u8]>>(&mut self, images: &[I], labels: &[u8]) -> Result<f64> {
        let correct_answers = self.count_correct(images, labels)?;
        if images.is_empty() {
            return Ok(0.0);
        }
        Ok(correct_answers as f64 / images.len() as f64)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sizes = self
            .layers
            .iter()
            .map(|layer| layer.len().to_string())
            .collect::<Vec<_>>()
            .join(" -> ");
        let parameters: usize = self
            .connections
            .iter()
            .map(|connection| connection.len() + connection.biases().len())
            .sum();
        write!(
            f,
            "Network({sizes}, {} hidden layers, {parameters} parameters)",
            self.hidden_layers()
        )
    }
}

/// Index of the largest value. Ties go to the lowest index and NaN entries are skipped; a view
/// with no comparable value gives 0.
pub fn argmax(values: ArrayView1<f64>) -> usize {
    let mut best: Option<(usize, f64)> = None;
    for (index, &value) in values.iter().enumerate() {
        if value.is_nan() {
            continue;
        }
        match best {
            Some((_, max)) if value <= max => {}
            _ => best = Some((index, value)),
        }
    }
    best.map_or(0, |(index, _)| index)
}
