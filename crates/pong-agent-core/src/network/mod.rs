#[cfg(test)]
mod tests;

use crate::activation;
use crate::normalizer::Normalizer;
use crate::params::{LayerParams, ParameterStore};
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::{error::Error, fmt};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Fully-connected feed-forward classifier: tanh hidden layers, softmax output.
///
/// The network owns its parameters, the normalizer fitted by the last
/// training run, and the generator used for initialization and per-epoch
/// shuffles.
#[derive(Debug)]
pub struct Network {
    sizes: Vec<usize>,
    params: ParameterStore,
    pub(crate) normalizer: Normalizer,
    pub(crate) rng: ChaCha12Rng,
    /// Unique per instance, copies included; a `ForwardPass` records it.
    id: u64,
    /// Bumped on every parameter update; a `ForwardPass` records the version it saw.
    version: u64,
}

/// Result of one forward propagation.
///
/// `activations[0]` is the input, then one tanh output per hidden layer, and
/// last the raw output logits. `output` is the softmax of those logits.
#[derive(Clone, Debug, PartialEq)]
pub struct ForwardPass {
    activations: Vec<Vec<f64>>,
    output: Vec<f64>,
    network: u64,
    version: u64,
}

impl ForwardPass {
    pub fn activations(&self) -> &[Vec<f64>] {
        &self.activations
    }

    pub fn output(&self) -> &[f64] {
        &self.output
    }

    pub fn logits(&self) -> &[f64] {
        self.activations.last().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn into_output(self) -> Vec<f64> {
        self.output
    }
}

/// Loss gradients for every transition, computed against pre-update parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct Gradients {
    /// Error term of every non-input layer, `deltas[i]` belongs to layer `i + 1`.
    deltas: Vec<Vec<f64>>,
    /// Row-major `outputs × inputs` weight gradient per transition.
    weights: Vec<Vec<f64>>,
}

impl Gradients {
    pub fn deltas(&self) -> &[Vec<f64>] {
        &self.deltas
    }

    /// Bias gradient of transition `layer` (equal to the destination layer's error term).
    pub fn bias(&self, layer: usize) -> &[f64] {
        &self.deltas[layer]
    }

    pub fn weight(&self, layer: usize) -> &[f64] {
        &self.weights[layer]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    InvalidArchitecture { sizes: Vec<usize> },
    InputWidth { expected: usize, actual: usize },
    OutputWidth { expected: usize, actual: usize },
    StaleForwardPass { pass: u64, current: u64 },
    PassShape { expected: Vec<usize>, actual: Vec<usize> },
    ForeignForwardPass,
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::InvalidArchitecture { sizes } => write!(
                f,
                "architecture {sizes:?} needs at least 2 layers, each at least 1 unit wide"
            ),
            NetworkError::InputWidth { expected, actual } => {
                write!(f, "input has {actual} features, network expects {expected}")
            }
            NetworkError::OutputWidth { expected, actual } => write!(
                f,
                "output error has {actual} entries, network has {expected} classes"
            ),
            NetworkError::StaleForwardPass { pass, current } => write!(
                f,
                "forward pass computed at parameter version {pass}, network is at {current}"
            ),
            NetworkError::PassShape { expected, actual } => write!(
                f,
                "forward pass has layer widths {actual:?}, network has {expected:?}"
            ),
            NetworkError::ForeignForwardPass => {
                write!(f, "forward pass was computed by another network")
            }
        }
    }
}

impl Error for NetworkError {}

impl Network {
    pub fn new(sizes: &[usize], seed: u64) -> Self {
        Self::try_new(sizes, seed).unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_new(sizes: &[usize], seed: u64) -> Result<Self, NetworkError> {
        Self::with_rng(sizes, ChaCha12Rng::seed_from_u64(seed))
    }

    fn with_rng(sizes: &[usize], mut rng: ChaCha12Rng) -> Result<Self, NetworkError> {
        if sizes.len() < 2 || sizes.contains(&0) {
            return Err(NetworkError::InvalidArchitecture {
                sizes: sizes.to_vec(),
            });
        }
        let params = ParameterStore::initialize(sizes, &mut rng);
        tracing::debug!(
            ?sizes,
            parameters = params.parameter_count(),
            "initialized network"
        );
        Ok(Self {
            sizes: sizes.to_vec(),
            normalizer: Normalizer::identity(sizes[0]),
            params,
            rng,
            id: next_id(),
            version: 0,
        })
    }

    /// Deep copy with its own generator seeded from `seed`.
    pub fn fork(&self, seed: u64) -> Self {
        Self {
            sizes: self.sizes.clone(),
            params: self.params.clone(),
            normalizer: self.normalizer.clone(),
            rng: ChaCha12Rng::seed_from_u64(seed),
            id: next_id(),
            version: self.version,
        }
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn input_width(&self) -> usize {
        self.sizes[0]
    }

    pub fn output_width(&self) -> usize {
        self.sizes[self.sizes.len() - 1]
    }

    pub fn params(&self) -> &ParameterStore {
        &self.params
    }

    #[cfg(test)]
    pub(crate) fn params_mut(&mut self) -> &mut ParameterStore {
        self.version += 1;
        &mut self.params
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn forward(&self, input: &[f64]) -> ForwardPass {
        self.try_forward(input).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Propagates an already-normalized input through every layer.
    pub fn try_forward(&self, input: &[f64]) -> Result<ForwardPass, NetworkError> {
        if input.len() != self.input_width() {
            return Err(NetworkError::InputWidth {
                expected: self.input_width(),
                actual: input.len(),
            });
        }

        let layers = self.params.layers();
        let mut activations = Vec::with_capacity(self.sizes.len());
        activations.push(input.to_vec());

        for (i, layer) in layers.iter().enumerate() {
            let mut next = layer.affine(&activations[i]);
            if i + 1 < layers.len() {
                activation::tanh_inplace(&mut next);
            }
            activations.push(next);
        }

        let output = activation::softmax(&activations[activations.len() - 1]);
        Ok(ForwardPass {
            activations,
            output,
            network: self.id,
            version: self.version,
        })
    }

    /// Backpropagates `output_error` (gradient of the loss w.r.t. the output
    /// logits) through the cached activations of `pass`.
    ///
    /// `pass` must come from this very network (not a copy) at its current
    /// parameter version.
    pub fn gradients(
        &self,
        pass: &ForwardPass,
        output_error: &[f64],
    ) -> Result<Gradients, NetworkError> {
        if !pass.activations.iter().map(Vec::len).eq(self.sizes.iter().copied()) {
            return Err(NetworkError::PassShape {
                expected: self.sizes.clone(),
                actual: pass.activations.iter().map(Vec::len).collect(),
            });
        }
        if pass.network != self.id {
            return Err(NetworkError::ForeignForwardPass);
        }
        if pass.version != self.version {
            return Err(NetworkError::StaleForwardPass {
                pass: pass.version,
                current: self.version,
            });
        }
        if output_error.len() != self.output_width() {
            return Err(NetworkError::OutputWidth {
                expected: self.output_width(),
                actual: output_error.len(),
            });
        }

        Ok(self.compute_gradients(pass, output_error))
    }

    /// Unchecked core of `gradients`: `pass` must be fresh and `output_error`
    /// as wide as the output layer.
    pub(crate) fn compute_gradients(&self, pass: &ForwardPass, output_error: &[f64]) -> Gradients {
        let layers = self.params.layers();
        let acts = &pass.activations;

        // deltas[i] is the error term of layer i + 1; seed the last one.
        let mut deltas = vec![Vec::new(); layers.len()];
        deltas[layers.len() - 1] = output_error.to_vec();
        for l in (1..layers.len()).rev() {
            deltas[l - 1] = hidden_delta(&layers[l], &deltas[l], &acts[l]);
        }

        let weights = layers
            .iter()
            .enumerate()
            .map(|(i, layer)| {
                let mut grad = Vec::with_capacity(layer.inputs() * layer.outputs());
                for &d in &deltas[i] {
                    grad.extend(acts[i].iter().map(|&a| d * a));
                }
                grad
            })
            .collect();

        Gradients { deltas, weights }
    }

    /// Gradient-descent step: every weight and bias moves by `-learning_rate * gradient`.
    pub fn apply(&mut self, gradients: &Gradients, learning_rate: f64) {
        for (i, layer) in self.params.layers_mut().iter_mut().enumerate() {
            for (w, g) in layer.weights_mut().iter_mut().zip(&gradients.weights[i]) {
                *w -= learning_rate * g;
            }
            for (b, d) in layer.biases_mut().iter_mut().zip(&gradients.deltas[i]) {
                *b -= learning_rate * d;
            }
        }
        self.version += 1;
    }

    /// Computes gradients from `pass` and applies them. The pass is consumed:
    /// after the update it no longer describes this network.
    pub fn backpropagate(
        &mut self,
        pass: ForwardPass,
        output_error: &[f64],
        learning_rate: f64,
    ) -> Result<(), NetworkError> {
        let gradients = self.gradients(&pass, output_error)?;
        self.apply(&gradients, learning_rate);
        Ok(())
    }

    /// Class probabilities for a raw (unnormalized) sample.
    pub fn probabilities(&self, raw: &[f64]) -> Result<Vec<f64>, NetworkError> {
        if raw.len() != self.input_width() {
            return Err(NetworkError::InputWidth {
                expected: self.input_width(),
                actual: raw.len(),
            });
        }
        let input = self.normalizer.transform(raw);
        Ok(self.try_forward(&input)?.into_output())
    }

    /// Most probable class for a raw sample; the lowest index wins ties.
    pub fn predict(&self, raw: &[f64]) -> Result<usize, NetworkError> {
        Ok(activation::argmax(&self.probabilities(raw)?))
    }
}

/// Error term of a hidden layer from the error term of the layer above it.
///
/// `outgoing` connects this layer to the next one; `activated` are this
/// layer's cached tanh outputs.
fn hidden_delta(outgoing: &LayerParams, next_delta: &[f64], activated: &[f64]) -> Vec<f64> {
    activated
        .iter()
        .enumerate()
        .map(|(k, &a)| {
            let back: f64 = next_delta
                .iter()
                .enumerate()
                .map(|(j, &d)| d * outgoing.weight(j, k))
                .sum();
            back * activation::tanh_derivative(a)
        })
        .collect()
}

/// Copies parameters and normalizer; the copy draws a fresh, unrelated seed.
impl Clone for Network {
    fn clone(&self) -> Self {
        let rng = ChaCha12Rng::from_rng(&mut rand::rng());
        Self {
            sizes: self.sizes.clone(),
            params: self.params.clone(),
            normalizer: self.normalizer.clone(),
            rng,
            id: next_id(),
            version: self.version,
        }
    }
}
