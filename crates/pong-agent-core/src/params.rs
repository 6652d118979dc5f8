use rand::Rng;

/// Weights and bias of one transition between consecutive layers.
///
/// `weights` is row-major with `outputs` rows of `inputs` columns: row `j`
/// holds the incoming weights of unit `j` in the next layer.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerParams {
    inputs: usize,
    outputs: usize,
    weights: Vec<f64>,
    biases: Vec<f64>,
}

impl LayerParams {
    /// Xavier-scaled uniform weights, unscaled uniform biases, both drawn from `[-1, 1]`.
    pub fn initialize<R: Rng + ?Sized>(inputs: usize, outputs: usize, rng: &mut R) -> Self {
        let scale = (2.0 / (inputs + outputs) as f64).sqrt();
        let weights = (0..inputs * outputs)
            .map(|_| rng.random_range(-1.0..=1.0) * scale)
            .collect();
        let biases = (0..outputs).map(|_| rng.random_range(-1.0..=1.0)).collect();
        Self {
            inputs,
            outputs,
            weights,
            biases,
        }
    }

    pub fn inputs(&self) -> usize {
        self.inputs
    }

    pub fn outputs(&self) -> usize {
        self.outputs
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn biases(&self) -> &[f64] {
        &self.biases
    }

    pub fn weight(&self, row: usize, col: usize) -> f64 {
        self.weights[row * self.inputs + col]
    }

    /// Incoming weights of unit `row` in the next layer.
    pub fn row(&self, row: usize) -> &[f64] {
        &self.weights[row * self.inputs..(row + 1) * self.inputs]
    }

    pub(crate) fn weights_mut(&mut self) -> &mut [f64] {
        &mut self.weights
    }

    pub(crate) fn biases_mut(&mut self) -> &mut [f64] {
        &mut self.biases
    }

    /// `W·x + b` for every unit of the next layer.
    pub fn affine(&self, input: &[f64]) -> Vec<f64> {
        debug_assert_eq!(input.len(), self.inputs);
        self.weights
            .chunks_exact(self.inputs)
            .zip(self.biases.iter())
            .map(|(row, &b)| row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + b)
            .collect()
    }
}

/// All transitions of a network, one `LayerParams` per consecutive pair of widths.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterStore {
    layers: Vec<LayerParams>,
}

impl ParameterStore {
    /// Allocates and initializes every transition. `sizes` must already be validated.
    pub fn initialize<R: Rng + ?Sized>(sizes: &[usize], rng: &mut R) -> Self {
        let layers = sizes
            .windows(2)
            .map(|pair| LayerParams::initialize(pair[0], pair[1], rng))
            .collect();
        Self { layers }
    }

    pub fn layers(&self) -> &[LayerParams] {
        &self.layers
    }

    pub(crate) fn layers_mut(&mut self) -> &mut [LayerParams] {
        &mut self.layers
    }

    pub fn parameter_count(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.weights.len() + l.biases.len())
            .sum()
    }
}
