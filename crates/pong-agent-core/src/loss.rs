//! Cross-entropy loss over softmax outputs.
//!
//! `cross_entropy_gradient` returns the gradient with respect to the output
//! *logits*. The `output - target` shortcut holds only because softmax and
//! cross-entropy are paired; a different loss needs the softmax Jacobian.

/// Probabilities are floored here before taking the logarithm.
pub const PROBABILITY_FLOOR: f64 = 1e-15;

pub fn one_hot(label: usize, width: usize) -> Vec<f64> {
    let mut target = vec![0.0; width];
    target[label] = 1.0;
    target
}

pub fn cross_entropy(output: &[f64], target: &[f64]) -> f64 {
    output
        .iter()
        .zip(target)
        .map(|(&p, &t)| -t * p.max(PROBABILITY_FLOOR).ln())
        .sum()
}

pub fn cross_entropy_gradient(output: &[f64], target: &[f64]) -> Vec<f64> {
    output.iter().zip(target).map(|(p, t)| p - t).collect()
}
