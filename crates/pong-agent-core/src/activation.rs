/// Activation functions for the classifier: tanh on hidden layers, softmax on the output.

pub fn tanh(x: f64) -> f64 {
    x.tanh()
}

/// `1 - tanh(x)^2`, evaluated at the cached post-activation value.
///
/// The backward pass passes `a = tanh(z)` straight in, so tanh is applied to
/// the already-activated value once more before squaring.
pub fn tanh_derivative(a: f64) -> f64 {
    1.0 - tanh(a).powi(2)
}

pub fn tanh_inplace(values: &mut [f64]) {
    for v in values.iter_mut() {
        *v = tanh(*v);
    }
}

/// Numerically stable softmax: the maximum is subtracted before exponentiating.
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut out: Vec<f64> = logits.iter().map(|&z| (z - max).exp()).collect();
    let sum: f64 = out.iter().sum();
    for p in &mut out {
        *p /= sum;
    }
    out
}

/// Index of the largest value; the first one wins on ties.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tanh_derivative_reapplies_tanh_to_activated_value() {
        let a: f64 = 0.5;
        assert_eq!(tanh_derivative(a), 1.0 - a.tanh().powi(2));
        assert!((tanh_derivative(0.5) - 0.786_447_732_965_927_4).abs() < 1e-12);
        assert_eq!(tanh_derivative(0.0), 1.0);
        // Stays strictly positive over the whole tanh range.
        assert!(tanh_derivative(1.0) > 0.4 && tanh_derivative(-1.0) > 0.4);
    }

    #[test]
    fn softmax_sums_to_one_and_is_non_negative() {
        let p = softmax(&[1.0, -2.0, 0.5, 3.0]);
        assert_eq!(p.len(), 4);
        assert!(p.iter().all(|&x| x >= 0.0));
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn softmax_survives_large_logits() {
        let p = softmax(&[1000.0, 1001.0, 999.0]);
        assert!(p.iter().all(|x| x.is_finite()));
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert_eq!(argmax(&p), 1);
    }

    #[test]
    fn softmax_is_shift_invariant() {
        let a = softmax(&[0.1, 0.2, 0.3]);
        let b = softmax(&[10.1, 10.2, 10.3]);
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-12);
        }
    }

    #[test]
    fn argmax_prefers_first_on_ties() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), 1);
        assert_eq!(argmax(&[0.5, 0.5, 0.0]), 0);
        assert_eq!(argmax(&[0.0]), 0);
    }
}
