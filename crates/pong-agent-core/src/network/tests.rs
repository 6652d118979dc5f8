use super::*;
use crate::loss;

fn loss_at(net: &Network, input: &[f64], target: &[f64]) -> f64 {
    loss::cross_entropy(net.forward(input).output(), target)
}

#[test]
fn rejects_short_architectures() {
    assert!(matches!(
        Network::try_new(&[3], 1),
        Err(NetworkError::InvalidArchitecture { .. })
    ));
    assert!(Network::try_new(&[], 1).is_err());
    assert!(Network::try_new(&[2, 0, 3], 1).is_err());
    assert!(Network::try_new(&[2, 3], 1).is_ok());
}

#[test]
#[should_panic(expected = "needs at least 2 layers")]
fn new_panics_on_invalid_architecture() {
    let _ = Network::new(&[4], 0);
}

#[test]
fn forward_output_is_a_distribution_for_various_architectures() {
    for sizes in [vec![2, 3], vec![2, 8, 3], vec![2, 10, 10, 3], vec![5, 4, 7, 2, 6]] {
        let net = Network::new(&sizes, 17);
        let input: Vec<f64> = (0..sizes[0]).map(|i| i as f64 * 0.3 - 0.5).collect();
        let pass = net.forward(&input);
        let out = pass.output();
        assert_eq!(out.len(), *sizes.last().unwrap());
        assert!(out.iter().all(|&p| p >= 0.0));
        assert!((out.iter().sum::<f64>() - 1.0).abs() < 1e-9, "{sizes:?}");
    }
}

#[test]
fn forward_caches_every_layer_with_raw_logits_last() {
    let net = Network::new(&[2, 5, 4, 3], 3);
    let pass = net.forward(&[0.4, -1.2]);
    let widths: Vec<usize> = pass.activations().iter().map(Vec::len).collect();
    assert_eq!(widths, vec![2, 5, 4, 3]);
    assert_eq!(pass.activations()[0], vec![0.4, -1.2]);
    // Hidden layers are tanh outputs.
    assert!(pass.activations()[1..3]
        .iter()
        .flatten()
        .all(|a| a.abs() < 1.0));
    assert_eq!(activation::softmax(pass.logits()), pass.output());
}

#[test]
fn forward_is_deterministic() {
    let net = Network::new(&[2, 8, 3], 11);
    let a = net.forward(&[0.25, 0.75]);
    let b = net.forward(&[0.25, 0.75]);
    assert_eq!(a, b);
}

#[test]
fn forward_rejects_wrong_input_width() {
    let net = Network::new(&[2, 4, 3], 0);
    assert_eq!(
        net.try_forward(&[1.0, 2.0, 3.0]),
        Err(NetworkError::InputWidth {
            expected: 2,
            actual: 3
        })
    );
}

#[test]
fn same_seed_builds_same_network() {
    let a = Network::new(&[2, 6, 3], 99);
    let b = Network::new(&[2, 6, 3], 99);
    assert_eq!(a.params(), b.params());
}

#[test]
fn output_transition_gradients_match_finite_differences() {
    // The last transition involves no tanh derivative, so its analytic
    // gradient is the exact loss gradient.
    let mut net = Network::new(&[2, 4, 3, 3], 21);
    let input = [0.3, -0.8];
    let target = loss::one_hot(1, 3);
    let pass = net.forward(&input);
    let error = loss::cross_entropy_gradient(pass.output(), &target);
    let grads = net.gradients(&pass, &error).unwrap();

    let eps = 1e-6;
    let layer = 2;
    let (outputs, inputs) = {
        let l = &net.params().layers()[layer];
        (l.outputs(), l.inputs())
    };
    for j in 0..outputs {
        for k in 0..inputs {
            let idx = j * inputs + k;
            net.params_mut().layers_mut()[layer].weights_mut()[idx] += eps;
            let plus = loss_at(&net, &input, &target);
            net.params_mut().layers_mut()[layer].weights_mut()[idx] -= 2.0 * eps;
            let minus = loss_at(&net, &input, &target);
            net.params_mut().layers_mut()[layer].weights_mut()[idx] += eps;
            let numeric = (plus - minus) / (2.0 * eps);
            let analytic = grads.weight(layer)[idx];
            assert!(
                (numeric - analytic).abs() < 1e-6,
                "w[{j}][{k}]: numeric {numeric} analytic {analytic}"
            );
        }
        net.params_mut().layers_mut()[layer].biases_mut()[j] += eps;
        let plus = loss_at(&net, &input, &target);
        net.params_mut().layers_mut()[layer].biases_mut()[j] -= 2.0 * eps;
        let minus = loss_at(&net, &input, &target);
        net.params_mut().layers_mut()[layer].biases_mut()[j] += eps;
        let numeric = (plus - minus) / (2.0 * eps);
        assert!((numeric - grads.bias(layer)[j]).abs() < 1e-6);
    }
}

#[test]
fn hidden_error_terms_reapply_tanh_to_cached_activations() {
    let net = Network::new(&[2, 4, 3, 3], 21);
    let pass = net.forward(&[0.3, -0.8]);
    let error = loss::cross_entropy_gradient(pass.output(), &loss::one_hot(1, 3));
    let grads = net.gradients(&pass, &error).unwrap();
    let layers = net.params().layers();
    let acts = pass.activations();

    // Walk down from the output, recomputing each error term by hand.
    let mut expected = error.clone();
    assert_eq!(grads.deltas()[2], expected);
    for l in (1..3).rev() {
        let below: Vec<f64> = (0..acts[l].len())
            .map(|k| {
                let back: f64 = (0..expected.len())
                    .map(|j| expected[j] * layers[l].weight(j, k))
                    .sum();
                back * (1.0 - acts[l][k].tanh().powi(2))
            })
            .collect();
        for (got, want) in grads.deltas()[l - 1].iter().zip(&below) {
            assert!((got - want).abs() < 1e-12, "layer {l}: {got} vs {want}");
        }
        expected = below;
    }

    // Weight gradients are destination error times source activation.
    for (i, layer) in layers.iter().enumerate() {
        for j in 0..layer.outputs() {
            for k in 0..layer.inputs() {
                let want = grads.deltas()[i][j] * acts[i][k];
                assert_eq!(grads.weight(i)[j * layer.inputs() + k], want);
            }
        }
    }
}

#[test]
fn update_moves_target_class_weights_toward_larger_logit() {
    let mut net = Network::new(&[2, 4, 3], 8);
    let input = [0.9, -0.4];
    let pass = net.forward(&input);
    // Pick the least likely class as the target.
    let target_class = pass
        .output()
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap();
    let hidden = pass.activations()[1].clone();
    let before = net.params().layers()[1].clone();

    let error = loss::cross_entropy_gradient(pass.output(), &loss::one_hot(target_class, 3));
    assert!(error[target_class] < 0.0);
    net.backpropagate(pass, &error, 0.1).unwrap();

    let after = &net.params().layers()[1];
    let mut logit_shift = after.biases()[target_class] - before.biases()[target_class];
    assert!(logit_shift > 0.0);
    for (k, &h) in hidden.iter().enumerate() {
        let dw = after.weight(target_class, k) - before.weight(target_class, k);
        assert!(dw * h >= 0.0, "weight {k} moved against the target");
        logit_shift += dw * h;
    }
    assert!(logit_shift > 0.0);
}

#[test]
fn backpropagate_rejects_stale_pass() {
    let mut net = Network::new(&[2, 3, 3], 4);
    let stale = net.forward(&[0.1, 0.2]);
    let fresh = net.forward(&[0.1, 0.2]);
    let error = vec![0.1, -0.2, 0.1];
    net.backpropagate(fresh, &error, 0.01).unwrap();
    assert_eq!(
        net.backpropagate(stale, &error, 0.01),
        Err(NetworkError::StaleForwardPass {
            pass: 0,
            current: 1
        })
    );
}

#[test]
fn backpropagate_rejects_pass_from_another_architecture() {
    let mut net = Network::new(&[2, 3, 3], 2);
    let other = Network::new(&[2, 5, 4, 3], 1);
    let pass = other.forward(&[0.1, 0.2]);
    let params = net.params().clone();
    assert_eq!(
        net.backpropagate(pass, &[0.1, -0.2, 0.1], 0.01),
        Err(NetworkError::PassShape {
            expected: vec![2, 3, 3],
            actual: vec![2, 5, 4, 3]
        })
    );
    assert_eq!(net.params(), &params);
}

#[test]
fn backpropagate_rejects_pass_from_another_network_of_same_shape() {
    let mut net = Network::new(&[2, 3, 3], 2);
    let other = Network::new(&[2, 3, 3], 3);
    let error = vec![0.1, -0.2, 0.1];
    assert_eq!(
        net.backpropagate(other.forward(&[0.1, 0.2]), &error, 0.01),
        Err(NetworkError::ForeignForwardPass)
    );

    // Copies are distinct networks too, even with identical parameters.
    let copy = net.fork(7);
    assert_eq!(
        net.backpropagate(copy.forward(&[0.1, 0.2]), &error, 0.01),
        Err(NetworkError::ForeignForwardPass)
    );
    let cloned = net.clone();
    assert_eq!(
        net.backpropagate(cloned.forward(&[0.1, 0.2]), &error, 0.01),
        Err(NetworkError::ForeignForwardPass)
    );
    let own = net.forward(&[0.1, 0.2]);
    assert!(net.backpropagate(own, &error, 0.01).is_ok());
}

#[test]
fn backpropagate_rejects_wrong_error_width() {
    let mut net = Network::new(&[2, 3, 3], 4);
    let pass = net.forward(&[0.1, 0.2]);
    assert_eq!(
        net.backpropagate(pass, &[0.5, -0.5], 0.01),
        Err(NetworkError::OutputWidth {
            expected: 3,
            actual: 2
        })
    );
}

#[test]
fn clone_is_deep_and_does_not_replay_rng() {
    let net = Network::new(&[2, 5, 3], 12);
    let mut copy = net.clone();
    assert_eq!(copy.params(), net.params());

    let pass = copy.forward(&[1.0, 1.0]);
    let error = loss::cross_entropy_gradient(pass.output(), &loss::one_hot(0, 3));
    copy.backpropagate(pass, &error, 0.5).unwrap();
    assert_ne!(copy.params(), net.params());

    // A freshly seeded source and its clone must not draw the same stream.
    use rand::RngCore;
    let mut source = Network::new(&[2, 3], 12);
    let mut cloned = source.clone();
    let a: Vec<u64> = (0..4).map(|_| source.rng.next_u64()).collect();
    let b: Vec<u64> = (0..4).map(|_| cloned.rng.next_u64()).collect();
    assert_ne!(a, b);
}

#[test]
fn fork_is_deterministic_in_its_seed() {
    use rand::RngCore;
    let net = Network::new(&[2, 3], 1);
    let mut a = net.fork(77);
    let mut b = net.fork(77);
    assert_eq!(a.params(), net.params());
    assert_eq!(a.rng.next_u64(), b.rng.next_u64());
}

#[test]
fn predict_breaks_ties_toward_lowest_index() {
    let mut net = Network::new(&[2, 3], 0);
    for layer in net.params_mut().layers_mut() {
        layer.weights_mut().iter_mut().for_each(|w| *w = 0.0);
        layer.biases_mut().iter_mut().for_each(|b| *b = 0.0);
    }
    assert_eq!(net.predict(&[4.0, 2.0]), Ok(0));
}
