use crate::loss;
use crate::network::{Network, NetworkError};
use crate::normalizer::{NormalizeError, Normalizer};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::{error::Error, fmt};

/// Diagnostics of one pass over the corpus.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpochSummary {
    /// 1-based.
    pub epoch: usize,
    pub mean_loss: f64,
    /// Largest |output gradient| over every example and class.
    pub max_gradient: f64,
    /// Smallest |output gradient| over every example and class.
    pub min_gradient: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrainError {
    EmptyCorpus,
    LengthMismatch { samples: usize, labels: usize },
    LabelOutOfRange { index: usize, label: usize, classes: usize },
    InputWidth { expected: usize, actual: usize },
    InvalidLearningRate(f64),
    Normalize(NormalizeError),
    Network(NetworkError),
}

impl fmt::Display for TrainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainError::EmptyCorpus => write!(f, "training corpus is empty"),
            TrainError::LengthMismatch { samples, labels } => write!(
                f,
                "corpus has {samples} samples but {labels} labels"
            ),
            TrainError::LabelOutOfRange {
                index,
                label,
                classes,
            } => write!(
                f,
                "label {label} of sample {index} is outside [0, {classes})"
            ),
            TrainError::InputWidth { expected, actual } => write!(
                f,
                "samples have {actual} features, network expects {expected}"
            ),
            TrainError::InvalidLearningRate(lr) => {
                write!(f, "learning rate must be finite and positive, got {lr}")
            }
            TrainError::Normalize(e) => write!(f, "{e}"),
            TrainError::Network(e) => write!(f, "{e}"),
        }
    }
}

impl From<NormalizeError> for TrainError {
    fn from(err: NormalizeError) -> Self {
        TrainError::Normalize(err)
    }
}

impl From<NetworkError> for TrainError {
    fn from(err: NetworkError) -> Self {
        TrainError::Network(err)
    }
}

impl Error for TrainError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TrainError::Normalize(e) => Some(e),
            TrainError::Network(e) => Some(e),
            _ => None,
        }
    }
}

/// Lazy training run: each `next()` performs one epoch and yields its summary.
///
/// Dropping the iterator early stops training after the last completed epoch.
pub struct Epochs<'a, S> {
    network: &'a mut Network,
    corpus: &'a [S],
    labels: &'a [usize],
    learning_rate: f64,
    epochs: usize,
    completed: usize,
    order: Vec<usize>,
}

impl<S: AsRef<[f64]>> Epochs<'_, S> {
    fn run_epoch(&mut self) -> EpochSummary {
        let classes = self.network.output_width();

        self.order.clear();
        self.order.extend(0..self.corpus.len());
        self.order.shuffle(&mut self.network.rng);

        let mut total_loss = 0.0;
        let mut max_gradient = 0.0f64;
        let mut min_gradient = f64::MAX;

        for &index in &self.order {
            let input = self.network.normalizer.transform(self.corpus[index].as_ref());
            let pass = self.network.forward(&input);
            let target = loss::one_hot(self.labels[index], classes);

            total_loss += loss::cross_entropy(pass.output(), &target);
            let gradient = loss::cross_entropy_gradient(pass.output(), &target);
            for g in &gradient {
                max_gradient = max_gradient.max(g.abs());
                min_gradient = min_gradient.min(g.abs());
            }

            let gradients = self.network.compute_gradients(&pass, &gradient);
            self.network.apply(&gradients, self.learning_rate);
        }

        self.completed += 1;
        EpochSummary {
            epoch: self.completed,
            mean_loss: total_loss / self.corpus.len() as f64,
            max_gradient,
            min_gradient,
        }
    }
}

impl<S: AsRef<[f64]>> Iterator for Epochs<'_, S> {
    type Item = EpochSummary;

    fn next(&mut self) -> Option<EpochSummary> {
        if self.completed >= self.epochs {
            return None;
        }
        Some(self.run_epoch())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.epochs - self.completed;
        (remaining, Some(remaining))
    }
}

impl<S: AsRef<[f64]>> ExactSizeIterator for Epochs<'_, S> {}

impl Network {
    /// Validates the corpus, fits the normalizer on it, and returns the epoch iterator.
    ///
    /// The normalizer is fitted here, once; every epoch and every later
    /// `predict` reuse it unchanged.
    pub fn train<'a, S: AsRef<[f64]>>(
        &'a mut self,
        corpus: &'a [S],
        labels: &'a [usize],
        learning_rate: f64,
        epochs: usize,
    ) -> Result<Epochs<'a, S>, TrainError> {
        check_lengths(corpus, labels)?;
        if !(learning_rate.is_finite() && learning_rate > 0.0) {
            return Err(TrainError::InvalidLearningRate(learning_rate));
        }
        let classes = self.output_width();
        if let Some((index, &label)) = labels.iter().enumerate().find(|(_, &l)| l >= classes) {
            return Err(TrainError::LabelOutOfRange {
                index,
                label,
                classes,
            });
        }
        if let Some(bad) = corpus
            .iter()
            .map(|s| s.as_ref().len())
            .find(|&w| w != self.input_width())
        {
            return Err(TrainError::InputWidth {
                expected: self.input_width(),
                actual: bad,
            });
        }

        self.normalizer = Normalizer::fit(corpus)?;
        tracing::debug!(
            samples = corpus.len(),
            epochs,
            learning_rate,
            "starting training run"
        );

        Ok(Epochs {
            network: self,
            corpus,
            labels,
            learning_rate,
            epochs,
            completed: 0,
            order: Vec::with_capacity(corpus.len()),
        })
    }

    /// Runs every epoch and collects the summaries.
    pub fn train_all<S: AsRef<[f64]>>(
        &mut self,
        corpus: &[S],
        labels: &[usize],
        learning_rate: f64,
        epochs: usize,
    ) -> Result<Vec<EpochSummary>, TrainError> {
        Ok(self.train(corpus, labels, learning_rate, epochs)?.collect())
    }

    /// Fraction of samples whose predicted class equals the label.
    pub fn accuracy<S: AsRef<[f64]>>(
        &self,
        corpus: &[S],
        labels: &[usize],
    ) -> Result<f64, TrainError> {
        check_lengths(corpus, labels)?;
        let mut correct = 0usize;
        for (sample, &label) in corpus.iter().zip(labels) {
            if self.predict(sample.as_ref())? == label {
                correct += 1;
            }
        }
        Ok(correct as f64 / corpus.len() as f64)
    }
}

fn check_lengths<S>(corpus: &[S], labels: &[usize]) -> Result<(), TrainError> {
    if corpus.is_empty() {
        return Err(TrainError::EmptyCorpus);
    }
    if corpus.len() != labels.len() {
        return Err(TrainError::LengthMismatch {
            samples: corpus.len(),
            labels: labels.len(),
        });
    }
    Ok(())
}
