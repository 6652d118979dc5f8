use serde::{Deserialize, Serialize};
use std::{error::Error, fmt};

/// Per-feature standardization fitted on a training corpus.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    means: Vec<f64>,
    stds: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    EmptyCorpus,
    RaggedCorpus { expected: usize, actual: usize, row: usize },
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeError::EmptyCorpus => {
                write!(f, "cannot fit normalization parameters on an empty corpus")
            }
            NormalizeError::RaggedCorpus {
                expected,
                actual,
                row,
            } => write!(
                f,
                "corpus row {row} has {actual} features, expected {expected}"
            ),
        }
    }
}

impl Error for NormalizeError {}

impl Normalizer {
    /// Mean 0, std 1 for every feature: `transform` returns its input unchanged.
    pub fn identity(features: usize) -> Self {
        Self {
            means: vec![0.0; features],
            stds: vec![1.0; features],
        }
    }

    /// Population mean and standard deviation of each feature.
    ///
    /// A non-positive (or non-finite) standard deviation is floored to 1.0, so
    /// a constant feature is only mean-centered.
    pub fn fit<R: AsRef<[f64]>>(corpus: &[R]) -> Result<Self, NormalizeError> {
        let first = corpus.first().ok_or(NormalizeError::EmptyCorpus)?;
        let features = first.as_ref().len();
        let n = corpus.len() as f64;

        let mut means = vec![0.0; features];
        for (row, sample) in corpus.iter().enumerate() {
            let sample = sample.as_ref();
            if sample.len() != features {
                return Err(NormalizeError::RaggedCorpus {
                    expected: features,
                    actual: sample.len(),
                    row,
                });
            }
            for (m, &x) in means.iter_mut().zip(sample) {
                *m += x;
            }
        }
        for m in &mut means {
            *m /= n;
        }

        let mut stds = vec![0.0; features];
        for sample in corpus {
            for ((s, &x), &m) in stds.iter_mut().zip(sample.as_ref()).zip(&means) {
                *s += (x - m).powi(2);
            }
        }
        for s in &mut stds {
            let std = (*s / n).sqrt();
            *s = if std > 0.0 && std.is_finite() { std } else { 1.0 };
        }

        tracing::debug!(?means, ?stds, samples = corpus.len(), "fitted normalizer");
        Ok(Self { means, stds })
    }

    pub fn features(&self) -> usize {
        self.means.len()
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn stds(&self) -> &[f64] {
        &self.stds
    }

    pub fn transform(&self, raw: &[f64]) -> Vec<f64> {
        debug_assert_eq!(raw.len(), self.means.len());
        raw.iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(&x, (&m, &s))| (x - m) / s)
            .collect()
    }
}
