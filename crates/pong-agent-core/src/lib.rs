pub mod activation;
pub mod config;
pub mod corpus;
pub mod game;
pub mod loss;
pub mod network;
pub mod normalizer;
pub mod params;
pub mod train;

pub use config::{ConfigError, GameConfig, RunConfig, TrainingConfig};
pub use corpus::{Action, GameState, LabeledState};
pub use network::{ForwardPass, Gradients, Network, NetworkError};
pub use normalizer::{NormalizeError, Normalizer};
pub use train::{EpochSummary, Epochs, TrainError};
