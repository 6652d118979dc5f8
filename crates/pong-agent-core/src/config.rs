use serde::{Deserialize, Serialize};
use std::path::Path;
use std::{error::Error, fmt, fs, io};

/// Playfield geometry and speeds, in pixels and pixels per frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub screen_width: i32,
    pub screen_height: i32,
    pub paddle_x: i32,
    pub paddle_width: i32,
    pub paddle_height: i32,
    pub paddle_speed: i32,
    pub ball_size: i32,
    pub ball_speed: i32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            screen_width: 800,
            screen_height: 600,
            paddle_x: 25,
            paddle_width: 10,
            paddle_height: 100,
            paddle_speed: 7,
            ball_size: 10,
            ball_speed: 6,
        }
    }
}

/// Architecture and optimizer settings of a training run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub architecture: Vec<usize>,
    pub learning_rate: f64,
    pub epochs: usize,
    /// Seeds weight initialization and the per-epoch shuffles.
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            architecture: vec![2, 10, 10, 3],
            learning_rate: 0.0001,
            epochs: 500,
            seed: 42,
        }
    }
}

/// Both sections of a run configuration file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub game: GameConfig,
    pub training: TrainingConfig,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read config: {e}"),
            ConfigError::Parse(e) => write!(f, "invalid config JSON: {e}"),
            ConfigError::Invalid(msg) => write!(f, "{msg}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err)
    }
}

fn invalid(msg: impl Into<String>) -> Result<(), ConfigError> {
    Err(ConfigError::Invalid(msg.into()))
}

impl GameConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("screen_width", self.screen_width),
            ("screen_height", self.screen_height),
            ("paddle_width", self.paddle_width),
            ("paddle_height", self.paddle_height),
            ("paddle_speed", self.paddle_speed),
            ("ball_size", self.ball_size),
            ("ball_speed", self.ball_speed),
        ];
        for (name, value) in positive {
            if value <= 0 {
                return invalid(format!("{name} must be positive, got {value}"));
            }
        }
        if self.paddle_height >= self.screen_height {
            return invalid("paddle_height must be smaller than screen_height");
        }
        if self.paddle_x < 0 || self.paddle_x + self.paddle_width >= self.screen_width {
            return invalid("paddle must lie inside the screen");
        }
        if 2 * self.ball_size >= self.screen_height.min(self.screen_width) {
            return invalid("ball_size too large for the screen");
        }
        Ok(())
    }

    /// Highest reachable paddle top edge.
    pub fn paddle_travel(&self) -> i32 {
        self.screen_height - self.paddle_height
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.architecture.len() < 2 {
            return invalid("architecture needs an input and an output layer");
        }
        if self.architecture.contains(&0) {
            return invalid("layer widths must be positive");
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return invalid(format!(
                "learning_rate must be finite and positive, got {}",
                self.learning_rate
            ));
        }
        Ok(())
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.game.validate()?;
        self.training.validate()
    }

    /// Reads and validates a JSON run configuration. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}
