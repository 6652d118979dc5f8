use crate::config::GameConfig;
use crate::network::{Network, NetworkError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::{error::Error, fmt};

const CSV_HEADER: &str = "bally,paddley,optimalmove";

/// What the classifier sees: vertical ball and paddle positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub ball_y: i32,
    pub paddle_y: i32,
}

impl GameState {
    pub fn features(&self) -> [f64; 2] {
        [self.ball_y as f64, self.paddle_y as f64]
    }
}

/// Paddle command. The discriminant is the class index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Towards larger y.
    Down = 0,
    Up = 1,
    Stay = 2,
}

impl Action {
    pub const COUNT: usize = 3;

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Action::Down),
            1 => Some(Action::Up),
            2 => Some(Action::Stay),
            _ => None,
        }
    }
}

/// Labeling rule: chase the ball, stay put when level with it.
pub fn optimal_move(state: GameState) -> Action {
    use std::cmp::Ordering;
    match state.ball_y.cmp(&state.paddle_y) {
        Ordering::Greater => Action::Down,
        Ordering::Less => Action::Up,
        Ordering::Equal => Action::Stay,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledState {
    pub state: GameState,
    pub action: Action,
}

/// Grid of states enumerated for the training corpus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CorpusGrid {
    /// Inclusive.
    pub max_ball_y: i32,
    pub ball_step: i32,
    /// Exclusive.
    pub max_paddle_y: i32,
    pub paddle_step: i32,
}

impl CorpusGrid {
    /// Every 10 px of ball height against ~50 paddle positions.
    pub fn from_game(config: &GameConfig) -> Self {
        let travel = config.paddle_travel();
        Self {
            max_ball_y: config.screen_height,
            ball_step: 10,
            max_paddle_y: travel,
            paddle_step: (travel / 50).max(1),
        }
    }
}

pub fn generate_states(grid: &CorpusGrid) -> Vec<LabeledState> {
    let ball_step = grid.ball_step.max(1) as usize;
    let paddle_step = grid.paddle_step.max(1) as usize;
    let mut states = Vec::new();
    for ball_y in (0..=grid.max_ball_y).step_by(ball_step) {
        for paddle_y in (0..grid.max_paddle_y).step_by(paddle_step) {
            let state = GameState { ball_y, paddle_y };
            states.push(LabeledState {
                state,
                action: optimal_move(state),
            });
        }
    }
    states
}

/// Splits labeled states into parallel feature and label vectors.
pub fn into_training_set(states: &[LabeledState]) -> (Vec<[f64; 2]>, Vec<usize>) {
    states
        .iter()
        .map(|s| (s.state.features(), s.action.index()))
        .unzip()
}

#[derive(Debug)]
pub enum CorpusError {
    Io(io::Error),
    MissingHeader,
    Parse { line: usize, message: String },
}

impl fmt::Display for CorpusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorpusError::Io(e) => write!(f, "{e}"),
            CorpusError::MissingHeader => write!(f, "expected CSV header `{CSV_HEADER}`"),
            CorpusError::Parse { line, message } => write!(f, "line {line}: {message}"),
        }
    }
}

impl Error for CorpusError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CorpusError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CorpusError {
    fn from(err: io::Error) -> Self {
        CorpusError::Io(err)
    }
}

pub fn write_csv<W: Write>(states: &[LabeledState], writer: W) -> Result<(), CorpusError> {
    let mut out = BufWriter::new(writer);
    writeln!(out, "{CSV_HEADER}")?;
    for s in states {
        writeln!(
            out,
            "{},{},{}",
            s.state.ball_y,
            s.state.paddle_y,
            s.action.index()
        )?;
    }
    out.flush()?;
    Ok(())
}

pub fn read_csv<R: io::Read>(reader: R) -> Result<Vec<LabeledState>, CorpusError> {
    let mut lines = BufReader::new(reader).lines();
    let header = lines.next().transpose()?;
    if header.as_deref().map(str::trim) != Some(CSV_HEADER) {
        return Err(CorpusError::MissingHeader);
    }

    let mut states = Vec::new();
    for (i, line) in lines.enumerate() {
        let line = line?;
        let line_no = i + 2;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let [ball, paddle, action] = fields[..] else {
            return Err(CorpusError::Parse {
                line: line_no,
                message: format!("expected 3 fields, found {}", fields.len()),
            });
        };
        let int = |field: &str| {
            field.parse::<i32>().map_err(|e| CorpusError::Parse {
                line: line_no,
                message: format!("`{field}`: {e}"),
            })
        };
        let state = GameState {
            ball_y: int(ball)?,
            paddle_y: int(paddle)?,
        };
        let code = int(action)?;
        let action = usize::try_from(code)
            .ok()
            .and_then(Action::from_index)
            .ok_or_else(|| CorpusError::Parse {
                line: line_no,
                message: format!("unknown action code {code}"),
            })?;
        states.push(LabeledState { state, action });
    }
    Ok(states)
}

pub fn write_csv_file(states: &[LabeledState], path: impl AsRef<Path>) -> Result<(), CorpusError> {
    let path = path.as_ref();
    write_csv(states, File::create(path)?)?;
    tracing::debug!(path = %path.display(), states = states.len(), "wrote corpus");
    Ok(())
}

pub fn read_csv_file(path: impl AsRef<Path>) -> Result<Vec<LabeledState>, CorpusError> {
    let path = path.as_ref();
    let states = read_csv(File::open(path)?)?;
    tracing::debug!(path = %path.display(), states = states.len(), "read corpus");
    Ok(states)
}

impl Network {
    /// Paddle command for a live state, using the normalizer from the last training run.
    pub fn predict_move(&self, state: GameState) -> Result<Action, NetworkError> {
        let class = self.predict(&state.features())?;
        // Networks with more than three outputs map surplus classes to `Stay`.
        Ok(Action::from_index(class).unwrap_or(Action::Stay))
    }
}
