use crate::config::{ConfigError, GameConfig};
use crate::corpus::{optimal_move, Action, GameState};
use crate::network::{Network, NetworkError};
use serde::{Deserialize, Serialize};

/// Chooses a paddle command for each frame.
pub trait Policy {
    fn choose(&mut self, state: GameState) -> Action;
}

/// The labeling rule used as a controller.
#[derive(Clone, Copy, Debug, Default)]
pub struct OptimalPolicy;

impl Policy for OptimalPolicy {
    fn choose(&mut self, state: GameState) -> Action {
        optimal_move(state)
    }
}

/// Trained classifier used as a controller.
pub struct NetworkPolicy<'a> {
    network: &'a Network,
}

impl<'a> NetworkPolicy<'a> {
    pub fn new(network: &'a Network) -> Result<Self, NetworkError> {
        if network.input_width() != 2 {
            return Err(NetworkError::InputWidth {
                expected: 2,
                actual: network.input_width(),
            });
        }
        Ok(Self { network })
    }
}

impl Policy for NetworkPolicy<'_> {
    fn choose(&mut self, state: GameState) -> Action {
        // Input width is checked in `new`, so prediction cannot fail here.
        self.network.predict_move(state).unwrap_or(Action::Stay)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.w
            && other.x < self.x + self.w
            && self.y < other.y + other.h
            && other.y < self.y + self.h
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepEvent {
    None,
    PaddleHit,
    Miss,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSummary {
    pub frames: usize,
    pub paddle_hits: usize,
    pub misses: usize,
    pub best_score: u32,
}

/// Headless single-paddle Pong. The paddle sits on the left; the ball
/// bounces off the other three walls.
#[derive(Clone, Debug)]
pub struct Pong {
    config: GameConfig,
    paddle: Rect,
    ball: Rect,
    velocity: [i32; 2],
    score: u32,
}

impl Pong {
    pub fn new(config: GameConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let paddle = Rect {
            x: config.paddle_x,
            y: config.screen_height / 2 - config.paddle_height / 2,
            w: config.paddle_width,
            h: config.paddle_height,
        };
        let ball = Rect {
            x: 0,
            y: 0,
            w: config.ball_size,
            h: config.ball_size,
        };
        let mut game = Self {
            config,
            paddle,
            ball,
            velocity: [0, 0],
            score: 0,
        };
        game.reset_ball();
        Ok(game)
    }

    /// Ball back to the centre heading down-right; the score restarts.
    fn reset_ball(&mut self) {
        self.ball.x = self.config.screen_width / 2 - self.config.ball_size / 2;
        self.ball.y = self.config.screen_height / 2 - self.config.ball_size / 2;
        self.velocity = [self.config.ball_speed, self.config.ball_speed];
        self.score = 0;
    }

    pub fn state(&self) -> GameState {
        GameState {
            ball_y: self.ball.y,
            paddle_y: self.paddle.y,
        }
    }

    pub fn ball(&self) -> Rect {
        self.ball
    }

    pub fn paddle(&self) -> Rect {
        self.paddle
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    fn resolve_collisions(&mut self) -> StepEvent {
        let size = self.ball.w;
        if self.ball.y <= size || self.ball.y >= self.config.screen_height - size {
            self.velocity[1] = -self.velocity[1];
        }
        if self.ball.x >= self.config.screen_width - size {
            self.velocity[0] = -self.velocity[0];
        }
        if self.ball.x <= size {
            self.reset_ball();
            return StepEvent::Miss;
        }
        if self.velocity[0] < 0 && self.ball.intersects(&self.paddle) {
            self.velocity[0] = -self.velocity[0];
            self.ball.x += self.velocity[0];
            self.ball.y += self.velocity[1];
            self.score += 1;
            return StepEvent::PaddleHit;
        }
        StepEvent::None
    }

    fn apply(&mut self, action: Action) {
        let speed = self.config.paddle_speed;
        match action {
            Action::Up => self.paddle.y = (self.paddle.y - speed).max(0),
            Action::Down => {
                self.paddle.y = (self.paddle.y + speed).min(self.config.paddle_travel())
            }
            Action::Stay => {}
        }
    }

    /// One frame: move the ball, resolve collisions, then let `policy` move the paddle.
    pub fn step<P: Policy + ?Sized>(&mut self, policy: &mut P) -> StepEvent {
        self.ball.x += self.velocity[0];
        self.ball.y += self.velocity[1];
        let event = self.resolve_collisions();
        let action = policy.choose(self.state());
        self.apply(action);
        event
    }

    pub fn run<P: Policy + ?Sized>(&mut self, policy: &mut P, frames: usize) -> GameSummary {
        let mut summary = GameSummary {
            frames,
            ..GameSummary::default()
        };
        for _ in 0..frames {
            match self.step(policy) {
                StepEvent::PaddleHit => summary.paddle_hits += 1,
                StepEvent::Miss => summary.misses += 1,
                StepEvent::None => {}
            }
            summary.best_score = summary.best_score.max(self.score);
        }
        summary
    }
}
