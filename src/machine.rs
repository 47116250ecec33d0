//! Game state machine: maps action tokens to state changes and animations.

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use log::{debug, info, warn};

use crate::animation::{Animation, AnimationKind};
use crate::driver::{AnimationDriver, Painter, Scheduler};
use crate::error::RaceError;
use crate::frame::{AnimationFrame, CarColor, Mode};

pub const WRONG_COLOR_MESSAGE: &str = "You took the wrong color.";
pub const EXPIRED_MESSAGE: &str = "Your driver license expired.";

/// Tokens understood by [`RaceMachine::apply`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Re-derive the animation for the current state (e.g. after a resize).
    Current,
    Burn,
    Expired,
    Move(CarColor),
    Flag,
}

impl FromStr for Action {
    type Err = RaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "current" => Ok(Action::Current),
            "burn" => Ok(Action::Burn),
            "expired" => Ok(Action::Expired),
            "flag" => Ok(Action::Flag),
            other => other.parse().map(Action::Move),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Current => f.write_str("current"),
            Action::Burn => f.write_str("burn"),
            Action::Expired => f.write_str("expired"),
            Action::Move(color) => write!(f, "{color}"),
            Action::Flag => f.write_str("flag"),
        }
    }
}

/// Text panels shown over the canvas.
pub trait Overlay {
    /// Terminal outcome message (wrong color, expired, victory text).
    fn show_game_over(&self, text: &str);
    /// Transient problem report; the game stays playable.
    fn show_notice(&self, text: &str);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GameState {
    pub stage: u32,
    pub color: CarColor,
    pub mode: Mode,
}

pub struct RaceMachine<S: Scheduler> {
    state: GameState,
    num_stages: u32,
    driver: AnimationDriver<S>,
    overlay: Rc<dyn Overlay>,
}

impl<S: Scheduler> RaceMachine<S> {
    pub fn new(
        num_stages: u32,
        scheduler: S,
        painter: Rc<dyn Painter>,
        overlay: Rc<dyn Overlay>,
    ) -> Self {
        Self {
            state: GameState::default(),
            num_stages: num_stages.max(1),
            driver: AnimationDriver::new(scheduler, painter),
            overlay,
        }
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn num_stages(&self) -> u32 {
        self.num_stages
    }

    pub fn is_terminal(&self) -> bool {
        self.state.mode.is_terminal()
    }

    pub fn is_animating(&self) -> bool {
        self.driver.is_running()
    }

    /// Mode of the last animation started, whether or not its timer still runs.
    pub fn animation(&self) -> Option<AnimationKind> {
        self.driver.current_kind()
    }

    pub fn overlay(&self) -> &Rc<dyn Overlay> {
        &self.overlay
    }

    /// Parses and applies a raw token; unknown tokens are logged and ignored.
    pub fn apply_token(&mut self, token: &str) -> Option<AnimationKind> {
        match token.parse() {
            Ok(action) => self.apply(action),
            Err(err) => {
                warn!("ignoring action: {err}");
                None
            }
        }
    }

    /// Applies `action`: cancel the running animation, update state, start the next one.
    /// Returns the animation started, or `None` if the action was rejected.
    pub fn apply(&mut self, action: Action) -> Option<AnimationKind> {
        if self.is_terminal() && action != Action::Current {
            debug!(
                "ignoring `{action}` in terminal mode {}",
                self.state.mode.as_str()
            );
            return None;
        }
        let action = match (action, self.state.mode) {
            (Action::Current, Mode::Burn) => Action::Burn,
            (Action::Current, Mode::Expired) => Action::Expired,
            (Action::Current, Mode::Won) => Action::Flag,
            (action, _) => action,
        };

        let kind = match action {
            Action::Current => self.driver.play(Animation::parked(self.resting_frame())),
            Action::Burn | Action::Expired => {
                let (mode, message) = if action == Action::Burn {
                    (Mode::Burn, WRONG_COLOR_MESSAGE)
                } else {
                    (Mode::Expired, EXPIRED_MESSAGE)
                };
                self.driver.stop();
                self.state.mode = mode;
                info!("race over: {}", mode.as_str());
                let kind = self.driver.play(Animation::burning(self.resting_frame()));
                self.overlay.show_game_over(message);
                kind
            }
            Action::Move(color) => {
                let from = self.resting_frame();
                self.driver.stop();
                self.state.stage += 1;
                self.state.color = color;
                debug!("stage {} on {color}", self.state.stage);
                self.driver
                    .play(Animation::driving(from, self.num_stages, color.blend()))
            }
            Action::Flag => {
                self.driver.stop();
                self.state.mode = Mode::Won;
                info!("race won at stage {}", self.state.stage);
                self.driver.play(Animation::flag())
            }
        };
        Some(kind)
    }

    /// Cancels any running animation (session teardown).
    pub fn halt(&mut self) {
        self.driver.stop();
    }

    fn resting_frame(&self) -> AnimationFrame {
        AnimationFrame::resting(self.state.stage, self.num_stages, self.state.color)
    }
}
