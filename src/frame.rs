//! Per-tick scene parameters and the small enums describing the game phase.

use std::fmt;
use std::str::FromStr;

use crate::error::RaceError;

/// Car livery chosen by the player.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CarColor {
    #[default]
    Red,
    Blue,
}

impl CarColor {
    /// Blend value at which this livery is fully visible.
    pub fn blend(self) -> f64 {
        match self {
            CarColor::Red => 0.0,
            CarColor::Blue => 1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CarColor::Red => "red",
            CarColor::Blue => "blue",
        }
    }
}

impl fmt::Display for CarColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CarColor {
    type Err = RaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "red" => Ok(CarColor::Red),
            "blue" => Ok(CarColor::Blue),
            other => Err(RaceError::UnknownAction(other.to_string())),
        }
    }
}

/// Coarse game phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Normal,
    Burn,
    Expired,
    Won,
}

impl Mode {
    /// No further moves are accepted once a terminal mode is reached.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Mode::Normal)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Normal => "normal",
            Mode::Burn => "burn",
            Mode::Expired => "expired",
            Mode::Won => "won",
        }
    }
}

/// Parameters the scene renderer needs for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimationFrame {
    /// Angular position around the loop, in [0, 1).
    pub track_progress: f64,
    /// 0 = red, 1 = blue.
    pub color_blend: f64,
    pub show_fire: bool,
}

impl AnimationFrame {
    pub fn new(track_progress: f64, color_blend: f64, show_fire: bool) -> Self {
        let track_progress = track_progress.rem_euclid(1.0);
        Self {
            // rem_euclid can round up to exactly 1.0 for tiny negative inputs
            track_progress: if track_progress >= 1.0 { 0.0 } else { track_progress },
            color_blend: color_blend.clamp(0.0, 1.0),
            show_fire,
        }
    }

    /// Frame at which the car rests after `stage` completed moves.
    pub fn resting(stage: u32, num_stages: u32, color: CarColor) -> Self {
        Self::new(stage_progress(stage, num_stages), color.blend(), false)
    }

    pub fn with_fire(self) -> Self {
        Self {
            show_fire: true,
            ..self
        }
    }
}

/// Unwrapped progress for a stage; callers wrap through [`AnimationFrame::new`].
pub fn stage_progress(stage: u32, num_stages: u32) -> f64 {
    stage as f64 / num_stages.max(1) as f64
}
