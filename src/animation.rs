//! The four animation modes and their per-tick frame sequences.

use std::f64::consts::TAU;

use crate::config::{BURN_PERIOD_MS, DRIVE_FPS, FLAG_FPS, FLAG_FRAMES, drive_frame_count};
use crate::frame::AnimationFrame;

/// Track position of the goal marker.
pub const GOAL_PROGRESS: f64 = 0.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnimationKind {
    Parked,
    Driving,
    Burning,
    Flag,
}

impl AnimationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AnimationKind::Parked => "parked",
            AnimationKind::Driving => "driving",
            AnimationKind::Burning => "burning",
            AnimationKind::Flag => "flag",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Animation {
    /// Single render, no timer.
    Parked(AnimationFrame),
    /// Linear move between two resting frames. `to_progress` is left unwrapped so the
    /// last lap segment interpolates forward across the start line.
    Driving {
        from_progress: f64,
        to_progress: f64,
        from_blend: f64,
        to_blend: f64,
        frame: u32,
        frames: u32,
    },
    /// Resting frame with flickering fire, forever.
    Burning(AnimationFrame),
    /// Victory wave: blend follows |sin| while the car sits on the goal.
    Flag { frame: u32 },
}

impl Animation {
    pub fn parked(frame: AnimationFrame) -> Self {
        Animation::Parked(frame)
    }

    /// One stage forward from `from`, cross-fading towards `to_blend`.
    pub fn driving(from: AnimationFrame, num_stages: u32, to_blend: f64) -> Self {
        let from_progress = from.track_progress;
        Animation::Driving {
            from_progress,
            to_progress: from_progress + 1.0 / num_stages.max(1) as f64,
            from_blend: from.color_blend,
            to_blend,
            frame: 0,
            frames: drive_frame_count(),
        }
    }

    pub fn burning(resting: AnimationFrame) -> Self {
        Animation::Burning(resting.with_fire())
    }

    pub fn flag() -> Self {
        Animation::Flag { frame: 0 }
    }

    pub fn kind(&self) -> AnimationKind {
        match self {
            Animation::Parked(_) => AnimationKind::Parked,
            Animation::Driving { .. } => AnimationKind::Driving,
            Animation::Burning(_) => AnimationKind::Burning,
            Animation::Flag { .. } => AnimationKind::Flag,
        }
    }

    /// Timer period, or `None` for modes that render once.
    pub fn period_ms(&self) -> Option<u32> {
        match self {
            Animation::Parked(_) => None,
            Animation::Driving { .. } => Some(1000 / DRIVE_FPS),
            Animation::Burning(_) => Some(BURN_PERIOD_MS),
            Animation::Flag { .. } => Some(1000 / FLAG_FPS),
        }
    }

    /// Advances one tick. `None` once a self-terminating animation has run out.
    pub fn next_frame(&mut self) -> Option<AnimationFrame> {
        match self {
            Animation::Parked(frame) | Animation::Burning(frame) => Some(*frame),
            Animation::Driving {
                from_progress,
                to_progress,
                from_blend,
                to_blend,
                frame,
                frames,
            } => {
                if *frame >= *frames {
                    return None;
                }
                *frame += 1;
                let t = *frame as f64 / *frames as f64;
                Some(AnimationFrame::new(
                    lerp(*from_progress, *to_progress, t),
                    lerp(*from_blend, *to_blend, t),
                    false,
                ))
            }
            Animation::Flag { frame } => {
                let phase = *frame as f64 / FLAG_FRAMES as f64;
                *frame = (*frame + 1) % FLAG_FRAMES;
                Some(AnimationFrame::new(
                    GOAL_PROGRESS,
                    (phase * TAU).sin().abs(),
                    false,
                ))
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Animation::Driving { frame, frames, .. } if frame >= frames)
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}
