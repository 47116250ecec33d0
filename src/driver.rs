//! Animation driver: owns the one live animation timer.
//!
//! Every mode change goes through [`AnimationDriver::play`], which cancels the
//! previous timer before scheduling the next one. Timers sit behind [`Scheduler`]
//! so the browser can use `gloo` intervals while tests tick by hand.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::animation::{Animation, AnimationKind};
use crate::frame::AnimationFrame;

/// Returned by a timer callback to keep or end its interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    Continue,
    Stop,
}

pub type TickFn = Box<dyn FnMut() -> Tick>;

/// Source of repeating timers.
pub trait Scheduler {
    type Handle;

    /// Calls `tick` every `period_ms` until it returns [`Tick::Stop`] or is cancelled.
    fn repeat(&mut self, period_ms: u32, tick: TickFn) -> Self::Handle;
    fn cancel(&mut self, handle: Self::Handle);
    fn is_live(&self, handle: &Self::Handle) -> bool;
}

/// Sink for rendered frames (the canvas in the browser).
pub trait Painter {
    fn paint(&self, frame: &AnimationFrame);
}

pub struct AnimationDriver<S: Scheduler> {
    scheduler: S,
    painter: Rc<dyn Painter>,
    active: Option<S::Handle>,
    kind: Option<AnimationKind>,
}

impl<S: Scheduler> AnimationDriver<S> {
    pub fn new(scheduler: S, painter: Rc<dyn Painter>) -> Self {
        Self {
            scheduler,
            painter,
            active: None,
            kind: None,
        }
    }

    /// Replaces whatever is running with `animation`.
    pub fn play(&mut self, mut animation: Animation) -> AnimationKind {
        self.stop();
        let kind = animation.kind();
        self.kind = Some(kind);
        let Some(period) = animation.period_ms() else {
            if let Some(frame) = animation.next_frame() {
                self.painter.paint(&frame);
            }
            return kind;
        };
        log::debug!("starting {kind:?} animation every {period}ms");
        let painter = Rc::clone(&self.painter);
        let handle = self.scheduler.repeat(
            period,
            Box::new(move || match animation.next_frame() {
                Some(frame) => {
                    painter.paint(&frame);
                    if animation.is_finished() {
                        Tick::Stop
                    } else {
                        Tick::Continue
                    }
                }
                None => Tick::Stop,
            }),
        );
        self.active = Some(handle);
        kind
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.active.take() {
            self.scheduler.cancel(handle);
        }
    }

    /// Whether a timer is still scheduled (self-terminated drives report false).
    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|handle| self.scheduler.is_live(handle))
    }

    /// Mode of the most recent `play`, even if its timer has since ended.
    pub fn current_kind(&self) -> Option<AnimationKind> {
        self.kind
    }
}

impl<S: Scheduler> Drop for AnimationDriver<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

// --- Manual scheduler -----------------------------------------------------------

struct ManualTimer {
    period_ms: u32,
    generation: u64,
    tick: Option<TickFn>,
}

/// Slot index plus the generation it was issued under, so a stale handle never
/// cancels a later timer that reused the slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ManualHandle {
    slot: usize,
    generation: u64,
}

/// Scheduler advanced by explicit [`ManualScheduler::advance`] calls. Clones share
/// the same timer table, so a host can keep one to drive the clock. Finished or
/// cancelled slots are reused.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    timers: Rc<RefCell<Vec<ManualTimer>>>,
    issued: Rc<Cell<u64>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires every live timer once; returns how many fired.
    pub fn advance(&self) -> usize {
        let mut timers = self.timers.borrow_mut();
        let mut fired = 0;
        for timer in timers.iter_mut() {
            if let Some(tick) = timer.tick.as_mut() {
                fired += 1;
                if tick() == Tick::Stop {
                    timer.tick = None;
                }
            }
        }
        fired
    }

    pub fn live_timers(&self) -> usize {
        self.timers
            .borrow()
            .iter()
            .filter(|t| t.tick.is_some())
            .count()
    }

    /// Size of the timer table, live or not.
    pub fn capacity(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Period of the live timer, if exactly one is scheduled.
    pub fn live_period(&self) -> Option<u32> {
        let timers = self.timers.borrow();
        let mut live = timers.iter().filter(|t| t.tick.is_some());
        match (live.next(), live.next()) {
            (Some(t), None) => Some(t.period_ms),
            _ => None,
        }
    }
}

impl Scheduler for ManualScheduler {
    type Handle = ManualHandle;

    fn repeat(&mut self, period_ms: u32, tick: TickFn) -> ManualHandle {
        let generation = self.issued.get() + 1;
        self.issued.set(generation);
        let timer = ManualTimer {
            period_ms,
            generation,
            tick: Some(tick),
        };
        let mut timers = self.timers.borrow_mut();
        let slot = match timers.iter().position(|t| t.tick.is_none()) {
            Some(free) => {
                timers[free] = timer;
                free
            }
            None => {
                timers.push(timer);
                timers.len() - 1
            }
        };
        ManualHandle { slot, generation }
    }

    fn cancel(&mut self, handle: ManualHandle) {
        if let Some(timer) = self.timers.borrow_mut().get_mut(handle.slot) {
            if timer.generation == handle.generation {
                timer.tick = None;
            }
        }
    }

    fn is_live(&self, handle: &ManualHandle) -> bool {
        self.timers
            .borrow()
            .get(handle.slot)
            .is_some_and(|t| t.generation == handle.generation && t.tick.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::CarColor;

    #[derive(Default)]
    struct Recorder(RefCell<Vec<AnimationFrame>>);

    impl Painter for Recorder {
        fn paint(&self, frame: &AnimationFrame) {
            self.0.borrow_mut().push(*frame);
        }
    }

    fn driver() -> (AnimationDriver<ManualScheduler>, ManualScheduler, Rc<Recorder>) {
        let clock = ManualScheduler::new();
        let rec = Rc::new(Recorder::default());
        let driver = AnimationDriver::new(clock.clone(), rec.clone());
        (driver, clock, rec)
    }

    #[test]
    fn parked_paints_once_without_timer() {
        let (mut d, clock, rec) = driver();
        d.play(Animation::parked(AnimationFrame::resting(2, 40, CarColor::Red)));
        assert_eq!(rec.0.borrow().len(), 1);
        assert_eq!(clock.live_timers(), 0);
        assert!(!d.is_running());
    }

    #[test]
    fn play_replaces_previous_timer() {
        let (mut d, clock, _rec) = driver();
        let rest = AnimationFrame::resting(0, 40, CarColor::Red);
        d.play(Animation::burning(rest));
        d.play(Animation::flag());
        d.play(Animation::burning(rest));
        assert_eq!(clock.live_timers(), 1);
        assert_eq!(clock.live_period(), Some(100));
    }

    #[test]
    fn drive_stops_itself() {
        let (mut d, clock, rec) = driver();
        d.play(Animation::driving(
            AnimationFrame::resting(0, 40, CarColor::Red),
            40,
            1.0,
        ));
        for _ in 0..16 {
            assert_eq!(clock.advance(), 1);
        }
        assert!(!d.is_running());
        assert_eq!(clock.advance(), 0);
        assert_eq!(rec.0.borrow().len(), 16);
        assert_eq!(d.current_kind(), Some(AnimationKind::Driving));
    }

    #[test]
    fn timer_table_reuses_finished_slots() {
        let (mut d, clock, _rec) = driver();
        let rest = AnimationFrame::resting(0, 40, CarColor::Red);
        for stage in 0..200 {
            d.play(Animation::driving(
                AnimationFrame::resting(stage, 40, CarColor::Red),
                40,
                0.0,
            ));
            clock.advance();
            d.play(Animation::burning(rest));
        }
        assert_eq!(clock.live_timers(), 1);
        assert_eq!(clock.capacity(), 1);
    }

    #[test]
    fn stale_handle_leaves_reused_slot_alone() {
        let mut clock = ManualScheduler::new();
        let first = clock.repeat(33, Box::new(|| Tick::Stop));
        clock.advance();
        assert!(!clock.is_live(&first));
        let second = clock.repeat(100, Box::new(|| Tick::Continue));
        assert_eq!(clock.capacity(), 1);
        clock.cancel(first);
        assert!(clock.is_live(&second));
        assert_eq!(clock.live_period(), Some(100));
    }

    #[test]
    fn drop_cancels_timer() {
        let (mut d, clock, _rec) = driver();
        d.play(Animation::flag());
        assert_eq!(clock.live_timers(), 1);
        drop(d);
        assert_eq!(clock.live_timers(), 0);
    }
}
