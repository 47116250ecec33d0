//! Scene geometry: where every ring, dash and sprite goes for a given frame.
//!
//! Everything here is pure so it can be checked off-browser; `render` only turns a
//! [`SceneLayout`] into canvas calls.

use std::f64::consts::{PI, TAU};

use rand::Rng;

use crate::frame::AnimationFrame;

/// Layout reference size; sprites are authored for an 800px canvas.
pub const REFERENCE_SIZE: f64 = 800.0;
pub const LANE_DASHES: usize = 10;
pub const LANE_DASH_ARC: f64 = 0.4;
/// Car distance from the center relative to the canvas radius.
pub const CAR_ORBIT: f64 = 0.725;

const SPRITE_SCALE: f64 = 0.8;
const CAR_ANCHOR: (f64, f64) = (-100.0, -50.0);
const GOAL_ANCHOR: (f64, f64) = (-100.0, -63.0);
const FIRE_ANCHOR: (f64, f64) = (-90.0, -200.0);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Track {
    pub center: f64,
    pub grass_radius: f64,
    pub infield_radius: f64,
    pub road_radius: f64,
    pub road_width: f64,
    pub dash_width: f64,
}

impl Track {
    pub fn for_size(size: f64) -> Self {
        Self {
            center: size / 2.0,
            grass_radius: size / 2.0 - 10.0,
            infield_radius: (size / 2.5 - 10.0) / 2.0,
            road_radius: (size / 1.35 - 10.0) / 2.0,
            road_width: size / 7.0,
            dash_width: size / 50.0,
        }
    }

    /// (start, end) angles of each lane marker.
    pub fn dashes(&self) -> impl Iterator<Item = (f64, f64)> {
        (0..LANE_DASHES).map(|i| {
            let start = i as f64 * TAU / LANE_DASHES as f64;
            (start, start + LANE_DASH_ARC)
        })
    }
}

/// An image drawn at `(x, y)` after rotating and scaling around that point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sprite {
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub scale: f64,
    pub alpha: f64,
    /// Offset of the image's top-left corner from the placement point.
    pub anchor: (f64, f64),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneLayout {
    pub size: f64,
    pub track: Track,
    pub goal: Sprite,
    /// Always drawn fully opaque underneath the red car.
    pub blue_car: Sprite,
    pub red_car: Sprite,
    pub fire: Option<Sprite>,
}

/// Car center for a given track progress.
pub fn car_position(progress: f64, size: f64) -> (f64, f64) {
    let radius = size / 2.0;
    let angle = TAU * progress;
    (
        CAR_ORBIT * angle.sin() * radius + radius,
        CAR_ORBIT * angle.cos() * radius + radius,
    )
}

/// Opacity of the red car layered over the blue one.
pub fn red_car_alpha(color_blend: f64) -> f64 {
    1.0 - color_blend.clamp(0.0, 1.0)
}

pub fn compose<R: Rng + ?Sized>(frame: &AnimationFrame, size: f64, rng: &mut R) -> SceneLayout {
    let size_factor = size / REFERENCE_SIZE;
    let sprite_scale = SPRITE_SCALE * size_factor;
    let (car_x, car_y) = car_position(frame.track_progress, size);
    let heading = -TAU * frame.track_progress;
    let car = Sprite {
        x: car_x,
        y: car_y,
        rotation: heading,
        scale: sprite_scale,
        alpha: 1.0,
        anchor: CAR_ANCHOR,
    };
    SceneLayout {
        size,
        track: Track::for_size(size),
        goal: Sprite {
            x: size / 2.0,
            y: 0.75 * size,
            rotation: 0.0,
            scale: sprite_scale,
            alpha: 1.0,
            anchor: GOAL_ANCHOR,
        },
        blue_car: car,
        red_car: Sprite {
            alpha: red_car_alpha(frame.color_blend),
            ..car
        },
        fire: frame
            .show_fire
            .then(|| fire_sprite(car_x, car_y, size, rng)),
    }
}

/// Fire overlay with a fresh random wiggle.
fn fire_sprite<R: Rng + ?Sized>(car_x: f64, car_y: f64, size: f64, rng: &mut R) -> Sprite {
    let offset = (rng.gen_range(0.0..1.0) - 0.5) * 0.02 * size;
    let rotation = (rng.gen_range(0.0..1.0) - 0.5) * 2.0 * PI * 0.14;
    let scale = (0.65 + rng.gen_range(0.0..0.1)) * size / REFERENCE_SIZE;
    let alpha = rng.gen_range(0.5..1.0);
    Sprite {
        x: car_x + offset,
        y: car_y + offset,
        rotation,
        scale,
        alpha,
        anchor: FIRE_ANCHOR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn car_orbit_positions() {
        // progress 0 sits below the center, a quarter lap later on the right
        let (x, y) = car_position(0.0, 800.0);
        assert!(close(x, 400.0) && close(y, 400.0 + 0.725 * 400.0));
        let (x, y) = car_position(0.25, 800.0);
        assert!(close(x, 400.0 + 0.725 * 400.0) && close(y, 400.0));
    }

    #[test]
    fn heading_follows_progress() {
        let mut rng = StdRng::seed_from_u64(7);
        let layout = compose(&AnimationFrame::new(0.125, 0.0, false), 600.0, &mut rng);
        assert!(close(layout.blue_car.rotation, -TAU * 0.125));
        assert!(close(layout.red_car.rotation, layout.blue_car.rotation));
        assert!(close(layout.blue_car.scale, 0.8 * 600.0 / 800.0));
    }

    #[test]
    fn color_blend_controls_red_opacity_only() {
        let mut rng = StdRng::seed_from_u64(1);
        let red = compose(&AnimationFrame::new(0.0, 0.0, false), 800.0, &mut rng);
        assert_eq!(red.red_car.alpha, 1.0);
        assert_eq!(red.blue_car.alpha, 1.0);
        let blue = compose(&AnimationFrame::new(0.0, 1.0, false), 800.0, &mut rng);
        assert_eq!(blue.red_car.alpha, 0.0);
        assert_eq!(blue.blue_car.alpha, 1.0);
        assert_eq!(red_car_alpha(1.7), 0.0);
        assert_eq!(red_car_alpha(-0.3), 1.0);
    }

    #[test]
    fn track_proportions() {
        let track = Track::for_size(800.0);
        assert!(close(track.grass_radius, 390.0));
        assert!(close(track.infield_radius, 155.0));
        assert!(close(track.road_radius, (800.0 / 1.35 - 10.0) / 2.0));
        assert!(close(track.road_width, 800.0 / 7.0));
        assert!(close(track.dash_width, 16.0));
        let dashes: Vec<_> = track.dashes().collect();
        assert_eq!(dashes.len(), 10);
        assert!(close(dashes[1].0, TAU / 10.0));
        assert!(dashes.iter().all(|(s, e)| close(e - s, 0.4)));
    }

    #[test]
    fn fire_only_when_requested_and_jitter_stays_small() {
        let mut rng = StdRng::seed_from_u64(42);
        let calm = compose(&AnimationFrame::new(0.3, 0.0, false), 800.0, &mut rng);
        assert!(calm.fire.is_none());
        for _ in 0..200 {
            let layout = compose(&AnimationFrame::new(0.3, 0.0, true), 800.0, &mut rng);
            let fire = layout.fire.unwrap();
            assert!((fire.x - layout.blue_car.x).abs() <= 8.0);
            assert!(close(fire.x - layout.blue_car.x, fire.y - layout.blue_car.y));
            assert!(fire.rotation.abs() <= PI * 0.14);
            assert!((0.65..0.75).contains(&fire.scale));
            assert!((0.5..1.0).contains(&fire.alpha));
        }
    }

    #[test]
    fn seeded_rng_reproduces_fire() {
        let frame = AnimationFrame::new(0.5, 0.5, true);
        let a = compose(&frame, 700.0, &mut StdRng::seed_from_u64(9));
        let b = compose(&frame, 700.0, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn goal_sits_on_lower_straight() {
        let layout = compose(&AnimationFrame::new(0.0, 0.0, false), 400.0, &mut StdRng::seed_from_u64(0));
        assert!(close(layout.goal.x, 200.0));
        assert!(close(layout.goal.y, 300.0));
        assert_eq!(layout.goal.anchor, (-100.0, -63.0));
    }
}
