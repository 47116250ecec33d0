//! Paints a [`SceneLayout`] onto the 2D canvas.

use std::cell::RefCell;
use std::f64::consts::TAU;
use std::rc::Rc;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use wasm_bindgen::JsValue;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, HtmlImageElement};

use crate::assets::AssetSet;
use crate::driver::Painter;
use crate::frame::AnimationFrame;
use crate::scene::{self, SceneLayout, Sprite, Track};

const GRASS: &str = "rgb(0, 150, 0)";
const INFIELD: &str = "rgb(220, 220, 220)";
const ROAD: &str = "rgb(0, 0, 0)";
const LANE_MARK: &str = "rgb(255, 255, 255)";

pub struct CanvasPainter {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    assets: Rc<AssetSet<HtmlImageElement>>,
    rng: RefCell<SmallRng>,
}

impl CanvasPainter {
    pub fn new(
        canvas: HtmlCanvasElement,
        ctx: CanvasRenderingContext2d,
        assets: Rc<AssetSet<HtmlImageElement>>,
    ) -> Self {
        Self {
            canvas,
            ctx,
            assets,
            rng: RefCell::new(SmallRng::from_entropy()),
        }
    }

    fn draw(&self, layout: &SceneLayout) {
        let ctx = &self.ctx;
        ctx.save();
        ctx.clear_rect(0.0, 0.0, layout.size, layout.size);
        draw_track(ctx, &layout.track);
        draw_sprite(ctx, &self.assets.goal, &layout.goal);
        draw_sprite(ctx, &self.assets.blue_car, &layout.blue_car);
        draw_sprite(ctx, &self.assets.red_car, &layout.red_car);
        if let Some(fire) = &layout.fire {
            draw_sprite(ctx, &self.assets.fire, fire);
        }
        ctx.restore();
    }
}

impl Painter for CanvasPainter {
    fn paint(&self, frame: &AnimationFrame) {
        let size = self.canvas.width() as f64;
        if size <= 0.0 {
            return;
        }
        let layout = scene::compose(frame, size, &mut *self.rng.borrow_mut());
        self.draw(&layout);
    }
}

fn draw_track(ctx: &CanvasRenderingContext2d, track: &Track) {
    let c = track.center;

    circle(ctx, c, track.grass_radius);
    ctx.set_fill_style(&JsValue::from_str(GRASS));
    ctx.fill();

    circle(ctx, c, track.infield_radius);
    ctx.set_fill_style(&JsValue::from_str(INFIELD));
    ctx.set_stroke_style(&JsValue::from_str(ROAD));
    ctx.set_line_width(1.0);
    ctx.stroke();
    ctx.fill();

    circle(ctx, c, track.road_radius);
    ctx.set_line_width(track.road_width);
    ctx.stroke();

    ctx.set_stroke_style(&JsValue::from_str(LANE_MARK));
    ctx.set_line_width(track.dash_width);
    for (start, stop) in track.dashes() {
        ctx.begin_path();
        ctx.arc(c, c, track.road_radius, start, stop).ok();
        ctx.stroke();
    }
}

fn circle(ctx: &CanvasRenderingContext2d, c: f64, radius: f64) {
    ctx.begin_path();
    ctx.arc(c, c, radius.max(0.0), 0.0, TAU).ok();
}

fn draw_sprite(ctx: &CanvasRenderingContext2d, img: &HtmlImageElement, sprite: &Sprite) {
    ctx.save();
    ctx.translate(sprite.x, sprite.y).ok();
    ctx.rotate(sprite.rotation).ok();
    ctx.scale(sprite.scale, sprite.scale).ok();
    ctx.set_global_alpha(sprite.alpha);
    ctx.draw_image_with_html_image_element(img, sprite.anchor.0, sprite.anchor.1)
        .ok();
    ctx.restore();
}
