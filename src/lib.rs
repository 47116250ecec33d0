//! License Race client crate.
//!
//! Draws the circular race track on a canvas and animates the car as the server
//! rules on each color choice. Game logic (`frame`, `animation`, `driver`,
//! `machine`, `scene`) is target independent; `browser`, `render` and the loaders
//! in `assets` and `client` bind it to the page.

use wasm_bindgen::prelude::*;

pub mod animation;
pub mod assets;
pub mod browser;
pub mod client;
pub mod config;
pub mod driver;
pub mod error;
pub mod frame;
pub mod logging;
pub mod machine;
pub mod render;
pub mod scene;

pub use animation::{Animation, AnimationKind};
pub use browser::{Race, Session, start_race, start_race_with};
pub use config::RaceConfig;
pub use driver::{AnimationDriver, ManualHandle, ManualScheduler, Painter, Scheduler, Tick};
pub use error::{RaceError, Result};
pub use frame::{AnimationFrame, CarColor, Mode};
pub use machine::{Action, GameState, Overlay, RaceMachine};

// Optional small allocator for size (feature gated)
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn wasm_start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    logging::init(log::LevelFilter::Info);
}

/// Adjusts console verbosity (`error`, `warn`, `info`, `debug`, `trace`, `off`).
#[wasm_bindgen]
pub fn set_log_level(level: &str) -> bool {
    match logging::parse_level(level) {
        Some(filter) => {
            logging::init(filter);
            true
        }
        None => false,
    }
}
