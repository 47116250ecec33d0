//! The four sprite images and their once-per-session cache.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use gloo::timers::callback::Timeout;
use js_sys::{Function, Promise};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::HtmlImageElement;

use crate::error::{RaceError, Result, describe_js};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetKind {
    RedCar,
    BlueCar,
    Fire,
    Goal,
}

impl AssetKind {
    /// Load order; the set is only complete after the last one.
    pub const ALL: [AssetKind; 4] = [
        AssetKind::RedCar,
        AssetKind::BlueCar,
        AssetKind::Fire,
        AssetKind::Goal,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            AssetKind::RedCar => "redcar.png",
            AssetKind::BlueCar => "bluecar.png",
            AssetKind::Fire => "fire.png",
            AssetKind::Goal => "goal.png",
        }
    }

    pub fn url(self, root: &str) -> String {
        format!("{}/{}", root.trim_end_matches('/'), self.file_name())
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// One decoded handle per sprite. Immutable once built.
#[derive(Debug)]
pub struct AssetSet<I> {
    pub red_car: I,
    pub blue_car: I,
    pub fire: I,
    pub goal: I,
}

impl<I> AssetSet<I> {
    /// Loads every asset in [`AssetKind::ALL`] order, stopping at the first failure.
    pub async fn load_in_order<F, Fut>(mut load: F) -> Result<Self>
    where
        F: FnMut(AssetKind) -> Fut,
        Fut: Future<Output = Result<I>>,
    {
        let red_car = load(AssetKind::RedCar).await?;
        let blue_car = load(AssetKind::BlueCar).await?;
        let fire = load(AssetKind::Fire).await?;
        let goal = load(AssetKind::Goal).await?;
        Ok(Self {
            red_car,
            blue_car,
            fire,
            goal,
        })
    }

    pub fn get(&self, kind: AssetKind) -> &I {
        match kind {
            AssetKind::RedCar => &self.red_car,
            AssetKind::BlueCar => &self.blue_car,
            AssetKind::Fire => &self.fire,
            AssetKind::Goal => &self.goal,
        }
    }
}

/// Memoizes the first successfully loaded [`AssetSet`].
pub struct AssetCache<I> {
    slot: RefCell<Option<Rc<AssetSet<I>>>>,
}

impl<I> Default for AssetCache<I> {
    fn default() -> Self {
        Self {
            slot: RefCell::new(None),
        }
    }
}

impl<I> AssetCache<I> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Rc<AssetSet<I>>> {
        self.slot.borrow().clone()
    }

    /// Returns the cached set, or runs `load` and caches its result on success.
    /// Failures leave the cache empty so a later call tries again.
    pub async fn get_or_load<F, Fut>(&self, load: F) -> Result<Rc<AssetSet<I>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AssetSet<I>>>,
    {
        if let Some(cached) = self.get() {
            return Ok(cached);
        }
        let loaded = Rc::new(load().await?);
        // a concurrent load may have finished first; keep whichever landed first
        let mut slot = self.slot.borrow_mut();
        Ok(Rc::clone(slot.get_or_insert(loaded)))
    }
}

// --- Browser loading -------------------------------------------------------------

thread_local! {
    static SESSION_ASSETS: Rc<AssetCache<HtmlImageElement>> = Rc::new(AssetCache::new());
}

/// Session-wide sprite set, fetched from `root` on first use.
pub async fn session_assets(root: &str, timeout_ms: u32) -> Result<Rc<AssetSet<HtmlImageElement>>> {
    let cache = SESSION_ASSETS.with(Rc::clone);
    cache
        .get_or_load(|| async {
            let set = AssetSet::load_in_order(|kind| load_image(kind, root, timeout_ms)).await?;
            log::info!("sprites loaded from {root}");
            Ok(set)
        })
        .await
}

const TIMEOUT_REASON: &str = "timeout";

/// Loads one sprite from `root`; a load that has not settled after `timeout_ms`
/// is reported as [`RaceError::AssetTimeout`].
pub async fn load_image(kind: AssetKind, root: &str, timeout_ms: u32) -> Result<HtmlImageElement> {
    let img = HtmlImageElement::new().map_err(RaceError::dom)?;
    let mut settle: Option<(Function, Function)> = None;
    let promise = Promise::new(&mut |resolve, reject| settle = Some((resolve, reject)));
    let (resolve, reject) = settle.ok_or_else(|| RaceError::Dom("promise executor not run".into()))?;

    let on_error = reject.clone();
    let onload = Closure::once_into_js(move || {
        let _ = resolve.call0(&JsValue::NULL);
    });
    let onerror = Closure::once_into_js(move || {
        let _ = on_error.call1(&JsValue::NULL, &JsValue::from_str("decode or network failure"));
    });
    img.set_onload(Some(onload.unchecked_ref()));
    img.set_onerror(Some(onerror.unchecked_ref()));
    let timer = Timeout::new(timeout_ms, move || {
        let _ = reject.call1(&JsValue::NULL, &JsValue::from_str(TIMEOUT_REASON));
    });

    let url = kind.url(root);
    log::debug!("loading {url}");
    img.set_src(&url);
    let outcome = JsFuture::from(promise).await;
    drop(timer);
    img.set_onload(None);
    img.set_onerror(None);

    match outcome {
        Ok(_) => Ok(img),
        Err(reason) => Err(image_error(kind, describe_js(&reason), timeout_ms)),
    }
}

fn image_error(asset: AssetKind, reason: String, timeout_ms: u32) -> RaceError {
    if reason == TIMEOUT_REASON {
        RaceError::AssetTimeout { asset, timeout_ms }
    } else {
        RaceError::AssetLoad { asset, reason }
    }
}
