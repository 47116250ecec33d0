//! Browser wiring: interval scheduler, DOM overlays, page layout and the exported
//! `Race` session handle.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use gloo::events::{EventListener, EventListenerOptions};
use gloo::timers::callback::{Interval, Timeout};
use log::{debug, info, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{CanvasRenderingContext2d, Document, HtmlCanvasElement, HtmlElement, window};

use crate::assets::session_assets;
use crate::client::{MoveClient, apply_verdict};
use crate::config::{
    CANVAS_ID, DRUGSTORE_ID, FORM_BLUE_ID, FORM_RED_ID, GAME_OVER_ID, GAME_OVER_TEXT_ID,
    NOTICE_ID, RaceConfig,
};
use crate::driver::{Scheduler, Tick, TickFn};
use crate::error::{RaceError, Result};
use crate::frame::CarColor;
use crate::machine::{Action, Overlay, RaceMachine};
use crate::render::CanvasPainter;

// --- Scheduler ---------------------------------------------------------------------

type IntervalSlot = Rc<RefCell<Option<Interval>>>;

/// `setInterval`-backed scheduler. Dropping the interval clears it.
#[derive(Default)]
pub struct BrowserScheduler;

impl Scheduler for BrowserScheduler {
    type Handle = IntervalSlot;

    fn repeat(&mut self, period_ms: u32, mut tick: TickFn) -> IntervalSlot {
        let slot: IntervalSlot = Rc::new(RefCell::new(None));
        let weak: Weak<RefCell<Option<Interval>>> = Rc::downgrade(&slot);
        let interval = Interval::new(period_ms, move || {
            if tick() == Tick::Stop {
                let Some(slot) = weak.upgrade() else { return };
                let finished = slot.borrow_mut().take();
                if let Some(finished) = finished {
                    // cannot free the closure that is currently running
                    Timeout::new(0, move || drop(finished)).forget();
                }
            }
        });
        *slot.borrow_mut() = Some(interval);
        slot
    }

    fn cancel(&mut self, handle: IntervalSlot) {
        handle.borrow_mut().take();
    }

    fn is_live(&self, handle: &IntervalSlot) -> bool {
        handle.borrow().is_some()
    }
}

// --- Overlays ----------------------------------------------------------------------

fn document() -> Result<Document> {
    window()
        .and_then(|w| w.document())
        .ok_or_else(|| RaceError::Dom("no document".into()))
}

fn html_element(doc: &Document, id: &str) -> Option<HtmlElement> {
    doc.get_element_by_id(id)?.dyn_into().ok()
}

/// Game-over panel plus an on-demand notice banner.
pub struct DomOverlay {
    doc: Document,
}

impl DomOverlay {
    pub fn new(doc: Document) -> Self {
        Self { doc }
    }

    fn notice_element(&self) -> Option<HtmlElement> {
        if let Some(el) = html_element(&self.doc, NOTICE_ID) {
            return Some(el);
        }
        let body = self.doc.body()?;
        let div: HtmlElement = self.doc.create_element("div").ok()?.dyn_into().ok()?;
        div.set_id(NOTICE_ID);
        div.set_attribute("style", "position:fixed; top:10px; left:50%; transform:translateX(-50%); font-family:sans-serif; font-size:15px; padding:6px 12px; background:rgba(0,0,0,0.7); border:1px solid #a33; border-radius:6px; color:#ffd166; z-index:50;").ok();
        body.append_child(&div).ok()?;
        Some(div)
    }
}

impl Overlay for DomOverlay {
    fn show_game_over(&self, text: &str) {
        if let Some(drugstore) = html_element(&self.doc, DRUGSTORE_ID) {
            drugstore.style().set_property("display", "none").ok();
        }
        let Some(panel) = html_element(&self.doc, GAME_OVER_ID) else {
            warn!("#{GAME_OVER_ID} missing; outcome: {text}");
            return;
        };
        panel.style().set_property("display", "block").ok();
        if let Some(label) = self.doc.get_element_by_id(GAME_OVER_TEXT_ID) {
            // victory text from the server carries <br> markup
            label.set_inner_html(text);
        }
        center_element(&self.doc, &panel);
    }

    fn show_notice(&self, text: &str) {
        if let Some(el) = self.notice_element() {
            el.set_text_content(Some(text));
            el.style().set_property("display", "block").ok();
        }
    }
}

// --- Page layout -------------------------------------------------------------------

fn viewport(doc: &Document) -> (i32, i32) {
    doc.document_element()
        .map(|root| (root.client_width(), root.client_height()))
        .unwrap_or((0, 0))
}

fn center_element(doc: &Document, el: &HtmlElement) {
    let (width, height) = viewport(doc);
    let left = (width - el.offset_width()) / 2;
    let top = (height - el.offset_height()) / 2;
    let style = el.style();
    style.set_property("left", &format!("{left}px")).ok();
    style.set_property("top", &format!("{top}px")).ok();
}

/// Makes the canvas a square fitting the viewport and recenters the panels.
fn scale_page(doc: &Document, canvas: &HtmlCanvasElement) {
    let (width, height) = viewport(doc);
    let size = width.min(height).max(0) as u32;
    canvas.set_width(size);
    canvas.set_height(size);
    center_element(doc, canvas);
    for id in [DRUGSTORE_ID, GAME_OVER_ID] {
        if let Some(el) = html_element(doc, id) {
            center_element(doc, &el);
        }
    }
}

// --- Session -----------------------------------------------------------------------

type SharedMachine = Rc<RefCell<RaceMachine<BrowserScheduler>>>;

/// The machine, move client and page listeners of one race. At most one session
/// is live per page; opening another retires the previous one.
pub struct Session {
    machine: SharedMachine,
    client: Rc<MoveClient>,
    listeners: RefCell<Vec<EventListener>>,
    live: Cell<bool>,
}

thread_local! {
    static LIVE_SESSION: RefCell<Weak<Session>> = RefCell::new(Weak::new());
}

impl Session {
    /// Registers a new session as the page's live one, retiring any predecessor.
    pub fn open(machine: RaceMachine<BrowserScheduler>, client: MoveClient) -> Rc<Self> {
        let session = Rc::new(Self {
            machine: Rc::new(RefCell::new(machine)),
            client: Rc::new(client),
            listeners: RefCell::new(Vec::new()),
            live: Cell::new(true),
        });
        let previous = LIVE_SESSION.with(|slot| slot.replace(Rc::downgrade(&session)));
        if let Some(previous) = previous.upgrade() {
            info!("replacing the running race");
            previous.retire();
        }
        session
    }

    pub fn is_live(&self) -> bool {
        self.live.get()
    }

    pub fn machine(&self) -> &SharedMachine {
        &self.machine
    }

    /// Stops the animation and detaches the page listeners. Idempotent.
    pub fn retire(&self) {
        if !self.live.replace(false) {
            return;
        }
        self.machine.borrow_mut().halt();
        self.listeners.borrow_mut().clear();
    }

    fn listen(&self, listener: EventListener) {
        if self.is_live() {
            self.listeners.borrow_mut().push(listener);
        }
    }
}

/// A running race bound to the page. Keep it alive for as long as the game is shown;
/// freeing it ends the race.
#[wasm_bindgen]
pub struct Race {
    session: Rc<Session>,
}

#[wasm_bindgen]
impl Race {
    /// Sends a color choice ("red" or "blue") to the server.
    pub fn choose(&self, color: &str) -> std::result::Result<(), JsValue> {
        let color: CarColor = color.parse()?;
        if !self.session.is_live() {
            return Err(RaceError::SessionEnded.into());
        }
        submit_move(&self.session, color);
        Ok(())
    }

    /// Re-renders the current state, e.g. after the host changed the layout.
    pub fn refresh(&self) {
        if self.session.is_live() {
            self.session.machine.borrow_mut().apply(Action::Current);
        }
    }

    pub fn stage(&self) -> u32 {
        self.session.machine.borrow().state().stage
    }

    pub fn num_stages(&self) -> u32 {
        self.session.machine.borrow().num_stages()
    }

    pub fn mode(&self) -> String {
        self.session.machine.borrow().state().mode.as_str().to_string()
    }

    /// Last animation started (`parked`, `driving`, `burning`, `flag`), if any.
    pub fn animation(&self) -> Option<String> {
        let kind = self.session.machine.borrow().animation()?;
        Some(kind.as_str().to_string())
    }

    /// Stops any running animation; the last frame stays on the canvas.
    pub fn stop(&self) {
        self.session.machine.borrow_mut().halt();
    }
}

impl Drop for Race {
    fn drop(&mut self) {
        self.session.retire();
    }
}

fn submit_move(session: &Rc<Session>, color: CarColor) {
    if session.machine.borrow().is_terminal() {
        info!("race is over; not sending {color}");
        return;
    }
    let session = Rc::clone(session);
    spawn_local(async move {
        let outcome = session.client.choose_color(color).await;
        if !session.is_live() {
            debug!("dropping answer for {color}: race was replaced");
            return;
        }
        match outcome {
            Ok(verdict) => {
                apply_verdict(&mut *session.machine.borrow_mut(), &verdict);
            }
            Err(err) => {
                warn!("move {color} failed: {err}");
                let overlay = Rc::clone(session.machine.borrow().overlay());
                overlay.show_notice(&format!("Could not reach the race server: {err}"));
            }
        }
    });
}

#[wasm_bindgen]
pub async fn start_race(license: String, num_stages: u32) -> std::result::Result<Race, JsValue> {
    let config = RaceConfig::new(license, num_stages)?;
    Ok(launch(config).await?)
}

/// Like `start_race`, taking a JSON options object (see `RaceConfig`).
#[wasm_bindgen]
pub async fn start_race_with(options_json: String) -> std::result::Result<Race, JsValue> {
    let config = RaceConfig::from_json(&options_json)?;
    Ok(launch(config).await?)
}

async fn launch(config: RaceConfig) -> Result<Race> {
    let doc = document()?;
    let canvas: HtmlCanvasElement = doc
        .get_element_by_id(CANVAS_ID)
        .ok_or_else(|| RaceError::Dom(format!("#{CANVAS_ID} missing")))?
        .dyn_into()
        .map_err(|_| RaceError::Dom(format!("#{CANVAS_ID} is not a canvas")))?;
    let ctx: CanvasRenderingContext2d = canvas
        .get_context("2d")
        .map_err(RaceError::dom)?
        .ok_or_else(|| RaceError::Dom("2d context unavailable".into()))?
        .dyn_into()
        .map_err(RaceError::dom)?;
    let overlay = Rc::new(DomOverlay::new(doc.clone()));

    scale_page(&doc, &canvas);
    let assets = match session_assets(&config.asset_root, config.asset_timeout_ms).await {
        Ok(assets) => assets,
        Err(err) => {
            overlay.show_notice(&format!("Could not load the race track: {err}"));
            return Err(err);
        }
    };

    let painter = Rc::new(CanvasPainter::new(canvas.clone(), ctx, assets));
    let machine = RaceMachine::new(config.num_stages, BrowserScheduler, painter, overlay);
    let session = Session::open(machine, MoveClient::new(&config));

    if let Some(win) = window() {
        let machine = Rc::downgrade(&session.machine);
        let doc = doc.clone();
        let canvas = canvas.clone();
        session.listen(EventListener::new(&win, "resize", move |_| {
            let Some(machine) = machine.upgrade() else { return };
            scale_page(&doc, &canvas);
            machine.borrow_mut().apply(Action::Current);
        }));
    }
    for (id, color) in [(FORM_RED_ID, CarColor::Red), (FORM_BLUE_ID, CarColor::Blue)] {
        let Some(form) = doc.get_element_by_id(id) else {
            warn!("#{id} missing; {color} can only be chosen through Race.choose");
            continue;
        };
        let weak = Rc::downgrade(&session);
        session.listen(EventListener::new_with_options(
            &form,
            "submit",
            EventListenerOptions::enable_prevent_default(),
            move |event| {
                event.prevent_default();
                event.stop_propagation();
                if let Some(session) = weak.upgrade() {
                    submit_move(&session, color);
                }
            },
        ));
    }

    session.machine.borrow_mut().apply(Action::Current);
    info!("race started with {} stages", config.num_stages);
    Ok(Race { session })
}
