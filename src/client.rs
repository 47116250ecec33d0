//! Remote move client: posts the player's color and applies the server verdict.

use std::future::Future;

use gloo::timers::callback::Timeout;
use gloo::timers::future::TimeoutFuture;
use log::{debug, warn};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{AbortController, Request, RequestInit, Response};

use crate::animation::AnimationKind;
use crate::config::RaceConfig;
use crate::driver::Scheduler;
use crate::error::{RaceError, Result, describe_js};
use crate::frame::CarColor;
use crate::machine::{Action, RaceMachine};

const RETRY_BACKOFF_MS: u32 = 250;

/// Everything `encodeURIComponent` escapes.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Server answer to a color choice.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Verdict {
    pub action: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl Verdict {
    pub fn parse(body: &str) -> Result<Self> {
        Ok(serde_json::from_str(body)?)
    }

    /// Message to show, treating an empty string as absent.
    pub fn message(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.is_empty())
    }
}

/// Feeds a verdict into the machine. A `flag` verdict also shows the victory text.
pub fn apply_verdict<S: Scheduler>(
    machine: &mut RaceMachine<S>,
    verdict: &Verdict,
) -> Option<AnimationKind> {
    let action = match verdict.action.parse::<Action>() {
        Ok(action) => action,
        Err(err) => {
            warn!("server verdict ignored: {err}");
            return None;
        }
    };
    let started = machine.apply(action);
    if action == Action::Flag && started.is_some() {
        if let Some(text) = verdict.message() {
            machine.overlay().show_game_over(text);
        }
    }
    started
}

pub struct MoveClient {
    choose_path: String,
    license: String,
    timeout_ms: u32,
    retries: u32,
}

impl MoveClient {
    pub fn new(config: &RaceConfig) -> Self {
        Self {
            choose_path: config.choose_path.clone(),
            license: config.license.clone(),
            timeout_ms: config.request_timeout_ms,
            retries: config.request_retries,
        }
    }

    pub fn choose_url(&self, color: CarColor) -> String {
        format!(
            "{}?driver_license={}&color={}",
            self.choose_path,
            utf8_percent_encode(&self.license, QUERY_VALUE),
            color
        )
    }

    /// Posts `color`, retrying transient failures, and decodes the verdict.
    pub async fn choose_color(&self, color: CarColor) -> Result<Verdict> {
        let url = self.choose_url(color);
        let (client, url) = (self, url.as_str());
        let body = send_with_retries(self.retries, move || client.post(url), TimeoutFuture::new).await?;
        Verdict::parse(&body)
    }

    async fn post(&self, url: &str) -> Result<String> {
        let window = web_sys::window().ok_or_else(|| RaceError::Dom("no window".into()))?;
        let controller = AbortController::new().map_err(RaceError::dom)?;
        let init = RequestInit::new();
        init.set_method("POST");
        init.set_signal(Some(&controller.signal()));
        let request = Request::new_with_str_and_init(url, &init).map_err(RaceError::dom)?;

        let abort = controller.clone();
        let timer = Timeout::new(self.timeout_ms, move || abort.abort());
        debug!("POST {url}");
        let sent = JsFuture::from(window.fetch_with_request(&request)).await;
        let response: Response = match sent {
            Ok(value) => value.dyn_into().map_err(RaceError::dom)?,
            Err(_) if controller.signal().aborted() => return Err(RaceError::Timeout(self.timeout_ms)),
            Err(err) => return Err(RaceError::Network(describe_js(&err))),
        };
        if response.status() != 200 {
            return Err(RaceError::Status(response.status()));
        }
        let body = JsFuture::from(response.text().map_err(RaceError::dom)?).await;
        drop(timer);
        match body {
            Ok(text) => text
                .as_string()
                .ok_or_else(|| RaceError::Network("response body is not text".into())),
            Err(_) if controller.signal().aborted() => Err(RaceError::Timeout(self.timeout_ms)),
            Err(err) => Err(RaceError::Network(describe_js(&err))),
        }
    }
}

/// Runs `send` until it succeeds, fails with a non-retryable error, or `retries`
/// extra attempts are used up. Waits `250ms * attempt` before each retry.
pub async fn send_with_retries<F, Fut, W, Wait>(retries: u32, mut send: F, mut wait: W) -> Result<String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String>>,
    W: FnMut(u32) -> Wait,
    Wait: Future<Output = ()>,
{
    let mut attempt = 0;
    loop {
        match send().await {
            Ok(body) => return Ok(body),
            Err(err) if err.is_retryable() && attempt < retries => {
                attempt += 1;
                warn!("request failed ({err}), retry {attempt}/{retries}");
                wait(RETRY_BACKOFF_MS * attempt).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{ManualScheduler, Painter};
    use crate::frame::{AnimationFrame, Mode};
    use crate::machine::Overlay;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::pin::pin;
    use std::rc::Rc;
    use std::task::{Context, Poll, Waker};

    fn ready<F: Future>(fut: F) -> F::Output {
        let mut fut = pin!(fut);
        match fut.as_mut().poll(&mut Context::from_waker(Waker::noop())) {
            Poll::Ready(out) => out,
            Poll::Pending => panic!("future suspended"),
        }
    }

    /// Replays scripted replies and records the backoff delays requested.
    fn replay(retries: u32, replies: Vec<Result<String>>) -> (Result<String>, usize, Vec<u32>) {
        let replies = RefCell::new(VecDeque::from(replies));
        let sent = RefCell::new(0);
        let waits = RefCell::new(Vec::new());
        let out = ready(send_with_retries(
            retries,
            || {
                *sent.borrow_mut() += 1;
                let reply = replies.borrow_mut().pop_front().expect("unexpected extra attempt");
                async move { reply }
            },
            |ms| {
                waits.borrow_mut().push(ms);
                async {}
            },
        ));
        (out, sent.into_inner(), waits.into_inner())
    }

    #[derive(Default)]
    struct Panel(RefCell<Vec<String>>);

    impl Painter for Panel {
        fn paint(&self, _frame: &AnimationFrame) {}
    }

    impl Overlay for Panel {
        fn show_game_over(&self, text: &str) {
            self.0.borrow_mut().push(text.to_string());
        }
        fn show_notice(&self, _text: &str) {}
    }

    fn machine() -> (RaceMachine<ManualScheduler>, Rc<Panel>) {
        let panel = Rc::new(Panel::default());
        let m = RaceMachine::new(40, ManualScheduler::new(), panel.clone(), panel.clone());
        (m, panel)
    }

    #[test]
    fn parses_server_payloads() {
        let v = Verdict::parse(r#"{"action":"blue","text":""}"#).unwrap();
        assert_eq!(v.action, "blue");
        assert_eq!(v.message(), None);
        let v = Verdict::parse(r#"{"action":"flag","text":"Winner!<br>hackover16{x}"}"#).unwrap();
        assert_eq!(v.message(), Some("Winner!<br>hackover16{x}"));
        let v = Verdict::parse(r#"{"action":"burn"}"#).unwrap();
        assert_eq!(v.text, None);
        assert!(matches!(Verdict::parse("<html>"), Err(RaceError::Decode(_))));
    }

    #[test]
    fn builds_choose_url() {
        let cfg = RaceConfig::new("MFRGGZDFMY======", 40).unwrap();
        let client = MoveClient::new(&cfg);
        assert_eq!(
            client.choose_url(CarColor::Blue),
            "/choose?driver_license=MFRGGZDFMY%3D%3D%3D%3D%3D%3D&color=blue"
        );
    }

    #[test]
    fn license_cannot_inject_query_parameters() {
        let cfg = RaceConfig::new("abc&color=red #x", 40).unwrap();
        let client = MoveClient::new(&cfg);
        assert_eq!(
            client.choose_url(CarColor::Blue),
            "/choose?driver_license=abc%26color%3Dred%20%23x&color=blue"
        );
    }

    #[test]
    fn retries_transport_errors_with_growing_backoff() {
        let (out, sent, waits) = replay(
            2,
            vec![
                Err(RaceError::Network("offline".into())),
                Err(RaceError::Status(503)),
                Ok("{}".into()),
            ],
        );
        assert_eq!(out.unwrap(), "{}");
        assert_eq!(sent, 3);
        assert_eq!(waits, vec![250, 500]);
    }

    #[test]
    fn gives_up_after_configured_retries() {
        let (out, sent, waits) = replay(
            2,
            vec![
                Err(RaceError::Status(502)),
                Err(RaceError::Status(502)),
                Err(RaceError::Status(504)),
            ],
        );
        assert!(matches!(out, Err(RaceError::Status(504))));
        assert_eq!(sent, 3);
        assert_eq!(waits.len(), 2);
    }

    #[test]
    fn timeout_is_never_retried() {
        let (out, sent, waits) = replay(2, vec![Err(RaceError::Timeout(8000))]);
        assert!(matches!(out, Err(RaceError::Timeout(8000))));
        assert_eq!(sent, 1);
        assert!(waits.is_empty());
    }

    #[test]
    fn client_error_status_fails_immediately() {
        let (out, sent, _) = replay(2, vec![Err(RaceError::Status(404))]);
        assert!(matches!(out, Err(RaceError::Status(404))));
        assert_eq!(sent, 1);
        let (out, sent, _) = replay(0, vec![Err(RaceError::Network("reset".into()))]);
        assert!(matches!(out, Err(RaceError::Network(_))));
        assert_eq!(sent, 1);
    }

    #[test]
    fn move_verdict_drives_machine() {
        let (mut m, panel) = machine();
        let v = Verdict::parse(r#"{"action":"red","text":""}"#).unwrap();
        assert_eq!(apply_verdict(&mut m, &v), Some(AnimationKind::Driving));
        assert_eq!(m.state().stage, 1);
        assert!(panel.0.borrow().is_empty());
    }

    #[test]
    fn flag_verdict_shows_server_text() {
        let (mut m, panel) = machine();
        let v = Verdict::parse(r#"{"action":"flag","text":"Winner!"}"#).unwrap();
        assert_eq!(apply_verdict(&mut m, &v), Some(AnimationKind::Flag));
        assert_eq!(m.state().mode, Mode::Won);
        assert_eq!(*panel.0.borrow(), vec!["Winner!".to_string()]);
    }

    #[test]
    fn burn_verdict_uses_fixed_message() {
        let (mut m, panel) = machine();
        let v = Verdict::parse(r#"{"action":"burn","text":"You took the wrong color."}"#).unwrap();
        apply_verdict(&mut m, &v);
        assert_eq!(panel.0.borrow().len(), 1);
        assert_eq!(m.state().mode, Mode::Burn);
    }

    #[test]
    fn unknown_verdict_is_ignored() {
        let (mut m, panel) = machine();
        let v = Verdict::parse(r#"{"action":"teleport"}"#).unwrap();
        assert_eq!(apply_verdict(&mut m, &v), None);
        assert_eq!(m.state().stage, 0);
        assert!(panel.0.borrow().is_empty());
    }
}
