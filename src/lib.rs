// breath_core: guided-breathing session engine for Rust/WASM.
// Timing, phase sequencing and ball geometry live here; the page only forwards frames and draws snapshots.

mod clock;
mod config;
mod controller;
mod error;
mod scheduler;
mod sequence;
mod types;
mod visual;

use log::warn;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

pub use clock::SessionClock;
pub use config::{CycleLimit, SessionConfig, SessionConfigJson};
pub use controller::{
    is_continuous, SessionController, SessionObserver, SessionSnapshot, TickOutcome,
};
pub use error::{EngineError, SessionAction, StaleTick, TransitionError};
pub use scheduler::{FrameScheduler, JsFrameScheduler, ManualScheduler};
pub use sequence::{Phase, PhaseDurations, PhaseSequence, PhaseTrack, Span, Template};
pub use types::*;
pub use visual::{Geometry, Shape, VisualMapper, VisualState};

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Phase list for a config, as JSON. Lets the page preview a sequence before starting.
pub fn phases_json(config_json: &str) -> Result<String, EngineError> {
    let config = SessionConfig::from_json(config_json)?;
    Ok(serde_json::to_string(config.sequence().phases())?)
}

/// Build the phase list for a JSON config. Throws with the offending field on invalid input.
#[wasm_bindgen]
pub fn build_phases(config_json: &str) -> Result<String, JsValue> {
    phases_json(config_json).map_err(to_js_error)
}

/// `undefined` for a valid config, otherwise a message naming the offending field.
/// The page uses this to disable its start control.
#[wasm_bindgen]
pub fn validate_config(config_json: &str) -> Option<String> {
    SessionConfig::from_json(config_json)
        .err()
        .map(|err| err.to_string())
}

fn to_js_error(err: EngineError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Forwards lifecycle callbacks to optional JS functions `{ onStart, onStop, onComplete }`.
///
/// Callbacks are queued as microtasks, so they run after the session call that triggered
/// them has returned and may freely call back into the same `BreathSession`.
#[derive(Default)]
pub struct JsObserver {
    on_start: Option<js_sys::Function>,
    on_stop: Option<js_sys::Function>,
    on_complete: Option<js_sys::Function>,
}

impl JsObserver {
    pub fn from_object(callbacks: &JsValue) -> Self {
        if callbacks.is_undefined() || callbacks.is_null() {
            return JsObserver::default();
        }
        JsObserver {
            on_start: optional_function(callbacks, "onStart"),
            on_stop: optional_function(callbacks, "onStop"),
            on_complete: optional_function(callbacks, "onComplete"),
        }
    }
}

fn optional_function(object: &JsValue, name: &str) -> Option<js_sys::Function> {
    let value = js_sys::Reflect::get(object, &JsValue::from_str(name)).ok()?;
    if value.is_undefined() || value.is_null() {
        return None;
    }
    match value.dyn_into::<js_sys::Function>() {
        Ok(f) => Some(f),
        Err(_) => {
            warn!("callback {} is not a function, ignoring", name);
            None
        }
    }
}

fn invoke(name: &str, callback: &Option<js_sys::Function>, arg: Option<JsValue>) {
    let Some(callback) = callback else {
        return;
    };
    let bound = match arg {
        Some(arg) => callback.bind1(&JsValue::NULL, &arg).unchecked_into::<js_sys::Function>(),
        None => callback.bind(&JsValue::NULL),
    };
    if let Err(err) = queue_microtask(&bound) {
        warn!("could not queue {} callback: {:?}", name, err);
    }
}

fn queue_microtask(task: &js_sys::Function) -> Result<JsValue, JsValue> {
    let queue = js_sys::Reflect::get(&js_sys::global(), &JsValue::from_str("queueMicrotask"))?
        .dyn_into::<js_sys::Function>()?;
    queue.call1(&JsValue::NULL, task)
}

impl SessionObserver for JsObserver {
    fn on_start(&mut self) {
        invoke("onStart", &self.on_start, None);
    }

    fn on_stop(&mut self) {
        invoke("onStop", &self.on_stop, None);
    }

    fn on_complete(&mut self, total_secs: f64) {
        invoke("onComplete", &self.on_complete, Some(JsValue::from_f64(total_secs)));
    }
}

/// Breathing session exposed to JavaScript.
///
/// Timestamps are `DOMHighResTimeStamp` milliseconds, e.g. the argument of a
/// `requestAnimationFrame` callback or `performance.now()`.
///
/// # Example
/// ```js
/// const session = new BreathSession(configJson, {
///   requestFrame: (epoch) => requestAnimationFrame((t) => draw(session.tick(epoch, t))),
///   cancelFrame: (handle) => cancelAnimationFrame(handle),
/// }, { onComplete: (seconds) => saveSession(seconds, session.status()) });
/// session.start(performance.now());
/// ```
#[wasm_bindgen]
pub struct BreathSession {
    inner: SessionController<JsObserver, JsFrameScheduler>,
}

#[wasm_bindgen]
impl BreathSession {
    #[wasm_bindgen(constructor)]
    pub fn new(
        config_json: &str,
        scheduler: JsValue,
        callbacks: JsValue,
    ) -> Result<BreathSession, JsValue> {
        let config = SessionConfig::from_json(config_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?;
        let scheduler = JsFrameScheduler::from_object(&scheduler)?;
        let observer = JsObserver::from_object(&callbacks);

        Ok(BreathSession {
            inner: SessionController::new(config, observer, scheduler),
        })
    }

    /// Returns `false` if a run is already active.
    pub fn start(&mut self, now_ms: f64) -> bool {
        self.inner
            .start(Timestamp::from_millis_f64(now_ms))
            .is_ok()
    }

    /// Deliver a frame. Returns the snapshot JSON, or `undefined` for a stale frame.
    pub fn tick(&mut self, epoch: u32, now_ms: f64) -> Result<Option<String>, JsValue> {
        let outcome = self
            .inner
            .tick(Epoch::new(epoch), Timestamp::from_millis_f64(now_ms));
        outcome
            .snapshot()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    pub fn pause(&mut self, now_ms: f64) -> bool {
        self.inner
            .pause(Timestamp::from_millis_f64(now_ms))
            .is_ok()
    }

    pub fn resume(&mut self, now_ms: f64) -> bool {
        self.inner
            .resume(Timestamp::from_millis_f64(now_ms))
            .is_ok()
    }

    pub fn stop(&mut self) -> bool {
        self.inner.stop().is_ok()
    }

    /// One of `idle`, `running`, `paused`, `completed`.
    pub fn status(&self) -> String {
        self.inner.status().to_string()
    }

    pub fn epoch(&self) -> u32 {
        self.inner.epoch().as_u32()
    }

    /// Snapshot JSON at `now_ms` without advancing phases; `undefined` when idle.
    pub fn snapshot(&self, now_ms: f64) -> Result<Option<String>, JsValue> {
        self.inner
            .snapshot(Timestamp::from_millis_f64(now_ms))
            .map(|s| serde_json::to_string(&s))
            .transpose()
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Planned length in seconds, `undefined` for continuous sessions.
    pub fn planned_seconds(&self) -> Option<f64> {
        self.inner.config().planned_secs()
    }

    pub fn is_continuous(&self) -> bool {
        is_continuous(self.inner.config())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_json_lists_square_phases() {
        let json = phases_json(r#"{ "template": "square" }"#).expect("Should build phases");
        let phases: Vec<serde_json::Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(phases.len(), 4);
        assert_eq!(phases[0]["kind"], "inhale");
        assert_eq!(phases[1]["kind"], "hold");
        assert_eq!(phases[3]["duration_secs"], 4.0);
    }

    #[test]
    fn validate_config_accepts_valid_input() {
        assert_eq!(validate_config(r#"{ "template": "triangle", "cycles": 5 }"#), None);
    }

    #[test]
    fn validate_config_names_bad_field() {
        let message = validate_config(r#"{ "durations": { "inhale": -2 } }"#)
            .expect("Should reject negative inhale");
        assert!(message.contains("inhale"));

        let message = validate_config(r#"{ "cycles": 0 }"#).expect("Should reject zero cycles");
        assert!(message.contains("cycles"));
    }

    #[test]
    fn validate_config_reports_malformed_json() {
        let message = validate_config("{ not json").expect("Should reject malformed JSON");
        assert!(message.starts_with("Serialization error"));
    }

    // Note: BreathSession and the JS adapters need real JS functions, so they are only
    // exercised on the wasm32 target below.
}
