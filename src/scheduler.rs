// Frame scheduling seam. The engine never sleeps or spawns; a host scheduler calls `tick` once per frame.
// Browser hosts bridge to requestAnimationFrame; native hosts and tests drive frames by hand.

use log::warn;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::types::{Epoch, FrameHandle};

/// Per-frame callback source injected into the controller.
///
/// A requested frame must eventually call `SessionController::tick` with the epoch it
/// was requested for. A cancelled frame should not fire; if it does anyway the epoch
/// check discards it.
pub trait FrameScheduler {
    /// Ask for one callback on the next frame. `None` if the host could not schedule it.
    fn request_frame(&mut self, epoch: Epoch) -> Option<FrameHandle>;

    fn cancel_frame(&mut self, handle: FrameHandle);
}

impl<S: FrameScheduler + ?Sized> FrameScheduler for Box<S> {
    fn request_frame(&mut self, epoch: Epoch) -> Option<FrameHandle> {
        (**self).request_frame(epoch)
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        (**self).cancel_frame(handle)
    }
}

/// Scheduler for native hosts and tests: records requests, the host fires them explicitly.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next_id: u32,
    pending: Vec<(FrameHandle, Epoch)>,
    cancelled: Vec<FrameHandle>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames requested and not yet fired or cancelled.
    pub fn pending(&self) -> &[(FrameHandle, Epoch)] {
        &self.pending
    }

    /// Fire every pending frame: returns their epochs and clears the queue.
    pub fn take_due(&mut self) -> Vec<Epoch> {
        self.pending.drain(..).map(|(_, epoch)| epoch).collect()
    }

    pub fn cancelled(&self) -> &[FrameHandle] {
        &self.cancelled
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self, epoch: Epoch) -> Option<FrameHandle> {
        self.next_id = self.next_id.wrapping_add(1);
        let handle = FrameHandle::new(self.next_id);
        self.pending.push((handle, epoch));
        Some(handle)
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.pending.retain(|(h, _)| *h != handle);
        self.cancelled.push(handle);
    }
}

// =============================================================================
// WASM Bindings
// =============================================================================

/// Bridges to a JS object `{ requestFrame(epoch) -> handle, cancelFrame(handle) }`.
///
/// A typical page wires it to the animation-frame facility:
/// ```js
/// const scheduler = {
///   requestFrame: (epoch) => requestAnimationFrame((t) => render(session.tick(epoch, t))),
///   cancelFrame: (handle) => cancelAnimationFrame(handle),
/// };
/// ```
pub struct JsFrameScheduler {
    request: js_sys::Function,
    cancel: js_sys::Function,
}

impl JsFrameScheduler {
    pub fn new(request: js_sys::Function, cancel: js_sys::Function) -> Self {
        JsFrameScheduler { request, cancel }
    }

    /// Read `requestFrame` and `cancelFrame` off a JS object.
    pub fn from_object(scheduler: &JsValue) -> Result<Self, JsValue> {
        let request = js_function(scheduler, "requestFrame")?;
        let cancel = js_function(scheduler, "cancelFrame")?;
        Ok(JsFrameScheduler::new(request, cancel))
    }
}

/// Fetch a function-valued property, failing with a readable message.
pub(crate) fn js_function(object: &JsValue, name: &str) -> Result<js_sys::Function, JsValue> {
    js_sys::Reflect::get(object, &JsValue::from_str(name))?
        .dyn_into::<js_sys::Function>()
        .map_err(|_| JsValue::from_str(&format!("Invalid scheduler: {} is not a function", name)))
}

impl FrameScheduler for JsFrameScheduler {
    fn request_frame(&mut self, epoch: Epoch) -> Option<FrameHandle> {
        match self
            .request
            .call1(&JsValue::NULL, &JsValue::from(epoch.as_u32()))
        {
            Ok(handle) => handle.as_f64().map(|id| FrameHandle::new(id as u32)),
            Err(err) => {
                warn!("requestFrame threw for epoch {}: {:?}", epoch, err);
                None
            }
        }
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if let Err(err) = self
            .cancel
            .call1(&JsValue::NULL, &JsValue::from(handle.as_u32()))
        {
            warn!("cancelFrame threw for handle {}: {:?}", handle.as_u32(), err);
        }
    }
}
