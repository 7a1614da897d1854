use std::any::Any;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, trace};

use marmot_events::ScriptEvent;

use crate::engine::ScriptEngine;
use crate::error::{EngineFault, ScriptHostError};
use crate::info::{ScriptInfoHandle, ScriptIdent};

/// The live, resumable execution context bound to one script record.
///
/// Owns the engine and the not-yet-delivered event queue; both go away
/// with the instance, so a replacement script never observes events
/// raised before it existed.
pub struct ScriptInstance {
    info: ScriptInfoHandle,
    engine: Box<dyn ScriptEngine>,
    events: VecDeque<ScriptEvent>,
    ticks: u64,
}

impl ScriptInstance {
    pub fn new(info: ScriptInfoHandle, engine: Box<dyn ScriptEngine>) -> Self {
        Self {
            info,
            engine,
            events: VecDeque::new(),
            ticks: 0,
        }
    }

    /// The record this instance is bound to.
    pub fn info(&self) -> &ScriptInfoHandle {
        &self.info
    }

    /// Identity shorthand for logs and saves.
    pub fn ident(&self) -> ScriptIdent {
        self.info.ident()
    }

    /// Ticks this instance has executed.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Events waiting for the next tick.
    pub fn queued_events(&self) -> usize {
        self.events.len()
    }

    /// Enqueue an event for FIFO delivery at the next tick this instance
    /// actually runs.
    pub fn queue_event(&mut self, event: ScriptEvent) {
        trace!(target: "script", "queueing {} for {}", event.kind(), self.ident());
        self.events.push_back(event);
    }

    /// Deliver pending events in order, then advance execution one tick.
    ///
    /// Both engine errors and engine panics come back as
    /// [`ScriptHostError::ExecutionFault`]; the caller decides what to do
    /// with the instance (the manager tears it down).
    pub fn game_loop(&mut self) -> Result<(), ScriptHostError> {
        while let Some(event) = self.events.pop_front() {
            let subscribed = self
                .engine
                .subscriptions()
                .iter()
                .any(|filter| filter.matches(&event));
            if !subscribed {
                trace!(
                    target: "script",
                    "{} is not subscribed to {}",
                    self.ident(),
                    event.kind()
                );
                continue;
            }

            debug!(target: "script", "delivering {} to {}", event.kind(), self.ident());
            run_guarded("event delivery", || self.engine.deliver_event(&event))?;
        }

        self.ticks += 1;
        run_guarded("tick", || self.engine.tick(self.ticks))
    }

    /// Ask the engine for its opaque savegame state. Non-mutating.
    pub fn save(&self) -> Result<Option<String>, ScriptHostError> {
        run_guarded("save", || self.engine.save())
    }

    /// Feed previously saved state back into the engine.
    pub fn load_state(&mut self, data: &str) -> Result<(), ScriptHostError> {
        run_guarded("load", || self.engine.load(data))
    }

    /// Downcast access to the concrete engine, for tests and tooling.
    pub fn engine_as_any_mut(&mut self) -> &mut dyn Any {
        self.engine.as_any_mut()
    }
}

/// Run one engine call behind the fault firewall.
///
/// A panicking script must not take the simulation down with it, so the
/// call is wrapped in `catch_unwind` and both panics and engine faults
/// are reported as execution faults.
fn run_guarded<T>(
    what: &str,
    f: impl FnOnce() -> Result<T, EngineFault>,
) -> Result<T, ScriptHostError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(fault)) => Err(ScriptHostError::ExecutionFault(format!(
            "{} failed: {}",
            what, fault
        ))),
        Err(payload) => Err(ScriptHostError::ExecutionFault(format!(
            "script panicked during {}: {}",
            what,
            panic_message(payload.as_ref())
        ))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
