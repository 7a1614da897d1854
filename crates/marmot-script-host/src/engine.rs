use std::any::Any;

use marmot_events::{EventFilter, ScriptEvent};

use crate::error::EngineFault;
use crate::info::ScriptInfo;

/// Execution context of one running Game Script.
///
/// This is the boundary to the actual scripting engine. The host never
/// looks inside: it hands the engine events and ticks, and asks for
/// opaque state around savegames. Any `Err` from an engine method is a
/// fatal fault and ends the instance.
pub trait ScriptEngine: Send + 'static {
    /// Which events this engine wants delivered.
    fn subscriptions(&self) -> &[EventFilter] {
        const ALL: [EventFilter; 1] = [EventFilter::All];
        &ALL
    }

    /// Hand one event to the script.
    fn deliver_event(&mut self, event: &ScriptEvent) -> Result<(), EngineFault>;

    /// Advance the script by one unit of execution. `ticks` counts the
    /// ticks this instance has run, starting at 1.
    fn tick(&mut self, ticks: u64) -> Result<(), EngineFault>;

    /// Serialize script state for a savegame. Must not mutate the script;
    /// `None` means the script has nothing worth persisting.
    fn save(&self) -> Result<Option<String>, EngineFault>;

    /// Restore state produced by an earlier [`ScriptEngine::save`].
    fn load(&mut self, data: &str) -> Result<(), EngineFault>;

    /// Allow downcasting to the concrete engine type for state access
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Factory trait for constructing engines when a script starts.
///
/// The manager owns one factory for the lifetime of the process and calls
/// it from `start_new` and savegame restoration with the resolved record.
pub trait EngineFactory: 'static {
    /// Build an execution context for the given script.
    fn create(&self, script_info: &ScriptInfo) -> Result<Box<dyn ScriptEngine>, EngineFault>;
}

// Allow closures to be used as engine factories
impl<F> EngineFactory for F
where
    F: Fn(&ScriptInfo) -> Result<Box<dyn ScriptEngine>, EngineFault> + 'static,
{
    fn create(&self, script_info: &ScriptInfo) -> Result<Box<dyn ScriptEngine>, EngineFault> {
        (self)(script_info)
    }
}
