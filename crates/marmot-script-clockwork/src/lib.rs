//! The "clockwork" engine: a small, fully deterministic Game Script
//! implementation with no interpreter behind it.
//!
//! It exists so the host and the demo loop can be exercised end to end
//! without a real scripting engine. It keeps a handful of counters,
//! reacts to a few events and honors an `AdminCommand { command: "fail" }`
//! by raising a fatal fault, which is handy for demonstrating the
//! manager's firewall.

use std::any::Any;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use marmot_events::{EventFilter, ScriptEvent};
use marmot_script_host::{EngineFault, ScriptEngine, ScriptInfo};

/// How often the engine reports a heartbeat, in ticks.
const HEARTBEAT_INTERVAL: u64 = 100;

/// Everything the clockwork engine persists across savegames.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct ClockworkState {
    /// Ticks executed over the lifetime of this script, across saves
    ticks: u64,
    /// Settlements the script has been told about and not seen abandoned
    settlements: BTreeSet<u32>,
    /// Seasons observed since the script started
    seasons_seen: u32,
    /// Last admin command routed to the script
    last_command: Option<String>,
}

/// The engine itself: state plus the script name it runs under.
pub struct ClockworkEngine {
    script: String,
    state: ClockworkState,
}

const SUBSCRIPTIONS: [EventFilter; 4] = [
    EventFilter::SettlementFounded,
    EventFilter::SettlementAbandoned,
    EventFilter::SeasonChanged,
    EventFilter::AdminCommand,
];

impl ClockworkEngine {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            state: ClockworkState::default(),
        }
    }

    /// Lifetime tick count, for tests and the demo summary.
    pub fn lifetime_ticks(&self) -> u64 {
        self.state.ticks
    }

    /// Settlements currently tracked.
    pub fn tracked_settlements(&self) -> usize {
        self.state.settlements.len()
    }
}

impl ScriptEngine for ClockworkEngine {
    fn subscriptions(&self) -> &[EventFilter] {
        &SUBSCRIPTIONS
    }

    fn deliver_event(&mut self, event: &ScriptEvent) -> Result<(), EngineFault> {
        match event {
            ScriptEvent::SettlementFounded { id, name } => {
                self.state.settlements.insert(*id);
                info!(target: "clockwork", "[{}] noted new settlement {} (#{})", self.script, name, id);
            }
            ScriptEvent::SettlementAbandoned { id } => {
                if !self.state.settlements.remove(id) {
                    warn!(target: "clockwork", "[{}] settlement #{} abandoned before we ever saw it", self.script, id);
                }
            }
            ScriptEvent::SeasonChanged { season, year } => {
                self.state.seasons_seen += 1;
                info!(target: "clockwork", "[{}] {} of year {}", self.script, season, year);
            }
            ScriptEvent::AdminCommand { command } => {
                if command == "fail" {
                    return Err(EngineFault::new("admin requested a scripted failure"));
                }
                self.state.last_command = Some(command.clone());
                info!(target: "clockwork", "[{}] admin says: {}", self.script, command);
            }
            _ => {}
        }
        Ok(())
    }

    fn tick(&mut self, _ticks: u64) -> Result<(), EngineFault> {
        self.state.ticks += 1;
        if self.state.ticks % HEARTBEAT_INTERVAL == 0 {
            info!(
                target: "clockwork",
                "[{}] heartbeat: {} lifetime ticks, {} settlements, {} seasons",
                self.script,
                self.state.ticks,
                self.state.settlements.len(),
                self.state.seasons_seen
            );
        }
        Ok(())
    }

    fn save(&self) -> Result<Option<String>, EngineFault> {
        let text = toml::to_string(&self.state)
            .map_err(|e| EngineFault::new(format!("state serialization failed: {}", e)))?;
        Ok(Some(text))
    }

    fn load(&mut self, data: &str) -> Result<(), EngineFault> {
        self.state = toml::from_str(data)
            .map_err(|e| EngineFault::new(format!("saved state unreadable: {}", e)))?;
        info!(
            target: "clockwork",
            "[{}] resumed at {} lifetime ticks",
            self.script,
            self.state.ticks
        );
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Engine factory for the host: every script resolves to a clockwork
/// engine named after it.
///
/// A real engine would compile the entry source here; the clockwork
/// engine only checks that the source is still where the scanner found
/// it, so a script deleted between scan and start refuses to construct.
pub fn clockwork_factory(
    script_info: &ScriptInfo,
) -> Result<Box<dyn ScriptEngine>, EngineFault> {
    let source = std::fs::read_to_string(&script_info.entry).map_err(|e| {
        EngineFault::new(format!("reading {}: {}", script_info.entry.display(), e))
    })?;
    debug!(
        target: "clockwork",
        "constructing engine for {} ({} bytes of source)",
        script_info.ident(),
        source.len()
    );
    Ok(Box::new(ClockworkEngine::new(script_info.name.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use marmot_events::Season;

    #[test]
    fn test_ticks_accumulate() {
        let mut engine = ClockworkEngine::new("test");
        for i in 1..=7 {
            engine.tick(i).unwrap();
        }
        assert_eq!(engine.lifetime_ticks(), 7);
    }

    #[test]
    fn test_settlement_bookkeeping() {
        let mut engine = ClockworkEngine::new("test");
        engine
            .deliver_event(&ScriptEvent::SettlementFounded {
                id: 1,
                name: "Whistlepig Hollow".to_string(),
            })
            .unwrap();
        engine
            .deliver_event(&ScriptEvent::SettlementFounded {
                id: 2,
                name: "Burrowgate".to_string(),
            })
            .unwrap();
        engine
            .deliver_event(&ScriptEvent::SettlementAbandoned { id: 1 })
            .unwrap();
        assert_eq!(engine.tracked_settlements(), 1);
    }

    #[test]
    fn test_admin_fail_command_raises_a_fault() {
        let mut engine = ClockworkEngine::new("test");
        let result = engine.deliver_event(&ScriptEvent::AdminCommand {
            command: "fail".to_string(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_save_load_round_trip() {
        let mut engine = ClockworkEngine::new("test");
        for i in 1..=42 {
            engine.tick(i).unwrap();
        }
        engine
            .deliver_event(&ScriptEvent::SeasonChanged {
                season: Season::Autumn,
                year: 2,
            })
            .unwrap();

        let saved = engine.save().unwrap().unwrap();

        let mut restored = ClockworkEngine::new("test");
        restored.load(&saved).unwrap();
        assert_eq!(restored.state, engine.state);
    }
}
