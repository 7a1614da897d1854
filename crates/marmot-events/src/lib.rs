//! Event types for the marmot Game Script system.
//!
//! This crate provides the vocabulary the simulation uses to notify the
//! active Game Script about things that happened in the world. It has no
//! dependency on the script host so that any part of the simulation can
//! raise events without pulling in the scripting machinery.

use serde::{Deserialize, Serialize};

// ============================================================================
// Event Types
// ============================================================================

/// Season of the simulation year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl std::fmt::Display for Season {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Season::Spring => write!(f, "spring"),
            Season::Summer => write!(f, "summer"),
            Season::Autumn => write!(f, "autumn"),
            Season::Winter => write!(f, "winter"),
        }
    }
}

/// Events that the simulation can raise for the active Game Script.
///
/// Delivery is fire-and-forget: a script that is not running when the event
/// is raised never sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScriptEvent {
    /// A new settlement was founded somewhere on the map
    SettlementFounded { id: u32, name: String },
    /// A settlement was abandoned and removed from the map
    SettlementAbandoned { id: u32 },
    /// The simulation year rolled into a new season
    SeasonChanged { season: Season, year: u32 },
    /// A settlement crossed a population threshold
    PopulationMilestone { settlement: u32, population: u32 },
    /// A resource deposit near a settlement ran dry
    ResourceExhausted { settlement: u32, resource: String },
    /// A trade route between two settlements was established
    TradeRouteOpened { from: u32, to: u32 },
    /// Free-form command entered on the admin console, addressed to the script
    AdminCommand { command: String },
}

impl ScriptEvent {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ScriptEvent::SettlementFounded { .. } => "settlement-founded",
            ScriptEvent::SettlementAbandoned { .. } => "settlement-abandoned",
            ScriptEvent::SeasonChanged { .. } => "season-changed",
            ScriptEvent::PopulationMilestone { .. } => "population-milestone",
            ScriptEvent::ResourceExhausted { .. } => "resource-exhausted",
            ScriptEvent::TradeRouteOpened { .. } => "trade-route-opened",
            ScriptEvent::AdminCommand { .. } => "admin-command",
        }
    }
}

// ============================================================================
// Event Filters
// ============================================================================

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    /// Subscribe to all events
    All,
    /// A settlement was founded
    SettlementFounded,
    /// A settlement was abandoned
    SettlementAbandoned,
    /// The season changed
    SeasonChanged,
    /// A settlement crossed a population threshold
    PopulationMilestone,
    /// A resource deposit ran dry
    ResourceExhausted,
    /// A trade route was established
    TradeRouteOpened,
    /// An admin console command addressed the script
    AdminCommand,
}

impl EventFilter {
    /// Check if this filter matches the given event
    pub fn matches(&self, event: &ScriptEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::SettlementFounded => {
                matches!(event, ScriptEvent::SettlementFounded { .. })
            }
            EventFilter::SettlementAbandoned => {
                matches!(event, ScriptEvent::SettlementAbandoned { .. })
            }
            EventFilter::SeasonChanged => {
                matches!(event, ScriptEvent::SeasonChanged { .. })
            }
            EventFilter::PopulationMilestone => {
                matches!(event, ScriptEvent::PopulationMilestone { .. })
            }
            EventFilter::ResourceExhausted => {
                matches!(event, ScriptEvent::ResourceExhausted { .. })
            }
            EventFilter::TradeRouteOpened => {
                matches!(event, ScriptEvent::TradeRouteOpened { .. })
            }
            EventFilter::AdminCommand => {
                matches!(event, ScriptEvent::AdminCommand { .. })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_filter_matches_everything() {
        let events = [
            ScriptEvent::SettlementFounded {
                id: 1,
                name: "Whistlepig Hollow".to_string(),
            },
            ScriptEvent::SeasonChanged {
                season: Season::Winter,
                year: 14,
            },
            ScriptEvent::AdminCommand {
                command: "status".to_string(),
            },
        ];

        for event in &events {
            assert!(EventFilter::All.matches(event));
        }
    }

    #[test]
    fn test_specific_filter_matches_only_its_event() {
        let founded = ScriptEvent::SettlementFounded {
            id: 7,
            name: "Burrowgate".to_string(),
        };
        let abandoned = ScriptEvent::SettlementAbandoned { id: 7 };

        assert!(EventFilter::SettlementFounded.matches(&founded));
        assert!(!EventFilter::SettlementFounded.matches(&abandoned));
        assert!(EventFilter::SettlementAbandoned.matches(&abandoned));
    }

    #[test]
    fn test_event_kind_names_are_stable() {
        let event = ScriptEvent::ResourceExhausted {
            settlement: 3,
            resource: "granite".to_string(),
        };
        assert_eq!(event.kind(), "resource-exhausted");
    }
}
