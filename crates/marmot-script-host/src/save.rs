use serde::{Deserialize, Serialize};

use crate::info::ScriptIdent;

/// The Game Script segment of a savegame.
///
/// The host embeds this in its own save container. An empty segment is
/// what a game without an active script writes; `data` is whatever the
/// engine produced and is meaningful only to the same script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveSegment {
    /// Identity of the script that produced `data`
    #[serde(default)]
    pub script: Option<ScriptIdent>,
    /// Opaque engine state, in an engine-defined encoding
    #[serde(default)]
    pub data: Option<String>,
}

impl SaveSegment {
    /// The segment written when no script is running.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.script.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_segment_round_trips_through_toml() {
        let segment = SaveSegment::empty();
        let text = toml::to_string(&segment).unwrap();
        let back: SaveSegment = toml::from_str(&text).unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn test_populated_segment_round_trips_through_toml() {
        let segment = SaveSegment {
            script: Some(ScriptIdent::new("grand-warren", 3)),
            data: Some("ticks = 42".to_string()),
        };
        let text = toml::to_string(&segment).unwrap();
        let back: SaveSegment = toml::from_str(&text).unwrap();
        assert_eq!(back, segment);
    }
}
