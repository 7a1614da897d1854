use std::path::PathBuf;
use std::sync::Arc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Content hash used to verify that two machines see the same script.
pub type ContentHash = blake3::Hash;

/// The two kinds of discoverable script content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    /// A runnable Game Script
    Script,
    /// A shared library that Game Scripts can import
    Library,
}

impl ScriptKind {
    /// Manifest file name that marks a directory as containing this kind.
    pub fn manifest_file(&self) -> &'static str {
        match self {
            ScriptKind::Script => "script.toml",
            ScriptKind::Library => "library.toml",
        }
    }

    /// Plural label for listings.
    pub fn plural(&self) -> &'static str {
        match self {
            ScriptKind::Script => "scripts",
            ScriptKind::Library => "libraries",
        }
    }
}

impl std::fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptKind::Script => write!(f, "script"),
            ScriptKind::Library => write!(f, "library"),
        }
    }
}

bitflags! {
    /// Capability flags a script declares in its manifest.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ScriptFlags: u8 {
        /// Only listed when the host runs with developer tooling enabled
        const DEVELOPER_ONLY = 1 << 0;
        /// The script serializes state into savegames
        const PERSISTS_STATE = 1 << 1;
        /// The script wants admin console commands routed to it
        const ADMIN_COMMANDS = 1 << 2;
    }
}

impl ScriptFlags {
    /// Parse a single manifest capability string.
    pub fn from_capability(capability: &str) -> Option<Self> {
        match capability {
            "developer-only" => Some(ScriptFlags::DEVELOPER_ONLY),
            "persists-state" => Some(ScriptFlags::PERSISTS_STATE),
            "admin-commands" => Some(ScriptFlags::ADMIN_COMMANDS),
            _ => None,
        }
    }
}

/// Serializable name+version identity of a script.
///
/// This is what savegames, the persisted configuration and the content
/// subsystem pass around; the full [`ScriptInfo`] never leaves the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptIdent {
    pub name: String,
    pub version: u32,
}

impl ScriptIdent {
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

impl std::fmt::Display for ScriptIdent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} v{}", self.name, self.version)
    }
}

/// Immutable descriptor of one discovered script or library.
///
/// Produced by the scanner and handed out as `Arc<ScriptInfo>`; a running
/// instance keeps its own clone, so a rescan that drops the record from the
/// registry never invalidates the script that is already bound to it.
#[derive(Debug)]
pub struct ScriptInfo {
    pub name: String,
    pub version: u32,
    pub author: String,
    pub description: String,
    pub kind: ScriptKind,
    pub flags: ScriptFlags,
    /// Directory the script was discovered in
    pub dir: PathBuf,
    /// Entry source file, relative to `dir` in the manifest
    pub entry: PathBuf,
    /// BLAKE3 over the manifest and the entry file
    pub content_hash: ContentHash,
}

impl ScriptInfo {
    /// The serializable identity of this record.
    pub fn ident(&self) -> ScriptIdent {
        ScriptIdent::new(self.name.clone(), self.version)
    }

    /// Abbreviated content hash for log lines.
    pub fn short_hash(&self) -> String {
        let hex = self.content_hash.to_hex();
        hex.as_str()[..8].to_string()
    }
}

/// Shared handle to a scanned record.
pub type ScriptInfoHandle = Arc<ScriptInfo>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_parsing() {
        assert_eq!(
            ScriptFlags::from_capability("persists-state"),
            Some(ScriptFlags::PERSISTS_STATE)
        );
        assert_eq!(ScriptFlags::from_capability("time-travel"), None);
    }

    #[test]
    fn test_ident_display() {
        let ident = ScriptIdent::new("grand-warren", 3);
        assert_eq!(ident.to_string(), "grand-warren v3");
    }

    #[test]
    fn test_manifest_file_per_kind() {
        assert_eq!(ScriptKind::Script.manifest_file(), "script.toml");
        assert_eq!(ScriptKind::Library.manifest_file(), "library.toml");
    }
}
