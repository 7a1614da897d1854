use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::ScriptHostError;
use crate::info::{ContentHash, ScriptFlags, ScriptIdent, ScriptInfo, ScriptInfoHandle, ScriptKind};

/// On-disk manifest for one script or library directory.
#[derive(Debug, Deserialize)]
struct Manifest {
    name: String,
    version: u32,
    #[serde(default)]
    author: String,
    #[serde(default)]
    description: String,
    /// Entry source file, relative to the script directory
    #[serde(default = "default_entry")]
    entry: PathBuf,
    #[serde(default)]
    capabilities: Vec<String>,
}

fn default_entry() -> PathBuf {
    PathBuf::from("main.mscr")
}

/// Discovers and indexes scripts of one kind under a root directory.
///
/// Each candidate is a subdirectory containing a `script.toml` (or
/// `library.toml`) manifest next to its entry source file. Records are
/// keyed by lowercased name plus version, so lookups are case-insensitive
/// and the console listing comes out sorted.
pub struct ScriptScanner {
    kind: ScriptKind,
    root: PathBuf,
    scripts: BTreeMap<(String, u32), ScriptInfoHandle>,
}

impl ScriptScanner {
    /// Create a scanner rooted at `root` and run the initial scan.
    ///
    /// Fails only when the root directory can neither be found nor created;
    /// an empty directory is a valid (empty) registry.
    pub fn new(kind: ScriptKind, root: impl Into<PathBuf>) -> Result<Self, ScriptHostError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| ScriptHostError::ScanFailed {
            dir: root.clone(),
            source,
        })?;

        let mut scanner = Self {
            kind,
            root,
            scripts: BTreeMap::new(),
        };
        scanner.scan()?;
        Ok(scanner)
    }

    /// Re-run discovery, replacing the indexed records.
    ///
    /// Individual broken candidates are logged and skipped. If the root
    /// directory itself cannot be walked, the previously indexed records
    /// are kept so a failed rescan never empties a working registry.
    pub fn scan(&mut self) -> Result<usize, ScriptHostError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(source) => {
                warn!(
                    target: "scanner",
                    "failed to read {} directory {}: {}",
                    self.kind,
                    self.root.display(),
                    source
                );
                return Err(ScriptHostError::ScanFailed {
                    dir: self.root.clone(),
                    source,
                });
            }
        };

        let mut found = BTreeMap::new();
        for entry in entries.flatten() {
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }

            let manifest_path = dir.join(self.kind.manifest_file());
            if !manifest_path.exists() {
                debug!(
                    target: "scanner",
                    "skipping {}: no {}",
                    dir.display(),
                    self.kind.manifest_file()
                );
                continue;
            }

            match read_script_info(self.kind, &dir, &manifest_path) {
                Ok(script_info) => {
                    debug!(
                        target: "scanner",
                        "found {} {} ({}) in {}",
                        self.kind,
                        script_info.ident(),
                        script_info.short_hash(),
                        dir.display()
                    );
                    let key = (script_info.name.to_ascii_lowercase(), script_info.version);
                    if let Some(previous) = found.insert(key, Arc::new(script_info)) {
                        warn!(
                            target: "scanner",
                            "duplicate {} {} in {}; keeping the later one",
                            self.kind,
                            previous.ident(),
                            dir.display()
                        );
                    }
                }
                Err(e) => {
                    warn!(
                        target: "scanner",
                        "ignoring {} candidate {}: {}",
                        self.kind,
                        dir.display(),
                        e
                    );
                }
            }
        }

        info!(
            target: "scanner",
            "indexed {} {}(s) under {}",
            found.len(),
            self.kind,
            self.root.display()
        );
        self.scripts = found;
        Ok(self.scripts.len())
    }

    /// Look up a record by name, with optional version constraints.
    ///
    /// - `version = Some(v), exact_match = true`: that exact version or none.
    /// - `version = Some(v), exact_match = false`: the highest version not
    ///   exceeding `v`.
    /// - `version = None`: the highest available version.
    pub fn find(
        &self,
        name: &str,
        version: Option<u32>,
        exact_match: bool,
    ) -> Option<ScriptInfoHandle> {
        let name = name.to_ascii_lowercase();

        match (version, exact_match) {
            (Some(v), true) => self.scripts.get(&(name, v)).cloned(),
            (Some(v), false) => self
                .scripts
                .range((name.clone(), 0)..=(name, v))
                .next_back()
                .map(|(_, script_info)| script_info.clone()),
            (None, _) => self
                .scripts
                .range((name.clone(), 0)..=(name, u32::MAX))
                .next_back()
                .map(|(_, script_info)| script_info.clone()),
        }
    }

    /// Report whether a described script is available locally, optionally
    /// also requiring its content hash to match.
    pub fn verify(&self, ident: &ScriptIdent, content_hash: Option<&ContentHash>) -> bool {
        match self.find(&ident.name, Some(ident.version), true) {
            Some(script_info) => match content_hash {
                Some(expected) => script_info.content_hash == *expected,
                None => true,
            },
            None => false,
        }
    }

    /// Write one human-readable line per record into `out`.
    ///
    /// With `newest_only`, versions are collapsed to the highest one per
    /// name (the same collapse `unique_info_list` applies).
    pub fn write_console_list<W: std::fmt::Write>(
        &self,
        out: &mut W,
        newest_only: bool,
    ) -> std::fmt::Result {
        writeln!(out, "Available {}:", self.kind.plural())?;
        let records = if newest_only {
            self.unique_info_list()
        } else {
            self.info_list()
        };
        for script_info in records {
            let marker = if script_info.flags.contains(ScriptFlags::DEVELOPER_ONLY) {
                " [developer]"
            } else {
                ""
            };
            writeln!(
                out,
                "  {:>4} {:<24} {}{}",
                format!("v{}", script_info.version),
                script_info.name,
                script_info.description,
                marker
            )?;
        }
        Ok(())
    }

    /// All indexed records, sorted by name then version.
    pub fn info_list(&self) -> Vec<ScriptInfoHandle> {
        self.scripts.values().cloned().collect()
    }

    /// The highest version of each name.
    pub fn unique_info_list(&self) -> Vec<ScriptInfoHandle> {
        let mut newest: BTreeMap<&str, &ScriptInfoHandle> = BTreeMap::new();
        for ((name, _), script_info) in &self.scripts {
            // ascending version order within a name; later entries win
            newest.insert(name.as_str(), script_info);
        }
        newest.values().map(|script_info| (*script_info).clone()).collect()
    }

    pub fn kind(&self) -> ScriptKind {
        self.kind
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}

/// Parse one manifest and hash the content it points at.
fn read_script_info(
    kind: ScriptKind,
    dir: &Path,
    manifest_path: &Path,
) -> Result<ScriptInfo, String> {
    let manifest_bytes =
        fs::read(manifest_path).map_err(|e| format!("reading manifest: {}", e))?;
    let manifest: Manifest = toml::from_str(
        std::str::from_utf8(&manifest_bytes).map_err(|e| format!("manifest not UTF-8: {}", e))?,
    )
    .map_err(|e| format!("parsing manifest: {}", e))?;

    if manifest.name.trim().is_empty() {
        return Err("manifest has an empty name".to_string());
    }
    if manifest.version == 0 {
        return Err("script versions start at 1".to_string());
    }

    let entry_path = dir.join(&manifest.entry);
    let entry_bytes = fs::read(&entry_path)
        .map_err(|e| format!("reading entry file {}: {}", entry_path.display(), e))?;

    let mut flags = ScriptFlags::empty();
    for capability in &manifest.capabilities {
        match ScriptFlags::from_capability(capability) {
            Some(flag) => flags |= flag,
            None => warn!(
                target: "scanner",
                "{}: unknown capability '{}'",
                manifest_path.display(),
                capability
            ),
        }
    }

    let mut hasher = blake3::Hasher::new();
    hasher.update(&manifest_bytes);
    hasher.update(&entry_bytes);

    Ok(ScriptInfo {
        name: manifest.name,
        version: manifest.version,
        author: manifest.author,
        description: manifest.description,
        kind,
        flags,
        dir: dir.to_path_buf(),
        entry: entry_path,
        content_hash: hasher.finalize(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_script(root: &Path, dir_name: &str, name: &str, version: u32, body: &str) {
        let dir = root.join(dir_name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("script.toml"),
            format!(
                "name = \"{}\"\nversion = {}\ndescription = \"test fixture\"\nentry = \"main.mscr\"\n",
                name, version
            ),
        )
        .unwrap();
        fs::write(dir.join("main.mscr"), body).unwrap();
    }

    #[test]
    fn test_scan_empty_root_is_a_valid_registry() {
        let tmp = tempfile::tempdir().unwrap();
        let scanner = ScriptScanner::new(ScriptKind::Script, tmp.path().join("scripts")).unwrap();
        assert!(scanner.is_empty());
    }

    #[test]
    fn test_scan_indexes_manifests() {
        let tmp = tempfile::tempdir().unwrap();
        write_script(tmp.path(), "foo-1", "Foo", 1, "tick()");
        write_script(tmp.path(), "bar-2", "Bar", 2, "tick()");

        let scanner = ScriptScanner::new(ScriptKind::Script, tmp.path()).unwrap();
        assert_eq!(scanner.len(), 2);
        assert!(scanner.find("bar", None, false).is_some());
    }

    #[test]
    fn test_scan_skips_broken_candidates() {
        let tmp = tempfile::tempdir().unwrap();
        write_script(tmp.path(), "good", "Good", 1, "tick()");

        // manifest without an entry file
        let broken = tmp.path().join("broken");
        fs::create_dir_all(&broken).unwrap();
        fs::write(broken.join("script.toml"), "name = \"Broken\"\nversion = 1\n").unwrap();

        // version 0 is invalid
        write_script(tmp.path(), "zero", "Zero", 1, "tick()");
        fs::write(
            tmp.path().join("zero").join("script.toml"),
            "name = \"Zero\"\nversion = 0\n",
        )
        .unwrap();

        let scanner = ScriptScanner::new(ScriptKind::Script, tmp.path()).unwrap();
        assert_eq!(scanner.len(), 1);
        assert!(scanner.find("good", None, false).is_some());
    }

    #[test]
    fn test_find_version_matching() {
        let tmp = tempfile::tempdir().unwrap();
        write_script(tmp.path(), "foo-1", "Foo", 1, "tick()");
        write_script(tmp.path(), "foo-2", "Foo", 2, "tick()");
        write_script(tmp.path(), "foo-5", "Foo", 5, "tick()");

        let scanner = ScriptScanner::new(ScriptKind::Script, tmp.path()).unwrap();

        // best match not exceeding the requested version
        assert_eq!(scanner.find("Foo", Some(3), false).unwrap().version, 2);
        // exact match misses
        assert!(scanner.find("Foo", Some(3), true).is_none());
        // exact match hits
        assert_eq!(scanner.find("Foo", Some(5), true).unwrap().version, 5);
        // no version requested: newest
        assert_eq!(scanner.find("foo", None, false).unwrap().version, 5);
        // nothing older than the oldest
        assert!(scanner.find("Foo", Some(0), false).is_none());
    }

    #[test]
    fn test_find_is_case_insensitive() {
        let tmp = tempfile::tempdir().unwrap();
        write_script(tmp.path(), "foo", "FooScript", 1, "tick()");

        let scanner = ScriptScanner::new(ScriptKind::Script, tmp.path()).unwrap();
        assert!(scanner.find("fooscript", Some(1), true).is_some());
        assert_eq!(scanner.find("FOOSCRIPT", None, false).unwrap().name, "FooScript");
    }

    #[test]
    fn test_verify_with_and_without_hash() {
        let tmp = tempfile::tempdir().unwrap();
        write_script(tmp.path(), "foo", "Foo", 1, "tick()");

        let scanner = ScriptScanner::new(ScriptKind::Script, tmp.path()).unwrap();
        let script_info = scanner.find("Foo", Some(1), true).unwrap();
        let ident = script_info.ident();

        assert!(scanner.verify(&ident, None));
        assert!(scanner.verify(&ident, Some(&script_info.content_hash)));

        let other_hash = blake3::hash(b"something else entirely");
        assert!(!scanner.verify(&ident, Some(&other_hash)));
        assert!(!scanner.verify(&ScriptIdent::new("Foo", 9), None));
    }

    #[test]
    fn test_rescan_picks_up_new_scripts() {
        let tmp = tempfile::tempdir().unwrap();
        write_script(tmp.path(), "foo", "Foo", 1, "tick()");

        let mut scanner = ScriptScanner::new(ScriptKind::Script, tmp.path()).unwrap();
        assert_eq!(scanner.len(), 1);

        write_script(tmp.path(), "bar", "Bar", 1, "tick()");
        scanner.scan().unwrap();
        assert_eq!(scanner.len(), 2);
    }

    #[test]
    fn test_content_hash_tracks_entry_file() {
        let tmp = tempfile::tempdir().unwrap();
        write_script(tmp.path(), "foo", "Foo", 1, "tick()");

        let mut scanner = ScriptScanner::new(ScriptKind::Script, tmp.path()).unwrap();
        let before = scanner.find("Foo", None, false).unwrap().content_hash;

        fs::write(tmp.path().join("foo").join("main.mscr"), "tick(); tock()").unwrap();
        scanner.scan().unwrap();
        let after = scanner.find("Foo", None, false).unwrap().content_hash;

        assert_ne!(before, after);
    }

    #[test]
    fn test_console_list_collapses_versions() {
        let tmp = tempfile::tempdir().unwrap();
        write_script(tmp.path(), "foo-1", "Foo", 1, "tick()");
        write_script(tmp.path(), "foo-2", "Foo", 2, "tick()");

        let scanner = ScriptScanner::new(ScriptKind::Script, tmp.path()).unwrap();

        let mut full = String::new();
        scanner.write_console_list(&mut full, false).unwrap();
        assert_eq!(full.matches("Foo").count(), 2);

        let mut newest = String::new();
        scanner.write_console_list(&mut newest, true).unwrap();
        assert_eq!(newest.matches("Foo").count(), 1);
        assert!(newest.contains("v2"));
    }

    #[test]
    fn test_capabilities_become_flags() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("dev-tool");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("script.toml"),
            "name = \"DevTool\"\nversion = 1\nentry = \"main.mscr\"\ncapabilities = [\"developer-only\", \"persists-state\", \"warp-drive\"]\n",
        )
        .unwrap();
        fs::write(dir.join("main.mscr"), "tick()").unwrap();

        let scanner = ScriptScanner::new(ScriptKind::Script, tmp.path()).unwrap();
        let script_info = scanner.find("DevTool", None, false).unwrap();

        // known capabilities are parsed, unknown ones only warn
        assert!(script_info.flags.contains(ScriptFlags::DEVELOPER_ONLY));
        assert!(script_info.flags.contains(ScriptFlags::PERSISTS_STATE));
        assert!(!script_info.flags.contains(ScriptFlags::ADMIN_COMMANDS));

        let mut listing = String::new();
        scanner.write_console_list(&mut listing, false).unwrap();
        assert!(listing.contains("[developer]"));
    }

    #[test]
    fn test_library_scanner_ignores_script_manifests() {
        let tmp = tempfile::tempdir().unwrap();
        write_script(tmp.path(), "foo", "Foo", 1, "tick()");

        let scanner = ScriptScanner::new(ScriptKind::Library, tmp.path()).unwrap();
        assert!(scanner.is_empty());
    }
}
