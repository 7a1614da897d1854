use tracing::{debug, error, info, trace, warn};

use marmot_events::ScriptEvent;

use crate::config::{HostConfig, ScriptSelection};
use crate::engine::EngineFactory;
use crate::error::ScriptHostError;
use crate::info::{ContentHash, ScriptFlags, ScriptIdent, ScriptInfoHandle, ScriptKind};
use crate::instance::ScriptInstance;
use crate::save::SaveSegment;
use crate::scanner::ScriptScanner;

/// Lifecycle controller for the Game Script system.
///
/// The simulation owns exactly one of these and drives it synchronously:
/// `game_loop` once per tick, everything else between ticks. It owns at
/// most one [`ScriptInstance`] at a time plus the two registries, and it
/// is the firewall between script failures and the host loop. Nothing a
/// script does propagates out of here as an unhandled fault.
pub struct ScriptManager {
    /// Tick counter for the Game Script system
    frame_counter: u64,
    /// Scheduling gate, orthogonal to the simulation's own pause state
    paused: bool,
    /// The active instance, if a script is running
    instance: Option<ScriptInstance>,
    /// Registry of runnable Game Scripts
    scripts: ScriptScanner,
    /// Registry of script libraries
    libraries: ScriptScanner,
    /// Persisted host configuration (script selection, directories)
    config: HostConfig,
    /// Builds engines when a script starts
    factory: Box<dyn EngineFactory>,
}

impl ScriptManager {
    /// Set up the Game Script system: both registries are created and run
    /// their initial scan. An unusable registry directory is an
    /// unrecoverable startup error.
    pub fn new(
        config: HostConfig,
        factory: impl EngineFactory,
    ) -> Result<Self, ScriptHostError> {
        let scripts = ScriptScanner::new(ScriptKind::Script, config.script_dir())?;
        let libraries = ScriptScanner::new(ScriptKind::Library, config.library_dir())?;

        info!(
            target: "script",
            "Game Script system ready: {} script(s), {} library(s)",
            scripts.len(),
            libraries.len()
        );

        Ok(Self {
            frame_counter: 0,
            paused: false,
            instance: None,
            scripts,
            libraries,
            config,
            factory: Box::new(factory),
        })
    }

    /// Tear the Game Script system down.
    ///
    /// Stops the active instance; with `keep_config = false` the persisted
    /// selection is discarded too, so the next setup starts clean.
    pub fn uninitialize(mut self, keep_config: bool) {
        self.reset_instance();
        if !keep_config {
            if let Err(e) = self.config.delete() {
                warn!(target: "script", "could not discard persisted config: {}", e);
            }
        }
    }

    /// Start the configured Game Script.
    ///
    /// All-or-nothing: on any failure the previous instance (if one was
    /// running) is left untouched. Having no selection configured is not a
    /// failure; the simulation simply runs without a script.
    pub fn start_new(&mut self) -> Result<(), ScriptHostError> {
        if !self.config.script.is_configured() {
            info!(
                target: "script",
                "no Game Script configured; the simulation runs without one"
            );
            return Ok(());
        }
        let name = self.config.script.name.clone().unwrap_or_default();
        let version = self.config.script.version;

        let Some(script_info) = self.scripts.find(&name, version, false) else {
            warn!(
                target: "script",
                "configured Game Script '{}' (version {:?}) is not available",
                name,
                version
            );
            return Err(ScriptHostError::ResolutionFailed {
                kind: ScriptKind::Script,
                name,
                version,
            });
        };

        let engine = self.factory.create(&script_info).map_err(|fault| {
            ScriptHostError::EngineConstruction {
                name: script_info.name.clone(),
                reason: fault.to_string(),
            }
        })?;

        self.reset_instance();
        if script_info.flags.contains(ScriptFlags::DEVELOPER_ONLY) {
            warn!(
                target: "script",
                "{} is marked developer-only",
                script_info.ident()
            );
        }
        info!(
            target: "script",
            "starting Game Script {} by '{}' ({})",
            script_info.ident(),
            script_info.author,
            script_info.short_hash()
        );
        self.instance = Some(ScriptInstance::new(script_info, engine));
        Ok(())
    }

    /// Called once per simulation tick by the host.
    ///
    /// No-op without an instance or while paused. A fatal fault inside the
    /// script stops the script, never the simulation.
    pub fn game_loop(&mut self) {
        if self.instance.is_none() {
            return;
        }
        if self.paused {
            trace!(target: "script", "Game Script is paused, skipping tick");
            return;
        }

        self.frame_counter += 1;
        let result = self.instance.as_mut().map(ScriptInstance::game_loop);
        if let Some(Err(e)) = result {
            error!(target: "script", "Game Script hit a fatal fault: {}", e);
            self.reset_instance();
        }
    }

    /// Pause script execution at tick granularity. Idempotent; recorded
    /// even without an active instance so it applies to a later start.
    pub fn pause(&mut self) {
        if !self.paused {
            debug!(target: "script", "Game Script execution paused");
        }
        self.paused = true;
    }

    /// Resume script execution. Idempotent.
    pub fn unpause(&mut self) {
        if self.paused {
            debug!(target: "script", "Game Script execution resumed");
        }
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Queue an event for the running script. Without an instance the
    /// event is dropped: scripts never observe history they missed.
    pub fn queue_event(&mut self, event: ScriptEvent) {
        match self.instance.as_mut() {
            Some(instance) => instance.queue_event(event),
            None => debug!(
                target: "script",
                "no Game Script running, dropping {} event",
                event.kind()
            ),
        }
    }

    /// The record of the currently running script.
    ///
    /// The borrow is valid until the next lifecycle call; the borrow
    /// checker enforces that no stale handle survives a restart.
    pub fn info(&self) -> Option<&ScriptInfoHandle> {
        self.instance.as_ref().map(|instance| instance.info())
    }

    /// The active instance.
    pub fn instance(&self) -> Option<&ScriptInstance> {
        self.instance.as_ref()
    }

    /// Mutable access to the active instance, for tooling and tests.
    pub fn instance_mut(&mut self) -> Option<&mut ScriptInstance> {
        self.instance.as_mut()
    }

    /// Ticks executed by the Game Script system so far.
    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    /// Re-run discovery in both registries.
    ///
    /// A running instance keeps the record it resolved at start time; new
    /// discoveries only matter from the next `start_new` on.
    pub fn rescan(&mut self) -> Result<(), ScriptHostError> {
        let scripts = self.scripts.scan();
        let libraries = self.libraries.scan();
        scripts?;
        libraries?;
        Ok(())
    }

    /// Clear the persisted script selection. Does not touch a running
    /// instance.
    pub fn reset_config(&mut self) -> Result<(), ScriptHostError> {
        self.config.script = ScriptSelection::default();
        self.config.save()
    }

    /// Produce the savegame segment for the Game Script.
    ///
    /// Non-mutating; with no instance the segment is empty. A script that
    /// fails to serialize keeps its identity in the save so it can at
    /// least be restarted fresh on load.
    pub fn save(&self) -> SaveSegment {
        let Some(instance) = self.instance.as_ref() else {
            debug!(target: "script", "no Game Script running, writing an empty save segment");
            return SaveSegment::empty();
        };

        let data = match instance.save() {
            Ok(data) => data,
            Err(e) => {
                error!(
                    target: "script",
                    "{} failed to serialize state, saving identity only: {}",
                    instance.ident(),
                    e
                );
                None
            }
        };

        SaveSegment {
            script: Some(instance.ident()),
            data,
        }
    }

    /// Restore the Game Script from a savegame segment.
    ///
    /// The exact saved version is required, and anything that goes wrong
    /// past that point degrades to "no script" as well, so the load of
    /// the surrounding game never fails on this segment. Returns whether
    /// a script is running afterwards.
    pub fn load_save(&mut self, segment: &SaveSegment) -> bool {
        self.reset_instance();

        let Some(ident) = segment.script.as_ref() else {
            return false;
        };

        let Some(script_info) = self.scripts.find(&ident.name, Some(ident.version), true) else {
            warn!(
                target: "script",
                "{}; continuing without a Game Script",
                ScriptHostError::SaveMismatch {
                    kind: ScriptKind::Script,
                    name: ident.name.clone(),
                    version: ident.version,
                }
            );
            return false;
        };

        let engine = match self.factory.create(&script_info) {
            Ok(engine) => engine,
            Err(fault) => {
                error!(
                    target: "script",
                    "could not construct an engine for saved script {}: {}; continuing without a Game Script",
                    ident,
                    fault
                );
                return false;
            }
        };

        let mut instance = ScriptInstance::new(script_info, engine);
        if let Some(data) = segment.data.as_deref() {
            if let Err(e) = instance.load_state(data) {
                error!(
                    target: "script",
                    "{} rejected its saved state: {}; continuing without a Game Script",
                    instance.ident(),
                    e
                );
                return false;
            }
        }

        info!(target: "script", "restored Game Script {}", instance.ident());
        self.instance = Some(instance);
        true
    }

    /// Write the script registry listing into `out`.
    pub fn write_console_list<W: std::fmt::Write>(
        &self,
        out: &mut W,
        newest_only: bool,
    ) -> std::fmt::Result {
        self.scripts.write_console_list(out, newest_only)
    }

    /// Write the library registry listing into `out`.
    pub fn write_console_library_list<W: std::fmt::Write>(
        &self,
        out: &mut W,
    ) -> std::fmt::Result {
        self.libraries.write_console_list(out, false)
    }

    /// All known script records.
    pub fn info_list(&self) -> Vec<ScriptInfoHandle> {
        self.scripts.info_list()
    }

    /// The newest version of each known script.
    pub fn unique_info_list(&self) -> Vec<ScriptInfoHandle> {
        self.scripts.unique_info_list()
    }

    /// Look up a script record; see [`ScriptScanner::find`] for the
    /// version-matching rules.
    pub fn find_info(
        &self,
        name: &str,
        version: Option<u32>,
        exact_match: bool,
    ) -> Option<ScriptInfoHandle> {
        self.scripts.find(name, version, exact_match)
    }

    /// Look up a library record. Library imports name a specific version,
    /// so this is always an exact match.
    pub fn find_library(&self, name: &str, version: u32) -> Option<ScriptInfoHandle> {
        self.libraries.find(name, Some(version), true)
    }

    /// Whether a described script is available locally, optionally
    /// verifying its content hash.
    pub fn has_script(&self, ident: &ScriptIdent, content_hash: Option<&ContentHash>) -> bool {
        self.scripts.verify(ident, content_hash)
    }

    /// Whether a described library is available locally, optionally
    /// verifying its content hash.
    pub fn has_library(&self, ident: &ScriptIdent, content_hash: Option<&ContentHash>) -> bool {
        self.libraries.verify(ident, content_hash)
    }

    /// The script registry.
    pub fn scripts(&self) -> &ScriptScanner {
        &self.scripts
    }

    /// The library registry.
    pub fn libraries(&self) -> &ScriptScanner {
        &self.libraries
    }

    /// Stop the active instance unconditionally, without starting a
    /// replacement. Undelivered events go down with it.
    pub fn reset_instance(&mut self) {
        if let Some(instance) = self.instance.take() {
            info!(
                target: "script",
                "stopping Game Script {} after {} tick(s), dropping {} undelivered event(s)",
                instance.ident(),
                instance.ticks(),
                instance.queued_events()
            );
        }
    }
}
