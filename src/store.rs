//! Module config store
//!
//! Three layers make up the configuration a module sees:
//! 1. schema defaults, resolved with overrides and persisted by
//!    [`EtcStore::create_default`] to `<root>/etc/<module>/config.json`
//! 2. the persisted file, cached per module on first [`EtcStore::load`]
//! 3. the runtime layer (own [`EtcStore::save_run`] writes plus snapshots
//!    of other live instances), assigned over the cached config on every load
//!
//! Cache policy: a successful write of a module's config file through the
//! store drops that module's cache entry, so the next `load` re-reads it.
//! Edits made by other processes are only seen after a restart or through
//! [`EtcStore::read`].

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info};
use xcraft_overlay::{merge_flat, resolve, FieldDef, ModuleConfig, Overrides};

use crate::constants::{
    resolve_root, BOOTSTRAP_MODULE, BOOTSTRAP_ROOT_KEY, CONFIG_FILE, ETC_DIR, RUN_DIR,
};
use crate::error::{EtcError, Result};
use crate::json_file;
use crate::overrides::{collect_overrides, OverrideSource, SourceRecord};
use crate::probe::{ProcessProbe, SystemProbe};
use crate::registry::{DaemonRegistry, SweepReport};
use crate::schema::{load_modules, ModuleFilter};
use crate::wizard::{Prompter, Reconfiguration, ReconfigureReport};

/// Construction options for [`EtcStore`].
pub struct StoreOptions {
    /// Process id owning the run file (defaults to the current process).
    pub pid: u32,
    /// Liveness check used when sweeping run files.
    pub probe: Box<dyn ProcessProbe>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            pid: std::process::id(),
            probe: Box::new(SystemProbe),
        }
    }
}

impl StoreOptions {
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = pid;
        self
    }

    pub fn with_probe(mut self, probe: impl ProcessProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }
}

/// Result of [`EtcStore::create_all`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateReport {
    /// Modules whose config file was written, in discovery order.
    pub created: Vec<String>,
    /// Override sources that were merged, in precedence order.
    pub sources: Vec<SourceRecord>,
}

/// Per-process configuration store rooted at one directory.
#[derive(Debug)]
pub struct EtcStore {
    root: PathBuf,
    etc_path: PathBuf,
    cache: HashMap<String, ModuleConfig>,
    registry: DaemonRegistry,
    sweep: SweepReport,
}

impl EtcStore {
    /// Open the store for `root` with the current process id and the system
    /// liveness probe.
    pub fn open(root: impl AsRef<Path>) -> Self {
        Self::open_with(root, StoreOptions::default())
    }

    /// Open the store for the explicit root, or `XCRAFT_ROOT` when none is
    /// given. Returns `None` when neither is available.
    pub fn from_env(root: Option<&Path>) -> Option<Self> {
        resolve_root(root).map(Self::open)
    }

    /// Open the store.
    ///
    /// A missing `etc` directory is logged but does not fail: every lookup
    /// then reports absent configuration. When the bootstrap module config
    /// exists, the run directory of its `xcraftRoot` (default: `root`) is
    /// swept for other instances.
    pub fn open_with(root: impl AsRef<Path>, options: StoreOptions) -> Self {
        let root = root.as_ref().to_path_buf();
        let etc_path = root.join(ETC_DIR);

        if !etc_path.is_dir() {
            error!(path = %etc_path.display(), "configuration root cannot be resolved");
        }

        let mut store = Self {
            registry: DaemonRegistry::new(root.join(RUN_DIR), options.pid),
            root,
            etc_path,
            cache: HashMap::new(),
            sweep: SweepReport::default(),
        };

        let Some(bootstrap) = store.load(BOOTSTRAP_MODULE) else {
            return store;
        };

        let daemon_root = bootstrap
            .get(BOOTSTRAP_ROOT_KEY)
            .and_then(Value::as_str)
            .map(PathBuf::from)
            .unwrap_or_else(|| store.root.clone());

        store.sweep = store
            .registry
            .sweep(&daemon_root.join(RUN_DIR), options.probe.as_ref());
        store
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn etc_path(&self) -> &Path {
        &self.etc_path
    }

    pub fn registry(&self) -> &DaemonRegistry {
        &self.registry
    }

    /// What the startup sweep removed and folded.
    pub fn sweep_report(&self) -> &SweepReport {
        &self.sweep
    }

    /// Directory holding a module's persisted config.
    pub fn module_dir(&self, module: &str) -> PathBuf {
        self.etc_path.join(module)
    }

    /// Path of a module's persisted config.
    pub fn config_path(&self, module: &str) -> PathBuf {
        self.module_dir(module).join(CONFIG_FILE)
    }

    /// Resolve a module's fields against `overrides` and persist the result.
    ///
    /// Running it again with the same inputs rewrites an identical file.
    pub fn create_default(
        &mut self,
        module: &str,
        fields: &[FieldDef],
        overrides: Option<&Overrides>,
    ) -> Result<ModuleConfig> {
        let dir = self.module_dir(module);
        fs::create_dir_all(&dir).map_err(|e| EtcError::io(&dir, e))?;

        info!(module, path = %dir.display(), "creating config file");

        let config = resolve(fields, overrides);
        debug!(module, config = %serde_json::Value::Object(config.clone()), "resolved config");

        self.write_config(module, &config)?;
        Ok(config)
    }

    /// Create the default config of every module found under `modules_root`.
    ///
    /// Override sources are merged in order (later wins) and looked up by
    /// module name. Directories without a loadable schema are skipped.
    pub fn create_all(
        &mut self,
        modules_root: &Path,
        filter: &ModuleFilter,
        sources: &[OverrideSource],
        app_id: Option<&str>,
    ) -> Result<CreateReport> {
        let (overrides, records) = collect_overrides(sources, app_id)?;
        let mut report = CreateReport {
            created: Vec::new(),
            sources: records,
        };

        for module in load_modules(modules_root, filter) {
            self.create_default(&module.name, &module.fields, overrides.module(&module.name))?;
            report.created.push(module.name);
        }

        Ok(report)
    }

    /// Read a module's persisted config straight from disk.
    ///
    /// Missing or malformed files read as `None`. The cache is neither used
    /// nor updated.
    pub fn read(&self, module: &str) -> Option<ModuleConfig> {
        let path = self.config_path(module);
        debug!(path = %path.display(), "reading config file");
        json_file::read_object(&path).ok()
    }

    /// The module's config with this process's runtime layer on top.
    ///
    /// The persisted file is cached on first access; a missing or malformed
    /// file yields `None` and leaves the cache untouched. Runtime values are
    /// assigned key by key over the cached config.
    pub fn load(&mut self, module: &str) -> Option<ModuleConfig> {
        if !self.cache.contains_key(module) {
            let config = json_file::read_object(&self.config_path(module)).ok()?;
            self.cache.insert(module.to_string(), config);
        }

        let config = self.cache.get_mut(module)?;
        if let Some(Value::Object(fragment)) = self.registry.fragment(module) {
            for (key, value) in fragment {
                config.insert(key.clone(), value.clone());
            }
        }

        Some(config.clone())
    }

    /// A module's runtime fragment as recorded by another live instance.
    ///
    /// Unlike [`EtcStore::load`], failing to read that instance's run file is
    /// an error.
    pub fn load_instance(&self, module: &str, pid: u32) -> Result<Option<Value>> {
        let mut layer = self.registry.read_instance(pid)?;
        Ok(layer.remove(module))
    }

    /// Record runtime-only config for a module and persist the runtime layer
    /// to this instance's run file.
    pub fn save_run(&mut self, module: &str, config: ModuleConfig) -> Result<()> {
        self.registry.save_run(module, Value::Object(config))
    }

    /// Deep-merge flat dotted answers into a module's persisted config.
    ///
    /// Branches of the existing file not named by `flat` are preserved.
    pub fn merge_flat_config(
        &mut self,
        module: &str,
        flat: &Map<String, Value>,
    ) -> Result<ModuleConfig> {
        let dir = self.module_dir(module);
        fs::create_dir_all(&dir).map_err(|e| EtcError::io(&dir, e))?;

        let mut config = self.read(module).unwrap_or_default();
        merge_flat(&mut config, flat);

        self.write_config(module, &config)?;
        Ok(config)
    }

    /// Run the interactive reconfiguration of every module found under
    /// `modules_root`, one module at a time.
    pub fn configure_all(
        &mut self,
        modules_root: &Path,
        filter: &ModuleFilter,
        prompter: &mut dyn Prompter,
    ) -> Result<ReconfigureReport> {
        Reconfiguration::prepare(self, modules_root, filter).run(self, prompter)
    }

    /// Drop the cached config of a module.
    pub fn invalidate(&mut self, module: &str) {
        self.cache.remove(module);
    }

    fn write_config(&mut self, module: &str, config: &ModuleConfig) -> Result<()> {
        json_file::write_pretty(&self.config_path(module), config)?;
        self.invalidate(module);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn open(temp: &TempDir) -> EtcStore {
        fs::create_dir_all(temp.path().join(ETC_DIR)).unwrap();
        EtcStore::open_with(
            temp.path(),
            StoreOptions::default()
                .with_pid(4000)
                .with_probe(|_pid: u32| false),
        )
    }

    #[test]
    fn test_create_default_then_read() {
        let temp = TempDir::new().unwrap();
        let mut store = open(&temp);
        let fields = vec![
            FieldDef::new("port").with_default(8080),
            FieldDef::new("bus.host").with_default("localhost"),
        ];

        let written = store.create_default("net", &fields, None).unwrap();

        assert_eq!(store.read("net"), Some(written.clone()));
        assert_eq!(
            Value::Object(written),
            json!({"port": 8080, "bus": {"host": "localhost"}})
        );
    }

    #[test]
    fn test_create_default_idempotent() {
        let temp = TempDir::new().unwrap();
        let mut store = open(&temp);
        let fields = vec![FieldDef::new("port").with_default(8080)];

        store.create_default("net", &fields, None).unwrap();
        let first = fs::read(store.config_path("net")).unwrap();
        store.create_default("net", &fields, None).unwrap();
        let second = fs::read(store.config_path("net")).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_read_missing_and_malformed() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        assert_eq!(store.read("absent"), None);

        let dir = store.module_dir("broken");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(CONFIG_FILE), "{").unwrap();
        assert_eq!(store.read("broken"), None);
    }

    #[test]
    fn test_load_caches_until_write() {
        let temp = TempDir::new().unwrap();
        let mut store = open(&temp);
        let fields = vec![FieldDef::new("port").with_default(8080)];
        store.create_default("net", &fields, None).unwrap();

        assert_eq!(store.load("net").unwrap()["port"], 8080);

        // External edit: invisible to load, visible to read
        fs::write(store.config_path("net"), r#"{"port": 1}"#).unwrap();
        assert_eq!(store.load("net").unwrap()["port"], 8080);
        assert_eq!(store.read("net").unwrap()["port"], 1);

        // A write through the store refreshes the cache
        let mut flat = Map::new();
        flat.insert("port".to_string(), json!(2));
        store.merge_flat_config("net", &flat).unwrap();
        assert_eq!(store.load("net").unwrap()["port"], 2);
    }

    #[test]
    fn test_load_missing_does_not_cache() {
        let temp = TempDir::new().unwrap();
        let mut store = open(&temp);
        assert_eq!(store.load("net"), None);

        let dir = store.module_dir("net");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(CONFIG_FILE), r#"{"port": 3}"#).unwrap();
        assert_eq!(store.load("net").unwrap()["port"], 3);
    }

    #[test]
    fn test_runtime_layer_overlays_load_only() {
        let temp = TempDir::new().unwrap();
        let mut store = open(&temp);
        let fields = vec![
            FieldDef::new("port").with_default(8080),
            FieldDef::new("host").with_default("localhost"),
        ];
        store.create_default("net", &fields, None).unwrap();

        let mut runtime = Map::new();
        runtime.insert("port".to_string(), json!(9090));
        store.save_run("net", runtime).unwrap();

        let loaded = store.load("net").unwrap();
        assert_eq!(loaded["port"], 9090);
        assert_eq!(loaded["host"], "localhost");
        assert_eq!(store.read("net").unwrap()["port"], 8080);
    }

    #[test]
    fn test_missing_etc_is_not_fatal() {
        let temp = TempDir::new().unwrap();
        let mut store = EtcStore::open_with(
            temp.path().join("nowhere"),
            StoreOptions::default().with_pid(4000),
        );
        assert_eq!(store.load("net"), None);
        assert_eq!(store.read("net"), None);
    }

    #[test]
    fn test_from_env_explicit_root() {
        let temp = TempDir::new().unwrap();
        let store = EtcStore::from_env(Some(temp.path())).unwrap();
        assert_eq!(store.root(), temp.path());
    }
}
