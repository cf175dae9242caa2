//! Shared helpers for integration tests
//!
//! Every test gets its own configuration root in a temporary directory:
//!
//! ```text
//! <tmp>/root/etc/<module>/config.json
//! <tmp>/root/var/run/xcraftd.<pid>
//! <tmp>/modules/<module>/schema.json
//! ```

#![allow(dead_code)]

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tempfile::TempDir;
use xcraft_etc::{EtcStore, StoreOptions};

/// Pid used for the store under test; never a real process in these tests.
pub const OWN_PID: u32 = 900_001;

pub struct Sandbox {
    temp: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        let sandbox = Self {
            temp: TempDir::new().unwrap(),
        };
        fs::create_dir_all(sandbox.root().join("etc")).unwrap();
        fs::create_dir_all(sandbox.modules_root()).unwrap();
        sandbox
    }

    pub fn root(&self) -> PathBuf {
        self.temp.path().join("root")
    }

    pub fn modules_root(&self) -> PathBuf {
        self.temp.path().join("modules")
    }

    pub fn run_dir(&self) -> PathBuf {
        self.root().join("var/run")
    }

    pub fn run_file(&self, pid: u32) -> PathBuf {
        self.run_dir().join(format!("xcraftd.{}", pid))
    }

    pub fn config_file(&self, module: &str) -> PathBuf {
        self.root().join("etc").join(module).join("config.json")
    }

    /// Write `<modules>/<module>/schema.json`.
    pub fn write_schema(&self, module: &str, schema: Value) {
        let dir = self.modules_root().join(module);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("schema.json"), serde_json::to_string_pretty(&schema).unwrap()).unwrap();
    }

    /// Write a module's persisted config directly.
    pub fn write_config(&self, module: &str, config: Value) {
        let path = self.config_file(module);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
    }

    pub fn read_config(&self, module: &str) -> Value {
        serde_json::from_str(&fs::read_to_string(self.config_file(module)).unwrap()).unwrap()
    }

    /// Write the bootstrap module config so construction sweeps run files.
    pub fn write_bootstrap(&self) {
        self.write_config("xcraft", json!({"xcraftRoot": self.root().to_string_lossy()}));
    }

    pub fn write_run_file(&self, pid: u32, snapshot: Value) {
        fs::create_dir_all(self.run_dir()).unwrap();
        fs::write(self.run_file(pid), snapshot.to_string()).unwrap();
    }

    /// Open a store for `OWN_PID` where only `alive` pids are running.
    pub fn open(&self, alive: &[u32]) -> EtcStore {
        let alive: HashSet<u32> = alive.iter().copied().collect();
        EtcStore::open_with(
            self.root(),
            StoreOptions::default()
                .with_pid(OWN_PID)
                .with_probe(move |pid: u32| alive.contains(&pid)),
        )
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }
}
