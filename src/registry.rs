//! Daemon registry
//!
//! Every running instance of the host process that shares a configuration
//! root owns one run file, `var/run/xcraftd.<pid>`, holding a JSON snapshot
//! of its runtime layer:
//!
//! ```json
//! { "pid": 4242, "xcraft-core-bus": { "port": 35400 } }
//! ```
//!
//! On startup the registry sweeps the run directory: files of dead
//! instances are removed, snapshots of live ones are folded into this
//! instance's runtime layer (last wins, ascending pid order). The own run
//! file is created on the first runtime write, rewritten in full on every
//! later one, and removed when the registry is dropped.

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::constants::{RUN_FILE_PREFIX, SNAPSHOT_FD_KEY, SNAPSHOT_PID_KEY};
use crate::error::{EtcError, Result};
use crate::json_file;
use crate::probe::ProcessProbe;

/// Module name to runtime-only config fragment.
pub type RuntimeLayer = Map<String, Value>;

/// File name of the run file for `pid`.
pub fn run_file_name(pid: u32) -> String {
    format!("{}.{}", RUN_FILE_PREFIX, pid)
}

/// Extract the pid from a run file name (`xcraftd.<digits>`).
pub fn parse_run_file_name(name: &str) -> Option<u32> {
    let digits = name.strip_prefix(RUN_FILE_PREFIX)?.strip_prefix('.')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|pid| *pid != 0)
}

/// Outcome of a run directory sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Pids whose stale run files were removed.
    pub removed: Vec<u32>,
    /// Pids whose snapshots were folded into the runtime layer.
    pub folded: Vec<u32>,
}

/// The owning instance's run file.
///
/// Closed and removed on drop. A process that is killed leaves the file
/// behind for the next sweep to reclaim.
#[derive(Debug)]
pub struct RunFileGuard {
    path: PathBuf,
    file: Option<File>,
}

impl RunFileGuard {
    /// Create or truncate the run file.
    fn open(path: PathBuf) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| EtcError::run_file(&path, e))?;

        Ok(Self {
            path,
            file: Some(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the whole file content.
    fn rewrite(&mut self, payload: &[u8]) -> Result<()> {
        let path = &self.path;
        let file = self.file.as_mut().ok_or_else(|| {
            EtcError::run_file(path, std::io::Error::other("run file already closed"))
        })?;

        file.set_len(0).map_err(|e| EtcError::run_file(path, e))?;
        file.seek(SeekFrom::Start(0))
            .map_err(|e| EtcError::run_file(path, e))?;
        file.write_all(payload)
            .map_err(|e| EtcError::run_file(path, e))?;
        file.flush().map_err(|e| EtcError::run_file(path, e))
    }
}

impl Drop for RunFileGuard {
    fn drop(&mut self) {
        // Close before removing.
        drop(self.file.take());
        if let Err(e) = fs::remove_file(&self.path) {
            debug!(path = %self.path.display(), error = %e, "could not remove run file");
        }
    }
}

/// Tracks live instances and this instance's runtime layer.
#[derive(Debug)]
pub struct DaemonRegistry {
    run_dir: PathBuf,
    pid: u32,
    layer: RuntimeLayer,
    run_file: Option<RunFileGuard>,
}

impl DaemonRegistry {
    /// Registry for process `pid` writing its run file under `run_dir`.
    pub fn new(run_dir: impl Into<PathBuf>, pid: u32) -> Self {
        Self {
            run_dir: run_dir.into(),
            pid,
            layer: RuntimeLayer::new(),
            run_file: None,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn layer(&self) -> &RuntimeLayer {
        &self.layer
    }

    /// Runtime fragment recorded for a module.
    pub fn fragment(&self, module: &str) -> Option<&Value> {
        self.layer.get(module)
    }

    /// Path of this instance's run file, once it has been created.
    pub fn run_file_path(&self) -> Option<&Path> {
        self.run_file.as_ref().map(RunFileGuard::path)
    }

    /// Remove run files of dead instances and fold in live instances'
    /// snapshots.
    ///
    /// A file carrying this instance's own pid is left alone: it is either
    /// ours or a leftover from a previous process with the same pid, and in
    /// both cases it gets truncated on the first runtime write.
    pub fn sweep(&mut self, scan_dir: &Path, probe: &dyn ProcessProbe) -> SweepReport {
        let mut report = SweepReport::default();

        if !scan_dir.is_dir() {
            debug!(dir = %scan_dir.display(), "no run directory to sweep");
            return report;
        }

        let mut runs: Vec<(u32, PathBuf)> = WalkDir::new(scan_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!(dir = %scan_dir.display(), error = %e, "skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let pid = parse_run_file_name(entry.file_name().to_str()?)?;
                Some((pid, entry.into_path()))
            })
            .filter(|(pid, _)| *pid != self.pid)
            .collect();
        runs.sort_by_key(|(pid, _)| *pid);

        for (pid, path) in runs {
            if !probe.is_running(pid) {
                match fs::remove_file(&path) {
                    Ok(()) => {
                        debug!(pid, path = %path.display(), "removed stale run file");
                        report.removed.push(pid);
                    }
                    Err(e) => {
                        debug!(pid, path = %path.display(), error = %e, "could not remove stale run file");
                    }
                }
                continue;
            }

            match json_file::read_object(&path) {
                Ok(mut snapshot) => {
                    strip_bookkeeping(&mut snapshot);
                    for (module, fragment) in snapshot {
                        self.layer.insert(module, fragment);
                    }
                    info!(pid, "folded runtime state of live instance");
                    report.folded.push(pid);
                }
                Err(e) => {
                    warn!(pid, error = %e, "ignoring unreadable run file");
                }
            }
        }

        report
    }

    /// Record a runtime fragment for `module` and rewrite the run file.
    ///
    /// The run file is created on first use. Failing to open or write it is
    /// an error.
    pub fn save_run(&mut self, module: &str, config: Value) -> Result<()> {
        if self.run_file.is_none() {
            fs::create_dir_all(&self.run_dir).map_err(|e| EtcError::run_file(&self.run_dir, e))?;
            let guard = RunFileGuard::open(self.run_dir.join(run_file_name(self.pid)))?;
            info!(path = %guard.path().display(), "opened run file");
            self.run_file = Some(guard);
        }

        self.layer.insert(module.to_string(), config);

        let snapshot = self.snapshot();
        let payload = serde_json::to_vec_pretty(&snapshot).map_err(|e| EtcError::Json {
            path: self.run_dir.join(run_file_name(self.pid)),
            source: e,
        })?;

        if let Some(guard) = self.run_file.as_mut() {
            guard.rewrite(&payload)?;
        }
        Ok(())
    }

    /// Portable snapshot: the runtime layer plus this instance's pid.
    pub fn snapshot(&self) -> Value {
        let mut snapshot = Map::new();
        snapshot.insert(SNAPSHOT_PID_KEY.to_string(), Value::from(self.pid));
        for (module, fragment) in &self.layer {
            snapshot.insert(module.clone(), fragment.clone());
        }
        Value::Object(snapshot)
    }

    /// Read another instance's runtime layer from its run file.
    pub fn read_instance(&self, pid: u32) -> Result<RuntimeLayer> {
        let mut snapshot = json_file::read_object(&self.run_dir.join(run_file_name(pid)))?;
        strip_bookkeeping(&mut snapshot);
        Ok(snapshot)
    }
}

/// Drop the instance-local keys of a snapshot.
fn strip_bookkeeping(snapshot: &mut Map<String, Value>) {
    snapshot.remove(SNAPSHOT_PID_KEY);
    snapshot.remove(SNAPSHOT_FD_KEY);
}
