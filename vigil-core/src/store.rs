//! Keyed store for test sets, evaluation runs, and per-query results.
//!
//! The engine only needs insert and update-by-id, so the trait stays small.
//! `MemoryStore` backs tests; `JsonFileStore` snapshots state to disk with
//! the write-to-tmp-then-rename pattern so a crash mid-write cannot corrupt
//! a snapshot.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::types::{EvaluationResult, EvaluationRun, TestSet};

/// Persistence surface consumed by the evaluation-run engine.
pub trait EvaluationStore: Send + Sync {
    /// Look up a tenant's test set by id.
    fn test_set(&self, tenant_id: &str, id: &str) -> Option<TestSet>;
    fn insert_test_set(&self, set: TestSet);

    fn run(&self, id: Uuid) -> Option<EvaluationRun>;
    fn insert_run(&self, run: EvaluationRun);
    /// Replace the stored run record. Only the owning execution calls this.
    fn update_run(&self, run: EvaluationRun);

    fn insert_result(&self, result: EvaluationResult);
    fn results_for_run(&self, run_id: Uuid) -> Vec<EvaluationResult>;
}

/// In-memory store.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<StoreState>,
}

#[derive(Default, Clone, serde::Serialize, serde::Deserialize)]
struct StoreState {
    test_sets: HashMap<String, TestSet>,
    runs: HashMap<Uuid, EvaluationRun>,
    results: Vec<EvaluationResult>,
}

fn test_set_key(tenant_id: &str, id: &str) -> String {
    format!("{tenant_id}/{id}")
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EvaluationStore for MemoryStore {
    fn test_set(&self, tenant_id: &str, id: &str) -> Option<TestSet> {
        self.inner
            .read()
            .expect("store lock")
            .test_sets
            .get(&test_set_key(tenant_id, id))
            .cloned()
    }

    fn insert_test_set(&self, set: TestSet) {
        let key = test_set_key(&set.tenant_id, &set.id);
        self.inner
            .write()
            .expect("store lock")
            .test_sets
            .insert(key, set);
    }

    fn run(&self, id: Uuid) -> Option<EvaluationRun> {
        self.inner.read().expect("store lock").runs.get(&id).cloned()
    }

    fn insert_run(&self, run: EvaluationRun) {
        self.inner
            .write()
            .expect("store lock")
            .runs
            .insert(run.id, run);
    }

    fn update_run(&self, run: EvaluationRun) {
        self.insert_run(run);
    }

    fn insert_result(&self, result: EvaluationResult) {
        self.inner.write().expect("store lock").results.push(result);
    }

    fn results_for_run(&self, run_id: Uuid) -> Vec<EvaluationResult> {
        self.inner
            .read()
            .expect("store lock")
            .results
            .iter()
            .filter(|r| r.run_id == run_id)
            .cloned()
            .collect()
    }
}

/// Atomically write JSON data to a file.
///
/// Serializes to pretty-printed JSON, writes to a `.tmp` sibling, then
/// renames onto the target path. Creates parent directories as needed.
pub fn atomic_write_json<T: Serialize>(path: &Path, data: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(data).map_err(io::Error::other)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, json.as_bytes())?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Load and deserialize JSON from a file. `Ok(None)` if the file is absent.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> io::Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(path)?;
    let value =
        serde_json::from_str(&data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(Some(value))
}

/// File-backed store: a single JSON snapshot rewritten after each mutation.
///
/// Suited to offline evaluation runs where durability matters more than
/// write throughput.
pub struct JsonFileStore {
    path: PathBuf,
    inner: RwLock<StoreState>,
}

impl JsonFileStore {
    /// Open a snapshot file, loading existing state when present.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let state = load_json(&path)?.unwrap_or_default();
        Ok(Self {
            path,
            inner: RwLock::new(state),
        })
    }

    fn persist(&self, state: &StoreState) {
        if let Err(e) = atomic_write_json(&self.path, state) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to persist store snapshot");
        }
    }

    fn mutate(&self, f: impl FnOnce(&mut StoreState)) {
        let mut state = self.inner.write().expect("store lock");
        f(&mut state);
        self.persist(&state);
    }
}

impl EvaluationStore for JsonFileStore {
    fn test_set(&self, tenant_id: &str, id: &str) -> Option<TestSet> {
        self.inner
            .read()
            .expect("store lock")
            .test_sets
            .get(&test_set_key(tenant_id, id))
            .cloned()
    }

    fn insert_test_set(&self, set: TestSet) {
        let key = test_set_key(&set.tenant_id, &set.id);
        self.mutate(|s| {
            s.test_sets.insert(key, set);
        });
    }

    fn run(&self, id: Uuid) -> Option<EvaluationRun> {
        self.inner.read().expect("store lock").runs.get(&id).cloned()
    }

    fn insert_run(&self, run: EvaluationRun) {
        self.mutate(|s| {
            s.runs.insert(run.id, run);
        });
    }

    fn update_run(&self, run: EvaluationRun) {
        self.insert_run(run);
    }

    fn insert_result(&self, result: EvaluationResult) {
        self.mutate(|s| s.results.push(result));
    }

    fn results_for_run(&self, run_id: Uuid) -> Vec<EvaluationResult> {
        self.inner
            .read()
            .expect("store lock")
            .results
            .iter()
            .filter(|r| r.run_id == run_id)
            .cloned()
            .collect()
    }
}
