//! In-memory [`ObjectStore`] that replays a fixed sequence of reads

use anyhow::{anyhow, Result};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{ObjectStore, ResourceRef};

/// Each `get` returns the next scripted read; `None` is an API error. The
/// final entry repeats once the script is exhausted.
pub struct ScriptedStore {
    reads: Vec<Option<Value>>,
    gets: AtomicUsize,
    patches: Mutex<Vec<Value>>,
}

impl ScriptedStore {
    pub fn new(reads: Vec<Option<Value>>) -> Self {
        assert!(!reads.is_empty(), "script needs at least one read");
        Self {
            reads,
            gets: AtomicUsize::new(0),
            patches: Mutex::new(Vec::new()),
        }
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn patches(&self) -> Vec<Value> {
        self.patches.lock().unwrap().clone()
    }
}

impl ObjectStore for ScriptedStore {
    async fn get(&self, _resource: &ResourceRef) -> Result<Value> {
        let n = self.gets.fetch_add(1, Ordering::SeqCst);
        match &self.reads[n.min(self.reads.len() - 1)] {
            Some(object) => Ok(object.clone()),
            None => Err(anyhow!("connection refused")),
        }
    }

    async fn merge_patch(&self, _resource: &ResourceRef, patch: &Value) -> Result<()> {
        self.patches.lock().unwrap().push(patch.clone());
        Ok(())
    }
}
