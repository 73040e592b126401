//! Blackboard shared between the quality producer and the meta monitor.
//!
//! Every operation touches a single key and holds the lock only for the
//! duration of that operation, so readers always observe fully written
//! values and no lock is ever held across an await point of the caller.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::errors::{ControlError, ControlResult};

/// Well-known keys written during a run.
pub mod keys {
    pub const STARTED_AT: &str = "started_at";
    pub const GOAL: &str = "goal";
    pub const STOP_FLAG: &str = "stop_flag";
    pub const PRODUCER_RUNNING: &str = "producer_running";
    pub const QUALITY_HISTORY: &str = "quality_history";
    pub const CURRENT_QUALITY: &str = "current_quality";
    pub const STEP_COUNT: &str = "step_count";
    pub const FINAL_ARTIFACT: &str = "final_artifact";
    pub const PRODUCER_ERROR: &str = "producer_error";
    pub const DECISION: &str = "decision";
}

/// Concurrency-safe key/value store; cheap to clone (shared handle).
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    entries: Arc<RwLock<HashMap<String, Value>>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State seeded for a fresh run: stop flag down, producer alive, no history.
    pub fn for_run() -> Self {
        let mut entries = HashMap::new();
        entries.insert(keys::STOP_FLAG.to_string(), Value::Bool(false));
        entries.insert(keys::PRODUCER_RUNNING.to_string(), Value::Bool(true));
        entries.insert(keys::QUALITY_HISTORY.to_string(), Value::Array(Vec::new()));
        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    /// Store or overwrite a raw value.
    ///
    /// Writing anything other than `true` over a raised stop flag fails with
    /// [`ControlError::StopFlagReverted`].
    pub async fn set_value(&self, key: &str, value: Value) -> ControlResult<()> {
        let mut entries = self.entries.write().await;
        if key == keys::STOP_FLAG
            && entries.get(key) == Some(&Value::Bool(true))
            && value != Value::Bool(true)
        {
            return Err(ControlError::StopFlagReverted);
        }
        entries.insert(key.to_string(), value);
        Ok(())
    }

    /// Latest committed raw value, or None if the key was never written.
    pub async fn get_value(&self, key: &str) -> Option<Value> {
        self.entries.read().await.get(key).cloned()
    }

    /// Serialize and store `value` under `key`.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> ControlResult<()> {
        let encoded =
            serde_json::to_value(value).map_err(|e| ControlError::serialization(key, &e))?;
        self.set_value(key, encoded).await
    }

    /// Read and decode the value under `key`; Ok(None) when absent.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> ControlResult<Option<T>> {
        match self.get_value(key).await {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| ControlError::serialization(key, &e)),
        }
    }

    /// Like [`get`](Self::get) but absence is [`ControlError::SharedStateKeyAbsent`].
    pub async fn require<T: DeserializeOwned>(&self, key: &str) -> ControlResult<T> {
        self.get(key)
            .await?
            .ok_or_else(|| ControlError::SharedStateKeyAbsent(key.to_string()))
    }

    /// Raise the stop flag. Idempotent; the flag never goes back down.
    pub async fn request_stop(&self) -> ControlResult<()> {
        debug!("stop flag raised");
        self.set_value(keys::STOP_FLAG, Value::Bool(true)).await
    }

    pub async fn stop_requested(&self) -> ControlResult<bool> {
        Ok(self.get::<bool>(keys::STOP_FLAG).await?.unwrap_or(false))
    }

    pub async fn set_producer_running(&self, running: bool) -> ControlResult<()> {
        self.set_value(keys::PRODUCER_RUNNING, Value::Bool(running)).await
    }

    /// Producer liveness; an absent flag counts as not running.
    pub async fn producer_running(&self) -> ControlResult<bool> {
        Ok(self.get::<bool>(keys::PRODUCER_RUNNING).await?.unwrap_or(false))
    }

    /// Copy of every entry, for diagnostics.
    pub async fn snapshot(&self) -> HashMap<String, Value> {
        self.entries.read().await.clone()
    }
}

/// Cloneable handle that lets callers outside the run raise the stop flag.
#[derive(Debug, Clone)]
pub struct StopHandle {
    state: SharedState,
}

impl StopHandle {
    pub const fn new(state: SharedState) -> Self {
        Self { state }
    }

    pub async fn request_stop(&self) -> ControlResult<()> {
        self.state.request_stop().await
    }

    pub async fn is_stop_requested(&self) -> ControlResult<bool> {
        self.state.stop_requested().await
    }
}
