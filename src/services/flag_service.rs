//! Flag lifecycle: create, list, and resolve typed attention records.

use std::sync::Arc;

use serde_json::Value;

use crate::domain::errors::{TrackerError, TrackerResult};
use crate::domain::models::{Flag, FlagKind};
use crate::domain::ports::FlagStore;

pub struct FlagService {
    store: Arc<dyn FlagStore>,
}

impl FlagService {
    pub fn new(store: Arc<dyn FlagStore>) -> Self {
        Self { store }
    }

    /// Create a flag of a registered kind. The payload is validated
    /// against the kind's schema.
    pub async fn create(&self, kind: &str, payload: Value) -> TrackerResult<Flag> {
        let kind = FlagKind::from_str(kind)
            .ok_or_else(|| TrackerError::validation("type", format!("unknown flag type '{kind}'")))?;
        let flag = Flag::new(kind, payload)?;
        self.store.insert(&flag).await?;
        Ok(flag)
    }

    /// Flags, newest first, optionally restricted to one kind.
    pub async fn list(&self, kind: Option<&str>) -> TrackerResult<Vec<Flag>> {
        self.store.find(kind).await
    }

    pub async fn get(&self, id: &str) -> TrackerResult<Flag> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| TrackerError::NotFound(format!("flag {id}")))
    }

    /// Attach a result to a flag, validated against the kind's result
    /// schema.
    pub async fn set_result(&self, id: &str, result: Value) -> TrackerResult<Flag> {
        let mut flag = self.get(id).await?;
        flag.set_result(result)?;
        self.store
            .set_result(&flag.id, flag.result.as_ref().unwrap_or(&Value::Null))
            .await?;
        Ok(flag)
    }
}
