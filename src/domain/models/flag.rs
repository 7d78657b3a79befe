//! Flags: typed "needs human attention" records.
//!
//! Each flag kind names a payload schema and a result schema. The tracker
//! validates both against the registered kind before persisting.

use serde_json::Value;

use crate::domain::errors::{TrackerError, TrackerResult};

use super::wire::{V1BoundingBox, V1BoundingBoxFlag, V1Flag};
use super::{now_ts, short_id};

/// Registered flag kinds. Payload and result validation dispatch on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKind {
    /// Ask a human to draw a bounding box around a target on a screenshot.
    BoundingBox,
}

impl FlagKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BoundingBox => "bounding_box",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "bounding_box" => Some(Self::BoundingBox),
            _ => None,
        }
    }

    /// Check a flag payload against this kind's schema.
    pub fn validate_payload(&self, payload: &Value) -> TrackerResult<()> {
        match self {
            Self::BoundingBox => {
                serde_json::from_value::<V1BoundingBoxFlag>(payload.clone())
                    .map(|_| ())
                    .map_err(|e| TrackerError::validation("flag", e.to_string()))
            }
        }
    }

    /// Check a result payload against this kind's schema.
    pub fn validate_result(&self, result: &Value) -> TrackerResult<()> {
        match self {
            Self::BoundingBox => serde_json::from_value::<V1BoundingBox>(result.clone())
                .map(|_| ())
                .map_err(|e| TrackerError::validation("result", e.to_string())),
        }
    }
}

/// A stored flag.
#[derive(Debug, Clone, PartialEq)]
pub struct Flag {
    pub id: String,
    pub kind: FlagKind,
    pub payload: Value,
    pub result: Option<Value>,
    pub created: f64,
}

impl Flag {
    pub fn new(kind: FlagKind, payload: Value) -> TrackerResult<Self> {
        kind.validate_payload(&payload)?;
        Ok(Self {
            id: short_id(),
            kind,
            payload,
            result: None,
            created: now_ts(),
        })
    }

    pub fn set_result(&mut self, result: Value) -> TrackerResult<()> {
        self.kind.validate_result(&result)?;
        self.result = Some(result);
        Ok(())
    }

    pub fn to_v1(&self) -> V1Flag {
        V1Flag {
            id: self.id.clone(),
            kind: self.kind.as_str().to_string(),
            flag: self.payload.clone(),
            result: self.result.clone(),
            created: self.created,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bbox_payload() -> Value {
        json!({
            "img": "https://example.com/shot.png",
            "target": "submit button",
            "bbox": {"x0": 1, "x1": 100, "y0": 2, "y1": 50}
        })
    }

    #[test]
    fn test_flag_validates_payload_on_create() {
        assert!(Flag::new(FlagKind::BoundingBox, bbox_payload()).is_ok());
        assert!(Flag::new(FlagKind::BoundingBox, json!({"img": "x"})).is_err());
    }

    #[test]
    fn test_flag_validates_result() {
        let mut flag = Flag::new(FlagKind::BoundingBox, bbox_payload()).unwrap();
        assert!(flag.set_result(json!({"oops": true})).is_err());
        assert!(flag
            .set_result(json!({"x0": 3, "x1": 90, "y0": 4, "y1": 40}))
            .is_ok());
        assert!(flag.result.is_some());
    }
}
