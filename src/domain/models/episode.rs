//! Episodes: the append-only log of action events recorded for one task.
//!
//! Each action event is one observation→action→result triple, optionally
//! carrying start/end environment states with screenshots, per-action
//! reviews, and typed annotations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::review::{ResourceType, Review, ReviewerType};
use super::{now_ts, short_id};

/// An environment observation: an ordered list of image references
/// (URLs or data URIs) plus free-form structured data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvState {
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl EnvState {
    pub fn with_images(images: Vec<String>) -> Self {
        Self {
            images,
            data: None,
        }
    }
}

/// A named action with a parameter mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

impl Action {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }
}

/// Reference to the tool an action was executed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ToolRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            version: None,
        }
    }
}

/// A typed annotation attached to an action event. Annotations are
/// reviewable with the same upsert policy as actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: String,
    pub key: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotator_type: Option<String>,
    #[serde(default)]
    pub reviews: Vec<Review>,
    pub created: f64,
}

impl Annotation {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: short_id(),
            key: key.into(),
            value: value.into(),
            annotator: None,
            annotator_type: None,
            reviews: Vec::new(),
            created: now_ts(),
        }
    }
}

/// One recorded action event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEvent {
    pub id: String,
    pub action: Action,
    pub tool: ToolRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<EnvState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_state: Option<EnvState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_id: Option<String>,
    #[serde(default = "ActionEvent::default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub reviews: Vec<Review>,
    #[serde(default)]
    pub reviewables: Vec<Annotation>,
    pub created: f64,
}

impl ActionEvent {
    fn default_namespace() -> String {
        "default".to_string()
    }

    pub fn new(action: Action, tool: ToolRef) -> Self {
        Self {
            id: short_id(),
            action,
            tool,
            state: None,
            end_state: None,
            result: None,
            prompt_id: None,
            namespace: Self::default_namespace(),
            metadata: BTreeMap::new(),
            owner_id: None,
            model: None,
            agent_id: None,
            hidden: false,
            reviews: Vec::new(),
            reviewables: Vec::new(),
            created: now_ts(),
        }
    }

    pub fn with_state(mut self, state: EnvState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_end_state(mut self, end_state: EnvState) -> Self {
        self.end_state = Some(end_state);
        self
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    /// Whether this event is the terminal `end` marker.
    pub fn is_end(&self) -> bool {
        self.action.name == "end"
    }

    /// Upsert a review on this event: an existing review by the same
    /// reviewer and reviewer type is updated in place, otherwise a new
    /// review is appended. Returns a clone of the stored review.
    pub fn upsert_review(
        &mut self,
        reviewer: &str,
        reviewer_type: ReviewerType,
        approved: bool,
        reason: Option<String>,
        correction: Option<Value>,
    ) -> Review {
        upsert_review_in(
            &mut self.reviews,
            ResourceType::Action,
            &self.id,
            reviewer,
            reviewer_type,
            approved,
            reason,
            correction,
        )
    }
}

/// Shared review upsert used by tasks, actions, and annotations.
#[allow(clippy::too_many_arguments)]
pub fn upsert_review_in(
    reviews: &mut Vec<Review>,
    resource_type: ResourceType,
    resource_id: &str,
    reviewer: &str,
    reviewer_type: ReviewerType,
    approved: bool,
    reason: Option<String>,
    correction: Option<Value>,
) -> Review {
    if let Some(existing) = reviews
        .iter_mut()
        .find(|r| r.reviewer == reviewer && r.reviewer_type == reviewer_type)
    {
        existing.approved = approved;
        existing.reason = reason;
        existing.correction = correction;
        existing.updated = Some(now_ts());
        return existing.clone();
    }

    let review = Review::new(reviewer, reviewer_type, approved, resource_type, resource_id)
        .with_reason(reason)
        .with_correction(correction);
    reviews.push(review.clone());
    review
}

/// The decision taken when a new event is offered to an episode.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordDecision {
    /// The episode already carries a final `end` event; nothing recorded.
    AlreadyEnded,
    /// The event was appended.
    Recorded {
        /// Id of a trailing `mouse_move` that was dropped to make room for
        /// the `end` event, if any.
        dropped_action_id: Option<String>,
        /// Monotonically increasing per-episode sequence number of the new
        /// event (1-based).
        event_number: u64,
        /// The event that preceded the new one, after any drop.
        prev_action: Option<ActionEvent>,
    },
}

/// The ordered, append-only log of action events for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub actions: Vec<ActionEvent>,
    pub created: f64,
}

impl Episode {
    pub fn new(owner_id: Option<String>) -> Self {
        Self {
            id: short_id(),
            owner_id,
            actions: Vec::new(),
            created: now_ts(),
        }
    }

    /// Offer a new event. Rules:
    /// - once a final `end` event exists the episode is sealed;
    /// - an `end` event arriving right after a `mouse_move` replaces it.
    pub fn record(&mut self, event: ActionEvent) -> RecordDecision {
        if self.actions.iter().any(ActionEvent::is_end) {
            return RecordDecision::AlreadyEnded;
        }

        let mut dropped_action_id = None;
        if event.is_end() {
            if let Some(last) = self.actions.last() {
                if last.action.name == "mouse_move" {
                    let dropped = self.actions.pop();
                    dropped_action_id = dropped.map(|a| a.id);
                }
            }
        }

        let prev_action = self.actions.last().cloned();
        self.actions.push(event);
        RecordDecision::Recorded {
            dropped_action_id,
            event_number: self.actions.len() as u64,
            prev_action,
        }
    }

    pub fn find_action(&self, action_id: &str) -> Option<&ActionEvent> {
        self.actions.iter().find(|a| a.id == action_id)
    }

    pub fn find_action_mut(&mut self, action_id: &str) -> Option<&mut ActionEvent> {
        self.actions.iter_mut().find(|a| a.id == action_id)
    }

    /// Review a single action. Returns the stored review.
    pub fn review_one(
        &mut self,
        action_id: &str,
        reviewer: &str,
        reviewer_type: ReviewerType,
        approved: bool,
        reason: Option<String>,
        correction: Option<Value>,
    ) -> Option<Review> {
        self.find_action_mut(action_id)
            .map(|a| a.upsert_review(reviewer, reviewer_type, approved, reason, correction))
    }

    /// Review every action at or before `action_id` in insertion order.
    /// Hidden actions are skipped unless `include_hidden` is set. Returns
    /// the reviewed action ids with their stored reviews.
    pub fn review_prior(
        &mut self,
        action_id: &str,
        reviewer: &str,
        reviewer_type: ReviewerType,
        approved: bool,
        include_hidden: bool,
    ) -> Vec<(String, Review)> {
        let Some(boundary) = self.actions.iter().position(|a| a.id == action_id) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for event in &mut self.actions[..=boundary] {
            if event.hidden && !include_hidden {
                continue;
            }
            let review = event.upsert_review(reviewer, reviewer_type, approved, None, None);
            out.push((event.id.clone(), review));
        }
        out
    }

    /// Review every action in the episode.
    pub fn review_all(
        &mut self,
        reviewer: &str,
        reviewer_type: ReviewerType,
        approved: bool,
        include_hidden: bool,
    ) -> Vec<(String, Review)> {
        let mut out = Vec::new();
        for event in &mut self.actions {
            if event.hidden && !include_hidden {
                continue;
            }
            let review = event.upsert_review(reviewer, reviewer_type, approved, None, None);
            out.push((event.id.clone(), review));
        }
        out
    }

    /// Remove one action. Returns whether an action was removed.
    pub fn delete_action(&mut self, action_id: &str) -> bool {
        let before = self.actions.len();
        self.actions.retain(|a| a.id != action_id);
        self.actions.len() != before
    }

    /// Mark an action hidden or visible.
    pub fn set_hidden(&mut self, action_id: &str, hidden: bool) -> bool {
        match self.find_action_mut(action_id) {
            Some(a) => {
                a.hidden = hidden;
                true
            }
            None => false,
        }
    }
}
