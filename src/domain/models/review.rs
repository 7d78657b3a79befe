//! Reviews, review requirements, and the pending-reviewers projection.
//!
//! A review is one party's binary judgement of a task, an action, or an
//! annotation. Review requirements declare how many parties from a listed
//! set must fully review a task; the pending-reviewers rows are a derived
//! projection kept consistent by [`recompute_pending`].

use serde::{Deserialize, Serialize};

use super::episode::ActionEvent;
use super::{now_ts, short_id};

/// Who produced a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewerType {
    Human,
    Agent,
}

impl ReviewerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Agent => "agent",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "human" => Some(Self::Human),
            "agent" => Some(Self::Agent),
            _ => None,
        }
    }
}

impl Default for ReviewerType {
    fn default() -> Self {
        Self::Human
    }
}

/// The kind of resource a review points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Task,
    Action,
    Annotation,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Action => "action",
            Self::Annotation => "annotation",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "task" => Some(Self::Task),
            "action" => Some(Self::Action),
            "annotation" => Some(Self::Annotation),
            _ => None,
        }
    }
}

/// One party's judgement of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub reviewer: String,
    pub reviewer_type: ReviewerType,
    pub approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// A suggested replacement for the reviewed resource, if the reviewer
    /// proposed one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction: Option<serde_json::Value>,
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub created: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<f64>,
}

impl Review {
    pub fn new(
        reviewer: impl Into<String>,
        reviewer_type: ReviewerType,
        approved: bool,
        resource_type: ResourceType,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            id: short_id(),
            reviewer: reviewer.into(),
            reviewer_type,
            approved,
            reason: None,
            correction: None,
            resource_type,
            resource_id: resource_id.into(),
            created: now_ts(),
            updated: None,
        }
    }

    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    pub fn with_correction(mut self, correction: Option<serde_json::Value>) -> Self {
        self.correction = correction;
        self
    }
}

/// A declarative rule: at least `number_required` distinct parties drawn
/// from the listed users/agents/groups/types must approve the task and
/// every action in its episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRequirement {
    pub id: String,
    pub task_id: String,
    pub number_required: u32,
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub agents: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub types: Vec<String>,
    pub created: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<f64>,
}

impl ReviewRequirement {
    pub fn new(task_id: impl Into<String>, number_required: u32) -> Self {
        Self {
            id: short_id(),
            task_id: task_id.into(),
            number_required,
            users: Vec::new(),
            agents: Vec::new(),
            groups: Vec::new(),
            types: Vec::new(),
            created: now_ts(),
            updated: None,
        }
    }

    pub fn with_users(mut self, users: Vec<String>) -> Self {
        self.users = users;
        self
    }

    pub fn with_agents(mut self, agents: Vec<String>) -> Self {
        self.agents = agents;
        self
    }

    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = groups;
        self
    }
}

/// A derived row: the named party still owes a review toward the named
/// requirement on the named task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReviewer {
    pub id: String,
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub requirement_id: String,
}

impl PendingReviewer {
    /// The (requirement, party) key used to diff target rows against
    /// stored rows.
    pub fn key(&self) -> (String, Option<String>, Option<String>) {
        (
            self.requirement_id.clone(),
            self.user_id.clone(),
            self.agent_id.clone(),
        )
    }
}

/// Whether `party` has individually reviewed the task and every action in
/// its episode. Approval polarity is irrelevant: a fail review still
/// discharges the reviewing obligation.
fn party_reviewed(party: &str, task_reviews: &[Review], actions: &[ActionEvent]) -> bool {
    let task_done = task_reviews.iter().any(|r| r.reviewer == party);
    if !task_done {
        return false;
    }
    actions
        .iter()
        .all(|a| a.reviews.iter().any(|r| r.reviewer == party))
}

/// Compute the target pending-reviewers set for one task.
///
/// A listed party is pending unless the requirement is satisfied for it:
/// the party has reviewed the task and every action, and the number of
/// parties (listed or not) that have done the same has reached
/// `number_required`. The result is a fresh target set; callers diff it
/// against the stored rows so the projection stays idempotent.
pub fn recompute_pending(
    task_id: &str,
    requirements: &[ReviewRequirement],
    task_reviews: &[Review],
    actions: &[ActionEvent],
) -> Vec<PendingReviewer> {
    let mut target = Vec::new();

    for req in requirements {
        // Candidate satisfiers must have a task-level review, so the set of
        // reviewers on the task bounds the count.
        let mut satisfiers: Vec<&str> = task_reviews
            .iter()
            .map(|r| r.reviewer.as_str())
            .filter(|p| party_reviewed(p, task_reviews, actions))
            .collect();
        satisfiers.sort_unstable();
        satisfiers.dedup();
        let quorum = satisfiers.len() as u32 >= req.number_required;

        for user in &req.users {
            let satisfied = quorum && party_reviewed(user, task_reviews, actions);
            if !satisfied {
                target.push(PendingReviewer {
                    id: short_id(),
                    task_id: task_id.to_string(),
                    user_id: Some(user.clone()),
                    agent_id: None,
                    requirement_id: req.id.clone(),
                });
            }
        }
        for agent in &req.agents {
            let satisfied = quorum && party_reviewed(agent, task_reviews, actions);
            if !satisfied {
                target.push(PendingReviewer {
                    id: short_id(),
                    task_id: task_id.to_string(),
                    user_id: None,
                    agent_id: Some(agent.clone()),
                    requirement_id: req.id.clone(),
                });
            }
        }
    }

    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::episode::{Action, ActionEvent, ToolRef};

    fn task_review(reviewer: &str) -> Review {
        Review::new(reviewer, ReviewerType::Human, true, ResourceType::Task, "t1")
    }

    fn action(reviews: Vec<Review>) -> ActionEvent {
        let mut event = ActionEvent::new(Action::new("click"), ToolRef::new("desktop"));
        event.reviews = reviews;
        event
    }

    fn two_requirements() -> Vec<ReviewRequirement> {
        vec![
            ReviewRequirement::new("t1", 2)
                .with_users(vec!["anonymous@agentsea.ai".into()])
                .with_agents(vec!["agent1".into(), "agent2".into()]),
            ReviewRequirement::new("t1", 1)
                .with_users(vec!["tom@myspace.com".into(), "anonymous@agentsea.ai".into()])
                .with_agents(vec!["agent3".into()]),
        ]
    }

    fn distinct_parties(rows: &[PendingReviewer]) -> Vec<String> {
        let mut parties: Vec<String> = rows
            .iter()
            .map(|r| {
                r.user_id
                    .clone()
                    .or_else(|| r.agent_id.clone())
                    .unwrap_or_default()
            })
            .collect();
        parties.sort();
        parties.dedup();
        parties
    }

    #[test]
    fn test_all_listed_parties_pending_without_reviews() {
        let reqs = two_requirements();
        let rows = recompute_pending("t1", &reqs, &[], &[]);
        // 3 parties on the first requirement, 3 on the second.
        assert_eq!(rows.len(), 6);
        assert_eq!(distinct_parties(&rows).len(), 5);
    }

    #[test]
    fn test_individual_review_clears_only_that_party() {
        let reqs = two_requirements();
        let reviews = vec![task_review("tom@myspace.com"), task_review("agent1")];
        let rows = recompute_pending("t1", &reqs, &reviews, &[]);

        // tom satisfies the 1-of requirement (quorum 2 >= 1 is met by tom
        // and agent1 both having reviewed); agent1 satisfies the 2-of
        // requirement. Everyone else stays pending.
        let parties = distinct_parties(&rows);
        assert_eq!(
            parties,
            vec!["agent2".to_string(), "agent3".to_string(), "anonymous@agentsea.ai".to_string()]
        );
    }

    #[test]
    fn test_quorum_alone_does_not_clear_unreviewed_parties() {
        let reqs = vec![ReviewRequirement::new("t1", 1)
            .with_users(vec!["a@x.com".into(), "b@x.com".into()])];
        let reviews = vec![task_review("a@x.com")];
        let rows = recompute_pending("t1", &reqs, &reviews, &[]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id.as_deref(), Some("b@x.com"));
    }

    #[test]
    fn test_party_below_quorum_stays_pending_despite_reviewing() {
        let reqs = vec![ReviewRequirement::new("t1", 2)
            .with_users(vec!["a@x.com".into(), "b@x.com".into()])];
        let reviews = vec![task_review("a@x.com")];
        let rows = recompute_pending("t1", &reqs, &reviews, &[]);
        // a has reviewed but the quorum of two is not met, so both remain.
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_unreviewed_action_blocks_satisfaction() {
        let reqs = vec![ReviewRequirement::new("t1", 1).with_users(vec!["a@x.com".into()])];
        let reviews = vec![task_review("a@x.com")];
        let actions = vec![action(vec![])];
        let rows = recompute_pending("t1", &reqs, &reviews, &actions);
        assert_eq!(rows.len(), 1);

        let action_review =
            Review::new("a@x.com", ReviewerType::Human, true, ResourceType::Action, "a1");
        let actions = vec![action(vec![action_review])];
        let rows = recompute_pending("t1", &reqs, &reviews, &actions);
        assert!(rows.is_empty());
    }

    #[test]
    fn test_unlisted_reviewers_count_toward_quorum() {
        let reqs = vec![ReviewRequirement::new("t1", 2).with_users(vec!["a@x.com".into()])];
        // outsider@x.com is not listed but has fully reviewed, lifting the
        // count to two.
        let reviews = vec![task_review("a@x.com"), task_review("outsider@x.com")];
        let rows = recompute_pending("t1", &reqs, &reviews, &[]);
        assert!(rows.is_empty());
    }

    #[test]
    fn test_recompute_is_pure_and_stable() {
        let reqs = two_requirements();
        let reviews = vec![task_review("tom@myspace.com")];
        let a = recompute_pending("t1", &reqs, &reviews, &[]);
        let b = recompute_pending("t1", &reqs, &reviews, &[]);
        let keys_a: Vec<_> = a.iter().map(PendingReviewer::key).collect();
        let keys_b: Vec<_> = b.iter().map(PendingReviewer::key).collect();
        assert_eq!(keys_a, keys_b);
    }
}
