//! Property tests for the pending-reviewers projection and the task
//! version hash.

use proptest::prelude::*;

use trackway::domain::models::{
    recompute_pending, PendingReviewer, Review, ReviewRequirement, ReviewerType, ResourceType,
    Task,
};

const POOL: [&str; 5] = ["a@x.com", "b@x.com", "c@x.com", "d@x.com", "e@x.com"];

fn task_review(party: &str) -> Review {
    Review::new(party, ReviewerType::Human, true, ResourceType::Task, "t1")
}

fn keys(rows: &[PendingReviewer]) -> Vec<(String, Option<String>, Option<String>)> {
    let mut keys: Vec<_> = rows.iter().map(PendingReviewer::key).collect();
    keys.sort();
    keys
}

proptest! {
    #[test]
    fn pending_rows_only_name_listed_parties(
        users in proptest::sample::subsequence(POOL.to_vec(), 0..=5),
        agents in proptest::sample::subsequence(POOL.to_vec(), 0..=5),
        reviewers in proptest::sample::subsequence(POOL.to_vec(), 0..=5),
        number_required in 1u32..4,
    ) {
        let requirement = ReviewRequirement::new("t1", number_required)
            .with_users(users.iter().map(ToString::to_string).collect())
            .with_agents(agents.iter().map(ToString::to_string).collect());
        let reviews: Vec<Review> = reviewers.iter().map(|p| task_review(p)).collect();

        let rows = recompute_pending("t1", std::slice::from_ref(&requirement), &reviews, &[]);

        for row in &rows {
            prop_assert_eq!(row.task_id.as_str(), "t1");
            prop_assert_eq!(row.requirement_id.as_str(), requirement.id.as_str());
            match (&row.user_id, &row.agent_id) {
                (Some(user), None) => prop_assert!(users.contains(&user.as_str())),
                (None, Some(agent)) => prop_assert!(agents.contains(&agent.as_str())),
                other => prop_assert!(false, "row names no party: {:?}", other),
            }
        }

        // The projection is a pure function of its inputs.
        let again = recompute_pending("t1", std::slice::from_ref(&requirement), &reviews, &[]);
        prop_assert_eq!(keys(&rows), keys(&again));

        // When every listed party has reviewed and the quorum is met, the
        // requirement is fully satisfied.
        let all_listed_reviewed = users
            .iter()
            .chain(agents.iter())
            .all(|p| reviewers.contains(p));
        if all_listed_reviewed && reviewers.len() as u32 >= number_required {
            prop_assert!(rows.is_empty(), "expected no pending rows, got {:?}", rows);
        }

        // Below the quorum nothing is satisfied: every listed party stays.
        if (reviewers.len() as u32) < number_required {
            prop_assert_eq!(rows.len(), users.len() + agents.len());
        }
    }

    #[test]
    fn version_hash_is_deterministic_and_label_sensitive(
        description in "[a-zA-Z0-9 ]{1,40}",
        label in "[a-z]{1,10}",
    ) {
        let mut task = Task::new(description, Some("owner@x.com".into()));
        let first = task.compute_version().unwrap();
        let second = task.compute_version().unwrap();
        prop_assert_eq!(&first, &second);

        task.labels.insert(label, "true".into());
        let third = task.compute_version().unwrap();
        prop_assert_ne!(&first, &third);
    }
}
