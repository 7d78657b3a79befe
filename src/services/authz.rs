//! Identity and authorisation resolution.
//!
//! A verified principal may act as itself (its email) and as every
//! organisation in which it holds a role allowed for the operation kind.
//! Every task operation gates on the task's owner being in that set; to
//! avoid leaking existence, a failed gate reads as `NotFound`.

use std::collections::HashSet;

use crate::domain::errors::{TrackerError, TrackerResult};
use crate::domain::models::{OpKind, Principal};

/// The set of owner identifiers the principal may act as for `op`.
pub fn resolve_owners(principal: &Principal, op: OpKind) -> HashSet<String> {
    let mut owners = HashSet::new();
    owners.insert(principal.email.clone());
    for (org_id, membership) in &principal.organizations {
        if op.allowed_roles().contains(&membership.role) {
            owners.insert(org_id.clone());
        }
    }
    owners
}

/// Gate one resource owner. `NotFound` rather than `Unauthorized` so a
/// caller cannot probe for the existence of other owners' resources.
pub fn check_owner(
    principal: &Principal,
    op: OpKind,
    owner_id: Option<&str>,
    resource: &str,
) -> TrackerResult<()> {
    let owners = resolve_owners(principal, op);
    match owner_id {
        Some(owner) if owners.contains(owner) => Ok(()),
        _ => Err(TrackerError::NotFound(resource.to_string())),
    }
}

/// Resolve the owner filter for a search. An explicit `owners` list must be
/// a subset of what the principal may act as, otherwise the whole request
/// is `Forbidden`.
pub fn resolve_owner_filter(
    principal: &Principal,
    op: OpKind,
    explicit: Option<&[String]>,
) -> TrackerResult<Vec<String>> {
    let allowed = resolve_owners(principal, op);
    match explicit {
        None => {
            let mut owners: Vec<String> = allowed.into_iter().collect();
            owners.sort();
            Ok(owners)
        }
        Some(requested) => {
            for owner in requested {
                if !allowed.contains(owner) {
                    return Err(TrackerError::Forbidden(format!(
                        "cannot act as owner '{owner}'"
                    )));
                }
            }
            Ok(requested.to_vec())
        }
    }
}

/// The owner a newly created resource belongs to: the explicit owner when
/// given (gated for mutation), else the principal itself.
pub fn resolve_create_owner(
    principal: &Principal,
    requested: Option<&str>,
) -> TrackerResult<String> {
    match requested {
        None => Ok(principal.email.clone()),
        Some(owner) => {
            let allowed = resolve_owners(principal, OpKind::Mutate);
            if allowed.contains(owner) {
                Ok(owner.to_string())
            } else {
                Err(TrackerError::Forbidden(format!(
                    "cannot create resources for owner '{owner}'"
                )))
            }
        }
    }
}
