use hsm_domain::{Group, Membership, XName};

use crate::error::GraphError;

/// Checks Data Model invariant: "exclusive-group membership is partitioned —
/// a component belongs to at most one group in any exclusive set."
///
/// Called before adding `component` to `target_group`; `existing_groups`
/// should be every other group the store currently has.
pub fn check_exclusive_membership(
    component: &XName,
    target_group: &Group,
    existing_groups: &[Group],
) -> Result<(), GraphError> {
    let Some(exclusive_set) = &target_group.exclusive_group else {
        return Ok(());
    };
    for g in existing_groups {
        if g.name == target_group.name {
            continue;
        }
        if g.exclusive_group.as_deref() == Some(exclusive_set.as_str()) && g.members.contains(component) {
            return Err(GraphError::ExclusiveConflict {
                component: component.to_string(),
                existing_group: g.name.clone(),
                exclusive_set: exclusive_set.clone(),
            });
        }
    }
    Ok(())
}

/// Checks Data Model invariant: "a component belongs to at most one
/// partition." `memberships` is the component's current membership record.
pub fn check_single_partition(
    component: &XName,
    target_partition: &str,
    memberships: &Membership,
) -> Result<(), GraphError> {
    if let Some(existing) = &memberships.partition {
        if existing != target_partition {
            return Err(GraphError::AlreadyPartitioned {
                component: component.to_string(),
                existing: existing.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(name: &str, exclusive: Option<&str>, members: &[&str]) -> Group {
        Group {
            name: name.to_string(),
            exclusive_group: exclusive.map(|s| s.to_string()),
            members: members.iter().map(|m| XName::normalize(m).unwrap()).collect(),
        }
    }

    #[test]
    fn allows_membership_outside_any_exclusive_set() {
        let g = group("compute", None, &[]);
        let existing = vec![group("other", None, &["x1c4s4b0n0"])];
        assert!(check_exclusive_membership(&XName::normalize("x1c4s4b0n0").unwrap(), &g, &existing).is_ok());
    }

    #[test]
    fn rejects_second_membership_in_same_exclusive_set() {
        let target = group("role_compute", Some("role"), &[]);
        let existing = vec![group("role_service", Some("role"), &["x1c4s4b0n0"])];
        let err = check_exclusive_membership(&XName::normalize("x1c4s4b0n0").unwrap(), &target, &existing)
            .unwrap_err();
        assert!(matches!(err, GraphError::ExclusiveConflict { .. }));
    }

    #[test]
    fn single_partition_invariant() {
        let mut m = Membership::default();
        m.partition = Some("part-a".into());
        assert!(check_single_partition(&XName::normalize("x1c4s4b0n0").unwrap(), "part-a", &m).is_ok());
        assert!(check_single_partition(&XName::normalize("x1c4s4b0n0").unwrap(), "part-b", &m).is_err());
    }
}
