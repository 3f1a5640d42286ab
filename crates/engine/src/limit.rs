//! Limit Enforcer: caps the number of concurrent instances.

use costguard_core::Resource;

/// IDs of the resources beyond `max_count`, newest first.
///
/// The longest-running resources are kept and the most recent launches
/// are shed. Identical creation times are ordered by ID ascending, both
/// when choosing which to retain (the lower ID stays) and in the output. The result never holds more than
/// `resources.len() - max_count` IDs and depends only on its input.
pub fn enforce_cap(resources: &[Resource], max_count: usize) -> Vec<String> {
    let mut ordered: Vec<&Resource> = resources.iter().collect();
    ordered.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    let mut excess: Vec<&Resource> = ordered.into_iter().skip(max_count).collect();
    excess.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    excess.into_iter().map(|r| r.id.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use costguard_core::{ResourceKind, ResourceState};
    use time::macros::datetime;
    use time::OffsetDateTime;

    fn at(id: &str, created_at: OffsetDateTime) -> Resource {
        Resource::new(
            id,
            ResourceKind::ComputeInstance,
            "t3.medium",
            ResourceState::Running,
            created_at,
        )
    }

    #[test]
    fn newest_are_excess_oldest_retained() {
        let resources = vec![
            at("i-10", datetime!(2026-04-01 10:00 UTC)),
            at("i-12", datetime!(2026-04-01 12:00 UTC)),
            at("i-11", datetime!(2026-04-01 11:00 UTC)),
        ];
        assert_eq!(enforce_cap(&resources, 1), vec!["i-12", "i-11"]);
    }

    #[test]
    fn under_the_cap_nothing_is_excess() {
        let resources = vec![at("i-1", datetime!(2026-04-01 10:00 UTC))];
        assert!(enforce_cap(&resources, 1).is_empty());
        assert!(enforce_cap(&resources, 5).is_empty());
        assert!(enforce_cap(&[], 0).is_empty());
    }

    #[test]
    fn ties_break_by_id() {
        let same = datetime!(2026-04-01 10:00 UTC);
        let resources = vec![at("i-c", same), at("i-a", same), at("i-b", same)];
        assert_eq!(enforce_cap(&resources, 1), vec!["i-b", "i-c"]);
    }

    #[test]
    fn newest_first_with_ties_by_id_ascending() {
        let early = datetime!(2026-04-01 09:00 UTC);
        let late = datetime!(2026-04-01 11:00 UTC);
        let resources = vec![
            at("i-z", late),
            at("i-keep", datetime!(2026-04-01 08:00 UTC)),
            at("i-y", early),
            at("i-x", late),
            at("i-w", early),
        ];
        assert_eq!(
            enforce_cap(&resources, 1),
            vec!["i-x", "i-z", "i-w", "i-y"]
        );
    }

    #[test]
    fn idempotent_and_bounded() {
        let resources: Vec<Resource> = (0..7)
            .map(|i| at(&format!("i-{}", i), datetime!(2026-04-01 0:00 UTC) + time::Duration::minutes(i % 3)))
            .collect();
        let first = enforce_cap(&resources, 4);
        let second = enforce_cap(&resources, 4);
        assert_eq!(first, second);
        assert_eq!(first.len(), resources.len() - 4);
        assert_eq!(enforce_cap(&resources, 0).len(), resources.len());
    }
}
