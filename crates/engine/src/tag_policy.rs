//! Tag Policy Evaluator.
//!
//! [`evaluate`] is pure: the same resource, policy, schedule and instant
//! always produce the same verdict. The only grace state that survives a
//! run is the marker tags the guardrail writes back, and those are
//! derived from [`grace_deadline`].

use costguard_core::policy::parse_hours;
use costguard_core::{
    keys, AutoDeleteSchedule, ComplianceVerdict, Resource, TagPolicy, VerdictAction, VerdictCause,
};
use rust_decimal::Decimal;
use time::OffsetDateTime;

use crate::schedule::should_auto_delete;

/// `created_at + grace_period`. Every grace check goes through here.
pub fn grace_deadline(resource: &Resource, policy: &TagPolicy) -> OffsetDateTime {
    resource.created_at + policy.grace_period()
}

/// Evaluate one resource against the tag policy at `now`.
///
/// Non-compliant resources are warned until their grace deadline and
/// terminated after it. Compliant resources are terminated when they
/// outlive `MaxHours`, or when they ask for `AutoDelete` and the schedule
/// allows it.
pub fn evaluate(
    resource: &Resource,
    policy: &TagPolicy,
    schedule: &AutoDeleteSchedule,
    now: OffsetDateTime,
) -> ComplianceVerdict {
    let missing_tags = policy.missing_keys(&resource.tags);
    let mut invalid_tags = policy.invalid_keys(&resource.tags);
    let max_hours = match resource.tags.get(keys::MAX_HOURS) {
        Some(raw) => {
            let parsed = parse_hours(raw);
            if parsed.is_none() {
                invalid_tags.insert(keys::MAX_HOURS.to_string());
            }
            parsed
        }
        None => None,
    };

    let deadline = grace_deadline(resource, policy);
    let in_grace = now <= deadline;
    let compliant = missing_tags.is_empty() && invalid_tags.is_empty();

    let (action, cause) = if !compliant {
        if in_grace {
            (VerdictAction::Warn, Some(VerdictCause::MissingTags))
        } else {
            (VerdictAction::Terminate, Some(VerdictCause::GraceExpired))
        }
    } else if max_hours.is_some_and(|max| exceeds_hours(resource, max, now)) {
        (VerdictAction::Terminate, Some(VerdictCause::MaxHoursExceeded))
    } else if resource.tags.auto_delete_requested()
        && should_auto_delete(&resource.tags, schedule, now)
    {
        (VerdictAction::Terminate, Some(VerdictCause::AutoDeleteSchedule))
    } else {
        (VerdictAction::None, None)
    };

    ComplianceVerdict {
        resource_id: resource.id.clone(),
        missing_tags,
        invalid_tags,
        in_grace,
        grace_deadline: deadline,
        action,
        cause,
    }
}

/// Whether the resource has been alive strictly longer than `max_hours`.
fn exceeds_hours(resource: &Resource, max_hours: Decimal, now: OffsetDateTime) -> bool {
    let age_seconds = Decimal::from(resource.age(now).whole_seconds());
    age_seconds > max_hours * Decimal::from(3600)
}
