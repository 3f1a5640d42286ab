//! Auto-delete schedule for resources tagged `AutoDelete=true`.

use costguard_core::{AutoDeleteSchedule, TagSet};
use time::{OffsetDateTime, Weekday};

/// Whether a resource with `tags` may be auto-deleted at `now`.
///
/// Production is never eligible. Otherwise a resource is eligible on a
/// configured holiday, on a weekend when weekend shutdown is on, or, for
/// the eligible environments, outside the active-hours window. Day and
/// hour are taken in the schedule's local offset.
pub fn should_auto_delete(tags: &TagSet, schedule: &AutoDeleteSchedule, now: OffsetDateTime) -> bool {
    if tags.is_production() {
        return false;
    }

    let local = now.to_offset(schedule.utc_offset());
    if schedule.is_holiday(local.date()) {
        return true;
    }
    if schedule.weekend_shutdown && matches!(local.weekday(), Weekday::Saturday | Weekday::Sunday)
    {
        return true;
    }

    match tags.environment() {
        Some(env) if schedule.is_eligible_environment(env) => {
            let hour = local.hour();
            hour < schedule.active_start_hour || hour >= schedule.active_end_hour
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn env(value: &str) -> TagSet {
        [("Environment", value), ("AutoDelete", "true")]
            .into_iter()
            .collect()
    }

    // 2026-04-01 is a Wednesday, 2026-04-04 a Saturday.

    #[test]
    fn production_is_never_eligible() {
        let schedule = AutoDeleteSchedule {
            holidays: vec!["2026-04-01".into()],
            ..AutoDeleteSchedule::default()
        };
        assert!(!should_auto_delete(&env("prod"), &schedule, datetime!(2026-04-01 23:00 UTC)));
        assert!(!should_auto_delete(&env("prod"), &schedule, datetime!(2026-04-04 12:00 UTC)));
    }

    #[test]
    fn dev_is_eligible_only_outside_active_hours_on_weekdays() {
        let schedule = AutoDeleteSchedule::default();
        assert!(!should_auto_delete(&env("dev"), &schedule, datetime!(2026-04-01 7:00 UTC)));
        assert!(!should_auto_delete(&env("dev"), &schedule, datetime!(2026-04-01 18:59 UTC)));
        assert!(should_auto_delete(&env("dev"), &schedule, datetime!(2026-04-01 19:00 UTC)));
        assert!(should_auto_delete(&env("dev"), &schedule, datetime!(2026-04-01 6:59 UTC)));
    }

    #[test]
    fn weekends_make_every_non_prod_environment_eligible() {
        let schedule = AutoDeleteSchedule::default();
        assert!(should_auto_delete(&env("qa"), &schedule, datetime!(2026-04-04 12:00 UTC)));
        let weekdays_only = AutoDeleteSchedule {
            weekend_shutdown: false,
            ..AutoDeleteSchedule::default()
        };
        assert!(!should_auto_delete(&env("qa"), &weekdays_only, datetime!(2026-04-04 12:00 UTC)));
    }

    #[test]
    fn holidays_count_in_local_time() {
        let schedule = AutoDeleteSchedule {
            holidays: vec!["2026-04-02".into()],
            utc_offset_hours: 3,
            ..AutoDeleteSchedule::default()
        };
        // 22:00 UTC on the 1st is 01:00 on the 2nd at +03:00.
        assert!(should_auto_delete(&env("qa"), &schedule, datetime!(2026-04-01 22:00 UTC)));
        assert!(!should_auto_delete(&env("qa"), &schedule, datetime!(2026-04-01 12:00 UTC)));
    }

    #[test]
    fn active_window_uses_configured_offset() {
        let schedule = AutoDeleteSchedule {
            utc_offset_hours: -5,
            ..AutoDeleteSchedule::default()
        };
        // 20:00 UTC is 15:00 at -05:00: inside the window.
        assert!(!should_auto_delete(&env("staging"), &schedule, datetime!(2026-04-01 20:00 UTC)));
        // 01:00 UTC Thursday is 20:00 Wednesday at -05:00: outside.
        assert!(should_auto_delete(&env("staging"), &schedule, datetime!(2026-04-02 1:00 UTC)));
    }
}
