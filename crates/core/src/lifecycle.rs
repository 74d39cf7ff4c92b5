//! Lifecycle engine - harvest schedules, status classification and evidence rules.
//!
//! Every function here is a pure transformation: it takes a record value and
//! explicit dates and returns a new value. Persisting the result is the
//! caller's job.
//!
//! Two date rules coexist on purpose:
//! - the harvest schedule covers days +7 through +13 after pollination and
//!   drives classification;
//! - the creation guard rejects a pollination date only once day +14 is
//!   behind `today`.
//!
//! They are kept independent until the window length is settled.

use chrono::{Duration, NaiveDate};
use crate::error::{LifecycleError, Result};
use crate::id::{OwnerId, RecordId};
use crate::record::{
    normalize_plot, HarvestSchedule, ImageRef, MonitoringRecord, NewRecord, RecordPatch,
    RecordStatus,
};
use crate::Time;

/// Days after pollination used by the creation guard.
pub const CREATION_GUARD_DAYS: i64 = 14;

/// Derive the seven harvest dates for a pollination date.
pub fn compute_harvest_schedule(pollination: NaiveDate) -> HarvestSchedule {
    HarvestSchedule::starting_from(pollination)
}

/// Reject a pollination date whose coarse terminal date is already past.
pub fn validate_creation(pollination: NaiveDate, today: NaiveDate) -> Result<()> {
    let terminal = pollination + Duration::days(CREATION_GUARD_DAYS);
    if terminal < today {
        return Err(LifecycleError::HarvestWindowPassed {
            pollination,
            terminal,
            today,
        });
    }
    Ok(())
}

/// Build a new record for `owner` after validating the input.
pub fn create_record(
    owner: OwnerId,
    new: NewRecord,
    today: NaiveDate,
    now: Time,
) -> Result<MonitoringRecord> {
    validate_creation(new.date_of_pollination, today)?;
    if new.pollinated_flower_images.is_empty() {
        return Err(LifecycleError::MissingPollinatedImages);
    }

    Ok(MonitoringRecord {
        id: RecordId::new(),
        owner_id: owner,
        gourd_type: new.gourd_type,
        variety: new.variety,
        plot_no: normalize_plot(new.plot_no),
        date_of_pollination: new.date_of_pollination,
        harvest_schedule: compute_harvest_schedule(new.date_of_pollination),
        pollinated_flower_images: new.pollinated_flower_images,
        fruit_harvested_images: Vec::new(),
        status: RecordStatus::Pending,
        date_of_finalization: None,
        version: 0,
        created_at: now,
        updated_at: now,
    })
}

/// Classify a record's status as of `today`.
///
/// Full harvest evidence wins regardless of the date, so an early finalize
/// is possible. Otherwise the status follows the harvest window.
pub fn classify_status(record: &MonitoringRecord, today: NaiveDate) -> RecordStatus {
    classify_counts(
        &record.harvest_schedule,
        record.pollinated_count(),
        record.harvested_count(),
        today,
    )
}

/// Classification over the bare inputs, for callers holding loose documents.
pub fn classify_counts(
    schedule: &HarvestSchedule,
    pollinated: usize,
    harvested: usize,
    today: NaiveDate,
) -> RecordStatus {
    if pollinated > 0 && harvested == pollinated {
        return RecordStatus::Completed;
    }

    if today < schedule.first() {
        RecordStatus::Pending
    } else if today <= schedule.last() {
        RecordStatus::InProgress
    } else {
        RecordStatus::Failed
    }
}

/// Whether `today` is one of the record's harvest dates.
pub fn is_due_today(record: &MonitoringRecord, today: NaiveDate) -> bool {
    record.harvest_schedule.contains(today)
}

/// Whether the harvest window has fully elapsed.
pub fn window_elapsed(record: &MonitoringRecord, today: NaiveDate) -> bool {
    today > record.harvest_schedule.last()
}

/// Append a pollinated-flower image.
pub fn add_pollinated_image(
    record: &MonitoringRecord,
    image: ImageRef,
    now: Time,
) -> Result<MonitoringRecord> {
    if record.is_finalized() {
        return Err(LifecycleError::AlreadyFinalized(record.id));
    }

    let mut next = record.clone();
    next.pollinated_flower_images.push(image);
    next.updated_at = now;
    Ok(next)
}

/// Append a harvested-fruit image, keeping harvested ≤ pollinated.
///
/// Accepted only while the record classifies as Pending or InProgress on
/// `today`. A window that has elapsed rejects new evidence even before the
/// record is finalized.
pub fn add_harvested_image(
    record: &MonitoringRecord,
    image: ImageRef,
    today: NaiveDate,
    now: Time,
) -> Result<MonitoringRecord> {
    let pollinated = record.pollinated_count();
    let harvested = record.harvested_count() + 1;
    if harvested > pollinated {
        return Err(LifecycleError::ExceedsPollinatedCount {
            pollinated,
            harvested,
        });
    }
    if record.is_finalized() {
        return Err(LifecycleError::AlreadyFinalized(record.id));
    }
    if window_elapsed(record, today) {
        return Err(LifecycleError::HarvestWindowClosed {
            record: record.id,
            closed_on: record.harvest_schedule.last(),
            today,
        });
    }

    let mut next = record.clone();
    next.fruit_harvested_images.push(image);
    next.updated_at = now;
    Ok(next)
}

/// Move a record into its terminal status if it has earned one.
///
/// Returns the record unchanged when it is already finalized, or when the
/// evidence is incomplete and the window is still open.
pub fn finalize(record: &MonitoringRecord, now: Time) -> MonitoringRecord {
    if record.is_finalized() {
        return record.clone();
    }

    let status = if record.harvest_complete() {
        RecordStatus::Completed
    } else if window_elapsed(record, now.date_naive()) {
        RecordStatus::Failed
    } else {
        return record.clone();
    };

    let mut next = record.clone();
    next.status = status;
    next.date_of_finalization = Some(now);
    next.updated_at = now;
    next
}

/// Change the pollination date and recompute the schedule.
///
/// The new date must pass the same guard as creation on `today`.
pub fn reschedule(
    record: &MonitoringRecord,
    pollination: NaiveDate,
    today: NaiveDate,
    now: Time,
) -> Result<MonitoringRecord> {
    if record.is_finalized() {
        return Err(LifecycleError::AlreadyFinalized(record.id));
    }
    validate_creation(pollination, today)?;

    let mut next = record.clone();
    next.date_of_pollination = pollination;
    next.harvest_schedule = compute_harvest_schedule(pollination);
    next.updated_at = now;
    Ok(next)
}

/// Apply a descriptive patch. A new pollination date goes through [`reschedule`].
pub fn apply_patch(
    record: &MonitoringRecord,
    patch: &RecordPatch,
    today: NaiveDate,
    now: Time,
) -> Result<MonitoringRecord> {
    let mut next = match patch.date_of_pollination {
        Some(date) if date != record.date_of_pollination => reschedule(record, date, today, now)?,
        _ => record.clone(),
    };

    if let Some(gourd_type) = patch.gourd_type {
        next.gourd_type = gourd_type;
    }
    if let Some(variety) = patch.variety {
        next.variety = variety;
    }
    if let Some(plot_no) = &patch.plot_no {
        next.plot_no = normalize_plot(plot_no.clone());
    }
    if !patch.is_empty() {
        next.updated_at = now;
    }
    Ok(next)
}

/// Harvest dates equal to `today` that have not been notified yet.
pub fn pending_notifications(record: &MonitoringRecord, today: NaiveDate) -> Vec<NaiveDate> {
    if record.is_finalized() {
        return Vec::new();
    }
    record
        .harvest_schedule
        .entries()
        .iter()
        .filter(|d| d.date == today && !d.notification_sent)
        .map(|d| d.date)
        .collect()
}

/// Flag the reminder for `date` as sent. Unscheduled dates leave the record untouched.
pub fn mark_notification_sent(
    record: &MonitoringRecord,
    date: NaiveDate,
    now: Time,
) -> MonitoringRecord {
    let mut next = record.clone();
    if next.harvest_schedule.mark_sent(date) {
        next.updated_at = now;
    }
    next
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .map_err(|e| LifecycleError::InvalidDate(format!("{text:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::GourdTypeId;
    use chrono::{TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(day: NaiveDate) -> Time {
        Utc.from_utc_datetime(&day.and_hms_opt(9, 0, 0).unwrap())
    }

    fn images(prefix: &str, n: usize) -> Vec<ImageRef> {
        (0..n).map(|i| ImageRef::new(format!("{prefix}-{i}.jpg"))).collect()
    }

    fn record_with(pollinated: usize, harvested: usize) -> MonitoringRecord {
        let pollination = date(2024, 1, 1);
        let mut record = create_record(
            OwnerId::new("grower-1"),
            NewRecord {
                gourd_type: GourdTypeId::new(),
                variety: None,
                plot_no: Some("A1".into()),
                date_of_pollination: pollination,
                pollinated_flower_images: images("flower", pollinated.max(1)),
            },
            pollination,
            at(pollination),
        )
        .unwrap();
        record.pollinated_flower_images.truncate(pollinated);
        record.fruit_harvested_images = images("fruit", harvested);
        record
    }

    #[test]
    fn test_schedule_for_new_year() {
        let schedule = compute_harvest_schedule(date(2024, 1, 1));
        let dates: Vec<_> = schedule.dates().collect();
        let expected: Vec<_> = (8..=14).map(|d| date(2024, 1, d)).collect();
        assert_eq!(dates, expected);
    }

    #[test]
    fn test_schedule_is_idempotent() {
        let d = date(2023, 12, 28);
        assert_eq!(compute_harvest_schedule(d), compute_harvest_schedule(d));
    }

    #[test]
    fn test_validate_creation_guard() {
        let pollination = date(2024, 1, 1);
        assert!(validate_creation(pollination, date(2024, 1, 15)).is_ok());
        let err = validate_creation(pollination, date(2024, 1, 16)).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::HarvestWindowPassed {
                pollination,
                terminal: date(2024, 1, 15),
                today: date(2024, 1, 16),
            }
        );
    }

    #[test]
    fn test_create_requires_pollinated_images() {
        let pollination = date(2024, 1, 1);
        let err = create_record(
            OwnerId::new("grower-1"),
            NewRecord {
                gourd_type: GourdTypeId::new(),
                variety: None,
                plot_no: None,
                date_of_pollination: pollination,
                pollinated_flower_images: vec![],
            },
            pollination,
            at(pollination),
        )
        .unwrap_err();
        assert_eq!(err, LifecycleError::MissingPollinatedImages);
    }

    #[test]
    fn test_create_sets_schedule_and_pending() {
        let record = record_with(3, 0);
        assert_eq!(record.status, RecordStatus::Pending);
        assert_eq!(record.harvest_schedule.first(), date(2024, 1, 8));
        assert!(record.date_of_finalization.is_none());
    }

    #[test]
    fn test_classify_follows_window() {
        let record = record_with(3, 1);
        assert_eq!(classify_status(&record, date(2024, 1, 7)), RecordStatus::Pending);
        assert_eq!(classify_status(&record, date(2024, 1, 8)), RecordStatus::InProgress);
        assert_eq!(classify_status(&record, date(2024, 1, 14)), RecordStatus::InProgress);
        assert_eq!(classify_status(&record, date(2024, 1, 15)), RecordStatus::Failed);
    }

    #[test]
    fn test_classify_completed_regardless_of_date() {
        let record = record_with(2, 2);
        assert_eq!(classify_status(&record, date(2024, 1, 2)), RecordStatus::Completed);
        assert_eq!(classify_status(&record, date(2024, 3, 1)), RecordStatus::Completed);
    }

    #[test]
    fn test_classify_zero_pollinated_never_completes() {
        let record = record_with(0, 0);
        assert_eq!(classify_status(&record, date(2024, 1, 10)), RecordStatus::InProgress);
        assert_eq!(classify_status(&record, date(2024, 1, 20)), RecordStatus::Failed);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let record = record_with(4, 2);
        let today = date(2024, 1, 11);
        assert_eq!(classify_status(&record, today), classify_status(&record, today));
    }

    #[test]
    fn test_due_today_matches_schedule_dates() {
        let record = record_with(3, 0);
        let fourth = record.harvest_schedule.entries()[3].date;
        assert_eq!(fourth, date(2024, 1, 11));
        assert!(is_due_today(&record, fourth));
        assert!(record.harvest_schedule.dates().all(|d| is_due_today(&record, d)));
        assert!(!is_due_today(&record, record.harvest_schedule.first() - Duration::days(1)));
        assert!(!is_due_today(&record, record.harvest_schedule.last() + Duration::days(1)));
    }

    #[test]
    fn test_harvest_up_to_pollinated_then_finalize() {
        let mut record = record_with(5, 0);
        let now = at(date(2024, 1, 9));
        for i in 0..5 {
            record = add_harvested_image(&record, ImageRef::new(format!("fruit-{i}")), now.date_naive(), now)
                .unwrap();
            assert!(record.harvested_count() <= record.pollinated_count());
        }
        assert_eq!(record.harvested_count(), 5);

        let finalized = finalize(&record, now);
        assert_eq!(finalized.status, RecordStatus::Completed);
        assert_eq!(finalized.date_of_finalization, Some(now));
    }

    #[test]
    fn test_harvest_beyond_pollinated_is_rejected() {
        let record = record_with(3, 3);
        let before = record.clone();
        let day = date(2024, 1, 9);
        let err = add_harvested_image(&record, ImageRef::new("extra"), day, at(day)).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::ExceedsPollinatedCount {
                pollinated: 3,
                harvested: 4
            }
        );
        assert_eq!(record, before);
    }

    #[test]
    fn test_no_harvest_after_failure() {
        let record = record_with(3, 1);
        let failed = finalize(&record, at(date(2024, 1, 20)));
        assert_eq!(failed.status, RecordStatus::Failed);
        let day = date(2024, 1, 21);
        let err = add_harvested_image(&failed, ImageRef::new("late"), day, at(day)).unwrap_err();
        assert_eq!(err, LifecycleError::AlreadyFinalized(failed.id));
    }

    #[test]
    fn test_no_harvest_once_window_elapsed_even_if_not_finalized() {
        let record = record_with(2, 0);
        let today = date(2024, 1, 20);
        assert_eq!(classify_status(&record, today), RecordStatus::Failed);
        assert!(!record.is_finalized());

        let err = add_harvested_image(&record, ImageRef::new("late"), today, at(today)).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::HarvestWindowClosed {
                record: record.id,
                closed_on: date(2024, 1, 14),
                today,
            }
        );
        assert_eq!(finalize(&record, at(today)).status, RecordStatus::Failed);
    }

    #[test]
    fn test_harvest_allowed_through_last_window_day() {
        let record = record_with(2, 0);
        let pending_day = date(2024, 1, 5);
        let last_day = date(2024, 1, 14);
        let record = add_harvested_image(&record, ImageRef::new("early"), pending_day, at(pending_day)).unwrap();
        let record = add_harvested_image(&record, ImageRef::new("last"), last_day, at(last_day)).unwrap();
        assert_eq!(finalize(&record, at(last_day)).status, RecordStatus::Completed);
    }

    #[test]
    fn test_pollinated_append_blocked_after_finalize() {
        let record = record_with(1, 1);
        let done = finalize(&record, at(date(2024, 1, 9)));
        assert!(matches!(
            add_pollinated_image(&done, ImageRef::new("more"), at(date(2024, 1, 9))),
            Err(LifecycleError::AlreadyFinalized(_))
        ));

        let open = record_with(2, 0);
        let grown = add_pollinated_image(&open, ImageRef::new("more"), at(date(2024, 1, 3))).unwrap();
        assert_eq!(grown.pollinated_count(), 3);
        assert_eq!(open.pollinated_count(), 2);
    }

    #[test]
    fn test_finalize_open_window_is_noop() {
        let record = record_with(3, 1);
        let same = finalize(&record, at(date(2024, 1, 10)));
        assert_eq!(same, record);
    }

    #[test]
    fn test_finalize_sets_date_once() {
        let record = record_with(2, 2);
        let first = finalize(&record, at(date(2024, 1, 9)));
        let second = finalize(&first, at(date(2024, 1, 12)));
        assert_eq!(second.date_of_finalization, first.date_of_finalization);
        assert_eq!(second.status, RecordStatus::Completed);
    }

    #[test]
    fn test_reschedule_recomputes_window() {
        let record = record_with(2, 0);
        let day = date(2024, 2, 1);
        let moved = reschedule(&record, day, day, at(day)).unwrap();
        assert_eq!(moved.harvest_schedule, compute_harvest_schedule(day));
        assert_eq!(moved.date_of_pollination, day);
    }

    #[test]
    fn test_reschedule_into_the_past_is_guarded() {
        let record = record_with(2, 0);
        let today = date(2024, 1, 3);
        let err = reschedule(&record, date(2023, 12, 1), today, at(today)).unwrap_err();
        assert!(matches!(err, LifecycleError::HarvestWindowPassed { .. }));

        let patch = RecordPatch {
            date_of_pollination: Some(date(2023, 12, 1)),
            ..Default::default()
        };
        let err = apply_patch(&record, &patch, today, at(today)).unwrap_err();
        assert!(matches!(err, LifecycleError::HarvestWindowPassed { .. }));
    }

    #[test]
    fn test_apply_patch_fields() {
        let record = record_with(2, 0);
        let patch = RecordPatch {
            plot_no: Some(Some("  B7 ".into())),
            variety: Some(None),
            ..Default::default()
        };
        let day = date(2024, 1, 3);
        let patched = apply_patch(&record, &patch, day, at(day)).unwrap();
        assert_eq!(patched.plot_no.as_deref(), Some("B7"));
        assert_eq!(patched.harvest_schedule, record.harvest_schedule);

        let unchanged = apply_patch(&record, &RecordPatch::default(), day, at(day)).unwrap();
        assert_eq!(unchanged, record);
    }

    #[test]
    fn test_notifications_flow() {
        let record = record_with(2, 0);
        let day = date(2024, 1, 10);
        assert_eq!(pending_notifications(&record, day), vec![day]);

        let notified = mark_notification_sent(&record, day, at(day));
        assert!(pending_notifications(&notified, day).is_empty());
        assert!(pending_notifications(&notified, date(2024, 1, 3)).is_empty());

        let untouched = mark_notification_sent(&record, date(2024, 1, 3), at(day));
        assert_eq!(untouched, record);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024-01-08").unwrap(), date(2024, 1, 8));
        assert!(matches!(parse_date("2024-13-01"), Err(LifecycleError::InvalidDate(_))));
        assert!(matches!(parse_date("yesterday"), Err(LifecycleError::InvalidDate(_))));
    }
}
