//! Report Builder: turn a terminal deployment's event stream into a timeline suitable for
//! rendering by the output sink (10.E).
//!
//! No direct corpus grounding file (neither teacher renders a timeline); built atop
//! [`crate::events::StackEvent`] and [`crate::change_set::Action`] in the teacher's general
//! thin-transformation idiom — a pure function from already-collected data to a display-ready
//! struct, mirroring [`crate::change_set::analyze`]'s "no mutation, pure projection" shape.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::{
    change_set::{Action, ResourceChange},
    events::StackEvent,
    status::{ResourceStatus, Status},
};

/// One row of the rendered timeline.
#[derive(Clone, Debug)]
pub struct TimelineRow {
    pub logical_resource_id: String,
    pub label: &'static str,
    pub start: DateTime<Tz>,
    pub end: Option<DateTime<Tz>>,
    pub critical: bool,
    pub failed_reason: Option<String>,
    pub incomplete: bool,
}

/// A zero-width stack-level milestone marker.
#[derive(Clone, Debug)]
pub struct Milestone {
    pub status: ResourceStatus,
    pub at: DateTime<Tz>,
}

/// The full rendered report for one deployment.
#[derive(Clone, Debug, Default)]
pub struct Report {
    pub rows: Vec<TimelineRow>,
    pub milestones: Vec<Milestone>,
}

const STACK_MILESTONES: &[ResourceStatus] = &[
    ResourceStatus::UpdateCompleteCleanupInProgress,
    ResourceStatus::UpdateComplete,
    ResourceStatus::CreateComplete,
    ResourceStatus::UpdateRollbackComplete,
];

/// Build a [`Report`] from a change set's resource changes and the full ordered event stream
/// observed during execution. `terminal_at` is the instant the deployment was considered over
/// (used to compute duration for rows with no matching end event). `zone` is the caller-supplied
/// display timezone.
#[must_use]
pub fn build(changes: &[ResourceChange], events: &[StackEvent], stack_id: &str, terminal_at: DateTime<Utc>, zone: Tz) -> Report {
    let mut events_by_logical: BTreeMap<&str, Vec<&StackEvent>> = BTreeMap::new();
    for event in events {
        events_by_logical.entry(event.logical_resource_id.as_str()).or_default().push(event);
    }

    let mut rows = Vec::new();
    for change in changes {
        let logical_events = events_by_logical.get(change.logical_resource_id.as_str()).map(Vec::as_slice).unwrap_or(&[]);

        match &change.action {
            Action::Remove => {
                if let Some(row) = span_row(
                    &change.logical_resource_id,
                    "removed",
                    logical_events,
                    ResourceStatus::DeleteInProgress,
                    ResourceStatus::DeleteComplete,
                    change.physical_resource_id.as_deref(),
                    false,
                    terminal_at,
                    zone,
                ) {
                    rows.push(row);
                }
            }
            Action::Add | Action::Import => {
                if let Some(row) = span_row(
                    &change.logical_resource_id,
                    "created",
                    logical_events,
                    ResourceStatus::CreateInProgress,
                    ResourceStatus::CreateComplete,
                    change.physical_resource_id.as_deref(),
                    false,
                    terminal_at,
                    zone,
                ) {
                    rows.push(row);
                }
            }
            Action::Modify(detail) => {
                if matches!(detail.replacement, crate::change_set::Replacement::True) {
                    if let Some(row) = span_row(
                        &change.logical_resource_id,
                        "create-new",
                        logical_events,
                        ResourceStatus::CreateInProgress,
                        ResourceStatus::CreateComplete,
                        None,
                        false,
                        terminal_at,
                        zone,
                    ) {
                        rows.push(row);
                    }
                    if let Some(row) = span_row(
                        &change.logical_resource_id,
                        "cleanup-old",
                        logical_events,
                        ResourceStatus::DeleteInProgress,
                        ResourceStatus::DeleteComplete,
                        change.physical_resource_id.as_deref(),
                        true,
                        terminal_at,
                        zone,
                    ) {
                        rows.push(row);
                    }
                } else if let Some(row) = span_row(
                    &change.logical_resource_id,
                    "updated",
                    logical_events,
                    ResourceStatus::UpdateInProgress,
                    ResourceStatus::UpdateComplete,
                    change.physical_resource_id.as_deref(),
                    false,
                    terminal_at,
                    zone,
                ) {
                    rows.push(row);
                }
            }
            Action::Dynamic => {}
        }

        for event in logical_events {
            if event.resource_status.sentiment() == crate::status::StatusSentiment::Negative && event.resource_status.is_settled() {
                rows.push(TimelineRow {
                    logical_resource_id: change.logical_resource_id.clone(),
                    label: "failed",
                    start: event.timestamp.with_timezone(&zone),
                    end: Some(event.timestamp.with_timezone(&zone)),
                    critical: true,
                    failed_reason: event.resource_status_reason.clone(),
                    incomplete: false,
                });
            }
        }
    }

    let mut milestones = Vec::new();
    for event in events {
        if !event.is_stack_level(stack_id) {
            continue;
        }
        if STACK_MILESTONES.contains(&event.resource_status) {
            milestones.push(Milestone { status: event.resource_status, at: event.timestamp.with_timezone(&zone) });
        }
    }

    Report { rows, milestones }
}

/// Find the first `start_status` event matching `physical_id` (or any event for the logical id
/// when `physical_id` is `None`) and the first subsequent `end_status` event with the same
/// physical id, and build a row spanning them. Returns `None` if no start event exists at all.
#[allow(clippy::too_many_arguments)]
fn span_row(
    logical_resource_id: &str,
    label: &'static str,
    events: &[&StackEvent],
    start_status: ResourceStatus,
    end_status: ResourceStatus,
    physical_id: Option<&str>,
    critical: bool,
    terminal_at: DateTime<Utc>,
    zone: Tz,
) -> Option<TimelineRow> {
    let start_event = events.iter().find(|e| {
        e.resource_status == start_status && physical_id.is_none_or(|id| e.physical_resource_id.as_deref() == Some(id))
    })?;

    let matching_physical = start_event.physical_resource_id.clone();
    let end_event = events
        .iter()
        .find(|e| e.resource_status == end_status && e.timestamp >= start_event.timestamp && e.physical_resource_id == matching_physical);

    let (end, incomplete) = match end_event {
        Some(e) => (Some(e.timestamp.with_timezone(&zone)), false),
        None => (Some(terminal_at.with_timezone(&zone)), true),
    };

    Some(TimelineRow {
        logical_resource_id: logical_resource_id.to_string(),
        label,
        start: start_event.timestamp.with_timezone(&zone),
        end,
        critical,
        failed_reason: None,
        incomplete,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change_set::{Action, ModifyDetail, ModifyScope, Replacement};

    fn event(logical: &str, status: ResourceStatus, physical: &str, ts: i64) -> StackEvent {
        StackEvent {
            event_id: format!("{logical}-{ts}"),
            physical_resource_id: Some(physical.to_string()),
            logical_resource_id: logical.to_string(),
            resource_type: "AWS::S3::Bucket".to_string(),
            resource_status: status,
            resource_status_reason: None,
            timestamp: Utc.timestamp_opt(ts, 0).unwrap(),
        }
    }

    fn change(logical: &str, action: Action, physical: Option<&str>) -> ResourceChange {
        ResourceChange {
            action,
            logical_resource_id: logical.to_string(),
            physical_resource_id: physical.map(str::to_string),
            resource_type: "AWS::S3::Bucket".to_string(),
            module_id: None,
        }
    }

    #[test]
    fn replacement_produces_create_new_and_cleanup_old_rows() {
        let changes = vec![change(
            "Bucket",
            Action::Modify(ModifyDetail {
                details: vec![],
                replacement: Replacement::True,
                scope: ModifyScope::Properties.into(),
            }),
            Some("old-physical-id"),
        )];
        let events = vec![
            event("Bucket", ResourceStatus::CreateInProgress, "new-physical-id", 0),
            event("Bucket", ResourceStatus::CreateComplete, "new-physical-id", 10),
            event("Bucket", ResourceStatus::DeleteInProgress, "old-physical-id", 11),
            event("Bucket", ResourceStatus::DeleteComplete, "old-physical-id", 15),
        ];

        let report = build(&changes, &events, "stack-arn", Utc.timestamp_opt(20, 0).unwrap(), Tz::UTC);
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].label, "create-new");
        assert!(!report.rows[0].critical);
        assert_eq!(report.rows[1].label, "cleanup-old");
        assert!(report.rows[1].critical);
    }

    #[test]
    fn missing_end_event_is_flagged_incomplete() {
        let changes = vec![change("Bucket", Action::Add, None)];
        let events = vec![event("Bucket", ResourceStatus::CreateInProgress, "p1", 0)];

        let report = build(&changes, &events, "stack-arn", Utc.timestamp_opt(100, 0).unwrap(), Tz::UTC);
        assert_eq!(report.rows.len(), 1);
        assert!(report.rows[0].incomplete);
    }

    #[test]
    fn stack_level_milestones_are_extracted() {
        let events = vec![event("stack-arn", ResourceStatus::UpdateComplete, "stack-arn", 5)];
        let report = build(&[], &events, "stack-arn", Utc.timestamp_opt(5, 0).unwrap(), Tz::UTC);
        assert_eq!(report.milestones.len(), 1);
        assert_eq!(report.milestones[0].status, ResourceStatus::UpdateComplete);
    }
}
