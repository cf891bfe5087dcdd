//! Event Watcher: a lazy, ascending-timestamp stream of stack events since a cursor.
//!
//! Ported from the CLI teacher's `events.rs`, modernized onto `aws-sdk-cloudformation` and
//! generalized to the [`crate::provider::StackApi`] seam instead of a direct client.

use std::time::Duration;

use async_stream::try_stream;
use chrono::{DateTime, Utc};
use futures_util::Stream;

use crate::{
    error::{ErrorCode, FogError},
    provider::{OperationContext, StackApi},
    status::ResourceStatus,
};

const POLL_MIN: Duration = Duration::from_secs(2);
const POLL_MAX: Duration = Duration::from_secs(30);

/// A single stack event, as returned by `DescribeStackEvents`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StackEvent {
    pub event_id: String,
    pub physical_resource_id: Option<String>,
    pub logical_resource_id: String,
    pub resource_type: String,
    pub resource_status: ResourceStatus,
    pub resource_status_reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl StackEvent {
    pub(crate) fn from_sdk(
        event: aws_sdk_cloudformation::types::StackEvent,
    ) -> Result<Self, FogError> {
        use aws_smithy_types_convert::date_time::DateTimeExt;

        let resource_status = event
            .resource_status
            .as_ref()
            .map(|s| s.as_str())
            .unwrap_or_default()
            .parse::<ResourceStatus>()
            .map_err(|_| FogError::new(ErrorCode::Internal, "unrecognized resource status in stack event"))?;

        Ok(Self {
            event_id: event.event_id.unwrap_or_default(),
            physical_resource_id: event.physical_resource_id.filter(|id| !id.is_empty()),
            logical_resource_id: event.logical_resource_id.unwrap_or_default(),
            resource_type: event.resource_type.unwrap_or_default(),
            resource_status,
            resource_status_reason: event.resource_status_reason,
            timestamp: event
                .timestamp
                .and_then(|t| t.to_chrono_utc().ok())
                .unwrap_or_default(),
        })
    }

    /// Whether this event pertains to the stack itself (as opposed to one of its resources).
    #[must_use]
    pub fn is_stack_level(&self, stack_id: &str) -> bool {
        self.physical_resource_id.as_deref() == Some(stack_id)
    }
}

/// A lazy stream of [`StackEvent`]s for `stack_id`, in ascending timestamp order, starting from
/// the inclusive `since` instant.
///
/// Finite: ends as soon as a terminal stack-level status is observed, unless `ctx` is cancelled
/// first. Restartable from a new `since` cursor by simply calling this again.
///
/// Implementation: `DescribeStackEvents` returns newest-first; each poll accumulates the page,
/// filters to `timestamp >= since`, sorts ascending, dedups by event id against what was already
/// emitted this call, and yields only the new ones. Poll cadence starts at 2s and backs off
/// exponentially to a 30s ceiling on transient provider failures, resetting to 2s on success.
pub fn watch<'a>(
    stack: &'a dyn StackApi,
    ctx: &'a OperationContext,
    stack_id: &'a str,
    since: DateTime<Utc>,
) -> impl Stream<Item = Result<StackEvent, FogError>> + 'a {
    try_stream! {
        let mut since = since;
        let mut seen = std::collections::HashSet::new();
        let mut backoff = POLL_MIN;

        loop {
            tokio::select! {
                () = ctx.cancelled() => break,
                () = tokio::time::sleep(backoff) => {}
            }

            let events = match stack.describe_stack_events(ctx, stack_id).await {
                Ok(events) => {
                    backoff = POLL_MIN;
                    events
                }
                Err(error) if error.retryable() => {
                    backoff = (backoff * 2).min(POLL_MAX);
                    continue;
                }
                Err(error) => Err(error)?,
            };

            let mut batch: Vec<_> = events
                .into_iter()
                .filter(|event| event.timestamp >= since && !seen.contains(&event.event_id))
                .collect();
            batch.sort_by_key(|event| event.timestamp);

            let mut saw_terminal = false;
            for event in &batch {
                seen.insert(event.event_id.clone());
                if event.timestamp > since {
                    since = event.timestamp;
                }
                if event.is_stack_level(stack_id) && event.resource_status.is_settled() {
                    saw_terminal = true;
                }
            }

            for event in batch {
                yield event;
            }

            if saw_terminal {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StackStatus;

    fn event(id: &str, ts: i64, status: ResourceStatus, physical: Option<&str>) -> StackEvent {
        StackEvent {
            event_id: id.to_string(),
            physical_resource_id: physical.map(str::to_string),
            logical_resource_id: "MyResource".to_string(),
            resource_type: "AWS::S3::Bucket".to_string(),
            resource_status: status,
            resource_status_reason: None,
            timestamp: DateTime::from_timestamp(ts, 0).unwrap(),
        }
    }

    #[test]
    fn is_stack_level_matches_physical_id() {
        let e = event("1", 0, ResourceStatus::CreateComplete, Some("arn:aws:stack/x"));
        assert!(e.is_stack_level("arn:aws:stack/x"));
        assert!(!e.is_stack_level("arn:aws:stack/y"));
    }

    #[test]
    fn settled_status_used_for_terminal_detection() {
        assert!(!ResourceStatus::CreateInProgress.is_settled());
        assert!(ResourceStatus::CreateComplete.is_settled());
        let _ = StackStatus::CreateComplete;
    }
}
