//! Poll a stack until it reaches a terminal state

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use clusterstack_models::{StackDescription, StackEvent, StackPhase, StackStatus};
use tracing::{debug, info};

use crate::activity_types::{PollOptions, PollStackOutput};
use crate::cfn_client::ProvisioningClient;
use crate::error::ProvisionError;
use crate::retry::{retry_transient, RetryError};
use crate::stop::StopConditions;

/// High-water mark over a stack's event history.
///
/// Tracks the newest delivered timestamp plus the ids delivered at exactly that
/// timestamp, so events sharing a timestamp are neither dropped nor repeated.
#[derive(Debug, Default, Clone)]
pub struct EventCursor {
    last_timestamp: Option<DateTime<Utc>>,
    ids_at_last: HashSet<String>,
}

impl EventCursor {
    /// Events from `batch` not yet delivered, oldest first.
    ///
    /// `batch` is in backend order (newest first); ties keep their relative arrival order.
    pub fn unseen(&self, batch: Vec<StackEvent>) -> Vec<StackEvent> {
        let mut events = batch
            .into_iter()
            .rev()
            .filter(|event| self.is_new(event))
            .collect::<Vec<_>>();
        events.sort_by_key(|event| event.timestamp);

        let mut seen = HashSet::new();
        events.retain(|event| seen.insert(event.event_id.clone()));
        events
    }

    /// Newest delivered timestamp
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp
    }

    /// Record `event` as delivered
    pub fn advance(&mut self, event: &StackEvent) {
        match self.last_timestamp {
            Some(last) if event.timestamp < last => {}
            Some(last) if event.timestamp == last => {
                self.ids_at_last.insert(event.event_id.clone());
            }
            _ => {
                self.last_timestamp = Some(event.timestamp);
                self.ids_at_last.clear();
                self.ids_at_last.insert(event.event_id.clone());
            }
        }
    }

    fn is_new(&self, event: &StackEvent) -> bool {
        match self.last_timestamp {
            None => true,
            Some(last) if event.timestamp > last => true,
            Some(last) if event.timestamp == last => !self.ids_at_last.contains(&event.event_id),
            Some(_) => false,
        }
    }
}

/// Poll `stack_name` until it reaches a terminal status, delivering each new event to
/// `on_event` exactly once, oldest first.
///
/// Returns [`ProvisionError::ProvisioningFailed`] for failure terminal states,
/// [`ProvisionError::TimedOut`] once the run's deadline passes and
/// [`ProvisionError::Cancelled`] when the run is cancelled. The last two say nothing
/// about the remote stack, which may still be converging.
pub async fn poll_until_terminal<F>(
    client: &dyn ProvisioningClient,
    stack_name: &str,
    options: &PollOptions,
    stop: &StopConditions,
    mut on_event: F,
) -> Result<PollStackOutput, ProvisionError>
where
    F: FnMut(&StackEvent),
{
    let mut cursor = EventCursor::default();
    let mut last_status: Option<StackStatus> = None;
    let mut first_failure: Option<(String, String)> = None;
    let mut delivered = 0usize;
    let mut polls = 0u32;

    loop {
        polls += 1;

        let since = cursor.last_timestamp();
        let (stack, batch) = tokio::select! {
            biased;
            reason = stop.stopped() => return Err(reason.into_error(stack_name, last_status)),
            result = query_stack(client, stack_name, since, options) => result?,
        };

        for event in cursor.unseen(batch) {
            if first_failure.is_none()
                && event.resource_status.is_failure()
                && !event.resource_status_reason.is_empty()
            {
                first_failure = Some((
                    event.logical_resource_id.clone(),
                    event.resource_status_reason.clone(),
                ));
            }
            on_event(&event);
            cursor.advance(&event);
            delivered += 1;
        }

        if last_status.as_ref() != Some(&stack.status) {
            debug!("Stack {} is {} (poll {})", stack_name, stack.status, polls);
        }

        match stack.status.phase() {
            StackPhase::Succeeded => {
                info!("Stack {} reached {} after {} polls", stack_name, stack.status, polls);
                return Ok(PollStackOutput {
                    status: stack.status,
                    events_delivered: delivered,
                    polls,
                });
            }
            StackPhase::Failed => {
                let (resource, reason) = match first_failure {
                    Some((resource, reason)) => (Some(resource), Some(reason)),
                    None => (None, stack.status_reason.clone()),
                };
                return Err(ProvisionError::ProvisioningFailed {
                    stack: stack_name.to_string(),
                    status: stack.status,
                    resource,
                    reason,
                });
            }
            StackPhase::InProgress => {
                last_status = Some(stack.status);
            }
        }

        tokio::select! {
            biased;
            reason = stop.stopped() => return Err(reason.into_error(stack_name, last_status)),
            _ = tokio::time::sleep(options.interval) => {}
        }
    }
}

/// Status first, then events, so the batch always covers the status it is paired with
async fn query_stack(
    client: &dyn ProvisioningClient,
    stack_name: &str,
    since: Option<DateTime<Utc>>,
    options: &PollOptions,
) -> Result<(StackDescription, Vec<StackEvent>), ProvisionError> {
    let query_failed = |e: RetryError| ProvisionError::QueryFailed {
        stack: stack_name.to_string(),
        attempts: e.attempts,
        source: e.last,
    };

    let stack = retry_transient(&options.retry, "describe-stack", || {
        client.describe_stack(stack_name)
    })
    .await
    .map_err(query_failed)?;

    let events = retry_transient(&options.retry, "list-stack-events", || {
        client.list_stack_events(stack_name, since)
    })
    .await
    .map_err(query_failed)?;

    Ok((stack, events))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::testing::{epoch, event, Call, FakeProvisioningClient, FakeStep};
    use proptest::prelude::*;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn fast_options() -> PollOptions {
        PollOptions {
            interval: Duration::from_secs(5),
            timeout: None,
            retry: RetryPolicy::new(3),
        }
    }

    fn no_stop() -> StopConditions {
        StopConditions::new(CancellationToken::new(), None)
    }

    fn create_script() -> Vec<FakeStep> {
        vec![
            FakeStep::new(StackStatus::CreateInProgress)
                .with_event(event("s", 1, "s", StackStatus::CreateInProgress, "User Initiated")),
            FakeStep::new(StackStatus::CreateInProgress)
                .with_event(event("s", 2, "Vpc", StackStatus::CreateInProgress, ""))
                .with_event(event("s", 3, "Vpc", StackStatus::CreateComplete, "")),
            FakeStep::new(StackStatus::CreateInProgress),
            FakeStep::new(StackStatus::CreateComplete)
                .with_event(event("s", 4, "s", StackStatus::CreateComplete, "")),
        ]
    }

    fn ids(events: &[StackEvent]) -> Vec<String> {
        events.iter().map(|e| e.event_id.clone()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_terminal_state_ends_polling() {
        let client = FakeProvisioningClient::new();
        client.insert_scripted("s", create_script());
        let mut seen = Vec::new();

        let output = poll_until_terminal(&client, "s", &fast_options(), &no_stop(), |e| {
            seen.push(e.clone())
        })
        .await
        .unwrap();

        assert_eq!(output.status, StackStatus::CreateComplete);
        assert_eq!(output.polls, 4);
        assert_eq!(output.events_delivered, 4);
        assert_eq!(client.describe_count("s"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_delivered_once_in_chronological_order() {
        // Every poll returns the whole history, newest first, so batches overlap.
        let client = FakeProvisioningClient::new();
        client.insert_scripted("s", create_script());
        let mut seen = Vec::new();

        poll_until_terminal(&client, "s", &fast_options(), &no_stop(), |e| {
            seen.push(e.clone())
        })
        .await
        .unwrap();

        assert_eq!(ids(&seen), vec!["s-1", "s-2", "s-3", "s-4"]);
        assert!(seen.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_queries_resume_from_last_delivered_timestamp() {
        let client = FakeProvisioningClient::new();
        client.insert_scripted("s", create_script());

        poll_until_terminal(&client, "s", &fast_options(), &no_stop(), |_| {})
            .await
            .unwrap();

        let cursors = client
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::ListEvents(_, since) => Some(since),
                _ => None,
            })
            .collect::<Vec<_>>();
        let at = |seq: i64| Some(epoch() + chrono::Duration::seconds(seq));
        assert_eq!(cursors, vec![None, at(1), at(3), at(3)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_sharing_a_timestamp_keep_arrival_order() {
        let client = FakeProvisioningClient::new();
        let mut a = event("s", 1, "Subnet1", StackStatus::CreateInProgress, "");
        let mut b = event("s", 1, "Subnet2", StackStatus::CreateInProgress, "");
        a.event_id = "a".to_string();
        b.event_id = "b".to_string();
        let mut c = event("s", 1, "Subnet3", StackStatus::CreateInProgress, "");
        c.event_id = "c".to_string();
        client.insert_scripted(
            "s",
            vec![
                FakeStep::new(StackStatus::CreateInProgress).with_event(a).with_event(b),
                FakeStep::new(StackStatus::CreateComplete).with_event(c),
            ],
        );
        let mut seen = Vec::new();

        poll_until_terminal(&client, "s", &fast_options(), &no_stop(), |e| {
            seen.push(e.clone())
        })
        .await
        .unwrap();

        assert_eq!(ids(&seen), vec!["a", "b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rollback_complete_is_a_failure_with_root_cause() {
        let client = FakeProvisioningClient::new();
        client.insert_scripted(
            "s",
            vec![
                FakeStep::new(StackStatus::CreateInProgress)
                    .with_event(event("s", 1, "s", StackStatus::CreateInProgress, "User Initiated")),
                FakeStep::new(StackStatus::RollbackInProgress)
                    .with_event(event("s", 2, "Asg", StackStatus::CreateFailed, "Instance limit exceeded"))
                    .with_event(event("s", 3, "Role", StackStatus::CreateFailed, "Resource creation cancelled"))
                    .with_event(event("s", 4, "s", StackStatus::RollbackInProgress, "The following resource(s) failed to create: [Asg]")),
                FakeStep::new(StackStatus::RollbackComplete)
                    .with_event(event("s", 5, "s", StackStatus::RollbackComplete, "")),
            ],
        );
        let mut seen = Vec::new();

        let err = poll_until_terminal(&client, "s", &fast_options(), &no_stop(), |e| {
            seen.push(e.clone())
        })
        .await
        .unwrap_err();

        match err {
            ProvisionError::ProvisioningFailed { status, resource, reason, .. } => {
                assert_eq!(status, StackStatus::RollbackComplete);
                assert_eq!(resource.as_deref(), Some("Asg"));
                assert_eq!(reason.as_deref(), Some("Instance limit exceeded"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(seen.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_failed_without_events_uses_stack_reason() {
        let client = FakeProvisioningClient::new();
        client.insert_scripted(
            "s",
            vec![FakeStep::new(StackStatus::CreateFailed).with_reason("Template error")],
        );

        let err = poll_until_terminal(&client, "s", &fast_options(), &no_stop(), |_| {})
            .await
            .unwrap_err();

        match err {
            ProvisionError::ProvisioningFailed { status, resource, reason, .. } => {
                assert_eq!(status, StackStatus::CreateFailed);
                assert_eq!(resource, None);
                assert_eq!(reason.as_deref(), Some("Template error"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_query_failures_do_not_reset_cursor() {
        let client = FakeProvisioningClient::new();
        client.insert_scripted("s", create_script());
        client.fail_queries_after(3, 2);
        let mut seen = Vec::new();

        poll_until_terminal(&client, "s", &fast_options(), &no_stop(), |e| {
            seen.push(e.clone())
        })
        .await
        .unwrap();

        assert_eq!(ids(&seen), vec!["s-1", "s-2", "s-3", "s-4"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_surface_query_failure() {
        let client = FakeProvisioningClient::new();
        client.insert_scripted("s", create_script());
        client.fail_next_queries(10);

        let err = poll_until_terminal(&client, "s", &fast_options(), &no_stop(), |_| {})
            .await
            .unwrap_err();

        match err {
            ProvisionError::QueryFailed { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_returns_timed_out_with_last_status() {
        let client = FakeProvisioningClient::new();
        client.insert_scripted(
            "s",
            vec![FakeStep::new(StackStatus::CreateInProgress); 100],
        );
        let stop = StopConditions::new(CancellationToken::new(), Some(Duration::from_secs(30)));

        let err = poll_until_terminal(&client, "s", &fast_options(), &stop, |_| {})
            .await
            .unwrap_err();

        match &err {
            ProvisionError::TimedOut { last_status, .. } => {
                assert_eq!(last_status, &Some(StackStatus::CreateInProgress));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.is_remote_state_unknown());
        assert!(client.describe_count("s") < 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_polling() {
        let client = FakeProvisioningClient::new();
        client.insert_scripted(
            "s",
            vec![FakeStep::new(StackStatus::CreateInProgress); 100],
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            trigger.cancel();
        });

        let stop = StopConditions::new(cancel, None);
        let err = poll_until_terminal(&client, "s", &fast_options(), &stop, |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::Cancelled { .. }));
        assert_eq!(client.describe_count("s"), 3);
    }

    #[test]
    fn test_cursor_filters_overlapping_batches() {
        let mut cursor = EventCursor::default();
        let first = vec![
            event("s", 2, "B", StackStatus::CreateInProgress, ""),
            event("s", 1, "A", StackStatus::CreateInProgress, ""),
        ];
        let delivered = cursor.unseen(first.clone());
        assert_eq!(ids(&delivered), vec!["s-1", "s-2"]);
        for e in &delivered {
            cursor.advance(e);
        }
        assert_eq!(cursor.last_timestamp(), Some(delivered[1].timestamp));

        let mut second = vec![event("s", 3, "C", StackStatus::CreateComplete, "")];
        second.extend(first);
        assert_eq!(ids(&cursor.unseen(second)), vec!["s-3"]);
    }

    /// Arrival-ordered history where consecutive events are 0-2 seconds apart, so ties
    /// are common
    fn history(gaps: &[i64]) -> Vec<StackEvent> {
        let mut offset = 0;
        gaps.iter()
            .enumerate()
            .map(|(i, gap)| {
                offset += gap;
                let mut e = event("s", offset, &format!("R{i}"), StackStatus::CreateInProgress, "");
                e.event_id = format!("e{i}");
                e
            })
            .collect()
    }

    const STATUSES: &[StackStatus] = &[
        StackStatus::CreateInProgress,
        StackStatus::CreateInProgress,
        StackStatus::RollbackInProgress,
        StackStatus::UpdateInProgress,
        StackStatus::UpdateCompleteCleanupInProgress,
        StackStatus::ReviewInProgress,
        StackStatus::CreateComplete,
        StackStatus::UpdateComplete,
        StackStatus::ImportComplete,
        StackStatus::CreateFailed,
        StackStatus::RollbackComplete,
        StackStatus::RollbackFailed,
        StackStatus::UpdateRollbackComplete,
        StackStatus::DeleteComplete,
    ];

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn test_cursor_delivers_each_event_once_across_overlapping_batches(
            gaps in prop::collection::vec(0i64..3, 1..30),
            cuts in prop::collection::vec(any::<prop::sample::Index>(), 1..8),
        ) {
            let history = history(&gaps);
            let mut lengths = cuts.iter().map(|cut| cut.index(history.len() + 1)).collect::<Vec<_>>();
            lengths.sort_unstable();

            let mut cursor = EventCursor::default();
            let mut delivered = Vec::new();
            for len in &lengths {
                let batch = history[..*len].iter().rev().cloned().collect::<Vec<_>>();
                for e in cursor.unseen(batch) {
                    cursor.advance(&e);
                    delivered.push(e);
                }
            }

            let longest = lengths.last().copied().unwrap_or(0);
            prop_assert_eq!(ids(&delivered), ids(&history[..longest]));
            prop_assert!(delivered.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        }

        #[test]
        fn test_polling_stops_at_first_terminal_status(
            picks in prop::collection::vec(prop::sample::select(STATUSES.to_vec()), 1..12),
        ) {
            let mut statuses = picks;
            if statuses.iter().all(|s| !s.is_terminal()) {
                statuses.push(StackStatus::CreateComplete);
            }
            let first_terminal = statuses.iter().position(|s| s.is_terminal()).unwrap();
            let expected_phase = statuses[first_terminal].phase();

            let client = FakeProvisioningClient::new();
            client.insert_scripted(
                "s",
                statuses.iter().cloned().map(FakeStep::new).collect(),
            );
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .start_paused(true)
                .build()
                .unwrap();
            let result = runtime.block_on(poll_until_terminal(
                &client,
                "s",
                &fast_options(),
                &no_stop(),
                |_| {},
            ));

            prop_assert_eq!(client.describe_count("s"), first_terminal + 1);
            match result {
                Ok(output) => {
                    prop_assert_eq!(expected_phase, StackPhase::Succeeded);
                    prop_assert_eq!(output.polls as usize, first_terminal + 1);
                    prop_assert_eq!(output.status, statuses[first_terminal].clone());
                }
                Err(ProvisionError::ProvisioningFailed { status, .. }) => {
                    prop_assert_eq!(expected_phase, StackPhase::Failed);
                    prop_assert_eq!(status, statuses[first_terminal].clone());
                }
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
        }
    }
}
