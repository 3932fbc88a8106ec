use anyhow::{Context, Result};
use clusterstack_models::StackEvent;
use clusterstack_orchestrations::cfn_client::{get_cfn_client, ProvisioningClient};
use clusterstack_orchestrations::format_event;
use clusterstack_orchestrations::retry::retry_transient;

use crate::config::Config;

pub async fn run_events(config: &Config, stack: String, limit: Option<usize>) -> Result<()> {
    let client = get_cfn_client(&config.aws_options()).await;
    let retry = config.poll_options(None).retry;

    let events = retry_transient(&retry, "list-stack-events", || {
        client.list_stack_events(&stack, None)
    })
    .await
    .map_err(|e| e.last)
    .with_context(|| format!("Failed to list events for stack {}", stack))?;

    let events = oldest_first(events, limit);
    if events.is_empty() {
        println!("No events for stack {}", stack);
        return Ok(());
    }

    for event in &events {
        println!("{}", format_event(event));
    }

    Ok(())
}

/// Reorder a newest-first batch for display, keeping only the `limit` most recent
fn oldest_first(mut events: Vec<StackEvent>, limit: Option<usize>) -> Vec<StackEvent> {
    if let Some(limit) = limit {
        events.truncate(limit);
    }
    events.reverse();
    events
}
