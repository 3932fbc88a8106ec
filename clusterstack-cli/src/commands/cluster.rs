use std::sync::Arc;

use anyhow::{Context, Result};
use clusterstack_models::StackDescription;
use clusterstack_orchestrations::cfn_client::{get_cfn_client, ClientError, ProvisioningClient};
use clusterstack_orchestrations::names::{cluster_stack_name, network_stack_name};
use clusterstack_orchestrations::retry::{retry_transient, RetryPolicy};
use clusterstack_orchestrations::{
    create_cluster_orchestration, format_event, CreateClusterOutput, OrchestrationContext,
};
use tokio_util::sync::CancellationToken;

use crate::cli::{CreateClusterArgs, OutputFormat};
use crate::config::Config;

pub async fn run_create(config: &Config, args: CreateClusterArgs) -> Result<()> {
    let timeout = args.timeout;
    let input = args.into_input(&config.stack_prefix);
    let cluster = input.cluster.clone();

    let client = get_cfn_client(&config.aws_options()).await;
    let cancel = CancellationToken::new();
    watch_for_interrupt(cancel.clone());

    let ctx = OrchestrationContext::new(Arc::new(client), config.template_provider())
        .with_poll_options(config.poll_options(timeout))
        .with_cancellation(cancel);

    println!("Creating cluster '{}'...", cluster);
    println!();

    let result = create_cluster_orchestration(&ctx, input, |event| {
        println!("{}", format_event(event));
    })
    .await;

    match result {
        Ok(output) => {
            print_summary(&output);
            Ok(())
        }
        Err(e) if e.is_remote_state_unknown() => {
            let stack = e.stack().unwrap_or(cluster.as_str()).to_string();
            println!();
            println!("Stopped waiting for stack {}; it may still be provisioning.", stack);
            println!("Follow it with: clusterstack events {}", stack);
            Err(e).context(format!("Cluster '{}' was not confirmed ready", cluster))
        }
        Err(e) => Err(e).context(format!("Failed to create cluster '{}'", cluster)),
    }
}

fn watch_for_interrupt(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; no longer waiting on stacks");
            cancel.cancel();
        }
    });
}

fn print_summary(output: &CreateClusterOutput) {
    println!();
    match output.network_seconds {
        Some(seconds) => println!(
            "✓ Network stack {} created in {}",
            output.network.stack_name,
            format_duration(seconds)
        ),
        None => println!("✓ Reused network stack {}", output.network.stack_name),
    }
    println!(
        "✓ Cluster stack {} created in {}",
        output.cluster_stack,
        format_duration(output.cluster_seconds)
    );
    println!();
    println!("Cluster '{}' is ready", output.cluster);
    println!("  VPC:       {}", output.network.vpc_id);
    println!(
        "  Subnets:   {}, {}",
        output.network.private_subnet_1, output.network.private_subnet_2
    );
    println!("  Events:    {}", output.events_observed);
    println!("  Elapsed:   {}", format_duration(output.elapsed_seconds));
}

pub async fn run_status(config: &Config, cluster: String, output: OutputFormat) -> Result<()> {
    let client = get_cfn_client(&config.aws_options()).await;
    let retry = config.poll_options(None).retry;

    let network_name = network_stack_name(&cluster);
    let cluster_name = cluster_stack_name(&config.stack_prefix, &cluster);
    let network = describe_if_exists(&client, &network_name, &retry).await?;
    let cluster_stack = describe_if_exists(&client, &cluster_name, &retry).await?;

    if output == OutputFormat::Json {
        let status = serde_json::json!({
            "cluster": cluster,
            "network_stack": network,
            "cluster_stack": cluster_stack,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Cluster: {}", cluster);
    println!("{}", "=".repeat(60));
    for (label, name, stack) in [
        ("Network stack", &network_name, &network),
        ("Cluster stack", &cluster_name, &cluster_stack),
    ] {
        println!();
        println!("{}: {}", label, name);
        match stack {
            Some(stack) => {
                println!("  Status:   {}", stack.status);
                if let Some(reason) = &stack.status_reason {
                    println!("  Reason:   {}", reason);
                }
                for (key, value) in &stack.outputs {
                    println!("  {:<9} {}", format!("{}:", key), value);
                }
            }
            None => println!("  Status:   not found"),
        }
    }

    Ok(())
}

async fn describe_if_exists(
    client: &dyn ProvisioningClient,
    name: &str,
    retry: &RetryPolicy,
) -> Result<Option<StackDescription>> {
    match retry_transient(retry, "describe-stack", || client.describe_stack(name)).await {
        Ok(stack) => Ok(Some(stack)),
        Err(e) if matches!(e.last, ClientError::StackNotFound(_)) => Ok(None),
        Err(e) => Err(e.last).context(format!("Failed to describe stack {}", name)),
    }
}

/// Compact human duration: 45s, 3m12s, 1h02m05s
pub fn format_duration(seconds: u64) -> String {
    let (hours, minutes, secs) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if hours > 0 {
        format!("{}h{:02}m{:02}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m{:02}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}
