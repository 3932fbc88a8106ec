//! Create cluster orchestration

use std::collections::BTreeMap;

use clusterstack_models::{CreateStackContext, NetworkOutputs, StackEvent};
use tokio::time::Instant;
use tracing::info;

use crate::activities::{create_stack, find_network_stack, poll_until_terminal};
use crate::activity_types::PollStackOutput;
use crate::cfn_client::ClientError;
use crate::error::ProvisionError;
use crate::names::{
    capabilities, cluster_stack_name, network_stack_name, parameters, DEFAULT_CLUSTER_STACK_PREFIX,
};
use crate::orchestrations::OrchestrationContext;
use crate::stop::StopConditions;
use crate::templates::TemplateKind;
use crate::types::{CreateClusterInput, CreateClusterOutput};

const DEFAULT_KEY_NAME: &str = "default";
const DEFAULT_INSTANCE_TYPE: &str = "t2.micro";
const DEFAULT_INSTANCE_COUNT: u32 = 3;

/// Resolve or create the cluster's network stack, then create the cluster stack inside it.
///
/// `on_event` sees every event of both stacks, once each and in order. Any step's error
/// ends the run; stacks already created are left in place.
///
/// `ctx.poll.timeout` bounds the whole run, lookups and submissions included. Cancelling
/// `ctx.cancel` abandons whichever step is in flight.
pub async fn create_cluster_orchestration<F>(
    ctx: &OrchestrationContext,
    input: CreateClusterInput,
    mut on_event: F,
) -> Result<CreateClusterOutput, ProvisionError>
where
    F: FnMut(&StackEvent),
{
    let started = Instant::now();
    let stop = StopConditions::new(ctx.cancel.clone(), ctx.poll.timeout);
    let network_stack = network_stack_name(&input.cluster);
    let prefix = input
        .stack_prefix
        .clone()
        .unwrap_or_else(|| DEFAULT_CLUSTER_STACK_PREFIX.to_string());
    let cluster_stack = cluster_stack_name(&prefix, &input.cluster);

    info!(
        "Creating cluster {} (stack {}, rollback {})",
        input.cluster,
        cluster_stack,
        if input.disable_rollback { "disabled" } else { "enabled" }
    );

    let mut events_observed = 0usize;
    let mut observe = |event: &StackEvent| {
        events_observed += 1;
        on_event(event);
    };

    // Step 1: Resolve the network stack
    info!("Step 1: Resolving network stack");
    let resolved = stop
        .run(
            &network_stack,
            find_network_stack(ctx.client.as_ref(), &input.cluster, &ctx.poll.retry),
        )
        .await?;

    let (network, network_seconds) = match resolved.outputs {
        Some(network) => {
            info!("Reusing network stack {}", network.stack_name);
            (network, None)
        }
        None => {
            // Step 2: Create the network stack and read its outputs back
            info!("Step 2: Creating network stack {}", resolved.stack_name);
            let network_started = Instant::now();
            let context = CreateStackContext::new(BTreeMap::new(), input.disable_rollback);
            provision_stack(
                ctx,
                &stop,
                &resolved.stack_name,
                TemplateKind::Network,
                &context,
                &mut observe,
            )
            .await?;

            let network = stop
                .run(
                    &network_stack,
                    find_network_stack(ctx.client.as_ref(), &input.cluster, &ctx.poll.retry),
                )
                .await?
                .outputs
                .ok_or_else(|| ProvisionError::QueryFailed {
                    stack: resolved.stack_name.clone(),
                    attempts: 1,
                    source: ClientError::StackNotFound(resolved.stack_name.clone()),
                })?;

            let seconds = network_started.elapsed().as_secs();
            info!("Network stack {} created in {} seconds", network.stack_name, seconds);
            (network, Some(seconds))
        }
    };

    // Step 3: Build cluster parameters
    info!("Step 3: Building cluster parameters (vpc {})", network.vpc_id);
    let context = CreateStackContext::new(cluster_parameters(&input, &network), input.disable_rollback)
        .with_capability(capabilities::IAM);

    // Step 4: Create the cluster stack
    info!("Step 4: Creating cluster stack {}", cluster_stack);
    let cluster_started = Instant::now();
    provision_stack(ctx, &stop, &cluster_stack, TemplateKind::Cluster, &context, &mut observe)
        .await?;
    let cluster_seconds = cluster_started.elapsed().as_secs();

    let elapsed_seconds = started.elapsed().as_secs();
    info!(
        "Cluster {} ready in {} seconds ({} events)",
        input.cluster, elapsed_seconds, events_observed
    );

    Ok(CreateClusterOutput {
        cluster: input.cluster,
        cluster_stack,
        network,
        network_created: network_seconds.is_some(),
        network_seconds,
        cluster_seconds,
        events_observed,
        elapsed_seconds,
    })
}

/// Submit `name` from the `kind` template and wait for it to converge
async fn provision_stack<F>(
    ctx: &OrchestrationContext,
    stop: &StopConditions,
    name: &str,
    kind: TemplateKind,
    context: &CreateStackContext,
    on_event: F,
) -> Result<PollStackOutput, ProvisionError>
where
    F: FnMut(&StackEvent),
{
    let template = ctx.templates.template(kind)?;
    stop.run(
        name,
        create_stack(ctx.client.as_ref(), name, &template, context, &ctx.poll.retry),
    )
    .await?;
    poll_until_terminal(ctx.client.as_ref(), name, &ctx.poll, stop, on_event).await
}

/// Parameter map for the cluster stack: network outputs, cluster flags and defaults.
/// Optional values the caller left out are passed as empty strings.
pub fn cluster_parameters(
    input: &CreateClusterInput,
    network: &NetworkOutputs,
) -> BTreeMap<String, String> {
    let optional = |value: &Option<String>| value.clone().unwrap_or_default();

    BTreeMap::from([
        (parameters::VPC_ID.to_string(), network.vpc_id.clone()),
        (parameters::VPC_PRIVATE_SUBNET_1.to_string(), network.private_subnet_1.clone()),
        (parameters::VPC_PRIVATE_SUBNET_2.to_string(), network.private_subnet_2.clone()),
        (parameters::ECS_CLUSTER.to_string(), input.cluster.clone()),
        (
            parameters::KEY_NAME.to_string(),
            input.key_name.clone().unwrap_or_else(|| DEFAULT_KEY_NAME.to_string()),
        ),
        (
            parameters::INSTANCE_TYPE.to_string(),
            input
                .instance_type
                .clone()
                .unwrap_or_else(|| DEFAULT_INSTANCE_TYPE.to_string()),
        ),
        (
            parameters::DESIRED_CAPACITY.to_string(),
            input.instance_count.unwrap_or(DEFAULT_INSTANCE_COUNT).to_string(),
        ),
        (parameters::DOCKER_HUB_USERNAME.to_string(), optional(&input.docker_username)),
        (parameters::DOCKER_HUB_PASSWORD.to_string(), optional(&input.docker_password)),
        (parameters::DOCKER_HUB_EMAIL.to_string(), optional(&input.docker_email)),
        (parameters::LOGSPOUT_TARGET.to_string(), optional(&input.logspout_target)),
        (parameters::DATADOG_API_KEY.to_string(), optional(&input.datadog_key)),
        (parameters::AUTHORIZED_USERS_URL.to_string(), optional(&input.authorized_keys_url)),
    ])
}
