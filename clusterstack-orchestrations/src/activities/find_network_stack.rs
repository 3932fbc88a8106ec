//! Resolve an existing network stack

use clusterstack_models::NetworkOutputs;
use tracing::{debug, info};

use crate::activity_types::FindNetworkStackOutput;
use crate::cfn_client::{ClientError, ProvisioningClient};
use crate::error::ProvisionError;
use crate::names::{network_stack_name, outputs};
use crate::retry::{retry_transient, RetryPolicy};

/// Look up the network stack for `cluster` by its derived name.
///
/// An absent stack is not an error. A stack that exists but is not usable is
/// [`ProvisionError::IncompatibleStack`]; it is never waited on, repaired or deleted.
pub async fn find_network_stack(
    client: &dyn ProvisioningClient,
    cluster: &str,
    retry: &RetryPolicy,
) -> Result<FindNetworkStackOutput, ProvisionError> {
    let stack_name = network_stack_name(cluster);
    debug!("Looking up network stack {}", stack_name);

    let described = retry_transient(retry, "describe-network-stack", || {
        client.describe_stack(&stack_name)
    })
    .await;

    let stack = match described {
        Ok(stack) => stack,
        Err(e) if matches!(e.last, ClientError::StackNotFound(_)) => {
            info!("Network stack {} does not exist", stack_name);
            return Ok(FindNetworkStackOutput { stack_name, outputs: None });
        }
        Err(e) => {
            return Err(ProvisionError::QueryFailed {
                stack: stack_name,
                attempts: e.attempts,
                source: e.last,
            })
        }
    };

    if !stack.status.is_usable() {
        return Err(ProvisionError::IncompatibleStack {
            stack: stack_name,
            status: stack.status,
        });
    }

    let required = |key: &str| -> Result<String, ProvisionError> {
        stack
            .outputs
            .get(key)
            .filter(|value| !value.is_empty())
            .cloned()
            .ok_or_else(|| ProvisionError::MissingOutput {
                stack: stack_name.clone(),
                key: key.to_string(),
            })
    };

    let network = NetworkOutputs {
        stack_name: stack_name.clone(),
        vpc_id: required(outputs::VPC_ID)?,
        private_subnet_1: required(outputs::SUBNET_1)?,
        private_subnet_2: required(outputs::SUBNET_2)?,
    };

    info!(
        "Found network stack {} ({}, vpc {})",
        stack_name, stack.status, network.vpc_id
    );

    Ok(FindNetworkStackOutput {
        stack_name,
        outputs: Some(network),
    })
}
