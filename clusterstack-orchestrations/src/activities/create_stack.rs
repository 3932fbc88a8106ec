//! Submit a stack for creation

use clusterstack_models::CreateStackContext;
use tracing::info;

use crate::cfn_client::ProvisioningClient;
use crate::error::ProvisionError;
use crate::names::parameters;
use crate::retry::{retry_transient, RetryPolicy};
use crate::templates::Template;

/// Submit `name` for creation from `template`.
///
/// Success means the backend accepted the request, not that the stack exists; poll it
/// afterwards. Synchronous refusals surface as [`ProvisionError::Rejected`] and are not
/// retried. Transient failures are retried with the same client request token, so a
/// request that did reach the backend is not submitted twice.
pub async fn create_stack(
    client: &dyn ProvisioningClient,
    name: &str,
    template: &Template,
    context: &CreateStackContext,
    retry: &RetryPolicy,
) -> Result<(), ProvisionError> {
    if let Some(unknown) = context
        .parameters
        .keys()
        .find(|key| !template.declares(key.as_str()))
    {
        return Err(ProvisionError::Rejected {
            stack: name.to_string(),
            reason: format!(
                "parameter {} is not declared by the {} template",
                unknown, template.kind
            ),
        });
    }

    info!(
        "Submitting stack {} ({} template, {} parameters: {}, rollback {})",
        name,
        template.kind,
        context.parameters.len(),
        describe_parameters(context),
        if context.disable_rollback { "disabled" } else { "enabled" },
    );

    retry_transient(retry, "create-stack", || {
        client.create_stack(name, &template.body, context)
    })
    .await
    .map_err(|e| {
        if e.last.is_transient() {
            ProvisionError::QueryFailed {
                stack: name.to_string(),
                attempts: e.attempts,
                source: e.last,
            }
        } else {
            ProvisionError::Rejected {
                stack: name.to_string(),
                reason: e.last.to_string(),
            }
        }
    })?;

    info!("Stack {} accepted for creation", name);
    Ok(())
}

/// Parameter list for logs with secret values masked
fn describe_parameters(context: &CreateStackContext) -> String {
    context
        .parameters
        .iter()
        .map(|(key, value)| {
            if parameters::SECRET.contains(&key.as_str()) && !value.is_empty() {
                format!("{}=****", key)
            } else {
                format!("{}={}", key, value)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
