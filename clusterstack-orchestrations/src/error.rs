//! Error taxonomy for stack lifecycle operations

use clusterstack_models::StackStatus;
use thiserror::Error;

use crate::cfn_client::ClientError;

#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The backend refused the create call synchronously. Never retried.
    #[error("stack {stack} was rejected at submission: {reason}")]
    Rejected { stack: String, reason: String },

    /// A stack with the expected name exists but is not in a usable state
    #[error("stack {stack} exists in status {status} and cannot be reused")]
    IncompatibleStack { stack: String, status: StackStatus },

    /// A usable stack lacks an output the cluster depends on
    #[error("stack {stack} is missing required output {key}")]
    MissingOutput { stack: String, key: String },

    #[error("querying stack {stack} failed after {attempts} attempt(s): {source}")]
    QueryFailed {
        stack: String,
        attempts: u32,
        #[source]
        source: ClientError,
    },

    /// The stack reached a failure terminal state
    #[error("stack {stack} failed with status {status}{}", failure_detail(.resource, .reason))]
    ProvisioningFailed {
        stack: String,
        status: StackStatus,
        resource: Option<String>,
        reason: Option<String>,
    },

    #[error("timed out waiting for stack {stack} (last status: {}); provisioning may still be running", last_status_label(.last_status))]
    TimedOut {
        stack: String,
        last_status: Option<StackStatus>,
    },

    #[error("cancelled while waiting for stack {stack}; provisioning may still be running")]
    Cancelled { stack: String },

    #[error("template {name} is unavailable: {reason}")]
    Template { name: String, reason: String },
}

impl ProvisionError {
    /// True when the orchestrator stopped watching before the stack reached a terminal state
    pub fn is_remote_state_unknown(&self) -> bool {
        matches!(self, ProvisionError::TimedOut { .. } | ProvisionError::Cancelled { .. })
    }

    pub fn stack(&self) -> Option<&str> {
        match self {
            ProvisionError::Rejected { stack, .. }
            | ProvisionError::IncompatibleStack { stack, .. }
            | ProvisionError::MissingOutput { stack, .. }
            | ProvisionError::QueryFailed { stack, .. }
            | ProvisionError::ProvisioningFailed { stack, .. }
            | ProvisionError::TimedOut { stack, .. }
            | ProvisionError::Cancelled { stack } => Some(stack),
            ProvisionError::Template { .. } => None,
        }
    }
}

fn failure_detail(resource: &Option<String>, reason: &Option<String>) -> String {
    match (resource, reason) {
        (Some(resource), Some(reason)) => format!(" ({}: {})", resource, reason),
        (None, Some(reason)) => format!(" ({})", reason),
        (Some(resource), None) => format!(" ({})", resource),
        (None, None) => String::new(),
    }
}

fn last_status_label(status: &Option<StackStatus>) -> String {
    status
        .as_ref()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "none observed".to_string())
}
