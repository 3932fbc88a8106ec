//! Input and output types for stack activities

use std::time::Duration;

use clusterstack_models::{NetworkOutputs, StackStatus};
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

// ============================================================================
// Find Network Stack Activity
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FindNetworkStackOutput {
    /// Derived name of the network stack, whether or not it exists
    pub stack_name: String,
    /// Resolved outputs (None if the stack does not exist)
    pub outputs: Option<NetworkOutputs>,
}

impl FindNetworkStackOutput {
    pub fn found(&self) -> bool {
        self.outputs.is_some()
    }
}

// ============================================================================
// Poll Stack Activity
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PollOptions {
    /// Pause between polls
    pub interval: Duration,
    /// Give up waiting after this long (None = wait until cancelled)
    pub timeout: Option<Duration>,
    /// Applied to each individual describe/list call
    pub retry: RetryPolicy,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Some(Duration::from_secs(60 * 60)),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollStackOutput {
    /// Terminal status the stack reached
    pub status: StackStatus,
    /// Events delivered to the observer during this poll
    pub events_delivered: usize,
    /// Number of status queries made
    pub polls: u32,
}
