//! Input and output types for clusterstack orchestrations

use clusterstack_models::NetworkOutputs;
use serde::{Deserialize, Serialize};

// ============================================================================
// Create Cluster Orchestration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateClusterInput {
    /// Logical cluster name; stack names are derived from it
    pub cluster: String,
    /// Prefix of the cluster stack name (default: "ecs")
    pub stack_prefix: Option<String>,
    /// EC2 key pair for the instances (default: "default")
    pub key_name: Option<String>,
    /// EC2 instance type (default: "t2.micro")
    pub instance_type: Option<String>,
    /// Number of instances (default: 3)
    pub instance_count: Option<u32>,
    /// Docker registry credentials
    pub docker_username: Option<String>,
    pub docker_password: Option<String>,
    pub docker_email: Option<String>,
    /// Datadog API key (optional monitoring agent)
    pub datadog_key: Option<String>,
    /// Endpoint logspout pushes container logs to (optional)
    pub logspout_target: Option<String>,
    /// URL of an SSH authorized_keys file fetched on boot
    pub authorized_keys_url: Option<String>,
    /// Leave failed resources in place instead of rolling back
    pub disable_rollback: bool,
}

impl CreateClusterInput {
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            stack_prefix: None,
            key_name: None,
            instance_type: None,
            instance_count: None,
            docker_username: None,
            docker_password: None,
            docker_email: None,
            datadog_key: None,
            logspout_target: None,
            authorized_keys_url: None,
            disable_rollback: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateClusterOutput {
    /// Cluster name
    pub cluster: String,
    /// Name of the cluster stack that was created
    pub cluster_stack: String,
    /// Network the cluster was placed in
    pub network: NetworkOutputs,
    /// Whether the network stack was created by this run (false if reused)
    pub network_created: bool,
    /// Time spent creating the network stack (None if reused)
    pub network_seconds: Option<u64>,
    /// Time spent creating the cluster stack
    pub cluster_seconds: u64,
    /// Number of stack events observed across both stacks
    pub events_observed: usize,
    /// Wall-clock time for the whole run (seconds)
    pub elapsed_seconds: u64,
}
