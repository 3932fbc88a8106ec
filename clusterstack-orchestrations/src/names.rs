//! Naming conventions for stacks, template parameters and template outputs
//!
//! Stack names are derived deterministically from the cluster name; the resolver looks a
//! stack up by its derived name rather than searching.

/// Default prefix of the per-cluster compute stack
pub const DEFAULT_CLUSTER_STACK_PREFIX: &str = "ecs";

/// Prefix of the shared network stack
pub const NETWORK_STACK_PREFIX: &str = "network-stack";

/// Name of the per-cluster compute stack: `<prefix>-<cluster>-cluster`
pub fn cluster_stack_name(prefix: &str, cluster: &str) -> String {
    format!("{}-{}-cluster", prefix, cluster)
}

/// Name of the network stack backing a cluster: `network-stack-<cluster>`
pub fn network_stack_name(cluster: &str) -> String {
    format!("{}-{}", NETWORK_STACK_PREFIX, cluster)
}

/// Outputs the network stack must expose
pub mod outputs {
    /// VPC identifier
    pub const VPC_ID: &str = "VpcId";
    /// First private subnet
    pub const SUBNET_1: &str = "Subnet1";
    /// Second private subnet
    pub const SUBNET_2: &str = "Subnet2";
}

/// Parameters accepted by the cluster stack template
pub mod parameters {
    pub const VPC_ID: &str = "VpcId";
    pub const VPC_PRIVATE_SUBNET_1: &str = "VpcPrivateSubnet1Id";
    pub const VPC_PRIVATE_SUBNET_2: &str = "VpcPrivateSubnet2Id";
    pub const KEY_NAME: &str = "KeyName";
    pub const ECS_CLUSTER: &str = "ECSCluster";
    pub const INSTANCE_TYPE: &str = "InstanceType";
    pub const DESIRED_CAPACITY: &str = "DesiredCapacity";
    pub const DOCKER_HUB_USERNAME: &str = "DockerHubUsername";
    pub const DOCKER_HUB_PASSWORD: &str = "DockerHubPassword";
    pub const DOCKER_HUB_EMAIL: &str = "DockerHubEmail";
    pub const LOGSPOUT_TARGET: &str = "LogspoutTarget";
    pub const DATADOG_API_KEY: &str = "DatadogApiKey";
    pub const AUTHORIZED_USERS_URL: &str = "AuthorizedUsersUrl";

    /// Parameters whose values must never be logged
    pub const SECRET: &[&str] = &[DOCKER_HUB_PASSWORD, DATADOG_API_KEY];
}

/// Capabilities
pub mod capabilities {
    /// Required by templates that create IAM roles
    pub const IAM: &str = "CAPABILITY_IAM";
}
