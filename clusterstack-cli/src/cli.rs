use clap::{Parser, Subcommand, ValueEnum};
use clusterstack_orchestrations::types::CreateClusterInput;

/// Clusterstack - ECS clusters on CloudFormation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Echo info-level logs to stderr (they always go to ~/.clusterstack/clusterstack.log)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a cluster, creating its network stack first if needed
    CreateCluster(CreateClusterArgs),

    /// Show the network and cluster stacks behind a cluster
    Status {
        /// Cluster name
        #[arg(short, long)]
        cluster: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },

    /// Print a stack's events, oldest first
    Events {
        /// Stack name (e.g. "network-stack-demo")
        stack: String,

        /// Only show the most recent events
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// List templates and the parameters they declare
    Templates {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct CreateClusterArgs {
    /// Cluster name; stacks are named network-stack-<name> and <prefix>-<name>-cluster
    #[arg(short, long)]
    pub cluster: String,

    /// EC2 key pair for the container instances (default: "default")
    #[arg(long)]
    pub keyname: Option<String>,

    /// EC2 instance type (default: "t2.micro")
    #[arg(long = "type")]
    pub instance_type: Option<String>,

    /// Number of container instances (default: 3)
    #[arg(long)]
    pub count: Option<u32>,

    /// Docker Hub username for private images
    #[arg(long)]
    pub docker_username: Option<String>,

    /// Docker Hub password
    #[arg(long)]
    pub docker_password: Option<String>,

    /// Docker Hub email
    #[arg(long)]
    pub docker_email: Option<String>,

    /// Datadog API key; enables the Datadog agent
    #[arg(long)]
    pub datadog_key: Option<String>,

    /// Logspout target (e.g. "syslog://logs.example.com:514")
    #[arg(long)]
    pub logspout_target: Option<String>,

    /// URL of an authorized_keys file installed on each instance
    #[arg(long)]
    pub authorized_keys: Option<String>,

    /// Keep failed resources instead of rolling back
    #[arg(long)]
    pub disable_rollback: bool,

    /// Give up on the whole run after this many minutes (0 waits until done; default from config)
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl CreateClusterArgs {
    pub fn into_input(self, stack_prefix: &str) -> CreateClusterInput {
        CreateClusterInput {
            cluster: self.cluster,
            stack_prefix: Some(stack_prefix.to_string()),
            key_name: self.keyname,
            instance_type: self.instance_type,
            instance_count: self.count,
            docker_username: self.docker_username,
            docker_password: self.docker_password,
            docker_email: self.docker_email,
            datadog_key: self.datadog_key,
            logspout_target: self.logspout_target,
            authorized_keys_url: self.authorized_keys,
            disable_rollback: self.disable_rollback,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}
