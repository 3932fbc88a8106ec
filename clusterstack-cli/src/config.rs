use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clusterstack_orchestrations::activity_types::PollOptions;
use clusterstack_orchestrations::cfn_client::AwsClientOptions;
use clusterstack_orchestrations::names::DEFAULT_CLUSTER_STACK_PREFIX;
use clusterstack_orchestrations::retry::RetryPolicy;
use clusterstack_orchestrations::templates::{DirectoryTemplates, EmbeddedTemplates, TemplateProvider};

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub aws_region: Option<String>,
    pub aws_profile: Option<String>,
    pub stack_prefix: String,
    pub poll_interval: Duration,
    /// None waits until the stack settles or the run is cancelled
    pub timeout: Option<Duration>,
    pub max_retries: u32,
    pub template_dir: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let poll_interval_secs: u64 = var("CLUSTERSTACK_POLL_INTERVAL_SECS")
            .unwrap_or_else(|| "5".to_string())
            .parse()
            .context("CLUSTERSTACK_POLL_INTERVAL_SECS must be a whole number of seconds")?;
        let timeout_mins: u64 = var("CLUSTERSTACK_TIMEOUT_MINS")
            .unwrap_or_else(|| "60".to_string())
            .parse()
            .context("CLUSTERSTACK_TIMEOUT_MINS must be a whole number of minutes")?;
        let max_retries: u32 = var("CLUSTERSTACK_MAX_RETRIES")
            .unwrap_or_else(|| "5".to_string())
            .parse()
            .context("CLUSTERSTACK_MAX_RETRIES must be a positive number")?;

        if poll_interval_secs == 0 {
            anyhow::bail!("CLUSTERSTACK_POLL_INTERVAL_SECS must be at least 1");
        }
        if max_retries == 0 {
            anyhow::bail!("CLUSTERSTACK_MAX_RETRIES must be at least 1");
        }

        Ok(Self {
            aws_region: var("AWS_REGION"),
            aws_profile: var("AWS_PROFILE"),
            stack_prefix: var("CLUSTERSTACK_STACK_PREFIX")
                .unwrap_or_else(|| DEFAULT_CLUSTER_STACK_PREFIX.to_string()),
            poll_interval: Duration::from_secs(poll_interval_secs),
            timeout: minutes(timeout_mins),
            max_retries,
            template_dir: var("CLUSTERSTACK_TEMPLATE_DIR").map(PathBuf::from),
        })
    }

    pub fn aws_options(&self) -> AwsClientOptions {
        AwsClientOptions {
            region: self.aws_region.clone(),
            profile: self.aws_profile.clone(),
        }
    }

    /// Poll settings; `timeout_mins` from the command line wins over the environment
    pub fn poll_options(&self, timeout_mins: Option<u64>) -> PollOptions {
        PollOptions {
            interval: self.poll_interval,
            timeout: timeout_mins.map_or(self.timeout, minutes),
            retry: RetryPolicy::new(self.max_retries),
        }
    }

    pub fn template_provider(&self) -> Arc<dyn TemplateProvider> {
        match &self.template_dir {
            Some(dir) => {
                tracing::info!("Loading templates from {}", dir.display());
                Arc::new(DirectoryTemplates::new(dir.clone()))
            }
            None => Arc::new(EmbeddedTemplates),
        }
    }
}

/// Zero disables the deadline
fn minutes(mins: u64) -> Option<Duration> {
    (mins > 0).then(|| Duration::from_secs(mins * 60))
}
