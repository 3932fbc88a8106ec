//! Multi-stack workflows

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::activity_types::PollOptions;
use crate::cfn_client::ProvisioningClient;
use crate::templates::TemplateProvider;

pub mod create_cluster;

pub use create_cluster::create_cluster_orchestration;

/// Collaborators shared by every step of a workflow run
#[derive(Clone)]
pub struct OrchestrationContext {
    pub client: Arc<dyn ProvisioningClient>,
    pub templates: Arc<dyn TemplateProvider>,
    pub poll: PollOptions,
    /// Fires on Ctrl-C; abandons the step in flight but leaves remote stacks as they are
    pub cancel: CancellationToken,
}

impl OrchestrationContext {
    pub fn new(client: Arc<dyn ProvisioningClient>, templates: Arc<dyn TemplateProvider>) -> Self {
        Self {
            client,
            templates,
            poll: PollOptions::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_poll_options(mut self, poll: PollOptions) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}
