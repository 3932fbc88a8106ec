//! Clusterstack Orchestrations - Stack lifecycle workflows for container clusters
//!
//! This crate resolves, creates and watches the two CloudFormation stacks behind a
//! cluster: a shared network stack and the per-cluster compute stack. All state lives in
//! the provisioning backend; the orchestrator only submits requests and observes.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use clusterstack_orchestrations::cfn_client::{get_cfn_client, AwsClientOptions};
//! use clusterstack_orchestrations::templates::EmbeddedTemplates;
//! use clusterstack_orchestrations::{
//!     create_cluster_orchestration, format_event, CreateClusterInput, OrchestrationContext,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = get_cfn_client(&AwsClientOptions::default()).await;
//! let ctx = OrchestrationContext::new(Arc::new(client), Arc::new(EmbeddedTemplates));
//!
//! let output = create_cluster_orchestration(&ctx, CreateClusterInput::new("demo"), |event| {
//!     println!("{}", format_event(event))
//! })
//! .await?;
//! println!("{} ready in {}s", output.cluster_stack, output.elapsed_seconds);
//! # Ok(())
//! # }
//! ```

// Orchestration exports
pub mod names;
pub mod types;
pub mod orchestrations;

// Activity exports
pub mod activities;
pub mod activity_types;
pub mod cfn_client;
pub mod error;
pub mod retry;
pub mod stop;
pub mod templates;

#[cfg(test)]
mod testing;

// Re-export key types for convenience
pub use types::*;
pub use activity_types::*;
pub use activities::{format_event, parse_event_line};
pub use error::ProvisionError;
pub use orchestrations::{create_cluster_orchestration, OrchestrationContext};
