use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a stack (or of one resource inside it) as reported by the provisioning backend.
///
/// Statuses are owned by the backend; the orchestrator only observes them. Values the
/// backend adds later land in [`StackStatus::Unknown`] and are carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StackStatus {
    CreateInProgress,
    CreateComplete,
    CreateFailed,
    RollbackInProgress,
    RollbackComplete,
    RollbackFailed,
    DeleteInProgress,
    DeleteComplete,
    DeleteFailed,
    DeleteSkipped,
    UpdateInProgress,
    UpdateCompleteCleanupInProgress,
    UpdateComplete,
    UpdateFailed,
    UpdateRollbackInProgress,
    UpdateRollbackCompleteCleanupInProgress,
    UpdateRollbackComplete,
    UpdateRollbackFailed,
    ReviewInProgress,
    ImportInProgress,
    ImportComplete,
    ImportRollbackInProgress,
    ImportRollbackComplete,
    ImportRollbackFailed,
    Unknown(String),
}

/// Where a status sits in the backend's state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackPhase {
    /// Non-terminal; the backend will transition again on its own
    InProgress,
    /// Terminal, resources are in place
    Succeeded,
    /// Terminal, the requested operation did not take effect
    Failed,
}

impl StackStatus {
    pub fn as_str(&self) -> &str {
        match self {
            StackStatus::CreateInProgress => "CREATE_IN_PROGRESS",
            StackStatus::CreateComplete => "CREATE_COMPLETE",
            StackStatus::CreateFailed => "CREATE_FAILED",
            StackStatus::RollbackInProgress => "ROLLBACK_IN_PROGRESS",
            StackStatus::RollbackComplete => "ROLLBACK_COMPLETE",
            StackStatus::RollbackFailed => "ROLLBACK_FAILED",
            StackStatus::DeleteInProgress => "DELETE_IN_PROGRESS",
            StackStatus::DeleteComplete => "DELETE_COMPLETE",
            StackStatus::DeleteFailed => "DELETE_FAILED",
            StackStatus::DeleteSkipped => "DELETE_SKIPPED",
            StackStatus::UpdateInProgress => "UPDATE_IN_PROGRESS",
            StackStatus::UpdateCompleteCleanupInProgress => "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS",
            StackStatus::UpdateComplete => "UPDATE_COMPLETE",
            StackStatus::UpdateFailed => "UPDATE_FAILED",
            StackStatus::UpdateRollbackInProgress => "UPDATE_ROLLBACK_IN_PROGRESS",
            StackStatus::UpdateRollbackCompleteCleanupInProgress => {
                "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS"
            }
            StackStatus::UpdateRollbackComplete => "UPDATE_ROLLBACK_COMPLETE",
            StackStatus::UpdateRollbackFailed => "UPDATE_ROLLBACK_FAILED",
            StackStatus::ReviewInProgress => "REVIEW_IN_PROGRESS",
            StackStatus::ImportInProgress => "IMPORT_IN_PROGRESS",
            StackStatus::ImportComplete => "IMPORT_COMPLETE",
            StackStatus::ImportRollbackInProgress => "IMPORT_ROLLBACK_IN_PROGRESS",
            StackStatus::ImportRollbackComplete => "IMPORT_ROLLBACK_COMPLETE",
            StackStatus::ImportRollbackFailed => "IMPORT_ROLLBACK_FAILED",
            StackStatus::Unknown(raw) => raw,
        }
    }

    pub fn phase(&self) -> StackPhase {
        match self {
            StackStatus::CreateComplete
            | StackStatus::UpdateComplete
            | StackStatus::ImportComplete => StackPhase::Succeeded,

            StackStatus::CreateFailed
            | StackStatus::RollbackComplete
            | StackStatus::RollbackFailed
            | StackStatus::DeleteComplete
            | StackStatus::DeleteFailed
            | StackStatus::DeleteSkipped
            | StackStatus::UpdateFailed
            | StackStatus::UpdateRollbackComplete
            | StackStatus::UpdateRollbackFailed
            | StackStatus::ImportRollbackComplete
            | StackStatus::ImportRollbackFailed => StackPhase::Failed,

            StackStatus::Unknown(raw) => {
                if raw.ends_with("_FAILED")
                    || (raw.contains("ROLLBACK") && raw.ends_with("_COMPLETE"))
                {
                    StackPhase::Failed
                } else if raw.ends_with("_COMPLETE") {
                    StackPhase::Succeeded
                } else {
                    StackPhase::InProgress
                }
            }

            _ => StackPhase::InProgress,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase() != StackPhase::InProgress
    }

    /// Whether an existing stack in this status can be reused as a dependency.
    ///
    /// Every [`StackPhase::Succeeded`] status qualifies, plus one [`StackPhase::Failed`]
    /// exception: `UPDATE_ROLLBACK_COMPLETE`. The update it reports did not take effect,
    /// so as the outcome of an operation it is a failure, but the rollback restored the
    /// previous resources and the stack is still fully provisioned.
    pub fn is_usable(&self) -> bool {
        self.phase() == StackPhase::Succeeded || *self == StackStatus::UpdateRollbackComplete
    }

    /// True for resource-level failure statuses (`*_FAILED`), terminal or not
    pub fn is_failure(&self) -> bool {
        self.as_str().ends_with("_FAILED")
    }
}

impl From<&str> for StackStatus {
    fn from(raw: &str) -> Self {
        match raw {
            "CREATE_IN_PROGRESS" => StackStatus::CreateInProgress,
            "CREATE_COMPLETE" => StackStatus::CreateComplete,
            "CREATE_FAILED" => StackStatus::CreateFailed,
            "ROLLBACK_IN_PROGRESS" => StackStatus::RollbackInProgress,
            "ROLLBACK_COMPLETE" => StackStatus::RollbackComplete,
            "ROLLBACK_FAILED" => StackStatus::RollbackFailed,
            "DELETE_IN_PROGRESS" => StackStatus::DeleteInProgress,
            "DELETE_COMPLETE" => StackStatus::DeleteComplete,
            "DELETE_FAILED" => StackStatus::DeleteFailed,
            "DELETE_SKIPPED" => StackStatus::DeleteSkipped,
            "UPDATE_IN_PROGRESS" => StackStatus::UpdateInProgress,
            "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS" => StackStatus::UpdateCompleteCleanupInProgress,
            "UPDATE_COMPLETE" => StackStatus::UpdateComplete,
            "UPDATE_FAILED" => StackStatus::UpdateFailed,
            "UPDATE_ROLLBACK_IN_PROGRESS" => StackStatus::UpdateRollbackInProgress,
            "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS" => {
                StackStatus::UpdateRollbackCompleteCleanupInProgress
            }
            "UPDATE_ROLLBACK_COMPLETE" => StackStatus::UpdateRollbackComplete,
            "UPDATE_ROLLBACK_FAILED" => StackStatus::UpdateRollbackFailed,
            "REVIEW_IN_PROGRESS" => StackStatus::ReviewInProgress,
            "IMPORT_IN_PROGRESS" => StackStatus::ImportInProgress,
            "IMPORT_COMPLETE" => StackStatus::ImportComplete,
            "IMPORT_ROLLBACK_IN_PROGRESS" => StackStatus::ImportRollbackInProgress,
            "IMPORT_ROLLBACK_COMPLETE" => StackStatus::ImportRollbackComplete,
            "IMPORT_ROLLBACK_FAILED" => StackStatus::ImportRollbackFailed,
            other => StackStatus::Unknown(other.to_string()),
        }
    }
}

impl From<String> for StackStatus {
    fn from(raw: String) -> Self {
        StackStatus::from(raw.as_str())
    }
}

impl From<StackStatus> for String {
    fn from(status: StackStatus) -> Self {
        status.as_str().to_string()
    }
}

impl FromStr for StackStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(StackStatus::from(s))
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable status record for a resource within a stack
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StackEvent {
    /// Backend-assigned identity, unique within a stack
    pub event_id: String,
    pub stack_name: String,
    pub timestamp: DateTime<Utc>,
    pub logical_resource_id: String,
    /// Backend resource type (e.g. "AWS::EC2::VPC"), when reported
    pub resource_type: Option<String>,
    pub resource_status: StackStatus,
    /// May be empty
    pub resource_status_reason: String,
}

/// Point-in-time view of a stack
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StackDescription {
    pub name: String,
    pub status: StackStatus,
    pub status_reason: Option<String>,
    /// Populated by the backend only once the stack reaches a success terminal state
    pub outputs: BTreeMap<String, String>,
}

/// Input contract for a stack creation request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateStackContext {
    pub parameters: BTreeMap<String, String>,
    /// When true, failed resources are left in place for inspection
    pub disable_rollback: bool,
    /// Capabilities acknowledged on submission (e.g. "CAPABILITY_IAM")
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Idempotency token; retried submissions reuse it
    pub client_request_token: String,
}

impl CreateStackContext {
    pub fn new(parameters: BTreeMap<String, String>, disable_rollback: bool) -> Self {
        Self {
            parameters,
            disable_rollback,
            capabilities: Vec::new(),
            client_request_token: format!("clusterstack-{}", Uuid::new_v4()),
        }
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }
}

/// Network stack outputs consumed by the cluster stack. Recomputed on every resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkOutputs {
    pub stack_name: String,
    pub vpc_id: String,
    pub private_subnet_1: String,
    pub private_subnet_2: String,
}
