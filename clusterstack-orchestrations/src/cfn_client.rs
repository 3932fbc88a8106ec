//! Provisioning client capability and its CloudFormation implementation

use std::collections::BTreeMap;

use async_trait::async_trait;
use aws_sdk_cloudformation::config::Region;
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_cloudformation::primitives::DateTime as AwsDateTime;
use aws_sdk_cloudformation::types::{Capability, Parameter};
use chrono::{DateTime, Utc};
use clusterstack_models::{CreateStackContext, StackDescription, StackEvent, StackStatus};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    #[error("stack {0} does not exist")]
    StackNotFound(String),

    /// The backend refused the request (validation, name conflict, quota)
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Throttling, timeouts and connection failures
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("{0}")]
    Other(String),
}

impl ClientError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Transient(_))
    }
}

/// Operations the orchestrator needs from the provisioning backend.
///
/// Implementations hold no orchestration state; everything lives in the backend.
#[async_trait]
pub trait ProvisioningClient: Send + Sync {
    /// Submit a stack for creation. Returns once the request is accepted, not once
    /// the stack exists.
    async fn create_stack(
        &self,
        name: &str,
        template_body: &str,
        context: &CreateStackContext,
    ) -> Result<(), ClientError>;

    /// Current status and outputs; [`ClientError::StackNotFound`] when absent
    async fn describe_stack(&self, name: &str) -> Result<StackDescription, ClientError>;

    /// Events for the stack in the order the backend returns them (newest first).
    ///
    /// With `since`, every event at or after that instant is included; older ones may be
    /// left out. Without it, the whole history is returned.
    async fn list_stack_events(
        &self,
        name: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<StackEvent>, ClientError>;
}

/// Region/profile selection for the AWS client
#[derive(Debug, Clone, Default)]
pub struct AwsClientOptions {
    pub region: Option<String>,
    pub profile: Option<String>,
}

/// CloudFormation-backed [`ProvisioningClient`]
#[derive(Clone)]
pub struct AwsCloudFormationClient {
    client: aws_sdk_cloudformation::Client,
}

impl AwsCloudFormationClient {
    pub fn new(client: aws_sdk_cloudformation::Client) -> Self {
        Self { client }
    }
}

/// Build a CloudFormation client from the default credential chain
pub async fn get_cfn_client(options: &AwsClientOptions) -> AwsCloudFormationClient {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(region) = &options.region {
        loader = loader.region(Region::new(region.clone()));
    }
    if let Some(profile) = &options.profile {
        loader = loader.profile_name(profile);
    }
    let config = loader.load().await;

    AwsCloudFormationClient::new(aws_sdk_cloudformation::Client::new(&config))
}

#[async_trait]
impl ProvisioningClient for AwsCloudFormationClient {
    async fn create_stack(
        &self,
        name: &str,
        template_body: &str,
        context: &CreateStackContext,
    ) -> Result<(), ClientError> {
        let parameters = context
            .parameters
            .iter()
            .map(|(key, value)| {
                Parameter::builder()
                    .parameter_key(key)
                    .parameter_value(value)
                    .build()
            })
            .collect::<Vec<_>>();

        let mut request = self
            .client
            .create_stack()
            .stack_name(name)
            .template_body(template_body)
            .set_parameters(Some(parameters))
            .disable_rollback(context.disable_rollback)
            .client_request_token(&context.client_request_token);

        for capability in &context.capabilities {
            request = request.capabilities(Capability::from(capability.as_str()));
        }

        request
            .send()
            .await
            .map(|_| ())
            .map_err(|e| classify_error(name, e, true))
    }

    async fn describe_stack(&self, name: &str) -> Result<StackDescription, ClientError> {
        let output = self
            .client
            .describe_stacks()
            .stack_name(name)
            .send()
            .await
            .map_err(|e| classify_error(name, e, false))?;

        let stack = output
            .stacks()
            .first()
            .ok_or_else(|| ClientError::StackNotFound(name.to_string()))?;

        // Required members are plain values in newer SDK releases and options in older ones;
        // `.into()` accepts both.
        let status: Option<&aws_sdk_cloudformation::types::StackStatus> =
            stack.stack_status().into();
        let status = status
            .map(|s| StackStatus::from(s.as_str()))
            .ok_or_else(|| ClientError::Other(format!("stack {} has no status", name)))?;

        let outputs = stack
            .outputs()
            .iter()
            .filter_map(|output| {
                Some((
                    output.output_key()?.to_string(),
                    output.output_value().unwrap_or_default().to_string(),
                ))
            })
            .collect::<BTreeMap<_, _>>();

        Ok(StackDescription {
            name: name.to_string(),
            status,
            status_reason: stack.stack_status_reason().map(str::to_string),
            outputs,
        })
    }

    async fn list_stack_events(
        &self,
        name: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<StackEvent>, ClientError> {
        let mut events = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .client
                .describe_stack_events()
                .stack_name(name)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify_error(name, e, false))?;

            let page = output
                .stack_events()
                .iter()
                .map(|event| convert_event(name, event))
                .collect::<Result<Vec<_>, _>>()?;
            let reached_cursor = reaches_cursor(&page, since);
            events.extend(page);
            if reached_cursor {
                break;
            }

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(events)
    }
}

fn convert_event(
    stack_name: &str,
    event: &aws_sdk_cloudformation::types::StackEvent,
) -> Result<StackEvent, ClientError> {
    let event_id: Option<&str> = event.event_id().into();
    let timestamp: Option<&AwsDateTime> = event.timestamp().into();

    let event_id = event_id
        .ok_or_else(|| ClientError::Other(format!("event on {} has no id", stack_name)))?;
    let timestamp = timestamp
        .and_then(to_chrono)
        .ok_or_else(|| ClientError::Other(format!("event {} has no timestamp", event_id)))?;

    Ok(StackEvent {
        event_id: event_id.to_string(),
        stack_name: stack_name.to_string(),
        timestamp,
        logical_resource_id: event.logical_resource_id().unwrap_or(stack_name).to_string(),
        resource_type: event.resource_type().map(str::to_string),
        resource_status: event
            .resource_status()
            .map(|s| StackStatus::from(s.as_str()))
            .unwrap_or_else(|| StackStatus::Unknown(String::new())),
        resource_status_reason: event.resource_status_reason().unwrap_or_default().to_string(),
    })
}

/// Whether a newest-first page already goes back past `since`, making older pages redundant
fn reaches_cursor(page: &[StackEvent], since: Option<DateTime<Utc>>) -> bool {
    match (since, page.last()) {
        (Some(since), Some(oldest)) => oldest.timestamp < since,
        _ => false,
    }
}

fn to_chrono(timestamp: &AwsDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())
}

const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "TooManyRequestsException",
    "ServiceUnavailable",
    "InternalFailure",
];

fn classify_error<E, R>(stack: &str, err: SdkError<E, R>, is_submission: bool) -> ClientError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    let rendered = DisplayErrorContext(&err).to_string();

    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            ClientError::Transient(rendered)
        }
        SdkError::ServiceError(service) => {
            let code = service.err().code().unwrap_or_default();
            let message = service.err().message().unwrap_or_default();

            if THROTTLING_CODES.contains(&code) {
                ClientError::Transient(format!("{}: {}", code, message))
            } else if code == "ValidationError" && message.contains("does not exist") {
                ClientError::StackNotFound(stack.to_string())
            } else if is_submission {
                ClientError::Rejected(format!("{}: {}", code, message))
            } else {
                ClientError::Other(format!("{}: {}", code, message))
            }
        }
        _ => {
            if is_submission {
                ClientError::Rejected(rendered)
            } else {
                ClientError::Other(rendered)
            }
        }
    }
}
