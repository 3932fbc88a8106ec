//! In-memory provisioning backend for tests

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use clusterstack_models::{CreateStackContext, StackDescription, StackEvent, StackStatus};

use crate::cfn_client::{ClientError, ProvisioningClient};
use crate::names::outputs;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create {
        name: String,
        parameters: BTreeMap<String, String>,
        disable_rollback: bool,
        capabilities: Vec<String>,
        client_request_token: String,
    },
    Describe(String),
    /// Stack name and the `since` cursor passed in
    ListEvents(String, Option<DateTime<Utc>>),
}

/// One observable state of a scripted stack. Each describe advances to the next step;
/// the last step sticks.
#[derive(Debug, Clone)]
pub struct FakeStep {
    status: StackStatus,
    reason: Option<String>,
    events: Vec<StackEvent>,
    outputs: BTreeMap<String, String>,
}

impl FakeStep {
    pub fn new(status: StackStatus) -> Self {
        Self {
            status,
            reason: None,
            events: Vec::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn with_event(mut self, event: StackEvent) -> Self {
        self.events.push(event);
        self
    }

    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_string());
        self
    }

    pub fn with_outputs(mut self, outputs: BTreeMap<String, String>) -> Self {
        self.outputs = outputs;
        self
    }
}

struct FakeStack {
    description: StackDescription,
    pending: VecDeque<FakeStep>,
    /// Oldest first
    history: Vec<StackEvent>,
}

impl FakeStack {
    fn scripted(name: &str, steps: Vec<FakeStep>) -> Self {
        let status = steps
            .first()
            .map(|step| step.status.clone())
            .unwrap_or(StackStatus::CreateComplete);
        Self {
            description: StackDescription {
                name: name.to_string(),
                status,
                status_reason: None,
                outputs: BTreeMap::new(),
            },
            pending: steps.into(),
            history: Vec::new(),
        }
    }

    fn advance(&mut self) {
        if let Some(step) = self.pending.pop_front() {
            self.description.status = step.status;
            self.description.status_reason = step.reason;
            self.history.extend(step.events);
            if !step.outputs.is_empty() {
                self.description.outputs = step.outputs;
            }
        }
    }
}

#[derive(Default)]
struct FakeState {
    stacks: HashMap<String, FakeStack>,
    create_scripts: HashMap<String, Vec<FakeStep>>,
    rejections: HashMap<String, String>,
    query_skip: usize,
    query_failures: usize,
    create_failures: usize,
    calls: Vec<Call>,
}

impl FakeState {
    fn next_query_fails(&mut self) -> bool {
        if self.query_skip > 0 {
            self.query_skip -= 1;
            false
        } else if self.query_failures > 0 {
            self.query_failures -= 1;
            true
        } else {
            false
        }
    }
}

#[derive(Default)]
pub struct FakeProvisioningClient {
    state: Mutex<FakeState>,
}

impl FakeProvisioningClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// An existing stack that stays in `status`
    pub fn insert_stack(&self, name: &str, status: StackStatus, outputs: BTreeMap<String, String>) {
        let stack = FakeStack::scripted(name, vec![FakeStep::new(status).with_outputs(outputs)]);
        self.state.lock().unwrap().stacks.insert(name.to_string(), stack);
    }

    /// An existing stack that walks through `steps`, one per describe
    pub fn insert_scripted(&self, name: &str, steps: Vec<FakeStep>) {
        let stack = FakeStack::scripted(name, steps);
        self.state.lock().unwrap().stacks.insert(name.to_string(), stack);
    }

    /// Steps a stack walks through once `name` is created. Unscripted creates complete
    /// immediately without outputs.
    pub fn script_create(&self, name: &str, steps: Vec<FakeStep>) {
        self.state
            .lock()
            .unwrap()
            .create_scripts
            .insert(name.to_string(), steps);
    }

    pub fn reject_create(&self, name: &str, reason: &str) {
        self.state
            .lock()
            .unwrap()
            .rejections
            .insert(name.to_string(), reason.to_string());
    }

    /// The next `count` describe/list calls fail transiently
    pub fn fail_next_queries(&self, count: usize) {
        self.fail_queries_after(0, count);
    }

    /// Let `skip` describe/list calls through, then fail the next `count` transiently
    pub fn fail_queries_after(&self, skip: usize, count: usize) {
        let mut state = self.state.lock().unwrap();
        state.query_skip = skip;
        state.query_failures = count;
    }

    pub fn fail_next_creates(&self, count: usize) {
        self.state.lock().unwrap().create_failures = count;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn create_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Create { .. }))
            .collect()
    }

    pub fn describe_count(&self, name: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Describe(n) if n == name))
            .count()
    }
}

#[async_trait]
impl ProvisioningClient for FakeProvisioningClient {
    async fn create_stack(
        &self,
        name: &str,
        _template_body: &str,
        context: &CreateStackContext,
    ) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Create {
            name: name.to_string(),
            parameters: context.parameters.clone(),
            disable_rollback: context.disable_rollback,
            capabilities: context.capabilities.clone(),
            client_request_token: context.client_request_token.clone(),
        });

        if state.create_failures > 0 {
            state.create_failures -= 1;
            return Err(ClientError::Transient("Rate exceeded".to_string()));
        }
        if let Some(reason) = state.rejections.get(name) {
            return Err(ClientError::Rejected(reason.clone()));
        }
        if state.stacks.contains_key(name) {
            return Err(ClientError::Rejected(format!(
                "AlreadyExistsException: Stack [{}] already exists",
                name
            )));
        }

        let steps = state
            .create_scripts
            .remove(name)
            .unwrap_or_else(|| vec![FakeStep::new(StackStatus::CreateComplete)]);
        state
            .stacks
            .insert(name.to_string(), FakeStack::scripted(name, steps));
        Ok(())
    }

    async fn describe_stack(&self, name: &str) -> Result<StackDescription, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Describe(name.to_string()));
        if state.next_query_fails() {
            return Err(ClientError::Transient("Rate exceeded".to_string()));
        }

        let stack = state
            .stacks
            .get_mut(name)
            .ok_or_else(|| ClientError::StackNotFound(name.to_string()))?;
        stack.advance();
        Ok(stack.description.clone())
    }

    /// Ignores `since` and returns the whole history, like a backend that only pages
    async fn list_stack_events(
        &self,
        name: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<StackEvent>, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::ListEvents(name.to_string(), since));
        if state.next_query_fails() {
            return Err(ClientError::Transient("connection reset".to_string()));
        }

        let stack = state
            .stacks
            .get(name)
            .ok_or_else(|| ClientError::StackNotFound(name.to_string()))?;
        Ok(stack.history.iter().rev().cloned().collect())
    }
}

/// Event `<stack>-<seq>` stamped `seq` seconds after a fixed epoch
pub fn event(
    stack: &str,
    seq: i64,
    logical_id: &str,
    status: StackStatus,
    reason: &str,
) -> StackEvent {
    StackEvent {
        event_id: format!("{}-{}", stack, seq),
        stack_name: stack.to_string(),
        timestamp: epoch() + Duration::seconds(seq),
        logical_resource_id: logical_id.to_string(),
        resource_type: None,
        resource_status: status,
        resource_status_reason: reason.to_string(),
    }
}

pub fn epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default()
}

pub fn network_outputs(vpc_id: &str, subnet_1: &str, subnet_2: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (outputs::VPC_ID.to_string(), vpc_id.to_string()),
        (outputs::SUBNET_1.to_string(), subnet_1.to_string()),
        (outputs::SUBNET_2.to_string(), subnet_2.to_string()),
    ])
}
