//! Run-wide limits on how long to keep waiting for the backend

use std::future::Future;
use std::time::Duration;

use clusterstack_models::StackStatus;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::ProvisionError;

/// Why a run stopped waiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    Cancelled,
    DeadlineReached,
}

impl Stop {
    pub fn into_error(self, stack: &str, last_status: Option<StackStatus>) -> ProvisionError {
        match self {
            Stop::Cancelled => ProvisionError::Cancelled {
                stack: stack.to_string(),
            },
            Stop::DeadlineReached => ProvisionError::TimedOut {
                stack: stack.to_string(),
                last_status,
            },
        }
    }
}

/// Cancellation plus a single deadline shared by every step of a run.
///
/// The deadline is fixed when the conditions are built, so a run that creates several
/// stacks waits at most `timeout` in total.
#[derive(Debug, Clone)]
pub struct StopConditions {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl StopConditions {
    /// `timeout` of None waits until cancelled
    pub fn new(cancel: CancellationToken, timeout: Option<Duration>) -> Self {
        Self {
            cancel,
            deadline: timeout.map(|timeout| Instant::now() + timeout),
        }
    }

    /// Resolves once the run is cancelled or past its deadline. Cancellation wins a tie.
    pub async fn stopped(&self) -> Stop {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Stop::Cancelled,
            _ = wait_for_deadline(self.deadline) => Stop::DeadlineReached,
        }
    }

    /// Run `operation` on `stack`, abandoning it if the run stops first
    pub async fn run<T, F>(&self, stack: &str, operation: F) -> Result<T, ProvisionError>
    where
        F: Future<Output = Result<T, ProvisionError>>,
    {
        tokio::select! {
            biased;
            stop = self.stopped() => Err(stop.into_error(stack, None)),
            result = operation => result,
        }
    }
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
