//! Waiting for asynchronous Nimbus operations
//!
//! Mutations either return a task (`{task_id, resource_id}`) or leave the
//! resource with a `sync_status` that converges in the background. Both
//! are polled with [`StateChangeConf`]; the mutating call itself is never
//! repeated here.

use crate::api::{ApiError, Client, SyncStatus, TaskStatus};
use crate::provider_data::NimbusProviderData;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tfplug::context::Context;
use tfplug::retry::{StateChangeConf, WaitError, DELETED};
use thiserror::Error;

/// Poll cadence of one call site: wait `delay` before the first status
/// read, then `interval` between reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSpec {
    pub delay: Duration,
    pub interval: Duration,
}

impl PollSpec {
    pub const fn new(delay_secs: u64, interval_secs: u64) -> Self {
        Self {
            delay: Duration::from_secs(delay_secs),
            interval: Duration::from_secs(interval_secs),
        }
    }
}

#[derive(Debug, Error)]
pub enum OperationError {
    #[error(transparent)]
    Wait(#[from] WaitError<ApiError>),

    #[error("{0} disappeared before the operation completed")]
    Vanished(String),

    #[error("waiting for {0} was cancelled")]
    Cancelled(String),
}

async fn run<F, Fut>(
    ctx: &Context,
    data: &NimbusProviderData,
    conf: StateChangeConf<F>,
    id: &str,
    spec: PollSpec,
    timeout: Duration,
) -> Result<String, OperationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, ApiError>>,
{
    let conf = conf
        .delay(data.polling.delay(spec.delay))
        .min_timeout(data.polling.interval(spec.interval))
        .timeout(timeout);

    tokio::select! {
        result = conf.wait_for_state() => Ok(result?),
        _ = ctx.cancelled() => Err(OperationError::Cancelled(id.to_string())),
    }
}

/// Waits for a task to reach `Complete`. A task record that vanishes
/// counts as a failure.
pub async fn wait_for_task(
    ctx: &Context,
    data: &NimbusProviderData,
    task_id: &str,
    spec: PollSpec,
    timeout: Duration,
) -> Result<(), OperationError> {
    let client = data.client.clone();
    let refresh = move || {
        let client = client.clone();
        let task_id = task_id.to_string();
        async move {
            let task = client.tasks().get(&task_id).await?;
            if let (TaskStatus::Failed, Some(message)) = (task.status, &task.message) {
                tracing::warn!(task_id = %task.id, %message, "task failed");
            }
            Ok(task.status.to_string())
        }
    };

    let conf = StateChangeConf::new(task_id, refresh)
        .target([TaskStatus::Complete.as_str()])
        .failed([TaskStatus::Failed.as_str()]);

    match run(ctx, data, conf, task_id, spec, timeout).await? {
        state if state == DELETED => Err(OperationError::Vanished(format!("task {}", task_id))),
        _ => Ok(()),
    }
}

/// Waits for a resource's embedded `sync_status` to reach `Complete`.
/// `status` reads the status of the object named by `id`.
pub async fn wait_for_sync<F, Fut>(
    ctx: &Context,
    data: &NimbusProviderData,
    id: &str,
    spec: PollSpec,
    timeout: Duration,
    status: F,
) -> Result<(), OperationError>
where
    F: Fn(Arc<Client>, String) -> Fut,
    Fut: Future<Output = Result<SyncStatus, ApiError>>,
{
    let client = data.client.clone();
    let owned = id.to_string();
    let conf = StateChangeConf::new(id, move || {
        let status = status(client.clone(), owned.clone());
        async move { status.await.map(|s| s.to_string()) }
    })
    .target([SyncStatus::Complete.as_str()])
    .failed([SyncStatus::Failed.as_str()]);

    match run(ctx, data, conf, id, spec, timeout).await? {
        state if state == DELETED => Err(OperationError::Vanished(id.to_string())),
        _ => Ok(()),
    }
}

/// Waits until reading the object named by `id` returns NotFound
pub async fn wait_for_deleted<F, Fut>(
    ctx: &Context,
    data: &NimbusProviderData,
    id: &str,
    spec: PollSpec,
    timeout: Duration,
    status: F,
) -> Result<(), OperationError>
where
    F: Fn(Arc<Client>, String) -> Fut,
    Fut: Future<Output = Result<SyncStatus, ApiError>>,
{
    let client = data.client.clone();
    let owned = id.to_string();
    let conf = StateChangeConf::new(id, move || {
        let status = status(client.clone(), owned.clone());
        async move { status.await.map(|s| s.to_string()) }
    })
    .target([DELETED])
    .failed([SyncStatus::Failed.as_str()]);

    run(ctx, data, conf, id, spec, timeout).await.map(|_| ())
}
