mod common;

use common::task_mock;
use mockito::Server;
use nimbus::api::{Client, SyncStatus};
use nimbus::wait::{wait_for_deleted, wait_for_sync, wait_for_task, OperationError, PollSpec};
use nimbus::{NimbusProviderData, Polling};
use std::time::Duration;
use tfplug::context::Context;
use tfplug::mutexkv::MutexKV;
use tfplug::retry::WaitError;

const SPEC: PollSpec = PollSpec::new(1, 1);

fn provider_data(url: &str) -> NimbusProviderData {
    let client = Client::new(url, "test-key", false).unwrap();
    NimbusProviderData::new(client)
        .with_polling(Polling::Immediate)
        .with_locks(MutexKV::new())
}

#[tokio::test(flavor = "multi_thread")]
async fn task_wait_rides_out_intermediate_states() {
    let mut server = Server::new_async().await;
    let mock = task_mock(&mut server, "t-1", "vpc-1", 3, "Complete").await;
    let data = provider_data(&server.url());

    wait_for_task(&Context::new(), &data, "t-1", SPEC, Duration::from_secs(5))
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_task_is_an_error() {
    let mut server = Server::new_async().await;
    let _mock = task_mock(&mut server, "t-2", "vol-1", 1, "Failed").await;
    let data = provider_data(&server.url());

    let err = wait_for_task(&Context::new(), &data, "t-2", SPEC, Duration::from_secs(5))
        .await
        .unwrap_err();

    assert!(matches!(err, OperationError::Wait(WaitError::Failed { .. })));
    assert!(err.to_string().contains("review logs"));
}

#[tokio::test(flavor = "multi_thread")]
async fn task_that_never_settles_times_out() {
    let mut server = Server::new_async().await;
    let _mock = task_mock(&mut server, "t-3", "vol-1", usize::MAX, "Complete").await;
    let data = provider_data(&server.url());

    let err = wait_for_task(&Context::new(), &data, "t-3", SPEC, Duration::from_millis(200))
        .await
        .unwrap_err();

    match err {
        OperationError::Wait(wait) => {
            assert!(wait.is_timeout());
            let message = wait.to_string();
            assert!(message.contains("t-3"), "{}", message);
            assert!(message.contains("Complete"), "{}", message);
            assert!(message.contains("InProgress"), "{}", message);
        }
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn vanished_task_is_not_success() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/v1/tasks/t-4")
        .with_status(404)
        .create_async()
        .await;
    let data = provider_data(&server.url());

    let err = wait_for_task(&Context::new(), &data, "t-4", SPEC, Duration::from_secs(5))
        .await
        .unwrap_err();

    assert!(matches!(err, OperationError::Vanished(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_wait_reads_the_resource_status() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/v1/routers/r-1")
        .with_body(
            r#"{"data":{"id":"r-1","name":"edge","vpc_id":"vpc-1","external_gateway":false,"sync_status":"Complete"}}"#,
        )
        .create_async()
        .await;
    let data = provider_data(&server.url());

    wait_for_sync(&Context::new(), &data, "r-1", SPEC, Duration::from_secs(5), |client, id| async move {
        client.routers().get(&id).await.map(|r| r.sync_status)
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn deletion_wait_ends_on_not_found() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/v1/floating_ips/fip-1")
        .with_status(404)
        .create_async()
        .await;
    let data = provider_data(&server.url());

    wait_for_deleted(&Context::new(), &data, "fip-1", SPEC, Duration::from_secs(5), |client, id| async move {
        client.floating_ips().get(&id).await.map(|f| f.sync_status)
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelled_context_stops_the_wait() {
    let mut server = Server::new_async().await;
    let _mock = task_mock(&mut server, "t-5", "vpc-1", usize::MAX, "Complete").await;
    let data = provider_data(&server.url());

    let ctx = Context::new();
    ctx.cancel();

    let err = wait_for_task(&ctx, &data, "t-5", SPEC, Duration::from_secs(5))
        .await
        .unwrap_err();

    assert!(matches!(err, OperationError::Cancelled(_)));
}

#[test]
fn sync_status_parses_from_wire_names() {
    assert_eq!("Syncing".parse::<SyncStatus>().unwrap(), SyncStatus::Syncing);
}
