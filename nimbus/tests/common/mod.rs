#![allow(dead_code)]

use mockito::{Mock, ServerGuard};
use nimbus::{NimbusProvider, Polling};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tfplug::host::ProviderHost;
use tfplug::types::{AttributePath, Dynamic, DynamicValue};

pub const API_KEY: &str = "test-key";

pub fn object(pairs: &[(&str, Dynamic)]) -> DynamicValue {
    let mut value = DynamicValue::empty_object();
    for (name, v) in pairs {
        value.set(&AttributePath::new(name), v.clone()).unwrap();
    }
    value
}

pub fn string(s: &str) -> Dynamic {
    Dynamic::String(s.to_string())
}

pub fn get_string(value: &DynamicValue, name: &str) -> String {
    value.get_string(&AttributePath::new(name)).unwrap()
}

pub fn provider_config(server: &ServerGuard) -> DynamicValue {
    object(&[
        ("endpoint", string(&server.url())),
        ("api_key", string(API_KEY)),
    ])
}

/// A host whose provider points at the mock server and polls without delay
pub async fn configured_host(server: &ServerGuard) -> ProviderHost<NimbusProvider> {
    let host = ProviderHost::new(NimbusProvider::new().with_polling(Polling::Immediate));
    let diagnostics = host.configure("1.9.0", provider_config(server)).await;
    assert!(diagnostics.is_empty(), "configure failed: {:?}", diagnostics);
    host
}

/// Mocks `GET /v1/tasks/{id}`: the task reports `InProgress` for the first
/// `pending` reads, then `final_status`
pub async fn task_mock(
    server: &mut ServerGuard,
    task_id: &str,
    resource_id: &str,
    pending: usize,
    final_status: &'static str,
) -> Mock {
    let reads = Arc::new(AtomicUsize::new(0));
    let task_id_owned = task_id.to_string();
    let resource_id = resource_id.to_string();

    server
        .mock("GET", format!("/v1/tasks/{}", task_id).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body_from_request(move |_| {
            let read = reads.fetch_add(1, Ordering::SeqCst);
            let status = if read < pending { "InProgress" } else { final_status };
            format!(
                r#"{{"data":{{"id":"{}","status":"{}","resource_id":"{}"}}}}"#,
                task_id_owned, status, resource_id
            )
            .into_bytes()
        })
        .expect_at_least(1)
        .create_async()
        .await
}
