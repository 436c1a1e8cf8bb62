mod common;

use common::{configured_host, get_string, object, string, task_mock};
use mockito::{Matcher, Server};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tfplug::types::{AttributePath, Dynamic, DynamicValue};

const VPC_BODY: &str = r#"{"data":{"id":"vpc-1","name":"main","cidr_block":"10.0.0.0/16","created_at":"2026-01-01T00:00:00Z"}}"#;

fn vpc_config() -> DynamicValue {
    object(&[("name", string("main")), ("cidr_block", string("10.0.0.0/16"))])
}

#[tokio::test(flavor = "multi_thread")]
async fn vpc_create_read_and_delete() {
    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", "/v1/vpcs")
        .match_body(Matcher::Json(serde_json::json!({
            "name": "main",
            "cidr_block": "10.0.0.0/16"
        })))
        .with_body(r#"{"data":{"task_id":"t-1","resource_id":"vpc-1"}}"#)
        .expect(1)
        .create_async()
        .await;
    let _create_task = task_mock(&mut server, "t-1", "vpc-1", 2, "Complete").await;
    let _get = server
        .mock("GET", "/v1/vpcs/vpc-1")
        .with_body(VPC_BODY)
        .create_async()
        .await;

    let host = configured_host(&server).await;

    let plan = host
        .plan_resource_change("nimbus_vpc", DynamicValue::null(), vpc_config(), vpc_config())
        .await;
    assert!(plan.diagnostics.is_empty(), "{:?}", plan.diagnostics);
    assert_eq!(
        plan.planned_state.get(&AttributePath::new("id")),
        Some(&Dynamic::Unknown)
    );

    let applied = host
        .apply_resource_change("nimbus_vpc", DynamicValue::null(), plan.planned_state, vpc_config())
        .await;
    assert!(applied.diagnostics.is_empty(), "{:?}", applied.diagnostics);
    create.assert_async().await;

    let state = applied.new_state.unwrap();
    assert_eq!(get_string(&state, "id"), "vpc-1");
    assert_eq!(get_string(&state, "created_at"), "2026-01-01T00:00:00+00:00");

    let read = host.read_resource("nimbus_vpc", state.clone()).await;
    assert!(read.diagnostics.is_empty());
    assert_eq!(read.new_state.unwrap(), state);

    let delete = server
        .mock("DELETE", "/v1/vpcs/vpc-1")
        .with_body(r#"{"data":{"task_id":"t-2"}}"#)
        .expect(1)
        .create_async()
        .await;
    let _delete_task = task_mock(&mut server, "t-2", "vpc-1", 0, "Complete").await;

    let deleted = host
        .apply_resource_change("nimbus_vpc", state, DynamicValue::null(), DynamicValue::null())
        .await;
    assert!(deleted.diagnostics.is_empty(), "{:?}", deleted.diagnostics);
    assert!(deleted.new_state.is_none());
    delete.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_create_keeps_the_new_id_in_state() {
    let mut server = Server::new_async().await;
    let _create = server
        .mock("POST", "/v1/vpcs")
        .with_body(r#"{"data":{"task_id":"t-9","resource_id":"vpc-9"}}"#)
        .create_async()
        .await;
    let _task = task_mock(&mut server, "t-9", "vpc-9", 1, "Failed").await;

    let host = configured_host(&server).await;
    let plan = host
        .plan_resource_change("nimbus_vpc", DynamicValue::null(), vpc_config(), vpc_config())
        .await;
    let applied = host
        .apply_resource_change("nimbus_vpc", DynamicValue::null(), plan.planned_state, vpc_config())
        .await;

    assert_eq!(applied.diagnostics.len(), 1);
    assert_eq!(applied.diagnostics[0].summary, "Error waiting for VPC to be created");
    assert!(applied.diagnostics[0].detail.contains("review logs"));
    let state = applied.new_state.unwrap();
    assert_eq!(get_string(&state, "id"), "vpc-9");
}

#[tokio::test(flavor = "multi_thread")]
async fn resource_deleted_outside_terraform_drops_from_state() {
    let mut server = Server::new_async().await;
    let _get = server
        .mock("GET", "/v1/volumes/vol-1")
        .with_status(404)
        .create_async()
        .await;

    let host = configured_host(&server).await;
    let state = object(&[
        ("id", string("vol-1")),
        ("name", string("data")),
        ("size_gb", Dynamic::Number(10.0)),
    ]);

    let read = host.read_resource("nimbus_volume", state).await;

    assert!(read.diagnostics.is_empty(), "{:?}", read.diagnostics);
    assert!(read.new_state.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn deleting_an_already_deleted_resource_succeeds() {
    let mut server = Server::new_async().await;
    let _delete = server
        .mock("DELETE", "/v1/vpcs/vpc-1")
        .with_status(404)
        .create_async()
        .await;
    let tasks = server
        .mock("GET", Matcher::Regex(r"^/v1/tasks/".to_string()))
        .expect(0)
        .create_async()
        .await;

    let host = configured_host(&server).await;
    let state = object(&[
        ("id", string("vpc-1")),
        ("name", string("main")),
        ("cidr_block", string("10.0.0.0/16")),
    ]);

    let deleted = host
        .apply_resource_change("nimbus_vpc", state, DynamicValue::null(), DynamicValue::null())
        .await;

    assert!(deleted.diagnostics.is_empty(), "{:?}", deleted.diagnostics);
    assert!(deleted.new_state.is_none());
    tasks.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_enum_is_rejected_before_any_api_call() {
    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let host = configured_host(&server).await;
    let config = object(&[
        ("policy_id", string("fp-1")),
        ("direction", string("sideways")),
        ("action", string("allow")),
        ("protocol", string("tcp")),
    ]);

    let diagnostics = host
        .validate_resource_config("nimbus_firewall_rule", config.clone())
        .await;
    assert_eq!(diagnostics.len(), 1, "{:?}", diagnostics);
    assert_eq!(diagnostics[0].summary, "Invalid direction");
    assert_eq!(diagnostics[0].attribute, Some(AttributePath::new("direction")));

    let plan = host
        .plan_resource_change("nimbus_firewall_rule", DynamicValue::null(), config.clone(), config.clone())
        .await;
    let applied = host
        .apply_resource_change("nimbus_firewall_rule", DynamicValue::null(), plan.planned_state, config)
        .await;

    assert!(applied.new_state.is_none());
    assert_eq!(applied.diagnostics[0].summary, "Invalid direction");
    create.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn rules_on_one_policy_are_applied_one_at_a_time() {
    let mut server = Server::new_async().await;
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let created = Arc::new(AtomicUsize::new(0));

    let (post_active, post_peak) = (active.clone(), peak.clone());
    let _create = server
        .mock("POST", "/v1/firewall_policies/fp-1/rules")
        .with_body_from_request(move |_| {
            let now = post_active.fetch_add(1, Ordering::SeqCst) + 1;
            post_peak.fetch_max(now, Ordering::SeqCst);
            let id = created.fetch_add(1, Ordering::SeqCst) + 1;
            rule_body(&format!("r-{}", id)).into_bytes()
        })
        .expect(2)
        .create_async()
        .await;
    let _policy = server
        .mock("GET", "/v1/firewall_policies/fp-1")
        .with_body(r#"{"data":{"id":"fp-1","name":"web","sync_status":"Complete"}}"#)
        .create_async()
        .await;
    let get_active = active.clone();
    let _get_rule = server
        .mock("GET", Matcher::Regex(r"^/v1/firewall_policies/fp-1/rules/r-\d+$".to_string()))
        .with_body_from_request(move |request| {
            get_active.fetch_sub(1, Ordering::SeqCst);
            let id = request.path().rsplit('/').next().unwrap_or_default().to_string();
            rule_body(&id).into_bytes()
        })
        .expect(2)
        .create_async()
        .await;

    let host = configured_host(&server).await;
    let config = object(&[
        ("policy_id", string("fp-1")),
        ("direction", string("ingress")),
        ("action", string("allow")),
        ("protocol", string("tcp")),
        ("port_range_min", Dynamic::Number(443.0)),
    ]);
    let plan = host
        .plan_resource_change("nimbus_firewall_rule", DynamicValue::null(), config.clone(), config.clone())
        .await;
    assert!(plan.diagnostics.is_empty(), "{:?}", plan.diagnostics);

    let (first, second) = tokio::join!(
        host.apply_resource_change(
            "nimbus_firewall_rule",
            DynamicValue::null(),
            plan.planned_state.clone(),
            config.clone(),
        ),
        host.apply_resource_change(
            "nimbus_firewall_rule",
            DynamicValue::null(),
            plan.planned_state.clone(),
            config.clone(),
        ),
    );

    assert!(first.diagnostics.is_empty(), "{:?}", first.diagnostics);
    assert!(second.diagnostics.is_empty(), "{:?}", second.diagnostics);
    assert_eq!(peak.load(Ordering::SeqCst), 1);

    let first = first.new_state.unwrap();
    let second = second.new_state.unwrap();
    assert_ne!(get_string(&first, "id"), get_string(&second, "id"));
    assert_eq!(
        first.get(&AttributePath::new("port_range_max")),
        Some(&Dynamic::Number(443.0))
    );
    assert_eq!(
        first.get(&AttributePath::new("priority")),
        Some(&Dynamic::Number(100.0))
    );
}

fn rule_body(id: &str) -> String {
    format!(
        r#"{{"data":{{"id":"{}","direction":"ingress","action":"allow","protocol":"tcp","port_range_min":443,"port_range_max":443,"priority":100}}}}"#,
        id
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn tag_import_splits_the_composite_id() {
    let server = Server::new_async().await;
    let host = configured_host(&server).await;

    let response = host.import_resource_state("nimbus_tag", "vpc-1/env").await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    let state = &response.imported_resources[0].state;
    assert_eq!(get_string(state, "resource_id"), "vpc-1");
    assert_eq!(get_string(state, "key"), "env");

    let malformed = host.import_resource_state("nimbus_tag", "vpc-1").await;
    assert!(!malformed.diagnostics.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_create_recovers_the_id_from_the_task() {
    let mut server = Server::new_async().await;
    let _create = server
        .mock("POST", "/v1/instances")
        .with_body(r#"{"data":{"task_id":"t-1"}}"#)
        .expect(1)
        .create_async()
        .await;
    let _task = task_mock(&mut server, "t-1", "i-1", 1, "Failed").await;
    let _get = server
        .mock("GET", "/v1/instances/i-1")
        .with_body(
            r#"{"data":{"id":"i-1","name":"web","flavor_id":"fl-1","image_id":"img-1","network_id":"net-1","status":"error"}}"#,
        )
        .create_async()
        .await;

    let host = configured_host(&server).await;
    let config = object(&[
        ("name", string("web")),
        ("flavor_id", string("fl-1")),
        ("image_id", string("img-1")),
        ("network_id", string("net-1")),
    ]);
    let plan = host
        .plan_resource_change("nimbus_instance", DynamicValue::null(), config.clone(), config.clone())
        .await;
    assert!(plan.diagnostics.is_empty(), "{:?}", plan.diagnostics);

    let applied = host
        .apply_resource_change("nimbus_instance", DynamicValue::null(), plan.planned_state, config)
        .await;

    assert_eq!(applied.diagnostics.len(), 1, "{:?}", applied.diagnostics);
    assert_eq!(applied.diagnostics[0].summary, "Error waiting for instance to be created");
    let state = applied.new_state.expect("partially created instance stays in state");
    assert_eq!(get_string(&state, "id"), "i-1");
    assert_eq!(get_string(&state, "name"), "web");
}

#[tokio::test(flavor = "multi_thread")]
async fn stopping_the_provider_ends_a_pending_create() {
    let mut server = Server::new_async().await;
    let _create = server
        .mock("POST", "/v1/vpcs")
        .with_body(r#"{"data":{"task_id":"t-7","resource_id":"vpc-7"}}"#)
        .expect(1)
        .create_async()
        .await;
    let _task = task_mock(&mut server, "t-7", "vpc-7", usize::MAX, "Complete").await;

    let host = configured_host(&server).await;
    let plan = host
        .plan_resource_change("nimbus_vpc", DynamicValue::null(), vpc_config(), vpc_config())
        .await;

    let (applied, _) = tokio::join!(
        host.apply_resource_change("nimbus_vpc", DynamicValue::null(), plan.planned_state, vpc_config()),
        async {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            host.stop();
        },
    );

    assert_eq!(applied.diagnostics.len(), 1, "{:?}", applied.diagnostics);
    assert_eq!(applied.diagnostics[0].summary, "Error waiting for VPC to be created");
    assert!(applied.diagnostics[0].detail.contains("cancelled"));
    assert_eq!(get_string(&applied.new_state.unwrap(), "id"), "vpc-7");
}
