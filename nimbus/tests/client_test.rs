use mockito::{Matcher, Server};
use nimbus::api::vpcs::CreateVpcRequest;
use nimbus::api::{ApiError, Client, RetryConfig};

fn client(url: &str) -> Client {
    let retry = RetryConfig {
        max_retries: 2,
        initial_backoff_ms: 1,
        max_backoff_ms: 5,
        timeout_seconds: 5,
    };
    Client::with_config(url, "test-key", false, retry).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn requests_carry_auth_and_request_id() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/flavors")
        .match_header("authorization", "Bearer test-key")
        .match_header(
            "x-request-id",
            Matcher::Regex("^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[0-9a-f]{4}-[0-9a-f]{12}$".into()),
        )
        .with_body(r#"{"data":[{"id":"fl-1","name":"small","vcpus":1,"memory_mb":2048}]}"#)
        .create_async()
        .await;

    let flavors = client(&server.url()).catalog().flavors().await.unwrap();

    mock.assert_async().await;
    assert_eq!(flavors.len(), 1);
    assert_eq!(flavors[0].disk_gb, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn bare_bodies_are_accepted() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/v1/vpcs/vpc-1")
        .with_body(r#"{"id":"vpc-1","name":"main","cidr_block":"10.0.0.0/16"}"#)
        .create_async()
        .await;

    let vpc = client(&server.url()).vpcs().get("vpc-1").await.unwrap();
    assert_eq!(vpc.name, "main");
    assert!(vpc.description.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn get_is_retried_after_server_errors() {
    let mut server = Server::new_async().await;
    let unavailable = server
        .mock("GET", "/v1/vpcs/vpc-1")
        .with_status(503)
        .expect(1)
        .create_async()
        .await;
    let ok = server
        .mock("GET", "/v1/vpcs/vpc-1")
        .with_body(r#"{"data":{"id":"vpc-1","name":"main","cidr_block":"10.0.0.0/16"}}"#)
        .expect(1)
        .create_async()
        .await;

    let vpc = client(&server.url()).vpcs().get("vpc-1").await.unwrap();

    unavailable.assert_async().await;
    ok.assert_async().await;
    assert_eq!(vpc.id, "vpc-1");
}

#[tokio::test(flavor = "multi_thread")]
async fn mutations_are_sent_once() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/vpcs")
        .match_body(Matcher::Json(serde_json::json!({
            "name": "main",
            "cidr_block": "10.0.0.0/16"
        })))
        .with_status(503)
        .expect(1)
        .create_async()
        .await;

    let result = client(&server.url())
        .vpcs()
        .create(&CreateVpcRequest {
            name: "main".to_string(),
            cidr_block: "10.0.0.0/16".to_string(),
            description: None,
        })
        .await;

    mock.assert_async().await;
    assert!(matches!(result, Err(ApiError::ServiceUnavailable)));
}

#[tokio::test(flavor = "multi_thread")]
async fn not_found_names_the_missing_object() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/v1/volumes/vol-9")
        .with_status(404)
        .create_async()
        .await;

    let err = client(&server.url()).volumes().get("vol-9").await.unwrap_err();

    assert!(err.is_not_found());
    let message = err.to_string();
    assert!(message.contains("volume"), "{}", message);
    assert!(message.contains("vol-9"), "{}", message);
}

#[tokio::test(flavor = "multi_thread")]
async fn error_bodies_are_decoded() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/v1/routers/r-1")
        .with_status(400)
        .with_body(r#"{"error":{"code":"InvalidRequest","message":"bad router"}}"#)
        .create_async()
        .await;

    let err = client(&server.url()).routers().get("r-1").await.unwrap_err();

    match err {
        ApiError::Api { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "InvalidRequest: bad router");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}
