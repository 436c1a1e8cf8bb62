mod common;

use common::{configured_host, get_string, object, string};
use mockito::{Matcher, Server};
use tfplug::types::{AttributePath, Dynamic};

const IMAGES: &str = r#"{"data":[
    {"id":"img-1","name":"debian-12","os":"linux","version":"12.5"},
    {"id":"img-2","name":"debian-12","os":"bsd"}
]}"#;

#[tokio::test(flavor = "multi_thread")]
async fn image_lookup_narrowed_by_os() {
    let mut server = Server::new_async().await;
    let _images = server
        .mock("GET", "/v1/images")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("name".into(), "debian-12".into()),
            Matcher::UrlEncoded("os".into(), "linux".into()),
        ]))
        .with_body(IMAGES)
        .create_async()
        .await;

    let host = configured_host(&server).await;
    let response = host
        .read_data_source(
            "nimbus_image",
            object(&[("name", string("debian-12")), ("os", string("linux"))]),
        )
        .await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    assert_eq!(get_string(&response.state, "id"), "img-1");
    assert_eq!(get_string(&response.state, "version"), "12.5");
    assert_eq!(
        response.state.get(&AttributePath::new("min_disk_gb")),
        Some(&Dynamic::Null)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn ambiguous_image_lookup_is_an_error() {
    let mut server = Server::new_async().await;
    let _images = server
        .mock("GET", "/v1/images")
        .match_query(Matcher::UrlEncoded("name".into(), "debian-12".into()))
        .with_body(IMAGES)
        .create_async()
        .await;

    let host = configured_host(&server).await;
    let response = host
        .read_data_source("nimbus_image", object(&[("name", string("debian-12"))]))
        .await;

    assert_eq!(response.diagnostics.len(), 1);
    assert_eq!(response.diagnostics[0].summary, "Multiple images found");
    assert!(response.state.is_null());
}

#[tokio::test(flavor = "multi_thread")]
async fn vpc_lookup_by_name_ignores_partial_matches() {
    let mut server = Server::new_async().await;
    let _vpcs = server
        .mock("GET", "/v1/vpcs")
        .match_query(Matcher::UrlEncoded("name".into(), "main".into()))
        .with_body(
            r#"{"data":[
                {"id":"vpc-1","name":"main","cidr_block":"10.0.0.0/16"},
                {"id":"vpc-2","name":"main-old","cidr_block":"10.1.0.0/16"}
            ]}"#,
        )
        .create_async()
        .await;

    let host = configured_host(&server).await;
    let response = host
        .read_data_source("nimbus_vpc", object(&[("name", string("main"))]))
        .await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    assert_eq!(get_string(&response.state, "id"), "vpc-1");
    assert_eq!(get_string(&response.state, "cidr_block"), "10.0.0.0/16");
}

#[tokio::test(flavor = "multi_thread")]
async fn network_lookup_without_match_is_an_error() {
    let mut server = Server::new_async().await;
    let _networks = server
        .mock("GET", "/v1/networks")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("vpc_id".into(), "vpc-1".into()),
            Matcher::UrlEncoded("name".into(), "app".into()),
        ]))
        .with_body(r#"{"data":[]}"#)
        .create_async()
        .await;

    let host = configured_host(&server).await;
    let response = host
        .read_data_source(
            "nimbus_network",
            object(&[("name", string("app")), ("vpc_id", string("vpc-1"))]),
        )
        .await;

    assert_eq!(response.diagnostics.len(), 1);
    assert_eq!(response.diagnostics[0].summary, "No network found");
    assert!(response.diagnostics[0].detail.contains("in VPC vpc-1"));
}

#[tokio::test(flavor = "multi_thread")]
async fn flavor_lookup_by_minimum_size() {
    let mut server = Server::new_async().await;
    let _flavors = server
        .mock("GET", "/v1/flavors")
        .with_body(
            r#"{"data":[
                {"id":"fl-3","name":"large","vcpus":8,"memory_mb":16384,"disk_gb":80},
                {"id":"fl-1","name":"small","vcpus":1,"memory_mb":2048,"disk_gb":20},
                {"id":"fl-2","name":"medium","vcpus":2,"memory_mb":4096,"disk_gb":40}
            ]}"#,
        )
        .create_async()
        .await;

    let host = configured_host(&server).await;
    let response = host
        .read_data_source(
            "nimbus_flavor",
            object(&[("min_vcpus", Dynamic::Number(2.0))]),
        )
        .await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    assert_eq!(get_string(&response.state, "name"), "medium");
    assert_eq!(
        response.state.get(&AttributePath::new("memory_mb")),
        Some(&Dynamic::Number(4096.0))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn conflicting_lookup_fails_validation() {
    let server = Server::new_async().await;
    let host = configured_host(&server).await;

    let diagnostics = host
        .validate_data_source_config(
            "nimbus_vpc",
            object(&[("id", string("vpc-1")), ("name", string("main"))]),
        )
        .await;

    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].summary, "Conflicting lookup");
}
