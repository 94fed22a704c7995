//! Normalizer, compiler and aggregator working together

mod common;

use std::sync::Arc;
use std::time::Duration;

use flowgate::compiler::{aggregate, compile, CompilerOptions, ListenerSettings};
use flowgate::domain::{HttpMethod, Label};
use flowgate::openapi::normalize;
use flowgate::xds::{PublishSet, SnapshotCache};
use flowgate::Error;

use common::{orders_swagger_json, petstore_yaml};

#[tokio::test]
async fn petstore_end_to_end() {
    let descriptor = normalize(petstore_yaml(&[]).as_bytes()).unwrap();
    let compiled = compile(&descriptor, &CompilerOptions::default()).unwrap();

    assert_eq!(compiled.clusters.len(), 1);
    assert_eq!(compiled.clusters[0].name, "cluster_production_pets_v1");
    assert_eq!(compiled.clusters[0].endpoints[0].host, "petstore");
    assert_eq!(compiled.clusters[0].endpoints[0].port, 8080);

    assert_eq!(compiled.routes.len(), 1);
    let route = &compiled.routes[0];
    assert_eq!(route.method, HttpMethod::Get);
    assert_eq!(route.path_template, "/pets/{id}");
    assert_eq!(route.cluster, "cluster_production_pets_v1");
    assert_eq!(route.timeout, Duration::from_secs(60));

    let (listener, route_config) = aggregate(compiled.routes.clone(), &ListenerSettings::default());
    assert_eq!(route_config.virtual_host.routes.len(), 1);
    assert_eq!(route_config.routes().len(), 1);
    assert_eq!(listener.route_config_name, route_config.name);

    let cache = SnapshotCache::new();
    let label = Label::default_label();
    assert_eq!(cache.snapshot(&label).version, 0);

    let snapshot = cache
        .publish(
            &label,
            PublishSet {
                listeners: vec![listener],
                route_configurations: vec![route_config],
                clusters: compiled.clusters.clone(),
                endpoints: compiled.endpoints.clone(),
            },
        )
        .await;

    assert_eq!(snapshot.version, 1);
    assert_eq!(snapshot.listeners.len(), 1);
    assert_eq!(snapshot.clusters.len(), 1);
    assert_eq!(snapshot.route_count(), 1);
}

#[test]
fn compilation_is_idempotent_across_formats() {
    let yaml = normalize(petstore_yaml(&["edge"]).as_bytes()).unwrap();
    let json_value: serde_json::Value = serde_yaml::from_str(&petstore_yaml(&["edge"])).unwrap();
    let json = normalize(serde_json::to_string(&json_value).unwrap().as_bytes()).unwrap();

    let options = CompilerOptions::default();
    let first = compile(&yaml, &options).unwrap();
    let second = compile(&json, &options).unwrap();

    assert_eq!(first, second);
    assert_eq!(
        first.routes.iter().map(|r| &r.name).collect::<Vec<_>>(),
        second.routes.iter().map(|r| &r.name).collect::<Vec<_>>()
    );
}

#[test]
fn swagger_host_defaults_become_tls_cluster() {
    let descriptor = normalize(orders_swagger_json().as_bytes()).unwrap();
    assert!(descriptor.labels.contains(&Label::parse("edge").unwrap()));
    assert!(!descriptor.labels.contains(&Label::default_label()));

    let compiled = compile(&descriptor, &CompilerOptions::default()).unwrap();
    assert_eq!(compiled.clusters.len(), 1);

    let cluster = &compiled.clusters[0];
    assert!(cluster.tls);
    assert_eq!(cluster.sni.as_deref(), Some("orders.internal"));
    assert_eq!(cluster.endpoints[0].port, 443);

    let methods: Vec<_> = compiled.routes.iter().map(|r| r.method).collect();
    assert_eq!(methods, vec![HttpMethod::Get, HttpMethod::Post, HttpMethod::Delete]);
    assert!(compiled.routes.iter().all(|r| r.path_template.starts_with("/orders/items")));
    assert!(compiled.routes.iter().all(|r| r.host_rewrite.as_deref() == Some("orders.internal")));
}

#[test]
fn aggregation_replaces_route_table() {
    let descriptor = normalize(petstore_yaml(&[]).as_bytes()).unwrap();
    let compiled = compile(&descriptor, &CompilerOptions::default()).unwrap();

    let (_, mut route_config) = aggregate(compiled.routes.clone(), &ListenerSettings::default());
    assert_eq!(route_config.routes().len(), 1);

    route_config.replace(Vec::new());
    assert!(route_config.routes().is_empty());
    assert!(route_config.referenced_clusters().is_empty());
}

#[test]
fn malformed_documents_are_input_errors() {
    for raw in [
        "openapi: [unterminated",
        r#"{"swagger": "1.2", "info": {"title": "x", "version": "1"}}"#,
        r#"{"openapi": "3.0.0", "info": {"title": "", "version": "1"}, "paths": {}}"#,
        r#"{"openapi": "3.0.0", "info": {"title": "x", "version": "1"}, "x-gateway-labels": 7, "paths": {}}"#,
    ] {
        let err = normalize(raw.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::InputFormat { .. }), "{raw}: {err}");
    }
}

#[test]
fn shared_cache_is_usable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Arc<SnapshotCache>>();
}
