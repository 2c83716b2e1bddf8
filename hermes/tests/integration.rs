use hermes::{
    default_exchanges::{FetchError, SplitExchange},
    Client, ClientBuilder, ClientConfig, ConfigError, HeaderPair, QueryOptions, RequestPolicy,
    ResultSource, Variables
};
use hermes_test::{
    fake::{FailingFetchExchange, NetworkDown, StaticFetchExchange},
    ALL_BOOKS, BOOK_ADDED, FAVORITE_BOOKS
};
use serde_json::json;
use std::io::Write;

const CONFIG: &str = r#"
service:
  name: bookshelf
  url: http://localhost:4000/graphql
subscriptions_url: ws://localhost:4000/graphql
request_policy: NetworkOnly
"#;

#[tokio::test]
async fn builds_operations_from_config() {
    let config = ClientConfig::from_yaml_str(CONFIG).unwrap();
    let fetch = StaticFetchExchange::new(json!({ "books": [] }));
    let client = ClientBuilder::from_config(&config)
        .with_exchange(fetch.clone())
        .build();

    client.execute(&ALL_BOOKS, Variables::new()).await.unwrap();

    let operation = fetch.last_operation().unwrap();
    assert_eq!(operation.options.url, "http://localhost:4000/graphql");
    assert_eq!(operation.options.request_policy, RequestPolicy::NetworkOnly);
    assert_eq!(operation.query.operation_name.as_deref(), Some("GetAllBooks"));
    assert!(operation.query.query.contains("__typename"));
}

#[test]
fn config_files_are_validated() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(CONFIG.replace("ws://", "http://").as_bytes())
        .unwrap();

    let err = ClientConfig::from_yaml_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidUrl { expected: "websocket", .. }));
    assert!(matches!(
        ClientConfig::from_yaml_file("does/not/exist.yml"),
        Err(ConfigError::Io(_))
    ));
}

#[tokio::test]
async fn per_query_options_override_defaults() {
    let fetch = StaticFetchExchange::new(json!({ "books": [] }));
    let client = Client::builder("http://localhost:4000/graphql")
        .with_extra_headers(|| vec![HeaderPair("X-Shelf".to_string(), "a".to_string())])
        .with_exchange(fetch.clone())
        .build();

    let options = QueryOptions {
        url: Some("http://localhost:5000/graphql".to_string()),
        request_policy: Some(RequestPolicy::NetworkOnly),
        ..QueryOptions::default()
    };
    client
        .execute_with_options(&ALL_BOOKS, Variables::new(), options)
        .await
        .unwrap();

    let operation = fetch.last_operation().unwrap();
    assert_eq!(operation.options.url, "http://localhost:5000/graphql");
    assert_eq!(operation.options.request_policy, RequestPolicy::NetworkOnly);
    let headers = operation.options.extra_headers.map(|headers| headers());
    assert_eq!(
        headers,
        Some(vec![HeaderPair("X-Shelf".to_string(), "a".to_string())])
    );
}

#[tokio::test]
async fn client_only_documents_are_cache_only() {
    let fetch = StaticFetchExchange::new(json!({ "favoriteBooks": [] }));
    let client = Client::builder("http://localhost:4000/graphql")
        .with_exchange(fetch.clone())
        .build();

    client
        .execute(&FAVORITE_BOOKS, Variables::new())
        .await
        .unwrap();

    let operation = fetch.last_operation().unwrap();
    assert_eq!(operation.options.request_policy, RequestPolicy::CacheOnly);
}

#[tokio::test]
async fn subscriptions_take_the_dedicated_exchange() {
    let http = StaticFetchExchange::new(json!({ "books": [] }));
    let ws = StaticFetchExchange::new(json!({ "bookAdded": null }));
    let client = Client::builder("http://localhost:4000/graphql")
        .with_exchange(http.clone())
        .with_exchange(SplitExchange::new(ws.clone()))
        .build();

    client.execute(&ALL_BOOKS, Variables::new()).await.unwrap();
    let added = client
        .execute(&BOOK_ADDED, Variables::new())
        .await
        .unwrap();

    assert_eq!(added.data, Some(json!({ "bookAdded": null })));
    assert_eq!(http.calls(), 1);
    assert_eq!(ws.calls(), 1);
}

#[tokio::test]
async fn transport_errors_reach_the_caller() {
    let fetch = FailingFetchExchange::new();
    let client = Client::builder("http://localhost:4000/graphql")
        .with_exchange(fetch.clone())
        .build();

    let err = client
        .execute(&ALL_BOOKS, Variables::new())
        .await
        .unwrap_err();

    assert!(err.is::<NetworkDown>());
    assert_eq!(err.to_string(), "network is down");
    assert_eq!(fetch.calls(), 1);
}

#[tokio::test]
async fn unreachable_servers_are_network_errors() {
    let client = Client::builder("http://127.0.0.1:9/graphql")
        .with_default_exchanges()
        .build();

    let err = client
        .execute(&ALL_BOOKS, Variables::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<FetchError>(),
        Some(FetchError::NetworkError(_))
    ));
}

#[tokio::test]
async fn network_results_are_marked() {
    let client = Client::builder("http://localhost:4000/graphql")
        .with_exchange(StaticFetchExchange::new(json!({ "books": [] })))
        .build();

    let result = client.execute(&ALL_BOOKS, Variables::new()).await.unwrap();

    assert_eq!(result.debug_info.unwrap().source, ResultSource::Network);
    assert_eq!(result.data, Some(json!({ "books": [] })));
}
