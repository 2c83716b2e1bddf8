use crate::{
    CacheError, LocalResolver, LocalResolvers, NormalizedCacheExchange, NormalizedCacheOptions,
    QueryStore
};
use hermes::{
    exchange::{Exchange, ExchangeFactory, ExchangeResult, Operation, OperationResult},
    Client, DebugInfo, Document, Error, QueryOptions, RequestPolicy, Response, ResultSource,
    Variables
};
use hermes_test::{
    fake::{FailingFetchExchange, NetworkDown, StaticFetchExchange},
    ADD_BOOK, ALL_BOOKS, BOOK, BOOK_ADDED, FAVORITE, FAVORITE_BOOKS, SHELVES
};
use serde_json::{json, Value};

const URL: &str = "http://localhost:4000/graphql";

fn variables(value: Value) -> Variables {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {}", other)
    }
}

fn options(request_policy: RequestPolicy) -> QueryOptions {
    QueryOptions {
        request_policy: Some(request_policy),
        ..QueryOptions::default()
    }
}

fn book(id: u32, title: &str, rating: u32) -> Value {
    json!({ "__typename": "Book", "id": id, "title": title, "rating": rating })
}

/// Appends the `book` argument to the cached favorites and returns the new list.
fn favorite_resolver() -> LocalResolver {
    LocalResolver::new(|previous, arguments, store| {
        let mut books = previous
            .and_then(|data| data["favoriteBooks"].as_array().cloned())
            .unwrap_or_default();
        books.push(arguments["book"].clone());

        let data = json!({ "favoriteBooks": books });
        store.write_query(&FAVORITE_BOOKS, &Variables::new(), &data)?;
        Ok(data["favoriteBooks"].clone())
    })
    .reading(FAVORITE_BOOKS.clone())
}

fn seeded_store() -> QueryStore {
    let store = QueryStore::default();
    store
        .write_query(
            &FAVORITE_BOOKS,
            &Variables::new(),
            &json!({ "favoriteBooks": [book(123, "Dune", 5)] })
        )
        .unwrap();
    store
}

#[tokio::test]
async fn cache_first_answers_from_the_cache() {
    let fetch = StaticFetchExchange::new(json!({ "book": book(1, "Dune", 5) }));
    let client = Client::builder(URL)
        .with_exchange(fetch.clone())
        .with_exchange(NormalizedCacheExchange::new())
        .build();
    let variables = variables(json!({ "id": 1 }));

    let first = client.execute(&BOOK, variables.clone()).await.unwrap();
    let second = client.execute(&BOOK, variables).await.unwrap();

    assert_eq!(first.debug_info.unwrap().source, ResultSource::Network);
    assert_eq!(second.debug_info.unwrap().source, ResultSource::Cache);
    assert_eq!(first.data, second.data);
    assert_eq!(fetch.calls(), 1);
}

#[tokio::test]
async fn network_only_always_fetches() {
    let fetch = StaticFetchExchange::new(json!({ "book": book(1, "Dune", 5) }));
    let client = Client::builder(URL)
        .with_exchange(fetch.clone())
        .with_exchange(NormalizedCacheExchange::new())
        .build();
    let variables = variables(json!({ "id": 1 }));

    for _ in 0..2 {
        let result = client
            .execute_with_options(&BOOK, variables.clone(), options(RequestPolicy::NetworkOnly))
            .await
            .unwrap();
        assert_eq!(result.debug_info.unwrap().source, ResultSource::Network);
    }
    assert_eq!(fetch.calls(), 2);
}

#[tokio::test]
async fn cache_only_misses_are_errors() {
    let fetch = FailingFetchExchange::new();
    let client = Client::builder(URL)
        .with_exchange(fetch.clone())
        .with_exchange(NormalizedCacheExchange::new())
        .build();

    let err = client
        .execute_with_options(
            &BOOK,
            variables(json!({ "id": 1 })),
            options(RequestPolicy::CacheOnly)
        )
        .await
        .unwrap_err();

    let err = err.downcast_ref::<CacheError>().unwrap();
    assert!(matches!(err, CacheError::MissingEntity { key } if key == "Query"));
    assert_eq!(fetch.calls(), 0);
}

#[tokio::test]
async fn transport_errors_pass_through() {
    let client = Client::builder(URL)
        .with_exchange(FailingFetchExchange::new())
        .with_exchange(NormalizedCacheExchange::new())
        .build();

    let err = client
        .execute(&ALL_BOOKS, Variables::new())
        .await
        .unwrap_err();
    assert_eq!(err.downcast_ref::<NetworkDown>(), Some(&NetworkDown));
}

#[tokio::test]
async fn results_are_read_back_from_the_store() {
    let store = QueryStore::default();
    store
        .write_query(
            &ALL_BOOKS,
            &Variables::new(),
            &json!({
                "books": [{
                    "__typename": "Book",
                    "id": 1,
                    "title": "Dune",
                    "description": null,
                    "rating": 4,
                    "author": "Frank Herbert",
                    "year": 1965
                }]
            })
        )
        .unwrap();
    let fetch = StaticFetchExchange::new(json!({ "addBook": book(1, "Dune (revised)", 5) }));
    let client = Client::builder(URL)
        .with_exchange(fetch.clone())
        .with_exchange(NormalizedCacheExchange::new().with_store(store.clone()))
        .build();

    let added = client
        .execute(&ADD_BOOK, variables(json!({ "title": "Dune (revised)" })))
        .await
        .unwrap();
    assert_eq!(added.data.unwrap()["addBook"], book(1, "Dune (revised)", 5));

    let books = client.execute(&ALL_BOOKS, Variables::new()).await.unwrap();
    assert_eq!(books.debug_info.unwrap().source, ResultSource::Cache);
    let books = books.data.unwrap();
    assert_eq!(books["books"][0]["title"], json!("Dune (revised)"));
    assert_eq!(books["books"][0]["year"], json!(1965));
    assert_eq!(fetch.calls(), 1);
}

#[tokio::test]
async fn labels_stay_apart_with_a_name_policy() {
    let fetch = StaticFetchExchange::new(json!({
        "shelves": [
            {
                "__typename": "Shelf",
                "id": "a",
                "name": "Shelf A",
                "labels": [{ "__typename": "Label", "id": 1, "name": "test1" }]
            },
            {
                "__typename": "Shelf",
                "id": "b",
                "name": "Shelf B",
                "labels": [{ "__typename": "Label", "id": 1, "name": "test2" }]
            }
        ]
    }));
    let options = NormalizedCacheOptions::new().with_key_fields("Label", vec!["name"]);
    let store = QueryStore::new(options);
    let client = Client::builder(URL)
        .with_exchange(fetch)
        .with_exchange(NormalizedCacheExchange::new().with_store(store.clone()))
        .build();

    let result = client.execute(&SHELVES, Variables::new()).await.unwrap();
    let data = result.data.unwrap();

    assert_eq!(data["shelves"][0]["labels"][0]["name"], json!("test1"));
    assert_eq!(data["shelves"][1]["labels"][0]["name"], json!("test2"));
    assert!(store.contains(r#"Label:{"name":"test1"}"#));
    assert!(store.contains(r#"Label:{"name":"test2"}"#));
}

#[tokio::test]
async fn local_mutations_never_hit_the_network() {
    let fetch = FailingFetchExchange::new();
    let store = seeded_store();
    let resolvers = LocalResolvers::new();
    resolvers.register("favorite", favorite_resolver()).unwrap();
    let client = Client::builder(URL)
        .with_exchange(fetch.clone())
        .with_exchange(
            NormalizedCacheExchange::new()
                .with_store(store.clone())
                .with_resolvers(resolvers)
        )
        .build();

    let first = client
        .execute(&FAVORITE, variables(json!({ "book": book(7, "Emma", 4) })))
        .await
        .unwrap();
    assert_eq!(first.debug_info.unwrap().source, ResultSource::Local);
    assert_eq!(
        first.data.unwrap()["favorite"],
        json!([book(123, "Dune", 5), book(7, "Emma", 4)])
    );

    client
        .execute(&FAVORITE, variables(json!({ "book": book(8, "Persuasion", 3) })))
        .await
        .unwrap();

    let favorites = store
        .read_query(&FAVORITE_BOOKS, &Variables::new())
        .unwrap();
    assert_eq!(
        favorites["favoriteBooks"],
        json!([book(123, "Dune", 5), book(7, "Emma", 4), book(8, "Persuasion", 3)])
    );

    let cached = client
        .execute(&FAVORITE_BOOKS, Variables::new())
        .await
        .unwrap();
    assert_eq!(cached.debug_info.unwrap().source, ResultSource::Cache);
    assert_eq!(cached.data.unwrap(), favorites);
    assert_eq!(fetch.calls(), 0);
}

#[tokio::test]
async fn concurrent_local_mutations_lose_nothing() {
    let store = seeded_store();
    let resolvers = LocalResolvers::new();
    resolvers.register("favorite", favorite_resolver()).unwrap();
    let client = Client::builder(URL)
        .with_exchange(FailingFetchExchange::new())
        .with_exchange(
            NormalizedCacheExchange::new()
                .with_store(store.clone())
                .with_resolvers(resolvers)
        )
        .build();

    let handles: Vec<_> = (0..8)
        .map(|id| {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .execute(&FAVORITE, variables(json!({ "book": book(id, "Emma", 4) })))
                    .await
                    .unwrap()
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let favorites = store
        .read_query(&FAVORITE_BOOKS, &Variables::new())
        .unwrap();
    assert_eq!(favorites["favoriteBooks"].as_array().unwrap().len(), 9);
}

#[test]
fn resolvers_cannot_be_registered_twice() {
    let resolvers = LocalResolvers::new();
    resolvers.register("favorite", favorite_resolver()).unwrap();

    let err = resolvers
        .register("favorite", favorite_resolver())
        .unwrap_err();
    assert!(matches!(err, CacheError::DuplicateResolver { ref field } if field == "favorite"));
}

#[tokio::test]
async fn resolver_failures_are_wrapped() {
    let resolvers = LocalResolvers::new();
    resolvers
        .register(
            "favorite",
            LocalResolver::new(|_, _, _| Err(NetworkDown.into()))
        )
        .unwrap();
    let store = seeded_store();
    let client = Client::builder(URL)
        .with_exchange(FailingFetchExchange::new())
        .with_exchange(
            NormalizedCacheExchange::new()
                .with_store(store.clone())
                .with_resolvers(resolvers)
        )
        .build();

    let err = client
        .execute(&FAVORITE, variables(json!({ "book": book(7, "Emma", 4) })))
        .await
        .unwrap_err();

    match err.downcast_ref::<CacheError>() {
        Some(CacheError::ResolverError { field, source }) => {
            assert_eq!(field, "favorite");
            assert!(source.downcast_ref::<NetworkDown>().is_some());
        }
        other => panic!("unexpected error: {:?}", other)
    }
    let favorites = store
        .read_query(&FAVORITE_BOOKS, &Variables::new())
        .unwrap();
    assert_eq!(favorites["favoriteBooks"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn client_fields_need_a_resolver() {
    let fetch = FailingFetchExchange::new();
    let client = Client::builder(URL)
        .with_exchange(fetch.clone())
        .with_exchange(NormalizedCacheExchange::new())
        .build();

    let err = client
        .execute(&FAVORITE, variables(json!({ "book": book(7, "Emma", 4) })))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<CacheError>(),
        Some(CacheError::UnknownResolver { field }) if field == "favorite"
    ));
    assert_eq!(fetch.calls(), 0);
}

#[tokio::test]
async fn mixed_mutations_are_rejected() {
    let resolvers = LocalResolvers::new();
    resolvers.register("favorite", favorite_resolver()).unwrap();
    let fetch = FailingFetchExchange::new();
    let client = Client::builder(URL)
        .with_exchange(fetch.clone())
        .with_exchange(NormalizedCacheExchange::new().with_resolvers(resolvers))
        .build();
    let mutation = Document::parse(
        r#"mutation {
            favorite(book: { id: 1 }) { id }
            addBook(title: "Emma") { id }
        }"#
    )
    .unwrap();

    let err = client
        .execute(&mutation, Variables::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<CacheError>(),
        Some(CacheError::PartiallyLocalMutation)
    ));
    assert_eq!(fetch.calls(), 0);
}

#[tokio::test]
async fn subscription_results_are_normalized() {
    let store = QueryStore::default();
    let fetch = StaticFetchExchange::new(json!({
        "bookAdded": { "__typename": "Book", "id": 42, "title": "Emma" }
    }));
    let client = Client::builder(URL)
        .with_exchange(fetch)
        .with_exchange(NormalizedCacheExchange::new().with_store(store.clone()))
        .build();

    let result = client
        .execute(&BOOK_ADDED, Variables::new())
        .await
        .unwrap();

    assert_eq!(result.data.unwrap()["bookAdded"]["title"], json!("Emma"));
    assert!(store.contains("Book:42"));
}

#[tokio::test]
async fn results_with_errors_are_not_cached() {
    struct PartialFetch;

    impl<TNext: Exchange> ExchangeFactory<TNext> for PartialFetch {
        type Output = PartialFetch;

        fn build(self, _next: TNext) -> PartialFetch {
            self
        }
    }

    #[async_trait]
    impl Exchange for PartialFetch {
        async fn run(&self, operation: Operation) -> ExchangeResult {
            Ok(OperationResult {
                key: operation.key,
                meta: operation.meta,
                response: Response {
                    debug_info: Some(DebugInfo {
                        source: ResultSource::Network,
                        did_dedup: false
                    }),
                    data: Some(json!({ "book": null })),
                    errors: Some(vec![Error {
                        message: "book is private".to_string(),
                        locations: None,
                        path: None,
                        extensions: None
                    }])
                }
            })
        }
    }

    let store = QueryStore::default();
    let client = Client::builder(URL)
        .with_exchange(PartialFetch)
        .with_exchange(NormalizedCacheExchange::new().with_store(store.clone()))
        .build();

    let result = client
        .execute(&BOOK, variables(json!({ "id": 1 })))
        .await
        .unwrap();

    assert_eq!(result.errors.unwrap()[0].message, "book is private");
    assert!(store.is_empty());
}

#[tokio::test]
async fn client_fields_stay_out_of_network_queries() {
    let document = Document::parse(
        r#"query BooksAndFavorites {
            books { id title }
            favoriteBooks @client { id title rating }
        }"#
    )
    .unwrap();
    let fetch = StaticFetchExchange::new(json!({ "books": [book(1, "Emma", 4)] }));
    let client = Client::builder(URL)
        .with_exchange(fetch.clone())
        .with_exchange(NormalizedCacheExchange::new().with_store(seeded_store()))
        .build();

    let result = client.execute(&document, Variables::new()).await.unwrap();

    let sent = fetch.last_operation().unwrap().query.query;
    assert!(sent.contains("books"));
    assert!(!sent.contains("favoriteBooks"));
    assert!(!sent.contains("@client"));

    let data = result.data.unwrap();
    assert_eq!(data["books"][0]["title"], json!("Emma"));
    assert_eq!(data["favoriteBooks"], json!([book(123, "Dune", 5)]));

    let cached = client.execute(&document, Variables::new()).await.unwrap();
    assert_eq!(cached.debug_info.unwrap().source, ResultSource::Cache);
    assert_eq!(fetch.calls(), 1);
}

#[tokio::test]
async fn uncached_client_fields_come_back_null() {
    let document = Document::parse(
        r#"query CountedBooks {
            books { id title }
            localCount @client
        }"#
    )
    .unwrap();
    let fetch = StaticFetchExchange::new(json!({ "books": [book(1, "Emma", 4)] }));
    let client = Client::builder(URL)
        .with_exchange(fetch.clone())
        .with_exchange(NormalizedCacheExchange::new())
        .build();

    let result = client.execute(&document, Variables::new()).await.unwrap();

    let data = result.data.unwrap();
    assert_eq!(data["books"][0]["title"], json!("Emma"));
    assert_eq!(data["localCount"], Value::Null);
    assert!(!fetch.last_operation().unwrap().query.query.contains("localCount"));
}

#[tokio::test]
async fn failed_local_mutations_roll_back() {
    let resolvers = LocalResolvers::new();
    resolvers.register("favorite", favorite_resolver()).unwrap();
    resolvers
        .register(
            "shareFavorites",
            LocalResolver::new(|_, _, _| Err(NetworkDown.into()))
        )
        .unwrap();
    let store = seeded_store();
    let before = store.extract();
    let client = Client::builder(URL)
        .with_exchange(FailingFetchExchange::new())
        .with_exchange(
            NormalizedCacheExchange::new()
                .with_store(store.clone())
                .with_resolvers(resolvers)
        )
        .build();
    let mutation = Document::parse(
        r#"mutation FavoriteAndShare($book: BookInput!) {
            favorite(book: $book) @client { id title rating }
            shareFavorites @client
        }"#
    )
    .unwrap();

    let err = client
        .execute(&mutation, variables(json!({ "book": book(7, "Emma", 4) })))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<CacheError>(),
        Some(CacheError::ResolverError { field, .. }) if field == "shareFavorites"
    ));
    assert_eq!(store.extract(), before);
    assert!(!store.contains("Book:7"));
}
