//! Wires up the bookshelf client: HTTP for queries and mutations, a dedicated exchange for
//! subscriptions, labels keyed by name, and a `favorite` mutation that only exists locally.
//!
//! Run with `RUST_LOG=debug cargo run --example bookshelf --features default-exchanges`.
//! Nothing here needs a running server.

use async_trait::async_trait;
use hermes::{
    default_exchanges::{FetchExchange, SplitExchange},
    exchange::{Exchange, ExchangeResult, Operation},
    ClientBuilder, ClientConfig, Document, Variables
};
use hermes_normalized_cache::{
    LocalResolver, LocalResolvers, NormalizedCacheExchange, NormalizedCacheOptions, QueryStore
};
use serde_json::json;
use std::error::Error;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

const FAVORITE_BOOKS: &str = r#"
query FavoriteBooks {
  favoriteBooks @client { id title rating }
}"#;

const FAVORITE: &str = r#"
mutation Favorite($book: BookInput!) {
  favorite(book: $book) @client { id title rating }
}"#;

#[derive(Debug, Error)]
#[error("no websocket transport configured for {0}")]
struct NoWebSocket(String);

/// Stands in for a WebSocket transport.
struct Subscriptions {
    url: String
}

#[async_trait]
impl Exchange for Subscriptions {
    async fn run(&self, operation: Operation) -> ExchangeResult {
        tracing::warn!(key = operation.key, url = %self.url, "dropping subscription");
        Err(NoWebSocket(self.url.clone()).into())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ClientConfig::from_yaml_str(include_str!("bookshelf.yml"))?;
    let favorite_books = Document::parse(FAVORITE_BOOKS)?;
    let favorite = Document::parse(FAVORITE)?;

    let options = NormalizedCacheOptions::new().with_key_fields("Label", vec!["name"]);
    let store = QueryStore::new(options);
    store.write_query(
        &favorite_books,
        &Variables::new(),
        &json!({
            "favoriteBooks": [
                { "__typename": "Book", "id": 123, "title": "Dune", "rating": 5 }
            ]
        })
    )?;

    let resolvers = LocalResolvers::new();
    let favorites = favorite_books.clone();
    resolvers.register(
        "favorite",
        LocalResolver::new(move |previous, arguments, store| {
            let mut books = previous
                .and_then(|data| data["favoriteBooks"].as_array().cloned())
                .unwrap_or_default();
            books.push(arguments["book"].clone());

            let data = json!({ "favoriteBooks": books });
            store.write_query(&favorites, &Variables::new(), &data)?;
            Ok(data["favoriteBooks"].clone())
        })
        .reading(favorite_books.clone())
    )?;

    let subscriptions = Subscriptions {
        url: config.subscriptions_url.clone().unwrap_or_default()
    };
    let client = ClientBuilder::from_config(&config)
        .with_exchange(FetchExchange)
        .with_exchange(SplitExchange::new(subscriptions))
        .with_exchange(
            NormalizedCacheExchange::new()
                .with_store(store.clone())
                .with_resolvers(resolvers)
        )
        .build();

    for (id, title) in [(7, "Emma"), (8, "Persuasion")].iter() {
        let book = json!({ "__typename": "Book", "id": id, "title": title, "rating": 4 });
        let mut variables = Variables::new();
        variables.insert("book".to_string(), book);
        client
            .execute(&favorite, variables)
            .await
            .map_err(|e| e.compat())?;
    }

    let result = client
        .execute(&favorite_books, Variables::new())
        .await
        .map_err(|e| e.compat())?;
    let favorites = result.data.unwrap_or_default();
    tracing::info!(service = %config.service.name, %favorites, "done");
    println!("{}", serde_json::to_string_pretty(&store.extract())?);

    Ok(())
}
