//! A normalized cache exchange for `hermes`.
//!
//! Results are flattened into entities keyed by typename and key fields, so every entity is
//! stored once and every query selecting it sees the same data. Types without an `id` can
//! declare their own key fields, and mutations on fields that have a local resolver run
//! against the cache alone.
//!
//! ```
//! # tokio_test::block_on(async {
//! use hermes::{Client, Document, ResultSource, Variables};
//! use hermes_normalized_cache::{NormalizedCacheExchange, NormalizedCacheOptions, QueryStore};
//! use hermes_test::fake::StaticFetchExchange;
//! use serde_json::json;
//!
//! let options = NormalizedCacheOptions::new().with_key_fields("Label", vec!["name"]);
//! let store = QueryStore::new(options);
//! let client = Client::builder("http://localhost:4000/graphql")
//!     .with_exchange(StaticFetchExchange::new(json!({
//!         "labels": [{ "__typename": "Label", "name": "scifi" }]
//!     })))
//!     .with_exchange(NormalizedCacheExchange::new().with_store(store.clone()))
//!     .build();
//!
//! let document = Document::parse("{ labels { name } }").unwrap();
//! client.execute(&document, Variables::new()).await.unwrap();
//! assert!(store.contains(r#"Label:{"name":"scifi"}"#));
//!
//! let cached = client.execute(&document, Variables::new()).await.unwrap();
//! assert_eq!(cached.debug_info.unwrap().source, ResultSource::Cache);
//! # });
//! ```

#[macro_use]
extern crate async_trait;

mod cache_exchange;
mod error;
mod resolvers;
mod store;
mod types;

pub use cache_exchange::{NormalizedCacheExchange, NormalizedCacheImpl};
pub use error::{BoxError, CacheError};
pub use resolvers::{LocalResolver, LocalResolvers};
pub use store::{is_root, Link, QueryStore, SerializedData, Store};
pub use types::NormalizedCacheOptions;
