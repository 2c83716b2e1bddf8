//! A GraphQL client with common built-in features
//! as well as the ability to extend its functionality through exchanges
//!
//! # Getting Started
//!
//! Documents are parsed once, at runtime, and can be kept around for the lifetime of the
//! process. A client is built from a chain of exchanges and passed by handle to everything
//! that needs it. There is no global client.
//!
//! ```
//! # tokio_test::block_on(async {
//! use hermes::{Client, Document, Variables};
//! use hermes_test::fake::StaticFetchExchange;
//! use serde_json::json;
//!
//! let client = Client::builder("http://localhost:4000/graphql")
//!     .with_exchange(StaticFetchExchange::new(json!({
//!         "books": [{ "__typename": "Book", "id": 1, "title": "Dune" }]
//!     })))
//!     .build();
//!
//! let document = Document::parse("query GetAllBooks { books { id title } }").unwrap();
//! let result = client.execute(&document, Variables::new()).await.unwrap();
//! assert_eq!(result.data.unwrap()["books"][0]["title"], "Dune");
//! # });
//! ```
//!
//! For more info see the relevant method and struct documentation.
//!
//! # Documents
//!
//! A [`Document`](./struct.Document.html) is an immutable, parsed operation. Fragment spreads
//! are inlined, `__typename` is requested on every nested selection set, and the printed
//! version of the augmented document is what gets sent to a server. The abstract selection
//! tree (`FieldSelector`) is what caches use to normalize and reassemble results.
//!
//! # Exchanges
//!
//! Exchanges are like a bi-directional middleware.
//! They act on both the incoming and outgoing queries,
//! passing them on if they can't return a result themselves.
//!
//! The default exchanges, called in this order, are:
//!
//! ## DedupExchange
//!
//! The deduplication exchange (`DedupExchange`) filters out unnecessary queries
//! by combining multiple identical queries into one. It does so by keeping track
//! of in-flight queries and, instead of firing off another identical query,
//! waiting for their results instead.
//!
//! ## FetchExchange
//!
//! The fetch exchange will serialize the query, send it over the network and deserialize the
//! response using `reqwest`. This should be your last exchange in the chain, as it never
//! forwards a query.
//!
//! ## SplitExchange
//!
//! Not part of the defaults. The split exchange sends operations that match a predicate
//! (subscriptions, by default) to a dedicated exchange such as a WebSocket transport, and
//! everything else down the rest of the chain.
//!
//! For a normalized cache with custom entity keys and local resolvers
//! see the `hermes-normalized-cache` crate.
//!
//! # Features
//!
//! * `default-exchanges` **(default)** - Include the fetch exchange and the related builder method

#[macro_use]
extern crate async_trait;

use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, fmt::Display};

pub mod client;
mod config;
pub mod default_exchanges;
mod document;
mod error;
pub(crate) mod types;
pub mod utils;

pub use client::{Client, ClientBuilder};
pub use config::{ClientConfig, ConfigError, ServiceConfig};
pub use document::{Document, DocumentError, Field, FieldSelector, InputValue, VariableDefinition};
pub use error::QueryError;
pub use types::{DebugInfo, HeaderPair, QueryOptions, RequestPolicy, ResultSource, Variables};

/// Types used by custom exchanges. Regular users probably don't need these.
pub mod exchange {
    pub use crate::types::{
        Exchange, ExchangeFactory, ExchangeResult, Operation, OperationMeta, OperationOptions,
        OperationResult, OperationType
    };
}

/// The form in which queries are sent over HTTP in most implementations.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct QueryBody {
    /// The values for the variables. They must match those declared in the query.
    pub variables: Variables,
    /// The printed GraphQL document, as a string.
    pub query: String,
    /// The GraphQL operation name, if the operation has one.
    #[serde(rename = "operationName", skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>
}

/// The generic shape taken by the responses of GraphQL APIs.
///
/// [Spec](https://github.com/facebook/graphql/blob/master/spec/Section%207%20--%20Response.md)
///
/// ```
/// # use serde_json::json;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use hermes::Response;
///
/// let body: Response = serde_json::from_value(json!({
///     "data": {
///         "books": [{"id": 13}],
///     },
///     "errors": [],
/// }))?;
///
/// let expected = Response {
///     data: Some(json!({ "books": [{"id": 13}] })),
///     errors: Some(vec![]),
///     debug_info: None
/// };
///
/// assert_eq!(body, expected);
///
/// #     Ok(())
/// # }
/// ```
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Response {
    /// Where the result came from. Never sent by servers.
    #[serde(skip_deserializing, rename = "debugInfo")]
    pub debug_info: Option<DebugInfo>,
    /// The absent, partial or complete response data.
    pub data: Option<serde_json::Value>,
    /// The top-level errors returned by the server.
    pub errors: Option<Vec<Error>>
}

/// An element in the top-level `errors` array of a response body.
///
/// This tries to be as close to the GraphQL response format as possible.
///
/// [Spec](https://github.com/facebook/graphql/blob/master/spec/Section%207%20--%20Response.md)
///
/// ```
/// # use serde_json::json;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use hermes::*;
///
/// let body: Response = serde_json::from_value(json!({
///     "data": null,
///     "errors": [
///         {
///             "message": "The server crashed. Sorry.",
///             "locations": [{ "line": 1, "column": 1 }]
///         },
///         {
///             "message": "Seismic activity detected",
///             "path": ["underground", 20]
///         },
///      ],
/// }))?;
///
/// let errors = body.errors.unwrap();
/// assert_eq!(errors[0].locations, Some(vec![Location { line: 1, column: 1 }]));
/// assert_eq!(
///     errors[1].path,
///     Some(vec![PathFragment::Key("underground".into()), PathFragment::Index(20)])
/// );
/// assert_eq!(errors[1].to_string(), "underground/20:0:0: Seismic activity detected");
///
/// #     Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Error {
    /// The human-readable error message. This is the only required field.
    pub message: String,
    /// Which locations in the query the error applies to.
    pub locations: Option<Vec<Location>>,
    /// Which path in the query the error applies to, e.g. `["users", 0, "email"]`.
    pub path: Option<Vec<PathFragment>>,
    /// Additional errors. Their exact format is defined by the server.
    pub extensions: Option<HashMap<String, serde_json::Value>>
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Use `/` as a separator like JSON Pointer.
        let path = self
            .path
            .as_ref()
            .map(|fragments| {
                fragments
                    .iter()
                    .map(|fragment| fragment.to_string())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .unwrap_or_else(|| "<query>".to_string());

        // Get the location of the error. We'll use just the first location for this.
        let loc = self
            .locations
            .as_ref()
            .and_then(|locations| locations.iter().next())
            .cloned()
            .unwrap_or_default();

        write!(f, "{}:{}:{}: {}", path, loc.line, loc.column, self.message)
    }
}

/// Part of a path in a query. It can be an object key or an array index. See [Error](./struct.Error.html).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PathFragment {
    /// A key inside an object
    Key(String),
    /// An index inside an array
    Index(i32)
}

/// Represents a location inside a query string. Used in errors. See [Error](./struct.Error.html).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Location {
    /// The line number in the query string where the error originated (starting from 1).
    pub line: i32,
    /// The column number in the query string where the error originated (starting from 1).
    pub column: i32
}

impl Display for PathFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            PathFragment::Key(ref key) => write!(f, "{}", key),
            PathFragment::Index(ref idx) => write!(f, "{}", idx)
        }
    }
}
