use crate::{Document, QueryBody, QueryError, Response};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

/// The variables passed along with an operation, keyed by variable name.
pub type Variables = serde_json::Map<String, serde_json::Value>;

pub type ExchangeResult = Result<OperationResult, QueryError>;

/// A link in the exchange chain.
///
/// An exchange either answers an operation itself or forwards it to the next exchange,
/// possibly acting on the result on the way back.
#[async_trait]
pub trait Exchange: Send + Sync + 'static {
    async fn run(&self, operation: Operation) -> ExchangeResult;
}

/// Builds an exchange around the rest of the chain.
pub trait ExchangeFactory<TNext: Exchange> {
    type Output: Exchange;

    fn build(self, next: TNext) -> Self::Output;
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum OperationType {
    Query,
    Mutation,
    Subscription
}

impl OperationType {
    /// The name of the root type for this kind of operation, which is also its cache key.
    pub fn to_str(&self) -> &'static str {
        match self {
            OperationType::Query => "Query",
            OperationType::Mutation => "Mutation",
            OperationType::Subscription => "Subscription"
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

/// How a cache should treat a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestPolicy {
    /// Answer from the cache if possible, otherwise ask the network.
    CacheFirst,
    /// Only ever answer from the cache. Misses are errors.
    CacheOnly,
    /// Always ask the network, but still write the result to the cache.
    NetworkOnly
}

impl Default for RequestPolicy {
    fn default() -> Self {
        RequestPolicy::CacheFirst
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderPair(pub String, pub String);

#[derive(Clone, Debug)]
pub struct OperationMeta {
    pub query_key: u32,
    pub operation_type: OperationType,
    pub document: Document
}

#[derive(Clone)]
pub struct OperationOptions {
    pub url: String,
    pub extra_headers: Option<Arc<dyn Fn() -> Vec<HeaderPair> + Send + Sync>>,
    pub request_policy: RequestPolicy
}

impl fmt::Debug for OperationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationOptions")
            .field("url", &self.url)
            .field("extra_headers", &self.extra_headers.is_some())
            .field("request_policy", &self.request_policy)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct Operation {
    /// Identifies the operation together with its variables.
    pub key: u64,
    pub meta: OperationMeta,
    pub query: QueryBody,
    pub options: OperationOptions
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultSource {
    Cache,
    Network,
    /// Produced by local resolvers without contacting a server.
    Local
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DebugInfo {
    pub source: ResultSource,
    #[serde(rename = "didDedup")]
    pub did_dedup: bool
}

#[derive(Clone, Debug)]
pub struct OperationResult {
    pub key: u64,
    pub meta: OperationMeta,
    pub response: Response
}

/// Per-query overrides of the client defaults.
#[derive(Default, Clone)]
pub struct QueryOptions {
    pub url: Option<String>,
    pub extra_headers: Option<Arc<dyn Fn() -> Vec<HeaderPair> + Send + Sync>>,
    pub request_policy: Option<RequestPolicy>
}
