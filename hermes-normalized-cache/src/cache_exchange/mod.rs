//! Contains the exchange factory and implementation. The factory is the only thing needed for most
//! users and is reexported from the root.

use crate::{error::CacheError, resolvers::LocalResolvers, NormalizedCacheOptions, QueryStore};
use hermes::{
    exchange::{
        Exchange, ExchangeFactory, ExchangeResult, Operation, OperationResult, OperationType
    },
    DebugInfo, Document, RequestPolicy, Response, ResultSource, Variables
};
use serde_json::{Map, Value};

#[cfg(test)]
mod tests;

/// The normalized cache exchange. This will store query results as normalized entities and
/// answer queries from them, and runs mutations that have local resolvers without touching
/// the network.
///
/// Pass in a [`QueryStore`](../struct.QueryStore.html) and
/// [`LocalResolvers`](../struct.LocalResolvers.html) you keep handles to in order to seed the
/// cache or register resolvers later.
#[derive(Default)]
pub struct NormalizedCacheExchange {
    options: Option<NormalizedCacheOptions>,
    store: Option<QueryStore>,
    resolvers: LocalResolvers
}

impl NormalizedCacheExchange {
    /// Create a new cache exchange with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new cache exchange with extra options.
    /// The options are ignored if a store is passed in as well.
    pub fn with_options(options: NormalizedCacheOptions) -> Self {
        Self {
            options: Some(options),
            ..Self::default()
        }
    }

    /// Use an existing store.
    pub fn with_store(mut self, store: QueryStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_resolvers(mut self, resolvers: LocalResolvers) -> Self {
        self.resolvers = resolvers;
        self
    }
}

impl<TNext: Exchange> ExchangeFactory<TNext> for NormalizedCacheExchange {
    type Output = NormalizedCacheImpl<TNext>;

    fn build(self, next: TNext) -> NormalizedCacheImpl<TNext> {
        let options = self.options.unwrap_or_default();
        let store = self.store.unwrap_or_else(|| QueryStore::new(options));
        NormalizedCacheImpl {
            next,
            store,
            resolvers: self.resolvers
        }
    }
}

/// The implementation of the normalized cache. Exposed in case someone needs it, but most users
/// shouldn't.
pub struct NormalizedCacheImpl<TNext: Exchange> {
    next: TNext,
    store: QueryStore,
    resolvers: LocalResolvers
}

fn make_result(operation: Operation, data: Value, source: ResultSource) -> OperationResult {
    OperationResult {
        key: operation.key,
        meta: operation.meta,
        response: Response {
            debug_info: Some(DebugInfo {
                source,
                did_dedup: false
            }),
            data: Some(data),
            errors: None
        }
    }
}

impl<TNext: Exchange> NormalizedCacheImpl<TNext> {
    /// Normalize a result into the store and replace its data with what the store now holds,
    /// so the caller sees exactly what later cache reads will, `@client` fields included.
    fn write_result(
        &self,
        mut result: OperationResult,
        variables: &Variables
    ) -> Result<OperationResult, CacheError> {
        let has_errors = result
            .response
            .errors
            .as_ref()
            .map_or(false, |errors| !errors.is_empty());
        if has_errors {
            tracing::debug!(key = result.key, "result has errors, not caching it");
            return Ok(result);
        }

        if let Some(ref data) = result.response.data {
            let document = &result.meta.document;
            let data = self.store.transaction(|| {
                self.store.write_query(document, variables, data)?;
                self.store.read_result(document, variables)
            })?;
            result.response.data = Some(data);
        }
        Ok(result)
    }

    async fn run_query(&self, operation: Operation) -> ExchangeResult {
        let policy = operation.options.request_policy;
        if policy != RequestPolicy::NetworkOnly {
            match self
                .store
                .read_query(&operation.meta.document, &operation.query.variables)
            {
                Ok(data) => {
                    tracing::debug!(key = operation.key, "cache hit");
                    return Ok(make_result(operation, data, ResultSource::Cache));
                }
                Err(e) if policy == RequestPolicy::CacheOnly => return Err(e.into()),
                Err(e) => tracing::debug!(key = operation.key, reason = %e, "cache miss")
            }
        }

        let variables = operation.query.variables.clone();
        let result = self.next.run(operation).await?;
        Ok(self.write_result(result, &variables)?)
    }

    fn resolve_fields(
        &self,
        document: &Document,
        variables: &Variables
    ) -> Result<Value, CacheError> {
        let mut data = Map::new();
        for field in document.root_fields() {
            let arguments = field.arguments(variables);
            let value = self.resolvers.resolve(&field.name, &arguments, &self.store)?;
            data.insert(field.response_key().to_string(), value);
        }
        let data = Value::Object(data);
        self.store.write_query(document, variables, &data)?;
        self.store.read_query(document, variables)
    }

    /// Resolve every root field locally, write the result back, and read it out again, all in
    /// one transaction. If any of it fails, the store is rolled back to where it started.
    fn resolve_locally(&self, operation: Operation) -> ExchangeResult {
        let document = &operation.meta.document;
        let variables = &operation.query.variables;
        let data = self.store.transaction(|| {
            let snapshot = self.store.extract();
            let resolved = self.resolve_fields(document, variables);
            if let Err(ref e) = resolved {
                tracing::warn!(
                    key = operation.key,
                    error = %e,
                    "local mutation failed, rolling back"
                );
                self.store.restore(snapshot);
            }
            resolved
        })?;

        tracing::debug!(key = operation.key, "resolved mutation locally");
        Ok(make_result(operation, data, ResultSource::Local))
    }

    async fn run_mutation(&self, operation: Operation) -> ExchangeResult {
        let (local, total) = {
            let fields = operation.meta.document.root_fields();
            let local = fields
                .iter()
                .filter(|field| self.resolvers.contains(&field.name))
                .count();
            if let Some(field) = fields
                .iter()
                .find(|field| field.client_only && !self.resolvers.contains(&field.name))
            {
                return Err(CacheError::UnknownResolver {
                    field: field.name.clone()
                }
                .into());
            }
            (local, fields.len())
        };

        match local {
            0 => {
                let variables = operation.query.variables.clone();
                let result = self.next.run(operation).await?;
                Ok(self.write_result(result, &variables)?)
            }
            local if local == total => self.resolve_locally(operation),
            _ => Err(CacheError::PartiallyLocalMutation.into())
        }
    }
}

#[async_trait]
impl<TNext: Exchange> Exchange for NormalizedCacheImpl<TNext> {
    async fn run(&self, operation: Operation) -> ExchangeResult {
        match operation.meta.operation_type {
            OperationType::Query => self.run_query(operation).await,
            OperationType::Mutation => self.run_mutation(operation).await,
            OperationType::Subscription => {
                let variables = operation.query.variables.clone();
                let result = self.next.run(operation).await?;
                Ok(self.write_result(result, &variables)?)
            }
        }
    }
}
