//! Client-side resolvers for fields that never reach a server.

use crate::{
    error::{BoxError, CacheError},
    QueryStore
};
use fnv::FnvHashMap;
use hermes::{Document, Variables};
use parking_lot::RwLock;
use serde_json::Value;
use std::{fmt, sync::Arc};

type ResolverFn =
    dyn Fn(Option<Value>, &Variables, &QueryStore) -> Result<Value, BoxError> + Send + Sync;

/// A function computing the value of a root field locally.
///
/// It receives the previous value (the cached result of the document set with
/// [`reading`](#method.reading), if any), the field arguments, and a handle to the store.
/// Whatever it writes to the store is visible to every later read.
#[derive(Clone)]
pub struct LocalResolver {
    previous: Option<Document>,
    resolve: Arc<ResolverFn>
}

impl LocalResolver {
    pub fn new<F>(resolve: F) -> Self
    where
        F: Fn(Option<Value>, &Variables, &QueryStore) -> Result<Value, BoxError>
            + Send
            + Sync
            + 'static
    {
        Self {
            previous: None,
            resolve: Arc::new(resolve)
        }
    }

    /// Pass the cached result of `document` to the resolver as its previous value.
    pub fn reading(mut self, document: Document) -> Self {
        self.previous = Some(document);
        self
    }
}

impl fmt::Debug for LocalResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalResolver")
            .field("previous", &self.previous.as_ref().map(Document::operation_name))
            .finish()
    }
}

/// The registry of local resolvers, keyed by root field name.
///
/// Cloning gives another handle to the same registry, so resolvers can be registered after
/// the cache exchange has been built.
///
/// ```
/// use hermes_normalized_cache::{CacheError, LocalResolver, LocalResolvers};
/// use serde_json::json;
///
/// let resolvers = LocalResolvers::new();
/// resolvers.register("ping", LocalResolver::new(|_, _, _| Ok(json!("pong")))).unwrap();
///
/// let duplicate = resolvers.register("ping", LocalResolver::new(|_, _, _| Ok(json!(null))));
/// assert!(matches!(duplicate, Err(CacheError::DuplicateResolver { .. })));
/// ```
#[derive(Clone, Debug, Default)]
pub struct LocalResolvers {
    resolvers: Arc<RwLock<FnvHashMap<String, LocalResolver>>>
}

impl LocalResolvers {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// `DuplicateResolver` if a resolver is already registered for this field.
    pub fn register<N: Into<String>>(
        &self,
        field_name: N,
        resolver: LocalResolver
    ) -> Result<(), CacheError> {
        let field_name = field_name.into();
        let mut resolvers = self.resolvers.write();
        if resolvers.contains_key(&field_name) {
            return Err(CacheError::DuplicateResolver { field: field_name });
        }

        tracing::info!(field = %field_name, "registered local resolver");
        resolvers.insert(field_name, resolver);
        Ok(())
    }

    pub fn contains(&self, field_name: &str) -> bool {
        self.resolvers.read().contains_key(field_name)
    }

    /// Run the resolver for `field_name`.
    ///
    /// # Errors
    ///
    /// `UnknownResolver` if nothing is registered for the field, `ResolverError` wrapping
    /// whatever the resolver failed with.
    pub fn resolve(
        &self,
        field_name: &str,
        arguments: &Variables,
        store: &QueryStore
    ) -> Result<Value, CacheError> {
        let resolver = self
            .resolvers
            .read()
            .get(field_name)
            .cloned()
            .ok_or_else(|| CacheError::UnknownResolver {
                field: field_name.to_string()
            })?;

        let previous = resolver
            .previous
            .as_ref()
            .and_then(|document| store.read_query(document, &Variables::new()).ok());

        tracing::trace!(
            field = field_name,
            has_previous = previous.is_some(),
            "resolving locally"
        );
        (resolver.resolve)(previous, arguments, store).map_err(|source| {
            CacheError::ResolverError {
                field: field_name.to_string(),
                source
            }
        })
    }
}
