use thiserror::Error;

/// The error type local resolvers may fail with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("entity `{key}` is not in the cache")]
    MissingEntity { key: String },
    #[error("field `{field}` of `{entity}` is not in the cache")]
    MissingField { entity: String, field: String },
    #[error("key fields for `{typename}` were declared after entities of that type were written")]
    ConflictingPolicy { typename: String },
    #[error("a local resolver for `{field}` is already registered")]
    DuplicateResolver { field: String },
    #[error("no local resolver is registered for `{field}`")]
    UnknownResolver { field: String },
    #[error("local resolver for `{field}` failed: {source}")]
    ResolverError {
        field: String,
        #[source]
        source: BoxError
    },
    #[error("mutation mixes locally resolved and remote root fields")]
    PartiallyLocalMutation
}

impl CacheError {
    /// Whether this is a cache miss rather than a real failure.
    pub fn is_miss(&self) -> bool {
        matches!(
            self,
            CacheError::MissingEntity { .. } | CacheError::MissingField { .. }
        )
    }
}
