use crate::{
    exchange::{Exchange, Operation, OperationMeta, OperationOptions},
    utils::progressive_hash,
    Document, HeaderPair, QueryBody, QueryError, QueryOptions, RequestPolicy, Response, Variables
};
use std::sync::Arc;

pub struct ClientImpl<M: Exchange> {
    pub(crate) url: String,
    pub(crate) exchange: M,
    pub(crate) extra_headers: Option<Arc<dyn Fn() -> Vec<HeaderPair> + Send + Sync>>,
    pub(crate) request_policy: RequestPolicy
}

impl<M: Exchange> ClientImpl<M> {
    pub(crate) async fn execute_request_operation(
        &self,
        operation: Operation
    ) -> Result<Response, QueryError> {
        tracing::debug!(
            key = operation.key,
            operation_type = %operation.meta.operation_type,
            operation_name = ?operation.query.operation_name,
            "executing operation"
        );
        self.exchange
            .run(operation)
            .await
            .map(|operation_result| operation_result.response)
    }

    pub async fn execute(
        &self,
        document: &Document,
        variables: Variables
    ) -> Result<Response, QueryError> {
        self.execute_with_options(document, variables, QueryOptions::default())
            .await
    }

    pub async fn execute_with_options(
        &self,
        document: &Document,
        variables: Variables,
        options: QueryOptions
    ) -> Result<Response, QueryError> {
        let operation = self.create_request_operation(document, variables, options);
        self.execute_request_operation(operation).await
    }

    pub(crate) fn create_request_operation(
        &self,
        document: &Document,
        variables: Variables,
        options: QueryOptions
    ) -> Operation {
        let variables = document.with_defaults(variables);
        let key = progressive_hash(document.key(), &variables);

        let extra_headers = options
            .extra_headers
            .or_else(|| self.extra_headers.clone());

        // Documents that only select `@client` fields never leave the cache.
        let request_policy = if document.is_client_only() {
            RequestPolicy::CacheOnly
        } else {
            options.request_policy.unwrap_or(self.request_policy)
        };

        Operation {
            key,
            meta: OperationMeta {
                query_key: document.key(),
                operation_type: document.operation_type(),
                document: document.clone()
            },
            query: QueryBody {
                variables,
                query: document.query().to_string(),
                operation_name: document.operation_name().map(ToString::to_string)
            },
            options: OperationOptions {
                url: options.url.unwrap_or_else(|| self.url.clone()),
                extra_headers,
                request_policy
            }
        }
    }
}
