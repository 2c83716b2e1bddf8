use std::sync::Arc;

mod builder;
mod r#impl;

use crate::{
    default_exchanges::TerminatorExchange, exchange::Exchange, Document, QueryError, QueryOptions,
    Response, Variables
};
pub use builder::ClientBuilder;
pub use r#impl::ClientImpl;

/// A handle to a configured client. Cloning it is cheap and every clone shares the same
/// exchange chain, so build it once and hand it to whoever needs it.
#[repr(transparent)]
pub struct Client<M: Exchange = TerminatorExchange>(pub Arc<ClientImpl<M>>);

impl<M: Exchange> Clone for Client<M> {
    fn clone(&self) -> Self {
        Client(self.0.clone())
    }
}

impl Client {
    pub fn builder<U: Into<String>>(url: U) -> ClientBuilder {
        ClientBuilder::new(url)
    }
}

impl<M: Exchange> Client<M> {
    /// Execute a query, mutation or subscription with the client's default options.
    pub async fn execute(
        &self,
        document: &Document,
        variables: Variables
    ) -> Result<Response, QueryError> {
        self.0.execute(document, variables).await
    }

    pub async fn execute_with_options(
        &self,
        document: &Document,
        variables: Variables,
        options: QueryOptions
    ) -> Result<Response, QueryError> {
        self.0
            .execute_with_options(document, variables, options)
            .await
    }
}
