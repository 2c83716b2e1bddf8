#[cfg(feature = "default-exchanges")]
use crate::default_exchanges::{DedupExchange, FetchExchange};
use crate::{
    client::ClientImpl,
    default_exchanges::TerminatorExchange,
    exchange::{Exchange, ExchangeFactory},
    Client, ClientConfig, HeaderPair, RequestPolicy
};
use std::sync::Arc;

pub struct ClientBuilder<M: Exchange = TerminatorExchange> {
    exchange: M,
    url: String,
    extra_headers: Option<Arc<dyn Fn() -> Vec<HeaderPair> + Send + Sync>>,
    request_policy: RequestPolicy
}

impl ClientBuilder<TerminatorExchange> {
    pub fn new<U: Into<String>>(url: U) -> Self {
        ClientBuilder {
            exchange: TerminatorExchange,
            url: url.into(),
            extra_headers: None,
            request_policy: RequestPolicy::CacheFirst
        }
    }

    /// Start from a loaded [`ClientConfig`](../struct.ClientConfig.html). The subscription url
    /// is up to the caller, since it belongs to whichever exchange handles subscriptions.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.service.url.clone()).with_request_policy(config.request_policy)
    }
}

impl<M: Exchange> ClientBuilder<M> {
    /// Add the default exchanges to the chain. Keep in mind that exchanges are executed bottom to top, so the first one added will be the last one executed.
    #[cfg(feature = "default-exchanges")]
    pub fn with_default_exchanges(self) -> ClientBuilder<impl Exchange> {
        self.with_exchange(FetchExchange)
            .with_exchange(DedupExchange)
    }

    /// Add an exchange to the chain. Keep in mind that exchanges are executed bottom to top, so the first one added will be the last one executed.
    pub fn with_exchange<F>(self, exchange_factory: F) -> ClientBuilder<F::Output>
    where
        F: ExchangeFactory<M>
    {
        let exchange = exchange_factory.build(self.exchange);
        ClientBuilder {
            exchange,
            url: self.url,
            extra_headers: self.extra_headers,
            request_policy: self.request_policy
        }
    }

    pub fn with_extra_headers<F: Fn() -> Vec<HeaderPair> + Send + Sync + 'static>(
        mut self,
        header_fn: F
    ) -> Self {
        self.extra_headers = Some(Arc::new(header_fn));
        self
    }

    pub fn with_request_policy(mut self, request_policy: RequestPolicy) -> Self {
        self.request_policy = request_policy;
        self
    }

    pub fn build(self) -> Client<M> {
        let client = ClientImpl {
            url: self.url,
            exchange: self.exchange,
            extra_headers: self.extra_headers,
            request_policy: self.request_policy
        };

        Client(Arc::new(client))
    }
}
