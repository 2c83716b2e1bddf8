use crate::exchange::{Exchange, ExchangeFactory, ExchangeResult, Operation, OperationType};

/// The default split predicate: subscriptions go to the dedicated exchange.
pub fn is_subscription(operation: &Operation) -> bool {
    operation.meta.operation_type == OperationType::Subscription
}

/// Routes operations between two exchanges.
///
/// Operations matching the predicate go to the dedicated exchange, usually a WebSocket
/// transport for subscriptions. Everything else continues down the chain, usually to an
/// HTTP fetch.
///
/// ```
/// # tokio_test::block_on(async {
/// use hermes::{default_exchanges::SplitExchange, Client, Document, ResultSource, Variables};
/// use hermes_test::fake::StaticFetchExchange;
/// use serde_json::json;
///
/// let client = Client::builder("http://localhost:4000/graphql")
///     .with_exchange(StaticFetchExchange::new(json!({ "books": [] })))
///     .with_exchange(SplitExchange::new(StaticFetchExchange::new(json!({ "bookAdded": null }))))
///     .build();
///
/// let subscription = Document::parse("subscription { bookAdded { id } }").unwrap();
/// let result = client.execute(&subscription, Variables::new()).await.unwrap();
/// assert_eq!(result.data.unwrap(), json!({ "bookAdded": null }));
/// # });
/// ```
pub struct SplitExchange<T: Exchange, P = fn(&Operation) -> bool> {
    dedicated: T,
    predicate: P
}

impl<T: Exchange> SplitExchange<T> {
    pub fn new(dedicated: T) -> Self {
        Self {
            dedicated,
            predicate: is_subscription
        }
    }
}

impl<T, P> SplitExchange<T, P>
where
    T: Exchange,
    P: Fn(&Operation) -> bool + Send + Sync + 'static
{
    /// Split on a custom predicate instead of the operation type.
    pub fn with_predicate(dedicated: T, predicate: P) -> Self {
        Self {
            dedicated,
            predicate
        }
    }
}

impl<T, P, TNext> ExchangeFactory<TNext> for SplitExchange<T, P>
where
    T: Exchange,
    P: Fn(&Operation) -> bool + Send + Sync + 'static,
    TNext: Exchange
{
    type Output = SplitExchangeImpl<T, P, TNext>;

    fn build(self, next: TNext) -> Self::Output {
        SplitExchangeImpl {
            dedicated: self.dedicated,
            predicate: self.predicate,
            next
        }
    }
}

pub struct SplitExchangeImpl<T, P, TNext> {
    dedicated: T,
    predicate: P,
    next: TNext
}

#[async_trait]
impl<T, P, TNext> Exchange for SplitExchangeImpl<T, P, TNext>
where
    T: Exchange,
    P: Fn(&Operation) -> bool + Send + Sync + 'static,
    TNext: Exchange
{
    async fn run(&self, operation: Operation) -> ExchangeResult {
        if (self.predicate)(&operation) {
            tracing::trace!(key = operation.key, "routing to dedicated exchange");
            self.dedicated.run(operation).await
        } else {
            self.next.run(operation).await
        }
    }
}
