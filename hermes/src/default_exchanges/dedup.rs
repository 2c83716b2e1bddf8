use crate::exchange::{
    Exchange, ExchangeFactory, ExchangeResult, Operation, OperationResult, OperationType
};
use futures::channel::{oneshot, oneshot::Sender};
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};

type InFlightCache = Arc<Mutex<HashMap<u64, Vec<Sender<ExchangeResult>>>>>;

/// The default deduplication exchange.
///
/// This will keep track of in-flight queries and catch any identical queries before they execute,
/// instead waiting for the result from the in-flight query
pub struct DedupExchange;
pub struct DedupExchangeImpl<TNext: Exchange> {
    next: TNext,
    in_flight_operations: InFlightCache
}

impl<TNext: Exchange> ExchangeFactory<TNext> for DedupExchange {
    type Output = DedupExchangeImpl<TNext>;

    fn build(self, next: TNext) -> Self::Output {
        DedupExchangeImpl {
            next,
            in_flight_operations: InFlightCache::default()
        }
    }
}

fn should_skip(operation: &Operation) -> bool {
    operation.meta.operation_type != OperationType::Query
}

fn make_deduped_result(res: &ExchangeResult) -> ExchangeResult {
    match res {
        Ok(ref res) => {
            let mut res: OperationResult = res.clone();
            if let Some(ref mut debug_info) = res.response.debug_info {
                debug_info.did_dedup = true;
            }
            Ok(res)
        }
        Err(e) => Err(e.clone())
    }
}

/// Removes the in-flight entry even if the leading operation is dropped before it finishes.
/// Waiting operations then see a closed channel and run on their own.
struct InFlight<'a> {
    cache: &'a InFlightCache,
    key: u64
}

impl InFlight<'_> {
    fn notify_listeners(self, res: &ExchangeResult) {
        let to_be_notified = self.cache.lock().remove(&self.key).unwrap_or_default();
        for sender in to_be_notified {
            // The receiver may have been dropped in the meantime, which is fine.
            let _ = sender.send(make_deduped_result(res));
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.cache.lock().remove(&self.key);
    }
}

#[async_trait]
impl<TNext: Exchange> Exchange for DedupExchangeImpl<TNext> {
    async fn run(&self, operation: Operation) -> ExchangeResult {
        if should_skip(&operation) {
            return self.next.run(operation).await;
        }

        let key = operation.key;
        let rcv = {
            let mut cache = self.in_flight_operations.lock();
            if let Some(listeners) = cache.get_mut(&key) {
                let (sender, receiver) = oneshot::channel();
                listeners.push(sender);
                Some(receiver)
            } else {
                cache.insert(key, Vec::new());
                None
            }
        };

        if let Some(rcv) = rcv {
            match rcv.await {
                Ok(res) => res,
                Err(_) => {
                    tracing::debug!(key, "deduplicated operation was cancelled, running it again");
                    self.next.run(operation).await
                }
            }
        } else {
            let in_flight = InFlight {
                cache: &self.in_flight_operations,
                key
            };
            let res = self.next.run(operation).await;
            in_flight.notify_listeners(&res);
            res
        }
    }
}
