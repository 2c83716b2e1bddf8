//! Exchanges that stand in for a server.

use crate::Counter;
use async_trait::async_trait;
use hermes::{
    exchange::{Exchange, ExchangeFactory, ExchangeResult, Operation, OperationResult},
    DebugInfo, Response, ResultSource
};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

fn network_result(operation: Operation, data: Option<Value>) -> ExchangeResult {
    Ok(OperationResult {
        key: operation.key,
        meta: operation.meta,
        response: Response {
            debug_info: Some(DebugInfo {
                source: ResultSource::Network,
                did_dedup: false
            }),
            data,
            errors: None
        }
    })
}

/// Answers every operation with the same data, counting calls and remembering the last
/// operation it saw.
#[derive(Clone)]
pub struct StaticFetchExchange {
    data: Value,
    calls: Counter,
    last_operation: Arc<Mutex<Option<Operation>>>
}

impl StaticFetchExchange {
    pub fn new(data: Value) -> Self {
        Self::with_counter(data, Counter::new())
    }

    pub fn with_counter(data: Value, calls: Counter) -> Self {
        Self {
            data,
            calls,
            last_operation: Arc::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    pub fn last_operation(&self) -> Option<Operation> {
        self.last_operation.lock().clone()
    }
}

impl<TNext: Exchange> ExchangeFactory<TNext> for StaticFetchExchange {
    type Output = StaticFetchExchange;

    fn build(self, _next: TNext) -> StaticFetchExchange {
        self
    }
}

#[async_trait]
impl Exchange for StaticFetchExchange {
    async fn run(&self, operation: Operation) -> ExchangeResult {
        self.calls.inc();
        *self.last_operation.lock() = Some(operation.clone());
        network_result(operation, Some(self.data.clone()))
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("network is down")]
pub struct NetworkDown;

/// Fails every operation with [`NetworkDown`].
#[derive(Clone, Default)]
pub struct FailingFetchExchange {
    calls: Counter
}

impl FailingFetchExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl<TNext: Exchange> ExchangeFactory<TNext> for FailingFetchExchange {
    type Output = FailingFetchExchange;

    fn build(self, _next: TNext) -> FailingFetchExchange {
        self
    }
}

#[async_trait]
impl Exchange for FailingFetchExchange {
    async fn run(&self, _operation: Operation) -> ExchangeResult {
        self.calls.inc();
        Err(NetworkDown.into())
    }
}
