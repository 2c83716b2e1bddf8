//! This module contains the default exchanges.
//! Note that the fetch exchange requires the `default-exchanges` feature.

use crate::exchange::{Exchange, ExchangeResult, Operation};
use std::{error::Error, fmt};

mod dedup;
#[cfg(feature = "default-exchanges")]
mod fetch;
mod split;

pub use dedup::DedupExchange;
#[cfg(feature = "default-exchanges")]
pub use fetch::{FetchError, FetchExchange};
pub use split::{is_subscription, SplitExchange};

#[derive(Debug)]
enum ExchangeError {
    UnexpectedEndOfChain
}
impl Error for ExchangeError {}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeError::UnexpectedEndOfChain => write!(f, "unexpected end of exchange chain")
        }
    }
}

/// The terminating exchange.
/// This will always be the last exchange in the chain and will simply return an error if called.
pub struct TerminatorExchange;

#[async_trait]
impl Exchange for TerminatorExchange {
    async fn run(&self, operation: Operation) -> ExchangeResult {
        tracing::warn!(key = operation.key, "operation reached the end of the exchange chain");
        Err(ExchangeError::UnexpectedEndOfChain.into())
    }
}
