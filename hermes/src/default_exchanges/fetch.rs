use crate::{
    exchange::{Exchange, ExchangeFactory, ExchangeResult, Operation, OperationResult},
    DebugInfo, HeaderPair, QueryBody, Response, ResultSource
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetch error: {0}")]
    NetworkError(#[source] reqwest::Error),
    #[error("server returned error code: {0}")]
    NotOk(reqwest::StatusCode),
    #[error("decoding error: {0}")]
    DecodeError(#[source] reqwest::Error)
}

/// The default fetch exchange
///
/// POSTs the operation as JSON using `reqwest` and terminates the chain.
pub struct FetchExchange;

impl<TNext: Exchange> ExchangeFactory<TNext> for FetchExchange {
    type Output = FetchExchange;

    fn build(self, _next: TNext) -> Self::Output {
        FetchExchange
    }
}

impl FetchExchange {
    async fn fetch(
        url: &str,
        extra_headers: Vec<HeaderPair>,
        query: &QueryBody
    ) -> Result<Response, FetchError> {
        let client = reqwest::Client::new();
        let mut request = client
            .post(url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(query);

        for HeaderPair(key, value) in extra_headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(FetchError::NetworkError)?;
        // An error status with a GraphQL body is still a response.
        let status = response.status();
        match response.json::<Response>().await {
            Ok(body) => Ok(body),
            Err(_) if !status.is_success() => Err(FetchError::NotOk(status)),
            Err(e) => Err(FetchError::DecodeError(e))
        }
    }
}

#[async_trait]
impl Exchange for FetchExchange {
    async fn run(&self, operation: Operation) -> ExchangeResult {
        let extra_headers = if let Some(ref extra_headers) = operation.options.extra_headers {
            extra_headers()
        } else {
            Vec::new()
        };

        tracing::debug!(url = %operation.options.url, key = operation.key, "fetching");
        let mut response =
            FetchExchange::fetch(&operation.options.url, extra_headers, &operation.query).await?;

        response.debug_info = Some(DebugInfo {
            source: ResultSource::Network,
            did_dedup: false
        });

        Ok(OperationResult {
            key: operation.key,
            meta: operation.meta,
            response
        })
    }
}
