use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Method, RequestBuilder, Response, Url};

use crate::error::ClientError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_RETRIES: usize = 3;

/// HTTP transport for the account API.
///
/// Every request carries a timeout, the crate user agent and a bearer token.
/// Transient failures (connect errors, timeouts, 429 and 5xx) are retried with
/// exponential backoff; everything else is returned as-is.
pub(crate) struct Request {
    client: reqwest::Client,
}

impl Request {
    pub(crate) fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub(crate) fn authorized(&self, method: Method, url: Url, token: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .timeout(REQUEST_TIMEOUT)
            .header(
                reqwest::header::USER_AGENT,
                concat!("fxaccounts-core/", env!("CARGO_PKG_VERSION")),
            )
            .bearer_auth(token)
    }

    /// Sends `request`, retrying transient failures.
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let Some(template) = request.try_clone() else {
            // Streaming bodies cannot be replayed.
            return attempt(request).await.map_err(Attempt::into_error);
        };

        (|| async {
            match template.try_clone() {
                Some(request) => attempt(request).await,
                None => Err(Attempt::Fatal(ClientError::InvalidResponse(
                    "request body cannot be replayed".to_string(),
                ))),
            }
        })
        .retry(backoff())
        .when(Attempt::is_transient)
        .notify(|failure: &Attempt, delay: Duration| {
            log::debug!("retrying in {delay:?} after {}", failure.error());
        })
        .await
        .map_err(Attempt::into_error)
    }
}

fn backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(200))
        .with_max_delay(Duration::from_secs(2))
        .with_max_times(MAX_RETRIES)
}

/// Outcome of a failed attempt.
#[derive(Debug)]
enum Attempt {
    Transient(ClientError),
    Fatal(ClientError),
}

impl Attempt {
    const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    const fn error(&self) -> &ClientError {
        match self {
            Self::Transient(error) | Self::Fatal(error) => error,
        }
    }

    fn into_error(self) -> ClientError {
        match self {
            Self::Transient(error) | Self::Fatal(error) => error,
        }
    }
}

fn is_transient_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

async fn attempt(request: RequestBuilder) -> Result<Response, Attempt> {
    let (client, request) = request.build_split();
    let request = request.map_err(|err| {
        Attempt::Fatal(ClientError::Network {
            url: err.url().map_or_else(String::new, ToString::to_string),
            status: None,
            error: format!("request build failed: {err}"),
        })
    })?;
    let url = request.url().to_string();

    match client.execute(request).await {
        Ok(response) if is_transient_status(response.status().as_u16()) => {
            let status = response.status().as_u16();
            Err(Attempt::Transient(ClientError::Network {
                url,
                status: Some(status),
                error: format!("server answered {status}"),
            }))
        }
        Ok(response) => Ok(response),
        Err(err) => {
            let error = ClientError::Network {
                url,
                status: None,
                error: err.to_string(),
            };
            if err.is_timeout() || err.is_connect() {
                Err(Attempt::Transient(error))
            } else {
                Err(Attempt::Fatal(error))
            }
        }
    }
}
