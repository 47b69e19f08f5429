//! reqwest-backed clients.

use std::future::Future;

use url::Url;

use crate::client::{
    BlockingHttpClient, ClientError, ClientResponse, CompletionMode, HttpClient,
};
use crate::config::ClientConfig;
use crate::net::ConnectionTracker;
use crate::observability::metrics;

const USER_AGENT: &str = concat!("http-stress/", env!("CARGO_PKG_VERSION"));

/// Async client under test.
#[derive(Debug, Clone)]
pub struct StressClient {
    inner: reqwest::Client,
    live: ConnectionTracker,
}

impl StressClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let inner = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .no_proxy()
            .pool_max_idle_per_host(0)
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(ClientError::Build)?;
        Ok(Self {
            inner,
            live: ConnectionTracker::new("response"),
        })
    }
}

impl HttpClient for StressClient {
    fn get(
        &self,
        url: &Url,
        mode: CompletionMode,
    ) -> impl Future<Output = Result<ClientResponse, ClientError>> + Send {
        let inner = self.inner.clone();
        let live = self.live.clone();
        let url = url.clone();
        async move {
            let result = fetch(&inner, url, mode, &live).await;
            metrics::record_client_request(mode, result.is_ok());
            result
        }
    }

    fn live_responses(&self) -> &ConnectionTracker {
        &self.live
    }
}

async fn fetch(
    client: &reqwest::Client,
    url: Url,
    mode: CompletionMode,
    live: &ConnectionTracker,
) -> Result<ClientResponse, ClientError> {
    let response = client.get(url).send().await?;
    match mode {
        CompletionMode::ReadHeadersOnly => Ok(ClientResponse::deferred(response, live.track())),
        CompletionMode::ReadFullBody => {
            let status = response.status().as_u16();
            let content_length = response.content_length();
            let text = response.text().await?;
            Ok(ClientResponse::buffered(status, content_length, text, live.track()))
        }
    }
}

/// Blocking client under test.
///
/// reqwest runs a private runtime thread behind this client; build, use and
/// drop it outside of any async context.
#[derive(Debug, Clone)]
pub struct BlockingStressClient {
    inner: reqwest::blocking::Client,
    live: ConnectionTracker,
}

impl BlockingStressClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let inner = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .no_proxy()
            .pool_max_idle_per_host(0)
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(ClientError::Build)?;
        Ok(Self {
            inner,
            live: ConnectionTracker::new("response"),
        })
    }
}

impl BlockingStressClient {
    fn fetch(&self, url: &Url, mode: CompletionMode) -> Result<ClientResponse, ClientError> {
        let response = self.inner.get(url.clone()).send()?;
        match mode {
            CompletionMode::ReadHeadersOnly => {
                Ok(ClientResponse::deferred_blocking(response, self.live.track()))
            }
            CompletionMode::ReadFullBody => {
                let status = response.status().as_u16();
                let content_length = response.content_length();
                let text = response.text()?;
                Ok(ClientResponse::buffered(status, content_length, text, self.live.track()))
            }
        }
    }
}

impl BlockingHttpClient for BlockingStressClient {
    fn get(&self, url: &Url, mode: CompletionMode) -> Result<ClientResponse, ClientError> {
        let result = self.fetch(url, mode);
        metrics::record_client_request(mode, result.is_ok());
        result
    }

    fn live_responses(&self) -> &ConnectionTracker {
        &self.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{build_response, AsyncSyntheticServer, FaultMode, SyntheticServer};
    use std::thread;

    const BODY: &str = "abcdefghijklmnopqrstuvwxyz";

    #[tokio::test]
    async fn async_client_reads_full_body() {
        let client = StressClient::new(&ClientConfig::default()).unwrap();
        let server = AsyncSyntheticServer::listen(1).unwrap();
        let url = server.url();
        let response_text = build_response(BODY);

        let (served, response) = tokio::join!(
            server.accept_and_respond(&response_text, FaultMode::Respond),
            client.get(&url, CompletionMode::ReadFullBody)
        );
        served.unwrap();
        let response = response.unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.content_length(), Some(26));
        assert_eq!(response.body(), Some(BODY));
        assert_eq!(client.live_responses().active_count(), 1);

        response.release();
        assert_eq!(client.live_responses().active_count(), 0);
    }

    #[tokio::test]
    async fn headers_only_defers_body() {
        let client = StressClient::new(&ClientConfig::default()).unwrap();
        let server = AsyncSyntheticServer::listen(1).unwrap();
        let url = server.url();
        let response_text = build_response(BODY);

        let (served, response) = tokio::join!(
            server.accept_and_respond(&response_text, FaultMode::Respond),
            client.get(&url, CompletionMode::ReadHeadersOnly)
        );
        served.unwrap();
        let response = response.unwrap();

        assert!(response.is_body_deferred());
        assert_eq!(response.body(), None);
        assert_eq!(response.content_length(), Some(26));
    }

    #[tokio::test]
    async fn refused_connection_is_connection_error() {
        let client = StressClient::new(&ClientConfig::default()).unwrap();
        let server = AsyncSyntheticServer::listen(1).unwrap();
        let url = server.url();
        drop(server);

        let err = client.get(&url, CompletionMode::ReadFullBody).await.unwrap_err();
        assert!(err.is_connection(), "unexpected error: {err}");
        assert_eq!(client.live_responses().active_count(), 0);
    }

    #[tokio::test]
    async fn server_abort_after_request_is_connection_error() {
        let client = StressClient::new(&ClientConfig::default()).unwrap();
        let server = AsyncSyntheticServer::listen(1).unwrap();
        let url = server.url();

        let (served, response) = tokio::join!(
            server.accept_and_respond("unused", FaultMode::AbortAfterRequest),
            client.get(&url, CompletionMode::ReadFullBody)
        );
        served.unwrap();
        assert!(response.unwrap_err().is_connection());
    }

    #[test]
    fn blocking_client_reads_full_body() {
        let client = BlockingStressClient::new(&ClientConfig::default()).unwrap();
        let server = SyntheticServer::listen(1).unwrap();
        let url = server.url();

        let serving = thread::spawn(move || {
            server.accept_and_respond(&build_response(BODY), FaultMode::Respond)
        });
        let response = client.get(&url, CompletionMode::ReadFullBody).unwrap();
        serving.join().unwrap().unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.body(), Some(BODY));
        assert_eq!(client.live_responses().active_count(), 1);
        drop(response);
        assert_eq!(client.live_responses().active_count(), 0);
    }

    #[test]
    fn completion_mode_labels() {
        assert_eq!(CompletionMode::default(), CompletionMode::ReadFullBody);
        assert_eq!(CompletionMode::ReadHeadersOnly.as_str(), "headers-only");
    }
}
