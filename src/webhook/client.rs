//! Production HTTP client implementation using reqwest.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::{HttpClient, HttpError, HttpRequest, HttpResponse, ProxyConfig, TransportPolicy};

/// Production HTTP client using reqwest.
///
/// TLS verification and proxy settings are connection-level options in
/// reqwest, so one `reqwest::Client` is built lazily per distinct
/// [`TransportPolicy`] and reused for every later request with the same
/// policy. Timeouts are applied per request.
///
/// # Example
///
/// ```no_run
/// use webhook_call::webhook::{ReqwestClient, HttpClient, HttpRequest};
/// use url::Url;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ReqwestClient::new();
/// let url = Url::parse("https://api.example.com/webhook")?;
/// let request = HttpRequest::post(url).with_body(b"hello".to_vec());
/// let response = client.request(request).await?;
/// println!("Status: {}", response.status);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ReqwestClient {
    clients: Arc<Mutex<HashMap<TransportPolicy, reqwest::Client>>>,
}

impl ReqwestClient {
    /// Creates a new HTTP client with no connections built yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an HTTP client that uses `client` for requests carrying the
    /// default transport policy.
    ///
    /// Requests with any other policy still get a dedicated client.
    #[must_use]
    pub fn from_client(client: reqwest::Client) -> Self {
        let mut clients = HashMap::new();
        clients.insert(TransportPolicy::default(), client);
        Self {
            clients: Arc::new(Mutex::new(clients)),
        }
    }

    /// Returns the number of distinct transport policies seen so far.
    #[must_use]
    pub fn pooled_clients(&self) -> usize {
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn client_for(&self, policy: &TransportPolicy) -> Result<reqwest::Client, HttpError> {
        let mut clients = self
            .clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(client) = clients.get(policy) {
            return Ok(client.clone());
        }

        let client = build_client(policy)?;
        clients.insert(policy.clone(), client.clone());
        Ok(client)
    }
}

fn build_client(policy: &TransportPolicy) -> Result<reqwest::Client, HttpError> {
    let mut builder =
        reqwest::Client::builder().danger_accept_invalid_certs(!policy.verify_ssl);

    if let Some(proxy) = &policy.proxy {
        for proxy in build_proxies(proxy)? {
            builder = builder.proxy(proxy);
        }
    }

    builder
        .build()
        .map_err(|e| HttpError::InvalidRequest(e.to_string()))
}

fn build_proxies(config: &ProxyConfig) -> Result<Vec<reqwest::Proxy>, HttpError> {
    let invalid = |e: reqwest::Error| HttpError::InvalidRequest(format!("invalid proxy: {e}"));

    match config {
        ProxyConfig::All(url) => Ok(vec![reqwest::Proxy::all(url).map_err(invalid)?]),
        ProxyConfig::PerScheme { http, https, no } => {
            let no_proxy = reqwest::NoProxy::from_string(&no.join(","));
            let mut proxies = Vec::new();
            if let Some(url) = http {
                proxies.push(
                    reqwest::Proxy::http(url)
                        .map_err(invalid)?
                        .no_proxy(no_proxy.clone()),
                );
            }
            if let Some(url) = https {
                proxies.push(
                    reqwest::Proxy::https(url)
                        .map_err(invalid)?
                        .no_proxy(no_proxy),
                );
            }
            Ok(proxies)
        }
    }
}

impl HttpClient for ReqwestClient {
    async fn request(&self, req: HttpRequest) -> Result<HttpResponse, HttpError> {
        let client = self.client_for(&req.transport)?;

        // Build the reqwest request
        let mut builder = client.request(req.method, req.url.as_str());

        // Add headers
        for (name, value) in &req.headers {
            builder = builder.header(name, value);
        }

        if let Some(timeout) = req.timeout {
            builder = builder.timeout(timeout);
        }

        // Add body if present
        if let Some(body) = req.body {
            builder = builder.body(body);
        }

        // Send the request
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                HttpError::Timeout
            } else if e.is_builder() {
                HttpError::InvalidRequest(e.to_string())
            } else {
                HttpError::Connection(Box::new(e))
            }
        })?;

        // Extract response parts
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    HttpError::Timeout
                } else {
                    HttpError::Connection(Box::new(e))
                }
            })?
            .to_vec();

        Ok(HttpResponse::new(status, headers, body))
    }
}
