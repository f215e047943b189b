//! HTTP plumbing shared by every source parser.

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Url, redirect};
use tracing::debug;

use crate::USER_AGENT;
use crate::error::FetchError;

/// Default request timeout (connect, TLS handshake and request).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Operator-supplied transport settings.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Per-request timeout
    pub timeout: Duration,
    /// Proxy URL applied to all requests
    pub proxy: Option<String>,
    /// Skip TLS certificate verification
    pub insecure: bool,
    /// Treat every cache entry as stale
    pub ignore_cache: bool,
    /// Upper bound on concurrent fetches during a refresh (unbounded if `None`)
    pub max_concurrency: Option<usize>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            proxy: None,
            insecure: false,
            ignore_cache: false,
            max_concurrency: None,
        }
    }
}

/// The two clients a fetch may need: a normal one, and one that reports
/// redirects instead of following them.
#[derive(Debug, Clone)]
pub struct HttpClients {
    /// Follows redirects
    pub standard: Client,
    /// Never follows redirects
    pub no_redirect: Client,
}

impl HttpClients {
    /// Build both clients from the operator's settings.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Network`] if the proxy URL is invalid or the TLS
    /// backend cannot be initialised.
    pub fn new(config: &HttpConfig) -> Result<Self, FetchError> {
        Ok(Self {
            standard: build_client(config, redirect::Policy::default())?,
            no_redirect: build_client(config, redirect::Policy::none())?,
        })
    }
}

fn build_client(config: &HttpConfig, policy: redirect::Policy) -> Result<Client, FetchError> {
    let mut builder = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.timeout)
        .connect_timeout(config.timeout)
        .redirect(policy)
        .danger_accept_invalid_certs(config.insecure);
    if let Some(proxy) = config.proxy.as_deref().filter(|p| !p.is_empty()) {
        builder = builder.proxy(reqwest::Proxy::all(proxy)?);
    }
    Ok(builder.build()?)
}

/// Parse `url` and reject anything but http/https before any network call.
///
/// # Errors
///
/// Returns [`FetchError::InvalidUrl`] or [`FetchError::Scheme`].
pub fn check_scheme(url: &str) -> Result<Url, FetchError> {
    let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(FetchError::Scheme {
            scheme: other.to_string(),
        }),
    }
}

/// A single GET.
#[derive(Debug, Clone, Copy)]
pub struct Get<'a> {
    /// Target URL
    pub url: &'a str,
    /// `Authorization` header value, omitted when empty
    pub authorization: Option<&'a str>,
    /// `Accept` header value
    pub accept: Option<&'a str>,
}

impl<'a> Get<'a> {
    /// Plain GET without credentials.
    pub fn new(url: &'a str) -> Self {
        Self {
            url,
            authorization: None,
            accept: None,
        }
    }

    /// Attach credentials when `authorization` is non-empty.
    pub fn authorized(mut self, authorization: &'a str) -> Self {
        if !authorization.is_empty() {
            self.authorization = Some(authorization);
        }
        self
    }

    /// Set the `Accept` header.
    pub fn accept(mut self, accept: &'a str) -> Self {
        self.accept = Some(accept);
        self
    }

    /// Send and return the body of a 2xx response.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Scheme`] before sending for non-http(s) URLs,
    /// [`FetchError::Http`] for non-success statuses, and
    /// [`FetchError::Network`] for transport failures.
    pub async fn bytes(self, client: &Client) -> Result<Vec<u8>, FetchError> {
        let response = self.send(client).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                url: self.url.to_string(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Send and return the raw response, whatever its status.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Scheme`] before sending for non-http(s) URLs and
    /// [`FetchError::Network`] for transport failures.
    pub async fn send(self, client: &Client) -> Result<reqwest::Response, FetchError> {
        let url = check_scheme(self.url)?;
        debug!("GET {url}");
        let mut request = client.get(url);
        if let Some(auth) = self.authorization {
            request = request.header(AUTHORIZATION, auth);
        }
        if let Some(accept) = self.accept {
            request = request.header(ACCEPT, accept);
        }
        Ok(request.send().await?)
    }
}
