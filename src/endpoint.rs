//! Target endpoint resolution.

use url::Url;

use crate::error::{Error, Result};

/// Parsed `ws://` or `wss://` target.
///
/// Resolved once at connect time and never changed for the lifetime of the
/// connection.
///
/// `wss` only selects the default port 443. No TLS is negotiated; callers that
/// need encryption must hand an already-wrapped stream to
/// [`Client::connect_with`](crate::Client::connect_with).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    secure: bool,
    host: String,
    port: u16,
    path: String,
    query: Option<String>,
}

impl Endpoint {
    /// Parse an endpoint URI.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidEndpoint`] if the URI does not parse, the scheme is not
    /// `ws`/`wss`, or there is no host.
    pub fn parse(uri: &str) -> Result<Self> {
        let url = Url::parse(uri)?;

        let secure = match url.scheme() {
            "ws" => false,
            "wss" => true,
            other => {
                return Err(Error::InvalidEndpoint(format!(
                    "unsupported scheme '{other}'"
                )));
            }
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::InvalidEndpoint(format!("missing host in '{uri}'")))?
            .to_string();

        let port = url.port().unwrap_or(if secure { 443 } else { 80 });

        let path = match url.path() {
            "" => "/".to_string(),
            p => p.to_string(),
        };

        let query = url.query().filter(|q| !q.is_empty()).map(str::to_string);

        Ok(Self {
            secure,
            host,
            port,
            path,
            query,
        })
    }

    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Path plus `?query`, as sent on the request line.
    #[must_use]
    pub fn request_target(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{}", self.path, q),
            None => self.path.clone(),
        }
    }

    /// `host:port`, as sent in the `Host` header.
    #[must_use]
    pub fn host_header(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Origin used when the configuration does not supply one.
    #[must_use]
    pub fn default_origin(&self) -> String {
        format!("http://{}", self.host)
    }

    /// Host and port in the form `TcpStream::connect` resolves.
    ///
    /// IPv6 literals lose their URI brackets.
    #[must_use]
    pub fn socket_addr(&self) -> (String, u16) {
        let host = self.host.trim_start_matches('[').trim_end_matches(']');
        (host.to_string(), self.port)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scheme = if self.secure { "wss" } else { "ws" };
        write!(
            f,
            "{}://{}:{}{}",
            scheme,
            self.host,
            self.port,
            self.request_target()
        )
    }
}

impl std::str::FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
