use http::Uri;
use std::env;
use std::env::VarError;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Transport settings for the identity provider client.
///
/// No timeout is imposed unless the deployment asks for one: a caller that needs a deadline
/// either sets it here or fires a [`crate::http::cancel::CancellationToken`].
#[derive(Debug, Default, Clone)]
pub struct HttpConfig {
    pub(crate) timeout: Option<Duration>,
    pub(crate) conn_timeout: Option<Duration>,
    pub(crate) proxy: ProxyConfig,
}

impl HttpConfig {
    pub fn new(proxy: ProxyConfig) -> Self {
        Self {
            proxy,
            ..Default::default()
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..self
        }
    }

    pub fn with_conn_timeout(self, conn_timeout: Duration) -> Self {
        Self {
            conn_timeout: Some(conn_timeout),
            ..self
        }
    }
}

const HTTP_PROXY_ENV_NAME: &str = "HTTP_PROXY";
const HTTPS_PROXY_ENV_NAME: &str = "HTTPS_PROXY";

#[derive(thiserror::Error, Debug)]
pub enum ProxyError {
    #[error("invalid proxy url `{0}`: `{1}`")]
    InvalidUrl(String, String),
}

/// Proxy url which may be empty. Non-empty values are validated as URIs.
#[derive(Debug, Default, PartialEq, Clone)]
pub struct ProxyUrl(Option<Uri>);

impl TryFrom<&str> for ProxyUrl {
    type Error = ProxyError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        if s.is_empty() {
            return Ok(Self(None));
        }
        let uri = s
            .parse::<Uri>()
            .map_err(|err| ProxyError::InvalidUrl(s.to_string(), err.to_string()))?;
        if uri.host().is_none() {
            return Err(ProxyError::InvalidUrl(
                s.to_string(),
                "missing host".to_string(),
            ));
        }
        Ok(Self(Some(uri)))
    }
}

impl Display for ProxyUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(url) => write!(f, "{url}"),
            None => write!(f, ""),
        }
    }
}

impl ProxyUrl {
    fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

/// Proxy and trust settings used to reach the identity provider.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct ProxyConfig {
    /// Proxy URL proxy:
    /// <protocol>://<user>:<password>@<host>:<port>
    /// (All parts except host are optional)
    url: ProxyUrl,
    /// Directory with extra CA certificates in PEM format. All `.pem` files in it are read.
    ca_bundle_dir: Option<PathBuf>,
    /// Extra CA certificate file in PEM format.
    ca_bundle_file: Option<PathBuf>,
}

impl ProxyConfig {
    pub fn new(
        proxy_url: &str,
        ca_bundle_dir: Option<PathBuf>,
        ca_bundle_file: Option<PathBuf>,
    ) -> Result<Self, ProxyError> {
        let url = ProxyUrl::try_from(proxy_url)?;
        Ok(Self {
            url,
            ca_bundle_dir,
            ca_bundle_file,
        })
    }

    pub fn ca_bundle_dir(&self) -> Option<&Path> {
        self.ca_bundle_dir.as_deref()
    }

    pub fn ca_bundle_file(&self) -> Option<&Path> {
        self.ca_bundle_file.as_deref()
    }

    /// Proxy url, `None` when requests go direct.
    pub fn url(&self) -> Option<String> {
        (!self.url.is_empty()).then(|| self.url.to_string())
    }

    /// Returns a new instance whose url is taken from the standard environment variables if needed.
    pub fn try_with_url_from_env(self) -> Result<Self, ProxyError> {
        self.with_env_aware_url(env::var)
    }

    fn with_env_aware_url<F>(self, env_var: F) -> Result<Self, ProxyError>
    where
        F: Fn(&'static str) -> Result<String, VarError>,
    {
        if !self.url.is_empty() {
            return Ok(self);
        }
        let url = env_var(HTTPS_PROXY_ENV_NAME)
            .or_else(|_| env_var(HTTP_PROXY_ENV_NAME))
            .unwrap_or_default()
            .as_str()
            .try_into()?;
        Ok(ProxyConfig { url, ..self })
    }
}
